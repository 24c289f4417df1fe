use hikemap::{Trip, TripConfig};
use log::info;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::error::Error;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const INDEX_FILE: &str = "index.json";

/// Writes every day, then the aggregate, then the index, so an interrupted
/// run never leaves an index pointing at files that were not written.
pub fn write_trip(trip: &Trip, config: &TripConfig) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let details_dir = config.output_dir.join(&config.details_dir);
    fs::create_dir_all(&details_dir)
        .map_err(|e| format!("Create {}: {e}", details_dir.display()))?;

    let mut written = Vec::with_capacity(trip.days.len() + 2);

    for day in trip.days.iter().chain(std::iter::once(&trip.aggregate)) {
        let path = config
            .output_dir
            .join(config.details_location(&day.display_name()));
        write_json(&path, day)?;
        info!("Wrote {} ({} points)", path.display(), day.coordinates.len());
        written.push(path);
    }

    let index_path = config.output_dir.join(INDEX_FILE);
    write_json(&index_path, &trip.index)?;
    info!("Wrote {} ({} entries)", index_path.display(), trip.index.len());
    written.push(index_path);

    Ok(written)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    let file = File::create(path).map_err(|e| format!("Create {}: {e}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let formatter = PrettyFormatter::with_indent(b"\t");
    let mut serializer = Serializer::with_formatter(&mut writer, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| format!("Encode {}: {e}", path.display()))?;

    writer
        .flush()
        .map_err(|e| format!("Write {}: {e}", path.display()))?;
    Ok(())
}
