use crate::output::write_trip;
use crate::source::SourceLoader;
use hikemap::{
    DateRange, Trip, TripConfig, TripError, Waypoint, assemble_trip, filter_by_date_range,
    partition_days,
};
use log::{debug, info, warn};
use std::error::Error;

pub struct GenerateRequest<'a> {
    pub locator: &'a str,
    pub credential: Option<&'a str>,
    pub range: DateRange,
    pub trip_name: Option<&'a str>,
}

pub fn generate_command(
    loader: &dyn SourceLoader,
    request: &GenerateRequest,
    config: &TripConfig,
) -> Result<(), Box<dyn Error>> {
    let waypoints = loader.load_from_resource(request.locator, request.credential)?;
    info!("Loaded {} waypoints from {} feed", waypoints.len(), loader.name());

    match build_trip(waypoints, &request.range, request.trip_name, config)? {
        Some(trip) => {
            write_trip(&trip, config)?;
            info!(
                "Generated {} days with {} points into {}",
                trip.days.len(),
                trip.aggregate.coordinates.len(),
                config.output_dir.display()
            );
        }
        None => warn!("No waypoints to process; nothing written"),
    }

    Ok(())
}

/// Filters, partitions and assembles. `Ok(None)` means no waypoint survived
/// the date range, which is not an error.
pub fn build_trip(
    waypoints: Vec<Waypoint>,
    range: &DateRange,
    trip_name: Option<&str>,
    config: &TripConfig,
) -> Result<Option<Trip>, TripError> {
    let loaded = waypoints.len();
    let waypoints = filter_by_date_range(waypoints, range);
    if waypoints.len() != loaded {
        info!("Date range kept {} of {loaded} waypoints", waypoints.len());
    }

    let partition = match partition_days(waypoints, |t| config.day_key(t)) {
        Ok(partition) => partition,
        Err(TripError::EmptyInput) => return Ok(None),
        Err(e) => return Err(e),
    };
    debug!("Partitioned into {} days", partition.len());

    assemble_trip(partition, trip_name, config).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::INDEX_FILE;
    use hikemap::parse_date;
    use tempdir::TempDir;
    use time::{OffsetDateTime, UtcOffset};

    struct FixedLoader(Vec<Waypoint>);

    impl SourceLoader for FixedLoader {
        fn load_from_bytes(&self, _raw: &[u8]) -> Result<Vec<Waypoint>, Box<dyn Error>> {
            Ok(self.0.clone())
        }

        fn load_from_resource(
            &self,
            _locator: &str,
            _credential: Option<&str>,
        ) -> Result<Vec<Waypoint>, Box<dyn Error>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn make_waypoint(id: &str, time_str: &str) -> Waypoint {
        Waypoint {
            id: id.to_string(),
            lat: 10.0,
            lon: 20.0,
            time: OffsetDateTime::parse(
                time_str,
                &time::format_description::well_known::Iso8601::DEFAULT,
            )
            .unwrap(),
        }
    }

    fn sample_waypoints() -> Vec<Waypoint> {
        vec![
            make_waypoint("a", "2023-05-01T10:00:00Z"),
            make_waypoint("b", "2023-05-02T10:00:00Z"),
            make_waypoint("c", "2023-05-03T10:00:00Z"),
        ]
    }

    fn request(range: DateRange) -> GenerateRequest<'static> {
        GenerateRequest {
            locator: "unused",
            credential: None,
            range,
            trip_name: None,
        }
    }

    #[test]
    fn test_build_trip_applies_date_range() {
        let range = DateRange::from_dates(
            Some(parse_date("05/02/2023").unwrap()),
            Some(parse_date("05/02/2023").unwrap()),
            UtcOffset::UTC,
        )
        .unwrap();

        let trip = build_trip(sample_waypoints(), &range, None, &TripConfig::default())
            .unwrap()
            .unwrap();

        assert_eq!(trip.days.len(), 1);
        assert_eq!(trip.days[0].label, "05/02/2023");
        assert_eq!(trip.days[0].points[0].id, "b");
    }

    #[test]
    fn test_build_trip_empty_after_filter() {
        let range =
            DateRange::from_dates(None, Some(parse_date("01/01/2020").unwrap()), UtcOffset::UTC)
                .unwrap();

        let result = build_trip(sample_waypoints(), &range, None, &TripConfig::default());

        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_generate_command_writes_files() {
        let dir = TempDir::new("hikemap-generate").unwrap();
        let config = TripConfig {
            output_dir: dir.path().join("trips"),
            ..TripConfig::default()
        };

        generate_command(
            &FixedLoader(sample_waypoints()),
            &request(DateRange::default()),
            &config,
        )
        .unwrap();

        assert!(config.output_dir.join(INDEX_FILE).is_file());
        assert!(config.output_dir.join("details/Day 3.json").is_file());
        assert!(config.output_dir.join("details/All.json").is_file());
    }

    #[test]
    fn test_generate_command_empty_range_writes_nothing() {
        let dir = TempDir::new("hikemap-generate").unwrap();
        let config = TripConfig {
            output_dir: dir.path().join("trips"),
            ..TripConfig::default()
        };
        let range = DateRange::from_dates(
            Some(parse_date("01/01/2030").unwrap()),
            None,
            UtcOffset::UTC,
        )
        .unwrap();

        generate_command(&FixedLoader(sample_waypoints()), &request(range), &config).unwrap();

        assert!(!config.output_dir.exists());
    }

    #[test]
    fn test_generate_command_empty_feed_writes_nothing() {
        let dir = TempDir::new("hikemap-generate").unwrap();
        let config = TripConfig {
            output_dir: dir.path().join("trips"),
            ..TripConfig::default()
        };

        generate_command(&FixedLoader(Vec::new()), &request(DateRange::default()), &config)
            .unwrap();

        assert!(!config.output_dir.exists());
    }
}
