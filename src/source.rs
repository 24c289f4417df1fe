use crate::garmin::GarminLoader;
use clap::ValueEnum;
use hikemap::Waypoint;
use log::{debug, info};
use std::error::Error;
use std::fs;

/// A vendor feed that can be turned into waypoints.
pub trait SourceLoader {
    /// Parses a raw feed. The result is in feed order, without the vendor's
    /// trailing summary record.
    fn load_from_bytes(&self, raw: &[u8]) -> Result<Vec<Waypoint>, Box<dyn Error>>;

    fn load_from_resource(
        &self,
        locator: &str,
        credential: Option<&str>,
    ) -> Result<Vec<Waypoint>, Box<dyn Error>> {
        let raw = read_resource(locator, credential)?;
        self.load_from_bytes(&raw)
    }

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceType {
    /// Garmin MapShare / inReach KML feed
    Garmin,
}

impl SourceType {
    pub fn loader(self) -> Box<dyn SourceLoader> {
        match self {
            SourceType::Garmin => Box::new(GarminLoader),
        }
    }
}

fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

/// Reads a feed from an HTTP(S) URL or, for anything else, a local file.
pub fn read_resource(locator: &str, credential: Option<&str>) -> Result<Vec<u8>, Box<dyn Error>> {
    if is_remote(locator) {
        fetch_resource(locator, credential)
    } else {
        debug!("Reading feed from file {locator}");
        fs::read(locator).map_err(|e| format!("Read {locator}: {e}").into())
    }
}

/// GETs `url`, sending `credential` as the basic-auth password with an empty
/// user name. Any non-success status is an error.
pub fn fetch_resource(url: &str, credential: Option<&str>) -> Result<Vec<u8>, Box<dyn Error>> {
    info!("Fetching feed from {url}");

    let client = reqwest::blocking::Client::new();
    let mut request = client.get(url);
    if let Some(password) = credential {
        request = request.basic_auth("", Some(password));
    }

    let response = request.send().map_err(|e| format!("GET error: {e}"))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("Status error: {status}").into());
    }

    let body = response.bytes().map_err(|e| format!("Read body: {e}"))?;
    debug!("Fetched {} bytes", body.len());

    Ok(body.to_vec())
}
