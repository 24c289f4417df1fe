use crate::source::SourceLoader;
use hikemap::Waypoint;
use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use std::error::Error;
use time::OffsetDateTime;

/// Loader for the KML feed served by Garmin MapShare (inReach devices).
pub struct GarminLoader;

impl SourceLoader for GarminLoader {
    fn load_from_bytes(&self, raw: &[u8]) -> Result<Vec<Waypoint>, Box<dyn Error>> {
        let placemarks = read_placemarks(raw)?;
        debug!("Read {} placemarks", placemarks.len());
        Ok(placemarks_to_waypoints(placemarks))
    }

    fn name(&self) -> &'static str {
        "Garmin KML"
    }
}

/// A `<Placemark>` as it appears in the feed, before any field is interpreted.
#[derive(Debug, Default, Clone, PartialEq)]
struct Placemark {
    when: Option<String>,
    extended_data: Vec<(String, String)>,
}

impl Placemark {
    fn data(&self, name: &str) -> Option<&str> {
        self.extended_data
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn id(&self) -> String {
        self.data("Id").unwrap_or_default().to_string()
    }

    fn latitude(&self) -> f64 {
        self.data("Latitude")
            .and_then(|v| v.parse().ok())
            .filter(|v: &f64| v.is_finite())
            .unwrap_or(0.0)
    }

    fn longitude(&self) -> f64 {
        self.data("Longitude")
            .and_then(|v| v.parse().ok())
            .filter(|v: &f64| v.is_finite())
            .unwrap_or(0.0)
    }

    fn timestamp(&self) -> Option<OffsetDateTime> {
        let when = self.when.as_deref()?;
        OffsetDateTime::parse(
            when,
            &time::format_description::well_known::Iso8601::DEFAULT,
        )
        .ok()
    }
}

fn read_placemarks(input: &[u8]) -> Result<Vec<Placemark>, Box<dyn Error>> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();
    let mut placemarks = Vec::new();

    let mut current: Option<Placemark> = None;
    let mut data_name: Option<String> = None;
    let mut in_text_element = false;
    let mut text = String::new();

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Err(e) => {
                return Err(
                    format!("Error at position {}: {:?}", reader.buffer_position(), e).into(),
                );
            }
            Ok(Event::Eof) => break,
            Ok(event) => event.into_owned(),
        };

        match event {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"Placemark" => {
                    current = Some(Placemark::default());
                }
                b"when" | b"value" if current.is_some() => {
                    in_text_element = true;
                    text.clear();
                }
                b"Data" if current.is_some() => {
                    data_name = e
                        .attributes()
                        .flatten()
                        .find(|attr| attr.key.local_name().as_ref() == b"name")
                        .and_then(|attr| String::from_utf8(attr.value.into_owned()).ok());
                }
                _ => {}
            },

            // Still a record: it may be the trailing summary.
            Event::Empty(ref e) => {
                if e.local_name().as_ref() == b"Placemark" {
                    placemarks.push(Placemark::default());
                }
            }

            Event::End(ref e) => match e.local_name().as_ref() {
                b"Placemark" => {
                    if let Some(placemark) = current.take() {
                        placemarks.push(placemark);
                    }
                    data_name = None;
                }
                b"when" => {
                    in_text_element = false;
                    if let Some(placemark) = current.as_mut() {
                        placemark.when = Some(text.trim().to_string());
                    }
                }
                b"value" => {
                    in_text_element = false;
                    if let (Some(placemark), Some(name)) = (current.as_mut(), data_name.as_ref()) {
                        placemark
                            .extended_data
                            .push((name.clone(), text.trim().to_string()));
                    }
                }
                b"Data" => {
                    data_name = None;
                }
                _ => {}
            },

            Event::Text(ref e) => {
                if in_text_element && let Ok(t) = std::str::from_utf8(e) {
                    text.push_str(t);
                }
            }

            Event::GeneralRef(ref e) => {
                if in_text_element {
                    if let Ok(Some(c)) = e.resolve_char_ref() {
                        text.push(c);
                    } else if let Ok(name) = e.decode()
                        && let Some(resolved) = resolve_predefined_entity(&name)
                    {
                        text.push_str(resolved);
                    }
                }
            }

            Event::CData(ref e) => {
                if in_text_element && let Ok(t) = std::str::from_utf8(e) {
                    text.push_str(t);
                }
            }

            _ => {}
        }

        buf.clear();
    }

    Ok(placemarks)
}

/// The feed always closes with a summary placemark holding the track line;
/// it carries no position data and is dropped. Placemarks without a readable
/// timestamp cannot be ordered and are skipped.
fn placemarks_to_waypoints(mut placemarks: Vec<Placemark>) -> Vec<Waypoint> {
    placemarks.pop();

    let mut skipped = 0;
    let waypoints: Vec<Waypoint> = placemarks
        .iter()
        .filter_map(|placemark| match placemark.timestamp() {
            Some(time) => Some(Waypoint {
                id: placemark.id(),
                lat: placemark.latitude(),
                lon: placemark.longitude(),
                time,
            }),
            None => {
                skipped += 1;
                None
            }
        })
        .collect();

    if skipped > 0 {
        warn!("Skipped {skipped} placemarks without a valid timestamp");
    }

    waypoints
}
