use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use thiserror::Error;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};
use uuid::Uuid;

/// Label and file stem of the synthetic record spanning every day of a trip.
pub const AGGREGATE_LABEL: &str = "All";

#[derive(Error, Debug, PartialEq)]
pub enum TripError {
    #[error("no waypoints to partition")]
    EmptyInput,
    #[error("bounding box requested for an empty coordinate list")]
    DegenerateBounds,
    #[error("invalid date {0:?}, expected MM/DD/YYYY")]
    InvalidDate(String),
    #[error("invalid UTC offset {0:?}, expected +HH:MM or -HH:MM")]
    InvalidOffset(String),
    #[error("start date must be earlier than the end of the date range")]
    InvalidDateRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub time: OffsetDateTime,
}

impl Waypoint {
    /// GeoJSON ordering: `[longitude, latitude]`.
    pub fn coordinates(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

/// Orders waypoints by timestamp. Waypoints sharing a timestamp keep their
/// relative input order.
pub fn sort_by_timestamp(points: &mut [Waypoint]) {
    points.sort_by_key(|p| p.time);
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripConfig {
    pub output_dir: PathBuf,
    pub details_dir: String,
    pub utc_offset: UtcOffset,
}

impl Default for TripConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("trips"),
            details_dir: "details".to_string(),
            utc_offset: UtcOffset::UTC,
        }
    }
}

impl TripConfig {
    pub fn day_key(&self, time: &OffsetDateTime) -> String {
        calendar_day_key(time, self.utc_offset)
    }

    /// Location of a details file relative to `output_dir`, as referenced
    /// from the index.
    pub fn details_location(&self, name: &str) -> String {
        format!("{}/{name}.json", self.details_dir)
    }
}

/// Renders the calendar date of `time` as seen from `offset`, as `MM/DD/YYYY`.
pub fn calendar_day_key(time: &OffsetDateTime, offset: UtcOffset) -> String {
    let local = time.to_offset(offset);
    format!(
        "{:02}/{:02}/{:04}",
        u8::from(local.month()),
        local.day(),
        local.year()
    )
}

pub fn parse_date(s: &str) -> Result<Date, TripError> {
    Date::parse(s.trim(), format_description!("[month]/[day]/[year]"))
        .map_err(|_| TripError::InvalidDate(s.to_string()))
}

pub fn parse_utc_offset(s: &str) -> Result<UtcOffset, TripError> {
    UtcOffset::parse(
        s.trim(),
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|_| TripError::InvalidOffset(s.to_string()))
}

/// Half-open time window `[start, end)`. An unset bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateRange {
    pub start: Option<OffsetDateTime>,
    pub end: Option<OffsetDateTime>,
}

impl DateRange {
    pub fn new(
        start: Option<OffsetDateTime>,
        end: Option<OffsetDateTime>,
    ) -> Result<Self, TripError> {
        if let (Some(start), Some(end)) = (start, end)
            && start >= end
        {
            return Err(TripError::InvalidDateRange);
        }
        Ok(Self { start, end })
    }

    /// Builds a range from calendar dates where both dates are inclusive.
    /// The end bound becomes midnight of the day after `last_day`.
    pub fn from_dates(
        first_day: Option<Date>,
        last_day: Option<Date>,
        offset: UtcOffset,
    ) -> Result<Self, TripError> {
        let start = first_day.map(|d| d.midnight().assume_offset(offset));
        let end = match last_day {
            Some(d) => {
                let next = d
                    .next_day()
                    .ok_or_else(|| TripError::InvalidDate(d.to_string()))?;
                Some(next.midnight().assume_offset(offset))
            }
            None => None,
        };
        Self::new(start, end)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, time: &OffsetDateTime) -> bool {
        self.start.is_none_or(|start| *time >= start) && self.end.is_none_or(|end| *time < end)
    }
}

pub fn filter_by_date_range(points: Vec<Waypoint>, range: &DateRange) -> Vec<Waypoint> {
    if range.is_unbounded() {
        return points;
    }
    points.into_iter().filter(|p| range.contains(&p.time)).collect()
}

/// Waypoints grouped by calendar day. `day_keys` lists each key once, in
/// chronological order; `buckets` holds the waypoints of each key, sorted.
#[derive(Debug, Default)]
pub struct DayPartition {
    pub day_keys: Vec<String>,
    pub buckets: HashMap<String, Vec<Waypoint>>,
}

impl DayPartition {
    fn close_day(&mut self, key: String, points: Vec<Waypoint>) {
        match self.buckets.entry(key) {
            // Only reachable with a key function that is not monotonic in time.
            Entry::Occupied(mut e) => e.get_mut().extend(points),
            Entry::Vacant(e) => {
                self.day_keys.push(e.key().clone());
                e.insert(points);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.day_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.day_keys.is_empty()
    }

}

/// Sorts `points` chronologically and splits them into runs sharing the same
/// `day_key`. Every input point lands in exactly one bucket.
pub fn partition_days<F>(mut points: Vec<Waypoint>, day_key: F) -> Result<DayPartition, TripError>
where
    F: Fn(&OffsetDateTime) -> String,
{
    sort_by_timestamp(&mut points);

    let mut points = points.into_iter();
    let first = points.next().ok_or(TripError::EmptyInput)?;

    let mut partition = DayPartition::default();
    let mut current_key = day_key(&first.time);
    let mut current_day = vec![first];

    for point in points {
        let key = day_key(&point.time);
        if key != current_key {
            let finished_key = std::mem::replace(&mut current_key, key);
            partition.close_day(finished_key, std::mem::take(&mut current_day));
        }
        current_day.push(point);
    }
    partition.close_day(current_key, current_day);

    Ok(partition)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

/// Computes the bounding box of `[longitude, latitude]` pairs.
///
/// Latitude bounds are the plain min/max. Longitude is antimeridian aware:
/// when the spread between the lowest and highest longitude exceeds 180
/// degrees the track is taken to cross ±180, and the box is returned wrapped
/// with `west = highest` and `east = lowest`, so `east < west`. Consumers must
/// keep that inversion intact.
///
/// The 180 degree spread is a heuristic rather than a spherical hull; map
/// renderers depend on its exact output, so it is kept as is.
///
/// Returns [`TripError::DegenerateBounds`] for an empty slice, which callers
/// treat as a bug in whatever produced the coordinates.
pub fn compute_bounds(coordinates: &[[f64; 2]]) -> Result<BoundingBox, TripError> {
    if coordinates.is_empty() {
        return Err(TripError::DegenerateBounds);
    }

    let (mut lowest, mut highest) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut south, mut north) = (f64::INFINITY, f64::NEG_INFINITY);
    for [lon, lat] in coordinates {
        lowest = lowest.min(*lon);
        highest = highest.max(*lon);
        south = south.min(*lat);
        north = north.max(*lat);
    }

    let (west, east) = if highest - lowest > 180.0 {
        (highest, lowest)
    } else {
        (lowest, highest)
    };

    Ok(BoundingBox {
        north,
        south,
        east,
        west,
    })
}

/// One day of a trip, or the aggregate when `day_number` is 0. Serialises to
/// the details file layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySegment {
    #[serde(rename = "index")]
    pub day_number: usize,
    #[serde(rename = "name")]
    pub label: String,
    #[serde(skip)]
    pub points: Vec<Waypoint>,
    pub coordinates: Vec<[f64; 2]>,
    #[serde(rename = "outerPoints")]
    pub bounds: BoundingBox,
}

impl DaySegment {
    pub fn from_points(
        label: impl Into<String>,
        day_number: usize,
        points: Vec<Waypoint>,
    ) -> Result<Self, TripError> {
        let coordinates: Vec<[f64; 2]> = points.iter().map(Waypoint::coordinates).collect();
        let bounds = compute_bounds(&coordinates)?;
        Ok(Self {
            day_number,
            label: label.into(),
            points,
            coordinates,
            bounds,
        })
    }

    pub fn from_coordinates(
        label: impl Into<String>,
        day_number: usize,
        coordinates: Vec<[f64; 2]>,
    ) -> Result<Self, TripError> {
        let bounds = compute_bounds(&coordinates)?;
        Ok(Self {
            day_number,
            label: label.into(),
            points: Vec::new(),
            coordinates,
            bounds,
        })
    }

    pub fn is_aggregate(&self) -> bool {
        self.day_number == 0
    }

    /// `"Day N"` for a day, `"All"` for the aggregate. Used as the index label
    /// and the details file stem.
    pub fn display_name(&self) -> String {
        if self.is_aggregate() {
            AGGREGATE_LABEL.to_string()
        } else {
            format!("Day {}", self.day_number)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripIndexEntry {
    pub index: usize,
    pub id: Uuid,
    pub label: String,
    pub sub_label: String,
    pub details_location: String,
}

impl TripIndexEntry {
    pub fn new(
        index: usize,
        label: impl Into<String>,
        sub_label: impl Into<String>,
        details_location: impl Into<String>,
    ) -> Self {
        Self {
            index,
            id: Uuid::new_v4(),
            label: label.into(),
            sub_label: sub_label.into(),
            details_location: details_location.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Trip {
    pub days: Vec<DaySegment>,
    pub aggregate: DaySegment,
    pub index: Vec<TripIndexEntry>,
}

/// Turns a partition into numbered day segments, the `"All"` aggregate and the
/// index. The aggregate's bounds are recomputed from every coordinate rather
/// than merged from the per-day boxes.
pub fn assemble_trip(
    partition: DayPartition,
    trip_name: Option<&str>,
    config: &TripConfig,
) -> Result<Trip, TripError> {
    if partition.is_empty() {
        return Err(TripError::EmptyInput);
    }

    let DayPartition {
        day_keys,
        mut buckets,
    } = partition;

    let mut days = Vec::with_capacity(day_keys.len());
    let mut all_coordinates = Vec::new();

    for (position, key) in day_keys.into_iter().enumerate() {
        let points = buckets.remove(&key).unwrap_or_default();
        let day = DaySegment::from_points(key, position + 1, points)?;
        all_coordinates.extend_from_slice(&day.coordinates);
        days.push(day);
    }

    let aggregate = DaySegment::from_coordinates(AGGREGATE_LABEL, 0, all_coordinates)?;

    let mut index = Vec::with_capacity(days.len() + 1);
    index.push(TripIndexEntry::new(
        0,
        AGGREGATE_LABEL,
        trip_name.unwrap_or_default(),
        config.details_location(AGGREGATE_LABEL),
    ));
    for day in &days {
        let name = day.display_name();
        let location = config.details_location(&name);
        index.push(TripIndexEntry::new(
            day.day_number,
            name,
            day.label.as_str(),
            location,
        ));
    }

    Ok(Trip {
        days,
        aggregate,
        index,
    })
}
