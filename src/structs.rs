use chrono::NaiveDate;
use log::{Log, Metadata, Record as LogRecord};
use serde::Serialize;
use std::fmt;

/// Simple logger implementation
///
/// Writes to stderr so map views printed on stdout stay parseable.
pub struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &LogRecord) {
        eprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

/// Activity density classification for a station at a given date and hour.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DensityCategory {
    VeryIntense,
    Intense,
    Normal,
    Sparse,
    /// Any label outside the four known ones, kept verbatim for display.
    Unknown(String),
}

impl DensityCategory {
    /// Parses a source label exactly. Never fails: unrecognised labels become `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Very Intense" => DensityCategory::VeryIntense,
            "Intense" => DensityCategory::Intense,
            "Normal" => DensityCategory::Normal,
            "Sparse" => DensityCategory::Sparse,
            other => DensityCategory::Unknown(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            DensityCategory::VeryIntense => "Very Intense",
            DensityCategory::Intense => "Intense",
            DensityCategory::Normal => "Normal",
            DensityCategory::Sparse => "Sparse",
            DensityCategory::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for DensityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One station observation for a date and hour. Validated at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRecord {
    pub station_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub activity_date: NaiveDate,
    pub activity_hour: u8,
    pub total_activity: u32,
    pub density: DensityCategory,
}

/// All records of one city, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub city: String,
    pub records: Vec<StationRecord>,
}

impl Dataset {
    pub fn new(city: impl Into<String>, records: Vec<StationRecord>) -> Self {
        Self {
            city: city.into(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Marker colors understood by the map widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    Red,
    Orange,
    Blue,
    Green,
    Gray,
}

impl MarkerColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerColor::Red => "red",
            MarkerColor::Orange => "orange",
            MarkerColor::Blue => "blue",
            MarkerColor::Green => "green",
            MarkerColor::Gray => "gray",
        }
    }
}

impl fmt::Display for MarkerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single map marker ready for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub station_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub total_activity: u32,
    pub category: String,
    pub popup: String,
    pub color: MarkerColor,
}

/// Latitude/longitude pair used to center the map
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

/// Markers for one city/date/hour plus the point the map centers on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub center: LatLon,
    pub zoom: u8,
    pub markers: Vec<Marker>,
}

/// Outcome of a selection. `Empty` is the "no data" signal, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Markers(MapView),
    Empty,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Empty)
    }

    pub fn map_view(&self) -> Option<&MapView> {
        match self {
            Selection::Markers(view) => Some(view),
            Selection::Empty => None,
        }
    }
}

/// Export format for a rendered map view
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
    Parquet,
}
