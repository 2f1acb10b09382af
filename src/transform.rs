use crate::error::Result;
use crate::provider::DatasetProvider;
use crate::structs::{Dataset, LatLon, MapView, Marker, Selection, StationRecord};
use chrono::NaiveDate;
use log::{debug, info};
use std::collections::BTreeSet;

/// Runs the whole selection for one city, date and hour.
///
/// Loads the city's dataset through `provider`, keeps the records matching
/// `date` and `hour` exactly, styles each one and centers the map on the mean
/// coordinate of the matches.
///
/// # Arguments
///
/// * `provider` - Source of city datasets
/// * `city` - Registered city name
/// * `date` - Calendar date to show
/// * `hour` - Hour of day to show (0-23)
/// * `zoom` - Initial zoom level handed to the map widget
///
/// # Returns
///
/// `Selection::Markers` with one marker per matching record, or
/// `Selection::Empty` when nothing matches.
///
/// # Errors
///
/// Returns `PipelineError` if:
/// - `city` is not registered
/// - The city's source file is unreadable or malformed
pub fn build_map_view<P: DatasetProvider + ?Sized>(
    provider: &P,
    city: &str,
    date: NaiveDate,
    hour: u8,
    zoom: u8,
) -> Result<Selection> {
    let dataset = provider.load(city)?;
    let matched = select(&dataset, date, hour);
    info!(
        "{}: {} of {} records match {} {}",
        city,
        matched.len(),
        dataset.len(),
        date,
        format_hour(hour)
    );
    Ok(map_view(&matched, zoom))
}

/// Sorted, de-duplicated hours that have at least one record on `date`.
pub fn available_hours(dataset: &Dataset, date: NaiveDate) -> Vec<u8> {
    dataset
        .records
        .iter()
        .filter(|r| r.activity_date == date)
        .map(|r| r.activity_hour)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Records whose date and hour both match exactly, in source order.
///
/// An hour with no records yields an empty vector rather than an error.
pub fn select(dataset: &Dataset, date: NaiveDate, hour: u8) -> Vec<&StationRecord> {
    let matched: Vec<&StationRecord> = dataset
        .records
        .iter()
        .filter(|r| r.activity_date == date && r.activity_hour == hour)
        .collect();
    debug!(
        "Selected {} records for {} at hour {}",
        matched.len(),
        date,
        hour
    );
    matched
}

/// Sorted, de-duplicated dates present in the dataset.
pub fn available_dates(dataset: &Dataset) -> Vec<NaiveDate> {
    dataset
        .records
        .iter()
        .map(|r| r.activity_date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// First and last date in the dataset, if any.
pub fn date_span(dataset: &Dataset) -> Option<(NaiveDate, NaiveDate)> {
    let dates = available_dates(dataset);
    Some((*dates.first()?, *dates.last()?))
}

/// Hour-picker label, e.g. `8` -> `"8:00"`.
pub fn format_hour(hour: u8) -> String {
    format!("{}:00", hour)
}

pub fn popup_text(record: &StationRecord) -> String {
    format!(
        "Station: {}<br>Activity: {}<br>Category: {}",
        record.station_name, record.total_activity, record.density
    )
}

/// Turns matched records into markers centered on their mean coordinate.
///
/// Returns `Selection::Empty` for an empty slice; no centroid is computed then.
pub fn map_view(records: &[&StationRecord], zoom: u8) -> Selection {
    if records.is_empty() {
        return Selection::Empty;
    }

    let count = records.len() as f64;
    let center = LatLon {
        latitude: records.iter().map(|r| r.latitude).sum::<f64>() / count,
        longitude: records.iter().map(|r| r.longitude).sum::<f64>() / count,
    };

    let markers = records
        .iter()
        .map(|record| Marker {
            station_name: record.station_name.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            total_activity: record.total_activity,
            category: record.density.label().to_string(),
            popup: popup_text(record),
            color: record.density.color(),
        })
        .collect();

    Selection::Markers(MapView {
        center,
        zoom,
        markers,
    })
}
