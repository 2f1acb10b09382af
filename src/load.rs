use crate::error::Result;
use crate::structs::{MapView, OutputFormat};
use arrow_array::{Float64Array, RecordBatch, StringArray, UInt32Array};
use arrow_schema::{DataType, Field, Schema};
use csv::Writer;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::{fs::File, path::Path, sync::Arc};

/// Writes a map view in the requested format.
///
/// # Errors
/// Returns error if the file cannot be created or written to.
pub fn write_map_view(view: &MapView, output_path: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(view, output_path),
        OutputFormat::Csv => write_csv(view, output_path),
        OutputFormat::Parquet => write_parquet(view, output_path),
    }
}

/// Writes one CSV row per marker.
///
/// # Arguments
/// * `view` - Map view whose markers are written
/// * `output_path` - Path where the CSV file will be created
///
/// # Errors
/// Returns error if file cannot be created or written to.
pub fn write_csv(view: &MapView, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record([
        "Station",
        "Latitude",
        "Longitude",
        "Activity",
        "Category",
        "Color",
        "Popup",
    ])?;

    for marker in &view.markers {
        writer.write_record(&[
            marker.station_name.clone(),
            marker.latitude.to_string(),
            marker.longitude.to_string(),
            marker.total_activity.to_string(),
            marker.category.clone(),
            marker.color.to_string(),
            marker.popup.clone(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes the whole view, center and zoom included, as pretty-formatted JSON.
///
/// # Errors
/// Returns error if file cannot be created or serialization fails.
pub fn write_json(view: &MapView, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    serde_json::to_writer_pretty(file, view)?;
    Ok(())
}

/// Writes the markers to a Parquet file using Arrow format.
///
/// # Errors
/// Returns error if file cannot be created, schema is invalid, or Arrow operations fail.
pub fn write_parquet(view: &MapView, output_path: &Path) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("station", DataType::Utf8, false),
        Field::new("latitude", DataType::Float64, false),
        Field::new("longitude", DataType::Float64, false),
        Field::new("activity", DataType::UInt32, false),
        Field::new("category", DataType::Utf8, false),
        Field::new("color", DataType::Utf8, false),
        Field::new("popup", DataType::Utf8, false),
    ]));

    let markers = &view.markers;
    let stations = StringArray::from_iter_values(markers.iter().map(|m| m.station_name.as_str()));
    let latitudes: Float64Array = markers.iter().map(|m| m.latitude).collect();
    let longitudes: Float64Array = markers.iter().map(|m| m.longitude).collect();
    let activity: UInt32Array = markers.iter().map(|m| m.total_activity).collect();
    let categories = StringArray::from_iter_values(markers.iter().map(|m| m.category.as_str()));
    let colors = StringArray::from_iter_values(markers.iter().map(|m| m.color.as_str()));
    let popups = StringArray::from_iter_values(markers.iter().map(|m| m.popup.as_str()));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(stations),
            Arc::new(latitudes),
            Arc::new(longitudes),
            Arc::new(activity),
            Arc::new(categories),
            Arc::new(colors),
            Arc::new(popups),
        ],
    )?;

    let file = File::create(output_path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}
