//! End-to-end tests: source files on disk through the provider to map views.

use arrow_array::types::Int32Type;
use arrow_array::{
    Date32Array, DictionaryArray, Float64Array, Int64Array, RecordBatch, StringArray,
    TimestampNanosecondArray,
};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use chrono::NaiveDate;
use lib::{
    CityRegistry, DashboardConfig, DataSourceError, DatasetProvider, DensityCategory,
    FileDatasetProvider, MarkerColor, PipelineError, Selection, available_hours, build_map_view,
    records_from_batch, select,
};
use parquet::arrow::ArrowWriter;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const HEADER: &str = "STATION_NAME,LATITUDE,LONGITUDE,ACTIVITY_DATE,ACTIVITY_HOUR,TOTAL_ACTIVITY,DENSITY_CATEGORY";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn write_file(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut body = String::from(HEADER);
    for row in rows {
        body.push('\n');
        body.push_str(row);
    }
    fs::write(&path, body).unwrap();
    path
}

/// Writes the three registered cities into `dir` and returns a matching config.
fn three_city_config(dir: &Path) -> DashboardConfig {
    write_file(
        dir,
        "dublinbike_top5_density.csv",
        &[
            "Smithfield,53.3497,-6.2782,2024-02-05 00:00:00,8,41,Very Intense",
            "Heuston Station,53.3466,-6.2920,2024-02-05 00:00:00,8,17,Normal",
            "Grand Canal Dock,53.3397,-6.2375,2024-02-05 00:00:00,8,4,Sparse",
            "Smithfield,53.3497,-6.2782,2024-02-05 00:00:00,9,12,Intense",
            "Smithfield,53.3497,-6.2782,2024-02-06 00:00:00,8,30,Intense",
        ],
    );
    write_file(
        dir,
        "citibike_top5_density.csv",
        &[
            "W 21 St & 6 Ave,40.7417,-73.9942,2024-02-01,17,88,Very Intense",
            "Broadway & E 14 St,40.7345,-73.9907,2024-02-01,17,64,Intense",
        ],
    );
    write_file(
        dir,
        "divvy_top5_density.csv",
        &["Streeter Dr & Grand Ave,41.8923,-87.6120,2024-02-10,12,23,Unlisted"],
    );

    DashboardConfig {
        data_dir: dir.to_path_buf(),
        ..DashboardConfig::default()
    }
}

#[test]
fn test_dublin_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let config = three_city_config(dir.path());
    let provider = FileDatasetProvider::new(config.registry().unwrap());

    let selection = build_map_view(&provider, "Dublin", date(2024, 2, 5), 8, 12).unwrap();
    let view = selection.map_view().expect("three matching rows");

    assert_eq!(view.markers.len(), 3);
    let colors: Vec<MarkerColor> = view.markers.iter().map(|m| m.color).collect();
    assert_eq!(
        colors,
        vec![MarkerColor::Red, MarkerColor::Blue, MarkerColor::Green]
    );

    let mean_lat = (53.3497 + 53.3466 + 53.3397) / 3.0;
    let mean_lon = (-6.2782 + -6.2920 + -6.2375) / 3.0;
    assert!((view.center.latitude - mean_lat).abs() < 1e-9);
    assert!((view.center.longitude - mean_lon).abs() < 1e-9);

    assert_eq!(
        view.markers[0].popup,
        "Station: Smithfield<br>Activity: 41<br>Category: Very Intense"
    );
}

#[test]
fn test_absent_slot_is_empty_signal() {
    let dir = tempfile::tempdir().unwrap();
    let config = three_city_config(dir.path());
    let provider = FileDatasetProvider::new(config.registry().unwrap());

    let selection = build_map_view(&provider, "Dublin", date(2024, 2, 5), 3, 12).unwrap();
    assert_eq!(selection, Selection::Empty);

    let selection = build_map_view(&provider, "Dublin", date(2024, 2, 20), 8, 12).unwrap();
    assert!(selection.is_empty());
}

#[test]
fn test_pipeline_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = three_city_config(dir.path());
    let provider = FileDatasetProvider::new(config.registry().unwrap());

    let first = build_map_view(&provider, "New York", date(2024, 2, 1), 17, 12).unwrap();
    let second = build_map_view(&provider, "New York", date(2024, 2, 1), 17, 12).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_all_cities_load_valid_records() {
    let dir = tempfile::tempdir().unwrap();
    let config = three_city_config(dir.path());
    let provider = FileDatasetProvider::new(config.registry().unwrap());

    for city in provider.registry().cities() {
        let dataset = provider.load(city).unwrap();
        assert_eq!(dataset.city, city);
        assert!(!dataset.is_empty());
        for record in &dataset.records {
            assert!(record.activity_hour <= 23);
            assert!((-90.0..=90.0).contains(&record.latitude));
            assert!((-180.0..=180.0).contains(&record.longitude));
            let hours = available_hours(&dataset, record.activity_date);
            assert!(hours.windows(2).all(|w| w[0] < w[1]));
            assert!(hours.contains(&record.activity_hour));
        }
    }
}

#[test]
fn test_unknown_category_renders_gray() {
    let dir = tempfile::tempdir().unwrap();
    let config = three_city_config(dir.path());
    let provider = FileDatasetProvider::new(config.registry().unwrap());

    let dataset = provider.load("Chicago").unwrap();
    assert_eq!(
        dataset.records[0].density,
        DensityCategory::Unknown("Unlisted".to_string())
    );

    let view = build_map_view(&provider, "Chicago", date(2024, 2, 10), 12, 12).unwrap();
    assert_eq!(view.map_view().unwrap().markers[0].color, MarkerColor::Gray);
}

#[test]
fn test_unknown_city_and_malformed_source() {
    let dir = tempfile::tempdir().unwrap();
    let config = three_city_config(dir.path());
    write_file(
        dir.path(),
        "divvy_top5_density.csv",
        &["Streeter Dr & Grand Ave,41.8923,-87.6120,Feb 10th,12,23,Normal"],
    );
    let provider = FileDatasetProvider::new(config.registry().unwrap());

    assert!(matches!(
        build_map_view(&provider, "Paris", date(2024, 2, 10), 12, 12),
        Err(PipelineError::UnknownCity(_))
    ));
    assert!(matches!(
        build_map_view(&provider, "Chicago", date(2024, 2, 10), 12, 12),
        Err(PipelineError::DataSource(DataSourceError::InvalidValue { .. }))
    ));
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "dublin.csv",
        &["Smithfield,53.3497,-6.2782,2024-02-05,8,41,Very Intense"],
    );
    let config_path = dir.path().join("dashboard.toml");
    fs::write(
        &config_path,
        format!(
            "data_dir = {:?}\n\n[[cities]]\nname = \"Dublin\"\nfile = \"dublin.csv\"\n",
            dir.path().display().to_string()
        ),
    )
    .unwrap();

    let config = DashboardConfig::load_from_file(&config_path).unwrap();
    let provider = FileDatasetProvider::new(config.registry().unwrap());
    let selection =
        build_map_view(&provider, "Dublin", date(2024, 2, 5), 8, config.zoom_start).unwrap();
    assert_eq!(selection.map_view().unwrap().markers.len(), 1);
}

fn station_batch(date_column: (DataType, Arc<dyn arrow_array::Array>)) -> RecordBatch {
    let (date_type, dates) = date_column;
    let schema = Arc::new(Schema::new(vec![
        Field::new("STATION_NAME", DataType::Utf8, false),
        Field::new("LATITUDE", DataType::Float64, false),
        Field::new("LONGITUDE", DataType::Float64, false),
        Field::new("ACTIVITY_DATE", date_type, false),
        Field::new("ACTIVITY_HOUR", DataType::Int64, false),
        Field::new("TOTAL_ACTIVITY", DataType::Int64, false),
        Field::new("DENSITY_CATEGORY", DataType::Utf8, false),
    ]));

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec!["Smithfield", "Heuston Station"])),
            Arc::new(Float64Array::from(vec![53.3497, 53.3466])),
            Arc::new(Float64Array::from(vec![-6.2782, -6.2920])),
            dates,
            Arc::new(Int64Array::from(vec![8, 8])),
            Arc::new(Int64Array::from(vec![41, 17])),
            Arc::new(StringArray::from(vec!["Very Intense", "Normal"])),
        ],
    )
    .unwrap()
}

#[test]
fn test_parquet_source_with_timestamp_dates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dublin.parquet");

    let nanos: Vec<i64> = [(0, 0, 0), (13, 30, 0)]
        .iter()
        .map(|&(h, m, s)| {
            date(2024, 2, 5)
                .and_hms_opt(h, m, s)
                .unwrap()
                .and_utc()
                .timestamp_nanos_opt()
                .unwrap()
        })
        .collect();
    let batch = station_batch((
        DataType::Timestamp(TimeUnit::Nanosecond, None),
        Arc::new(TimestampNanosecondArray::from(nanos)),
    ));

    let file = File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let mut registry = CityRegistry::new();
    registry.register("Dublin", &path).unwrap();
    let provider = FileDatasetProvider::new(registry);

    let dataset = provider.load("Dublin").unwrap();
    assert_eq!(dataset.len(), 2);
    assert!(
        dataset
            .records
            .iter()
            .all(|r| r.activity_date == date(2024, 2, 5))
    );
    assert_eq!(select(&dataset, date(2024, 2, 5), 8).len(), 2);
}

#[test]
fn test_batch_with_date32_column() {
    let epoch = date(1970, 1, 1);
    let days = (date(2024, 2, 5) - epoch).num_days() as i32;
    let batch = station_batch((
        DataType::Date32,
        Arc::new(Date32Array::from(vec![days, days + 1])),
    ));

    let records = records_from_batch(&batch, Path::new("memory")).unwrap();
    assert_eq!(records[0].activity_date, date(2024, 2, 5));
    assert_eq!(records[1].activity_date, date(2024, 2, 6));
    assert_eq!(records[1].total_activity, 17);
    assert_eq!(records[0].density, DensityCategory::VeryIntense);
}

#[test]
fn test_parquet_missing_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.parquet");

    let schema = Arc::new(Schema::new(vec![Field::new(
        "STATION_NAME",
        DataType::Utf8,
        false,
    )]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(StringArray::from(vec!["Smithfield"]))],
    )
    .unwrap();
    let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let mut registry = CityRegistry::new();
    registry.register("Dublin", &path).unwrap();
    let provider = FileDatasetProvider::new(registry);

    match provider.load("Dublin") {
        Err(PipelineError::DataSource(DataSourceError::MissingColumn { column, .. })) => {
            assert_eq!(column, "LATITUDE")
        }
        other => panic!("expected MissingColumn, got {other:?}"),
    }
}

#[test]
fn test_parquet_source_with_dictionary_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("categorical.parquet");

    let dictionary = || DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8));
    let schema = Arc::new(Schema::new(vec![
        Field::new("STATION_NAME", dictionary(), false),
        Field::new("LATITUDE", DataType::Float64, false),
        Field::new("LONGITUDE", DataType::Float64, false),
        Field::new("ACTIVITY_DATE", DataType::Utf8, false),
        Field::new("ACTIVITY_HOUR", DataType::Int64, false),
        Field::new("TOTAL_ACTIVITY", DataType::Int64, false),
        Field::new("DENSITY_CATEGORY", dictionary(), false),
    ]));
    let stations: DictionaryArray<Int32Type> =
        vec!["Smithfield", "Heuston Station", "Smithfield"].into_iter().collect();
    let categories: DictionaryArray<Int32Type> =
        vec!["Very Intense", "Sparse", "Very Intense"].into_iter().collect();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(stations),
            Arc::new(Float64Array::from(vec![53.3497, 53.3466, 53.3497])),
            Arc::new(Float64Array::from(vec![-6.2782, -6.2920, -6.2782])),
            Arc::new(StringArray::from(vec!["2024-02-05", "2024-02-05", "2024-02-06"])),
            Arc::new(Int64Array::from(vec![8, 8, 8])),
            Arc::new(Int64Array::from(vec![41, 3, 30])),
            Arc::new(categories),
        ],
    )
    .unwrap();

    let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let mut registry = CityRegistry::new();
    registry.register("Dublin", &path).unwrap();
    let provider = FileDatasetProvider::new(registry);

    let dataset = provider.load("Dublin").unwrap();
    assert_eq!(dataset.len(), 3);
    assert_eq!(dataset.records[1].station_name, "Heuston Station");
    assert_eq!(dataset.records[2].density, DensityCategory::VeryIntense);

    let view = build_map_view(&provider, "Dublin", date(2024, 2, 5), 8, 12).unwrap();
    let colors: Vec<MarkerColor> = view.map_view().unwrap().markers.iter().map(|m| m.color).collect();
    assert_eq!(colors, vec![MarkerColor::Red, MarkerColor::Green]);
}

#[test]
fn test_parquet_unsupported_column_type() {
    let batch = station_batch((
        DataType::Boolean,
        Arc::new(arrow_array::BooleanArray::from(vec![true, false])),
    ));

    match records_from_batch(&batch, Path::new("memory")) {
        Err(DataSourceError::UnsupportedType {
            row,
            column,
            data_type,
            ..
        }) => {
            assert_eq!(row, 1);
            assert_eq!(column, "ACTIVITY_DATE");
            assert_eq!(data_type, "Boolean");
        }
        other => panic!("expected UnsupportedType, got {other:?}"),
    }
}
