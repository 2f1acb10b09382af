use crate::config::CityRegistry;
use crate::error::{DataSourceError, Result};
use crate::structs::{Dataset, DensityCategory, StationRecord};
use arrow_array::types::{
    ArrowTimestampType, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType,
};
use arrow_array::{
    Array, ArrayRef, Date32Array, Date64Array, Float32Array, Float64Array, Int8Array, Int16Array,
    Int32Array, Int64Array, LargeStringArray, PrimitiveArray, RecordBatch, StringArray,
    UInt8Array, UInt16Array, UInt32Array, UInt64Array,
};
use arrow_cast::cast::cast;
use arrow_schema::{DataType, TimeUnit};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, Trim};
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{fs::File, path::Path};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

pub const STATION_NAME: &str = "STATION_NAME";
pub const LATITUDE: &str = "LATITUDE";
pub const LONGITUDE: &str = "LONGITUDE";
pub const ACTIVITY_DATE: &str = "ACTIVITY_DATE";
pub const ACTIVITY_HOUR: &str = "ACTIVITY_HOUR";
pub const TOTAL_ACTIVITY: &str = "TOTAL_ACTIVITY";
pub const DENSITY_CATEGORY: &str = "DENSITY_CATEGORY";

/// Source columns in the order `build_record` expects them.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    STATION_NAME,
    LATITUDE,
    LONGITUDE,
    ACTIVITY_DATE,
    ACTIVITY_HOUR,
    TOTAL_ACTIVITY,
    DENSITY_CATEGORY,
];

/// Loads a city's station observations.
pub trait DatasetProvider {
    /// # Errors
    /// `UnknownCity` for unregistered names, `DataSource` for unreadable or malformed files.
    fn load(&self, city: &str) -> Result<Dataset>;
}

/// Reads city datasets from the CSV or Parquet files named in a [`CityRegistry`].
#[derive(Debug, Clone)]
pub struct FileDatasetProvider {
    registry: CityRegistry,
}

impl FileDatasetProvider {
    pub fn new(registry: CityRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CityRegistry {
        &self.registry
    }
}

impl DatasetProvider for FileDatasetProvider {
    fn load(&self, city: &str) -> Result<Dataset> {
        let path = self.registry.resolve(city)?;
        debug!("Loading {} from {}", city, path.display());
        let records = read_records(path)?;
        debug!("Loaded {} records for {}", records.len(), city);
        Ok(Dataset::new(city, records))
    }
}

/// Reads and validates every row of a source file, picking the format by extension.
///
/// # Errors
/// Returns `DataSourceError` on the first unreadable, missing, or invalid value.
pub fn read_records(path: &Path) -> std::result::Result<Vec<StationRecord>, DataSourceError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("csv") => read_csv(path),
        Some("parquet") => read_parquet(path),
        _ => Err(DataSourceError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// A single source value before validation.
#[derive(Debug, Clone, Default, PartialEq)]
enum Cell {
    #[default]
    Null,
    Text(String),
    Float(f64),
    Int(i64),
    Date(NaiveDate),
}

impl Cell {
    fn describe(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Float(f) => f.to_string(),
            Cell::Int(i) => i.to_string(),
            Cell::Date(d) => d.to_string(),
        }
    }
}

/// Position of a row inside its source, used to build error messages.
struct RowContext<'a> {
    path: &'a Path,
    row: usize,
}

impl RowContext<'_> {
    fn invalid(&self, column: &str, cell: &Cell, reason: impl Into<String>) -> DataSourceError {
        DataSourceError::InvalidValue {
            path: self.path.to_path_buf(),
            row: self.row,
            column: column.to_string(),
            value: cell.describe(),
            reason: reason.into(),
        }
    }

    fn null(&self, column: &str) -> DataSourceError {
        DataSourceError::NullValue {
            path: self.path.to_path_buf(),
            row: self.row,
            column: column.to_string(),
        }
    }

    fn text(&self, column: &str, cell: Cell) -> std::result::Result<String, DataSourceError> {
        match cell {
            Cell::Null => Err(self.null(column)),
            Cell::Text(s) => Ok(s),
            other => Err(self.invalid(column, &other, "expected text")),
        }
    }

    fn coordinate(
        &self,
        column: &str,
        cell: Cell,
        limit: f64,
    ) -> std::result::Result<f64, DataSourceError> {
        let value = match &cell {
            Cell::Null => return Err(self.null(column)),
            Cell::Float(f) => *f,
            Cell::Int(i) => *i as f64,
            Cell::Text(s) => s
                .parse::<f64>()
                .map_err(|_| self.invalid(column, &cell, "not a decimal number"))?,
            Cell::Date(_) => return Err(self.invalid(column, &cell, "expected a number")),
        };
        if !value.is_finite() || !(-limit..=limit).contains(&value) {
            return Err(self.invalid(
                column,
                &cell,
                format!("must lie within [-{limit}, {limit}]"),
            ));
        }
        Ok(value)
    }

    fn date(&self, column: &str, cell: Cell) -> std::result::Result<NaiveDate, DataSourceError> {
        match &cell {
            Cell::Null => Err(self.null(column)),
            Cell::Date(d) => Ok(*d),
            Cell::Text(s) => {
                normalize_date(s).ok_or_else(|| self.invalid(column, &cell, "not a calendar date"))
            }
            _ => Err(self.invalid(column, &cell, "expected a date")),
        }
    }

    fn whole_number(&self, column: &str, cell: &Cell) -> std::result::Result<i64, DataSourceError> {
        let parsed = match cell {
            Cell::Null => return Err(self.null(column)),
            Cell::Int(i) => Ok(*i),
            Cell::Float(f) => whole_from_f64(*f),
            Cell::Text(s) => parse_whole_number(s),
            Cell::Date(_) => Err("expected an integer".to_string()),
        };
        parsed.map_err(|reason| self.invalid(column, cell, reason))
    }

    /// Validates one row. `cells` follows the order of [`REQUIRED_COLUMNS`].
    fn build_record(&self, cells: [Cell; 7]) -> std::result::Result<StationRecord, DataSourceError> {
        let [name, lat, lon, date, hour, total, category] = cells;

        let station_name = self.text(STATION_NAME, name)?;
        let latitude = self.coordinate(LATITUDE, lat, 90.0)?;
        let longitude = self.coordinate(LONGITUDE, lon, 180.0)?;
        let activity_date = self.date(ACTIVITY_DATE, date)?;

        let activity_hour = u8::try_from(self.whole_number(ACTIVITY_HOUR, &hour)?)
            .ok()
            .filter(|h| *h <= 23)
            .ok_or_else(|| self.invalid(ACTIVITY_HOUR, &hour, "hour must lie within [0, 23]"))?;

        let total_activity = u32::try_from(self.whole_number(TOTAL_ACTIVITY, &total)?)
            .map_err(|_| self.invalid(TOTAL_ACTIVITY, &total, "must be a non-negative count"))?;

        Ok(StationRecord {
            station_name,
            latitude,
            longitude,
            activity_date,
            activity_hour,
            total_activity,
            density: density(category),
        })
    }
}

/// Blank or null labels are kept as an unknown category rather than failing the row.
fn density(cell: Cell) -> DensityCategory {
    match cell {
        Cell::Null => DensityCategory::Unknown(String::new()),
        Cell::Text(label) => DensityCategory::from_label(&label),
        other => DensityCategory::Unknown(other.describe()),
    }
}

/// Parses a date column value and drops any time-of-day component.
///
/// Accepts plain ISO dates, ISO date-times with a space or `T` separator
/// (fractional seconds optional) and RFC 3339 timestamps.
pub fn normalize_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
        return Some(date);
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime.date());
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|datetime| datetime.date_naive())
}

/// Parses integer text, also accepting whole-valued decimals such as `"8.0"`.
pub fn parse_whole_number(text: &str) -> std::result::Result<i64, String> {
    let text = text.trim();
    if let Ok(value) = text.parse::<i64>() {
        return Ok(value);
    }
    let value = text
        .parse::<f64>()
        .map_err(|_| "not an integer".to_string())?;
    whole_from_f64(value)
}

fn whole_from_f64(value: f64) -> std::result::Result<i64, String> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Ok(value as i64)
    } else {
        Err("not a whole number".to_string())
    }
}

fn read_csv(path: &Path) -> std::result::Result<Vec<StationRecord>, DataSourceError> {
    let csv_error = |source| DataSourceError::Csv {
        path: path.to_path_buf(),
        source,
    };

    debug!("Reading CSV file: {}", path.display());
    let file = File::open(path).map_err(|source| DataSourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(file);
    let headers = reader.headers().map_err(csv_error)?.clone();

    let mut indices = [0usize; 7];
    for (slot, column) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| DataSourceError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            })?;
    }

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let row = result.map_err(csv_error)?;
        let context = RowContext { path, row: i + 1 };
        let cells = indices.map(|idx| match row.get(idx) {
            None | Some("") => Cell::Null,
            Some(value) => Cell::Text(value.to_string()),
        });
        records.push(context.build_record(cells)?);
    }

    debug!("Parsed {} CSV rows from {}", records.len(), path.display());
    Ok(records)
}

fn read_parquet(path: &Path) -> std::result::Result<Vec<StationRecord>, DataSourceError> {
    let parquet_error = |source| DataSourceError::Parquet {
        path: path.to_path_buf(),
        source,
    };

    debug!("Reading Parquet file: {}", path.display());
    let file = File::open(path).map_err(|source| DataSourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(parquet_error)?;
    for column in REQUIRED_COLUMNS {
        if builder.schema().field_with_name(column).is_err() {
            return Err(DataSourceError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }
    let reader = builder.build().map_err(parquet_error)?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result.map_err(|source| DataSourceError::Arrow {
            path: path.to_path_buf(),
            source,
        })?;
        records.extend(batch_records(&batch, path, records.len())?);
    }

    debug!("Parsed {} Parquet rows from {}", records.len(), path.display());
    Ok(records)
}

fn downcast<'a, T: 'static>(array: &'a dyn Array) -> std::result::Result<&'a T, String> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| array.data_type().to_string())
}

/// Reads one Arrow value as a [`Cell`]. Text is trimmed the same way CSV fields are.
///
/// Values that cannot be converted (out-of-range dates, oversized unsigned
/// integers) are passed on raw so validation reports them with their value.
///
/// # Errors
/// Returns the column's type name for types that cannot hold station data.
fn cell_at(array: &dyn Array, i: usize) -> std::result::Result<Cell, String> {
    if array.is_null(i) {
        return Ok(Cell::Null);
    }

    let cell = match array.data_type() {
        DataType::Utf8 => text_cell(downcast::<StringArray>(array)?.value(i)),
        DataType::LargeUtf8 => text_cell(downcast::<LargeStringArray>(array)?.value(i)),
        DataType::Float64 => Cell::Float(downcast::<Float64Array>(array)?.value(i)),
        DataType::Float32 => Cell::Float(downcast::<Float32Array>(array)?.value(i) as f64),
        DataType::Int64 => Cell::Int(downcast::<Int64Array>(array)?.value(i)),
        DataType::Int32 => Cell::Int(downcast::<Int32Array>(array)?.value(i) as i64),
        DataType::Int16 => Cell::Int(downcast::<Int16Array>(array)?.value(i) as i64),
        DataType::Int8 => Cell::Int(downcast::<Int8Array>(array)?.value(i) as i64),
        DataType::UInt64 => {
            let value = downcast::<UInt64Array>(array)?.value(i);
            i64::try_from(value).map_or(Cell::Float(value as f64), Cell::Int)
        }
        DataType::UInt32 => Cell::Int(downcast::<UInt32Array>(array)?.value(i) as i64),
        DataType::UInt16 => Cell::Int(downcast::<UInt16Array>(array)?.value(i) as i64),
        DataType::UInt8 => Cell::Int(downcast::<UInt8Array>(array)?.value(i) as i64),
        DataType::Date32 => {
            let values = downcast::<Date32Array>(array)?;
            date_cell(values.value_as_date(i), values.value(i) as i64)
        }
        DataType::Date64 => {
            let values = downcast::<Date64Array>(array)?;
            date_cell(values.value_as_date(i), values.value(i))
        }
        DataType::Timestamp(unit, _) => match unit {
            TimeUnit::Second => timestamp_cell::<TimestampSecondType>(array, i)?,
            TimeUnit::Millisecond => timestamp_cell::<TimestampMillisecondType>(array, i)?,
            TimeUnit::Microsecond => timestamp_cell::<TimestampMicrosecondType>(array, i)?,
            TimeUnit::Nanosecond => timestamp_cell::<TimestampNanosecondType>(array, i)?,
        },
        other => return Err(other.to_string()),
    };
    Ok(cell)
}

fn text_cell(value: &str) -> Cell {
    Cell::Text(value.trim().to_string())
}

fn timestamp_cell<T: ArrowTimestampType>(
    array: &dyn Array,
    i: usize,
) -> std::result::Result<Cell, String> {
    let values = downcast::<PrimitiveArray<T>>(array)?;
    Ok(date_cell(
        values.value_as_datetime(i).map(|dt| dt.date()),
        values.value(i),
    ))
}

fn date_cell(date: Option<NaiveDate>, raw: i64) -> Cell {
    date.map_or(Cell::Int(raw), Cell::Date)
}

/// Unpacks dictionary-encoded columns (pandas categoricals) into plain arrays.
fn decode_column(column: &ArrayRef, origin: &Path) -> std::result::Result<ArrayRef, DataSourceError> {
    match column.data_type() {
        DataType::Dictionary(_, value_type) => {
            cast(column.as_ref(), value_type.as_ref()).map_err(|source| DataSourceError::Arrow {
                path: origin.to_path_buf(),
                source,
            })
        }
        _ => Ok(column.clone()),
    }
}

/// Validates a batch already held in memory, e.g. one produced by another Arrow pipeline.
///
/// # Errors
/// Returns `DataSourceError` for missing columns or invalid values; `origin` names the source in messages.
pub fn records_from_batch(
    batch: &RecordBatch,
    origin: &Path,
) -> std::result::Result<Vec<StationRecord>, DataSourceError> {
    batch_records(batch, origin, 0)
}

/// `rows_before` is the number of rows already read from earlier batches of the same source.
fn batch_records(
    batch: &RecordBatch,
    origin: &Path,
    rows_before: usize,
) -> std::result::Result<Vec<StationRecord>, DataSourceError> {
    let mut columns = Vec::with_capacity(REQUIRED_COLUMNS.len());
    for name in REQUIRED_COLUMNS {
        let column = batch
            .column_by_name(name)
            .ok_or_else(|| DataSourceError::MissingColumn {
                path: origin.to_path_buf(),
                column: name.to_string(),
            })?;
        columns.push(decode_column(column, origin)?);
    }

    let mut records = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let context = RowContext {
            path: origin,
            row: rows_before + i + 1,
        };
        let mut cells: [Cell; 7] = Default::default();
        for ((cell, column), name) in cells.iter_mut().zip(&columns).zip(REQUIRED_COLUMNS) {
            *cell = cell_at(column.as_ref(), i).map_err(|data_type| {
                DataSourceError::UnsupportedType {
                    path: origin.to_path_buf(),
                    row: context.row,
                    column: name.to_string(),
                    data_type,
                }
            })?;
        }
        records.push(context.build_record(cells)?);
    }
    Ok(records)
}
