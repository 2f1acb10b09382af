use arrow_schema::ArrowError;
use chrono::NaiveDate;
use std::path::PathBuf;

/// Failures while reading one city's source file.
#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("I/O Error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV Error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Parquet Error in {path}: {source}")]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },
    #[error("Arrow Error in {path}: {source}")]
    Arrow {
        path: PathBuf,
        #[source]
        source: ArrowError,
    },
    #[error("{path}: required column {column} not found")]
    MissingColumn { path: PathBuf, column: String },
    #[error("{path}: row {row}, column {column}: invalid value {value:?} ({reason})")]
    InvalidValue {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
        reason: String,
    },
    #[error("{path}: row {row}, column {column}: value is null")]
    NullValue {
        path: PathBuf,
        row: usize,
        column: String,
    },
    #[error("{path}: row {row}, column {column}: unsupported column type {data_type}")]
    UnsupportedType {
        path: PathBuf,
        row: usize,
        column: String,
        data_type: String,
    },
    #[error("{path}: unsupported source format (expected .csv or .parquet)")]
    UnsupportedFormat { path: PathBuf },
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Unknown city: {0}")]
    UnknownCity(String),
    #[error("Data Source Error: {0}")]
    DataSource(#[from] DataSourceError),
    #[error("Config Error: {0}")]
    Config(String),
    #[error("TOML Error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Date {date} is outside the selectable range {start} to {end}")]
    DateOutOfRange {
        date: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parquet Error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow Error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
