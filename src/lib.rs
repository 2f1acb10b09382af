pub mod config;
pub mod error;
pub mod load;
pub mod provider;
pub mod structs;
pub mod style;
pub mod transform;

// Re-export public API
pub use config::{CityRegistry, CitySource, DashboardConfig, DateWindow};
pub use error::{DataSourceError, PipelineError, Result};
pub use load::{write_csv, write_json, write_map_view, write_parquet};
pub use provider::{DatasetProvider, FileDatasetProvider, read_records, records_from_batch};
pub use structs::{
    Dataset, DensityCategory, LatLon, MapView, Marker, MarkerColor, OutputFormat, Selection,
    SimpleLogger, StationRecord,
};
pub use style::color_for;
pub use transform::{
    available_dates, available_hours, build_map_view, date_span, format_hour, map_view,
    popup_text, select,
};
