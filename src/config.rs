use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_ZOOM: u8 = 12;

/// Dashboard configuration: where the city files live and how the pickers are bounded.
///
/// Deserialized from TOML. `Default` yields the built-in three-city registry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_zoom")]
    pub zoom_start: u8,
    #[serde(default)]
    pub date_window: Option<DateWindow>,
    pub cities: Vec<CitySource>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CitySource {
    pub name: String,
    pub file: PathBuf,
}

/// Inclusive range of dates the date picker offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start..=self.end).contains(&date)
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_zoom() -> u8 {
    DEFAULT_ZOOM
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let city = |name: &str, file: &str| CitySource {
            name: name.to_string(),
            file: PathBuf::from(file),
        };
        Self {
            data_dir: default_data_dir(),
            zoom_start: DEFAULT_ZOOM,
            date_window: NaiveDate::from_ymd_opt(2024, 2, 1)
                .zip(NaiveDate::from_ymd_opt(2024, 2, 29))
                .map(|(start, end)| DateWindow { start, end }),
            cities: vec![
                city("New York", "citibike_top5_density.csv"),
                city("Dublin", "dublinbike_top5_density.csv"),
                city("Chicago", "divvy_top5_density.csv"),
            ],
        }
    }
}

impl DashboardConfig {
    /// Reads and validates a TOML configuration file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid TOML, or fails validation.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Reading config file: {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DashboardConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.cities.is_empty() {
            return Err(PipelineError::Config("no cities configured".to_string()));
        }
        if let Some(window) = &self.date_window {
            if window.start > window.end {
                return Err(PipelineError::Config(format!(
                    "date window start {} is after end {}",
                    window.start, window.end
                )));
            }
        }
        // duplicates are caught while building the registry
        self.registry().map(|_| ())
    }

    /// Builds the city registry, resolving relative files against `data_dir`.
    pub fn registry(&self) -> Result<CityRegistry> {
        let mut registry = CityRegistry::new();
        for city in &self.cities {
            registry.register(&city.name, self.data_dir.join(&city.file))?;
        }
        Ok(registry)
    }

    /// The date preselected in the date picker, if the window is bounded.
    pub fn default_date(&self) -> Option<NaiveDate> {
        self.date_window.map(|window| window.start)
    }

    /// # Errors
    /// Returns `DateOutOfRange` if a window is configured and `date` lies outside it.
    pub fn check_date(&self, date: NaiveDate) -> Result<()> {
        match self.date_window {
            Some(window) if !window.contains(date) => Err(PipelineError::DateOutOfRange {
                date,
                start: window.start,
                end: window.end,
            }),
            _ => Ok(()),
        }
    }
}

/// Ordered city name -> source file mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CityRegistry {
    entries: Vec<(String, PathBuf)>,
}

impl CityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns `Config` error if the city is already registered.
    pub fn register(&mut self, name: &str, path: impl Into<PathBuf>) -> Result<()> {
        if self.entries.iter().any(|(existing, _)| existing == name) {
            return Err(PipelineError::Config(format!(
                "city {name} registered twice"
            )));
        }
        self.entries.push((name.to_string(), path.into()));
        Ok(())
    }

    /// # Errors
    /// Returns `UnknownCity` if the name is not registered.
    pub fn resolve(&self, name: &str) -> Result<&Path> {
        self.entries
            .iter()
            .find(|(city, _)| city == name)
            .map(|(_, path)| path.as_path())
            .ok_or_else(|| PipelineError::UnknownCity(name.to_string()))
    }

    /// City names in registration order.
    pub fn cities(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(city, _)| city.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
