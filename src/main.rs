use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use lib::{
    DashboardConfig, DatasetProvider, FileDatasetProvider, OutputFormat, PipelineError,
    Selection, SimpleLogger, available_hours, build_map_view, date_span, format_hour, map_view,
    select, write_map_view,
};
use log::{debug, info};
use std::path::PathBuf;
use std::time::Instant;

static LOGGER: SimpleLogger = SimpleLogger;

const NO_DATA: &str = "No data available for the selected date and hour.";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML file with the city registry (uses the built-in cities if omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the city data files (overrides data_dir from the config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level for output
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the selectable cities
    Cities,
    /// List the hours with recorded activity for a city and date
    Hours {
        #[arg(short, long)]
        city: String,

        /// Date as YYYY-MM-DD
        #[arg(short, long)]
        date: NaiveDate,
    },
    /// Render station markers for a city, date and hour
    Show {
        #[arg(short, long)]
        city: String,

        /// Date as YYYY-MM-DD (defaults to the first day of the date window)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Hour of day, 0-23 (defaults to the first hour with activity)
        #[arg(long)]
        hour: Option<u8>,

        /// Write the map view to this file instead of printing JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Format of the output file
        #[arg(long, default_value = "json", requires = "output")]
        format: OutputFormat,
    },
}

fn main() -> Result<(), PipelineError> {
    let total_start = Instant::now();
    log::set_logger(&LOGGER).map_err(|e| PipelineError::Config(e.to_string()))?;

    let args = Args::parse();
    if args.debug {
        log::set_max_level(log::LevelFilter::Debug);
    } else {
        log::set_max_level(log::LevelFilter::Info);
    }

    let mut config = match &args.config {
        Some(path) => DashboardConfig::load_from_file(path)?,
        None => DashboardConfig::default(),
    };
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    debug!(
        "Data dir: {} | Cities: {} | Zoom: {}",
        config.data_dir.display(),
        config.cities.len(),
        config.zoom_start
    );
    let provider = FileDatasetProvider::new(config.registry()?);

    match args.command {
        Command::Cities => {
            for city in provider.registry().cities() {
                println!("{}", city);
            }
        }
        Command::Hours { city, date } => {
            config.check_date(date)?;
            let dataset = provider.load(&city)?;
            if let Some((first, last)) = date_span(&dataset) {
                debug!("{} has data from {} to {}", city, first, last);
            }
            let hours = available_hours(&dataset, date);
            if hours.is_empty() {
                println!("{}", NO_DATA);
            }
            for hour in hours {
                println!("{}", format_hour(hour));
            }
        }
        Command::Show {
            city,
            date,
            hour,
            output,
            format,
        } => {
            let date = match date.or_else(|| config.default_date()) {
                Some(date) => date,
                None => {
                    return Err(PipelineError::Config(
                        "no --date given and no date window configured".to_string(),
                    ));
                }
            };
            config.check_date(date)?;

            let selection = match hour {
                Some(hour) => build_map_view(&provider, &city, date, hour, config.zoom_start)?,
                None => {
                    // mirror the hour picker: preselect the first hour with activity
                    let dataset = provider.load(&city)?;
                    match available_hours(&dataset, date).first() {
                        Some(&hour) => {
                            debug!("No --hour given, using {}", format_hour(hour));
                            map_view(&select(&dataset, date, hour), config.zoom_start)
                        }
                        None => Selection::Empty,
                    }
                }
            };

            match selection {
                Selection::Empty => println!("{}", NO_DATA),
                Selection::Markers(view) => match output {
                    Some(path) => {
                        let io_start = Instant::now();
                        write_map_view(&view, &path, format)?;
                        info!(
                            "Wrote {} markers to {} in {:.2?}",
                            view.markers.len(),
                            path.display(),
                            io_start.elapsed()
                        );
                    }
                    None => println!("{}", serde_json::to_string_pretty(&view)?),
                },
            }
        }
    }

    debug!("Completed in {:.2?}", total_start.elapsed());
    Ok(())
}
