mod commands;
mod garmin;
mod output;
mod source;

use clap::{Parser, Subcommand};
use commands::generate::{GenerateRequest, generate_command};
use hikemap::{DateRange, TripConfig, parse_date, parse_utc_offset};
use source::SourceType;
use std::error::Error;
use std::path::PathBuf;
use time::{Date, UtcOffset};

#[derive(Parser)]
#[command(
    name = "hikemap",
    about = "Split a GPS tracker feed into per-day trip maps"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Generate the trips/ index and per-day JSON files from a feed")]
    Generate {
        /// Vendor format of the feed
        #[arg(long, value_enum, default_value_t = SourceType::Garmin)]
        source_type: SourceType,

        /// Feed URL, or a path to a saved feed
        #[arg(long)]
        source: String,

        /// Feed password, sent as HTTP basic auth
        #[arg(long, env = "HIKEMAP_FEED_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// First day to include, MM/DD/YYYY
        #[arg(long, value_parser = parse_date)]
        start_date: Option<Date>,

        /// Last day to include, MM/DD/YYYY
        #[arg(long, value_parser = parse_date)]
        end_date: Option<Date>,

        /// Shown alongside the "All" entry of the index
        #[arg(long)]
        trip_name: Option<String>,

        #[arg(long, default_value = "trips")]
        output_dir: PathBuf,

        /// Offset used to decide which calendar day a waypoint falls on, e.g. -07:00
        #[arg(
            long,
            value_parser = parse_utc_offset,
            default_value = "+00:00",
            allow_hyphen_values = true
        )]
        utc_offset: UtcOffset,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Commands::Generate {
            source_type,
            source,
            password,
            start_date,
            end_date,
            trip_name,
            output_dir,
            utc_offset,
        } => {
            let config = TripConfig {
                output_dir,
                utc_offset,
                ..TripConfig::default()
            };
            let request = GenerateRequest {
                locator: &source,
                credential: password.as_deref(),
                range: DateRange::from_dates(start_date, end_date, utc_offset)?,
                trip_name: trip_name.as_deref(),
            };
            generate_command(source_type.loader().as_ref(), &request, &config)
        }
    }
}
