//! `demfill` command-line interface.

use clap::{Args, Parser, Subcommand};
use demfill_runner::{inspect, run_http, ConfigOverrides, RunConfig, RunError};
use demfill_tiles::CancelToken;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Download GSI elevation tiles into a gap-filled GeoTIFF")]
struct Cli {
    /// Log level used when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a bounding box, fill gaps and write a GeoTIFF
    Fetch(FetchArgs),

    /// Print size, bounds and statistics of a GeoTIFF
    Inspect {
        /// GeoTIFF to describe
        path: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// YAML run configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// North edge in degrees
    #[arg(long, allow_negative_numbers = true)]
    north: Option<f64>,

    /// South edge in degrees
    #[arg(long, allow_negative_numbers = true)]
    south: Option<f64>,

    /// East edge in degrees
    #[arg(long, allow_negative_numbers = true)]
    east: Option<f64>,

    /// West edge in degrees
    #[arg(long, allow_negative_numbers = true)]
    west: Option<f64>,

    /// Output GeoTIFF path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Primary zoom level [default: 15]
    #[arg(long)]
    zoom: Option<u8>,

    /// Fallback zoom level [default: 14]
    #[arg(long)]
    fallback_zoom: Option<u8>,

    /// Skip the fallback layer and leave gaps as no-data
    #[arg(long)]
    no_fill: bool,

    /// No-data value [default: -9999]
    #[arg(long, allow_negative_numbers = true)]
    nodata: Option<f32>,

    /// Concurrent tile requests (1-64) [default: 8]
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-request timeout in seconds [default: 10]
    #[arg(long)]
    timeout: Option<f64>,

    /// Whole-run deadline in seconds
    #[arg(long)]
    run_timeout: Option<f64>,

    /// Retries per source for timeouts, connection errors and 5xx responses [default: 0]
    #[arg(long)]
    retries: Option<u32>,

    /// HTTP User-Agent header
    #[arg(long)]
    user_agent: Option<String>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

impl FetchArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            north: self.north,
            south: self.south,
            east: self.east,
            west: self.west,
            output: self.output.clone(),
            zoom: self.zoom,
            fallback_zoom: self.fallback_zoom,
            no_fill: self.no_fill,
            nodata: self.nodata,
            concurrency: self.concurrency,
            tile_timeout_secs: self.timeout,
            run_timeout_secs: self.run_timeout,
            retries: self.retries,
            user_agent: self.user_agent.clone(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Fetch(args) => fetch(&args),
        Command::Inspect { path, json } => {
            inspect(&path).and_then(|report| print_report(&report, json))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if e.is_cancellation() {
                ExitCode::from(130)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn fetch(args: &FetchArgs) -> Result<(), RunError> {
    let base = args.config.as_deref().map(RunConfig::load).transpose()?;
    let config = RunConfig::resolve(base, args.overrides())?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Interrupted, cancelling run");
        handler_token.cancel();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let summary = run_http(&config, cancel)?;
    print_report(&summary, args.json)
}

fn print_report<T: Serialize + std::fmt::Display>(report: &T, json: bool) -> Result<(), RunError> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
