use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use csv2gpx::converter::{print_batch_summary, print_conversion_summary};
use csv2gpx::series_export::write_series_csv;
use csv2gpx::{CoordinateCheck, Converter, ConverterConfig, OutputNaming};

/// Convert a semicolon key/value telemetry log into GPX tracks
#[derive(Parser, Debug)]
#[command(name = "rust-csv2gpx", version, about)]
struct Cli {
    /// Telemetry log (.csv), or a folder of logs (also accepted as -if)
    #[arg(long = "inputfile")]
    inputfile: PathBuf,

    /// Output GPX file, or output folder when converting a folder (also -of)
    #[arg(long = "outputfile")]
    outputfile: Option<PathBuf>,

    /// TOML file with converter settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip barometric altitude correction
    #[arg(long)]
    no_correction: bool,

    /// Do not write the environment extension block
    #[arg(long)]
    no_extensions: bool,

    /// Write one document per device instead of one shared path
    #[arg(long)]
    per_device_output: bool,

    /// Accept fixes on the equator when the longitude is valid
    #[arg(long)]
    check_longitude: bool,

    /// Write raw vs corrected altitude series to this CSV file
    #[arg(long)]
    series_csv: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

// clap has no two-letter short flags; map the legacy -if / -of spellings.
fn normalize_legacy_flags(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some("-if") => OsString::from("--inputfile"),
            Some("-of") => OsString::from("--outputfile"),
            _ => arg,
        })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse_from(normalize_legacy_flags(std::env::args_os()));

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();

    let mut config = match &cli.config {
        Some(path) => ConverterConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ConverterConfig::default(),
    };
    if cli.no_correction {
        config.altitude_correction = false;
    }
    if cli.no_extensions {
        config.environment_extensions = false;
    }
    if cli.per_device_output {
        config.output_naming = OutputNaming::PerDevice;
    }
    if cli.check_longitude {
        config.coordinate_check = CoordinateCheck::Either;
    }

    let converter = Converter::new(config)?;

    if cli.inputfile.is_dir() {
        if cli.series_csv.is_some() {
            bail!("--series-csv needs a single input file");
        }
        let batch = converter
            .convert_directory(&cli.inputfile, cli.outputfile.as_deref())
            .with_context(|| format!("converting folder {}", cli.inputfile.display()))?;
        print_batch_summary(&batch);
        if !batch.failed.is_empty() {
            bail!("{} of {} logs failed", batch.failed.len(), batch.failed.len() + batch.converted.len());
        }
        return Ok(());
    }

    let conversion = converter
        .convert_file(&cli.inputfile, cli.outputfile.as_deref())
        .with_context(|| format!("converting {}", cli.inputfile.display()))?;

    if let Some(path) = &cli.series_csv {
        let rows = conversion.series_rows();
        write_series_csv(path, &rows)
            .with_context(|| format!("writing altitude series {}", path.display()))?;
        info!(rows = rows.len(), output = %path.display(), "altitude series written");
    }

    print_conversion_summary(&conversion.summary);
    Ok(())
}
