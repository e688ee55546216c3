//! Log to GPX conversion pipeline
//!
//! parse -> filter -> group runs over the whole log first; altitude correction
//! then runs per device, and only when every device has been corrected are
//! the documents written. A fatal error anywhere means nothing is written for
//! that log.
//!
//! `convert_directory` runs the same pipeline over every `.csv` file below a
//! folder, logging and counting failures instead of stopping.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::altitude_corrector::{AltitudeCorrector, AltitudeSeries};
use crate::config::{ConverterConfig, OutputNaming};
use crate::error::{ConvertError, Result};
use crate::gpx_writer::{build_document, write_document, DocumentOptions};
use crate::point_filter::PointFilter;
use crate::record_parser::parse_line;
use crate::series_export::{series_rows, SeriesRow};
use crate::track_grouper::{Track, TrackGrouper};

/// Tracks read from one log plus line accounting.
#[derive(Debug, Default)]
pub struct ParsedLog {
    pub tracks: Vec<Track>,
    pub lines: usize,
    pub blank_lines: usize,
    pub dropped_points: usize,
    pub ignored_keys: usize,
}

impl ParsedLog {
    pub fn admitted_points(&self) -> usize {
        self.tracks.iter().map(Track::len).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSummary {
    pub device_id: String,
    pub points: usize,
    pub corrected_points: usize,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSummary {
    pub input: PathBuf,
    pub lines: usize,
    pub admitted_points: usize,
    pub dropped_points: usize,
    pub ignored_keys: usize,
    pub devices: Vec<DeviceSummary>,
}

/// Everything a single-file conversion produced.
#[derive(Debug)]
pub struct Conversion {
    pub summary: ConversionSummary,
    pub tracks: Vec<Track>,
    pub series: Vec<AltitudeSeries>,
}

impl Conversion {
    /// Raw vs corrected altitude rows for every corrected device.
    pub fn series_rows(&self) -> Vec<SeriesRow> {
        self.series
            .iter()
            .filter_map(|s| {
                self.tracks
                    .iter()
                    .find(|t| t.device_id() == s.device_id)
                    .map(|t| series_rows(t, s))
            })
            .flatten()
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub converted: Vec<ConversionSummary>,
    pub failed: Vec<(PathBuf, String)>,
}

#[derive(Debug, Clone)]
pub struct Converter {
    config: ConverterConfig,
    filter: PointFilter,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Result<Self> {
        config.validate()?;
        let filter = PointFilter::new(&config);
        Ok(Converter { config, filter })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Parse every line, drop poor fixes and group the rest per device.
    pub fn read_tracks<R: BufRead>(&self, reader: R) -> Result<ParsedLog> {
        let mut grouper = TrackGrouper::new();
        let mut log = ParsedLog::default();

        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| ConvertError::io("<log>", e))?;
            log.lines += 1;
            if line.trim().is_empty() {
                debug!(line = index + 1, "blank line skipped");
                log.blank_lines += 1;
                continue;
            }

            let record = parse_line(index, &line)?;
            log.ignored_keys += record.ignored_keys;
            grouper.observe(&record.device_id);

            match self.filter.check(&record.point) {
                Ok(()) => grouper.push(&record.device_id, record.point),
                Err(reason) => {
                    debug!(line = index + 1, device = %record.device_id, ?reason, "point dropped");
                    log.dropped_points += 1;
                }
            }
        }

        log.tracks = grouper.into_tracks();
        Ok(log)
    }

    /// Run the altitude correction over every non-empty track. The first
    /// device without enough data aborts the whole log.
    pub fn correct_tracks(&self, tracks: &mut [Track]) -> Result<Vec<AltitudeSeries>> {
        if !self.config.altitude_correction {
            debug!("altitude correction disabled");
            return Ok(Vec::new());
        }
        let corrector = AltitudeCorrector::new(self.config.window_size);
        tracks
            .iter_mut()
            .filter(|t| !t.is_empty())
            .map(|t| corrector.correct(t))
            .collect()
    }

    pub fn render(&self, track: &Track) -> String {
        build_document(track, &DocumentOptions::from(&self.config))
    }

    /// Convert one log file. `output` defaults to the input path with a
    /// `.gpx` extension.
    pub fn convert_file(&self, input: &Path, output: Option<&Path>) -> Result<Conversion> {
        if !has_csv_extension(input) {
            warn!(
                input = %input.display(),
                "input file extension should be .csv or .CSV"
            );
        }
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_path(input));
        info!(input = %input.display(), output = %output.display(), "converting");

        let log = {
            let file = File::open(input).map_err(|e| ConvertError::io(input, e))?;
            self.read_tracks(BufReader::new(file)).map_err(|e| match e {
                ConvertError::Io { source, .. } => ConvertError::io(input, source),
                other => other,
            })?
        };

        let mut tracks = log.tracks;
        let series = self.correct_tracks(&mut tracks)?;

        let non_empty = tracks.iter().filter(|t| !t.is_empty()).count();
        if non_empty > 1 && self.config.output_naming == OutputNaming::Shared {
            warn!(
                devices = non_empty,
                output = %output.display(),
                "several devices share one output path, only the last one is kept"
            );
        }

        let paths = output_paths(&output, &tracks, self.config.output_naming);
        let mut devices = Vec::with_capacity(tracks.len());
        for (track, path) in tracks.iter().zip(paths) {
            let corrected_points = series
                .iter()
                .find(|s| s.device_id == track.device_id())
                .map_or(0, |s| s.samples.len());

            let written = match path {
                None => {
                    warn!(device = %track.device_id(), "no usable fixes, no document written");
                    None
                }
                Some(path) => {
                    write_document(&path, &self.render(track))?;
                    info!(
                        device = %track.device_id(),
                        points = track.len(),
                        corrected = corrected_points,
                        output = %path.display(),
                        "document written"
                    );
                    Some(path)
                }
            };

            devices.push(DeviceSummary {
                device_id: track.device_id().to_string(),
                points: track.len(),
                corrected_points,
                output: written,
            });
        }

        let summary = ConversionSummary {
            input: input.to_path_buf(),
            lines: log.lines,
            admitted_points: devices.iter().map(|d| d.points).sum(),
            dropped_points: log.dropped_points,
            ignored_keys: log.ignored_keys,
            devices,
        };

        Ok(Conversion {
            summary,
            tracks,
            series,
        })
    }

    /// Convert every `.csv` log below `input_dir`. Documents go next to their
    /// log, or into the same relative folder under `output_dir` when given.
    /// A log whose document path is already taken by an earlier log in the
    /// batch is counted as failed and not converted.
    pub fn convert_directory(&self, input_dir: &Path, output_dir: Option<&Path>) -> Result<BatchSummary> {
        if let Some(dir) = output_dir {
            fs::create_dir_all(dir).map_err(|e| ConvertError::io(dir, e))?;
        }

        let logs = collect_csv_files(input_dir)?;
        info!(folder = %input_dir.display(), files = logs.len(), "converting folder");

        let mut batch = BatchSummary::default();
        let mut claimed: HashSet<PathBuf> = HashSet::new();
        for (index, log_path) in logs.iter().enumerate() {
            info!(file = index + 1, of = logs.len(), input = %log_path.display(), "processing");
            let output = match output_dir {
                Some(dir) => {
                    let relative = log_path.strip_prefix(input_dir).unwrap_or(log_path);
                    let path = dir.join(relative).with_extension("gpx");
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent).map_err(|e| ConvertError::io(parent, e))?;
                    }
                    path
                }
                None => default_output_path(log_path),
            };
            if !claimed.insert(output.clone()) {
                warn!(
                    input = %log_path.display(),
                    output = %output.display(),
                    "output path already used in this batch"
                );
                batch.failed.push((
                    log_path.clone(),
                    format!("output {} is already written by another log", output.display()),
                ));
                continue;
            }
            match self.convert_file(log_path, Some(&output)) {
                Ok(conversion) => batch.converted.push(conversion.summary),
                Err(e) => {
                    warn!(input = %log_path.display(), error = %e, "conversion failed");
                    batch.failed.push((log_path.clone(), e.to_string()));
                }
            }
        }

        Ok(batch)
    }
}

pub fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("csv"))
}

pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("gpx")
}

/// Output path for one device's document.
pub fn device_output_path(output: &Path, device_id: &str, naming: OutputNaming) -> PathBuf {
    match naming {
        OutputNaming::Shared => output.to_path_buf(),
        OutputNaming::PerDevice => {
            let stem = output
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let extension = output
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| "gpx".to_string());
            output.with_file_name(format!("{}_{}.{}", stem, clean_filename(device_id), extension))
        }
    }
}

/// Document path for every track, `None` for tracks without fixes. In
/// per-device mode ids that clean to the same file name get a numbered suffix.
pub fn output_paths(output: &Path, tracks: &[Track], naming: OutputNaming) -> Vec<Option<PathBuf>> {
    let mut taken: HashSet<PathBuf> = HashSet::new();
    tracks
        .iter()
        .map(|track| {
            if track.is_empty() {
                return None;
            }
            let base = device_output_path(output, track.device_id(), naming);
            if naming == OutputNaming::Shared {
                return Some(base);
            }
            let mut path = base.clone();
            let mut n = 2;
            while taken.contains(&path) {
                path = numbered_path(&base, n);
                n += 1;
            }
            if path != base {
                warn!(
                    device = %track.device_id(),
                    output = %path.display(),
                    "device file name clashes with another device, numbered"
                );
            }
            taken.insert(path.clone());
            Some(path)
        })
        .collect()
}

fn numbered_path(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path.extension() {
        Some(ext) => path.with_file_name(format!("{}_{}.{}", stem, n, ext.to_string_lossy())),
        None => path.with_file_name(format!("{}_{}", stem, n)),
    }
}

fn clean_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '!' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

fn collect_csv_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder) {
        let entry = entry.map_err(|e| {
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "directory loop"));
            ConvertError::io(folder, source)
        })?;
        if entry.file_type().is_file() && has_csv_extension(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Print an end-of-run report to stdout.
pub fn print_conversion_summary(summary: &ConversionSummary) {
    println!("\n🛰️  CONVERSION SUMMARY: {}", summary.input.display());
    println!("====================");
    println!("Lines read: {}", summary.lines);
    println!("✅ Points kept: {}", summary.admitted_points);
    println!("🗑️  Points dropped by quality filter: {}", summary.dropped_points);
    if summary.ignored_keys > 0 {
        println!("Unrecognised keys ignored: {}", summary.ignored_keys);
    }
    for device in &summary.devices {
        match &device.output {
            Some(path) => println!(
                "📍 {}: {} points, {} altitude-corrected -> {}",
                device.device_id,
                device.points,
                device.corrected_points,
                path.display()
            ),
            None => println!("⚠️  {}: no usable fixes, skipped", device.device_id),
        }
    }
}

pub fn print_batch_summary(batch: &BatchSummary) {
    for summary in &batch.converted {
        print_conversion_summary(summary);
    }
    println!("\n🎯 FOLDER SUMMARY");
    println!("====================");
    println!("✅ Converted: {}", batch.converted.len());
    println!("❌ Errors: {}", batch.failed.len());
    for (path, error) in &batch.failed {
        println!("   {}: {}", path.display(), error);
    }
}
