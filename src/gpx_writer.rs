//! GPX 1.1 track document writer
//!
//! Builds one document per device track. Values are written with a fixed
//! number of decimals (10 for positions and elevation, 3 for DOP and
//! temperature) so repeated runs produce identical files.
//!
//! Environmental readings go into a Garmin TrackPointExtension block. Only
//! the air temperature is written there; humidity and pressure open the block
//! but are deliberately not published.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{SecondsFormat, Utc};

use crate::config::ConverterConfig;
use crate::error::{ConvertError, Result};
use crate::track_grouper::Track;
use crate::track_point::{CoordinateCheck, TrackPoint};

pub const GPX_VERSION: &str = "1.1";
pub const CREATOR: &str = "rust-csv2gpx";

const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";
const TPX_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/TrackPointExtension/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentOptions {
    pub coordinate_check: CoordinateCheck,
    pub environment_extensions: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        DocumentOptions::from(&ConverterConfig::default())
    }
}

impl From<&ConverterConfig> for DocumentOptions {
    fn from(config: &ConverterConfig) -> Self {
        DocumentOptions {
            coordinate_check: config.coordinate_check,
            environment_extensions: config.environment_extensions,
        }
    }
}

/// Render `track` as a complete GPX document.
pub fn build_document(track: &Track, options: &DocumentOptions) -> String {
    let mut doc = String::new();

    doc.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    doc.push_str(&format!(
        "<gpx xmlns=\"{}\" xmlns:gpxtpx=\"{}\" version=\"{}\" creator=\"{}\">\n",
        GPX_NAMESPACE, TPX_NAMESPACE, GPX_VERSION, CREATOR
    ));

    let name = escape_xml(track.device_id());
    doc.push_str("  <metadata>\n");
    doc.push_str(&format!("    <name>{}</name>\n", name));
    doc.push_str(&format!("    <time>{}</time>\n", escape_xml(&document_time(track))));
    doc.push_str("  </metadata>\n");

    doc.push_str("  <trk>\n");
    doc.push_str(&format!("    <name>{}</name>\n", name));
    doc.push_str("    <trkseg>\n");
    for point in track.points() {
        push_track_point(&mut doc, point, options);
    }
    doc.push_str("    </trkseg>\n");
    doc.push_str("  </trk>\n");
    doc.push_str("</gpx>\n");

    doc
}

/// Write a rendered document to `path`. The file is closed before returning,
/// whether or not the write succeeded.
pub fn write_document(path: &Path, document: &str) -> Result<()> {
    let file = File::create(path).map_err(|e| ConvertError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(document.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| ConvertError::io(path, e))
}

// First usable fix time of the track, or the time of the conversion.
fn document_time(track: &Track) -> String {
    track
        .points()
        .iter()
        .find_map(|p| p.fix_time())
        .map(str::to_string)
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn push_track_point(doc: &mut String, point: &TrackPoint, options: &DocumentOptions) {
    let mut open = String::from("      <trkpt");
    if point.has_valid_coordinates(options.coordinate_check) {
        if let (Some(lat), Some(lon)) = (point.latitude(), point.longitude()) {
            open.push_str(&format!(" lat=\"{:.10}\" lon=\"{:.10}\"", lat, lon));
        }
    }
    open.push_str(">\n");
    doc.push_str(&open);

    if let Some(ele) = point.elevation() {
        doc.push_str(&format!("        <ele>{:.10}</ele>\n", ele));
    }
    if let Some(time) = point.fix_time() {
        doc.push_str(&format!("        <time>{}</time>\n", escape_xml(time)));
    }
    if let Some(sat) = point.reported_satellites() {
        doc.push_str(&format!("        <sat>{}</sat>\n", sat));
    }
    if let Some(hdop) = point.reported_hdop() {
        doc.push_str(&format!("        <hdop>{:.3}</hdop>\n", hdop));
    }
    if let Some(vdop) = point.reported_vdop() {
        doc.push_str(&format!("        <vdop>{:.3}</vdop>\n", vdop));
    }
    if let Some(pdop) = point.reported_pdop() {
        doc.push_str(&format!("        <pdop>{:.3}</pdop>\n", pdop));
    }

    if options.environment_extensions && point.has_environment_data() {
        doc.push_str("        <extensions>\n");
        doc.push_str("          <gpxtpx:TrackPointExtension>\n");
        if let Some(temp) = point.reported_temperature() {
            doc.push_str(&format!("            <gpxtpx:atemp>{:.3}</gpxtpx:atemp>\n", temp));
        }
        doc.push_str("          </gpxtpx:TrackPointExtension>\n");
        doc.push_str("        </extensions>\n");
    }

    doc.push_str("      </trkpt>\n");
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
