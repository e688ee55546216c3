//! Altitude series export
//!
//! Flattens the raw and corrected altitude series of every device into CSV
//! rows, one per corrected point, with the distance travelled so far. The file
//! is meant for plotting raw against corrected altitude outside this tool.

use std::io::Write;
use std::path::Path;

use csv::Writer;
use geo::{point, HaversineDistance};
use serde::Serialize;

use crate::altitude_corrector::AltitudeSeries;
use crate::error::{ConvertError, Result};
use crate::track_grouper::Track;
use crate::track_point::TrackPoint;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    pub device_id: String,
    pub source_line: usize,
    pub distance_m: f64,
    pub gps_altitude_m: f64,
    pub barometric_altitude_m: f64,
    pub correction_m: f64,
    pub corrected_altitude_m: f64,
}

/// Cumulative haversine distance along the points that have both coordinates.
/// Points without a position repeat the previous distance.
pub fn cumulative_distances(points: &[TrackPoint]) -> Vec<f64> {
    let mut distances = Vec::with_capacity(points.len());
    let mut total = 0.0;
    let mut last = None;

    for p in points {
        if let (Some(lat), Some(lon)) = (p.latitude(), p.longitude()) {
            let here = point!(x: lon, y: lat);
            if let Some(prev) = last {
                total += here.haversine_distance(&prev);
            }
            last = Some(here);
        }
        distances.push(total);
    }

    distances
}

pub fn series_rows(track: &Track, series: &AltitudeSeries) -> Vec<SeriesRow> {
    let distances = cumulative_distances(track.points());
    series
        .samples
        .iter()
        .map(|s| SeriesRow {
            device_id: series.device_id.clone(),
            source_line: s.source_line_index + 1,
            distance_m: distances.get(s.point_index).copied().unwrap_or(0.0),
            gps_altitude_m: s.gps_altitude_m,
            barometric_altitude_m: s.barometric_altitude_m,
            correction_m: s.correction_m,
            corrected_altitude_m: s.corrected_altitude_m,
        })
        .collect()
}

pub fn write_series<W: Write>(writer: W, rows: &[SeriesRow]) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(|e| ConvertError::Csv(e.into()))?;
    Ok(())
}

pub fn write_series_csv(path: &Path, rows: &[SeriesRow]) -> Result<()> {
    let mut wtr = Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(|e| ConvertError::io(path, e))?;
    Ok(())
}
