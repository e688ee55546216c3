//! Barometric Altitude Bias Correction
//!
//! Barometric altitude is smooth but carries a slowly drifting offset caused
//! by the weather; GPS altitude is noisy but unbiased. For every device track
//! the offset is estimated as the moving average of (GPS - barometric) over a
//! window of W points and added back onto the barometric altitude.
//!
//! Only points that report both a usable GPS altitude and a pressure take part.
//! The first W corrected values all use the first full window's offset, later
//! values use the offset of the window ending one point before them.

use serde::Serialize;
use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::rolling_window::RollingSum;
use crate::track_grouper::Track;

pub const STANDARD_PRESSURE_HPA: f64 = 1013.25;

// Standard atmosphere: p(h) = 1013.25 * (1 - 6.5 h / 288150) ^ 5.255, solved for h.
const BAROMETRIC_SCALE_M: f64 = 44330.7692308;
const BAROMETRIC_EXPONENT: f64 = 0.190294957184;

/// Altitude in metres for a pressure in hPa under the standard atmosphere.
pub fn pressure_altitude(pressure_hpa: f64) -> f64 {
    BAROMETRIC_SCALE_M * (1.0 - (pressure_hpa / STANDARD_PRESSURE_HPA).powf(BAROMETRIC_EXPONENT))
}

/// Windowed mean of `gps - barometric`, one value per full window.
///
/// Returns `max(0, n - window + 1)` values; the first belongs to the window
/// ending at index `window - 1`.
pub fn window_corrections(gps: &[f64], barometric: &[f64], window: usize) -> Result<Vec<f64>> {
    if gps.len() != barometric.len() {
        return Err(ConvertError::MismatchedSeries {
            gps: gps.len(),
            pressure: barometric.len(),
        });
    }
    if window == 0 {
        return Err(ConvertError::Config("window_size must be at least 1".into()));
    }

    let mut gps_window = RollingSum::new(window);
    let mut baro_window = RollingSum::new(window);
    let mut corrections = Vec::with_capacity((gps.len() + 1).saturating_sub(window));

    for (&g, &b) in gps.iter().zip(barometric) {
        gps_window.push(g);
        baro_window.push(b);
        if gps_window.is_full() && baro_window.is_full() {
            corrections.push((gps_window.sum() - baro_window.sum()) / window as f64);
        }
    }

    Ok(corrections)
}

/// Offset applied to the value at `index`.
pub(crate) fn correction_for_index(index: usize, corrections: &[f64], window: usize) -> f64 {
    if index < window {
        corrections[0]
    } else {
        corrections[index - window]
    }
}

/// Add the applicable offset to every barometric altitude.
pub fn apply_corrections(barometric: &[f64], corrections: &[f64], window: usize) -> Vec<f64> {
    if corrections.is_empty() {
        return Vec::new();
    }
    barometric
        .iter()
        .enumerate()
        .map(|(i, &alt)| alt + correction_for_index(i, corrections, window))
        .collect()
}

/// One point that took part in the correction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AltitudeSample {
    /// Position of the point inside its track.
    pub point_index: usize,
    pub source_line_index: usize,
    pub gps_altitude_m: f64,
    pub barometric_altitude_m: f64,
    pub correction_m: f64,
    pub corrected_altitude_m: f64,
}

/// Raw and corrected altitude for one device, kept for reporting and plotting.
#[derive(Debug, Clone, PartialEq)]
pub struct AltitudeSeries {
    pub device_id: String,
    pub window: usize,
    pub samples: Vec<AltitudeSample>,
    pub corrections: Vec<f64>,
}

impl AltitudeSeries {
    pub fn mean_correction(&self) -> Option<f64> {
        if self.corrections.is_empty() {
            None
        } else {
            Some(self.corrections.iter().sum::<f64>() / self.corrections.len() as f64)
        }
    }
}

#[derive(Debug, Clone)]
pub struct AltitudeCorrector {
    window: usize,
}

impl AltitudeCorrector {
    pub fn new(window: usize) -> Self {
        AltitudeCorrector { window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Correct the barometric altitude of every qualifying point in `track`.
    ///
    /// Fails when fewer than `window` points carry both GPS altitude and
    /// pressure; the track is left untouched in that case.
    pub fn correct(&self, track: &mut Track) -> Result<AltitudeSeries> {
        let mut point_indices = Vec::new();
        let mut gps = Vec::new();
        let mut barometric = Vec::new();

        for (i, point) in track.points().iter().enumerate() {
            if let (Some(alt), Some(pressure)) =
                (point.reported_gps_altitude(), point.reported_pressure())
            {
                point_indices.push(i);
                gps.push(alt);
                barometric.push(pressure_altitude(pressure));
            }
        }

        if gps.len() < self.window {
            return Err(ConvertError::InsufficientData {
                device_id: track.device_id().to_string(),
                available: gps.len(),
                required: self.window,
            });
        }

        let corrections = window_corrections(&gps, &barometric, self.window)?;
        let corrected = apply_corrections(&barometric, &corrections, self.window);

        let points = track.points_mut();
        let mut samples = Vec::with_capacity(corrected.len());
        for (k, &point_index) in point_indices.iter().enumerate() {
            let point = std::mem::take(&mut points[point_index]);
            samples.push(AltitudeSample {
                point_index,
                source_line_index: point.source_line_index(),
                gps_altitude_m: gps[k],
                barometric_altitude_m: barometric[k],
                correction_m: correction_for_index(k, &corrections, self.window),
                corrected_altitude_m: corrected[k],
            });
            points[point_index] = point.with_corrected_altitude(corrected[k]);
        }

        let series = AltitudeSeries {
            device_id: track.device_id().to_string(),
            window: self.window,
            samples,
            corrections,
        };

        debug!(
            device = %series.device_id,
            qualifying = series.samples.len(),
            skipped = track.len() - series.samples.len(),
            windows = series.corrections.len(),
            mean_correction_m = series.mean_correction().unwrap_or(0.0),
            "altitude corrected"
        );

        Ok(series)
    }
}
