//! Track point model
//!
//! A `TrackPoint` is one sensor fix read from a telemetry log line. Every
//! field the log can omit is an `Option`; the `reported_*` accessors apply the
//! validity comparisons the rest of the pipeline relies on (a DOP of 0.0 counts
//! as "not reported", a GPS altitude below -10000 m counts as absent, ...).
//!
//! Points are assembled with `TrackPointBuilder` and are read-only afterwards.
//! The corrected altitude is the only field written after construction, once,
//! by the altitude corrector.

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;

/// Values closer to zero than this are treated as "not set".
pub const PRESENCE_EPSILON: f64 = 1e-6;

/// GPS altitudes at or below this are receiver garbage.
pub const MIN_GPS_ALTITUDE_M: f64 = -10000.0;

const ABSOLUTE_ZERO_C: f64 = -273.15;

/// How a point proves it has a usable position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CoordinateCheck {
    /// Only the latitude is inspected, so a point on the equator is rejected
    /// whatever its longitude.
    #[default]
    LatitudeOnly,
    /// Either latitude or longitude must be away from zero.
    Either,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackPoint {
    timestamp: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude_gps: Option<f64>,
    corrected_altitude: Option<f64>,
    hdop: Option<f64>,
    vdop: Option<f64>,
    pdop: Option<f64>,
    satellites: Option<i64>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
    source_line_index: usize,
}

impl TrackPoint {
    pub fn builder(source_line_index: usize) -> TrackPointBuilder {
        TrackPointBuilder::new(source_line_index)
    }

    pub fn source_line_index(&self) -> usize {
        self.source_line_index
    }

    /// Raw `DT` value as read, including empty or epoch-zero strings.
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    pub fn latitude(&self) -> Option<f64> {
        self.latitude
    }

    pub fn longitude(&self) -> Option<f64> {
        self.longitude
    }

    /// Raw `ALT` value as read.
    pub fn altitude_gps(&self) -> Option<f64> {
        self.altitude_gps
    }

    pub fn hdop(&self) -> Option<f64> {
        self.hdop
    }

    pub fn vdop(&self) -> Option<f64> {
        self.vdop
    }

    pub fn pdop(&self) -> Option<f64> {
        self.pdop
    }

    pub fn satellites(&self) -> Option<i64> {
        self.satellites
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn humidity(&self) -> Option<f64> {
        self.humidity
    }

    pub fn pressure(&self) -> Option<f64> {
        self.pressure
    }

    /// Barometric altitude after bias correction, if this point took part in it.
    pub fn corrected_altitude(&self) -> Option<f64> {
        self.corrected_altitude
    }

    /// The fix time, unless it is missing, empty or the Unix epoch.
    pub fn fix_time(&self) -> Option<&str> {
        self.timestamp
            .as_deref()
            .filter(|ts| !ts.is_empty() && !is_epoch_zero(ts))
    }

    /// Both coordinates must have been read; a track point cannot carry
    /// only one of them.
    pub fn has_valid_coordinates(&self, check: CoordinateCheck) -> bool {
        let (Some(lat), Some(lon)) = (self.latitude, self.longitude) else {
            return false;
        };
        match check {
            CoordinateCheck::LatitudeOnly => lat.abs() > PRESENCE_EPSILON,
            CoordinateCheck::Either => lat.abs() > PRESENCE_EPSILON || lon.abs() > PRESENCE_EPSILON,
        }
    }

    pub fn reported_gps_altitude(&self) -> Option<f64> {
        self.altitude_gps
            .filter(|alt| *alt > MIN_GPS_ALTITUDE_M && alt.abs() > PRESENCE_EPSILON)
    }

    pub fn reported_pressure(&self) -> Option<f64> {
        self.pressure.filter(|p| *p > PRESENCE_EPSILON)
    }

    pub fn reported_hdop(&self) -> Option<f64> {
        self.hdop.filter(|v| *v > 0.0)
    }

    pub fn reported_vdop(&self) -> Option<f64> {
        self.vdop.filter(|v| *v > 0.0)
    }

    pub fn reported_pdop(&self) -> Option<f64> {
        self.pdop.filter(|v| *v > 0.0)
    }

    pub fn reported_satellites(&self) -> Option<i64> {
        self.satellites.filter(|n| *n >= 0)
    }

    pub fn reported_temperature(&self) -> Option<f64> {
        self.temperature.filter(|t| *t > ABSOLUTE_ZERO_C)
    }

    pub fn reported_humidity(&self) -> Option<f64> {
        self.humidity.filter(|h| *h >= 0.0)
    }

    /// Elevation to publish: the corrected altitude when it is above zero,
    /// otherwise the raw GPS altitude when that is usable.
    pub fn elevation(&self) -> Option<f64> {
        self.corrected_altitude
            .filter(|alt| *alt > PRESENCE_EPSILON)
            .or_else(|| self.reported_gps_altitude())
    }

    pub fn has_environment_data(&self) -> bool {
        self.reported_temperature().is_some()
            || self.reported_humidity().is_some()
            || self.reported_pressure().is_some()
    }

    pub(crate) fn with_corrected_altitude(mut self, altitude: f64) -> Self {
        debug_assert!(self.corrected_altitude.is_none());
        self.corrected_altitude = Some(altitude);
        self
    }
}

fn is_epoch_zero(timestamp: &str) -> bool {
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return dt.timestamp() == 0 && dt.timestamp_subsec_nanos() == 0;
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .filter_map(|fmt| NaiveDateTime::parse_from_str(timestamp, fmt).ok())
        .any(|dt| {
            let utc = dt.and_utc();
            utc.timestamp() == 0 && utc.timestamp_subsec_nanos() == 0
        })
}

/// Step-wise assembly of a `TrackPoint`, starting from "nothing reported".
#[derive(Debug, Clone)]
pub struct TrackPointBuilder {
    point: TrackPoint,
}

impl TrackPointBuilder {
    pub fn new(source_line_index: usize) -> Self {
        TrackPointBuilder {
            point: TrackPoint {
                source_line_index,
                ..TrackPoint::default()
            },
        }
    }

    pub fn timestamp(&mut self, value: impl Into<String>) -> &mut Self {
        self.point.timestamp = Some(value.into());
        self
    }

    pub fn latitude(&mut self, value: f64) -> &mut Self {
        self.point.latitude = Some(value);
        self
    }

    pub fn longitude(&mut self, value: f64) -> &mut Self {
        self.point.longitude = Some(value);
        self
    }

    pub fn altitude_gps(&mut self, value: f64) -> &mut Self {
        self.point.altitude_gps = Some(value);
        self
    }

    pub fn hdop(&mut self, value: f64) -> &mut Self {
        self.point.hdop = Some(value);
        self
    }

    pub fn vdop(&mut self, value: f64) -> &mut Self {
        self.point.vdop = Some(value);
        self
    }

    pub fn pdop(&mut self, value: f64) -> &mut Self {
        self.point.pdop = Some(value);
        self
    }

    pub fn satellites(&mut self, value: i64) -> &mut Self {
        self.point.satellites = Some(value);
        self
    }

    pub fn temperature(&mut self, value: f64) -> &mut Self {
        self.point.temperature = Some(value);
        self
    }

    pub fn humidity(&mut self, value: f64) -> &mut Self {
        self.point.humidity = Some(value);
        self
    }

    pub fn pressure(&mut self, value: f64) -> &mut Self {
        self.point.pressure = Some(value);
        self
    }

    pub fn build(self) -> TrackPoint {
        self.point
    }
}
