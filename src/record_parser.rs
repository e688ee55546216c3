//! Telemetry record parser
//!
//! A log line is a flat `KEY;VALUE;KEY;VALUE;...` list with an optional
//! trailing separator. Known keys fill the matching `TrackPoint` field,
//! unknown keys are skipped so newer loggers can add fields freely.

use crate::error::{ConvertError, Result};
use crate::track_point::{TrackPoint, TrackPointBuilder};

/// Device id used for lines that carry no `ID` key.
pub const DEFAULT_DEVICE_ID: &str = "!XXXXXXXX";

const SEPARATOR: char = ';';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKey {
    Id,
    Latitude,
    Longitude,
    Altitude,
    DateTime,
    Hdop,
    Vdop,
    Pdop,
    Satellites,
    Temperature,
    Humidity,
    Pressure,
}

impl RecordKey {
    pub fn from_token(token: &str) -> Option<Self> {
        let key = match token {
            "ID" => RecordKey::Id,
            "LAT" => RecordKey::Latitude,
            "LON" => RecordKey::Longitude,
            "ALT" => RecordKey::Altitude,
            "DT" => RecordKey::DateTime,
            "HDOP" => RecordKey::Hdop,
            "VDOP" => RecordKey::Vdop,
            "PDOP" => RecordKey::Pdop,
            "SAT" => RecordKey::Satellites,
            "TEMP" => RecordKey::Temperature,
            "HUMID" => RecordKey::Humidity,
            "PRESS" => RecordKey::Pressure,
            _ => return None,
        };
        Some(key)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKey::Id => "ID",
            RecordKey::Latitude => "LAT",
            RecordKey::Longitude => "LON",
            RecordKey::Altitude => "ALT",
            RecordKey::DateTime => "DT",
            RecordKey::Hdop => "HDOP",
            RecordKey::Vdop => "VDOP",
            RecordKey::Pdop => "PDOP",
            RecordKey::Satellites => "SAT",
            RecordKey::Temperature => "TEMP",
            RecordKey::Humidity => "HUMID",
            RecordKey::Pressure => "PRESS",
        }
    }
}

/// One parsed log line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub device_id: String,
    pub point: TrackPoint,
    pub ignored_keys: usize,
}

/// Parse the line at 0-based position `line_index` of the log.
pub fn parse_line(line_index: usize, line: &str) -> Result<ParsedRecord> {
    let line = line.trim_end();
    let body = line.strip_suffix(SEPARATOR).unwrap_or(line);
    let tokens: Vec<&str> = body.split(SEPARATOR).collect();

    if tokens.len() % 2 != 0 {
        return Err(ConvertError::OddTokenCount {
            line_number: line_index + 1,
            content: line.to_string(),
        });
    }

    let mut device_id = None;
    let mut ignored_keys = 0;
    let mut builder = TrackPoint::builder(line_index);

    for pair in tokens.chunks_exact(2) {
        let (token, value) = (pair[0], pair[1]);
        match RecordKey::from_token(token) {
            Some(RecordKey::Id) => device_id = Some(value.to_string()),
            Some(key) => apply_value(&mut builder, key, value, line_index)?,
            None => ignored_keys += 1,
        }
    }

    Ok(ParsedRecord {
        device_id: device_id.unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string()),
        point: builder.build(),
        ignored_keys,
    })
}

fn apply_value(
    builder: &mut TrackPointBuilder,
    key: RecordKey,
    value: &str,
    line_index: usize,
) -> Result<()> {
    let number = || parse_number::<f64>(key, value, line_index);
    match key {
        RecordKey::Id => {}
        RecordKey::DateTime => {
            builder.timestamp(value);
        }
        RecordKey::Latitude => {
            builder.latitude(number()?);
        }
        RecordKey::Longitude => {
            builder.longitude(number()?);
        }
        RecordKey::Altitude => {
            builder.altitude_gps(number()?);
        }
        RecordKey::Hdop => {
            builder.hdop(number()?);
        }
        RecordKey::Vdop => {
            builder.vdop(number()?);
        }
        RecordKey::Pdop => {
            builder.pdop(number()?);
        }
        RecordKey::Satellites => {
            builder.satellites(parse_number::<i64>(key, value, line_index)?);
        }
        RecordKey::Temperature => {
            builder.temperature(number()?);
        }
        RecordKey::Humidity => {
            builder.humidity(number()?);
        }
        RecordKey::Pressure => {
            builder.pressure(number()?);
        }
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: RecordKey, value: &str, line_index: usize) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConvertError::InvalidValue {
            line_number: line_index + 1,
            key: key.as_str().to_string(),
            value: value.to_string(),
        })
}

/// Render a point back into log-line form. Only fields that were read are
/// written, so parsing the result yields the same point. The line always ends
/// with a separator so an empty last value survives the round trip.
pub fn to_record_line(device_id: &str, point: &TrackPoint) -> String {
    let mut tokens: Vec<String> = vec![RecordKey::Id.as_str().to_string(), device_id.to_string()];
    let mut push = |key: RecordKey, value: String| {
        tokens.push(key.as_str().to_string());
        tokens.push(value);
    };

    if let Some(v) = point.latitude() {
        push(RecordKey::Latitude, v.to_string());
    }
    if let Some(v) = point.longitude() {
        push(RecordKey::Longitude, v.to_string());
    }
    if let Some(v) = point.altitude_gps() {
        push(RecordKey::Altitude, v.to_string());
    }
    if let Some(v) = point.timestamp() {
        push(RecordKey::DateTime, v.to_string());
    }
    if let Some(v) = point.hdop() {
        push(RecordKey::Hdop, v.to_string());
    }
    if let Some(v) = point.vdop() {
        push(RecordKey::Vdop, v.to_string());
    }
    if let Some(v) = point.pdop() {
        push(RecordKey::Pdop, v.to_string());
    }
    if let Some(v) = point.satellites() {
        push(RecordKey::Satellites, v.to_string());
    }
    if let Some(v) = point.temperature() {
        push(RecordKey::Temperature, v.to_string());
    }
    if let Some(v) = point.humidity() {
        push(RecordKey::Humidity, v.to_string());
    }
    if let Some(v) = point.pressure() {
        push(RecordKey::Pressure, v.to_string());
    }

    let mut line = tokens.join(";");
    line.push(SEPARATOR);
    line
}
