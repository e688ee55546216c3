//! Fix quality filter
//!
//! Decides whether a parsed point is good enough to go into its track.
//! Rejected points are not errors, they are just left out.

use crate::config::ConverterConfig;
use crate::track_point::{CoordinateCheck, TrackPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoFixTime,
    NoCoordinates,
    Hdop,
    Vdop,
    Pdop,
}

#[derive(Debug, Clone)]
pub struct PointFilter {
    hdop_max: f64,
    vdop_max: f64,
    pdop_max: f64,
    coordinate_check: CoordinateCheck,
}

impl Default for PointFilter {
    fn default() -> Self {
        PointFilter::new(&ConverterConfig::default())
    }
}

impl PointFilter {
    pub fn new(config: &ConverterConfig) -> Self {
        PointFilter {
            hdop_max: config.hdop_max,
            vdop_max: config.vdop_max,
            pdop_max: config.pdop_max,
            coordinate_check: config.coordinate_check,
        }
    }

    pub fn admits(&self, point: &TrackPoint) -> bool {
        self.check(point).is_ok()
    }

    /// First failed condition, in the order they are evaluated.
    pub fn check(&self, point: &TrackPoint) -> Result<(), Rejection> {
        if point.fix_time().is_none() {
            return Err(Rejection::NoFixTime);
        }
        if !point.has_valid_coordinates(self.coordinate_check) {
            return Err(Rejection::NoCoordinates);
        }
        // Unreported DOP passes; a reported one must be under its limit.
        if !within(point.reported_hdop(), self.hdop_max) {
            return Err(Rejection::Hdop);
        }
        if !within(point.reported_vdop(), self.vdop_max) {
            return Err(Rejection::Vdop);
        }
        if !within(point.reported_pdop(), self.pdop_max) {
            return Err(Rejection::Pdop);
        }
        Ok(())
    }
}

fn within(value: Option<f64>, max: f64) -> bool {
    value.map_or(true, |v| v < max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_parser::parse_line;

    fn point(line: &str) -> TrackPoint {
        parse_line(0, line).unwrap().point
    }

    const BASE: &str = "ID;D;LAT;50.1;LON;30.6;DT;2024-04-20T07:00:00Z";

    #[test]
    fn test_good_fix_is_admitted() {
        let filter = PointFilter::default();
        assert!(filter.admits(&point(BASE)));
        assert!(filter.admits(&point(&format!("{};HDOP;4.99;VDOP;1.0;PDOP;3.9", BASE))));
    }

    #[test]
    fn test_dop_thresholds() {
        let filter = PointFilter::default();
        assert_eq!(
            filter.check(&point(&format!("{};HDOP;6.0", BASE))),
            Err(Rejection::Hdop)
        );
        assert_eq!(
            filter.check(&point(&format!("{};HDOP;5.0", BASE))),
            Err(Rejection::Hdop)
        );
        assert_eq!(
            filter.check(&point(&format!("{};VDOP;5.5", BASE))),
            Err(Rejection::Vdop)
        );
        assert_eq!(
            filter.check(&point(&format!("{};PDOP;4.0", BASE))),
            Err(Rejection::Pdop)
        );
        // Sentinels and zero mean "not reported".
        assert!(filter.admits(&point(&format!("{};HDOP;-1.0;VDOP;0.0;PDOP;-1", BASE))));
    }

    #[test]
    fn test_missing_or_epoch_time_rejected() {
        let filter = PointFilter::default();
        assert_eq!(
            filter.check(&point("LAT;50.1;LON;30.6")),
            Err(Rejection::NoFixTime)
        );
        assert_eq!(
            filter.check(&point("LAT;50.1;LON;30.6;DT;1970-01-01T00:00:00Z")),
            Err(Rejection::NoFixTime)
        );
    }

    #[test]
    fn test_zero_latitude_rejected_under_legacy_check() {
        // Longitude is never looked at by the legacy check: a fix on the
        // equator is dropped even though its longitude is valid.
        let equator = point("LAT;0.0;LON;30.6;DT;2024-04-20T07:00:00Z");
        assert_eq!(
            PointFilter::default().check(&equator),
            Err(Rejection::NoCoordinates)
        );

        let config = ConverterConfig {
            coordinate_check: CoordinateCheck::Either,
            ..ConverterConfig::default()
        };
        assert!(PointFilter::new(&config).admits(&equator));
        assert!(!PointFilter::new(&config)
            .admits(&point("LAT;0.0;LON;0.0;DT;2024-04-20T07:00:00Z")));
    }
}
