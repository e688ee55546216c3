//! Telemetry log to GPX converter.
//!
//! Reads `KEY;VALUE;...` sensor logs (GPS, barometer, environment), keeps the
//! fixes of acceptable quality, groups them per device, corrects barometric
//! altitude against GPS altitude with a moving-window bias estimate and writes
//! one GPX 1.1 track document per device.

pub mod altitude_corrector;
pub mod config;
pub mod converter;
pub mod error;
pub mod gpx_writer;
pub mod point_filter;
pub mod record_parser;
pub mod rolling_window;
pub mod series_export;
pub mod track_grouper;
pub mod track_point;

pub use altitude_corrector::{pressure_altitude, AltitudeCorrector, AltitudeSample, AltitudeSeries};
pub use config::{ConverterConfig, OutputNaming};
pub use converter::{Conversion, ConversionSummary, Converter};
pub use error::{ConvertError, Result};
pub use gpx_writer::{build_document, DocumentOptions};
pub use point_filter::PointFilter;
pub use record_parser::{parse_line, to_record_line, DEFAULT_DEVICE_ID};
pub use track_grouper::{Track, TrackGrouper};
pub use track_point::{CoordinateCheck, TrackPoint, TrackPointBuilder};
