//! Converter configuration
//!
//! Every field has a default, so an empty TOML file (or none at all) gives
//! the standard behaviour. Command line flags are applied on top.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConvertError, Result};
use crate::track_point::CoordinateCheck;

pub const DEFAULT_WINDOW_SIZE: usize = 101;
pub const DEFAULT_HDOP_MAX: f64 = 5.0;
pub const DEFAULT_VDOP_MAX: f64 = 5.0;
pub const DEFAULT_PDOP_MAX: f64 = 4.0;

/// Where each device's document goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutputNaming {
    /// Every device is written to the resolved output path; with several
    /// devices only the last one survives on disk.
    #[default]
    Shared,
    /// The device id is appended to the output file stem.
    PerDevice,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    pub window_size: usize,
    pub hdop_max: f64,
    pub vdop_max: f64,
    pub pdop_max: f64,
    pub coordinate_check: CoordinateCheck,
    pub altitude_correction: bool,
    pub environment_extensions: bool,
    pub output_naming: OutputNaming,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        ConverterConfig {
            window_size: DEFAULT_WINDOW_SIZE,
            hdop_max: DEFAULT_HDOP_MAX,
            vdop_max: DEFAULT_VDOP_MAX,
            pdop_max: DEFAULT_PDOP_MAX,
            coordinate_check: CoordinateCheck::LatitudeOnly,
            altitude_correction: true,
            environment_extensions: true,
            output_naming: OutputNaming::Shared,
        }
    }
}

impl ConverterConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ConverterConfig =
            toml::from_str(content).map_err(|e| ConvertError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(ConvertError::Config("window_size must be at least 1".into()));
        }
        for (name, value) in [
            ("hdop_max", self.hdop_max),
            ("vdop_max", self.vdop_max),
            ("pdop_max", self.pdop_max),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConvertError::Config(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}
