//! Engine configuration.
//!
//! Configuration arrives as a JSON value (the transport layer owns file
//! loading) and is validated before it is applied. A config that fails
//! [`Config::validate`] is rejected outright; the engine never runs with a
//! partially-valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Algorithm selection plus its parameters, tagged by name.
///
/// Adding an algorithm is a compile-time extension: a new variant here, a
/// new arm in [`crate::algorithm::TrajectoryAlgorithm::from_config`].
/// Unknown names fail deserialization, which surfaces as
/// [`ConfigError::Parse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case", deny_unknown_fields)]
pub enum AlgorithmConfig {
    /// Move the dome to match the telescope target whenever the pointing
    /// error exceeds a fixed per-axis threshold.
    Simple {
        /// Maximum cos(elevation)-scaled azimuth difference before moving
        /// the dome (deg).
        max_delta_azimuth: f64,
        /// Maximum elevation difference before moving the dome (deg).
        max_delta_elevation: f64,
    },
}

impl AlgorithmConfig {
    /// The algorithm name as it appears in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmConfig::Simple { .. } => "simple",
        }
    }
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        // Defaults sit just inside where the dome starts to vignette.
        AlgorithmConfig::Simple {
            max_delta_azimuth: 5.0,
            max_delta_elevation: 6.0,
        }
    }
}

/// Full configuration surface of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Trajectory algorithm selection and parameters.
    pub algorithm: AlgorithmConfig,

    /// Scaled azimuth difference (deg) above which the view is partially
    /// vignetted.
    pub azimuth_vignette_partial: f64,
    /// Scaled azimuth difference (deg) at which the view is fully vignetted.
    pub azimuth_vignette_full: f64,
    /// Elevation difference (deg) above which the view is partially
    /// vignetted.
    pub elevation_vignette_partial: f64,
    /// Elevation difference (deg) at which the view is fully vignetted.
    pub elevation_vignette_full: f64,
    /// Shutter open percentage above which the shutter does not vignette.
    pub shutter_vignette_partial: f64,
    /// Shutter open percentage at or below which the view is fully
    /// vignetted.
    pub shutter_vignette_full: f64,

    /// Whether the dome elevation (light/wind screen) axis follows the
    /// telescope at all.
    pub enable_elevation: bool,

    /// Timeout for dome command acknowledgment, in seconds. Sized for the
    /// slowest expected hardware slew.
    pub command_timeout: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmConfig::default(),
            azimuth_vignette_partial: 5.0,
            azimuth_vignette_full: 25.0,
            elevation_vignette_partial: 6.0,
            elevation_vignette_full: 25.0,
            shutter_vignette_partial: 95.0,
            shutter_vignette_full: 5.0,
            enable_elevation: false,
            command_timeout: 120.0,
        }
    }
}

impl Config {
    /// Deserialize and validate a configuration value.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("azimuth_vignette_partial", self.azimuth_vignette_partial),
            ("azimuth_vignette_full", self.azimuth_vignette_full),
            ("elevation_vignette_partial", self.elevation_vignette_partial),
            ("elevation_vignette_full", self.elevation_vignette_full),
            ("shutter_vignette_partial", self.shutter_vignette_partial),
            ("shutter_vignette_full", self.shutter_vignette_full),
        ];
        for (name, value) in non_negative {
            if value < 0.0 {
                return Err(ConfigError::NegativeParameter { name, value });
            }
        }
        if self.azimuth_vignette_partial > self.azimuth_vignette_full {
            return Err(ConfigError::ThresholdOrder {
                name: "azimuth_vignette",
                partial: self.azimuth_vignette_partial,
                full: self.azimuth_vignette_full,
            });
        }
        if self.elevation_vignette_partial > self.elevation_vignette_full {
            return Err(ConfigError::ThresholdOrder {
                name: "elevation_vignette",
                partial: self.elevation_vignette_partial,
                full: self.elevation_vignette_full,
            });
        }
        // Shutter thresholds are open percentages, so partial sits above full.
        if self.shutter_vignette_full > self.shutter_vignette_partial {
            return Err(ConfigError::ThresholdOrder {
                name: "shutter_vignette",
                partial: self.shutter_vignette_partial,
                full: self.shutter_vignette_full,
            });
        }
        if !(self.command_timeout > 0.0) {
            return Err(ConfigError::NonPositiveTimeout(self.command_timeout));
        }
        match self.algorithm {
            AlgorithmConfig::Simple {
                max_delta_azimuth,
                max_delta_elevation,
            } => {
                if max_delta_azimuth < 0.0 {
                    return Err(ConfigError::NegativeParameter {
                        name: "max_delta_azimuth",
                        value: max_delta_azimuth,
                    });
                }
                if max_delta_elevation < 0.0 {
                    return Err(ConfigError::NegativeParameter {
                        name: "max_delta_elevation",
                        value: max_delta_elevation,
                    });
                }
            }
        }
        Ok(())
    }

    /// Command-acknowledgment timeout as a [`Duration`].
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.command_timeout)
    }
}
