//! Trajectory algorithms: decide whether and where to move each dome axis.
//!
//! An algorithm sees the dome's last commanded target (if any) and the
//! telescope's current target, and returns a new dome target per axis, or
//! `None` when no move is warranted. The set of algorithms is a closed enum
//! dispatched by [`TrajectoryAlgorithm`]; construction happens once, at
//! configuration time.

use tracing::debug;

use crate::angle;
use crate::config::AlgorithmConfig;
use crate::error::ConfigError;
use crate::target::{AxisTarget, TelescopeTarget};

/// The configured trajectory algorithm.
#[derive(Debug, Clone, PartialEq)]
pub enum TrajectoryAlgorithm {
    Simple(SimpleAlgorithm),
}

impl TrajectoryAlgorithm {
    /// Build the algorithm named by the configuration.
    pub fn from_config(config: &AlgorithmConfig) -> Result<Self, ConfigError> {
        match *config {
            AlgorithmConfig::Simple {
                max_delta_azimuth,
                max_delta_elevation,
            } => Ok(TrajectoryAlgorithm::Simple(SimpleAlgorithm::new(
                max_delta_azimuth,
                max_delta_elevation,
            )?)),
        }
    }

    /// The algorithm name as it appears in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            TrajectoryAlgorithm::Simple(_) => "simple",
        }
    }

    /// Human-readable rendering of the effective parameters.
    pub fn describe(&self) -> String {
        match self {
            TrajectoryAlgorithm::Simple(simple) => format!(
                "max_delta_azimuth: {}\nmax_delta_elevation: {}",
                simple.max_delta_azimuth, simple.max_delta_elevation
            ),
        }
    }

    /// Desired dome elevation target, or `None` if no move is needed.
    ///
    /// `next_telescope_target` is the upcoming target from the scheduler,
    /// for algorithms that slew ahead of the telescope; none of the current
    /// variants use it.
    pub fn desired_dome_elevation(
        &self,
        dome_target_elevation: Option<AxisTarget>,
        telescope_target: &TelescopeTarget,
        next_telescope_target: Option<&TelescopeTarget>,
    ) -> Option<AxisTarget> {
        match self {
            TrajectoryAlgorithm::Simple(simple) => simple.desired_dome_elevation(
                dome_target_elevation,
                telescope_target,
                next_telescope_target,
            ),
        }
    }

    /// Desired dome azimuth target, or `None` if no move is needed.
    pub fn desired_dome_azimuth(
        &self,
        dome_target_azimuth: Option<AxisTarget>,
        telescope_target: &TelescopeTarget,
        next_telescope_target: Option<&TelescopeTarget>,
    ) -> Option<AxisTarget> {
        match self {
            TrajectoryAlgorithm::Simple(simple) => simple.desired_dome_azimuth(
                dome_target_azimuth,
                telescope_target,
                next_telescope_target,
            ),
        }
    }
}

/// Threshold-based slew-to-match algorithm.
///
/// If the difference between the telescope target and the dome target
/// exceeds the configured maximum, command the dome to the telescope target
/// position with zero velocity; otherwise leave the dome alone. The test is
/// applied independently per axis, and the azimuth difference is scaled by
/// cos(telescope elevation) before comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleAlgorithm {
    max_delta_azimuth: f64,
    max_delta_elevation: f64,
}

impl SimpleAlgorithm {
    /// Create the algorithm. Both thresholds are in degrees and must be
    /// non-negative.
    pub fn new(max_delta_azimuth: f64, max_delta_elevation: f64) -> Result<Self, ConfigError> {
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
        Ok(Self {
            max_delta_azimuth,
            max_delta_elevation,
        })
    }

    fn desired_dome_elevation(
        &self,
        dome_target_elevation: Option<AxisTarget>,
        telescope_target: &TelescopeTarget,
        _next_telescope_target: Option<&TelescopeTarget>,
    ) -> Option<AxisTarget> {
        // No known dome target: send the dome to the telescope target.
        let Some(dome_target) = dome_target_elevation else {
            return Some(telescope_target.elevation);
        };

        let dome_shifted = dome_target.at(telescope_target.elevation.tai);
        let elevation_diff =
            angle::diff(dome_shifted.position, telescope_target.elevation.position);
        if elevation_diff.abs() < self.max_delta_elevation {
            return None;
        }
        debug!(
            elevation_diff,
            telescope_elevation = telescope_target.elevation.position,
            "dome elevation off target"
        );
        Some(AxisTarget::new(
            telescope_target.elevation.position,
            0.0,
            telescope_target.elevation.tai,
        ))
    }

    fn desired_dome_azimuth(
        &self,
        dome_target_azimuth: Option<AxisTarget>,
        telescope_target: &TelescopeTarget,
        _next_telescope_target: Option<&TelescopeTarget>,
    ) -> Option<AxisTarget> {
        let Some(dome_target) = dome_target_azimuth else {
            return Some(telescope_target.azimuth);
        };

        let dome_shifted = dome_target.at(telescope_target.azimuth.tai);
        let scaled_diff = angle::scaled_azimuth_diff(
            telescope_target.azimuth.position,
            dome_shifted.position,
            telescope_target.elevation.position,
        );
        if scaled_diff.abs() < self.max_delta_azimuth {
            return None;
        }
        debug!(
            scaled_diff,
            telescope_azimuth = telescope_target.azimuth.position,
            "dome azimuth off target"
        );
        Some(AxisTarget::new(
            telescope_target.azimuth.position,
            0.0,
            telescope_target.azimuth.tai,
        ))
    }
}
