//! Positioned-target value types.
//!
//! An axis target is a linear prediction: position, velocity, and the TAI
//! time the pair refers to. Extrapolating with [`AxisTarget::at`] gives the
//! expected position at any nearby time, which is how the last commanded dome
//! target is compared against a telescope target with a newer timestamp.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::angle;

/// Current TAI time as seconds since the Unix epoch.
///
/// The engine only ever uses differences of these values, so the epoch and
/// the (ignored) UTC/TAI offset are immaterial as long as all timestamps
/// come from the same source.
pub fn now_tai() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Position and velocity of one axis at a reference time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisTarget {
    /// Position in degrees.
    pub position: f64,
    /// Velocity in degrees/second.
    pub velocity: f64,
    /// TAI reference time in seconds.
    pub tai: f64,
}

impl AxisTarget {
    /// Create a new axis target.
    pub fn new(position: f64, velocity: f64, tai: f64) -> Self {
        Self {
            position,
            velocity,
            tai,
        }
    }

    /// Extrapolate this target to another time, assuming constant velocity.
    pub fn at(&self, tai: f64) -> AxisTarget {
        AxisTarget {
            position: self.position + self.velocity * (tai - self.tai),
            velocity: self.velocity,
            tai,
        }
    }

    /// True if both position and velocity are finite.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }
}

/// One telescope-target sample as delivered by the mount target stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSample {
    /// Target elevation in degrees.
    pub elevation: f64,
    /// Target elevation velocity in degrees/second.
    pub elevation_velocity: f64,
    /// Target azimuth in degrees (any wrap).
    pub azimuth: f64,
    /// Target azimuth velocity in degrees/second.
    pub azimuth_velocity: f64,
    /// TAI time the sample refers to, in seconds.
    pub tai: f64,
}

/// Telescope target for both axes.
///
/// Azimuth position is always normalized to `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelescopeTarget {
    pub elevation: AxisTarget,
    pub azimuth: AxisTarget,
}

impl TelescopeTarget {
    /// Build a telescope target, wrapping the azimuth position to `[0, 360)`.
    pub fn new(elevation: AxisTarget, azimuth: AxisTarget) -> Self {
        Self {
            elevation,
            azimuth: AxisTarget {
                position: angle::wrap_nonnegative(azimuth.position),
                ..azimuth
            },
        }
    }

    /// Convert an inbound target sample.
    pub fn from_sample(sample: &TargetSample) -> Self {
        Self::new(
            AxisTarget::new(sample.elevation, sample.elevation_velocity, sample.tai),
            AxisTarget::new(sample.azimuth, sample.azimuth_velocity, sample.tai),
        )
    }
}
