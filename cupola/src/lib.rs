//! Dome trajectory-following and vignetting-assessment engine.
//!
//! This crate commands a rotating dome enclosure to track a telescope's
//! pointing direction so the aperture is never obstructed by the dome
//! structure, and continuously reports how vignetted the telescope view
//! currently is.
//!
//! # Architecture
//!
//! - [`controller::FollowController`] consumes the telescope-target stream
//!   and, per sample, asks the configured [`algorithm::TrajectoryAlgorithm`]
//!   whether each dome axis should move.
//! - [`sequencer::MotionSequencer`] serializes the hardware exchange for one
//!   axis: command the move, wait for the dome's target echo. At most one
//!   move is in flight per axis.
//! - [`vignetting::VignettingMonitor`] independently polls actual geometry
//!   and shutter telemetry and republishes a [`vignetting::VignettingReport`]
//!   on a fixed interval.
//!
//! External subsystems (the dome and the telescope mount) are reached
//! through typed channel bundles ([`dome::DomeFeedback`],
//! [`telemetry::TelemetrySet`]) and the [`dome::DomeCommands`] trait, so the
//! engine runs identically against real transport glue or the mock dome
//! used in tests.

pub mod algorithm;
pub mod angle;
pub mod config;
pub mod controller;
pub mod dome;
pub mod error;
pub mod sequencer;
pub mod target;
pub mod telemetry;
pub mod vignetting;

#[cfg(test)]
mod test_dome;

pub use algorithm::{SimpleAlgorithm, TrajectoryAlgorithm};
pub use config::{AlgorithmConfig, Config};
pub use controller::{ControlMessage, FollowController, FollowHandle, FollowOutcome};
pub use dome::{Axis, DomeCommands, DomeFeedback, MotionSample, MotionState, SummaryState};
pub use error::{CommandError, ConfigError, SequencerError};
pub use target::{AxisTarget, TargetSample, TelescopeTarget};
pub use vignetting::{Vignetted, VignettingMonitor, VignettingReport};
