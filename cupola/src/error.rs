//! Error types for configuration, dome commands, and motion sequencing.

use std::time::Duration;

use thiserror::Error;

use crate::dome::Axis;

/// Errors raised while validating or constructing from configuration.
///
/// These are fatal at configuration time: a config that produces one of
/// these is rejected before it is ever applied.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration value failed to deserialize (bad shape, unknown
    /// algorithm name, unexpected field).
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A parameter that must be non-negative was negative.
    #[error("{name}={value} must not be negative")]
    NegativeParameter {
        /// Parameter name as it appears in the configuration.
        name: &'static str,
        value: f64,
    },

    /// A partial threshold exceeds the matching full threshold.
    #[error("{name}: partial threshold {partial} is inconsistent with full threshold {full}")]
    ThresholdOrder {
        name: &'static str,
        partial: f64,
        full: f64,
    },

    /// The command timeout must be positive.
    #[error("command_timeout={0}s must be positive")]
    NonPositiveTimeout(f64),
}

/// Errors reported by the dome command interface.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The dome refused the command (wrong state, out of range, ...).
    #[error("dome rejected {axis} command: {reason}")]
    Rejected {
        axis: Axis,
        /// Dome-reported reason, verbatim.
        reason: String,
    },

    /// The command transport is gone.
    #[error("dome {axis} command channel closed")]
    ChannelClosed { axis: Axis },
}

/// Errors from sequencing a single axis move.
#[derive(Error, Debug)]
pub enum SequencerError {
    /// The move or stop command itself failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The dome did not echo the new target within the timeout.
    ///
    /// The echo confirms the hardware accepted the command, not that the
    /// slew is complete.
    #[error("timed out after {timeout:?} waiting for {axis} target acknowledgment")]
    AckTimeout { axis: Axis, timeout: Duration },

    /// A feedback channel closed while waiting on it.
    #[error("{axis} feedback channel closed")]
    FeedbackClosed { axis: Axis },
}
