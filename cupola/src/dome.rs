//! Dome hardware interface: command trait and feedback streams.
//!
//! The dome is an external subsystem reached over a typed message transport.
//! Commands are acknowledged request/response exchanges; feedback arrives as
//! last-value streams carried on [`tokio::sync::watch`] channels, one per
//! topic. A fresh receiver holds `None` until the dome has reported at least
//! once, which is how "no feedback yet" is distinguished from any real state.

use std::future::Future;

use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::watch;

use crate::error::CommandError;

/// One independently-actuated rotational axis of the dome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum Axis {
    Azimuth,
    /// The light/wind screen; tracks telescope elevation when enabled.
    Elevation,
}

/// Motion state of one dome axis, as reported by the hardware.
///
/// The engine never invents a state; it only reacts to what the dome
/// reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MotionState {
    Stopped,
    Moving,
    Stopping,
    /// Tracking at a constant nonzero velocity after a move completes.
    Crawling,
}

/// One per-axis motion-state sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub state: MotionState,
    /// True once the axis is within its in-position window.
    pub in_position: bool,
}

/// Per-axis target echo: the dome's acknowledgment of a commanded target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetEcho {
    /// Acknowledged position in degrees. May be NaN before the axis has
    /// ever been commanded.
    pub position: f64,
    /// Acknowledged velocity in degrees/second.
    pub velocity: f64,
}

/// Summary state of an external subsystem (dome or telescope mount).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryState {
    Offline,
    Standby,
    Disabled,
    Enabled,
    Fault,
}

impl SummaryState {
    /// True for the states in which subsystem telemetry is trustworthy.
    pub fn is_operational(self) -> bool {
        matches!(self, SummaryState::Disabled | SummaryState::Enabled)
    }
}

/// Acknowledged command interface to the dome.
///
/// Implementations are cheap handles (clonable, shared transport) so each
/// spawned move task can own one. A returned `Ok` means the dome accepted
/// the request, not that any motion has finished.
pub trait DomeCommands: Clone + Send + Sync + 'static {
    /// Command an axis to a new position. Azimuth moves carry a velocity;
    /// elevation moves do not.
    fn move_axis(
        &self,
        axis: Axis,
        position: f64,
        velocity: Option<f64>,
    ) -> impl Future<Output = Result<(), CommandError>> + Send;

    /// Stop any motion on an axis.
    fn stop_axis(&self, axis: Axis) -> impl Future<Output = Result<(), CommandError>> + Send;
}

/// Receiver half of the dome feedback streams.
#[derive(Debug, Clone)]
pub struct DomeFeedback {
    pub azimuth_motion: watch::Receiver<Option<MotionSample>>,
    pub elevation_motion: watch::Receiver<Option<MotionSample>>,
    pub azimuth_target: watch::Receiver<Option<TargetEcho>>,
    pub elevation_target: watch::Receiver<Option<TargetEcho>>,
}

impl DomeFeedback {
    /// Motion-state stream for one axis.
    pub fn motion(&self, axis: Axis) -> &watch::Receiver<Option<MotionSample>> {
        match axis {
            Axis::Azimuth => &self.azimuth_motion,
            Axis::Elevation => &self.elevation_motion,
        }
    }

    /// Target-echo stream for one axis.
    pub fn target(&self, axis: Axis) -> &watch::Receiver<Option<TargetEcho>> {
        match axis {
            Axis::Azimuth => &self.azimuth_target,
            Axis::Elevation => &self.elevation_target,
        }
    }

    /// True once the dome has reported at least one motion sample for `axis`.
    pub fn has_motion_data(&self, axis: Axis) -> bool {
        self.motion(axis).borrow().is_some()
    }
}

/// Sender half of the dome feedback streams, held by the dome (or a mock).
#[derive(Debug)]
pub struct DomeFeedbackSender {
    pub azimuth_motion: watch::Sender<Option<MotionSample>>,
    pub elevation_motion: watch::Sender<Option<MotionSample>>,
    pub azimuth_target: watch::Sender<Option<TargetEcho>>,
    pub elevation_target: watch::Sender<Option<TargetEcho>>,
}

impl DomeFeedbackSender {
    /// Publish a motion-state sample for one axis.
    pub fn set_motion(&self, axis: Axis, sample: MotionSample) {
        let sender = match axis {
            Axis::Azimuth => &self.azimuth_motion,
            Axis::Elevation => &self.elevation_motion,
        };
        sender.send_replace(Some(sample));
    }

    /// Publish a target echo for one axis.
    pub fn set_target(&self, axis: Axis, echo: TargetEcho) {
        let sender = match axis {
            Axis::Azimuth => &self.azimuth_target,
            Axis::Elevation => &self.elevation_target,
        };
        sender.send_replace(Some(echo));
    }
}

/// Create the paired sender/receiver bundles for dome feedback.
///
/// All streams start out with no data.
pub fn feedback_channels() -> (DomeFeedbackSender, DomeFeedback) {
    let (azimuth_motion_tx, azimuth_motion) = watch::channel(None);
    let (elevation_motion_tx, elevation_motion) = watch::channel(None);
    let (azimuth_target_tx, azimuth_target) = watch::channel(None);
    let (elevation_target_tx, elevation_target) = watch::channel(None);
    (
        DomeFeedbackSender {
            azimuth_motion: azimuth_motion_tx,
            elevation_motion: elevation_motion_tx,
            azimuth_target: azimuth_target_tx,
            elevation_target: elevation_target_tx,
        },
        DomeFeedback {
            azimuth_motion,
            elevation_motion,
            azimuth_target,
            elevation_target,
        },
    )
}
