//! Per-axis motion sequencing.
//!
//! A [`MotionSequencer`] serializes hardware motion for one axis: it sends
//! the move command and waits for the dome to echo the new target, which is
//! the hardware-side confirmation that the command was accepted. The caller
//! tracks the spawned task in an [`AxisMove`] and never dispatches a second
//! move for the axis while one is in flight.
//!
//! Policy note: a new move is allowed to supersede an in-progress slew, so
//! the sequencer never issues a stop before moving. Mutual exclusion only
//! covers the command/acknowledgment window.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::dome::{Axis, DomeCommands, DomeFeedback, MotionSample, TargetEcho};
use crate::error::SequencerError;
use crate::target::AxisTarget;

/// Sequences motion commands for a single dome axis.
///
/// Cloning is cheap; each spawned move consumes its own clone so the
/// feedback receivers can be awaited independently.
#[derive(Debug, Clone)]
pub struct MotionSequencer<C: DomeCommands> {
    axis: Axis,
    commands: C,
    motion: tokio::sync::watch::Receiver<Option<MotionSample>>,
    target_echo: tokio::sync::watch::Receiver<Option<TargetEcho>>,
    ack_timeout: Duration,
}

impl<C: DomeCommands> MotionSequencer<C> {
    /// Create a sequencer for one axis.
    pub fn new(axis: Axis, commands: C, feedback: &DomeFeedback, ack_timeout: Duration) -> Self {
        Self {
            axis,
            commands,
            motion: feedback.motion(axis).clone(),
            target_echo: feedback.target(axis).clone(),
            ack_timeout,
        }
    }

    /// Command a move and wait for the target echo.
    ///
    /// Returns without commanding anything if the dome has never reported a
    /// motion state for this axis; commanding blind is not safe. Any failure
    /// other than cancellation is logged here with full context and
    /// propagated so the owning task is marked failed.
    pub async fn execute(mut self, target: AxisTarget) -> Result<(), SequencerError> {
        if self.motion.borrow().is_none() {
            warn!(axis = %self.axis, "no motion feedback yet; not moving the dome");
            return Ok(());
        }

        // Azimuth moves carry the commanded velocity; elevation moves do not.
        let velocity = match self.axis {
            Axis::Azimuth => Some(target.velocity),
            Axis::Elevation => None,
        };

        // Any echo already buffered belongs to a previous command.
        self.target_echo.borrow_and_update();

        debug!(
            axis = %self.axis,
            position = target.position,
            ?velocity,
            "starting dome motion"
        );

        let result = self.command_and_await_echo(target.position, velocity).await;
        if let Err(err) = &result {
            error!(axis = %self.axis, %err, "failed to move dome axis");
        }
        result
    }

    async fn command_and_await_echo(
        &mut self,
        position: f64,
        velocity: Option<f64>,
    ) -> Result<(), SequencerError> {
        self.commands
            .move_axis(self.axis, position, velocity)
            .await?;

        match timeout(self.ack_timeout, self.target_echo.changed()).await {
            Err(_) => Err(SequencerError::AckTimeout {
                axis: self.axis,
                timeout: self.ack_timeout,
            }),
            Ok(Err(_)) => Err(SequencerError::FeedbackClosed { axis: self.axis }),
            Ok(Ok(())) => Ok(()),
        }
    }
}

/// In-flight move tracking for one axis.
///
/// Exactly one move may run per axis; the owner checks [`AxisMove::is_idle`]
/// before dispatching another. Failures are logged by the sequencer task
/// itself, so a finished-with-error handle simply reads as idle again.
#[derive(Debug, Default)]
pub enum AxisMove {
    #[default]
    Idle,
    Running(JoinHandle<Result<(), SequencerError>>),
}

impl AxisMove {
    /// True if no move is in flight (never started, finished, or failed).
    pub fn is_idle(&self) -> bool {
        match self {
            AxisMove::Idle => true,
            AxisMove::Running(handle) => handle.is_finished(),
        }
    }

    /// Start tracking a spawned move task.
    pub fn start(&mut self, handle: JoinHandle<Result<(), SequencerError>>) {
        *self = AxisMove::Running(handle);
    }

    /// Cancel any in-flight move and return to idle.
    ///
    /// Cancellation is observed at the task's next suspension point; it is
    /// not an error.
    pub fn cancel(&mut self) {
        if let AxisMove::Running(handle) = self {
            handle.abort();
        }
        *self = AxisMove::Idle;
    }
}
