//! Minimal dome-command recorder for unit tests.

use tokio::sync::mpsc;

use crate::dome::{Axis, DomeCommands};
use crate::error::CommandError;

/// Accepts every command and records moves on an unbounded channel.
#[derive(Debug, Clone)]
pub(crate) struct RecordingDome {
    moves: mpsc::UnboundedSender<(Axis, f64, Option<f64>)>,
}

impl RecordingDome {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<(Axis, f64, Option<f64>)>) {
        let (moves, moves_rx) = mpsc::unbounded_channel();
        (Self { moves }, moves_rx)
    }
}

impl DomeCommands for RecordingDome {
    async fn move_axis(
        &self,
        axis: Axis,
        position: f64,
        velocity: Option<f64>,
    ) -> Result<(), CommandError> {
        let _ = self.moves.send((axis, position, velocity));
        Ok(())
    }

    async fn stop_axis(&self, _axis: Axis) -> Result<(), CommandError> {
        Ok(())
    }
}
