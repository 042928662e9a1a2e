//! Follow controller: turns telescope-target updates into dome moves.
//!
//! The controller owns the current telescope target and, for every new data
//! point, asks the configured algorithm whether each dome axis should move.
//! Axis moves are handed to a [`MotionSequencer`] task; while that task is
//! in flight the axis is simply skipped on subsequent passes, so a burst of
//! target updates never puts two commands in flight for one axis.
//!
//! All inbound data arrives as messages: telescope-target samples on one
//! channel, control messages (the following-mode toggle) on another. The
//! outcome of every executed follow pass is broadcast as a
//! `(moved_elevation, moved_azimuth)` pair.

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::algorithm::TrajectoryAlgorithm;
use crate::config::Config;
use crate::dome::{Axis, DomeCommands, DomeFeedback};
use crate::error::ConfigError;
use crate::sequencer::{AxisMove, MotionSequencer};
use crate::target::{self, AxisTarget, TargetSample, TelescopeTarget};

/// Outcome of one follow pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowOutcome {
    pub moved_elevation: bool,
    pub moved_azimuth: bool,
}

/// Control messages accepted by the controller loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Enable or disable following. Disabling cancels any in-flight axis
    /// moves; enabling triggers an immediate follow pass.
    SetFollowingMode { enabled: bool },
}

/// Name and effective parameters of the active algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmInfo {
    pub name: &'static str,
    /// Human-readable parameter rendering.
    pub config: String,
}

/// Cheap handle for talking to a running [`FollowController`].
#[derive(Debug, Clone)]
pub struct FollowHandle {
    control_tx: mpsc::Sender<ControlMessage>,
    outcome_tx: broadcast::Sender<FollowOutcome>,
    following_rx: watch::Receiver<bool>,
    algorithm_info: AlgorithmInfo,
}

impl FollowHandle {
    /// Toggle following mode.
    pub async fn set_following_mode(&self, enabled: bool) {
        let _ = self
            .control_tx
            .send(ControlMessage::SetFollowingMode { enabled })
            .await;
    }

    /// Subscribe to follow-pass outcomes.
    pub fn outcomes(&self) -> broadcast::Receiver<FollowOutcome> {
        self.outcome_tx.subscribe()
    }

    /// Whether following is currently enabled.
    pub fn following(&self) -> bool {
        *self.following_rx.borrow()
    }

    /// Watch the following-enabled flag.
    pub fn following_changes(&self) -> watch::Receiver<bool> {
        self.following_rx.clone()
    }

    /// The active algorithm and its effective configuration.
    pub fn algorithm(&self) -> &AlgorithmInfo {
        &self.algorithm_info
    }
}

/// Orchestrates dome following of the telescope target stream.
#[derive(Debug)]
pub struct FollowController<C: DomeCommands> {
    algorithm: TrajectoryAlgorithm,
    enable_elevation: bool,
    feedback: DomeFeedback,
    azimuth_sequencer: MotionSequencer<C>,
    elevation_sequencer: MotionSequencer<C>,
    telescope_target: Option<TelescopeTarget>,
    /// Upcoming target from the scheduler, for look-ahead algorithms.
    next_telescope_target: Option<TelescopeTarget>,
    started: bool,
    azimuth_move: AxisMove,
    elevation_move: AxisMove,
    following_tx: watch::Sender<bool>,
    outcome_tx: broadcast::Sender<FollowOutcome>,
    control_rx: Option<mpsc::Receiver<ControlMessage>>,
}

impl<C: DomeCommands> FollowController<C> {
    /// Build a controller from a validated configuration.
    ///
    /// Following starts out disabled.
    pub fn new(
        config: &Config,
        commands: C,
        feedback: DomeFeedback,
    ) -> Result<(Self, FollowHandle), ConfigError> {
        config.validate()?;
        let algorithm = TrajectoryAlgorithm::from_config(&config.algorithm)?;
        let algorithm_info = AlgorithmInfo {
            name: algorithm.name(),
            config: algorithm.describe(),
        };

        let (control_tx, control_rx) = mpsc::channel(16);
        let (outcome_tx, _) = broadcast::channel(64);
        let (following_tx, following_rx) = watch::channel(false);

        let ack_timeout = config.command_timeout();
        let controller = Self {
            algorithm,
            enable_elevation: config.enable_elevation,
            azimuth_sequencer: MotionSequencer::new(
                Axis::Azimuth,
                commands.clone(),
                &feedback,
                ack_timeout,
            ),
            elevation_sequencer: MotionSequencer::new(
                Axis::Elevation,
                commands,
                &feedback,
                ack_timeout,
            ),
            feedback,
            telescope_target: None,
            next_telescope_target: None,
            started: false,
            azimuth_move: AxisMove::Idle,
            elevation_move: AxisMove::Idle,
            following_tx,
            outcome_tx: outcome_tx.clone(),
            control_rx: Some(control_rx),
        };
        let handle = FollowHandle {
            control_tx,
            outcome_tx,
            following_rx,
            algorithm_info,
        };
        Ok((controller, handle))
    }

    /// Run the controller loop until both inbound channels close.
    pub async fn run(mut self, mut targets: mpsc::Receiver<TargetSample>) {
        let Some(mut control) = self.control_rx.take() else {
            return;
        };
        self.started = true;
        info!(
            algorithm = self.algorithm.name(),
            "follow controller starting"
        );
        loop {
            tokio::select! {
                sample = targets.recv() => match sample {
                    Some(sample) => self.handle_target_sample(sample).await,
                    None => break,
                },
                message = control.recv() => match message {
                    Some(message) => self.handle_control(message).await,
                    None => break,
                },
            }
        }
        info!("follow controller stopping");
        self.azimuth_move.cancel();
        self.elevation_move.cancel();
        self.following_tx.send_replace(false);
    }

    /// Ingest one telescope-target sample and run a follow pass.
    pub async fn handle_target_sample(&mut self, sample: TargetSample) {
        self.telescope_target = Some(TelescopeTarget::from_sample(&sample));
        self.follow_target().await;
    }

    /// Record the upcoming scheduler target, for look-ahead algorithms.
    pub fn set_next_telescope_target(&mut self, target: Option<TelescopeTarget>) {
        self.next_telescope_target = target;
    }

    async fn handle_control(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::SetFollowingMode { enabled } => {
                self.set_following_mode(enabled).await;
            }
        }
    }

    /// Enable or disable following.
    pub async fn set_following_mode(&mut self, enabled: bool) {
        info!(enabled, "set following mode");
        self.following_tx.send_replace(enabled);
        if enabled {
            self.follow_target().await;
        } else {
            self.azimuth_move.cancel();
            self.elevation_move.cancel();
        }
    }

    fn following_enabled(&self) -> bool {
        *self.following_tx.borrow()
    }

    /// One follow pass: decide and dispatch moves for each idle axis.
    ///
    /// A no-op (no outcome published) when following is disabled, startup
    /// has not completed, or no telescope target has been seen yet.
    pub async fn follow_target(&mut self) {
        if !self.following_enabled() || !self.started {
            return;
        }
        let Some(telescope_target) = self.telescope_target else {
            return;
        };

        let mut moved_elevation = false;
        if self.enable_elevation
            && self.elevation_move.is_idle()
            && self.feedback.has_motion_data(Axis::Elevation)
        {
            moved_elevation = self.move_axis_if_needed(Axis::Elevation, &telescope_target);
        }

        let mut moved_azimuth = false;
        if self.azimuth_move.is_idle() && self.feedback.has_motion_data(Axis::Azimuth) {
            moved_azimuth = self.move_axis_if_needed(Axis::Azimuth, &telescope_target);
        } else {
            debug!("previous dome azimuth move still in flight");
        }

        let _ = self.outcome_tx.send(FollowOutcome {
            moved_elevation,
            moved_azimuth,
        });
    }

    /// Ask the algorithm about one axis and dispatch a sequencer task if a
    /// move is warranted. Returns whether a move was started.
    fn move_axis_if_needed(&mut self, axis: Axis, telescope_target: &TelescopeTarget) -> bool {
        let dome_target = self.dome_target(axis);
        let next = self.next_telescope_target.as_ref();
        let desired = match axis {
            Axis::Elevation => {
                self.algorithm
                    .desired_dome_elevation(dome_target, telescope_target, next)
            }
            Axis::Azimuth => {
                self.algorithm
                    .desired_dome_azimuth(dome_target, telescope_target, next)
            }
        };

        let Some(desired) = desired else {
            debug!(%axis, "dome within threshold; not moving");
            return false;
        };
        // Elevation moves only use the position; azimuth moves also command
        // the velocity, so both must be finite there.
        let valid = match axis {
            Axis::Elevation => desired.position.is_finite(),
            Axis::Azimuth => desired.is_finite(),
        };
        if !valid {
            warn!(%axis, ?desired, "desired dome target invalid; not moving");
            return false;
        }

        let (sequencer, axis_move) = match axis {
            Axis::Azimuth => (self.azimuth_sequencer.clone(), &mut self.azimuth_move),
            Axis::Elevation => (self.elevation_sequencer.clone(), &mut self.elevation_move),
        };
        axis_move.start(tokio::spawn(sequencer.execute(desired)));
        true
    }

    /// Last acknowledged dome target for an axis, referenced to now.
    ///
    /// `None` until the dome has echoed a target, or while the echo carries
    /// a non-finite position (an axis that has never been commanded).
    fn dome_target(&self, axis: Axis) -> Option<AxisTarget> {
        let echo = (*self.feedback.target(axis).borrow())?;
        if !echo.position.is_finite() {
            return None;
        }
        Some(AxisTarget::new(
            echo.position,
            echo.velocity,
            target::now_tai(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dome::{feedback_channels, MotionSample, MotionState, TargetEcho};
    use crate::test_dome::RecordingDome;
    use std::time::Duration;

    fn stopped() -> MotionSample {
        MotionSample {
            state: MotionState::Stopped,
            in_position: true,
        }
    }

    fn sample(elevation: f64, azimuth: f64) -> TargetSample {
        TargetSample {
            elevation,
            elevation_velocity: 0.0,
            azimuth,
            azimuth_velocity: 0.0,
            tai: target::now_tai(),
        }
    }

    fn config() -> Config {
        Config {
            enable_elevation: true,
            ..Config::default()
        }
    }

    async fn enabled_controller(
        config: &Config,
    ) -> (
        FollowController<RecordingDome>,
        FollowHandle,
        crate::dome::DomeFeedbackSender,
        tokio::sync::mpsc::UnboundedReceiver<(Axis, f64, Option<f64>)>,
    ) {
        let (dome, moves_rx) = RecordingDome::new();
        let (feedback_tx, feedback) = feedback_channels();
        let (mut controller, handle) = FollowController::new(config, dome, feedback).unwrap();
        controller.started = true;
        controller.set_following_mode(true).await;
        (controller, handle, feedback_tx, moves_rx)
    }

    #[tokio::test]
    async fn test_pass_is_noop_when_disabled() {
        let config = config();
        let (mut controller, handle, feedback_tx, mut moves_rx) =
            enabled_controller(&config).await;
        controller.set_following_mode(false).await;
        let mut outcomes = handle.outcomes();

        feedback_tx.set_motion(Axis::Azimuth, stopped());
        feedback_tx.set_motion(Axis::Elevation, stopped());
        controller.handle_target_sample(sample(40.0, 0.0)).await;

        assert!(outcomes.try_recv().is_err());
        assert!(moves_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pass_is_noop_without_target() {
        let config = config();
        let (mut controller, handle, feedback_tx, _moves_rx) = enabled_controller(&config).await;
        let mut outcomes = handle.outcomes();

        feedback_tx.set_motion(Axis::Azimuth, stopped());
        controller.follow_target().await;
        assert!(outcomes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_first_pass_moves_both_axes() {
        let config = config();
        let (mut controller, handle, feedback_tx, mut moves_rx) =
            enabled_controller(&config).await;
        let mut outcomes = handle.outcomes();

        feedback_tx.set_motion(Axis::Azimuth, stopped());
        feedback_tx.set_motion(Axis::Elevation, stopped());
        controller.handle_target_sample(sample(40.0, 0.0)).await;

        let outcome = outcomes.recv().await.unwrap();
        assert_eq!(
            outcome,
            FollowOutcome {
                moved_elevation: true,
                moved_azimuth: true,
            }
        );
        let mut moved = [moves_rx.recv().await.unwrap(), moves_rx.recv().await.unwrap()];
        moved.sort_by_key(|(axis, _, _)| *axis == Axis::Elevation);
        assert_eq!(moved[0].0, Axis::Azimuth);
        assert_eq!(moved[0].1, 0.0);
        assert_eq!(moved[1].0, Axis::Elevation);
        assert_eq!(moved[1].1, 40.0);
    }

    #[tokio::test]
    async fn test_axis_needs_motion_data() {
        let config = config();
        let (mut controller, handle, feedback_tx, _moves_rx) = enabled_controller(&config).await;
        let mut outcomes = handle.outcomes();

        // Only azimuth has reported; elevation must be skipped.
        feedback_tx.set_motion(Axis::Azimuth, stopped());
        controller.handle_target_sample(sample(40.0, 0.0)).await;

        let outcome = outcomes.recv().await.unwrap();
        assert_eq!(
            outcome,
            FollowOutcome {
                moved_elevation: false,
                moved_azimuth: true,
            }
        );
    }

    #[tokio::test]
    async fn test_elevation_disabled_by_config() {
        let config = Config::default(); // enable_elevation: false
        let (mut controller, handle, feedback_tx, mut moves_rx) =
            enabled_controller(&config).await;
        let mut outcomes = handle.outcomes();

        feedback_tx.set_motion(Axis::Azimuth, stopped());
        feedback_tx.set_motion(Axis::Elevation, stopped());
        controller.handle_target_sample(sample(40.0, 0.0)).await;

        let outcome = outcomes.recv().await.unwrap();
        assert!(!outcome.moved_elevation);
        assert!(outcome.moved_azimuth);

        let (axis, _, _) = moves_rx.recv().await.unwrap();
        assert_eq!(axis, Axis::Azimuth);
        assert!(moves_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_within_threshold_no_move() {
        let config = config();
        let (mut controller, handle, feedback_tx, _moves_rx) = enabled_controller(&config).await;
        let mut outcomes = handle.outcomes();

        feedback_tx.set_motion(Axis::Azimuth, stopped());
        feedback_tx.set_motion(Axis::Elevation, stopped());
        // Dome already acknowledged targets matching the telescope.
        feedback_tx.set_target(
            Axis::Azimuth,
            TargetEcho {
                position: 0.0,
                velocity: 0.0,
            },
        );
        feedback_tx.set_target(
            Axis::Elevation,
            TargetEcho {
                position: 40.0,
                velocity: 0.0,
            },
        );

        controller.handle_target_sample(sample(40.0, 0.0)).await;
        let outcome = outcomes.recv().await.unwrap();
        assert_eq!(
            outcome,
            FollowOutcome {
                moved_elevation: false,
                moved_azimuth: false,
            }
        );

        // Repeating the same target stays quiet: following is idempotent.
        controller.handle_target_sample(sample(40.0, 0.0)).await;
        let outcome = outcomes.recv().await.unwrap();
        assert_eq!(
            outcome,
            FollowOutcome {
                moved_elevation: false,
                moved_azimuth: false,
            }
        );
    }

    #[tokio::test]
    async fn test_nan_echo_reads_as_unknown_dome_target() {
        let config = config();
        let (mut controller, handle, feedback_tx, mut moves_rx) =
            enabled_controller(&config).await;
        let mut outcomes = handle.outcomes();

        feedback_tx.set_motion(Axis::Azimuth, stopped());
        feedback_tx.set_motion(Axis::Elevation, stopped());
        // An axis that has never been commanded echoes NaN.
        feedback_tx.set_target(
            Axis::Azimuth,
            TargetEcho {
                position: f64::NAN,
                velocity: 0.0,
            },
        );
        feedback_tx.set_target(
            Axis::Elevation,
            TargetEcho {
                position: 40.0,
                velocity: 0.0,
            },
        );

        controller.handle_target_sample(sample(40.0, 0.0)).await;
        let outcome = outcomes.recv().await.unwrap();
        assert!(outcome.moved_azimuth);
        assert!(!outcome.moved_elevation);
        let (axis, position, _) = moves_rx.recv().await.unwrap();
        assert_eq!(axis, Axis::Azimuth);
        assert_eq!(position, 0.0);
    }

    #[tokio::test]
    async fn test_non_finite_target_sample_moves_nothing() {
        let config = config();
        let (mut controller, handle, feedback_tx, mut moves_rx) =
            enabled_controller(&config).await;
        let mut outcomes = handle.outcomes();

        feedback_tx.set_motion(Axis::Azimuth, stopped());
        feedback_tx.set_motion(Axis::Elevation, stopped());
        feedback_tx.set_target(
            Axis::Azimuth,
            TargetEcho {
                position: 100.0,
                velocity: 0.0,
            },
        );
        feedback_tx.set_target(
            Axis::Elevation,
            TargetEcho {
                position: 10.0,
                velocity: 0.0,
            },
        );

        // A corrupt sample yields non-finite desired targets; both axes are
        // skipped and nothing reaches the hardware.
        controller
            .handle_target_sample(sample(f64::NAN, f64::NAN))
            .await;
        let outcome = outcomes.recv().await.unwrap();
        assert_eq!(
            outcome,
            FollowOutcome {
                moved_elevation: false,
                moved_azimuth: false,
            }
        );
        assert!(moves_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_busy_axis_is_skipped() {
        let config = config();
        let (mut controller, handle, feedback_tx, _moves_rx) = enabled_controller(&config).await;
        let mut outcomes = handle.outcomes();

        feedback_tx.set_motion(Axis::Azimuth, stopped());
        feedback_tx.set_motion(Axis::Elevation, stopped());
        // Pretend a previous azimuth move is still waiting for its ack.
        controller.azimuth_move.start(tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<(), crate::error::SequencerError>(())
        }));

        controller.handle_target_sample(sample(40.0, 90.0)).await;
        let outcome = outcomes.recv().await.unwrap();
        assert!(!outcome.moved_azimuth);
        assert!(outcome.moved_elevation);
    }

    #[tokio::test]
    async fn test_disable_cancels_in_flight_moves() {
        let config = config();
        let (mut controller, _handle, _feedback_tx, _moves_rx) =
            enabled_controller(&config).await;

        controller.azimuth_move.start(tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<(), crate::error::SequencerError>(())
        }));
        assert!(!controller.azimuth_move.is_idle());

        controller.set_following_mode(false).await;
        assert!(controller.azimuth_move.is_idle());
        assert!(!controller.following_enabled());
    }

    #[tokio::test]
    async fn test_handle_reports_algorithm() {
        let config = config();
        let (_controller, handle, _feedback_tx, _moves_rx) = enabled_controller(&config).await;
        assert_eq!(handle.algorithm().name, "simple");
        assert!(handle.algorithm().config.contains("max_delta_azimuth"));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let (dome, _moves_rx) = RecordingDome::new();
        let (_feedback_tx, feedback) = feedback_channels();
        let bad = Config {
            algorithm: crate::config::AlgorithmConfig::Simple {
                max_delta_azimuth: -1.0,
                max_delta_elevation: 6.0,
            },
            ..Config::default()
        };
        assert!(FollowController::new(&bad, dome, feedback).is_err());
    }
}
