//! Mock dome hardware and an end-to-end harness for exercising the engine.
//!
//! [`MockDome`] stands in for the real enclosure: each axis is a simple
//! constant-speed actuator, commands are acknowledged with the same target
//! echoes the real dome produces, and a background loop publishes actual
//! positions as telemetry. [`Harness`] wires a mock dome, a running
//! [`FollowController`], and the telemetry channels together so integration
//! tests only deal in telescope targets and observed outcomes.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;

use cupola::angle;
use cupola::config::Config;
use cupola::controller::{FollowController, FollowHandle, FollowOutcome};
use cupola::dome::{
    feedback_channels, Axis, DomeCommands, DomeFeedback, DomeFeedbackSender, MotionSample,
    MotionState, SummaryState, TargetEcho,
};
use cupola::error::{CommandError, ConfigError};
use cupola::target::{now_tai, TargetSample};
use cupola::telemetry::{telemetry_channels, TelemetrySender, TelemetrySet};
use cupola::vignetting::{MonitorHandle, VignettingMonitor, VignettingReport};

/// Default axis speed in degrees/second. Fast, so tests settle quickly.
const DEFAULT_AXIS_SPEED: f64 = 200.0;

/// How often the mock publishes actual-position telemetry.
const TELEMETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// One mock actuator: a constant-speed slew from wherever it was when
/// commanded, optionally followed by a constant crawl.
#[derive(Debug)]
struct MockAxis {
    /// Whether positions live on the `[0, 360)` circle.
    wrap: bool,
    speed: f64,
    start_position: f64,
    delta: f64,
    start_tai: f64,
    end_tai: f64,
    crawl_velocity: f64,
}

impl MockAxis {
    fn new(wrap: bool, position: f64) -> Self {
        Self {
            wrap,
            speed: DEFAULT_AXIS_SPEED,
            start_position: position,
            delta: 0.0,
            start_tai: 0.0,
            end_tai: 0.0,
            crawl_velocity: 0.0,
        }
    }

    /// Start a slew toward `position`, taking the shortest path on wrapped
    /// axes. Returns the slew duration.
    fn command(&mut self, position: f64, velocity: f64, now: f64) -> Duration {
        let current = self.position(now);
        let delta = if self.wrap {
            angle::diff(position, current)
        } else {
            position - current
        };
        self.start_position = current;
        self.delta = delta;
        self.start_tai = now;
        self.end_tai = now + delta.abs() / self.speed;
        self.crawl_velocity = velocity;
        Duration::from_secs_f64(self.end_tai - now)
    }

    fn position(&self, tai: f64) -> f64 {
        let position = if tai >= self.end_tai {
            self.start_position + self.delta + self.crawl_velocity * (tai - self.end_tai)
        } else if tai <= self.start_tai {
            self.start_position
        } else {
            let frac = (tai - self.start_tai) / (self.end_tai - self.start_tai);
            self.start_position + self.delta * frac
        };
        if self.wrap {
            angle::wrap_nonnegative(position)
        } else {
            position
        }
    }

    /// Freeze the axis at its current position.
    fn stop(&mut self, now: f64) {
        self.start_position = self.position(now);
        self.delta = 0.0;
        self.start_tai = now;
        self.end_tai = now;
        self.crawl_velocity = 0.0;
    }

    fn done(&self, now: f64) -> bool {
        now >= self.end_tai
    }
}

#[derive(Debug)]
struct MockState {
    azimuth: MockAxis,
    elevation: MockAxis,
    azimuth_moves: usize,
    elevation_moves: usize,
    azimuth_done: Option<JoinHandle<()>>,
    elevation_done: Option<JoinHandle<()>>,
    telemetry_task: Option<JoinHandle<()>>,
}

/// Simulated dome enclosure.
///
/// Implements [`DomeCommands`] against the same feedback and telemetry
/// channels the real transport glue would drive. Azimuth wraps and supports
/// a crawl velocity; elevation is a plain point-to-point actuator. The
/// target echo for a command can be delayed with [`MockDome::with_ack_delay`]
/// to hold the command/acknowledgment window open.
#[derive(Debug, Clone)]
pub struct MockDome {
    state: Arc<Mutex<MockState>>,
    feedback: Arc<DomeFeedbackSender>,
    telemetry: Arc<TelemetrySender>,
    ack_delay: Duration,
}

impl MockDome {
    pub fn new(feedback: DomeFeedbackSender, telemetry: Arc<TelemetrySender>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                azimuth: MockAxis::new(true, 0.0),
                elevation: MockAxis::new(false, 0.0),
                azimuth_moves: 0,
                elevation_moves: 0,
                azimuth_done: None,
                elevation_done: None,
                telemetry_task: None,
            })),
            feedback: Arc::new(feedback),
            telemetry,
            ack_delay: Duration::ZERO,
        }
    }

    /// Delay target echoes by `delay` after each accepted move command.
    pub fn with_ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = delay;
        self
    }

    /// Override both axis speeds (degrees/second).
    pub fn with_speed(self, speed: f64) -> Self {
        {
            let mut state = self.lock();
            state.azimuth.speed = speed;
            state.elevation.speed = speed;
        }
        self
    }

    /// Bring the mock online: report both axes stopped, echo the
    /// never-commanded NaN targets, publish an ENABLED summary state, and
    /// start the actual-position telemetry loop.
    pub fn start(&self) {
        for axis in [Axis::Azimuth, Axis::Elevation] {
            self.feedback.set_motion(
                axis,
                MotionSample {
                    state: MotionState::Stopped,
                    in_position: true,
                },
            );
            self.feedback.set_target(
                axis,
                TargetEcho {
                    position: f64::NAN,
                    velocity: 0.0,
                },
            );
        }
        self.telemetry
            .dome_state
            .send_replace(Some(SummaryState::Enabled));

        let state = self.state.clone();
        let telemetry = self.telemetry.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TELEMETRY_INTERVAL);
            loop {
                ticker.tick().await;
                let now = now_tai();
                let (azimuth, elevation) = {
                    let state = lock_state(&state);
                    (state.azimuth.position(now), state.elevation.position(now))
                };
                telemetry.dome_azimuth.send_replace(Some(azimuth));
                telemetry.dome_elevation.send_replace(Some(elevation));
            }
        });
        self.lock().telemetry_task = Some(task);
    }

    /// Abort the telemetry loop and any pending motion-done tasks.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        let tasks = [
            state.azimuth_done.take(),
            state.elevation_done.take(),
            state.telemetry_task.take(),
        ];
        for task in tasks.into_iter().flatten() {
            task.abort();
        }
    }

    /// Current actual position of one axis in degrees.
    pub fn position(&self, axis: Axis) -> f64 {
        let now = now_tai();
        let state = self.lock();
        match axis {
            Axis::Azimuth => state.azimuth.position(now),
            Axis::Elevation => state.elevation.position(now),
        }
    }

    /// How many move commands this axis has accepted.
    pub fn move_count(&self, axis: Axis) -> usize {
        let state = self.lock();
        match axis {
            Axis::Azimuth => state.azimuth_moves,
            Axis::Elevation => state.elevation_moves,
        }
    }

    /// True once neither axis is mid-slew.
    pub fn is_settled(&self) -> bool {
        let now = now_tai();
        let state = self.lock();
        state.azimuth.done(now) && state.elevation.done(now)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl DomeCommands for MockDome {
    async fn move_axis(
        &self,
        axis: Axis,
        position: f64,
        velocity: Option<f64>,
    ) -> Result<(), CommandError> {
        if !position.is_finite() {
            return Err(CommandError::Rejected {
                axis,
                reason: format!("non-finite position {position}"),
            });
        }
        let crawl = velocity.unwrap_or(0.0);
        let now = now_tai();
        let duration = {
            let mut state = self.lock();
            match axis {
                Axis::Azimuth => {
                    state.azimuth_moves += 1;
                    state.azimuth.command(position, crawl, now)
                }
                Axis::Elevation => {
                    state.elevation_moves += 1;
                    state.elevation.command(position, 0.0, now)
                }
            }
        };
        debug!(%axis, position, crawl, ?duration, "mock dome move");

        self.feedback.set_motion(
            axis,
            MotionSample {
                state: MotionState::Moving,
                in_position: false,
            },
        );

        // A nonzero azimuth velocity leaves the axis crawling after the slew.
        let end_state = if axis == Axis::Azimuth && crawl != 0.0 {
            MotionState::Crawling
        } else {
            MotionState::Stopped
        };
        let feedback = self.feedback.clone();
        let done = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            feedback.set_motion(
                axis,
                MotionSample {
                    state: end_state,
                    in_position: true,
                },
            );
        });
        {
            let mut state = self.lock();
            let slot = match axis {
                Axis::Azimuth => &mut state.azimuth_done,
                Axis::Elevation => &mut state.elevation_done,
            };
            // A superseding move owns the axis outcome now.
            if let Some(old) = slot.replace(done) {
                old.abort();
            }
        }

        let feedback = self.feedback.clone();
        let ack_delay = self.ack_delay;
        let echo = TargetEcho {
            position,
            velocity: crawl,
        };
        tokio::spawn(async move {
            if !ack_delay.is_zero() {
                tokio::time::sleep(ack_delay).await;
            }
            feedback.set_target(axis, echo);
        });
        Ok(())
    }

    async fn stop_axis(&self, axis: Axis) -> Result<(), CommandError> {
        let now = now_tai();
        {
            let mut state = self.lock();
            let state = &mut *state;
            let (actuator, slot) = match axis {
                Axis::Azimuth => (&mut state.azimuth, &mut state.azimuth_done),
                Axis::Elevation => (&mut state.elevation, &mut state.elevation_done),
            };
            actuator.stop(now);
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
        self.feedback.set_motion(
            axis,
            MotionSample {
                state: MotionState::Stopped,
                in_position: true,
            },
        );
        Ok(())
    }
}

/// A fully wired engine instance over a mock dome.
///
/// Construction starts the mock, spawns the controller loop, and enables
/// following; tests then push telescope targets and read outcomes.
pub struct Harness {
    pub dome: MockDome,
    pub handle: FollowHandle,
    /// Sender half of all telemetry streams (telescope side set by tests).
    pub telemetry: Arc<TelemetrySender>,
    pub telemetry_set: TelemetrySet,
    pub feedback: DomeFeedback,
    targets: mpsc::Sender<TargetSample>,
    outcomes: broadcast::Receiver<FollowOutcome>,
    controller_task: JoinHandle<()>,
    ack_delay: Duration,
}

impl Harness {
    /// Start with an immediately-acknowledging mock dome.
    pub async fn start(config: Config) -> Result<Self, ConfigError> {
        Self::start_with(config, Duration::ZERO).await
    }

    /// Start with the mock dome delaying target echoes by `ack_delay`.
    pub async fn start_with(config: Config, ack_delay: Duration) -> Result<Self, ConfigError> {
        init_tracing();
        let (feedback_tx, feedback) = feedback_channels();
        let (telemetry_tx, telemetry_set) = telemetry_channels();
        let telemetry = Arc::new(telemetry_tx);
        let dome = MockDome::new(feedback_tx, telemetry.clone()).with_ack_delay(ack_delay);
        dome.start();

        let (controller, handle) = FollowController::new(&config, dome.clone(), feedback.clone())?;
        let (targets, targets_rx) = mpsc::channel(16);
        let outcomes = handle.outcomes();
        let controller_task = tokio::spawn(controller.run(targets_rx));
        handle.set_following_mode(true).await;

        Ok(Self {
            dome,
            handle,
            telemetry,
            telemetry_set,
            feedback,
            targets,
            outcomes,
            controller_task,
            ack_delay,
        })
    }

    /// Push one target sample and wait for the resulting follow outcome.
    pub async fn send(&mut self, sample: TargetSample) -> Option<FollowOutcome> {
        if self.targets.send(sample).await.is_err() {
            return None;
        }
        self.next_outcome(Duration::from_secs(2)).await
    }

    /// Push a stationary target and wait for the follow outcome.
    pub async fn send_target(&mut self, elevation: f64, azimuth: f64) -> Option<FollowOutcome> {
        self.send(TargetSample {
            elevation,
            elevation_velocity: 0.0,
            azimuth,
            azimuth_velocity: 0.0,
            tai: now_tai(),
        })
        .await
    }

    /// Push a target without waiting for an outcome.
    pub async fn send_sample(&self, elevation: f64, azimuth: f64) {
        let _ = self
            .targets
            .send(TargetSample {
                elevation,
                elevation_velocity: 0.0,
                azimuth,
                azimuth_velocity: 0.0,
                tai: now_tai(),
            })
            .await;
    }

    /// Next follow outcome, or `None` if nothing arrives within `wait`.
    pub async fn next_outcome(&mut self, wait: Duration) -> Option<FollowOutcome> {
        match timeout(wait, self.outcomes.recv()).await {
            Ok(Ok(outcome)) => Some(outcome),
            _ => None,
        }
    }

    /// Wait for in-flight moves to finish: echoes delivered, slews done.
    pub async fn wait_settled(&self) {
        tokio::time::sleep(self.ack_delay + Duration::from_millis(50)).await;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !self.dome.is_settled() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Publish telescope actual-position telemetry and an ENABLED state.
    pub fn set_telescope(&self, elevation: f64, azimuth: f64) {
        self.telemetry
            .telescope_state
            .send_replace(Some(SummaryState::Enabled));
        self.telemetry
            .telescope_elevation
            .send_replace(Some(elevation));
        self.telemetry
            .telescope_azimuth
            .send_replace(Some(azimuth));
    }

    /// Publish shutter open percentages.
    pub fn set_shutter(&self, open: [f64; 2]) {
        self.telemetry.shutter_open.send_replace(Some(open));
    }

    /// Spawn a vignetting monitor over this harness's telemetry.
    pub fn spawn_monitor(
        &self,
        config: &Config,
        interval: Duration,
    ) -> (MonitorHandle, watch::Receiver<VignettingReport>) {
        let (monitor, reports) = VignettingMonitor::new(config, self.telemetry_set.clone());
        (monitor.with_interval(interval).spawn(), reports)
    }

    /// Stop the controller loop and tear down the mock dome.
    pub async fn shutdown(self) {
        drop(self.targets);
        let _ = timeout(Duration::from_secs(1), self.controller_task).await;
        self.dome.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_actuator_interpolates_linearly() {
        let mut axis = MockAxis::new(false, 10.0);
        axis.speed = 20.0;
        let duration = axis.command(50.0, 0.0, 100.0);
        assert_relative_eq!(duration.as_secs_f64(), 2.0);
        assert_relative_eq!(axis.position(100.0), 10.0);
        assert_relative_eq!(axis.position(101.0), 30.0);
        assert_relative_eq!(axis.position(102.0), 50.0);
        // Holds position after the slew.
        assert_relative_eq!(axis.position(110.0), 50.0);
        assert!(axis.done(102.0));
        assert!(!axis.done(101.9));
    }

    #[test]
    fn test_actuator_wraps_and_takes_shortest_path() {
        let mut axis = MockAxis::new(true, 350.0);
        axis.speed = 20.0;
        // 350 -> 10 is 20 degrees through north, not 340 the long way.
        let duration = axis.command(10.0, 0.0, 0.0);
        assert_relative_eq!(duration.as_secs_f64(), 1.0);
        assert_relative_eq!(axis.position(0.5), 0.0, epsilon = 1e-9);
        assert_relative_eq!(axis.position(1.0), 10.0);
    }

    #[test]
    fn test_actuator_crawls_after_slew() {
        let mut axis = MockAxis::new(true, 0.0);
        axis.speed = 20.0;
        axis.command(20.0, 0.5, 0.0);
        assert_relative_eq!(axis.position(1.0), 20.0);
        assert_relative_eq!(axis.position(3.0), 21.0);

        axis.stop(3.0);
        assert_relative_eq!(axis.position(10.0), 21.0);
    }

    #[tokio::test]
    async fn test_mock_dome_acknowledges_and_finishes_moves() {
        let (feedback_tx, feedback) = feedback_channels();
        let (telemetry_tx, _telemetry_set) = telemetry_channels();
        let dome = MockDome::new(feedback_tx, Arc::new(telemetry_tx)).with_speed(10_000.0);
        dome.start();

        let mut echoes = feedback.target(Axis::Azimuth).clone();
        echoes.borrow_and_update();
        dome.move_axis(Axis::Azimuth, 90.0, Some(0.0)).await.unwrap();

        echoes.changed().await.unwrap();
        let echo = echoes.borrow().unwrap();
        assert_relative_eq!(echo.position, 90.0);
        assert_eq!(dome.move_count(Axis::Azimuth), 1);

        let mut motion = feedback.motion(Axis::Azimuth).clone();
        loop {
            let sample = motion.borrow_and_update().unwrap();
            if sample.in_position {
                assert_eq!(sample.state, MotionState::Stopped);
                break;
            }
            motion.changed().await.unwrap();
        }
        assert_relative_eq!(dome.position(Axis::Azimuth), 90.0);
        dome.shutdown();
    }

    #[tokio::test]
    async fn test_mock_dome_rejects_non_finite_position() {
        let (feedback_tx, _feedback) = feedback_channels();
        let (telemetry_tx, _telemetry_set) = telemetry_channels();
        let dome = MockDome::new(feedback_tx, Arc::new(telemetry_tx));
        dome.start();

        let err = dome
            .move_axis(Axis::Elevation, f64::NAN, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Rejected { .. }));
        assert_eq!(dome.move_count(Axis::Elevation), 0);
        dome.shutdown();
    }
}
