//! Vignetting classification and the periodic monitor loop.
//!
//! The monitor runs independently of the follow logic: at a fixed interval
//! it samples the last-known actual geometry (dome and telescope positions,
//! shutter opening, subsystem states) and republishes a classification of
//! how obstructed the telescope view currently is. Every tick publishes,
//! whether or not anything changed; on shutdown the monitor publishes
//! UNKNOWN for all fields so no stale "good" assessment survives it.

use std::time::Duration;

use strum::Display;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::angle;
use crate::config::Config;
use crate::dome::SummaryState;
use crate::telemetry::TelemetrySet;

/// How often the monitor samples and republishes.
pub const MONITOR_INTERVAL: Duration = Duration::from_millis(100);

/// How much of the telescope view one factor obstructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Default)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Vignetted {
    #[default]
    Unknown,
    No,
    Partially,
    Fully,
}

/// Full classification published each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VignettingReport {
    /// Combined over all factors.
    pub combined: Vignetted,
    pub azimuth: Vignetted,
    pub elevation: Vignetted,
    pub shutter: Vignetted,
}

impl VignettingReport {
    /// The everything-unknown report, published when monitoring is off.
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Vignetting thresholds, lifted out of the full configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VignettingRules {
    azimuth_partial: f64,
    azimuth_full: f64,
    elevation_partial: f64,
    elevation_full: f64,
    shutter_partial: f64,
    shutter_full: f64,
    elevation_follows: bool,
}

impl VignettingRules {
    /// Extract the rules from a validated configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            azimuth_partial: config.azimuth_vignette_partial,
            azimuth_full: config.azimuth_vignette_full,
            elevation_partial: config.elevation_vignette_partial,
            elevation_full: config.elevation_vignette_full,
            shutter_partial: config.shutter_vignette_partial,
            shutter_full: config.shutter_vignette_full,
            elevation_follows: config.enable_elevation,
        }
    }

    /// Vignetting caused by dome/telescope azimuth mismatch.
    ///
    /// The difference is scaled by cos(telescope elevation), same as the
    /// follow algorithm.
    pub fn classify_azimuth(
        &self,
        dome_azimuth: Option<f64>,
        telescope_azimuth: Option<f64>,
        telescope_elevation: Option<f64>,
    ) -> Vignetted {
        let (Some(dome), Some(telescope), Some(elevation)) =
            (dome_azimuth, telescope_azimuth, telescope_elevation)
        else {
            return Vignetted::Unknown;
        };
        let scaled_diff = angle::scaled_azimuth_diff(dome, telescope, elevation).abs();
        if scaled_diff < self.azimuth_partial {
            Vignetted::No
        } else if scaled_diff < self.azimuth_full {
            Vignetted::Partially
        } else {
            Vignetted::Fully
        }
    }

    /// Vignetting caused by dome/telescope elevation mismatch.
    ///
    /// When the elevation axis is configured not to follow, it is trusted
    /// not to obstruct and always classifies NO.
    pub fn classify_elevation(
        &self,
        dome_elevation: Option<f64>,
        telescope_elevation: Option<f64>,
    ) -> Vignetted {
        if !self.elevation_follows {
            return Vignetted::No;
        }
        let (Some(dome), Some(telescope)) = (dome_elevation, telescope_elevation) else {
            return Vignetted::Unknown;
        };
        let diff = angle::diff(dome, telescope).abs();
        if diff < self.elevation_partial {
            Vignetted::No
        } else if diff < self.elevation_full {
            Vignetted::Partially
        } else {
            Vignetted::Fully
        }
    }

    /// Vignetting caused by the two shutter leaves.
    pub fn classify_shutter(&self, shutter_open: Option<[f64; 2]>) -> Vignetted {
        let Some([leaf_a, leaf_b]) = shutter_open else {
            return Vignetted::Unknown;
        };
        if leaf_a >= self.shutter_partial && leaf_b >= self.shutter_partial {
            Vignetted::No
        } else if leaf_a <= self.shutter_full && leaf_b <= self.shutter_full {
            Vignetted::Fully
        } else {
            Vignetted::Partially
        }
    }

    /// Combine the per-factor classifications.
    ///
    /// UNKNOWN dominates (any unknown factor makes the total unknown), then
    /// FULLY; NO requires every factor clear; anything else is PARTIALLY.
    pub fn combine(azimuth: Vignetted, elevation: Vignetted, shutter: Vignetted) -> Vignetted {
        let factors = [azimuth, elevation, shutter];
        if factors.contains(&Vignetted::Unknown) {
            Vignetted::Unknown
        } else if factors.contains(&Vignetted::Fully) {
            Vignetted::Fully
        } else if factors.iter().all(|&f| f == Vignetted::No) {
            Vignetted::No
        } else {
            Vignetted::Partially
        }
    }
}

/// Periodic vignetting monitor.
///
/// Owns the telemetry snapshot receivers and a watch channel on which it
/// publishes a [`VignettingReport`] every tick.
#[derive(Debug)]
pub struct VignettingMonitor {
    rules: VignettingRules,
    telemetry: TelemetrySet,
    report_tx: watch::Sender<VignettingReport>,
    interval: Duration,
}

/// Handle to a spawned monitor.
///
/// Dropping the handle also stops the loop (the shutdown channel closes);
/// [`MonitorHandle::shutdown`] additionally waits for the final UNKNOWN
/// publish before returning.
#[derive(Debug)]
pub struct MonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop the loop and wait for the final UNKNOWN publish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

impl VignettingMonitor {
    /// Create a monitor. Returns the receiver for published reports, which
    /// starts out as all-UNKNOWN.
    pub fn new(
        config: &Config,
        telemetry: TelemetrySet,
    ) -> (Self, watch::Receiver<VignettingReport>) {
        let (report_tx, report_rx) = watch::channel(VignettingReport::unknown());
        (
            Self {
                rules: VignettingRules::from_config(config),
                telemetry,
                report_tx,
                interval: MONITOR_INTERVAL,
            },
            report_rx,
        )
    }

    /// Override the polling interval (tests use a short one).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Classify the current snapshot.
    pub fn sample(&self) -> VignettingReport {
        let dome_operational = self
            .telemetry
            .dome_state()
            .is_some_and(SummaryState::is_operational);
        let telescope_operational = self
            .telemetry
            .telescope_state()
            .is_some_and(SummaryState::is_operational);

        let (azimuth, elevation, shutter) = if dome_operational && telescope_operational {
            (
                self.rules.classify_azimuth(
                    self.telemetry.dome_azimuth(),
                    self.telemetry.telescope_azimuth(),
                    self.telemetry.telescope_elevation(),
                ),
                self.rules.classify_elevation(
                    self.telemetry.dome_elevation(),
                    self.telemetry.telescope_elevation(),
                ),
                self.rules.classify_shutter(self.telemetry.shutter_open()),
            )
        } else {
            (Vignetted::Unknown, Vignetted::Unknown, Vignetted::Unknown)
        };

        VignettingReport {
            combined: VignettingRules::combine(azimuth, elevation, shutter),
            azimuth,
            elevation,
            shutter,
        }
    }

    /// Spawn the polling loop.
    ///
    /// The loop publishes every tick until the handle's shutdown fires, then
    /// publishes a final all-UNKNOWN report and exits. Teardown is
    /// structured: the final publish happens on every exit path.
    pub fn spawn(self) -> MonitorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        MonitorHandle { shutdown_tx, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("vignetting monitor starting");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let report = self.sample();
                    debug!(?report, "vignetting sample");
                    self.report_tx.send_replace(report);
                }
            }
        }
        info!("vignetting monitor stopping");
        self.report_tx.send_replace(VignettingReport::unknown());
    }
}
