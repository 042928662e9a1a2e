//! Actual-position telemetry snapshots for dome and telescope.
//!
//! Telemetry arrives on last-value channels and is only ever read as a
//! consistent snapshot: each getter returns the most recent sample, or
//! `None` if the stream has never reported. Nothing in the engine waits on
//! these streams.

use tokio::sync::watch;

use crate::dome::SummaryState;

/// Receiver half of the telemetry streams.
#[derive(Debug, Clone)]
pub struct TelemetrySet {
    pub dome_azimuth: watch::Receiver<Option<f64>>,
    pub dome_elevation: watch::Receiver<Option<f64>>,
    pub telescope_azimuth: watch::Receiver<Option<f64>>,
    pub telescope_elevation: watch::Receiver<Option<f64>>,
    /// Open percentage of the two shutter leaves, 0 (closed) to 100 (open).
    pub shutter_open: watch::Receiver<Option<[f64; 2]>>,
    pub dome_state: watch::Receiver<Option<SummaryState>>,
    pub telescope_state: watch::Receiver<Option<SummaryState>>,
}

impl TelemetrySet {
    /// Actual dome azimuth in degrees, if reported.
    pub fn dome_azimuth(&self) -> Option<f64> {
        *self.dome_azimuth.borrow()
    }

    /// Actual dome elevation (light/wind screen) in degrees, if reported.
    pub fn dome_elevation(&self) -> Option<f64> {
        *self.dome_elevation.borrow()
    }

    /// Actual telescope azimuth in degrees, if reported.
    pub fn telescope_azimuth(&self) -> Option<f64> {
        *self.telescope_azimuth.borrow()
    }

    /// Actual telescope elevation in degrees, if reported.
    pub fn telescope_elevation(&self) -> Option<f64> {
        *self.telescope_elevation.borrow()
    }

    /// Open percentage of both shutter leaves, if reported.
    pub fn shutter_open(&self) -> Option<[f64; 2]> {
        *self.shutter_open.borrow()
    }

    /// Dome subsystem summary state, if reported.
    pub fn dome_state(&self) -> Option<SummaryState> {
        *self.dome_state.borrow()
    }

    /// Telescope subsystem summary state, if reported.
    pub fn telescope_state(&self) -> Option<SummaryState> {
        *self.telescope_state.borrow()
    }
}

/// Sender half of the telemetry streams.
#[derive(Debug)]
pub struct TelemetrySender {
    pub dome_azimuth: watch::Sender<Option<f64>>,
    pub dome_elevation: watch::Sender<Option<f64>>,
    pub telescope_azimuth: watch::Sender<Option<f64>>,
    pub telescope_elevation: watch::Sender<Option<f64>>,
    pub shutter_open: watch::Sender<Option<[f64; 2]>>,
    pub dome_state: watch::Sender<Option<SummaryState>>,
    pub telescope_state: watch::Sender<Option<SummaryState>>,
}

/// Create the paired sender/receiver bundles for telemetry.
///
/// All streams start out with no data.
pub fn telemetry_channels() -> (TelemetrySender, TelemetrySet) {
    let (dome_azimuth_tx, dome_azimuth) = watch::channel(None);
    let (dome_elevation_tx, dome_elevation) = watch::channel(None);
    let (telescope_azimuth_tx, telescope_azimuth) = watch::channel(None);
    let (telescope_elevation_tx, telescope_elevation) = watch::channel(None);
    let (shutter_open_tx, shutter_open) = watch::channel(None);
    let (dome_state_tx, dome_state) = watch::channel(None);
    let (telescope_state_tx, telescope_state) = watch::channel(None);
    (
        TelemetrySender {
            dome_azimuth: dome_azimuth_tx,
            dome_elevation: dome_elevation_tx,
            telescope_azimuth: telescope_azimuth_tx,
            telescope_elevation: telescope_elevation_tx,
            shutter_open: shutter_open_tx,
            dome_state: dome_state_tx,
            telescope_state: telescope_state_tx,
        },
        TelemetrySet {
            dome_azimuth,
            dome_elevation,
            telescope_azimuth,
            telescope_elevation,
            shutter_open,
            dome_state,
            telescope_state,
        },
    )
}
