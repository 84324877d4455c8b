//! Inbound commands to the feeder service.
//!
//! These represent actions requested by the outside world (bot, web API,
//! serial console) that the [`FeederService`](super::service::FeederService)
//! interprets and acts upon.

use crate::config::FeederConfig;

/// Commands that external adapters can send into the feeder core.
#[derive(Debug, Clone)]
pub enum FeederCommand {
    /// Start a feeding with the configured alert/presence behaviour.
    FeedNow,

    /// Start a feeding that skips the presence wait.  Does not count
    /// against the daily schedule quota.
    FeedNowManual,

    /// Abort the current feeding (if any) and stop the carousel.
    CancelFeeding,

    SetScheduleEnabled(bool),

    /// Hours between scheduled feedings; out-of-range values are ignored.
    SetFeedingInterval(u8),

    /// Scheduled feedings per day; out-of-range values are ignored.
    SetMaxFeedingsPerDay(u8),

    ResetDailyCount,

    SetSoundEnabled(bool),

    SetPresenceRequired(bool),

    /// Manual carousel jog (maintenance / refilling).
    MoveToCompartment(u8),
    NextCompartment,
    PreviousCompartment,

    /// Declare the current carousel position as compartment 0.
    Calibrate,

    /// Hot-reload configuration (e.g. from the web API or NVS).
    UpdateConfig(FeederConfig),

    /// Explicitly persist the current config to NVS on the next save check.
    SaveConfig,
}
