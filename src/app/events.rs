//! Outbound feeder events.
//!
//! The carousel, session, and scheduler emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, queue them for the
//! bot or web layer, etc.

use serde::Serialize;

use crate::carousel::MotorState;
use crate::error::FeederError;
use crate::sensors::environment::EnvironmentAlert;
use crate::session::FeedingState;

/// Structured events emitted by the feeder core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum FeederEvent {
    /// The service has started (carries the initial compartment).
    Started { compartment: u8 },

    /// The feeding session moved between states.
    SessionStateChanged { from: FeedingState, to: FeedingState },

    /// A feeding session ended.  Always emitted exactly once per session.
    FeedingCompleted { success: bool },

    /// A feeding session ended in error.  Emitted just before the matching
    /// `FeedingCompleted { success: false }`.
    FeedingFailed(FeederError),

    /// The carousel finished a move and sits over `compartment`.
    MotionComplete { compartment: u8 },

    /// A move was rejected or aborted.
    MotionFault(FeederError),

    /// The scheduler started an automatic feeding.
    ScheduledFeedingExecuted { feedings_today: u8 },

    /// A new calendar day was observed; the daily count went back to zero.
    DailyCountReset { day: u8 },

    /// The PIR output went high: a visit at the bowl started.
    PresenceDetected,

    /// A climate threshold was crossed.  Sent once per change, not while
    /// the condition persists.
    EnvironmentAlert {
        alert: EnvironmentAlert,
        temperature_c: f32,
        humidity_pct: f32,
    },
}

/// A point-in-time status snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub feeding_state: FeedingState,
    pub feeding_in_progress: bool,
    pub progress_percent: f32,
    pub last_error: Option<FeederError>,
    pub motor_state: MotorState,
    pub current_compartment: u8,
    pub auto_feeding_enabled: bool,
    pub feedings_today: u8,
    pub max_feedings_per_day: u8,
    pub ms_until_next_feeding: u64,
    /// Latest valid climate reading, `None` without sensor data.
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
    pub environment_alert: Option<EnvironmentAlert>,
}
