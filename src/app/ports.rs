//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ FeederService (domain)
//! ```
//!
//! Driven adapters (stepper, PIR, buzzer, clock, event sinks, config store)
//! implement these traits.  The carousel, session, and scheduler consume
//! them via generics, so the domain core never touches hardware directly.

use crate::config::FeederConfig;
use crate::error::FeederError;
use crate::sensors::environment::ClimateReading;

// ───────────────────────────────────────────────────────────────
// Motion primitive (driven adapter: domain → stepper driver)
// ───────────────────────────────────────────────────────────────

/// Ramped step-motion driver commanded by the
/// [`Carousel`](crate::carousel::Carousel).
///
/// Positions are absolute step counts.  The primitive owns its own
/// acceleration profile and step timing; the carousel only sets targets and
/// polls [`run`](Self::run) every tick.
pub trait MotionPrimitive {
    /// Set an absolute target and start ramping towards it.
    fn move_to(&mut self, absolute: i64);

    /// Emit at most one step if one is due.  Returns `true` while the
    /// motor is still moving or has steps remaining.
    fn run(&mut self) -> bool;

    /// Signed steps between the current position and the target.
    fn distance_to_go(&self) -> i64;

    /// Absolute position in steps.
    fn current_position(&self) -> i64;

    /// Redefine the current position (and target) without moving.
    fn set_current_position(&mut self, position: i64);

    /// Halt immediately; the target collapses onto the current position.
    fn stop(&mut self);

    /// Energise the driver (enable line asserted).
    fn enable_outputs(&mut self);

    /// De-energise the driver so a stationary motor draws no holding current.
    fn disable_outputs(&mut self);

    fn set_max_speed(&mut self, steps_per_sec: f32);

    fn set_acceleration(&mut self, steps_per_sec2: f32);
}

// ───────────────────────────────────────────────────────────────
// Presence / alert ports (driven adapter: hardware ↔ domain)
// ───────────────────────────────────────────────────────────────

/// Live animal-presence detection near the bowl.
pub trait PresencePort {
    /// Latest presence reading.  No side effects beyond sensor bookkeeping.
    fn is_presence_detected(&mut self) -> bool;
}

/// Audible "food is coming" alert.
///
/// Non-blocking: the session starts the alert and then polls it each tick
/// until it reports finished, so the rest of the control loop keeps
/// running while the tone plays.
pub trait AlertPort {
    /// Begin the alert sequence.
    fn start_alert(&mut self, now_ms: u64);

    /// Advance the sequence.  Returns `true` while the alert is sounding.
    fn poll_alert(&mut self, now_ms: u64) -> bool;

    /// Silence the alert immediately.
    fn stop_alert(&mut self);
}

/// Temperature/humidity sensor around the food store.
pub trait ClimatePort {
    /// Take one reading.  `None` when the sensor did not answer or the
    /// frame was corrupt.
    fn read_climate(&mut self) -> Option<ClimateReading>;
}

/// Calendar day source for the scheduler's daily quota.
pub trait DaySource {
    /// Day of month (1–31), or `None` while the wall clock is unavailable
    /// (e.g. before NTP sync).
    fn current_day(&self) -> Option<u8>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / API / bot)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`FeederEvent`](super::events::FeederEvent)s
/// through this port.  Adapters decide where they go (serial log, a queue
/// drained by the bot, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::FeederEvent);
}

/// Fan an event out to two sinks.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::FeederEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &super::events::FeederEvent) {
        (**self).emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Feeding trigger (decouples the scheduler from the session)
// ───────────────────────────────────────────────────────────────

/// The start/status contract the scheduler needs from a feeding session.
///
/// Implemented by [`FeedingSession`](crate::session::FeedingSession); the
/// scheduler knows nothing else about it.
pub trait FeedingTrigger {
    fn is_feeding_in_progress(&self) -> bool;

    /// Start a feeding.  Fails with
    /// [`FeederError::AlreadyInProgress`] while a session is active.
    fn start_feeding(&mut self, now_ms: u64, sink: &mut impl EventSink)
    -> Result<(), FeederError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists feeder configuration.
///
/// Implementations MUST validate config values before persisting
/// (see [`validate_config`](crate::config::validate_config)).  Invalid
/// ranges are rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`FeederConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<FeederConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &FeederConfig) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
