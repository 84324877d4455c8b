//! Error taxonomy for the feeder core.
//!
//! Nothing in the core is fatal.  Rejected commands hand one of these back
//! through `Result`; failures that end a feeding session are stored as the
//! session's `last_error` and emitted once as an event.  All variants are
//! `Copy` so they travel through events and status snapshots without
//! allocation.

use core::fmt;

use crate::app::ports::ConfigError;

use serde::Serialize;

/// Every failure the carousel, session, or scheduler can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeederError {
    /// A move targeted a compartment outside `[0, N)`.
    InvalidCompartmentIndex(u8),
    /// A move was requested while the carousel is still moving.
    MotorAlreadyMoving,
    /// The carousel did not reach its target within the safety bound.
    MotionTimeout,
    /// Presence was required but never detected within the wait window.
    PresenceTimeout,
    /// The session was cancelled from the command surface.
    UserCancelled,
    /// A feeding was requested while another session is in progress.
    AlreadyInProgress,
    /// A runtime configuration update failed range validation.
    InvalidConfig(&'static str),
}

impl FeederError {
    /// Whether the failure leaves the rejected component untouched.
    ///
    /// Recoverable errors reject a call with no state change; the others
    /// drive the session through `Error` back to `Idle`.
    pub const fn is_rejection(self) -> bool {
        matches!(
            self,
            Self::InvalidCompartmentIndex(_)
                | Self::MotorAlreadyMoving
                | Self::AlreadyInProgress
                | Self::InvalidConfig(_)
        )
    }
}

impl fmt::Display for FeederError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCompartmentIndex(idx) => write!(f, "invalid compartment index: {idx}"),
            Self::MotorAlreadyMoving => write!(f, "motor already moving"),
            Self::MotionTimeout => write!(f, "timeout: carousel motion"),
            Self::PresenceTimeout => write!(f, "timeout: pet not detected"),
            Self::UserCancelled => write!(f, "cancelled by user"),
            Self::AlreadyInProgress => write!(f, "feeding already in progress"),
            Self::InvalidConfig(why) => write!(f, "invalid config: {why}"),
        }
    }
}

impl From<ConfigError> for FeederError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(why) => Self::InvalidConfig(why),
            ConfigError::NotFound => Self::InvalidConfig("config not found"),
            ConfigError::Corrupted => Self::InvalidConfig("config corrupted"),
            ConfigError::StorageFull => Self::InvalidConfig("storage full"),
            ConfigError::IoError => Self::InvalidConfig("storage I/O error"),
        }
    }
}

/// Feeder-wide `Result` alias.
pub type Result<T> = core::result::Result<T, FeederError>;
