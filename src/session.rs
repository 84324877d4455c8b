//! Feeding session state machine.
//!
//! One session sequences a single feeding event:
//!
//! ```text
//! ┌──────┐ start ┌────────────┐  ┌─────────────────┐  ┌────────────────┐
//! │ Idle │──────▶│ SoundAlert │─▶│ WaitingPresence │─▶│ MovingCarousel │
//! └──────┘       └────────────┘  └─────────────────┘  └────────────────┘
//!    ▲                 (each stage skipped when disabled)        │
//!    │                                                           ▼
//!    │  next tick  ┌──────────┐   ┌───────────┐   ┌────────────┐
//!    ├─────────────│ Complete │◀──│ Returning │◀──│ Dispensing │
//!    │             └──────────┘   └───────────┘   └────────────┘
//!    │  next tick  ┌───────┐
//!    └─────────────│ Error │◀── presence timeout / motion timeout / cancel
//!                  └───────┘
//! ```
//!
//! Elapsed times are measured from the last transition.  After dispensing,
//! the carousel advances one more slot so the aperture is not left over a
//! full compartment.  `Complete` and `Error` both fall back to `Idle` on the
//! next tick; there is no lockout.

use log::{debug, info, warn};
use serde::Serialize;

use crate::app::events::FeederEvent;
use crate::app::ports::{AlertPort, EventSink, FeedingTrigger, MotionPrimitive, PresencePort};
use crate::carousel::{Carousel, MotorState};
use crate::error::{FeederError, Result};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FeedingState {
    Idle,
    SoundAlert,
    WaitingPresence,
    MovingCarousel,
    Dispensing,
    Returning,
    Complete,
    Error,
}

impl FeedingState {
    /// Human-readable name shown by the bot and web layers.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::SoundAlert => "Playing alert",
            Self::WaitingPresence => "Waiting for presence",
            Self::MovingCarousel => "Moving carousel",
            Self::Dispensing => "Dispensing food",
            Self::Returning => "Returning position",
            Self::Complete => "Complete",
            Self::Error => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Per-session behaviour, split out of [`FeederConfig`](crate::config::FeederConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub sound_enabled: bool,
    pub presence_required: bool,
    pub max_wait_ms: u32,
    pub feeding_duration_ms: u32,
    /// Compartment sitting over the dispensing aperture.
    pub target_compartment: u8,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct FeedingSession {
    config: SessionConfig,
    state: FeedingState,
    state_started_ms: u64,
    in_progress: bool,
    last_error: Option<FeederError>,
    /// The alert for the current `SoundAlert` visit has been started.
    alert_started: bool,
    /// A move has been issued during the current motion state.
    move_issued: bool,
}

impl FeedingSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: FeedingState::Idle,
            state_started_ms: 0,
            in_progress: false,
            last_error: None,
            alert_started: false,
            move_issued: false,
        }
    }

    /// Manual feeding: same as [`start_feeding`](FeedingTrigger::start_feeding)
    /// but never waits for the pet.  The configured presence flag is
    /// restored whether or not the start is accepted.
    pub fn start_feeding_manual(&mut self, now_ms: u64, sink: &mut impl EventSink) -> Result<()> {
        let saved = self.config.presence_required;
        self.config.presence_required = false;
        let result = self.start_feeding(now_ms, sink);
        self.config.presence_required = saved;
        result
    }

    /// Stop the carousel and silence the alert, then resolve the session
    /// with [`FeederError::UserCancelled`] within this call.
    pub fn cancel_feeding<M: MotionPrimitive>(
        &mut self,
        now_ms: u64,
        carousel: &mut Carousel<M>,
        io: &mut impl AlertPort,
        sink: &mut impl EventSink,
    ) {
        carousel.stop_motor();
        io.stop_alert();
        self.complete_with_error(FeederError::UserCancelled, now_ms, sink);
    }

    /// Run one tick of the transition logic.
    pub fn update<M: MotionPrimitive>(
        &mut self,
        now_ms: u64,
        carousel: &mut Carousel<M>,
        io: &mut (impl PresencePort + AlertPort),
        sink: &mut impl EventSink,
    ) {
        let elapsed = now_ms.saturating_sub(self.state_started_ms);

        match self.state {
            FeedingState::Idle => {}

            FeedingState::SoundAlert => {
                if !self.alert_started {
                    io.start_alert(now_ms);
                    self.alert_started = true;
                }
                if !io.poll_alert(now_ms) {
                    let next = if self.config.presence_required {
                        FeedingState::WaitingPresence
                    } else {
                        FeedingState::MovingCarousel
                    };
                    self.set_state(next, now_ms, sink);
                }
            }

            FeedingState::WaitingPresence => {
                if io.is_presence_detected() {
                    info!("Session: pet detected after {} ms", elapsed);
                    self.set_state(FeedingState::MovingCarousel, now_ms, sink);
                } else if elapsed > u64::from(self.config.max_wait_ms) {
                    self.complete_with_error(FeederError::PresenceTimeout, now_ms, sink);
                }
            }

            FeedingState::MovingCarousel => {
                let target = self.config.target_compartment;
                if self.drive_to(target, now_ms, carousel, sink) == Some(true) {
                    self.set_state(FeedingState::Dispensing, now_ms, sink);
                }
            }

            FeedingState::Dispensing => {
                if elapsed >= u64::from(self.config.feeding_duration_ms) {
                    self.set_state(FeedingState::Returning, now_ms, sink);
                }
            }

            FeedingState::Returning => {
                let n = carousel.total_compartments().max(1);
                let next = (self.config.target_compartment + 1) % n;
                if self.drive_to(next, now_ms, carousel, sink) == Some(true) {
                    self.complete_success(now_ms, sink);
                }
            }

            FeedingState::Complete | FeedingState::Error => {
                self.set_state(FeedingState::Idle, now_ms, sink);
            }
        }
    }

    /// Progress through the session, 0–100.
    pub fn progress<M: MotionPrimitive>(&self, now_ms: u64, carousel: &Carousel<M>) -> f32 {
        if self.state == FeedingState::Complete {
            return 100.0;
        }
        if !self.in_progress {
            return 0.0;
        }

        let elapsed = now_ms.saturating_sub(self.state_started_ms) as f32;
        let fraction = |window: u32| elapsed / window.max(1) as f32;

        // Stage terms run past their window until the next tick moves the
        // state on; only the total is held to 0..=100.
        let percent = match self.state {
            FeedingState::SoundAlert => 10.0,
            FeedingState::WaitingPresence => 20.0 + 30.0 * fraction(self.config.max_wait_ms),
            FeedingState::MovingCarousel => 50.0 + 20.0 * (carousel.progress() / 100.0),
            FeedingState::Dispensing => 70.0 + 20.0 * fraction(self.config.feeding_duration_ms),
            FeedingState::Returning => 90.0 + 10.0 * (carousel.progress() / 100.0),
            FeedingState::Idle | FeedingState::Complete | FeedingState::Error => 0.0,
        };
        percent.min(100.0)
    }

    // ── Settings ──────────────────────────────────────────────

    pub fn enable_sound(&mut self, enabled: bool) {
        self.config.sound_enabled = enabled;
    }

    pub fn require_presence(&mut self, required: bool) {
        self.config.presence_required = required;
    }

    pub fn set_max_wait_time(&mut self, ms: u32) {
        self.config.max_wait_ms = ms;
    }

    pub fn set_feeding_duration(&mut self, ms: u32) {
        self.config.feeding_duration_ms = ms;
    }

    /// Replace the whole configuration.  Refused mid-session.
    pub fn apply_config(&mut self, config: SessionConfig) -> Result<()> {
        if self.in_progress {
            return Err(FeederError::AlreadyInProgress);
        }
        self.config = config;
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> FeedingState {
        self.state
    }

    pub fn state_str(&self) -> &'static str {
        self.state.as_str()
    }

    pub fn last_error(&self) -> Option<FeederError> {
        self.last_error
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Timestamp of the last transition (ms).
    pub fn state_started_ms(&self) -> u64 {
        self.state_started_ms
    }

    // ── Internal ──────────────────────────────────────────────

    /// Move towards `target` and report whether the carousel is resting
    /// there.  `None` means the session was just failed.
    fn drive_to<M: MotionPrimitive>(
        &mut self,
        target: u8,
        now_ms: u64,
        carousel: &mut Carousel<M>,
        sink: &mut impl EventSink,
    ) -> Option<bool> {
        if carousel.is_moving() {
            return Some(false);
        }
        if self.move_issued && carousel.state() == MotorState::Error {
            self.complete_with_error(FeederError::MotionTimeout, now_ms, sink);
            return None;
        }
        if carousel.current_compartment() == target {
            return Some(true);
        }
        match carousel.move_to_compartment(target, now_ms, sink) {
            Ok(()) => {
                self.move_issued = true;
                Some(false)
            }
            Err(e) => {
                self.complete_with_error(e, now_ms, sink);
                None
            }
        }
    }

    fn set_state(&mut self, next: FeedingState, now_ms: u64, sink: &mut impl EventSink) {
        if next == self.state {
            return;
        }
        info!("Session: {} -> {}", self.state.as_str(), next.as_str());
        sink.emit(&FeederEvent::SessionStateChanged {
            from: self.state,
            to: next,
        });
        self.state = next;
        self.state_started_ms = now_ms;
        self.alert_started = false;
        self.move_issued = false;
    }

    fn complete_success(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        self.in_progress = false;
        self.set_state(FeedingState::Complete, now_ms, sink);
        info!("Session: feeding complete");
        sink.emit(&FeederEvent::FeedingCompleted { success: true });
    }

    fn complete_with_error(&mut self, err: FeederError, now_ms: u64, sink: &mut impl EventSink) {
        self.in_progress = false;
        self.last_error = Some(err);
        warn!("Session: feeding failed: {}", err);
        self.set_state(FeedingState::Error, now_ms, sink);
        sink.emit(&FeederEvent::FeedingFailed(err));
        sink.emit(&FeederEvent::FeedingCompleted { success: false });
    }
}

impl FeedingTrigger for FeedingSession {
    fn is_feeding_in_progress(&self) -> bool {
        self.in_progress
    }

    fn start_feeding(&mut self, now_ms: u64, sink: &mut impl EventSink) -> Result<()> {
        if self.in_progress {
            warn!("Session: start rejected, feeding already in progress");
            return Err(FeederError::AlreadyInProgress);
        }

        self.in_progress = true;
        self.last_error = None;
        let first = if self.config.sound_enabled {
            FeedingState::SoundAlert
        } else if self.config.presence_required {
            FeedingState::WaitingPresence
        } else {
            FeedingState::MovingCarousel
        };
        debug!(
            "Session: start (sound={}, presence={})",
            self.config.sound_enabled, self.config.presence_required
        );
        self.set_state(first, now_ms, sink);
        Ok(())
    }
}
