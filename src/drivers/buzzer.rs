//! Piezo buzzer driver: non-blocking "food is coming" alert.
//!
//! Plays `repetitions` bursts of `tone_ms`, separated by `pause_ms` of
//! silence (no pause after the last burst).  The tone frequency is fixed by
//! the PWM timer; this driver only gates the duty cycle (50 % = on).
//!
//! ```text
//!  start ─▶ Tone(1) ─tone_ms─▶ Pause(1) ─pause_ms─▶ Tone(2) ─ … ─▶ Silent
//! ```
//!
//! Phase boundaries are scheduled from the previous boundary, not from the
//! poll time, so a late poll does not stretch the sequence.
//!
//! A PWM write error is logged once and latched in [`Buzzer::has_fault`];
//! the sequence keeps its timing so the feeding session is not held up.

use embedded_hal::pwm::SetDutyCycle;
use log::{debug, warn};

/// Shape of the alert sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPattern {
    pub tone_ms: u32,
    pub pause_ms: u32,
    pub repetitions: u8,
}

impl AlertPattern {
    /// Wall time of the whole sequence.
    pub fn total_ms(&self) -> u64 {
        let reps = u64::from(self.repetitions);
        reps * u64::from(self.tone_ms) + reps.saturating_sub(1) * u64::from(self.pause_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Silent,
    Tone { burst: u8, until_ms: u64 },
    Pause { burst: u8, until_ms: u64 },
}

pub struct Buzzer<P: SetDutyCycle> {
    pwm: P,
    pattern: AlertPattern,
    phase: Phase,
    fault: bool,
}

impl<P: SetDutyCycle> Buzzer<P> {
    pub fn new(pwm: P, pattern: AlertPattern) -> Self {
        let mut buzzer = Self {
            pwm,
            pattern,
            phase: Phase::Silent,
            fault: false,
        };
        buzzer.tone_off();
        buzzer
    }

    /// Restart the sequence from the first burst.
    pub fn start(&mut self, now_ms: u64) {
        if self.pattern.repetitions == 0 {
            self.phase = Phase::Silent;
            return;
        }
        self.tone_on();
        self.phase = Phase::Tone {
            burst: 1,
            until_ms: now_ms + u64::from(self.pattern.tone_ms),
        };
        debug!("Buzzer: alert started ({} ms)", self.pattern.total_ms());
    }

    /// Advance the sequence.  Returns `true` while it is still playing.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        loop {
            match self.phase {
                Phase::Silent => return false,
                Phase::Tone { burst, until_ms } if now_ms >= until_ms => {
                    self.tone_off();
                    self.phase = if burst >= self.pattern.repetitions {
                        Phase::Silent
                    } else {
                        Phase::Pause {
                            burst,
                            until_ms: until_ms + u64::from(self.pattern.pause_ms),
                        }
                    };
                }
                Phase::Pause { burst, until_ms } if now_ms >= until_ms => {
                    self.tone_on();
                    self.phase = Phase::Tone {
                        burst: burst + 1,
                        until_ms: until_ms + u64::from(self.pattern.tone_ms),
                    };
                }
                Phase::Tone { .. } | Phase::Pause { .. } => return true,
            }
        }
    }

    /// Silence immediately.
    pub fn stop(&mut self) {
        self.tone_off();
        self.phase = Phase::Silent;
    }

    pub fn is_playing(&self) -> bool {
        self.phase != Phase::Silent
    }

    pub fn set_pattern(&mut self, pattern: AlertPattern) {
        self.pattern = pattern;
    }

    pub fn pattern(&self) -> AlertPattern {
        self.pattern
    }

    /// A PWM write has failed since start-up.
    pub fn has_fault(&self) -> bool {
        self.fault
    }

    fn tone_on(&mut self) {
        let result = self.pwm.set_duty_cycle_percent(50);
        self.check(result);
    }

    fn tone_off(&mut self) {
        let result = self.pwm.set_duty_cycle_fully_off();
        self.check(result);
    }

    fn check(&mut self, result: Result<(), P::Error>) {
        if let Err(e) = result {
            if !self.fault {
                warn!("Buzzer: PWM write failed: {:?}", e);
            }
            self.fault = true;
        }
    }
}
