//! Test doubles shared by the unit tests in this crate.

use crate::app::events::FeederEvent;
use crate::app::ports::{AlertPort, EventSink, FeedingTrigger, MotionPrimitive, PresencePort};
use crate::error::FeederError;

/// Motion primitive that covers a fixed number of steps per `run()` call.
pub struct SimMotor {
    pub position: i64,
    pub target: i64,
    pub steps_per_run: i64,
    pub enabled: bool,
    /// When set, `run()` never makes progress.
    pub stalled: bool,
    pub max_speed: f32,
    pub acceleration: f32,
    pub run_calls: u32,
}

impl SimMotor {
    pub fn new(steps_per_run: i64) -> Self {
        Self {
            position: 0,
            target: 0,
            steps_per_run,
            enabled: false,
            stalled: false,
            max_speed: 0.0,
            acceleration: 0.0,
            run_calls: 0,
        }
    }

    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::new(64)
        }
    }
}

impl MotionPrimitive for SimMotor {
    fn move_to(&mut self, absolute: i64) {
        self.target = absolute;
    }

    fn run(&mut self) -> bool {
        self.run_calls += 1;
        let remaining = self.target - self.position;
        if !self.stalled && remaining != 0 {
            self.position += remaining.signum() * remaining.abs().min(self.steps_per_run);
        }
        self.position != self.target
    }

    fn distance_to_go(&self) -> i64 {
        self.target - self.position
    }

    fn current_position(&self) -> i64 {
        self.position
    }

    fn set_current_position(&mut self, position: i64) {
        self.position = position;
        self.target = position;
    }

    fn stop(&mut self) {
        self.target = self.position;
    }

    fn enable_outputs(&mut self) {
        self.enabled = true;
    }

    fn disable_outputs(&mut self) {
        self.enabled = false;
    }

    fn set_max_speed(&mut self, steps_per_sec: f32) {
        self.max_speed = steps_per_sec;
    }

    fn set_acceleration(&mut self, steps_per_sec2: f32) {
        self.acceleration = steps_per_sec2;
    }
}

/// Presence + alert capability driven by plain fields.
pub struct ScriptedIo {
    pub presence: bool,
    pub alert_duration_ms: u64,
    pub alert_started_at: Option<u64>,
    pub alert_starts: u32,
    pub alert_stops: u32,
}

impl ScriptedIo {
    pub fn new(alert_duration_ms: u64) -> Self {
        Self {
            presence: false,
            alert_duration_ms,
            alert_started_at: None,
            alert_starts: 0,
            alert_stops: 0,
        }
    }
}

impl PresencePort for ScriptedIo {
    fn is_presence_detected(&mut self) -> bool {
        self.presence
    }
}

impl AlertPort for ScriptedIo {
    fn start_alert(&mut self, now_ms: u64) {
        self.alert_started_at = Some(now_ms);
        self.alert_starts += 1;
    }

    fn poll_alert(&mut self, now_ms: u64) -> bool {
        match self.alert_started_at {
            Some(t) if now_ms.saturating_sub(t) < self.alert_duration_ms => true,
            _ => {
                self.alert_started_at = None;
                false
            }
        }
    }

    fn stop_alert(&mut self) {
        self.alert_started_at = None;
        self.alert_stops += 1;
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<FeederEvent>,
}

impl RecordingSink {
    pub fn contains(&self, event: &FeederEvent) -> bool {
        self.events.iter().any(|e| e == event)
    }

    pub fn count(&self, pred: impl Fn(&FeederEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &FeederEvent) {
        self.events.push(*event);
    }
}

/// Stand-in for a feeding session, as seen by the scheduler.
#[derive(Default)]
pub struct FakeTrigger {
    pub in_progress: bool,
    pub starts: u32,
}

impl FeedingTrigger for FakeTrigger {
    fn is_feeding_in_progress(&self) -> bool {
        self.in_progress
    }

    fn start_feeding(
        &mut self,
        _now_ms: u64,
        _sink: &mut impl EventSink,
    ) -> Result<(), FeederError> {
        if self.in_progress {
            return Err(FeederError::AlreadyInProgress);
        }
        self.in_progress = true;
        self.starts += 1;
        Ok(())
    }
}
