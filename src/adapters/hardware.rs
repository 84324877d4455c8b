//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the PIR sensor and the alert buzzer, exposing them through
//! [`PresencePort`] and [`AlertPort`].  The stepper is not in here; it is
//! handed to the carousel directly as its [`MotionPrimitive`].
//!
//! Generic over `embedded-hal` pin types, so host tests drive it with
//! fakes and the firmware with `esp-idf-hal` GPIO/LEDC drivers.
//!
//! [`MotionPrimitive`]: crate::app::ports::MotionPrimitive

use embedded_hal::digital::InputPin;
use embedded_hal::pwm::SetDutyCycle;
use log::info;

use crate::app::events::FeederEvent;
use crate::app::ports::{AlertPort, EventSink, PresencePort};
use crate::config::FeederConfig;
use crate::drivers::buzzer::{AlertPattern, Buzzer};
use crate::sensors::presence::PirSensor;

impl From<&FeederConfig> for AlertPattern {
    fn from(config: &FeederConfig) -> Self {
        Self {
            tone_ms: config.alert_tone_ms,
            pause_ms: config.alert_pause_ms,
            repetitions: config.alert_repetitions,
        }
    }
}

/// Concrete adapter that combines the bowl-side hardware behind port traits.
pub struct HardwareAdapter<PIR: InputPin, PWM: SetDutyCycle> {
    pir: PirSensor<PIR>,
    buzzer: Buzzer<PWM>,
}

impl<PIR: InputPin, PWM: SetDutyCycle> HardwareAdapter<PIR, PWM> {
    pub fn new(pir: PirSensor<PIR>, buzzer: Buzzer<PWM>) -> Self {
        Self { pir, buzzer }
    }

    /// Sample the sensors.  Call once per loop, before the service tick.
    pub fn poll(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        if self.pir.poll(now_ms) {
            sink.emit(&FeederEvent::PresenceDetected);
        }
    }

    /// Push runtime-tunable fields to the peripherals.  The alert
    /// frequency is owned by the LEDC timer and is not changed here.
    pub fn apply_config(&mut self, config: &FeederConfig) {
        let pattern = AlertPattern::from(config);
        if pattern != self.buzzer.pattern() {
            info!(
                "Buzzer: pattern now {} x {} ms (pause {} ms)",
                pattern.repetitions, pattern.tone_ms, pattern.pause_ms
            );
            self.buzzer.set_pattern(pattern);
        }
        self.pir
            .set_timing(config.pir_poll_interval_ms, config.presence_confirm_ms);
    }

    pub fn alert_pattern(&self) -> AlertPattern {
        self.buzzer.pattern()
    }
}

// ── PresencePort implementation ───────────────────────────────

impl<PIR: InputPin, PWM: SetDutyCycle> PresencePort for HardwareAdapter<PIR, PWM> {
    fn is_presence_detected(&mut self) -> bool {
        self.pir.is_detected()
    }
}

// ── AlertPort implementation ──────────────────────────────────

impl<PIR: InputPin, PWM: SetDutyCycle> AlertPort for HardwareAdapter<PIR, PWM> {
    fn start_alert(&mut self, now_ms: u64) {
        self.buzzer.start(now_ms);
    }

    fn poll_alert(&mut self, now_ms: u64) -> bool {
        self.buzzer.poll(now_ms)
    }

    fn stop_alert(&mut self) {
        self.buzzer.stop();
    }
}
