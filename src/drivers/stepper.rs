//! Ramped STEP/DIR stepper driver (A4988 / DRV8825 class).
//!
//! Implements [`MotionPrimitive`] with a trapezoidal speed profile.  Each
//! step interval is derived from the previous one with the recurrence
//!
//! ```text
//!   c0 = 0.676 · sqrt(2 / a) · 1e6        (first interval, µs)
//!   cn = cn-1 − 2·cn-1 / (4n + 1)         (accelerating / decelerating)
//!   cn ≥ cmin = 1e6 / max_speed
//! ```
//!
//! so no square roots are taken per step.  `n` goes negative while
//! decelerating; the driver starts braking as soon as the steps needed to
//! stop reach the remaining distance.
//!
//! [`run`](MotionPrimitive::run) is non-blocking: it emits at most one
//! step and must be polled faster than the cruise step rate.  Timing comes
//! from a [`MicrosClock`]; the step pulse itself is a short busy-wait on
//! the `DelayNs` provider.
//!
//! The enable line is active-low (driver energised while EN is low).
//!
//! GPIO write errors do not stop the ramp.  The first one is logged and
//! latched in [`RampStepper::has_pin_fault`]; a missed pulse then shows up
//! upstream as a motion timeout.

use core::fmt::Debug;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::app::ports::MotionPrimitive;

/// STEP high time (µs).  A4988 needs ≥ 1 µs.
const STEP_PULSE_US: u32 = 2;

/// Monotonic microsecond time source for step timing.
pub trait MicrosClock {
    fn now_us(&self) -> u64;
}

pub struct StepperPins<STEP, DIR, EN> {
    pub step: STEP,
    pub dir: DIR,
    pub enable: EN,
}

pub struct RampStepper<STEP, DIR, EN, D, C> {
    pins: StepperPins<STEP, DIR, EN>,
    delay: D,
    clock: C,

    position: i64,
    target: i64,
    forward: bool,
    dir_level: Option<bool>,

    /// Signed speed (steps/s); negative when moving backwards.
    speed: f32,
    max_speed: f32,
    acceleration: f32,

    step_interval_us: u64,
    last_step_us: u64,
    n: i64,
    c0: f32,
    cn: f32,
    cmin: f32,

    pin_fault: bool,
}

impl<STEP, DIR, EN, D, C> RampStepper<STEP, DIR, EN, D, C>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    D: DelayNs,
    C: MicrosClock,
{
    /// Create a driver at position 0 with the outputs disabled.
    pub fn new(pins: StepperPins<STEP, DIR, EN>, delay: D, clock: C) -> Self {
        let mut stepper = Self {
            pins,
            delay,
            clock,
            position: 0,
            target: 0,
            forward: true,
            dir_level: None,
            speed: 0.0,
            max_speed: 1.0,
            acceleration: 0.0,
            step_interval_us: 0,
            last_step_us: 0,
            n: 0,
            c0: 0.0,
            cn: 0.0,
            cmin: 1_000_000.0,
            pin_fault: false,
        };
        stepper.set_acceleration(1.0);
        stepper.disable_outputs();
        stepper
    }

    /// Current signed speed (steps/s).
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// A STEP, DIR or EN write has failed since start-up.
    pub fn has_pin_fault(&self) -> bool {
        self.pin_fault
    }

    fn check_pin<E: Debug>(&mut self, line: &str, result: Result<(), E>) {
        if let Err(e) = result {
            if !self.pin_fault {
                warn!("Stepper: {} write failed: {:?}", line, e);
            }
            self.pin_fault = true;
        }
    }

    fn steps_to_stop(&self) -> i64 {
        ((self.speed * self.speed) / (2.0 * self.acceleration)) as i64
    }

    /// Work out the interval to the next step from the current position,
    /// target, and ramp state.
    fn compute_new_speed(&mut self) {
        let distance = self.distance_to_go();
        let steps_to_stop = self.steps_to_stop();

        if distance == 0 && steps_to_stop <= 1 {
            self.step_interval_us = 0;
            self.speed = 0.0;
            self.n = 0;
            return;
        }

        if distance > 0 {
            if self.n > 0 {
                // Accelerating: brake if we'd overshoot or are heading away
                if steps_to_stop >= distance || !self.forward {
                    self.n = -steps_to_stop;
                }
            } else if self.n < 0 && steps_to_stop < distance && self.forward {
                self.n = -self.n;
            }
        } else if distance < 0 {
            if self.n > 0 {
                if steps_to_stop >= -distance || self.forward {
                    self.n = -steps_to_stop;
                }
            } else if self.n < 0 && steps_to_stop < -distance && !self.forward {
                self.n = -self.n;
            }
        }

        if self.n == 0 {
            self.cn = self.c0;
            self.forward = distance > 0;
        } else {
            self.cn -= (2.0 * self.cn) / (4.0 * self.n as f32 + 1.0);
            self.cn = self.cn.max(self.cmin);
        }
        self.n += 1;
        self.step_interval_us = self.cn as u64;
        self.speed = 1_000_000.0 / self.cn;
        if !self.forward {
            self.speed = -self.speed;
        }
    }

    /// Emit one step if the current interval has elapsed.
    fn run_speed(&mut self) -> bool {
        if self.step_interval_us == 0 {
            return false;
        }
        let now = self.clock.now_us();
        if now.saturating_sub(self.last_step_us) < self.step_interval_us {
            return false;
        }
        self.position += if self.forward { 1 } else { -1 };
        self.pulse();
        self.last_step_us = now;
        true
    }

    fn pulse(&mut self) {
        if self.dir_level != Some(self.forward) {
            let result = self.pins.dir.set_state(self.forward.into());
            self.check_pin("DIR", result);
            self.dir_level = Some(self.forward);
        }
        let result = self.pins.step.set_high();
        self.check_pin("STEP", result);
        self.delay.delay_us(STEP_PULSE_US);
        let result = self.pins.step.set_low();
        self.check_pin("STEP", result);
    }

    fn halt(&mut self) {
        self.target = self.position;
        self.speed = 0.0;
        self.n = 0;
        self.step_interval_us = 0;
    }
}

impl<STEP, DIR, EN, D, C> MotionPrimitive for RampStepper<STEP, DIR, EN, D, C>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    D: DelayNs,
    C: MicrosClock,
{
    fn move_to(&mut self, absolute: i64) {
        if self.target != absolute {
            self.target = absolute;
            self.compute_new_speed();
        }
    }

    fn run(&mut self) -> bool {
        if self.run_speed() {
            self.compute_new_speed();
        }
        self.speed != 0.0 || self.distance_to_go() != 0
    }

    fn distance_to_go(&self) -> i64 {
        self.target - self.position
    }

    fn current_position(&self) -> i64 {
        self.position
    }

    fn set_current_position(&mut self, position: i64) {
        self.position = position;
        self.halt();
    }

    fn stop(&mut self) {
        debug!("Stepper: hard stop at {}", self.position);
        self.halt();
    }

    fn enable_outputs(&mut self) {
        let result = self.pins.enable.set_low();
        self.check_pin("EN", result);
    }

    fn disable_outputs(&mut self) {
        let result = self.pins.enable.set_high();
        self.check_pin("EN", result);
    }

    fn set_max_speed(&mut self, steps_per_sec: f32) {
        let speed = steps_per_sec.abs();
        if speed <= 0.0 || (self.max_speed - speed).abs() < f32::EPSILON {
            return;
        }
        self.max_speed = speed;
        self.cmin = 1_000_000.0 / speed;
        // Already accelerating: recompute where on the ramp we are
        if self.n > 0 {
            self.n = self.steps_to_stop();
            self.compute_new_speed();
        }
    }

    fn set_acceleration(&mut self, steps_per_sec2: f32) {
        let accel = steps_per_sec2.abs();
        if accel <= 0.0 || (self.acceleration - accel).abs() < f32::EPSILON {
            return;
        }
        if self.acceleration > 0.0 {
            self.n = (self.n as f32 * (self.acceleration / accel)) as i64;
        }
        self.c0 = 0.676 * (2.0 / accel).sqrt() * 1_000_000.0;
        self.acceleration = accel;
        self.compute_new_speed();
    }
}
