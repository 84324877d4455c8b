//! Motion & Position Unit for the compartment carousel.
//!
//! Owns the stepper motion primitive, the driver-enable line and the
//! step-to-compartment mapping.  Nothing else in the core touches the motor;
//! the feeding session only goes through the operations below.
//!
//! ```text
//!            move_to_compartment()
//!   Idle ──────────────────────────▶ Moving
//!    ▲  ◀── distance_to_go == 0 ────┘  │
//!    │                                 │ elapsed > MOTION_TIMEOUT_MS
//!    │  move_to_compartment() /        ▼
//!    └──────── stop_motor() ──────── Error
//! ```
//!
//! `Calibrating` is only held for the duration of [`Carousel::calibrate`].

use log::{debug, info, warn};
use serde::Serialize;

use crate::app::events::FeederEvent;
use crate::app::ports::{EventSink, MotionPrimitive};
use crate::error::{FeederError, Result};

/// Safety bound on a single move (ms).
pub const MOTION_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MotorState {
    Idle,
    Moving,
    Calibrating,
    Error,
}

impl MotorState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Moving => "Moving",
            Self::Calibrating => "Calibrating",
            Self::Error => "Error",
        }
    }
}

/// Physical layout of the carousel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarouselGeometry {
    pub total_compartments: u8,
    /// Absolute steps between two adjacent compartments.
    pub steps_per_compartment: i64,
}

impl CarouselGeometry {
    /// Compartment sitting over the given absolute step position.
    ///
    /// Truncating division: a position short of the next boundary still
    /// counts as the previous compartment.
    pub fn compartment_at(&self, position: i64) -> u8 {
        let spc = self.steps_per_compartment.max(1);
        let n = i64::from(self.total_compartments.max(1));
        position.div_euclid(spc).rem_euclid(n) as u8
    }

    pub fn position_of(&self, compartment: u8) -> i64 {
        i64::from(compartment) * self.steps_per_compartment
    }
}

pub struct Carousel<M: MotionPrimitive> {
    motor: M,
    geometry: CarouselGeometry,
    state: MotorState,
    current_compartment: u8,
    target_position: i64,
    move_total_steps: i64,
    move_started_ms: u64,
    driver_enabled: bool,
}

impl<M: MotionPrimitive> Carousel<M> {
    pub fn new(
        mut motor: M,
        geometry: CarouselGeometry,
        max_speed_steps_per_sec: f32,
        acceleration_steps_per_sec2: f32,
    ) -> Self {
        motor.set_max_speed(max_speed_steps_per_sec);
        motor.set_acceleration(acceleration_steps_per_sec2);
        motor.disable_outputs();
        let position = motor.current_position();
        Self {
            motor,
            geometry,
            state: MotorState::Idle,
            current_compartment: geometry.compartment_at(position),
            target_position: position,
            move_total_steps: 0,
            move_started_ms: 0,
            driver_enabled: false,
        }
    }

    // ── Commands ──────────────────────────────────────────────

    /// Start a ramped move to `index`.
    ///
    /// Rejected with no state change when the index is off the carousel or
    /// a move is already in flight.  A successful call clears `Error`.
    pub fn move_to_compartment(
        &mut self,
        index: u8,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        if index >= self.geometry.total_compartments {
            return Err(self.reject(FeederError::InvalidCompartmentIndex(index), sink));
        }
        if self.state == MotorState::Moving {
            return Err(self.reject(FeederError::MotorAlreadyMoving, sink));
        }

        self.enable_driver();
        self.target_position = self.geometry.position_of(index);
        self.motor.move_to(self.target_position);
        self.move_total_steps = self.motor.distance_to_go().abs();
        self.move_started_ms = now_ms;
        self.state = MotorState::Moving;

        info!(
            "Carousel: compartment {} -> {} ({} steps)",
            self.current_compartment, index, self.move_total_steps
        );
        Ok(())
    }

    pub fn move_to_next_compartment(&mut self, now_ms: u64, sink: &mut impl EventSink) -> Result<()> {
        let n = self.geometry.total_compartments.max(1);
        self.move_to_compartment((self.current_compartment + 1) % n, now_ms, sink)
    }

    pub fn move_to_previous_compartment(
        &mut self,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let n = self.geometry.total_compartments.max(1);
        self.move_to_compartment((self.current_compartment + n - 1) % n, now_ms, sink)
    }

    /// Halt immediately.  The reported position freezes where the motor
    /// stopped; the compartment index keeps its last completed value.
    pub fn stop_motor(&mut self) {
        self.motor.stop();
        self.target_position = self.motor.current_position();
        if self.state != MotorState::Idle {
            info!("Carousel: stopped at step {}", self.target_position);
        }
        self.state = MotorState::Idle;
        self.disable_driver();
    }

    /// Define the current physical position as compartment 0 (home).
    pub fn calibrate(&mut self) -> Result<()> {
        if self.state == MotorState::Moving {
            warn!("Carousel: calibrate rejected, motor moving");
            return Err(FeederError::MotorAlreadyMoving);
        }
        self.state = MotorState::Calibrating;
        self.motor.set_current_position(0);
        self.target_position = 0;
        self.current_compartment = 0;
        self.state = MotorState::Idle;
        info!("Carousel: calibrated, home = compartment 0");
        Ok(())
    }

    /// Declare the carousel to be sitting over `index` without moving it.
    pub fn set_current_compartment(&mut self, index: u8) -> Result<()> {
        if index >= self.geometry.total_compartments {
            return Err(FeederError::InvalidCompartmentIndex(index));
        }
        if self.state == MotorState::Moving {
            return Err(FeederError::MotorAlreadyMoving);
        }
        self.target_position = self.geometry.position_of(index);
        self.motor.set_current_position(self.target_position);
        self.current_compartment = index;
        debug!("Carousel: position restored to compartment {}", index);
        Ok(())
    }

    /// Swap in new geometry and motion limits.  Not allowed mid-move.
    pub fn reconfigure(
        &mut self,
        geometry: CarouselGeometry,
        max_speed_steps_per_sec: f32,
        acceleration_steps_per_sec2: f32,
    ) -> Result<()> {
        if self.state == MotorState::Moving {
            return Err(FeederError::MotorAlreadyMoving);
        }
        self.geometry = geometry;
        self.set_max_speed(max_speed_steps_per_sec);
        self.set_acceleration(acceleration_steps_per_sec2);
        let index = if self.current_compartment < geometry.total_compartments {
            self.current_compartment
        } else {
            0
        };
        self.set_current_compartment(index)
    }

    pub fn set_max_speed(&mut self, steps_per_sec: f32) {
        self.motor.set_max_speed(steps_per_sec);
    }

    pub fn set_acceleration(&mut self, steps_per_sec2: f32) {
        self.motor.set_acceleration(steps_per_sec2);
    }

    // ── Tick ──────────────────────────────────────────────────

    /// Advance an in-flight move.  No-op unless `Moving`.
    pub fn update(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        if self.state != MotorState::Moving {
            return;
        }

        if self.motor.distance_to_go() == 0 {
            self.current_compartment = self.geometry.compartment_at(self.motor.current_position());
            self.state = MotorState::Idle;
            self.disable_driver();
            info!("Carousel: arrived at compartment {}", self.current_compartment);
            sink.emit(&FeederEvent::MotionComplete {
                compartment: self.current_compartment,
            });
            return;
        }

        if now_ms.saturating_sub(self.move_started_ms) > MOTION_TIMEOUT_MS {
            self.motor.stop();
            self.disable_driver();
            self.state = MotorState::Error;
            warn!(
                "Carousel: motion timeout after {} ms, {} steps short",
                MOTION_TIMEOUT_MS,
                self.motor.distance_to_go().abs()
            );
            sink.emit(&FeederEvent::MotionFault(FeederError::MotionTimeout));
            return;
        }

        self.motor.run();
    }

    // ── Queries ───────────────────────────────────────────────

    /// Completion of the current move, 0–100.  100 when not moving.
    pub fn progress(&self) -> f32 {
        if self.state != MotorState::Moving || self.move_total_steps == 0 {
            return 100.0;
        }
        let remaining = self.motor.distance_to_go().abs() as f32;
        let total = self.move_total_steps as f32;
        (100.0 * (1.0 - remaining / total)).clamp(0.0, 100.0)
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn is_moving(&self) -> bool {
        self.state == MotorState::Moving
    }

    pub fn current_compartment(&self) -> u8 {
        self.current_compartment
    }

    pub fn total_compartments(&self) -> u8 {
        self.geometry.total_compartments
    }

    pub fn geometry(&self) -> CarouselGeometry {
        self.geometry
    }

    pub fn target_position(&self) -> i64 {
        self.target_position
    }

    pub fn steps_to_target(&self) -> i64 {
        self.motor.distance_to_go()
    }

    pub fn is_driver_enabled(&self) -> bool {
        self.driver_enabled
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    pub fn motor_mut(&mut self) -> &mut M {
        &mut self.motor
    }

    // ── Internal ──────────────────────────────────────────────

    fn reject(&self, err: FeederError, sink: &mut impl EventSink) -> FeederError {
        warn!("Carousel: move rejected: {}", err);
        sink.emit(&FeederEvent::MotionFault(err));
        err
    }

    fn enable_driver(&mut self) {
        self.motor.enable_outputs();
        self.driver_enabled = true;
    }

    fn disable_driver(&mut self) {
        self.motor.disable_outputs();
        self.driver_enabled = false;
    }
}
