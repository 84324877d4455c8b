//! Actuator drivers: carousel stepper and alert buzzer.

pub mod buzzer;
pub mod stepper;
