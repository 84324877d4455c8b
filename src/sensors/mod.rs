//! Sensor drivers and the climate monitor built on them.

pub mod dht22;
pub mod environment;
pub mod presence;
