//! DHT22 (AM2302) temperature/humidity sensor on a single open-drain line.
//!
//! ```text
//!  host:   ‾‾‾\____________/‾‾‾‾ (release)
//!  sensor:                     ‾‾\__80µs__/‾‾80µs‾‾\_50_/‾26-28 or 70‾\_50_/ …
//!                                 response             bit 0 / bit 1
//! ```
//!
//! The host pulls the line low for at least 1 ms and releases it.  The
//! sensor answers with an 80 µs low/high pair, then sends 40 bits.  Each
//! bit is a 50 µs low followed by a high whose length carries the value.
//! The frame is humidity (2 bytes, ×10), temperature (2 bytes, ×10, bit 15
//! = sign) and a checksum of the first four bytes.
//!
//! The sensor needs 2 s between reads; pacing is the caller's job.  A read
//! busy-waits for about 5 ms and can be corrupted by preemption, which
//! shows up as a timeout or checksum error on that read only.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::debug;

use crate::app::ports::ClimatePort;
use crate::drivers::stepper::MicrosClock;
use crate::sensors::environment::ClimateReading;

/// Host start pulse (µs).
const START_LOW_US: u32 = 1_100;
/// Longest any single line phase may last before the read is abandoned.
const PHASE_TIMEOUT_US: u64 = 100;
/// High pulses longer than this are a `1`.
const ONE_THRESHOLD_US: u64 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtError {
    /// The line did not change level in time.
    Timeout(Stage),
    /// The checksum byte did not match the payload.
    Checksum { expected: u8, actual: u8 },
    /// Decoded values outside the sensor's range.
    OutOfRange,
    /// The GPIO driver reported an error.
    Pin,
}

/// Where in the exchange a timeout happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Response,
    Bit(u8),
}

impl fmt::Display for DhtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(Stage::Response) => write!(f, "no response from sensor"),
            Self::Timeout(Stage::Bit(n)) => write!(f, "timeout at bit {n}"),
            Self::Checksum { expected, actual } => {
                write!(f, "checksum mismatch: expected {expected:#04x}, got {actual:#04x}")
            }
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::Pin => write!(f, "GPIO error"),
        }
    }
}

/// Decode a raw 5-byte frame.
pub fn decode_frame(frame: [u8; 5]) -> Result<ClimateReading, DhtError> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return Err(DhtError::Checksum {
            expected: sum,
            actual: frame[4],
        });
    }

    let humidity = f32::from(u16::from_be_bytes([frame[0], frame[1]])) / 10.0;
    let magnitude = f32::from(u16::from_be_bytes([frame[2] & 0x7F, frame[3]])) / 10.0;
    let temperature = if frame[2] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    };

    if humidity > 100.0 || !(-40.0..=80.0).contains(&temperature) {
        return Err(DhtError::OutOfRange);
    }
    Ok(ClimateReading {
        temperature_c: temperature,
        humidity_pct: humidity,
    })
}

pub struct Dht22<P, D, C> {
    pin: P,
    delay: D,
    clock: C,
}

impl<P, D, C> Dht22<P, D, C>
where
    P: InputPin + OutputPin,
    D: DelayNs,
    C: MicrosClock,
{
    /// `pin` must be open-drain with a pull-up; it is released here.
    pub fn new(mut pin: P, delay: D, clock: C) -> Self {
        if pin.set_high().is_err() {
            debug!("DHT22: could not release data line");
        }
        Self { pin, delay, clock }
    }

    /// Run one full exchange with the sensor.
    pub fn read(&mut self) -> Result<ClimateReading, DhtError> {
        let frame = self.read_frame()?;
        decode_frame(frame)
    }

    fn read_frame(&mut self) -> Result<[u8; 5], DhtError> {
        self.pin.set_low().map_err(|_| DhtError::Pin)?;
        self.delay.delay_us(START_LOW_US);
        self.pin.set_high().map_err(|_| DhtError::Pin)?;

        // Pull-up until the sensor answers, then its 80 µs low/high pair
        self.wait_while(true, Stage::Response)?;
        self.wait_while(false, Stage::Response)?;
        self.wait_while(true, Stage::Response)?;

        let mut frame = [0u8; 5];
        for bit in 0..40u8 {
            self.wait_while(false, Stage::Bit(bit))?;
            let high_us = self.wait_while(true, Stage::Bit(bit))?;
            if high_us > ONE_THRESHOLD_US {
                frame[usize::from(bit / 8)] |= 0x80 >> (bit % 8);
            }
        }
        Ok(frame)
    }

    /// Spin while the line sits at `level`; returns how long it stayed.
    fn wait_while(&mut self, level: bool, stage: Stage) -> Result<u64, DhtError> {
        let start = self.clock.now_us();
        loop {
            let high = self.pin.is_high().map_err(|_| DhtError::Pin)?;
            let elapsed = self.clock.now_us().saturating_sub(start);
            if high != level {
                return Ok(elapsed);
            }
            if elapsed > PHASE_TIMEOUT_US {
                return Err(DhtError::Timeout(stage));
            }
        }
    }
}

impl<P, D, C> ClimatePort for Dht22<P, D, C>
where
    P: InputPin + OutputPin,
    D: DelayNs,
    C: MicrosClock,
{
    fn read_climate(&mut self) -> Option<ClimateReading> {
        match self.read() {
            Ok(reading) => Some(reading),
            Err(e) => {
                debug!("DHT22: {}", e);
                None
            }
        }
    }
}
