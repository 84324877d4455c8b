//! PIR motion sensor (HC-SR501 class) for pet presence at the bowl.
//!
//! The digital output is sampled every `poll_interval_ms`.  A rising edge
//! marks the start of a detection.  [`PirSensor::is_detected`] is the raw
//! level and is what gates a feeding.  [`PirSensor::is_confirmed`] also
//! requires the output to have stayed high for `confirm_ms`, for callers
//! that want to filter the single-sample blips these modules produce on
//! temperature swings.
//!
//! Sampling is cooperative: [`PirSensor::poll`] is called from the main
//! loop and returns immediately when no sample is due.

use embedded_hal::digital::InputPin;
use log::debug;

pub struct PirSensor<P: InputPin> {
    pin: P,
    poll_interval_ms: u64,
    confirm_ms: u64,
    next_poll_ms: u64,
    level: bool,
    detection_started_ms: Option<u64>,
    last_detection_ms: Option<u64>,
    last_duration_ms: u64,
}

impl<P: InputPin> PirSensor<P> {
    pub fn new(pin: P, poll_interval_ms: u32, confirm_ms: u32) -> Self {
        Self {
            pin,
            poll_interval_ms: u64::from(poll_interval_ms),
            confirm_ms: u64::from(confirm_ms),
            next_poll_ms: 0,
            level: false,
            detection_started_ms: None,
            last_detection_ms: None,
            last_duration_ms: 0,
        }
    }

    /// Change sampling and confirmation timing.  Takes effect from the
    /// next due sample.
    pub fn set_timing(&mut self, poll_interval_ms: u32, confirm_ms: u32) {
        let poll = u64::from(poll_interval_ms);
        if poll != self.poll_interval_ms {
            self.next_poll_ms = self.next_poll_ms.saturating_sub(self.poll_interval_ms) + poll;
            self.poll_interval_ms = poll;
        }
        self.confirm_ms = u64::from(confirm_ms);
    }

    /// Sample the pin if due.  Returns `true` on a rising edge.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if now_ms < self.next_poll_ms {
            return false;
        }
        self.next_poll_ms = now_ms + self.poll_interval_ms;

        // A read error counts as "nothing there"
        let high = self.pin.is_high().unwrap_or(false);
        let rising = high && !self.level;

        if rising {
            self.detection_started_ms = Some(now_ms);
            self.last_detection_ms = Some(now_ms);
            debug!("PIR: detection started");
        } else if !high && self.level {
            if let Some(start) = self.detection_started_ms.take() {
                self.last_duration_ms = now_ms.saturating_sub(start);
                debug!("PIR: detection ended after {} ms", self.last_duration_ms);
            }
        }

        self.level = high;
        rising
    }

    /// Raw output level at the last sample.
    pub fn is_detected(&self) -> bool {
        self.level
    }

    /// Output has been continuously high for the confirmation window.
    pub fn is_confirmed(&self, now_ms: u64) -> bool {
        self.level
            && self
                .detection_started_ms
                .is_some_and(|start| now_ms.saturating_sub(start) >= self.confirm_ms)
    }

    pub fn last_detection_ms(&self) -> Option<u64> {
        self.last_detection_ms
    }

    /// Length of the last completed detection.
    pub fn last_detection_duration_ms(&self) -> u64 {
        self.last_duration_ms
    }
}
