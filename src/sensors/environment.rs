//! Climate monitoring around the food store.
//!
//! A temperature/humidity reading is taken every `read_interval_ms` and
//! checked against the [`EnvironmentThresholds`].  Checks run in a fixed
//! order (too cold, too hot, too humid) and the first hit wins.  An alert
//! is reported once when it appears or changes; it is not repeated while
//! the condition persists, and it re-arms when conditions go back to
//! normal.
//!
//! A failed read marks the data invalid.  Invalid data never raises an
//! alert and clears the latched one, so a condition that outlasts a
//! sensor dropout is reported again.

use core::fmt::{self, Write};

use heapless::String;
use log::{debug, warn};
use serde::Serialize;

use crate::app::events::FeederEvent;
use crate::app::ports::EventSink;

/// Capacity of [`EnvironmentMonitor::status_line`].
pub const ENV_STATUS_CAPACITY: usize = 48;

/// One successful sensor read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClimateReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Which threshold a reading crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnvironmentAlert {
    TempLow,
    TempHigh,
    HumidityHigh,
}

impl EnvironmentAlert {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TempLow => "temperature low",
            Self::TempHigh => "temperature high",
            Self::HumidityHigh => "humidity high",
        }
    }
}

impl fmt::Display for EnvironmentAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentThresholds {
    pub temp_min_c: f32,
    pub temp_max_c: f32,
    pub humidity_max_pct: f32,
    /// When off, readings are still kept but no alert events are emitted.
    pub alerts_enabled: bool,
}

impl Default for EnvironmentThresholds {
    fn default() -> Self {
        Self {
            temp_min_c: 5.0,
            temp_max_c: 35.0,
            humidity_max_pct: 70.0,
            alerts_enabled: true,
        }
    }
}

impl EnvironmentThresholds {
    pub fn evaluate(&self, reading: &ClimateReading) -> Option<EnvironmentAlert> {
        if reading.temperature_c < self.temp_min_c {
            Some(EnvironmentAlert::TempLow)
        } else if reading.temperature_c > self.temp_max_c {
            Some(EnvironmentAlert::TempHigh)
        } else if reading.humidity_pct > self.humidity_max_pct {
            Some(EnvironmentAlert::HumidityHigh)
        } else {
            None
        }
    }
}

pub struct EnvironmentMonitor {
    thresholds: EnvironmentThresholds,
    read_interval_ms: u64,
    next_read_ms: u64,
    /// Last good reading; kept across failed reads.
    reading: Option<ClimateReading>,
    valid: bool,
    last_update_ms: u64,
    last_alert: Option<EnvironmentAlert>,
    failed_reads: u32,
}

impl EnvironmentMonitor {
    pub fn new(thresholds: EnvironmentThresholds, read_interval_ms: u32) -> Self {
        Self {
            thresholds,
            read_interval_ms: u64::from(read_interval_ms),
            next_read_ms: 0,
            reading: None,
            valid: false,
            last_update_ms: 0,
            last_alert: None,
            failed_reads: 0,
        }
    }

    /// A new sensor read should be taken.
    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms >= self.next_read_ms
    }

    /// Record the outcome of a sensor read (`None` = failed) and emit an
    /// alert if one appeared or changed.
    pub fn record(
        &mut self,
        now_ms: u64,
        reading: Option<ClimateReading>,
        sink: &mut impl EventSink,
    ) {
        self.next_read_ms = now_ms + self.read_interval_ms;

        match reading {
            Some(r) => {
                self.reading = Some(r);
                self.valid = true;
                self.last_update_ms = now_ms;
                self.failed_reads = 0;
                debug!("ENV | {:.1} C, {:.1} %", r.temperature_c, r.humidity_pct);
            }
            None => {
                if self.valid {
                    warn!("ENV | sensor read failed, data invalid");
                }
                self.valid = false;
                self.failed_reads = self.failed_reads.saturating_add(1);
            }
        }

        if !self.thresholds.alerts_enabled {
            return;
        }

        let alert = self.current_alert();
        if let (Some(alert), Some(r)) = (alert, self.reading) {
            if self.last_alert != Some(alert) {
                sink.emit(&FeederEvent::EnvironmentAlert {
                    alert,
                    temperature_c: r.temperature_c,
                    humidity_pct: r.humidity_pct,
                });
            }
        }
        self.last_alert = alert;
    }

    /// Alert for the current data, `None` when invalid or within limits.
    pub fn current_alert(&self) -> Option<EnvironmentAlert> {
        self.reading
            .filter(|_| self.valid)
            .and_then(|r| self.thresholds.evaluate(&r))
    }

    /// Valid data within every threshold.
    pub fn is_ok(&self) -> bool {
        self.valid && self.current_alert().is_none()
    }

    /// Latest reading, `None` while the data is invalid.
    pub fn reading(&self) -> Option<ClimateReading> {
        self.reading.filter(|_| self.valid)
    }

    /// Time since the last good reading.
    pub fn reading_age_ms(&self, now_ms: u64) -> Option<u64> {
        self.reading().map(|_| now_ms.saturating_sub(self.last_update_ms))
    }

    /// Consecutive failed reads since the last good one.
    pub fn failed_reads(&self) -> u32 {
        self.failed_reads
    }

    pub fn thresholds(&self) -> EnvironmentThresholds {
        self.thresholds
    }

    /// Replace thresholds and interval.  The alert latch is kept, so an
    /// ongoing condition is not re-announced.
    pub fn reconfigure(&mut self, thresholds: EnvironmentThresholds, read_interval_ms: u32) {
        let interval = u64::from(read_interval_ms);
        if interval != self.read_interval_ms {
            self.next_read_ms = self.next_read_ms.saturating_sub(self.read_interval_ms) + interval;
            self.read_interval_ms = interval;
        }
        self.thresholds = thresholds;
    }

    /// One-line summary, e.g. `Temp: 22.5°C | Hum: 40.0% [ALERT]`.
    pub fn status_line(&self) -> String<ENV_STATUS_CAPACITY> {
        let mut out = String::new();
        match self.reading() {
            Some(r) => {
                let _ = write!(
                    out,
                    "Temp: {:.1}°C | Hum: {:.1}%",
                    r.temperature_c, r.humidity_pct
                );
                if !self.is_ok() {
                    let _ = out.push_str(" [ALERT]");
                }
            }
            None => {
                let _ = out.push_str("Environment: no data");
            }
        }
        out
    }
}
