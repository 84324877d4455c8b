//! ESP32 time adapter.
//!
//! Provides monotonic time and the calendar day for the feeder.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic) and
//!   reads the wall clock through `gettimeofday` + `localtime_r`.
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` for
//!   host-side testing and simulation; the calendar day is never known.
//!
//! The adapter is `Copy` so the stepper driver and the control loop can
//! each hold their own handle to the same clock.

use crate::app::ports::DaySource;
use crate::drivers::stepper::MicrosClock;

/// Monotonic clock for the ESP32-S3 platform.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic, wraps at `u64::MAX`).
    #[cfg(target_os = "espidf")]
    pub fn now_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic, wraps at `u64::MAX`).
    #[cfg(not(target_os = "espidf"))]
    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Milliseconds since boot; the timestamp every core component works in.
    pub fn now_ms(&self) -> u64 {
        self.now_us() / 1_000
    }

    /// Day of month (1–31) from the system clock.  `None` if the wall clock
    /// is not synced yet (e.g. pre-NTP).
    #[cfg(target_os = "espidf")]
    pub fn day_of_month(&self) -> Option<u8> {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        // Reject obviously unsynced time (e.g. before 2020-01-01)
        const EPOCH_2020: i64 = 1_577_836_800;
        if tv.tv_sec < EPOCH_2020 {
            return None;
        }
        let secs = tv.tv_sec as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        let day = tm.tm_mday;
        if !(1..=31).contains(&day) {
            return None;
        }
        Some(day as u8)
    }

    /// Day of month.  On non-ESP targets (simulation) always `None`.
    #[cfg(not(target_os = "espidf"))]
    pub fn day_of_month(&self) -> Option<u8> {
        None
    }
}

impl MicrosClock for MonotonicClock {
    fn now_us(&self) -> u64 {
        MonotonicClock::now_us(self)
    }
}

impl DaySource for MonotonicClock {
    fn current_day(&self) -> Option<u8> {
        self.day_of_month()
    }
}
