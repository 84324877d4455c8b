//! Automatic feeding scheduler.
//!
//! Fires a feeding every `interval_hours`, capped at `max_feedings_per_day`
//! per calendar day.  The scheduler only knows the session through the
//! [`FeedingTrigger`] port and the day of month through whatever the caller
//! passes in each tick.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       update(now, day)                       │
//! │                                                              │
//! │  day changed? ──yes──▶ reset_daily_count() + DailyCountReset │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  enabled && !in_progress && today < max && now >= next ?     │
//! │        │                                                     │
//! │        ▼ yes                                                 │
//! │  FeedingTrigger::start_feeding()                             │
//! │        │ Ok                                                  │
//! │        ▼                                                     │
//! │  last = now, today += 1, next = now + interval               │
//! │  emit ScheduledFeedingExecuted                               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Manual feedings go straight to the session and never touch the daily
//! count.

use core::fmt::Write as _;

use heapless::String;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::FeederEvent;
use crate::app::ports::{EventSink, FeedingTrigger};
use crate::error::{FeederError, Result};

pub const MS_PER_HOUR: u64 = 3_600_000;

/// Capacity of [`FeedingScheduler::schedule_status`] output.
pub const STATUS_CAPACITY: usize = 64;

// ═══════════════════════════════════════════════════════════════
//  Settings
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    pub enabled: bool,
    /// Hours between feedings, 1–24.
    pub interval_hours: u8,
    /// Scheduled feedings per calendar day, 1–10.
    pub max_feedings_per_day: u8,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

pub struct FeedingScheduler {
    settings: ScheduleSettings,
    last_feeding_ms: Option<u64>,
    next_feeding_ms: Option<u64>,
    feedings_today: u8,
    last_day: Option<u8>,
}

impl FeedingScheduler {
    pub fn new(settings: ScheduleSettings) -> Self {
        Self {
            settings,
            last_feeding_ms: None,
            next_feeding_ms: None,
            feedings_today: 0,
            last_day: None,
        }
    }

    /// Schedule the first feeding relative to `now_ms`.
    pub fn begin(&mut self, now_ms: u64) {
        self.schedule_next_feeding(now_ms);
        info!(
            "Scheduler: {} every {} h, max {}/day",
            if self.settings.enabled { "enabled" } else { "disabled" },
            self.settings.interval_hours,
            self.settings.max_feedings_per_day
        );
    }

    /// One tick.  Returns `true` when a scheduled feeding was started.
    ///
    /// `day` is the current day of month, `None` while unknown.  The first
    /// known day only sets the baseline.
    pub fn update(
        &mut self,
        now_ms: u64,
        day: Option<u8>,
        session: &mut impl FeedingTrigger,
        sink: &mut impl EventSink,
    ) -> bool {
        self.check_day_change(now_ms, day, sink);

        if !self.should_feed_now(now_ms, session) {
            return false;
        }

        match session.start_feeding(now_ms, sink) {
            Ok(()) => {
                self.last_feeding_ms = Some(now_ms);
                self.feedings_today = self.feedings_today.saturating_add(1);
                self.schedule_next_feeding(now_ms);
                info!(
                    "Scheduler: feeding {}/{} started",
                    self.feedings_today, self.settings.max_feedings_per_day
                );
                sink.emit(&FeederEvent::ScheduledFeedingExecuted {
                    feedings_today: self.feedings_today,
                });
                true
            }
            Err(e) => {
                warn!("Scheduler: session refused feeding: {}", e);
                false
            }
        }
    }

    /// First feeding is `now + interval`; afterwards `last + interval`.
    pub fn schedule_next_feeding(&mut self, now_ms: u64) {
        let base = self.last_feeding_ms.unwrap_or(now_ms);
        let next = base + u64::from(self.settings.interval_hours) * MS_PER_HOUR;
        self.next_feeding_ms = Some(next);
        debug!("Scheduler: next feeding at {} ms", next);
    }

    // ── Commands ──────────────────────────────────────────────

    pub fn set_enabled(&mut self, enabled: bool, now_ms: u64) {
        self.settings.enabled = enabled;
        if enabled {
            self.schedule_next_feeding(now_ms);
        }
        info!("Scheduler: {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Out-of-range values leave the interval untouched.
    pub fn set_feeding_interval(&mut self, hours: u8, now_ms: u64) -> Result<()> {
        if !(1..=24).contains(&hours) {
            debug!("Scheduler: interval {} h ignored", hours);
            return Err(FeederError::InvalidConfig("feeding interval must be 1-24 h"));
        }
        self.settings.interval_hours = hours;
        self.schedule_next_feeding(now_ms);
        Ok(())
    }

    /// Out-of-range values leave the limit untouched.
    pub fn set_max_feedings_per_day(&mut self, max: u8) -> Result<()> {
        if !(1..=10).contains(&max) {
            debug!("Scheduler: max {}/day ignored", max);
            return Err(FeederError::InvalidConfig("max feedings per day must be 1-10"));
        }
        self.settings.max_feedings_per_day = max;
        Ok(())
    }

    pub fn reset_daily_count(&mut self, now_ms: u64) {
        self.feedings_today = 0;
        self.schedule_next_feeding(now_ms);
        info!("Scheduler: daily count reset");
    }

    /// Restore counters persisted outside the core.
    pub fn restore(&mut self, feedings_today: u8, last_feeding_ms: Option<u64>, now_ms: u64) {
        self.feedings_today = feedings_today;
        self.last_feeding_ms = last_feeding_ms;
        self.schedule_next_feeding(now_ms);
    }

    /// Replace all settings at once (runtime config update).
    pub fn apply_settings(&mut self, settings: ScheduleSettings, now_ms: u64) {
        self.settings = settings;
        self.schedule_next_feeding(now_ms);
    }

    // ── Queries ───────────────────────────────────────────────

    /// Milliseconds until the next feeding; 0 when disabled, unscheduled
    /// or already due.
    pub fn time_until_next_feeding(&self, now_ms: u64) -> u64 {
        if !self.settings.enabled {
            return 0;
        }
        self.next_feeding_ms
            .map_or(0, |next| next.saturating_sub(now_ms))
    }

    /// One-line summary for the bot and web layers.
    pub fn schedule_status(&self, now_ms: u64) -> String<STATUS_CAPACITY> {
        let mut out = String::new();
        if !self.settings.enabled {
            let _ = out.push_str("Schedule: disabled");
            return out;
        }
        let remaining = format_time_remaining(self.time_until_next_feeding(now_ms));
        let _ = write!(
            out,
            "Next feeding in: {} | Today: {}/{}",
            remaining, self.feedings_today, self.settings.max_feedings_per_day
        );
        out
    }

    pub fn settings(&self) -> ScheduleSettings {
        self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn feeding_interval_hours(&self) -> u8 {
        self.settings.interval_hours
    }

    pub fn max_feedings_per_day(&self) -> u8 {
        self.settings.max_feedings_per_day
    }

    pub fn feedings_today(&self) -> u8 {
        self.feedings_today
    }

    pub fn next_feeding_ms(&self) -> Option<u64> {
        self.next_feeding_ms
    }

    pub fn last_feeding_ms(&self) -> Option<u64> {
        self.last_feeding_ms
    }

    // ── Internal ──────────────────────────────────────────────

    fn check_day_change(&mut self, now_ms: u64, day: Option<u8>, sink: &mut impl EventSink) {
        let Some(day) = day else {
            return;
        };
        match self.last_day {
            None => self.last_day = Some(day),
            Some(prev) if prev != day => {
                self.last_day = Some(day);
                self.reset_daily_count(now_ms);
                sink.emit(&FeederEvent::DailyCountReset { day });
            }
            Some(_) => {}
        }
    }

    fn should_feed_now(&self, now_ms: u64, session: &impl FeedingTrigger) -> bool {
        self.settings.enabled
            && !session.is_feeding_in_progress()
            && self.feedings_today < self.settings.max_feedings_per_day
            && self.next_feeding_ms.is_some_and(|next| now_ms >= next)
    }
}

/// Render a duration the way the status line shows it: `"3h 20m"`,
/// `"5m 12s"`, `"45s"`, `"now"` for zero and `"0s"` below one second.
pub fn format_time_remaining(ms: u64) -> String<16> {
    let mut out: String<16> = String::new();
    if ms == 0 {
        let _ = out.push_str("now");
        return out;
    }

    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs / 60) % 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        let _ = write!(out, "{hours}h ");
    }
    if minutes > 0 {
        let _ = write!(out, "{minutes}m ");
    }
    if hours == 0 && seconds > 0 {
        let _ = write!(out, "{seconds}s");
    }

    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    if out.is_empty() {
        let _ = out.push_str("0s");
    }
    out
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
