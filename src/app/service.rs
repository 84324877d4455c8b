//! Feeder service: the hexagonal core.
//!
//! [`FeederService`] owns the carousel, the feeding session, and the
//! scheduler, and runs them once per control tick with a single clock
//! snapshot.  All I/O flows through port traits injected at call sites,
//! making the entire service testable with mock adapters.
//!
//! ```text
//!  PresencePort ──▶ ┌───────────────────────────────┐ ──▶ EventSink
//!     AlertPort ◀──│         FeederService          │
//!     DaySource ──▶│ Scheduler · Session · Carousel │ ──▶ MotionPrimitive
//!   ClimatePort ──▶│      EnvironmentMonitor        │
//!                  └───────────────────────────────┘
//! ```

use heapless::String;
use log::{info, warn};

use crate::carousel::Carousel;
use crate::config::{FeederConfig, validate_config};
use crate::error::{FeederError, Result};
use crate::scheduler::{FeedingScheduler, STATUS_CAPACITY};
use crate::sensors::environment::{ENV_STATUS_CAPACITY, EnvironmentMonitor};
use crate::session::FeedingSession;

use super::commands::FeederCommand;
use super::events::{FeederEvent, StatusSnapshot};
use super::ports::{
    AlertPort, ClimatePort, ConfigPort, DaySource, EventSink, FeedingTrigger, MotionPrimitive,
    PresencePort,
};

/// Delay between the last runtime change and the automatic config save.
pub const AUTO_SAVE_DELAY_MS: u64 = 5_000;

// ───────────────────────────────────────────────────────────────
// FeederService
// ───────────────────────────────────────────────────────────────

pub struct FeederService<M: MotionPrimitive> {
    config: FeederConfig,
    carousel: Carousel<M>,
    session: FeedingSession,
    scheduler: FeedingScheduler,
    environment: EnvironmentMonitor,
    tick_count: u64,
    /// Bumped on every accepted `UpdateConfig`; adapters compare it to
    /// know when to re-read the config.
    config_revision: u32,
    config_dirty: bool,
    dirty_since_ms: u64,
}

impl<M: MotionPrimitive> FeederService<M> {
    /// Construct the service around an already-validated configuration.
    ///
    /// Does **not** start the scheduler; call [`start`](Self::start) next.
    pub fn new(config: FeederConfig, motor: M) -> Self {
        let carousel = Carousel::new(
            motor,
            config.carousel_geometry(),
            config.max_speed_steps_per_sec,
            config.acceleration_steps_per_sec2,
        );
        Self {
            carousel,
            session: FeedingSession::new(config.session_config()),
            scheduler: FeedingScheduler::new(config.schedule_settings()),
            environment: EnvironmentMonitor::new(
                config.environment_thresholds(),
                config.environment_read_interval_ms,
            ),
            config,
            tick_count: 0,
            config_revision: 0,
            config_dirty: false,
            dirty_since_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Define home, schedule the first feeding, and announce the start.
    pub fn start(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        if let Err(e) = self.carousel.calibrate() {
            warn!("Startup calibration failed: {}", e);
        }
        self.scheduler.begin(now_ms);
        sink.emit(&FeederEvent::Started {
            compartment: self.carousel.current_compartment(),
        });
        info!(
            "FeederService started: {} compartments, target {}",
            self.config.total_compartments, self.config.feeding_compartment
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: scheduler → session → carousel.
    ///
    /// The `io` parameter satisfies **both** [`PresencePort`] and
    /// [`AlertPort`], which avoids a double mutable borrow while keeping
    /// the port boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u64,
        io: &mut (impl PresencePort + AlertPort),
        days: &impl DaySource,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;

        self.scheduler
            .update(now_ms, days.current_day(), &mut self.session, sink);
        self.session.update(now_ms, &mut self.carousel, io, sink);
        self.carousel.update(now_ms, sink);
    }

    /// Read the climate sensor when a reading is due.  Independent of the
    /// feeding cycle; call from the same loop as [`tick`](Self::tick).
    pub fn poll_environment(
        &mut self,
        now_ms: u64,
        climate: &mut impl ClimatePort,
        sink: &mut impl EventSink,
    ) {
        if self.environment.is_due(now_ms) {
            let reading = climate.read_climate();
            self.environment.record(now_ms, reading, sink);
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (bot, web API, serial).
    ///
    /// Rejected commands return the reason and change nothing.
    pub fn handle_command(
        &mut self,
        cmd: FeederCommand,
        now_ms: u64,
        io: &mut impl AlertPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        match cmd {
            FeederCommand::FeedNow => self.session.start_feeding(now_ms, sink),
            FeederCommand::FeedNowManual => self.session.start_feeding_manual(now_ms, sink),
            FeederCommand::CancelFeeding => {
                self.session
                    .cancel_feeding(now_ms, &mut self.carousel, io, sink);
                Ok(())
            }
            FeederCommand::SetScheduleEnabled(enabled) => {
                self.scheduler.set_enabled(enabled, now_ms);
                self.config.auto_feeding_enabled = enabled;
                self.mark_config_dirty(now_ms);
                Ok(())
            }
            FeederCommand::SetFeedingInterval(hours) => {
                self.scheduler.set_feeding_interval(hours, now_ms)?;
                self.config.feeding_interval_hours = hours;
                self.mark_config_dirty(now_ms);
                Ok(())
            }
            FeederCommand::SetMaxFeedingsPerDay(max) => {
                self.scheduler.set_max_feedings_per_day(max)?;
                self.config.max_feedings_per_day = max;
                self.mark_config_dirty(now_ms);
                Ok(())
            }
            FeederCommand::ResetDailyCount => {
                self.scheduler.reset_daily_count(now_ms);
                Ok(())
            }
            FeederCommand::SetSoundEnabled(enabled) => {
                self.session.enable_sound(enabled);
                self.config.sound_before_feeding = enabled;
                self.mark_config_dirty(now_ms);
                Ok(())
            }
            FeederCommand::SetPresenceRequired(required) => {
                self.session.require_presence(required);
                self.config.require_presence = required;
                self.mark_config_dirty(now_ms);
                Ok(())
            }
            FeederCommand::MoveToCompartment(index) => {
                self.ensure_no_session()?;
                self.carousel.move_to_compartment(index, now_ms, sink)
            }
            FeederCommand::NextCompartment => {
                self.ensure_no_session()?;
                self.carousel.move_to_next_compartment(now_ms, sink)
            }
            FeederCommand::PreviousCompartment => {
                self.ensure_no_session()?;
                self.carousel.move_to_previous_compartment(now_ms, sink)
            }
            FeederCommand::Calibrate => {
                self.ensure_no_session()?;
                self.carousel.calibrate()
            }
            FeederCommand::UpdateConfig(new_config) => self.apply_config(new_config, now_ms),
            FeederCommand::SaveConfig => {
                self.config_dirty = true;
                self.dirty_since_ms = 0;
                info!("Explicit config save requested (will flush on next auto-save check)");
                Ok(())
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Point-in-time status for the bot / web layers.
    pub fn status(&self, now_ms: u64) -> StatusSnapshot {
        StatusSnapshot {
            feeding_state: self.session.state(),
            feeding_in_progress: self.session.is_feeding_in_progress(),
            progress_percent: self.session.progress(now_ms, &self.carousel),
            last_error: self.session.last_error(),
            motor_state: self.carousel.state(),
            current_compartment: self.carousel.current_compartment(),
            auto_feeding_enabled: self.scheduler.is_enabled(),
            feedings_today: self.scheduler.feedings_today(),
            max_feedings_per_day: self.scheduler.max_feedings_per_day(),
            ms_until_next_feeding: self.scheduler.time_until_next_feeding(now_ms),
            temperature_c: self.environment.reading().map(|r| r.temperature_c),
            humidity_pct: self.environment.reading().map(|r| r.humidity_pct),
            environment_alert: self.environment.current_alert(),
        }
    }

    pub fn state_str(&self) -> &'static str {
        self.session.state_str()
    }

    pub fn feeding_progress(&self, now_ms: u64) -> f32 {
        self.session.progress(now_ms, &self.carousel)
    }

    pub fn is_feeding_in_progress(&self) -> bool {
        self.session.is_feeding_in_progress()
    }

    pub fn current_compartment(&self) -> u8 {
        self.carousel.current_compartment()
    }

    pub fn schedule_status(&self, now_ms: u64) -> String<STATUS_CAPACITY> {
        self.scheduler.schedule_status(now_ms)
    }

    /// The main loop spins without sleeping while this is true.
    pub fn is_motion_active(&self) -> bool {
        self.carousel.is_moving()
    }

    pub fn carousel(&self) -> &Carousel<M> {
        &self.carousel
    }

    pub fn session(&self) -> &FeedingSession {
        &self.session
    }

    pub fn scheduler(&self) -> &FeedingScheduler {
        &self.scheduler
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Clone of the live configuration (for API read-back or delta updates).
    pub fn current_config(&self) -> FeederConfig {
        self.config.clone()
    }

    pub fn config(&self) -> &FeederConfig {
        &self.config
    }

    /// Count of accepted runtime config updates since startup.
    pub fn config_revision(&self) -> u32 {
        self.config_revision
    }

    pub fn environment(&self) -> &EnvironmentMonitor {
        &self.environment
    }

    /// e.g. `Temp: 22.5°C | Hum: 40.0%`, or a no-data line.
    pub fn environment_status(&self) -> String<ENV_STATUS_CAPACITY> {
        self.environment.status_line()
    }

    // ── Internal ──────────────────────────────────────────────

    fn ensure_no_session(&self) -> Result<()> {
        if self.session.is_feeding_in_progress() {
            warn!("Manual carousel command rejected: feeding in progress");
            return Err(FeederError::AlreadyInProgress);
        }
        Ok(())
    }

    fn apply_config(&mut self, new_config: FeederConfig, now_ms: u64) -> Result<()> {
        if self.session.is_feeding_in_progress() {
            return Err(FeederError::AlreadyInProgress);
        }
        if self.carousel.is_moving() {
            return Err(FeederError::MotorAlreadyMoving);
        }
        if let Err(e) = validate_config(&new_config) {
            warn!("Config update rejected: {}", e);
            return Err(e.into());
        }
        // The LEDC timer is configured once at boot
        if new_config.alert_frequency_hz != self.config.alert_frequency_hz {
            warn!("Config update rejected: alert frequency change needs a restart");
            return Err(FeederError::InvalidConfig(
                "alert_frequency_hz is fixed until restart",
            ));
        }

        self.carousel.reconfigure(
            new_config.carousel_geometry(),
            new_config.max_speed_steps_per_sec,
            new_config.acceleration_steps_per_sec2,
        )?;
        self.session.apply_config(new_config.session_config())?;
        if new_config.schedule_settings() != self.scheduler.settings() {
            self.scheduler
                .apply_settings(new_config.schedule_settings(), now_ms);
        }
        self.environment.reconfigure(
            new_config.environment_thresholds(),
            new_config.environment_read_interval_ms,
        );
        self.config = new_config;
        self.config_revision = self.config_revision.wrapping_add(1);
        self.mark_config_dirty(now_ms);
        info!("Configuration updated at runtime");
        Ok(())
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the config as modified.  The save delay counts from the first
    /// unsaved change.
    pub fn mark_config_dirty(&mut self, now_ms: u64) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_ms = now_ms;
        }
    }

    /// Save once [`AUTO_SAVE_DELAY_MS`] have passed since the config became
    /// dirty.  Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, now_ms: u64, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        if now_ms.saturating_sub(self.dirty_since_ms) < AUTO_SAVE_DELAY_MS {
            return false;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config auto-saved to NVS");
                true
            }
            Err(e) => {
                warn!("Config auto-save failed: {}", e);
                false
            }
        }
    }

    /// Force-save if dirty (call before a restart).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config force-saved");
            }
            Err(e) => {
                warn!("Config force-save failed: {}", e);
            }
        }
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}
