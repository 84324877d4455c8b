//! Feeder configuration parameters
//!
//! All tunable parameters for the carousel feeder.  The struct is owned by
//! the [`FeederService`](crate::app::service::FeederService) and split into
//! per-component views ([`SessionConfig`], [`ScheduleSettings`],
//! [`CarouselGeometry`]) at construction; there is no global config state.
//! Values can be overridden via NVS through the
//! [`ConfigPort`](crate::app::ports::ConfigPort).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::carousel::CarouselGeometry;
use crate::scheduler::ScheduleSettings;
use crate::sensors::environment::EnvironmentThresholds;
use crate::session::SessionConfig;

/// Upper bound on the carousel size (keeps step math far from overflow).
pub const MAX_COMPARTMENTS: u8 = 16;

/// The DHT22 returns stale data if polled faster than this.
pub const MIN_ENVIRONMENT_READ_INTERVAL_MS: u32 = 2_000;

/// Core feeder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeederConfig {
    // --- Carousel ---
    /// Number of compartments on the carousel
    pub total_compartments: u8,
    /// Compartment index sitting over the dispensing aperture
    pub feeding_compartment: u8,
    /// Full steps per motor revolution
    pub steps_per_revolution: u16,
    /// Driver microstep setting
    pub microsteps: u8,
    /// Stepper cruise speed (steps/s)
    pub max_speed_steps_per_sec: f32,
    /// Stepper acceleration (steps/s²)
    pub acceleration_steps_per_sec2: f32,

    // --- Feeding behaviour ---
    /// Play the alert tone before dispensing
    pub sound_before_feeding: bool,
    /// Wait for the pet to be detected before dispensing
    pub require_presence: bool,
    /// Presence wait window (ms)
    pub max_wait_ms: u32,
    /// Time the compartment stays over the aperture (ms)
    pub feeding_duration_ms: u32,

    // --- Schedule ---
    /// Automatic feeding enabled
    pub auto_feeding_enabled: bool,
    /// Hours between scheduled feedings (1-24)
    pub feeding_interval_hours: u8,
    /// Scheduled feedings allowed per calendar day (1-10)
    pub max_feedings_per_day: u8,

    // --- Alert tone ---
    /// Buzzer tone frequency (Hz); fixed when the PWM timer is configured
    /// at boot, so a runtime update may not change it
    pub alert_frequency_hz: u32,
    /// Length of each tone burst (ms)
    pub alert_tone_ms: u32,
    /// Number of tone bursts
    pub alert_repetitions: u8,
    /// Silence between bursts (ms)
    pub alert_pause_ms: u32,

    // --- Presence sensor ---
    /// PIR output must stay high this long to count as a confirmed visit
    /// (ms).  Feeding is gated on the raw level, not on confirmation.
    pub presence_confirm_ms: u32,
    /// PIR sampling interval (ms)
    pub pir_poll_interval_ms: u32,

    // --- Environment ---
    /// Climate sensor read interval (ms)
    pub environment_read_interval_ms: u32,
    /// Emit an event when a climate threshold is crossed
    pub environment_alerts_enabled: bool,
    /// Alert below this temperature (°C)
    pub temp_min_alert_c: f32,
    /// Alert above this temperature (°C)
    pub temp_max_alert_c: f32,
    /// Alert above this relative humidity (%)
    pub humidity_max_alert_pct: f32,

    // --- Timing ---
    /// Control loop interval while the carousel is stationary (ms)
    pub control_loop_interval_ms: u32,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            // Carousel
            total_compartments: 5,
            feeding_compartment: 4,
            steps_per_revolution: 200,
            microsteps: 16,
            max_speed_steps_per_sec: 1000.0,
            acceleration_steps_per_sec2: 500.0,

            // Feeding behaviour
            sound_before_feeding: true,
            require_presence: true,
            max_wait_ms: 300_000, // 5 min
            feeding_duration_ms: 5_000,

            // Schedule
            auto_feeding_enabled: true,
            feeding_interval_hours: 4,
            max_feedings_per_day: 4,

            // Alert tone
            alert_frequency_hz: 2_000,
            alert_tone_ms: 500,
            alert_repetitions: 3,
            alert_pause_ms: 300,

            // Presence sensor
            presence_confirm_ms: 2_000,
            pir_poll_interval_ms: 100, // 10 Hz

            // Environment
            environment_read_interval_ms: 2_000,
            environment_alerts_enabled: true,
            temp_min_alert_c: 5.0,
            temp_max_alert_c: 35.0,
            humidity_max_alert_pct: 70.0,

            // Timing
            control_loop_interval_ms: 10, // 100 Hz
        }
    }
}

impl FeederConfig {
    /// Absolute steps between two adjacent compartments.
    pub fn steps_per_compartment(&self) -> i64 {
        let per_rev = i64::from(self.steps_per_revolution) * i64::from(self.microsteps);
        per_rev / i64::from(self.total_compartments.max(1))
    }

    pub fn carousel_geometry(&self) -> CarouselGeometry {
        CarouselGeometry {
            total_compartments: self.total_compartments,
            steps_per_compartment: self.steps_per_compartment(),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            sound_enabled: self.sound_before_feeding,
            presence_required: self.require_presence,
            max_wait_ms: self.max_wait_ms,
            feeding_duration_ms: self.feeding_duration_ms,
            target_compartment: self.feeding_compartment,
        }
    }

    pub fn schedule_settings(&self) -> ScheduleSettings {
        ScheduleSettings {
            enabled: self.auto_feeding_enabled,
            interval_hours: self.feeding_interval_hours,
            max_feedings_per_day: self.max_feedings_per_day,
        }
    }

    pub fn environment_thresholds(&self) -> EnvironmentThresholds {
        EnvironmentThresholds {
            temp_min_c: self.temp_min_alert_c,
            temp_max_c: self.temp_max_alert_c,
            humidity_max_pct: self.humidity_max_alert_pct,
            alerts_enabled: self.environment_alerts_enabled,
        }
    }
}

/// Range-check every field.  Invalid values are rejected, never clamped.
pub fn validate_config(cfg: &FeederConfig) -> Result<(), ConfigError> {
    if !(2..=MAX_COMPARTMENTS).contains(&cfg.total_compartments) {
        return Err(ConfigError::ValidationFailed(
            "total_compartments must be 2–16",
        ));
    }
    if cfg.feeding_compartment >= cfg.total_compartments {
        return Err(ConfigError::ValidationFailed(
            "feeding_compartment must be < total_compartments",
        ));
    }
    if cfg.steps_per_revolution == 0 || cfg.microsteps == 0 {
        return Err(ConfigError::ValidationFailed(
            "steps_per_revolution and microsteps must be non-zero",
        ));
    }
    if cfg.steps_per_compartment() == 0 {
        return Err(ConfigError::ValidationFailed(
            "steps per compartment rounds to zero",
        ));
    }
    if !(1.0..=20_000.0).contains(&cfg.max_speed_steps_per_sec) {
        return Err(ConfigError::ValidationFailed(
            "max_speed_steps_per_sec must be 1–20000",
        ));
    }
    if !(1.0..=50_000.0).contains(&cfg.acceleration_steps_per_sec2) {
        return Err(ConfigError::ValidationFailed(
            "acceleration_steps_per_sec2 must be 1–50000",
        ));
    }
    if cfg.max_wait_ms == 0 {
        return Err(ConfigError::ValidationFailed("max_wait_ms must be > 0"));
    }
    if cfg.feeding_duration_ms == 0 {
        return Err(ConfigError::ValidationFailed(
            "feeding_duration_ms must be > 0",
        ));
    }
    if !(1..=24).contains(&cfg.feeding_interval_hours) {
        return Err(ConfigError::ValidationFailed(
            "feeding_interval_hours must be 1–24",
        ));
    }
    if !(1..=10).contains(&cfg.max_feedings_per_day) {
        return Err(ConfigError::ValidationFailed(
            "max_feedings_per_day must be 1–10",
        ));
    }
    if cfg.alert_repetitions == 0 || cfg.alert_tone_ms == 0 {
        return Err(ConfigError::ValidationFailed(
            "alert tone needs at least one non-empty burst",
        ));
    }
    if !(100..=10_000).contains(&cfg.alert_frequency_hz) {
        return Err(ConfigError::ValidationFailed(
            "alert_frequency_hz must be 100–10000",
        ));
    }
    if !(10..=1_000).contains(&cfg.pir_poll_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "pir_poll_interval_ms must be 10–1000",
        ));
    }
    if !(1..=1_000).contains(&cfg.control_loop_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "control_loop_interval_ms must be 1–1000",
        ));
    }
    if !(MIN_ENVIRONMENT_READ_INTERVAL_MS..=3_600_000).contains(&cfg.environment_read_interval_ms)
    {
        return Err(ConfigError::ValidationFailed(
            "environment_read_interval_ms must be 2000–3600000",
        ));
    }
    let sensor_range = -40.0_f32..=80.0;
    if !sensor_range.contains(&cfg.temp_min_alert_c)
        || !sensor_range.contains(&cfg.temp_max_alert_c)
        || cfg.temp_min_alert_c >= cfg.temp_max_alert_c
    {
        return Err(ConfigError::ValidationFailed(
            "temperature alerts must satisfy -40 <= min < max <= 80",
        ));
    }
    if !(0.0..=100.0).contains(&cfg.humidity_max_alert_pct) {
        return Err(ConfigError::ValidationFailed(
            "humidity_max_alert_pct must be 0–100",
        ));
    }
    Ok(())
}
