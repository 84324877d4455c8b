//! PetFeeder Firmware: Main Entry Point
//!
//! Hexagonal architecture with a cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsConfigStore  MonotonicClock│
//! │  (Presence+Alert)  (EventSink)    (ConfigPort)    (DaySource)  │
//! │  RampStepper       EventQueue                    Dht22         │
//! │  (MotionPrimitive) (EventSink → API/bot task)    (ClimatePort) │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              FeederService (pure logic)                │    │
//! │  │  Scheduler · FeedingSession · Carousel                 │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pin map (ESP32 DevKit):
//!
//! | Signal       | GPIO |
//! |--------------|------|
//! | Stepper STEP | 2    |
//! | Stepper DIR  | 4    |
//! | Stepper EN   | 15   |
//! | PIR out      | 18   |
//! | Buzzer (PWM) | 19   |
//! | DHT22 data   | 5    |
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use esp_idf_hal::delay::{Ets, FreeRtos};
use esp_idf_hal::gpio::{PinDriver, Pull};
use esp_idf_hal::ledc::{LedcDriver, LedcTimerDriver, config::TimerConfig};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use log::{info, warn};

use petfeeder::adapters::event_queue::{COMMAND_CHANNEL, EVENT_CHANNEL, EventQueue};
use petfeeder::adapters::hardware::HardwareAdapter;
use petfeeder::adapters::log_sink::LogEventSink;
use petfeeder::adapters::nvs::NvsConfigStore;
use petfeeder::adapters::time::MonotonicClock;
use petfeeder::app::events::FeederEvent;
use petfeeder::app::service::FeederService;
use petfeeder::config::FeederConfig;
use petfeeder::drivers::buzzer::{AlertPattern, Buzzer};
use petfeeder::drivers::stepper::{RampStepper, StepperPins};
use petfeeder::sensors::dht22::Dht22;
use petfeeder::sensors::presence::PirSensor;

/// Loop period while the carousel turns.  Must stay well under the cruise
/// step interval.
const MOTION_LOOP_US: u32 = 200;

/// Yield one RTOS tick this often during long moves so the idle task
/// (and its watchdog) gets to run.
const MOTION_YIELD_EVERY_MS: u64 = 500;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PetFeeder v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsConfigStore::new() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let config = nvs
        .as_ref()
        .map_or_else(FeederConfig::default, NvsConfigStore::load_or_default);

    // ── 3. Peripherals ────────────────────────────────────────
    let p = Peripherals::take()?;
    let clock = MonotonicClock::new();

    let stepper = RampStepper::new(
        StepperPins {
            step: PinDriver::output(p.pins.gpio2)?,
            dir: PinDriver::output(p.pins.gpio4)?,
            enable: PinDriver::output(p.pins.gpio15)?,
        },
        Ets,
        clock,
    );

    let pir = PirSensor::new(
        PinDriver::input(p.pins.gpio18)?,
        config.pir_poll_interval_ms,
        config.presence_confirm_ms,
    );

    let buzzer_timer = LedcTimerDriver::new(
        p.ledc.timer0,
        &TimerConfig::new().frequency(Hertz(config.alert_frequency_hz)),
    )?;
    let buzzer_pwm = LedcDriver::new(p.ledc.channel0, &buzzer_timer, p.pins.gpio19)?;
    let buzzer = Buzzer::new(buzzer_pwm, AlertPattern::from(&config));

    let mut hw = HardwareAdapter::new(pir, buzzer);

    let mut dht_pin = PinDriver::input_output_od(p.pins.gpio5)?;
    dht_pin.set_pull(Pull::Up)?;
    let mut climate = Dht22::new(dht_pin, Ets, clock);

    // ── 4. Construct app service ──────────────────────────────
    let mut idle_loop_ms = config.control_loop_interval_ms.max(1);
    let mut svc = FeederService::new(config, stepper);
    let mut sink = (LogEventSink::new(), EventQueue::new(&EVENT_CHANNEL));

    svc.start(clock.now_ms(), &mut sink);
    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    let mut last_yield_ms = clock.now_ms();
    let mut applied_revision = svc.config_revision();

    loop {
        let now = clock.now_ms();

        hw.poll(now, &mut sink);

        while let Ok(cmd) = COMMAND_CHANNEL.try_receive() {
            if let Err(e) = svc.handle_command(cmd, now, &mut hw, &mut sink) {
                warn!("Command rejected: {}", e);
            }
        }

        if svc.config_revision() != applied_revision {
            applied_revision = svc.config_revision();
            hw.apply_config(svc.config());
            idle_loop_ms = svc.config().control_loop_interval_ms.max(1);
        }

        svc.tick(now, &mut hw, &clock, &mut sink);

        // Skipped mid-move: a DHT22 read busy-waits for ~5 ms
        if !svc.is_motion_active() {
            svc.poll_environment(now, &mut climate, &mut sink);
        }

        // No API task is attached yet; drain here so the channel never
        // backs up, and report status after each session.
        while let Some(event) = sink.1.try_next() {
            if let FeederEvent::FeedingCompleted { .. } = event {
                info!("{}", svc.schedule_status(now));
                info!("{}", svc.environment_status());
                match serde_json::to_string(&svc.status(now)) {
                    Ok(json) => info!("STATUS | {}", json),
                    Err(e) => warn!("Status encode failed: {}", e),
                }
            }
        }

        if let Some(store) = nvs.as_ref() {
            svc.auto_save_if_needed(now, store);
        }

        if svc.is_motion_active() {
            if now.saturating_sub(last_yield_ms) >= MOTION_YIELD_EVERY_MS {
                FreeRtos::delay_ms(1);
                last_yield_ms = now;
            } else {
                Ets::delay_us(MOTION_LOOP_US);
            }
        } else {
            FreeRtos::delay_ms(idle_loop_ms);
            last_yield_ms = now;
        }
    }
}
