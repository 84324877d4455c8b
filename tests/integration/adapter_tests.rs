//! Integration tests for the adapter ring: NVS persistence, the event
//! channel, and the PIR/buzzer hardware adapter driving a real session.

use core::cell::Cell;
use core::convert::Infallible;
use std::rc::Rc;

use embassy_sync::channel::Channel;
use embedded_hal::digital::InputPin;
use embedded_hal::pwm::SetDutyCycle;

use crate::mock_hw::{LogSink, Rig, SimMotor, TestDay, quiet_config};

use petfeeder::adapters::event_queue::{EventChannel, EventQueue};
use petfeeder::adapters::hardware::HardwareAdapter;
use petfeeder::adapters::nvs::NvsConfigStore;
use petfeeder::app::commands::FeederCommand;
use petfeeder::app::events::FeederEvent;
use petfeeder::app::ports::ConfigPort;
use petfeeder::app::service::{AUTO_SAVE_DELAY_MS, FeederService};
use petfeeder::config::FeederConfig;
use petfeeder::drivers::buzzer::{AlertPattern, Buzzer};
use petfeeder::error::FeederError;
use petfeeder::sensors::presence::PirSensor;
use petfeeder::session::FeedingState;

// ── Fake pins ─────────────────────────────────────────────────

#[derive(Clone, Default)]
struct PirLine(Rc<Cell<bool>>);

impl embedded_hal::digital::ErrorType for PirLine {
    type Error = Infallible;
}

impl InputPin for PirLine {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
}

#[derive(Clone, Default)]
struct PwmMeter {
    duty: Rc<Cell<u16>>,
    bursts: Rc<Cell<u32>>,
}

impl embedded_hal::pwm::ErrorType for PwmMeter {
    type Error = Infallible;
}

impl SetDutyCycle for PwmMeter {
    fn max_duty_cycle(&self) -> u16 {
        255
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        if duty > 0 && self.duty.get() == 0 {
            self.bursts.set(self.bursts.get() + 1);
        }
        self.duty.set(duty);
        Ok(())
    }
}

// ── NVS ───────────────────────────────────────────────────────

#[test]
fn runtime_change_is_auto_saved_after_delay() {
    let store = NvsConfigStore::new().unwrap();
    let mut rig = Rig::new(FeederConfig::default(), 64);
    rig.now = 1_000;

    rig.command(FeederCommand::SetFeedingInterval(6)).unwrap();
    rig.command(FeederCommand::SetSoundEnabled(false)).unwrap();
    assert!(rig.svc.is_config_dirty());

    assert!(!rig.svc.auto_save_if_needed(1_000 + AUTO_SAVE_DELAY_MS - 1, &store));
    assert!(rig.svc.auto_save_if_needed(1_000 + AUTO_SAVE_DELAY_MS, &store));
    assert!(!rig.svc.is_config_dirty());

    let saved = store.load().unwrap();
    assert_eq!(saved.feeding_interval_hours, 6);
    assert!(!saved.sound_before_feeding);
}

#[test]
fn restored_config_shapes_the_service() {
    let store = NvsConfigStore::new().unwrap();
    let cfg = FeederConfig {
        total_compartments: 8,
        feeding_compartment: 2,
        ..quiet_config()
    };
    store.save(&cfg).unwrap();

    let mut rig = Rig::new(store.load_or_default(), 1_000);
    rig.command(FeederCommand::FeedNowManual).unwrap();
    rig.run_session(60_000);

    assert!(rig.sink.contains(&FeederEvent::MotionComplete { compartment: 2 }));
    assert_eq!(rig.svc.current_compartment(), 3);
}

#[test]
fn config_update_is_refused_mid_session() {
    let mut rig = Rig::new(quiet_config(), 64);
    rig.command(FeederCommand::FeedNow).unwrap();

    let result = rig.command(FeederCommand::UpdateConfig(FeederConfig {
        total_compartments: 6,
        ..quiet_config()
    }));
    assert!(result.is_err());
    assert_eq!(rig.svc.carousel().total_compartments(), 5);
}

// ── Event channel ─────────────────────────────────────────────

#[test]
fn queue_mirrors_the_log_sink() {
    let channel: EventChannel<32> = Channel::new();
    let mut svc = FeederService::new(quiet_config(), SimMotor::new(1_000));
    let mut bowl = crate::mock_hw::MockBowl::new();
    let day = TestDay::default();
    let mut sink = (LogSink::new(), EventQueue::new(&channel));

    svc.start(0, &mut sink);
    svc.handle_command(FeederCommand::FeedNowManual, 0, &mut bowl, &mut sink)
        .unwrap();
    let mut now = 0;
    while svc.session().state() != FeedingState::Idle {
        now += 10;
        svc.tick(now, &mut bowl, &day, &mut sink);
    }

    let mut drained = Vec::new();
    while let Some(e) = sink.1.try_next() {
        drained.push(e);
    }
    assert_eq!(drained, sink.0.events);
    assert_eq!(sink.1.dropped(), 0);
}

// ── Hardware adapter ──────────────────────────────────────────

/// Service plus the real PIR/buzzer adapter on fake lines, stepped the
/// way the firmware loop steps them.
struct Bench {
    svc: FeederService<SimMotor>,
    hw: HardwareAdapter<PirLine, PwmMeter>,
    pir_line: PirLine,
    pwm: PwmMeter,
    day: TestDay,
    sink: LogSink,
    now: u64,
    applied_revision: u32,
}

impl Bench {
    fn new(config: FeederConfig) -> Self {
        let pir_line = PirLine::default();
        let pwm = PwmMeter::default();
        let pir = PirSensor::new(
            pir_line.clone(),
            config.pir_poll_interval_ms,
            config.presence_confirm_ms,
        );
        let buzzer = Buzzer::new(pwm.clone(), AlertPattern::from(&config));
        let mut svc = FeederService::new(config, SimMotor::new(64));
        let mut sink = LogSink::new();
        svc.start(0, &mut sink);
        Self {
            applied_revision: svc.config_revision(),
            svc,
            hw: HardwareAdapter::new(pir, buzzer),
            pir_line,
            pwm,
            day: TestDay::default(),
            sink,
            now: 0,
        }
    }

    /// One loop pass: sample sensors, reapply changed config, tick.
    fn tick(&mut self) -> FeedingState {
        self.hw.poll(self.now, &mut self.sink);
        if self.svc.config_revision() != self.applied_revision {
            self.applied_revision = self.svc.config_revision();
            self.hw.apply_config(self.svc.config());
        }
        self.svc
            .tick(self.now, &mut self.hw, &self.day, &mut self.sink);
        self.svc.session().state()
    }

    fn command(&mut self, cmd: FeederCommand) -> petfeeder::error::Result<()> {
        self.svc
            .handle_command(cmd, self.now, &mut self.hw, &mut self.sink)
    }

    fn advance_to(&mut self, t: u64) {
        while self.now < t {
            self.now += 10;
            self.tick();
        }
    }

    fn run_until(&mut self, done: impl Fn(FeedingState) -> bool, limit_ms: u64) {
        let deadline = self.now + limit_ms;
        while !done(self.tick()) {
            self.now += 10;
            assert!(self.now < deadline, "stuck in {:?}", self.svc.session().state());
        }
    }

    fn left_waiting(&self) -> bool {
        self.sink.contains(&FeederEvent::SessionStateChanged {
            from: FeedingState::WaitingPresence,
            to: FeedingState::MovingCarousel,
        })
    }
}

fn short_wait_config() -> FeederConfig {
    FeederConfig {
        sound_before_feeding: false,
        max_wait_ms: 10_000,
        ..FeederConfig::default()
    }
}

#[test]
fn pir_and_buzzer_drive_a_presence_gated_session() {
    let mut b = Bench::new(FeederConfig::default());
    b.command(FeederCommand::FeedNow).unwrap();

    // Alert plays out, then the session waits with nobody at the bowl
    b.run_until(|s| s == FeedingState::WaitingPresence, 5_000);
    assert_eq!(b.pwm.bursts.get(), 3);
    assert_eq!(b.pwm.duty.get(), 0);

    // Pet arrives; the next PIR sample moves the session on
    b.pir_line.0.set(true);
    let arrived = b.now;
    b.run_until(|s| s != FeedingState::WaitingPresence, 1_000);
    assert_eq!(b.svc.session().state(), FeedingState::MovingCarousel);
    assert!(b.now - arrived <= 110);
    assert_eq!(b.sink.count(|e| *e == FeederEvent::PresenceDetected), 1);

    b.run_until(|s| s == FeedingState::Idle, 60_000);
    assert!(b.sink.contains(&FeederEvent::FeedingCompleted { success: true }));
}

#[test]
fn short_visit_starts_the_feeding() {
    let mut b = Bench::new(short_wait_config());
    b.command(FeederCommand::FeedNow).unwrap();
    b.advance_to(1_000);
    assert_eq!(b.svc.session().state(), FeedingState::WaitingPresence);

    b.pir_line.0.set(true);
    b.advance_to(2_500);
    b.pir_line.0.set(false);
    assert!(b.left_waiting());

    b.run_until(|s| s == FeedingState::Idle, 60_000);
    assert!(b.sink.contains(&FeederEvent::FeedingCompleted { success: true }));
}

#[test]
fn arrival_just_before_wait_expires_is_accepted() {
    let mut b = Bench::new(short_wait_config());
    b.command(FeederCommand::FeedNow).unwrap();
    b.advance_to(9_000);
    assert_eq!(b.svc.session().state(), FeedingState::WaitingPresence);

    b.pir_line.0.set(true);
    b.run_until(|s| s == FeedingState::Idle, 60_000);
    assert!(b.left_waiting());
    assert!(!b.sink.contains(&FeederEvent::FeedingFailed(FeederError::PresenceTimeout)));
    assert!(b.sink.contains(&FeederEvent::FeedingCompleted { success: true }));
}

#[test]
fn runtime_alert_change_reaches_the_buzzer() {
    let mut b = Bench::new(FeederConfig {
        require_presence: false,
        ..FeederConfig::default()
    });
    let update = FeederConfig {
        alert_repetitions: 1,
        alert_tone_ms: 200,
        ..b.svc.current_config()
    };
    b.command(FeederCommand::UpdateConfig(update)).unwrap();
    b.tick();
    assert_eq!(b.hw.alert_pattern().repetitions, 1);

    b.command(FeederCommand::FeedNow).unwrap();
    let started = b.now;
    b.run_until(|s| s != FeedingState::SoundAlert, 5_000);
    assert_eq!(b.pwm.bursts.get(), 1);
    assert!(b.now - started < 300, "single short burst");

    b.run_until(|s| s == FeedingState::Idle, 60_000);
    assert_eq!(b.pwm.bursts.get(), 1);
}

#[test]
fn runtime_frequency_change_is_refused() {
    let mut b = Bench::new(FeederConfig::default());
    let update = FeederConfig {
        alert_frequency_hz: 4_000,
        ..b.svc.current_config()
    };
    assert!(matches!(
        b.command(FeederCommand::UpdateConfig(update)),
        Err(FeederError::InvalidConfig(_))
    ));
    assert_eq!(b.svc.config().alert_frequency_hz, 2_000);
}
