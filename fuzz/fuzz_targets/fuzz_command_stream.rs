//! Fuzz target: `FeederService` command and tick stream
//!
//! Each input byte pair is decoded into either a command or a clock
//! advance and applied to a service running on a simulated stepper.
//!
//! Invariants checked:
//! - No panics under any sequence
//! - The carousel never reports a compartment outside the carousel
//! - Progress stays within 0–100
//! - A feeding start is refused exactly when one is already running
//!
//! cargo fuzz run fuzz_command_stream

#![no_main]

use libfuzzer_sys::fuzz_target;
use petfeeder::app::commands::FeederCommand;
use petfeeder::app::events::FeederEvent;
use petfeeder::app::ports::{AlertPort, DaySource, EventSink, MotionPrimitive, PresencePort};
use petfeeder::app::service::FeederService;
use petfeeder::config::FeederConfig;
use petfeeder::error::FeederError;

struct Motor {
    position: i64,
    target: i64,
}

impl MotionPrimitive for Motor {
    fn move_to(&mut self, absolute: i64) {
        self.target = absolute;
    }
    fn run(&mut self) -> bool {
        let d = self.target - self.position;
        self.position += d.signum() * d.abs().min(128);
        self.position != self.target
    }
    fn distance_to_go(&self) -> i64 {
        self.target - self.position
    }
    fn current_position(&self) -> i64 {
        self.position
    }
    fn set_current_position(&mut self, position: i64) {
        self.position = position;
        self.target = position;
    }
    fn stop(&mut self) {
        self.target = self.position;
    }
    fn enable_outputs(&mut self) {}
    fn disable_outputs(&mut self) {}
    fn set_max_speed(&mut self, _: f32) {}
    fn set_acceleration(&mut self, _: f32) {}
}

struct Bowl {
    presence: bool,
    alert_until: u64,
}

impl PresencePort for Bowl {
    fn is_presence_detected(&mut self) -> bool {
        self.presence
    }
}

impl AlertPort for Bowl {
    fn start_alert(&mut self, now_ms: u64) {
        self.alert_until = now_ms + 2_100;
    }
    fn poll_alert(&mut self, now_ms: u64) -> bool {
        now_ms < self.alert_until
    }
    fn stop_alert(&mut self) {
        self.alert_until = 0;
    }
}

struct Day(Option<u8>);

impl DaySource for Day {
    fn current_day(&self) -> Option<u8> {
        self.0
    }
}

struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _: &FeederEvent) {}
}

fn command(op: u8, arg: u8) -> Option<FeederCommand> {
    Some(match op % 12 {
        0 => FeederCommand::FeedNow,
        1 => FeederCommand::FeedNowManual,
        2 => FeederCommand::CancelFeeding,
        3 => FeederCommand::SetScheduleEnabled(arg & 1 == 1),
        4 => FeederCommand::SetFeedingInterval(arg),
        5 => FeederCommand::SetMaxFeedingsPerDay(arg),
        6 => FeederCommand::ResetDailyCount,
        7 => FeederCommand::SetSoundEnabled(arg & 1 == 1),
        8 => FeederCommand::SetPresenceRequired(arg & 1 == 1),
        9 => FeederCommand::MoveToCompartment(arg % 8),
        10 => FeederCommand::NextCompartment,
        _ => return None,
    })
}

fuzz_target!(|data: &[u8]| {
    let cfg = FeederConfig {
        feeding_interval_hours: 1,
        max_wait_ms: 20_000,
        ..FeederConfig::default()
    };
    let n = cfg.total_compartments;
    let mut svc = FeederService::new(cfg, Motor { position: 0, target: 0 });
    let mut bowl = Bowl {
        presence: false,
        alert_until: 0,
    };
    let mut day = Day(None);
    let mut now = 0u64;
    svc.start(now, &mut Discard);

    for pair in data.chunks_exact(2) {
        let (op, arg) = (pair[0], pair[1]);
        match command(op, arg) {
            Some(cmd) => {
                let feed = matches!(cmd, FeederCommand::FeedNow | FeederCommand::FeedNowManual);
                let busy = svc.is_feeding_in_progress();
                let result = svc.handle_command(cmd, now, &mut bowl, &mut Discard);
                if feed {
                    assert_eq!(result.is_err(), busy);
                    if busy {
                        assert_eq!(result, Err(FeederError::AlreadyInProgress));
                    }
                }
            }
            None => {
                // Clock advance, presence toggle, or day change
                match arg % 4 {
                    0 => bowl.presence = !bowl.presence,
                    1 => day.0 = Some(1 + arg % 31),
                    _ => {}
                }
                now += u64::from(arg) * 100;
                svc.tick(now, &mut bowl, &day, &mut Discard);
            }
        }

        assert!(svc.current_compartment() < n);
        let p = svc.feeding_progress(now);
        assert!((0.0..=100.0).contains(&p));
    }
});
