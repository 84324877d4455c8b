//! Integration tests for automatic feeding: interval, daily quota, and
//! calendar-day rollover, driven through the full service.

use crate::mock_hw::{Rig, quiet_config};

use petfeeder::app::commands::FeederCommand;
use petfeeder::app::events::FeederEvent;
use petfeeder::config::FeederConfig;
use petfeeder::error::FeederError;
use petfeeder::scheduler::MS_PER_HOUR;

/// Motor fast enough that every move lands within one tick.
const FAST: i64 = 100_000;

fn hourly(max_per_day: u8) -> FeederConfig {
    FeederConfig {
        feeding_interval_hours: 1,
        max_feedings_per_day: max_per_day,
        ..quiet_config()
    }
}

fn scheduled_count(rig: &Rig) -> usize {
    rig.sink
        .count(|e| matches!(e, FeederEvent::ScheduledFeedingExecuted { .. }))
}

#[test]
fn scheduled_feeding_runs_a_whole_session() {
    let mut rig = Rig::new(hourly(4), FAST);

    rig.advance_to(MS_PER_HOUR - 1_000);
    assert_eq!(scheduled_count(&rig), 0);

    rig.advance_to(MS_PER_HOUR);
    assert!(rig.sink.contains(&FeederEvent::ScheduledFeedingExecuted { feedings_today: 1 }));
    assert!(rig.svc.is_feeding_in_progress());

    rig.run_session(60_000);
    assert!(rig.sink.contains(&FeederEvent::FeedingCompleted { success: true }));
    assert_eq!(rig.svc.scheduler().feedings_today(), 1);
    assert_eq!(rig.svc.scheduler().next_feeding_ms(), Some(2 * MS_PER_HOUR));
}

#[test]
fn daily_quota_caps_scheduled_feedings() {
    let mut rig = Rig::new(hourly(2), FAST);

    rig.advance_to(5 * MS_PER_HOUR);

    assert_eq!(scheduled_count(&rig), 2);
    assert_eq!(rig.svc.scheduler().feedings_today(), 2);
    assert_eq!(
        rig.sink.count(|e| matches!(e, FeederEvent::FeedingCompleted { success: true })),
        2
    );
}

#[test]
fn manual_feeding_ignores_exhausted_quota() {
    let mut rig = Rig::new(hourly(1), FAST);
    rig.advance_to(2 * MS_PER_HOUR);
    assert_eq!(rig.svc.scheduler().feedings_today(), 1);

    rig.command(FeederCommand::FeedNowManual).unwrap();
    rig.run_session(60_000);

    assert_eq!(rig.svc.scheduler().feedings_today(), 1);
    assert_eq!(
        rig.sink.count(|e| matches!(e, FeederEvent::FeedingCompleted { success: true })),
        2
    );
}

#[test]
fn day_rollover_resets_count_once() {
    let mut rig = Rig::new(hourly(1), FAST);
    rig.day.set(14);
    rig.advance_to(2 * MS_PER_HOUR);
    assert_eq!(rig.svc.scheduler().feedings_today(), 1);
    assert_eq!(rig.sink.count(|e| matches!(e, FeederEvent::DailyCountReset { .. })), 0);

    rig.day.set(15);
    rig.step(1_000);
    rig.step(1_000);

    assert_eq!(rig.sink.count(|e| matches!(e, FeederEvent::DailyCountReset { .. })), 1);
    assert!(rig.sink.contains(&FeederEvent::DailyCountReset { day: 15 }));

    // The overdue slot fires as soon as the count frees up
    assert_eq!(rig.svc.scheduler().feedings_today(), 1);
    assert_eq!(scheduled_count(&rig), 2);
}

#[test]
fn day_rollover_resets_even_when_disabled() {
    let mut rig = Rig::new(hourly(1), FAST);
    rig.day.set(3);
    rig.advance_to(MS_PER_HOUR + 10_000);
    assert_eq!(rig.svc.scheduler().feedings_today(), 1);

    rig.command(FeederCommand::SetScheduleEnabled(false)).unwrap();
    rig.day.set(4);
    rig.step(1_000);

    assert_eq!(rig.svc.scheduler().feedings_today(), 0);
    assert!(rig.sink.contains(&FeederEvent::DailyCountReset { day: 4 }));
}

#[test]
fn disabled_schedule_never_fires() {
    let config = FeederConfig {
        auto_feeding_enabled: false,
        ..hourly(4)
    };
    let mut rig = Rig::new(config, FAST);
    rig.advance_to(3 * MS_PER_HOUR);

    assert_eq!(scheduled_count(&rig), 0);
    assert_eq!(rig.svc.schedule_status(rig.now).as_str(), "Schedule: disabled");
    assert_eq!(rig.svc.status(rig.now).ms_until_next_feeding, 0);
}

#[test]
fn status_line_counts_down() {
    let rig = Rig::new(FeederConfig::default(), FAST);
    assert_eq!(
        rig.svc.schedule_status(0).as_str(),
        "Next feeding in: 4h | Today: 0/4"
    );
    assert_eq!(
        rig.svc.schedule_status(4 * MS_PER_HOUR - 95_000).as_str(),
        "Next feeding in: 1m 35s | Today: 0/4"
    );
}

#[test]
fn out_of_range_schedule_settings_are_rejected() {
    let mut rig = Rig::new(FeederConfig::default(), FAST);

    assert!(matches!(
        rig.command(FeederCommand::SetFeedingInterval(25)),
        Err(FeederError::InvalidConfig(_))
    ));
    assert!(matches!(
        rig.command(FeederCommand::SetMaxFeedingsPerDay(0)),
        Err(FeederError::InvalidConfig(_))
    ));
    assert_eq!(rig.svc.scheduler().feeding_interval_hours(), 4);
    assert_eq!(rig.svc.scheduler().max_feedings_per_day(), 4);
    assert!(!rig.svc.is_config_dirty());
}

#[test]
fn interval_change_reschedules_from_last_feeding() {
    let mut rig = Rig::new(hourly(4), FAST);
    rig.advance_to(MS_PER_HOUR + 30_000);

    rig.command(FeederCommand::SetFeedingInterval(3)).unwrap();
    assert_eq!(rig.svc.scheduler().next_feeding_ms(), Some(4 * MS_PER_HOUR));
    assert_eq!(rig.svc.current_config().feeding_interval_hours, 3);
}
