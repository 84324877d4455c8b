//! Integration tests for the FeederService → session → carousel pipeline.
//!
//! Whole feeding sessions run against the simulated stepper and bowl,
//! checking state order, final carousel position, and emitted events.

use crate::mock_hw::{Rig, SimMotor, quiet_config};

use petfeeder::app::commands::FeederCommand;
use petfeeder::app::events::FeederEvent;
use petfeeder::carousel::MotorState;
use petfeeder::config::FeederConfig;
use petfeeder::error::FeederError;
use petfeeder::session::FeedingState;

fn transitions(rig: &Rig) -> Vec<FeedingState> {
    rig.sink
        .events
        .iter()
        .filter_map(|e| match e {
            FeederEvent::SessionStateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}

// ── Manual feeding ────────────────────────────────────────────

#[test]
fn manual_feeding_runs_full_sequence_and_parks_past_target() {
    let mut rig = Rig::new(quiet_config(), 64);
    assert_eq!(rig.svc.current_compartment(), 0);

    rig.command(FeederCommand::FeedNowManual).unwrap();
    rig.run_session(60_000);
    rig.tick();

    assert_eq!(
        transitions(&rig),
        vec![
            FeedingState::MovingCarousel,
            FeedingState::Dispensing,
            FeedingState::Returning,
            FeedingState::Complete,
            FeedingState::Idle,
        ]
    );
    assert_eq!(rig.svc.current_compartment(), 0, "one past target 4 on a 5-slot carousel");
    assert_eq!(rig.svc.scheduler().feedings_today(), 0, "manual feeding bypasses the quota");
    assert!(rig.sink.contains(&FeederEvent::MotionComplete { compartment: 4 }));
    assert!(rig.sink.contains(&FeederEvent::FeedingCompleted { success: true }));
    assert_eq!(rig.svc.session().last_error(), None);
}

#[test]
fn manual_feeding_skips_presence_and_restores_flag() {
    let config = FeederConfig {
        sound_before_feeding: false,
        require_presence: true,
        ..FeederConfig::default()
    };
    let mut rig = Rig::new(config, 64);

    rig.command(FeederCommand::FeedNowManual).unwrap();
    assert_eq!(rig.svc.session().state(), FeedingState::MovingCarousel);
    assert!(rig.svc.session().config().presence_required);

    rig.run_session(60_000);
    assert!(rig.sink.contains(&FeederEvent::FeedingCompleted { success: true }));
}

#[test]
fn alert_plays_before_the_pet_is_awaited() {
    let config = FeederConfig::default();
    let mut rig = Rig::new(config, 64);

    rig.command(FeederCommand::FeedNow).unwrap();
    rig.tick();
    assert_eq!(rig.svc.session().state(), FeedingState::SoundAlert);
    assert!(rig.bowl.alert_playing());

    while rig.svc.session().state() == FeedingState::SoundAlert {
        rig.tick();
    }
    assert_eq!(rig.svc.session().state(), FeedingState::WaitingPresence);
    assert_eq!(rig.bowl.alerts_played, 1);

    rig.bowl.presence = true;
    rig.run_session(60_000);
    assert!(rig.sink.contains(&FeederEvent::FeedingCompleted { success: true }));
    assert_eq!(rig.svc.current_compartment(), 0);
}

// ── Failures ──────────────────────────────────────────────────

#[test]
fn absent_pet_times_out_without_touching_the_carousel() {
    let config = FeederConfig {
        sound_before_feeding: false,
        max_wait_ms: 10_000,
        ..FeederConfig::default()
    };
    let mut rig = Rig::new(config, 64);

    rig.command(FeederCommand::FeedNow).unwrap();
    while rig.svc.is_feeding_in_progress() {
        assert!(rig.now <= 11_000);
        rig.step(100);
    }

    assert_eq!(rig.svc.session().state(), FeedingState::Error);
    assert_eq!(rig.svc.session().last_error(), Some(FeederError::PresenceTimeout));
    assert!(rig.sink.contains(&FeederEvent::FeedingFailed(FeederError::PresenceTimeout)));
    assert!(rig.sink.contains(&FeederEvent::FeedingCompleted { success: false }));
    assert_eq!(rig.svc.current_compartment(), 0);
    assert_eq!(rig.svc.carousel().state(), MotorState::Idle);

    rig.tick();
    assert_eq!(rig.svc.session().state(), FeedingState::Idle);
}

#[test]
fn stalled_motor_fails_session_with_motion_timeout() {
    let motor = SimMotor {
        stalled: true,
        ..SimMotor::new(64)
    };
    let mut rig = Rig::with_motor(quiet_config(), motor);

    rig.command(FeederCommand::FeedNow).unwrap();
    while rig.svc.is_feeding_in_progress() {
        assert!(rig.now < 40_000, "timeout never fired");
        rig.step(100);
    }

    assert_eq!(rig.svc.session().last_error(), Some(FeederError::MotionTimeout));
    assert!(rig.sink.contains(&FeederEvent::MotionFault(FeederError::MotionTimeout)));
    assert!(!rig.svc.carousel().is_driver_enabled());
}

#[test]
fn cancel_mid_move_stops_motor_and_reports_user_cancel() {
    let mut rig = Rig::new(quiet_config(), 64);
    rig.command(FeederCommand::FeedNow).unwrap();
    for _ in 0..5 {
        rig.tick();
    }
    assert!(rig.svc.is_motion_active());

    rig.command(FeederCommand::CancelFeeding).unwrap();

    assert!(!rig.svc.is_feeding_in_progress());
    assert!(!rig.svc.is_motion_active());
    assert_eq!(rig.svc.session().last_error(), Some(FeederError::UserCancelled));
    assert_eq!(
        rig.sink.count(|e| matches!(e, FeederEvent::FeedingCompleted { success: false })),
        1
    );
    assert_eq!(rig.svc.carousel().steps_to_target(), 0);
}

// ── Rejections ────────────────────────────────────────────────

#[test]
fn second_start_is_rejected_while_in_progress() {
    let mut rig = Rig::new(quiet_config(), 64);
    rig.command(FeederCommand::FeedNow).unwrap();
    assert_eq!(
        rig.command(FeederCommand::FeedNowManual),
        Err(FeederError::AlreadyInProgress)
    );
}

#[test]
fn jog_commands_are_refused_during_a_session() {
    let mut rig = Rig::new(quiet_config(), 64);
    rig.command(FeederCommand::FeedNow).unwrap();
    assert_eq!(
        rig.command(FeederCommand::MoveToCompartment(2)),
        Err(FeederError::AlreadyInProgress)
    );
    assert_eq!(
        rig.command(FeederCommand::Calibrate),
        Err(FeederError::AlreadyInProgress)
    );
}

#[test]
fn move_while_moving_is_rejected_and_reported() {
    let mut rig = Rig::new(quiet_config(), 64);
    rig.command(FeederCommand::MoveToCompartment(3)).unwrap();
    rig.tick();

    assert_eq!(
        rig.command(FeederCommand::NextCompartment),
        Err(FeederError::MotorAlreadyMoving)
    );
    assert!(rig.sink.contains(&FeederEvent::MotionFault(FeederError::MotorAlreadyMoving)));

    while rig.svc.is_motion_active() {
        rig.tick();
    }
    assert_eq!(rig.svc.current_compartment(), 3);
}

#[test]
fn out_of_range_compartment_is_rejected() {
    let mut rig = Rig::new(quiet_config(), 64);
    assert_eq!(
        rig.command(FeederCommand::MoveToCompartment(5)),
        Err(FeederError::InvalidCompartmentIndex(5))
    );
    assert_eq!(rig.svc.carousel().state(), MotorState::Idle);
}

#[test]
fn previous_compartment_wraps_from_home() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    rig.command(FeederCommand::PreviousCompartment).unwrap();
    while rig.svc.is_motion_active() {
        rig.tick();
    }
    assert_eq!(rig.svc.current_compartment(), 4);
}

// ── Status ────────────────────────────────────────────────────

#[test]
fn status_reflects_session_progress() {
    let mut rig = Rig::new(quiet_config(), 64);
    let idle = rig.svc.status(rig.now);
    assert!(!idle.feeding_in_progress);
    assert_eq!(idle.progress_percent, 0.0);

    rig.command(FeederCommand::FeedNow).unwrap();
    while rig.svc.session().state() != FeedingState::Dispensing {
        rig.tick();
    }
    let mid = rig.svc.status(rig.now);
    assert!(mid.feeding_in_progress);
    assert!((70.0..=90.0).contains(&mid.progress_percent));
    assert_eq!(mid.current_compartment, 4);
    assert_eq!(rig.svc.state_str(), "Dispensing food");
}

#[test]
fn status_snapshot_serializes_for_the_api() {
    let mut rig = Rig::new(quiet_config(), 64);
    rig.command(FeederCommand::FeedNow).unwrap();
    rig.command(FeederCommand::CancelFeeding).unwrap();

    let json = serde_json::to_value(rig.svc.status(rig.now)).unwrap();
    assert_eq!(json["feeding_in_progress"], false);
    assert_eq!(json["feeding_state"], "Error");
    assert_eq!(json["last_error"], "UserCancelled");
    assert_eq!(json["motor_state"], "Idle");
    assert_eq!(json["max_feedings_per_day"], 4);
}
