//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured feeder events to the
//! ESP-IDF logger (which goes to UART / USB-CDC in production).  The bot
//! and web layers consume the same events through the
//! [`EventQueue`](super::event_queue::EventQueue).

use log::{info, warn};

use crate::app::events::FeederEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`FeederEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &FeederEvent) {
        match event {
            FeederEvent::Started { compartment } => {
                info!("START | compartment={}", compartment);
            }
            FeederEvent::SessionStateChanged { from, to } => {
                info!("STATE | {} -> {}", from.as_str(), to.as_str());
            }
            FeederEvent::FeedingCompleted { success } => {
                info!("FEED  | completed, success={}", success);
            }
            FeederEvent::FeedingFailed(err) => {
                warn!("FEED  | failed: {}", err);
            }
            FeederEvent::MotionComplete { compartment } => {
                info!("MOTOR | at compartment {}", compartment);
            }
            FeederEvent::MotionFault(err) => {
                warn!("MOTOR | fault: {}", err);
            }
            FeederEvent::ScheduledFeedingExecuted { feedings_today } => {
                info!("SCHED | scheduled feeding #{} today", feedings_today);
            }
            FeederEvent::DailyCountReset { day } => {
                info!("SCHED | new day {}, count reset", day);
            }
            FeederEvent::PresenceDetected => {
                info!("PIR   | presence detected");
            }
            FeederEvent::EnvironmentAlert {
                alert,
                temperature_c,
                humidity_pct,
            } => {
                warn!(
                    "ENV   | {} ({:.1} C, {:.1} %)",
                    alert, temperature_c, humidity_pct
                );
            }
        }
    }
}
