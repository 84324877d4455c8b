//! Event and command channels between the control loop and API/bot tasks.
//!
//! Uses `embassy-sync` bounded MPMC channels so the synchronous control
//! loop never blocks on a slow consumer.  Both sides share static channels
//! without heap allocation.
//!
//! ```text
//! ┌──────────────┐  FeederCommand  ┌──────────────┐
//! │ Bot / Web    │───────────────▶│ Control Loop │
//! │ task         │◀───────────────│ (sync)       │
//! └──────────────┘   FeederEvent   └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::commands::FeederCommand;
use crate::app::events::FeederEvent;
use crate::app::ports::EventSink;

/// Outbound event depth.  Covers one full feeding session between drains.
pub const EVENT_DEPTH: usize = 16;

/// Inbound command depth.
pub const COMMAND_DEPTH: usize = 8;

pub type EventChannel<const N: usize> = Channel<CriticalSectionRawMutex, FeederEvent, N>;

/// Outbound event channel: control loop → API/bot task.
pub static EVENT_CHANNEL: EventChannel<EVENT_DEPTH> = Channel::new();

/// Inbound command channel: API/bot task → control loop.
pub static COMMAND_CHANNEL: Channel<CriticalSectionRawMutex, FeederCommand, COMMAND_DEPTH> =
    Channel::new();

/// [`EventSink`] that pushes into a bounded channel.
///
/// When the consumer falls behind, the newest event is dropped and counted;
/// the control loop is never stalled.
pub struct EventQueue<'a, const N: usize> {
    channel: &'a EventChannel<N>,
    dropped: u32,
}

impl<'a, const N: usize> EventQueue<'a, N> {
    pub fn new(channel: &'a EventChannel<N>) -> Self {
        Self {
            channel,
            dropped: 0,
        }
    }

    /// Consumer side: next pending event, if any.
    pub fn try_next(&self) -> Option<FeederEvent> {
        self.channel.try_receive().ok()
    }

    /// Events discarded because the channel was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl<const N: usize> EventSink for EventQueue<'_, N> {
    fn emit(&mut self, event: &FeederEvent) {
        if self.channel.try_send(*event).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            warn!("EventQueue: full, dropped {:?} ({} total)", event, self.dropped);
        }
    }
}
