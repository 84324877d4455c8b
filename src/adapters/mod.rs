//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements              | Connects to               |
//! |---------------|-------------------------|---------------------------|
//! | `event_queue` | EventSink               | embassy-sync channel      |
//! | `hardware`    | PresencePort, AlertPort | PIR GPIO, buzzer LEDC PWM |
//! | `log_sink`    | EventSink               | Serial log output         |
//! | `nvs`         | ConfigPort              | NVS / in-memory store     |
//! | `time`        | DaySource, MicrosClock  | ESP32 system timer / RTC  |

pub mod event_queue;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
