//! Alerting System
//!
//! Fire-and-forget collision alerts. A sink receives one signal per at-risk
//! vehicle and must never block or fail back into the frame loop.

mod beep;
mod sink;

pub use beep::{tone_samples, AlertConfig, BeepSink};
pub use sink::{AlertSignal, AlertSink, RecordingSink};

use thiserror::Error;

/// Errors inside an alert backend. They never leave the sink.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Audio player failed: {0}")]
    Player(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
