//! Alert sink contract

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// One collision-risk notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSignal {
    /// Vehicle class that triggered the alert
    pub label: String,
    /// Estimated distance (meters)
    pub distance_m: f32,
}

/// Receiver of collision alerts.
///
/// `signal` is a message send with no return channel and no backpressure:
/// it must return promptly and must not panic into the caller. Several
/// signals may be in flight at once, with no ordering guarantee.
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;

    fn signal(&self, signal: AlertSignal);
}

/// Keeps every signal in memory; used for dry runs and tests
#[derive(Debug, Default)]
pub struct RecordingSink {
    signals: Mutex<Vec<AlertSignal>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<AlertSignal> {
        match self.signals.lock() {
            Ok(signals) => signals.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.signals().len()
    }
}

impl AlertSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn signal(&self, signal: AlertSignal) {
        match self.signals.lock() {
            Ok(mut signals) => signals.push(signal),
            Err(poisoned) => poisoned.into_inner().push(signal),
        }
    }
}
