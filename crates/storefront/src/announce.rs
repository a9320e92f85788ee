//! Spoken feedback.
//!
//! Announcements are fire-and-forget: an announcer must never block the
//! controller or report failure back to it.

use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;

pub trait Announcer: Send + Sync {
    fn announce(&self, text: &str);
}

/// Emits announcements as tracing events under `smartshop::speech`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn announce(&self, text: &str) {
        tracing::info!(target: "smartshop::speech", text, "announce");
    }
}

/// Keeps every announcement, for tests and transcripts.
#[derive(Debug, Clone, Default)]
pub struct RecordingAnnouncer {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl RecordingAnnouncer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.spoken().pop()
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce(&self, text: &str) {
        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
    }
}

/// Whole-đồng amount as spoken (no grouping, no symbol).
pub(crate) fn spoken_amount(amount: Decimal) -> String {
    amount.round().normalize().to_string()
}
