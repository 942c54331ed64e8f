//! Sticky notices
//!
//! External-service failures stay on screen until the condition clears. A
//! notice is keyed by its text, so repeated failures never pile up, and by
//! its source, so a recovery can drop everything that source raised.

use std::sync::{Mutex, PoisonError};

/// Subsystem that raised a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeSource {
    /// Issue tracker fetches and login
    Tracker,
    /// Status polling of linked pull requests
    PullRequests,
    /// The pending review dashboard
    ReviewDashboard,
    /// Work store persistence
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub source: NoticeSource,
    pub text: String,
}

/// Thread-safe ordered set of sticky notices.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a notice unless one with the same text is already shown.
    /// Returns true when it was added.
    pub fn raise(&self, source: NoticeSource, text: impl Into<String>) -> bool {
        let text = text.into();
        let mut notices = self.notices.lock().unwrap_or_else(PoisonError::into_inner);
        if notices.iter().any(|n| n.text == text) {
            return false;
        }
        tracing::warn!(source = ?source, notice = %text, "Sticky notice raised");
        notices.push(Notice { source, text });
        true
    }

    /// Drop every notice raised by `source`.
    pub fn resolve(&self, source: NoticeSource) {
        let mut notices = self.notices.lock().unwrap_or_else(PoisonError::into_inner);
        let before = notices.len();
        notices.retain(|n| n.source != source);
        if notices.len() != before {
            tracing::info!(source = ?source, "Sticky notices resolved");
        }
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}
