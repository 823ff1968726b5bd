//! Search and booking outcomes.

use std::path::PathBuf;

use chrono::{DateTime, Local};

/// What one search attempt produced. Exactly one is decided per attempt
/// and never retained beyond it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The page explicitly said no appointment matches the criteria.
    NoSlotsAvailable,
    /// A slot is on offer, or already held for the user.
    SlotFound,
    /// The site showed its generic error banner.
    TransientPageError,
    /// None of the known indicators matched.
    Unparseable,
}

impl SearchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchOutcome::NoSlotsAvailable => "no-slots",
            SearchOutcome::SlotFound => "slot-found",
            SearchOutcome::TransientPageError => "transient-page-error",
            SearchOutcome::Unparseable => "unparseable",
        }
    }
}

impl std::fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A booking the auto-booking sub-flow completed. The confirmation
/// screenshot is captured by the automaton after the flow returns.
#[derive(Debug, Clone)]
pub struct BookingOutcome {
    pub confirmed_at: DateTime<Local>,
    pub screenshot: Option<PathBuf>,
}

impl BookingOutcome {
    pub fn confirmed_now() -> Self {
        Self {
            confirmed_at: Local::now(),
            screenshot: None,
        }
    }
}
