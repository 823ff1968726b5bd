//! Post-search outcome classification.
//!
//! Each site contributes a static [`OutcomeIndicators`] table; [`classify`]
//! probes the groups in one fixed precedence order so that co-occurring
//! indicators can never produce an ambiguous answer:
//!
//! 1. held-slot indicator, a slot reserved for the user wins over
//!    everything else
//! 2. explicit no-results text
//! 3. result list of candidate clinics
//! 4. generic error banner
//! 5. nothing recognized, [`SearchOutcome::Unparseable`]
//!
//! The classifier is a pure function of observable page state; it takes no
//! actions and owns no timing beyond the optional readiness wait.

use std::time::Duration;

use rdv_driver::{PageDriver, WaitState};

use crate::error::Result;
use crate::outcome::SearchOutcome;

/// One observable condition on the result area.
#[derive(Debug, Clone, Copy)]
pub enum Probe {
    /// The first match for the selector is visible.
    Visible(&'static str),
    /// At least one element matches the selector.
    Present(&'static str),
    /// The first match's rendered text contains the needle. Absence of the
    /// element is a miss, not an error.
    TextContains {
        selector: &'static str,
        needle: &'static str,
    },
    /// The serialized page (or frame) content contains the needle.
    ContentContains(&'static str),
}

/// A site's outcome probes. Groups are probed in precedence order; empty
/// groups are skipped. When `frame` is set every probe and the readiness
/// wait run inside that frame.
#[derive(Debug, Clone, Copy)]
pub struct OutcomeIndicators {
    pub frame: Option<&'static str>,
    /// Selector that must become visible before the result area is worth
    /// probing. `None` means the page is probed as-is.
    pub readiness: Option<&'static str>,
    pub held_slot: &'static [Probe],
    pub no_slots: &'static [Probe],
    pub result_list: &'static [Probe],
    pub error_banner: &'static [Probe],
}

/// Classifies the current page into exactly one [`SearchOutcome`].
///
/// A readiness wait that never resolves surfaces as a driver error, which
/// the automaton treats like any other transient step failure.
pub async fn classify(
    page: &dyn PageDriver,
    indicators: &OutcomeIndicators,
    wait_timeout: Duration,
) -> Result<SearchOutcome> {
    if let Some(selector) = indicators.readiness {
        match indicators.frame {
            Some(frame) => {
                page.frame_wait_for(frame, selector, WaitState::Visible, wait_timeout)
                    .await?
            }
            None => page.wait_for(selector, WaitState::Visible, wait_timeout).await?,
        }
    }

    let groups = [
        (indicators.held_slot, SearchOutcome::SlotFound),
        (indicators.no_slots, SearchOutcome::NoSlotsAvailable),
        (indicators.result_list, SearchOutcome::SlotFound),
        (indicators.error_banner, SearchOutcome::TransientPageError),
    ];
    for (probes, outcome) in groups {
        for probe in probes {
            if probe_hits(page, indicators.frame, probe).await? {
                return Ok(outcome);
            }
        }
    }
    Ok(SearchOutcome::Unparseable)
}

async fn probe_hits(
    page: &dyn PageDriver,
    frame: Option<&'static str>,
    probe: &Probe,
) -> Result<bool> {
    match probe {
        Probe::Visible(selector) => Ok(match frame {
            Some(f) => page.frame_is_visible(f, selector).await?,
            None => page.is_visible(selector).await?,
        }),
        Probe::Present(selector) => {
            let count = match frame {
                Some(f) => page.frame_count(f, selector).await?,
                None => page.count(selector).await?,
            };
            Ok(count > 0)
        }
        Probe::TextContains { selector, needle } => {
            let count = match frame {
                Some(f) => page.frame_count(f, selector).await?,
                None => page.count(selector).await?,
            };
            if count == 0 {
                return Ok(false);
            }
            let text = match frame {
                Some(f) => page.frame_inner_text(f, selector).await?,
                None => page.inner_text(selector).await?,
            };
            Ok(text.contains(needle))
        }
        Probe::ContentContains(needle) => {
            let content = match frame {
                Some(f) => page.frame_content(f).await?,
                None => page.content().await?,
            };
            Ok(content.contains(needle))
        }
    }
}
