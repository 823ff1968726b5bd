//! Site flow adapters.
//!
//! One adapter per portal, both implementing [`SiteFlow`]. The automaton
//! is written once against the trait; everything site-specific (selectors,
//! branch handling, the outcome indicator table, booking support) lives
//! behind it.

pub mod bonjour;
pub mod rvsq;

pub use bonjour::BonjourSanteFlow;
pub use rvsq::RvsqFlow;

use async_trait::async_trait;
use rdv_driver::PageDriver;

use crate::classify::OutcomeIndicators;
use crate::error::{Result, WatchError};
use crate::outcome::BookingOutcome;
use crate::pacing::Pacing;
use crate::profile::PersonalInfo;

/// A supported portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Rvsq,
    BonjourSante,
}

impl Site {
    /// Log-line prefix.
    pub fn tag(&self) -> &'static str {
        match self {
            Site::Rvsq => "[RVSQ]",
            Site::BonjourSante => "[BonjourSante]",
        }
    }

    /// File-name friendly identifier.
    pub fn slug(&self) -> &'static str {
        match self {
            Site::Rvsq => "rvsq",
            Site::BonjourSante => "bonjour_sante",
        }
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// The form branch a session resolved early and follows for its lifetime.
///
/// RVSQ diverges permanently on whether the insured person has a family
/// doctor; the branch is detected once per session and never re-queried.
/// Sites without a branch report [`FlowVariant::Unbranched`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowVariant {
    FamilyDoctor,
    NoFamilyDoctor,
    Unbranched,
}

impl FlowVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowVariant::FamilyDoctor => "family-doctor",
            FlowVariant::NoFamilyDoctor => "no-family-doctor",
            FlowVariant::Unbranched => "unbranched",
        }
    }
}

impl std::fmt::Display for FlowVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One portal's form flow.
///
/// `reach_search_screen` runs once per session and leaves the page
/// search-ready; `submit_search` is idempotent and is called once per
/// polling iteration without re-running the reach phase.
#[async_trait]
pub trait SiteFlow: Send + Sync {
    fn site(&self) -> Site;

    /// Drives the portal from its entry page to the search-ready screen:
    /// consent, identity form, branch screens, search criteria.
    async fn reach_search_screen(
        &self,
        page: &dyn PageDriver,
        info: &PersonalInfo,
    ) -> Result<FlowVariant>;

    /// Triggers one search round from the search-ready screen.
    async fn submit_search(&self, page: &dyn PageDriver, postal_code: &str) -> Result<()>;

    /// The static probe table [`crate::classify::classify`] runs after each
    /// search.
    fn outcome_indicators(&self) -> &'static OutcomeIndicators;

    fn supports_auto_booking(&self) -> bool {
        false
    }

    /// Completes a booking for a held slot. Only meaningful on sites where
    /// [`supports_auto_booking`](SiteFlow::supports_auto_booking) is true.
    async fn attempt_booking(
        &self,
        _page: &dyn PageDriver,
        _info: &PersonalInfo,
    ) -> Result<BookingOutcome> {
        Err(WatchError::InvalidInput(format!(
            "{} does not support auto-booking",
            self.site()
        )))
    }
}

/// Builds the flow adapter for `site`.
pub fn flow_for(site: Site, pacing: Pacing) -> Box<dyn SiteFlow> {
    match site {
        Site::Rvsq => Box::new(RvsqFlow::new(pacing)),
        Site::BonjourSante => Box::new(BonjourSanteFlow::new(pacing)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_tags_and_slugs() {
        assert_eq!(Site::Rvsq.tag(), "[RVSQ]");
        assert_eq!(Site::BonjourSante.tag(), "[BonjourSante]");
        assert_eq!(Site::Rvsq.slug(), "rvsq");
        assert_eq!(Site::BonjourSante.slug(), "bonjour_sante");
    }

    #[test]
    fn flow_for_matches_site() {
        let pacing = Pacing::for_site(Site::Rvsq);
        assert_eq!(flow_for(Site::Rvsq, pacing).site(), Site::Rvsq);
        assert_eq!(
            flow_for(Site::BonjourSante, pacing).site(),
            Site::BonjourSante
        );
    }

    #[test]
    fn only_bonjour_sante_supports_auto_booking() {
        let pacing = Pacing::for_site(Site::Rvsq);
        assert!(!flow_for(Site::Rvsq, pacing).supports_auto_booking());
        assert!(flow_for(Site::BonjourSante, pacing).supports_auto_booking());
    }
}
