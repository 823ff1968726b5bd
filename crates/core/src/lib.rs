//! Polling engine for Québec medical appointment portals.
//!
//! The engine drives a portal's multi-step search form through an abstract
//! browser driver, classifies each post-search page into a definite
//! outcome, and recovers from drift or transient failures by tearing the
//! whole browser session down and rebuilding it. A discovered slot raises
//! an audio alert and a full-page screenshot; on portals that allow it the
//! engine can push on and book the held slot.
//!
//! Entry point is [`Watcher`], built from a [`SiteFlow`], a session
//! factory, a [`PersonalInfo`] record and a [`Pacing`] profile.

pub mod artifacts;
pub mod classify;
pub mod error;
pub mod flag;
pub mod flow;
pub mod notify;
pub mod outcome;
pub mod pacing;
pub mod profile;
pub mod watcher;

pub use artifacts::{Artifact, ArtifactStore};
pub use error::{Result, WatchError};
pub use flag::RunningFlag;
pub use flow::{FlowVariant, Site, SiteFlow, flow_for};
pub use outcome::{BookingOutcome, SearchOutcome};
pub use pacing::Pacing;
pub use profile::{PersonalInfo, format_phone_number};
pub use watcher::{WatchReport, Watcher, WatcherBuilder};
