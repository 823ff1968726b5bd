//! Abstract browser-driver surface consumed by the rdvwatch engine.
//!
//! The engine never talks to a concrete browser library. It drives a
//! [`PageDriver`]: navigation, element interaction, waits, script
//! evaluation and screenshots, with frame-scoped variants of every element
//! operation for embedded third-party widgets. Sessions are owned through
//! [`BrowserSession`] and built by a [`SessionFactory`], one session at
//! startup and one per recovery rebuild.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure surface: no engine behavior, no site knowledge
//! * Backend-neutral: any driver that can honor the call contracts fits
//! * Test-first: the [`scripted`] module ships an in-memory double so the
//!   engine is exercised without a browser
//!
//! The production adapter lives in `rdv-driver-playwright`.

pub mod error;
pub mod page;
pub mod scripted;
pub mod session;
pub mod types;

pub use error::{DriverError, DriverResult};
pub use page::{FrameRef, PageDriver};
pub use session::{BrowserSession, SessionFactory};
pub use types::WaitState;
