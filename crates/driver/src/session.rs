//! Browser session lifecycle.
//!
//! A session owns one browser plus the single page the engine works in.
//! Recovery tears the whole session down and asks the factory for a fresh
//! one, so stale DOM state can never leak across rebuilds.

use async_trait::async_trait;

use crate::error::DriverResult;
use crate::page::PageDriver;

/// One live browser with its working page.
///
/// Dropping a session without calling [`close`](BrowserSession::close) is
/// allowed but may leave the backend process running until the factory is
/// dropped; the engine always closes explicitly, page before browser.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// The working page of this session.
    fn page(&self) -> &dyn PageDriver;

    /// Closes the page, then the browser. Idempotent.
    async fn close(&mut self) -> DriverResult<()>;
}

/// Opens fresh [`BrowserSession`]s on demand.
///
/// The engine holds one factory for the whole run and calls
/// [`open`](SessionFactory::open) once at startup and once per recovery.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> DriverResult<Box<dyn BrowserSession>>;
}
