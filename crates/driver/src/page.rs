//! The abstract page surface.
//!
//! One trait carries every operation the engine needs: main-page element
//! operations plus frame-scoped variants of the same operations for
//! embedded third-party widgets. [`FrameRef`] wraps the frame variants in
//! the familiar `page.frame(sel).fill(..)` reading style.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DriverResult;
use crate::types::WaitState;

/// A live browser page behind an abstract driver.
///
/// Implementations must be safe to call sequentially from one task; the
/// engine never issues two calls concurrently against the same page.
/// Selectors use the backend's selector engine (CSS plus the `text=`
/// shorthand the flows rely on).
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigates to `url` and waits for the page to settle.
    async fn navigate(&self, url: &str, timeout: Duration) -> DriverResult<()>;

    /// Replaces the value of the first element matching `selector`.
    async fn fill(&self, selector: &str, value: &str) -> DriverResult<()>;

    /// Selects `value` in the first `<select>` matching `selector`.
    async fn select(&self, selector: &str, value: &str) -> DriverResult<()>;

    /// Clicks the first element matching `selector`.
    async fn click(&self, selector: &str) -> DriverResult<()>;

    /// Checks a checkbox or radio control. `force` bypasses actionability.
    async fn check(&self, selector: &str, force: bool) -> DriverResult<()>;

    /// Waits until the first element matching `selector` reaches `state`.
    async fn wait_for(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> DriverResult<()>;

    /// Whether any element matching `selector` is currently visible.
    /// Absence is `Ok(false)`, never an error.
    async fn is_visible(&self, selector: &str) -> DriverResult<bool>;

    /// Number of elements currently matching `selector`.
    async fn count(&self, selector: &str) -> DriverResult<usize>;

    /// Rendered text of the first element matching `selector`.
    async fn inner_text(&self, selector: &str) -> DriverResult<String>;

    /// Full serialized content of the page.
    async fn content(&self) -> DriverResult<String>;

    /// Evaluates `script` in the page context.
    async fn evaluate(&self, script: &str) -> DriverResult<Value>;

    /// Evaluates `script` with the first element matching `selector` bound
    /// as its argument.
    async fn eval_on(&self, selector: &str, script: &str) -> DriverResult<Value>;

    /// Captures a screenshot to `path`.
    async fn screenshot(&self, path: &Path, full_page: bool) -> DriverResult<()>;

    // Frame-scoped variants. `frame` selects the iframe element hosting the
    // embedded widget; the remaining arguments mirror the page-level calls.

    async fn frame_fill(&self, frame: &str, selector: &str, value: &str) -> DriverResult<()>;

    async fn frame_select(&self, frame: &str, selector: &str, value: &str) -> DriverResult<()>;

    async fn frame_click(&self, frame: &str, selector: &str) -> DriverResult<()>;

    async fn frame_check(&self, frame: &str, selector: &str, force: bool) -> DriverResult<()>;

    async fn frame_wait_for(
        &self,
        frame: &str,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> DriverResult<()>;

    async fn frame_is_visible(&self, frame: &str, selector: &str) -> DriverResult<bool>;

    async fn frame_count(&self, frame: &str, selector: &str) -> DriverResult<usize>;

    async fn frame_inner_text(&self, frame: &str, selector: &str) -> DriverResult<String>;

    async fn frame_content(&self, frame: &str) -> DriverResult<String>;

    async fn frame_eval_on(
        &self,
        frame: &str,
        selector: &str,
        script: &str,
    ) -> DriverResult<Value>;
}

/// Frame-scoped view over a [`PageDriver`].
///
/// Borrowed sugar so flow code reads like the backing driver's own frame
/// API:
///
/// ```ignore
/// let hub = FrameRef::new(page, "iframe[src*='hub.example.com']");
/// hub.fill("input#firstName", "Ada").await?;
/// ```
#[derive(Clone, Copy)]
pub struct FrameRef<'a> {
    page: &'a dyn PageDriver,
    frame: &'a str,
}

impl<'a> FrameRef<'a> {
    pub fn new(page: &'a dyn PageDriver, frame: &'a str) -> Self {
        Self { page, frame }
    }

    /// The iframe selector this view is scoped to.
    pub fn selector(&self) -> &str {
        self.frame
    }

    pub async fn fill(&self, selector: &str, value: &str) -> DriverResult<()> {
        self.page.frame_fill(self.frame, selector, value).await
    }

    pub async fn select(&self, selector: &str, value: &str) -> DriverResult<()> {
        self.page.frame_select(self.frame, selector, value).await
    }

    pub async fn click(&self, selector: &str) -> DriverResult<()> {
        self.page.frame_click(self.frame, selector).await
    }

    pub async fn check(&self, selector: &str, force: bool) -> DriverResult<()> {
        self.page.frame_check(self.frame, selector, force).await
    }

    pub async fn wait_for(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> DriverResult<()> {
        self.page
            .frame_wait_for(self.frame, selector, state, timeout)
            .await
    }

    pub async fn is_visible(&self, selector: &str) -> DriverResult<bool> {
        self.page.frame_is_visible(self.frame, selector).await
    }

    pub async fn count(&self, selector: &str) -> DriverResult<usize> {
        self.page.frame_count(self.frame, selector).await
    }

    pub async fn inner_text(&self, selector: &str) -> DriverResult<String> {
        self.page.frame_inner_text(self.frame, selector).await
    }

    pub async fn content(&self) -> DriverResult<String> {
        self.page.frame_content(self.frame).await
    }

    pub async fn eval_on(&self, selector: &str, script: &str) -> DriverResult<Value> {
        self.page.frame_eval_on(self.frame, selector, script).await
    }
}
