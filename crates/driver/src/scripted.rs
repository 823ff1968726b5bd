//! Scripted driver for unit testing flows and the engine without browsers.
//!
//! Provides an in-memory page model: tests prime element visibility, text
//! and counts through a controller, run the code under test against the
//! driver, then inspect the recorded calls.
//!
//! # Example
//!
//! ```ignore
//! let (page, controller) = ScriptedPageBuilder::new().build();
//! controller.show("#searchButton");
//!
//! page.click("#searchButton").await?;
//!
//! let calls = controller.take_calls();
//! assert_eq!(calls, vec![DriverCall::Click {
//!     frame: None,
//!     selector: "#searchButton".into(),
//! }]);
//! ```

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{DriverError, DriverResult};
use crate::page::PageDriver;
use crate::session::{BrowserSession, SessionFactory};
use crate::types::WaitState;

/// One recorded driver operation. Read-only queries are not recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Navigate {
        url: String,
    },
    Fill {
        frame: Option<String>,
        selector: String,
        value: String,
    },
    Select {
        frame: Option<String>,
        selector: String,
        value: String,
    },
    Click {
        frame: Option<String>,
        selector: String,
    },
    Check {
        frame: Option<String>,
        selector: String,
        force: bool,
    },
    WaitFor {
        frame: Option<String>,
        selector: String,
        state: WaitState,
    },
    Evaluate {
        script: String,
    },
    EvalOn {
        frame: Option<String>,
        selector: String,
        script: String,
    },
    Screenshot {
        path: PathBuf,
    },
}

/// Session lifecycle event recorded by [`ScriptedFactory`], tagged with the
/// zero-based session index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Opened(usize),
    PageClosed(usize),
    BrowserClosed(usize),
}

#[derive(Default)]
struct ElementState {
    visible: bool,
    count: usize,
    text: String,
    value: String,
    checked: bool,
}

type ElementKey = (Option<String>, String);

#[derive(Default)]
struct PageModel {
    elements: Mutex<HashMap<ElementKey, ElementState>>,
    content: Mutex<HashMap<Option<String>, String>>,
    calls: Mutex<Vec<DriverCall>>,
    eval_results: Mutex<VecDeque<Value>>,
    failures: Mutex<HashMap<(&'static str, String), VecDeque<DriverError>>>,
}

impl PageModel {
    fn key(frame: Option<&str>, selector: &str) -> ElementKey {
        (frame.map(str::to_owned), selector.to_owned())
    }

    fn record(&self, call: DriverCall) {
        self.calls.lock().push(call);
    }

    fn take_failure(&self, op: &'static str, target: &str) -> Option<DriverError> {
        let mut failures = self.failures.lock();
        let queue = failures.get_mut(&(op, target.to_owned()))?;
        queue.pop_front()
    }
}

/// Builder for creating scripted page instances.
pub struct ScriptedPageBuilder {}

impl ScriptedPageBuilder {
    pub fn new() -> Self {
        Self {}
    }

    /// Build the scripted page and return both the driver and a controller.
    ///
    /// The driver side implements [`PageDriver`] for the code under test;
    /// the [`ScriptedController`] primes the page model and inspects the
    /// recorded calls.
    pub fn build(self) -> (ScriptedDriver, ScriptedController) {
        let model = Arc::new(PageModel::default());
        let driver = ScriptedDriver {
            model: Arc::clone(&model),
        };
        let controller = ScriptedController { model };
        (driver, controller)
    }
}

impl Default for ScriptedPageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Controller for priming page state and inspecting recorded calls.
#[derive(Clone)]
pub struct ScriptedController {
    model: Arc<PageModel>,
}

impl ScriptedController {
    /// Make `selector` present and visible on the main page.
    pub fn show(&self, selector: &str) {
        self.show_in_scope(None, selector);
    }

    /// Make `selector` present and visible inside `frame`.
    pub fn show_in(&self, frame: &str, selector: &str) {
        self.show_in_scope(Some(frame), selector);
    }

    fn show_in_scope(&self, frame: Option<&str>, selector: &str) {
        let mut elements = self.model.elements.lock();
        let entry = elements
            .entry(PageModel::key(frame, selector))
            .or_default();
        entry.visible = true;
        entry.count = entry.count.max(1);
    }

    /// Make `selector` invisible (still attached if its count is nonzero).
    pub fn hide(&self, selector: &str) {
        let mut elements = self.model.elements.lock();
        if let Some(entry) = elements.get_mut(&PageModel::key(None, selector)) {
            entry.visible = false;
        }
    }

    /// Set the match count for `selector` on the main page.
    pub fn set_count(&self, selector: &str, count: usize) {
        self.set_count_in_scope(None, selector, count);
    }

    /// Set the match count for `selector` inside `frame`.
    pub fn set_count_in(&self, frame: &str, selector: &str, count: usize) {
        self.set_count_in_scope(Some(frame), selector, count);
    }

    fn set_count_in_scope(&self, frame: Option<&str>, selector: &str, count: usize) {
        let mut elements = self.model.elements.lock();
        let entry = elements
            .entry(PageModel::key(frame, selector))
            .or_default();
        entry.count = count;
        if count == 0 {
            entry.visible = false;
        }
    }

    /// Set the rendered text for `selector`, marking it present.
    pub fn set_text(&self, selector: &str, text: &str) {
        self.set_text_in_scope(None, selector, text);
    }

    /// Set the rendered text for `selector` inside `frame`.
    pub fn set_text_in(&self, frame: &str, selector: &str, text: &str) {
        self.set_text_in_scope(Some(frame), selector, text);
    }

    fn set_text_in_scope(&self, frame: Option<&str>, selector: &str, text: &str) {
        let mut elements = self.model.elements.lock();
        let entry = elements
            .entry(PageModel::key(frame, selector))
            .or_default();
        entry.text = text.to_owned();
        entry.count = entry.count.max(1);
        entry.visible = true;
    }

    /// Set the serialized content of the main page.
    pub fn set_content(&self, html: &str) {
        self.model.content.lock().insert(None, html.to_owned());
    }

    /// Set the serialized content of `frame`.
    pub fn set_frame_content(&self, frame: &str, html: &str) {
        self.model
            .content
            .lock()
            .insert(Some(frame.to_owned()), html.to_owned());
    }

    /// Queue a result for the next `evaluate`/`eval_on` call.
    pub fn script_eval(&self, result: Value) {
        self.model.eval_results.lock().push_back(result);
    }

    /// Queue an error for the next `op` against `target` (a selector, or
    /// the URL for `"navigate"`). Matching calls pop queued errors in
    /// order; once the queue drains the operation succeeds again.
    pub fn fail_next(&self, op: &'static str, target: &str, error: DriverError) {
        self.model
            .failures
            .lock()
            .entry((op, target.to_owned()))
            .or_default()
            .push_back(error);
    }

    /// Last value written to `selector` by `fill` or `select`.
    pub fn value_of(&self, selector: &str) -> Option<String> {
        self.value_of_in_scope(None, selector)
    }

    /// Last value written to `selector` inside `frame`.
    pub fn value_of_in(&self, frame: &str, selector: &str) -> Option<String> {
        self.value_of_in_scope(Some(frame), selector)
    }

    fn value_of_in_scope(&self, frame: Option<&str>, selector: &str) -> Option<String> {
        let elements = self.model.elements.lock();
        elements
            .get(&PageModel::key(frame, selector))
            .map(|e| e.value.clone())
    }

    /// Whether `selector` inside `frame` (or the main page) was checked.
    pub fn is_checked(&self, frame: Option<&str>, selector: &str) -> bool {
        let elements = self.model.elements.lock();
        elements
            .get(&PageModel::key(frame, selector))
            .map(|e| e.checked)
            .unwrap_or(false)
    }

    /// Take all recorded calls, clearing the buffer.
    pub fn take_calls(&self) -> Vec<DriverCall> {
        std::mem::take(&mut *self.model.calls.lock())
    }

    /// Snapshot of recorded calls without clearing.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.model.calls.lock().clone()
    }
}

/// [`PageDriver`] backed by the in-memory page model.
///
/// Mutating operations succeed by default and are recorded; read-only
/// queries answer from the primed model. `wait_for` resolves immediately
/// against the model instead of sleeping, so an unsatisfied wait fails
/// fast with the timeout error the real backend would produce.
pub struct ScriptedDriver {
    model: Arc<PageModel>,
}

impl ScriptedDriver {
    fn element_count(&self, frame: Option<&str>, selector: &str) -> usize {
        let elements = self.model.elements.lock();
        elements
            .get(&PageModel::key(frame, selector))
            .map(|e| e.count)
            .unwrap_or(0)
    }

    fn element_visible(&self, frame: Option<&str>, selector: &str) -> bool {
        let elements = self.model.elements.lock();
        elements
            .get(&PageModel::key(frame, selector))
            .map(|e| e.visible)
            .unwrap_or(false)
    }

    fn do_fill(&self, frame: Option<&str>, selector: &str, value: &str) -> DriverResult<()> {
        if let Some(err) = self.model.take_failure("fill", selector) {
            return Err(err);
        }
        {
            let mut elements = self.model.elements.lock();
            let entry = elements
                .entry(PageModel::key(frame, selector))
                .or_default();
            entry.value = value.to_owned();
            entry.count = entry.count.max(1);
        }
        self.model.record(DriverCall::Fill {
            frame: frame.map(str::to_owned),
            selector: selector.to_owned(),
            value: value.to_owned(),
        });
        Ok(())
    }

    fn do_select(&self, frame: Option<&str>, selector: &str, value: &str) -> DriverResult<()> {
        if let Some(err) = self.model.take_failure("select", selector) {
            return Err(err);
        }
        {
            let mut elements = self.model.elements.lock();
            let entry = elements
                .entry(PageModel::key(frame, selector))
                .or_default();
            entry.value = value.to_owned();
            entry.count = entry.count.max(1);
        }
        self.model.record(DriverCall::Select {
            frame: frame.map(str::to_owned),
            selector: selector.to_owned(),
            value: value.to_owned(),
        });
        Ok(())
    }

    fn do_click(&self, frame: Option<&str>, selector: &str) -> DriverResult<()> {
        if let Some(err) = self.model.take_failure("click", selector) {
            return Err(err);
        }
        self.model.record(DriverCall::Click {
            frame: frame.map(str::to_owned),
            selector: selector.to_owned(),
        });
        Ok(())
    }

    fn do_check(&self, frame: Option<&str>, selector: &str, force: bool) -> DriverResult<()> {
        if let Some(err) = self.model.take_failure("check", selector) {
            return Err(err);
        }
        {
            let mut elements = self.model.elements.lock();
            let entry = elements
                .entry(PageModel::key(frame, selector))
                .or_default();
            entry.checked = true;
            entry.count = entry.count.max(1);
        }
        self.model.record(DriverCall::Check {
            frame: frame.map(str::to_owned),
            selector: selector.to_owned(),
            force,
        });
        Ok(())
    }

    fn do_wait_for(
        &self,
        frame: Option<&str>,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> DriverResult<()> {
        if let Some(err) = self.model.take_failure("wait_for", selector) {
            return Err(err);
        }
        self.model.record(DriverCall::WaitFor {
            frame: frame.map(str::to_owned),
            selector: selector.to_owned(),
            state,
        });
        let satisfied = match state {
            WaitState::Visible => self.element_visible(frame, selector),
            WaitState::Hidden => !self.element_visible(frame, selector),
            WaitState::Attached => self.element_count(frame, selector) > 0,
            WaitState::Detached => self.element_count(frame, selector) == 0,
        };
        if satisfied {
            Ok(())
        } else {
            Err(DriverError::FieldNotFound {
                selector: selector.to_owned(),
                state,
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    fn do_inner_text(&self, frame: Option<&str>, selector: &str) -> DriverResult<String> {
        let elements = self.model.elements.lock();
        match elements.get(&PageModel::key(frame, selector)) {
            Some(entry) if entry.count > 0 => Ok(entry.text.clone()),
            _ => Err(DriverError::FieldNotFound {
                selector: selector.to_owned(),
                state: WaitState::Attached,
                timeout_ms: 0,
            }),
        }
    }

    fn do_content(&self, frame: Option<&str>) -> DriverResult<String> {
        let content = self.model.content.lock();
        Ok(content
            .get(&frame.map(str::to_owned))
            .cloned()
            .unwrap_or_default())
    }

    fn do_eval(&self) -> Value {
        self.model
            .eval_results
            .lock()
            .pop_front()
            .unwrap_or(Value::Null)
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn navigate(&self, url: &str, _timeout: Duration) -> DriverResult<()> {
        if let Some(err) = self.model.take_failure("navigate", url) {
            return Err(err);
        }
        self.model.record(DriverCall::Navigate {
            url: url.to_owned(),
        });
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> DriverResult<()> {
        self.do_fill(None, selector, value)
    }

    async fn select(&self, selector: &str, value: &str) -> DriverResult<()> {
        self.do_select(None, selector, value)
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        self.do_click(None, selector)
    }

    async fn check(&self, selector: &str, force: bool) -> DriverResult<()> {
        self.do_check(None, selector, force)
    }

    async fn wait_for(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> DriverResult<()> {
        self.do_wait_for(None, selector, state, timeout)
    }

    async fn is_visible(&self, selector: &str) -> DriverResult<bool> {
        Ok(self.element_visible(None, selector))
    }

    async fn count(&self, selector: &str) -> DriverResult<usize> {
        Ok(self.element_count(None, selector))
    }

    async fn inner_text(&self, selector: &str) -> DriverResult<String> {
        self.do_inner_text(None, selector)
    }

    async fn content(&self) -> DriverResult<String> {
        self.do_content(None)
    }

    async fn evaluate(&self, script: &str) -> DriverResult<Value> {
        self.model.record(DriverCall::Evaluate {
            script: script.to_owned(),
        });
        Ok(self.do_eval())
    }

    async fn eval_on(&self, selector: &str, script: &str) -> DriverResult<Value> {
        if let Some(err) = self.model.take_failure("eval_on", selector) {
            return Err(err);
        }
        self.model.record(DriverCall::EvalOn {
            frame: None,
            selector: selector.to_owned(),
            script: script.to_owned(),
        });
        Ok(self.do_eval())
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> DriverResult<()> {
        if let Some(err) = self.model.take_failure("screenshot", &path.to_string_lossy()) {
            return Err(err);
        }
        self.model.record(DriverCall::Screenshot {
            path: path.to_owned(),
        });
        std::fs::write(path, b"scripted").map_err(|e| DriverError::Screenshot {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }

    async fn frame_fill(&self, frame: &str, selector: &str, value: &str) -> DriverResult<()> {
        self.do_fill(Some(frame), selector, value)
    }

    async fn frame_select(&self, frame: &str, selector: &str, value: &str) -> DriverResult<()> {
        self.do_select(Some(frame), selector, value)
    }

    async fn frame_click(&self, frame: &str, selector: &str) -> DriverResult<()> {
        self.do_click(Some(frame), selector)
    }

    async fn frame_check(&self, frame: &str, selector: &str, force: bool) -> DriverResult<()> {
        self.do_check(Some(frame), selector, force)
    }

    async fn frame_wait_for(
        &self,
        frame: &str,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> DriverResult<()> {
        self.do_wait_for(Some(frame), selector, state, timeout)
    }

    async fn frame_is_visible(&self, frame: &str, selector: &str) -> DriverResult<bool> {
        Ok(self.element_visible(Some(frame), selector))
    }

    async fn frame_count(&self, frame: &str, selector: &str) -> DriverResult<usize> {
        Ok(self.element_count(Some(frame), selector))
    }

    async fn frame_inner_text(&self, frame: &str, selector: &str) -> DriverResult<String> {
        self.do_inner_text(Some(frame), selector)
    }

    async fn frame_content(&self, frame: &str) -> DriverResult<String> {
        self.do_content(Some(frame))
    }

    async fn frame_eval_on(
        &self,
        frame: &str,
        selector: &str,
        script: &str,
    ) -> DriverResult<Value> {
        if let Some(err) = self.model.take_failure("eval_on", selector) {
            return Err(err);
        }
        self.model.record(DriverCall::EvalOn {
            frame: Some(frame.to_owned()),
            selector: selector.to_owned(),
            script: script.to_owned(),
        });
        Ok(self.do_eval())
    }
}

type SetupFn = dyn Fn(usize, &ScriptedController) + Send + Sync;

/// [`SessionFactory`] producing scripted sessions, one fresh page model per
/// open, with a shared lifecycle log for teardown assertions.
///
/// Clones share all state, so a clone kept on the test side can inspect
/// events and controllers after the factory has been moved into the code
/// under test.
#[derive(Clone)]
pub struct ScriptedFactory {
    setup: Arc<SetupFn>,
    log: Arc<Mutex<Vec<LifecycleEvent>>>,
    controllers: Arc<Mutex<Vec<ScriptedController>>>,
    opened: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::with_setup(|_, _| {})
    }

    /// Create a factory that primes each new session's page model. The
    /// closure receives the zero-based session index and the controller of
    /// the session being opened.
    pub fn with_setup<F>(setup: F) -> Self
    where
        F: Fn(usize, &ScriptedController) + Send + Sync + 'static,
    {
        Self {
            setup: Arc::new(setup),
            log: Arc::new(Mutex::new(Vec::new())),
            controllers: Arc::new(Mutex::new(Vec::new())),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// All lifecycle events recorded so far, in order.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.log.lock().clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Controllers of every session opened so far, in open order.
    pub fn controllers(&self) -> Vec<ScriptedController> {
        self.controllers.lock().clone()
    }
}

impl Default for ScriptedFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(&self) -> DriverResult<Box<dyn BrowserSession>> {
        let index = self.opened.fetch_add(1, Ordering::SeqCst);
        let (driver, controller) = ScriptedPageBuilder::new().build();
        (self.setup)(index, &controller);
        self.controllers.lock().push(controller);
        self.log.lock().push(LifecycleEvent::Opened(index));
        Ok(Box::new(ScriptedSession {
            index,
            page: driver,
            log: Arc::clone(&self.log),
            closed: false,
        }))
    }
}

/// [`BrowserSession`] over a scripted page. `close` records page teardown
/// before browser teardown and is idempotent.
pub struct ScriptedSession {
    index: usize,
    page: ScriptedDriver,
    log: Arc<Mutex<Vec<LifecycleEvent>>>,
    closed: bool,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    fn page(&self) -> &dyn PageDriver {
        &self.page
    }

    async fn close(&mut self) -> DriverResult<()> {
        if !self.closed {
            self.closed = true;
            let mut log = self.log.lock();
            log.push(LifecycleEvent::PageClosed(self.index));
            log.push(LifecycleEvent::BrowserClosed(self.index));
        }
        Ok(())
    }
}
