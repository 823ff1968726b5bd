//! Chromium sessions over the sidecar.
//!
//! [`PlaywrightFactory`] spawns one `node` child per session and speaks the
//! line protocol from [`protocol`](crate::protocol). Every page operation
//! maps sidecar failures back onto the driver error taxonomy so the engine
//! never sees backend-specific error shapes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdv_driver::{
    BrowserSession, DriverError, DriverResult, PageDriver, SessionFactory, WaitState,
};
use serde_json::Value;
use tracing::info;

use crate::process::{DriverProcess, RequestFailure};
use crate::protocol::Command;

/// How to launch the sidecar and its browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Node interpreter to run the embedded driver script with.
    pub node_binary: PathBuf,
    /// Headless Chromium. Off by default: the whole point of the watch is
    /// that a found slot leaves a browser open for the user to act in.
    pub headless: bool,
    /// Per-action delay applied inside the browser.
    pub slow_mo: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            node_binary: PathBuf::from("node"),
            headless: false,
            slow_mo: Duration::ZERO,
        }
    }
}

/// Opens one fresh Chromium session per call, each backed by its own
/// sidecar process.
pub struct PlaywrightFactory {
    options: LaunchOptions,
}

impl PlaywrightFactory {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SessionFactory for PlaywrightFactory {
    async fn open(&self) -> DriverResult<Box<dyn BrowserSession>> {
        let process = DriverProcess::spawn(&self.options.node_binary)
            .await
            .map_err(|err| {
                DriverError::Backend(format!("failed to start driver sidecar: {err}"))
            })?;
        let process = Arc::new(process);
        process
            .request(Command::Launch {
                headless: self.options.headless,
                slow_mo_ms: self.options.slow_mo.as_millis() as u64,
            })
            .await
            .map_err(|failure| {
                DriverError::Backend(format!("browser launch failed: {}", failure.message()))
            })?;
        info!(
            target = "rdv.playwright",
            headless = self.options.headless,
            "chromium session ready"
        );
        Ok(Box::new(PlaywrightSession {
            page: PlaywrightPage {
                process: Arc::clone(&process),
            },
            process,
            closed: false,
        }))
    }
}

/// One live Chromium with its working page.
pub struct PlaywrightSession {
    page: PlaywrightPage,
    process: Arc<DriverProcess>,
    closed: bool,
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    fn page(&self) -> &dyn PageDriver {
        &self.page
    }

    async fn close(&mut self) -> DriverResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Attempt both halves even when the first fails; report the first
        // failure after the process is gone.
        let mut first_error = None;
        if let Err(failure) = self.process.request(Command::ClosePage).await {
            first_error = Some(DriverError::Backend(format!(
                "page close failed: {}",
                failure.message()
            )));
        }
        if let Err(failure) = self.process.request(Command::CloseBrowser).await {
            if first_error.is_none() {
                first_error = Some(DriverError::Backend(format!(
                    "browser close failed: {}",
                    failure.message()
                )));
            }
        }
        self.process.shutdown().await;
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct PlaywrightPage {
    process: Arc<DriverProcess>,
}

impl PlaywrightPage {
    async fn do_fill(&self, frame: Option<String>, selector: &str, value: &str) -> DriverResult<()> {
        self.process
            .request(Command::Fill {
                frame,
                selector: selector.to_owned(),
                value: value.to_owned(),
            })
            .await
            .map(|_| ())
            .map_err(|failure| interaction_error("fill", selector, failure))
    }

    async fn do_select(
        &self,
        frame: Option<String>,
        selector: &str,
        value: &str,
    ) -> DriverResult<()> {
        self.process
            .request(Command::Select {
                frame,
                selector: selector.to_owned(),
                value: value.to_owned(),
            })
            .await
            .map(|_| ())
            .map_err(|failure| interaction_error("select in", selector, failure))
    }

    async fn do_click(&self, frame: Option<String>, selector: &str) -> DriverResult<()> {
        self.process
            .request(Command::Click {
                frame,
                selector: selector.to_owned(),
            })
            .await
            .map(|_| ())
            .map_err(|failure| interaction_error("click", selector, failure))
    }

    async fn do_check(&self, frame: Option<String>, selector: &str, force: bool) -> DriverResult<()> {
        self.process
            .request(Command::Check {
                frame,
                selector: selector.to_owned(),
                force,
            })
            .await
            .map(|_| ())
            .map_err(|failure| interaction_error("check", selector, failure))
    }

    async fn do_wait_for(
        &self,
        frame: Option<String>,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> DriverResult<()> {
        let timeout_ms = timeout.as_millis() as u64;
        self.process
            .request(Command::WaitFor {
                frame,
                selector: selector.to_owned(),
                state: state.as_str().to_owned(),
                timeout_ms,
            })
            .await
            .map(|_| ())
            .map_err(|failure| wait_error(selector, state, timeout_ms, failure))
    }

    async fn do_is_visible(&self, frame: Option<String>, selector: &str) -> DriverResult<bool> {
        self.process
            .request(Command::IsVisible {
                frame,
                selector: selector.to_owned(),
            })
            .await
            .map(|value| value.as_bool().unwrap_or(false))
            .map_err(|failure| interaction_error("probe", selector, failure))
    }

    async fn do_count(&self, frame: Option<String>, selector: &str) -> DriverResult<usize> {
        self.process
            .request(Command::Count {
                frame,
                selector: selector.to_owned(),
            })
            .await
            .map(|value| value.as_u64().unwrap_or(0) as usize)
            .map_err(|failure| interaction_error("count", selector, failure))
    }

    async fn do_inner_text(&self, frame: Option<String>, selector: &str) -> DriverResult<String> {
        self.process
            .request(Command::InnerText {
                frame,
                selector: selector.to_owned(),
            })
            .await
            .map(|value| value.as_str().unwrap_or_default().to_owned())
            .map_err(|failure| match failure {
                failure if failure.is_timeout() => DriverError::FieldNotFound {
                    selector: selector.to_owned(),
                    state: WaitState::Visible,
                    timeout_ms: 0,
                },
                failure => interaction_error("read", selector, failure),
            })
    }
}

#[async_trait]
impl PageDriver for PlaywrightPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> DriverResult<()> {
        let timeout_ms = timeout.as_millis() as u64;
        match self
            .process
            .request(Command::Navigate {
                url: url.to_owned(),
                timeout_ms,
            })
            .await
        {
            Ok(_) => Ok(()),
            Err(failure) if failure.is_timeout() => Err(DriverError::NavigationTimeout {
                url: url.to_owned(),
                timeout_ms,
            }),
            Err(failure) => Err(DriverError::Backend(format!(
                "navigation to {url} failed: {}",
                failure.message()
            ))),
        }
    }

    async fn fill(&self, selector: &str, value: &str) -> DriverResult<()> {
        self.do_fill(None, selector, value).await
    }

    async fn select(&self, selector: &str, value: &str) -> DriverResult<()> {
        self.do_select(None, selector, value).await
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        self.do_click(None, selector).await
    }

    async fn check(&self, selector: &str, force: bool) -> DriverResult<()> {
        self.do_check(None, selector, force).await
    }

    async fn wait_for(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> DriverResult<()> {
        self.do_wait_for(None, selector, state, timeout).await
    }

    async fn is_visible(&self, selector: &str) -> DriverResult<bool> {
        self.do_is_visible(None, selector).await
    }

    async fn count(&self, selector: &str) -> DriverResult<usize> {
        self.do_count(None, selector).await
    }

    async fn inner_text(&self, selector: &str) -> DriverResult<String> {
        self.do_inner_text(None, selector).await
    }

    async fn content(&self) -> DriverResult<String> {
        self.process
            .request(Command::Content { frame: None })
            .await
            .map(|value| value.as_str().unwrap_or_default().to_owned())
            .map_err(|failure| {
                DriverError::Backend(format!("page content read failed: {}", failure.message()))
            })
    }

    async fn evaluate(&self, script: &str) -> DriverResult<Value> {
        self.process
            .request(Command::Evaluate {
                script: script.to_owned(),
            })
            .await
            .map_err(|failure| match failure {
                RequestFailure::Transport(reason) => DriverError::Backend(reason),
                RequestFailure::Wire(err) => DriverError::Evaluate(err.message),
            })
    }

    async fn eval_on(&self, selector: &str, script: &str) -> DriverResult<Value> {
        self.process
            .request(Command::EvalOn {
                frame: None,
                selector: selector.to_owned(),
                script: script.to_owned(),
            })
            .await
            .map_err(|failure| eval_on_error(selector, failure))
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> DriverResult<()> {
        self.process
            .request(Command::Screenshot {
                path: path.to_string_lossy().into_owned(),
                full_page,
            })
            .await
            .map(|_| ())
            .map_err(|failure| DriverError::Screenshot {
                path: path.to_path_buf(),
                reason: failure.message(),
            })
    }

    async fn frame_fill(&self, frame: &str, selector: &str, value: &str) -> DriverResult<()> {
        self.do_fill(Some(frame.to_owned()), selector, value).await
    }

    async fn frame_select(&self, frame: &str, selector: &str, value: &str) -> DriverResult<()> {
        self.do_select(Some(frame.to_owned()), selector, value).await
    }

    async fn frame_click(&self, frame: &str, selector: &str) -> DriverResult<()> {
        self.do_click(Some(frame.to_owned()), selector).await
    }

    async fn frame_check(&self, frame: &str, selector: &str, force: bool) -> DriverResult<()> {
        self.do_check(Some(frame.to_owned()), selector, force).await
    }

    async fn frame_wait_for(
        &self,
        frame: &str,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> DriverResult<()> {
        self.do_wait_for(Some(frame.to_owned()), selector, state, timeout)
            .await
    }

    async fn frame_is_visible(&self, frame: &str, selector: &str) -> DriverResult<bool> {
        self.do_is_visible(Some(frame.to_owned()), selector).await
    }

    async fn frame_count(&self, frame: &str, selector: &str) -> DriverResult<usize> {
        self.do_count(Some(frame.to_owned()), selector).await
    }

    async fn frame_inner_text(&self, frame: &str, selector: &str) -> DriverResult<String> {
        self.do_inner_text(Some(frame.to_owned()), selector).await
    }

    async fn frame_content(&self, frame: &str) -> DriverResult<String> {
        self.process
            .request(Command::Content {
                frame: Some(frame.to_owned()),
            })
            .await
            .map(|value| value.as_str().unwrap_or_default().to_owned())
            .map_err(|failure| interaction_error("read", frame, failure))
    }

    async fn frame_eval_on(
        &self,
        frame: &str,
        selector: &str,
        script: &str,
    ) -> DriverResult<Value> {
        self.process
            .request(Command::EvalOn {
                frame: Some(frame.to_owned()),
                selector: selector.to_owned(),
                script: script.to_owned(),
            })
            .await
            .map_err(|failure| eval_on_error(selector, failure))
    }
}

fn interaction_error(action: &'static str, selector: &str, failure: RequestFailure) -> DriverError {
    match failure {
        RequestFailure::Transport(reason) => DriverError::Backend(reason),
        RequestFailure::Wire(err) => DriverError::Interaction {
            action,
            selector: selector.to_owned(),
            reason: err.message,
        },
    }
}

fn wait_error(
    selector: &str,
    state: WaitState,
    timeout_ms: u64,
    failure: RequestFailure,
) -> DriverError {
    if failure.is_timeout() {
        return DriverError::FieldNotFound {
            selector: selector.to_owned(),
            state,
            timeout_ms,
        };
    }
    interaction_error("wait for", selector, failure)
}

fn eval_on_error(selector: &str, failure: RequestFailure) -> DriverError {
    match failure {
        RequestFailure::Transport(reason) => DriverError::Backend(reason),
        RequestFailure::Wire(err) => {
            DriverError::Evaluate(format!("on {selector}: {}", err.message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WireError;

    fn wire(name: Option<&str>, message: &str) -> RequestFailure {
        RequestFailure::Wire(WireError {
            name: name.map(str::to_owned),
            message: message.to_owned(),
        })
    }

    #[test]
    fn test_wait_timeouts_become_field_not_found() {
        let err = wait_error(
            "#PostalCode",
            WaitState::Visible,
            10_000,
            wire(Some("TimeoutError"), "Timeout 10000ms exceeded"),
        );
        match err {
            DriverError::FieldNotFound {
                selector,
                state,
                timeout_ms,
            } => {
                assert_eq!(selector, "#PostalCode");
                assert_eq!(state, WaitState::Visible);
                assert_eq!(timeout_ms, 10_000);
            }
            other => panic!("unexpected mapping: {other}"),
        }
    }

    #[test]
    fn test_wire_failures_keep_the_action_and_selector() {
        let err = interaction_error("click", "#go", wire(Some("Error"), "element detached"));
        assert_eq!(
            err.to_string(),
            "cannot click #go: element detached"
        );
    }

    #[test]
    fn test_transport_failures_map_to_backend() {
        let err = interaction_error(
            "fill",
            "#PostalCode",
            RequestFailure::Transport("driver sidecar ended before replying".to_owned()),
        );
        assert!(matches!(err, DriverError::Backend(_)));
    }

    #[test]
    fn test_default_launch_is_headful() {
        let options = LaunchOptions::default();
        assert!(!options.headless);
        assert_eq!(options.node_binary, PathBuf::from("node"));
        assert_eq!(options.slow_mo, Duration::ZERO);
    }
}
