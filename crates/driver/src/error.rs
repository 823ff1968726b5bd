//! Driver error taxonomy.
//!
//! Everything here is transient from the engine's point of view: a control
//! that never became ready or a navigation that never settled means the
//! session is suspect and gets rebuilt, not that the process is broken.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::WaitState;

pub type DriverResult<T> = std::result::Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum DriverError {
    /// Navigation did not reach a settled state within the bound.
    #[error("navigation to {url} did not complete within {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    /// An expected control never reached the wanted state.
    #[error("no element matching {selector} became {state} within {timeout_ms}ms")]
    FieldNotFound {
        selector: String,
        state: WaitState,
        timeout_ms: u64,
    },

    /// The element exists but the interaction itself failed.
    #[error("cannot {action} {selector}: {reason}")]
    Interaction {
        action: &'static str,
        selector: String,
        reason: String,
    },

    /// Script evaluation failed in the page or frame context.
    #[error("script evaluation failed: {0}")]
    Evaluate(String),

    /// Screenshot capture failed.
    #[error("screenshot to {path} failed: {reason}")]
    Screenshot { path: PathBuf, reason: String },

    /// The backend connection or process is gone.
    #[error("driver backend error: {0}")]
    Backend(String),
}

impl DriverError {
    /// True for the "never became ready" class: navigation and wait
    /// timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            DriverError::NavigationTimeout { .. } | DriverError::FieldNotFound { .. }
        )
    }
}
