//! Shared driver vocabulary.

use std::fmt;

/// Element state a [`PageDriver::wait_for`] call can wait on.
///
/// [`PageDriver::wait_for`]: crate::page::PageDriver::wait_for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// Attached to the DOM and visible.
    Visible,
    /// Attached but not rendered.
    Hidden,
    /// Present in the DOM, visibility irrelevant.
    Attached,
    /// Absent from the DOM.
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
