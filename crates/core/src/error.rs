//! Engine error taxonomy.
//!
//! Driver-level failures (a control that never became ready, a navigation
//! timeout) stay in [`DriverError`] and convert into [`WatchError::Driver`]
//! at the engine boundary. Everything in this taxonomy except
//! [`WatchError::InvalidInput`] is recoverable: the automaton answers it
//! with a diagnostic screenshot and a full session rebuild.

use rdv_driver::DriverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    /// A supplied value failed validation before the automaton started.
    /// Never recovered; surfaces at construction time.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The results screen matched no recognized outcome shape. Fatal for
    /// the session that produced it; the page structure has likely drifted.
    #[error("results screen matched no recognized outcome")]
    Unparseable,

    /// The site showed its generic error banner after a search.
    #[error("site reported a transient error after search")]
    TransientPage,

    /// The booking hold expired before a confirmation indicator appeared.
    /// The slot was most likely lost to another requester.
    #[error("booking hold expired before confirmation appeared")]
    BookingTimeout,

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl WatchError {
    /// Whether the automaton should rebuild the session and continue
    /// rather than stop the run.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, WatchError::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_errors_convert_and_stay_recoverable() {
        let driver = DriverError::NavigationTimeout {
            url: "https://example.test".into(),
            timeout_ms: 60_000,
        };
        let err = WatchError::from(driver);
        assert!(err.is_recoverable());
        assert!(matches!(err, WatchError::Driver(_)));
    }

    #[test]
    fn invalid_input_is_fatal() {
        assert!(!WatchError::InvalidInput("cellphone".into()).is_recoverable());
        assert!(WatchError::Unparseable.is_recoverable());
        assert!(WatchError::BookingTimeout.is_recoverable());
    }
}
