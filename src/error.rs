//! Error Taxonomy
//!
//! Every failure that can end a partition's supervision run is expressed as a
//! [`ChangeFeedError`]. The supervisor classifies the variant into a
//! [`CloseReason`] for the observer and propagates it to the caller of `run`.
//!
//! ## Kinds
//! - **`Observer`**: user code failed (always wrapped as [`ObserverException`]).
//! - **`LeaseLost`**: the lease was stolen, expired or updated concurrently.
//! - **`LeaseGone`**: the partition no longer exists (split or merge).
//! - **`Throttled`**: the feed asked us to back off; retried, never terminal.
//! - **`Cancelled`**: cooperative unwind signal, never reported as a run's result.
//! - **`Other`**: anything unclassified.

use crate::observer::types::CloseReason;

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChangeFeedError>;

/// The observer callback that raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverOperation {
    Open,
    ProcessChanges,
    Close,
}

impl fmt::Display for ObserverOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverOperation::Open => write!(f, "open"),
            ObserverOperation::ProcessChanges => write!(f, "process_changes"),
            ObserverOperation::Close => write!(f, "close"),
        }
    }
}

/// A failure raised by user observer code, carrying the original cause.
#[derive(Debug, Error)]
#[error("observer {operation} failed for partition {lease_token}: {source}")]
pub struct ObserverException {
    pub operation: ObserverOperation,
    pub lease_token: String,
    #[source]
    pub source: anyhow::Error,
}

impl ObserverException {
    pub fn new(operation: ObserverOperation, lease_token: &str, source: anyhow::Error) -> Self {
        Self {
            operation,
            lease_token: lease_token.to_string(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChangeFeedError {
    #[error(transparent)]
    Observer(#[from] ObserverException),

    #[error("lease {lease_token} lost")]
    LeaseLost { lease_token: String },

    #[error("partition {lease_token} is gone (split or merged)")]
    LeaseGone { lease_token: String },

    #[error("request throttled, retry after {retry_after:?}")]
    Throttled { retry_after: Duration },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(anyhow::Error),
}

impl ChangeFeedError {
    pub fn lease_lost(lease_token: &str) -> Self {
        ChangeFeedError::LeaseLost {
            lease_token: lease_token.to_string(),
        }
    }

    pub fn lease_gone(lease_token: &str) -> Self {
        ChangeFeedError::LeaseGone {
            lease_token: lease_token.to_string(),
        }
    }

    /// Normalizes a failure raised while calling observer code.
    ///
    /// Errors already wrapped by the decorator keep their wrapping; anything else,
    /// including typed feed errors raised from inside the observer, becomes an
    /// `ObserverException` so the run is classified as an observer failure.
    pub fn from_observer(
        operation: ObserverOperation,
        lease_token: &str,
        error: anyhow::Error,
    ) -> Self {
        match error.downcast::<ObserverException>() {
            Ok(observer) => ChangeFeedError::Observer(observer),
            Err(error) => {
                ChangeFeedError::Observer(ObserverException::new(operation, lease_token, error))
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChangeFeedError::Cancelled)
    }

    /// Maps the failure to the reason handed to `observer.close`.
    pub fn close_reason(&self) -> CloseReason {
        match self {
            ChangeFeedError::LeaseLost { .. } => CloseReason::LeaseLost,
            ChangeFeedError::LeaseGone { .. } => CloseReason::LeaseGone,
            ChangeFeedError::Observer(_) => CloseReason::ObserverError,
            ChangeFeedError::Throttled { .. }
            | ChangeFeedError::Cancelled
            | ChangeFeedError::Other(_) => CloseReason::Unknown,
        }
    }
}

/// Recovers the typed kind from an `anyhow` chain, so a `ChangeFeedError` or
/// `ObserverException` that travelled through user code keeps its classification.
impl From<anyhow::Error> for ChangeFeedError {
    fn from(error: anyhow::Error) -> Self {
        let error = match error.downcast::<ChangeFeedError>() {
            Ok(typed) => return typed,
            Err(error) => error,
        };

        match error.downcast::<ObserverException>() {
            Ok(observer) => ChangeFeedError::Observer(observer),
            Err(error) => ChangeFeedError::Other(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reason_classification() {
        assert_eq!(
            ChangeFeedError::lease_lost("p0").close_reason(),
            CloseReason::LeaseLost
        );
        assert_eq!(
            ChangeFeedError::lease_gone("p0").close_reason(),
            CloseReason::LeaseGone
        );

        let observer = ObserverException::new(
            ObserverOperation::ProcessChanges,
            "p0",
            anyhow::anyhow!("boom"),
        );
        assert_eq!(
            ChangeFeedError::from(observer).close_reason(),
            CloseReason::ObserverError
        );

        assert_eq!(
            ChangeFeedError::Other(anyhow::anyhow!("disk on fire")).close_reason(),
            CloseReason::Unknown
        );
    }

    #[test]
    fn test_from_anyhow_recovers_typed_errors() {
        let lost = anyhow::Error::new(ChangeFeedError::lease_lost("p1"));
        assert!(matches!(
            ChangeFeedError::from(lost),
            ChangeFeedError::LeaseLost { ref lease_token } if lease_token == "p1"
        ));

        let wrapped = anyhow::Error::new(ObserverException::new(
            ObserverOperation::Open,
            "p1",
            anyhow::anyhow!("bad config"),
        ));
        assert!(matches!(
            ChangeFeedError::from(wrapped),
            ChangeFeedError::Observer(ref e) if e.operation == ObserverOperation::Open
        ));

        let plain = anyhow::anyhow!("something else");
        assert!(matches!(
            ChangeFeedError::from(plain),
            ChangeFeedError::Other(_)
        ));
    }

    #[test]
    fn test_from_observer_wraps_typed_errors() {
        let raised = anyhow::Error::new(ChangeFeedError::lease_lost("p3"));

        let error = ChangeFeedError::from_observer(ObserverOperation::ProcessChanges, "p3", raised);

        assert_eq!(error.close_reason(), CloseReason::ObserverError);
    }

    #[test]
    fn test_observer_exception_message_keeps_cause() {
        let error = ObserverException::new(
            ObserverOperation::ProcessChanges,
            "p7",
            anyhow::anyhow!("index unavailable"),
        );

        let message = error.to_string();
        assert!(message.contains("process_changes"));
        assert!(message.contains("p7"));
        assert!(message.contains("index unavailable"));
    }
}
