//! Cooperative Cancellation
//!
//! A [`CancellationSource`] owns a [`CancellationToken`] and is the only handle
//! that should request cancellation of the work observing that token.
//!
//! Each supervision run creates two sources (processor, renewer) so either
//! task can be stopped without touching the fleet-wide shutdown token.

pub use tokio_util::sync::CancellationToken;

/// Owner of a cancellation channel.
///
/// `cancel()` is idempotent and irreversible. Dropping the source cancels the
/// token so no task is left waiting on a channel nobody can signal anymore.
#[derive(Debug, Default)]
pub struct CancellationSource {
    token: CancellationToken,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Creates a source whose token is also cancelled when `parent` is.
    pub fn linked_to(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
        }
    }

    /// Hands out an observing token; cancelling the source cancels every clone.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::trace!("Cancellation requested");
        }
        self.token.cancel();
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for CancellationSource {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_is_idempotent() {
        let source = CancellationSource::new();
        assert!(!source.is_cancellation_requested());

        source.cancel();
        source.cancel();

        assert!(source.is_cancellation_requested());
        assert!(source.token().is_cancelled());
    }

    #[test]
    fn test_sources_are_independent() {
        let processor = CancellationSource::new();
        let renewer = CancellationSource::new();

        processor.cancel();

        assert!(processor.is_cancellation_requested());
        assert!(!renewer.is_cancellation_requested());
    }

    #[test]
    fn test_drop_releases_waiters() {
        let source = CancellationSource::new();
        let token = source.token();

        drop(source);

        assert!(token.is_cancelled());
    }

    #[test]
    fn test_linked_source_follows_parent_only() {
        let shutdown = CancellationToken::new();
        let child = CancellationSource::linked_to(&shutdown);

        child.cancel();
        assert!(!shutdown.is_cancelled(), "child must not cancel the parent");

        let other = CancellationSource::linked_to(&shutdown);
        shutdown.cancel();
        assert!(other.is_cancellation_requested());
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_cancel() {
        let source = CancellationSource::new();
        let token = source.token();

        let waiter = tokio::spawn(async move {
            token.cancelled().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        source.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake up")
            .unwrap();
    }
}
