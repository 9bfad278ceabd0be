//! Observer Factories
//!
//! The host creates a fresh observer for every partition it acquires. Besides the
//! factory contract this module offers closure-based observers, so simple
//! consumers can register an async function instead of implementing the trait.

use super::observer::ChangeFeedObserver;
use super::types::ChangeFeedObserverContext;
use crate::feed::types::ChangeBatch;

use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Creates one observer instance per acquired partition.
pub trait ChangeFeedObserverFactory: Send + Sync {
    fn create_observer(&self) -> Arc<dyn ChangeFeedObserver>;
}

/// Factory backed by a closure.
pub struct FnObserverFactory<F> {
    create: F,
}

impl<F> FnObserverFactory<F>
where
    F: Fn() -> Arc<dyn ChangeFeedObserver> + Send + Sync,
{
    pub fn new(create: F) -> Arc<Self> {
        Arc::new(Self { create })
    }
}

impl<F> ChangeFeedObserverFactory for FnObserverFactory<F>
where
    F: Fn() -> Arc<dyn ChangeFeedObserver> + Send + Sync,
{
    fn create_observer(&self) -> Arc<dyn ChangeFeedObserver> {
        (self.create)()
    }
}

/// Type alias for a thread-safe, asynchronous batch handler.
/// It takes the run's context and a batch and returns a Future resolving to `Result<()>`.
pub type BatchHandlerFn = Arc<
    dyn Fn(ChangeFeedObserverContext, ChangeBatch) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>
        + Send
        + Sync,
>;

/// Observer whose `process_changes` is an async closure; `open` and `close` are no-ops.
#[derive(Clone)]
pub struct FnObserver {
    handler: BatchHandlerFn,
}

impl FnObserver {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(ChangeFeedObserverContext, ChangeBatch) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        // Box::pin type-erases the concrete Future so any async fn fits
        let handler: BatchHandlerFn = Arc::new(move |context, batch| {
            Box::pin(handler(context, batch)) as Pin<Box<dyn Future<Output = Result<()>> + Send>>
        });

        Self { handler }
    }
}

#[async_trait]
impl ChangeFeedObserver for FnObserver {
    async fn process_changes(
        &self,
        context: &ChangeFeedObserverContext,
        batch: &ChangeBatch,
    ) -> Result<()> {
        (self.handler)(context.clone(), batch.clone()).await
    }
}
