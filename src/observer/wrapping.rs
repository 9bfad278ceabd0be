//! Observer Exception Wrapping
//!
//! Wraps a user observer so that whatever escapes its callbacks, an `Err` or a
//! panic, reaches the supervisor as one kind: [`ObserverException`]. The
//! supervisor can then classify user failures without knowing user error types.

use super::observer::ChangeFeedObserver;
use super::types::{ChangeFeedObserverContext, CloseReason};
use crate::error::{ObserverException, ObserverOperation};
use crate::feed::types::ChangeBatch;

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

pub struct ObserverExceptionWrappingDecorator {
    inner: Arc<dyn ChangeFeedObserver>,
}

impl ObserverExceptionWrappingDecorator {
    pub fn new(inner: Arc<dyn ChangeFeedObserver>) -> Self {
        Self { inner }
    }

    async fn guarded<F>(
        &self,
        operation: ObserverOperation,
        context: &ChangeFeedObserverContext,
        call: F,
    ) -> Result<()>
    where
        F: Future<Output = Result<()>> + Send,
    {
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => {
                // Already normalized further down (nested decorators)
                if error.is::<ObserverException>() {
                    return Err(error);
                }
                tracing::warn!(
                    "Observer {} failed for partition {}: {:#}",
                    operation,
                    context.lease_token(),
                    error
                );
                Err(ObserverException::new(operation, context.lease_token(), error).into())
            }
            Err(panic) => {
                let message = panic_message(panic);
                tracing::error!(
                    "Observer {} panicked for partition {}: {}",
                    operation,
                    context.lease_token(),
                    message
                );
                Err(ObserverException::new(
                    operation,
                    context.lease_token(),
                    anyhow::anyhow!(message),
                )
                .into())
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("observer panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("observer panicked: {}", s)
    } else {
        "observer panicked".to_string()
    }
}

#[async_trait]
impl ChangeFeedObserver for ObserverExceptionWrappingDecorator {
    async fn open(&self, context: &ChangeFeedObserverContext) -> Result<()> {
        self.guarded(ObserverOperation::Open, context, self.inner.open(context))
            .await
    }

    async fn process_changes(
        &self,
        context: &ChangeFeedObserverContext,
        batch: &ChangeBatch,
    ) -> Result<()> {
        self.guarded(
            ObserverOperation::ProcessChanges,
            context,
            self.inner.process_changes(context, batch),
        )
        .await
    }

    async fn close(&self, context: &ChangeFeedObserverContext, reason: CloseReason) -> Result<()> {
        self.guarded(
            ObserverOperation::Close,
            context,
            self.inner.close(context, reason),
        )
        .await
    }
}
