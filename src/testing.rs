//! Shared test doubles for observers, fetchers, stores and partition tasks.

use crate::cancellation::CancellationToken;
use crate::error::{ChangeFeedError, Result};
use crate::feed::fetcher::ChangeFeedFetcher;
use crate::feed::types::{ChangeBatch, ChangeItem};
use crate::lease::checkpointer::PartitionCheckpointer;
use crate::lease::store::{InMemoryLeaseStore, LeaseStore};
use crate::lease::types::Lease;
use crate::observer::observer::ChangeFeedObserver;
use crate::observer::types::{ChangeFeedObserverContext, CloseReason};
use crate::processor::lease_renewer::LeaseRenewer;
use crate::processor::partition_processor::PartitionProcessor;
use crate::processor::slot::ResultSlot;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

pub fn item(lsn: u64) -> ChangeItem {
    ChangeItem {
        id: format!("doc-{}", lsn),
        lsn,
        payload: serde_json::json!({ "lsn": lsn }),
    }
}

pub fn batch(lsns: &[u64]) -> ChangeBatch {
    let continuation = lsns.last().map(|lsn| lsn.to_string());
    ChangeBatch::new(lsns.iter().map(|lsn| item(*lsn)).collect(), continuation)
}

// ============================================================
// OBSERVER
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    Open(String),
    Process(String, Vec<u64>),
    Close(String, CloseReason),
}

/// Observer recording every callback, with switchable failures.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
    pub fail_open: AtomicBool,
    pub fail_close: AtomicBool,
    pub panic_on_process: AtomicBool,
    /// 1-based index of the batch whose delivery fails; 0 disables.
    pub fail_on_batch: AtomicUsize,
    batches_seen: AtomicUsize,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, ObserverEvent::Open(_)))
            .count()
    }

    pub fn close_reasons(&self) -> Vec<CloseReason> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ObserverEvent::Close(_, reason) => Some(*reason),
                _ => None,
            })
            .collect()
    }

    pub fn delivered_batches(&self) -> Vec<Vec<u64>> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ObserverEvent::Process(_, lsns) => Some(lsns.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChangeFeedObserver for RecordingObserver {
    async fn open(&self, context: &ChangeFeedObserverContext) -> anyhow::Result<()> {
        self.events
            .lock()
            .push(ObserverEvent::Open(context.lease_token().to_string()));
        if self.fail_open.load(Ordering::SeqCst) {
            anyhow::bail!("open failed on purpose");
        }
        Ok(())
    }

    async fn process_changes(
        &self,
        context: &ChangeFeedObserverContext,
        batch: &ChangeBatch,
    ) -> anyhow::Result<()> {
        let seen = self.batches_seen.fetch_add(1, Ordering::SeqCst) + 1;

        if self.panic_on_process.load(Ordering::SeqCst) {
            panic!("observer exploded");
        }

        self.events.lock().push(ObserverEvent::Process(
            context.lease_token().to_string(),
            batch.items.iter().map(|item| item.lsn).collect(),
        ));

        if self.fail_on_batch.load(Ordering::SeqCst) == seen {
            anyhow::bail!("processing failed on batch {}", seen);
        }
        Ok(())
    }

    async fn close(
        &self,
        context: &ChangeFeedObserverContext,
        reason: CloseReason,
    ) -> anyhow::Result<()> {
        self.events.lock().push(ObserverEvent::Close(
            context.lease_token().to_string(),
            reason,
        ));
        if self.fail_close.load(Ordering::SeqCst) {
            anyhow::bail!("close failed on purpose");
        }
        Ok(())
    }
}

// ============================================================
// CHECKPOINTER
// ============================================================

#[derive(Default)]
pub struct RecordingCheckpointer {
    pub tokens: Mutex<Vec<String>>,
}

impl RecordingCheckpointer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl PartitionCheckpointer for RecordingCheckpointer {
    async fn checkpoint_partition(&self, continuation_token: &str) -> Result<()> {
        self.tokens.lock().push(continuation_token.to_string());
        Ok(())
    }
}

pub fn context(lease_token: &str) -> ChangeFeedObserverContext {
    ChangeFeedObserverContext::new(lease_token, RecordingCheckpointer::new())
}

// ============================================================
// FETCHERS
// ============================================================

/// Replays scripted responses, then returns empty batches.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<ChangeBatch>>>,
    pub requests: Mutex<Vec<Option<String>>>,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Result<ChangeBatch>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChangeFeedFetcher for ScriptedFetcher {
    async fn fetch_next(
        &self,
        _lease_token: &str,
        continuation_token: Option<&str>,
        _max_items: usize,
    ) -> Result<ChangeBatch> {
        self.requests
            .lock()
            .push(continuation_token.map(str::to_string));

        let next = self.script.lock().pop_front();
        match next {
            Some(response) => response,
            None => Ok(ChangeBatch::new(
                vec![],
                continuation_token.map(str::to_string),
            )),
        }
    }
}

/// Produces a one-item batch on every call, forever.
pub struct EndlessFetcher {
    next_lsn: AtomicU64,
    delay: Duration,
}

impl EndlessFetcher {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            next_lsn: AtomicU64::new(1),
            delay,
        })
    }

    pub fn produced(&self) -> u64 {
        self.next_lsn.load(Ordering::SeqCst) - 1
    }
}

#[async_trait]
impl ChangeFeedFetcher for EndlessFetcher {
    async fn fetch_next(
        &self,
        _lease_token: &str,
        _continuation_token: Option<&str>,
        _max_items: usize,
    ) -> Result<ChangeBatch> {
        tokio::time::sleep(self.delay).await;
        let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        Ok(batch(&[lsn]))
    }
}

// ============================================================
// LEASE STORE
// ============================================================

/// In-memory store whose n-th renewal is rejected with a chosen error.
pub struct FailingRenewStore {
    pub inner: InMemoryLeaseStore,
    fail_on_renew: usize,
    failure: fn(&str) -> ChangeFeedError,
    pub renew_calls: AtomicUsize,
}

impl FailingRenewStore {
    pub fn new(fail_on_renew: usize, failure: fn(&str) -> ChangeFeedError) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryLeaseStore::new(Duration::from_secs(30)),
            fail_on_renew,
            failure,
            renew_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LeaseStore for FailingRenewStore {
    async fn create_lease_if_not_exists(
        &self,
        lease_token: &str,
        continuation_token: Option<String>,
    ) -> Result<Lease> {
        self.inner
            .create_lease_if_not_exists(lease_token, continuation_token)
            .await
    }

    async fn acquire(&self, lease: &Lease, owner: &str) -> Result<Lease> {
        self.inner.acquire(lease, owner).await
    }

    async fn renew(&self, lease: &Lease) -> Result<Lease> {
        let call = self.renew_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_renew {
            return Err((self.failure)(&lease.lease_token));
        }
        self.inner.renew(lease).await
    }

    async fn checkpoint(&self, lease: &Lease, continuation_token: &str) -> Result<Lease> {
        self.inner.checkpoint(lease, continuation_token).await
    }

    async fn release(&self, lease: &Lease) -> Result<()> {
        self.inner.release(lease).await
    }

    async fn delete(&self, lease: &Lease) -> Result<()> {
        self.inner.delete(lease).await
    }

    async fn list_leases(&self) -> Result<Vec<Lease>> {
        self.inner.list_leases().await
    }
}

// ============================================================
// PARTITION TASK STUBS
// ============================================================

/// Processor/renewer double: waits for cancellation, or fails after a delay.
pub struct StubTask {
    result: ResultSlot,
    fail_after: Option<(Duration, fn() -> ChangeFeedError)>,
    pub observed_cancellation: AtomicBool,
    pub runs: AtomicUsize,
}

impl StubTask {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self {
            result: ResultSlot::new(),
            fail_after: None,
            observed_cancellation: AtomicBool::new(false),
            runs: AtomicUsize::new(0),
        })
    }

    pub fn failing_after(delay: Duration, failure: fn() -> ChangeFeedError) -> Arc<Self> {
        Arc::new(Self {
            result: ResultSlot::new(),
            fail_after: Some((delay, failure)),
            observed_cancellation: AtomicBool::new(false),
            runs: AtomicUsize::new(0),
        })
    }

    async fn run_until_cancelled(&self, cancellation: CancellationToken) {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match self.fail_after {
            Some((delay, failure)) => {
                tokio::select! {
                    _ = cancellation.cancelled() => {
                        self.observed_cancellation.store(true, Ordering::SeqCst);
                    }
                    _ = tokio::time::sleep(delay) => {
                        self.result.record(failure());
                    }
                }
            }
            None => {
                cancellation.cancelled().await;
                self.observed_cancellation.store(true, Ordering::SeqCst);
            }
        }
    }
}

#[async_trait]
impl PartitionProcessor for StubTask {
    async fn run(&self, _context: ChangeFeedObserverContext, cancellation: CancellationToken) {
        self.run_until_cancelled(cancellation).await;
    }

    fn result(&self) -> &ResultSlot {
        &self.result
    }
}

#[async_trait]
impl LeaseRenewer for StubTask {
    async fn run(&self, cancellation: CancellationToken) {
        self.run_until_cancelled(cancellation).await;
    }

    fn result(&self) -> &ResultSlot {
        &self.result
    }
}
