//! Retrying writer
//!
//! The optimistic loop shared by every counter:
//!
//! ```text
//!   ┌──────► READ ──► COMPUTE ──► COMMIT ──┬──► SUCCESS (return value)
//!   │                                      │
//!   └──────────── conflict signal ◄────────┤
//!                                          └──► FATAL (any other error)
//! ```
//!
//! READ and COMPUTE belong to the counter (`NextWriteSet`); COMMIT belongs to
//! the writer. No lock is held in-process: correctness comes entirely from
//! the conditions the store evaluates at commit time. There is no backoff
//! and no retry limit.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::item::Item;
use crate::store::{KeyValueStore, WriteRequest};

/// Writes that advance a counter by one, and the value they install
#[derive(Debug, Clone, PartialEq)]
pub struct WriteSet {
    /// Conditional writes, applied together or (in parallel mode) independently
    pub writes: Vec<WriteRequest>,

    /// Counter value installed when every write commits
    pub next: u64,
}

/// Computes the next write set from fresh reads
#[async_trait]
pub trait NextWriteSet: Send + Sync {
    async fn next(&self, item: &Item) -> Result<WriteSet>;
}

/// How a write set is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStrategy {
    /// One all-or-nothing transaction (safe with concurrent callers)
    Transactional,

    /// Every write on its own, concurrently.
    /// Partial application is possible and is never repaired; for a single
    /// writer or tests only.
    Parallel,
}

impl CommitStrategy {
    /// Strategy selected by the `dangerously` flag
    pub fn from_dangerously(dangerously: bool) -> Self {
        if dangerously {
            CommitStrategy::Parallel
        } else {
            CommitStrategy::Transactional
        }
    }
}

/// Runs `NextWriteSet` steps until one commits
pub struct RetryingWriter<S: ?Sized> {
    store: Arc<S>,
    strategy: CommitStrategy,
}

impl<S: KeyValueStore + ?Sized> RetryingWriter<S> {
    pub fn new(store: Arc<S>, strategy: CommitStrategy) -> Self {
        Self { store, strategy }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Advance the counter behind `step` and return the value it installed
    ///
    /// Conflicts restart the cycle from `step.next`; every other error is
    /// returned as is.
    pub async fn put<N: NextWriteSet + ?Sized>(&self, step: &N, item: &Item) -> Result<u64> {
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;

            let WriteSet { writes, next } = step.next(item).await?;
            trace!(attempt, next, writes = ?writes, "computed write set");

            match self.commit(writes).await {
                Ok(()) => {
                    debug!(attempt, next, "write set committed");
                    return Ok(next);
                }
                Err(e) if e.is_conflict() => {
                    debug!(attempt, next, error = %e, "conflict, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn commit(&self, writes: Vec<WriteRequest>) -> Result<()> {
        match self.strategy {
            CommitStrategy::Transactional => self.store.transact_write(writes).await,
            CommitStrategy::Parallel => self.commit_parallel(writes).await,
        }
    }

    async fn commit_parallel(&self, writes: Vec<WriteRequest>) -> Result<()> {
        let total = writes.len();
        let results = join_all(writes.into_iter().map(|w| self.store.put(w))).await;

        let mut failed = 0usize;
        let mut first_error = None;
        for result in results {
            if let Err(e) = result {
                failed += 1;
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            None => Ok(()),
            Some(e) => {
                if failed < total {
                    warn!(
                        applied = total - failed,
                        failed,
                        error = %e,
                        "write set partially applied"
                    );
                }
                Err(e)
            }
        }
    }
}
