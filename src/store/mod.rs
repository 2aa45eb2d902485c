//! Store Module
//!
//! The key-value store the counters run on.
//!
//! ## Contract
//! The counters need exactly four primitives:
//! - `get`: point read of one item by key, optionally projected
//! - `put`: conditional point write
//! - parallel writes: several `put`s in flight at once (no atomicity)
//! - `transact_write`: all-or-nothing conditional multi-item write
//!
//! Conditions are evaluated by the store against the persisted item at
//! commit time. A failed condition inside a transaction cancels the whole
//! transaction with `Error::TransactionCanceled`, the conflict signal.
//!
//! ## Implementations
//! - `MemoryStore`: in-process tables behind a `parking_lot::RwLock`

mod memory;

pub use memory::{MemoryStore, MemoryStoreConfig, MemoryStoreConfigBuilder, StoreStats};

use std::sync::Arc;

use async_trait::async_trait;

use crate::condition::Condition;
use crate::error::Result;
use crate::item::Item;

/// Key attributes of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Partition key attribute name
    pub partition: String,

    /// Optional sort key attribute name
    pub sort: Option<String>,
}

impl KeySchema {
    /// Schema with a partition key only
    pub fn partition(name: impl Into<String>) -> Self {
        Self {
            partition: name.into(),
            sort: None,
        }
    }

    /// Schema with a partition key and a sort key
    pub fn composite(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }

    /// Key attribute names, partition first
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition.as_str()).chain(self.sort.as_deref())
    }
}

/// One conditional write of a full item
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    /// Target table
    pub table: String,

    /// Complete item, key attributes included
    pub item: Item,

    /// Evaluated against the item currently stored under the same key
    pub condition: Option<Condition>,
}

impl WriteRequest {
    pub fn new(table: impl Into<String>, item: Item) -> Self {
        Self {
            table: table.into(),
            item,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Key-value store with conditional single-item and transactional writes
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the item stored under `key`
    ///
    /// `projection` limits the returned attributes; `None` returns all of them.
    async fn get(&self, table: &str, key: &Item, projection: Option<&[String]>) -> Result<Option<Item>>;

    /// Write one item, replacing whatever is stored under its key
    ///
    /// A false condition yields `Error::ConditionalCheckFailed`.
    async fn put(&self, request: WriteRequest) -> Result<()>;

    /// Apply every write or none of them
    ///
    /// A false condition on any write yields `Error::TransactionCanceled`
    /// with one reason per write.
    async fn transact_write(&self, requests: Vec<WriteRequest>) -> Result<()>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, table: &str, key: &Item, projection: Option<&[String]>) -> Result<Option<Item>> {
        (**self).get(table, key, projection).await
    }

    async fn put(&self, request: WriteRequest) -> Result<()> {
        (**self).put(request).await
    }

    async fn transact_write(&self, requests: Vec<WriteRequest>) -> Result<()> {
        (**self).transact_write(requests).await
    }
}
