//! History counter
//!
//! The current item carries its own version, and every version ever
//! committed is kept as an immutable copy in a history table.
//!
//! ## Layout
//! ```text
//!   counter_table (current items)      table (history)
//!   ┌──────────────────────────┐       ┌──────────────────────────────┐
//!   │ {key.., attribute: N,    │       │ {key.., attribute: 1, ..}    │
//!   │  ..latest attributes}    │       │ {key.., attribute: 2, ..}    │
//!   └──────────────────────────┘       │ ...                          │
//!                                      │ {key.., attribute: N, ..}    │
//!                                      └──────────────────────────────┘
//! ```
//!
//! The history table is keyed by the counter key's partition attribute plus
//! `attribute` as sort key. History entries are only ever inserted.
//!
//! ## Bootstrap
//! A current item that predates versioning (no `attribute`) is first copied
//! into history at `initial_value`, so its state is not lost, and the new
//! write becomes `initial_value + 1`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::condition::Condition;
use crate::config::CounterConfig;
use crate::error::Result;
use crate::item::{self, Item};
use crate::store::{KeyValueStore, WriteRequest};
use crate::writer::{CommitStrategy, NextWriteSet, RetryingWriter, WriteSet};

/// Versioned current item with an append-only history
pub struct HistoryCounter<S: ?Sized> {
    config: CounterConfig,
    writer: RetryingWriter<S>,
}

impl<S: KeyValueStore + ?Sized> HistoryCounter<S> {
    /// Create a history counter over `store`
    ///
    /// `counter_table` holds current items and `table` holds their history;
    /// `attribute` is the version attribute on both.
    pub fn new(store: Arc<S>, config: CounterConfig) -> Result<Self> {
        config.validate()?;
        let writer = RetryingWriter::new(store, CommitStrategy::from_dangerously(config.dangerously));
        Ok(Self { config, writer })
    }

    /// Write `item` as the new current version and return that version
    ///
    /// Key attributes and the version attribute on `item` are overwritten.
    pub async fn put(&self, item: Item) -> Result<u64> {
        self.writer.put(self, &item).await
    }

    /// Version of the current item
    ///
    /// `None` if there is no current item or it has never been versioned.
    pub async fn get_last(&self) -> Result<Option<u64>> {
        let projection = [self.config.attribute.clone()];
        let record = self
            .writer
            .store()
            .get(&self.config.counter_table, &self.config.counter_key, Some(projection.as_slice()))
            .await?;

        match record {
            Some(record) => item::read_counter(&record, &self.config.attribute),
            None => Ok(None),
        }
    }

    /// History entry for `version`, if present
    pub async fn get_version(&self, version: u64) -> Result<Option<Item>> {
        let key = item::with_attribute(
            &self.config.counter_key,
            &self.config.attribute,
            item::counter_value(&self.config.attribute, version)?,
        );
        self.writer.store().get(&self.config.table, &key, None).await
    }
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> NextWriteSet for HistoryCounter<S> {
    async fn next(&self, item: &Item) -> Result<WriteSet> {
        let cfg = &self.config;
        let attr = cfg.attribute.as_str();
        let mut writes = Vec::with_capacity(3);

        // Step 1: Read the whole current item
        let current = self
            .writer
            .store()
            .get(&cfg.counter_table, &cfg.counter_key, None)
            .await?;

        // Step 2: Derive the next version, bootstrapping unversioned items
        let next = match current {
            Some(existing) => {
                let version = match item::read_counter(&existing, attr)? {
                    Some(version) => version,
                    None => {
                        debug!(
                            table = %cfg.counter_table,
                            initial_value = cfg.initial_value,
                            "bootstrapping unversioned item into history"
                        );
                        let snapshot =
                            item::with_attribute(&existing, attr, item::counter_value(attr, cfg.initial_value)?);
                        writes.push(
                            WriteRequest::new(&cfg.table, snapshot).with_condition(Condition::not_exists(attr)),
                        );
                        cfg.initial_value
                    }
                };
                trace!(
                    version,
                    changed = ?item::non_key_attributes(item, &cfg.counter_key),
                    "advancing current item"
                );
                item::increment(attr, version)?
            }
            None => cfg.initial_value,
        };

        // Step 3: Same record goes to history and becomes current
        let version = item::counter_value(attr, next)?;
        let record = item::with_attribute(&item::merge([item, &cfg.counter_key]), attr, version.clone());

        writes.push(
            WriteRequest::new(&cfg.table, record.clone()).with_condition(Condition::not_exists(attr)),
        );
        writes.push(
            WriteRequest::new(&cfg.counter_table, record)
                .with_condition(Condition::not_exists(attr).or(Condition::not_equals(attr, version))),
        );

        Ok(WriteSet { writes, next })
    }
}
