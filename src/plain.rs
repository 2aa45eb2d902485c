//! Plain counter
//!
//! A counter kept on its own record, independent of the items it numbers.
//!
//! ## Layout
//! ```text
//!   counter_table                      table
//!   ┌──────────────────────────┐       ┌──────────────────────────┐
//!   │ {counter_key..,          │       │ {attribute: 1, ..item}   │
//!   │  counter_attribute: N}   │       │ {attribute: 2, ..item}   │
//!   └──────────────────────────┘       │ ...                      │
//!                                      │ {attribute: N, ..item}   │
//!                                      └──────────────────────────┘
//! ```
//!
//! ## Write set
//! 1. Counter record with `counter_attribute = next`, guarded by
//!    `attribute_not_exists(counter)` on a fresh counter or
//!    `counter = previous` otherwise
//! 2. Target item with `attribute = next`, guarded by
//!    `attribute_not_exists(attribute)` so an issued value is never reused

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::condition::Condition;
use crate::config::CounterConfig;
use crate::error::Result;
use crate::item::{self, Item};
use crate::store::{KeyValueStore, WriteRequest};
use crate::writer::{CommitStrategy, NextWriteSet, RetryingWriter, WriteSet};

/// Auto-increment counter stored on a dedicated counter record
pub struct PlainCounter<S: ?Sized> {
    config: CounterConfig,
    writer: RetryingWriter<S>,
}

impl<S: KeyValueStore + ?Sized> PlainCounter<S> {
    /// Create a counter over `store`
    ///
    /// Fails if the config cannot address a counter. No store call is made.
    pub fn new(store: Arc<S>, config: CounterConfig) -> Result<Self> {
        config.validate()?;
        let writer = RetryingWriter::new(store, CommitStrategy::from_dangerously(config.dangerously));
        Ok(Self { config, writer })
    }

    /// Write `item` under the next value and return that value
    ///
    /// Any `attribute` already present on `item` is overwritten.
    pub async fn put(&self, item: Item) -> Result<u64> {
        self.writer.put(self, &item).await
    }

    /// Last issued value, `None` before the first `put`
    pub async fn get_last(&self) -> Result<Option<u64>> {
        let projection = [self.config.counter_attribute.clone()];
        let record = self
            .writer
            .store()
            .get(&self.config.counter_table, &self.config.counter_key, Some(projection.as_slice()))
            .await?;

        match record {
            Some(record) => item::read_counter(&record, &self.config.counter_attribute),
            None => Ok(None),
        }
    }

    /// Target item numbered `value`, if one exists
    async fn fetch_target(&self, value: u64) -> Result<Option<Item>> {
        let key = Item::from([(
            self.config.attribute.clone(),
            item::counter_value(&self.config.attribute, value)?,
        )]);
        self.writer.store().get(&self.config.table, &key, None).await
    }

    fn counter_record(&self, item: &Item, next: u64) -> Result<Item> {
        let cfg = &self.config;
        let base = if cfg.copy_attributes {
            item::merge([item, &cfg.counter_key])
        } else {
            cfg.counter_key.clone()
        };
        Ok(item::with_attribute(
            &base,
            &cfg.counter_attribute,
            item::counter_value(&cfg.counter_attribute, next)?,
        ))
    }
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> NextWriteSet for PlainCounter<S> {
    async fn next(&self, item: &Item) -> Result<WriteSet> {
        let cfg = &self.config;
        let mut writes = Vec::with_capacity(3);

        // Step 1: Read the counter and pick the guard for advancing it
        let (next, counter_condition) = match self.get_last().await? {
            Some(current) => (
                item::increment(&cfg.counter_attribute, current)?,
                Condition::equals(
                    &cfg.counter_attribute,
                    item::counter_value(&cfg.counter_attribute, current)?,
                ),
            ),
            None => {
                let existing = if cfg.copy_attributes {
                    self.fetch_target(cfg.initial_value).await?
                } else {
                    None
                };

                match existing {
                    // Seed the counter at the pre-existing item and advance past it
                    Some(existing) => {
                        debug!(
                            table = %cfg.table,
                            initial_value = cfg.initial_value,
                            "bootstrapping counter from existing item"
                        );
                        let pinned = item::counter_value(&cfg.attribute, cfg.initial_value)?;
                        writes.push(
                            WriteRequest::new(&cfg.table, existing)
                                .with_condition(Condition::equals(&cfg.attribute, pinned)),
                        );
                        (
                            item::increment(&cfg.counter_attribute, cfg.initial_value)?,
                            Condition::not_exists(&cfg.counter_attribute),
                        )
                    }
                    None => (cfg.initial_value, Condition::not_exists(&cfg.counter_attribute)),
                }
            }
        };

        // Step 2: Advance the counter
        writes.push(
            WriteRequest::new(&cfg.counter_table, self.counter_record(item, next)?)
                .with_condition(counter_condition),
        );

        // Step 3: Insert the numbered item
        let target = item::with_attribute(item, &cfg.attribute, item::counter_value(&cfg.attribute, next)?);
        writes.push(
            WriteRequest::new(&cfg.table, target).with_condition(Condition::not_exists(&cfg.attribute)),
        );

        Ok(WriteSet { writes, next })
    }
}
