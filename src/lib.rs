//! # kvcounter
//!
//! Collision-free auto-increment counters over a key-value store that only
//! offers conditional writes and atomic multi-item transactions:
//! - `PlainCounter`: a counter record handing out values to new items
//! - `HistoryCounter`: a versioned current item plus an append-only history
//! - Optimistic concurrency: read, compute, conditionally commit, retry on
//!   conflict. No in-process locks, no coordinator.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      put(item)                               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌───────────────┐
//!   │PlainCounter │          │HistoryCounter │   NextWriteSet:
//!   │             │          │  (bootstrap)  │   read + compute
//!   └──────┬──────┘          └───────┬───────┘
//!          └────────────┬────────────┘
//!                       ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  RetryingWriter                              │
//! │     commit (transaction | parallel), retry on conflict       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  KeyValueStore                               │
//! │        get / put / transact_write with conditions            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use kvcounter::item::item;
//! use kvcounter::store::{KeySchema, MemoryStore};
//! use kvcounter::{CounterConfig, PlainCounter};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> kvcounter::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! store.create_table("autoincrement", KeySchema::partition("tableName"))?;
//! store.create_table("widgets", KeySchema::partition("widgetID"))?;
//!
//! let config = CounterConfig::builder()
//!     .counter_table("autoincrement")
//!     .counter_key(item([("tableName", "widgets")]))
//!     .table("widgets")
//!     .attribute("widgetID")
//!     .build();
//! let counter = PlainCounter::new(store, config)?;
//!
//! assert_eq!(counter.put(item([("name", "spoon")])).await?, 1);
//! assert_eq!(counter.put(item([("name", "fork")])).await?, 2);
//! assert_eq!(counter.get_last().await?, Some(2));
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod item;
pub mod condition;
pub mod store;
pub mod writer;
pub mod plain;
pub mod history;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Error, Result};
pub use config::CounterConfig;
pub use item::{AttributeValue, Item};
pub use plain::PlainCounter;
pub use history::HistoryCounter;
pub use writer::{CommitStrategy, NextWriteSet, RetryingWriter, WriteSet};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvcounter
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
