//! Configuration for kvcounter
//!
//! Centralized counter configuration with sensible defaults.

use crate::error::{Error, Result};
use crate::item::Item;

/// Configuration shared by `PlainCounter` and `HistoryCounter`
///
/// The store handle is passed next to the config when a counter is built.
#[derive(Debug, Clone)]
pub struct CounterConfig {
    // -------------------------------------------------------------------------
    // Counter Location
    // -------------------------------------------------------------------------
    /// Table holding the counter.
    /// For `HistoryCounter` this is the table of current items.
    pub counter_table: String,

    /// Key of the record holding the counter
    pub counter_key: Item,

    /// Attribute holding the last issued value on the counter record.
    /// Only `PlainCounter` reads it; `HistoryCounter` keeps the version in
    /// `attribute` on the current item.
    pub counter_attribute: String,

    // -------------------------------------------------------------------------
    // Target Location
    // -------------------------------------------------------------------------
    /// Table receiving the numbered items.
    /// For `HistoryCounter` this is the history table.
    pub table: String,

    /// Attribute receiving the issued value on written items
    pub attribute: String,

    // -------------------------------------------------------------------------
    // Behavior
    // -------------------------------------------------------------------------
    /// First value issued for a fresh counter
    pub initial_value: u64,

    /// Commit writes independently instead of in one transaction.
    /// Partial application is possible; never use with concurrent callers.
    pub dangerously: bool,

    /// Copy the caller's attributes onto the counter record.
    /// `PlainCounter` only; `HistoryCounter` always keeps full items.
    pub copy_attributes: bool,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            counter_table: String::new(),
            counter_key: Item::new(),
            counter_attribute: "counter".to_string(),
            table: String::new(),
            attribute: "id".to_string(),
            initial_value: 1,
            dangerously: false,
            copy_attributes: false,
        }
    }
}

impl CounterConfig {
    /// Create a new config builder
    pub fn builder() -> CounterConfigBuilder {
        CounterConfigBuilder::default()
    }

    /// Reject configurations that cannot address a counter
    pub fn validate(&self) -> Result<()> {
        if self.counter_table.is_empty() {
            return Err(Error::Config("counter table must be set".to_string()));
        }
        if self.table.is_empty() {
            return Err(Error::Config("target table must be set".to_string()));
        }
        if self.counter_key.is_empty() {
            return Err(Error::Config("counter key must have at least one attribute".to_string()));
        }
        if self.counter_attribute.is_empty() || self.attribute.is_empty() {
            return Err(Error::Config("attribute names must not be empty".to_string()));
        }
        if self.initial_value == 0 {
            return Err(Error::Config("initial value must be positive".to_string()));
        }
        if i64::try_from(self.initial_value).is_err() {
            return Err(Error::Config(format!(
                "initial value {} is out of range",
                self.initial_value
            )));
        }
        Ok(())
    }
}

/// Builder for CounterConfig
#[derive(Default)]
pub struct CounterConfigBuilder {
    config: CounterConfig,
}

impl CounterConfigBuilder {
    /// Set the table holding the counter
    pub fn counter_table(mut self, name: impl Into<String>) -> Self {
        self.config.counter_table = name.into();
        self
    }

    /// Set the key of the counter record
    pub fn counter_key(mut self, key: Item) -> Self {
        self.config.counter_key = key;
        self
    }

    /// Set the counter attribute name
    pub fn counter_attribute(mut self, name: impl Into<String>) -> Self {
        self.config.counter_attribute = name.into();
        self
    }

    /// Set the target (or history) table
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.config.table = name.into();
        self
    }

    /// Set the attribute receiving issued values
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.config.attribute = name.into();
        self
    }

    /// Set the first value issued
    pub fn initial_value(mut self, value: u64) -> Self {
        self.config.initial_value = value;
        self
    }

    /// Commit without transactions (single writer / tests only)
    pub fn dangerously(mut self, enabled: bool) -> Self {
        self.config.dangerously = enabled;
        self
    }

    /// Copy caller attributes onto the counter record
    pub fn copy_attributes(mut self, enabled: bool) -> Self {
        self.config.copy_attributes = enabled;
        self
    }

    pub fn build(self) -> CounterConfig {
        self.config
    }
}
