//! Items and attribute values
//!
//! An item is an ordered attribute mapping. Everything the counters do to
//! items (addressing them, merging caller attributes with keys and counters,
//! reading counters back) is a pure function over these maps.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttributeValue {
    /// UTF-8 string
    S(String),

    /// Signed 64-bit number
    N(i64),

    /// Boolean
    Bool(bool),

    /// Explicit null
    Null,
}

/// A record: attribute name to value, ordered by name
pub type Item = BTreeMap<String, AttributeValue>;

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::N(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::S(s) => write!(f, "{s:?}"),
            AttributeValue::N(n) => write!(f, "{n}"),
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::S(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::S(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::N(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// Build an item from `(name, value)` pairs
pub fn item<K, V, I>(pairs: I) -> Item
where
    K: Into<String>,
    V: Into<AttributeValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Encode a counter value as an attribute value
pub fn counter_value(attribute: &str, value: u64) -> Result<AttributeValue> {
    i64::try_from(value)
        .map(AttributeValue::N)
        .map_err(|_| Error::InvalidCounter {
            attribute: attribute.to_string(),
            reason: format!("{value} does not fit in a signed 64-bit number"),
        })
}

/// Read the counter stored under `attribute`, if any
///
/// A present attribute must be a positive number.
pub fn read_counter(item: &Item, attribute: &str) -> Result<Option<u64>> {
    let Some(value) = item.get(attribute) else {
        return Ok(None);
    };

    match value {
        AttributeValue::N(n) if *n > 0 => Ok(Some(*n as u64)),
        AttributeValue::N(n) => Err(Error::InvalidCounter {
            attribute: attribute.to_string(),
            reason: format!("{n} is not positive"),
        }),
        other => Err(Error::InvalidCounter {
            attribute: attribute.to_string(),
            reason: format!("expected a number, found {other}"),
        }),
    }
}

/// Next counter after `current`
pub fn increment(attribute: &str, current: u64) -> Result<u64> {
    current.checked_add(1).ok_or_else(|| Error::InvalidCounter {
        attribute: attribute.to_string(),
        reason: "counter exhausted".to_string(),
    })
}

/// Merge layers left to right; later layers win on name collisions
pub fn merge<'a, I>(layers: I) -> Item
where
    I: IntoIterator<Item = &'a Item>,
{
    let mut merged = Item::new();
    for layer in layers {
        for (name, value) in layer {
            merged.insert(name.clone(), value.clone());
        }
    }
    merged
}

/// Copy of `item` with `attribute` set to `value`
pub fn with_attribute(item: &Item, attribute: &str, value: AttributeValue) -> Item {
    let mut out = item.clone();
    out.insert(attribute.to_string(), value);
    out
}

/// Extract the attributes named in `key_attributes` from `item`
///
/// Fails with `MissingKeyAttribute` if any of them is absent.
pub fn key_of<'a, I>(table: &str, item: &Item, key_attributes: I) -> Result<Item>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut key = Item::new();
    for name in key_attributes {
        let value = item.get(name).ok_or_else(|| Error::MissingKeyAttribute {
            table: table.to_string(),
            attribute: name.to_string(),
        })?;
        key.insert(name.to_string(), value.clone());
    }
    Ok(key)
}

/// Names of the attributes in `item` that are not part of `key`
pub fn non_key_attributes<'a>(item: &'a Item, key: &Item) -> Vec<&'a str> {
    item.keys()
        .filter(|name| !key.contains_key(name.as_str()))
        .map(String::as_str)
        .collect()
}

/// Keep only the named attributes
pub fn project(item: &Item, attributes: &[String]) -> Item {
    item.iter()
        .filter(|(name, _)| attributes.iter().any(|a| a == *name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
