//! Write conditions
//!
//! A condition is a predicate over the persisted item a write would replace.
//! The store evaluates it atomically at commit time; the counters only build
//! them.

use std::fmt;

use crate::item::{AttributeValue, Item};

/// Predicate over attribute existence and equality
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    AttributeExists(String),
    AttributeNotExists(String),
    Equals(String, AttributeValue),
    NotEquals(String, AttributeValue),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    pub fn exists(attribute: impl Into<String>) -> Self {
        Condition::AttributeExists(attribute.into())
    }

    pub fn not_exists(attribute: impl Into<String>) -> Self {
        Condition::AttributeNotExists(attribute.into())
    }

    pub fn equals(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Condition::Equals(attribute.into(), value.into())
    }

    pub fn not_equals(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Condition::NotEquals(attribute.into(), value.into())
    }

    pub fn and(self, other: Condition) -> Self {
        Condition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Self {
        Condition::Or(Box::new(self), Box::new(other))
    }

    /// Evaluate against the currently persisted item (`None` if absent)
    ///
    /// A missing item has no attributes: existence checks fail, equality
    /// fails and inequality holds.
    pub fn evaluate(&self, current: Option<&Item>) -> bool {
        let lookup = |name: &str| current.and_then(|item| item.get(name));

        match self {
            Condition::AttributeExists(name) => lookup(name).is_some(),
            Condition::AttributeNotExists(name) => lookup(name).is_none(),
            Condition::Equals(name, value) => lookup(name) == Some(value),
            Condition::NotEquals(name, value) => lookup(name) != Some(value),
            Condition::And(a, b) => a.evaluate(current) && b.evaluate(current),
            Condition::Or(a, b) => a.evaluate(current) || b.evaluate(current),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::AttributeExists(name) => write!(f, "attribute_exists({name})"),
            Condition::AttributeNotExists(name) => write!(f, "attribute_not_exists({name})"),
            Condition::Equals(name, value) => write!(f, "{name} = {value}"),
            Condition::NotEquals(name, value) => write!(f, "{name} <> {value}"),
            Condition::And(a, b) => write!(f, "({a}) AND ({b})"),
            Condition::Or(a, b) => write!(f, "({a}) OR ({b})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::item;

    #[test]
    fn test_not_exists_on_missing_item() {
        assert!(Condition::not_exists("counter").evaluate(None));
        assert!(!Condition::exists("counter").evaluate(None));
    }

    #[test]
    fn test_equality() {
        let current = item([("counter", 3i64)]);
        assert!(Condition::equals("counter", 3i64).evaluate(Some(&current)));
        assert!(!Condition::equals("counter", 4i64).evaluate(Some(&current)));
        assert!(Condition::not_equals("counter", 4i64).evaluate(Some(&current)));
        assert!(!Condition::equals("counter", 3i64).evaluate(None));
    }

    #[test]
    fn test_or_composition() {
        let cond = Condition::not_exists("version").or(Condition::not_equals("version", 2i64));
        assert!(cond.evaluate(None));
        assert!(cond.evaluate(Some(&item([("version", 1i64)]))));
        assert!(!cond.evaluate(Some(&item([("version", 2i64)]))));
    }

    #[test]
    fn test_and_composition() {
        let cond = Condition::exists("a").and(Condition::not_exists("b"));
        assert!(cond.evaluate(Some(&item([("a", 1i64)]))));
        assert!(!cond.evaluate(Some(&item([("a", 1i64), ("b", 2i64)]))));
    }

    #[test]
    fn test_display() {
        let cond = Condition::not_exists("version").or(Condition::not_equals("version", 2i64));
        assert_eq!(cond.to_string(), "(attribute_not_exists(version)) OR (version <> 2)");
    }
}
