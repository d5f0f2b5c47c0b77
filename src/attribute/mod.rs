//! Breaker attributes and their resolution.
//!
//! An attribute is the resolved configuration governing one guarded call
//! site: the breaker name, engine-specific tuning properties, and the
//! logical name of the backing engine. Attributes are produced by an
//! [`AttributeSource`](source::AttributeSource) (the contract a
//! configuration layer implements) and resolved per call site by the
//! caching [`AttributeResolver`](source::AttributeResolver).

pub mod key;
pub mod name_match;
pub mod source;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Logical engine name used when an attribute does not declare one.
pub const DEFAULT_ENGINE: &str = "default";

/// Property key selecting the breaker group reported to the engine.
pub const PROP_GROUP_KEY: &str = "group_key";

/// Property key selecting the isolation pool reported to the engine.
pub const PROP_THREAD_POOL: &str = "thread_pool";

/// Property key naming the fallback strategy for the guarded call.
pub const PROP_FALLBACK: &str = "fallback";

/// Resolved configuration governing one guarded call site.
///
/// Immutable after resolution. The name may be empty while the attribute
/// still lives in a configuration table; the invoker defaults it to the
/// call's fully-qualified signature, so a dispatched call always carries a
/// non-empty breaker name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakerAttribute {
    #[serde(default)]
    pub name: String,
    /// Engine-specific tuning, passed through verbatim (order irrelevant).
    #[serde(default)]
    pub properties: HashMap<String, String>,
    /// Logical name of the backing engine, [`DEFAULT_ENGINE`] when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_name: Option<String>,
}

impl BreakerAttribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
            manager_name: None,
        }
    }

    /// An attribute with no name yet; the invoker fills in the signature.
    pub fn unnamed() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn with_manager(mut self, manager: impl Into<String>) -> Self {
        self.manager_name = Some(manager.into());
        self
    }

    /// Fallback strategy name, if one is configured.
    pub fn fallback_name(&self) -> Option<&str> {
        self.properties.get(PROP_FALLBACK).map(String::as_str)
    }

    /// Logical engine name, defaulted.
    pub fn manager(&self) -> &str {
        self.manager_name.as_deref().unwrap_or(DEFAULT_ENGINE)
    }
}

// Identity is the resolved name plus properties; the manager name only
// selects where the breaker runs.
impl PartialEq for BreakerAttribute {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.properties == other.properties
    }
}

impl Eq for BreakerAttribute {}

impl std::fmt::Display for BreakerAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.properties.is_empty() {
            let mut keys: Vec<_> = self.properties.iter().collect();
            keys.sort();
            write!(f, " {{")?;
            for (i, (k, v)) in keys.into_iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}={}", k, v)?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}
