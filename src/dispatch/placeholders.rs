//! Placeholder expansion for attribute property values.
//!
//! Attribute tables written by a configuration layer may reference
//! deployment-specific values as `${key}`. The dispatcher expands every
//! property value through a [`PlaceholderResolver`] before the breaker is
//! configured. Unknown keys are left in place.

use std::collections::HashMap;

/// Supplies values for `${key}` references in property values.
pub trait PlaceholderResolver: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Resolver that never substitutes anything. The default.
#[derive(Debug, Default)]
pub struct NoopResolver;

impl PlaceholderResolver for NoopResolver {
    fn lookup(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Resolver backed by an explicit key→value map.
#[derive(Debug, Default)]
pub struct MapResolver {
    values: HashMap<String, String>,
}

impl MapResolver {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl PlaceholderResolver for MapResolver {
    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Expand `${key}` references in a single value.
pub(crate) fn expand(value: &str, resolver: &dyn PlaceholderResolver) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        match tail.find('}') {
            Some(end) => {
                let key = &tail[..end];
                match resolver.lookup(key) {
                    Some(replacement) => out.push_str(&replacement),
                    None => out.push_str(&rest[start..start + end + 3]),
                }
                rest = &tail[end + 1..];
            }
            None => {
                // unterminated reference, keep verbatim
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
