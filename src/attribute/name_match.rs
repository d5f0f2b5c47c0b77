//! Name-pattern attribute source.

use std::collections::BTreeMap;

use tracing::debug;

use super::source::AttributeSource;
use super::BreakerAttribute;

/// [`AttributeSource`] that matches attributes by method name.
///
/// Names can be exact, or glob-style patterns of the forms `prefix*`,
/// `*suffix`, and `*substring*`. An exact entry always beats a pattern; among
/// matching patterns the longest pattern string wins. Type-level lookups
/// always miss, since name rules only ever describe methods.
#[derive(Debug, Default)]
pub struct NameMatchAttributeSource {
    rules: BTreeMap<String, BreakerAttribute>,
}

impl NameMatchAttributeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a name→attribute table, e.g. deserialized configuration.
    pub fn from_table(table: impl IntoIterator<Item = (String, BreakerAttribute)>) -> Self {
        let mut source = Self::new();
        for (name, attribute) in table {
            source.add_rule(name, attribute);
        }
        source
    }

    /// Register an attribute for a method name or name pattern.
    pub fn rule(mut self, name: impl Into<String>, attribute: BreakerAttribute) -> Self {
        self.add_rule(name.into(), attribute);
        self
    }

    fn add_rule(&mut self, name: String, attribute: BreakerAttribute) {
        debug!(rule = %name, attribute = %attribute, "adding circuit breaker method rule");
        self.rules.insert(name, attribute);
    }

    /// The configured rule table, for diagnostics.
    pub fn rules(&self) -> &BTreeMap<String, BreakerAttribute> {
        &self.rules
    }

    fn best_match(&self, method_name: &str) -> Option<&BreakerAttribute> {
        if let Some(attribute) = self.rules.get(method_name) {
            return Some(attribute);
        }

        let mut best: Option<(&str, &BreakerAttribute)> = None;
        for (pattern, attribute) in &self.rules {
            if simple_match(pattern, method_name)
                && best.map_or(true, |(current, _)| current.len() <= pattern.len())
            {
                best = Some((pattern, attribute));
            }
        }
        best.map(|(_, attribute)| attribute)
    }
}

impl AttributeSource for NameMatchAttributeSource {
    fn method_attribute(&self, _type_name: &str, method_name: &str) -> Option<BreakerAttribute> {
        self.best_match(method_name).cloned()
    }

    fn type_attribute(&self, _type_name: &str) -> Option<BreakerAttribute> {
        None
    }
}

/// Glob matching for the supported rule forms: equality, `xxx*`, `*xxx`,
/// `*xxx*`. A bare `*` matches every name.
fn simple_match(pattern: &str, name: &str) -> bool {
    if let Some(rest) = pattern.strip_prefix('*') {
        if let Some(middle) = rest.strip_suffix('*') {
            return name.contains(middle);
        }
        return name.ends_with(rest);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return name.starts_with(prefix);
    }
    pattern == name
}
