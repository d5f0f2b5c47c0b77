//! Backing circuit-breaker engines.
//!
//! An engine owns the actual breaking semantics: isolation, timeouts,
//! open/closed state. This crate only defines the boundary and ships the
//! trivial implementations used for wiring:
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CircuitEngine`] | Boundary trait any backing engine implements |
//! | [`BreakerSpec`] | Execution spec handed to the engine per breaker |
//! | [`NoOpEngine`](noop::NoOpEngine) | Pass-through, no breaking at all |
//! | [`CompositeEngine`](composite::CompositeEngine) | Routes to named sub-engines |

pub mod composite;
pub mod noop;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::attribute::{BreakerAttribute, PROP_GROUP_KEY, PROP_THREAD_POOL};
use crate::invoker::{BoxedValue, Invoker};
use crate::Result;

/// Execution spec for one breaker: identity, grouping, isolation key, and
/// the engine-specific property map.
///
/// Group and pool default to the breaker name when the attribute does not
/// override them through the `group_key` / `thread_pool` properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSpec {
    /// Breaker instance name, never empty.
    pub name: String,
    /// Logical group reported to the engine (dashboards, aggregation).
    pub group: String,
    /// Isolation pool key.
    pub pool: String,
    /// Logical name of the engine that should run this breaker.
    pub engine: String,
    /// Engine-specific tuning, passed through verbatim.
    pub properties: HashMap<String, String>,
}

impl BreakerSpec {
    pub fn from_attribute(attribute: &BreakerAttribute) -> Self {
        let group = attribute
            .properties
            .get(PROP_GROUP_KEY)
            .cloned()
            .unwrap_or_else(|| attribute.name.clone());
        let pool = attribute
            .properties
            .get(PROP_THREAD_POOL)
            .cloned()
            .unwrap_or_else(|| attribute.name.clone());
        Self {
            name: attribute.name.clone(),
            group,
            pool,
            engine: attribute.manager().to_owned(),
            properties: attribute.properties.clone(),
        }
    }
}

/// Boundary implemented by any pluggable circuit-breaker engine.
///
/// The engine receives the full [`BreakerSpec`] and the invoker for the
/// call. It must report failures through the crate's categorized errors:
/// an application error when the guarded action itself failed, and
/// timeout / overload / open-breaker conditions as their own variants so
/// the dispatcher can apply fallback policies uniformly.
#[async_trait]
pub trait CircuitEngine: Send + Sync {
    /// Implementation name, for logs.
    fn name(&self) -> &'static str;

    /// One-time property propagation for a breaker.
    ///
    /// The dispatcher calls this exactly once per breaker name, before the
    /// first execution under that name, serialized per name.
    async fn configure(&self, _spec: &BreakerSpec) -> Result<()> {
        Ok(())
    }

    /// Run the invoker's action under this engine's breaker semantics.
    async fn execute(&self, spec: &BreakerSpec, invoker: Invoker) -> Result<BoxedValue>;
}
