//! Pass-through engine.

use async_trait::async_trait;

use super::{BreakerSpec, CircuitEngine};
use crate::invoker::{BoxedValue, Invoker};
use crate::Result;

/// Engine that performs no circuit breaking at all: every execution passes
/// straight through to the invoker. Useful for disabling breaking and as
/// the composite engine's fallback for declarations without a backing
/// engine.
#[derive(Debug, Default)]
pub struct NoOpEngine;

impl NoOpEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CircuitEngine for NoOpEngine {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn execute(&self, _spec: &BreakerSpec, invoker: Invoker) -> Result<BoxedValue> {
        invoker.invoke().await
    }
}
