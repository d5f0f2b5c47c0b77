//! Composite engine: routes each breaker to a named sub-engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use tracing::debug;

use super::noop::NoOpEngine;
use super::{BreakerSpec, CircuitEngine};
use crate::invoker::{BoxedValue, Invoker};
use crate::{Error, ErrorContext, Result};

static FALLBACK_NOOP: Lazy<Arc<NoOpEngine>> = Lazy::new(|| Arc::new(NoOpEngine::new()));

/// Engine that fans out to named sub-engines.
///
/// The registry is an explicit name→engine map built once at startup; a
/// breaker selects its engine through the attribute's manager name. A
/// missing entry is a configuration error unless `fallback_to_noop` is set,
/// in which case the call passes through unbroken.
pub struct CompositeEngine {
    engines: BTreeMap<String, Arc<dyn CircuitEngine>>,
    fallback_to_noop: bool,
}

impl CompositeEngine {
    pub fn builder() -> CompositeEngineBuilder {
        CompositeEngineBuilder::new()
    }

    /// Registered engine names, in stable order.
    pub fn engine_names(&self) -> Vec<&str> {
        self.engines.keys().map(String::as_str).collect()
    }

    fn select(&self, spec: &BreakerSpec) -> Result<Arc<dyn CircuitEngine>> {
        if let Some(engine) = self.engines.get(&spec.engine) {
            return Ok(Arc::clone(engine));
        }
        if self.fallback_to_noop {
            debug!(
                breaker = %spec.name,
                engine = %spec.engine,
                "no engine registered, falling back to pass-through"
            );
            let noop: Arc<dyn CircuitEngine> = FALLBACK_NOOP.clone();
            return Ok(noop);
        }
        Err(Error::configuration_with_context(
            format!("no engine registered under '{}'", spec.engine),
            ErrorContext::new()
                .with_field_path("manager_name")
                .with_details(format!("breaker '{}'", spec.name))
                .with_source("composite_engine"),
        ))
    }
}

#[async_trait]
impl CircuitEngine for CompositeEngine {
    fn name(&self) -> &'static str {
        "composite"
    }

    async fn configure(&self, spec: &BreakerSpec) -> Result<()> {
        self.select(spec)?.configure(spec).await
    }

    async fn execute(&self, spec: &BreakerSpec, invoker: Invoker) -> Result<BoxedValue> {
        self.select(spec)?.execute(spec, invoker).await
    }
}

/// Builder for [`CompositeEngine`].
pub struct CompositeEngineBuilder {
    engines: Vec<(String, Arc<dyn CircuitEngine>)>,
    fallback_to_noop: bool,
}

impl CompositeEngineBuilder {
    pub fn new() -> Self {
        Self {
            engines: Vec::new(),
            fallback_to_noop: false,
        }
    }

    pub fn engine(mut self, name: impl Into<String>, engine: Arc<dyn CircuitEngine>) -> Self {
        self.engines.push((name.into(), engine));
        self
    }

    /// Route breakers with no matching engine to a pass-through no-op
    /// instead of failing.
    pub fn fallback_to_noop(mut self, fallback: bool) -> Self {
        self.fallback_to_noop = fallback;
        self
    }

    pub fn build(self) -> Result<CompositeEngine> {
        let mut engines = BTreeMap::new();
        for (name, engine) in self.engines {
            if engines.insert(name.clone(), engine).is_some() {
                return Err(Error::configuration_with_context(
                    format!("engine '{}' registered twice", name),
                    ErrorContext::new()
                        .with_field_path("engines")
                        .with_source("composite_engine"),
                ));
            }
        }
        Ok(CompositeEngine {
            engines,
            fallback_to_noop: self.fallback_to_noop,
        })
    }
}

impl Default for CompositeEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::key::MethodDescriptor;
    use crate::attribute::BreakerAttribute;
    use crate::error::BoxError;
    use crate::invoker::CallContext;

    fn invoker(attr: &Arc<BreakerAttribute>) -> Invoker {
        Invoker::new(
            CallContext::new(MethodDescriptor::new("app::Foo", "get")),
            Arc::clone(attr),
            || async { Ok::<_, BoxError>("ok".to_owned()) },
        )
    }

    #[tokio::test]
    async fn test_routes_by_manager_name() {
        let composite = CompositeEngine::builder()
            .engine("remote", Arc::new(NoOpEngine::new()))
            .build()
            .unwrap();

        let attr = Arc::new(BreakerAttribute::new("G").with_manager("remote"));
        let spec = BreakerSpec::from_attribute(&attr);
        let value = composite.execute(&spec, invoker(&attr)).await.unwrap();
        assert_eq!(*value.downcast::<String>().unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_missing_engine_is_configuration_error() {
        let composite = CompositeEngine::builder().build().unwrap();
        let attr = Arc::new(BreakerAttribute::new("G").with_manager("remote"));
        let spec = BreakerSpec::from_attribute(&attr);

        match composite.execute(&spec, invoker(&attr)).await.unwrap_err() {
            Error::Configuration { message, .. } => assert!(message.contains("remote")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_noop_fallback_passes_through() {
        let composite = CompositeEngine::builder()
            .fallback_to_noop(true)
            .build()
            .unwrap();
        let attr = Arc::new(BreakerAttribute::new("G").with_manager("missing"));
        let spec = BreakerSpec::from_attribute(&attr);

        let value = composite.execute(&spec, invoker(&attr)).await.unwrap();
        assert_eq!(*value.downcast::<String>().unwrap(), "ok");
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let result = CompositeEngine::builder()
            .engine("remote", Arc::new(NoOpEngine::new()))
            .engine("remote", Arc::new(NoOpEngine::new()))
            .build();
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }
}
