//! Dispatch pipeline: from a guarded call to a backing engine and back.
//!
//! The [`CircuitDispatcher`] ties the pieces together. For every call it
//! resolves the breaker attribute (cached), decides between bypass and
//! guarded execution, derives the [`BreakerSpec`], propagates properties
//! into the engine exactly once per breaker name, runs the call through the
//! engine, and interprets the outcome against the breaker's fallback
//! policy.
//!
//! Both entry points share this path: [`CircuitDispatcher::dispatch`] runs
//! it on the calling task, [`CircuitDispatcher::queue`] spawns it and
//! returns a cancelable [`DispatchHandle`].

pub mod placeholders;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::attribute::source::{AttributeResolver, AttributeSource};
use crate::attribute::BreakerAttribute;
use crate::engine::{BreakerSpec, CircuitEngine};
use crate::error::BoxError;
use crate::fallback::{Fallback, FallbackPolicy};
use crate::invoker::{CallContext, Invoker};
use crate::{Error, ErrorContext, Result};

use placeholders::{NoopResolver, PlaceholderResolver};

/// Routes guarded calls to the backing engine and applies fallback
/// policies. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct CircuitDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    engine: Arc<dyn CircuitEngine>,
    resolver: AttributeResolver,
    fallbacks: HashMap<String, Arc<dyn Fallback>>,
    placeholders: Arc<dyn PlaceholderResolver>,
    enabled: bool,
    /// Per-name cells serializing one-time breaker configuration.
    configured: Mutex<HashMap<String, Arc<OnceCell<()>>>>,
    breakers: Mutex<BTreeMap<String, BreakerSpec>>,
}

impl CircuitDispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Execute a guarded call on the current task.
    ///
    /// When no attribute resolves for the call site, or the dispatcher is
    /// disabled, the action runs directly without touching the engine.
    /// `T: Default` supplies the zero value for fail-silent fallbacks.
    pub async fn dispatch<T, F, Fut>(&self, context: CallContext, action: F) -> Result<T>
    where
        T: Default + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
    {
        let inner = &self.inner;

        if !inner.enabled {
            debug!(method = %context.method, "dispatcher disabled, proceeding unguarded");
            return bypass(action).await;
        }

        let resolved = inner
            .resolver
            .resolve(&context.method, context.target_type());
        let Some(attribute) = resolved else {
            debug!(method = %context.method, "no breaker attribute, proceeding unguarded");
            return bypass(action).await;
        };

        let attribute = inner.expand_attribute(&attribute);
        let invoker = Invoker::new(context.clone(), attribute, action);
        let attribute = Arc::clone(invoker.attribute());
        let spec = BreakerSpec::from_attribute(&attribute);
        let policy = FallbackPolicy::resolve(attribute.fallback_name(), &inner.fallbacks)?;

        inner.ensure_configured(&spec).await?;

        debug!(
            breaker = %spec.name,
            engine = %inner.engine.name(),
            "executing guarded call"
        );
        match inner.engine.execute(&spec, invoker).await {
            Ok(value) => value.downcast::<T>().map(|value| *value).map_err(|_| {
                Error::configuration_with_context(
                    "engine returned a value of an unexpected type",
                    ErrorContext::new()
                        .with_details(format!("breaker '{}'", spec.name))
                        .with_source("dispatcher"),
                )
            }),
            Err(err) => apply_fallback(&policy, err, &context, &spec),
        }
    }

    /// Execute a guarded call on a spawned task and return a handle.
    ///
    /// The handle can be awaited for the result or canceled; cancellation
    /// is cooperative and takes effect at the action's next await point.
    pub fn queue<T, F, Fut>(&self, context: CallContext, action: F) -> DispatchHandle<T>
    where
        T: Default + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
    {
        let dispatcher = self.clone();
        let handle = tokio::spawn(async move { dispatcher.dispatch(context, action).await });
        DispatchHandle { handle }
    }

    /// Specs of every breaker configured so far, in name order.
    pub fn configured_breakers(&self) -> Vec<BreakerSpec> {
        self.inner
            .breakers
            .lock()
            .expect("breaker registry poisoned")
            .values()
            .cloned()
            .collect()
    }
}

impl DispatcherInner {
    fn expand_attribute(&self, attribute: &Arc<BreakerAttribute>) -> Arc<BreakerAttribute> {
        if attribute.properties.is_empty() {
            return Arc::clone(attribute);
        }
        let mut expanded = (**attribute).clone();
        for value in expanded.properties.values_mut() {
            *value = placeholders::expand(value, self.placeholders.as_ref());
        }
        Arc::new(expanded)
    }

    /// Propagate a breaker's properties into the engine exactly once.
    ///
    /// Serialized per breaker name; concurrent first calls for the same
    /// name wait on the same cell, different names proceed independently.
    /// A failed configuration is not recorded and is retried by the next
    /// call.
    async fn ensure_configured(&self, spec: &BreakerSpec) -> Result<()> {
        let cell = {
            let mut configured = self.configured.lock().expect("configured set poisoned");
            configured
                .entry(spec.name.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };
        cell.get_or_try_init(|| async {
            debug!(
                breaker = %spec.name,
                group = %spec.group,
                pool = %spec.pool,
                "configuring circuit breaker"
            );
            self.engine.configure(spec).await?;
            self.breakers
                .lock()
                .expect("breaker registry poisoned")
                .insert(spec.name.clone(), spec.clone());
            Ok::<_, Error>(())
        })
        .await?;
        Ok(())
    }
}

/// Run the action without any engine involvement, keeping its outcome
/// indistinguishable from a direct call.
async fn bypass<T, F, Fut>(action: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, BoxError>>,
{
    match action().await {
        Ok(value) => Ok(value),
        Err(source) => match source.downcast::<Error>() {
            Ok(already) => Err(*already),
            Err(source) => Err(Error::Application { source }),
        },
    }
}

fn apply_fallback<T: Default + 'static>(
    policy: &FallbackPolicy,
    err: Error,
    context: &CallContext,
    spec: &BreakerSpec,
) -> Result<T> {
    // Configuration problems and cancellations are never absorbed.
    if matches!(err, Error::Configuration { .. } | Error::Canceled { .. }) {
        return Err(err);
    }

    match policy {
        FallbackPolicy::FailFast => Err(err.unwrapped()),
        FallbackPolicy::FailSilent => {
            debug!(breaker = %spec.name, %err, "fail-silent fallback absorbing failure");
            Ok(T::default())
        }
        FallbackPolicy::Custom(strategy) => {
            debug!(breaker = %spec.name, %err, "custom fallback absorbing failure");
            strategy
                .fallback(context)
                .downcast::<T>()
                .map(|value| *value)
                .map_err(|_| {
                    Error::configuration_with_context(
                        "fallback produced a value of the wrong type",
                        ErrorContext::new()
                            .with_field_path("properties.fallback")
                            .with_details(format!("breaker '{}'", spec.name))
                            .with_source("dispatcher"),
                    )
                })
        }
    }
}

/// Handle to a queued dispatch.
pub struct DispatchHandle<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T> DispatchHandle<T> {
    /// Abort the dispatch. Takes effect at the next await point of the
    /// running action; joining afterwards yields [`Error::Canceled`].
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Wait for the dispatched call to finish.
    pub async fn join(self) -> Result<T> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => {
                Err(Error::canceled("dispatch aborted before completion"))
            }
            Err(err) => Err(Error::application(err)),
        }
    }
}

/// Builder for [`CircuitDispatcher`].
pub struct DispatcherBuilder {
    engine: Option<Arc<dyn CircuitEngine>>,
    source: Option<Arc<dyn AttributeSource>>,
    public_only: bool,
    enabled: bool,
    fallbacks: HashMap<String, Arc<dyn Fallback>>,
    placeholders: Arc<dyn PlaceholderResolver>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            engine: None,
            source: None,
            public_only: true,
            enabled: true,
            fallbacks: HashMap::new(),
            placeholders: Arc::new(NoopResolver),
        }
    }

    pub fn engine(mut self, engine: Arc<dyn CircuitEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn attribute_source(mut self, source: Arc<dyn AttributeSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Whether only public methods are eligible for guarding (default true).
    pub fn public_only(mut self, public_only: bool) -> Self {
        self.public_only = public_only;
        self
    }

    /// A disabled dispatcher bypasses every call.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Register a custom fallback strategy under the name attributes refer
    /// to through their `fallback` property.
    pub fn fallback(mut self, name: impl Into<String>, strategy: Arc<dyn Fallback>) -> Self {
        self.fallbacks.insert(name.into(), strategy);
        self
    }

    pub fn placeholder_resolver(mut self, resolver: Arc<dyn PlaceholderResolver>) -> Self {
        self.placeholders = resolver;
        self
    }

    pub fn build(self) -> Result<CircuitDispatcher> {
        let engine = self.engine.ok_or_else(|| {
            Error::configuration_with_context(
                "dispatcher requires a backing engine",
                ErrorContext::new()
                    .with_field_path("engine")
                    .with_source("dispatcher_builder"),
            )
        })?;
        let source = self.source.ok_or_else(|| {
            Error::configuration_with_context(
                "dispatcher requires an attribute source",
                ErrorContext::new()
                    .with_field_path("attribute_source")
                    .with_source("dispatcher_builder"),
            )
        })?;
        Ok(CircuitDispatcher {
            inner: Arc::new(DispatcherInner {
                engine,
                resolver: AttributeResolver::new(source).with_public_only(self.public_only),
                fallbacks: self.fallbacks,
                placeholders: self.placeholders,
                enabled: self.enabled,
                configured: Mutex::new(HashMap::new()),
                breakers: Mutex::new(BTreeMap::new()),
            }),
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
