//! Fallback policies applied when an engine reports failure.

use std::collections::HashMap;
use std::sync::Arc;

use crate::invoker::{BoxedValue, CallContext};
use crate::{Error, ErrorContext, Result};

/// Strategy name resolving to [`FallbackPolicy::FailFast`].
pub const FAIL_FAST: &str = "fail_fast";

/// Strategy name resolving to [`FallbackPolicy::FailSilent`].
pub const FAIL_SILENT: &str = "fail_silent";

/// User-supplied fallback strategy.
///
/// Produces the substitute value for a failed guarded call. The value is
/// type-erased; it must match the call's declared return type or the
/// dispatcher reports a configuration error. Panics inside a fallback are
/// not caught.
pub trait Fallback: Send + Sync {
    fn fallback(&self, context: &CallContext) -> BoxedValue;
}

/// Adapter turning a closure into a [`Fallback`].
pub struct FallbackFn<F>(pub F);

impl<F, T> Fallback for FallbackFn<F>
where
    F: Fn(&CallContext) -> T + Send + Sync,
    T: Send + 'static,
{
    fn fallback(&self, context: &CallContext) -> BoxedValue {
        Box::new((self.0)(context))
    }
}

/// Fallback behavior for one breaker, chosen at spec-build time from the
/// attribute's `fallback` property.
#[derive(Clone)]
pub enum FallbackPolicy {
    /// Re-raise the engine failure; nothing is swallowed. The default.
    FailFast,
    /// Swallow the failure and return the return type's zero value.
    FailSilent,
    /// Substitute the value produced by a registered strategy.
    Custom(Arc<dyn Fallback>),
}

impl FallbackPolicy {
    /// Resolve a strategy name against the registered custom strategies.
    ///
    /// No name means fail-fast. An unrecognized name is a configuration
    /// error, surfaced at dispatch time.
    pub fn resolve(
        name: Option<&str>,
        registry: &HashMap<String, Arc<dyn Fallback>>,
    ) -> Result<Self> {
        match name {
            None => Ok(FallbackPolicy::FailFast),
            Some(FAIL_FAST) => Ok(FallbackPolicy::FailFast),
            Some(FAIL_SILENT) => Ok(FallbackPolicy::FailSilent),
            Some(custom) => registry
                .get(custom)
                .cloned()
                .map(FallbackPolicy::Custom)
                .ok_or_else(|| {
                    Error::configuration_with_context(
                        format!("unknown fallback strategy '{}'", custom),
                        ErrorContext::new()
                            .with_field_path("properties.fallback")
                            .with_source("dispatcher"),
                    )
                }),
        }
    }
}

impl std::fmt::Debug for FallbackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackPolicy::FailFast => f.write_str("FailFast"),
            FallbackPolicy::FailSilent => f.write_str("FailSilent"),
            FallbackPolicy::Custom(_) => f.write_str("Custom"),
        }
    }
}
