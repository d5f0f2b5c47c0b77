//! Uniform wrapper around one guarded call.
//!
//! The interception layer describes a call with a [`CallContext`] and hands
//! the dispatch layer an [`Invoker`]: context, resolved attribute, and the
//! erased async action that runs the real method body. Invokers are built
//! per call and consumed by executing them.

use std::any::Any;
use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::attribute::key::MethodDescriptor;
use crate::attribute::BreakerAttribute;
use crate::error::BoxError;
use crate::{Error, Result};

/// Type-erased return value of a guarded call.
pub type BoxedValue = Box<dyn Any + Send>;

type ErasedAction = Box<dyn FnOnce() -> BoxFuture<'static, std::result::Result<BoxedValue, BoxError>> + Send>;

/// Per-call context: target, method identity, and arguments.
///
/// Arguments travel as JSON values so engines and fallback strategies can
/// introspect them without knowing concrete types; callers that don't need
/// introspection leave them empty.
#[derive(Clone)]
pub struct CallContext {
    target: Option<Arc<dyn Any + Send + Sync>>,
    pub target_type: Option<Cow<'static, str>>,
    pub method: MethodDescriptor,
    pub args: Vec<serde_json::Value>,
}

impl CallContext {
    pub fn new(method: MethodDescriptor) -> Self {
        Self {
            target: None,
            target_type: None,
            method,
            args: Vec::new(),
        }
    }

    /// Attach the target object; its type path becomes the target type.
    pub fn with_target<T: Any + Send + Sync>(mut self, target: Arc<T>) -> Self {
        self.target_type = Some(Cow::Borrowed(std::any::type_name::<T>()));
        self.target = Some(target);
        self
    }

    /// Name the target type without carrying the object.
    pub fn with_target_type(mut self, type_name: impl Into<Cow<'static, str>>) -> Self {
        self.target_type = Some(type_name.into());
        self
    }

    pub fn with_args(mut self, args: Vec<serde_json::Value>) -> Self {
        self.args = args;
        self
    }

    /// Downcast the target object, when one was attached.
    pub fn target_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.target.clone()?.downcast::<T>().ok()
    }

    pub fn target_type(&self) -> Option<&str> {
        self.target_type.as_deref()
    }

    /// The fully-qualified signature used as a breaker name when the
    /// attribute does not declare one.
    pub fn default_guard_name(&self) -> String {
        self.method.signature_on(self.target_type())
    }
}

impl std::fmt::Debug for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("target_type", &self.target_type)
            .field("method", &self.method)
            .field("args", &self.args)
            .finish()
    }
}

/// One guarded call, ready for an engine to run.
///
/// Construction pins the resolved attribute, defaulting an empty name to the
/// call's fully-qualified signature so every guarded call carries a
/// non-empty breaker name.
pub struct Invoker {
    context: CallContext,
    attribute: Arc<BreakerAttribute>,
    action: ErasedAction,
}

impl Invoker {
    pub fn new<T, F, Fut>(context: CallContext, attribute: Arc<BreakerAttribute>, action: F) -> Self
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
    {
        let attribute = if attribute.name.is_empty() {
            let mut named = (*attribute).clone();
            named.name = context.default_guard_name();
            Arc::new(named)
        } else {
            attribute
        };
        let action: ErasedAction = Box::new(move || {
            action()
                .map(|result| result.map(|value| Box::new(value) as BoxedValue))
                .boxed()
        });
        Self {
            context,
            attribute,
            action,
        }
    }

    pub fn context(&self) -> &CallContext {
        &self.context
    }

    /// The resolved attribute; the name is guaranteed non-empty.
    pub fn attribute(&self) -> &Arc<BreakerAttribute> {
        &self.attribute
    }

    /// Run the real method body.
    ///
    /// Failures surface as [`Error::Application`] wrapping the original
    /// error; an error that is already categorized passes through unchanged
    /// so it is never double-wrapped.
    pub async fn invoke(self) -> Result<BoxedValue> {
        match (self.action)().await {
            Ok(value) => Ok(value),
            Err(source) => match source.downcast::<Error>() {
                Ok(already) => Err(*already),
                Err(source) => Err(Error::Application { source }),
            },
        }
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("context", &self.context)
            .field("attribute", &self.attribute)
            .finish()
    }
}
