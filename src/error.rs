use thiserror::Error;

/// Boxed source error raised by a guarded call.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Configuration key or attribute field that caused the error (e.g., "properties.fallback")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected value, offending name)
    pub details: Option<String>,
    /// Source of the error (e.g., "composite_engine", "dispatcher")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Unified error type for the dispatch pipeline.
///
/// Engine-reported failures keep their category (timeout, overload, open
/// breaker) so callers and fallback policies can tell them apart from the
/// guarded method's own failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// The guarded method itself failed. Wraps the original error exactly
    /// once; callers can downcast `source` to recover the concrete type.
    #[error("Guarded call failed: {source}")]
    Application {
        #[source]
        source: BoxError,
    },

    #[error("Circuit timeout: {message}")]
    Timeout { message: String },

    #[error("Circuit overloaded: {message}")]
    Overload { message: String },

    #[error("Circuit open: {message}")]
    BreakerOpen { message: String },

    #[error("Dispatch canceled: {message}")]
    Canceled { message: String },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Wrap a failure raised by the guarded method.
    pub fn application(source: impl Into<BoxError>) -> Self {
        Error::Application {
            source: source.into(),
        }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Error::Timeout {
            message: msg.into(),
        }
    }

    pub fn overload(msg: impl Into<String>) -> Self {
        Error::Overload {
            message: msg.into(),
        }
    }

    pub fn breaker_open(msg: impl Into<String>) -> Self {
        Error::BreakerOpen {
            message: msg.into(),
        }
    }

    pub fn canceled(msg: impl Into<String>) -> Self {
        Error::Canceled {
            message: msg.into(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }

    /// True for failures reported by the backing engine rather than the
    /// guarded method: timeout, overload, open breaker.
    pub fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Overload { .. } | Error::BreakerOpen { .. }
        )
    }

    /// Remove one level of incidental wrapping.
    ///
    /// Engines occasionally re-wrap an already categorized error when
    /// funneling it through their own failure path. Callers should see the
    /// innermost categorized error, not the wrapper.
    pub fn unwrapped(self) -> Error {
        match self {
            Error::Application { source } => match source.downcast::<Error>() {
                Ok(inner) => *inner,
                Err(source) => Error::Application { source },
            },
            other => other,
        }
    }

    /// Borrow the original error raised by the guarded method, if this is an
    /// application failure.
    pub fn application_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Application { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}
