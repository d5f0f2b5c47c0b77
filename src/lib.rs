//! # callguard
//!
//! Declarative call-level circuit breaking with pluggable backing engines.
//!
//! ## Overview
//!
//! Callers describe guarded call sites through an attribute source; the
//! dispatcher resolves which breaker configuration applies to each call,
//! wraps the call into a uniform invoker, routes it to a backing
//! circuit-breaker engine, and applies a fallback policy when the engine
//! reports failure. The breaker semantics themselves (isolation, timeouts,
//! open/closed state) live behind the [`CircuitEngine`] trait and are
//! supplied by the embedding application.
//!
//! ## Core Philosophy
//!
//! - **Declarative**: call sites are guarded by configuration, not by code
//!   at the call site
//! - **Engine-Agnostic**: any breaker implementation plugs in behind one
//!   narrow trait
//! - **Resolution-Cached**: the attribute for a call site is computed once
//!   and served from a concurrent cache forever after
//! - **Typed Failures**: timeout, overload, and open-breaker conditions are
//!   first-class errors, never folded into a generic failure
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use callguard::{
//!     BreakerAttribute, CallContext, CircuitDispatcher, MethodDescriptor,
//!     NoOpEngine, StaticAttributeSource,
//! };
//!
//! #[tokio::main]
//! async fn main() -> callguard::Result<()> {
//!     let source = StaticAttributeSource::new().method(
//!         "app::Inventory",
//!         "find",
//!         BreakerAttribute::new("InventoryFind"),
//!     );
//!     let dispatcher = CircuitDispatcher::builder()
//!         .engine(Arc::new(NoOpEngine::new()))
//!         .attribute_source(Arc::new(source))
//!         .build()?;
//!
//!     let ctx = CallContext::new(MethodDescriptor::new("app::Inventory", "find"))
//!         .with_target_type("app::Inventory");
//!     let row: String = dispatcher
//!         .dispatch(ctx, || async { Ok("widget".to_owned()) })
//!         .await?;
//!     println!("{row}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`attribute`] | Breaker attributes, sources, and the caching resolver |
//! | [`invoker`] | Uniform wrapper around one guarded call |
//! | [`engine`] | Backing-engine boundary, no-op and composite engines |
//! | [`fallback`] | Fail-fast, fail-silent, and custom fallback policies |
//! | [`dispatch`] | The dispatcher tying resolution, engines, and fallbacks together |

pub mod attribute;
pub mod dispatch;
pub mod engine;
pub mod fallback;
pub mod invoker;

// Re-export main types for convenience
pub use attribute::key::{MethodDescriptor, MethodKey, Visibility};
pub use attribute::name_match::NameMatchAttributeSource;
pub use attribute::source::{AttributeResolver, AttributeSource, StaticAttributeSource};
pub use attribute::{BreakerAttribute, DEFAULT_ENGINE};
pub use dispatch::placeholders::{MapResolver, NoopResolver, PlaceholderResolver};
pub use dispatch::{CircuitDispatcher, DispatchHandle, DispatcherBuilder};
pub use engine::composite::CompositeEngine;
pub use engine::noop::NoOpEngine;
pub use engine::{BreakerSpec, CircuitEngine};
pub use fallback::{Fallback, FallbackFn, FallbackPolicy};
pub use invoker::{BoxedValue, CallContext, Invoker};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{BoxError, Error, ErrorContext};
