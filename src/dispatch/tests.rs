use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::placeholders::MapResolver;
use super::*;
use crate::attribute::key::MethodDescriptor;
use crate::attribute::source::StaticAttributeSource;
use crate::attribute::{BreakerAttribute, PROP_FALLBACK};
use crate::engine::noop::NoOpEngine;
use crate::engine::composite::CompositeEngine;
use crate::fallback::FallbackFn;
use crate::invoker::BoxedValue;

/// Pass-through engine that counts configurations and executions and keeps
/// the last spec it was configured with.
#[derive(Default)]
struct RecordingEngine {
    configures: AtomicUsize,
    executions: AtomicUsize,
    last_spec: Mutex<Option<BreakerSpec>>,
}

#[async_trait]
impl CircuitEngine for RecordingEngine {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn configure(&self, spec: &BreakerSpec) -> Result<()> {
        self.configures.fetch_add(1, Ordering::SeqCst);
        *self.last_spec.lock().unwrap() = Some(spec.clone());
        Ok(())
    }

    async fn execute(&self, _spec: &BreakerSpec, invoker: Invoker) -> Result<BoxedValue> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        invoker.invoke().await
    }
}

/// Engine that reports a fixed failure without running the action.
struct FailingEngine<F: Fn() -> Error + Send + Sync>(F);

#[async_trait]
impl<F: Fn() -> Error + Send + Sync> CircuitEngine for FailingEngine<F> {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn execute(&self, _spec: &BreakerSpec, _invoker: Invoker) -> Result<BoxedValue> {
        Err((self.0)())
    }
}

fn context(method: &'static str) -> CallContext {
    CallContext::new(MethodDescriptor::new("app::FooBar", method))
        .with_target_type("app::FooBarImpl")
}

fn guarded_source(method: &'static str, attribute: BreakerAttribute) -> Arc<StaticAttributeSource> {
    Arc::new(StaticAttributeSource::new().method("app::FooBarImpl", method, attribute))
}

fn dispatcher(engine: Arc<dyn CircuitEngine>, source: Arc<StaticAttributeSource>) -> CircuitDispatcher {
    CircuitDispatcher::builder()
        .engine(engine)
        .attribute_source(source)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_unguarded_call_bypasses_engine() {
    let engine = Arc::new(RecordingEngine::default());
    let dispatcher = dispatcher(engine.clone(), Arc::new(StaticAttributeSource::new()));

    let value: u32 = dispatcher
        .dispatch(context("get_count"), || async { Ok(41 + 1) })
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert_eq!(engine.executions.load(Ordering::SeqCst), 0);
    assert_eq!(engine.configures.load(Ordering::SeqCst), 0);
    assert!(dispatcher.configured_breakers().is_empty());
}

#[tokio::test]
async fn test_unguarded_call_surfaces_original_error() {
    let engine = Arc::new(RecordingEngine::default());
    let dispatcher = dispatcher(engine.clone(), Arc::new(StaticAttributeSource::new()));

    let err = dispatcher
        .dispatch::<u32, _, _>(context("get_count"), || async {
            Err("backend offline".into())
        })
        .await
        .unwrap_err();

    assert_eq!(
        err.application_source().unwrap().to_string(),
        "backend offline"
    );
    assert_eq!(engine.executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_disabled_dispatcher_bypasses_everything() {
    let engine = Arc::new(RecordingEngine::default());
    let source = guarded_source("get_name", BreakerAttribute::new("GetNameGuard"));
    let dispatcher = CircuitDispatcher::builder()
        .engine(engine.clone())
        .attribute_source(source)
        .enabled(false)
        .build()
        .unwrap();

    let value: String = dispatcher
        .dispatch(context("get_name"), || async { Ok("alice".to_owned()) })
        .await
        .unwrap();

    assert_eq!(value, "alice");
    assert_eq!(engine.executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_guarded_call_runs_through_engine() {
    let engine = Arc::new(RecordingEngine::default());
    let source = guarded_source("get_name", BreakerAttribute::new("GetNameGuard"));
    let dispatcher = dispatcher(engine.clone(), source);

    let value: String = dispatcher
        .dispatch(context("get_name"), || async { Ok("alice".to_owned()) })
        .await
        .unwrap();

    assert_eq!(value, "alice");
    assert_eq!(engine.executions.load(Ordering::SeqCst), 1);
    assert_eq!(engine.configures.load(Ordering::SeqCst), 1);

    let breakers = dispatcher.configured_breakers();
    assert_eq!(breakers.len(), 1);
    assert_eq!(breakers[0].name, "GetNameGuard");
}

#[tokio::test]
async fn test_unnamed_attribute_gets_signature_name() {
    let engine = Arc::new(RecordingEngine::default());
    let source = guarded_source("get_name", BreakerAttribute::unnamed());
    let dispatcher = dispatcher(engine, source);

    let _: String = dispatcher
        .dispatch(
            CallContext::new(
                MethodDescriptor::new("app::FooBar", "get_name").with_arg_types(["u64"]),
            )
            .with_target_type("app::FooBarImpl"),
            || async { Ok(String::new()) },
        )
        .await
        .unwrap();

    let breakers = dispatcher.configured_breakers();
    assert_eq!(breakers[0].name, "app::FooBarImpl::get_name(u64)");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_calls_configure_once() {
    let engine = Arc::new(RecordingEngine::default());
    let source = guarded_source("get_name", BreakerAttribute::new("GetNameGuard"));
    let dispatcher = dispatcher(engine.clone(), source);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let dispatcher = dispatcher.clone();
        handles.push(tokio::spawn(async move {
            dispatcher
                .dispatch::<u32, _, _>(context("get_name"), || async { Ok(1) })
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }

    assert_eq!(engine.configures.load(Ordering::SeqCst), 1);
    assert_eq!(engine.executions.load(Ordering::SeqCst), 20);
}

#[tokio::test]
async fn test_fail_fast_surfaces_engine_timeout() {
    let engine = Arc::new(FailingEngine(|| Error::timeout("budget exceeded")));
    let source = guarded_source("get_name", BreakerAttribute::new("GetNameGuard"));
    let dispatcher = dispatcher(engine, source);

    let err = dispatcher
        .dispatch::<u32, _, _>(context("get_name"), || async { Ok(1) })
        .await
        .unwrap_err();

    match err {
        Error::Timeout { message } => assert_eq!(message, "budget exceeded"),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fail_fast_unwraps_incidental_layer() {
    let engine = Arc::new(FailingEngine(|| {
        Error::application(Box::new(Error::overload("pool full")) as crate::error::BoxError)
    }));
    let source = guarded_source("get_name", BreakerAttribute::new("GetNameGuard"));
    let dispatcher = dispatcher(engine, source);

    let err = dispatcher
        .dispatch::<u32, _, _>(context("get_name"), || async { Ok(1) })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Overload { .. }));
}

#[tokio::test]
async fn test_fail_silent_returns_zero_value() {
    let engine = Arc::new(FailingEngine(|| Error::breaker_open("circuit open")));
    let source = guarded_source(
        "get_name",
        BreakerAttribute::new("GetNameGuard").with_property(PROP_FALLBACK, "fail_silent"),
    );
    let dispatcher = dispatcher(engine, source);

    let value: String = dispatcher
        .dispatch(context("get_name"), || async { Ok("never".to_owned()) })
        .await
        .unwrap();

    assert_eq!(value, String::default());
}

#[tokio::test]
async fn test_custom_fallback_value_on_timeout() {
    let engine = Arc::new(FailingEngine(|| Error::timeout("budget exceeded")));
    let source = guarded_source(
        "get_name",
        BreakerAttribute::new("GetNameGuard").with_property(PROP_FALLBACK, "stale_copy"),
    );
    let dispatcher = CircuitDispatcher::builder()
        .engine(engine)
        .attribute_source(source)
        .fallback(
            "stale_copy",
            Arc::new(FallbackFn(|_ctx: &CallContext| "cached".to_owned())),
        )
        .build()
        .unwrap();

    let value: String = dispatcher
        .dispatch(context("get_name"), || async { Ok("never".to_owned()) })
        .await
        .unwrap();

    assert_eq!(value, "cached");
}

#[tokio::test]
async fn test_unknown_fallback_strategy_fails_configuration() {
    let engine = Arc::new(RecordingEngine::default());
    let source = guarded_source(
        "get_name",
        BreakerAttribute::new("GetNameGuard").with_property(PROP_FALLBACK, "missing_strategy"),
    );
    let dispatcher = dispatcher(engine, source);

    let err = dispatcher
        .dispatch::<u32, _, _>(context("get_name"), || async { Ok(1) })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Configuration { .. }));
}

#[tokio::test]
async fn test_mismatched_fallback_value_is_configuration_error() {
    let engine = Arc::new(FailingEngine(|| Error::timeout("budget exceeded")));
    let source = guarded_source(
        "get_name",
        BreakerAttribute::new("GetNameGuard").with_property(PROP_FALLBACK, "wrong_type"),
    );
    let dispatcher = CircuitDispatcher::builder()
        .engine(engine)
        .attribute_source(source)
        .fallback("wrong_type", Arc::new(FallbackFn(|_ctx: &CallContext| 7u64)))
        .build()
        .unwrap();

    let err = dispatcher
        .dispatch::<String, _, _>(context("get_name"), || async { Ok(String::new()) })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Configuration { .. }));
}

#[tokio::test]
async fn test_configuration_error_never_absorbed() {
    // Missing composite engine is fatal even with a fail-silent fallback.
    let composite = CompositeEngine::builder().build().unwrap();
    let source = guarded_source(
        "get_name",
        BreakerAttribute::new("GetNameGuard")
            .with_manager("unregistered")
            .with_property(PROP_FALLBACK, "fail_silent"),
    );
    let dispatcher = dispatcher(Arc::new(composite), source);

    let err = dispatcher
        .dispatch::<u32, _, _>(context("get_name"), || async { Ok(1) })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Configuration { .. }));
}

#[tokio::test]
async fn test_composite_routes_and_noop_fallback() {
    let remote = Arc::new(RecordingEngine::default());
    let composite = CompositeEngine::builder()
        .engine("remote", remote.clone())
        .fallback_to_noop(true)
        .build()
        .unwrap();

    let source = Arc::new(
        StaticAttributeSource::new()
            .method(
                "app::FooBarImpl",
                "get_name",
                BreakerAttribute::new("RoutedGuard").with_manager("remote"),
            )
            .method(
                "app::FooBarImpl",
                "get_count",
                BreakerAttribute::new("UnroutedGuard").with_manager("elsewhere"),
            ),
    );
    let dispatcher = dispatcher(Arc::new(composite), source);

    let _: u32 = dispatcher
        .dispatch(context("get_name"), || async { Ok(1) })
        .await
        .unwrap();
    assert_eq!(remote.executions.load(Ordering::SeqCst), 1);

    // Unrouted breaker passes through the no-op fallback.
    let value: u32 = dispatcher
        .dispatch(context("get_count"), || async { Ok(2) })
        .await
        .unwrap();
    assert_eq!(value, 2);
    assert_eq!(remote.executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_placeholders_expanded_before_configuration() {
    let engine = Arc::new(RecordingEngine::default());
    let source = guarded_source(
        "get_name",
        BreakerAttribute::new("GetNameGuard").with_property("timeout_ms", "${slow_budget}"),
    );
    let dispatcher = CircuitDispatcher::builder()
        .engine(engine.clone())
        .attribute_source(source)
        .placeholder_resolver(Arc::new(
            MapResolver::new(HashMap::new()).with("slow_budget", "750"),
        ))
        .build()
        .unwrap();

    let _: u32 = dispatcher
        .dispatch(context("get_name"), || async { Ok(1) })
        .await
        .unwrap();

    let spec = engine.last_spec.lock().unwrap().clone().unwrap();
    assert_eq!(spec.properties.get("timeout_ms").unwrap(), "750");
}

#[tokio::test]
async fn test_noop_engine_through_dispatcher() {
    let source = guarded_source("get_name", BreakerAttribute::new("GetNameGuard"));
    let dispatcher = dispatcher(Arc::new(NoOpEngine::new()), source);

    let value: String = dispatcher
        .dispatch(context("get_name"), || async { Ok("direct".to_owned()) })
        .await
        .unwrap();
    assert_eq!(value, "direct");
}

#[tokio::test]
async fn test_builder_requires_engine_and_source() {
    assert!(matches!(
        CircuitDispatcher::builder().build(),
        Err(Error::Configuration { .. })
    ));
    assert!(matches!(
        CircuitDispatcher::builder()
            .engine(Arc::new(NoOpEngine::new()))
            .build(),
        Err(Error::Configuration { .. })
    ));
}
