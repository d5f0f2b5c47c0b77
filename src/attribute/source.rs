//! Attribute sources and the caching fallback-chain resolver.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::key::{MethodDescriptor, MethodKey};
use super::BreakerAttribute;

/// Contract a configuration layer implements to supply breaker attributes.
///
/// Implementations only answer point lookups; the fallback chain and the
/// caching live in [`AttributeResolver`]. Lookups must be cheap and pure;
/// the resolver consults a source at most once per distinct call site.
pub trait AttributeSource: Send + Sync {
    /// Attribute declared for a method of the given type, if any.
    fn method_attribute(&self, type_name: &str, method_name: &str) -> Option<BreakerAttribute>;

    /// Attribute declared on the type itself (a class-level default), if any.
    fn type_attribute(&self, type_name: &str) -> Option<BreakerAttribute>;
}

/// Programmatic [`AttributeSource`] backed by explicit tables.
///
/// Stands in for annotation scanning or file-based configuration: whatever
/// layer produces attributes can register them here at startup.
#[derive(Debug, Default)]
pub struct StaticAttributeSource {
    methods: HashMap<(String, String), BreakerAttribute>,
    types: HashMap<String, BreakerAttribute>,
}

impl StaticAttributeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(
        mut self,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        attribute: BreakerAttribute,
    ) -> Self {
        self.methods
            .insert((type_name.into(), method_name.into()), attribute);
        self
    }

    pub fn type_default(mut self, type_name: impl Into<String>, attribute: BreakerAttribute) -> Self {
        self.types.insert(type_name.into(), attribute);
        self
    }
}

impl AttributeSource for StaticAttributeSource {
    fn method_attribute(&self, type_name: &str, method_name: &str) -> Option<BreakerAttribute> {
        self.methods
            .get(&(type_name.to_owned(), method_name.to_owned()))
            .cloned()
    }

    fn type_attribute(&self, type_name: &str) -> Option<BreakerAttribute> {
        self.types.get(type_name).cloned()
    }
}

/// Caching resolver implementing the attribute fallback chain.
///
/// Lookup order, first hit wins:
/// 1. method attribute on the target type;
/// 2. attribute on the target type itself;
/// 3. method attribute on the declaring type, when it differs from the
///    target (a call routed through a trait);
/// 4. attribute on the declaring type.
///
/// Every outcome, including "no attribute", is cached by [`MethodKey`].
/// Entries are immutable once computed; the cache never evicts and is safe
/// for unbounded concurrent readers.
pub struct AttributeResolver {
    source: Arc<dyn AttributeSource>,
    public_only: bool,
    cache: RwLock<HashMap<MethodKey, Option<Arc<BreakerAttribute>>>>,
}

impl AttributeResolver {
    pub fn new(source: Arc<dyn AttributeSource>) -> Self {
        Self {
            source,
            public_only: true,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Whether only public methods are eligible for guarding.
    ///
    /// Defaults to true, as required for proxy-style interception; woven
    /// interception styles may relax it.
    pub fn with_public_only(mut self, public_only: bool) -> Self {
        self.public_only = public_only;
        self
    }

    /// Resolve the attribute governing a call to `method` on `target_type`.
    ///
    /// `None` means the call proceeds unguarded.
    pub fn resolve(
        &self,
        method: &MethodDescriptor,
        target_type: Option<&str>,
    ) -> Option<Arc<BreakerAttribute>> {
        let key = MethodKey::new(method, target_type);

        if let Some(cached) = self.cache.read().expect("attribute cache poisoned").get(&key) {
            return cached.clone();
        }

        let computed = self.compute(method, target_type).map(Arc::new);

        let mut cache = self.cache.write().expect("attribute cache poisoned");
        let entry = cache.entry(key).or_insert_with(|| {
            if let Some(ref attribute) = computed {
                debug!(
                    method = %method,
                    attribute = %attribute,
                    "adding circuit breaker method"
                );
            }
            computed.clone()
        });
        entry.clone()
    }

    /// Uncached resolution; [`resolve`](Self::resolve) is the caching
    /// decorator around this.
    fn compute(
        &self,
        method: &MethodDescriptor,
        target_type: Option<&str>,
    ) -> Option<BreakerAttribute> {
        if self.public_only && !method.is_public() {
            return None;
        }

        let declaring = method.declaring_type.as_ref();

        // First two tries run against the target type when one is known.
        if let Some(target) = target_type {
            if let Some(attr) = self.source.method_attribute(target, &method.name) {
                return Some(attr);
            }
            if let Some(attr) = self.source.type_attribute(target) {
                return Some(attr);
            }
            if target == declaring {
                return None;
            }
        }

        // Fallback: the declaring type of the method as invoked.
        if let Some(attr) = self.source.method_attribute(declaring, &method.name) {
            return Some(attr);
        }
        self.source.type_attribute(declaring)
    }
}
