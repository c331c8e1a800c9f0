//! Proxy creation entry point

use std::sync::Arc;

use crate::aop::Advisor;
use crate::config::ProxyConfig;
use crate::error::ProxyResult;
use crate::model::{ClassId, Object, Value};

use super::cache::TypeCache;
use super::constructor::AutowireProvider;
use super::synthesizer::{ProxyType, TypeSynthesizer};

/// Creates proxy instances of existing objects
pub trait ProxyMachine: Send + Sync {
    /// Create a proxy of `source` whose methods are intercepted by `advisors`
    ///
    /// Field state is not copied; callers run a
    /// [`FieldCopier`](super::FieldCopier) when they need it.
    fn create(
        &self,
        source: &Object,
        advisors: &[Arc<Advisor>],
        use_copy_constructor: bool,
        use_autowiring: bool,
    ) -> ProxyResult<Object>;
}

/// Proxy machine that synthesizes each source class's proxy type once
///
/// The cache is keyed by source class only. The first `create` for a class
/// fixes the intercepted methods and constructor plan for every later call,
/// whatever advisors or flags those calls pass.
#[derive(Debug)]
pub struct CachingProxyMachine {
    synthesizer: TypeSynthesizer,
    types: TypeCache<ProxyType>,
}

impl CachingProxyMachine {
    /// Create a machine with an empty type cache
    pub fn new(config: &ProxyConfig, autowire: Option<Arc<dyn AutowireProvider>>) -> Self {
        Self {
            synthesizer: TypeSynthesizer::new(config, autowire),
            types: TypeCache::new(),
        }
    }

    /// Cached proxy type for a source class
    pub fn proxy_type(&self, source: ClassId) -> Option<Arc<ProxyType>> {
        self.types.find(source)
    }

    /// Number of synthesized proxy types
    pub fn cached_type_count(&self) -> usize {
        self.types.len()
    }
}

impl Default for CachingProxyMachine {
    fn default() -> Self {
        Self::new(&ProxyConfig::default(), None)
    }
}

impl ProxyMachine for CachingProxyMachine {
    fn create(
        &self,
        source: &Object,
        advisors: &[Arc<Advisor>],
        use_copy_constructor: bool,
        use_autowiring: bool,
    ) -> ProxyResult<Object> {
        let proxy_type = self.types.find_or_insert(source.class().id(), || {
            self.synthesizer
                .synthesize(source, advisors, use_copy_constructor, use_autowiring)
        })?;
        proxy_type.instantiate(source)
    }
}

/// Whether `value` is an instance of a synthesized proxy class
pub fn is_proxy(value: &Value) -> bool {
    value
        .as_object()
        .map(|obj| obj.class().is_synthetic())
        .unwrap_or(false)
}
