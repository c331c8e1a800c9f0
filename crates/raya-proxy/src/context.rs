//! Startup wiring of the proxy engine
//!
//! An [`AspectContext`] is built once and handed to every component that
//! needs the registry, the proxy machine or the copier.
//!
//! ```rust,ignore
//! let context = AspectContext::builder()
//!     .config(EngineConfig::from_file(Path::new("proxy.toml"))?)
//!     .advisor(logging_advisor)
//!     .build();
//! let service = context.processor().process(service, "service");
//! ```

use std::fmt;
use std::sync::Arc;

use crate::aop::Advisor;
use crate::config::EngineConfig;
use crate::error::ProxyResult;
use crate::model::{AccessPolicy, Object};
use crate::proxy::{AutowireProvider, CachingProxyMachine, FieldCopier, ProxyMachine};
use crate::selection::{AdvisorRegistry, AspectAwareProcessor, ProxyProducerAspect};

/// Shared engine state
pub struct AspectContext {
    config: EngineConfig,
    access: Arc<AccessPolicy>,
    registry: Arc<AdvisorRegistry>,
    machine: Arc<CachingProxyMachine>,
    copier: Arc<FieldCopier>,
    producers: ProxyProducerAspect,
    processor: AspectAwareProcessor,
}

impl AspectContext {
    pub fn builder() -> AspectContextBuilder {
        AspectContextBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Access policy used for field copies
    pub fn access(&self) -> &Arc<AccessPolicy> {
        &self.access
    }

    pub fn registry(&self) -> &Arc<AdvisorRegistry> {
        &self.registry
    }

    pub fn machine(&self) -> &Arc<CachingProxyMachine> {
        &self.machine
    }

    pub fn copier(&self) -> &Arc<FieldCopier> {
        &self.copier
    }

    /// Wrap-on-return aspect; its advisor is already registered
    pub fn producers(&self) -> &ProxyProducerAspect {
        &self.producers
    }

    /// Post-processor for aspect-aware objects
    pub fn processor(&self) -> &AspectAwareProcessor {
        &self.processor
    }

    /// Proxy `object` with the advisors that apply to its class, if any
    pub fn proxy(&self, object: &Object) -> ProxyResult<Option<Object>> {
        self.processor.proxy(object)
    }
}

impl fmt::Debug for AspectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectContext")
            .field("config", &self.config)
            .field("advisors", &self.registry.len())
            .field("proxy_types", &self.machine.cached_type_count())
            .finish()
    }
}

/// Builder for [`AspectContext`]
#[derive(Default)]
pub struct AspectContextBuilder {
    config: EngineConfig,
    autowire: Option<Arc<dyn AutowireProvider>>,
    advisors: Vec<Advisor>,
}

impl AspectContextBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Provider used for autowired proxy construction
    pub fn autowire(mut self, provider: Arc<dyn AutowireProvider>) -> Self {
        self.autowire = Some(provider);
        self
    }

    /// Register an advisor at startup
    pub fn advisor(mut self, advisor: Advisor) -> Self {
        self.advisors.push(advisor);
        self
    }

    pub fn build(self) -> AspectContext {
        let access = Arc::new(AccessPolicy::from_config(&self.config.access));
        let registry = Arc::new(AdvisorRegistry::new());
        let machine = Arc::new(CachingProxyMachine::new(&self.config.proxy, self.autowire));
        let copier = Arc::new(FieldCopier::new(Arc::clone(&access)));
        let dyn_machine: Arc<dyn ProxyMachine> = machine.clone();

        let producers = ProxyProducerAspect::new(
            Arc::clone(&registry),
            Arc::clone(&dyn_machine),
            Arc::clone(&copier),
            self.config.producer,
        );
        registry.register(producers.advisor());
        registry.register_all(self.advisors);

        let processor =
            AspectAwareProcessor::new(Arc::clone(&registry), dyn_machine, Arc::clone(&copier));

        tracing::debug!(
            advisors = registry.len(),
            policy = ?self.config.proxy.override_policy,
            "aspect context ready"
        );

        AspectContext {
            config: self.config,
            access,
            registry,
            machine,
            copier,
            producers,
            processor,
        }
    }
}

impl fmt::Debug for AspectContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectContextBuilder")
            .field("config", &self.config)
            .field("autowire", &self.autowire.is_some())
            .field("advisors", &self.advisors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aop::MethodNamePointcut;
    use crate::model::AccessPermission;
    use crate::selection::PRODUCER_ADVISOR;

    #[test]
    fn test_build_registers_producer_advisor_first() {
        let context = AspectContext::builder()
            .advisor(Advisor::around("a", MethodNamePointcut::new("run"), |jp| jp.proceed()))
            .build();

        let names: Vec<_> = context
            .registry()
            .all()
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(names, vec![PRODUCER_ADVISOR.to_string(), "a".to_string()]);
        assert_eq!(context.machine().cached_type_count(), 0);
    }

    #[test]
    fn test_access_policy_from_config() {
        let config = EngineConfig::from_str("[access.fields]\n\"Account.balance\" = \"NONE\"").unwrap();
        let context = AspectContext::builder().config(config).build();

        assert_eq!(context.access().resolve("Account", "balance"), AccessPermission::NONE);
        assert_eq!(context.access().resolve("Account", "owner"), AccessPermission::ALL);
        assert!(Arc::ptr_eq(context.copier().policy(), context.access()));
    }
}
