//! Lifecycle hook proxying freshly built aspect-aware objects

use std::fmt;
use std::sync::Arc;

use crate::error::ProxyResult;
use crate::model::Object;
use crate::proxy::{FieldCopier, ProxyMachine};

use super::AdvisorRegistry;

/// Class decorator marking a class whose instances should be proxied
pub const ASPECT_AWARE: &str = "AspectAware";

/// Post-processor run on every newly built object
///
/// Objects whose class carries the [`ASPECT_AWARE`] decorator are replaced by
/// a proxy with their applicable advisors, so calls they make on themselves
/// are intercepted too. Proxy creation failures never escape: the original
/// object is returned instead.
pub struct AspectAwareProcessor {
    registry: Arc<AdvisorRegistry>,
    machine: Arc<dyn ProxyMachine>,
    copier: Arc<FieldCopier>,
}

impl AspectAwareProcessor {
    /// Create a post-processor over the shared registry and machine
    pub fn new(
        registry: Arc<AdvisorRegistry>,
        machine: Arc<dyn ProxyMachine>,
        copier: Arc<FieldCopier>,
    ) -> Self {
        Self {
            registry,
            machine,
            copier,
        }
    }

    /// Process a newly built object named `name`
    pub fn process(&self, object: Object, name: &str) -> Object {
        if !object.class().has_decorator(ASPECT_AWARE) {
            return object;
        }
        match self.proxy(&object) {
            Ok(Some(proxy)) => proxy,
            Ok(None) => object,
            Err(err) => {
                tracing::error!(
                    object = name,
                    class = object.class().name(),
                    error = %err,
                    "unable to create proxy, keeping original object"
                );
                object
            }
        }
    }

    /// Proxy `object` with every advisor that applies to its class
    ///
    /// Returns `None` when no advisor applies or the object already is a
    /// proxy. Construction prefers autowiring over copy construction, and the
    /// object's fields are copied onto the proxy.
    pub fn proxy(&self, object: &Object) -> ProxyResult<Option<Object>> {
        if object.class().is_synthetic() {
            return Ok(None);
        }
        let advisors = self.registry.advisors_for(object.class());
        if advisors.is_empty() {
            return Ok(None);
        }
        let proxy = self.machine.create(object, &advisors, false, true)?;
        self.copier.copy(object, &proxy)?;
        Ok(Some(proxy))
    }
}

impl fmt::Debug for AspectAwareProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectAwareProcessor")
            .field("advisors", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aop::{Advisor, MethodNamePointcut};
    use crate::model::{
        AccessPolicy, ClassBuilder, ConstructorDefinition, DecoratorInfo, FieldDefinition,
        MethodDefinition, TypeInfo, Value,
    };
    use crate::proxy::{is_proxy, CachingProxyMachine};

    fn processor(registry: Arc<AdvisorRegistry>) -> AspectAwareProcessor {
        AspectAwareProcessor::new(
            registry,
            Arc::new(CachingProxyMachine::default()),
            Arc::new(FieldCopier::new(Arc::new(AccessPolicy::new()))),
        )
    }

    fn shouting() -> Advisor {
        Advisor::around("shout", MethodNamePointcut::new("name"), |jp| {
            let name = jp.proceed()?;
            Ok(Value::from(format!("{}!", name)))
        })
    }

    fn bean_class(aspect_aware: bool, default_ctor: bool) -> Arc<crate::model::Class> {
        let mut builder = ClassBuilder::new("Bean")
            .field(FieldDefinition::new("name", TypeInfo::string()))
            .method(MethodDefinition::new("name", |this, _| this.get("name")));
        if aspect_aware {
            builder = builder.decorate(DecoratorInfo::new(ASPECT_AWARE));
        }
        if !default_ctor {
            builder = builder.constructor(
                ConstructorDefinition::new(|this, args| this.set("name", args[0].clone()))
                    .param("name", TypeInfo::string()),
            );
        }
        builder.build()
    }

    #[test]
    fn test_aspect_aware_object_is_proxied() {
        let registry = Arc::new(AdvisorRegistry::new());
        registry.register(shouting());
        let bean = Object::allocate(&bean_class(true, true));
        bean.set("name", "ada").unwrap();

        let processed = processor(registry).process(bean.clone(), "bean");
        assert!(!processed.ptr_eq(&bean));
        assert!(is_proxy(&Value::Object(processed.clone())));
        assert_eq!(processed.invoke("name", &[]).unwrap(), Value::from("ada!"));
    }

    #[test]
    fn test_unmarked_object_untouched() {
        let registry = Arc::new(AdvisorRegistry::new());
        registry.register(shouting());
        let bean = Object::allocate(&bean_class(false, true));

        assert!(processor(registry).process(bean.clone(), "bean").ptr_eq(&bean));
    }

    #[test]
    fn test_no_advisors_returns_original() {
        let bean = Object::allocate(&bean_class(true, true));
        let processed = processor(Arc::new(AdvisorRegistry::new())).process(bean.clone(), "bean");
        assert!(processed.ptr_eq(&bean));
    }

    #[test]
    fn test_failure_falls_back_to_original() {
        let registry = Arc::new(AdvisorRegistry::new());
        registry.register(shouting());
        let bean = Object::instantiate(&bean_class(true, false), &[Value::from("ada")]).unwrap();

        let processed = processor(registry).process(bean.clone(), "bean");
        assert!(processed.ptr_eq(&bean));
        assert_eq!(processed.invoke("name", &[]).unwrap(), Value::from("ada"));
    }
}
