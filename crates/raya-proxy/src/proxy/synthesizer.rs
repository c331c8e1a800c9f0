//! Proxy type synthesis
//!
//! A proxy type is a synthetic subclass of the source class. It declares no
//! fields or methods of its own; it only replaces the vtable slots of the
//! intercepted methods and carries one constructor delegating to the source
//! constructor chosen by [`ConstructorResolver`].

use std::fmt;
use std::sync::Arc;

use crate::aop::{Advisor, AroundFn, JoinPointAdapter, MethodSignature};
use crate::config::{OverridePolicy, ProxyConfig};
use crate::error::{ProxyError, ProxyResult};
use crate::model::{Class, ClassBuilder, ConstructorDefinition, MethodFn, MethodInfo, Object};

use super::constructor::{AutowireProvider, ConstructorPlan, ConstructorResolver};

/// A synthesized proxy class and how to instantiate it
pub struct ProxyType {
    class: Arc<Class>,
    source: Arc<Class>,
    plan: ConstructorPlan,
    intercepted: Vec<String>,
}

impl ProxyType {
    /// The synthetic subclass
    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    /// The class being proxied
    pub fn source_class(&self) -> &Arc<Class> {
        &self.source
    }

    /// Constructor plan fixed at synthesis
    pub fn plan(&self) -> &ConstructorPlan {
        &self.plan
    }

    /// Names of the methods whose bodies were replaced
    pub fn intercepted_methods(&self) -> &[String] {
        &self.intercepted
    }

    /// Create a proxy instance for `source`
    ///
    /// With a copy plan the constructor receives `source` itself.
    pub fn instantiate(&self, source: &Object) -> ProxyResult<Object> {
        let args = self.plan.arguments_for(source);
        Object::construct(&self.class, 0, &args).map_err(|err| ProxyError::ConstructorFailed {
            class: self.source.name().to_string(),
            source: err,
        })
    }
}

impl fmt::Debug for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyType")
            .field("class", &self.class.name())
            .field("source", &self.source.name())
            .field("strategy", &self.plan.strategy)
            .field("intercepted", &self.intercepted)
            .finish()
    }
}

/// Builds proxy types from a source class and its advisors
#[derive(Debug, Clone)]
pub struct TypeSynthesizer {
    policy: OverridePolicy,
    suffix: String,
    resolver: ConstructorResolver,
}

impl TypeSynthesizer {
    /// Create a synthesizer for the given proxy settings
    pub fn new(config: &ProxyConfig, autowire: Option<Arc<dyn AutowireProvider>>) -> Self {
        Self {
            policy: config.override_policy,
            suffix: config.proxy_suffix.clone(),
            resolver: ConstructorResolver::new(autowire),
        }
    }

    /// Synthesize the proxy type for the class of `source`
    pub fn synthesize(
        &self,
        source: &Object,
        advisors: &[Arc<Advisor>],
        use_copy_constructor: bool,
        use_autowiring: bool,
    ) -> ProxyResult<ProxyType> {
        let class = source.class();
        if class.is_synthetic() {
            return Err(ProxyError::Synthesis {
                class: class.name().to_string(),
                reason: "class is already a synthesized proxy".to_string(),
            });
        }

        let mut builder = ClassBuilder::new(format!("{}{}", class.name(), self.suffix))
            .extends(class)
            .synthetic();
        let mut intercepted = Vec::new();

        for method in class.all_methods() {
            let advices = matching_advices(advisors, method, class);
            if advices.is_empty() {
                continue;
            }
            let body = self.weave(class, method, &advices)?;
            tracing::debug!(
                class = class.name(),
                method = %method.name,
                advisors = advices.len(),
                "intercepting method"
            );
            intercepted.push(method.name.clone());
            builder = builder.override_method(method.name.clone(), body);
        }

        let plan =
            self.resolver
                .resolve(class, source, use_copy_constructor, use_autowiring)?;
        let delegate = class.constructors().get(plan.constructor).ok_or_else(|| {
            ProxyError::Construction {
                class: class.name().to_string(),
                reason: format!("constructor #{} does not exist", plan.constructor),
            }
        })?;
        builder = builder.constructor(ConstructorDefinition::from_parts(
            delegate.parameters.clone(),
            Arc::clone(delegate.body()),
        ));

        let proxy_class = builder.build();
        tracing::debug!(
            class = class.name(),
            proxy = proxy_class.name(),
            intercepted = intercepted.len(),
            strategy = %plan.strategy,
            "synthesized proxy type"
        );

        Ok(ProxyType {
            class: proxy_class,
            source: Arc::clone(class),
            plan,
            intercepted,
        })
    }

    /// Build the replacement body for one method
    fn weave(&self, class: &Class, method: &MethodInfo, advices: &[&AroundFn]) -> ProxyResult<MethodFn> {
        let original = class.vtable().get(method.slot).cloned().ok_or_else(|| {
            ProxyError::Synthesis {
                class: class.name().to_string(),
                reason: format!("method {} has no vtable slot", method.name),
            }
        })?;
        let signature = Arc::new(MethodSignature::from_method(method, class));

        let selected: &[&AroundFn] = match self.policy {
            OverridePolicy::Chain => advices,
            OverridePolicy::LastWins => &advices[advices.len() - 1..],
        };

        // Innermost first, so the first advisor ends up outermost
        Ok(selected.iter().rev().fold(original, |inner, advice| {
            JoinPointAdapter::new(Arc::clone(advice), Arc::clone(&signature), inner).into_method()
        }))
    }
}

fn matching_advices<'a>(
    advisors: &'a [Arc<Advisor>],
    method: &MethodInfo,
    class: &Class,
) -> Vec<&'a AroundFn> {
    advisors
        .iter()
        .filter_map(|advisor| {
            let around = advisor.advice().as_around()?;
            let pointcut = advisor.pointcut();
            (pointcut.matches_class(class) && pointcut.matches(method, class)).then_some(around)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aop::{JoinPoint, MethodNamePointcut};
    use crate::model::{MethodDefinition, TypeInfo, Value};

    fn greeter() -> Arc<Class> {
        ClassBuilder::new("Greeter")
            .method(
                MethodDefinition::new("greet", |_, args| {
                    Ok(Value::from(format!("hi {}", args[0])))
                })
                .param("name", TypeInfo::string())
                .returns(TypeInfo::string()),
            )
            .method(MethodDefinition::new("plain", |_, _| Ok(Value::from("plain"))))
            .method(MethodDefinition::new("twice", |this, _| {
                let first = this.invoke("plain", &[])?;
                Ok(Value::from(format!("{}{}", first, first)))
            }))
            .build()
    }

    fn tagging(name: &str, method: &str, tag: &'static str) -> Arc<Advisor> {
        Arc::new(Advisor::around(
            name,
            MethodNamePointcut::new(method),
            move |jp: &JoinPoint| Ok(Value::from(format!("{}({})", tag, jp.proceed()?))),
        ))
    }

    fn synthesizer(policy: OverridePolicy) -> TypeSynthesizer {
        let config = ProxyConfig {
            override_policy: policy,
            ..ProxyConfig::default()
        };
        TypeSynthesizer::new(&config, None)
    }

    #[test]
    fn test_only_matching_methods_overridden() {
        let class = greeter();
        let source = Object::allocate(&class);
        let proxy_type = synthesizer(OverridePolicy::Chain)
            .synthesize(&source, &[tagging("a", "greet", "A")], false, false)
            .unwrap();

        assert_eq!(proxy_type.intercepted_methods(), ["greet".to_string()]);
        assert_eq!(proxy_type.class().name(), "Greeter$Proxy");
        assert!(proxy_type.class().is_synthetic());
        assert!(proxy_type.class().methods().is_empty());

        let proxy = proxy_type.instantiate(&source).unwrap();
        assert_eq!(
            proxy.invoke("greet", &[Value::from("bo")]).unwrap(),
            Value::from("A(hi bo)")
        );
        assert_eq!(proxy.invoke("plain", &[]).unwrap(), Value::from("plain"));
    }

    #[test]
    fn test_chain_first_advisor_outermost() {
        let class = greeter();
        let source = Object::allocate(&class);
        let advisors = [tagging("a", "plain", "A"), tagging("b", "plain", "B")];
        let proxy = synthesizer(OverridePolicy::Chain)
            .synthesize(&source, &advisors, false, false)
            .unwrap()
            .instantiate(&source)
            .unwrap();

        assert_eq!(proxy.invoke("plain", &[]).unwrap(), Value::from("A(B(plain))"));
    }

    #[test]
    fn test_last_wins() {
        let class = greeter();
        let source = Object::allocate(&class);
        let advisors = [tagging("a", "plain", "A"), tagging("b", "plain", "B")];
        let proxy = synthesizer(OverridePolicy::LastWins)
            .synthesize(&source, &advisors, false, false)
            .unwrap()
            .instantiate(&source)
            .unwrap();

        assert_eq!(proxy.invoke("plain", &[]).unwrap(), Value::from("B(plain)"));
    }

    #[test]
    fn test_self_calls_go_through_proxy() {
        let class = greeter();
        let source = Object::allocate(&class);
        let proxy = synthesizer(OverridePolicy::Chain)
            .synthesize(&source, &[tagging("a", "plain", "A")], false, false)
            .unwrap()
            .instantiate(&source)
            .unwrap();

        assert_eq!(
            proxy.invoke("twice", &[]).unwrap(),
            Value::from("A(plain)A(plain)")
        );
    }

    #[test]
    fn test_non_around_advice_ignored() {
        let class = greeter();
        let source = Object::allocate(&class);
        let before = Arc::new(Advisor::before("b", MethodNamePointcut::new("plain"), |_| Ok(())));
        let proxy_type = synthesizer(OverridePolicy::Chain)
            .synthesize(&source, &[before], false, false)
            .unwrap();

        assert!(proxy_type.intercepted_methods().is_empty());
    }

    #[test]
    fn test_synthetic_source_rejected() {
        let class = greeter();
        let source = Object::allocate(&class);
        let synth = synthesizer(OverridePolicy::Chain);
        let proxy = synth
            .synthesize(&source, &[], false, false)
            .unwrap()
            .instantiate(&source)
            .unwrap();

        assert!(matches!(
            synth.synthesize(&proxy, &[], false, false),
            Err(ProxyError::Synthesis { .. })
        ));
    }

    #[test]
    fn test_custom_suffix() {
        let config = ProxyConfig {
            proxy_suffix: "_Enhanced".to_string(),
            ..ProxyConfig::default()
        };
        let class = greeter();
        let proxy_type = TypeSynthesizer::new(&config, None)
            .synthesize(&Object::allocate(&class), &[], false, false)
            .unwrap();
        assert_eq!(proxy_type.class().name(), "Greeter_Enhanced");
    }
}
