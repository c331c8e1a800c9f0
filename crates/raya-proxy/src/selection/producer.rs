//! Wrap-on-return policy for producer classes
//!
//! A producer class is registered with a [`ProducerPolicy`]. The aspect's
//! advisor intercepts every non-void method of a producer and replaces the
//! object it returns by a proxy carrying the advisors that apply to the
//! returned object's class.
//!
//! ```rust,ignore
//! let producers = ProxyProducerAspect::new(registry, machine, copier, ProducerDefaults::default());
//! producers.register_producer(
//!     &factory_class,
//!     ProducerPolicy::default().exclude_when("build_raw", "is_raw"),
//! );
//! registry.register(producers.advisor());
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use rustc_hash::FxHashMap;

use crate::aop::{Advisor, JoinPoint, Pointcut};
use crate::config::ProducerDefaults;
use crate::error::{InvocationError, InvocationResult};
use crate::model::{Class, ClassId, MethodInfo, Object, TypeInfo, Value};
use crate::proxy::{is_proxy, FieldCopier, ProxyMachine};

use super::AdvisorRegistry;

/// Name of the advisor returned by [`ProxyProducerAspect::advisor`]
pub const PRODUCER_ADVISOR: &str = "proxy-producer";

/// Per-method opt-out from wrapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// Never wrap values returned by this method; the method is not intercepted
    Always,
    /// Skip wrapping when the named method returns `true` for the call's arguments
    ///
    /// An empty name always skips.
    When(String),
}

/// Wrapping settings for one producer class
#[derive(Debug, Clone)]
pub struct ProducerPolicy {
    use_field_copying: bool,
    use_copy_constructor: bool,
    target_types: Vec<TypeInfo>,
    exclusions: FxHashMap<String, Exclusion>,
}

impl ProducerPolicy {
    /// Start from configured defaults
    pub fn new(defaults: ProducerDefaults) -> Self {
        Self {
            use_field_copying: defaults.use_field_copying,
            use_copy_constructor: defaults.use_copy_constructor,
            target_types: Vec::new(),
            exclusions: FxHashMap::default(),
        }
    }

    pub fn use_field_copying(mut self, enabled: bool) -> Self {
        self.use_field_copying = enabled;
        self
    }

    pub fn use_copy_constructor(mut self, enabled: bool) -> Self {
        self.use_copy_constructor = enabled;
        self
    }

    /// Only wrap values assignable to one of the target types
    pub fn target_type(mut self, type_info: TypeInfo) -> Self {
        self.target_types.push(type_info);
        self
    }

    /// Never intercept `method`
    pub fn exclude_always(mut self, method: impl Into<String>) -> Self {
        self.exclusions.insert(method.into(), Exclusion::Always);
        self
    }

    /// Skip wrapping for `method` when `filter` returns `true`
    pub fn exclude_when(mut self, method: impl Into<String>, filter: impl Into<String>) -> Self {
        self.exclusions
            .insert(method.into(), Exclusion::When(filter.into()));
        self
    }

    /// Exclusion declared for a method
    pub fn exclusion(&self, method: &str) -> Option<&Exclusion> {
        self.exclusions.get(method)
    }

    fn accepts_target(&self, value: &Value) -> bool {
        self.target_types.is_empty() || self.target_types.iter().any(|t| t.accepts(value))
    }
}

impl Default for ProducerPolicy {
    fn default() -> Self {
        Self::new(ProducerDefaults::default())
    }
}

type ProducerMap = DashMap<ClassId, Arc<ProducerPolicy>>;

/// Policy of the nearest registered producer in `class`'s ancestry
fn producer_policy(producers: &ProducerMap, class: &Class) -> Option<Arc<ProducerPolicy>> {
    let mut current = Some(class);
    while let Some(class) = current {
        if let Some(policy) = producers.get(&class.id()) {
            return Some(Arc::clone(&*policy));
        }
        current = class.parent().map(|p| &**p);
    }
    None
}

/// Selects non-void, not always-excluded methods of producer classes
struct ProducerPointcut {
    producers: Arc<ProducerMap>,
}

impl Pointcut for ProducerPointcut {
    fn matches(&self, method: &MethodInfo, class: &Class) -> bool {
        if method.return_type.is_void() {
            return false;
        }
        producer_policy(&self.producers, class)
            .map(|policy| policy.exclusion(&method.name) != Some(&Exclusion::Always))
            .unwrap_or(false)
    }

    fn matches_class(&self, class: &Class) -> bool {
        producer_policy(&self.producers, class).is_some()
    }
}

struct ProducerState {
    producers: Arc<ProducerMap>,
    registry: Arc<AdvisorRegistry>,
    machine: Arc<dyn ProxyMachine>,
    copier: Arc<FieldCopier>,
}

impl ProducerState {
    fn wrap_return(&self, join_point: &JoinPoint) -> InvocationResult<Value> {
        let value = join_point.proceed()?;
        if is_proxy(&value) {
            return Ok(value);
        }
        let produced = match value.as_object() {
            Some(obj) => obj.clone(),
            None => return Ok(value),
        };
        let policy = match producer_policy(&self.producers, join_point.this().class()) {
            Some(policy) => policy,
            None => return Ok(value),
        };
        if !policy.accepts_target(&value) {
            return Ok(value);
        }
        match policy.exclusion(&join_point.signature().name) {
            Some(Exclusion::Always) => return Ok(value),
            Some(Exclusion::When(filter)) => {
                if filter.is_empty() || self.excluded_by(join_point, filter)? {
                    return Ok(value);
                }
            }
            None => {}
        }

        let advisors = self.registry.advisors_for(produced.class());
        if advisors.is_empty() {
            return Ok(value);
        }
        let proxy = self
            .machine
            .create(&produced, &advisors, policy.use_copy_constructor, false)?;
        if policy.use_field_copying {
            self.copier.copy(&produced, &proxy)?;
        }
        Ok(Value::Object(proxy))
    }

    /// Run the exclusion filter on the receiver with the call's arguments
    fn excluded_by(&self, join_point: &JoinPoint, filter: &str) -> InvocationResult<bool> {
        let receiver: &Object = join_point.this();
        let method = receiver
            .class()
            .method(filter)
            .ok_or_else(|| InvocationError::NoSuchMethod {
                class: receiver.class().name().to_string(),
                method: filter.to_string(),
            })?;
        if method.parameter_types() != join_point.signature().parameter_types() {
            return Err(InvocationError::IllegalArgument {
                method: filter.to_string(),
                reason: format!(
                    "parameters must match those of {}",
                    join_point.signature().name
                ),
            });
        }
        match receiver.invoke(filter, join_point.args())? {
            Value::Bool(excluded) => Ok(excluded),
            other => Err(InvocationError::IllegalArgument {
                method: filter.to_string(),
                reason: format!("expected a boolean result, got {}", other.type_name()),
            }),
        }
    }
}

/// Aspect wrapping objects returned by registered producer classes
pub struct ProxyProducerAspect {
    state: Arc<ProducerState>,
    defaults: ProducerDefaults,
}

impl ProxyProducerAspect {
    /// Create the aspect with no producers registered
    pub fn new(
        registry: Arc<AdvisorRegistry>,
        machine: Arc<dyn ProxyMachine>,
        copier: Arc<FieldCopier>,
        defaults: ProducerDefaults,
    ) -> Self {
        Self {
            state: Arc::new(ProducerState {
                producers: Arc::new(DashMap::new()),
                registry,
                machine,
                copier,
            }),
            defaults,
        }
    }

    /// Policy preloaded with the configured defaults
    pub fn policy(&self) -> ProducerPolicy {
        ProducerPolicy::new(self.defaults)
    }

    /// Mark `class` and its subclasses as producers
    ///
    /// Register producers before their class is first proxied; advisor
    /// selection is cached per class.
    pub fn register_producer(&self, class: &Class, policy: ProducerPolicy) {
        tracing::debug!(class = class.name(), "registered proxy producer");
        self.state
            .producers
            .insert(class.id(), Arc::new(policy));
    }

    /// Whether `class` or one of its ancestors is a registered producer
    pub fn is_producer(&self, class: &Class) -> bool {
        producer_policy(&self.state.producers, class).is_some()
    }

    /// Proceed with the call and wrap the returned object if the policy allows
    pub fn wrap_return(&self, join_point: &JoinPoint) -> InvocationResult<Value> {
        self.state.wrap_return(join_point)
    }

    /// The around advisor implementing this aspect
    ///
    /// The advisor holds the aspect weakly; once the aspect is dropped it
    /// simply proceeds.
    pub fn advisor(&self) -> Advisor {
        let state: Weak<ProducerState> = Arc::downgrade(&self.state);
        let pointcut = ProducerPointcut {
            producers: Arc::clone(&self.state.producers),
        };
        Advisor::around(PRODUCER_ADVISOR, pointcut, move |join_point: &JoinPoint| {
            match state.upgrade() {
                Some(state) => state.wrap_return(join_point),
                None => join_point.proceed(),
            }
        })
    }
}

impl fmt::Debug for ProxyProducerAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyProducerAspect")
            .field("producers", &self.state.producers.len())
            .field("defaults", &self.defaults)
            .finish()
    }
}
