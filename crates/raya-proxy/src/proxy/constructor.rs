//! Constructor selection for synthesized proxy types
//!
//! Strategies are tried in a fixed order: copy construction, autowiring,
//! then the no-argument constructor. The chosen plan is fixed when the proxy
//! type is synthesized; only the copy strategy's argument changes per
//! instance, since it is always the source object of the current call.

use std::fmt;
use std::sync::Arc;

use crate::error::{ProxyError, ProxyResult};
use crate::model::{Class, ConstructorInfo, Object, TypeKind, Value};

/// Supplies constructor choices and arguments for autowired construction
pub trait AutowireProvider: Send + Sync {
    /// Pick the constructor to autowire, by index into `class.constructors()`
    fn resolve_constructor(&self, class: &Class) -> Option<usize>;

    /// Supply arguments for the chosen constructor
    fn resolve_arguments(
        &self,
        class: &Class,
        constructor: &ConstructorInfo,
    ) -> ProxyResult<Vec<Value>>;
}

/// How the proxy instance is constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorStrategy {
    /// Single-parameter constructor taking an instance of the source class
    Copy,
    /// Constructor and arguments chosen by the autowire provider
    Autowired,
    /// No-argument constructor
    Default,
}

impl fmt::Display for ConstructorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstructorStrategy::Copy => "copy",
            ConstructorStrategy::Autowired => "autowired",
            ConstructorStrategy::Default => "default",
        };
        f.write_str(name)
    }
}

/// The constructor a proxy type delegates to, and what feeds it
#[derive(Debug, Clone)]
pub struct ConstructorPlan {
    /// Chosen strategy
    pub strategy: ConstructorStrategy,
    /// Index into the source class's constructors
    pub constructor: usize,
    /// Arguments bound at synthesis time (empty for copy and default)
    pub arguments: Vec<Value>,
}

impl ConstructorPlan {
    /// Arguments for instantiating a proxy of `source`
    pub fn arguments_for(&self, source: &Object) -> Vec<Value> {
        match self.strategy {
            ConstructorStrategy::Copy => vec![Value::Object(source.clone())],
            _ => self.arguments.clone(),
        }
    }
}

/// Chooses the construction strategy for a proxy type
#[derive(Clone, Default)]
pub struct ConstructorResolver {
    autowire: Option<Arc<dyn AutowireProvider>>,
}

impl ConstructorResolver {
    /// Create a resolver, optionally backed by an autowire provider
    pub fn new(autowire: Option<Arc<dyn AutowireProvider>>) -> Self {
        Self { autowire }
    }

    /// Whether an autowire provider is configured
    pub fn has_autowire(&self) -> bool {
        self.autowire.is_some()
    }

    /// Choose how to construct a proxy of `source` for `instance`
    pub fn resolve(
        &self,
        source: &Arc<Class>,
        instance: &Object,
        use_copy_constructor: bool,
        use_autowiring: bool,
    ) -> ProxyResult<ConstructorPlan> {
        if instance.class().id() != source.id() {
            return Err(ProxyError::Construction {
                class: source.name().to_string(),
                reason: format!("source instance is a {}", instance.class().name()),
            });
        }

        if use_copy_constructor {
            if let Some(index) = copy_constructor(source) {
                return Ok(self.plan(source, ConstructorStrategy::Copy, index, Vec::new()));
            }
        }

        if use_autowiring {
            match &self.autowire {
                Some(provider) => {
                    if let Some(index) = provider.resolve_constructor(source) {
                        let constructor = source.constructors().get(index).ok_or_else(|| {
                            ProxyError::Construction {
                                class: source.name().to_string(),
                                reason: format!("autowired constructor #{} does not exist", index),
                            }
                        })?;
                        let arguments = provider.resolve_arguments(source, constructor)?;
                        if !constructor.accepts(&arguments) {
                            return Err(ProxyError::Construction {
                                class: source.name().to_string(),
                                reason: format!(
                                    "autowired arguments do not fit constructor #{}",
                                    index
                                ),
                            });
                        }
                        return Ok(self.plan(source, ConstructorStrategy::Autowired, index, arguments));
                    }
                }
                None => {
                    tracing::warn!(
                        class = source.name(),
                        "autowiring requested but no provider is configured"
                    );
                }
            }
        }

        source
            .constructors()
            .iter()
            .position(|c| c.arity() == 0)
            .map(|index| self.plan(source, ConstructorStrategy::Default, index, Vec::new()))
            .ok_or_else(|| ProxyError::Construction {
                class: source.name().to_string(),
                reason: "no copy, autowired or no-argument constructor available".to_string(),
            })
    }

    fn plan(
        &self,
        source: &Class,
        strategy: ConstructorStrategy,
        constructor: usize,
        arguments: Vec<Value>,
    ) -> ConstructorPlan {
        tracing::debug!(
            class = source.name(),
            %strategy,
            constructor,
            "selected proxy constructor"
        );
        ConstructorPlan {
            strategy,
            constructor,
            arguments,
        }
    }
}

impl fmt::Debug for ConstructorResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorResolver")
            .field("autowire", &self.autowire.is_some())
            .finish()
    }
}

fn copy_constructor(class: &Class) -> Option<usize> {
    class.constructors().iter().position(|c| {
        matches!(c.parameters.as_slice(), [p]
            if p.type_info.kind == TypeKind::Class && p.type_info.class_id == Some(class.id()))
    })
}
