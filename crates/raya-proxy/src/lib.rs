//! Raya Proxy Engine
//!
//! Runtime synthesis of interception proxies over a dynamic object model:
//! - **Model**: classes with virtual method tables, objects, values and the
//!   reflective access policy (`model` module)
//! - **AOP**: pointcuts, advice, advisors and join points (`aop` module)
//! - **Proxy**: type synthesis, constructor selection, type cache and field
//!   copying (`proxy` module)
//! - **Selection**: advisor registry, wrap-on-return producers and the
//!   aspect-aware post-processor (`selection` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use raya_proxy::{Advisor, CachingProxyMachine, MethodNamePointcut, Object, ProxyMachine, Value};
//!
//! let advisor = Arc::new(Advisor::around("trace", MethodNamePointcut::new("greet"), |jp| {
//!     let result = jp.proceed()?;
//!     Ok(Value::from(format!("{}!", result)))
//! }));
//!
//! let machine = CachingProxyMachine::default();
//! let proxy = machine.create(&greeter, &[advisor], true, false)?;
//! proxy.invoke("greet", &[Value::from("Mary")])?;
//! ```

#![warn(rust_2018_idioms)]

// ============================================================================
// Modules
// ============================================================================

/// Aspect primitives
pub mod aop;

/// Engine configuration
pub mod config;

/// Startup wiring
pub mod context;

/// Error types
pub mod error;

/// Dynamic object model
pub mod model;

/// Proxy synthesis and instantiation
pub mod proxy;

/// Advisor selection and proxying policies
pub mod selection;

// ============================================================================
// Re-exports
// ============================================================================

pub use aop::{
    Advice, AdviceKind, Advisor, AroundFn, DecoratorPointcut, FnPointcut, JoinPoint,
    JoinPointAdapter, MethodNamePointcut, MethodSignature, Pointcut,
};
pub use config::{AccessConfig, EngineConfig, OverridePolicy, ProducerDefaults, ProxyConfig};
pub use context::{AspectContext, AspectContextBuilder};
pub use error::{
    AccessError, ConfigError, FieldAccessError, InvocationError, InvocationResult, ProxyError,
    ProxyResult,
};
pub use model::{
    AccessPermission, AccessPolicy, Class, ClassBuilder, ClassId, ConstructorDefinition,
    DecoratorInfo, FieldDefinition, MethodDefinition, Object, TypeInfo, Value,
};
pub use proxy::{
    is_proxy, AutowireProvider, CachingProxyMachine, ConstructorStrategy, FieldCopier,
    ProxyMachine, ProxyType,
};
pub use selection::{
    AdvisorRegistry, AspectAwareProcessor, Exclusion, ProducerPolicy, ProxyProducerAspect,
    ASPECT_AWARE,
};
