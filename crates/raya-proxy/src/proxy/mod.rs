//! Proxy engine
//!
//! - [`TypeSynthesizer`] builds a synthetic subclass overriding the methods
//!   selected by around advisors
//! - [`ConstructorResolver`] picks how proxy instances are constructed
//! - [`TypeCache`] keeps one synthesized type per source class
//! - [`CachingProxyMachine`] ties them together behind [`ProxyMachine`]
//! - [`FieldCopier`] moves field state from a source onto its proxy

mod cache;
mod constructor;
mod fields;
mod machine;
mod synthesizer;

pub use cache::TypeCache;
pub use constructor::{AutowireProvider, ConstructorPlan, ConstructorResolver, ConstructorStrategy};
pub use fields::FieldCopier;
pub use machine::{is_proxy, CachingProxyMachine, ProxyMachine};
pub use synthesizer::{ProxyType, TypeSynthesizer};
