//! Advisor selection and the policies deciding which objects get proxied

mod lifecycle;
mod producer;
mod registry;

pub use lifecycle::{AspectAwareProcessor, ASPECT_AWARE};
pub use producer::{Exclusion, ProducerPolicy, ProxyProducerAspect, PRODUCER_ADVISOR};
pub use registry::AdvisorRegistry;
