//! Pointcuts: opaque predicates selecting methods to intercept

use std::fmt;

use crate::model::{Class, MethodInfo};

/// Method selection predicate
///
/// `matches_class` is a cheap class filter checked before any method is
/// tested; the default accepts every class.
pub trait Pointcut: Send + Sync {
    /// Whether `method`, seen on `class`, should be intercepted
    fn matches(&self, method: &MethodInfo, class: &Class) -> bool;

    /// Whether methods of `class` are candidates at all
    fn matches_class(&self, _class: &Class) -> bool {
        true
    }
}

/// Matches methods by name
#[derive(Debug, Clone)]
pub struct MethodNamePointcut {
    names: Vec<String>,
}

impl MethodNamePointcut {
    /// Match a single method name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
        }
    }

    /// Match any of the given names
    pub fn any_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Pointcut for MethodNamePointcut {
    fn matches(&self, method: &MethodInfo, _class: &Class) -> bool {
        self.names.iter().any(|n| *n == method.name)
    }
}

/// Matches methods carrying a decorator
#[derive(Debug, Clone)]
pub struct DecoratorPointcut {
    decorator: String,
}

impl DecoratorPointcut {
    /// Match methods decorated with `decorator`
    pub fn new(decorator: impl Into<String>) -> Self {
        Self {
            decorator: decorator.into(),
        }
    }
}

impl Pointcut for DecoratorPointcut {
    fn matches(&self, method: &MethodInfo, _class: &Class) -> bool {
        method.has_decorator(&self.decorator)
    }
}

/// Pointcut backed by a closure
pub struct FnPointcut<F>(F);

impl<F> FnPointcut<F>
where
    F: Fn(&MethodInfo, &Class) -> bool + Send + Sync,
{
    /// Wrap a predicate
    pub fn new(predicate: F) -> Self {
        Self(predicate)
    }
}

impl<F> Pointcut for FnPointcut<F>
where
    F: Fn(&MethodInfo, &Class) -> bool + Send + Sync,
{
    fn matches(&self, method: &MethodInfo, class: &Class) -> bool {
        (self.0)(method, class)
    }
}

impl<F> fmt::Debug for FnPointcut<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnPointcut")
    }
}
