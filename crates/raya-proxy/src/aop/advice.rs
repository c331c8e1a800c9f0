//! Advice and advisors

use std::fmt;
use std::sync::Arc;

use crate::error::InvocationResult;
use crate::model::{Class, Value};

use super::{JoinPoint, Pointcut};

/// Around advice: receives the join point, decides whether to proceed
pub type AroundFn = Arc<dyn Fn(&JoinPoint) -> InvocationResult<Value> + Send + Sync>;

/// Advice run before the original body
pub type BeforeFn = Arc<dyn Fn(&JoinPoint) -> InvocationResult<()> + Send + Sync>;

/// Advice run with the value the original body returned
pub type AfterReturningFn = Arc<dyn Fn(&JoinPoint, &Value) + Send + Sync>;

/// Kind of advice an advisor carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdviceKind {
    /// Wraps the call
    Around,
    /// Runs before the call
    Before,
    /// Runs after a successful return
    AfterReturning,
}

/// Interception logic attached to an advisor
///
/// Only around advice is woven into proxy types. The other kinds are kept by
/// the registry for callers that run them themselves.
#[derive(Clone)]
pub enum Advice {
    Around(AroundFn),
    Before(BeforeFn),
    AfterReturning(AfterReturningFn),
}

impl Advice {
    pub fn kind(&self) -> AdviceKind {
        match self {
            Advice::Around(_) => AdviceKind::Around,
            Advice::Before(_) => AdviceKind::Before,
            Advice::AfterReturning(_) => AdviceKind::AfterReturning,
        }
    }

    /// The around body, if this is around advice
    pub fn as_around(&self) -> Option<&AroundFn> {
        match self {
            Advice::Around(f) => Some(f),
            _ => None,
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Advice::{:?}", self.kind())
    }
}

/// A pointcut paired with the advice to run where it matches
#[derive(Clone)]
pub struct Advisor {
    name: String,
    pointcut: Arc<dyn Pointcut>,
    advice: Advice,
}

impl Advisor {
    /// Pair a pointcut with an advice under `name`
    pub fn new(name: impl Into<String>, pointcut: Arc<dyn Pointcut>, advice: Advice) -> Self {
        Self {
            name: name.into(),
            pointcut,
            advice,
        }
    }

    /// Around advisor from a closure
    pub fn around<P, F>(name: impl Into<String>, pointcut: P, advice: F) -> Self
    where
        P: Pointcut + 'static,
        F: Fn(&JoinPoint) -> InvocationResult<Value> + Send + Sync + 'static,
    {
        Self::new(name, Arc::new(pointcut), Advice::Around(Arc::new(advice)))
    }

    /// Before advisor from a closure
    pub fn before<P, F>(name: impl Into<String>, pointcut: P, advice: F) -> Self
    where
        P: Pointcut + 'static,
        F: Fn(&JoinPoint) -> InvocationResult<()> + Send + Sync + 'static,
    {
        Self::new(name, Arc::new(pointcut), Advice::Before(Arc::new(advice)))
    }

    /// After-returning advisor from a closure
    pub fn after_returning<P, F>(name: impl Into<String>, pointcut: P, advice: F) -> Self
    where
        P: Pointcut + 'static,
        F: Fn(&JoinPoint, &Value) + Send + Sync + 'static,
    {
        Self::new(
            name,
            Arc::new(pointcut),
            Advice::AfterReturning(Arc::new(advice)),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pointcut(&self) -> &Arc<dyn Pointcut> {
        &self.pointcut
    }

    pub fn advice(&self) -> &Advice {
        &self.advice
    }

    /// Whether this advisor selects at least one method visible on `class`
    pub fn can_apply(&self, class: &Class) -> bool {
        self.pointcut.matches_class(class)
            && class
                .all_methods()
                .into_iter()
                .any(|m| self.pointcut.matches(m, class))
    }
}

impl fmt::Debug for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advisor")
            .field("name", &self.name)
            .field("advice", &self.advice)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aop::{FnPointcut, MethodNamePointcut};
    use crate::model::{ClassBuilder, MethodDefinition, MethodInfo};

    fn base_and_derived() -> (Arc<Class>, Arc<Class>) {
        let base = ClassBuilder::new("Base")
            .method(MethodDefinition::new("inherited", |_, _| Ok(Value::Null)))
            .build();
        let derived = ClassBuilder::new("Derived")
            .extends(&base)
            .method(MethodDefinition::new("own", |_, _| Ok(Value::Null)))
            .build();
        (base, derived)
    }

    #[test]
    fn test_can_apply_sees_inherited_methods() {
        let (base, derived) = base_and_derived();
        let advisor = Advisor::around("a", MethodNamePointcut::new("inherited"), |jp| jp.proceed());
        assert!(advisor.can_apply(&base));
        assert!(advisor.can_apply(&derived));

        let own_only = Advisor::around("b", MethodNamePointcut::new("own"), |jp| jp.proceed());
        assert!(!own_only.can_apply(&base));
        assert!(own_only.can_apply(&derived));
    }

    #[test]
    fn test_can_apply_respects_class_filter() {
        struct OnlyDerived;
        impl Pointcut for OnlyDerived {
            fn matches(&self, _: &MethodInfo, _: &Class) -> bool {
                true
            }
            fn matches_class(&self, class: &Class) -> bool {
                class.name() == "Derived"
            }
        }

        let (base, derived) = base_and_derived();
        let advisor = Advisor::around("c", OnlyDerived, |jp| jp.proceed());
        assert!(!advisor.can_apply(&base));
        assert!(advisor.can_apply(&derived));
    }

    #[test]
    fn test_advice_kinds() {
        let any = || FnPointcut::new(|_: &MethodInfo, _: &Class| true);
        let around = Advisor::around("a", any(), |jp| jp.proceed());
        let before = Advisor::before("b", any(), |_| Ok(()));
        let after = Advisor::after_returning("c", any(), |_, _| {});

        assert_eq!(around.advice().kind(), AdviceKind::Around);
        assert!(around.advice().as_around().is_some());
        assert_eq!(before.advice().kind(), AdviceKind::Before);
        assert!(before.advice().as_around().is_none());
        assert_eq!(after.advice().kind(), AdviceKind::AfterReturning);
        assert_eq!(after.name(), "c");
    }
}
