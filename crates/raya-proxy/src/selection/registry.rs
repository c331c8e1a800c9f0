//! Registry of advisors and per-class advisor selection

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::aop::Advisor;
use crate::model::{Class, ClassId};

/// Append-only advisor registry
///
/// `advisors_for` results are cached per class the first time they are
/// computed. Advisors registered afterwards are not added to classes that
/// already have a cached selection.
#[derive(Debug, Default)]
pub struct AdvisorRegistry {
    /// Registered advisors in registration order
    advisors: RwLock<Vec<Arc<Advisor>>>,
    /// Class ID -> advisors that apply to it
    by_class: DashMap<ClassId, Arc<[Arc<Advisor>]>>,
}

impl AdvisorRegistry {
    /// Create a new empty advisor registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an advisor
    pub fn register(&self, advisor: Advisor) -> Arc<Advisor> {
        let advisor = Arc::new(advisor);
        self.advisors.write().push(Arc::clone(&advisor));
        advisor
    }

    /// Register several advisors, preserving their order
    pub fn register_all(&self, advisors: impl IntoIterator<Item = Advisor>) {
        let mut registered = self.advisors.write();
        registered.extend(advisors.into_iter().map(Arc::new));
    }

    /// Advisors that can apply to `class`, in registration order
    pub fn advisors_for(&self, class: &Class) -> Arc<[Arc<Advisor>]> {
        if let Some(cached) = self.by_class.get(&class.id()) {
            return Arc::clone(&*cached);
        }

        let applicable: Arc<[Arc<Advisor>]> = self
            .advisors
            .read()
            .iter()
            .filter(|advisor| advisor.can_apply(class))
            .cloned()
            .collect();
        tracing::debug!(
            class = class.name(),
            advisors = applicable.len(),
            "resolved advisors for class"
        );
        Arc::clone(
            &*self
                .by_class
                .entry(class.id())
                .or_insert(applicable),
        )
    }

    /// Number of registered advisors
    pub fn len(&self) -> usize {
        self.advisors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All registered advisors
    pub fn all(&self) -> Vec<Arc<Advisor>> {
        self.advisors.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aop::MethodNamePointcut;
    use crate::model::{ClassBuilder, MethodDefinition, Value};

    fn class_with(method: &str) -> Arc<Class> {
        ClassBuilder::new(format!("Has_{}", method))
            .method(MethodDefinition::new(method, |_, _| Ok(Value::Null)))
            .build()
    }

    fn advisor(name: &str, method: &str) -> Advisor {
        Advisor::around(name, MethodNamePointcut::new(method), |jp| jp.proceed())
    }

    #[test]
    fn test_selects_applicable_advisors_in_order() {
        let registry = AdvisorRegistry::new();
        registry.register_all([advisor("a", "run"), advisor("b", "stop"), advisor("c", "run")]);

        let selected = registry.advisors_for(&class_with("run"));
        let names: Vec<_> = selected.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_selection_is_cached() {
        let registry = AdvisorRegistry::new();
        registry.register(advisor("a", "run"));
        let class = class_with("run");

        let first = registry.advisors_for(&class);
        registry.register(advisor("late", "run"));
        let second = registry.advisors_for(&class);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 1);

        // A class seen for the first time picks up the late advisor
        assert_eq!(registry.advisors_for(&class_with("run")).len(), 2);
    }

    #[test]
    fn test_no_applicable_advisors() {
        let registry = AdvisorRegistry::new();
        registry.register(advisor("a", "run"));
        assert!(registry.advisors_for(&class_with("walk")).is_empty());
    }
}
