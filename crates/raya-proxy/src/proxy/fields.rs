//! Field state transfer from a source instance onto its proxy
//!
//! The first copy for a class tries every instance field and remembers the
//! ones that succeeded. Later copies only try the remembered set; a field that
//! starts failing (for example after its permissions were revoked) is dropped
//! from the set, so the snapshot only ever shrinks.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::{FieldAccessError, ProxyError, ProxyResult};
use crate::model::{AccessPolicy, ClassId, FieldInfo, Object};

type Snapshot = Arc<RwLock<Vec<FieldInfo>>>;

/// Copies mutable field state between instances of compatible classes
#[derive(Debug)]
pub struct FieldCopier {
    policy: Arc<AccessPolicy>,
    snapshots: DashMap<ClassId, Snapshot>,
}

impl FieldCopier {
    /// Create a copier with no cached snapshots
    pub fn new(policy: Arc<AccessPolicy>) -> Self {
        Self {
            policy,
            snapshots: DashMap::new(),
        }
    }

    /// Access policy used for reflective reads and writes
    pub fn policy(&self) -> &Arc<AccessPolicy> {
        &self.policy
    }

    /// Copy eligible fields of `source` onto `target`
    ///
    /// `target` must be an instance of the source's class or a subclass.
    /// Individual field failures are not errors; the number of fields copied
    /// is returned.
    pub fn copy(&self, source: &Object, target: &Object) -> ProxyResult<usize> {
        let class = source.class();
        if !target.class().is_subclass_of(class.id()) {
            return Err(ProxyError::IncompatibleCopyTarget {
                source_class: class.name().to_string(),
                target_class: target.class().name().to_string(),
            });
        }

        let existing = self
            .snapshots
            .get(&class.id())
            .map(|snapshot| Arc::clone(&*snapshot));
        match existing {
            Some(snapshot) => Ok(self.copy_cached(&snapshot, source, target)),
            None => {
                let candidates: Vec<FieldInfo> = class
                    .instance_fields()
                    .into_iter()
                    .filter(|f| !f.is_static() && !f.is_final())
                    .cloned()
                    .collect();
                let mut eligible = Vec::with_capacity(candidates.len());
                for field in candidates {
                    if self.copy_field(&field, source, target).is_ok() {
                        eligible.push(field);
                    }
                }
                let copied = eligible.len();
                tracing::debug!(
                    class = class.name(),
                    eligible = copied,
                    "cached field copy snapshot"
                );
                self.snapshots
                    .entry(class.id())
                    .or_insert_with(|| Arc::new(RwLock::new(eligible)));
                Ok(copied)
            }
        }
    }

    /// Eligible field names for a class, if a snapshot exists
    pub fn eligible_fields(&self, class: ClassId) -> Option<Vec<String>> {
        self.snapshots
            .get(&class)
            .map(|snapshot| snapshot.read().iter().map(|f| f.name.clone()).collect())
    }

    fn copy_cached(&self, snapshot: &Snapshot, source: &Object, target: &Object) -> usize {
        let fields = snapshot.read().clone();
        let mut failed = Vec::new();
        for field in &fields {
            if self.copy_field(field, source, target).is_err() {
                failed.push(field.slot);
            }
        }
        if !failed.is_empty() {
            let mut guard = snapshot.write();
            guard.retain(|f| !failed.contains(&f.slot));
            tracing::debug!(
                class = source.class().name(),
                pruned = failed.len(),
                remaining = guard.len(),
                "pruned field copy snapshot"
            );
        }
        fields.len() - failed.len()
    }

    fn copy_field(
        &self,
        field: &FieldInfo,
        source: &Object,
        target: &Object,
    ) -> Result<(), FieldAccessError> {
        let result = self
            .policy
            .read_field(source, field)
            .and_then(|value| self.policy.write_field(target, field, value));
        if let Err(err) = &result {
            tracing::trace!(field = %field.qualified_name(), error = %err, "field not copied");
        }
        result
    }
}
