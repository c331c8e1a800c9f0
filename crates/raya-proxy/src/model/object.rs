//! Object instances

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{InvocationError, InvocationResult};

use super::class::check_arguments;
use super::{Class, Value};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

struct ObjectData {
    id: u64,
    class: Arc<Class>,
    fields: RwLock<Vec<Value>>,
}

/// Shared handle to an instance
///
/// Field locks are held for a single read or write only, never across a
/// method call, so method bodies may freely call back into the receiver.
#[derive(Clone)]
pub struct Object(Arc<ObjectData>);

impl Object {
    /// Allocate an instance with initial field values, without running a constructor
    pub fn allocate(class: &Arc<Class>) -> Self {
        let fields = class
            .instance_fields()
            .iter()
            .map(|f| f.initial_value.clone())
            .collect();
        Object(Arc::new(ObjectData {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            class: Arc::clone(class),
            fields: RwLock::new(fields),
        }))
    }

    /// Allocate and run the constructor at `index`
    pub fn construct(class: &Arc<Class>, index: usize, args: &[Value]) -> InvocationResult<Self> {
        let ctor = class.constructors().get(index).ok_or_else(|| {
            InvocationError::NoSuchMethod {
                class: class.name().to_string(),
                method: format!("<init>#{}", index),
            }
        })?;
        let obj = Object::allocate(class);
        ctor.invoke(&obj, args)?;
        Ok(obj)
    }

    /// Allocate and run the first constructor that accepts `args`
    pub fn instantiate(class: &Arc<Class>, args: &[Value]) -> InvocationResult<Self> {
        let index = class
            .constructors()
            .iter()
            .position(|c| c.accepts(args))
            .ok_or_else(|| InvocationError::IllegalArgument {
                method: format!("{}.<init>", class.name()),
                reason: format!("no constructor accepts {} argument(s)", args.len()),
            })?;
        Object::construct(class, index, args)
    }

    /// Unique instance ID
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Class of this instance
    pub fn class(&self) -> &Arc<Class> {
        &self.0.class
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Call a method through the receiver's vtable
    pub fn invoke(&self, name: &str, args: &[Value]) -> InvocationResult<Value> {
        let class = self.class();
        let body = class
            .vtable()
            .lookup(name)
            .ok_or_else(|| InvocationError::NoSuchMethod {
                class: class.name().to_string(),
                method: name.to_string(),
            })?;
        if let Some(method) = class.method(name) {
            check_arguments(&method.parameters, args).map_err(|reason| {
                InvocationError::IllegalArgument {
                    method: name.to_string(),
                    reason,
                }
            })?;
        }
        body(self, args)
    }

    /// Read a field by name
    pub fn get(&self, name: &str) -> InvocationResult<Value> {
        let slot = self.slot_of(name)?;
        self.get_slot(slot).ok_or_else(|| self.missing_field(name))
    }

    /// Write a field by name, checking the declared type
    pub fn set(&self, name: &str, value: impl Into<Value>) -> InvocationResult<()> {
        let value = value.into();
        let field = self
            .class()
            .field(name)
            .ok_or_else(|| self.missing_field(name))?;
        if !field.type_info.accepts(&value) {
            return Err(InvocationError::IllegalArgument {
                method: format!("{}.{}", self.class().name(), name),
                reason: format!("expects {}, got {}", field.type_info, value.type_name()),
            });
        }
        let slot = self.slot_of(name)?;
        if self.set_slot(slot, value) {
            Ok(())
        } else {
            Err(self.missing_field(name))
        }
    }

    pub(crate) fn get_slot(&self, slot: usize) -> Option<Value> {
        self.0.fields.read().get(slot).cloned()
    }

    pub(crate) fn set_slot(&self, slot: usize, value: Value) -> bool {
        match self.0.fields.write().get_mut(slot) {
            Some(entry) => {
                *entry = value;
                true
            }
            None => false,
        }
    }

    fn slot_of(&self, name: &str) -> InvocationResult<usize> {
        self.class()
            .field(name)
            .and_then(|f| f.slot)
            .ok_or_else(|| self.missing_field(name))
    }

    fn missing_field(&self, name: &str) -> InvocationError {
        InvocationError::NoSuchMethod {
            class: self.class().name().to_string(),
            method: name.to_string(),
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.0.id)
            .field("class", &self.0.class.name())
            .field("fields", &*self.0.fields.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ClassBuilder, ConstructorDefinition, FieldDefinition, MethodDefinition, TypeInfo,
    };

    fn counter() -> Arc<Class> {
        ClassBuilder::new("Counter")
            .field(FieldDefinition::new("count", TypeInfo::int()).initial_value(0))
            .constructor(ConstructorDefinition::new(|_, _| Ok(())))
            .constructor(
                ConstructorDefinition::new(|this, args| this.set("count", args[0].clone()))
                    .param("start", TypeInfo::int()),
            )
            .method(
                MethodDefinition::new("add", |this, args| {
                    let current = this.get("count")?.as_int().unwrap_or(0);
                    let delta = args[0].as_int().unwrap_or(0);
                    this.set("count", current + delta)?;
                    Ok(Value::from(current + delta))
                })
                .param("delta", TypeInfo::int())
                .returns(TypeInfo::int()),
            )
            .build()
    }

    #[test]
    fn test_allocate_uses_initial_values() {
        let obj = Object::allocate(&counter());
        assert_eq!(obj.get("count").unwrap(), Value::from(0));
    }

    #[test]
    fn test_instantiate_picks_matching_constructor() {
        let class = counter();
        let obj = Object::instantiate(&class, &[Value::from(10)]).unwrap();
        assert_eq!(obj.get("count").unwrap(), Value::from(10));

        let err = Object::instantiate(&class, &[Value::from("x")]).unwrap_err();
        assert!(matches!(err, InvocationError::IllegalArgument { .. }));
    }

    #[test]
    fn test_invoke_dispatches_and_checks_args() {
        let obj = Object::instantiate(&counter(), &[]).unwrap();
        assert_eq!(obj.invoke("add", &[Value::from(5)]).unwrap(), Value::from(5));
        assert_eq!(obj.invoke("add", &[Value::from(2)]).unwrap(), Value::from(7));

        assert!(matches!(
            obj.invoke("add", &[]),
            Err(InvocationError::IllegalArgument { .. })
        ));
        assert!(matches!(
            obj.invoke("missing", &[]),
            Err(InvocationError::NoSuchMethod { .. })
        ));
    }

    #[test]
    fn test_set_rejects_wrong_type() {
        let obj = Object::allocate(&counter());
        assert!(obj.set("count", "ten").is_err());
        assert!(obj.set("count", 10).is_ok());
    }

    #[test]
    fn test_identity() {
        let class = counter();
        let a = Object::allocate(&class);
        let b = Object::allocate(&class);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }
}
