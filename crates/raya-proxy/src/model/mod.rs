//! Host object model
//!
//! Runtime classes, instances and values that proxies are synthesized for:
//! - [`Class`] descriptors with a virtual method table, built by [`ClassBuilder`]
//! - [`Object`] instances dispatching through their class's vtable
//! - [`Value`] and [`TypeInfo`] for arguments, returns and fields
//! - [`AccessPolicy`] governing reflective field access

mod access;
mod class;
mod object;
mod types;
mod value;

pub use access::{AccessPermission, AccessPolicy, ClassPermissionRule};
pub use class::{
    ClassBuilder, ClassId, Class, ConstructorDefinition, ConstructorFn, ConstructorInfo,
    DecoratorInfo, FieldDefinition, FieldInfo, MethodDefinition, MethodFn, MethodInfo, Modifiers,
    ParameterInfo, Visibility, VTable,
};
pub(crate) use class::check_arguments;
pub use object::Object;
pub use types::{TypeInfo, TypeKind};
pub use value::Value;
