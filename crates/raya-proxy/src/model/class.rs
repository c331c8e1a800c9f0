//! Class descriptors and the dynamic class builder
//!
//! A [`Class`] is an immutable runtime descriptor: declared fields, declared
//! methods, constructors, decorators and a virtual method table. Subclasses
//! start from a copy of the parent's vtable, so overriding a method replaces
//! the parent's slot while every other slot keeps pointing at the inherited
//! body.
//!
//! ```rust,ignore
//! let point = ClassBuilder::new("Point")
//!     .field(FieldDefinition::new("x", TypeInfo::int()).initial_value(Value::from(0)))
//!     .method(MethodDefinition::new("x", |this, _| this.get("x")).returns(TypeInfo::int()))
//!     .build();
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{InvocationError, InvocationResult};

use super::{Object, TypeInfo, Value};

/// Method body: receives the receiver and the call arguments
pub type MethodFn = Arc<dyn Fn(&Object, &[Value]) -> InvocationResult<Value> + Send + Sync>;

/// Constructor body: initializes an allocated instance
pub type ConstructorFn = Arc<dyn Fn(&Object, &[Value]) -> InvocationResult<()> + Send + Sync>;

static NEXT_CLASS_ID: AtomicU64 = AtomicU64::new(1);

/// Unique class identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u64);

impl ClassId {
    /// Allocate a new unique ClassId
    pub fn next() -> Self {
        ClassId(NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Member visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Visible to everyone
    #[default]
    Public,
    /// Visible to the declaring class only
    Private,
}

/// Modifier flags for fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Visibility
    pub visibility: Visibility,
    /// Static member
    pub is_static: bool,
    /// Final (write-once) field
    pub is_final: bool,
}

/// Decorator attached to a class or method
#[derive(Debug, Clone)]
pub struct DecoratorInfo {
    /// Decorator name
    pub name: String,
    /// Decorator arguments
    pub args: Vec<Value>,
}

impl DecoratorInfo {
    /// Create a decorator without arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }
}

/// Field information
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Field type info
    pub type_info: TypeInfo,
    /// Declaring class ID
    pub declaring_class: ClassId,
    /// Declaring class name
    pub declaring_class_name: String,
    /// Instance slot (None for static fields)
    pub slot: Option<usize>,
    /// Modifiers
    pub modifiers: Modifiers,
    /// Value assigned at allocation
    pub initial_value: Value,
}

impl FieldInfo {
    /// Whether the field is static
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static
    }

    /// Whether the field is final
    pub fn is_final(&self) -> bool {
        self.modifiers.is_final
    }

    /// Whether the field is public
    pub fn is_public(&self) -> bool {
        self.modifiers.visibility == Visibility::Public
    }

    /// `Class.field`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.declaring_class_name, self.name)
    }
}

/// Parameter information
#[derive(Debug, Clone)]
pub struct ParameterInfo {
    /// Parameter name
    pub name: String,
    /// Parameter type info
    pub type_info: TypeInfo,
}

/// Method information
#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// Method name
    pub name: String,
    /// Parameter infos
    pub parameters: Vec<ParameterInfo>,
    /// Return type info
    pub return_type: TypeInfo,
    /// Declaring class ID
    pub declaring_class: ClassId,
    /// Method slot in vtable
    pub slot: usize,
    /// Decorators on this method
    pub decorators: Vec<DecoratorInfo>,
}

impl MethodInfo {
    /// Parameter types in declaration order
    pub fn parameter_types(&self) -> Vec<TypeInfo> {
        self.parameters.iter().map(|p| p.type_info.clone()).collect()
    }

    /// Check for a decorator by name
    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators.iter().any(|d| d.name == name)
    }

    /// Find a decorator by name
    pub fn decorator(&self, name: &str) -> Option<&DecoratorInfo> {
        self.decorators.iter().find(|d| d.name == name)
    }
}

/// Check `args` against `params`, returning a reason on mismatch
pub(crate) fn check_arguments(params: &[ParameterInfo], args: &[Value]) -> Result<(), String> {
    if params.len() != args.len() {
        return Err(format!(
            "expected {} argument(s), got {}",
            params.len(),
            args.len()
        ));
    }
    for (param, arg) in params.iter().zip(args) {
        if !param.type_info.accepts(arg) {
            return Err(format!(
                "parameter '{}' expects {}, got {}",
                param.name,
                param.type_info,
                arg.type_name()
            ));
        }
    }
    Ok(())
}

/// Constructor information
#[derive(Clone)]
pub struct ConstructorInfo {
    /// Parameter infos
    pub parameters: Vec<ParameterInfo>,
    /// Declaring class ID
    pub declaring_class: ClassId,
    body: ConstructorFn,
}

impl ConstructorInfo {
    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Whether the arguments fit this constructor
    pub fn accepts(&self, args: &[Value]) -> bool {
        check_arguments(&self.parameters, args).is_ok()
    }

    /// Constructor body
    pub fn body(&self) -> &ConstructorFn {
        &self.body
    }

    /// Run the constructor body on an allocated instance
    pub fn invoke(&self, this: &Object, args: &[Value]) -> InvocationResult<()> {
        check_arguments(&self.parameters, args).map_err(|reason| {
            InvocationError::IllegalArgument {
                method: format!("{}.<init>", this.class().name()),
                reason,
            }
        })?;
        (self.body)(this, args)
    }
}

impl fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorInfo")
            .field("parameters", &self.parameters)
            .field("declaring_class", &self.declaring_class)
            .finish()
    }
}

/// Virtual method table for dynamic dispatch
#[derive(Clone, Default)]
pub struct VTable {
    /// Method bodies (indexed by method slot)
    slots: Vec<MethodFn>,
    /// Method name to slot mapping
    by_name: FxHashMap<String, usize>,
}

impl VTable {
    /// Create a new empty vtable
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method, overriding the slot if the name already exists
    pub fn add_method(&mut self, name: &str, body: MethodFn) -> usize {
        if let Some(&slot) = self.by_name.get(name) {
            self.slots[slot] = body;
            return slot;
        }
        let slot = self.slots.len();
        self.slots.push(body);
        self.by_name.insert(name.to_string(), slot);
        slot
    }

    /// Override a method at a specific slot
    pub fn override_slot(&mut self, slot: usize, body: MethodFn) -> Result<(), String> {
        match self.slots.get_mut(slot) {
            Some(entry) => {
                *entry = body;
                Ok(())
            }
            None => Err(format!("Method slot {} out of bounds", slot)),
        }
    }

    /// Get method body by slot
    pub fn get(&self, slot: usize) -> Option<&MethodFn> {
        self.slots.get(slot)
    }

    /// Get the slot of a method name
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Get method body by name
    pub fn lookup(&self, name: &str) -> Option<&MethodFn> {
        self.slot_of(name).and_then(|slot| self.slots.get(slot))
    }

    /// Get number of methods
    pub fn method_count(&self) -> usize {
        self.slots.len()
    }
}

impl fmt::Debug for VTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.by_name.iter().collect();
        names.sort_by_key(|(_, slot)| **slot);
        f.debug_struct("VTable")
            .field("methods", &names.into_iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

/// Runtime class descriptor
pub struct Class {
    id: ClassId,
    name: String,
    parent: Option<Arc<Class>>,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodInfo>,
    constructors: Vec<ConstructorInfo>,
    decorators: Vec<DecoratorInfo>,
    vtable: VTable,
    instance_field_count: usize,
    synthetic: bool,
}

impl Class {
    /// Class ID
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent class, if any
    pub fn parent(&self) -> Option<&Arc<Class>> {
        self.parent.as_ref()
    }

    /// Fields declared by this class (not inherited)
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Methods declared by this class (not inherited)
    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    /// Declared constructors
    pub fn constructors(&self) -> &[ConstructorInfo] {
        &self.constructors
    }

    /// Class decorators
    pub fn decorators(&self) -> &[DecoratorInfo] {
        &self.decorators
    }

    /// Virtual method table
    pub fn vtable(&self) -> &VTable {
        &self.vtable
    }

    /// Whether this class was produced by the proxy synthesizer
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Number of instance fields (including inherited)
    pub fn instance_field_count(&self) -> usize {
        self.instance_field_count
    }

    /// Check for a class decorator by name
    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators.iter().any(|d| d.name == name)
    }

    /// Type info naming this class
    pub fn self_type(&self) -> TypeInfo {
        TypeInfo::class(&self.name, self.id)
    }

    /// Find a method by name, most-derived declaration first
    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .or_else(|| self.parent.as_ref().and_then(|p| p.method(name)))
    }

    /// All visible methods, most-derived first, one entry per name
    pub fn all_methods(&self) -> Vec<&MethodInfo> {
        let mut seen = Vec::new();
        let mut methods = Vec::new();
        let mut current = Some(self);
        while let Some(class) = current {
            for method in &class.methods {
                if !seen.contains(&method.name.as_str()) {
                    seen.push(method.name.as_str());
                    methods.push(method);
                }
            }
            current = class.parent.as_deref();
        }
        methods
    }

    /// Find a field by name, most-derived declaration first
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.parent.as_ref().and_then(|p| p.field(name)))
    }

    /// All instance fields in slot order (inherited first)
    pub fn instance_fields(&self) -> Vec<&FieldInfo> {
        let mut fields = match &self.parent {
            Some(parent) => parent.instance_fields(),
            None => Vec::new(),
        };
        fields.extend(self.fields.iter().filter(|f| !f.is_static()));
        fields
    }

    /// Check if this class is `class_id` or one of its subclasses
    pub fn is_subclass_of(&self, class_id: ClassId) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.id == class_id {
                return true;
            }
            current = class.parent.as_deref();
        }
        false
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("fields", &self.fields.len())
            .field("methods", &self.methods.len())
            .field("synthetic", &self.synthetic)
            .finish()
    }
}

/// Definition for a field to be added to a class
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    name: String,
    type_info: TypeInfo,
    modifiers: Modifiers,
    initial_value: Value,
}

impl FieldDefinition {
    /// Create a new public instance field
    pub fn new(name: impl Into<String>, type_info: TypeInfo) -> Self {
        Self {
            name: name.into(),
            initial_value: type_info.default_value(),
            type_info,
            modifiers: Modifiers::default(),
        }
    }

    /// Set the initial value
    pub fn initial_value(mut self, value: impl Into<Value>) -> Self {
        self.initial_value = value.into();
        self
    }

    /// Mark as static field
    pub fn as_static(mut self) -> Self {
        self.modifiers.is_static = true;
        self
    }

    /// Mark as final
    pub fn as_final(mut self) -> Self {
        self.modifiers.is_final = true;
        self
    }

    /// Mark as private
    pub fn private(mut self) -> Self {
        self.modifiers.visibility = Visibility::Private;
        self
    }
}

/// Definition for a method to be added to a class
#[derive(Clone)]
pub struct MethodDefinition {
    name: String,
    parameters: Vec<ParameterInfo>,
    return_type: TypeInfo,
    decorators: Vec<DecoratorInfo>,
    body: MethodFn,
}

impl MethodDefinition {
    /// Create a method with an `any` return type and no parameters
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Object, &[Value]) -> InvocationResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: TypeInfo::any(),
            decorators: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// Add a parameter
    pub fn param(mut self, name: impl Into<String>, type_info: TypeInfo) -> Self {
        self.parameters.push(ParameterInfo {
            name: name.into(),
            type_info,
        });
        self
    }

    /// Set return type
    pub fn returns(mut self, type_info: TypeInfo) -> Self {
        self.return_type = type_info;
        self
    }

    /// Attach a decorator
    pub fn decorate(mut self, decorator: DecoratorInfo) -> Self {
        self.decorators.push(decorator);
        self
    }
}

/// Definition for a constructor
#[derive(Clone)]
pub struct ConstructorDefinition {
    parameters: Vec<ParameterInfo>,
    body: ConstructorFn,
}

impl ConstructorDefinition {
    /// Create a constructor without parameters
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&Object, &[Value]) -> InvocationResult<()> + Send + Sync + 'static,
    {
        Self {
            parameters: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// Add a parameter
    pub fn param(mut self, name: impl Into<String>, type_info: TypeInfo) -> Self {
        self.parameters.push(ParameterInfo {
            name: name.into(),
            type_info,
        });
        self
    }

    pub(crate) fn from_parts(parameters: Vec<ParameterInfo>, body: ConstructorFn) -> Self {
        Self { parameters, body }
    }
}

/// Builder for runtime classes
///
/// The class ID is allocated when the builder is created, so constructors can
/// name the class's own type through [`ClassBuilder::self_type`].
pub struct ClassBuilder {
    id: ClassId,
    name: String,
    parent: Option<Arc<Class>>,
    fields: Vec<FieldDefinition>,
    methods: Vec<MethodDefinition>,
    constructors: Vec<ConstructorDefinition>,
    decorators: Vec<DecoratorInfo>,
    overrides: Vec<(String, MethodFn)>,
    synthetic: bool,
}

impl ClassBuilder {
    /// Start a new root class
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ClassId::next(),
            name: name.into(),
            parent: None,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            decorators: Vec::new(),
            overrides: Vec::new(),
            synthetic: false,
        }
    }

    /// ID the built class will have
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Type info naming the class under construction
    pub fn self_type(&self) -> TypeInfo {
        TypeInfo::class(&self.name, self.id)
    }

    /// Extend a parent class
    pub fn extends(mut self, parent: &Arc<Class>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Add a field
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Add (or override) a method
    pub fn method(mut self, method: MethodDefinition) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a constructor
    pub fn constructor(mut self, constructor: ConstructorDefinition) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Attach a class decorator
    pub fn decorate(mut self, decorator: DecoratorInfo) -> Self {
        self.decorators.push(decorator);
        self
    }

    /// Replace the body of an inherited method without redeclaring it
    ///
    /// A name the parent does not define gets a fresh slot.
    pub fn override_method(mut self, name: impl Into<String>, body: MethodFn) -> Self {
        self.overrides.push((name.into(), body));
        self
    }

    /// Mark the class as synthesized
    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    /// Build the class
    ///
    /// A class that declares no constructor gets an implicit no-argument one.
    pub fn build(self) -> Arc<Class> {
        let id = self.id;
        let mut vtable = self
            .parent
            .as_ref()
            .map(|p| p.vtable.clone())
            .unwrap_or_default();
        let mut next_slot = self
            .parent
            .as_ref()
            .map(|p| p.instance_field_count)
            .unwrap_or(0);

        let fields: Vec<FieldInfo> = self
            .fields
            .into_iter()
            .map(|def| {
                let slot = if def.modifiers.is_static {
                    None
                } else {
                    next_slot += 1;
                    Some(next_slot - 1)
                };
                FieldInfo {
                    name: def.name,
                    type_info: def.type_info,
                    declaring_class: id,
                    declaring_class_name: self.name.clone(),
                    slot,
                    modifiers: def.modifiers,
                    initial_value: def.initial_value,
                }
            })
            .collect();

        let methods = self
            .methods
            .into_iter()
            .map(|def| {
                let slot = vtable.add_method(&def.name, def.body);
                MethodInfo {
                    name: def.name,
                    parameters: def.parameters,
                    return_type: def.return_type,
                    declaring_class: id,
                    slot,
                    decorators: def.decorators,
                }
            })
            .collect();

        for (name, body) in self.overrides {
            vtable.add_method(&name, body);
        }

        let mut constructors: Vec<ConstructorInfo> = self
            .constructors
            .into_iter()
            .map(|def| ConstructorInfo {
                parameters: def.parameters,
                declaring_class: id,
                body: def.body,
            })
            .collect();
        if constructors.is_empty() {
            constructors.push(ConstructorInfo {
                parameters: Vec::new(),
                declaring_class: id,
                body: Arc::new(|_, _| Ok(())),
            });
        }

        Arc::new(Class {
            id,
            name: self.name,
            parent: self.parent,
            fields,
            methods,
            constructors,
            decorators: self.decorators,
            vtable,
            instance_field_count: next_slot,
            synthetic: self.synthetic,
        })
    }
}
