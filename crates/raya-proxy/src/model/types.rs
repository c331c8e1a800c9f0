//! Runtime type information for parameters, returns and fields

use std::fmt;

use super::{ClassId, Value};

/// Type kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Accepts any value
    Any,
    /// No value (method returns nothing)
    Void,
    /// Boolean
    Bool,
    /// Integer
    Int,
    /// Float
    Float,
    /// String
    String,
    /// Class types
    Class,
}

/// Runtime type information
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    /// Type kind
    pub kind: TypeKind,
    /// Type name
    pub name: String,
    /// Class ID (for class types)
    pub class_id: Option<ClassId>,
}

impl TypeInfo {
    fn primitive(kind: TypeKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            class_id: None,
        }
    }

    /// The `any` type
    pub fn any() -> Self {
        Self::primitive(TypeKind::Any, "any")
    }

    /// The `void` type
    pub fn void() -> Self {
        Self::primitive(TypeKind::Void, "void")
    }

    /// The `boolean` type
    pub fn bool() -> Self {
        Self::primitive(TypeKind::Bool, "boolean")
    }

    /// The `int` type
    pub fn int() -> Self {
        Self::primitive(TypeKind::Int, "int")
    }

    /// The `float` type
    pub fn float() -> Self {
        Self::primitive(TypeKind::Float, "float")
    }

    /// The `string` type
    pub fn string() -> Self {
        Self::primitive(TypeKind::String, "string")
    }

    /// Create a class type info
    pub fn class(name: &str, class_id: ClassId) -> Self {
        Self {
            kind: TypeKind::Class,
            name: name.to_string(),
            class_id: Some(class_id),
        }
    }

    /// Check if this is `void`
    pub fn is_void(&self) -> bool {
        self.kind == TypeKind::Void
    }

    /// Value a field of this type holds before anything is assigned
    ///
    /// Primitives start at their zero value; everything else starts null.
    pub fn default_value(&self) -> Value {
        match self.kind {
            TypeKind::Bool => Value::Bool(false),
            TypeKind::Int => Value::Int(0),
            TypeKind::Float => Value::Float(0.0),
            _ => Value::Null,
        }
    }

    /// Check whether `value` is assignable to this type
    ///
    /// Null is assignable to `any`, `string` and class types. Class types
    /// accept instances of the class itself or of any subclass.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self.kind, value) {
            (TypeKind::Any, _) => true,
            (TypeKind::Void, _) => false,
            (TypeKind::String | TypeKind::Class, Value::Null) => true,
            (TypeKind::Bool, Value::Bool(_)) => true,
            (TypeKind::Int, Value::Int(_)) => true,
            (TypeKind::Float, Value::Float(_)) => true,
            (TypeKind::String, Value::Str(_)) => true,
            (TypeKind::Class, Value::Object(obj)) => match self.class_id {
                Some(id) => obj.class().is_subclass_of(id),
                None => false,
            },
            _ => false,
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_acceptance() {
        assert!(TypeInfo::int().accepts(&Value::from(3)));
        assert!(!TypeInfo::int().accepts(&Value::from(3.0)));
        assert!(TypeInfo::string().accepts(&Value::from("x")));
        assert!(TypeInfo::string().accepts(&Value::Null));
        assert!(!TypeInfo::bool().accepts(&Value::Null));
        assert!(TypeInfo::any().accepts(&Value::from(false)));
        assert!(!TypeInfo::void().accepts(&Value::Null));
    }

    #[test]
    fn test_default_values_are_assignable() {
        assert_eq!(TypeInfo::int().default_value(), Value::Int(0));
        assert_eq!(TypeInfo::bool().default_value(), Value::Bool(false));
        assert_eq!(TypeInfo::string().default_value(), Value::Null);
        for ty in [TypeInfo::int(), TypeInfo::float(), TypeInfo::bool(), TypeInfo::string()] {
            assert!(ty.accepts(&ty.default_value()), "{} rejects its default", ty);
        }
    }

    #[test]
    fn test_display_uses_name() {
        assert_eq!(TypeInfo::float().to_string(), "float");
    }
}
