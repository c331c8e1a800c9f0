//! Error types for the proxy engine

use thiserror::Error;

use crate::model::{AccessPermission, Value};

/// Errors raised while building or instantiating a proxy
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No construction strategy applies to the class
    #[error("Unable to construct proxy for {class}: {reason}")]
    Construction {
        /// Source class name
        class: String,
        /// Why no strategy applied
        reason: String,
    },

    /// The chosen constructor raised while running
    #[error("Constructor of {class} failed: {source}")]
    ConstructorFailed {
        /// Source class name
        class: String,
        /// Error raised by the constructor body
        source: InvocationError,
    },

    /// The proxy type itself could not be produced
    #[error("Unable to synthesize proxy type for {class}: {reason}")]
    Synthesis {
        /// Source class name
        class: String,
        /// Why synthesis failed
        reason: String,
    },

    /// Field copy target is not the source class or one of its subclasses
    #[error("Cannot copy fields of {source_class} into unrelated class {target_class}")]
    IncompatibleCopyTarget {
        /// Class of the copy source
        source_class: String,
        /// Class of the copy target
        target_class: String,
    },
}

/// Errors raised by method bodies, advice, or dispatch
#[derive(Debug, Error)]
pub enum InvocationError {
    /// A value thrown by user code
    #[error("Uncaught exception: {0}")]
    Thrown(Value),

    /// Dispatch found no method with this name
    #[error("No such method: {class}.{method}")]
    NoSuchMethod {
        /// Receiver class name
        class: String,
        /// Requested method name
        method: String,
    },

    /// Arguments do not fit the method's parameters
    #[error("Illegal argument for {method}: {reason}")]
    IllegalArgument {
        /// Method name
        method: String,
        /// What did not fit
        reason: String,
    },

    /// Proxy creation failed inside an advice
    #[error("Proxy error: {0}")]
    Proxy(#[from] Box<ProxyError>),
}

impl InvocationError {
    /// Convenience constructor for thrown values
    pub fn thrown(value: impl Into<Value>) -> Self {
        InvocationError::Thrown(value.into())
    }
}

impl From<ProxyError> for InvocationError {
    fn from(err: ProxyError) -> Self {
        InvocationError::Proxy(Box::new(err))
    }
}

/// A single reflective field access that failed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FieldAccessError {
    /// The access policy does not grant the permission
    #[error("Access to {class}.{field} denied (requires {required})")]
    AccessDenied {
        /// Declaring class name
        class: String,
        /// Field name
        field: String,
        /// Permission that was missing
        required: AccessPermission,
    },

    /// Final fields cannot be written reflectively
    #[error("Field {class}.{field} is final")]
    FinalField {
        /// Declaring class name
        class: String,
        /// Field name
        field: String,
    },

    /// Value is not assignable to the field type
    #[error("Field {field} expects {expected}, got {found}")]
    TypeMismatch {
        /// Field name
        field: String,
        /// Declared type name
        expected: String,
        /// Actual value type name
        found: String,
    },

    /// Static field or slot outside the object's layout
    #[error("Field {field} has no instance slot in {class}")]
    MissingSlot {
        /// Object class name
        class: String,
        /// Field name
        field: String,
    },
}

/// Errors raised when changing access permissions
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    /// Permissions for this field were sealed
    #[error("Cannot modify sealed permissions of {0}")]
    Sealed(String),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result of proxy creation
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Result of a method call, advice, or continuation
pub type InvocationResult<T> = Result<T, InvocationError>;
