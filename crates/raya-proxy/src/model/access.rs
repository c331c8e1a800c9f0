//! Reflective field access and its permission model
//!
//! Controls reflective reads and writes of fields with permission flags
//! resolved per field, per class and globally. Code running inside a class
//! (method and constructor bodies) uses [`Object::get`] / [`Object::set`] and
//! is not subject to the policy; reflective copies go through
//! [`AccessPolicy::read_field`] / [`AccessPolicy::write_field`].
//!
//! ## Resolution order
//!
//! 1. Field entry (`Class.field`)
//! 2. First class rule whose pattern matches the declaring class
//! 3. Global default
//!
//! ## TOML Configuration
//!
//! ```toml
//! [access]
//! global = "ALL"
//!
//! [access.classes]
//! "Session*" = "PUBLIC_ONLY"
//!
//! [access.fields]
//! "Account.balance" = "NONE"
//! ```

use std::fmt;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::config::AccessConfig;
use crate::error::{AccessError, FieldAccessError};

use super::{FieldInfo, Object, Value};

/// Field access permission flags (bitflags)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessPermission(u8);

impl AccessPermission {
    /// No access allowed
    pub const NONE: Self = Self(0x00);
    /// Read public fields
    pub const READ_PUBLIC: Self = Self(0x01);
    /// Read private fields
    pub const READ_PRIVATE: Self = Self(0x02);
    /// Write public fields
    pub const WRITE_PUBLIC: Self = Self(0x04);
    /// Write private fields
    pub const WRITE_PRIVATE: Self = Self(0x08);

    // Common combinations
    /// READ_PUBLIC | READ_PRIVATE
    pub const READ_ALL: Self = Self(0x03);
    /// WRITE_PUBLIC | WRITE_PRIVATE
    pub const WRITE_ALL: Self = Self(0x0C);
    /// READ_PUBLIC | WRITE_PUBLIC
    pub const PUBLIC_ONLY: Self = Self(0x05);
    /// Everything
    pub const ALL: Self = Self(0x0F);

    /// Create from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Check if permission contains a flag
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of permissions
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Difference (remove flags)
    pub const fn difference(&self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Parse a single flag name, or a hex/decimal bit value
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NONE" => Some(Self::NONE),
            "READ_PUBLIC" => Some(Self::READ_PUBLIC),
            "READ_PRIVATE" => Some(Self::READ_PRIVATE),
            "WRITE_PUBLIC" => Some(Self::WRITE_PUBLIC),
            "WRITE_PRIVATE" => Some(Self::WRITE_PRIVATE),
            "READ_ALL" => Some(Self::READ_ALL),
            "WRITE_ALL" => Some(Self::WRITE_ALL),
            "PUBLIC_ONLY" => Some(Self::PUBLIC_ONLY),
            "ALL" => Some(Self::ALL),
            _ => {
                if let Some(hex) = s.strip_prefix("0x") {
                    u8::from_str_radix(hex, 16).ok().map(Self::from_bits)
                } else {
                    s.parse::<u8>().ok().map(Self::from_bits)
                }
            }
        }
    }

    /// Parse combined flags from pipe-separated string (e.g., "READ_ALL|WRITE_PUBLIC")
    pub fn parse_combined(s: &str) -> Option<Self> {
        let mut result = Self::NONE;
        for part in s.split('|') {
            result = result.union(Self::parse(part.trim())?);
        }
        Some(result)
    }

    /// Permission needed to read `field`
    pub fn read_for(field: &FieldInfo) -> Self {
        if field.is_public() {
            Self::READ_PUBLIC
        } else {
            Self::READ_PRIVATE
        }
    }

    /// Permission needed to write `field`
    pub fn write_for(field: &FieldInfo) -> Self {
        if field.is_public() {
            Self::WRITE_PUBLIC
        } else {
            Self::WRITE_PRIVATE
        }
    }
}

impl Default for AccessPermission {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Display for AccessPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::NONE => "NONE",
            Self::READ_PUBLIC => "READ_PUBLIC",
            Self::READ_PRIVATE => "READ_PRIVATE",
            Self::WRITE_PUBLIC => "WRITE_PUBLIC",
            Self::WRITE_PRIVATE => "WRITE_PRIVATE",
            Self::READ_ALL => "READ_ALL",
            Self::WRITE_ALL => "WRITE_ALL",
            Self::PUBLIC_ONLY => "PUBLIC_ONLY",
            Self::ALL => "ALL",
            _ => return write!(f, "0x{:02X}", self.0),
        };
        f.write_str(name)
    }
}

impl TryFrom<String> for AccessPermission {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_combined(&value).ok_or_else(|| format!("Invalid permission value: {}", value))
    }
}

impl From<AccessPermission> for String {
    fn from(value: AccessPermission) -> Self {
        value.to_string()
    }
}

/// Class permission pattern (exact name, `Prefix*`, or `*`)
#[derive(Debug, Clone)]
pub struct ClassPermissionRule {
    /// Pattern
    pub pattern: String,
    /// Permissions for matching classes
    pub permissions: AccessPermission,
}

impl ClassPermissionRule {
    /// Check if a class name matches this pattern
    pub fn matches(&self, class_name: &str) -> bool {
        if self.pattern == "*" {
            return true;
        }
        match self.pattern.strip_suffix('*') {
            Some(prefix) => class_name.starts_with(prefix),
            None => self.pattern == class_name,
        }
    }

    /// Ordering key: exact names above prefixes, longer prefixes above
    /// shorter ones, `*` last
    fn specificity(&self) -> (u8, usize) {
        match self.pattern.strip_suffix('*') {
            Some(prefix) => (u8::from(!prefix.is_empty()), prefix.len()),
            None => (2, self.pattern.len()),
        }
    }
}

#[derive(Debug, Default)]
struct PolicyState {
    global_default: AccessPermission,
    class_rules: Vec<ClassPermissionRule>,
    /// (declaring class name, field name) -> permissions
    field_permissions: FxHashMap<(String, String), AccessPermission>,
    sealed_fields: FxHashSet<(String, String)>,
}

/// Host access model for reflective field access
///
/// Permissions may change at any time; readers always see the current state.
#[derive(Debug, Default)]
pub struct AccessPolicy {
    state: RwLock<PolicyState>,
}

impl AccessPolicy {
    /// Create a policy that allows everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a policy from configuration
    ///
    /// Configured class rules are installed most specific first, so a
    /// catch-all never shadows a named class or a longer prefix.
    pub fn from_config(config: &AccessConfig) -> Self {
        let policy = Self::new();
        policy.set_global(config.global);
        let mut rules: Vec<_> = config
            .classes
            .iter()
            .map(|(pattern, permissions)| ClassPermissionRule {
                pattern: pattern.clone(),
                permissions: *permissions,
            })
            .collect();
        rules.sort_by(|a, b| b.specificity().cmp(&a.specificity()));
        for rule in rules {
            policy.add_class_rule(rule);
        }
        for (key, permissions) in &config.fields {
            if let Some((class, field)) = key.split_once('.') {
                // Config is fresh, nothing is sealed yet
                let _ = policy.set_field(class, field, *permissions);
            }
        }
        policy
    }

    /// Check if any restriction is configured (fast path)
    pub fn has_any_restrictions(&self) -> bool {
        let state = self.state.read();
        state.global_default != AccessPermission::ALL
            || !state.class_rules.is_empty()
            || !state.field_permissions.is_empty()
    }

    /// Set global default permissions
    pub fn set_global(&self, permissions: AccessPermission) {
        self.state.write().global_default = permissions;
    }

    /// Get global default permissions
    pub fn global(&self) -> AccessPermission {
        self.state.read().global_default
    }

    /// Add a class rule (first match wins)
    pub fn add_class_rule(&self, rule: ClassPermissionRule) {
        self.state.write().class_rules.push(rule);
    }

    /// Set permissions for a single field
    pub fn set_field(
        &self,
        class_name: &str,
        field_name: &str,
        permissions: AccessPermission,
    ) -> Result<(), AccessError> {
        let key = (class_name.to_string(), field_name.to_string());
        let mut state = self.state.write();
        if state.sealed_fields.contains(&key) {
            return Err(AccessError::Sealed(format!("{}.{}", class_name, field_name)));
        }
        state.field_permissions.insert(key, permissions);
        Ok(())
    }

    /// Revoke all reflective access to a field
    pub fn revoke_field(&self, class_name: &str, field_name: &str) -> Result<(), AccessError> {
        self.set_field(class_name, field_name, AccessPermission::NONE)
    }

    /// Clear field-level permissions
    pub fn clear_field(&self, class_name: &str, field_name: &str) -> Result<(), AccessError> {
        let key = (class_name.to_string(), field_name.to_string());
        let mut state = self.state.write();
        if state.sealed_fields.contains(&key) {
            return Err(AccessError::Sealed(format!("{}.{}", class_name, field_name)));
        }
        state.field_permissions.remove(&key);
        Ok(())
    }

    /// Make field permissions immutable
    pub fn seal_field(&self, class_name: &str, field_name: &str) {
        self.state
            .write()
            .sealed_fields
            .insert((class_name.to_string(), field_name.to_string()));
    }

    /// Resolve permissions for a field of a class
    pub fn resolve(&self, class_name: &str, field_name: &str) -> AccessPermission {
        let state = self.state.read();
        if let Some(perms) = state
            .field_permissions
            .get(&(class_name.to_string(), field_name.to_string()))
        {
            return *perms;
        }
        state
            .class_rules
            .iter()
            .find(|rule| rule.matches(class_name))
            .map(|rule| rule.permissions)
            .unwrap_or(state.global_default)
    }

    fn check(&self, field: &FieldInfo, required: AccessPermission) -> Result<(), FieldAccessError> {
        if self
            .resolve(&field.declaring_class_name, &field.name)
            .contains(required)
        {
            Ok(())
        } else {
            Err(FieldAccessError::AccessDenied {
                class: field.declaring_class_name.clone(),
                field: field.name.clone(),
                required,
            })
        }
    }

    /// Read a field reflectively
    pub fn read_field(&self, obj: &Object, field: &FieldInfo) -> Result<Value, FieldAccessError> {
        self.check(field, AccessPermission::read_for(field))?;
        field
            .slot
            .and_then(|slot| obj.get_slot(slot))
            .ok_or_else(|| FieldAccessError::MissingSlot {
                class: obj.class().name().to_string(),
                field: field.name.clone(),
            })
    }

    /// Write a field reflectively
    ///
    /// Final fields are never written, whatever the permissions say.
    pub fn write_field(
        &self,
        obj: &Object,
        field: &FieldInfo,
        value: Value,
    ) -> Result<(), FieldAccessError> {
        if field.is_final() {
            return Err(FieldAccessError::FinalField {
                class: field.declaring_class_name.clone(),
                field: field.name.clone(),
            });
        }
        self.check(field, AccessPermission::write_for(field))?;
        if !field.type_info.accepts(&value) {
            return Err(FieldAccessError::TypeMismatch {
                field: field.name.clone(),
                expected: field.type_info.name.clone(),
                found: value.type_name().to_string(),
            });
        }
        let written = field
            .slot
            .filter(|_| obj.class().is_subclass_of(field.declaring_class))
            .map(|slot| obj.set_slot(slot, value))
            .unwrap_or(false);
        if written {
            Ok(())
        } else {
            Err(FieldAccessError::MissingSlot {
                class: obj.class().name().to_string(),
                field: field.name.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassBuilder, FieldDefinition, TypeInfo};

    #[test]
    fn test_permission_parsing() {
        assert_eq!(AccessPermission::parse("all"), Some(AccessPermission::ALL));
        assert_eq!(AccessPermission::parse("0x05"), Some(AccessPermission::PUBLIC_ONLY));
        assert_eq!(
            AccessPermission::parse_combined("READ_ALL|WRITE_PUBLIC"),
            Some(AccessPermission::from_bits(0x07))
        );
        assert_eq!(AccessPermission::parse("bogus"), None);
        assert_eq!(AccessPermission::WRITE_ALL.to_string(), "WRITE_ALL");
        assert_eq!(AccessPermission::from_bits(0x07).to_string(), "0x07");
    }

    #[test]
    fn test_permission_operations() {
        let perms = AccessPermission::READ_PUBLIC.union(AccessPermission::WRITE_PUBLIC);
        assert_eq!(perms, AccessPermission::PUBLIC_ONLY);
        assert!(AccessPermission::ALL.contains(AccessPermission::READ_PRIVATE));
        assert!(!AccessPermission::ALL
            .difference(AccessPermission::WRITE_ALL)
            .contains(AccessPermission::WRITE_PUBLIC));
    }

    #[test]
    fn test_class_rule_matching() {
        let rule = ClassPermissionRule {
            pattern: "Session*".to_string(),
            permissions: AccessPermission::NONE,
        };
        assert!(rule.matches("SessionStore"));
        assert!(!rule.matches("Store"));

        let exact = ClassPermissionRule {
            pattern: "Account".to_string(),
            permissions: AccessPermission::NONE,
        };
        assert!(exact.matches("Account"));
        assert!(!exact.matches("Accounts"));
    }

    #[test]
    fn test_resolution_order() {
        let policy = AccessPolicy::new();
        assert!(!policy.has_any_restrictions());

        policy.set_global(AccessPermission::READ_ALL);
        policy.add_class_rule(ClassPermissionRule {
            pattern: "Account".to_string(),
            permissions: AccessPermission::PUBLIC_ONLY,
        });
        policy
            .set_field("Account", "balance", AccessPermission::NONE)
            .unwrap();

        assert_eq!(policy.resolve("Other", "x"), AccessPermission::READ_ALL);
        assert_eq!(policy.resolve("Account", "owner"), AccessPermission::PUBLIC_ONLY);
        assert_eq!(policy.resolve("Account", "balance"), AccessPermission::NONE);
        assert!(policy.has_any_restrictions());
    }

    #[test]
    fn test_configured_rules_most_specific_first() {
        let mut config = AccessConfig::default();
        for (pattern, permissions) in [
            ("*", AccessPermission::NONE),
            ("Session*", AccessPermission::ALL),
            ("SessionAudit", AccessPermission::READ_ALL),
            ("S*", AccessPermission::PUBLIC_ONLY),
        ] {
            config.classes.insert(pattern.to_string(), permissions);
        }
        let policy = AccessPolicy::from_config(&config);

        assert_eq!(policy.resolve("SessionData", "token"), AccessPermission::ALL);
        assert_eq!(policy.resolve("SessionAudit", "entry"), AccessPermission::READ_ALL);
        assert_eq!(policy.resolve("Store", "items"), AccessPermission::PUBLIC_ONLY);
        assert_eq!(policy.resolve("Account", "balance"), AccessPermission::NONE);
    }

    #[test]
    fn test_sealed_field() {
        let policy = AccessPolicy::new();
        policy.seal_field("Account", "balance");
        assert!(matches!(
            policy.revoke_field("Account", "balance"),
            Err(AccessError::Sealed(_))
        ));
        assert!(policy.clear_field("Account", "balance").is_err());
    }

    #[test]
    fn test_reflective_read_write() {
        let class = ClassBuilder::new("Account")
            .field(FieldDefinition::new("balance", TypeInfo::int()).initial_value(5))
            .field(FieldDefinition::new("secret", TypeInfo::string()).private())
            .field(FieldDefinition::new("owner", TypeInfo::string()).as_final())
            .build();
        let obj = Object::allocate(&class);
        let policy = AccessPolicy::new();

        let balance = class.field("balance").unwrap();
        assert_eq!(policy.read_field(&obj, balance).unwrap(), Value::from(5));
        policy.write_field(&obj, balance, Value::from(9)).unwrap();
        assert_eq!(obj.get("balance").unwrap(), Value::from(9));

        assert!(matches!(
            policy.write_field(&obj, balance, Value::from("nine")),
            Err(FieldAccessError::TypeMismatch { .. })
        ));
        assert!(matches!(
            policy.write_field(&obj, class.field("owner").unwrap(), Value::from("x")),
            Err(FieldAccessError::FinalField { .. })
        ));

        policy.set_global(AccessPermission::PUBLIC_ONLY);
        assert!(matches!(
            policy.read_field(&obj, class.field("secret").unwrap()),
            Err(FieldAccessError::AccessDenied { .. })
        ));
    }
}
