//! Engine configuration (TOML)
//!
//! ```toml
//! [proxy]
//! override_policy = "chain"      # or "last-wins"
//! proxy_suffix = "$Proxy"
//!
//! [producer]
//! use_field_copying = true
//! use_copy_constructor = true
//!
//! [access]
//! global = "ALL"
//!
//! [access.classes]
//! "Session*" = "PUBLIC_ONLY"
//!
//! [access.fields]
//! "Account.balance" = "NONE"
//! ```
//!
//! Every section and key is optional.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::AccessPermission;

/// Default suffix appended to synthesized class names
pub const DEFAULT_PROXY_SUFFIX: &str = "$Proxy";

/// How several around advisors matching one method are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverridePolicy {
    /// Nest all matching advisors, first advisor outermost
    #[default]
    Chain,
    /// Bind only the last matching advisor
    LastWins,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Proxy synthesis settings
    pub proxy: ProxyConfig,
    /// Defaults for producer registrations
    pub producer: ProducerDefaults,
    /// Reflective field access rules
    pub access: AccessConfig,
}

/// `[proxy]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub override_policy: OverridePolicy,
    pub proxy_suffix: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            override_policy: OverridePolicy::Chain,
            proxy_suffix: DEFAULT_PROXY_SUFFIX.to_string(),
        }
    }
}

/// `[producer]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerDefaults {
    /// Copy field state from a produced object onto its proxy
    pub use_field_copying: bool,
    /// Prefer a copy constructor when building the proxy
    pub use_copy_constructor: bool,
}

impl Default for ProducerDefaults {
    fn default() -> Self {
        Self {
            use_field_copying: true,
            use_copy_constructor: true,
        }
    }
}

/// `[access]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Permissions when no class or field entry applies
    pub global: AccessPermission,
    /// Class name pattern -> permissions, most specific pattern wins
    pub classes: BTreeMap<String, AccessPermission>,
    /// `Class.field` -> permissions
    pub fields: BTreeMap<String, AccessPermission>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            global: AccessPermission::ALL,
            classes: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy.proxy_suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "proxy_suffix cannot be empty".to_string(),
            ));
        }

        for pattern in self.access.classes.keys() {
            if pattern.is_empty() {
                return Err(ConfigError::Invalid(
                    "access class pattern cannot be empty".to_string(),
                ));
            }
        }

        for key in self.access.fields.keys() {
            match key.split_once('.') {
                Some((class, field)) if !class.is_empty() && !field.is_empty() => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "access field key '{}' must have the form Class.field",
                        key
                    )))
                }
            }
        }

        Ok(())
    }
}
