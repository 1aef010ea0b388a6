//! Authentication orchestration configuration.
//!
//! Holds the selector's SSO preference and the finalizer's principal weights.
//! Loaded from environment variables or JSON, with defaults matching strict
//! requested-principal precedence and no weighting.

use std::collections::HashMap;

use idp_principal::Principal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable enabling SSO preference.
pub const ENV_FAVOR_SSO: &str = "IDP_AUTHN_FAVOR_SSO";

/// Environment variable holding principal weights as a JSON array.
pub const ENV_PRINCIPAL_WEIGHTS: &str = "IDP_AUTHN_PRINCIPAL_WEIGHTS";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },

    /// A principal was weighted more than once.
    #[error("Principal {0} is weighted more than once")]
    DuplicateWeight(String),

    /// Configuration document could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Weight assigned to one principal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrincipalWeight {
    /// The weighted principal.
    pub principal: Principal,

    /// Its weight; higher wins.
    pub weight: i32,
}

impl PrincipalWeight {
    /// Create a principal weight.
    pub fn new(principal: Principal, weight: i32) -> Self {
        Self { principal, weight }
    }
}

/// Configuration for flow selection and result finalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthnConfig {
    /// Prefer any matching active result over a higher-precedence inactive flow.
    #[serde(default)]
    pub favor_sso: bool,

    /// Weights used to break ties between matching principals.
    #[serde(default)]
    pub principal_weights: Vec<PrincipalWeight>,
}

impl AuthnConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `IDP_AUTHN_FAVOR_SSO`: `true`/`1` to prefer active results (default: false)
    /// - `IDP_AUTHN_PRINCIPAL_WEIGHTS`: JSON array of `{"principal": ..., "weight": n}`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let favor_sso = match lookup(ENV_FAVOR_SSO) {
            Some(value) => parse_bool(ENV_FAVOR_SSO, &value)?,
            None => default.favor_sso,
        };

        let principal_weights = match lookup(ENV_PRINCIPAL_WEIGHTS) {
            Some(value) if !value.trim().is_empty() => {
                serde_json::from_str(&value).map_err(|e| ConfigError::InvalidValue {
                    key: ENV_PRINCIPAL_WEIGHTS.to_string(),
                    message: e.to_string(),
                })?
            }
            _ => default.principal_weights,
        };

        let config = Self {
            favor_sso,
            principal_weights,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the SSO preference.
    pub fn with_favor_sso(mut self, favor_sso: bool) -> Self {
        self.favor_sso = favor_sso;
        self
    }

    /// Add a principal weight.
    pub fn with_weight(mut self, principal: Principal, weight: i32) -> Self {
        self.principal_weights.push(PrincipalWeight::new(principal, weight));
        self
    }

    /// Validate the configuration.
    ///
    /// Each principal may be weighted at most once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (idx, entry) in self.principal_weights.iter().enumerate() {
            if self.principal_weights[..idx]
                .iter()
                .any(|earlier| earlier.principal == entry.principal)
            {
                return Err(ConfigError::DuplicateWeight(entry.principal.to_string()));
            }
        }
        Ok(())
    }

    /// Get the weights as a lookup map.
    pub fn weight_map(&self) -> HashMap<Principal, i32> {
        self.principal_weights
            .iter()
            .map(|w| (w.principal.clone(), w.weight))
            .collect()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AuthnConfig::default();
        assert!(!config.favor_sso);
        assert!(config.principal_weights.is_empty());
        assert!(config.weight_map().is_empty());
    }

    #[test]
    fn test_from_lookup_empty() {
        let config = AuthnConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config, AuthnConfig::default());
    }

    #[test]
    fn test_from_lookup_values() {
        let config = AuthnConfig::from_lookup(env(&[
            (ENV_FAVOR_SSO, "TRUE"),
            (
                ENV_PRINCIPAL_WEIGHTS,
                r#"[{"principal":{"kind":"authn_context_class_ref","value":"urn:mfa"},"weight":10}]"#,
            ),
        ]))
        .unwrap();
        assert!(config.favor_sso);
        assert_eq!(
            config.weight_map().get(&Principal::authn_context_class_ref("urn:mfa")),
            Some(&10)
        );
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = AuthnConfig::from_lookup(env(&[(ENV_FAVOR_SSO, "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == ENV_FAVOR_SSO));

        let err = AuthnConfig::from_lookup(env(&[(ENV_PRINCIPAL_WEIGHTS, "not json")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == ENV_PRINCIPAL_WEIGHTS));
    }

    #[test]
    fn test_validate_rejects_duplicate_weights() {
        let config = AuthnConfig::default()
            .with_weight(Principal::authn_context_class_ref("urn:a"), 1)
            .with_weight(Principal::authn_context_class_ref("urn:a"), 2);
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateWeight(_))));
    }

    #[test]
    fn test_from_json() {
        let config = AuthnConfig::from_json(r#"{"favor_sso": true}"#).unwrap();
        assert!(config.favor_sso);
        assert!(config.principal_weights.is_empty());

        assert!(matches!(
            AuthnConfig::from_json("{"),
            Err(ConfigError::Parse(_))
        ));
    }
}
