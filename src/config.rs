//! Serializable configuration model.
//!
//! Configuration documents reference conditions, rules and actions by the
//! names they were registered under in the runtime registries. They are
//! applied with [`Runtime::configure`](crate::Runtime::configure).
//!
//! ```json
//! {
//!   "encoder": { "canonicalization_codecs": ["Html", "Url"], "strict": true },
//!   "runtime": {
//!     "contexts": [{
//!       "name": "admin",
//!       "conditions": [{ "condition": "admin-url" }],
//!       "rules": [{ "rule": "throttle", "fault_actions": ["log", "block"] }]
//!     }]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Encoder settings
    pub encoder: EncoderConfig,
    /// Runtime context tree
    pub runtime: RuntimeConfig,
}

impl SecurityConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Canonicalization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Codec names tried by `canonicalize`, in order
    pub canonicalization_codecs: Vec<String>,
    /// Whether multiple or mixed encoding is an error
    pub strict: bool,
    /// Number of value-changing passes allowed before giving up
    pub max_passes: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            canonicalization_codecs: vec!["Html".into(), "Url".into(), "JavaScript".into()],
            strict: true,
            max_passes: 16,
        }
    }
}

/// Root contexts to build at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Root contexts, in registration order
    pub contexts: Vec<ContextConfig>,
}

/// One context and its subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Context name; a unique name is generated when absent
    pub name: Option<String>,
    /// Match conditions, in evaluation order
    pub conditions: Vec<ConditionBinding>,
    /// Rules, in execution order
    pub rules: Vec<RuleBinding>,
    /// Nested contexts
    pub subcontexts: Vec<ContextConfig>,
}

/// Reference to a registered condition and its expected result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionBinding {
    /// Registered condition name
    pub condition: String,
    /// Expected evaluation result
    #[serde(default = "default_result")]
    pub result: bool,
}

fn default_result() -> bool {
    true
}

/// Reference to a registered rule and its fault actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBinding {
    /// Registered rule name
    pub rule: String,
    /// Registered action names, run in order when the rule faults
    #[serde(default)]
    pub fault_actions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = SecurityConfig::from_json_str("{}").unwrap();
        assert_eq!(config.encoder, EncoderConfig::default());
        assert!(config.encoder.strict);
        assert_eq!(config.encoder.max_passes, 16);
        assert_eq!(
            config.encoder.canonicalization_codecs,
            vec!["Html", "Url", "JavaScript"]
        );
        assert!(config.runtime.contexts.is_empty());
    }

    #[test]
    fn parses_context_tree() {
        let json = r#"{
            "runtime": {
                "contexts": [{
                    "name": "admin",
                    "conditions": [
                        { "condition": "admin-url" },
                        { "condition": "is-anonymous", "result": false }
                    ],
                    "rules": [{ "rule": "throttle", "fault_actions": ["log", "block"] }],
                    "subcontexts": [{ "rules": [{ "rule": "clickjack" }] }]
                }]
            }
        }"#;
        let config = SecurityConfig::from_json_str(json).unwrap();
        let admin = &config.runtime.contexts[0];
        assert_eq!(admin.name.as_deref(), Some("admin"));
        assert!(admin.conditions[0].result);
        assert!(!admin.conditions[1].result);
        assert_eq!(admin.rules[0].fault_actions, vec!["log", "block"]);
        assert!(admin.subcontexts[0].name.is_none());
        assert!(admin.subcontexts[0].rules[0].fault_actions.is_empty());
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = SecurityConfig::from_json_str("{ \"encoder\": 3 }").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
