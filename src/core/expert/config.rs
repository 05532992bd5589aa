//! Expert-routing configuration model
//!
//! Stored as a serialized JSON blob alongside the routing configs and
//! deserialized here at the boundary. Expert and classifier bindings are a
//! tagged union over `type`: a `virtual` binding points at a model that is
//! itself resolved through the routing chain, a `real` binding names a
//! provider and upstream model directly.

use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};

/// Virtual-or-real target binding, tagged on `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TargetBinding {
    /// Resolves through another model record (possibly itself virtual)
    Virtual { model_id: String },
    /// Direct provider + upstream model
    Real { provider_id: String, model: String },
}

impl TargetBinding {
    pub fn kind_label(&self) -> &'static str {
        match self {
            TargetBinding::Virtual { .. } => "virtual",
            TargetBinding::Real { .. } => "real",
        }
    }
}

/// Classifier backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(flatten)]
    pub binding: TargetBinding,

    /// Explicit system prompt; overrides the template's system part
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Prompt template, split on a `{{USER_PROMPT}}` marker
    #[serde(default)]
    pub prompt_template: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Classification timeout in milliseconds
    #[serde(default, rename = "timeout")]
    pub timeout_ms: Option<u64>,

    /// XML-style tags stripped from the user prompt before classification
    #[serde(default)]
    pub ignored_tags: Vec<String>,

    /// Ask the backend for `response_format: json_object`
    #[serde(default)]
    pub enable_structured_output: bool,
}

/// One expert: a category and the target that serves it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertTarget {
    pub id: String,
    pub category: String,
    #[serde(flatten)]
    pub binding: TargetBinding,
    /// Capability boundary injected into the classifier prompt
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl ExpertTarget {
    /// Boundary text for the classifier prompt: the expert's own system
    /// prompt wins over its description
    pub fn boundary_text(&self) -> Option<&str> {
        self.system_prompt
            .as_deref()
            .or(self.description.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A parsed expert-routing config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertRoutingConfig {
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub experts: Vec<ExpertTarget>,
    /// Category-less target used when classification fails or no expert
    /// matches; the only tolerance the engine has for classifier failures
    #[serde(default)]
    pub fallback: Option<TargetBinding>,
}

impl ExpertRoutingConfig {
    /// Parse the stored JSON blob, failing fast on unknown binding tags
    pub fn parse(config_id: &str, raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            GatewayError::Config(format!(
                "failed to parse expert routing config {}: {}",
                config_id, e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"{
            "classifier": {
                "type": "real",
                "provider_id": "p-judge",
                "model": "tiny-judge",
                "temperature": 0.0,
                "max_tokens": 50,
                "timeout": 5000,
                "ignored_tags": ["system-reminder"]
            },
            "experts": [
                {"id": "e1", "category": "code", "type": "real",
                 "provider_id": "p1", "model": "coder-xl",
                 "description": "Programming questions"},
                {"id": "e2", "category": "chat", "type": "virtual",
                 "model_id": "m-chat"}
            ],
            "fallback": {"type": "real", "provider_id": "p2", "model": "generalist"}
        }"#;

        let config = ExpertRoutingConfig::parse("er-1", raw).unwrap();
        assert_eq!(config.experts.len(), 2);
        assert_eq!(config.classifier.timeout_ms, Some(5000));
        assert_eq!(
            config.experts[0].binding,
            TargetBinding::Real {
                provider_id: "p1".into(),
                model: "coder-xl".into()
            }
        );
        assert_eq!(
            config.experts[1].binding,
            TargetBinding::Virtual {
                model_id: "m-chat".into()
            }
        );
        assert!(config.fallback.is_some());
    }

    #[test]
    fn test_parse_without_fallback() {
        let raw = r#"{
            "classifier": {"type": "virtual", "model_id": "m-judge"},
            "experts": []
        }"#;
        let config = ExpertRoutingConfig::parse("er-2", raw).unwrap();
        assert!(config.fallback.is_none());
        assert!(!config.classifier.enable_structured_output);
    }

    #[test]
    fn test_unknown_binding_type_fails_fast() {
        let raw = r#"{
            "classifier": {"type": "magic", "model_id": "m-judge"},
            "experts": []
        }"#;
        let err = ExpertRoutingConfig::parse("er-3", raw).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn test_boundary_text_prefers_system_prompt() {
        let expert = ExpertTarget {
            id: "e1".into(),
            category: "code".into(),
            binding: TargetBinding::Virtual {
                model_id: "m1".into(),
            },
            description: Some("general description".into()),
            system_prompt: Some("handles code".into()),
        };
        assert_eq!(expert.boundary_text(), Some("handles code"));
    }

    #[test]
    fn test_boundary_text_empty_falls_through() {
        let expert = ExpertTarget {
            id: "e1".into(),
            category: "code".into(),
            binding: TargetBinding::Virtual {
                model_id: "m1".into(),
            },
            description: None,
            system_prompt: Some("   ".into()),
        };
        assert_eq!(expert.boundary_text(), None);
    }
}
