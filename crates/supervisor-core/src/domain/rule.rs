//! Rule definitions: the tagged rule kinds and their enforcement level.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a failing rule blocks phase success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    /// A failure blocks the phase.
    #[default]
    Hard,
    /// A failure is reported but never blocks.
    Soft,
}

impl std::fmt::Display for Enforcement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Enforcement::Hard => write!(f, "hard"),
            Enforcement::Soft => write!(f, "soft"),
        }
    }
}

/// How an AI rule delegates to its agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AiStrategy {
    AnalyzeAndInstruct,
    Refactor,
    Validate,
}

impl std::fmt::Display for AiStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiStrategy::AnalyzeAndInstruct => write!(f, "analyze-and-instruct"),
            AiStrategy::Refactor => write!(f, "refactor"),
            AiStrategy::Validate => write!(f, "validate"),
        }
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Kind-specific rule payload, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RuleKind {
    /// Resolved numeric target must be `>= value`.
    Threshold { value: f64 },
    /// Resolved string target must match `pattern`.
    Pattern { pattern: String },
    /// Delegation to an external reasoning agent.
    #[serde(rename_all = "camelCase")]
    Ai {
        agent: String,
        strategy: AiStrategy,
        instruction: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        refactor_allowed: Option<bool>,
    },
    /// Delegation to a loaded plugin.
    Plugin {
        plugin: String,
        #[serde(default = "empty_object")]
        config: Value,
    },
    /// `metadata.commitMessage` must match `pattern`.
    CommitMessage { pattern: String },
    /// Opaque security posture check.
    SecurityPosture { check: String },
    /// Required files/directories must appear in `metadata.fileTree`.
    #[serde(rename_all = "camelCase")]
    Structure {
        required_files: Vec<String>,
        #[serde(default)]
        required_directories: Vec<String>,
    },
}

impl RuleKind {
    /// The `type` discriminator string for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Threshold { .. } => "threshold",
            RuleKind::Pattern { .. } => "pattern",
            RuleKind::Ai { .. } => "ai",
            RuleKind::Plugin { .. } => "plugin",
            RuleKind::CommitMessage { .. } => "commit-message",
            RuleKind::SecurityPosture { .. } => "security-posture",
            RuleKind::Structure { .. } => "structure",
        }
    }
}

/// A single checkable condition.
///
/// `enforcement` is optional in configuration files; the engine falls back to
/// the configuration's default enforcement level when it is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique id within a configuration. May be omitted in a configuration
    /// file, in which case the key of the `rules` map is used.
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforcement: Option<Enforcement>,
    /// Dot-separated path into the execution context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub kind: RuleKind,
}

impl Rule {
    pub fn new(id: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            id: id.into(),
            enforcement: None,
            target: None,
            message: None,
            kind,
        }
    }

    /// A threshold rule on `target`.
    pub fn threshold(id: impl Into<String>, target: impl Into<String>, value: f64) -> Self {
        Self::new(id, RuleKind::Threshold { value }).with_target(target)
    }

    /// A pattern rule on `target`.
    pub fn pattern(
        id: impl Into<String>,
        target: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            RuleKind::Pattern {
                pattern: pattern.into(),
            },
        )
        .with_target(target)
    }

    /// A plugin-delegate rule with an empty plugin config.
    pub fn plugin(id: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self::new(
            id,
            RuleKind::Plugin {
                plugin: plugin.into(),
                config: empty_object(),
            },
        )
    }

    pub fn with_enforcement(mut self, enforcement: Enforcement) -> Self {
        self.enforcement = Some(enforcement);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The `type` discriminator string.
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Enforcement level, falling back to `default` when unset.
    pub fn enforcement_or(&self, default: Enforcement) -> Enforcement {
        self.enforcement.unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_threshold_rule_deserializes_from_tagged_json() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "test-coverage",
            "type": "threshold",
            "enforcement": "hard",
            "target": "test.coverage",
            "value": 0.8
        }))
        .unwrap();

        assert_eq!(rule.kind_name(), "threshold");
        assert_eq!(rule.enforcement, Some(Enforcement::Hard));
        assert_eq!(rule.target.as_deref(), Some("test.coverage"));
        assert_eq!(rule.kind, RuleKind::Threshold { value: 0.8 });
    }

    #[test]
    fn test_structure_rule_uses_camel_case_fields() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "layout",
            "type": "structure",
            "requiredFiles": ["README.md"],
            "requiredDirectories": ["src"]
        }))
        .unwrap();

        match rule.kind {
            RuleKind::Structure {
                required_files,
                required_directories,
            } => {
                assert_eq!(required_files, vec!["README.md"]);
                assert_eq!(required_directories, vec!["src"]);
            }
            other => panic!("expected Structure, got {:?}", other),
        }
        assert!(rule.enforcement.is_none());
    }

    #[test]
    fn test_unknown_ai_strategy_is_rejected() {
        let result: Result<Rule, _> = serde_json::from_value(json!({
            "id": "ai-review",
            "type": "ai",
            "agent": "reviewer",
            "strategy": "guess",
            "instruction": "review it",
            "target": "code"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_plugin_config_defaults_to_empty_object() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "custom",
            "type": "plugin",
            "plugin": "license-check"
        }))
        .unwrap();
        match rule.kind {
            RuleKind::Plugin { plugin, config } => {
                assert_eq!(plugin, "license-check");
                assert_eq!(config, json!({}));
            }
            other => panic!("expected Plugin, got {:?}", other),
        }
    }

    #[test]
    fn test_enforcement_fallback() {
        let rule = Rule::threshold("cov", "metrics.coverage", 0.5);
        assert_eq!(rule.enforcement_or(Enforcement::Soft), Enforcement::Soft);
        let rule = rule.with_enforcement(Enforcement::Hard);
        assert_eq!(rule.enforcement_or(Enforcement::Soft), Enforcement::Hard);
    }
}
