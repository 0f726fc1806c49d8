//! Per-invocation rule execution input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Actor recorded in audit entries when the context names no user.
pub const SYSTEM_ACTOR: &str = "system";

/// Ephemeral input handed to every rule evaluation.
///
/// Created fresh by the caller for each rule or phase invocation and treated
/// as read-only by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleExecutionContext {
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BTreeMap<String, f64>>,
    /// Free-form bag: `commitMessage`, `fileTree`, `user`, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl RuleExecutionContext {
    pub fn new(phase: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    /// Look up a single metadata key.
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }

    /// `metadata.user` when it is a string, otherwise `"system"`.
    pub fn actor(&self) -> String {
        self.metadata_value("user")
            .and_then(Value::as_str)
            .unwrap_or(SYSTEM_ACTOR)
            .to_string()
    }

    /// JSON snapshot of the whole context, as recorded in audit entries.
    pub fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Resolve a dot-separated target path.
    ///
    /// Walks the serialized context first (`metrics.coverage`,
    /// `metadata.commitMessage`, `code`). If that fails, falls back to the
    /// flat metric lookups `metrics[target]` and `metrics[last segment]`.
    pub fn resolve_target(&self, target: &str) -> Option<Value> {
        let snapshot = self.snapshot();
        let walked = target
            .split('.')
            .try_fold(&snapshot, |node, segment| node.get(segment));
        if let Some(value) = walked.filter(|v| !v.is_null()) {
            return Some(value.clone());
        }

        let metrics = self.metrics.as_ref()?;
        let last = target.rsplit('.').next().unwrap_or(target);
        metrics
            .get(target)
            .or_else(|| metrics.get(last))
            .and_then(|v| serde_json::Number::from_f64(*v))
            .map(Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_walks_nested_paths() {
        let ctx = RuleExecutionContext::new("coded", "src/lib.rs")
            .with_metric("coverage", 0.92)
            .with_metadata("commitMessage", json!("feat: add parser"));

        assert_eq!(ctx.resolve_target("metrics.coverage"), Some(json!(0.92)));
        assert_eq!(
            ctx.resolve_target("metadata.commitMessage"),
            Some(json!("feat: add parser"))
        );
        assert_eq!(ctx.resolve_target("phase"), Some(json!("coded")));
    }

    #[test]
    fn test_resolve_falls_back_to_metric_name() {
        let ctx = RuleExecutionContext::new("coded", "").with_metric("coverage", 0.92);
        assert_eq!(ctx.resolve_target("test.coverage"), Some(json!(0.92)));
    }

    #[test]
    fn test_resolve_flat_dotted_metric_key() {
        let ctx = RuleExecutionContext::new("coded", "").with_metric("test.coverage", 0.5);
        assert_eq!(ctx.resolve_target("test.coverage"), Some(json!(0.5)));
    }

    #[test]
    fn test_resolve_missing_path() {
        let ctx = RuleExecutionContext::new("coded", "");
        assert_eq!(ctx.resolve_target("metrics.coverage"), None);
        assert_eq!(ctx.resolve_target("code"), None);
    }

    #[test]
    fn test_actor_defaults_to_system() {
        let ctx = RuleExecutionContext::new("coded", "");
        assert_eq!(ctx.actor(), "system");
        let ctx = ctx.with_metadata("user", json!("alice"));
        assert_eq!(ctx.actor(), "alice");
    }

    #[test]
    fn test_deserialize_without_phase() {
        let ctx: RuleExecutionContext =
            serde_json::from_value(json!({ "metrics": { "coverage": 0.7 } })).unwrap();
        assert!(ctx.phase.is_empty());
        assert!(ctx.target.is_empty());
        assert_eq!(ctx.resolve_target("metrics.coverage"), Some(json!(0.7)));
    }
}
