use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};

use crate::domain::{Rule, RuleExecutionContext, RuleKind, RuleOutcome};
use crate::error::{SupervisorError, SupervisorResult};
use crate::plugin::PluginManager;

use super::{kind_mismatch, RuleExecutor};

/// Delegates `plugin` rules to the [`PluginManager`].
pub struct PluginExecutor {
    plugins: Arc<PluginManager>,
}

impl PluginExecutor {
    pub fn new(plugins: Arc<PluginManager>) -> Self {
        Self { plugins }
    }
}

fn plugin_of(rule: &Rule) -> SupervisorResult<(&str, &Value)> {
    match &rule.kind {
        RuleKind::Plugin { plugin, config } => Ok((plugin, config)),
        _ => Err(kind_mismatch(rule, "plugin")),
    }
}

#[async_trait]
impl RuleExecutor for PluginExecutor {
    fn kind(&self) -> &str {
        "plugin"
    }

    fn validate_rule(&self, rule: &Rule) -> SupervisorResult<()> {
        let (plugin, _) = plugin_of(rule)?;
        if plugin.trim().is_empty() {
            return Err(SupervisorError::invalid_rule(&rule.id, "missing plugin name"));
        }
        if !self.plugins.has_plugin(plugin) {
            return Err(SupervisorError::PluginNotFound(plugin.to_string()));
        }
        Ok(())
    }

    async fn execute_rule(
        &self,
        rule: &Rule,
        input: &RuleExecutionContext,
    ) -> SupervisorResult<RuleOutcome> {
        let (plugin, config) = plugin_of(rule)?;
        let mut outcome = self.plugins.execute_plugin(plugin, input, config).await?;

        // Plugin payloads that are not objects are kept under `result`.
        let mut data = match outcome.data.take() {
            Some(Value::Object(map)) => map,
            Some(other) => Map::from_iter([("result".to_string(), other)]),
            None => Map::new(),
        };
        data.insert("plugin".to_string(), Value::String(plugin.to_string()));
        data.insert("executedAt".to_string(), Value::String(Utc::now().to_rfc3339()));
        outcome.data = Some(Value::Object(data));

        if outcome.message.is_none() {
            outcome.message = rule.message.clone();
        }
        Ok(outcome)
    }
}
