//! The rule-plugin contract and the loader seam.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{RuleExecutionContext, RuleOutcome};
use crate::error::SupervisorResult;

/// An extension that evaluates `plugin` rules.
///
/// `validate`, `init`, and `cleanup` are optional hooks; the defaults accept
/// every config and do nothing.
#[async_trait]
pub trait RulePlugin: Send + Sync + 'static {
    /// Unique name; the registry key.
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    async fn execute(
        &self,
        input: &RuleExecutionContext,
        config: &Value,
    ) -> SupervisorResult<RuleOutcome>;

    async fn validate(&self, _config: &Value) -> SupervisorResult<bool> {
        Ok(true)
    }

    async fn init(&self) -> SupervisorResult<()> {
        Ok(())
    }

    async fn cleanup(&self) -> SupervisorResult<()> {
        Ok(())
    }
}

/// Turns a file-system path into a plugin instance.
#[async_trait]
pub trait PluginLoader: Send + Sync + 'static {
    /// Whether this loader handles the file's extension.
    fn supports(&self, path: &Path) -> bool;

    async fn load(&self, path: &Path) -> SupervisorResult<Arc<dyn RulePlugin>>;
}

/// Name and version of a loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
}

impl PluginInfo {
    pub fn of(plugin: &dyn RulePlugin) -> Self {
        Self {
            name: plugin.name().to_string(),
            version: plugin.version().to_string(),
        }
    }
}
