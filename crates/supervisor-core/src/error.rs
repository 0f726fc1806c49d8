//! Error taxonomy for the supervisor core.

use std::path::PathBuf;

use crate::domain::result::RuleExecutionResult;

/// Errors produced by the rule engine, its executors, and the plugin layer.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("configuration not loaded")]
    ConfigurationNotLoaded,

    #[error("invalid rule '{rule_id}': {reason}")]
    RuleValidation { rule_id: String, reason: String },

    #[error("no executor registered for rule type '{0}'")]
    UnknownRuleKind(String),

    #[error("rule '{rule_id}' could not be evaluated: {reason}")]
    RuleExecution { rule_id: String, reason: String },

    #[error("rule '{rule_id}' timed out after {timeout_ms}ms")]
    RuleTimeout { rule_id: String, timeout_ms: u64 },

    /// Returned by the engine for any failed rule execution. Carries the
    /// synthetic failing result so callers can still report timing and data.
    #[error("rule '{rule_id}' failed after {}ms: {cause}", .result.execution_time_ms)]
    RuleFailed {
        rule_id: String,
        #[source]
        cause: Box<SupervisorError>,
        result: Box<RuleExecutionResult>,
    },

    #[error("rule not found: {0}")]
    RuleNotFound(String),

    #[error("phase not found: {0}")]
    PhaseNotFound(String),

    #[error("rule group not found: {0}")]
    RuleGroupNotFound(String),

    #[error("plugin '{plugin}': {reason}")]
    Plugin { plugin: String, reason: String },

    #[error("failed to load plugin from {}: {source}", .path.display())]
    PluginLoad {
        path: PathBuf,
        #[source]
        source: Box<SupervisorError>,
    },

    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    #[error("{} plugin(s) failed to initialize: {}", .failures.len(), .failures.join("; "))]
    PluginInitialization { failures: Vec<String> },

    #[error("phase '{phase}' execution failed: {reason}")]
    PhaseExecution { phase: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SupervisorError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            SupervisorError::Configuration(_) => "CONFIGURATION_ERROR",
            SupervisorError::ConfigurationNotLoaded => "CONFIGURATION_NOT_LOADED",
            SupervisorError::RuleValidation { .. } | SupervisorError::UnknownRuleKind(_) => {
                "RULE_VALIDATION_ERROR"
            }
            SupervisorError::RuleExecution { .. } | SupervisorError::RuleFailed { .. } => {
                "RULE_EXECUTION_ERROR"
            }
            SupervisorError::RuleTimeout { .. } => "RULE_TIMEOUT",
            SupervisorError::RuleNotFound(_) => "RULE_NOT_FOUND",
            SupervisorError::PhaseNotFound(_) => "PHASE_NOT_FOUND",
            SupervisorError::RuleGroupNotFound(_) => "RULE_GROUP_NOT_FOUND",
            SupervisorError::Plugin { .. } | SupervisorError::PluginInitialization { .. } => {
                "PLUGIN_ERROR"
            }
            SupervisorError::PluginLoad { .. } => "PLUGIN_LOAD_ERROR",
            SupervisorError::PluginNotFound(_) => "PLUGIN_NOT_FOUND",
            SupervisorError::PhaseExecution { .. } => "PHASE_EXECUTION_ERROR",
            SupervisorError::Serialization(_) => "SERIALIZATION_ERROR",
            SupervisorError::Io(_) => "IO_ERROR",
        }
    }

    /// The innermost error, unwrapping `RuleFailed` and `PluginLoad` layers.
    pub fn root_cause(&self) -> &SupervisorError {
        match self {
            SupervisorError::RuleFailed { cause, .. } => cause.root_cause(),
            SupervisorError::PluginLoad { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn plugin(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        SupervisorError::Plugin {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_rule(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        SupervisorError::RuleValidation {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn evaluation(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        SupervisorError::RuleExecution {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for supervisor operations.
pub type SupervisorResult<T> = std::result::Result<T, SupervisorError>;
