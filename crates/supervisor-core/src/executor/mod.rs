//! Rule executors: one strategy per rule kind, selected by [`ExecutorFactory`].

mod ai;
mod commit_message;
mod factory;
mod pattern;
mod plugin;
mod security_posture;
mod structure;
mod threshold;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::{Rule, RuleExecutionContext, RuleOutcome};
use crate::error::{SupervisorError, SupervisorResult};

pub use ai::AiExecutor;
pub use commit_message::{CommitMessageExecutor, COMMIT_MESSAGE_KEY};
pub use factory::ExecutorFactory;
pub use pattern::PatternExecutor;
pub use plugin::PluginExecutor;
pub use security_posture::SecurityPostureExecutor;
pub use structure::{StructureExecutor, FILE_TREE_KEY};
pub use threshold::ThresholdExecutor;

/// Validates and evaluates rules of one kind.
#[async_trait]
pub trait RuleExecutor: Send + Sync + 'static {
    /// The rule `type` this executor handles.
    fn kind(&self) -> &str;

    fn can_execute(&self, rule: &Rule) -> bool {
        rule.kind_name() == self.kind()
    }

    /// Reject a statically malformed rule with [`SupervisorError::RuleValidation`].
    fn validate_rule(&self, rule: &Rule) -> SupervisorResult<()>;

    async fn execute_rule(
        &self,
        rule: &Rule,
        input: &RuleExecutionContext,
    ) -> SupervisorResult<RuleOutcome>;
}

pub(crate) fn kind_mismatch(rule: &Rule, expected: &str) -> SupervisorError {
    SupervisorError::invalid_rule(
        &rule.id,
        format!("expected a '{expected}' rule, got '{}'", rule.kind_name()),
    )
}

pub(crate) fn require_target(rule: &Rule) -> SupervisorResult<&str> {
    match rule.target.as_deref() {
        Some(target) if !target.trim().is_empty() => Ok(target),
        _ => Err(SupervisorError::invalid_rule(&rule.id, "missing target")),
    }
}

pub(crate) fn compile_pattern(rule_id: &str, pattern: &str) -> SupervisorResult<Regex> {
    if pattern.is_empty() {
        return Err(SupervisorError::invalid_rule(rule_id, "empty pattern"));
    }
    Regex::new(pattern).map_err(|e| {
        SupervisorError::invalid_rule(rule_id, format!("invalid pattern '{pattern}': {e}"))
    })
}
