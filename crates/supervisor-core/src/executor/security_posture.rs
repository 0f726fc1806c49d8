use async_trait::async_trait;
use serde_json::json;

use crate::domain::{Rule, RuleExecutionContext, RuleKind, RuleOutcome};
use crate::error::{SupervisorError, SupervisorResult};

use super::{kind_mismatch, RuleExecutor};

/// Security posture checks. No check backend exists yet, so every
/// well-formed rule passes and is marked `not-evaluated`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SecurityPostureExecutor;

fn check_of(rule: &Rule) -> SupervisorResult<&str> {
    match &rule.kind {
        RuleKind::SecurityPosture { check } => Ok(check),
        _ => Err(kind_mismatch(rule, "security-posture")),
    }
}

#[async_trait]
impl RuleExecutor for SecurityPostureExecutor {
    fn kind(&self) -> &str {
        "security-posture"
    }

    fn validate_rule(&self, rule: &Rule) -> SupervisorResult<()> {
        if check_of(rule)?.trim().is_empty() {
            return Err(SupervisorError::invalid_rule(&rule.id, "missing check"));
        }
        Ok(())
    }

    async fn execute_rule(
        &self,
        rule: &Rule,
        _input: &RuleExecutionContext,
    ) -> SupervisorResult<RuleOutcome> {
        let check = check_of(rule)?;
        Ok(RuleOutcome::pass()
            .with_message(
                rule.message
                    .clone()
                    .unwrap_or_else(|| format!("security check '{check}' passed")),
            )
            .with_score(1.0)
            .with_data(json!({ "check": check, "status": "not-evaluated" })))
    }
}
