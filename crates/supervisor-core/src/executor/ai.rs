use async_trait::async_trait;
use serde_json::json;

use crate::domain::{Rule, RuleExecutionContext, RuleKind, RuleOutcome};
use crate::error::{SupervisorError, SupervisorResult};

use super::{kind_mismatch, require_target, RuleExecutor};

/// Placeholder for delegation to an external reasoning agent.
///
/// Validation is real; evaluation always reports a failing verdict until an
/// agent backend exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct AiExecutor;

#[async_trait]
impl RuleExecutor for AiExecutor {
    fn kind(&self) -> &str {
        "ai"
    }

    fn validate_rule(&self, rule: &Rule) -> SupervisorResult<()> {
        let RuleKind::Ai {
            agent, instruction, ..
        } = &rule.kind
        else {
            return Err(kind_mismatch(rule, "ai"));
        };
        if agent.trim().is_empty() {
            return Err(SupervisorError::invalid_rule(&rule.id, "missing agent"));
        }
        if instruction.trim().is_empty() {
            return Err(SupervisorError::invalid_rule(&rule.id, "missing instruction"));
        }
        require_target(rule)?;
        Ok(())
    }

    async fn execute_rule(
        &self,
        rule: &Rule,
        _input: &RuleExecutionContext,
    ) -> SupervisorResult<RuleOutcome> {
        let RuleKind::Ai {
            agent,
            strategy,
            instruction,
            refactor_allowed,
        } = &rule.kind
        else {
            return Err(kind_mismatch(rule, "ai"));
        };

        Ok(RuleOutcome::fail()
            .with_message(format!(
                "AI rule execution is not yet implemented (agent '{agent}', strategy '{strategy}')"
            ))
            .with_score(0.0)
            .with_data(json!({
                "agent": agent,
                "strategy": strategy,
                "instruction": instruction,
                "refactorAllowed": refactor_allowed.unwrap_or(false),
            })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AiStrategy;

    fn ai_rule(agent: &str, instruction: &str) -> Rule {
        Rule::new(
            "ai-review",
            RuleKind::Ai {
                agent: agent.into(),
                strategy: AiStrategy::Refactor,
                instruction: instruction.into(),
                refactor_allowed: Some(true),
            },
        )
        .with_target("code")
    }

    #[tokio::test]
    async fn test_stub_always_fails() {
        let rule = ai_rule("reviewer", "remove dead code");
        AiExecutor.validate_rule(&rule).unwrap();

        let outcome = AiExecutor
            .execute_rule(&rule, &RuleExecutionContext::default())
            .await
            .unwrap();
        assert!(!outcome.passed);
        assert!(outcome.message.unwrap().contains("not yet implemented"));
        assert_eq!(outcome.data.unwrap()["strategy"], "refactor");
    }

    #[test]
    fn test_validation_requires_agent_and_instruction() {
        assert!(AiExecutor.validate_rule(&ai_rule("", "x")).is_err());
        assert!(AiExecutor.validate_rule(&ai_rule("reviewer", " ")).is_err());

        let mut untargeted = ai_rule("reviewer", "x");
        untargeted.target = None;
        assert!(AiExecutor.validate_rule(&untargeted).is_err());
    }
}
