use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::{Rule, RuleExecutionContext, RuleKind, RuleOutcome};
use crate::error::SupervisorResult;

use super::{compile_pattern, kind_mismatch, RuleExecutor};

/// Metadata key holding the commit message under review.
pub const COMMIT_MESSAGE_KEY: &str = "commitMessage";

/// Matches `metadata.commitMessage` against the rule's pattern.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommitMessageExecutor;

fn pattern_of(rule: &Rule) -> SupervisorResult<&str> {
    match &rule.kind {
        RuleKind::CommitMessage { pattern } => Ok(pattern),
        _ => Err(kind_mismatch(rule, "commit-message")),
    }
}

#[async_trait]
impl RuleExecutor for CommitMessageExecutor {
    fn kind(&self) -> &str {
        "commit-message"
    }

    fn validate_rule(&self, rule: &Rule) -> SupervisorResult<()> {
        compile_pattern(&rule.id, pattern_of(rule)?)?;
        Ok(())
    }

    async fn execute_rule(
        &self,
        rule: &Rule,
        input: &RuleExecutionContext,
    ) -> SupervisorResult<RuleOutcome> {
        let regex = compile_pattern(&rule.id, pattern_of(rule)?)?;

        let Some(message) = input.metadata_value(COMMIT_MESSAGE_KEY).and_then(Value::as_str) else {
            return Ok(RuleOutcome::fail()
                .with_message("no commit message provided in metadata.commitMessage")
                .with_score(0.0)
                .with_data(json!({ "pattern": regex.as_str() })));
        };

        let passed = regex.is_match(message);
        let summary = rule.message.clone().unwrap_or_else(|| {
            if passed {
                "commit message matches the required format".to_string()
            } else {
                format!("commit message does not match /{}/", regex.as_str())
            }
        });

        Ok(RuleOutcome {
            passed,
            message: Some(summary),
            score: Some(if passed { 1.0 } else { 0.0 }),
            data: Some(json!({
                "pattern": regex.as_str(),
                "commitMessage": message,
            })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conventional() -> Rule {
        Rule::new(
            "conventional-commit",
            RuleKind::CommitMessage {
                pattern: r"^(feat|fix|chore)(\(.+\))?: .+".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_matches_commit_message() {
        let ctx = RuleExecutionContext::new("coded", "")
            .with_metadata(COMMIT_MESSAGE_KEY, json!("feat(parser): accept tabs"));
        let outcome = CommitMessageExecutor
            .execute_rule(&conventional(), &ctx)
            .await
            .unwrap();
        assert!(outcome.passed);

        let ctx = RuleExecutionContext::new("coded", "")
            .with_metadata(COMMIT_MESSAGE_KEY, json!("updated stuff"));
        let outcome = CommitMessageExecutor
            .execute_rule(&conventional(), &ctx)
            .await
            .unwrap();
        assert!(!outcome.passed);
    }

    #[tokio::test]
    async fn test_missing_message_fails_without_error() {
        let outcome = CommitMessageExecutor
            .execute_rule(&conventional(), &RuleExecutionContext::default())
            .await
            .unwrap();
        assert!(!outcome.passed);
        assert!(outcome.message.unwrap().contains("no commit message"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let rule = Rule::new(
            "bad",
            RuleKind::CommitMessage {
                pattern: "[".into(),
            },
        );
        assert!(CommitMessageExecutor.validate_rule(&rule).is_err());
    }
}
