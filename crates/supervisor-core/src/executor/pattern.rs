use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::{Rule, RuleExecutionContext, RuleKind, RuleOutcome};
use crate::error::{SupervisorError, SupervisorResult};

use super::{compile_pattern, kind_mismatch, require_target, RuleExecutor};

/// Passes when the resolved string target contains a match for `pattern`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternExecutor;

fn pattern_of(rule: &Rule) -> SupervisorResult<&str> {
    match &rule.kind {
        RuleKind::Pattern { pattern } => Ok(pattern),
        _ => Err(kind_mismatch(rule, "pattern")),
    }
}

#[async_trait]
impl RuleExecutor for PatternExecutor {
    fn kind(&self) -> &str {
        "pattern"
    }

    fn validate_rule(&self, rule: &Rule) -> SupervisorResult<()> {
        compile_pattern(&rule.id, pattern_of(rule)?)?;
        require_target(rule)?;
        Ok(())
    }

    async fn execute_rule(
        &self,
        rule: &Rule,
        input: &RuleExecutionContext,
    ) -> SupervisorResult<RuleOutcome> {
        let regex = compile_pattern(&rule.id, pattern_of(rule)?)?;
        let target = require_target(rule)?;

        let resolved = input.resolve_target(target);
        let haystack = resolved.as_ref().and_then(Value::as_str).ok_or_else(|| {
            SupervisorError::evaluation(
                &rule.id,
                format!("target '{target}' did not resolve to a string"),
            )
        })?;

        let matches: Vec<&str> = regex.find_iter(haystack).map(|m| m.as_str()).collect();
        let passed = !matches.is_empty();
        let message = rule.message.clone().unwrap_or_else(|| {
            if passed {
                format!("{} match(es) for /{}/ in {target}", matches.len(), regex.as_str())
            } else {
                format!("no match for /{}/ in {target}", regex.as_str())
            }
        });

        Ok(RuleOutcome {
            passed,
            message: Some(message),
            score: Some(if passed { 1.0 } else { 0.0 }),
            data: Some(json!({
                "matches": matches,
                "matchCount": matches.len(),
            })),
        })
    }
}
