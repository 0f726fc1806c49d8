use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::{Rule, RuleExecutionContext, RuleKind, RuleOutcome};
use crate::error::{SupervisorError, SupervisorResult};

use super::{kind_mismatch, require_target, RuleExecutor};

/// Passes when the resolved numeric target is at least `value`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThresholdExecutor;

fn threshold_of(rule: &Rule) -> SupervisorResult<f64> {
    match rule.kind {
        RuleKind::Threshold { value } => Ok(value),
        _ => Err(kind_mismatch(rule, "threshold")),
    }
}

#[async_trait]
impl RuleExecutor for ThresholdExecutor {
    fn kind(&self) -> &str {
        "threshold"
    }

    fn validate_rule(&self, rule: &Rule) -> SupervisorResult<()> {
        let value = threshold_of(rule)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(SupervisorError::invalid_rule(
                &rule.id,
                format!("threshold value {value} is outside [0, 1]"),
            ));
        }
        require_target(rule)?;
        Ok(())
    }

    async fn execute_rule(
        &self,
        rule: &Rule,
        input: &RuleExecutionContext,
    ) -> SupervisorResult<RuleOutcome> {
        let threshold = threshold_of(rule)?;
        let target = require_target(rule)?;

        let actual = input
            .resolve_target(target)
            .as_ref()
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                SupervisorError::evaluation(
                    &rule.id,
                    format!("target '{target}' did not resolve to a number"),
                )
            })?;

        let passed = actual >= threshold;
        let message = rule.message.clone().unwrap_or_else(|| {
            let verdict = if passed { "meets" } else { "is below" };
            format!("{target} = {actual} {verdict} threshold {threshold}")
        });

        Ok(RuleOutcome {
            passed,
            message: Some(message),
            score: Some(actual.clamp(0.0, 1.0)),
            data: Some(json!({
                "target": target,
                "actual": actual,
                "threshold": threshold,
            })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_at_or_above_threshold() {
        let rule = Rule::threshold("cov", "metrics.coverage", 0.8);
        let exec = ThresholdExecutor;

        for (coverage, expected) in [(0.92, true), (0.8, true), (0.79, false)] {
            let ctx = RuleExecutionContext::new("coded", "").with_metric("coverage", coverage);
            let outcome = exec.execute_rule(&rule, &ctx).await.unwrap();
            assert_eq!(outcome.passed, expected, "coverage {coverage}");
            assert_eq!(outcome.score, Some(coverage));
        }
    }

    #[tokio::test]
    async fn test_non_numeric_target_is_an_error() {
        let rule = Rule::threshold("cov", "phase", 0.5);
        let ctx = RuleExecutionContext::new("coded", "");
        let err = ThresholdExecutor.execute_rule(&rule, &ctx).await.unwrap_err();
        assert!(matches!(err, SupervisorError::RuleExecution { .. }));
    }

    #[test]
    fn test_validation() {
        let exec = ThresholdExecutor;
        assert!(exec.validate_rule(&Rule::threshold("ok", "metrics.cov", 1.0)).is_ok());
        assert!(exec.validate_rule(&Rule::threshold("hi", "metrics.cov", 1.5)).is_err());
        assert!(exec.validate_rule(&Rule::threshold("lo", "metrics.cov", -0.1)).is_err());
        assert!(exec.validate_rule(&Rule::threshold("nan", "metrics.cov", f64::NAN)).is_err());

        let untargeted = Rule::new("bare", RuleKind::Threshold { value: 0.5 });
        assert!(exec.validate_rule(&untargeted).is_err());

        let wrong = Rule::pattern("p", "code", "x");
        assert!(!exec.can_execute(&wrong));
        assert!(exec.validate_rule(&wrong).is_err());
    }
}
