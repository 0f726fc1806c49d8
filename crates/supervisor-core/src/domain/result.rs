//! Rule and phase execution results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::rule::Enforcement;

/// The verdict an executor or plugin produces for one rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Score in 0.0–1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Free-form diagnostic payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RuleOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    pub fn fail() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Why a rule result is failing without the rule having been evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Validation or evaluation raised an error.
    Error,
    /// The per-rule timeout elapsed.
    Timeout,
    /// The execution was cancelled before the rule started.
    Cancelled,
}

/// The engine's immutable record of one rule execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleExecutionResult {
    pub rule_id: String,
    pub rule_type: String,
    pub enforcement: Enforcement,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(rename = "executionTime")]
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Set when the result was synthesized from a contained failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl RuleExecutionResult {
    pub fn from_outcome(
        rule_id: &str,
        rule_type: &str,
        enforcement: Enforcement,
        outcome: RuleOutcome,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            rule_type: rule_type.to_string(),
            enforcement,
            passed: outcome.passed,
            message: outcome.message,
            score: outcome.score,
            execution_time_ms,
            data: outcome.data,
            failure: None,
        }
    }

    /// A failing result standing in for a rule that could not be evaluated.
    pub fn failed(
        rule_id: &str,
        rule_type: &str,
        enforcement: Enforcement,
        kind: FailureKind,
        message: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            rule_type: rule_type.to_string(),
            enforcement,
            passed: false,
            message: Some(message.into()),
            score: Some(0.0),
            execution_time_ms,
            data: None,
            failure: Some(kind),
        }
    }

    /// Blocks phase success.
    pub fn is_hard_failure(&self) -> bool {
        self.enforcement == Enforcement::Hard && !self.passed
    }

    /// Reported but non-blocking.
    pub fn is_soft_failure(&self) -> bool {
        self.enforcement == Enforcement::Soft && !self.passed
    }
}

/// The outcome of executing every rule a phase enforces.
///
/// # Invariants
///
/// `hard_failures` and `soft_failures` partition the failing entries of
/// `results`; `success` is true iff `hard_failures` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseExecutionResult {
    pub execution_id: Uuid,
    pub phase: String,
    pub success: bool,
    pub results: Vec<RuleExecutionResult>,
    pub hard_failures: Vec<RuleExecutionResult>,
    pub soft_failures: Vec<RuleExecutionResult>,
    pub requires_human_approval: bool,
    pub requires_plan: bool,
    #[serde(rename = "executionTime")]
    pub execution_time_ms: u64,
}

impl PhaseExecutionResult {
    /// Partition `results` into hard and soft failures.
    pub fn from_results(
        phase: &str,
        results: Vec<RuleExecutionResult>,
        requires_human_approval: bool,
        requires_plan: bool,
        execution_time_ms: u64,
    ) -> Self {
        let hard_failures: Vec<RuleExecutionResult> = results
            .iter()
            .filter(|r| r.is_hard_failure())
            .cloned()
            .collect();
        let soft_failures: Vec<RuleExecutionResult> = results
            .iter()
            .filter(|r| r.is_soft_failure())
            .cloned()
            .collect();

        Self {
            execution_id: Uuid::new_v4(),
            phase: phase.to_string(),
            success: hard_failures.is_empty(),
            results,
            hard_failures,
            soft_failures,
            requires_human_approval,
            requires_plan,
            execution_time_ms,
        }
    }

    /// Number of results that did not pass.
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, enforcement: Enforcement, passed: bool) -> RuleExecutionResult {
        let outcome = if passed {
            RuleOutcome::pass()
        } else {
            RuleOutcome::fail()
        };
        RuleExecutionResult::from_outcome(id, "threshold", enforcement, outcome, 1)
    }

    #[test]
    fn test_partition_by_enforcement() {
        let phase = PhaseExecutionResult::from_results(
            "coded",
            vec![
                result("a", Enforcement::Hard, true),
                result("b", Enforcement::Hard, false),
                result("c", Enforcement::Soft, false),
                result("d", Enforcement::Soft, true),
            ],
            true,
            false,
            10,
        );

        assert!(!phase.success);
        assert_eq!(phase.hard_failures.len(), 1);
        assert_eq!(phase.soft_failures.len(), 1);
        assert_eq!(
            phase.hard_failures.len() + phase.soft_failures.len(),
            phase.failed_count()
        );
        assert!(phase.requires_human_approval);
    }

    #[test]
    fn test_soft_failures_never_block() {
        let phase = PhaseExecutionResult::from_results(
            "coded",
            vec![result("c", Enforcement::Soft, false)],
            false,
            false,
            1,
        );
        assert!(phase.success);
        assert_eq!(phase.soft_failures.len(), 1);
    }

    #[test]
    fn test_failed_result_shape() {
        let r = RuleExecutionResult::failed(
            "cov",
            "threshold",
            Enforcement::Hard,
            FailureKind::Timeout,
            "timed out",
            30,
        );
        assert!(!r.passed);
        assert!(r.is_hard_failure());
        assert_eq!(r.failure, Some(FailureKind::Timeout));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["executionTime"], 30);
        assert_eq!(json["ruleId"], "cov");
    }
}
