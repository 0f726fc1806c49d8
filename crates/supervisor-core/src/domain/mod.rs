//! Domain model: rules, phases, configuration, execution context, results.

pub mod config;
pub mod context;
pub mod result;
pub mod rule;

pub use config::{Phase, PhaseRef, PlanRequirements, RuleGroup, SupervisorConfig};
pub use context::{RuleExecutionContext, SYSTEM_ACTOR};
pub use result::{FailureKind, PhaseExecutionResult, RuleExecutionResult, RuleOutcome};
pub use rule::{AiStrategy, Enforcement, Rule, RuleKind};
