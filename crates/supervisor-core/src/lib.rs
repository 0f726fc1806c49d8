//! Phase Supervisor Core Library
//!
//! Evaluates compliance rules against phase-gated development workflows:
//! resolves a phase's rules, runs them with bounded concurrency through
//! pluggable executors, separates hard from soft failures, and keeps an
//! audit trail of every attempt.

pub mod audit;
pub mod domain;
pub mod engine;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod obs;
pub mod parallel;
pub mod plugin;
pub mod telemetry;

pub use audit::{AuditFilter, AuditLog, AuditLogEntry};

pub use domain::{
    AiStrategy, Enforcement, FailureKind, Phase, PhaseExecutionResult, PhaseRef,
    PlanRequirements, Rule, RuleExecutionContext, RuleExecutionResult, RuleGroup, RuleKind,
    RuleOutcome, SupervisorConfig,
};

pub use engine::{ConfigSource, EngineOptions, RuleEngine, RuleEngineBuilder, StaticConfigSource};

pub use error::{SupervisorError, SupervisorResult};

pub use executor::{ExecutorFactory, RuleExecutor};

pub use parallel::{run_bounded, CancellationToken, RunnerOptions, TaskOutcome};

pub use plugin::{
    DirectoryLoadReport, ManifestPluginLoader, PluginInfo, PluginLoader, PluginManager,
    PluginRegistry, RulePlugin,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
