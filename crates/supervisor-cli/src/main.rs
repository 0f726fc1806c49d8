//! Phase Supervisor CLI
//!
//! The `supervisor` command evaluates a project's compliance rules from the
//! terminal.
//!
//! ## Commands
//!
//! - `phase`: Execute every rule a phase enforces
//! - `rule`: Execute a single rule
//! - `group`: Execute a named rule group
//! - `rules`: List the rules a phase resolves to
//! - `validate`: Pre-flight every configured rule
//! - `plugins`: Load configured plugins and list them

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::{info, Instrument, Level};

use supervisor_core::{
    obs, telemetry, CancellationToken, RuleEngine, RuleExecutionContext, SupervisorError,
};

use config::{read_document, FileConfigSource, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "supervisor")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Phase-gated compliance rule supervisor", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (.json or .toml)
    #[arg(short, long, global = true, env = "SUPERVISOR_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Execution context file (JSON or TOML)
    #[arg(long, global = true)]
    context: Option<PathBuf>,

    /// Maximum rules evaluated at once
    #[arg(long, global = true, default_value = "5")]
    concurrency: usize,

    /// Per-rule timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute every rule a phase enforces
    Phase {
        /// Phase name
        name: String,
    },

    /// Execute a single rule by id
    Rule {
        /// Rule id
        id: String,
    },

    /// Execute a named rule group
    Group {
        /// Group name
        name: String,
    },

    /// List the rules a phase resolves to
    Rules {
        /// Phase name
        phase: String,
    },

    /// Check every configured rule without executing it
    Validate,

    /// Load configured plugins and list them
    Plugins,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Phase { .. } => "phase",
            Commands::Rule { .. } => "rule",
            Commands::Group { .. } => "group",
            Commands::Rules { .. } => "rules",
            Commands::Validate => "validate",
            Commands::Plugins => "plugins",
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    telemetry::init_tracing(cli.json, level);

    let mut builder = RuleEngine::builder()
        .config_source(Arc::new(FileConfigSource::new(&cli.config)))
        .default_concurrency(cli.concurrency);
    if let Some(ms) = cli.timeout_ms {
        builder = builder.rule_timeout(Duration::from_millis(ms));
    }
    let engine = builder.build();

    engine
        .load_config(None)
        .await
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;

    let span = obs::command_span(cli.command.name());
    let outcome = async {
        match &cli.command {
            Commands::Phase { name } => cmd_phase(&engine, name, cli.context.as_deref()).await,
            Commands::Rule { id } => cmd_rule(&engine, id, cli.context.as_deref()).await,
            Commands::Group { name } => cmd_group(&engine, name, cli.context.as_deref()).await,
            Commands::Rules { phase } => cmd_rules(&engine, phase),
            Commands::Validate => cmd_validate(&engine),
            Commands::Plugins => cmd_plugins(&engine),
        }
    }
    .instrument(span)
    .await;

    engine.cleanup().await;
    outcome
}

/// Read the context file, or start from an empty context for `phase`.
async fn load_context(path: Option<&Path>, phase: &str) -> Result<RuleExecutionContext> {
    let mut ctx = match path {
        Some(path) => read_document::<RuleExecutionContext>(path)
            .await
            .with_context(|| format!("Failed to read context from {:?}", path))?,
        None => RuleExecutionContext::default(),
    };
    if ctx.phase.is_empty() {
        ctx.phase = phase.to_string();
    }
    Ok(ctx)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn status(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Execute a phase; exits non-zero when any hard rule failed
async fn cmd_phase(engine: &RuleEngine, phase: &str, context: Option<&Path>) -> Result<ExitCode> {
    let ctx = load_context(context, phase).await?;
    let concurrency = engine.options().default_concurrency;

    let result = engine
        .execute_phase_with(phase, &ctx, concurrency, CancellationToken::new())
        .await
        .with_context(|| format!("Failed to execute phase '{}'", phase))?;

    info!(
        phase = %phase,
        success = result.success,
        hard_failures = result.hard_failures.len(),
        soft_failures = result.soft_failures.len(),
        "phase evaluated"
    );
    print_json(&result)?;
    Ok(status(result.success))
}

/// Execute one rule; a failed rule still prints its result
async fn cmd_rule(engine: &RuleEngine, rule_id: &str, context: Option<&Path>) -> Result<ExitCode> {
    let ctx = load_context(context, "").await?;

    match engine.execute_rule(rule_id, &ctx).await {
        Ok(result) => {
            print_json(&result)?;
            Ok(status(!result.is_hard_failure()))
        }
        Err(SupervisorError::RuleFailed { cause, result, .. }) => {
            print_json(&json!({
                "result": result,
                "error": { "code": cause.code(), "message": cause.to_string() },
            }))?;
            Ok(status(!result.is_hard_failure()))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to execute rule '{}'", rule_id)),
    }
}

/// Execute a rule group; errored rules degrade to soft failures
async fn cmd_group(engine: &RuleEngine, group: &str, context: Option<&Path>) -> Result<ExitCode> {
    let ctx = load_context(context, "").await?;

    let results = engine
        .execute_rule_group(group, &ctx)
        .await
        .with_context(|| format!("Failed to execute rule group '{}'", group))?;

    let hard_failures = results.iter().filter(|r| r.is_hard_failure()).count();
    print_json(&results)?;
    Ok(status(hard_failures == 0))
}

fn cmd_rules(engine: &RuleEngine, phase: &str) -> Result<ExitCode> {
    let rules = engine
        .get_phase_rules(phase)
        .with_context(|| format!("Failed to resolve rules for phase '{}'", phase))?;

    print_json(&json!({
        "phase": phase,
        "requiresPlan": engine.requires_plan(phase),
        "requiresHumanApproval": engine.requires_human_approval(phase),
        "rules": rules,
    }))?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(engine: &RuleEngine) -> Result<ExitCode> {
    let invalid = engine.validate_config()?;
    let rules = engine.get_config()?.rules.len();

    print_json(&json!({
        "rules": rules,
        "valid": invalid.is_empty(),
        "invalid": invalid,
    }))?;
    Ok(status(invalid.is_empty()))
}

fn cmd_plugins(engine: &RuleEngine) -> Result<ExitCode> {
    let config = engine.get_config()?;
    let plugins = engine.get_available_plugins();

    print_json(&json!({
        "configured": config.plugins.len(),
        "loaded": plugins,
    }))?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn context_without_phase_takes_command_phase() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        std::fs::write(&path, r#"{ "metrics": { "coverage": 0.9 } }"#).unwrap();

        let ctx = load_context(Some(&path), "coded").await.unwrap();
        assert_eq!(ctx.phase, "coded");

        std::fs::write(&path, r#"{ "phase": "reviewed" }"#).unwrap();
        let ctx = load_context(Some(&path), "coded").await.unwrap();
        assert_eq!(ctx.phase, "reviewed");
    }

    #[tokio::test]
    async fn missing_context_file_is_an_error() {
        let err = load_context(Some(Path::new("/nonexistent/context.json")), "coded")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read context"));
    }
}
