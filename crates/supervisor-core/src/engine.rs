//! The rule engine: resolves phases and groups, runs rules with bounded
//! concurrency, classifies failures, and records every attempt in the
//! audit log.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn, Instrument};

use crate::audit::{phase_action, rule_action, AuditLog, AuditLogEntry};
use crate::domain::{
    Enforcement, FailureKind, PhaseExecutionResult, Rule, RuleExecutionContext,
    RuleExecutionResult, RuleGroup, RuleOutcome, SupervisorConfig,
};
use crate::error::{SupervisorError, SupervisorResult};
use crate::executor::{ExecutorFactory, RuleExecutor};
use crate::metrics::METRICS;
use crate::obs;
use crate::parallel::{run_bounded, CancellationToken, RunnerOptions, TaskOutcome, DEFAULT_CONCURRENCY};
use crate::plugin::{PluginInfo, PluginManager};

/// Rule type recorded when a rule id cannot be resolved.
const UNKNOWN_RULE_TYPE: &str = "unknown";

/// How contained rule errors are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Containment {
    /// Keep the rule's declared enforcement.
    Declared,
    /// Group executions never block: errors become soft.
    Soft,
}

impl Containment {
    fn enforcement(self, declared: Enforcement) -> Enforcement {
        match self {
            Containment::Declared => declared,
            Containment::Soft => Enforcement::Soft,
        }
    }
}

/// Produces the [`SupervisorConfig`] the engine evaluates against.
#[async_trait]
pub trait ConfigSource: Send + Sync + 'static {
    async fn load(&self, path: Option<&Path>) -> SupervisorResult<SupervisorConfig>;
}

/// A fixed in-memory configuration. Ignores the requested path.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    config: SupervisorConfig,
}

impl StaticConfigSource {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn load(&self, _path: Option<&Path>) -> SupervisorResult<SupervisorConfig> {
        Ok(self.config.clone())
    }
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Concurrency used by [`RuleEngine::execute_phase`] and
    /// [`RuleEngine::execute_rule_group`].
    pub default_concurrency: usize,
    /// Upper bound on a single rule evaluation. `None` waits indefinitely.
    pub rule_timeout: Option<Duration>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_concurrency: DEFAULT_CONCURRENCY,
            rule_timeout: None,
        }
    }
}

/// Builder for [`RuleEngine`]. Unset collaborators get fresh defaults.
#[derive(Default)]
pub struct RuleEngineBuilder {
    config_source: Option<Arc<dyn ConfigSource>>,
    config: Option<SupervisorConfig>,
    plugins: Option<Arc<PluginManager>>,
    audit: Option<Arc<AuditLog>>,
    options: EngineOptions,
}

impl RuleEngineBuilder {
    /// Source consulted by [`RuleEngine::load_config`].
    pub fn config_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.config_source = Some(source);
        self
    }

    /// Install a configuration up front, as if loaded.
    pub fn config(mut self, config: SupervisorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Share a plugin manager with other engines.
    pub fn plugin_manager(mut self, plugins: Arc<PluginManager>) -> Self {
        self.plugins = Some(plugins);
        self
    }

    /// Share an audit log with other engines.
    pub fn audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Concurrency for [`RuleEngine::execute_phase`] and
    /// [`RuleEngine::execute_rule_group`]. Zero is treated as one.
    pub fn default_concurrency(mut self, concurrency: usize) -> Self {
        self.options.default_concurrency = concurrency;
        self
    }

    /// Upper bound on each rule evaluation.
    pub fn rule_timeout(mut self, timeout: Duration) -> Self {
        self.options.rule_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> RuleEngine {
        let plugins = self.plugins.unwrap_or_default();
        RuleEngine {
            config_source: self.config_source,
            config: RwLock::new(self.config.map(|c| Arc::new(c.normalized()))),
            executors: ExecutorFactory::new(Arc::clone(&plugins)),
            plugins,
            audit: self.audit.unwrap_or_default(),
            options: self.options,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Top-level orchestrator over configuration, executors, plugins, and audit.
pub struct RuleEngine {
    config_source: Option<Arc<dyn ConfigSource>>,
    config: RwLock<Option<Arc<SupervisorConfig>>>,
    plugins: Arc<PluginManager>,
    executors: ExecutorFactory,
    audit: Arc<AuditLog>,
    options: EngineOptions,
}

impl RuleEngine {
    pub fn builder() -> RuleEngineBuilder {
        RuleEngineBuilder::default()
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Load configuration from the source and load the plugins it declares.
    ///
    /// Plugin failures are logged and skipped.
    pub async fn load_config(&self, path: Option<&Path>) -> SupervisorResult<Arc<SupervisorConfig>> {
        let source = self.config_source.as_ref().ok_or_else(|| {
            SupervisorError::Configuration("no configuration source configured".to_string())
        })?;
        let config = Arc::new(source.load(path).await?.normalized());
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&config));
        info!(
            phases = config.phases.len(),
            rules = config.rules.len(),
            groups = config.rule_groups.len(),
            "configuration loaded"
        );

        if !config.plugins.is_empty() {
            self.load_plugins(&config.plugins).await;
        }
        Ok(config)
    }

    /// Replace the active configuration. Executions already running keep
    /// the snapshot they started with.
    pub fn set_config(&self, config: SupervisorConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::new(config.normalized()));
    }

    /// The active configuration snapshot.
    ///
    /// Fails with [`SupervisorError::ConfigurationNotLoaded`] before the
    /// first `load_config` or `set_config`.
    pub fn get_config(&self) -> SupervisorResult<Arc<SupervisorConfig>> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(SupervisorError::ConfigurationNotLoaded)
    }

    /// Rules a phase enforces, in declaration order.
    ///
    /// Unknown rule ids are skipped; an undeclared phase or group is an
    /// error.
    pub fn get_phase_rules(&self, phase: &str) -> SupervisorResult<Vec<Rule>> {
        let config = self.get_config()?;
        let rules = config.phase_rules(phase)?;
        Ok(rules.into_iter().cloned().collect())
    }

    /// Look up a declared rule group.
    pub fn get_rule_group(&self, name: &str) -> SupervisorResult<RuleGroup> {
        self.get_config()?
            .rule_groups
            .get(name)
            .cloned()
            .ok_or_else(|| SupervisorError::RuleGroupNotFound(name.to_string()))
    }

    pub fn requires_human_approval(&self, phase: &str) -> bool {
        self.get_config()
            .ok()
            .and_then(|c| c.phases.get(phase).map(|p| p.require_human_approval))
            .unwrap_or(false)
    }

    pub fn requires_plan(&self, phase: &str) -> bool {
        self.get_config()
            .ok()
            .and_then(|c| c.phases.get(phase).map(|p| p.require_plan))
            .unwrap_or(false)
    }

    pub fn get_required_plan_sections(&self) -> Vec<String> {
        self.get_config()
            .map(|c| c.plan.required_sections.clone())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Pre-flight check of a single rule. Never errors; a rejected rule is
    /// logged and reported as `false`.
    pub fn validate_supervisor_rule(&self, rule: &Rule) -> bool {
        let checked = self
            .executors
            .executor_for(rule)
            .and_then(|executor| executor.validate_rule(rule));
        match checked {
            Ok(()) => true,
            Err(e) => {
                warn!(rule_id = %rule.id, error = %e, "rule failed validation");
                false
            }
        }
    }

    /// Ids of every configured rule that fails validation.
    pub fn validate_config(&self) -> SupervisorResult<Vec<String>> {
        let config = self.get_config()?;
        Ok(config
            .rules
            .values()
            .filter(|rule| !self.validate_supervisor_rule(rule))
            .map(|rule| rule.id.clone())
            .collect())
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Execute one rule by id.
    ///
    /// Every call writes exactly one audit entry. On failure the error is
    /// [`SupervisorError::RuleFailed`], carrying the cause and a failing
    /// result with the elapsed time.
    pub async fn execute_rule(
        &self,
        rule_id: &str,
        ctx: &RuleExecutionContext,
    ) -> SupervisorResult<RuleExecutionResult> {
        match self.get_config() {
            Ok(config) => self.run_rule(&config, rule_id, ctx, Containment::Declared).await,
            Err(cause) => Err(self
                .fail_rule(
                    rule_id,
                    UNKNOWN_RULE_TYPE,
                    Enforcement::default(),
                    cause,
                    ctx,
                    Instant::now(),
                    Containment::Declared,
                )
                .await),
        }
    }

    pub async fn execute_phase(
        &self,
        phase: &str,
        ctx: &RuleExecutionContext,
    ) -> SupervisorResult<PhaseExecutionResult> {
        self.execute_phase_with(
            phase,
            ctx,
            self.options.default_concurrency,
            CancellationToken::new(),
        )
        .await
    }

    /// Execute every rule a phase enforces with at most `concurrency` in
    /// flight.
    ///
    /// Rule failures are contained in the result. Structural failures
    /// (configuration not loaded, unknown phase or group, malformed
    /// `enforce` entry) are returned as errors after a phase-level audit
    /// entry is written. Rules not started before `cancel` fires are
    /// reported as failing results with [`FailureKind::Cancelled`].
    pub async fn execute_phase_with(
        &self,
        phase: &str,
        ctx: &RuleExecutionContext,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> SupervisorResult<PhaseExecutionResult> {
        self.run_phase(phase, ctx, concurrency, cancel)
            .instrument(obs::phase_span(phase))
            .await
    }

    pub async fn execute_rule_group(
        &self,
        group: &str,
        ctx: &RuleExecutionContext,
    ) -> SupervisorResult<Vec<RuleExecutionResult>> {
        self.execute_rule_group_with(
            group,
            ctx,
            self.options.default_concurrency,
            CancellationToken::new(),
        )
        .await
    }

    /// Execute a named group's rules with at most `concurrency` in flight.
    ///
    /// A failing rule degrades to a soft failing result for that rule only.
    pub async fn execute_rule_group_with(
        &self,
        group: &str,
        ctx: &RuleExecutionContext,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> SupervisorResult<Vec<RuleExecutionResult>> {
        let config = self.get_config()?;
        let declared = config
            .rule_groups
            .get(group)
            .ok_or_else(|| SupervisorError::RuleGroupNotFound(group.to_string()))?;
        let ids = declared.rule_ids();
        debug!(group = %group, rules = ids.len(), "executing rule group");

        let tasks: Vec<_> = ids
            .iter()
            .map(|id| self.run_rule_contained(&config, id, ctx, Containment::Soft))
            .collect();
        let outcomes =
            run_bounded(tasks, RunnerOptions::new(concurrency).with_cancel(cancel)).await;

        let mut results = Vec::with_capacity(ids.len());
        for (id, outcome) in ids.iter().zip(outcomes) {
            let result = match outcome {
                TaskOutcome::Completed(result) => result,
                TaskOutcome::Cancelled => {
                    let (rule_type, enforcement) = match config.rules.get(*id) {
                        Some(rule) => (rule.kind_name(), rule.enforcement_or(config.default_enforcement)),
                        None => (UNKNOWN_RULE_TYPE, config.default_enforcement),
                    };
                    self.cancelled_rule(id, rule_type, enforcement, ctx, Containment::Soft)
                        .await
                }
            };
            results.push(result);
        }
        Ok(results)
    }

    // ------------------------------------------------------------------
    // Plugins
    // ------------------------------------------------------------------

    /// Load each plugin path, logging and skipping failures.
    pub async fn load_plugins(&self, paths: &[PathBuf]) -> Vec<PluginInfo> {
        let mut loaded = Vec::with_capacity(paths.len());
        for path in paths {
            match self.plugins.load_plugin(path).await {
                Ok(info) => loaded.push(info),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping plugin"),
            }
        }
        loaded
    }

    pub fn get_available_plugins(&self) -> Vec<PluginInfo> {
        self.plugins.list_plugins()
    }

    pub async fn load_plugin(&self, path: impl AsRef<Path>) -> SupervisorResult<PluginInfo> {
        self.plugins.load_plugin(path).await
    }

    pub async fn unload_plugin(&self, name: &str) -> SupervisorResult<()> {
        self.plugins.unload_plugin(name).await
    }

    /// Initialize every loaded plugin.
    pub async fn initialize(&self) -> SupervisorResult<()> {
        self.plugins.initialize_plugins().await
    }

    /// Clean up every loaded plugin and flush execution counters.
    pub async fn cleanup(&self) {
        self.plugins.cleanup_plugins().await;
        METRICS.flush();
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    /// Register a custom executor, replacing any executor of the same kind.
    pub fn register_executor(&self, executor: Arc<dyn RuleExecutor>) {
        self.executors.register_executor(executor);
    }

    pub fn executors(&self) -> &ExecutorFactory {
        &self.executors
    }

    pub fn plugins(&self) -> &Arc<PluginManager> {
        &self.plugins
    }

    pub fn audit_log(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn run_phase(
        &self,
        phase: &str,
        ctx: &RuleExecutionContext,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> SupervisorResult<PhaseExecutionResult> {
        let started = Instant::now();

        let config = match self.get_config() {
            Ok(config) => config,
            Err(e) => return Err(self.fail_phase(phase, ctx, e).await),
        };
        let Some(declared) = config.phases.get(phase) else {
            let e = SupervisorError::PhaseNotFound(phase.to_string());
            return Err(self.fail_phase(phase, ctx, e).await);
        };
        let rules = match config.phase_rules(phase) {
            Ok(rules) => rules,
            Err(SupervisorError::Configuration(reason)) => {
                let e = SupervisorError::PhaseExecution {
                    phase: phase.to_string(),
                    reason,
                };
                return Err(self.fail_phase(phase, ctx, e).await);
            }
            Err(e) => return Err(self.fail_phase(phase, ctx, e).await),
        };
        debug!(rules = rules.len(), concurrency, "executing phase");

        let tasks: Vec<_> = rules
            .iter()
            .map(|rule| self.run_rule_contained(&config, &rule.id, ctx, Containment::Declared))
            .collect();
        let outcomes =
            run_bounded(tasks, RunnerOptions::new(concurrency).with_cancel(cancel)).await;

        let mut results = Vec::with_capacity(rules.len());
        for (rule, outcome) in rules.iter().zip(outcomes) {
            let result = match outcome {
                TaskOutcome::Completed(result) => result,
                TaskOutcome::Cancelled => {
                    let enforcement = rule.enforcement_or(config.default_enforcement);
                    self.cancelled_rule(
                        &rule.id,
                        rule.kind_name(),
                        enforcement,
                        ctx,
                        Containment::Declared,
                    )
                    .await
                }
            };
            results.push(result);
        }

        let result = PhaseExecutionResult::from_results(
            phase,
            results,
            declared.require_human_approval,
            declared.require_plan,
            elapsed_ms(started),
        );

        METRICS.inc_phases();
        obs::emit_phase_executed(
            phase,
            result.success,
            result.results.len(),
            result.hard_failures.len(),
            result.soft_failures.len(),
            result.execution_time_ms,
        );

        let summary = json!({
            "executionId": result.execution_id,
            "success": result.success,
            "rules": result.results.len(),
            "hardFailures": result.hard_failures.len(),
            "softFailures": result.soft_failures.len(),
            "requiresHumanApproval": result.requires_human_approval,
            "executionTime": result.execution_time_ms,
        });
        let entry = AuditLogEntry::new(ctx.actor(), phase_action(phase), ctx.snapshot(), summary)
            .with_deviation(!result.success);
        self.audit.log(entry).await;

        Ok(result)
    }

    async fn run_rule(
        &self,
        config: &SupervisorConfig,
        rule_id: &str,
        ctx: &RuleExecutionContext,
        containment: Containment,
    ) -> SupervisorResult<RuleExecutionResult> {
        let started = Instant::now();

        let Some(rule) = config.rules.get(rule_id) else {
            let cause = SupervisorError::RuleNotFound(rule_id.to_string());
            return Err(self
                .fail_rule(
                    rule_id,
                    UNKNOWN_RULE_TYPE,
                    config.default_enforcement,
                    cause,
                    ctx,
                    started,
                    containment,
                )
                .await);
        };
        let enforcement = rule.enforcement_or(config.default_enforcement);

        match self.evaluate(rule, ctx).await {
            Ok(outcome) => {
                let result = RuleExecutionResult::from_outcome(
                    &rule.id,
                    rule.kind_name(),
                    enforcement,
                    outcome,
                    elapsed_ms(started),
                );
                self.record_rule(&result, ctx).await;
                Ok(result)
            }
            Err(cause) => Err(self
                .fail_rule(
                    &rule.id,
                    rule.kind_name(),
                    enforcement,
                    cause,
                    ctx,
                    started,
                    containment,
                )
                .await),
        }
    }

    /// [`Self::run_rule`] with the error folded into its failing result.
    async fn run_rule_contained(
        &self,
        config: &SupervisorConfig,
        rule_id: &str,
        ctx: &RuleExecutionContext,
        containment: Containment,
    ) -> RuleExecutionResult {
        match self.run_rule(config, rule_id, ctx, containment).await {
            Ok(result) => result,
            Err(SupervisorError::RuleFailed { result, .. }) => *result,
            Err(other) => RuleExecutionResult::failed(
                rule_id,
                UNKNOWN_RULE_TYPE,
                containment.enforcement(config.default_enforcement),
                FailureKind::Error,
                other.to_string(),
                0,
            ),
        }
    }

    async fn evaluate(&self, rule: &Rule, ctx: &RuleExecutionContext) -> SupervisorResult<RuleOutcome> {
        let executor = self.executors.executor_for(rule)?;
        executor.validate_rule(rule)?;

        let run = executor.execute_rule(rule, ctx);
        match self.options.rule_timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                SupervisorError::RuleTimeout {
                    rule_id: rule.id.clone(),
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }
            })?,
            None => run.await,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn fail_rule(
        &self,
        rule_id: &str,
        rule_type: &str,
        enforcement: Enforcement,
        cause: SupervisorError,
        ctx: &RuleExecutionContext,
        started: Instant,
        containment: Containment,
    ) -> SupervisorError {
        let kind = match cause {
            SupervisorError::RuleTimeout { .. } => FailureKind::Timeout,
            _ => FailureKind::Error,
        };
        warn!(rule_id = %rule_id, error = %cause, "rule execution failed");

        let result = RuleExecutionResult::failed(
            rule_id,
            rule_type,
            containment.enforcement(enforcement),
            kind,
            cause.to_string(),
            elapsed_ms(started),
        );
        self.record_rule(&result, ctx).await;

        SupervisorError::RuleFailed {
            rule_id: rule_id.to_string(),
            cause: Box::new(cause),
            result: Box::new(result),
        }
    }

    async fn cancelled_rule(
        &self,
        rule_id: &str,
        rule_type: &str,
        enforcement: Enforcement,
        ctx: &RuleExecutionContext,
        containment: Containment,
    ) -> RuleExecutionResult {
        let result = RuleExecutionResult::failed(
            rule_id,
            rule_type,
            containment.enforcement(enforcement),
            FailureKind::Cancelled,
            "execution cancelled before the rule started",
            0,
        );
        self.record_rule(&result, ctx).await;
        result
    }

    async fn record_rule(&self, result: &RuleExecutionResult, ctx: &RuleExecutionContext) {
        METRICS.record_rule(result.passed);
        obs::emit_rule_executed(
            &result.rule_id,
            &result.rule_type,
            result.passed,
            result.execution_time_ms,
        );

        let mut entry = AuditLogEntry::new(
            ctx.actor(),
            rule_action(&result.rule_id),
            ctx.snapshot(),
            to_json(result),
        )
        .with_deviation(!result.passed);
        if let Some(message) = &result.message {
            entry = entry.with_message(message.clone());
        }
        self.audit.log(entry).await;
    }

    async fn fail_phase(
        &self,
        phase: &str,
        ctx: &RuleExecutionContext,
        error: SupervisorError,
    ) -> SupervisorError {
        warn!(phase = %phase, error = %error, "phase execution failed");
        let entry = AuditLogEntry::new(
            ctx.actor(),
            phase_action(phase),
            ctx.snapshot(),
            json!({ "success": false, "error": error.to_string(), "code": error.code() }),
        )
        .with_deviation(true)
        .with_message(error.to_string());
        self.audit.log(entry).await;
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Phase, RuleKind};

    fn engine() -> RuleEngine {
        let config = SupervisorConfig::new()
            .with_rule(Rule::threshold("coverage", "test.coverage", 0.8))
            .with_rule(
                Rule::pattern("no-console", "code", r"console\.log")
                    .with_enforcement(Enforcement::Soft),
            )
            .with_phase(
                "coded",
                Phase::new()
                    .enforce_rule("coverage")
                    .enforce_rule("no-console")
                    .with_human_approval(),
            );
        RuleEngine::builder().config(config).build()
    }

    #[tokio::test]
    async fn test_rule_not_found_is_wrapped() {
        let engine = engine();
        let err = engine
            .execute_rule("ghost", &RuleExecutionContext::new("coded", ""))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "RULE_EXECUTION_ERROR");
        assert!(matches!(err.root_cause(), SupervisorError::RuleNotFound(_)));
        assert_eq!(engine.audit_log().len().await, 1);
    }

    #[tokio::test]
    async fn test_unloaded_engine() {
        let engine = RuleEngine::builder().build();
        let ctx = RuleExecutionContext::new("coded", "");

        let err = engine.execute_phase("coded", &ctx).await.unwrap_err();
        assert!(matches!(err, SupervisorError::ConfigurationNotLoaded));
        assert!(!engine.requires_human_approval("coded"));
        assert!(engine.get_required_plan_sections().is_empty());
        assert_eq!(engine.audit_log().len().await, 1);

        let err = engine.load_config(None).await.unwrap_err();
        assert!(matches!(err, SupervisorError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_soft_failure_does_not_block() {
        let engine = engine();
        let ctx = RuleExecutionContext::new("coded", "")
            .with_metric("coverage", 0.9)
            .with_code("fn main() {}");

        let result = engine.execute_phase("coded", &ctx).await.unwrap();
        assert!(result.success);
        assert_eq!(result.soft_failures.len(), 1);
        assert!(result.requires_human_approval);
        assert_eq!(engine.audit_log().len().await, 3);
    }

    #[tokio::test]
    async fn test_malformed_enforce_entry() {
        let engine = engine();
        let mut config = (*engine.get_config().unwrap()).clone();
        config.phases.insert(
            "broken".into(),
            Phase {
                enforce: vec!["coverage".into()],
                ..Phase::default()
            },
        );
        engine.set_config(config);

        let err = engine
            .execute_phase("broken", &RuleExecutionContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PHASE_EXECUTION_ERROR");
    }

    #[test]
    fn test_validate_supervisor_rule() {
        let engine = engine();
        assert!(engine.validate_supervisor_rule(&Rule::threshold("ok", "metrics.x", 0.5)));
        assert!(!engine.validate_supervisor_rule(&Rule::threshold("bad", "metrics.x", 2.0)));
        assert!(!engine.validate_supervisor_rule(&Rule::new(
            "ghost-plugin",
            RuleKind::Plugin {
                plugin: "ghost".into(),
                config: json!({}),
            }
        )));
    }
}
