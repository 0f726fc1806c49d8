use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

use crate::domain::Rule;
use crate::error::{SupervisorError, SupervisorResult};
use crate::plugin::PluginManager;

use super::{
    AiExecutor, CommitMessageExecutor, PatternExecutor, PluginExecutor, RuleExecutor,
    SecurityPostureExecutor, StructureExecutor, ThresholdExecutor,
};

/// Maps a rule `type` to its executor.
///
/// Pre-populated with every built-in kind. Host applications may replace a
/// built-in or add new kinds with [`ExecutorFactory::register_executor`].
pub struct ExecutorFactory {
    executors: RwLock<HashMap<String, Arc<dyn RuleExecutor>>>,
}

impl ExecutorFactory {
    pub fn new(plugins: Arc<PluginManager>) -> Self {
        let builtins: [Arc<dyn RuleExecutor>; 7] = [
            Arc::new(ThresholdExecutor),
            Arc::new(PatternExecutor),
            Arc::new(AiExecutor),
            Arc::new(PluginExecutor::new(plugins)),
            Arc::new(CommitMessageExecutor),
            Arc::new(SecurityPostureExecutor),
            Arc::new(StructureExecutor),
        ];
        let executors = builtins
            .into_iter()
            .map(|e| (e.kind().to_string(), e))
            .collect();
        Self {
            executors: RwLock::new(executors),
        }
    }

    pub fn create_executor(&self, kind: &str) -> SupervisorResult<Arc<dyn RuleExecutor>> {
        self.executors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .cloned()
            .ok_or_else(|| SupervisorError::UnknownRuleKind(kind.to_string()))
    }

    /// Register `executor` under its own kind, replacing any existing one.
    pub fn register_executor(&self, executor: Arc<dyn RuleExecutor>) {
        let kind = executor.kind().to_string();
        let previous = self
            .executors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind.clone(), executor);
        if previous.is_some() {
            warn!(kind = %kind, "overriding registered rule executor");
        }
    }

    /// The executor for `rule`, checked with `can_execute`.
    pub fn executor_for(&self, rule: &Rule) -> SupervisorResult<Arc<dyn RuleExecutor>> {
        let executor = self.create_executor(rule.kind_name())?;
        if !executor.can_execute(rule) {
            return Err(SupervisorError::invalid_rule(
                &rule.id,
                format!(
                    "executor '{}' cannot execute a '{}' rule",
                    executor.kind(),
                    rule.kind_name()
                ),
            ));
        }
        Ok(executor)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self
            .executors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        kinds.sort();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RuleExecutionContext, RuleOutcome};
    use async_trait::async_trait;

    struct AlwaysPass;

    #[async_trait]
    impl RuleExecutor for AlwaysPass {
        fn kind(&self) -> &str {
            "threshold"
        }

        fn validate_rule(&self, _rule: &Rule) -> SupervisorResult<()> {
            Ok(())
        }

        async fn execute_rule(
            &self,
            _rule: &Rule,
            _input: &RuleExecutionContext,
        ) -> SupervisorResult<RuleOutcome> {
            Ok(RuleOutcome::pass())
        }
    }

    fn factory() -> ExecutorFactory {
        ExecutorFactory::new(Arc::new(PluginManager::new()))
    }

    #[test]
    fn test_builtins_are_registered() {
        assert_eq!(
            factory().kinds(),
            vec![
                "ai",
                "commit-message",
                "pattern",
                "plugin",
                "security-posture",
                "structure",
                "threshold"
            ]
        );
    }

    #[test]
    fn test_unknown_kind() {
        let err = factory().create_executor("lint").err().unwrap();
        assert!(matches!(err, SupervisorError::UnknownRuleKind(kind) if kind == "lint"));
    }

    #[tokio::test]
    async fn test_register_overrides_builtin() {
        let factory = factory();
        factory.register_executor(Arc::new(AlwaysPass));

        // Below threshold, but the override passes everything.
        let rule = Rule::threshold("cov", "metrics.coverage", 0.9);
        let ctx = RuleExecutionContext::new("coded", "").with_metric("coverage", 0.1);
        let executor = factory.executor_for(&rule).unwrap();
        assert!(executor.execute_rule(&rule, &ctx).await.unwrap().passed);
    }
}
