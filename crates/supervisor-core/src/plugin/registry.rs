//! In-memory catalog of loaded plugins.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{SupervisorError, SupervisorResult};

use super::contract::RulePlugin;

/// Flat mapping of plugin name to instance.
///
/// Registration never overwrites: a second plugin with the same name is
/// rejected until the first is unregistered.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<BTreeMap<String, Arc<dyn RulePlugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, plugin: Arc<dyn RulePlugin>) -> SupervisorResult<()> {
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        let name = plugin.name().to_string();
        if plugins.contains_key(&name) {
            return Err(SupervisorError::plugin(name, "plugin is already registered"));
        }
        plugins.insert(name, plugin);
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn RulePlugin>> {
        self.plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RulePlugin>> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// All plugins, ordered by name.
    pub fn list(&self) -> Vec<Arc<dyn RulePlugin>> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RuleExecutionContext, RuleOutcome};
    use async_trait::async_trait;
    use serde_json::Value;

    struct Named(&'static str);

    #[async_trait]
    impl RulePlugin for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        async fn execute(
            &self,
            _input: &RuleExecutionContext,
            _config: &Value,
        ) -> SupervisorResult<RuleOutcome> {
            Ok(RuleOutcome::pass())
        }
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(Named("lint"))).unwrap();
        let err = registry.register(Arc::new(Named("lint"))).unwrap_err();
        assert!(matches!(err, SupervisorError::Plugin { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_get_has_clear() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(Named("b"))).unwrap();
        registry.register(Arc::new(Named("a"))).unwrap();

        assert!(registry.has("a"));
        assert_eq!(registry.get("b").unwrap().name(), "b");
        let names: Vec<String> = registry.list().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);

        assert!(registry.unregister("a").is_some());
        assert!(registry.unregister("a").is_none());
        assert!(!registry.has("a"));

        registry.clear();
        assert!(registry.is_empty());
    }
}
