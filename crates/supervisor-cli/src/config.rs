//! File-backed configuration and context loading for the CLI.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use supervisor_core::{ConfigSource, SupervisorConfig, SupervisorError, SupervisorResult};

/// Configuration file consulted when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "supervisor.json";

/// Reads a [`SupervisorConfig`] from a `.json` or `.toml` file.
///
/// Relative plugin paths are resolved against the configuration file's
/// directory.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    default_path: PathBuf,
}

impl FileConfigSource {
    pub fn new(default_path: impl Into<PathBuf>) -> Self {
        Self {
            default_path: default_path.into(),
        }
    }
}

impl Default for FileConfigSource {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_FILE)
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn load(&self, path: Option<&Path>) -> SupervisorResult<SupervisorConfig> {
        let path = path.unwrap_or(self.default_path.as_path());
        debug!(path = %path.display(), "reading configuration");

        let mut config: SupervisorConfig = read_document(path).await?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for plugin in config.plugins.iter_mut() {
            if plugin.is_relative() {
                *plugin = base.join(&*plugin);
            }
        }
        Ok(config)
    }
}

/// Read a JSON or TOML document, chosen by file extension.
///
/// Anything that is not `.toml` is parsed as JSON.
pub async fn read_document<T: DeserializeOwned>(path: &Path) -> SupervisorResult<T> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        SupervisorError::Configuration(format!("cannot read {}: {e}", path.display()))
    })?;

    let value: Value = if is_toml(path) {
        let table = text.parse::<toml::Table>().map_err(|e| {
            SupervisorError::Configuration(format!("invalid TOML in {}: {e}", path.display()))
        })?;
        serde_json::to_value(table)?
    } else {
        serde_json::from_str(&text).map_err(|e| {
            SupervisorError::Configuration(format!("invalid JSON in {}: {e}", path.display()))
        })?
    };

    serde_json::from_value(value).map_err(|e| {
        SupervisorError::Configuration(format!("{}: {e}", path.display()))
    })
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use supervisor_core::{Enforcement, RuleExecutionContext, RuleKind};

    const JSON_CONFIG: &str = r#"{
        "plan": { "requiredSections": ["goal", "risks"] },
        "phases": {
            "coded": { "enforce": ["rule:coverage", "group:style"], "requireHumanApproval": true }
        },
        "rules": {
            "coverage": { "type": "threshold", "target": "test.coverage", "value": 0.8 },
            "no-todo": { "type": "pattern", "pattern": "TODO", "enforcement": "soft" }
        },
        "ruleGroups": { "style": ["no-todo"] },
        "plugins": ["plugins/license.json", "/opt/plugins/abs.json"]
    }"#;

    #[tokio::test]
    async fn loads_json_config_and_resolves_plugin_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.json");
        std::fs::write(&path, JSON_CONFIG).unwrap();

        let config = FileConfigSource::default().load(Some(&path)).await.unwrap();

        assert_eq!(config.plan.required_sections, vec!["goal", "risks"]);
        assert!(config.phases["coded"].require_human_approval);
        assert!(matches!(
            config.rules["coverage"].kind,
            RuleKind::Threshold { value } if (value - 0.8).abs() < f64::EPSILON
        ));
        assert_eq!(
            config.rules["no-todo"].enforcement,
            Some(Enforcement::Soft)
        );
        assert_eq!(config.plugins[0], dir.path().join("plugins/license.json"));
        assert_eq!(config.plugins[1], PathBuf::from("/opt/plugins/abs.json"));
    }

    #[tokio::test]
    async fn loads_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.toml");
        std::fs::write(
            &path,
            r#"
[phases.draft]
enforce = ["rule:commit"]

[rules.commit]
type = "commit-message"
pattern = "^(feat|fix):"
"#,
        )
        .unwrap();

        let config = FileConfigSource::new(&path).load(None).await.unwrap();
        assert_eq!(config.phases["draft"].enforce, vec!["rule:commit"]);
        assert_eq!(config.rules["commit"].kind.name(), "commit-message");
    }

    #[tokio::test]
    async fn missing_file_is_configuration_error() {
        let err = FileConfigSource::new("/nonexistent/supervisor.json")
            .load(None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn malformed_json_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = FileConfigSource::default()
            .load(Some(&path))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[tokio::test]
    async fn reads_context_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        std::fs::write(
            &path,
            r#"{ "phase": "coded", "target": "src", "metrics": { "coverage": 0.9 },
                 "metadata": { "user": "dana" } }"#,
        )
        .unwrap();

        let ctx: RuleExecutionContext = read_document(&path).await.unwrap();
        assert_eq!(ctx.phase, "coded");
        assert_eq!(ctx.actor(), "dana");
        assert_eq!(ctx.metrics.unwrap()["coverage"], 0.9);
    }
}
