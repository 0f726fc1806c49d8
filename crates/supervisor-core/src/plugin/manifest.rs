//! Manifest-described plugins executed as isolated child processes.
//!
//! A manifest is a `.json` or `.toml` document. The plugin table is taken
//! from a `default` table, a `plugin` table, or the document root, in that
//! order, and must provide:
//!
//! ```toml
//! name = "license-check"
//! version = "1.2.0"
//! execute = ["./license-check", "--json"]   # or a single program string
//! validate = "./license-check-validate"     # optional
//! init = ["./license-check", "--warm"]      # optional
//! cleanup = ["./license-check", "--purge"]  # optional
//! timeoutMs = 10000                          # optional, default 30000
//! ```
//!
//! Every hook is a separate process. The host writes one JSON request to
//! stdin (`{"op": "execute", "input": <context>, "config": <rule config>}`)
//! and reads one JSON document from stdout: a [`RuleOutcome`] for `execute`,
//! `{"valid": bool}` or a bare bool for `validate`. Output of `init` and
//! `cleanup` is ignored. A non-zero exit status fails the hook.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::domain::{RuleExecutionContext, RuleOutcome};
use crate::error::{SupervisorError, SupervisorResult};

use super::contract::{PluginLoader, RulePlugin};

/// File extensions the manifest loader accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["json", "toml"];

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const OPTIONAL_HOOKS: [&str; 3] = ["validate", "init", "cleanup"];

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CommandSpec {
    Program(String),
    Argv(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    name: String,
    version: String,
    execute: CommandSpec,
    #[serde(default)]
    validate: Option<CommandSpec>,
    #[serde(default)]
    init: Option<CommandSpec>,
    #[serde(default)]
    cleanup: Option<CommandSpec>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

/// A program plus arguments run for one plugin hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl PluginCommand {
    /// Relative programs with a directory component resolve against
    /// `base_dir`; bare program names are looked up on `PATH`.
    fn from_spec(spec: CommandSpec, base_dir: &Path) -> Option<Self> {
        let (program, args) = match spec {
            CommandSpec::Program(program) => (program, Vec::new()),
            CommandSpec::Argv(mut argv) => {
                if argv.is_empty() {
                    return None;
                }
                let program = argv.remove(0);
                (program, argv)
            }
        };
        if program.trim().is_empty() {
            return None;
        }

        let path = PathBuf::from(program);
        let program = if path.is_relative() && path.components().count() > 1 {
            base_dir.join(path)
        } else {
            path
        };
        Some(Self { program, args })
    }
}

fn is_command(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_string),
        _ => false,
    }
}

/// Pick the plugin table: `default`, then `plugin`, then the root itself.
fn extract_export(doc: &Value) -> Option<&Map<String, Value>> {
    let root = doc.as_object()?;
    ["default", "plugin"]
        .iter()
        .find_map(|key| root.get(*key).and_then(Value::as_object))
        .or(Some(root))
}

/// Check the plugin table implements the required shape.
fn check_shape(export: &Map<String, Value>) -> Result<(), String> {
    for key in ["name", "version"] {
        match export.get(key) {
            None => return Err(format!("missing required property '{key}'")),
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(_) => return Err(format!("property '{key}' must be a non-empty string")),
        }
    }

    match export.get("execute") {
        None => return Err("missing required property 'execute'".to_string()),
        Some(v) if !is_command(v) => {
            return Err("property 'execute' must be a command".to_string());
        }
        Some(_) => {}
    }

    for hook in OPTIONAL_HOOKS {
        if let Some(v) = export.get(hook) {
            if !is_command(v) {
                return Err(format!(
                    "property '{hook}' must be a command (string or non-empty array of strings)"
                ));
            }
        }
    }
    Ok(())
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

async fn read_manifest(path: &Path) -> SupervisorResult<Value> {
    let text = tokio::fs::read_to_string(path).await?;
    match extension(path).as_deref() {
        Some("json") => Ok(serde_json::from_str(&text)?),
        Some("toml") => {
            let table: toml::Table = text.parse().map_err(|e| {
                SupervisorError::plugin(
                    path.display().to_string(),
                    format!("invalid TOML manifest: {e}"),
                )
            })?;
            Ok(serde_json::to_value(table)?)
        }
        _ => Err(SupervisorError::plugin(
            path.display().to_string(),
            "unsupported plugin file extension",
        )),
    }
}

/// Loads [`ProcessPlugin`]s from `.json` / `.toml` manifests.
#[derive(Debug, Clone)]
pub struct ManifestPluginLoader {
    default_timeout: Duration,
}

impl Default for ManifestPluginLoader {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl ManifestPluginLoader {
    /// Timeout applied to hooks of manifests that set no `timeoutMs`.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Parse and validate a manifest without registering anything.
    pub async fn read(&self, path: &Path) -> SupervisorResult<ProcessPlugin> {
        let label = path.display().to_string();
        let doc = read_manifest(path).await?;
        let export = extract_export(&doc).ok_or_else(|| {
            SupervisorError::plugin(&label, "manifest must be a table of plugin properties")
        })?;
        check_shape(export).map_err(|reason| SupervisorError::plugin(&label, reason))?;

        let raw: RawManifest = serde_json::from_value(Value::Object(export.clone()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        let command = |spec: CommandSpec, hook: &str| {
            PluginCommand::from_spec(spec, &base_dir).ok_or_else(|| {
                SupervisorError::plugin(&label, format!("property '{hook}' must be a command"))
            })
        };

        Ok(ProcessPlugin {
            execute: command(raw.execute, "execute")?,
            validate: raw.validate.map(|s| command(s, "validate")).transpose()?,
            init: raw.init.map(|s| command(s, "init")).transpose()?,
            cleanup: raw.cleanup.map(|s| command(s, "cleanup")).transpose()?,
            timeout: raw
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(self.default_timeout),
            name: raw.name,
            version: raw.version,
            working_dir: base_dir,
        })
    }
}

#[async_trait]
impl PluginLoader for ManifestPluginLoader {
    fn supports(&self, path: &Path) -> bool {
        extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
    }

    async fn load(&self, path: &Path) -> SupervisorResult<Arc<dyn RulePlugin>> {
        Ok(Arc::new(self.read(path).await?))
    }
}

/// A plugin whose hooks run as child processes in the manifest's directory.
#[derive(Debug, Clone)]
pub struct ProcessPlugin {
    name: String,
    version: String,
    execute: PluginCommand,
    validate: Option<PluginCommand>,
    init: Option<PluginCommand>,
    cleanup: Option<PluginCommand>,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ProcessPlugin {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn invoke(&self, hook: &str, command: &PluginCommand, request: Value) -> SupervisorResult<Value> {
        let payload = serde_json::to_vec(&request)?;

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SupervisorError::plugin(
                    &self.name,
                    format!(
                        "failed to spawn {hook} command '{}': {e}",
                        command.program.display()
                    ),
                )
            })?;

        let stdin = child.stdin.take();
        let write = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&payload).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };

        let (written, output) = tokio::time::timeout(self.timeout, async {
            tokio::join!(write, child.wait_with_output())
        })
        .await
        .map_err(|_| {
            SupervisorError::plugin(
                &self.name,
                format!("{hook} timed out after {}ms", self.timeout.as_millis()),
            )
        })?;

        if let Err(e) = written {
            debug!(plugin = %self.name, hook, error = %e, "plugin closed stdin before reading the request");
        }
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SupervisorError::plugin(
                &self.name,
                format!("{hook} exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(stdout).map_err(|e| {
            SupervisorError::plugin(&self.name, format!("{hook} produced invalid JSON: {e}"))
        })
    }
}

#[async_trait]
impl RulePlugin for ProcessPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn execute(
        &self,
        input: &RuleExecutionContext,
        config: &Value,
    ) -> SupervisorResult<RuleOutcome> {
        let request = json!({ "op": "execute", "input": input, "config": config });
        let response = self.invoke("execute", &self.execute, request).await?;
        serde_json::from_value(response).map_err(|e| {
            SupervisorError::plugin(&self.name, format!("execute returned an invalid outcome: {e}"))
        })
    }

    async fn validate(&self, config: &Value) -> SupervisorResult<bool> {
        let Some(command) = &self.validate else {
            return Ok(true);
        };
        let request = json!({ "op": "validate", "config": config });
        match self.invoke("validate", command, request).await? {
            Value::Bool(valid) => Ok(valid),
            Value::Object(map) => map.get("valid").and_then(Value::as_bool).ok_or_else(|| {
                SupervisorError::plugin(&self.name, "validate response is missing 'valid'")
            }),
            other => Err(SupervisorError::plugin(
                &self.name,
                format!("validate returned unexpected output: {other}"),
            )),
        }
    }

    async fn init(&self) -> SupervisorResult<()> {
        if let Some(command) = &self.init {
            self.invoke("init", command, json!({ "op": "init" })).await?;
        }
        Ok(())
    }

    async fn cleanup(&self) -> SupervisorResult<()> {
        if let Some(command) = &self.cleanup {
            self.invoke("cleanup", command, json!({ "op": "cleanup" })).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export_of(doc: &Value) -> &Map<String, Value> {
        extract_export(doc).expect("object manifest")
    }

    #[test]
    fn test_extract_tolerates_three_shapes() {
        let default = json!({ "default": { "name": "a", "version": "1", "execute": "run" } });
        let named = json!({ "plugin": { "name": "b", "version": "1", "execute": "run" } });
        let bare = json!({ "name": "c", "version": "1", "execute": "run" });

        assert_eq!(export_of(&default)["name"], "a");
        assert_eq!(export_of(&named)["name"], "b");
        assert_eq!(export_of(&bare)["name"], "c");
        assert!(extract_export(&json!(["not", "a", "table"])).is_none());
    }

    #[test]
    fn test_shape_reports_missing_execute() {
        let doc = json!({ "name": "lint", "version": "1.0.0" });
        let err = check_shape(export_of(&doc)).unwrap_err();
        assert!(err.contains("'execute'"), "got: {err}");
    }

    #[test]
    fn test_shape_rejects_non_string_version() {
        let doc = json!({ "name": "lint", "version": 2, "execute": "run" });
        let err = check_shape(export_of(&doc)).unwrap_err();
        assert!(err.contains("'version'"));
    }

    #[test]
    fn test_shape_rejects_malformed_hook() {
        let doc = json!({ "name": "lint", "version": "1", "execute": "run", "cleanup": 42 });
        let err = check_shape(export_of(&doc)).unwrap_err();
        assert!(err.contains("'cleanup'"));
    }

    #[test]
    fn test_command_resolution() {
        let base = Path::new("/opt/plugins");
        let cmd = PluginCommand::from_spec(CommandSpec::Program("./check.sh".into()), base).unwrap();
        assert_eq!(cmd.program, PathBuf::from("/opt/plugins/./check.sh"));

        let cmd = PluginCommand::from_spec(
            CommandSpec::Argv(vec!["sh".into(), "-c".into(), "true".into()]),
            base,
        )
        .unwrap();
        assert_eq!(cmd.program, PathBuf::from("sh"));
        assert_eq!(cmd.args, vec!["-c", "true"]);

        assert!(PluginCommand::from_spec(CommandSpec::Argv(vec![]), base).is_none());
    }

    #[test]
    fn test_supported_extensions() {
        let loader = ManifestPluginLoader::default();
        assert!(loader.supports(Path::new("/p/lint.json")));
        assert!(loader.supports(Path::new("/p/lint.TOML")));
        assert!(!loader.supports(Path::new("/p/lint.so")));
        assert!(!loader.supports(Path::new("/p/lint")));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        fn write_manifest(dir: &Path, file: &str, manifest: Value) -> PathBuf {
            let path = dir.join(file);
            std::fs::write(&path, serde_json::to_string_pretty(&manifest).unwrap()).unwrap();
            path
        }

        fn sh(script: &str) -> Value {
            json!(["sh", "-c", script])
        }

        #[tokio::test]
        async fn test_execute_reads_outcome_from_stdout() {
            let dir = tempfile::tempdir().unwrap();
            let path = write_manifest(
                dir.path(),
                "echo.json",
                json!({
                    "name": "echo",
                    "version": "0.1.0",
                    "execute": sh(r#"cat > /dev/null; echo '{"passed": true, "score": 0.75, "message": "ok"}'"#)
                }),
            );

            let plugin = ManifestPluginLoader::default().read(&path).await.unwrap();
            let ctx = RuleExecutionContext::new("coded", "src");
            let outcome = plugin.execute(&ctx, &json!({})).await.unwrap();

            assert!(outcome.passed);
            assert_eq!(outcome.score, Some(0.75));
            assert_eq!(outcome.message.as_deref(), Some("ok"));
        }

        #[tokio::test]
        async fn test_execute_receives_request_on_stdin() {
            let dir = tempfile::tempdir().unwrap();
            // Pass iff the request carries the expected phase.
            let path = write_manifest(
                dir.path(),
                "phase.json",
                json!({
                    "plugin": {
                        "name": "phase-check",
                        "version": "0.1.0",
                        "execute": sh(r#"if grep -q '"phase":"coded"'; then echo '{"passed": true}'; else echo '{"passed": false}'; fi"#)
                    }
                }),
            );

            let plugin = ManifestPluginLoader::default().read(&path).await.unwrap();
            let coded = RuleExecutionContext::new("coded", "");
            let draft = RuleExecutionContext::new("draft", "");
            assert!(plugin.execute(&coded, &json!({})).await.unwrap().passed);
            assert!(!plugin.execute(&draft, &json!({})).await.unwrap().passed);
        }

        #[tokio::test]
        async fn test_validate_hook() {
            let dir = tempfile::tempdir().unwrap();
            let path = write_manifest(
                dir.path(),
                "strict.json",
                json!({
                    "name": "strict",
                    "version": "0.1.0",
                    "execute": sh("echo '{\"passed\": true}'"),
                    "validate": sh("cat > /dev/null; echo '{\"valid\": false}'")
                }),
            );

            let plugin = ManifestPluginLoader::default().read(&path).await.unwrap();
            assert!(!plugin.validate(&json!({"level": 3})).await.unwrap());
        }

        #[tokio::test]
        async fn test_non_zero_exit_is_plugin_error() {
            let dir = tempfile::tempdir().unwrap();
            let path = write_manifest(
                dir.path(),
                "broken.json",
                json!({
                    "name": "broken",
                    "version": "0.1.0",
                    "execute": sh("echo 'boom' >&2; exit 3")
                }),
            );

            let plugin = ManifestPluginLoader::default().read(&path).await.unwrap();
            let err = plugin
                .execute(&RuleExecutionContext::default(), &json!({}))
                .await
                .unwrap_err();
            match err {
                SupervisorError::Plugin { plugin, reason } => {
                    assert_eq!(plugin, "broken");
                    assert!(reason.contains("boom"), "reason: {reason}");
                }
                other => panic!("expected Plugin, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_hook_timeout() {
            let dir = tempfile::tempdir().unwrap();
            let path = write_manifest(
                dir.path(),
                "slow.json",
                json!({
                    "name": "slow",
                    "version": "0.1.0",
                    "execute": sh("sleep 5"),
                    "timeoutMs": 100
                }),
            );

            let plugin = ManifestPluginLoader::default().read(&path).await.unwrap();
            assert_eq!(plugin.timeout(), Duration::from_millis(100));
            let err = plugin
                .execute(&RuleExecutionContext::default(), &json!({}))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("timed out"));
        }

        #[tokio::test]
        async fn test_toml_manifest() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("toml-plugin.toml");
            std::fs::write(
                &path,
                r#"
[default]
name = "toml-plugin"
version = "2.0.0"
execute = ["sh", "-c", "cat > /dev/null; echo '{\"passed\": true}'"]
"#,
            )
            .unwrap();

            let plugin = ManifestPluginLoader::default().read(&path).await.unwrap();
            assert_eq!(plugin.name(), "toml-plugin");
            assert_eq!(plugin.version(), "2.0.0");
            assert!(plugin
                .execute(&RuleExecutionContext::default(), &json!({}))
                .await
                .unwrap()
                .passed);
        }
    }
}
