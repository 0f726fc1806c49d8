use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::{Rule, RuleExecutionContext, RuleKind, RuleOutcome};
use crate::error::{SupervisorError, SupervisorResult};

use super::{kind_mismatch, RuleExecutor};

/// Metadata key holding the project's relative file listing.
pub const FILE_TREE_KEY: &str = "fileTree";

/// Checks required files and directories against `metadata.fileTree`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructureExecutor;

fn requirements_of(rule: &Rule) -> SupervisorResult<(&[String], &[String])> {
    match &rule.kind {
        RuleKind::Structure {
            required_files,
            required_directories,
        } => Ok((required_files, required_directories)),
        _ => Err(kind_mismatch(rule, "structure")),
    }
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches("./").trim_end_matches('/')
}

struct FileTree<'a> {
    entries: Vec<&'a str>,
}

impl<'a> FileTree<'a> {
    fn from_context(input: &'a RuleExecutionContext) -> Self {
        let entries = input
            .metadata_value(FILE_TREE_KEY)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        Self { entries }
    }

    fn has_file(&self, file: &str) -> bool {
        let file = normalize(file);
        self.entries.iter().any(|e| normalize(e) == file)
    }

    fn has_directory(&self, dir: &str) -> bool {
        let dir = normalize(dir);
        let prefix = format!("{dir}/");
        self.entries.iter().any(|e| {
            let e = normalize(e);
            e == dir || e.starts_with(&prefix)
        })
    }
}

#[async_trait]
impl RuleExecutor for StructureExecutor {
    fn kind(&self) -> &str {
        "structure"
    }

    fn validate_rule(&self, rule: &Rule) -> SupervisorResult<()> {
        let (files, _) = requirements_of(rule)?;
        if files.is_empty() {
            return Err(SupervisorError::invalid_rule(
                &rule.id,
                "requiredFiles must not be empty",
            ));
        }
        Ok(())
    }

    async fn execute_rule(
        &self,
        rule: &Rule,
        input: &RuleExecutionContext,
    ) -> SupervisorResult<RuleOutcome> {
        let (files, directories) = requirements_of(rule)?;
        let tree = FileTree::from_context(input);

        let missing_files: Vec<&str> = files
            .iter()
            .map(String::as_str)
            .filter(|f| !tree.has_file(f))
            .collect();
        let missing_directories: Vec<&str> = directories
            .iter()
            .map(String::as_str)
            .filter(|d| !tree.has_directory(d))
            .collect();

        let required = files.len() + directories.len();
        let missing = missing_files.len() + missing_directories.len();
        let score = if required == 0 {
            1.0
        } else {
            (required - missing) as f64 / required as f64
        };
        let passed = missing == 0;

        let message = rule.message.clone().unwrap_or_else(|| {
            if passed {
                "all required files and directories are present".to_string()
            } else {
                format!("{missing} of {required} required path(s) missing")
            }
        });

        Ok(RuleOutcome {
            passed,
            message: Some(message),
            score: Some(score),
            data: Some(json!({
                "missingFiles": missing_files,
                "missingDirectories": missing_directories,
            })),
        })
    }
}
