//! Append-only, in-memory audit trail of rule and phase executions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::obs;

/// Audit action for a single rule execution.
pub fn rule_action(rule_id: &str) -> String {
    format!("executeRule:{rule_id}")
}

/// Audit action for a phase execution.
pub fn phase_action(phase: &str) -> String {
    format!("executePhase:{phase}")
}

/// One immutable record of an execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    /// Snapshot of the execution context.
    pub context: Value,
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// SHA-256 over the other fields, set when the entry is logged.
    #[serde(default)]
    pub digest: String,
}

impl AuditLogEntry {
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        context: Value,
        result: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor: actor.into(),
            action: action.into(),
            context,
            result,
            deviation: None,
            message: None,
            digest: String::new(),
        }
    }

    pub fn with_deviation(mut self, deviation: bool) -> Self {
        self.deviation = Some(deviation);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_deviation(&self) -> bool {
        self.deviation == Some(true)
    }

    fn compute_digest(&self) -> String {
        let payload = json!({
            "id": self.id,
            "timestamp": self.timestamp.to_rfc3339(),
            "actor": self.actor,
            "action": self.action,
            "context": self.context,
            "result": self.result,
            "deviation": self.deviation,
            "message": self.message,
        });
        let bytes = serde_json::to_vec(&payload).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    fn seal(mut self) -> Self {
        self.digest = self.compute_digest();
        self
    }

    /// Whether the entry still matches the digest it was sealed with.
    pub fn verify_integrity(&self) -> bool {
        !self.digest.is_empty() && self.digest == self.compute_digest()
    }
}

/// Exact-match filter over entries; `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub deviation: Option<bool>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn deviation(mut self, deviation: bool) -> Self {
        self.deviation = Some(deviation);
        self
    }

    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.actor.as_ref().map_or(true, |a| *a == entry.actor)
            && self.action.as_ref().map_or(true, |a| *a == entry.action)
            && self.deviation.map_or(true, |d| entry.deviation == Some(d))
    }
}

/// Unbounded append-only log. Shared by concurrent executions.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seal and append `entry`, returning the stored copy.
    pub async fn log(&self, entry: AuditLogEntry) -> AuditLogEntry {
        let entry = entry.seal();
        obs::emit_audit_recorded(&entry.action, &entry.actor, entry.is_deviation());
        self.entries.write().await.push(entry.clone());
        entry
    }

    pub async fn get_history(&self, filter: &AuditFilter) -> Vec<AuditLogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// Every entry, in insertion order.
    pub async fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.clone()
    }

    pub async fn find_deviations(&self) -> Vec<AuditLogEntry> {
        self.get_history(&AuditFilter::new().deviation(true)).await
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
