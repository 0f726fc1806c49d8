//! Structured lifecycle events for rule, phase, plugin, and audit activity.
//!
//! Events are emitted at `info!` (rule executions at `debug!`) with a stable
//! `event` field so log pipelines can select them.

use tracing::{debug, info};

/// Span covering one phase execution.
///
/// Attach with `Instrument::instrument` rather than entering it, so the
/// instrumented future stays `Send`:
///
/// ```ignore
/// run_phase(..).instrument(phase_span("coded")).await
/// // every event inside carries phase = "coded"
/// ```
pub fn phase_span(phase: &str) -> tracing::Span {
    tracing::info_span!("supervisor.phase", phase = %phase)
}

/// Span covering one CLI command.
pub fn command_span(command: &str) -> tracing::Span {
    tracing::info_span!("supervisor.command", command = %command)
}

pub fn emit_rule_executed(rule_id: &str, rule_type: &str, passed: bool, duration_ms: u64) {
    debug!(
        event = "rule.executed",
        rule_id = %rule_id,
        rule_type = %rule_type,
        passed = passed,
        duration_ms = duration_ms,
    );
}

/// Emit event: phase finished with its failure counts.
pub fn emit_phase_executed(
    phase: &str,
    success: bool,
    rules: usize,
    hard_failures: usize,
    soft_failures: usize,
    duration_ms: u64,
) {
    info!(
        event = "phase.executed",
        phase = %phase,
        success = success,
        rules = rules,
        hard_failures = hard_failures,
        soft_failures = soft_failures,
        duration_ms = duration_ms,
    );
}

pub fn emit_plugin_loaded(name: &str, version: &str) {
    info!(event = "plugin.loaded", plugin = %name, version = %version);
}

/// Mirror of an audit append.
pub fn emit_audit_recorded(action: &str, actor: &str, deviation: bool) {
    debug!(event = "audit.recorded", action = %action, actor = %actor, deviation = deviation);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_create() {
        let _span = phase_span("coded").entered();
        emit_phase_executed("coded", true, 0, 0, 0, 1);
        let _command = command_span("validate").entered();
    }
}
