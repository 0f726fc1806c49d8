//! Supervisor configuration: phases, rules, rule groups, and plugin paths.
//!
//! The configuration is produced and validated by an external collaborator;
//! the engine only reads it. Maps are `BTreeMap`s so iteration order is
//! deterministic.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SupervisorError, SupervisorResult};

use super::rule::{Enforcement, Rule};

/// Sections a plan document must contain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequirements {
    #[serde(default)]
    pub required_sections: Vec<String>,
}

/// A named workflow stage. The name is the key in [`SupervisorConfig::phases`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    /// Ordered `rule:<id>` / `group:<name>` references.
    #[serde(default)]
    pub enforce: Vec<String>,
    #[serde(default)]
    pub require_plan: bool,
    #[serde(default)]
    pub require_human_approval: bool,
}

impl Phase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enforce_rule(mut self, rule_id: &str) -> Self {
        self.enforce.push(format!("rule:{rule_id}"));
        self
    }

    pub fn enforce_group(mut self, group: &str) -> Self {
        self.enforce.push(format!("group:{group}"));
        self
    }

    pub fn with_plan(mut self) -> Self {
        self.require_plan = true;
        self
    }

    pub fn with_human_approval(mut self) -> Self {
        self.require_human_approval = true;
        self
    }
}

/// A parsed `enforce` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseRef {
    Rule(String),
    Group(String),
}

impl FromStr for PhaseRef {
    type Err = SupervisorError;

    fn from_str(s: &str) -> SupervisorResult<Self> {
        if let Some(id) = s.strip_prefix("rule:") {
            Ok(PhaseRef::Rule(id.to_string()))
        } else if let Some(name) = s.strip_prefix("group:") {
            Ok(PhaseRef::Group(name.to_string()))
        } else {
            Err(SupervisorError::Configuration(format!(
                "invalid enforce reference '{s}': expected 'rule:<id>' or 'group:<name>'"
            )))
        }
    }
}

/// A named, reusable bundle of rule ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleGroup {
    pub rules: Vec<String>,
}

impl RuleGroup {
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rules: rules.into_iter().map(Into::into).collect(),
        }
    }

    /// Rule ids in declaration order with duplicates removed.
    pub fn rule_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.rules
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// The aggregate configuration root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorConfig {
    #[serde(default)]
    pub plan: PlanRequirements,
    #[serde(default)]
    pub phases: BTreeMap<String, Phase>,
    #[serde(default)]
    pub rules: BTreeMap<String, Rule>,
    #[serde(default, alias = "groups")]
    pub rule_groups: BTreeMap<String, RuleGroup>,
    /// Plugin manifest paths loaded alongside the configuration.
    #[serde(default)]
    pub plugins: Vec<PathBuf>,
    #[serde(default)]
    pub default_enforcement: Enforcement,
}

impl SupervisorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule keyed by its id.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.insert(rule.id.clone(), rule);
        self
    }

    pub fn with_phase(mut self, name: impl Into<String>, phase: Phase) -> Self {
        self.phases.insert(name.into(), phase);
        self
    }

    pub fn with_group(mut self, name: impl Into<String>, group: RuleGroup) -> Self {
        self.rule_groups.insert(name.into(), group);
        self
    }

    pub fn with_required_plan_sections<I, S>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plan.required_sections = sections.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default_enforcement(mut self, enforcement: Enforcement) -> Self {
        self.default_enforcement = enforcement;
        self
    }

    /// Fill rule ids omitted in a configuration file from their map keys.
    pub fn normalized(mut self) -> Self {
        for (key, rule) in self.rules.iter_mut() {
            if rule.id.is_empty() {
                rule.id = key.clone();
            }
        }
        self
    }

    /// Resolve the rules a phase enforces, in declaration order.
    ///
    /// `rule:<id>` entries naming an unknown rule are skipped, as are unknown
    /// ids inside a group. Only an undeclared phase or group is an error.
    pub fn phase_rules(&self, phase: &str) -> SupervisorResult<Vec<&Rule>> {
        let declared = self
            .phases
            .get(phase)
            .ok_or_else(|| SupervisorError::PhaseNotFound(phase.to_string()))?;

        let mut rules = Vec::new();
        for entry in &declared.enforce {
            match entry.parse::<PhaseRef>()? {
                PhaseRef::Rule(id) => {
                    if let Some(rule) = self.rules.get(&id) {
                        rules.push(rule);
                    } else {
                        tracing::debug!(phase = %phase, rule_id = %id, "skipping unknown rule reference");
                    }
                }
                PhaseRef::Group(name) => rules.extend(self.group_rules(&name)?),
            }
        }
        Ok(rules)
    }

    /// Resolve the rules of a named group, skipping unknown ids.
    pub fn group_rules(&self, group: &str) -> SupervisorResult<Vec<&Rule>> {
        let declared = self
            .rule_groups
            .get(group)
            .ok_or_else(|| SupervisorError::RuleGroupNotFound(group.to_string()))?;

        Ok(declared
            .rule_ids()
            .into_iter()
            .filter_map(|id| self.rules.get(id))
            .collect())
    }
}
