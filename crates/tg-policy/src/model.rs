// model.rs — Typed, validated policy document.
//
// Produced only by the validator. Verbs, labels, hints, matchers and rule
// actions are closed types here, so the merger and every downstream
// consumer can match on them exhaustively.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::profile::ProfileId;
use crate::vocabulary::{Hint, Label, Verb};

/// A policy document that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument {
    pub version: String,
    pub tenant_vars: BTreeMap<String, String>,
    pub profiles: Vec<ProfileId>,
    pub tool_overrides: BTreeMap<String, BTreeMap<String, ToolOverride>>,
    pub classifier_overrides: BTreeMap<String, BTreeMap<String, Vec<ClassifierRule>>>,
    pub policy_rules: Vec<PolicyRule>,
}

/// Field-level override of a tool's annotations.
///
/// Only hints present in `hints` are applied; `verb` and `labels` replace
/// the profile value wholesale when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOverride {
    pub hints: BTreeMap<Hint, bool>,
    pub verb: Option<Verb>,
    pub labels: Option<Vec<Label>>,
}

/// Assigns labels to a call when its argument `field` matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierRule {
    pub field: String,
    #[serde(flatten)]
    pub matcher: Matcher,
    pub set_labels: Vec<Label>,
}

/// Exactly one way of matching a call argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Matcher {
    Contains(String),
    NotContains(String),
    Present(bool),
}

/// How the clauses of a rule's `when` predicate combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

impl MatchMode {
    pub fn is_all(&self) -> bool {
        matches!(self, MatchMode::All)
    }
}

/// Predicate over a tool's hints, verb and labels. Empty matches every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    #[serde(flatten)]
    pub hints: BTreeMap<Hint, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<Verb>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    #[serde(default, rename = "match", skip_serializing_if = "MatchMode::is_all")]
    pub match_mode: MatchMode,
}

impl RuleCondition {
    pub fn is_empty(&self) -> bool {
        self.hints.is_empty() && self.verb.is_none() && self.labels.is_empty()
    }
}

/// What the enforcement layer does when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleAction {
    Allow,
    Deny,
    /// Route the call to external protocol instances with human sign-off.
    EvaluateExternally,
}

impl RuleAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "allow" => Some(RuleAction::Allow),
            "deny" => Some(RuleAction::Deny),
            "evaluateExternally" => Some(RuleAction::EvaluateExternally),
            _ => None,
        }
    }

    /// Whether a rule with this action must name at least one approver.
    pub fn requires_approvers(self) -> bool {
        matches!(self, RuleAction::EvaluateExternally)
    }
}

pub const MAX_PRIORITY: u16 = 999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub when: RuleCondition,
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approvers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// 0..=999.
    pub priority: u16,
}
