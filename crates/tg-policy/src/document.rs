// document.rs — Raw policy document as authored by operators.
//
// Every field an operator can get wrong is kept as a plain string or an
// optional here, so a malformed document still deserializes and the
// validator can report every defect in one pass. The typed form lives in
// `model.rs` and is only produced by `validator::check`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::model::MatchMode;

/// The only document version this compiler accepts.
pub const SUPPORTED_VERSION: &str = "1.0";

/// A policy document before validation.
///
/// ```yaml
/// version: "1.0"
/// tenantVars:
///   company_domain: acme.com
/// profiles:
///   - acme/security-gmail
/// toolOverrides:
///   gmail:
///     send_email:
///       destructive: true
/// classifierOverrides:
///   gmail:
///     send_email:
///       - field: to
///         contains: "{company_domain}"
///         setLabels: ["scope:internal"]
/// policyRules:
///   - name: default-allow
///     when: {}
///     action: allow
///     priority: 999
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPolicyDocument {
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub tenant_vars: BTreeMap<String, String>,

    #[serde(default)]
    pub profiles: Vec<String>,

    /// service → tool → override
    #[serde(default)]
    pub tool_overrides: BTreeMap<String, BTreeMap<String, RawToolOverride>>,

    /// service → tool → full replacement rule list
    #[serde(default)]
    pub classifier_overrides: BTreeMap<String, BTreeMap<String, Vec<RawClassifierRule>>>,

    #[serde(default)]
    pub policy_rules: Vec<RawPolicyRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawToolOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destructive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_world: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawClassifierRule {
    #[serde(default)]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub present: Option<bool>,
    #[serde(default)]
    pub set_labels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPolicyRule {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub when: RawCondition,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub approvers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default)]
    pub priority: i64,
}

/// The `when` predicate of a rule: hints, verb and labels combined by `match`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destructive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_world: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, rename = "match")]
    pub match_mode: MatchMode,
}

impl RawPolicyDocument {
    /// Parse a document from YAML (JSON is accepted as a YAML subset).
    pub fn from_yaml(source: &str) -> Result<Self, PolicyError> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Read and parse a document from local storage.
    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let data = fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&data)
    }
}
