// merger.rs — Combine community profiles and operator overrides.
//
// The step order below is the precedence contract:
//
// 1. Seed annotations and classifiers from each referenced profile, in the
//    order the document lists them (later profiles win on collisions).
// 2. Apply tool overrides field by field: only hints the override names are
//    touched (`true` sets, `false` clears), `verb` replaces, `labels`
//    replaces the whole list.
// 3. Apply classifier overrides by replacing the full rule list for that
//    exact (service, tool). Rules are never merged piecemeal.
// 4. Interpolate tenant variables over the finished classifier structure.
// 5. Copy policy rules in document order. No sorting by priority here.
//
// The merger trusts its input: validation has already happened.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::interpolate::{Interpolate, TenantVars};
use crate::model::{ClassifierRule, PolicyDocument, PolicyRule};
use crate::profile::CommunityProfile;
use crate::vocabulary::{Hint, Label, Verb};

/// Merged annotations for one tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolAnnotation {
    /// Hints that hold for the tool. Serialized as `{hint: true}`; a hint
    /// that does not hold is absent, never `false`.
    #[serde(with = "true_hints")]
    pub annotations: BTreeSet<Hint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<Verb>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl ToolAnnotation {
    pub fn is_set(&self, hint: Hint) -> bool {
        self.annotations.contains(&hint)
    }
}

mod true_hints {
    use std::collections::{BTreeMap, BTreeSet};

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::vocabulary::Hint;

    pub fn serialize<S: Serializer>(
        hints: &BTreeSet<Hint>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let map: BTreeMap<Hint, bool> = hints.iter().map(|h| (*h, true)).collect();
        map.serialize(serializer)
    }

    /// `false` entries are dropped.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeSet<Hint>, D::Error> {
        let map = BTreeMap::<Hint, bool>::deserialize(deserializer)?;
        Ok(map.into_iter().filter(|(_, on)| *on).map(|(h, _)| h).collect())
    }
}

/// The canonical compiled policy, replaced wholesale on every publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedSecurityPolicy {
    pub version: String,
    /// service → tool → annotation
    pub tool_annotations: BTreeMap<String, BTreeMap<String, ToolAnnotation>>,
    /// service → tool → classifier rules, tenant variables substituted
    pub classifiers: BTreeMap<String, BTreeMap<String, Vec<ClassifierRule>>>,
    /// Document order, unsorted.
    pub policy_rules: Vec<PolicyRule>,
}

impl MergedSecurityPolicy {
    pub fn annotation(&self, service: &str, tool: &str) -> Option<&ToolAnnotation> {
        self.tool_annotations.get(service)?.get(tool)
    }

    pub fn classifiers_for(&self, service: &str, tool: &str) -> Option<&[ClassifierRule]> {
        self.classifiers
            .get(service)?
            .get(tool)
            .map(Vec::as_slice)
    }

    /// Number of (service, tool) annotation entries.
    pub fn tool_annotation_count(&self) -> usize {
        self.tool_annotations.values().map(BTreeMap::len).sum()
    }

    /// Number of (service, tool) keys carrying classifier rules.
    pub fn classifier_tool_count(&self) -> usize {
        self.classifiers.values().map(BTreeMap::len).sum()
    }
}

/// Merge a validated document with its resolved profiles.
///
/// Deterministic: the same inputs always yield an equal policy.
pub fn merge(
    document: &PolicyDocument,
    profiles: &[CommunityProfile],
    tenant_vars: &TenantVars,
) -> MergedSecurityPolicy {
    let mut tool_annotations: BTreeMap<String, BTreeMap<String, ToolAnnotation>> = BTreeMap::new();
    let mut classifiers: BTreeMap<String, BTreeMap<String, Vec<ClassifierRule>>> = BTreeMap::new();

    // Step 1: profile seeds.
    for profile in profiles {
        let service_annotations = tool_annotations.entry(profile.service.clone()).or_default();
        for (tool, defaults) in &profile.tools {
            service_annotations.insert(
                tool.clone(),
                ToolAnnotation {
                    annotations: defaults.true_hints().collect(),
                    verb: defaults.verb,
                    labels: defaults.labels.clone(),
                },
            );
            if let Some(rules) = &defaults.classify {
                classifiers
                    .entry(profile.service.clone())
                    .or_default()
                    .insert(tool.clone(), rules.clone());
            }
        }
        tracing::debug!(service = %profile.service, tools = profile.tools.len(), "seeded from profile");
    }

    // Step 2: field-level tool overrides.
    for (service, tools) in &document.tool_overrides {
        for (tool, ov) in tools {
            let entry = tool_annotations
                .entry(service.clone())
                .or_default()
                .entry(tool.clone())
                .or_default();
            for (hint, value) in &ov.hints {
                if *value {
                    entry.annotations.insert(*hint);
                } else {
                    entry.annotations.remove(hint);
                }
            }
            if let Some(verb) = ov.verb {
                entry.verb = Some(verb);
            }
            if let Some(labels) = &ov.labels {
                entry.labels = labels.clone();
            }
        }
    }

    // Step 3: whole-list classifier replacement.
    for (service, tools) in &document.classifier_overrides {
        for (tool, rules) in tools {
            classifiers
                .entry(service.clone())
                .or_default()
                .insert(tool.clone(), rules.clone());
        }
    }

    // Step 4: tenant interpolation, classifiers only.
    let classifiers = classifiers.interpolate(tenant_vars);

    // Step 5: verbatim rules.
    MergedSecurityPolicy {
        version: document.version.clone(),
        tool_annotations,
        classifiers,
        policy_rules: document.policy_rules.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::RawPolicyDocument;
    use crate::model::Matcher;
    use crate::validator::check;

    fn doc(yaml: &str) -> PolicyDocument {
        check(&RawPolicyDocument::from_yaml(yaml).unwrap()).unwrap()
    }

    fn profile(yaml: &str) -> CommunityProfile {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn docs_profile() -> CommunityProfile {
        profile(
            r#"
service: docs
tools:
  search:
    hints: { readOnly: true, idempotent: false }
    verb: get
    labels: ["scope:internal"]
  classify_me:
    verb: update
    classify:
      - field: body
        contains: secret
        setLabels: ["data-class:secret"]
      - field: owner
        present: true
        setLabels: ["owner:set"]
"#,
        )
    }

    #[test]
    fn profile_seeds_only_true_hints() {
        let merged = merge(&doc("version: \"1.0\"\n"), &[docs_profile()], &TenantVars::new());
        let search = merged.annotation("docs", "search").unwrap();
        assert!(search.is_set(Hint::ReadOnly));
        assert!(!search.is_set(Hint::Idempotent));
        assert_eq!(search.verb, Some(Verb::Get));
        assert_eq!(search.labels[0].as_str(), "scope:internal");
        assert_eq!(merged.classifiers_for("docs", "classify_me").unwrap().len(), 2);
        assert!(merged.classifiers_for("docs", "search").is_none());
    }

    #[test]
    fn override_is_additive_per_field() {
        let document = doc(
            r#"
version: "1.0"
toolOverrides:
  docs:
    search:
      destructive: true
"#,
        );
        let merged = merge(&document, &[docs_profile()], &TenantVars::new());
        let search = merged.annotation("docs", "search").unwrap();
        assert!(search.is_set(Hint::ReadOnly));
        assert!(search.is_set(Hint::Destructive));
        assert_eq!(search.verb, Some(Verb::Get));
        assert_eq!(search.labels.len(), 1);
    }

    #[test]
    fn override_false_hint_clears_profile_true() {
        let document = doc(
            r#"
version: "1.0"
toolOverrides:
  docs:
    search:
      readOnly: false
      destructive: true
      verb: list
      labels: ["scope:external", "tier:gold"]
"#,
        );
        let merged = merge(&document, &[docs_profile()], &TenantVars::new());
        let search = merged.annotation("docs", "search").unwrap();
        assert!(!search.is_set(Hint::ReadOnly));
        assert_eq!(search.verb, Some(Verb::List));

        // Only hints that hold appear in the wire form.
        let json = serde_json::to_value(search).unwrap();
        assert_eq!(json["annotations"], serde_json::json!({"destructive": true}));
        let labels: Vec<&str> = search.labels.iter().map(Label::as_str).collect();
        assert_eq!(labels, vec!["scope:external", "tier:gold"]);
    }

    #[test]
    fn override_creates_entry_absent_from_profiles() {
        let document = doc(
            r#"
version: "1.0"
toolOverrides:
  slack:
    post_message:
      openWorld: true
"#,
        );
        let merged = merge(&document, &[], &TenantVars::new());
        let post = merged.annotation("slack", "post_message").unwrap();
        assert!(post.is_set(Hint::OpenWorld));
        assert_eq!(post.verb, None);
        assert!(post.labels.is_empty());
    }

    #[test]
    fn classifier_override_replaces_whole_list() {
        let document = doc(
            r#"
version: "1.0"
classifierOverrides:
  docs:
    classify_me:
      - field: title
        notContains: draft
        setLabels: ["stage:final"]
"#,
        );
        let merged = merge(&document, &[docs_profile()], &TenantVars::new());
        let rules = merged.classifiers_for("docs", "classify_me").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].field, "title");
        assert_eq!(rules[0].matcher, Matcher::NotContains("draft".to_string()));
    }

    #[test]
    fn interpolation_applies_to_profile_and_override_classifiers() {
        let gmail = profile(
            r#"
service: gmail
tools:
  send_email:
    classify:
      - field: to
        notContains: "{company_domain}"
        setLabels: ["scope:external"]
"#,
        );
        let document = doc(
            r#"
version: "1.0"
tenantVars:
  company_domain: acme.com
classifierOverrides:
  docs:
    search:
      - field: query
        contains: "{unknown_var}"
        setLabels: ["search:odd"]
"#,
        );
        let merged = merge(&document, &[gmail], &document.tenant_vars);
        assert_eq!(
            merged.classifiers_for("gmail", "send_email").unwrap()[0].matcher,
            Matcher::NotContains("acme.com".to_string())
        );
        assert_eq!(
            merged.classifiers_for("docs", "search").unwrap()[0].matcher,
            Matcher::Contains("{unknown_var}".to_string())
        );
    }

    #[test]
    fn policy_rules_keep_document_order() {
        let document = doc(
            r#"
version: "1.0"
policyRules:
  - name: low
    action: allow
    priority: 999
  - name: high
    action: deny
    priority: 1
"#,
        );
        let merged = merge(&document, &[], &TenantVars::new());
        let names: Vec<&str> = merged.policy_rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["low", "high"]);
    }

    #[test]
    fn later_profile_wins_on_same_tool() {
        let a = profile("service: docs\ntools:\n  search:\n    verb: get\n");
        let b = profile("service: docs\ntools:\n  search:\n    verb: list\n");
        let merged = merge(&doc("version: \"1.0\"\n"), &[a, b], &TenantVars::new());
        assert_eq!(merged.annotation("docs", "search").unwrap().verb, Some(Verb::List));
    }

    #[test]
    fn counts() {
        let merged = merge(&doc("version: \"1.0\"\n"), &[docs_profile()], &TenantVars::new());
        assert_eq!(merged.tool_annotation_count(), 2);
        assert_eq!(merged.classifier_tool_count(), 1);
    }

    #[test]
    fn annotation_wire_form_holds_only_true_hints() {
        let parsed: ToolAnnotation = serde_json::from_value(serde_json::json!({
            "annotations": {"readOnly": false, "openWorld": true},
            "labels": []
        }))
        .unwrap();
        assert_eq!(parsed.annotations, BTreeSet::from([Hint::OpenWorld]));
    }
}
