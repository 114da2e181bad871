// validator.rs — Structural and semantic validation of policy documents.
//
// One pass walks the raw document, records every defect as a Finding and,
// alongside, builds the typed `PolicyDocument`. The typed document is only
// released when the findings list is empty, so a document with any
// outstanding defect can never reach the merger.
//
// Checks:
// - `version` equals "1.0"
// - every profile id matches `<org>/security-<service>`
// - every verb is one of get/list/create/update/delete
// - every label matches `category:value`
// - every classifier rule has a field, exactly one matcher, and labels to set
// - every policy rule has a name, a known action, a priority in 0..=999,
//   and approvers when its action needs human sign-off

use std::collections::BTreeMap;

use crate::document::{
    RawClassifierRule, RawCondition, RawPolicyDocument, RawPolicyRule, RawToolOverride,
    SUPPORTED_VERSION,
};
use crate::error::{Finding, ValidationError};
use crate::model::{
    ClassifierRule, Matcher, PolicyDocument, PolicyRule, RuleAction, RuleCondition, ToolOverride,
    MAX_PRIORITY,
};
use crate::profile::ProfileId;
use crate::vocabulary::{Hint, Label, Verb};

/// Return every defect in `document`. Empty means valid.
pub fn validate(document: &RawPolicyDocument) -> Vec<Finding> {
    let mut validator = Validator::default();
    validator.document(document);
    validator.findings
}

/// Validate `document` and, if it has no defects, return its typed form.
pub fn check(document: &RawPolicyDocument) -> Result<PolicyDocument, ValidationError> {
    let mut validator = Validator::default();
    let typed = validator.document(document);
    if validator.findings.is_empty() {
        tracing::debug!("policy document passed validation");
        Ok(typed)
    } else {
        tracing::debug!(
            findings = validator.findings.len(),
            "policy document failed validation"
        );
        Err(ValidationError {
            findings: validator.findings,
        })
    }
}

#[derive(Default)]
struct Validator {
    findings: Vec<Finding>,
}

impl Validator {
    fn report(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.findings.push(Finding::new(path, message));
    }

    fn document(&mut self, doc: &RawPolicyDocument) -> PolicyDocument {
        if doc.version != SUPPORTED_VERSION {
            self.report(
                "version",
                format!(
                    "unsupported version '{}': expected '{}'",
                    doc.version, SUPPORTED_VERSION
                ),
            );
        }

        let profiles = doc
            .profiles
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| match ProfileId::parse(raw) {
                Ok(id) => Some(id),
                Err(e) => {
                    self.report(format!("profiles[{}]", i), e.to_string());
                    None
                }
            })
            .collect();

        let mut tool_overrides = BTreeMap::new();
        for (service, tools) in &doc.tool_overrides {
            let mut typed_tools = BTreeMap::new();
            for (tool, raw) in tools {
                let path = format!("toolOverrides.{}.{}", service, tool);
                typed_tools.insert(tool.clone(), self.tool_override(&path, raw));
            }
            tool_overrides.insert(service.clone(), typed_tools);
        }

        let mut classifier_overrides = BTreeMap::new();
        for (service, tools) in &doc.classifier_overrides {
            let mut typed_tools = BTreeMap::new();
            for (tool, rules) in tools {
                let typed_rules: Vec<ClassifierRule> = rules
                    .iter()
                    .enumerate()
                    .filter_map(|(i, rule)| {
                        let path = format!("classifierOverrides.{}.{}[{}]", service, tool, i);
                        self.classifier_rule(&path, rule)
                    })
                    .collect();
                typed_tools.insert(tool.clone(), typed_rules);
            }
            classifier_overrides.insert(service.clone(), typed_tools);
        }

        let policy_rules = doc
            .policy_rules
            .iter()
            .enumerate()
            .filter_map(|(i, rule)| self.policy_rule(&format!("policyRules[{}]", i), rule))
            .collect();

        PolicyDocument {
            version: doc.version.clone(),
            tenant_vars: doc.tenant_vars.clone(),
            profiles,
            tool_overrides,
            classifier_overrides,
            policy_rules,
        }
    }

    fn verb(&mut self, path: &str, raw: Option<&str>) -> Option<Verb> {
        let raw = raw?;
        match raw.parse::<Verb>() {
            Ok(verb) => Some(verb),
            Err(message) => {
                self.report(path, message);
                None
            }
        }
    }

    fn labels(&mut self, path: &str, raw: &[String]) -> Vec<Label> {
        raw.iter()
            .enumerate()
            .filter_map(|(i, label)| match Label::parse(label) {
                Ok(label) => Some(label),
                Err(message) => {
                    self.report(format!("{}[{}]", path, i), message);
                    None
                }
            })
            .collect()
    }

    fn tool_override(&mut self, path: &str, raw: &RawToolOverride) -> ToolOverride {
        let verb = self.verb(&format!("{}.verb", path), raw.verb.as_deref());
        let labels = raw
            .labels
            .as_ref()
            .map(|labels| self.labels(&format!("{}.labels", path), labels));
        ToolOverride {
            hints: hint_map([
                (Hint::ReadOnly, raw.read_only),
                (Hint::Destructive, raw.destructive),
                (Hint::Idempotent, raw.idempotent),
                (Hint::OpenWorld, raw.open_world),
            ]),
            verb,
            labels,
        }
    }

    fn classifier_rule(&mut self, path: &str, raw: &RawClassifierRule) -> Option<ClassifierRule> {
        let before = self.findings.len();

        if raw.field.trim().is_empty() {
            self.report(format!("{}.field", path), "classifier field must not be empty");
        }

        let mut matchers = Vec::new();
        if let Some(s) = &raw.contains {
            matchers.push(Matcher::Contains(s.clone()));
        }
        if let Some(s) = &raw.not_contains {
            matchers.push(Matcher::NotContains(s.clone()));
        }
        if let Some(p) = raw.present {
            matchers.push(Matcher::Present(p));
        }
        if matchers.len() != 1 {
            self.report(
                path,
                format!(
                    "expected exactly one of contains, notContains, present (found {})",
                    matchers.len()
                ),
            );
        }

        if raw.set_labels.is_empty() {
            self.report(format!("{}.setLabels", path), "setLabels must not be empty");
        }
        let set_labels = self.labels(&format!("{}.setLabels", path), &raw.set_labels);

        if self.findings.len() != before {
            return None;
        }
        Some(ClassifierRule {
            field: raw.field.clone(),
            matcher: matchers.pop()?,
            set_labels,
        })
    }

    fn condition(&mut self, path: &str, raw: &RawCondition) -> RuleCondition {
        RuleCondition {
            hints: hint_map([
                (Hint::ReadOnly, raw.read_only),
                (Hint::Destructive, raw.destructive),
                (Hint::Idempotent, raw.idempotent),
                (Hint::OpenWorld, raw.open_world),
            ]),
            verb: self.verb(&format!("{}.verb", path), raw.verb.as_deref()),
            labels: self.labels(&format!("{}.labels", path), &raw.labels),
            match_mode: raw.match_mode,
        }
    }

    fn policy_rule(&mut self, path: &str, raw: &RawPolicyRule) -> Option<PolicyRule> {
        if raw.name.trim().is_empty() {
            self.report(format!("{}.name", path), "rule name must not be empty");
        }

        let when = self.condition(&format!("{}.when", path), &raw.when);

        let action = RuleAction::parse(&raw.action);
        if action.is_none() {
            self.report(
                format!("{}.action", path),
                format!(
                    "invalid action '{}': expected one of allow, deny, evaluateExternally",
                    raw.action
                ),
            );
        }

        let priority = u16::try_from(raw.priority)
            .ok()
            .filter(|p| *p <= MAX_PRIORITY);
        if priority.is_none() {
            self.report(
                format!("{}.priority", path),
                format!("priority {} out of range 0..={}", raw.priority, MAX_PRIORITY),
            );
        }

        if action.is_some_and(RuleAction::requires_approvers)
            && raw.approvers.iter().all(|a| a.trim().is_empty())
        {
            self.report(
                format!("{}.approvers", path),
                "approvers are required for action 'evaluateExternally'",
            );
        }

        Some(PolicyRule {
            name: raw.name.clone(),
            description: raw.description.clone(),
            when,
            action: action?,
            approvers: raw.approvers.clone(),
            timeout: raw.timeout.clone(),
            priority: priority?,
        })
    }
}

fn hint_map(entries: [(Hint, Option<bool>); 4]) -> BTreeMap<Hint, bool> {
    entries
        .into_iter()
        .filter_map(|(hint, value)| value.map(|v| (hint, v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> RawPolicyDocument {
        RawPolicyDocument::from_yaml(yaml).unwrap()
    }

    fn paths(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn minimal_document_is_valid() {
        let doc = parse("version: \"1.0\"\n");
        assert!(validate(&doc).is_empty());
        let typed = check(&doc).unwrap();
        assert!(typed.policy_rules.is_empty());
    }

    #[test]
    fn wrong_version_is_reported() {
        let findings = validate(&parse("version: \"2.0\"\n"));
        assert_eq!(paths(&findings), vec!["version"]);
        assert!(findings[0].message.contains("2.0"));
    }

    #[test]
    fn missing_version_is_reported() {
        let findings = validate(&parse("profiles: []\n"));
        assert_eq!(paths(&findings), vec!["version"]);
    }

    #[test]
    fn bad_profile_id_is_reported_with_index() {
        let findings = validate(&parse(
            "version: \"1.0\"\nprofiles: [acme/security-gmail, gmail]\n",
        ));
        assert_eq!(paths(&findings), vec!["profiles[1]"]);
    }

    #[test]
    fn override_verb_and_labels_are_checked() {
        let findings = validate(&parse(
            r#"
version: "1.0"
toolOverrides:
  docs:
    search:
      verb: fetch
      labels: ["scope:internal", "SCOPE:INTERNAL", "scope"]
"#,
        ));
        assert_eq!(
            paths(&findings),
            vec![
                "toolOverrides.docs.search.verb",
                "toolOverrides.docs.search.labels[1]",
                "toolOverrides.docs.search.labels[2]",
            ]
        );
    }

    #[test]
    fn classifier_rule_checks() {
        let findings = validate(&parse(
            r#"
version: "1.0"
classifierOverrides:
  gmail:
    send_email:
      - field: ""
        contains: x
        setLabels: ["scope:internal"]
      - field: to
        setLabels: []
      - field: to
        contains: a
        present: true
        setLabels: ["Bad"]
"#,
        ));
        assert_eq!(
            paths(&findings),
            vec![
                "classifierOverrides.gmail.send_email[0].field",
                "classifierOverrides.gmail.send_email[1]",
                "classifierOverrides.gmail.send_email[1].setLabels",
                "classifierOverrides.gmail.send_email[2]",
                "classifierOverrides.gmail.send_email[2].setLabels[0]",
            ]
        );
    }

    #[test]
    fn policy_rule_checks() {
        let findings = validate(&parse(
            r#"
version: "1.0"
policyRules:
  - name: ""
    action: allow
    priority: 1
  - name: r2
    action: permit
    priority: 1000
  - name: r3
    action: evaluateExternally
    priority: -1
  - name: r4
    when:
      verb: remove
      labels: ["x"]
    action: deny
    priority: 0
"#,
        ));
        assert_eq!(
            paths(&findings),
            vec![
                "policyRules[0].name",
                "policyRules[1].action",
                "policyRules[1].priority",
                "policyRules[2].priority",
                "policyRules[2].approvers",
                "policyRules[3].when.verb",
                "policyRules[3].when.labels[0]",
            ]
        );
    }

    #[test]
    fn blank_approvers_do_not_count() {
        let findings = validate(&parse(
            r#"
version: "1.0"
policyRules:
  - name: gated
    action: evaluateExternally
    approvers: ["  "]
    priority: 5
"#,
        ));
        assert_eq!(paths(&findings), vec!["policyRules[0].approvers"]);
    }

    #[test]
    fn n_independent_defects_yield_n_findings() {
        let doc = parse(
            r#"
version: "0.9"
profiles: [nope]
toolOverrides:
  svc:
    tool:
      verb: patch
classifierOverrides:
  svc:
    tool:
      - field: to
        contains: x
        setLabels: ["A:B"]
policyRules:
  - name: r
    action: allow
    priority: 2000
"#,
        );
        assert_eq!(validate(&doc).len(), 5);
        assert_eq!(check(&doc).unwrap_err().findings.len(), 5);
    }

    #[test]
    fn check_builds_typed_document() {
        let doc = parse(
            r#"
version: "1.0"
profiles: [acme/security-gmail]
toolOverrides:
  gmail:
    send_email:
      destructive: true
      readOnly: false
      verb: create
classifierOverrides:
  gmail:
    send_email:
      - field: to
        notContains: "{company_domain}"
        setLabels: ["scope:external"]
policyRules:
  - name: gate-destructive
    when: { destructive: true }
    action: evaluateExternally
    approvers: [security]
    priority: 10
"#,
        );
        let typed = check(&doc).unwrap();
        assert_eq!(typed.profiles[0].service(), "gmail");
        let ov = &typed.tool_overrides["gmail"]["send_email"];
        assert_eq!(ov.hints.get(&Hint::Destructive), Some(&true));
        assert_eq!(ov.hints.get(&Hint::ReadOnly), Some(&false));
        assert!(!ov.hints.contains_key(&Hint::OpenWorld));
        assert_eq!(ov.verb, Some(Verb::Create));
        assert!(ov.labels.is_none());
        let rules = &typed.classifier_overrides["gmail"]["send_email"];
        assert_eq!(rules[0].matcher, Matcher::NotContains("{company_domain}".into()));
        let rule = &typed.policy_rules[0];
        assert_eq!(rule.action, RuleAction::EvaluateExternally);
        assert_eq!(rule.when.hints.get(&Hint::Destructive), Some(&true));
        assert_eq!(rule.priority, 10);
    }
}
