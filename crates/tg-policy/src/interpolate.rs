// interpolate.rs — Tenant variable substitution.
//
// Replaces literal `{var}` tokens in string leaves with deployment-specific
// values. Any brace-delimited run is a candidate token; whether it is
// replaced depends only on `vars`, so variable names are not restricted.
// The transform preserves structure: maps stay maps, lists keep their
// order, non-string scalars pass through. Tokens with no matching
// variable are left verbatim so an unused placeholder never fails a compile.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::model::{ClassifierRule, Matcher};

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([^{}]+)\}").expect("token pattern is a valid regex")
});

pub type TenantVars = BTreeMap<String, String>;

/// Substitute every resolvable `{var}` token in a single string.
pub fn interpolate_str<'a>(value: &'a str, vars: &TenantVars) -> Cow<'a, str> {
    TOKEN_PATTERN.replace_all(value, |caps: &Captures| match vars.get(&caps[1]) {
        Some(replacement) => replacement.clone(),
        None => {
            tracing::debug!(token = &caps[0], "leaving unresolved tenant token");
            caps[0].to_string()
        }
    })
}

/// Structure-preserving deep substitution of tenant variables.
pub trait Interpolate {
    fn interpolate(&self, vars: &TenantVars) -> Self;
}

impl Interpolate for String {
    fn interpolate(&self, vars: &TenantVars) -> Self {
        interpolate_str(self, vars).into_owned()
    }
}

impl<T: Interpolate> Interpolate for Vec<T> {
    fn interpolate(&self, vars: &TenantVars) -> Self {
        self.iter().map(|item| item.interpolate(vars)).collect()
    }
}

impl<T: Interpolate> Interpolate for Option<T> {
    fn interpolate(&self, vars: &TenantVars) -> Self {
        self.as_ref().map(|item| item.interpolate(vars))
    }
}

/// Keys are identifiers (services, tools) and are not rewritten.
impl<T: Interpolate> Interpolate for BTreeMap<String, T> {
    fn interpolate(&self, vars: &TenantVars) -> Self {
        self.iter()
            .map(|(k, v)| (k.clone(), v.interpolate(vars)))
            .collect()
    }
}

impl Interpolate for serde_json::Value {
    fn interpolate(&self, vars: &TenantVars) -> Self {
        use serde_json::Value;
        match self {
            Value::String(s) => Value::String(s.interpolate(vars)),
            Value::Array(items) => Value::Array(items.iter().map(|v| v.interpolate(vars)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.interpolate(vars)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

impl Interpolate for Matcher {
    fn interpolate(&self, vars: &TenantVars) -> Self {
        match self {
            Matcher::Contains(s) => Matcher::Contains(s.interpolate(vars)),
            Matcher::NotContains(s) => Matcher::NotContains(s.interpolate(vars)),
            Matcher::Present(p) => Matcher::Present(*p),
        }
    }
}

/// Labels are stable vocabulary and cannot contain braces, so only the
/// field name and the matcher are rewritten.
impl Interpolate for ClassifierRule {
    fn interpolate(&self, vars: &TenantVars) -> Self {
        ClassifierRule {
            field: self.field.interpolate(vars),
            matcher: self.matcher.interpolate(vars),
            set_labels: self.set_labels.clone(),
        }
    }
}

/// Free-function form of [`Interpolate::interpolate`].
pub fn interpolate<T: Interpolate>(value: &T, vars: &TenantVars) -> T {
    value.interpolate(vars)
}
