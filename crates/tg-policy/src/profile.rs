// profile.rs — Community profiles and the Profile Resolver.
//
// A community profile is a reusable bundle of default annotations for one
// service's tools, imported by reference as `<org>/security-<service>`.
// The service part is the catalog key; the org part is informational.
//
// Catalog storage is pluggable behind `ProfileCatalog`. The resolver keeps
// an explicit cache that callers drop with `invalidate()` (e.g. after
// re-authenticating against a remote catalog). There is no global state.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, ProfileError, TransportError};
use crate::model::ClassifierRule;
use crate::vocabulary::{Hint, Label, Verb};

static PROFILE_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<org>[A-Za-z0-9][A-Za-z0-9_.-]*)/security-(?P<service>[a-z0-9][a-z0-9_-]*)$")
        .expect("profile id pattern is a valid regex")
});

/// A parsed `<org>/security-<service>` profile reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProfileId {
    raw: String,
    org: String,
    service: String,
}

impl ProfileId {
    pub fn parse(raw: &str) -> Result<Self, ProfileError> {
        let caps = PROFILE_ID_PATTERN
            .captures(raw)
            .ok_or_else(|| ProfileError::InvalidProfileId { id: raw.to_string() })?;
        Ok(Self {
            raw: raw.to_string(),
            org: caps["org"].to_string(),
            service: caps["service"].to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// The catalog lookup key.
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl FromStr for ProfileId {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A read-only catalog entry describing one service's tools.
///
/// ```yaml
/// service: gmail
/// tools:
///   send_email:
///     hints: { openWorld: true }
///     verb: create
///     classify:
///       - field: to
///         notContains: "{company_domain}"
///         setLabels: ["scope:external"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityProfile {
    pub service: String,
    #[serde(default)]
    pub tools: BTreeMap<String, ProfileTool>,
}

/// Defaults a profile supplies for one tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileTool {
    /// Only `true` entries are imported; absent or `false` hints are never
    /// forced onto the merged annotation.
    #[serde(default)]
    pub hints: BTreeMap<Hint, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<Verb>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classify: Option<Vec<ClassifierRule>>,
}

impl ProfileTool {
    /// The hints this profile asserts as true.
    pub fn true_hints(&self) -> impl Iterator<Item = Hint> + '_ {
        self.hints
            .iter()
            .filter(|(_, on)| **on)
            .map(|(hint, _)| *hint)
    }
}

/// Where community profiles come from.
pub trait ProfileCatalog {
    /// Look up the profile for a service. `Ok(None)` means no such entry.
    fn lookup(&self, service: &str) -> Result<Option<CommunityProfile>, TransportError>;

    /// All services the catalog has a profile for, sorted.
    fn services(&self) -> Result<Vec<String>, TransportError>;
}

/// A catalog held in memory, typically bundled or built in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    profiles: BTreeMap<String, CommunityProfile>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: CommunityProfile) -> Self {
        self.insert(profile);
        self
    }

    pub fn insert(&mut self, profile: CommunityProfile) {
        self.profiles.insert(profile.service.clone(), profile);
    }
}

impl ProfileCatalog for InMemoryCatalog {
    fn lookup(&self, service: &str) -> Result<Option<CommunityProfile>, TransportError> {
        Ok(self.profiles.get(service).cloned())
    }

    fn services(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.profiles.keys().cloned().collect())
    }
}

/// A catalog directory with one `<service>.yaml` file per profile.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    dir: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, service: &str) -> PathBuf {
        self.dir.join(format!("{}.yaml", service))
    }
}

impl ProfileCatalog for DirectoryCatalog {
    fn lookup(&self, service: &str) -> Result<Option<CommunityProfile>, TransportError> {
        let path = self.path_for(service);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)
            .map_err(|e| TransportError::new("load_profile", format!("{}: {}", path.display(), e)))?;
        let profile: CommunityProfile = serde_yaml::from_str(&data)
            .map_err(|e| TransportError::new("load_profile", format!("{}: {}", path.display(), e)))?;
        Ok(Some(profile))
    }

    fn services(&self) -> Result<Vec<String>, TransportError> {
        let pattern = self.dir.join("*.yaml");
        let entries = glob::glob(&pattern.to_string_lossy())
            .map_err(|e| TransportError::new("list_profiles", e))?;
        let mut services: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        services.sort();
        Ok(services)
    }
}

/// Resolves profile identifiers against a catalog, caching each service once.
///
/// This is the explicit compile context: construct one per catalog session,
/// pass it to the pipeline, and call `invalidate()` whenever the catalog's
/// contents or credentials may have changed.
pub struct ProfileResolver {
    catalog: Box<dyn ProfileCatalog>,
    cache: HashMap<String, CommunityProfile>,
}

impl ProfileResolver {
    pub fn new(catalog: impl ProfileCatalog + 'static) -> Self {
        Self {
            catalog: Box::new(catalog),
            cache: HashMap::new(),
        }
    }

    /// Resolve `<org>/security-<service>` to its community profile.
    pub fn resolve(&mut self, profile_id: &str) -> Result<CommunityProfile, PolicyError> {
        let id = ProfileId::parse(profile_id)?;
        self.resolve_id(&id)
    }

    /// Resolve an already-parsed identifier.
    pub fn resolve_id(&mut self, id: &ProfileId) -> Result<CommunityProfile, PolicyError> {
        if let Some(profile) = self.cache.get(id.service()) {
            tracing::debug!(profile = %id, "profile cache hit");
            return Ok(profile.clone());
        }
        let profile = self
            .catalog
            .lookup(id.service())?
            .ok_or_else(|| ProfileError::ProfileNotFound {
                id: id.to_string(),
                service: id.service().to_string(),
            })?;
        tracing::debug!(profile = %id, tools = profile.tools.len(), "resolved profile");
        self.cache.insert(id.service().to_string(), profile.clone());
        Ok(profile)
    }

    /// Resolve every identifier in order, failing on the first error.
    pub fn resolve_all(&mut self, ids: &[ProfileId]) -> Result<Vec<CommunityProfile>, PolicyError> {
        ids.iter().map(|id| self.resolve_id(id)).collect()
    }

    /// Services available in the underlying catalog.
    pub fn available_services(&self) -> Result<Vec<String>, PolicyError> {
        Ok(self.catalog.services()?)
    }

    /// Drop every cached profile so the next lookup re-fetches.
    pub fn invalidate(&mut self) {
        tracing::debug!(entries = self.cache.len(), "invalidating profile cache");
        self.cache.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Matcher;

    fn gmail_profile() -> CommunityProfile {
        serde_yaml::from_str(
            r#"
service: gmail
tools:
  send_email:
    hints: { openWorld: true, readOnly: false }
    verb: create
  list_messages:
    hints: { readOnly: true }
    verb: list
    labels: ["data-class:pii"]
    classify:
      - field: query
        present: true
        setLabels: ["search:filtered"]
"#,
        )
        .unwrap()
    }

    #[test]
    fn parse_profile_id_extracts_service() {
        let id = ProfileId::parse("acme/security-gmail").unwrap();
        assert_eq!(id.org(), "acme");
        assert_eq!(id.service(), "gmail");
        assert_eq!(id.to_string(), "acme/security-gmail");
    }

    #[test]
    fn parse_profile_id_rejects_other_shapes() {
        for bad in ["gmail", "acme/gmail", "acme/security-", "/security-gmail", "acme/security-Gmail"] {
            assert_eq!(
                ProfileId::parse(bad),
                Err(ProfileError::InvalidProfileId { id: bad.to_string() }),
                "{bad}"
            );
        }
    }

    #[test]
    fn profile_yaml_parses_hints_and_classifiers() {
        let profile = gmail_profile();
        let send = &profile.tools["send_email"];
        assert_eq!(send.true_hints().collect::<Vec<_>>(), vec![Hint::OpenWorld]);
        assert!(send.classify.is_none());
        let list = &profile.tools["list_messages"];
        let rules = list.classify.as_ref().unwrap();
        assert_eq!(rules[0].matcher, Matcher::Present(true));
    }

    #[test]
    fn resolve_returns_profile_and_caches() {
        let mut resolver = ProfileResolver::new(InMemoryCatalog::new().with_profile(gmail_profile()));
        let profile = resolver.resolve("acme/security-gmail").unwrap();
        assert_eq!(profile.service, "gmail");
        assert_eq!(resolver.cached_len(), 1);

        // Another org importing the same service shares the cache entry.
        resolver.resolve("other-org/security-gmail").unwrap();
        assert_eq!(resolver.cached_len(), 1);

        resolver.invalidate();
        assert_eq!(resolver.cached_len(), 0);
    }

    #[test]
    fn resolve_invalid_id_fails() {
        let mut resolver = ProfileResolver::new(InMemoryCatalog::new());
        match resolver.resolve("not-a-profile") {
            Err(PolicyError::Profile(ProfileError::InvalidProfileId { id })) => {
                assert_eq!(id, "not-a-profile")
            }
            other => panic!("expected InvalidProfileId, got {:?}", other),
        }
    }

    #[test]
    fn resolve_unknown_service_fails() {
        let mut resolver = ProfileResolver::new(InMemoryCatalog::new());
        match resolver.resolve("acme/security-slack") {
            Err(PolicyError::Profile(ProfileError::ProfileNotFound { service, .. })) => {
                assert_eq!(service, "slack")
            }
            other => panic!("expected ProfileNotFound, got {:?}", other),
        }
    }

    #[test]
    fn directory_catalog_reads_service_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("gmail.yaml"),
            serde_yaml::to_string(&gmail_profile()).unwrap(),
        )
        .unwrap();
        fs::write(dir.path().join("docs.yaml"), "service: docs\n").unwrap();

        let catalog = DirectoryCatalog::new(dir.path());
        assert_eq!(catalog.services().unwrap(), vec!["docs", "gmail"]);
        assert_eq!(catalog.lookup("gmail").unwrap().unwrap(), gmail_profile());
        assert!(catalog.lookup("slack").unwrap().is_none());
    }

    #[test]
    fn directory_catalog_surfaces_malformed_profile_as_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("bad.yaml"),
            "service: bad\ntools:\n  t:\n    labels: [\"NOPE\"]\n",
        )
        .unwrap();
        let err = DirectoryCatalog::new(dir.path()).lookup("bad").unwrap_err();
        assert_eq!(err.operation, "load_profile");
    }
}
