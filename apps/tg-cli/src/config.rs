// config.rs — Project configuration for the `tg` CLI.
//
// Everything lives under `.tg/` in the project root. `.tg/config.toml` is
// optional; each field it sets overrides the `for_project()` default.
// Relative paths are resolved against the project root.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tg_policy::{FilePolicyStore, HttpPolicyStore, PolicyStore};

pub const CONFIG_FILE: &str = ".tg/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Root the relative paths below are resolved against.
    #[serde(skip)]
    pub project_root: PathBuf,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub policy_store: PolicyStoreConfig,

    #[serde(default)]
    pub routing: RoutingConfig,
}

/// Community profile catalog location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// One `<service>.yaml` per profile.
    #[serde(default = "default_catalog_dir")]
    pub dir: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            dir: default_catalog_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Http,
}

/// Where `tg policy publish` sends the compiled policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyStoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    /// Target file for the `file` store.
    #[serde(default = "default_policy_path")]
    pub path: PathBuf,

    /// Base URL of the policy admin API for the `http` store.
    #[serde(default)]
    pub url: Option<String>,

    /// Environment variable holding the admin bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for PolicyStoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: default_policy_path(),
            url: None,
            token_env: default_token_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Persisted routing table (JSON).
    #[serde(default = "default_routes_table")]
    pub table: PathBuf,

    /// Protocol instance parameters snapshot (YAML).
    #[serde(default = "default_instances")]
    pub instances: PathBuf,

    /// Service tool catalog with enabled flags (YAML).
    #[serde(default = "default_services")]
    pub services: PathBuf,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            table: default_routes_table(),
            instances: default_instances(),
            services: default_services(),
        }
    }
}

fn default_catalog_dir() -> PathBuf {
    PathBuf::from(".tg/profiles")
}

fn default_policy_path() -> PathBuf {
    PathBuf::from(".tg/policy.json")
}

fn default_token_env() -> String {
    "TG_ADMIN_TOKEN".to_string()
}

fn default_routes_table() -> PathBuf {
    PathBuf::from(".tg/routes.json")
}

fn default_instances() -> PathBuf {
    PathBuf::from(".tg/instances.yaml")
}

fn default_services() -> PathBuf {
    PathBuf::from(".tg/services.yaml")
}

impl GovernanceConfig {
    /// Default layout under `<root>/.tg/`.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            catalog: CatalogConfig::default(),
            policy_store: PolicyStoreConfig::default(),
            routing: RoutingConfig::default(),
        }
    }

    /// Defaults, overridden by `.tg/config.toml` when present.
    pub fn load(project_root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = project_root.as_ref();
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::for_project(root));
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: GovernanceConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.project_root = root.to_path_buf();
        tracing::debug!(path = %path.display(), "loaded project config");
        Ok(config)
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.resolve(&self.catalog.dir)
    }

    pub fn routes_table(&self) -> PathBuf {
        self.resolve(&self.routing.table)
    }

    pub fn instances_file(&self) -> PathBuf {
        self.resolve(&self.routing.instances)
    }

    pub fn services_file(&self) -> PathBuf {
        self.resolve(&self.routing.services)
    }

    /// The configured policy store. The http store reads its token from
    /// the environment at open time; a missing token sends no auth header.
    pub fn open_policy_store(&self) -> anyhow::Result<Box<dyn PolicyStore>> {
        let cfg = &self.policy_store;
        match cfg.kind {
            StoreKind::File => Ok(Box::new(FilePolicyStore::new(self.resolve(&cfg.path)))),
            StoreKind::Http => {
                let url = cfg.url.as_deref().with_context(|| {
                    format!("policy_store.kind = \"http\" requires policy_store.url in {}", CONFIG_FILE)
                })?;
                let token = std::env::var(&cfg.token_env).ok();
                if token.is_none() {
                    tracing::warn!(var = %cfg.token_env, "admin token not set; publishing without auth");
                }
                Ok(Box::new(HttpPolicyStore::new(url, token)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = GovernanceConfig::load(dir.path()).unwrap();
        assert_eq!(config.catalog_dir(), dir.path().join(".tg/profiles"));
        assert_eq!(config.routes_table(), dir.path().join(".tg/routes.json"));
        assert_eq!(config.policy_store.kind, StoreKind::File);
        assert_eq!(config.policy_store.token_env, "TG_ADMIN_TOKEN");
    }

    #[test]
    fn file_overrides_individual_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".tg")).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[catalog]
dir = "/srv/profiles"

[policy_store]
kind = "http"
url = "https://policy.example/v1"
"#,
        )
        .unwrap();

        let config = GovernanceConfig::load(dir.path()).unwrap();
        assert_eq!(config.catalog_dir(), PathBuf::from("/srv/profiles"));
        assert_eq!(config.policy_store.kind, StoreKind::Http);
        assert_eq!(config.policy_store.path, PathBuf::from(".tg/policy.json"));
        assert_eq!(config.services_file(), dir.path().join(".tg/services.yaml"));
        assert!(config.open_policy_store().is_ok());
    }

    #[test]
    fn http_store_requires_url() {
        let mut config = GovernanceConfig::for_project("/tmp/project");
        config.policy_store.kind = StoreKind::Http;
        assert!(config.open_policy_store().is_err());
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".tg")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[policy_store]\nkind = \"ftp\"\n").unwrap();
        assert!(GovernanceConfig::load(dir.path()).is_err());
    }
}
