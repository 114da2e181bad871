// store.rs — Where compiled policies are published.
//
// A store holds exactly one canonical policy. `set_policy` replaces it
// wholesale and readers must never see a half-written document; there is no
// partial-field update. All failures surface as TransportError naming the
// attempted operation, and are retryable by the caller.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::compiler::to_canonical_json;
use crate::error::TransportError;
use crate::merger::MergedSecurityPolicy;

pub const SET_POLICY: &str = "set_policy";
pub const GET_POLICY: &str = "get_policy";

/// A remote or local home for the canonical policy.
pub trait PolicyStore {
    /// Replace the stored policy.
    fn set_policy(&self, policy: &MergedSecurityPolicy) -> Result<(), TransportError>;

    /// Fetch the stored policy, if one was ever published.
    fn get_policy(&self) -> Result<Option<MergedSecurityPolicy>, TransportError>;
}

/// In-process store, mainly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    current: Mutex<Option<MergedSecurityPolicy>>,
}

impl PolicyStore for MemoryPolicyStore {
    fn set_policy(&self, policy: &MergedSecurityPolicy) -> Result<(), TransportError> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| TransportError::new(SET_POLICY, "store lock poisoned"))?;
        *current = Some(policy.clone());
        Ok(())
    }

    fn get_policy(&self) -> Result<Option<MergedSecurityPolicy>, TransportError> {
        let current = self
            .current
            .lock()
            .map_err(|_| TransportError::new(GET_POLICY, "store lock poisoned"))?;
        Ok(current.clone())
    }
}

/// A single JSON file, replaced atomically by persisting a staged temp file.
#[derive(Debug, Clone)]
pub struct FilePolicyStore {
    path: PathBuf,
}

impl FilePolicyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PolicyStore for FilePolicyStore {
    fn set_policy(&self, policy: &MergedSecurityPolicy) -> Result<(), TransportError> {
        let json = to_canonical_json(policy).map_err(|e| TransportError::new(SET_POLICY, e))?;
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| {
            TransportError::new(SET_POLICY, format!("{}: {}", parent.display(), e))
        })?;
        // Staged in the same directory so the persist is a same-filesystem rename.
        let mut staging = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
            TransportError::new(SET_POLICY, format!("{}: {}", parent.display(), e))
        })?;
        staging.write_all(json.as_bytes()).map_err(|e| {
            TransportError::new(SET_POLICY, format!("{}: {}", staging.path().display(), e))
        })?;
        staging.persist(&self.path).map_err(|e| {
            TransportError::new(SET_POLICY, format!("{}: {}", self.path.display(), e.error))
        })?;
        tracing::debug!(path = %self.path.display(), "wrote policy file");
        Ok(())
    }

    fn get_policy(&self) -> Result<Option<MergedSecurityPolicy>, TransportError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&self.path).map_err(|e| {
            TransportError::new(GET_POLICY, format!("{}: {}", self.path.display(), e))
        })?;
        let policy = serde_json::from_str(&data).map_err(|e| {
            TransportError::new(GET_POLICY, format!("{}: {}", self.path.display(), e))
        })?;
        Ok(Some(policy))
    }
}

/// A remote policy store reached over HTTP.
///
/// `PUT {base_url}/policy` replaces the policy; `GET {base_url}/policy`
/// returns it, with 404 meaning nothing has been published yet. Requests
/// authenticate with an administrative bearer token when one is configured.
pub struct HttpPolicyStore {
    client: reqwest::blocking::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpPolicyStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn policy_url(&self) -> String {
        format!("{}/policy", self.base_url)
    }

    fn authorize(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl PolicyStore for HttpPolicyStore {
    fn set_policy(&self, policy: &MergedSecurityPolicy) -> Result<(), TransportError> {
        let body = to_canonical_json(policy).map_err(|e| TransportError::new(SET_POLICY, e))?;
        self.authorize(self.client.put(self.policy_url()))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| TransportError::new(SET_POLICY, e))?;
        Ok(())
    }

    fn get_policy(&self) -> Result<Option<MergedSecurityPolicy>, TransportError> {
        let resp = self
            .authorize(self.client.get(self.policy_url()))
            .send()
            .map_err(|e| TransportError::new(GET_POLICY, e))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let policy = resp
            .error_for_status()
            .and_then(|resp| resp.json::<MergedSecurityPolicy>())
            .map_err(|e| TransportError::new(GET_POLICY, e))?;
        Ok(Some(policy))
    }
}
