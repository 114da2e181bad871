// access.rs — Effective-access report: which checks apply to what a subject can call.
//
// Read-only. A wildcard grant expands to every tool currently enabled in the
// service catalog. For each granted (service, tool) the report lists the
// bindings of the service's wildcard group and of the tool's own group,
// each rendered with the parameters its protocol instance has stored
// externally. Used for audit and operator review, never for enforcement.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::group::{RouteBinding, RouteMode, WILDCARD};
use crate::protocol::Protocol;
use crate::table::{RouteSource, RoutingTable};

/// Permission for a subject to call `service/tool` (`tool` may be `*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub service: String,
    pub tool: String,
}

impl Grant {
    pub fn new(service: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            tool: tool.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTool {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Tools each service currently exposes through the gateway.
///
/// ```yaml
/// docs:
///   - name: search
///   - name: reindex
///     enabled: false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceCatalog {
    services: BTreeMap<String, Vec<CatalogTool>>,
}

impl ServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, service: &str, tool: &str, enabled: bool) -> Self {
        self.services
            .entry(service.to_string())
            .or_default()
            .push(CatalogTool {
                name: tool.to_string(),
                enabled,
            });
        self
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, RouteError> {
        load_yaml(path)
    }

    pub fn enabled_tools<'a>(&'a self, service: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.services
            .get(service)
            .into_iter()
            .flatten()
            .filter(|t| t.enabled)
            .map(|t| t.name.as_str())
    }
}

/// Source of externally stored protocol-instance parameters.
pub trait InstanceDirectory {
    /// Parameters for the instance a binding points at, if known.
    fn parameters(&self, binding: &RouteBinding) -> Result<Option<serde_json::Value>, RouteError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub protocol: Protocol,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Instance parameters read from a snapshot file, keyed by instance ref.
///
/// ```yaml
/// appr-finance:
///   protocol: approval
///   parameters: { approvers: [finance-leads], timeout: 30m }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticInstanceDirectory {
    instances: BTreeMap<String, InstanceRecord>,
}

impl StaticInstanceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance(
        mut self,
        instance_ref: &str,
        protocol: Protocol,
        parameters: serde_json::Value,
    ) -> Self {
        self.instances.insert(
            instance_ref.to_string(),
            InstanceRecord {
                protocol,
                parameters,
            },
        );
        self
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, RouteError> {
        load_yaml(path)
    }
}

impl InstanceDirectory for StaticInstanceDirectory {
    fn parameters(&self, binding: &RouteBinding) -> Result<Option<serde_json::Value>, RouteError> {
        Ok(self
            .instances
            .get(&binding.instance_ref)
            .filter(|record| record.protocol == binding.protocol)
            .map(|record| record.parameters.clone()))
    }
}

/// One check as it applies to a granted tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedCheck {
    pub protocol: Protocol,
    pub instance_ref: String,
    pub endpoint_ref: String,
    pub source: RouteSource,
    /// Mode of the group the binding belongs to.
    pub group_mode: RouteMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// All checks that apply to one granted (service, tool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveAccess {
    pub service: String,
    pub tool: String,
    pub checks: Vec<RenderedCheck>,
}

impl EffectiveAccess {
    pub fn protocols(&self) -> Vec<Protocol> {
        self.checks.iter().map(|c| c.protocol).collect()
    }

    /// No checks bind to this tool.
    pub fn is_unguarded(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Build the effective-access report for a subject's grants.
///
/// Output is ordered by (service, tool) with duplicates collapsed.
pub fn compute_effective_checks(
    grants: &[Grant],
    table: &RoutingTable,
    catalog: &ServiceCatalog,
    directory: &dyn InstanceDirectory,
) -> Result<Vec<EffectiveAccess>, RouteError> {
    let mut targets: BTreeSet<(String, String)> = BTreeSet::new();
    for grant in grants {
        if grant.tool == WILDCARD {
            for tool in catalog.enabled_tools(&grant.service) {
                targets.insert((grant.service.clone(), tool.to_string()));
            }
        } else {
            targets.insert((grant.service.clone(), grant.tool.clone()));
        }
    }

    let mut report = Vec::with_capacity(targets.len());
    for (service, tool) in targets {
        let mut checks = Vec::new();
        for applied in table.applicable(&service, &tool) {
            checks.push(RenderedCheck {
                protocol: applied.binding.protocol,
                instance_ref: applied.binding.instance_ref.clone(),
                endpoint_ref: applied.binding.endpoint_ref.clone(),
                source: applied.source,
                group_mode: applied.group_mode,
                parameters: directory.parameters(applied.binding)?,
            });
        }
        report.push(EffectiveAccess {
            service,
            tool,
            checks,
        });
    }

    tracing::debug!(
        grants = grants.len(),
        tools = report.len(),
        "computed effective checks"
    );
    Ok(report)
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, RouteError> {
    let data = fs::read_to_string(path).map_err(|source| RouteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&data)
        .map_err(|e| RouteError::transport("load_snapshot", format!("{}: {}", path.display(), e)))
}
