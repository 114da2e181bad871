// table.rs — The contextual routing table and its operation contracts.
//
// (service, tool-or-wildcard) → RouteGroup. Every mutation here keeps the
// group invariants from `group.rs`; the table itself holds no I/O. The
// persisted, re-read-before-write form of these operations lives in
// `manager.rs`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::group::{RouteBinding, RouteGroup, RouteKey, RouteMode, WILDCARD};
use crate::protocol::Protocol;

/// Result of stacking a binding onto a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stacked {
    Added,
    /// The protocol was already bound; nothing changed.
    AlreadyBound,
}

/// Result of removing a binding from a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unstacked {
    /// Bindings left in the group.
    Remaining(usize),
    /// The last binding was removed and the group deleted.
    GroupDeleted,
}

/// Which group a binding applying to a call came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteSource {
    Tool,
    Wildcard,
}

/// A binding that applies to a concrete (service, tool) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedBinding<'a> {
    pub source: RouteSource,
    pub group_mode: RouteMode,
    pub binding: &'a RouteBinding,
}

/// A persisted table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub service: String,
    pub tool: String,
    #[serde(flatten)]
    pub group: RouteGroup,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RouteEntry>", into = "Vec<RouteEntry>")]
pub struct RoutingTable {
    groups: BTreeMap<RouteKey, RouteGroup>,
}

impl From<Vec<RouteEntry>> for RoutingTable {
    fn from(entries: Vec<RouteEntry>) -> Self {
        let groups = entries
            .into_iter()
            .filter(|e| !e.group.is_empty())
            .map(|mut e| {
                e.group.normalize();
                (RouteKey::new(e.service, e.tool), e.group)
            })
            .collect();
        Self { groups }
    }
}

impl From<RoutingTable> for Vec<RouteEntry> {
    fn from(table: RoutingTable) -> Self {
        table
            .groups
            .into_iter()
            .map(|(key, group)| RouteEntry {
                service: key.service,
                tool: key.tool,
                group,
            })
            .collect()
    }
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &RouteKey) -> Option<&RouteGroup> {
        self.groups.get(key)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Create a `Single` group with one binding. Fails if any group exists.
    pub fn register(&mut self, key: RouteKey, binding: RouteBinding) -> Result<(), RouteError> {
        if self.groups.contains_key(&key) {
            return Err(RouteError::AlreadyExists { key });
        }
        self.groups.insert(key, RouteGroup::single(binding));
        Ok(())
    }

    /// Append a binding to an existing group. Re-binding a protocol is a no-op.
    pub fn stack(&mut self, key: &RouteKey, binding: RouteBinding) -> Result<Stacked, RouteError> {
        let group = self.group_mut(key)?;
        if group.push(binding) {
            Ok(Stacked::Added)
        } else {
            Ok(Stacked::AlreadyBound)
        }
    }

    /// Set the combination mode of a group with at least two bindings.
    pub fn set_mode(&mut self, key: &RouteKey, mode: RouteMode) -> Result<(), RouteError> {
        let group = self.group_mut(key)?;
        if mode == RouteMode::Single {
            return Err(RouteError::InvalidState {
                key: key.clone(),
                reason: "mode 'single' is implied by a one-binding group; use 'all' or 'any'"
                    .to_string(),
            });
        }
        if group.len() < 2 {
            return Err(RouteError::InvalidState {
                key: key.clone(),
                reason: format!(
                    "mode '{}' needs at least 2 bindings (group has {})",
                    mode,
                    group.len()
                ),
            });
        }
        group.set_mode(mode);
        Ok(())
    }

    /// Remove one binding; deletes the group when it was the last one.
    pub fn unstack(&mut self, key: &RouteKey, protocol: Protocol) -> Result<Unstacked, RouteError> {
        let group = self.group_mut(key)?;
        if group.remove(protocol).is_none() {
            return Err(RouteError::NotFound {
                key: key.clone(),
                what: format!("{} binding", protocol),
            });
        }
        if group.is_empty() {
            self.groups.remove(key);
            Ok(Unstacked::GroupDeleted)
        } else {
            Ok(Unstacked::Remaining(group.len()))
        }
    }

    /// Delete a group unconditionally, returning it if it existed.
    pub fn clear(&mut self, key: &RouteKey) -> Option<RouteGroup> {
        self.groups.remove(key)
    }

    /// Groups ordered by (service, tool); the wildcard sorts first.
    pub fn list(&self, service: Option<&str>) -> Vec<(&RouteKey, &RouteGroup)> {
        self.groups
            .iter()
            .filter(|(key, _)| service.map_or(true, |s| key.service == s))
            .collect()
    }

    /// Every binding that applies to a call of `service/tool`: the
    /// service's wildcard group followed by the tool's own group.
    pub fn applicable(&self, service: &str, tool: &str) -> Vec<AppliedBinding<'_>> {
        let mut applied = Vec::new();
        if let Some(group) = self.groups.get(&RouteKey::wildcard(service)) {
            applied.extend(group.bindings().iter().map(|binding| AppliedBinding {
                source: RouteSource::Wildcard,
                group_mode: group.mode(),
                binding,
            }));
        }
        if tool != WILDCARD {
            if let Some(group) = self.groups.get(&RouteKey::new(service, tool)) {
                applied.extend(group.bindings().iter().map(|binding| AppliedBinding {
                    source: RouteSource::Tool,
                    group_mode: group.mode(),
                    binding,
                }));
            }
        }
        applied
    }

    fn group_mut(&mut self, key: &RouteKey) -> Result<&mut RouteGroup, RouteError> {
        self.groups.get_mut(key).ok_or_else(|| RouteError::NotFound {
            key: key.clone(),
            what: "route group".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(protocol: Protocol) -> RouteBinding {
        RouteBinding::new(protocol, format!("inst-{}", protocol), format!("ep-{}", protocol))
    }

    fn key() -> RouteKey {
        RouteKey::new("docs", "search")
    }

    #[test]
    fn register_twice_is_already_exists() {
        let mut table = RoutingTable::new();
        table.register(key(), binding(Protocol::Approval)).unwrap();
        match table.register(key(), binding(Protocol::RateLimit)) {
            Err(RouteError::AlreadyExists { key: k }) => assert_eq!(k, key()),
            other => panic!("expected AlreadyExists, got {:?}", other),
        }
        assert_eq!(table.get(&key()).unwrap().len(), 1);
    }

    #[test]
    fn stack_without_group_is_not_found() {
        let mut table = RoutingTable::new();
        assert!(matches!(
            table.stack(&key(), binding(Protocol::Approval)),
            Err(RouteError::NotFound { .. })
        ));
    }

    #[test]
    fn stack_same_protocol_is_noop() {
        let mut table = RoutingTable::new();
        table.register(key(), binding(Protocol::Approval)).unwrap();
        let outcome = table
            .stack(&key(), RouteBinding::new(Protocol::Approval, "other", "other"))
            .unwrap();
        assert_eq!(outcome, Stacked::AlreadyBound);
        let group = table.get(&key()).unwrap();
        assert_eq!(group.len(), 1);
        assert_eq!(group.bindings()[0].instance_ref, "inst-approval");
    }

    #[test]
    fn set_mode_requires_two_bindings() {
        let mut table = RoutingTable::new();
        table.register(key(), binding(Protocol::Approval)).unwrap();
        assert!(matches!(
            table.set_mode(&key(), RouteMode::Any),
            Err(RouteError::InvalidState { .. })
        ));
        table.stack(&key(), binding(Protocol::RateLimit)).unwrap();
        table.set_mode(&key(), RouteMode::Any).unwrap();
        assert_eq!(table.get(&key()).unwrap().mode(), RouteMode::Any);
        table.set_mode(&key(), RouteMode::All).unwrap();
        assert_eq!(table.get(&key()).unwrap().mode(), RouteMode::All);
    }

    #[test]
    fn set_mode_single_is_rejected() {
        let mut table = RoutingTable::new();
        table.register(key(), binding(Protocol::Approval)).unwrap();
        table.stack(&key(), binding(Protocol::Flow)).unwrap();
        assert!(matches!(
            table.set_mode(&key(), RouteMode::Single),
            Err(RouteError::InvalidState { .. })
        ));
    }

    #[test]
    fn unstack_lifecycle() {
        let mut table = RoutingTable::new();
        table.register(key(), binding(Protocol::Approval)).unwrap();
        table.stack(&key(), binding(Protocol::RateLimit)).unwrap();
        table.stack(&key(), binding(Protocol::Identity)).unwrap();
        table.set_mode(&key(), RouteMode::Any).unwrap();

        assert_eq!(
            table.unstack(&key(), Protocol::Identity).unwrap(),
            Unstacked::Remaining(2)
        );
        assert_eq!(table.get(&key()).unwrap().mode(), RouteMode::Any);

        assert_eq!(
            table.unstack(&key(), Protocol::Approval).unwrap(),
            Unstacked::Remaining(1)
        );
        assert_eq!(table.get(&key()).unwrap().mode(), RouteMode::Single);

        assert_eq!(
            table.unstack(&key(), Protocol::RateLimit).unwrap(),
            Unstacked::GroupDeleted
        );
        assert!(table.get(&key()).is_none());
    }

    #[test]
    fn unstack_unbound_protocol_is_not_found() {
        let mut table = RoutingTable::new();
        table.register(key(), binding(Protocol::Approval)).unwrap();
        match table.unstack(&key(), Protocol::Flow) {
            Err(RouteError::NotFound { what, .. }) => assert_eq!(what, "flow binding"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn clear_is_unconditional() {
        let mut table = RoutingTable::new();
        assert!(table.clear(&key()).is_none());
        table.register(key(), binding(Protocol::Approval)).unwrap();
        table.stack(&key(), binding(Protocol::Flow)).unwrap();
        assert_eq!(table.clear(&key()).unwrap().len(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn list_filters_by_service_and_orders_wildcard_first() {
        let mut table = RoutingTable::new();
        table.register(RouteKey::new("docs", "search"), binding(Protocol::RateLimit)).unwrap();
        table.register(RouteKey::wildcard("docs"), binding(Protocol::Approval)).unwrap();
        table.register(RouteKey::new("gmail", "send"), binding(Protocol::Flow)).unwrap();

        let docs: Vec<String> = table
            .list(Some("docs"))
            .into_iter()
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(docs, vec!["docs/*", "docs/search"]);
        assert_eq!(table.list(None).len(), 3);
    }

    #[test]
    fn applicable_is_union_of_wildcard_and_tool_groups() {
        let mut table = RoutingTable::new();
        table.register(RouteKey::wildcard("docs"), binding(Protocol::Approval)).unwrap();
        table.register(RouteKey::new("docs", "search"), binding(Protocol::RateLimit)).unwrap();

        let applied = table.applicable("docs", "search");
        let summary: Vec<(RouteSource, Protocol)> =
            applied.iter().map(|a| (a.source, a.binding.protocol)).collect();
        assert_eq!(
            summary,
            vec![
                (RouteSource::Wildcard, Protocol::Approval),
                (RouteSource::Tool, Protocol::RateLimit),
            ]
        );

        let other = table.applicable("docs", "index");
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].source, RouteSource::Wildcard);
    }

    #[test]
    fn json_round_trip_restores_invariants() {
        let json = r#"[
            {"service": "docs", "tool": "search", "mode": "any",
             "bindings": [{"protocol": "approval", "instanceRef": "a", "endpointRef": "e"}]},
            {"service": "docs", "tool": "*", "mode": "single", "bindings": []}
        ]"#;
        let table: RoutingTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&key()).unwrap().mode(), RouteMode::Single);

        let out = serde_json::to_value(&table).unwrap();
        assert_eq!(out[0]["service"], "docs");
        assert_eq!(out[0]["bindings"][0]["instanceRef"], "a");
    }
}
