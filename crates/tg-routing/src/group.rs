// group.rs — Route groups: which protocol checks bind to a (service, tool).
//
// Combination semantics, honored by the enforcement layer (this crate does
// not evaluate checks):
//
// - `All`    every bound protocol must approve
// - `Any`    at least one bound protocol must approve
// - `Single` exactly one binding; equivalent to `All` with one term
//
// A tool-specific group and the service's wildcard (`*`) group are
// independent. A call to a specific tool is subject to the union of both
// groups' bindings, and the two groups are AND-ed together even when each
// is internally `Any`.
//
// Group invariants: at most one binding per protocol; fewer than two
// bindings implies `Single`; an empty group does not exist.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::Protocol;

/// Tool selector matching every tool of a service.
pub const WILDCARD: &str = "*";

/// A (service, tool-or-wildcard) routing table key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub service: String,
    pub tool: String,
}

impl RouteKey {
    pub fn new(service: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            tool: tool.into(),
        }
    }

    pub fn wildcard(service: impl Into<String>) -> Self {
        Self::new(service, WILDCARD)
    }

    pub fn is_wildcard(&self) -> bool {
        self.tool == WILDCARD
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.tool)
    }
}

/// One protocol check bound to a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteBinding {
    pub protocol: Protocol,
    /// Reference to the external protocol instance holding the check's state.
    pub instance_ref: String,
    /// Where the enforcement layer invokes that instance.
    pub endpoint_ref: String,
}

impl RouteBinding {
    pub fn new(
        protocol: Protocol,
        instance_ref: impl Into<String>,
        endpoint_ref: impl Into<String>,
    ) -> Self {
        Self {
            protocol,
            instance_ref: instance_ref.into(),
            endpoint_ref: endpoint_ref.into(),
        }
    }
}

/// How the bindings of one group combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMode {
    #[default]
    Single,
    All,
    Any,
}

impl fmt::Display for RouteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMode::Single => write!(f, "single"),
            RouteMode::All => write!(f, "all"),
            RouteMode::Any => write!(f, "any"),
        }
    }
}

impl std::str::FromStr for RouteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(RouteMode::Single),
            "all" => Ok(RouteMode::All),
            "any" => Ok(RouteMode::Any),
            _ => Err(format!("unknown mode '{}': expected all or any", s)),
        }
    }
}

/// The ordered set of checks bound to one route key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteGroup {
    mode: RouteMode,
    bindings: Vec<RouteBinding>,
}

impl RouteGroup {
    /// A new group with one binding.
    pub fn single(binding: RouteBinding) -> Self {
        Self {
            mode: RouteMode::Single,
            bindings: vec![binding],
        }
    }

    pub fn mode(&self) -> RouteMode {
        self.mode
    }

    pub fn bindings(&self) -> &[RouteBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn binding(&self, protocol: Protocol) -> Option<&RouteBinding> {
        self.bindings.iter().find(|b| b.protocol == protocol)
    }

    pub fn protocols(&self) -> impl Iterator<Item = Protocol> + '_ {
        self.bindings.iter().map(|b| b.protocol)
    }

    /// Append a binding. Returns `false` (and changes nothing) when the
    /// protocol is already bound. A `Single` group that grows becomes `All`.
    pub(crate) fn push(&mut self, binding: RouteBinding) -> bool {
        if self.binding(binding.protocol).is_some() {
            return false;
        }
        self.bindings.push(binding);
        if self.bindings.len() >= 2 && self.mode == RouteMode::Single {
            self.mode = RouteMode::All;
        }
        true
    }

    /// Remove the binding for `protocol`, reverting to `Single` at one binding.
    pub(crate) fn remove(&mut self, protocol: Protocol) -> Option<RouteBinding> {
        let index = self.bindings.iter().position(|b| b.protocol == protocol)?;
        let removed = self.bindings.remove(index);
        if self.bindings.len() < 2 {
            self.mode = RouteMode::Single;
        }
        Some(removed)
    }

    pub(crate) fn set_mode(&mut self, mode: RouteMode) {
        self.mode = mode;
    }

    /// Restore the group invariants on data read from outside the crate.
    pub(crate) fn normalize(&mut self) {
        let mut seen = Vec::new();
        self.bindings.retain(|b| {
            if seen.contains(&b.protocol) {
                false
            } else {
                seen.push(b.protocol);
                true
            }
        });
        if self.bindings.len() < 2 {
            self.mode = RouteMode::Single;
        } else if self.mode == RouteMode::Single {
            self.mode = RouteMode::All;
        }
    }
}
