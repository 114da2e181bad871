// protocol.rs — Governance protocols a route can bind to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An external, independently stateful policy check.
///
/// New protocols may be added; match with a wildcard arm outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum Protocol {
    /// Human sign-off.
    Approval,
    /// Call-rate budget.
    RateLimit,
    /// Per-user argument constraints.
    Constraint,
    /// System state that must hold before the call.
    Precondition,
    /// Call-sequence flow control.
    Flow,
    /// Identity and segregation of duties.
    Identity,
}

impl Protocol {
    pub const ALL: [Protocol; 6] = [
        Protocol::Approval,
        Protocol::RateLimit,
        Protocol::Constraint,
        Protocol::Precondition,
        Protocol::Flow,
        Protocol::Identity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Approval => "approval",
            Protocol::RateLimit => "rate-limit",
            Protocol::Constraint => "constraint",
            Protocol::Precondition => "precondition",
            Protocol::Flow => "flow",
            Protocol::Identity => "identity",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    /// Accepts the kebab-case name; `_` is treated as `-` and case is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        let normalized = if normalized == "ratelimit" {
            "rate-limit".to_string()
        } else {
            normalized
        };
        Protocol::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown protocol '{}': expected one of approval, rate-limit, constraint, precondition, flow, identity",
                    s
                )
            })
    }
}
