//! # tg-routing
//!
//! Governance route groups for Tool Governance.
//!
//! A route group binds external protocol checks (approval, rate limit,
//! constraint, precondition, flow, identity) to a `(service, tool)` pair and
//! combines them with one mode. The [`RoutingTable`] holds every group and
//! enforces the group invariants; [`RouteManager`] applies each operation as
//! a fresh read-modify-write against a [`RoutingStore`]; and
//! [`compute_effective_checks`] renders, for audit, which checks apply to
//! the tools a subject is granted.
//!
//! ## Key invariants
//!
//! - At most one binding per protocol in a group.
//! - A group with fewer than two bindings is `Single`; removing the last
//!   binding deletes the group.
//! - A call to a specific tool is subject to both the tool's group and the
//!   service's wildcard group.

pub mod access;
pub mod error;
pub mod group;
pub mod manager;
pub mod protocol;
pub mod store;
pub mod table;

pub use access::{
    compute_effective_checks, EffectiveAccess, Grant, InstanceDirectory, RenderedCheck,
    ServiceCatalog, StaticInstanceDirectory,
};
pub use error::RouteError;
pub use group::{RouteBinding, RouteGroup, RouteKey, RouteMode, WILDCARD};
pub use manager::{Converged, RouteManager};
pub use protocol::Protocol;
pub use store::{FileRoutingStore, MemoryRoutingStore, RoutingStore};
pub use table::{AppliedBinding, RouteSource, RoutingTable, Stacked, Unstacked};
