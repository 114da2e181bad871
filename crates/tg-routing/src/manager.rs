// manager.rs — Route-group operations against a persistent store.
//
// Each operation is one read-modify-write: load the current table, apply
// the change, save. Nothing is cached between calls. Operations spanning
// several calls are not transactional, so `ensure_route` is provided as
// the converge-from-current-state form that is safe to retry.

use crate::error::RouteError;
use crate::group::{RouteBinding, RouteGroup, RouteKey, RouteMode};
use crate::protocol::Protocol;
use crate::store::RoutingStore;
use crate::table::{RoutingTable, Stacked, Unstacked};

/// What `ensure_route` had to do to reach the requested state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converged {
    /// No group existed; one was registered.
    Registered,
    /// The binding was stacked onto an existing group.
    Stacked,
    /// The protocol was already bound; nothing was written.
    AlreadyBound,
}

pub struct RouteManager<S> {
    store: S,
}

impl<S: RoutingStore> RouteManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn register_route(&self, key: RouteKey, binding: RouteBinding) -> Result<(), RouteError> {
        const OP: &str = "register_route";
        let protocol = binding.protocol;
        self.mutate(OP, |table| table.register(key.clone(), binding))?;
        tracing::info!(route = %key, %protocol, "registered route group");
        Ok(())
    }

    pub fn stack_route(&self, key: &RouteKey, binding: RouteBinding) -> Result<Stacked, RouteError> {
        const OP: &str = "stack_route";
        let protocol = binding.protocol;
        let outcome = self.mutate(OP, |table| table.stack(key, binding))?;
        match outcome {
            Stacked::Added => tracing::info!(route = %key, %protocol, "stacked binding"),
            Stacked::AlreadyBound => {
                tracing::warn!(route = %key, %protocol, "protocol already bound; stack is a no-op")
            }
        }
        Ok(outcome)
    }

    pub fn set_mode(&self, key: &RouteKey, mode: RouteMode) -> Result<(), RouteError> {
        const OP: &str = "set_mode";
        self.mutate(OP, |table| table.set_mode(key, mode))?;
        tracing::info!(route = %key, %mode, "set route group mode");
        Ok(())
    }

    pub fn unstack_route(&self, key: &RouteKey, protocol: Protocol) -> Result<Unstacked, RouteError> {
        const OP: &str = "unstack_route";
        let outcome = self.mutate(OP, |table| table.unstack(key, protocol))?;
        match outcome {
            Unstacked::Remaining(n) => {
                tracing::info!(route = %key, %protocol, remaining = n, "unstacked binding")
            }
            Unstacked::GroupDeleted => {
                tracing::info!(route = %key, %protocol, "unstacked last binding; group deleted")
            }
        }
        Ok(outcome)
    }

    /// Delete the group unconditionally. Returns whether one existed.
    pub fn clear_routes(&self, key: &RouteKey) -> Result<bool, RouteError> {
        const OP: &str = "clear_routes";
        let removed = self.mutate(OP, |table| Ok(table.clear(key)))?;
        tracing::info!(route = %key, existed = removed.is_some(), "cleared route group");
        Ok(removed.is_some())
    }

    /// Current groups, optionally for one service, re-read from the store.
    pub fn list_routes(&self, service: Option<&str>) -> Result<Vec<(RouteKey, RouteGroup)>, RouteError> {
        let table = self.store.load().map_err(|e| e.during("list_routes"))?;
        Ok(table
            .list(service)
            .into_iter()
            .map(|(k, g)| (k.clone(), g.clone()))
            .collect())
    }

    /// Make sure `binding.protocol` is bound on `key`, registering or
    /// stacking as the current state requires. An existing binding for the
    /// protocol is left as is, even if it points at a different instance.
    pub fn ensure_route(&self, key: &RouteKey, binding: RouteBinding) -> Result<Converged, RouteError> {
        const OP: &str = "ensure_route";
        let protocol = binding.protocol;
        let outcome = self.mutate(OP, |table| {
            let bound = table.get(key).map(|g| g.binding(protocol).is_some());
            match bound {
                None => table.register(key.clone(), binding).map(|_| Converged::Registered),
                Some(true) => Ok(Converged::AlreadyBound),
                Some(false) => table.stack(key, binding).map(|_| Converged::Stacked),
            }
        })?;
        tracing::info!(route = %key, %protocol, ?outcome, "converged route");
        Ok(outcome)
    }

    /// Load, apply, and save only if `apply` succeeded.
    fn mutate<T>(
        &self,
        operation: &str,
        apply: impl FnOnce(&mut RoutingTable) -> Result<T, RouteError>,
    ) -> Result<T, RouteError> {
        let mut table = self.store.load().map_err(|e| e.during(operation))?;
        let before = table.clone();
        let result = apply(&mut table)?;
        if table != before {
            self.store.save(&table).map_err(|e| e.during(operation))?;
        }
        Ok(result)
    }
}
