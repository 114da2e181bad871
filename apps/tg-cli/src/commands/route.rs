// route.rs — Route subcommands: register, stack, unstack, mode, clear, list, ensure.

use clap::{Args, Subcommand};
use tg_routing::{
    Converged, FileRoutingStore, Protocol, RouteBinding, RouteKey, RouteManager, RouteMode,
    Stacked, Unstacked,
};

use crate::config::GovernanceConfig;

/// A `(service, tool)` route key; `tool` may be `*`.
#[derive(Args)]
pub struct KeyArgs {
    /// Service name (e.g., "gmail").
    service: String,
    /// Tool name, or "*" for every tool of the service.
    tool: String,
}

impl KeyArgs {
    fn key(&self) -> RouteKey {
        RouteKey::new(&self.service, &self.tool)
    }
}

#[derive(Args)]
pub struct BindingArgs {
    #[command(flatten)]
    key: KeyArgs,
    /// Governance protocol (approval, rate-limit, constraint, precondition, flow, identity).
    #[arg(long)]
    protocol: Protocol,
    /// Reference to the protocol instance holding the check's state.
    #[arg(long)]
    instance: String,
    /// Endpoint the enforcement layer calls for this instance.
    #[arg(long)]
    endpoint: String,
}

impl BindingArgs {
    fn binding(&self) -> RouteBinding {
        RouteBinding::new(self.protocol, &self.instance, &self.endpoint)
    }
}

#[derive(Subcommand)]
pub enum RouteCommands {
    /// Create a route group with its first check.
    Register(BindingArgs),
    /// Add a check to an existing route group.
    Stack(BindingArgs),
    /// Remove one protocol's check from a route group.
    Unstack {
        #[command(flatten)]
        key: KeyArgs,
        #[arg(long)]
        protocol: Protocol,
    },
    /// Set how a multi-check group combines its checks.
    Mode {
        #[command(flatten)]
        key: KeyArgs,
        /// "all" (every check must approve) or "any" (one suffices).
        mode: RouteMode,
    },
    /// Delete a route group.
    Clear {
        #[command(flatten)]
        key: KeyArgs,
    },
    /// List route groups.
    List {
        /// Only groups of this service.
        #[arg(long)]
        service: Option<String>,
    },
    /// Register or stack as needed so the protocol is bound.
    Ensure(BindingArgs),
}

pub fn execute(cmd: &RouteCommands, config: &GovernanceConfig) -> anyhow::Result<()> {
    let manager = RouteManager::new(FileRoutingStore::new(config.routes_table()));

    match cmd {
        RouteCommands::Register(args) => {
            let key = args.key.key();
            manager.register_route(key.clone(), args.binding())?;
            println!("Registered {} on {}", args.protocol, key);
        }
        RouteCommands::Stack(args) => {
            let key = args.key.key();
            match manager.stack_route(&key, args.binding())? {
                Stacked::Added => println!("Stacked {} on {}", args.protocol, key),
                Stacked::AlreadyBound => {
                    println!("{} already bound on {}; unchanged", args.protocol, key)
                }
            }
        }
        RouteCommands::Unstack { key, protocol } => {
            let key = key.key();
            match manager.unstack_route(&key, *protocol)? {
                Unstacked::Remaining(n) => {
                    println!("Removed {} from {} ({} check(s) remain)", protocol, key, n)
                }
                Unstacked::GroupDeleted => {
                    println!("Removed {} from {}; group deleted", protocol, key)
                }
            }
        }
        RouteCommands::Mode { key, mode } => {
            let key = key.key();
            manager.set_mode(&key, *mode)?;
            println!("{} now combines with mode {}", key, mode);
        }
        RouteCommands::Clear { key } => {
            let key = key.key();
            if manager.clear_routes(&key)? {
                println!("Cleared {}", key);
            } else {
                println!("No route group for {}", key);
            }
        }
        RouteCommands::List { service } => {
            let groups = manager.list_routes(service.as_deref())?;
            if groups.is_empty() {
                println!("No route groups.");
                return Ok(());
            }
            println!("{:<32} {:<8} CHECKS", "ROUTE", "MODE");
            println!("{}", "-".repeat(80));
            for (key, group) in groups {
                let checks: Vec<String> = group
                    .bindings()
                    .iter()
                    .map(|b| format!("{}={}", b.protocol, b.instance_ref))
                    .collect();
                println!(
                    "{:<32} {:<8} {}",
                    key.to_string(),
                    group.mode().to_string(),
                    checks.join(", ")
                );
            }
        }
        RouteCommands::Ensure(args) => {
            let key = args.key.key();
            let outcome = manager.ensure_route(&key, args.binding())?;
            let verb = match outcome {
                Converged::Registered => "registered",
                Converged::Stacked => "stacked",
                Converged::AlreadyBound => "already bound",
            };
            println!("{} on {}: {}", args.protocol, key, verb);
        }
    }

    Ok(())
}
