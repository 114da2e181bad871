// access.rs — `tg access`: effective checks for a set of grants.

use anyhow::Context;
use clap::Args;
use tg_routing::{
    compute_effective_checks, FileRoutingStore, Grant, RouteSource, RoutingStore, ServiceCatalog,
    StaticInstanceDirectory,
};

use crate::config::GovernanceConfig;

#[derive(Args)]
pub struct AccessArgs {
    /// Granted tool as "service/tool" ("service/*" for every enabled tool). Repeatable.
    #[arg(long = "grant", required = true, value_parser = parse_grant)]
    grants: Vec<Grant>,

    /// Emit the report as JSON.
    #[arg(long)]
    json: bool,
}

fn parse_grant(raw: &str) -> Result<Grant, String> {
    match raw.split_once('/') {
        Some((service, tool)) if !service.is_empty() && !tool.is_empty() => {
            Ok(Grant::new(service, tool))
        }
        _ => Err(format!("expected service/tool, got '{}'", raw)),
    }
}

pub fn execute(args: &AccessArgs, config: &GovernanceConfig) -> anyhow::Result<()> {
    let table = FileRoutingStore::new(config.routes_table()).load()?;

    let services_file = config.services_file();
    let catalog = if services_file.exists() {
        ServiceCatalog::from_yaml_file(&services_file)
            .with_context(|| format!("failed to load {}", services_file.display()))?
    } else {
        tracing::debug!(path = %services_file.display(), "no service catalog; wildcard grants expand to nothing");
        ServiceCatalog::new()
    };

    let instances_file = config.instances_file();
    let directory = if instances_file.exists() {
        StaticInstanceDirectory::from_yaml_file(&instances_file)
            .with_context(|| format!("failed to load {}", instances_file.display()))?
    } else {
        StaticInstanceDirectory::new()
    };

    let report = compute_effective_checks(&args.grants, &table, &catalog, &directory)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.is_empty() {
        println!("No tools granted.");
        return Ok(());
    }
    for access in &report {
        println!("{}/{}", access.service, access.tool);
        if access.is_unguarded() {
            println!("  (no checks)");
        }
        for check in &access.checks {
            let from = match check.source {
                RouteSource::Tool => "tool",
                RouteSource::Wildcard => "wildcard",
            };
            println!(
                "  {:<13} {:<24} {:<9} mode={}",
                check.protocol.to_string(),
                check.instance_ref,
                from,
                check.group_mode
            );
            if let Some(params) = &check.parameters {
                println!("  {:<13} {}", "", serde_json::to_string(params)?);
            }
        }
    }

    Ok(())
}
