// policy.rs — Policy subcommands: validate, compile, publish, show, profiles.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use tg_policy::{
    validate, CompileOutput, DirectoryCatalog, DocumentSource, PolicyCompiler, PolicyError,
    ProfileResolver, RawPolicyDocument,
};

use crate::config::GovernanceConfig;

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// Check a policy document and list every finding.
    Validate {
        /// Policy document (YAML).
        document: PathBuf,
    },
    /// Compile a policy document to canonical JSON.
    Compile {
        /// Policy document (YAML).
        document: PathBuf,
        /// Write the compiled policy here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Compile a policy document and publish it to the configured store.
    Publish {
        /// Policy document (YAML).
        document: PathBuf,
    },
    /// Print the currently published policy.
    Show,
    /// List the services the profile catalog has profiles for.
    Profiles,
}

pub fn execute(cmd: &PolicyCommands, config: &GovernanceConfig) -> anyhow::Result<()> {
    match cmd {
        PolicyCommands::Validate { document } => validate_document(config, document),
        PolicyCommands::Compile { document, output } => {
            let compiled = compile_document(config, document)?;
            match output {
                Some(path) => {
                    std::fs::write(path, &compiled.serialized)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    print_stats(&compiled);
                    println!("Wrote {}", path.display());
                }
                None => println!("{}", compiled.serialized),
            }
            Ok(())
        }
        PolicyCommands::Publish { document } => {
            let compiled = compile_document(config, document)?;
            let store = config.open_policy_store()?;
            PolicyCompiler::publish(&compiled, store.as_ref())?;
            print_stats(&compiled);
            println!("Published.");
            Ok(())
        }
        PolicyCommands::Show => {
            let store = config.open_policy_store()?;
            match store.get_policy()? {
                Some(policy) => println!("{}", serde_json::to_string_pretty(&policy)?),
                None => println!("No policy has been published."),
            }
            Ok(())
        }
        PolicyCommands::Profiles => {
            let resolver = resolver(config);
            let services = resolver.available_services()?;
            if services.is_empty() {
                println!("No profiles in {}", config.catalog_dir().display());
            }
            for service in services {
                println!("{}", service);
            }
            Ok(())
        }
    }
}

fn resolver(config: &GovernanceConfig) -> ProfileResolver {
    ProfileResolver::new(DirectoryCatalog::new(config.catalog_dir()))
}

fn validate_document(config: &GovernanceConfig, path: &Path) -> anyhow::Result<()> {
    let full = config.resolve(path);
    let raw = RawPolicyDocument::from_file(&full)?;
    let findings = validate(&raw);
    if findings.is_empty() {
        println!("{}: valid", full.display());
        return Ok(());
    }
    for finding in &findings {
        println!("  {}", finding);
    }
    anyhow::bail!("{}: {} finding(s)", full.display(), findings.len())
}

fn compile_document(config: &GovernanceConfig, path: &Path) -> anyhow::Result<CompileOutput> {
    let full = config.resolve(path);
    let mut resolver = resolver(config);
    match PolicyCompiler::process_document(DocumentSource::File(&full), &mut resolver) {
        Ok(output) => Ok(output),
        Err(PolicyError::Validation(err)) => {
            for finding in &err.findings {
                eprintln!("  {}", finding);
            }
            Err(err).with_context(|| format!("{} was not compiled", full.display()))
        }
        Err(e) => Err(e.into()),
    }
}

fn print_stats(compiled: &CompileOutput) {
    let stats = &compiled.stats;
    println!(
        "{} tool annotation(s), {} classifier tool(s), {} policy rule(s)",
        stats.tool_annotations, stats.classifier_tools, stats.policy_rules
    );
    println!("{} bytes, sha256 {}", stats.serialized_bytes, stats.sha256);
}
