// compiler.rs — Compile pipeline: load → validate → merge → serialize.
//
// The pipeline never produces a merged policy from a document with any
// validation finding. Publishing is a separate, explicit call so operators
// can review the stats (and the serialized form) before anything leaves
// the process.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::document::RawPolicyDocument;
use crate::error::PolicyError;
use crate::merger::{merge, MergedSecurityPolicy};
use crate::profile::ProfileResolver;
use crate::store::PolicyStore;
use crate::validator;

/// Where the raw document comes from.
#[derive(Debug, Clone, Copy)]
pub enum DocumentSource<'a> {
    /// A YAML or JSON file on local storage.
    File(&'a Path),
    /// Document text already in memory.
    Text(&'a str),
}

/// Summary of a compile, for operator review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileStats {
    pub tool_annotations: usize,
    pub classifier_tools: usize,
    pub policy_rules: usize,
    /// Size of the canonical serialized form in bytes.
    pub serialized_bytes: usize,
    /// Hex SHA-256 of the canonical serialized form.
    pub sha256: String,
    /// Not part of the canonical form.
    pub compiled_at: DateTime<Utc>,
}

/// A successful compile: the merged policy, its wire form, and stats.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub merged: MergedSecurityPolicy,
    pub serialized: String,
    pub stats: CompileStats,
}

/// Serialize a merged policy to its canonical wire form.
///
/// Every map in the policy is ordered, so equal policies serialize to
/// identical bytes.
pub fn to_canonical_json(policy: &MergedSecurityPolicy) -> Result<String, PolicyError> {
    Ok(serde_json::to_string_pretty(policy)?)
}

/// Hex SHA-256 digest of a serialized policy.
pub fn digest(serialized: &str) -> String {
    format!("{:x}", Sha256::digest(serialized.as_bytes()))
}

/// The compile pipeline.
pub struct PolicyCompiler;

impl PolicyCompiler {
    /// Load, validate, merge and serialize a policy document.
    pub fn process_document(
        source: DocumentSource<'_>,
        resolver: &mut ProfileResolver,
    ) -> Result<CompileOutput, PolicyError> {
        let raw = match source {
            DocumentSource::File(path) => {
                tracing::info!(path = %path.display(), "loading policy document");
                RawPolicyDocument::from_file(path)?
            }
            DocumentSource::Text(text) => RawPolicyDocument::from_yaml(text)?,
        };
        Self::compile(&raw, resolver)
    }

    /// Validate, merge and serialize an already-parsed document.
    pub fn compile(
        raw: &RawPolicyDocument,
        resolver: &mut ProfileResolver,
    ) -> Result<CompileOutput, PolicyError> {
        // Step 1: validation is all-or-nothing.
        let document = validator::check(raw)?;

        // Step 2: resolve profiles, failing fast.
        let profiles = resolver.resolve_all(&document.profiles)?;

        // Step 3: merge.
        let merged = merge(&document, &profiles, &document.tenant_vars);

        // Step 4: canonical serialization and stats.
        let serialized = to_canonical_json(&merged)?;
        let stats = CompileStats {
            tool_annotations: merged.tool_annotation_count(),
            classifier_tools: merged.classifier_tool_count(),
            policy_rules: merged.policy_rules.len(),
            serialized_bytes: serialized.len(),
            sha256: digest(&serialized),
            compiled_at: Utc::now(),
        };

        tracing::info!(
            profiles = profiles.len(),
            tool_annotations = stats.tool_annotations,
            classifier_tools = stats.classifier_tools,
            policy_rules = stats.policy_rules,
            bytes = stats.serialized_bytes,
            "compiled security policy"
        );

        Ok(CompileOutput {
            merged,
            serialized,
            stats,
        })
    }

    /// Publish a compiled policy, replacing whatever the store held.
    pub fn publish(output: &CompileOutput, store: &dyn PolicyStore) -> Result<(), PolicyError> {
        store.set_policy(&output.merged)?;
        tracing::info!(sha256 = %output.stats.sha256, "published security policy");
        Ok(())
    }
}
