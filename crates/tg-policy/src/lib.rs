//! # tg-policy
//!
//! Security policy compiler for Tool Governance.
//!
//! Turns an operator-authored policy document into one canonical
//! [`MergedSecurityPolicy`]: community profiles are imported by reference,
//! operator overrides are merged field by field, tenant variables are
//! substituted into classifier patterns, and the result is serialized for
//! publication to a [`PolicyStore`].
//!
//! ## Key invariants
//!
//! - **All-or-nothing validation**: a document with any finding is never
//!   merged, serialized or published. Every finding is reported at once.
//! - **Fixed precedence**: profiles seed, overrides replace per field,
//!   classifier overrides replace whole lists, interpolation runs last.
//! - **Deterministic output**: the same document and catalog state always
//!   serialize to the same bytes.

pub mod compiler;
pub mod document;
pub mod error;
pub mod interpolate;
pub mod merger;
pub mod model;
pub mod profile;
pub mod store;
pub mod validator;
pub mod vocabulary;

pub use compiler::{CompileOutput, CompileStats, DocumentSource, PolicyCompiler};
pub use document::RawPolicyDocument;
pub use error::{Finding, PolicyError, ProfileError, TransportError, ValidationError};
pub use interpolate::{interpolate, Interpolate, TenantVars};
pub use merger::{merge, MergedSecurityPolicy, ToolAnnotation};
pub use model::{
    ClassifierRule, MatchMode, Matcher, PolicyDocument, PolicyRule, RuleAction, RuleCondition,
    ToolOverride,
};
pub use profile::{
    CommunityProfile, DirectoryCatalog, InMemoryCatalog, ProfileCatalog, ProfileId,
    ProfileResolver, ProfileTool,
};
pub use store::{FilePolicyStore, HttpPolicyStore, MemoryPolicyStore, PolicyStore};
pub use validator::{check, validate};
pub use vocabulary::{Hint, Label, Verb};
