use thiserror::Error;

use crate::definition::{DefinitionKind, ExpectedKind};
use crate::dependency::UnresolvedReport;
use crate::namespace::CanonicalName;

/// Errors raised while building definitions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Anonymous {kind} was never attached under a namespaced parent")]
    DanglingAnonymous { kind: DefinitionKind },

    #[error("{field} of '{owner}' must point to a {expected} but '{reference}' is a {actual}")]
    KindMismatch {
        owner: CanonicalName,
        field: &'static str,
        reference: CanonicalName,
        expected: ExpectedKind,
        actual: DefinitionKind,
    },

    #[error("Duplicate canonical name: {0}")]
    DuplicateName(CanonicalName),

    #[error("Literal {value} in {owner} cannot be encoded: floats must be finite")]
    NonFiniteLiteral { owner: String, value: String },

    #[error("Metadata '{metadata}' has no field named '{field}'")]
    UnknownMetadataField {
        metadata: CanonicalName,
        field: String,
    },
}

/// Errors raised while flattening a sheet into its compact form
#[derive(Error, Debug)]
pub enum CompactError {
    #[error("Two distinct definitions share the canonical name '{0}'")]
    DuplicateCanonicalName(CanonicalName),

    #[error("Anonymous {kind} in the toplevel namespace has no addressable name")]
    DanglingAnonymous { kind: DefinitionKind },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Hard errors raised while inflating compact definitions
///
/// A reference that is merely not resolvable yet is not an error; see
/// [`crate::inflate::Resolution::Unresolved`].
#[derive(Error, Debug)]
pub enum InflateError {
    #[error("{field} of '{node}' must point to a {expected} but '{reference}' is a {actual}")]
    KindMismatch {
        node: CanonicalName,
        field: &'static str,
        reference: CanonicalName,
        expected: ExpectedKind,
        actual: DefinitionKind,
    },

    #[error("Metadata usage on '{node}' sets '{field}' which '{metadata}' does not declare")]
    UnknownMetadataField {
        node: CanonicalName,
        metadata: CanonicalName,
        field: String,
    },

    #[error("Compact entry keyed '{key}' holds the definition '{actual}'")]
    KeyMismatch {
        key: CanonicalName,
        actual: CanonicalName,
    },

    #[error("Unresolved references:\n{0}")]
    Unresolved(Box<UnresolvedReport>),

    #[error("Gave up after {limit} sweeps with references still unresolved:\n{report}")]
    SweepLimitExceeded {
        limit: usize,
        report: Box<UnresolvedReport>,
    },
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Compact error: {0}")]
    Compact(#[from] CompactError),

    #[error("Inflate error: {0}")]
    Inflate(#[from] InflateError),
}
