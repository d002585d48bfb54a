//! Error kinds for infragraph operations

use strum_macros::{Display, IntoStaticStr};

/// The kind of error that occurred.
///
/// Callers match on `ErrorKind` to tell contract violations (mutating a
/// shared store, consuming unrelated edges) apart from data problems
/// (an unresolvable reference, a malformed construct tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, Display)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// Invalid configuration or parameters
    ConfigInvalid,

    /// Invalid argument passed to function
    InvalidArgument,

    /// Internal bookkeeping of the store is inconsistent
    InvariantViolation,

    // =========================================================================
    // Lookup errors
    // =========================================================================
    /// Unknown node, edge, stack or stage uuid
    NotFound,

    /// A reference target could not be matched to a graph node
    ReferenceResolution,

    // =========================================================================
    // Computation errors
    // =========================================================================
    /// The construct tree is malformed or violates a classification rule
    StructuralTraversal,

    // =========================================================================
    // Mutation errors
    // =========================================================================
    /// Destructive mutation attempted on a store that was not cloned for it
    ImmutableStore,

    /// `add_attribute` called with an existing key
    DuplicateAttribute,

    /// `add_tag` called with an existing key
    DuplicateTag,

    /// Attempted to consume an edge that is not equivalent
    NotEquivalent,

    /// Operation not supported for this node variant (e.g. mutating the root)
    UnsupportedOperation,

    // =========================================================================
    // File/IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    // =========================================================================
    // Serialization errors
    // =========================================================================
    /// Serialization failed
    SerializationFailed,

    /// Deserialization failed
    DeserializationFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::IoFailed)
    }

    /// Errors raised by the mutation guards. These always indicate caller
    /// misuse of the store API.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ErrorKind::ImmutableStore
                | ErrorKind::DuplicateAttribute
                | ErrorKind::DuplicateTag
                | ErrorKind::NotEquivalent
                | ErrorKind::UnsupportedOperation
        )
    }
}
