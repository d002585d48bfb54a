//! Error status for retry logic

use strum_macros::{Display, IntoStaticStr};

use crate::ErrorKind;

/// Whether an error may go away if the operation is repeated.
///
/// Graph computation and mutation errors are always `Permanent`; only
/// artifact I/O starts out `Temporary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ErrorStatus {
    /// Don't retry without changing the input or the call site.
    #[default]
    Permanent,

    /// A retry may succeed (e.g. writing an artifact to a busy disk).
    Temporary,

    /// Was temporary, kept failing after retries.
    Persistent,
}

impl ErrorStatus {
    /// Default status for a freshly created error of `kind`.
    pub fn for_kind(kind: ErrorKind) -> Self {
        if kind.is_retryable() {
            ErrorStatus::Temporary
        } else {
            ErrorStatus::Permanent
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorStatus::Temporary)
    }

    /// Mark as persistent after failed retries
    pub fn persist(self) -> Self {
        match self {
            ErrorStatus::Temporary => ErrorStatus::Persistent,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}
