//! The main Error type for infragraph.

use std::fmt;

use crate::{ErrorKind, ErrorStatus};

/// Unified error type for graph computation, mutation and I/O.
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: ErrorStatus,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    /// Create a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: ErrorStatus::for_kind(kind),
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    /// The innermost-last operation that produced this error.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// Look up the most recently attached context value for `key`.
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn temporary(mut self) -> Self {
        self.status = ErrorStatus::Temporary;
        self
    }

    pub fn permanent(mut self) -> Self {
        self.status = ErrorStatus::Permanent;
        self
    }

    /// Set the operation that caused this error.
    ///
    /// A previously set operation is kept in context as "called" so the
    /// chain of operations survives propagation.
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called", self.operation.to_string()));
        }
        self.operation = operation;
        self
    }

    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Set the source error.
    ///
    /// # Panics (debug only)
    /// Panics in debug mode if source was already set.
    pub fn set_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(Box::new(source));
        self
    }

    /// Mark as persistent after failed retries.
    pub fn persist(mut self) -> Self {
        self.status = self.status.persist();
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }
}

/// `Kind: message [operation] (key=value, ...)` on a single line, so it fits
/// both the terminal and structured log fields.
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if !self.operation.is_empty() {
            write!(f, " [{}]", self.operation)?;
        }
        if !self.context.is_empty() {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            write!(f, " ({})", pairs.join(", "))?;
        }
        Ok(())
    }
}

/// Display plus status and the wrapped cause; this is what `main` prints.
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self} <{}>", self.status)?;
        if let Some(source) = &self.source {
            write!(f, "\ncaused by: {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        };
        Error::new(kind, err.to_string())
            .with_operation("io")
            .set_source(err)
    }
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn invariant_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvariantViolation, message)
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Unknown uuid for an entity of the given kind ("node", "edge", "stack", ...).
    pub fn not_found(entity: &'static str, uuid: impl Into<String>) -> Self {
        let uuid = uuid.into();
        Self::new(
            ErrorKind::NotFound,
            format!("{entity} '{uuid}' does not exist in store"),
        )
        .with_context("uuid", uuid)
    }

    pub fn reference_resolution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReferenceResolution, message)
    }

    /// Malformed construct tree at `path`.
    pub fn structural(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StructuralTraversal, message).with_context("path", path)
    }

    pub fn immutable_store() -> Self {
        Self::new(
            ErrorKind::ImmutableStore,
            "store does not allow destructive mutations; clone it first",
        )
    }

    pub fn duplicate_attribute(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(
            ErrorKind::DuplicateAttribute,
            format!("attribute '{key}' already exists, use set_attribute to overwrite"),
        )
        .with_context("key", key)
    }

    pub fn duplicate_tag(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(
            ErrorKind::DuplicateTag,
            format!("tag '{key}' already exists, use set_tag to overwrite"),
        )
        .with_context("key", key)
    }

    pub fn not_equivalent(edge: impl Into<String>, other: impl Into<String>) -> Self {
        let edge = edge.into();
        let other = other.into();
        Self::new(
            ErrorKind::NotEquivalent,
            format!("edge '{edge}' is not equivalent to '{other}'"),
        )
        .with_context("edge", edge)
        .with_context("other", other)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedOperation, message)
    }

    pub fn serialization_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationFailed, message)
    }

    pub fn deserialization_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DeserializationFailed, message)
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(ErrorKind::FileNotFound, format!("file '{path}' not found"))
            .with_context("path", path)
    }
}
