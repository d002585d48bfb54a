//! # infragraph-error
//!
//! Unified error handling for infragraph.
//!
//! - **ErrorKind**: what went wrong (e.g. `ImmutableStore`, `ReferenceResolution`)
//! - **ErrorStatus**: whether retrying can help (Permanent, Temporary, Persistent)
//! - **Context**: key/value pairs such as the construct path or entity uuid
//! - **Source**: the wrapped foreign error, never leaked as a raw type
//!
//! ```rust
//! use infragraph_error::{Error, ErrorKind};
//!
//! fn classify(path: &str) -> Result<(), Error> {
//!     Err(Error::structural(path, "nested stack resource not found")
//!         .with_operation("collector::visit"))
//! }
//!
//! let err = classify("App/Parent/Child").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::StructuralTraversal);
//! assert_eq!(err.context_value("path"), Some("App/Parent/Child"));
//! ```
//!
//! Rules of thumb:
//!
//! - Every function returns `Result<T, infragraph_error::Error>`
//! - Foreign errors are wrapped with `set_source(err)`
//! - An error is handled once; callers further up only append context

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using infragraph Error
pub type Result<T> = std::result::Result<T, Error>;
