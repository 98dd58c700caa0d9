use crate::resource::InvalidResourceError;

use std::fmt::{self, Display};

/// All the ways a reconciliation pass can fail. Only `NotFound` is ever handled inline by the
/// engine; every other variant aborts the remaining steps of the pass and is returned to the
/// caller, whose requeue policy decides what happens next.
#[derive(Debug)]
pub enum Error {
    /// The requested object does not exist. Stores produce this, but the engine absorbs it
    NotFound(String),
    /// A create collided with an object that already exists
    AlreadyExists(String),
    /// The expected resourceVersion did not match the stored one. The pass must be re-run
    /// against a freshly fetched object
    Conflict(String),
    /// The store could not be reached or failed to respond
    Transient(String),
    /// A stored object could not be (de)serialized
    Serde(serde_json::Error),
    /// A stored object is missing required metadata
    InvalidResource(InvalidResourceError),
    /// The owner's kind could not be resolved when building an owner reference
    UnresolvedOwnerType(String),
    /// The pass was aborted by a caller-supplied cancellation signal or timeout
    Cancelled,
}

impl Error {
    /// Returns true if re-running the whole pass later may succeed. Fatal errors are
    /// still returned to the runtime, which may choose to retry them anyway.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::AlreadyExists(_)
            | Error::Conflict(_)
            | Error::Transient(_)
            | Error::Cancelled => true,
            Error::NotFound(_)
            | Error::Serde(_)
            | Error::InvalidResource(_)
            | Error::UnresolvedOwnerType(_) => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotFound(id) => write!(f, "Not found: {}", id),
            Error::AlreadyExists(id) => write!(f, "Already exists: {}", id),
            Error::Conflict(id) => write!(f, "Conflicting resourceVersion for: {}", id),
            Error::Transient(msg) => write!(f, "Store error: {}", msg),
            Error::Serde(e) => write!(f, "(De)Serialization error: {}", e),
            Error::InvalidResource(e) => write!(f, "{}", e),
            Error::UnresolvedOwnerType(kind) => write!(f, "Cannot resolve owner type: '{}'", kind),
            Error::Cancelled => f.write_str("Reconciliation was cancelled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Serde(e) => Some(e as &(dyn std::error::Error + 'static)),
            Error::InvalidResource(e) => Some(e as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Serde(e)
    }
}

impl From<InvalidResourceError> for Error {
    fn from(e: InvalidResourceError) -> Error {
        Error::InvalidResource(e)
    }
}
