//! Caller-facing error taxonomy.

use thiserror::Error;

/// Stable classification every caller-visible error maps onto.
///
/// Callers branch on the kind, never on message text. The HTTP layer turns a
/// kind into a status code; nothing below it knows about HTTP.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The resource already exists (duplicate identity, already activated).
    Conflict,

    /// Malformed input: invalid email, password policy, request shape.
    Validation,

    /// The referenced identity/record does not exist.
    NotFound,

    /// The request is well formed but the current state forbids it
    /// (account not activated yet, role id absent from the catalog snapshot).
    PreconditionFailed,

    /// Credentials or session token were rejected.
    Unauthenticated,

    /// Authenticated, but the role is not allowed for the operation.
    Authorization,

    /// Anything the caller cannot act on. Details stay in the logs.
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code (used as the `error` field of JSON bodies).
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Authorization => "forbidden",
            ErrorKind::Internal => "internal",
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, ErrorKind::Internal)
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

/// An identifier failed to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {reason}")]
pub struct InvalidId {
    pub kind: &'static str,
    pub reason: String,
}

impl InvalidId {
    pub fn new(kind: &'static str, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}
