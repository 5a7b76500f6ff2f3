//! Error types for the USPS client core.
//!
//! # Design
//! Only configuration-level problems are returned as `Err`: an unknown API
//! code, an unusable endpoint, a request document that cannot be encoded, or
//! reuse of a spent request. Everything that can go wrong *after* the request
//! leaves (transport failure, undecodable body, an API `Error` node) is
//! recorded on the `Outcome` and inspected through `is_success()` and the
//! error accessors. Whitelist violations on records are `FieldDiagnostic`s,
//! which are logged and collected but never fail the caller.

use std::fmt;

use thiserror::Error;

/// Errors returned to the caller before or instead of a network exchange.
#[derive(Debug, Error)]
pub enum UspsError {
    /// The API code is not in the fixed API-code table.
    #[error("unknown API code `{0}`")]
    UnknownApi(String),

    /// A live or test endpoint URL could not be parsed.
    #[error("invalid endpoint `{url}`: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// A required environment variable is not set.
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    /// An environment variable is set to something unusable.
    #[error("invalid configuration for {var}: {value}")]
    InvalidConfig { var: &'static str, value: String },

    /// The request tree could not be rendered as XML.
    #[error("failed to encode request: {0}")]
    Encode(#[from] CodecError),

    /// `execute` was called on a request that has already been sent.
    #[error("request has already been executed")]
    AlreadyExecuted,
}

/// Failures of the XML codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("xml encode failed: {0}")]
    Encode(String),

    #[error("xml decode failed: {0}")]
    Decode(String),
}

/// Category of a network-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    HostNotFound,
    ConnectionFailed,
    Timeout,
    Io,
    Other,
}

impl TransportErrorKind {
    /// Stable numeric code reported as the outcome's error code.
    pub const fn code(self) -> i32 {
        match self {
            TransportErrorKind::HostNotFound => 6,
            TransportErrorKind::ConnectionFailed => 7,
            TransportErrorKind::Timeout => 28,
            TransportErrorKind::Io => 56,
            TransportErrorKind::Other => 1,
        }
    }
}

/// A network, connection or timeout failure. Captured on the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error {code}: {message}", code = .kind.code())]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub const fn code(&self) -> i32 {
        self.kind.code()
    }
}

/// Which record accessor produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Set,
    Get,
}

impl fmt::Display for FieldOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldOp::Set => f.write_str("set"),
            FieldOp::Get => f.write_str("get"),
        }
    }
}

/// A read or write of a field outside a record's whitelist.
///
/// Non-fatal: the write is dropped, the read yields no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiagnostic {
    pub record: &'static str,
    pub field: String,
    pub op: FieldOp,
}

impl fmt::Display for FieldDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "undefined field via {}: {} on {}",
            self.op, self.field, self.record
        )
    }
}
