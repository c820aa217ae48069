//! Error types for the ADT client core.
//!
//! # Design
//! Failures are classified, never swallowed. A non-2xx response whose body is
//! a structured ADT exception becomes `Adt` so callers can special-case known
//! remote conditions (e.g. "resource already exists"); every other non-2xx
//! response lands in `HttpRequest` with the raw status code and body.
//! `UnexpectedResponseContent` covers the case where the status is fine but
//! the server answered with a content type the caller did not ask for.

use thiserror::Error;

/// Errors returned by the marshalling engine and the connection layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The XML text could not be parsed.
    #[error("XML parse error: {0}")]
    Parse(String),

    /// An object graph could not be rendered as XML.
    #[error("XML serialization failed: {0}")]
    Serialization(String),

    /// The server returned a structured ADT exception payload.
    #[error("{type_id}: {message}")]
    Adt {
        namespace: String,
        type_id: String,
        message: String,
    },

    /// The server returned a non-2xx status without a recognizable
    /// exception payload.
    #[error("HTTP {status}: {body}")]
    HttpRequest { status: u16, body: String },

    /// The response status was successful but its content type is not one
    /// of the requested candidates.
    #[error("Unexpected Content-Type: {content_type} with: {body}")]
    UnexpectedResponseContent { content_type: String, body: String },

    /// The request never produced an HTTP response (DNS, TLS, socket, ...).
    #[error("transport failure: {0}")]
    Transport(String),

    /// A lock response did not carry a `LOCK_HANDLE`.
    #[error("lock response does not contain LOCK_HANDLE: {0}")]
    MissingLockHandle(String),

    /// The object type does not provide a source editor.
    #[error("object type {0} cannot be edited")]
    NoEditor(String),

    /// The connection configuration is incomplete or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    pub(crate) fn parse(err: impl std::fmt::Display) -> Self {
        ApiError::Parse(err.to_string())
    }

    pub(crate) fn serialization(err: impl std::fmt::Display) -> Self {
        ApiError::Serialization(err.to_string())
    }

    /// True when this is a structured ADT exception of the given type id,
    /// e.g. `ExceptionResourceAlreadyExists`.
    pub fn is_adt_type(&self, id: &str) -> bool {
        matches!(self, ApiError::Adt { type_id, .. } if type_id == id)
    }
}

/// Result type for ADT client operations.
pub type Result<T> = std::result::Result<T, ApiError>;
