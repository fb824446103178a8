// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `mdc_client` library.
//!
//! Two families of errors exist:
//!
//! - [`Error`] and its sources ([`ProtocolError`], [`ParseError`],
//!   [`MalformedBatchError`]) are returned from fallible library calls such as
//!   building a client or starting the notification channel.
//! - [`RequestError`] describes why one remote operation failed. It is never
//!   returned directly: it is stored in the operation's
//!   [`PendingResult`](crate::PendingResult) and read through `error()` or
//!   `outcome()`.

use std::fmt;

use thiserror::Error;

use crate::operation::{self, Operation};

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during protocol communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing a response.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The client configuration is incomplete or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The notification channel needs a tokio runtime and none is running.
    #[error("no tokio runtime available to run the notification channel")]
    RuntimeUnavailable,
}

/// Errors related to the HTTP transport.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection to the service failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// No access key was configured.
    #[error("access key is required")]
    MissingAccessKey,
}

/// Errors related to decoding service payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A base64 event payload could not be decoded.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Expected field is missing from the response.
    #[error("missing field in response: {0}")]
    MissingField(String),

    /// Unexpected response format.
    #[error("unexpected response format: {0}")]
    UnexpectedFormat(String),
}

/// A notification batch that could not be decoded at all.
///
/// The dispatcher logs this and drops the batch: a malformed batch cannot be
/// attributed to any single pending request.
#[derive(Debug, Error)]
pub enum MalformedBatchError {
    /// The body is not valid JSON.
    #[error("batch is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The body is valid JSON but not an object of event collections.
    #[error("batch is not a JSON object (found {0})")]
    NotAnObject(&'static str),
}

/// Classification of a failed remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestErrorKind {
    /// The HTTP call itself failed (network, timeout).
    Transport,
    /// The service answered with a status that is neither success nor
    /// "accepted" for the operation.
    Protocol,
    /// An `async-responses` event carried an explicit error.
    Async,
    /// The response or event payload could not be decoded.
    Decode,
    /// The pending operation was abandoned before its response arrived.
    Abandoned,
}

impl fmt::Display for RequestErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Async => "async",
            Self::Decode => "decode",
            Self::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

/// Failure of a single remote operation, delivered through its
/// [`PendingResult`](crate::PendingResult).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} failed ({kind}): {message}")]
pub struct RequestError {
    kind: RequestErrorKind,
    operation: Operation,
    status_code: Option<u16>,
    message: String,
}

impl RequestError {
    /// The HTTP call for `operation` could not be completed.
    #[must_use]
    pub fn transport(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            kind: RequestErrorKind::Transport,
            operation,
            status_code: None,
            message: message.into(),
        }
    }

    /// The service answered `operation` with an unexpected status.
    ///
    /// The message is taken from the static status classification table.
    #[must_use]
    pub fn protocol(operation: Operation, status_code: u16) -> Self {
        Self {
            kind: RequestErrorKind::Protocol,
            operation,
            status_code: Some(status_code),
            message: operation::describe_status(operation, status_code).to_string(),
        }
    }

    /// An `async-responses` event for `operation` reported an error.
    ///
    /// An empty server message falls back to the classification table so the
    /// message is never empty.
    #[must_use]
    pub fn asynchronous(operation: Operation, status_code: u16, message: &str) -> Self {
        let message = if message.trim().is_empty() {
            operation::describe_status(operation, status_code).to_string()
        } else {
            message.to_string()
        };
        Self {
            kind: RequestErrorKind::Async,
            operation,
            status_code: Some(status_code),
            message,
        }
    }

    /// A payload for `operation` could not be decoded.
    #[must_use]
    pub fn decode(operation: Operation, status_code: Option<u16>, source: &ParseError) -> Self {
        Self {
            kind: RequestErrorKind::Decode,
            operation,
            status_code,
            message: source.to_string(),
        }
    }

    /// The pending `operation` was removed before a response arrived.
    #[must_use]
    pub fn abandoned(operation: Operation) -> Self {
        Self {
            kind: RequestErrorKind::Abandoned,
            operation,
            status_code: None,
            message: "operation abandoned before its response arrived".to_string(),
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> RequestErrorKind {
        self.kind
    }

    /// Returns the operation that failed.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Returns the HTTP or event status code, if one was received.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_uses_classification_table() {
        let err = RequestError::protocol(Operation::GetResourceValue, 410);
        assert_eq!(err.kind(), RequestErrorKind::Protocol);
        assert_eq!(err.status_code(), Some(410));
        assert_eq!(err.message(), "Gone. Endpoint not found.");
    }

    #[test]
    fn async_error_keeps_server_message() {
        let err = RequestError::asynchronous(Operation::GetResourceValue, 410, "endpoint not found");
        assert_eq!(err.kind(), RequestErrorKind::Async);
        assert_eq!(err.message(), "endpoint not found");
    }

    #[test]
    fn async_error_without_message_falls_back() {
        let err = RequestError::asynchronous(Operation::Subscribe, 412, "");
        assert_eq!(
            err.message(),
            "Cannot make a subscription for a non-observable resource."
        );
    }

    #[test]
    fn request_error_display() {
        let err = RequestError::transport(Operation::Limits, "connection refused");
        assert_eq!(
            err.to_string(),
            "limits failed (transport): connection refused"
        );
    }

    #[test]
    fn malformed_batch_display() {
        let err = MalformedBatchError::NotAnObject("array");
        assert_eq!(err.to_string(), "batch is not a JSON object (found array)");
    }

    #[test]
    fn error_from_parse_error() {
        let parse_err = ParseError::MissingField("async-response-id".to_string());
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::Parse(ParseError::MissingField(_))));
    }
}
