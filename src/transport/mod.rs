// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP transport used by the client and the long-poll channel.
//!
//! The core never talks to the network directly. It builds an [`ApiRequest`]
//! and hands it to a [`Transport`], which returns the status code and raw
//! body. Authentication is the transport's business.
//!
//! # Implementations
//!
//! - [`HttpTransport`]: `reqwest`-backed, bearer-token authenticated
//!   (requires the `http` feature)
//!
//! Tests and embedders can provide their own implementation.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{HttpTransport, HttpTransportBuilder};

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::error::ProtocolError;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `PUT`
    Put,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Returns the method name in upper case.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Sent as `application/json`.
    Json(Value),
    /// Sent verbatim as `text/plain`.
    Text(String),
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// A request against the REST API, relative to the service base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
    versioned: bool,
    timeout: Option<Duration>,
}

impl ApiRequest {
    /// Creates a request for `path` under the API version prefix.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            versioned: true,
            timeout: None,
        }
    }

    /// Creates a `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Creates a `PUT` request.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// Creates a `POST` request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Creates a `DELETE` request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Addresses the path without the API version prefix.
    #[must_use]
    pub fn unversioned(mut self) -> Self {
        self.versioned = false;
        self
    }

    /// Overrides the transport's default timeout for this request.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the path, relative to the base URL or version prefix.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the query parameters in insertion order.
    #[must_use]
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Returns the body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Returns whether the path sits under the API version prefix.
    #[must_use]
    pub fn is_versioned(&self) -> bool {
        self.versioned
    }

    /// Returns the per-request timeout, if overridden.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Status code and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: u16,
    body: Vec<u8>,
}

impl ApiResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consumes the response and returns the body.
    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the body cannot be parsed into the target type.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, crate::error::ParseError> {
        serde_json::from_slice(&self.body).map_err(Into::into)
    }
}

/// Executes requests against the REST API.
///
/// Any status code is a successful execution; classifying it is up to the
/// caller. Errors are reserved for requests that produced no response.
pub trait Transport: Send + Sync + 'static {
    /// Executes one request.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request could not be sent or the
    /// response could not be read.
    fn execute(
        &self,
        request: &ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, ProtocolError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let request = ApiRequest::get("/limits");
        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.path(), "/limits");
        assert!(request.is_versioned());
        assert!(request.query().is_empty());
        assert!(request.body().is_none());
        assert!(request.timeout().is_none());
    }

    #[test]
    fn request_builder_chain() {
        let request = ApiRequest::put("/notification/callback")
            .unversioned()
            .with_query("noResp", "true")
            .with_body(RequestBody::Text("on".to_string()))
            .with_timeout(Duration::from_secs(3));

        assert!(!request.is_versioned());
        assert_eq!(request.query(), &[("noResp".to_string(), "true".to_string())]);
        assert_eq!(request.body(), Some(&RequestBody::Text("on".to_string())));
        assert_eq!(request.timeout(), Some(Duration::from_secs(3)));
        assert_eq!(request.to_string(), "PUT /notification/callback");
    }

    #[test]
    fn response_json_body() {
        let response = ApiResponse::new(202, br#"{"async-response-id":"T1"}"#.to_vec());
        let value: Value = response.json().unwrap();
        assert_eq!(value["async-response-id"], "T1");
        assert_eq!(response.status(), 202);
    }
}
