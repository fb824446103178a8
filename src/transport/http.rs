// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `reqwest`-backed transport.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Url};

use crate::error::ProtocolError;
use crate::transport::{ApiRequest, ApiResponse, Method, RequestBody, Transport};

/// HTTP transport authenticating with a bearer access key.
///
/// Request paths are resolved against the base URL, under the API version
/// prefix unless the request is [unversioned](ApiRequest::unversioned).
///
/// # Examples
///
/// ```
/// use mdc_client::transport::HttpTransport;
/// use std::time::Duration;
///
/// let transport = HttpTransport::builder()
///     .access_key("secret")
///     .base_url("https://api.connector.mbed.com")
///     .timeout(Duration::from_secs(5))
///     .build()
///     .unwrap();
/// assert_eq!(transport.base_url(), "https://api.connector.mbed.com");
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    api_version: String,
    access_key: String,
    timeout: Duration,
    client: Client,
}

impl HttpTransport {
    /// Default service URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.connector.mbed.com";
    /// Default API version prefix.
    pub const DEFAULT_API_VERSION: &'static str = "/v2";
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a transport for the default service URL.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(access_key: impl Into<String>) -> Result<Self, ProtocolError> {
        Self::builder().access_key(access_key).build()
    }

    /// Returns a builder.
    #[must_use]
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Returns the base URL, without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the API version prefix.
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Builds the absolute URL of a request, without query.
    fn build_url(&self, request: &ApiRequest) -> String {
        let prefix = if request.is_versioned() {
            self.api_version.as_str()
        } else {
            ""
        };
        format!("{}{prefix}{}", self.base_url, request.path())
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ProtocolError> {
        let url = self.build_url(request);

        tracing::debug!(method = %request.method(), url = %url, "Sending HTTP request");

        let mut builder = match request.method() {
            Method::Get => self.client.get(&url),
            Method::Put => self.client.put(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        }
        .bearer_auth(&self.access_key)
        .header(ACCEPT, "application/json");

        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        if let Some(timeout) = request.timeout() {
            builder = builder.timeout(timeout);
        }
        builder = match request.body() {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Text(text)) => {
                builder.header(CONTENT_TYPE, "text/plain").body(text.clone())
            }
            None => builder,
        };

        let timeout = request.timeout().unwrap_or(self.timeout);
        let response = builder.send().await.map_err(|e| map_send_error(e, timeout))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(ProtocolError::Http)?;

        tracing::debug!(status, len = body.len(), "Received HTTP response");

        Ok(ApiResponse::new(status, body.to_vec()))
    }
}

fn map_send_error(error: reqwest::Error, timeout: Duration) -> ProtocolError {
    if error.is_timeout() {
        return ProtocolError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
    }
    if error.is_connect() {
        return ProtocolError::ConnectionFailed(error.to_string());
    }
    ProtocolError::Http(error)
}

/// Builder for [`HttpTransport`].
#[derive(Debug, Default)]
pub struct HttpTransportBuilder {
    access_key: Option<String>,
    base_url: Option<String>,
    api_version: Option<String>,
    timeout: Option<Duration>,
}

impl HttpTransportBuilder {
    /// Sets the access key sent as bearer token.
    #[must_use]
    pub fn access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self
    }

    /// Sets the service URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the API version prefix, such as `/v2`.
    #[must_use]
    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    /// Sets the default request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// Returns error if the access key is missing, the base URL is invalid, or
    /// the HTTP client cannot be created.
    pub fn build(self) -> Result<HttpTransport, ProtocolError> {
        let access_key = self
            .access_key
            .filter(|key| !key.is_empty())
            .ok_or(ProtocolError::MissingAccessKey)?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| HttpTransport::DEFAULT_BASE_URL.to_string());
        Url::parse(&base_url)
            .map_err(|e| ProtocolError::InvalidAddress(format!("{base_url}: {e}")))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let api_version = self
            .api_version
            .unwrap_or_else(|| HttpTransport::DEFAULT_API_VERSION.to_string());
        let api_version = match api_version.trim_end_matches('/') {
            "" => String::new(),
            v if v.starts_with('/') => v.to_string(),
            v => format!("/{v}"),
        };

        let timeout = self.timeout.unwrap_or(HttpTransport::DEFAULT_TIMEOUT);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(HttpTransport {
            base_url,
            api_version,
            access_key,
            timeout,
            client,
        })
    }
}
