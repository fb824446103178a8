// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client configuration.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use crate::channel::{NotificationMode, PollSettings};
use crate::error::{Error, Result};
use crate::operation::{Operation, StatusPolicy};

/// Environment variable holding the access key.
pub const ENV_ACCESS_KEY: &str = "MDC_ACCESS_KEY";
/// Environment variable overriding the service URL.
pub const ENV_BASE_URL: &str = "MDC_BASE_URL";

/// Configuration of a [`Client`](crate::Client).
///
/// # Examples
///
/// ```
/// use mdc_client::{ClientConfig, NotificationMode, Operation};
/// use std::time::Duration;
///
/// let config = ClientConfig::new("access-key")
///     .with_base_url("https://connector.example.com")
///     .with_request_timeout(Duration::from_secs(5))
///     .with_mode(NotificationMode::Webhook)
///     .with_success_codes(Operation::DeleteAllSubscriptions, &[204]);
///
/// assert_eq!(config.mode(), NotificationMode::Webhook);
/// assert_eq!(
///     config.policy(Operation::DeleteAllSubscriptions).success_codes(),
///     &[204]
/// );
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    access_key: String,
    base_url: String,
    api_version: String,
    request_timeout: Duration,
    poll: PollSettings,
    mode: NotificationMode,
    success_overrides: HashMap<Operation, Vec<u16>>,
}

impl ClientConfig {
    /// Default service URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.connector.mbed.com";
    /// Default API version prefix.
    pub const DEFAULT_API_VERSION: &'static str = "/v2";
    /// Default timeout of REST requests.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new(access_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            api_version: Self::DEFAULT_API_VERSION.to_string(),
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            poll: PollSettings::default(),
            mode: NotificationMode::default(),
            success_overrides: HashMap::new(),
        }
    }

    /// Reads the access key and optional base URL from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `MDC_ACCESS_KEY` is unset or empty.
    pub fn from_env() -> Result<Self> {
        let access_key = env::var(ENV_ACCESS_KEY)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::Config(format!("{ENV_ACCESS_KEY} is not set")))?;

        let config = Self::new(access_key);
        Ok(match env::var(ENV_BASE_URL).ok().filter(|url| !url.is_empty()) {
            Some(url) => config.with_base_url(url),
            None => config,
        })
    }

    /// Sets the service URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the API version prefix.
    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Sets the timeout of REST requests.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the timeout of one long-poll pull.
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll = self.poll.with_timeout(timeout);
        self
    }

    /// Sets the pause after a failed pull.
    #[must_use]
    pub fn with_poll_retry_delay(mut self, delay: Duration) -> Self {
        self.poll = self.poll.with_retry_delay(delay);
        self
    }

    /// Asks the service to answer pulls immediately.
    #[must_use]
    pub fn with_no_wait(mut self, no_wait: bool) -> Self {
        self.poll = self.poll.with_no_wait(no_wait);
        self
    }

    /// Sets how notifications are delivered.
    #[must_use]
    pub fn with_mode(mut self, mode: NotificationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replaces the status codes `operation` treats as success.
    #[must_use]
    pub fn with_success_codes(mut self, operation: Operation, codes: &[u16]) -> Self {
        self.success_overrides.insert(operation, codes.to_vec());
        self
    }

    /// Returns the access key.
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Returns the service URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the API version prefix.
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Returns the timeout of REST requests.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the long-poll parameters.
    #[must_use]
    pub fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    /// Returns the delivery mode.
    #[must_use]
    pub fn mode(&self) -> NotificationMode {
        self.mode
    }

    /// Returns the status policy of `operation`, overrides applied.
    #[must_use]
    pub fn policy(&self, operation: Operation) -> StatusPolicy {
        let policy = operation.default_policy();
        match self.success_overrides.get(&operation) {
            Some(codes) => policy.with_success_codes(codes),
            None => policy,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("access_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("request_timeout", &self.request_timeout)
            .field("poll", &self.poll)
            .field("mode", &self.mode)
            .field("success_overrides", &self.success_overrides)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = ClientConfig::new("key");
        assert_eq!(config.access_key(), "key");
        assert_eq!(config.base_url(), "https://api.connector.mbed.com");
        assert_eq!(config.api_version(), "/v2");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.poll_settings().timeout(), Duration::from_secs(60));
        assert_eq!(config.poll_settings().retry_delay(), Duration::from_secs(1));
        assert!(!config.poll_settings().no_wait());
        assert_eq!(config.mode(), NotificationMode::LongPolling);
    }

    #[test]
    fn poll_settings_chain() {
        let config = ClientConfig::new("key")
            .with_poll_timeout(Duration::from_secs(30))
            .with_poll_retry_delay(Duration::from_millis(250))
            .with_no_wait(true);
        let poll = config.poll_settings();
        assert_eq!(poll.timeout(), Duration::from_secs(30));
        assert_eq!(poll.retry_delay(), Duration::from_millis(250));
        assert!(poll.no_wait());
    }

    #[test]
    fn policy_defaults_and_overrides() {
        let config = ClientConfig::new("key");
        assert_eq!(
            config.policy(Operation::DeleteAllSubscriptions).success_codes(),
            &[200, 204]
        );

        let config = config.with_success_codes(Operation::DeleteAllSubscriptions, &[204]);
        assert_eq!(
            config.policy(Operation::DeleteAllSubscriptions).success_codes(),
            &[204]
        );
        assert_eq!(config.policy(Operation::Limits).success_codes(), &[200]);
    }

    #[test]
    fn override_keeps_async_acceptance() {
        let config = ClientConfig::new("key").with_success_codes(Operation::PostResource, &[200, 201]);
        let policy = config.policy(Operation::PostResource);
        assert!(policy.accepts_async());
        assert_eq!(policy.success_codes(), &[200, 201]);
    }

    #[test]
    fn debug_redacts_access_key() {
        let rendered = format!("{:?}", ClientConfig::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
