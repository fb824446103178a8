// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data captured when a request is created.

use std::collections::BTreeMap;

/// What a request was about, captured at creation time.
///
/// The endpoint and resource path are read back by the dispatcher when a
/// subscription is promoted into a notification route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    endpoint: Option<String>,
    resource: Option<String>,
    extra: BTreeMap<String, String>,
}

impl RequestContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context for an endpoint.
    #[must_use]
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    /// Creates a context for a resource of an endpoint.
    #[must_use]
    pub fn for_resource(endpoint: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            resource: Some(resource.into()),
            extra: BTreeMap::new(),
        }
    }

    /// Adds a free-form entry, such as a query filter.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Returns the endpoint name.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Returns the resource path.
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Returns a free-form entry.
    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }

    /// Returns all free-form entries.
    #[must_use]
    pub fn extras(&self) -> &BTreeMap<String, String> {
        &self.extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_context() {
        let context = RequestContext::for_resource("d1", "/3/0/1").with_extra("type", "test");
        assert_eq!(context.endpoint(), Some("d1"));
        assert_eq!(context.resource(), Some("/3/0/1"));
        assert_eq!(context.extra("type"), Some("test"));
        assert_eq!(context.extra("missing"), None);
    }

    #[test]
    fn empty_context() {
        let context = RequestContext::new();
        assert!(context.endpoint().is_none());
        assert!(context.resource().is_none());
        assert!(context.extras().is_empty());
    }
}
