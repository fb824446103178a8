// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Concurrent map from `(endpoint, resource path)` to notification handler.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::NotificationCallback;
use crate::notification::ResourceNotification;

/// Identifies one subscribed resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey {
    /// Endpoint name.
    pub endpoint: String,
    /// Resource path.
    pub resource: String,
}

impl SubscriptionKey {
    /// Creates a key.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.endpoint, self.resource)
    }
}

/// Routes resource notifications to the handler of their subscription.
///
/// Re-registering a key replaces its handler. Handlers are invoked outside
/// the lock, so a handler may register or unregister routes itself.
#[derive(Default)]
pub struct SubscriptionRouter {
    routes: RwLock<HashMap<SubscriptionKey, NotificationCallback>>,
}

impl SubscriptionRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler` for the resource, replacing any previous handler.
    pub fn register(
        &self,
        endpoint: impl Into<String>,
        resource: impl Into<String>,
        handler: NotificationCallback,
    ) {
        let key = SubscriptionKey::new(endpoint, resource);
        tracing::debug!(subscription = %key, "Registering notification route");
        if self.routes.write().insert(key, handler).is_some() {
            tracing::debug!("Replaced existing notification route");
        }
    }

    /// Removes the route of one resource.
    ///
    /// Returns `true` if a route existed.
    pub fn unregister(&self, endpoint: &str, resource: &str) -> bool {
        let key = SubscriptionKey::new(endpoint, resource);
        tracing::debug!(subscription = %key, "Unregistering notification route");
        self.routes.write().remove(&key).is_some()
    }

    /// Removes every route of an endpoint.
    ///
    /// Returns the number of routes removed.
    pub fn unregister_endpoint(&self, endpoint: &str) -> usize {
        let mut routes = self.routes.write();
        let before = routes.len();
        routes.retain(|key, _| key.endpoint != endpoint);
        let removed = before - routes.len();
        tracing::debug!(endpoint = %endpoint, removed, "Unregistered endpoint routes");
        removed
    }

    /// Removes every route.
    pub fn clear(&self) {
        self.routes.write().clear();
    }

    /// Delivers a notification to the handler of `(endpoint, resource)`.
    ///
    /// Returns `true` if a handler was found. Unknown pairs are ignored.
    pub fn route(
        &self,
        endpoint: &str,
        resource: &str,
        payload: &[u8],
        event: &ResourceNotification,
    ) -> bool {
        let handler = self
            .routes
            .read()
            .get(&SubscriptionKey::new(endpoint, resource))
            .cloned();

        let Some(handler) = handler else {
            tracing::debug!(
                endpoint = %endpoint,
                resource = %resource,
                "No subscription for notification"
            );
            return false;
        };

        handler(payload, event);
        true
    }

    /// Returns whether a route exists for the resource.
    #[must_use]
    pub fn contains(&self, endpoint: &str, resource: &str) -> bool {
        self.routes
            .read()
            .contains_key(&SubscriptionKey::new(endpoint, resource))
    }

    /// Returns the subscribed keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<SubscriptionKey> {
        let mut keys: Vec<_> = self.routes.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    /// Returns whether there are no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}

impl fmt::Debug for SubscriptionRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRouter")
            .field("routes", &self.keys())
            .finish()
    }
}

/// Builds a [`NotificationCallback`] from a closure.
pub(crate) fn callback<F>(handler: F) -> NotificationCallback
where
    F: Fn(&[u8], &ResourceNotification) + Send + Sync + 'static,
{
    Arc::new(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn event(ep: &str, path: &str) -> ResourceNotification {
        ResourceNotification {
            ep: ep.to_string(),
            path: path.to_string(),
            ct: None,
            payload: None,
            extra: serde_json::Map::new(),
        }
    }

    fn counting_handler() -> (Arc<AtomicU32>, NotificationCallback) {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = Arc::clone(&count);
        (
            count,
            callback(move |_, _| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn register_and_route() {
        let router = SubscriptionRouter::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = Arc::clone(&received);
        router.register(
            "d1",
            "/3/0/1",
            callback(move |payload, event| {
                received_clone
                    .lock()
                    .push((payload.to_vec(), event.path.clone()));
            }),
        );

        assert!(router.route("d1", "/3/0/1", b"hello", &event("d1", "/3/0/1")));
        assert_eq!(
            *received.lock(),
            vec![(b"hello".to_vec(), "/3/0/1".to_string())]
        );
    }

    #[test]
    fn unknown_route_is_ignored() {
        let router = SubscriptionRouter::new();
        assert!(!router.route("d1", "/3/0/1", b"", &event("d1", "/3/0/1")));
    }

    #[test]
    fn unregister() {
        let router = SubscriptionRouter::new();
        let (count, handler) = counting_handler();
        router.register("d1", "/3/0/1", handler);
        assert!(router.unregister("d1", "/3/0/1"));
        assert!(!router.unregister("d1", "/3/0/1"));
        assert!(!router.route("d1", "/3/0/1", b"", &event("d1", "/3/0/1")));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn replace_registration() {
        let router = SubscriptionRouter::new();
        let (count1, handler1) = counting_handler();
        let (count2, handler2) = counting_handler();
        router.register("d1", "/3/0/1", handler1);
        router.register("d1", "/3/0/1", handler2);

        router.route("d1", "/3/0/1", b"", &event("d1", "/3/0/1"));
        assert_eq!(count1.load(Ordering::SeqCst), 0);
        assert_eq!(count2.load(Ordering::SeqCst), 1);
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn unregister_endpoint_keeps_other_endpoints() {
        let router = SubscriptionRouter::new();
        let (_, handler) = counting_handler();
        router.register("d1", "/3/0/1", Arc::clone(&handler));
        router.register("d1", "/3/0/2", Arc::clone(&handler));
        router.register("d2", "/3/0/1", handler);

        assert_eq!(router.unregister_endpoint("d1"), 2);
        assert_eq!(router.keys(), vec![SubscriptionKey::new("d2", "/3/0/1")]);
    }

    #[test]
    fn handler_may_unregister_itself() {
        let router = Arc::new(SubscriptionRouter::new());
        let router_clone = Arc::clone(&router);
        router.register(
            "d1",
            "/3/0/1",
            callback(move |_, event| {
                router_clone.unregister(&event.ep, &event.path);
            }),
        );

        assert!(router.route("d1", "/3/0/1", b"", &event("d1", "/3/0/1")));
        assert!(router.is_empty());
    }

    #[test]
    fn clear_removes_everything() {
        let router = SubscriptionRouter::new();
        let (_, handler) = counting_handler();
        router.register("d1", "/a", Arc::clone(&handler));
        router.register("d2", "/b", handler);
        router.clear();
        assert!(router.is_empty());
        assert!(!router.contains("d1", "/a"));
    }
}
