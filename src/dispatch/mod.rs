// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Demultiplexing of notification batches.
//!
//! The [`Dispatcher`] processes one batch at a time, in this order:
//!
//! 1. `async-responses`: each event's `id` is taken out of the
//!    [`CorrelationTable`]. The pending result is completed with an error or
//!    with the decoded payload. A successful subscription is first promoted
//!    into a [`SubscriptionRouter`] route, whatever its payload. An event
//!    that failed to decode but still named its `id` completes that request
//!    with a decode error.
//! 2. `notifications`: each event is routed by `(ep, path)`.
//! 3. `registrations`, `reg-updates`, `de-registrations`,
//!    `registrations-expired`: passed as a whole to the handler of their
//!    kind, or logged when no handler is installed.
//!
//! Events whose token or route is unknown are logged and skipped. A panic in
//! a callback is caught and logged, and the remaining events of the batch are
//! still processed.

mod handlers;

pub use handlers::{BatchEvents, BatchHandler};

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::correlation::CorrelationTable;
use crate::error::{ParseError, RequestError};
use crate::notification::{
    self, AsyncResponse, BatchKind, NotificationBatch, ResourceNotification, UndecodableResponse,
};
use crate::pending::{ContinuationKind, PendingResult};
use crate::subscription::SubscriptionRouter;

use handlers::HandlerTable;

/// Counters describing what happened to one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Pending results completed successfully.
    pub resolved: usize,
    /// Pending results completed with an error.
    pub failed: usize,
    /// Subscriptions promoted into notification routes.
    pub promoted: usize,
    /// `async-responses` events without a pending token.
    pub orphaned: usize,
    /// Notifications delivered to a subscription handler.
    pub routed: usize,
    /// Notifications without a subscription.
    pub unrouted: usize,
    /// Lifecycle events handed to handlers or logged.
    pub lifecycle: usize,
    /// Events that could not be decoded or whose callback panicked.
    pub rejected: usize,
    /// Whether the whole batch was dropped as malformed.
    pub malformed: bool,
}

/// Routes the events of notification batches.
///
/// Shared between the long-poll task and webhook callers; every method takes
/// `&self` and may run concurrently.
pub struct Dispatcher {
    correlations: Arc<CorrelationTable>,
    subscriptions: Arc<SubscriptionRouter>,
    handlers: HandlerTable,
}

impl Dispatcher {
    /// Creates a dispatcher over the given tables.
    #[must_use]
    pub fn new(correlations: Arc<CorrelationTable>, subscriptions: Arc<SubscriptionRouter>) -> Self {
        Self {
            correlations,
            subscriptions,
            handlers: HandlerTable::default(),
        }
    }

    /// Returns the correlation table.
    #[must_use]
    pub fn correlations(&self) -> &Arc<CorrelationTable> {
        &self.correlations
    }

    /// Returns the subscription router.
    #[must_use]
    pub fn subscriptions(&self) -> &Arc<SubscriptionRouter> {
        &self.subscriptions
    }

    /// Installs the handler for one batch kind, replacing any previous one.
    ///
    /// For lifecycle kinds the handler replaces the default logging. For
    /// `async-responses` and `notifications` it observes the events after the
    /// built-in correlation and routing ran.
    pub fn set_handler<F>(&self, kind: BatchKind, handler: F)
    where
        F: Fn(&BatchEvents<'_>) + Send + Sync + 'static,
    {
        self.handlers.set(kind, Arc::new(handler));
    }

    /// Removes the handler of one batch kind.
    ///
    /// Returns `true` if a handler was installed.
    pub fn clear_handler(&self, kind: BatchKind) -> bool {
        self.handlers.remove(kind)
    }

    /// Processes one raw batch body.
    ///
    /// Never fails: a malformed batch is logged and reported as such.
    pub fn handle_batch(&self, raw: &[u8]) -> DispatchReport {
        match notification::parse_batch(raw) {
            Ok(batch) => self.dispatch(&batch),
            Err(e) => {
                tracing::error!(error = %e, len = raw.len(), "Dropping malformed notification batch");
                DispatchReport {
                    malformed: true,
                    ..DispatchReport::default()
                }
            }
        }
    }

    /// Processes one decoded batch.
    pub fn dispatch(&self, batch: &NotificationBatch) -> DispatchReport {
        let mut report = DispatchReport {
            rejected: batch.rejected,
            ..DispatchReport::default()
        };

        if batch.is_empty() {
            tracing::trace!("Notification batch carries no events");
            return report;
        }

        for response in &batch.async_responses {
            guarded(BatchKind::AsyncResponses, &mut report, |report| {
                self.resolve(response, report);
            });
        }
        for response in &batch.undecodable_responses {
            guarded(BatchKind::AsyncResponses, &mut report, |report| {
                self.fail_undecodable(response, report);
            });
        }
        self.observe(BatchEvents::AsyncResponses(&batch.async_responses), &mut report);

        for event in &batch.notifications {
            guarded(BatchKind::Notifications, &mut report, |report| {
                self.route(event, report);
            });
        }
        self.observe(BatchEvents::Notifications(&batch.notifications), &mut report);

        for events in [
            BatchEvents::Registrations(&batch.registrations),
            BatchEvents::RegistrationUpdates(&batch.registration_updates),
            BatchEvents::Deregistrations(&batch.deregistrations),
            BatchEvents::RegistrationsExpired(&batch.registrations_expired),
        ] {
            if events.is_empty() {
                continue;
            }
            report.lifecycle += events.len();
            match self.handlers.get(events.kind()) {
                Some(handler) => guarded(events.kind(), &mut report, |_| handler(&events)),
                None => handlers::log_events(&events),
            }
        }

        tracing::debug!(?report, "Notification batch dispatched");
        report
    }

    /// Installs the route of a subscription request.
    ///
    /// Returns `false` if `pending` is not a subscription or lacks its
    /// endpoint and resource.
    pub(crate) fn promote(&self, pending: &PendingResult) -> bool {
        if pending.continuation_kind() != ContinuationKind::PromoteToSubscription {
            return false;
        }
        let context = pending.context();
        let (Some(endpoint), Some(resource)) = (context.endpoint(), context.resource()) else {
            tracing::error!(?context, "Subscription request without endpoint or resource");
            return false;
        };
        let Some(handler) = pending.subscription_handler() else {
            return false;
        };
        self.subscriptions.register(endpoint, resource, handler);
        true
    }

    fn resolve(&self, response: &AsyncResponse, report: &mut DispatchReport) {
        let Some(pending) = self.correlations.take(&response.id) else {
            tracing::warn!(token = %response.id, status = response.status, "No pending request for async response");
            report.orphaned += 1;
            return;
        };

        let operation = pending.operation();
        tracing::debug!(token = %response.id, %operation, status = response.status, "Resolving async response");

        if let Some(message) = &response.error {
            pending.complete_error(RequestError::asynchronous(operation, response.status, message));
            report.failed += 1;
            return;
        }

        pending.set_response_metadata(response.ct.clone(), response.max_age);

        let promoted = is_success(response.status) && self.promote(&pending);
        if promoted {
            report.promoted += 1;
        }

        let payload = match notification::decode_payload(response.payload.as_deref()) {
            Ok(payload) => payload,
            Err(e) if promoted => {
                tracing::warn!(token = %response.id, error = %e, "Ignoring undecodable payload of confirmed subscription");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(token = %response.id, error = %e, "Undecodable async response payload");
                pending.complete_error(RequestError::decode(operation, Some(response.status), &e));
                report.failed += 1;
                return;
            }
        };

        pending.complete_success(payload, response.status);
        report.resolved += 1;
    }

    fn fail_undecodable(&self, response: &UndecodableResponse, report: &mut DispatchReport) {
        let Some(pending) = self.correlations.take(&response.id) else {
            tracing::warn!(token = %response.id, "No pending request for undecodable async response");
            report.orphaned += 1;
            return;
        };

        tracing::warn!(token = %response.id, reason = %response.reason, "Failing request on undecodable async response");
        let source = ParseError::UnexpectedFormat(response.reason.clone());
        pending.complete_error(RequestError::decode(pending.operation(), response.status, &source));
        report.failed += 1;
    }

    fn route(&self, event: &ResourceNotification, report: &mut DispatchReport) {
        let payload = match notification::decode_payload(event.payload.as_deref()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(endpoint = %event.ep, path = %event.path, error = %e, "Undecodable notification payload");
                report.rejected += 1;
                return;
            }
        };

        if self.subscriptions.route(&event.ep, &event.path, &payload, event) {
            report.routed += 1;
        } else {
            report.unrouted += 1;
        }
    }

    fn observe(&self, events: BatchEvents<'_>, report: &mut DispatchReport) {
        if events.is_empty() {
            return;
        }
        if let Some(handler) = self.handlers.get(events.kind()) {
            guarded(events.kind(), report, |_| handler(&events));
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.correlations.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Runs one event's processing, containing a panicking callback.
fn guarded<F>(kind: BatchKind, report: &mut DispatchReport, work: F)
where
    F: FnOnce(&mut DispatchReport),
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(report)));
    if let Err(cause) = outcome {
        let message = cause
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| cause.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(kind = %kind, panic = %message, "Callback panicked while dispatching");
        report.rejected += 1;
    }
}
