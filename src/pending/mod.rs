// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placeholders for the eventual outcome of a remote operation.
//!
//! Every [`Client`](crate::Client) operation returns a [`PendingResult`]. It
//! is either already complete (the HTTP response carried the answer) or it
//! waits for an `async-responses` event from the notification channel.
//!
//! # Completion
//!
//! A pending result completes exactly once, with either a payload or a
//! [`RequestError`]. Once [`is_complete`](PendingResult::is_complete) returns
//! `true`, the value, status and error are fully visible to the caller.
//!
//! # Waiting
//!
//! Callers can poll, await [`wait`](PendingResult::wait), or attach a
//! callback with [`on_complete`](PendingResult::on_complete). Callbacks run on
//! the thread that completes the result (usually the notification delivery
//! task) and must not block.
//!
//! # Examples
//!
//! ```
//! use mdc_client::{Operation, PendingResult, RequestContext};
//!
//! let pending = PendingResult::new(Operation::GetResourceValue, RequestContext::new());
//! assert!(!pending.poll());
//!
//! pending.complete_success(b"21.5".to_vec(), 200);
//! assert!(pending.poll());
//! assert_eq!(pending.text().as_deref(), Some("21.5"));
//! ```

mod context;

pub use context::RequestContext;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio::sync::Notify;

use crate::error::{ParseError, RequestError};
use crate::operation::Operation;
use crate::subscription::NotificationCallback;

/// Callback invoked once when a pending result completes.
pub type ResultCallback = Arc<dyn Fn(&PendingResult) + Send + Sync>;

/// What happens after a pending result completes.
#[derive(Clone, Default)]
pub enum Continuation {
    /// Nothing; the caller polls or waits.
    #[default]
    None,
    /// Invoke the callback with the completed result.
    InvokeCallback(ResultCallback),
    /// On success, route notifications of the request's endpoint and resource
    /// to `handler`, then invoke `on_established` if present.
    PromoteToSubscription {
        /// Receives every notification of the subscribed resource.
        handler: NotificationCallback,
        /// Invoked once the subscription request itself completes.
        on_established: Option<ResultCallback>,
    },
}

impl Continuation {
    /// Returns the payload-free tag of this continuation.
    #[must_use]
    pub fn kind(&self) -> ContinuationKind {
        match self {
            Self::None => ContinuationKind::None,
            Self::InvokeCallback(_) => ContinuationKind::InvokeCallback,
            Self::PromoteToSubscription { .. } => ContinuationKind::PromoteToSubscription,
        }
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.kind(), f)
    }
}

/// Tag of a [`Continuation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationKind {
    /// No continuation.
    None,
    /// A completion callback.
    InvokeCallback,
    /// A subscription promoted into a notification route.
    PromoteToSubscription,
}

/// Mutable part of a pending result, guarded by one lock.
#[derive(Default)]
struct State {
    complete: bool,
    value: Vec<u8>,
    status_code: Option<u16>,
    error: Option<RequestError>,
    content_type: Option<String>,
    max_age: Option<u64>,
    correlation_id: Option<String>,
    continuation: Continuation,
}

struct Inner {
    operation: Operation,
    context: RequestContext,
    continuation_kind: ContinuationKind,
    state: Mutex<State>,
    completed: Notify,
}

/// The eventual outcome of one remote operation.
///
/// Cloning is cheap and every clone observes the same completion.
#[derive(Clone)]
pub struct PendingResult {
    inner: Arc<Inner>,
}

impl PendingResult {
    /// Creates an incomplete result without continuation.
    #[must_use]
    pub fn new(operation: Operation, context: RequestContext) -> Self {
        Self::with_continuation(operation, context, Continuation::None)
    }

    /// Creates an incomplete result with an explicit continuation.
    #[must_use]
    pub fn with_continuation(
        operation: Operation,
        context: RequestContext,
        continuation: Continuation,
    ) -> Self {
        let continuation_kind = continuation.kind();
        Self {
            inner: Arc::new(Inner {
                operation,
                context,
                continuation_kind,
                state: Mutex::new(State {
                    continuation,
                    ..State::default()
                }),
                completed: Notify::new(),
            }),
        }
    }

    /// Creates an incomplete result that invokes `callback` on completion.
    #[must_use]
    pub fn with_callback<F>(operation: Operation, context: RequestContext, callback: F) -> Self
    where
        F: Fn(&PendingResult) + Send + Sync + 'static,
    {
        Self::with_continuation(
            operation,
            context,
            Continuation::InvokeCallback(Arc::new(callback)),
        )
    }

    /// Creates an incomplete subscription request for `endpoint` and
    /// `resource` whose success installs `handler` as notification route.
    #[must_use]
    pub fn subscription(
        endpoint: impl Into<String>,
        resource: impl Into<String>,
        handler: NotificationCallback,
    ) -> Self {
        Self::with_continuation(
            Operation::Subscribe,
            RequestContext::for_resource(endpoint, resource),
            Continuation::PromoteToSubscription {
                handler,
                on_established: None,
            },
        )
    }

    /// Returns the operation this result belongs to.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.inner.operation
    }

    /// Returns the context captured at creation.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.inner.context
    }

    /// Returns the kind of continuation this result was created with.
    #[must_use]
    pub fn continuation_kind(&self) -> ContinuationKind {
        self.inner.continuation_kind
    }

    /// Returns whether the result is complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.inner.state.lock().complete
    }

    /// Same as [`is_complete`](Self::is_complete); never blocks.
    #[must_use]
    pub fn poll(&self) -> bool {
        self.is_complete()
    }

    /// Waits until the result completes.
    pub async fn wait(&self) {
        loop {
            // Registered before the check so a completion in between is not missed.
            let notified = self.inner.completed.notified();
            if self.is_complete() {
                return;
            }
            notified.await;
        }
    }

    /// Returns the decoded payload, if the result completed successfully.
    #[must_use]
    pub fn value(&self) -> Option<Vec<u8>> {
        let state = self.inner.state.lock();
        (state.complete && state.error.is_none()).then(|| state.value.clone())
    }

    /// Returns the payload as UTF-8 text, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.value()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Parses the payload as JSON.
    ///
    /// Returns `None` if the result is not complete or failed.
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be parsed into the target type.
    pub fn json<T: DeserializeOwned>(&self) -> Option<Result<T, ParseError>> {
        self.value()
            .map(|bytes| serde_json::from_slice(&bytes).map_err(ParseError::from))
    }

    /// Returns the status code received so far.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.inner.state.lock().status_code
    }

    /// Returns the error, if the result completed with one.
    #[must_use]
    pub fn error(&self) -> Option<RequestError> {
        self.inner.state.lock().error.clone()
    }

    /// Returns the outcome, or `None` while the result is pending.
    #[must_use]
    pub fn outcome(&self) -> Option<Result<Vec<u8>, RequestError>> {
        let state = self.inner.state.lock();
        if !state.complete {
            return None;
        }
        Some(match &state.error {
            Some(error) => Err(error.clone()),
            None => Ok(state.value.clone()),
        })
    }

    /// Returns the content type reported with an asynchronous answer.
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.inner.state.lock().content_type.clone()
    }

    /// Returns the cache lifetime reported with an asynchronous answer.
    #[must_use]
    pub fn max_age(&self) -> Option<u64> {
        self.inner.state.lock().max_age
    }

    /// Returns the correlation token, if the request was accepted
    /// asynchronously.
    #[must_use]
    pub fn correlation_id(&self) -> Option<String> {
        self.inner.state.lock().correlation_id.clone()
    }

    /// Returns the notification handler of a subscription request.
    #[must_use]
    pub fn subscription_handler(&self) -> Option<NotificationCallback> {
        match &self.inner.state.lock().continuation {
            Continuation::PromoteToSubscription { handler, .. } => Some(Arc::clone(handler)),
            Continuation::None | Continuation::InvokeCallback(_) => None,
        }
    }

    /// Registers a callback invoked once on completion.
    ///
    /// If the result is already complete, the callback runs immediately on
    /// the calling thread. A callback registered earlier is replaced.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: Fn(&PendingResult) + Send + Sync + 'static,
    {
        let callback: ResultCallback = Arc::new(callback);
        {
            let mut state = self.inner.state.lock();
            if !state.complete {
                match &mut state.continuation {
                    Continuation::PromoteToSubscription { on_established, .. } => {
                        *on_established = Some(callback);
                    }
                    other => *other = Continuation::InvokeCallback(callback),
                }
                return;
            }
        }
        callback(self);
    }

    /// Completes the result with a payload and status code.
    ///
    /// Returns `false` (and changes nothing) if it was already complete.
    pub fn complete_success(&self, value: Vec<u8>, status_code: u16) -> bool {
        self.finish(|state| {
            state.value = value;
            state.status_code = Some(status_code);
        })
    }

    /// Completes the result with an error.
    ///
    /// Returns `false` (and changes nothing) if it was already complete.
    pub fn complete_error(&self, error: RequestError) -> bool {
        self.finish(|state| {
            if let Some(code) = error.status_code() {
                state.status_code = Some(code);
            }
            state.error = Some(error);
        })
    }

    /// Records the correlation token under which the result is pending.
    pub(crate) fn set_correlation_id(&self, token: impl Into<String>) {
        self.inner.state.lock().correlation_id = Some(token.into());
    }

    /// Records response metadata of an asynchronous answer.
    pub(crate) fn set_response_metadata(&self, content_type: Option<String>, max_age: Option<u64>) {
        let mut state = self.inner.state.lock();
        if !state.complete {
            state.content_type = content_type;
            state.max_age = max_age;
        }
    }

    fn finish(&self, apply: impl FnOnce(&mut State)) -> bool {
        let continuation = {
            let mut state = self.inner.state.lock();
            if state.complete {
                tracing::warn!(
                    operation = %self.inner.operation,
                    "Ignoring second completion of a pending result"
                );
                return false;
            }
            apply(&mut state);
            state.complete = true;
            std::mem::take(&mut state.continuation)
        };

        self.inner.completed.notify_waiters();

        match continuation {
            Continuation::InvokeCallback(callback)
            | Continuation::PromoteToSubscription {
                on_established: Some(callback),
                ..
            } => callback(self),
            Continuation::None | Continuation::PromoteToSubscription { .. } => {}
        }
        true
    }
}

impl fmt::Debug for PendingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("PendingResult")
            .field("operation", &self.inner.operation)
            .field("context", &self.inner.context)
            .field("continuation", &self.inner.continuation_kind)
            .field("complete", &state.complete)
            .field("status_code", &state.status_code)
            .field("error", &state.error)
            .field("correlation_id", &state.correlation_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter() -> (Arc<AtomicU32>, impl Fn(&PendingResult) + Send + Sync + 'static) {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = Arc::clone(&count);
        (count, move |_: &PendingResult| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn new_result_is_incomplete() {
        let pending = PendingResult::new(Operation::Limits, RequestContext::new());
        assert!(!pending.is_complete());
        assert!(pending.value().is_none());
        assert!(pending.error().is_none());
        assert!(pending.outcome().is_none());
        assert_eq!(pending.continuation_kind(), ContinuationKind::None);
    }

    #[test]
    fn complete_success_sets_value_and_status() {
        let pending = PendingResult::new(Operation::GetResourceValue, RequestContext::new());
        assert!(pending.complete_success(b"hello".to_vec(), 200));
        assert!(pending.poll());
        assert_eq!(pending.value().unwrap(), b"hello");
        assert_eq!(pending.status_code(), Some(200));
        assert!(matches!(pending.outcome(), Some(Ok(_))));
    }

    #[test]
    fn complete_error_sets_error_and_status() {
        let pending = PendingResult::new(Operation::GetResourceValue, RequestContext::new());
        let error = RequestError::asynchronous(Operation::GetResourceValue, 410, "gone");
        assert!(pending.complete_error(error));
        assert!(pending.is_complete());
        assert!(pending.value().is_none());
        assert_eq!(pending.status_code(), Some(410));
        assert_eq!(pending.error().unwrap().kind(), RequestErrorKind::Async);
    }

    #[test]
    fn completes_only_once() {
        let (count, callback) = counter();
        let pending =
            PendingResult::with_callback(Operation::PutResourceValue, RequestContext::new(), callback);

        assert!(pending.complete_success(b"first".to_vec(), 200));
        assert!(!pending.complete_success(b"second".to_vec(), 200));
        assert!(!pending.complete_error(RequestError::abandoned(Operation::PutResourceValue)));

        assert_eq!(pending.value().unwrap(), b"first");
        assert!(pending.error().is_none());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_sees_completed_state() {
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let pending = PendingResult::new(Operation::GetResourceValue, RequestContext::new());
        pending.on_complete(move |result| {
            *seen_clone.lock() = Some((result.is_complete(), result.text()));
        });

        pending.complete_success(b"42".to_vec(), 200);
        assert_eq!(*seen.lock(), Some((true, Some("42".to_string()))));
    }

    #[test]
    fn on_complete_after_completion_runs_immediately() {
        let pending = PendingResult::new(Operation::Limits, RequestContext::new());
        pending.complete_success(Vec::new(), 200);

        let (count, callback) = counter();
        pending.on_complete(callback);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_complete_on_subscription_keeps_handler() {
        let handler = crate::subscription::callback(|_, _| {});
        let pending = PendingResult::subscription("d1", "/3/0/1", handler);
        let (count, callback) = counter();
        pending.on_complete(callback);

        assert_eq!(
            pending.continuation_kind(),
            ContinuationKind::PromoteToSubscription
        );
        assert!(pending.subscription_handler().is_some());

        pending.complete_success(Vec::new(), 200);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(pending.subscription_handler().is_none());
    }

    #[test]
    fn clones_share_completion() {
        let pending = PendingResult::new(Operation::Limits, RequestContext::new());
        let clone = pending.clone();
        clone.complete_success(b"{}".to_vec(), 200);
        assert!(pending.is_complete());
    }

    #[test]
    fn json_payload() {
        let pending = PendingResult::new(Operation::Limits, RequestContext::new());
        pending.complete_success(br#"{"endpoint-quota":100}"#.to_vec(), 200);
        let value: serde_json::Value = pending.json().unwrap().unwrap();
        assert_eq!(value["endpoint-quota"], 100);
    }

    #[test]
    fn metadata_is_frozen_after_completion() {
        let pending = PendingResult::new(Operation::GetResourceValue, RequestContext::new());
        pending.set_response_metadata(Some("text/plain".to_string()), Some(60));
        pending.complete_success(Vec::new(), 200);
        pending.set_response_metadata(None, None);
        assert_eq!(pending.content_type().as_deref(), Some("text/plain"));
        assert_eq!(pending.max_age(), Some(60));
    }

    #[tokio::test]
    async fn wait_returns_after_completion_from_another_task() {
        let pending = PendingResult::new(Operation::GetResourceValue, RequestContext::new());
        let clone = pending.clone();
        let task = tokio::spawn(async move {
            tokio::task::yield_now().await;
            clone.complete_success(b"done".to_vec(), 200);
        });

        pending.wait().await;
        assert_eq!(pending.text().as_deref(), Some("done"));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn wait_on_completed_result_returns_immediately() {
        let pending = PendingResult::new(Operation::Limits, RequestContext::new());
        pending.complete_success(Vec::new(), 200);
        pending.wait().await;
    }
}
