// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pending requests awaiting their `async-responses` event.
//!
//! When the service answers a request with `202 Accepted`, the response body
//! carries an `async-response-id`. The request's [`PendingResult`] is stored
//! under that token until an event with the same `id` arrives on the
//! notification channel.
//!
//! # At-most-once resolution
//!
//! [`CorrelationTable::take`] removes and returns an entry in one locked
//! step. Two deliveries racing on the same token can never both obtain the
//! pending result, so it is resolved at most once.
//!
//! There is no expiry: a token whose event never arrives stays in the table
//! until [`CorrelationTable::abandon`] is called.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::RequestError;
use crate::pending::PendingResult;

/// Concurrent map from correlation token to pending result.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: Mutex<HashMap<String, PendingResult>>,
}

impl CorrelationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pending` under `token`.
    ///
    /// The token is recorded on the pending result. If the token was already
    /// registered, the previous entry is completed as abandoned and `true` is
    /// returned.
    pub fn insert(&self, token: impl Into<String>, pending: PendingResult) -> bool {
        let token = token.into();
        pending.set_correlation_id(token.clone());
        tracing::debug!(token = %token, operation = %pending.operation(), "Awaiting async response");

        let previous = self.entries.lock().insert(token.clone(), pending);
        match previous {
            Some(previous) => {
                tracing::warn!(token = %token, "Correlation token registered twice, abandoning previous entry");
                previous.complete_error(RequestError::abandoned(previous.operation()));
                true
            }
            None => false,
        }
    }

    /// Removes and returns the entry for `token`.
    ///
    /// Returns `None` if the token is unknown or was already taken.
    pub fn take(&self, token: &str) -> Option<PendingResult> {
        self.entries.lock().remove(token)
    }

    /// Removes the entry for `token` and completes it as abandoned.
    ///
    /// Returns `true` if an entry existed.
    pub fn abandon(&self, token: &str) -> bool {
        let Some(pending) = self.take(token) else {
            return false;
        };
        tracing::debug!(token = %token, "Abandoning pending request");
        pending.complete_error(RequestError::abandoned(pending.operation()));
        true
    }

    /// Returns whether `token` is pending.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.entries.lock().contains_key(token)
    }

    /// Returns the pending tokens, sorted.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<_> = self.entries.lock().keys().cloned().collect();
        tokens.sort();
        tokens
    }

    /// Returns the number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
