// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-kind batch handlers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::notification::{AsyncResponse, BatchKind, Registration, ResourceNotification};

/// The events of one kind from a single batch, as passed to a handler.
#[derive(Debug, Clone, Copy)]
pub enum BatchEvents<'a> {
    /// `async-responses` events.
    AsyncResponses(&'a [AsyncResponse]),
    /// `notifications` events.
    Notifications(&'a [ResourceNotification]),
    /// `registrations` events.
    Registrations(&'a [Registration]),
    /// `reg-updates` events.
    RegistrationUpdates(&'a [Registration]),
    /// `de-registrations` endpoint names.
    Deregistrations(&'a [String]),
    /// `registrations-expired` endpoint names.
    RegistrationsExpired(&'a [String]),
}

impl BatchEvents<'_> {
    /// Returns the kind of the events.
    #[must_use]
    pub fn kind(&self) -> BatchKind {
        match self {
            Self::AsyncResponses(_) => BatchKind::AsyncResponses,
            Self::Notifications(_) => BatchKind::Notifications,
            Self::Registrations(_) => BatchKind::Registrations,
            Self::RegistrationUpdates(_) => BatchKind::RegistrationUpdates,
            Self::Deregistrations(_) => BatchKind::Deregistrations,
            Self::RegistrationsExpired(_) => BatchKind::RegistrationsExpired,
        }
    }

    /// Returns the number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::AsyncResponses(events) => events.len(),
            Self::Notifications(events) => events.len(),
            Self::Registrations(events) | Self::RegistrationUpdates(events) => events.len(),
            Self::Deregistrations(names) | Self::RegistrationsExpired(names) => names.len(),
        }
    }

    /// Returns whether there are no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the endpoint names the events refer to.
    #[must_use]
    pub fn endpoints(&self) -> Vec<&str> {
        match self {
            Self::AsyncResponses(_) => Vec::new(),
            Self::Notifications(events) => events.iter().map(|e| e.ep.as_str()).collect(),
            Self::Registrations(events) | Self::RegistrationUpdates(events) => {
                events.iter().map(|e| e.ep.as_str()).collect()
            }
            Self::Deregistrations(names) | Self::RegistrationsExpired(names) => {
                names.iter().map(String::as_str).collect()
            }
        }
    }
}

/// Handler for the events of one batch kind.
pub type BatchHandler = Arc<dyn Fn(&BatchEvents<'_>) + Send + Sync>;

/// Handlers keyed by batch kind; a missing entry means default logging.
#[derive(Default)]
pub(crate) struct HandlerTable {
    handlers: RwLock<HashMap<BatchKind, BatchHandler>>,
}

impl HandlerTable {
    pub(crate) fn set(&self, kind: BatchKind, handler: BatchHandler) {
        tracing::debug!(kind = %kind, "Installing batch handler");
        self.handlers.write().insert(kind, handler);
    }

    pub(crate) fn remove(&self, kind: BatchKind) -> bool {
        self.handlers.write().remove(&kind).is_some()
    }

    pub(crate) fn get(&self, kind: BatchKind) -> Option<BatchHandler> {
        self.handlers.read().get(&kind).cloned()
    }
}

/// Logs lifecycle events when no handler is installed.
pub(crate) fn log_events(events: &BatchEvents<'_>) {
    tracing::info!(kind = %events.kind(), count = events.len(), "Lifecycle events received");
    tracing::debug!(kind = %events.kind(), endpoints = ?events.endpoints(), "Lifecycle event endpoints");
}
