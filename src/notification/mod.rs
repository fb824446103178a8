// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Notification batches delivered by the service.
//!
//! A batch is a JSON object holding up to six named event collections:
//!
//! ```text
//! {
//!   "async-responses":       [{"id": "...", "status": 200, "payload": "<base64>"}],
//!   "notifications":         [{"ep": "...", "path": "/3/0/1", "payload": "<base64>"}],
//!   "registrations":         [{"ep": "...", "ept": "...", "resources": [...]}],
//!   "reg-updates":           [{"ep": "...", "ept": "...", "resources": [...]}],
//!   "de-registrations":      ["endpoint-name"],
//!   "registrations-expired": ["endpoint-name"]
//! }
//! ```
//!
//! The same shape arrives from a long-poll pull and from a webhook callback.
//! [`parse_batch`] turns the raw body into a [`NotificationBatch`].

mod parser;

pub use parser::{decode_payload, parse_batch};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ParseError;

/// The six event collections a batch may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    /// Correlated answers to accepted requests.
    AsyncResponses,
    /// Value changes of subscribed resources.
    Notifications,
    /// Endpoints that registered.
    Registrations,
    /// Endpoints that refreshed their registration.
    RegistrationUpdates,
    /// Endpoints that deregistered.
    Deregistrations,
    /// Endpoints whose registration expired.
    RegistrationsExpired,
}

impl BatchKind {
    /// Every batch kind, in dispatch order.
    pub const ALL: [Self; 6] = [
        Self::AsyncResponses,
        Self::Notifications,
        Self::Registrations,
        Self::RegistrationUpdates,
        Self::Deregistrations,
        Self::RegistrationsExpired,
    ];

    /// The four device lifecycle kinds.
    pub const LIFECYCLE: [Self; 4] = [
        Self::Registrations,
        Self::RegistrationUpdates,
        Self::Deregistrations,
        Self::RegistrationsExpired,
    ];

    /// Returns the JSON key of this collection in a batch.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::AsyncResponses => "async-responses",
            Self::Notifications => "notifications",
            Self::Registrations => "registrations",
            Self::RegistrationUpdates => "reg-updates",
            Self::Deregistrations => "de-registrations",
            Self::RegistrationsExpired => "registrations-expired",
        }
    }

    /// Returns whether this kind describes device connectivity.
    #[must_use]
    pub fn is_lifecycle(self) -> bool {
        Self::LIFECYCLE.contains(&self)
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for BatchKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| ParseError::UnexpectedFormat(format!("unknown batch kind: {s}")))
    }
}

/// Answer to a request that was accepted with an async response id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncResponse {
    /// Correlation token issued when the request was accepted.
    pub id: String,
    /// HTTP-like status of the operation on the device.
    pub status: u16,
    /// Error message; present only when the operation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Content type of the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ct: Option<String>,
    /// Cache lifetime of the value in seconds.
    #[serde(rename = "max-age", default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,
    /// Base64 encoded payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Value change of a subscribed resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNotification {
    /// Endpoint (device) name.
    pub ep: String,
    /// Resource path, e.g. `/3/0/1`.
    pub path: String,
    /// Content type of the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ct: Option<String>,
    /// Base64 encoded payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Fields not modelled above, such as `timestamp` and `max-age`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A registration or registration update of an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    /// Endpoint name.
    pub ep: String,
    /// Endpoint type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ept: Option<String>,
    /// Whether the endpoint runs in queue mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<bool>,
    /// Resources the endpoint exposes.
    #[serde(default)]
    pub resources: Vec<RegisteredResource>,
}

/// One resource announced in a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredResource {
    /// Resource path.
    pub path: String,
    /// Interface description.
    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    /// Resource type.
    #[serde(alias = "rf", default, skip_serializing_if = "Option::is_none")]
    pub rt: Option<String>,
    /// Content type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ct: Option<String>,
    /// Whether the resource can be observed (subscribed to).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obs: Option<bool>,
}

/// An `async-responses` event whose `id` could be read but whose other
/// fields could not be decoded.
///
/// Kept so the request waiting on `id` still receives an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndecodableResponse {
    /// Correlation token of the event.
    pub id: String,
    /// Status of the event, when it was readable.
    pub status: Option<u16>,
    /// Why decoding failed.
    pub reason: String,
}

/// A decoded notification batch.
///
/// Collections absent from the body are empty. Events that failed to decode
/// individually are counted in [`rejected`](Self::rejected) and skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationBatch {
    /// `async-responses` events.
    pub async_responses: Vec<AsyncResponse>,
    /// `async-responses` events that failed to decode but carry an `id`.
    pub undecodable_responses: Vec<UndecodableResponse>,
    /// `notifications` events.
    pub notifications: Vec<ResourceNotification>,
    /// `registrations` events.
    pub registrations: Vec<Registration>,
    /// `reg-updates` events.
    pub registration_updates: Vec<Registration>,
    /// `de-registrations` endpoint names.
    pub deregistrations: Vec<String>,
    /// `registrations-expired` endpoint names.
    pub registrations_expired: Vec<String>,
    /// Number of events that could not be decoded.
    pub rejected: usize,
}

impl NotificationBatch {
    /// Returns whether the batch carries nothing to dispatch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.event_count() == 0 && self.undecodable_responses.is_empty()
    }

    /// Returns the total number of decoded events.
    #[must_use]
    pub fn event_count(&self) -> usize {
        BatchKind::ALL.iter().map(|kind| self.len_of(*kind)).sum()
    }

    /// Returns the number of decoded events of one kind.
    #[must_use]
    pub fn len_of(&self, kind: BatchKind) -> usize {
        match kind {
            BatchKind::AsyncResponses => self.async_responses.len(),
            BatchKind::Notifications => self.notifications.len(),
            BatchKind::Registrations => self.registrations.len(),
            BatchKind::RegistrationUpdates => self.registration_updates.len(),
            BatchKind::Deregistrations => self.deregistrations.len(),
            BatchKind::RegistrationsExpired => self.registrations_expired.len(),
        }
    }
}
