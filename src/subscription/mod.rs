// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Routing of resource notifications to subscription handlers.
//!
//! A subscription is created with [`Client::subscribe`](crate::Client::subscribe).
//! Once the service confirms it, the handler is stored in the
//! [`SubscriptionRouter`] under its `(endpoint, resource path)` pair, and every
//! `notifications` event for that pair is delivered to it.
//!
//! ```text
//! Batch: {"notifications":[{"ep":"d1","path":"/3/0/1","payload":"aGVsbG8="}]}
//!                     ↓
//!           SubscriptionRouter.route()
//!                     ↓
//!        Lookup ("d1", "/3/0/1") in routes
//!                     ↓
//!        handler(b"hello", &notification)
//! ```

mod router;

pub(crate) use router::callback;
pub use router::{SubscriptionKey, SubscriptionRouter};

use std::sync::Arc;

use crate::notification::ResourceNotification;

/// Handler receiving the decoded payload and the raw event of a notification.
pub type NotificationCallback = Arc<dyn Fn(&[u8], &ResourceNotification) + Send + Sync>;
