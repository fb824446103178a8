// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `mdc_client` - an async client for the mbed Device Connector REST API.
//!
//! The service manages `IoT` devices (endpoints) and their resources. Many of
//! its operations do not answer in the HTTP response: they return
//! `202 Accepted` with a correlation token, and the real result arrives later
//! in a notification batch. This crate hides that split behind
//! [`PendingResult`].
//!
//! # Components
//!
//! - [`Client`]: REST operations, each returning a [`PendingResult`]
//! - [`CorrelationTable`]: requests awaiting their `async-responses` event
//! - [`SubscriptionRouter`]: notification handlers keyed by endpoint and
//!   resource path
//! - [`Dispatcher`]: demultiplexes notification batches
//! - [`channel`]: long polling, or webhook delivery through
//!   [`Client::handle_batch`]
//!
//! # Quick Start
//!
//! ## Reading a resource
//!
//! ```no_run
//! use mdc_client::{Client, ClientConfig, ResourceOptions};
//!
//! #[tokio::main]
//! async fn main() -> mdc_client::Result<()> {
//!     let client = Client::new(ClientConfig::new("access-key"))?;
//!     client.start_channel()?;
//!
//!     let pending = client
//!         .get_resource_value("node-001", "/3/0/1", ResourceOptions::new())
//!         .await;
//!     pending.wait().await;
//!
//!     match pending.outcome() {
//!         Some(Ok(value)) => println!("value: {}", String::from_utf8_lossy(&value)),
//!         Some(Err(e)) => eprintln!("{e}"),
//!         None => unreachable!(),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Subscribing to a resource
//!
//! ```no_run
//! use mdc_client::{BatchKind, Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> mdc_client::Result<()> {
//!     let client = Client::new(ClientConfig::new("access-key"))?;
//!     client.start_channel()?;
//!
//!     client.set_handler(BatchKind::Deregistrations, |events| {
//!         println!("gone: {:?}", events.endpoints());
//!     });
//!
//!     let pending = client
//!         .subscribe("node-001", "/3303/0/5700", |payload, event| {
//!             println!("{}: {}", event.ep, String::from_utf8_lossy(payload));
//!         })
//!         .await;
//!     pending.on_complete(|result| {
//!         if let Some(e) = result.error() {
//!             eprintln!("subscription failed: {e}");
//!         }
//!     });
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     client.stop_channel_and_wait().await;
//!     Ok(())
//! }
//! ```

pub mod channel;
mod client;
pub mod correlation;
pub mod dispatch;
pub mod error;
pub mod notification;
pub mod operation;
pub mod pending;
pub mod subscription;
pub mod transport;

pub use channel::{LongPoller, NotificationMode, PollSettings};
pub use client::{Client, ClientConfig, ENV_ACCESS_KEY, ENV_BASE_URL, ResourceOptions};
pub use correlation::CorrelationTable;
pub use dispatch::{BatchEvents, BatchHandler, DispatchReport, Dispatcher};
pub use error::{
    Error, MalformedBatchError, ParseError, ProtocolError, RequestError, RequestErrorKind, Result,
};
pub use notification::{
    AsyncResponse, BatchKind, NotificationBatch, RegisteredResource, Registration,
    ResourceNotification, UndecodableResponse,
};
pub use operation::{Operation, StatusClass, StatusPolicy};
pub use pending::{Continuation, ContinuationKind, PendingResult, RequestContext, ResultCallback};
pub use subscription::{NotificationCallback, SubscriptionKey, SubscriptionRouter};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{ApiRequest, ApiResponse, Method, RequestBody, Transport};
