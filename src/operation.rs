// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote operations and how their HTTP status codes are interpreted.
//!
//! Every REST call made by the [`Client`](crate::Client) is identified by an
//! [`Operation`]. The operation decides which status codes mean immediate
//! success, whether `202 Accepted` starts an asynchronous correlation, and
//! which human-readable description a failing status maps to.

use std::fmt;

/// HTTP status returned when the service answers later through the
/// notification channel.
pub const ACCEPTED: u16 = 202;

/// A remote operation exposed by the device connector REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `GET /` - connector version.
    ConnectorVersion,
    /// `GET /rest-versions` - supported REST API versions.
    ApiVersions,
    /// `GET /limits` - account limits.
    Limits,
    /// `GET /endpoints` - registered endpoints.
    Endpoints,
    /// `GET /endpoints/{ep}` - resources of one endpoint.
    Resources,
    /// `GET /endpoints/{ep}/{path}` - read a resource value.
    GetResourceValue,
    /// `PUT /endpoints/{ep}/{path}` - write a resource value.
    PutResourceValue,
    /// `POST /endpoints/{ep}/{path}` - execute a resource.
    PostResource,
    /// `DELETE /endpoints/{ep}` - deregister an endpoint.
    DeleteEndpoint,
    /// `PUT /subscriptions/{ep}/{path}` - subscribe to a resource.
    Subscribe,
    /// `DELETE /subscriptions/{ep}/{path}` - drop one subscription.
    DeleteResourceSubscription,
    /// `DELETE /subscriptions/{ep}` - drop every subscription of an endpoint.
    DeleteEndpointSubscriptions,
    /// `DELETE /subscriptions` - drop every subscription of the domain.
    DeleteAllSubscriptions,
    /// `GET /subscriptions/{ep}` - list subscriptions of an endpoint.
    EndpointSubscriptions,
    /// `GET /subscriptions/{ep}/{path}` - check one subscription.
    ResourceSubscription,
    /// `PUT /subscriptions` - set pre-subscription rules.
    PutPreSubscription,
    /// `GET /subscriptions` - read pre-subscription rules.
    GetPreSubscription,
    /// `PUT /notification/callback` - register the webhook URL.
    PutCallback,
    /// `GET /notification/callback` - read the webhook URL.
    GetCallback,
    /// `DELETE /notification/callback` - remove the webhook URL.
    DeleteCallback,
    /// `GET /notification/pull` - long-poll for a notification batch.
    LongPoll,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Self; 21] = [
        Self::ConnectorVersion,
        Self::ApiVersions,
        Self::Limits,
        Self::Endpoints,
        Self::Resources,
        Self::GetResourceValue,
        Self::PutResourceValue,
        Self::PostResource,
        Self::DeleteEndpoint,
        Self::Subscribe,
        Self::DeleteResourceSubscription,
        Self::DeleteEndpointSubscriptions,
        Self::DeleteAllSubscriptions,
        Self::EndpointSubscriptions,
        Self::ResourceSubscription,
        Self::PutPreSubscription,
        Self::GetPreSubscription,
        Self::PutCallback,
        Self::GetCallback,
        Self::DeleteCallback,
        Self::LongPoll,
    ];

    /// Returns the unique snake-case name of the operation.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ConnectorVersion => "connector_version",
            Self::ApiVersions => "api_versions",
            Self::Limits => "limits",
            Self::Endpoints => "endpoints",
            Self::Resources => "resources",
            Self::GetResourceValue => "get_resource_value",
            Self::PutResourceValue => "put_resource_value",
            Self::PostResource => "post_resource",
            Self::DeleteEndpoint => "delete_endpoint",
            Self::Subscribe => "subscribe",
            Self::DeleteResourceSubscription => "delete_resource_subscription",
            Self::DeleteEndpointSubscriptions => "delete_endpoint_subscriptions",
            Self::DeleteAllSubscriptions => "delete_all_subscriptions",
            Self::EndpointSubscriptions => "endpoint_subscriptions",
            Self::ResourceSubscription => "resource_subscription",
            Self::PutPreSubscription => "put_pre_subscription",
            Self::GetPreSubscription => "get_pre_subscription",
            Self::PutCallback => "put_callback",
            Self::GetCallback => "get_callback",
            Self::DeleteCallback => "delete_callback",
            Self::LongPoll => "long_poll",
        }
    }

    /// Returns the key of the status classification table for this operation.
    ///
    /// Several operations share one group of documented status codes.
    #[must_use]
    pub fn category(self) -> &'static str {
        match self {
            Self::ConnectorVersion => "get_mdc_version",
            Self::ApiVersions => "get_rest_version",
            Self::Limits => "limit",
            Self::Endpoints => "get_endpoints",
            Self::Resources => "get_resources",
            Self::GetResourceValue
            | Self::PutResourceValue
            | Self::PostResource
            | Self::DeleteEndpoint => "resource",
            Self::Subscribe => "subscribe",
            Self::DeleteResourceSubscription | Self::DeleteAllSubscriptions => "unsubscribe",
            Self::DeleteEndpointSubscriptions => "delete_endpoint_subscription",
            Self::EndpointSubscriptions => "get_endpoint_subscription",
            Self::ResourceSubscription => "get_resource_subscription",
            Self::PutPreSubscription | Self::GetPreSubscription => "presubscription",
            Self::PutCallback => "put_callback_url",
            Self::GetCallback => "get_callback_url",
            Self::DeleteCallback => "delete_callback_url",
            Self::LongPoll => "longpoll",
        }
    }

    /// Returns the status policy the service documents for this operation.
    #[must_use]
    pub fn default_policy(self) -> StatusPolicy {
        match self {
            Self::GetResourceValue
            | Self::PutResourceValue
            | Self::DeleteEndpoint
            | Self::Subscribe => StatusPolicy::asynchronous(&[200]),
            Self::PostResource => StatusPolicy::asynchronous(&[201]),
            // Revisions of the service disagree on 200 vs 204 for removals.
            Self::DeleteResourceSubscription
            | Self::DeleteEndpointSubscriptions
            | Self::DeleteAllSubscriptions => StatusPolicy::immediate(&[200, 204]),
            Self::PutPreSubscription | Self::PutCallback | Self::DeleteCallback => {
                StatusPolicy::immediate(&[204])
            }
            Self::LongPoll => StatusPolicy::immediate(&[200, 204]),
            Self::ConnectorVersion
            | Self::ApiVersions
            | Self::Limits
            | Self::Endpoints
            | Self::Resources
            | Self::EndpointSubscriptions
            | Self::ResourceSubscription
            | Self::GetPreSubscription
            | Self::GetCallback => StatusPolicy::immediate(&[200]),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How an HTTP status was interpreted for a given operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The operation finished synchronously.
    Success,
    /// The result will arrive later, correlated by an async response id.
    Accepted,
    /// The operation failed.
    Failure,
}

/// Status codes an operation treats as success, and whether it may be
/// answered asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPolicy {
    success: Vec<u16>,
    accepts_async: bool,
}

impl StatusPolicy {
    /// A policy whose result always arrives in the HTTP response.
    #[must_use]
    pub fn immediate(success: &[u16]) -> Self {
        Self {
            success: success.to_vec(),
            accepts_async: false,
        }
    }

    /// A policy that also accepts `202` with an async response id.
    #[must_use]
    pub fn asynchronous(success: &[u16]) -> Self {
        Self {
            success: success.to_vec(),
            accepts_async: true,
        }
    }

    /// Returns a copy with a different set of success codes.
    #[must_use]
    pub fn with_success_codes(mut self, success: &[u16]) -> Self {
        self.success = success.to_vec();
        self
    }

    /// Returns the success codes.
    #[must_use]
    pub fn success_codes(&self) -> &[u16] {
        &self.success
    }

    /// Returns whether `202 Accepted` starts a correlation.
    #[must_use]
    pub fn accepts_async(&self) -> bool {
        self.accepts_async
    }

    /// Classifies a status code.
    #[must_use]
    pub fn classify(&self, status: u16) -> StatusClass {
        if self.success.contains(&status) {
            StatusClass::Success
        } else if self.accepts_async && status == ACCEPTED {
            StatusClass::Accepted
        } else {
            StatusClass::Failure
        }
    }
}

/// Describes `status` for `operation` using the documented status table.
///
/// Unknown pairs map to a generic message.
#[must_use]
pub fn describe_status(operation: Operation, status: u16) -> &'static str {
    match (operation.category(), status) {
        ("get_mdc_version", 200) => {
            "Successful response containing version of mbed Device Connector and recent REST API version it supports."
        }
        ("get_rest_version", 200) => {
            "Successful response with a list of version(s) supported by the server."
        }
        ("get_endpoints", 200) => "Successful response with a list of endpoints.",
        ("get_resources", 200) => "Successful response with a list of metainformation.",
        ("get_resources", 404) => "Endpoint not found.",

        ("resource", 200) => "Successful GET, PUT, DELETE operation.",
        ("resource", 201) => "Successful POST operation.",
        ("resource" | "subscribe", 202) => "Accepted. Asynchronous response ID.",
        ("resource", 204) => {
            "Non confirmable request made, this may or may not reach the endpoint. No Content given as response."
        }
        ("resource", 205) => "No cache available for resource.",
        ("resource", 404) => "Requested endpoint's resource is not found.",
        ("resource", 409) => {
            "Conflict. Endpoint is in queue mode and synchronous request can not be made. If noResp=true, the request is not supported."
        }
        ("resource", 410) => "Gone. Endpoint not found.",
        ("resource", 412) => "Request payload has been incomplete.",
        ("resource", 413) => "Precondition failed.",
        ("resource" | "subscribe", 415) => "Media type is not supported by the endpoint.",
        ("resource", 429) => {
            "Cannot make a request at the moment, already ongoing other request for this endpoint or queue is full (for endpoints in queue mode)."
        }
        ("resource", 502) => "TCP or TLS connection to endpoint is not established.",
        ("resource", 503) => {
            "Operation cannot be executed because endpoint is currently unavailable."
        }
        ("resource", 504) => "Operation cannot be executed due to a time-out from the endpoint.",

        ("subscribe", 200) => "Successfully subscribed.",
        ("subscribe", 404) => "Endpoint or its resource not found.",
        ("subscribe", 412) => "Cannot make a subscription for a non-observable resource.",
        ("subscribe", 413) => "Cannot make a subscription due to failed precondition.",
        ("subscribe", 429) => {
            "Cannot make subscription request at the moment due to already ongoing other request for this endpoint or (for endpoints in queue mode) queue is full or queue was cleared because endpoint made full registration."
        }
        ("subscribe", 502) => "Subscription failed.",
        ("subscribe", 503) => {
            "Subscription could not be established because endpoint is currently unavailable."
        }
        ("subscribe", 504) => {
            "Subscription could not be established due to a time-out from the endpoint."
        }

        ("unsubscribe", 200 | 204) => "Successfully removed subscription.",
        ("unsubscribe", 404) => "Endpoint or endpoint's resource not found.",
        ("get_resource_subscription", 200) => "Resource is subscribed.",
        ("get_resource_subscription", 404) => "Resource is not subscribed.",
        ("get_endpoint_subscription", 200) => "List of subscribed resources.",
        ("get_endpoint_subscription", 404) => {
            "Endpoint not found or there are no subscriptions for that endpoint."
        }
        ("delete_endpoint_subscription", 200 | 204) => "Successfully removed.",
        ("delete_endpoint_subscription", 404) => "Endpoint not found.",

        ("presubscription", 200) => "Pre-subscription data returned.",
        ("presubscription", 204) => "Successfully set pre-subscription data.",
        ("presubscription", 400) => "Malformed content.",

        ("put_callback_url", 204) => "Successfully subscribed.",
        ("put_callback_url", 400) => "Given URL is not accessible.",
        ("get_callback_url", 200) => "URL found.",
        ("get_callback_url", 404) => "Callback URL does not exist.",
        ("delete_callback_url", 204) => "Successfully removed.",
        ("delete_callback_url", 404) => "Callback URL does not exist.",

        ("longpoll", 200) => "OK.",
        ("longpoll", 204) => "No new notifications.",
        ("limit", 200) => "OK.",

        _ => "ERROR: Unknown error.",
    }
}
