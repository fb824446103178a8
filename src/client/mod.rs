// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The client facade.
//!
//! Every REST operation returns a [`PendingResult`]:
//!
//! - an immediate answer (`200`, `201`, `204` depending on the operation)
//!   completes it before the method returns;
//! - `202 Accepted` stores it in the correlation table under the returned
//!   `async-response-id`, and the notification channel completes it later;
//! - any other status or a transport failure completes it with a
//!   [`RequestError`].
//!
//! # Examples
//!
//! ```no_run
//! use mdc_client::{Client, ClientConfig, ResourceOptions};
//!
//! # async fn example() -> mdc_client::Result<()> {
//! let client = Client::new(ClientConfig::new("access-key"))?;
//! client.start_channel()?;
//!
//! let pending = client
//!     .get_resource_value("node-001", "/3/0/1", ResourceOptions::new())
//!     .await;
//! pending.wait().await;
//! println!("{:?}", pending.text());
//! # Ok(())
//! # }
//! ```

mod config;

pub use config::{ClientConfig, ENV_ACCESS_KEY, ENV_BASE_URL};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::channel::{LongPoller, NotificationMode};
use crate::correlation::CorrelationTable;
use crate::dispatch::{BatchEvents, DispatchReport, Dispatcher};
use crate::error::{ParseError, RequestError, Result};
use crate::notification::{BatchKind, ResourceNotification};
use crate::operation::{Operation, StatusClass};
use crate::pending::{PendingResult, RequestContext};
use crate::subscription::{self, SubscriptionKey, SubscriptionRouter};
use crate::transport::{ApiRequest, ApiResponse, RequestBody, Transport};

#[cfg(feature = "http")]
use crate::transport::HttpTransport;

/// Options of resource reads.
///
/// When either flag is set, both are sent as `noResp` and `cacheOnly` query
/// parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceOptions {
    no_resp: bool,
    cache_only: bool,
}

impl ResourceOptions {
    /// No options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The endpoint is not expected to answer.
    #[must_use]
    pub fn with_no_resp(mut self, no_resp: bool) -> Self {
        self.no_resp = no_resp;
        self
    }

    /// Answer from the connector cache without waking the endpoint.
    #[must_use]
    pub fn with_cache_only(mut self, cache_only: bool) -> Self {
        self.cache_only = cache_only;
        self
    }

    fn apply(self, request: ApiRequest) -> ApiRequest {
        if !self.no_resp && !self.cache_only {
            return request;
        }
        request
            .with_query("noResp", bool_param(self.no_resp))
            .with_query("cacheOnly", bool_param(self.cache_only))
    }
}

fn bool_param(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Body of a `202 Accepted` answer.
#[derive(Deserialize)]
struct AsyncAccepted {
    #[serde(rename = "async-response-id")]
    id: String,
}

/// Client for the device connector REST API and its notification channel.
pub struct Client<T: Transport> {
    config: ClientConfig,
    transport: Arc<T>,
    dispatcher: Arc<Dispatcher>,
    poller: LongPoller<T>,
}

#[cfg(feature = "http")]
impl Client<HttpTransport> {
    /// Creates a client talking HTTP to the configured service.
    ///
    /// # Errors
    ///
    /// Returns error if the access key is empty, the base URL is invalid, or
    /// the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::builder()
            .access_key(config.access_key())
            .base_url(config.base_url())
            .api_version(config.api_version())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_transport(config, transport))
    }

    /// Creates a client from `MDC_ACCESS_KEY` and `MDC_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns error if the access key is unset or the client cannot be
    /// created.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }
}

impl<T: Transport> Client<T> {
    /// Creates a client over a custom transport.
    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        let transport = Arc::new(transport);
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(CorrelationTable::new()),
            Arc::new(SubscriptionRouter::new()),
        ));
        let poller = LongPoller::new(
            Arc::clone(&transport),
            Arc::clone(&dispatcher),
            config.poll_settings(),
        );
        Self {
            config,
            transport,
            dispatcher,
            poller,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the dispatcher shared with the notification channel.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    // =========================================================================
    // Service information
    // =========================================================================

    /// Reads the connector version.
    pub async fn connector_version(&self) -> PendingResult {
        self.call(
            Operation::ConnectorVersion,
            RequestContext::new(),
            ApiRequest::get("/").unversioned(),
        )
        .await
    }

    /// Lists the REST API versions the service supports.
    pub async fn api_versions(&self) -> PendingResult {
        self.call(
            Operation::ApiVersions,
            RequestContext::new(),
            ApiRequest::get("/rest-versions").unversioned(),
        )
        .await
    }

    /// Reads the account limits.
    pub async fn limits(&self) -> PendingResult {
        self.call(Operation::Limits, RequestContext::new(), ApiRequest::get("/limits"))
            .await
    }

    // =========================================================================
    // Endpoints and resources
    // =========================================================================

    /// Lists registered endpoints, optionally only those of one type.
    pub async fn endpoints(&self, endpoint_type: Option<&str>) -> PendingResult {
        let request = match endpoint_type.filter(|t| !t.is_empty()) {
            Some(t) => ApiRequest::get("/endpoints").with_query("type", t),
            None => ApiRequest::get("/endpoints"),
        };
        self.call(Operation::Endpoints, RequestContext::new(), request)
            .await
    }

    /// Lists the resources of an endpoint.
    pub async fn resources(&self, endpoint: &str, options: ResourceOptions) -> PendingResult {
        let request = options.apply(ApiRequest::get(endpoint_path("/endpoints", endpoint)));
        self.call(
            Operation::Resources,
            RequestContext::for_endpoint(endpoint),
            request,
        )
        .await
    }

    /// Reads a resource value.
    pub async fn get_resource_value(
        &self,
        endpoint: &str,
        resource: &str,
        options: ResourceOptions,
    ) -> PendingResult {
        let request = options.apply(ApiRequest::get(resource_path(
            "/endpoints",
            endpoint,
            resource,
        )));
        self.call(
            Operation::GetResourceValue,
            resource_context(endpoint, resource),
            request,
        )
        .await
    }

    /// Writes a resource value.
    pub async fn put_resource_value(
        &self,
        endpoint: &str,
        resource: &str,
        body: impl Into<RequestBody>,
    ) -> PendingResult {
        let request = ApiRequest::put(resource_path("/endpoints", endpoint, resource))
            .with_body(body.into());
        self.call(
            Operation::PutResourceValue,
            resource_context(endpoint, resource),
            request,
        )
        .await
    }

    /// Executes a resource, with an optional body.
    pub async fn post_resource(
        &self,
        endpoint: &str,
        resource: &str,
        body: Option<RequestBody>,
    ) -> PendingResult {
        let request = ApiRequest::post(resource_path("/endpoints", endpoint, resource));
        let request = match body {
            Some(body) => request.with_body(body),
            None => request,
        };
        self.call(
            Operation::PostResource,
            resource_context(endpoint, resource),
            request,
        )
        .await
    }

    /// Deregisters an endpoint.
    pub async fn delete_endpoint(&self, endpoint: &str) -> PendingResult {
        self.call(
            Operation::DeleteEndpoint,
            RequestContext::for_endpoint(endpoint),
            ApiRequest::delete(endpoint_path("/endpoints", endpoint)),
        )
        .await
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribes to a resource.
    ///
    /// Once the service confirms the subscription, immediately or through an
    /// `async-responses` event, every notification for the resource is passed
    /// to `handler` with its decoded payload.
    pub async fn subscribe<F>(&self, endpoint: &str, resource: &str, handler: F) -> PendingResult
    where
        F: Fn(&[u8], &ResourceNotification) + Send + Sync + 'static,
    {
        let resource = normalize_resource(resource);
        let pending = PendingResult::subscription(endpoint, resource.as_str(), subscription::callback(handler));
        let request = ApiRequest::put(resource_path("/subscriptions", endpoint, &resource));
        self.perform(request, pending).await
    }

    /// Removes the subscription of one resource.
    pub async fn delete_resource_subscription(&self, endpoint: &str, resource: &str) -> PendingResult {
        let pending = self
            .call(
                Operation::DeleteResourceSubscription,
                resource_context(endpoint, resource),
                ApiRequest::delete(resource_path("/subscriptions", endpoint, resource)),
            )
            .await;
        if succeeded(&pending) {
            self.subscriptions()
                .unregister(endpoint, &normalize_resource(resource));
        }
        pending
    }

    /// Removes every subscription of an endpoint.
    pub async fn delete_endpoint_subscriptions(&self, endpoint: &str) -> PendingResult {
        let pending = self
            .call(
                Operation::DeleteEndpointSubscriptions,
                RequestContext::for_endpoint(endpoint),
                ApiRequest::delete(endpoint_path("/subscriptions", endpoint)),
            )
            .await;
        if succeeded(&pending) {
            self.subscriptions().unregister_endpoint(endpoint);
        }
        pending
    }

    /// Removes every subscription of the domain.
    pub async fn delete_all_subscriptions(&self) -> PendingResult {
        let pending = self
            .call(
                Operation::DeleteAllSubscriptions,
                RequestContext::new(),
                ApiRequest::delete("/subscriptions"),
            )
            .await;
        if succeeded(&pending) {
            self.subscriptions().clear();
        }
        pending
    }

    /// Lists the subscribed resources of an endpoint.
    pub async fn endpoint_subscriptions(&self, endpoint: &str) -> PendingResult {
        self.call(
            Operation::EndpointSubscriptions,
            RequestContext::for_endpoint(endpoint),
            ApiRequest::get(endpoint_path("/subscriptions", endpoint)),
        )
        .await
    }

    /// Checks whether a resource is subscribed.
    pub async fn resource_subscription(&self, endpoint: &str, resource: &str) -> PendingResult {
        self.call(
            Operation::ResourceSubscription,
            resource_context(endpoint, resource),
            ApiRequest::get(resource_path("/subscriptions", endpoint, resource)),
        )
        .await
    }

    /// Replaces the pre-subscription rules.
    ///
    /// `rules` is a JSON array of `{"endpoint-name", "endpoint-type",
    /// "resource-path"}` objects.
    pub async fn put_pre_subscription(&self, rules: Value) -> PendingResult {
        self.call(
            Operation::PutPreSubscription,
            RequestContext::new(),
            ApiRequest::put("/subscriptions").with_body(RequestBody::Json(rules)),
        )
        .await
    }

    /// Reads the pre-subscription rules.
    pub async fn pre_subscription(&self) -> PendingResult {
        self.call(
            Operation::GetPreSubscription,
            RequestContext::new(),
            ApiRequest::get("/subscriptions"),
        )
        .await
    }

    // =========================================================================
    // Webhook registration
    // =========================================================================

    /// Registers the URL the service pushes notification batches to.
    ///
    /// `headers` are sent back by the service with every push.
    pub async fn put_callback(
        &self,
        url: &str,
        headers: Option<&BTreeMap<String, String>>,
    ) -> PendingResult {
        let mut body = json!({ "url": url });
        if let Some(headers) = headers.filter(|h| !h.is_empty()) {
            body["headers"] = json!(headers);
        }
        self.call(
            Operation::PutCallback,
            RequestContext::new().with_extra("url", url),
            ApiRequest::put("/notification/callback")
                .unversioned()
                .with_body(RequestBody::Json(body)),
        )
        .await
    }

    /// Reads the registered callback URL.
    pub async fn callback_url(&self) -> PendingResult {
        self.call(
            Operation::GetCallback,
            RequestContext::new(),
            ApiRequest::get("/notification/callback").unversioned(),
        )
        .await
    }

    /// Removes the registered callback URL.
    pub async fn delete_callback(&self) -> PendingResult {
        self.call(
            Operation::DeleteCallback,
            RequestContext::new(),
            ApiRequest::delete("/notification/callback").unversioned(),
        )
        .await
    }

    // =========================================================================
    // Notification delivery
    // =========================================================================

    /// Processes one notification batch, as pushed to a webhook.
    pub fn handle_batch(&self, raw: &[u8]) -> DispatchReport {
        self.dispatcher.handle_batch(raw)
    }

    /// Installs the handler of one batch kind.
    ///
    /// See [`Dispatcher::set_handler`].
    pub fn set_handler<F>(&self, kind: BatchKind, handler: F)
    where
        F: Fn(&BatchEvents<'_>) + Send + Sync + 'static,
    {
        self.dispatcher.set_handler(kind, handler);
    }

    /// Removes the handler of one batch kind.
    pub fn clear_handler(&self, kind: BatchKind) -> bool {
        self.dispatcher.clear_handler(kind)
    }

    /// Starts long polling.
    ///
    /// Returns `Ok(false)` if polling is already running or the client is
    /// configured for webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeUnavailable`](crate::Error::RuntimeUnavailable)
    /// when called outside a tokio runtime.
    pub fn start_channel(&self) -> Result<bool> {
        if self.config.mode() == NotificationMode::Webhook {
            tracing::warn!("Client uses webhook delivery, not starting long polling");
            return Ok(false);
        }
        self.poller.start()
    }

    /// Asks long polling to stop after the current pull.
    pub fn stop_channel(&self) -> bool {
        self.poller.stop()
    }

    /// Stops long polling and waits for the task to exit.
    pub async fn stop_channel_and_wait(&self) {
        self.poller.stop_and_wait().await;
    }

    /// Returns whether long polling is running.
    #[must_use]
    pub fn is_channel_running(&self) -> bool {
        self.poller.is_running()
    }

    /// Gives up on an asynchronous request.
    ///
    /// The pending result completes with an `abandoned` error. Returns
    /// `false` if `token` is not pending.
    pub fn cancel_pending(&self, token: &str) -> bool {
        self.correlations().abandon(token)
    }

    /// Returns the tokens of requests awaiting an `async-responses` event.
    #[must_use]
    pub fn pending_tokens(&self) -> Vec<String> {
        self.correlations().tokens()
    }

    /// Returns the number of requests awaiting an `async-responses` event.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlations().len()
    }

    /// Returns the active notification routes.
    #[must_use]
    pub fn subscriptions_active(&self) -> Vec<SubscriptionKey> {
        self.subscriptions().keys()
    }

    /// Returns whether notifications of a resource are routed.
    #[must_use]
    pub fn is_subscribed(&self, endpoint: &str, resource: &str) -> bool {
        self.subscriptions()
            .contains(endpoint, &normalize_resource(resource))
    }

    // =========================================================================
    // Request execution
    // =========================================================================

    fn correlations(&self) -> &CorrelationTable {
        self.dispatcher.correlations()
    }

    fn subscriptions(&self) -> &SubscriptionRouter {
        self.dispatcher.subscriptions()
    }

    async fn call(
        &self,
        operation: Operation,
        context: RequestContext,
        request: ApiRequest,
    ) -> PendingResult {
        self.perform(request, PendingResult::new(operation, context))
            .await
    }

    async fn perform(&self, request: ApiRequest, pending: PendingResult) -> PendingResult {
        let operation = pending.operation();
        tracing::debug!(%operation, request = %request, "Executing operation");

        match self.transport.execute(&request).await {
            Ok(response) => self.settle(&pending, response),
            Err(e) => {
                tracing::warn!(%operation, error = %e, "Request failed");
                pending.complete_error(RequestError::transport(operation, e.to_string()));
            }
        }
        pending
    }

    fn settle(&self, pending: &PendingResult, response: ApiResponse) {
        let operation = pending.operation();
        let status = response.status();

        match self.config.policy(operation).classify(status) {
            StatusClass::Success => {
                self.dispatcher.promote(pending);
                pending.complete_success(response.into_body(), status);
            }
            StatusClass::Accepted => match parse_accepted(&response) {
                Ok(token) => {
                    self.correlations().insert(token, pending.clone());
                }
                Err(e) => {
                    tracing::warn!(%operation, error = %e, "Accepted response without async response id");
                    pending.complete_error(RequestError::decode(operation, Some(status), &e));
                }
            },
            StatusClass::Failure => {
                tracing::debug!(%operation, status, "Operation rejected by the service");
                pending.complete_error(RequestError::protocol(operation, status));
            }
        }
    }
}

impl<T: Transport> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}

fn parse_accepted(response: &ApiResponse) -> std::result::Result<String, ParseError> {
    let accepted: AsyncAccepted = response.json()?;
    if accepted.id.is_empty() {
        return Err(ParseError::MissingField("async-response-id".to_string()));
    }
    Ok(accepted.id)
}

fn succeeded(pending: &PendingResult) -> bool {
    pending.is_complete() && pending.error().is_none()
}

/// Ensures a resource path starts with `/`.
fn normalize_resource(resource: &str) -> String {
    if resource.starts_with('/') {
        resource.to_string()
    } else {
        format!("/{resource}")
    }
}

fn resource_context(endpoint: &str, resource: &str) -> RequestContext {
    RequestContext::for_resource(endpoint, normalize_resource(resource))
}

fn endpoint_path(prefix: &str, endpoint: &str) -> String {
    format!("{prefix}/{}", urlencoding::encode(endpoint))
}

fn resource_path(prefix: &str, endpoint: &str, resource: &str) -> String {
    format!("{}{}", endpoint_path(prefix, endpoint), normalize_resource(resource))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProtocolError, RequestErrorKind};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Records requests and replays scripted responses.
    #[derive(Default)]
    struct MockTransport {
        responses: Mutex<VecDeque<std::result::Result<ApiResponse, ProtocolError>>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl MockTransport {
        fn replying(responses: Vec<std::result::Result<ApiResponse, ProtocolError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn last_request(&self) -> ApiRequest {
            self.requests.lock().last().cloned().unwrap()
        }
    }

    impl Transport for MockTransport {
        async fn execute(
            &self,
            request: &ApiRequest,
        ) -> std::result::Result<ApiResponse, ProtocolError> {
            self.requests.lock().push(request.clone());
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(ApiResponse::new(500, Vec::new())))
        }
    }

    fn client(responses: Vec<std::result::Result<ApiResponse, ProtocolError>>) -> Client<MockTransport> {
        Client::with_transport(ClientConfig::new("key"), MockTransport::replying(responses))
    }

    fn ok(status: u16, body: &str) -> std::result::Result<ApiResponse, ProtocolError> {
        Ok(ApiResponse::new(status, body.as_bytes().to_vec()))
    }

    #[tokio::test]
    async fn immediate_success_completes() {
        let client = client(vec![ok(200, r#"{"endpoint-quota":100}"#)]);
        let pending = client.limits().await;

        assert!(pending.is_complete());
        assert_eq!(pending.status_code(), Some(200));
        let request = client.transport().last_request();
        assert_eq!(request.path(), "/limits");
        assert!(request.is_versioned());
    }

    #[tokio::test]
    async fn accepted_response_is_correlated() {
        let client = client(vec![ok(202, r#"{"async-response-id":"T7"}"#)]);
        let pending = client
            .get_resource_value("d1", "3/0/1", ResourceOptions::new())
            .await;

        assert!(!pending.is_complete());
        assert_eq!(pending.correlation_id().as_deref(), Some("T7"));
        assert_eq!(client.pending_tokens(), vec!["T7".to_string()]);
        assert_eq!(client.transport().last_request().path(), "/endpoints/d1/3/0/1");

        client.handle_batch(br#"{"async-responses":[{"id":"T7","status":200,"payload":"MjEuNQ=="}]}"#);
        assert_eq!(pending.text().as_deref(), Some("21.5"));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn accepted_without_token_fails_with_decode_error() {
        let client = client(vec![ok(202, "{}")]);
        let pending = client
            .get_resource_value("d1", "/3/0/1", ResourceOptions::new())
            .await;

        assert_eq!(pending.error().unwrap().kind(), RequestErrorKind::Decode);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn accepted_for_immediate_operation_is_a_failure() {
        let client = client(vec![ok(202, r#"{"async-response-id":"T1"}"#)]);
        let pending = client.limits().await;

        assert_eq!(pending.error().unwrap().kind(), RequestErrorKind::Protocol);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn unexpected_status_uses_classification_table() {
        let client = client(vec![ok(410, "")]);
        let pending = client
            .get_resource_value("d1", "/3/0/1", ResourceOptions::new())
            .await;

        let error = pending.error().unwrap();
        assert_eq!(error.kind(), RequestErrorKind::Protocol);
        assert_eq!(error.status_code(), Some(410));
        assert_eq!(error.message(), "Gone. Endpoint not found.");
    }

    #[tokio::test]
    async fn transport_failure_completes_with_error() {
        let client = client(vec![Err(ProtocolError::ConnectionFailed("refused".to_string()))]);
        let pending = client.api_versions().await;

        let error = pending.error().unwrap();
        assert_eq!(error.kind(), RequestErrorKind::Transport);
        assert!(error.message().contains("refused"));
    }

    #[tokio::test]
    async fn resource_options_add_both_parameters() {
        let client = client(vec![ok(200, "[]")]);
        client
            .resources("d1", ResourceOptions::new().with_cache_only(true))
            .await;

        let request = client.transport().last_request();
        assert_eq!(
            request.query(),
            &[
                ("noResp".to_string(), "false".to_string()),
                ("cacheOnly".to_string(), "true".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn endpoint_names_are_encoded() {
        let client = client(vec![ok(200, "[]")]);
        client.resources("node 1", ResourceOptions::new()).await;
        assert_eq!(client.transport().last_request().path(), "/endpoints/node%201");
    }

    #[tokio::test]
    async fn immediate_subscription_registers_route() {
        let client = client(vec![ok(200, "")]);
        let pending = client.subscribe("d1", "/3/0/1", |_, _| {}).await;

        assert!(pending.is_complete());
        assert!(client.is_subscribed("d1", "/3/0/1"));
        let request = client.transport().last_request();
        assert_eq!(request.path(), "/subscriptions/d1/3/0/1");
    }

    #[tokio::test]
    async fn async_subscription_is_promoted_on_response() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = Arc::clone(&received);
        let client = client(vec![ok(202, r#"{"async-response-id":"T42"}"#)]);

        let pending = client
            .subscribe("d1", "/3/0/1", move |payload, _| {
                received_clone.lock().push(payload.to_vec());
            })
            .await;
        assert!(!client.is_subscribed("d1", "/3/0/1"));

        client.handle_batch(br#"{"async-responses":[{"id":"T42","status":200}]}"#);
        assert!(pending.is_complete());
        assert!(client.is_subscribed("d1", "/3/0/1"));

        client.handle_batch(br#"{"notifications":[{"ep":"d1","path":"/3/0/1","payload":"aGVsbG8="}]}"#);
        assert_eq!(*received.lock(), vec![b"hello".to_vec()]);
    }

    #[tokio::test]
    async fn rejected_subscription_registers_nothing() {
        let client = client(vec![ok(412, "")]);
        let pending = client.subscribe("d1", "/3/0/1", |_, _| {}).await;
        assert!(pending.error().is_some());
        assert!(client.subscriptions_active().is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_drops_routes() {
        let client = client(vec![
            ok(200, ""),
            ok(200, ""),
            ok(200, ""),
            ok(204, ""),
            ok(200, ""),
            ok(204, ""),
        ]);
        client.subscribe("d1", "/3/0/1", |_, _| {}).await;
        client.subscribe("d1", "/3/0/2", |_, _| {}).await;
        client.subscribe("d2", "/1", |_, _| {}).await;

        client.delete_resource_subscription("d1", "/3/0/1").await;
        assert!(!client.is_subscribed("d1", "/3/0/1"));
        assert!(client.is_subscribed("d1", "/3/0/2"));

        client.delete_endpoint_subscriptions("d1").await;
        assert!(!client.is_subscribed("d1", "/3/0/2"));
        assert!(client.is_subscribed("d2", "/1"));

        let pending = client.delete_all_subscriptions().await;
        assert_eq!(pending.status_code(), Some(204));
        assert!(client.subscriptions_active().is_empty());
    }

    #[tokio::test]
    async fn failed_unsubscribe_keeps_routes() {
        let client = client(vec![ok(200, ""), ok(404, "")]);
        client.subscribe("d1", "/3/0/1", |_, _| {}).await;
        client.delete_resource_subscription("d1", "/3/0/1").await;
        assert!(client.is_subscribed("d1", "/3/0/1"));
    }

    #[tokio::test]
    async fn success_code_override_is_applied() {
        let config = ClientConfig::new("key").with_success_codes(Operation::DeleteAllSubscriptions, &[204]);
        let client = Client::with_transport(config, MockTransport::replying(vec![ok(200, "")]));
        let pending = client.delete_all_subscriptions().await;
        assert_eq!(pending.error().unwrap().kind(), RequestErrorKind::Protocol);
    }

    #[tokio::test]
    async fn callback_requests_are_unversioned() {
        let client = client(vec![ok(204, ""), ok(200, r#"{"url":"http://hook"}"#), ok(204, "")]);

        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "token".to_string());
        let pending = client.put_callback("http://hook", Some(&headers)).await;
        assert!(pending.error().is_none());
        let request = client.transport().last_request();
        assert!(!request.is_versioned());
        assert_eq!(
            request.body(),
            Some(&RequestBody::Json(
                json!({"url": "http://hook", "headers": {"Authorization": "token"}})
            ))
        );

        client.callback_url().await;
        client.delete_callback().await;
        assert!(!client.transport().last_request().is_versioned());
    }

    #[tokio::test]
    async fn cancel_pending_abandons_request() {
        let client = client(vec![ok(202, r#"{"async-response-id":"T9"}"#)]);
        let pending = client.delete_endpoint("d1").await;

        assert!(client.cancel_pending("T9"));
        assert_eq!(pending.error().unwrap().kind(), RequestErrorKind::Abandoned);
        assert!(!client.cancel_pending("T9"));
    }

    #[tokio::test]
    async fn webhook_mode_does_not_poll() {
        let config = ClientConfig::new("key").with_mode(NotificationMode::Webhook);
        let client = Client::with_transport(config, MockTransport::default());
        assert!(!client.start_channel().unwrap());
        assert!(!client.is_channel_running());
    }

    #[test]
    fn paths_are_normalized() {
        assert_eq!(normalize_resource("3/0/1"), "/3/0/1");
        assert_eq!(normalize_resource("/3/0/1"), "/3/0/1");
        assert_eq!(resource_path("/endpoints", "d1", "3/0/1"), "/endpoints/d1/3/0/1");
    }
}
