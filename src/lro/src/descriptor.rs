// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Data-driven ARM operations.
//!
//! Every ARM operation is described by an [OperationDescriptor]: the HTTP
//! method, the path template, the status codes that indicate the request was
//! accepted, and whether the operation is asynchronous. A single
//! [ArmClient] executes any descriptor.

use crate::future::OperationFuture;
use crate::{Error, Result};
use gax::backoff_policy::BackoffPolicy;
use gax::exponential_backoff::ExponentialBackoff;
use gax::http_client::{HttpClient, HttpRequest, HttpResponse, ReqwestClient};
use gax::options::{ClientConfig, RequestOptions};
use gax::polling_backoff_policy::PollingBackoffPolicy;
use gax::polling_error_policy::{self, PollingErrorPolicy, PollingErrorPolicyExt};
use gax::retry_loop_internal::{effective_timeout, retry_loop};
use gax::retry_policy::{self, RetryPolicy, RetryPolicyExt};
use http::{HeaderValue, Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use url::Url;

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Describes one ARM operation.
///
/// # Example
/// ```
/// # use azure_arm_lro::OperationDescriptor;
/// use http::StatusCode;
/// let purge = OperationDescriptor::post(
///     "/subscriptions/{subscriptionId}/providers/Microsoft.KeyVault/locations/{location}/deletedVaults/{vaultName}/purge",
/// )
/// .with_expected_statuses([StatusCode::OK, StatusCode::ACCEPTED]);
/// assert!(purge.long_running());
/// assert!(!purge.idempotent());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct OperationDescriptor {
    method: Method,
    path_template: String,
    expected_statuses: Vec<StatusCode>,
    long_running: bool,
    idempotent: bool,
}

impl OperationDescriptor {
    /// Creates a descriptor.
    ///
    /// Prefer the method-specific constructors, which set the expected
    /// statuses and idempotency used by ARM for each method.
    pub fn new<T: Into<String>>(method: Method, path_template: T) -> Self {
        Self {
            method,
            path_template: path_template.into(),
            expected_statuses: vec![StatusCode::OK],
            long_running: false,
            idempotent: false,
        }
    }

    /// A create-or-update operation, accepted with `200 OK`, `201 Created` or
    /// `202 Accepted`.
    pub fn put<T: Into<String>>(path_template: T) -> Self {
        Self::new(Method::PUT, path_template)
            .with_expected_statuses([StatusCode::OK, StatusCode::CREATED, StatusCode::ACCEPTED])
            .with_long_running(true)
            .with_idempotency(true)
    }

    /// An update operation, accepted with `200 OK` or `202 Accepted`.
    pub fn patch<T: Into<String>>(path_template: T) -> Self {
        Self::new(Method::PATCH, path_template)
            .with_expected_statuses([StatusCode::OK, StatusCode::ACCEPTED])
            .with_long_running(true)
    }

    /// An action, accepted with `200 OK`, `202 Accepted` or `204 No Content`.
    pub fn post<T: Into<String>>(path_template: T) -> Self {
        Self::new(Method::POST, path_template)
            .with_expected_statuses([StatusCode::OK, StatusCode::ACCEPTED, StatusCode::NO_CONTENT])
            .with_long_running(true)
    }

    /// A delete operation, accepted with `200 OK`, `202 Accepted` or `204 No Content`.
    pub fn delete<T: Into<String>>(path_template: T) -> Self {
        Self::new(Method::DELETE, path_template)
            .with_expected_statuses([StatusCode::OK, StatusCode::ACCEPTED, StatusCode::NO_CONTENT])
            .with_long_running(true)
            .with_idempotency(true)
    }

    /// A read operation, completing with `200 OK`.
    pub fn get<T: Into<String>>(path_template: T) -> Self {
        Self::new(Method::GET, path_template).with_idempotency(true)
    }

    /// Replaces the statuses that indicate the request was accepted.
    pub fn with_expected_statuses<I: IntoIterator<Item = StatusCode>>(mut self, v: I) -> Self {
        self.expected_statuses = v.into_iter().collect();
        self
    }

    pub fn with_long_running(mut self, v: bool) -> Self {
        self.long_running = v;
        self
    }

    pub fn with_idempotency(mut self, v: bool) -> Self {
        self.idempotent = v;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path_template(&self) -> &str {
        &self.path_template
    }

    pub fn expected_statuses(&self) -> &[StatusCode] {
        &self.expected_statuses
    }

    /// Returns true if `status` indicates the request was accepted.
    pub fn is_expected(&self, status: StatusCode) -> bool {
        self.expected_statuses.contains(&status)
    }

    pub fn long_running(&self) -> bool {
        self.long_running
    }

    pub fn idempotent(&self) -> bool {
        self.idempotent
    }
}

#[derive(thiserror::Error, Debug)]
#[error("no api-version configured for `{0}`, set it in the client config or the request options")]
struct MissingApiVersion(String);

/// Executes ARM operations.
///
/// Clones share the HTTP connection pool and the configuration. Any number of
/// operations may run concurrently.
#[derive(Clone, Debug)]
pub struct ArmClient {
    inner: Arc<dyn HttpClient>,
    config: Arc<ClientConfig>,
}

impl ArmClient {
    /// Creates a client using the default HTTP client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut client = ReqwestClient::new();
        if let Some(user_agent) = config.user_agent() {
            client = client.with_user_agent(user_agent)?;
        }
        Ok(Self::from_http_client(Arc::new(client), config))
    }

    /// Creates a client that sends all requests via `inner`.
    ///
    /// Useful to share a connection pool with other code, or to send requests
    /// through a test double.
    pub fn from_http_client(inner: Arc<dyn HttpClient>, config: ClientConfig) -> Self {
        if config.tracing_enabled() {
            tracing::info!(endpoint = config.endpoint(), "ARM client created");
        }
        Self {
            inner,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Starts a long-running operation.
    ///
    /// Expands the path template, sends the initiating request with retries,
    /// and returns an [OperationFuture] to wait for the result.
    ///
    /// # Parameters
    /// * `descriptor` - the operation.
    /// * `path_params` - the values for the path template placeholders.
    /// * `body` - the request body, if any, serialized as JSON.
    /// * `options` - overrides the client configuration for this operation.
    pub async fn start<I, O>(
        &self,
        descriptor: &OperationDescriptor,
        path_params: &[(&str, &str)],
        body: Option<&I>,
        options: RequestOptions,
    ) -> Result<OperationFuture<O>>
    where
        I: serde::ser::Serialize + ?Sized,
        O: serde::de::DeserializeOwned,
    {
        let url = self.resource_url(descriptor, path_params, &options)?;
        let request = self.initiating_request(descriptor, url.clone(), body, &options)?;
        let fut = async {
            let response = self.send(descriptor, request, &options).await?;
            OperationFuture::new(self, descriptor, url, response, &options)
        };
        if self.config.tracing_enabled() {
            let span = tracing::info_span!(
                "arm_operation",
                method = %descriptor.method(),
                path_template = descriptor.path_template()
            );
            return fut.instrument(span).await;
        }
        fut.await
    }

    /// Executes an operation that completes with the initiating request.
    ///
    /// The response body is decoded directly. An empty body decodes as JSON
    /// `null`.
    pub async fn execute<I, O>(
        &self,
        descriptor: &OperationDescriptor,
        path_params: &[(&str, &str)],
        body: Option<&I>,
        options: RequestOptions,
    ) -> Result<O>
    where
        I: serde::ser::Serialize + ?Sized,
        O: serde::de::DeserializeOwned,
    {
        let url = self.resource_url(descriptor, path_params, &options)?;
        let request = self.initiating_request(descriptor, url, body, &options)?;
        let response = self.send(descriptor, request, &options).await?;
        if !descriptor.is_expected(response.status) {
            return Err(response.into_error());
        }
        crate::poller::decode_model(&response)
    }

    fn resource_url(
        &self,
        descriptor: &OperationDescriptor,
        path_params: &[(&str, &str)],
        options: &RequestOptions,
    ) -> Result<Url> {
        let path = gax::path_parameter::expand(descriptor.path_template(), path_params)?;
        let api_version = options
            .api_version()
            .or_else(|| self.config.api_version())
            .ok_or_else(|| {
                Error::binding(MissingApiVersion(descriptor.path_template().to_string()))
            })?;
        let endpoint = self.config.endpoint().trim_end_matches('/');
        let mut url = Url::parse(&format!("{endpoint}{path}")).map_err(Error::binding)?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    fn initiating_request<I>(
        &self,
        descriptor: &OperationDescriptor,
        url: Url,
        body: Option<&I>,
        options: &RequestOptions,
    ) -> Result<HttpRequest>
    where
        I: serde::ser::Serialize + ?Sized,
    {
        let request = HttpRequest::new(descriptor.method().clone(), url)
            .set_header(
                http::header::ACCEPT,
                HeaderValue::from_static("application/json"),
            )
            .set_headers(options.headers());
        let Some(body) = body else {
            return Ok(request);
        };
        let body = serde_json::to_vec(body).map_err(Error::ser)?;
        Ok(request.set_json_body(body))
    }

    /// Sends the initiating request, retrying transient failures.
    ///
    /// Responses with error statuses become errors, so the retry policy can
    /// examine them.
    async fn send(
        &self,
        descriptor: &OperationDescriptor,
        request: HttpRequest,
        options: &RequestOptions,
    ) -> Result<HttpResponse> {
        let idempotent = options.idempotent().unwrap_or(descriptor.idempotent());
        let attempt_timeout = self.get_attempt_timeout(options);
        let inner = async |remaining: Option<Duration>| {
            let timeout = effective_timeout(attempt_timeout, remaining);
            let response = self.inner.execute(request.clone(), timeout).await?;
            if response.status.is_client_error() || response.status.is_server_error() {
                return Err(response.into_error());
            }
            Ok(response)
        };
        retry_loop(
            inner,
            async |d| tokio::time::sleep(d).await,
            idempotent,
            self.get_retry_policy(options),
            self.get_backoff_policy(options),
        )
        .await
    }

    pub(crate) fn http_client(&self) -> Arc<dyn HttpClient> {
        self.inner.clone()
    }

    pub(crate) fn get_retry_policy(&self, options: &RequestOptions) -> Arc<dyn RetryPolicy> {
        options
            .retry_policy()
            .clone()
            .or_else(|| self.config.retry_policy().clone())
            .unwrap_or_else(|| {
                Arc::new(retry_policy::ArmStrict.with_attempt_limit(DEFAULT_RETRY_ATTEMPTS))
            })
    }

    pub(crate) fn get_backoff_policy(&self, options: &RequestOptions) -> Arc<dyn BackoffPolicy> {
        options
            .backoff_policy()
            .clone()
            .or_else(|| self.config.backoff_policy().clone())
            .unwrap_or_else(|| Arc::new(ExponentialBackoff::default()))
    }

    pub(crate) fn get_polling_error_policy(
        &self,
        options: &RequestOptions,
    ) -> Arc<dyn PollingErrorPolicy> {
        options
            .polling_error_policy()
            .clone()
            .or_else(|| self.config.polling_error_policy().clone())
            .unwrap_or_else(|| {
                Arc::new(
                    polling_error_policy::ArmStrict
                        .with_error_limit(polling_error_policy::DEFAULT_ERROR_LIMIT),
                )
            })
    }

    pub(crate) fn get_polling_backoff_policy(
        &self,
        options: &RequestOptions,
    ) -> Arc<dyn PollingBackoffPolicy> {
        options
            .polling_backoff_policy()
            .clone()
            .or_else(|| self.config.polling_backoff_policy().clone())
            .unwrap_or_else(|| Arc::new(ExponentialBackoff::default()))
    }

    pub(crate) fn get_polling_deadline(&self, options: &RequestOptions) -> Option<Duration> {
        options
            .polling_deadline()
            .or_else(|| self.config.polling_deadline())
    }

    pub(crate) fn get_attempt_timeout(&self, options: &RequestOptions) -> Option<Duration> {
        options
            .attempt_timeout()
            .or_else(|| self.config.attempt_timeout())
    }
}
