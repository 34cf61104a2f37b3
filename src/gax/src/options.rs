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

//! Client configuration and per request options.
//!
//! The defaults are intended to work for most applications. Some applications
//! need to change them, for example to target a sovereign cloud endpoint, or
//! to bound how long they are willing to wait for an operation.
//!
//! [ClientConfig] holds the defaults for all the operations started by a
//! client. [RequestOptions] overrides some of them for a single operation.
//! Each knob is resolved in that order: the request options first, then the
//! client configuration, then the built-in default.

use crate::backoff_policy::{BackoffPolicy, BackoffPolicyArg};
use crate::polling_backoff_policy::{PollingBackoffPolicy, PollingBackoffPolicyArg};
use crate::polling_error_policy::{PollingErrorPolicy, PollingErrorPolicyArg};
use crate::retry_policy::{RetryPolicy, RetryPolicyArg};
use std::sync::Arc;
use std::time::Duration;

/// The default endpoint for the Azure public cloud.
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

const TRACING_VAR: &str = "AZURE_ARM_RUST_TRACING";

/// Configure a client.
///
/// A client represents a connection to Azure Resource Manager. The default
/// configuration should work for most applications. But some applications may
/// need to override the endpoint, the API version, the retry and polling
/// policies, and/or other behaviors of the client.
#[derive(Clone, Debug, Default)]
pub struct ClientConfig {
    endpoint: Option<String>,
    api_version: Option<String>,
    user_agent: Option<String>,
    tracing: bool,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    backoff_policy: Option<Arc<dyn BackoffPolicy>>,
    polling_error_policy: Option<Arc<dyn PollingErrorPolicy>>,
    polling_backoff_policy: Option<Arc<dyn PollingBackoffPolicy>>,
    polling_deadline: Option<Duration>,
    attempt_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Returns a default [ClientConfig].
    pub fn new() -> Self {
        Self::default()
    }

    /// The endpoint, defaults to [DEFAULT_ENDPOINT].
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    /// Sets an endpoint that overrides the default endpoint.
    pub fn set_endpoint<T: Into<String>>(mut self, v: T) -> Self {
        self.endpoint = Some(v.into());
        self
    }

    /// The default `api-version` for operations started by this client.
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// Sets the default `api-version`.
    pub fn set_api_version<T: Into<String>>(mut self, v: T) -> Self {
        self.api_version = Some(v.into());
        self
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Sets the `user-agent` header.
    pub fn set_user_agent<T: Into<String>>(mut self, v: T) -> Self {
        self.user_agent = Some(v.into());
        self
    }

    /// Returns true if tracing is enabled, either in the configuration or via
    /// the `AZURE_ARM_RUST_TRACING=true` environment variable.
    pub fn tracing_enabled(&self) -> bool {
        if self.tracing {
            return true;
        }
        std::env::var(TRACING_VAR)
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    /// Enables tracing.
    pub fn enable_tracing(mut self) -> Self {
        self.tracing = true;
        self
    }

    /// Disables tracing.
    pub fn disable_tracing(mut self) -> Self {
        self.tracing = false;
        self
    }

    pub fn retry_policy(&self) -> &Option<Arc<dyn RetryPolicy>> {
        &self.retry_policy
    }

    /// Configure the retry policy for the initiating requests.
    pub fn set_retry_policy<V: Into<RetryPolicyArg>>(mut self, v: V) -> Self {
        self.retry_policy = Some(v.into().0);
        self
    }

    pub fn backoff_policy(&self) -> &Option<Arc<dyn BackoffPolicy>> {
        &self.backoff_policy
    }

    /// Configure the retry backoff policy.
    pub fn set_backoff_policy<V: Into<BackoffPolicyArg>>(mut self, v: V) -> Self {
        self.backoff_policy = Some(v.into().0);
        self
    }

    pub fn polling_error_policy(&self) -> &Option<Arc<dyn PollingErrorPolicy>> {
        &self.polling_error_policy
    }

    /// Configure the polling error policy.
    pub fn set_polling_error_policy<V: Into<PollingErrorPolicyArg>>(mut self, v: V) -> Self {
        self.polling_error_policy = Some(v.into().0);
        self
    }

    pub fn polling_backoff_policy(&self) -> &Option<Arc<dyn PollingBackoffPolicy>> {
        &self.polling_backoff_policy
    }

    /// Configure the polling backoff policy.
    pub fn set_polling_backoff_policy<V: Into<PollingBackoffPolicyArg>>(mut self, v: V) -> Self {
        self.polling_backoff_policy = Some(v.into().0);
        self
    }

    pub fn polling_deadline(&self) -> Option<Duration> {
        self.polling_deadline
    }

    /// Bounds the total time spent waiting for an operation to complete.
    ///
    /// Reaching the deadline fails the wait with a
    /// [timeout][crate::error::Error::is_timeout] error. The operation itself
    /// continues on the service.
    pub fn set_polling_deadline<V: Into<Duration>>(mut self, v: V) -> Self {
        self.polling_deadline = Some(v.into());
        self
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    /// Sets the timeout for each HTTP request.
    pub fn set_attempt_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.attempt_timeout = Some(v.into());
        self
    }
}

/// A set of options configuring a single operation.
///
/// Any knob left unset falls back to the [ClientConfig].
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    idempotent: Option<bool>,
    api_version: Option<String>,
    headers: http::HeaderMap,
    attempt_timeout: Option<Duration>,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    backoff_policy: Option<Arc<dyn BackoffPolicy>>,
    polling_error_policy: Option<Arc<dyn PollingErrorPolicy>>,
    polling_backoff_policy: Option<Arc<dyn PollingBackoffPolicy>>,
    polling_deadline: Option<Duration>,
}

impl RequestOptions {
    /// Gets the idempotency
    pub fn idempotent(&self) -> Option<bool> {
        self.idempotent
    }

    /// Treat the operation underlying this request as idempotent.
    ///
    /// Only idempotent requests are retried after transport errors and most
    /// server errors.
    pub fn set_idempotency(&mut self, value: bool) {
        self.idempotent = Some(value);
    }

    /// Set the idempotency for the underlying operation, unless it is already set.
    pub fn set_default_idempotency(&mut self, default: bool) {
        self.idempotent.get_or_insert(default);
    }

    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// Overrides the `api-version` for this operation.
    pub fn set_api_version<T: Into<String>>(&mut self, v: T) {
        self.api_version = Some(v.into());
    }

    /// Extra headers sent with the initiating request and every poll request.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.headers
    }

    /// Adds a header sent with every request for this operation.
    ///
    /// Typically used for `x-ms-client-request-id`.
    pub fn set_header(&mut self, name: http::HeaderName, value: http::HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn attempt_timeout(&self) -> &Option<Duration> {
        &self.attempt_timeout
    }

    /// Sets the per-attempt timeout.
    ///
    /// The overall time spent in the retry loop is bounded by the retry
    /// policy.
    pub fn set_attempt_timeout<T: Into<Duration>>(&mut self, v: T) {
        self.attempt_timeout = Some(v.into());
    }

    pub fn retry_policy(&self) -> &Option<Arc<dyn RetryPolicy>> {
        &self.retry_policy
    }

    /// Sets the retry policy configuration.
    pub fn set_retry_policy<V: Into<RetryPolicyArg>>(&mut self, v: V) {
        self.retry_policy = Some(v.into().0);
    }

    pub fn backoff_policy(&self) -> &Option<Arc<dyn BackoffPolicy>> {
        &self.backoff_policy
    }

    /// Sets the backoff policy configuration.
    pub fn set_backoff_policy<V: Into<BackoffPolicyArg>>(&mut self, v: V) {
        self.backoff_policy = Some(v.into().0);
    }

    pub fn polling_error_policy(&self) -> &Option<Arc<dyn PollingErrorPolicy>> {
        &self.polling_error_policy
    }

    /// Sets the polling error policy configuration.
    pub fn set_polling_error_policy<V: Into<PollingErrorPolicyArg>>(&mut self, v: V) {
        self.polling_error_policy = Some(v.into().0);
    }

    pub fn polling_backoff_policy(&self) -> &Option<Arc<dyn PollingBackoffPolicy>> {
        &self.polling_backoff_policy
    }

    /// Sets the polling backoff policy configuration.
    pub fn set_polling_backoff_policy<V: Into<PollingBackoffPolicyArg>>(&mut self, v: V) {
        self.polling_backoff_policy = Some(v.into().0);
    }

    pub fn polling_deadline(&self) -> &Option<Duration> {
        &self.polling_deadline
    }

    /// Bounds the total time spent waiting for this operation.
    pub fn set_polling_deadline<V: Into<Duration>>(&mut self, v: V) {
        self.polling_deadline = Some(v.into());
    }
}
