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

use crate::Result;
use crate::error::Error;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use std::time::Duration;
use url::Url;

/// The `Azure-AsyncOperation` header, pointing to an operation-status resource.
pub const AZURE_ASYNC_OPERATION: HeaderName = HeaderName::from_static("azure-asyncoperation");

/// One HTTP request, fully prepared.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Creates a new request without headers or body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Sets a header, replacing any previous value.
    pub fn set_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Adds all the headers in `v`, replacing any previous values.
    pub fn set_headers(mut self, v: &HeaderMap) -> Self {
        for (name, value) in v {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Sets a JSON body and the matching `content-type` header.
    pub fn set_json_body<T: Into<Bytes>>(mut self, v: T) -> Self {
        self.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(v.into());
        self
    }
}

/// The status, headers, and body of one HTTP response.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates a new response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Decodes the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice::<T>(&self.body).map_err(Error::deser)
    }

    /// Decodes the body as JSON, returning `T::default()` for empty bodies.
    ///
    /// ARM returns empty bodies with `204 No Content`, and with some `200 OK`
    /// responses to `DELETE` requests.
    pub fn json_or_default<T: serde::de::DeserializeOwned + Default>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Ok(T::default());
        }
        self.json()
    }

    /// The server-requested delay before the next request, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        retry_after(&self.headers)
    }

    /// Converts the response into an [unexpected status][Error::is_unexpected_status] error.
    pub fn into_error(self) -> Error {
        Error::unexpected_status(self.status.as_u16(), self.headers, self.body)
    }
}

/// Parses the `Retry-After` header.
///
/// ARM sends the delay as an integer number of seconds. Other formats,
/// including HTTP dates, negative and fractional values, are ignored.
///
/// # Example
/// ```
/// # use azure_arm_gax::http_client::retry_after;
/// use std::time::Duration;
/// let mut headers = http::HeaderMap::new();
/// headers.insert("retry-after", http::HeaderValue::from_static("5"));
/// assert_eq!(retry_after(&headers), Some(Duration::from_secs(5)));
/// ```
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(http::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Sends HTTP requests on behalf of the ARM clients.
///
/// Implementations must be safe to share between concurrent operations. Any
/// HTTP status, including error statuses, is returned as a successful
/// [HttpResponse]; only requests that do not produce a response are errors.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync + std::fmt::Debug {
    /// Sends one request.
    ///
    /// # Parameters
    /// * `request` - the request to send.
    /// * `timeout` - the maximum time for this attempt, if any. Timeouts are
    ///   reported as [Error::timeout].
    async fn execute(&self, request: HttpRequest, timeout: Option<Duration>)
    -> Result<HttpResponse>;
}

/// The default [HttpClient], based on [reqwest].
///
/// Clones share the same connection pool.
#[derive(Clone, Debug)]
pub struct ReqwestClient {
    inner: reqwest::Client,
    user_agent: Option<HeaderValue>,
}

impl ReqwestClient {
    /// Creates a new client with its own connection pool.
    pub fn new() -> Self {
        Self::from_client(reqwest::Client::new())
    }

    /// Creates a client wrapping an existing [reqwest::Client].
    pub fn from_client(inner: reqwest::Client) -> Self {
        Self {
            inner,
            user_agent: None,
        }
    }

    /// Sets the `user-agent` header in all requests.
    pub fn with_user_agent(mut self, v: &str) -> Result<Self> {
        self.user_agent = Some(HeaderValue::from_str(v).map_err(Error::ser)?);
        Ok(self)
    }

    fn map_send_error(err: reqwest::Error) -> Error {
        match err {
            e if e.is_timeout() => Error::timeout(e),
            e => Error::io(e),
        }
    }
}

impl std::default::Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(
        &self,
        request: HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse> {
        let mut builder = self
            .inner
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(user_agent) = &self.user_agent {
            builder = builder.header(http::header::USER_AGENT, user_agent.clone());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder = timeout.into_iter().fold(builder, |b, t| b.timeout(t));
        let response = builder.send().await.map_err(Self::map_send_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(Self::map_send_error)?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
