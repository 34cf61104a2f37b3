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

use gax::http_client::{AZURE_ASYNC_OPERATION, HttpRequest, HttpResponse};
use http::{HeaderMap, HeaderName, Method};
use url::Url;

/// How the poll URL for an operation was discovered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollTarget {
    /// The `Azure-AsyncOperation` header, pointing to an operation-status resource.
    AsyncOperation,
    /// The `Location` header.
    Location,
    /// The resource targeted by the initiating request.
    Resource,
}

/// The request used to poll one long-running operation.
///
/// The URL is captured from the initiating response and never changes for
/// the life of the operation.
#[derive(Clone, Debug)]
pub struct PollingRequest {
    origin_method: Method,
    target: PollTarget,
    url: Url,
    headers: HeaderMap,
}

impl PollingRequest {
    /// Discovers the poll target from the response to the initiating request.
    ///
    /// The `Azure-AsyncOperation` header takes priority over the `Location`
    /// header, which takes priority over the resource itself. Header URLs are
    /// used verbatim, they already contain any required query parameters.
    /// Headers that do not contain an absolute URL are ignored.
    ///
    /// # Parameters
    /// * `origin_method` - the method of the initiating request.
    /// * `resource_url` - the URL of the initiating request, including the
    ///   `api-version` query parameter.
    /// * `response` - the response to the initiating request.
    pub fn from_initial(origin_method: &Method, resource_url: &Url, response: &HttpResponse) -> Self {
        let (target, url) = header_url(&response.headers, &AZURE_ASYNC_OPERATION)
            .map(|u| (PollTarget::AsyncOperation, u))
            .or_else(|| {
                header_url(&response.headers, &http::header::LOCATION)
                    .map(|u| (PollTarget::Location, u))
            })
            .unwrap_or_else(|| (PollTarget::Resource, resource_url.clone()));
        Self {
            origin_method: origin_method.clone(),
            target,
            url,
            headers: HeaderMap::new(),
        }
    }

    /// Adds headers sent with every poll request.
    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    pub fn origin_method(&self) -> &Method {
        &self.origin_method
    }

    pub fn target(&self) -> PollTarget {
        self.target
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Creates the HTTP request for one poll attempt.
    ///
    /// Poll requests are always `GET` requests without a body.
    pub fn to_http_request(&self) -> HttpRequest {
        HttpRequest::new(Method::GET, self.url.clone()).set_headers(&self.headers)
    }
}

fn header_url(headers: &HeaderMap, name: &HeaderName) -> Option<Url> {
    let value = headers.get(name)?.to_str().ok()?;
    Url::parse(value.trim()).ok()
}
