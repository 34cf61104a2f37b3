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

//! Classify ARM responses into operation states.
//!
//! ARM reports the progress of an operation in one of three ways: a `status`
//! field in the body of an operation-status resource, a
//! `properties.provisioningState` field in the body of the resource itself,
//! or only through the HTTP status code.

use crate::polling_request::PollTarget;
use gax::http_client::{AZURE_ASYNC_OPERATION, HttpResponse};
use http::{Method, StatusCode};

/// The state of a long-running operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    /// The operation has not completed.
    InProgress,
    /// The operation completed successfully.
    Succeeded,
    /// The operation completed with an error.
    Failed,
    /// The operation was canceled on the service.
    Canceled,
}

impl PollState {
    /// Maps an ARM status string, ignoring case.
    ///
    /// Both spellings of "canceled" are accepted. Any value other than the
    /// terminal states, including `Running`, `Accepted`, and unknown values,
    /// means the operation is still in progress.
    ///
    /// # Example
    /// ```
    /// # use azure_arm_lro::PollState;
    /// assert_eq!(PollState::from_status_str("succeeded"), PollState::Succeeded);
    /// assert_eq!(PollState::from_status_str("Cancelled"), PollState::Canceled);
    /// assert_eq!(PollState::from_status_str("Updating"), PollState::InProgress);
    /// ```
    pub fn from_status_str(status: &str) -> Self {
        if status.eq_ignore_ascii_case("succeeded") {
            return Self::Succeeded;
        }
        if status.eq_ignore_ascii_case("failed") {
            return Self::Failed;
        }
        if status.eq_ignore_ascii_case("canceled") || status.eq_ignore_ascii_case("cancelled") {
            return Self::Canceled;
        }
        Self::InProgress
    }

    /// Returns true for `Succeeded`, `Failed` and `Canceled`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InProgress => "InProgress",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
        };
        f.write_str(s)
    }
}

/// Extracts the status field from a response body.
///
/// Returns the top-level `status` field if present, else
/// `properties.provisioningState`. Returns `None` for bodies that are not JSON
/// objects, or when neither field is a non-empty string.
pub fn status_field(body: &[u8]) -> Option<String> {
    let value = serde_json::from_slice::<serde_json::Value>(body).ok()?;
    value
        .get("status")
        .and_then(serde_json::Value::as_str)
        .or_else(|| {
            value
                .pointer("/properties/provisioningState")
                .and_then(serde_json::Value::as_str)
        })
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Classifies the response to a poll request.
///
/// # Parameters
/// * `response` - the response to the poll request.
/// * `target` - how the poll URL was discovered.
/// * `origin_method` - the method of the request that started the operation.
pub fn classify(response: &HttpResponse, target: PollTarget, origin_method: &Method) -> PollState {
    let status = response.status;
    if *origin_method == Method::DELETE
        && target == PollTarget::Resource
        && status == StatusCode::NOT_FOUND
    {
        return PollState::Succeeded;
    }
    if status.is_client_error() || status.is_server_error() {
        return PollState::Failed;
    }
    if let Some(s) = status_field(&response.body) {
        return PollState::from_status_str(&s);
    }
    if status == StatusCode::ACCEPTED {
        return PollState::InProgress;
    }
    match target {
        PollTarget::Resource | PollTarget::Location => PollState::Succeeded,
        PollTarget::AsyncOperation if has_poll_header(response) => PollState::InProgress,
        PollTarget::AsyncOperation => PollState::Succeeded,
    }
}

/// Classifies the response to the request that started an operation.
///
/// A terminal status in the body completes the operation right away. Poll
/// headers, a `202 Accepted` status, or a non-terminal status in the body
/// require polling. Any other response completes the operation.
pub fn classify_initial(response: &HttpResponse) -> PollState {
    let body_state = status_field(&response.body).map(|s| PollState::from_status_str(&s));
    match body_state {
        Some(s) => s,
        None if has_poll_header(response) || response.status == StatusCode::ACCEPTED => {
            PollState::InProgress
        }
        None => PollState::Succeeded,
    }
}

fn has_poll_header(response: &HttpResponse) -> bool {
    response.headers.contains_key(AZURE_ASYNC_OPERATION)
        || response.headers.contains_key(http::header::LOCATION)
}
