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

use super::cloud::CloudError;
use http::HeaderMap;
use std::time::Duration;

/// The terminal, unsuccessful, state of a long-running operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureState {
    /// The service reports the operation failed, or a poll request returned
    /// an HTTP error status.
    Failed,
    /// The service reports the operation was canceled.
    Canceled,
}

impl std::fmt::Display for FailureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed => write!(f, "Failed"),
            Self::Canceled => write!(f, "Canceled"),
        }
    }
}

/// The details of a long-running operation that did not succeed.
///
/// The payload is the body of the last poll response, kept verbatim. If it
/// contains the ARM error envelope, the parsed value is in `cloud_error`.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct OperationFailure {
    /// Whether the operation failed or was canceled by the service.
    pub state: FailureState,
    /// The HTTP status code of the last poll response.
    pub status_code: u16,
    /// The headers of the last poll response.
    pub headers: HeaderMap,
    /// The body of the last poll response.
    pub payload: bytes::Bytes,
    /// The ARM error envelope, if the payload contains one.
    pub cloud_error: Option<CloudError>,
}

impl OperationFailure {
    /// Creates a new instance, parsing the error envelope from the payload.
    pub fn new(
        state: FailureState,
        status_code: u16,
        headers: HeaderMap,
        payload: bytes::Bytes,
    ) -> Self {
        let cloud_error = CloudError::try_from(&payload).ok();
        Self {
            state,
            status_code,
            headers,
            payload,
            cloud_error,
        }
    }

    /// Sets the value for [cloud_error][OperationFailure::cloud_error].
    pub fn with_cloud_error(mut self, v: CloudError) -> Self {
        self.cloud_error = Some(v);
        self
    }
}

impl std::fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "the long-running operation finished in the {} state [{}]",
            self.state, self.status_code
        )?;
        if let Some(cloud) = &self.cloud_error {
            write!(f, ": {} - {}", cloud.code, cloud.message)?;
        }
        Ok(())
    }
}

/// The overall polling deadline would be exceeded by the next wait.
///
/// Returned as the source of [Error::timeout][super::Error::timeout] errors
/// produced by the polling loop.
#[derive(thiserror::Error, Debug, PartialEq)]
#[error("the next poll would exceed the polling deadline of {deadline:?}, elapsed {elapsed:?}")]
pub struct DeadlineExceeded {
    deadline: Duration,
    elapsed: Duration,
}

impl DeadlineExceeded {
    /// Creates a new instance.
    pub fn new(deadline: Duration, elapsed: Duration) -> Self {
        Self { deadline, elapsed }
    }

    /// The configured deadline.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// The time elapsed since polling started.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}
