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

//! The state of a polling loop, as seen by the polling policies.

use std::time::{Duration, Instant};

/// The counters of a polling loop.
///
/// The polling loop owns this value and passes it to the
/// [PollingErrorPolicy][crate::polling_error_policy::PollingErrorPolicy] and
/// [PollingBackoffPolicy][crate::polling_backoff_policy::PollingBackoffPolicy]
/// on each iteration. The policies themselves are stateless.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct PollingState {
    /// The start time for this polling loop.
    pub start: Instant,

    /// The number of poll requests sent so far.
    pub attempt_count: u32,

    /// The number of consecutive transport errors.
    ///
    /// Reset to zero when a poll request receives a response.
    pub error_count: u32,

    /// The `Retry-After` value of the most recent response, if any.
    pub retry_after: Option<Duration>,
}

impl PollingState {
    /// Update the start time, useful in mocks.
    pub fn set_start<T: Into<Instant>>(mut self, v: T) -> Self {
        self.start = v.into();
        self
    }

    /// Update the attempt count, useful in mocks.
    pub fn set_attempt_count<T: Into<u32>>(mut self, v: T) -> Self {
        self.attempt_count = v.into();
        self
    }

    /// Update the error count, useful in mocks.
    pub fn set_error_count<T: Into<u32>>(mut self, v: T) -> Self {
        self.error_count = v.into();
        self
    }

    /// Update the server-requested delay.
    pub fn set_retry_after<T: Into<Option<Duration>>>(mut self, v: T) -> Self {
        self.retry_after = v.into();
        self
    }

    /// Records a poll request that received a response.
    pub fn on_response(&mut self, retry_after: Option<Duration>) {
        self.error_count = 0;
        self.retry_after = retry_after;
    }

    /// Records a poll request that failed in the transport layer.
    pub fn on_transport_error(&mut self) {
        self.error_count += 1;
        self.retry_after = None;
    }
}

impl std::default::Default for PollingState {
    fn default() -> Self {
        Self {
            start: Instant::now(),
            attempt_count: 0,
            error_count: 0,
            retry_after: None,
        }
    }
}
