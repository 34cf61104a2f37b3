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

//! Defines the trait for retry backoff policies.
//!
//! When the initiating request of an operation fails with a transient error
//! the client library may retry it, see [RetryPolicy][crate::retry_policy::RetryPolicy].
//! The backoff policy determines how long to wait before each retry attempt.

use std::sync::Arc;

/// Computes the delay before retrying a failed request.
pub trait BackoffPolicy: Send + Sync + std::fmt::Debug {
    /// Returns the backoff delay on a failure.
    ///
    /// # Parameters
    /// * `loop_start` - when the retry loop started.
    /// * `attempt_count` - the number of attempts. This method is always called
    ///   after the first attempt.
    fn on_failure(&self, loop_start: std::time::Instant, attempt_count: u32)
    -> std::time::Duration;

    /// Returns the backoff delay when the service sent a `Retry-After` header.
    ///
    /// ARM sends `Retry-After` with `429 Too Many Requests` and some
    /// `503 Service Unavailable` responses. The default implementation uses
    /// the value verbatim, bounded by [DEFAULT_MAXIMUM_RETRY_AFTER].
    fn on_retry_after(&self, retry_after: std::time::Duration) -> std::time::Duration {
        retry_after.min(DEFAULT_MAXIMUM_RETRY_AFTER)
    }
}

/// The longest `Retry-After` delay honored by default.
pub const DEFAULT_MAXIMUM_RETRY_AFTER: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// A helper type to use [BackoffPolicy] in client and request options.
#[derive(Clone)]
pub struct BackoffPolicyArg(pub(crate) Arc<dyn BackoffPolicy>);

impl<T: BackoffPolicy + 'static> std::convert::From<T> for BackoffPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn BackoffPolicy>> for BackoffPolicyArg {
    fn from(value: Arc<dyn BackoffPolicy>) -> Self {
        Self(value)
    }
}

impl std::convert::From<BackoffPolicyArg> for Arc<dyn BackoffPolicy> {
    fn from(value: BackoffPolicyArg) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exponential_backoff::ExponentialBackoffBuilder;
    use std::time::Duration;

    // Verify `BackoffPolicyArg` can be converted from the desired types.
    #[test]
    fn backoff_policy_arg() {
        let policy = ExponentialBackoffBuilder::default().clamp();
        let _ = BackoffPolicyArg::from(policy);

        let policy: Arc<dyn BackoffPolicy> = Arc::new(ExponentialBackoffBuilder::default().clamp());
        let arg = BackoffPolicyArg::from(policy);
        let _: Arc<dyn BackoffPolicy> = arg.into();
    }

    #[derive(Debug)]
    struct Fixed;
    impl BackoffPolicy for Fixed {
        fn on_failure(&self, _: std::time::Instant, _: u32) -> Duration {
            Duration::from_millis(10)
        }
    }

    #[test]
    fn default_on_retry_after() {
        assert_eq!(Fixed.on_retry_after(Duration::from_secs(2)), Duration::from_secs(2));
        assert_eq!(Fixed.on_retry_after(Duration::ZERO), Duration::ZERO);
        assert_eq!(
            Fixed.on_retry_after(Duration::from_secs(3600)),
            DEFAULT_MAXIMUM_RETRY_AFTER
        );
    }
}
