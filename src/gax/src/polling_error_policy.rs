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

//! Defines the types for polling error policies.
//!
//! # Example
//! ```
//! # use azure_arm_gax::polling_error_policy::*;
//! use std::time::Duration;
//! // Poll for at most 30 minutes, tolerating at most 5 consecutive dropped
//! // connections: whichever limit is reached first stops the polling loop.
//! let policy = ArmStrict
//!     .with_time_limit(Duration::from_secs(30 * 60))
//!     .with_error_limit(5);
//! ```
//!
//! The client libraries poll long-running operations (LROs) and need to (1)
//! distinguish between transient and permanent errors, and (2) provide a
//! mechanism to limit the polling loop duration.
//!
//! We provide a trait that applications may implement to customize the behavior
//! of the polling loop, and some common implementations that should meet most
//! needs.
//!
//! To configure the default polling error policy for a client, use
//! [ClientConfig::set_polling_error_policy]. To configure the polling error
//! policy used for a specific request, use
//! [RequestOptions::set_polling_error_policy].
//!
//! [ClientConfig::set_polling_error_policy]: crate::options::ClientConfig::set_polling_error_policy
//! [RequestOptions::set_polling_error_policy]: crate::options::RequestOptions::set_polling_error_policy

use crate::error::Error;
use crate::polling_state::PollingState;
use crate::retry_result::RetryResult;
use std::sync::Arc;

/// The number of consecutive dropped connections tolerated by default.
pub const DEFAULT_ERROR_LIMIT: u32 = 3;

/// Determines how errors are handled in the polling loop.
///
/// Implementations of this trait determine if polling errors may resolve in
/// future attempts, and for how long the polling loop may continue.
pub trait PollingErrorPolicy: Send + Sync + std::fmt::Debug {
    /// Query the polling policy after an error.
    ///
    /// # Parameters
    /// * `state` - the counters of the polling loop. The attempt count
    ///   includes the failed attempt, and the error count includes this
    ///   error if it is a transport error.
    /// * `error` - the last error when attempting the request.
    fn on_error(&self, state: &PollingState, error: Error) -> RetryResult;

    /// Called when the LRO is successfully polled, but the LRO is still in
    /// progress.
    ///
    /// Returning an error stops the polling loop with that error.
    fn on_in_progress(&self, _state: &PollingState, _operation_url: &str) -> Option<Error> {
        None
    }
}

/// A helper type to use [PollingErrorPolicy] in client and request options.
#[derive(Clone)]
pub struct PollingErrorPolicyArg(pub(crate) Arc<dyn PollingErrorPolicy>);

impl<T> std::convert::From<T> for PollingErrorPolicyArg
where
    T: PollingErrorPolicy + 'static,
{
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn PollingErrorPolicy>> for PollingErrorPolicyArg {
    fn from(value: Arc<dyn PollingErrorPolicy>) -> Self {
        Self(value)
    }
}

impl std::convert::From<PollingErrorPolicyArg> for Arc<dyn PollingErrorPolicy> {
    fn from(value: PollingErrorPolicyArg) -> Self {
        value.0
    }
}

/// Extension trait for [PollingErrorPolicy]
pub trait PollingErrorPolicyExt: PollingErrorPolicy + Sized {
    /// Decorate a [PollingErrorPolicy] to limit the total elapsed time in the
    /// polling loop.
    ///
    /// While the time spent in the polling loop (including time in backoff) is
    /// less than the prescribed duration the `on_error()` method returns the
    /// results of the inner policy. After that time it returns
    /// [Exhausted][RetryResult::Exhausted] if the inner policy returns
    /// [Continue][RetryResult::Continue].
    ///
    /// # Example
    /// ```
    /// # use azure_arm_gax::*;
    /// use polling_error_policy::*;
    /// use polling_state::PollingState;
    /// use std::time::Duration;
    /// let policy = ArmStrict.with_time_limit(Duration::from_secs(10)).with_attempt_limit(3);
    /// let state = PollingState::default().set_attempt_count(4_u32);
    /// assert!(policy.on_error(&state, transient_error()).is_exhausted());
    ///
    /// use azure_arm_gax::error::Error;
    /// fn transient_error() -> Error { Error::io("connection reset") }
    /// ```
    fn with_time_limit(self, maximum_duration: std::time::Duration) -> LimitedElapsedTime<Self> {
        LimitedElapsedTime::custom(self, maximum_duration)
    }

    /// Decorate a [PollingErrorPolicy] to limit the number of poll attempts.
    ///
    /// The policy passes through the results from the inner policy as long as
    /// `attempt_count < maximum_attempts`. Once the maximum number of attempts
    /// is reached, the policy returns [Exhausted][RetryResult::Exhausted] if the
    /// inner policy returns [Continue][RetryResult::Continue], and passes the
    /// inner policy result otherwise.
    ///
    /// # Example
    /// ```
    /// # use azure_arm_gax::*;
    /// use polling_error_policy::*;
    /// use polling_state::PollingState;
    /// let policy = ArmStrict.with_attempt_limit(3);
    /// let state = |n: u32| PollingState::default().set_attempt_count(n);
    /// assert!(policy.on_error(&state(1), transient_error()).is_continue());
    /// assert!(policy.on_error(&state(2), transient_error()).is_continue());
    /// assert!(policy.on_error(&state(3), transient_error()).is_exhausted());
    ///
    /// use azure_arm_gax::error::Error;
    /// fn transient_error() -> Error { Error::io("connection reset") }
    /// ```
    fn with_attempt_limit(self, maximum_attempts: u32) -> LimitedAttemptCount<Self> {
        LimitedAttemptCount::custom(self, maximum_attempts)
    }

    /// Decorate a [PollingErrorPolicy] to limit the number of consecutive
    /// transport errors.
    ///
    /// Each poll request that receives a response resets the count. Use this
    /// decorator to tolerate a few dropped connections during a long wait,
    /// without polling forever against an unreachable endpoint.
    ///
    /// # Example
    /// ```
    /// # use azure_arm_gax::*;
    /// use polling_error_policy::*;
    /// use polling_state::PollingState;
    /// let policy = ArmStrict.with_error_limit(2);
    /// let state = |n: u32| PollingState::default().set_attempt_count(10_u32).set_error_count(n);
    /// assert!(policy.on_error(&state(1), transient_error()).is_continue());
    /// assert!(policy.on_error(&state(2), transient_error()).is_exhausted());
    ///
    /// use azure_arm_gax::error::Error;
    /// fn transient_error() -> Error { Error::io("connection reset") }
    /// ```
    fn with_error_limit(self, maximum_errors: u32) -> LimitedErrorCount<Self> {
        LimitedErrorCount::custom(self, maximum_errors)
    }
}

impl<T: PollingErrorPolicy> PollingErrorPolicyExt for T {}

/// A polling policy for Azure Resource Manager operations.
///
/// This policy must be decorated to limit the number of polling attempts or the
/// duration of the polling loop.
///
/// Transport errors, that is, requests that did not produce a response, may
/// resolve in a future poll. Any other error is permanent. In particular, a
/// poll request returning an HTTP error status is a definitive failure of the
/// operation.
///
/// # Example
/// ```
/// # use azure_arm_gax::*;
/// # use azure_arm_gax::polling_error_policy::*;
/// use polling_state::PollingState;
/// let policy = ArmStrict.with_attempt_limit(3);
/// let state = PollingState::default().set_attempt_count(4_u32);
/// assert!(policy.on_error(&state, transient_error()).is_exhausted());
///
/// use azure_arm_gax::error::Error;
/// fn transient_error() -> Error { Error::io("connection reset") }
/// ```
#[derive(Clone, Debug)]
pub struct ArmStrict;

impl PollingErrorPolicy for ArmStrict {
    fn on_error(&self, _state: &PollingState, error: Error) -> RetryResult {
        if error.is_transport() {
            return RetryResult::Continue(error);
        }
        RetryResult::Permanent(error)
    }
}

/// A polling policy that continues on any error.
///
/// This policy must be decorated to limit the number of polling attempts or the
/// duration of the polling loop.
///
/// # Example
/// ```
/// # use azure_arm_gax::*;
/// # use azure_arm_gax::polling_error_policy::*;
/// use polling_state::PollingState;
/// let policy = AlwaysContinue;
/// assert!(policy.on_error(&PollingState::default(), permanent_error()).is_continue());
///
/// use azure_arm_gax::error::Error;
/// fn permanent_error() -> Error { Error::unexpected_status(400, http::HeaderMap::new(), bytes::Bytes::new()) }
/// ```
#[derive(Clone, Debug)]
pub struct AlwaysContinue;

impl PollingErrorPolicy for AlwaysContinue {
    fn on_error(&self, _state: &PollingState, error: Error) -> RetryResult {
        RetryResult::Continue(error)
    }
}

/// A polling policy decorator that limits the total time in the polling loop.
///
/// This policy decorates an inner policy and limits the duration of polling
/// loops. While the time spent in the polling loop (including time in backoff)
/// is less than the prescribed duration the `on_error()` method returns the
/// results of the inner policy. After that time it returns
/// [Exhausted][RetryResult::Exhausted] if the inner policy returns
/// [Continue][RetryResult::Continue].
///
/// # Parameters
/// * `P` - the inner polling policy, defaults to [ArmStrict].
#[derive(Debug)]
pub struct LimitedElapsedTime<P = ArmStrict>
where
    P: PollingErrorPolicy,
{
    inner: P,
    maximum_duration: std::time::Duration,
}

impl LimitedElapsedTime {
    /// Creates a new instance, with the default inner policy.
    ///
    /// # Example
    /// ```
    /// # use azure_arm_gax::*;
    /// # use azure_arm_gax::polling_error_policy::*;
    /// use polling_state::PollingState;
    /// use std::time::{Duration, Instant};
    /// let policy = LimitedElapsedTime::new(Duration::from_secs(10));
    /// let state = PollingState::default().set_start(Instant::now() - Duration::from_secs(20));
    /// assert!(policy.on_error(&state, transient_error()).is_exhausted());
    ///
    /// use azure_arm_gax::error::Error;
    /// fn transient_error() -> Error { Error::io("connection reset") }
    /// ```
    pub fn new(maximum_duration: std::time::Duration) -> Self {
        Self {
            inner: ArmStrict,
            maximum_duration,
        }
    }
}

impl<P> LimitedElapsedTime<P>
where
    P: PollingErrorPolicy,
{
    /// Creates a new instance with a custom inner policy.
    pub fn custom(inner: P, maximum_duration: std::time::Duration) -> Self {
        Self {
            inner,
            maximum_duration,
        }
    }

    fn in_progress_impl(&self, start: std::time::Instant, operation_url: &str) -> Option<Error> {
        let elapsed = std::time::Instant::now().saturating_duration_since(start);
        if elapsed < self.maximum_duration {
            return None;
        }
        Some(Error::exhausted(Exhausted::new(
            operation_url,
            "elapsed time",
            format!("{elapsed:?}"),
            format!("{:?}", self.maximum_duration),
        )))
    }
}

impl<P> PollingErrorPolicy for LimitedElapsedTime<P>
where
    P: PollingErrorPolicy + 'static,
{
    fn on_error(&self, state: &PollingState, error: Error) -> RetryResult {
        match self.inner.on_error(state, error) {
            RetryResult::Permanent(e) => RetryResult::Permanent(e),
            RetryResult::Exhausted(e) => RetryResult::Exhausted(e),
            RetryResult::Continue(e) => {
                if std::time::Instant::now() >= state.start + self.maximum_duration {
                    RetryResult::Exhausted(e)
                } else {
                    RetryResult::Continue(e)
                }
            }
        }
    }

    fn on_in_progress(&self, state: &PollingState, operation_url: &str) -> Option<Error> {
        self.inner
            .on_in_progress(state, operation_url)
            .or_else(|| self.in_progress_impl(state.start, operation_url))
    }
}

/// A polling policy decorator that limits the number of attempts.
///
/// The policy passes through the results from the inner policy as long as
/// `attempt_count < maximum_attempts`. However, once the maximum number of
/// attempts is reached, the policy replaces any [Continue][RetryResult::Continue]
/// result with [Exhausted][RetryResult::Exhausted].
///
/// # Parameters
/// * `P` - the inner polling policy.
#[derive(Debug)]
pub struct LimitedAttemptCount<P = ArmStrict>
where
    P: PollingErrorPolicy,
{
    inner: P,
    maximum_attempts: u32,
}

impl LimitedAttemptCount {
    /// Creates a new instance, with the default inner policy.
    pub fn new(maximum_attempts: u32) -> Self {
        Self {
            inner: ArmStrict,
            maximum_attempts,
        }
    }
}

impl<P> LimitedAttemptCount<P>
where
    P: PollingErrorPolicy,
{
    /// Creates a new instance with a custom inner policy.
    ///
    /// # Example
    /// ```
    /// # use azure_arm_gax::*;
    /// # use azure_arm_gax::polling_error_policy::*;
    /// use polling_state::PollingState;
    /// let policy = LimitedAttemptCount::custom(AlwaysContinue, 2);
    /// let state = |n: u32| PollingState::default().set_attempt_count(n);
    /// assert!(policy.on_error(&state(1), permanent_error()).is_continue());
    /// assert!(policy.on_error(&state(2), permanent_error()).is_exhausted());
    ///
    /// use azure_arm_gax::error::Error;
    /// fn permanent_error() -> Error { Error::unexpected_status(400, http::HeaderMap::new(), bytes::Bytes::new()) }
    /// ```
    pub fn custom(inner: P, maximum_attempts: u32) -> Self {
        Self {
            inner,
            maximum_attempts,
        }
    }

    fn in_progress_impl(&self, count: u32, operation_url: &str) -> Option<Error> {
        if count < self.maximum_attempts {
            return None;
        }
        Some(Error::exhausted(Exhausted::new(
            operation_url,
            "attempt count",
            count.to_string(),
            self.maximum_attempts.to_string(),
        )))
    }
}

impl<P> PollingErrorPolicy for LimitedAttemptCount<P>
where
    P: PollingErrorPolicy,
{
    fn on_error(&self, state: &PollingState, error: Error) -> RetryResult {
        match self.inner.on_error(state, error) {
            RetryResult::Permanent(e) => RetryResult::Permanent(e),
            RetryResult::Exhausted(e) => RetryResult::Exhausted(e),
            RetryResult::Continue(e) => {
                if state.attempt_count >= self.maximum_attempts {
                    RetryResult::Exhausted(e)
                } else {
                    RetryResult::Continue(e)
                }
            }
        }
    }

    fn on_in_progress(&self, state: &PollingState, operation_url: &str) -> Option<Error> {
        self.inner
            .on_in_progress(state, operation_url)
            .or_else(|| self.in_progress_impl(state.attempt_count, operation_url))
    }
}

/// A polling policy decorator that limits the number of consecutive transport
/// errors.
///
/// The policy passes through the results from the inner policy as long as
/// `error_count < maximum_errors`. Once the limit is reached, the policy
/// replaces any [Continue][RetryResult::Continue] result with
/// [Exhausted][RetryResult::Exhausted].
///
/// # Parameters
/// * `P` - the inner polling policy.
#[derive(Debug)]
pub struct LimitedErrorCount<P = ArmStrict>
where
    P: PollingErrorPolicy,
{
    inner: P,
    maximum_errors: u32,
}

impl LimitedErrorCount {
    /// Creates a new instance, with the default inner policy.
    pub fn new(maximum_errors: u32) -> Self {
        Self {
            inner: ArmStrict,
            maximum_errors,
        }
    }
}

impl std::default::Default for LimitedErrorCount {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_LIMIT)
    }
}

impl<P> LimitedErrorCount<P>
where
    P: PollingErrorPolicy,
{
    /// Creates a new instance with a custom inner policy.
    pub fn custom(inner: P, maximum_errors: u32) -> Self {
        Self {
            inner,
            maximum_errors,
        }
    }
}

impl<P> PollingErrorPolicy for LimitedErrorCount<P>
where
    P: PollingErrorPolicy,
{
    fn on_error(&self, state: &PollingState, error: Error) -> RetryResult {
        match self.inner.on_error(state, error) {
            RetryResult::Permanent(e) => RetryResult::Permanent(e),
            RetryResult::Exhausted(e) => RetryResult::Exhausted(e),
            RetryResult::Continue(e) => {
                if state.error_count >= self.maximum_errors {
                    RetryResult::Exhausted(e)
                } else {
                    RetryResult::Continue(e)
                }
            }
        }
    }

    fn on_in_progress(&self, state: &PollingState, operation_url: &str) -> Option<Error> {
        self.inner.on_in_progress(state, operation_url)
    }
}

/// Indicates that a retry or polling loop has been exhausted.
#[derive(Debug)]
pub struct Exhausted {
    operation_url: String,
    limit_name: &'static str,
    value: String,
    limit: String,
}

impl Exhausted {
    pub fn new(
        operation_url: &str,
        limit_name: &'static str,
        value: String,
        limit: String,
    ) -> Self {
        Self {
            operation_url: operation_url.to_string(),
            limit_name,
            value,
            limit,
        }
    }
}

impl std::fmt::Display for Exhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "polling loop for {} exhausted, {} value ({}) exceeds limit ({})",
            self.operation_url, self.limit_name, self.value, self.limit
        )
    }
}

impl std::error::Error for Exhausted {}
