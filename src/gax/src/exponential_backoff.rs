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

//! Implements truncated exponential backoff with optional jitter.
//!
//! The same policy serves both loops in the client library:
//!
//! - As a [PollingBackoffPolicy] it computes the delay between poll requests.
//!   A `Retry-After` value from the service is used verbatim, bounded by
//!   [with_maximum_retry_after][ExponentialBackoffBuilder::with_maximum_retry_after].
//!   Otherwise the delay grows exponentially, with a symmetric jitter
//!   (disabled by default).
//! - As a [BackoffPolicy] it computes the delay before retrying a failed
//!   initiating request, using full jitter.

use crate::backoff_policy::{BackoffPolicy, DEFAULT_MAXIMUM_RETRY_AFTER};
use crate::polling_backoff_policy::PollingBackoffPolicy;
use crate::polling_state::PollingState;
use std::time::Duration;

/// The errors returned by [ExponentialBackoffBuilder::build].
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("the scaling value ({0}) should be >= 1.0")]
    InvalidScalingFactor(f64),
    #[error("the initial delay ({0:?}) should be greater than zero")]
    InvalidInitialDelay(Duration),
    #[error(
        "the maximum delay ({maximum:?}) should be greater than or equal to the initial delay ({initial:?})"
    )]
    EmptyRange {
        maximum: Duration,
        initial: Duration,
    },
    #[error("the jitter fraction ({0}) should be in the [0.0, 1.0] range")]
    InvalidJitter(f64),
}

/// Builds [ExponentialBackoff] policies.
#[derive(Clone, Debug)]
pub struct ExponentialBackoffBuilder {
    initial_delay: Duration,
    maximum_delay: Duration,
    scaling: f64,
    jitter: f64,
    maximum_retry_after: Duration,
}

impl ExponentialBackoffBuilder {
    /// Creates a builder with the default parameters.
    ///
    /// # Example
    /// ```
    /// # use azure_arm_gax::exponential_backoff::Error;
    /// # use azure_arm_gax::exponential_backoff::ExponentialBackoffBuilder;
    /// use std::time::Duration;
    ///
    /// let policy = ExponentialBackoffBuilder::new()
    ///         .with_initial_delay(Duration::from_secs(10))
    ///         .with_maximum_delay(Duration::from_secs(60))
    ///         .with_scaling(1.5)
    ///         .with_jitter(0.1)
    ///         .build()?;
    /// # Ok::<(), Error>(())
    /// ```
    pub fn new() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            maximum_delay: Duration::from_secs(60),
            scaling: 2.0,
            jitter: 0.0,
            maximum_retry_after: DEFAULT_MAXIMUM_RETRY_AFTER,
        }
    }

    /// Change the initial delay.
    pub fn with_initial_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.initial_delay = v.into();
        self
    }

    /// Change the maximum delay.
    pub fn with_maximum_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.maximum_delay = v.into();
        self
    }

    /// Change the scaling factor in this backoff policy.
    pub fn with_scaling<V: Into<f64>>(mut self, v: V) -> Self {
        self.scaling = v.into();
        self
    }

    /// Change the jitter applied to polling delays.
    ///
    /// The delay is randomized within `±jitter` of its nominal value. A value
    /// of `0.0` disables the jitter.
    pub fn with_jitter<V: Into<f64>>(mut self, v: V) -> Self {
        self.jitter = v.into();
        self
    }

    /// Change the upper bound for server-requested delays.
    ///
    /// Protects the application against services that request an excessive
    /// `Retry-After` value.
    pub fn with_maximum_retry_after<V: Into<Duration>>(mut self, v: V) -> Self {
        self.maximum_retry_after = v.into();
        self
    }

    /// Creates a new exponential backoff policy.
    ///
    /// # Example
    /// ```
    /// # use azure_arm_gax::exponential_backoff::Error;
    /// # use azure_arm_gax::exponential_backoff::ExponentialBackoffBuilder;
    /// # use azure_arm_gax::backoff_policy::BackoffPolicy;
    /// use std::time::Duration;
    /// use std::time::Instant;
    /// let backoff = ExponentialBackoffBuilder::new()
    ///     .with_initial_delay(Duration::from_secs(5))
    ///     .with_maximum_delay(Duration::from_secs(50))
    ///     .with_scaling(2.0)
    ///     .build()?;
    /// let p = backoff.on_failure(Instant::now(), 1);
    /// assert!(p <= Duration::from_secs(5));
    /// let p = backoff.on_failure(Instant::now(), 2);
    /// assert!(p <= Duration::from_secs(10));
    /// # Ok::<(), Error>(())
    /// ```
    pub fn build(self) -> Result<ExponentialBackoff, Error> {
        if self.scaling < 1.0 {
            return Err(Error::InvalidScalingFactor(self.scaling));
        }
        if self.initial_delay.is_zero() {
            return Err(Error::InvalidInitialDelay(self.initial_delay));
        }
        if self.maximum_delay < self.initial_delay {
            return Err(Error::EmptyRange {
                maximum: self.maximum_delay,
                initial: self.initial_delay,
            });
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Error::InvalidJitter(self.jitter));
        }
        Ok(ExponentialBackoff {
            initial_delay: self.initial_delay,
            maximum_delay: self.maximum_delay,
            scaling: self.scaling,
            jitter: self.jitter,
            maximum_retry_after: self.maximum_retry_after,
        })
    }

    /// Creates a new exponential backoff policy clamping the ranges towards
    /// recommended values.
    ///
    /// The maximum delay is clamped first, to be between one second and one day
    /// (both inclusive). Then the initial delay is clamped to be between one
    /// millisecond and the maximum delay. The scaling factor is clamped to the
    /// `[1.0, 32.0]` range, and the jitter to the `[0.0, 1.0]` range.
    ///
    /// # Example
    /// ```
    /// # use azure_arm_gax::exponential_backoff::ExponentialBackoffBuilder;
    /// # use azure_arm_gax::polling_backoff_policy::PollingBackoffPolicy;
    /// # use azure_arm_gax::polling_state::PollingState;
    /// use std::time::Duration;
    /// let backoff = ExponentialBackoffBuilder::new().with_scaling(0.0).clamp();
    /// let state = PollingState::default().set_attempt_count(1_u32);
    /// assert!(backoff.wait_period(&state) > Duration::ZERO);
    /// ```
    pub fn clamp(self) -> ExponentialBackoff {
        let scaling = self.scaling.clamp(1.0, 32.0);
        let maximum_delay = self
            .maximum_delay
            .clamp(Duration::from_secs(1), Duration::from_secs(24 * 60 * 60));
        let initial_delay = self
            .initial_delay
            .clamp(Duration::from_millis(1), maximum_delay);
        let jitter = if self.jitter.is_nan() {
            0.0
        } else {
            self.jitter.clamp(0.0, 1.0)
        };
        ExponentialBackoff {
            initial_delay,
            maximum_delay,
            scaling,
            jitter,
            maximum_retry_after: self.maximum_retry_after,
        }
    }
}

impl Default for ExponentialBackoffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncated exponential backoff, honoring `Retry-After` when polling.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    maximum_delay: Duration,
    scaling: f64,
    jitter: f64,
    maximum_retry_after: Duration,
}

impl ExponentialBackoff {
    /// The nominal delay for the given attempt, without jitter.
    fn delay(&self, attempt_count: u32) -> Duration {
        let exp = std::cmp::min(i32::MAX as u32, attempt_count) as i32;
        let exp = exp.saturating_sub(1);
        let scaling = self.scaling.powi(exp);
        if scaling >= self.maximum_delay.div_duration_f64(self.initial_delay) {
            self.maximum_delay
        } else {
            // .mul_f64() cannot panic because (1) scaling >= 1.0, and (2) we
            // just checked that self.initial_delay * scaling < maximum_delay.
            self.initial_delay.mul_f64(scaling)
        }
    }

    /// Full jitter, in the `[0, delay]` range.
    fn delay_with_full_jitter(&self, attempt_count: u32, rng: &mut impl rand::Rng) -> Duration {
        let delay = self.delay(attempt_count);
        rng.random_range(Duration::ZERO..=delay)
    }

    /// Symmetric jitter, in the `[delay * (1 - jitter), delay * (1 + jitter)]`
    /// range, never above the maximum delay.
    fn delay_with_symmetric_jitter(
        &self,
        attempt_count: u32,
        rng: &mut impl rand::Rng,
    ) -> Duration {
        let delay = self.delay(attempt_count);
        if self.jitter == 0.0 {
            return delay;
        }
        let factor = 1.0 + rng.random_range(-self.jitter..=self.jitter);
        // factor is in [0.0, 2.0] because jitter is in [0.0, 1.0].
        delay.mul_f64(factor.max(0.0)).min(self.maximum_delay)
    }

    fn polling_delay(&self, state: &PollingState, rng: &mut impl rand::Rng) -> Duration {
        match state.retry_after {
            Some(d) => d.min(self.maximum_retry_after),
            None => self.delay_with_symmetric_jitter(state.attempt_count, rng),
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            maximum_delay: Duration::from_secs(60),
            scaling: 2.0,
            jitter: 0.0,
            maximum_retry_after: DEFAULT_MAXIMUM_RETRY_AFTER,
        }
    }
}

impl PollingBackoffPolicy for ExponentialBackoff {
    fn wait_period(&self, state: &PollingState) -> Duration {
        self.polling_delay(state, &mut rand::rng())
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn on_failure(&self, _loop_start: std::time::Instant, attempt_count: u32) -> Duration {
        self.delay_with_full_jitter(attempt_count, &mut rand::rng())
    }

    fn on_retry_after(&self, retry_after: Duration) -> Duration {
        retry_after.min(self.maximum_retry_after)
    }
}
