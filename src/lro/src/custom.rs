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

//! Pollers for operations that do not follow the ARM polling headers.
//!
//! Some operations signal completion in other ways. For example, purging a
//! soft-deleted resource completes when a `GET` on the deleted resource
//! returns `404 Not Found`, and some data-plane operations report progress in
//! a service-specific field. For these operations the application provides a
//! closure that sends one request and interprets the result.

use crate::{Error, Poller, PollingResult, Result};
use gax::error::OperationFailure;
use gax::polling_backoff_policy::PollingBackoffPolicy;
use gax::polling_error_policy::PollingErrorPolicy;
use gax::polling_state::PollingState;
use gax::retry_result::RetryResult;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The result of one query in a custom poller.
#[derive(Debug)]
pub enum PollOutcome<R> {
    /// The operation has not completed.
    InProgress,
    /// The operation completed successfully, with this result.
    Succeeded(R),
    /// The operation failed, or was canceled by the service.
    Failed(OperationFailure),
}

/// Creates a poller driven by `query`.
///
/// Each call to [poll()][Poller::poll] calls `query` once. Errors returned by
/// `query` are handled by `error_policy`: [transport][Error::is_transport]
/// errors count as dropped connections, and any error the policy considers
/// recoverable is reported as [PollingResult::PollingError].
///
/// # Example
/// ```
/// # use azure_arm_lro::*;
/// # use gax::exponential_backoff::ExponentialBackoff;
/// # use gax::polling_error_policy::ArmStrict;
/// # use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// # tokio_test::block_on(async {
/// let mut remaining = 2;
/// let poller = new_custom_poller(
///     Arc::new(ArmStrict),
///     Arc::new(ExponentialBackoff::default()),
///     move || {
///         remaining -= 1;
///         let done = remaining == 0;
///         async move {
///             if done {
///                 return Ok(PollOutcome::Succeeded("purged"));
///             }
///             Ok(PollOutcome::InProgress)
///         }
///     },
/// );
/// let result = poller.until_done(&CancellationToken::new()).await?;
/// assert_eq!(result, "purged");
/// # Ok::<(), Error>(()) });
/// ```
pub fn new_custom_poller<R, Q, QF>(
    error_policy: Arc<dyn PollingErrorPolicy>,
    backoff_policy: Arc<dyn PollingBackoffPolicy>,
    query: Q,
) -> impl Poller<R>
where
    R: Send,
    Q: FnMut() -> QF + Send,
    QF: Future<Output = Result<PollOutcome<R>>> + Send,
{
    CustomPoller::new(error_policy, backoff_policy, query)
}

struct CustomPoller<R, Q> {
    error_policy: Arc<dyn PollingErrorPolicy>,
    backoff_policy: Arc<dyn PollingBackoffPolicy>,
    query: Q,
    state: PollingState,
    done: bool,
    result: PhantomData<fn() -> R>,
}

impl<R, Q> CustomPoller<R, Q> {
    fn new(
        error_policy: Arc<dyn PollingErrorPolicy>,
        backoff_policy: Arc<dyn PollingBackoffPolicy>,
        query: Q,
    ) -> Self {
        Self {
            error_policy,
            backoff_policy,
            query,
            state: PollingState::default(),
            done: false,
            result: PhantomData,
        }
    }
}

impl<R, Q> crate::sealed::Poller for CustomPoller<R, Q> {}

impl<R, Q, QF> Poller<R> for CustomPoller<R, Q>
where
    R: Send,
    Q: FnMut() -> QF + Send,
    QF: Future<Output = Result<PollOutcome<R>>> + Send,
{
    async fn poll(&mut self) -> Option<PollingResult<R>> {
        if self.done {
            return None;
        }
        if let Some(e) = self.error_policy.on_in_progress(&self.state, "custom") {
            self.done = true;
            return Some(PollingResult::Completed(Err(e)));
        }
        self.state.attempt_count += 1;
        let result = match (self.query)().await {
            Ok(PollOutcome::InProgress) => {
                self.state.on_response(None);
                PollingResult::InProgress(None)
            }
            Ok(PollOutcome::Succeeded(r)) => PollingResult::Completed(Ok(r)),
            Ok(PollOutcome::Failed(f)) => PollingResult::Completed(Err(Error::operation(f))),
            Err(e) => {
                if e.is_transport() {
                    self.state.on_transport_error();
                }
                match self.error_policy.on_error(&self.state, e) {
                    RetryResult::Continue(e) => PollingResult::PollingError(e),
                    RetryResult::Exhausted(e) | RetryResult::Permanent(e) => {
                        PollingResult::Completed(Err(e))
                    }
                }
            }
        };
        self.done = matches!(result, PollingResult::Completed(_));
        Some(result)
    }

    async fn until_done(mut self, cancel: &CancellationToken) -> Result<R> {
        let mut first = true;
        loop {
            if !first {
                let delay = self.backoff_policy.wait_period(&self.state);
                crate::sleep_or_cancel(delay, cancel).await?;
            }
            first = false;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::wait_canceled()),
                r = self.poll() => r,
            };
            match result {
                Some(PollingResult::Completed(r)) => return r,
                Some(PollingResult::InProgress(_)) | Some(PollingResult::PollingError(_)) => {}
                None => return Err(Error::other(crate::PollerCompleted)),
            }
        }
    }

    #[cfg(feature = "unstable-stream")]
    fn into_stream(self) -> impl futures::Stream<Item = PollingResult<R>> + Unpin {
        crate::into_stream(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use gax::error::FailureState;
    use gax::exponential_backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
    use gax::polling_error_policy::{AlwaysContinue, ArmStrict, PollingErrorPolicyExt};
    use http::{HeaderMap, StatusCode};
    use std::time::Duration;

    fn test_backoff() -> Arc<ExponentialBackoff> {
        Arc::new(
            ExponentialBackoffBuilder::new()
                .with_initial_delay(Duration::from_millis(1))
                .with_maximum_delay(Duration::from_millis(1))
                .clamp(),
        )
    }

    fn failure() -> OperationFailure {
        OperationFailure::new(
            FailureState::Failed,
            StatusCode::OK.as_u16(),
            HeaderMap::new(),
            Bytes::from_static(br#"{"error": {"code": "PurgeFailed", "message": "uh-oh"}}"#),
        )
    }

    #[tokio::test]
    async fn poll_flow() {
        let mut count = 0;
        let mut poller = new_custom_poller(Arc::new(ArmStrict), test_backoff(), move || {
            count += 1;
            let n = count;
            async move {
                match n {
                    1 => Ok(PollOutcome::InProgress),
                    _ => Ok(PollOutcome::Succeeded(42)),
                }
            }
        });
        let p0 = poller.poll().await;
        assert!(matches!(p0, Some(PollingResult::InProgress(None))), "{p0:?}");
        let p1 = poller.poll().await;
        assert!(matches!(p1, Some(PollingResult::Completed(Ok(42)))), "{p1:?}");
        let p2 = poller.poll().await;
        assert!(p2.is_none(), "{p2:?}");
    }

    #[tokio::test]
    async fn until_done_failed() {
        let poller = new_custom_poller::<i32, _, _>(Arc::new(ArmStrict), test_backoff(), || async {
            Ok(PollOutcome::Failed(failure()))
        });
        let err = poller.until_done(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_operation_failed(), "{err:?}");
        assert_eq!(
            err.cloud_error().map(|c| c.code.as_str()),
            Some("PurgeFailed")
        );
    }

    #[tokio::test]
    async fn until_done_with_transient() -> anyhow::Result<()> {
        let mut count = 0;
        let poller = new_custom_poller(Arc::new(AlwaysContinue), test_backoff(), move || {
            count += 1;
            let n = count;
            async move {
                match n {
                    1 | 2 => Err(Error::io("connection reset")),
                    3 => Ok(PollOutcome::InProgress),
                    _ => Ok(PollOutcome::Succeeded("done")),
                }
            }
        });
        let got = poller.until_done(&CancellationToken::new()).await?;
        assert_eq!(got, "done");
        Ok(())
    }

    #[tokio::test]
    async fn until_done_error_limit() {
        let poller = new_custom_poller::<i32, _, _>(
            Arc::new(ArmStrict.with_error_limit(2)),
            test_backoff(),
            || async { Err(Error::io("connection reset")) },
        );
        let err = poller.until_done(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_io(), "{err:?}");
    }

    #[tokio::test]
    async fn until_done_attempt_limit() {
        let poller = new_custom_poller::<i32, _, _>(
            Arc::new(AlwaysContinue.with_attempt_limit(3)),
            test_backoff(),
            || async { Ok(PollOutcome::InProgress) },
        );
        let err = poller.until_done(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_exhausted(), "{err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn until_done_canceled() {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let poller = new_custom_poller::<i32, _, _>(
            Arc::new(AlwaysContinue),
            Arc::new(ExponentialBackoff::default()),
            move || {
                child.cancel();
                async { Ok(PollOutcome::InProgress) }
            },
        );
        let err = poller.until_done(&cancel).await.unwrap_err();
        assert!(err.is_wait_canceled(), "{err:?}");
    }
}
