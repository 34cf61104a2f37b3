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

//! Polls ARM long-running operations using the poll URL discovered from the
//! initiating response.

use crate::classify::{PollState, classify};
use crate::polling_request::PollingRequest;
use crate::{Error, PollingResult, Result};
use gax::error::{DeadlineExceeded, FailureState, OperationFailure};
use gax::http_client::{HttpClient, HttpResponse};
use gax::polling_backoff_policy::PollingBackoffPolicy;
use gax::polling_error_policy::PollingErrorPolicy;
use gax::polling_state::PollingState;
use gax::retry_loop_internal::effective_timeout;
use gax::retry_result::RetryResult;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The outcome of a single poll attempt.
#[derive(Debug)]
pub(crate) enum Step {
    /// The poll request received a response.
    Classified(PollState, HttpResponse),
    /// The poll request failed, the polling error policy allows more attempts.
    Retry(Error),
    /// The polling error policy stopped the loop.
    Stop(Error),
}

/// The state shared by all the ways to drive an ARM operation to completion.
///
/// Polls are strictly sequential: the loop is driven through `&mut self`.
#[derive(Debug)]
pub(crate) struct PollLoop {
    client: Arc<dyn HttpClient>,
    request: PollingRequest,
    error_policy: Arc<dyn PollingErrorPolicy>,
    backoff_policy: Arc<dyn PollingBackoffPolicy>,
    attempt_timeout: Option<Duration>,
    deadline: Option<Duration>,
    started: Instant,
    state: PollingState,
    needs_wait: bool,
}

impl PollLoop {
    pub(crate) fn new(
        client: Arc<dyn HttpClient>,
        request: PollingRequest,
        error_policy: Arc<dyn PollingErrorPolicy>,
        backoff_policy: Arc<dyn PollingBackoffPolicy>,
    ) -> Self {
        Self {
            client,
            request,
            error_policy,
            backoff_policy,
            attempt_timeout: None,
            deadline: None,
            started: Instant::now(),
            state: PollingState::default(),
            needs_wait: false,
        }
    }

    pub(crate) fn with_attempt_timeout(mut self, v: Option<Duration>) -> Self {
        self.attempt_timeout = v;
        self
    }

    pub(crate) fn with_deadline(mut self, v: Option<Duration>) -> Self {
        self.deadline = v;
        self
    }

    /// Honors the `Retry-After` header of the initiating response.
    ///
    /// Without it the first poll is sent right away.
    pub(crate) fn with_initial_retry_after(mut self, v: Option<Duration>) -> Self {
        self.state.retry_after = v;
        self.needs_wait = v.is_some();
        self
    }

    pub(crate) fn request(&self) -> &PollingRequest {
        &self.request
    }

    pub(crate) fn state(&self) -> &PollingState {
        &self.state
    }

    /// Sends one poll request and classifies the result.
    pub(crate) async fn poll_once(&mut self) -> Step {
        if let Some(e) = self
            .error_policy
            .on_in_progress(&self.state, self.request.url().as_str())
        {
            return Step::Stop(e);
        }
        self.state.attempt_count += 1;
        self.needs_wait = true;
        let timeout = effective_timeout(self.attempt_timeout, self.remaining());
        match self
            .client
            .execute(self.request.to_http_request(), timeout)
            .await
        {
            Ok(response) => {
                self.state.on_response(response.retry_after());
                let state = classify(
                    &response,
                    self.request.target(),
                    self.request.origin_method(),
                );
                tracing::debug!(
                    url = %self.request.url(),
                    attempt_count = self.state.attempt_count,
                    status_code = response.status.as_u16(),
                    %state,
                    "polled long-running operation"
                );
                Step::Classified(state, response)
            }
            Err(e) => {
                if e.is_transport() {
                    self.state.on_transport_error();
                }
                match self.error_policy.on_error(&self.state, e) {
                    RetryResult::Continue(e) => {
                        tracing::warn!(
                            url = %self.request.url(),
                            attempt_count = self.state.attempt_count,
                            error_count = self.state.error_count,
                            "poll attempt failed, will retry: {e}"
                        );
                        Step::Retry(e)
                    }
                    RetryResult::Exhausted(e) | RetryResult::Permanent(e) => Step::Stop(e),
                }
            }
        }
    }

    /// Waits before the next poll, if needed.
    ///
    /// Fails with [Error::is_wait_canceled] if `cancel` fires first, and with
    /// [Error::is_timeout] if the wait would go past the polling deadline.
    pub(crate) async fn wait(&mut self, cancel: &CancellationToken) -> Result<()> {
        if !self.needs_wait {
            return self.check_deadline(Duration::ZERO);
        }
        let delay = self.backoff_policy.wait_period(&self.state);
        self.check_deadline(delay)?;
        crate::sleep_or_cancel(delay, cancel).await?;
        self.needs_wait = false;
        Ok(())
    }

    fn check_deadline(&self, delay: Duration) -> Result<()> {
        let Some(deadline) = self.deadline else {
            return Ok(());
        };
        let elapsed = self.started.elapsed();
        if elapsed.saturating_add(delay) > deadline {
            return Err(Error::timeout(DeadlineExceeded::new(deadline, elapsed)));
        }
        Ok(())
    }

    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_sub(self.started.elapsed()))
    }
}

/// Decodes the final model from the last response.
///
/// An empty body decodes as JSON `null`, so `()`, `Option<T>`, and
/// [serde::de::IgnoredAny] work for operations without a result. A
/// `404 Not Found` only completes a `DELETE`, its body describes the missing
/// resource and is treated as empty.
pub(crate) fn decode_model<T>(response: &HttpResponse) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    if response.status == http::StatusCode::NOT_FOUND
        || response.body.iter().all(u8::is_ascii_whitespace)
    {
        return serde_json::from_value(serde_json::Value::Null).map_err(Error::deser);
    }
    response.json::<T>()
}

/// Converts a terminal, unsuccessful, response into an error.
pub(crate) fn operation_failure(state: FailureState, response: &HttpResponse) -> OperationFailure {
    OperationFailure::new(
        state,
        response.status.as_u16(),
        response.headers.clone(),
        response.body.clone(),
    )
}

/// A [Poller][crate::Poller] for ARM operations.
///
/// Each call to [poll()][crate::Poller::poll] sends one `GET` request to the
/// poll URL discovered from the initiating response. Obtain instances from
/// [OperationFuture::into_poller][crate::OperationFuture::into_poller].
///
/// # Parameters
/// * `R` - the type of the final model.
#[derive(Debug)]
pub struct ArmPoller<R> {
    inner: PollLoop,
    pending: Option<Result<R>>,
    done: bool,
    model: PhantomData<fn() -> R>,
}

impl<R> ArmPoller<R> {
    /// Creates a poller. If `pending` is set the operation has already
    /// completed, and the first poll returns it without any requests.
    pub(crate) fn new(inner: PollLoop, pending: Option<Result<R>>) -> Self {
        Self {
            inner,
            pending,
            done: false,
            model: PhantomData,
        }
    }

    /// The counters for this polling loop.
    pub fn polling_state(&self) -> &PollingState {
        self.inner.state()
    }

    /// The request sent on each poll.
    pub fn polling_request(&self) -> &PollingRequest {
        self.inner.request()
    }
}

impl<R> crate::sealed::Poller for ArmPoller<R> {}

impl<R> crate::Poller<R> for ArmPoller<R>
where
    R: serde::de::DeserializeOwned + Send,
{
    async fn poll(&mut self) -> Option<PollingResult<R>> {
        if self.done {
            return None;
        }
        if let Some(result) = self.pending.take() {
            self.done = true;
            return Some(PollingResult::Completed(result));
        }
        let result = match self.inner.poll_once().await {
            Step::Retry(e) => PollingResult::PollingError(e),
            Step::Stop(e) => PollingResult::Completed(Err(e)),
            Step::Classified(PollState::InProgress, response) => {
                PollingResult::InProgress(Some(response))
            }
            Step::Classified(PollState::Succeeded, response) => {
                PollingResult::Completed(decode_model(&response))
            }
            Step::Classified(PollState::Failed, response) => PollingResult::Completed(Err(
                Error::operation(operation_failure(FailureState::Failed, &response)),
            )),
            Step::Classified(PollState::Canceled, response) => PollingResult::Completed(Err(
                Error::operation(operation_failure(FailureState::Canceled, &response)),
            )),
        };
        self.done = matches!(result, PollingResult::Completed(_));
        Some(result)
    }

    async fn until_done(mut self, cancel: &CancellationToken) -> Result<R> {
        loop {
            if self.pending.is_none() {
                self.inner.wait(cancel).await?;
            }
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::wait_canceled()),
                r = self.poll() => r,
            };
            match result {
                // The operation completed, or the polling policy stopped the loop.
                Some(PollingResult::Completed(r)) => return r,
                // The operation is still running, or the polling policy
                // decided the error is recoverable.
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
