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

use crate::classify::{PollState, classify_initial};
use crate::descriptor::{ArmClient, OperationDescriptor};
use crate::poller::{ArmPoller, PollLoop, Step, decode_model, operation_failure};
use crate::polling_request::PollingRequest;
use crate::{Error, Result};
use gax::error::FailureState;
use gax::http_client::HttpResponse;
use gax::options::RequestOptions;
use gax::polling_state::PollingState;
use tokio_util::sync::CancellationToken;
use url::Url;

/// The lifecycle of an [OperationFuture].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// The initiating request was accepted, no poll has completed yet.
    Initiated,
    /// At least one poll reported the operation is still running.
    Polling,
    Succeeded,
    Failed,
    /// The service reports the operation was canceled.
    Canceled,
}

impl Phase {
    /// Returns true for [Succeeded][Phase::Succeeded],
    /// [Failed][Phase::Failed], and [Canceled][Phase::Canceled].
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// A long-running ARM operation.
///
/// Returned by [ArmClient::start][crate::ArmClient::start] once the service
/// accepts the initiating request. Use [poll_until_done()][Self::poll_until_done]
/// to wait for the operation, or [poll_once()][Self::poll_once] to drive the
/// polling loop one request at a time.
///
/// Once the operation reaches a terminal phase the outcome is cached, and no
/// further requests are sent.
///
/// # Parameters
/// * `T` - the final model. Use `()`, `Option<T>`, or
///   [serde::de::IgnoredAny] for operations without a result.
#[derive(Debug)]
pub struct OperationFuture<T> {
    poller: PollLoop,
    phase: Phase,
    last_response: HttpResponse,
    model: Option<T>,
}

impl<T> OperationFuture<T>
where
    T: serde::de::DeserializeOwned,
{
    /// Creates the future from the response to the initiating request.
    ///
    /// Fails with an [unexpected status][Error::is_unexpected_status] error if
    /// the status code is not one of the `descriptor`'s expected statuses. No
    /// poll requests are sent in that case.
    ///
    /// Operations that complete with the initiating response, i.e. without
    /// poll headers and with a terminal (or absent) status field, start in a
    /// terminal phase.
    pub fn new(
        client: &ArmClient,
        descriptor: &OperationDescriptor,
        resource_url: Url,
        initial_response: HttpResponse,
        options: &RequestOptions,
    ) -> Result<Self> {
        if !descriptor.is_expected(initial_response.status) {
            return Err(initial_response.into_error());
        }
        let state = if descriptor.long_running() {
            classify_initial(&initial_response)
        } else {
            PollState::Succeeded
        };
        let request =
            PollingRequest::from_initial(descriptor.method(), &resource_url, &initial_response)
                .with_headers(options.headers());
        let poller = PollLoop::new(
            client.http_client(),
            request,
            client.get_polling_error_policy(options),
            client.get_polling_backoff_policy(options),
        )
        .with_attempt_timeout(client.get_attempt_timeout(options))
        .with_deadline(client.get_polling_deadline(options))
        .with_initial_retry_after(initial_response.retry_after());

        let mut future = Self {
            poller,
            phase: Phase::Initiated,
            last_response: initial_response,
            model: None,
        };
        if state != PollState::InProgress {
            future.record(state)?;
        }
        tracing::debug!(
            url = %future.poller.request().url(),
            phase = ?future.phase,
            "operation accepted"
        );
        Ok(future)
    }

    /// The state of the operation, as of the last response.
    pub fn state(&self) -> PollState {
        match self.phase {
            Phase::Initiated | Phase::Polling => PollState::InProgress,
            Phase::Succeeded => PollState::Succeeded,
            Phase::Failed => PollState::Failed,
            Phase::Canceled => PollState::Canceled,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The last response received, either the initiating response or the
    /// response to the last successful poll.
    pub fn last_response(&self) -> &HttpResponse {
        &self.last_response
    }

    /// The final model, available once the operation succeeds.
    pub fn model(&self) -> Option<&T> {
        self.model.as_ref()
    }

    /// The request sent on each poll.
    pub fn polling_request(&self) -> &PollingRequest {
        self.poller.request()
    }

    /// The counters for the polling loop.
    pub fn polling_state(&self) -> &PollingState {
        self.poller.state()
    }

    /// Sends one poll request, without waiting first.
    ///
    /// Returns the new state. Once the operation is terminal this returns the
    /// cached state without sending a request. Errors the polling error policy
    /// considers recoverable are returned too, the next call retries.
    pub async fn poll_once(&mut self) -> Result<PollState> {
        if self.phase.is_terminal() {
            return Ok(self.state());
        }
        match self.poller.poll_once().await {
            Step::Classified(state, response) => {
                self.last_response = response;
                self.record(state)?;
                Ok(self.state())
            }
            Step::Retry(e) | Step::Stop(e) => Err(e),
        }
    }

    /// Polls until the operation completes.
    ///
    /// Returns the final model on success, and an
    /// [operation failed][Error::is_operation_failed] error if the service
    /// reports the operation failed or was canceled.
    ///
    /// If `cancel` fires, or the polling deadline would be exceeded, this
    /// returns an error and the future remains usable: a later call resumes
    /// polling the same URL.
    pub async fn poll_until_done(&mut self, cancel: &CancellationToken) -> Result<&T> {
        loop {
            if self.phase.is_terminal() {
                return self.outcome();
            }
            self.poller.wait(cancel).await?;
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::wait_canceled()),
                s = self.poller.poll_once() => s,
            };
            match step {
                Step::Classified(state, response) => {
                    self.last_response = response;
                    self.record(state)?;
                }
                Step::Retry(_) => {}
                Step::Stop(e) => return Err(e),
            }
        }
    }

    /// Converts the future into a [Poller][crate::Poller].
    ///
    /// If the operation already completed the first
    /// [poll()][crate::Poller::poll] returns the outcome without sending any
    /// requests.
    pub fn into_poller(self) -> ArmPoller<T> {
        let pending = match self.phase {
            Phase::Initiated | Phase::Polling => None,
            Phase::Succeeded => Some(match self.model {
                Some(m) => Ok(m),
                None => decode_model(&self.last_response),
            }),
            Phase::Failed => Some(Err(Error::operation(operation_failure(
                FailureState::Failed,
                &self.last_response,
            )))),
            Phase::Canceled => Some(Err(Error::operation(operation_failure(
                FailureState::Canceled,
                &self.last_response,
            )))),
        };
        ArmPoller::new(self.poller, pending)
    }

    /// Moves to the phase matching `state`, decoding the model on success.
    fn record(&mut self, state: PollState) -> Result<()> {
        self.phase = match state {
            PollState::InProgress => Phase::Polling,
            PollState::Succeeded => Phase::Succeeded,
            PollState::Failed => Phase::Failed,
            PollState::Canceled => Phase::Canceled,
        };
        if self.phase.is_terminal() {
            tracing::debug!(
                url = %self.poller.request().url(),
                phase = ?self.phase,
                "operation completed"
            );
        }
        if self.phase == Phase::Succeeded {
            self.model = Some(decode_model(&self.last_response)?);
        }
        Ok(())
    }

    fn outcome(&mut self) -> Result<&T> {
        match self.phase {
            Phase::Failed => Err(Error::operation(operation_failure(
                FailureState::Failed,
                &self.last_response,
            ))),
            Phase::Canceled => Err(Error::operation(operation_failure(
                FailureState::Canceled,
                &self.last_response,
            ))),
            _ => {
                let model = match self.model.take() {
                    Some(m) => m,
                    None => decode_model(&self.last_response)?,
                };
                Ok(self.model.insert(model))
            }
        }
    }
}
