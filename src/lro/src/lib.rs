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

//! Long-running operations for Azure Resource Manager.
//!
//! Many ARM operations, such as creating a virtual machine or deleting a
//! resource group, take minutes to complete. The service accepts the request
//! right away and returns headers that tell the client where to poll for
//! progress. This crate discovers the poll URL, polls it with backoff, and
//! decodes the final result.
//!
//! Most applications use [ArmClient::start] to send the initiating request,
//! and then [OperationFuture::poll_until_done] to wait for the result:
//!
//! ```no_run
//! # use azure_arm_lro::*;
//! # use gax::options::{ClientConfig, RequestOptions};
//! use tokio_util::sync::CancellationToken;
//! # async fn sample() -> Result<()> {
//! let client = ArmClient::new(ClientConfig::new().set_api_version("2023-07-01"))?;
//! let create = OperationDescriptor::put(
//!     "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers/Microsoft.KeyVault/vaults/{vaultName}",
//! );
//! let body = serde_json::json!({"location": "eastus", "properties": {}});
//! let mut operation = client
//!     .start::<_, serde_json::Value>(
//!         &create,
//!         &[("subscriptionId", "my-subscription"), ("resourceGroupName", "my-rg"), ("vaultName", "my-vault")],
//!         Some(&body),
//!         RequestOptions::default(),
//!     )
//!     .await?;
//! let vault = operation.poll_until_done(&CancellationToken::new()).await?;
//! println!("created {vault:?}");
//! # Ok(()) }
//! ```
//!
//! Applications that need more control over the polling loop can convert the
//! operation into a [Poller].

pub use gax::Result;
pub use gax::error::Error;
use tokio_util::sync::CancellationToken;

mod classify;
pub use classify::{PollState, classify, classify_initial, status_field};

mod polling_request;
pub use polling_request::{PollTarget, PollingRequest};

mod poller;
pub use poller::ArmPoller;

mod custom;
pub use custom::{PollOutcome, new_custom_poller};

mod future;
pub use future::{OperationFuture, Phase};

mod descriptor;
pub use descriptor::{ArmClient, OperationDescriptor};

#[cfg(test)]
mod fake_client;

/// The result of polling a long-running operation.
///
/// # Parameters
/// * `R` - the response type. This is the type returned when the operation
///   completes successfully.
#[derive(Debug)]
pub enum PollingResult<R> {
    /// The operation is still in progress.
    ///
    /// Contains the response to the poll request, if there was one.
    InProgress(Option<gax::http_client::HttpResponse>),
    /// The operation completed. This includes the result.
    Completed(Result<R>),
    /// An error trying to poll the operation.
    ///
    /// Not all errors indicate that the operation failed. For example, the
    /// connection to the service may drop. Such transient errors may disappear
    /// in the next polling attempt.
    PollingError(Error),
}

mod sealed {
    pub trait Poller {}
}

/// The trait implemented by pollers for long-running operations.
///
/// # Parameters
/// * `R` - the response type, that is, the type of response included when the
///   long-running operation completes successfully.
pub trait Poller<R>: Send + sealed::Poller {
    /// Query the current status of the long-running operation.
    ///
    /// Returns `None` once the operation completed and the result was
    /// returned.
    fn poll(&mut self) -> impl Future<Output = Option<PollingResult<R>>> + Send;

    /// Poll the long-running operation until it completes.
    ///
    /// Waits between polls as prescribed by the polling backoff policy. If
    /// `cancel` fires, the wait stops right away with a
    /// [wait canceled][Error::is_wait_canceled] error. The operation itself is
    /// not canceled.
    fn until_done(self, cancel: &CancellationToken) -> impl Future<Output = Result<R>> + Send;

    /// Convert a poller to a [futures::Stream].
    #[cfg(feature = "unstable-stream")]
    fn into_stream(self) -> impl futures::Stream<Item = PollingResult<R>> + Unpin;
}

/// Sleeps for `delay`, unless `cancel` fires first.
pub(crate) async fn sleep_or_cancel(
    delay: std::time::Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::wait_canceled()),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Returned by [Poller::until_done] if the poller already returned the result.
#[derive(thiserror::Error, Debug)]
#[error("the polling loop already completed")]
pub(crate) struct PollerCompleted;

#[cfg(feature = "unstable-stream")]
pub(crate) fn into_stream<R, P>(poller: P) -> impl futures::Stream<Item = PollingResult<R>> + Unpin
where
    P: Poller<R>,
{
    use futures::stream::unfold;
    Box::pin(unfold(Some(poller), move |state| async move {
        if let Some(mut poller) = state {
            if let Some(pr) = poller.poll().await {
                return Some((pr, Some(poller)));
            }
        };
        None
    }))
}
