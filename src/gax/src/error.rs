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

mod core_error;
pub use core_error::*;
mod operation;
pub use operation::{DeadlineExceeded, FailureState, OperationFailure};

/// Errors and error details related to local path expansion.
///
/// These errors occur when required path parameters are either missing, or
/// are present, but in an invalid format. The client fails these requests
/// locally because it does not know how to send such requests.
pub mod binding;

/// The error payload returned by Azure Resource Manager.
///
/// ARM reports errors using a common JSON envelope. The types in this module
/// represent that envelope, which is attached to [Error] values whenever the
/// service includes it.
///
/// # Examples
///
/// ```
/// # use azure_arm_gax::error;
/// use error::Error;
/// fn handle_error(e: Error) {
///     if let Some(cloud) = e.cloud_error() {
///         println!("the service reported {} - {}", cloud.code, cloud.message)
///     }
/// }
/// ```
pub mod cloud;
