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

//! Azure Resource Manager (ARM) API helpers.
//!
//! This crate contains the types and functions shared by every ARM operation:
//! the error type, the HTTP request/response primitive, the retry and polling
//! policies, and the client configuration.
//!
//! The long-running operation (LRO) machinery that consumes these building
//! blocks lives in the `azure-arm-lro` crate.

/// An alias of [std::result::Result] where the error is always [crate::error::Error].
///
/// This is the result type used by all functions wrapping ARM requests.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The core error types used by ARM clients.
pub mod error;

/// Defines the HTTP request/response primitive and its default implementation.
pub mod http_client;

/// Expands ARM path templates into request paths.
pub mod path_parameter;

pub mod backoff_policy;
pub mod exponential_backoff;
pub mod options;
pub mod polling_backoff_policy;
pub mod polling_error_policy;
pub mod polling_state;
pub mod retry_loop_internal;
pub mod retry_policy;
pub mod retry_result;
