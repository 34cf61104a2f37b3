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

//! Fixtures for a fake ARM service running on a local `httptest` server.

use gax::exponential_backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use gax::options::ClientConfig;
use httptest::Server;
use lro::ArmClient;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const API_VERSION: &str = "2023-07-01";

pub const VAULT_TEMPLATE: &str = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers/Microsoft.KeyVault/vaults/{vaultName}";
pub const VAULT_PATH: &str =
    "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.KeyVault/vaults/v1";
pub const VAULT_PARAMS: &[(&str, &str)] = &[
    ("subscriptionId", "sub-1"),
    ("resourceGroupName", "rg-1"),
    ("vaultName", "v1"),
];

pub const OPERATION_PATH: &str =
    "/subscriptions/sub-1/providers/Microsoft.KeyVault/locations/eastus/operationResults/op-1";
pub const LOCATION_PATH: &str =
    "/subscriptions/sub-1/providers/Microsoft.KeyVault/locations/eastus/operationResults/loc-1";

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    pub name: String,
    pub properties: VaultProperties,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VaultProperties {
    pub provisioning_state: String,
}

/// The operation-status resource returned by `Azure-AsyncOperation` URLs.
#[derive(Debug, Deserialize, PartialEq)]
pub struct OperationStatus {
    pub name: String,
    pub status: String,
}

/// A client for the fake service, with short backoff delays.
pub fn client(server: &Server) -> anyhow::Result<ArmClient> {
    let config = ClientConfig::new()
        .set_endpoint(server.url_str(""))
        .set_api_version(API_VERSION)
        .set_backoff_policy(test_backoff())
        .set_polling_backoff_policy(test_backoff());
    Ok(ArmClient::new(config)?)
}

pub fn test_backoff() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_delay(Duration::from_millis(1))
        .with_maximum_delay(Duration::from_millis(1))
        .clamp()
}

/// The value of the `Azure-AsyncOperation` header.
pub fn operation_url(server: &Server) -> String {
    server.url_str(&format!("{OPERATION_PATH}?api-version={API_VERSION}"))
}

/// The value of the `Location` header.
pub fn location_url(server: &Server) -> String {
    server.url_str(LOCATION_PATH)
}

/// The body of an operation-status resource.
pub fn operation_status(status: &str) -> String {
    json!({
        "id": OPERATION_PATH,
        "name": "op-1",
        "status": status,
        "startTime": "2025-01-01T00:00:00Z",
    })
    .to_string()
}

/// The body of the vault resource.
pub fn vault(provisioning_state: &str) -> String {
    json!({
        "id": VAULT_PATH,
        "name": "v1",
        "type": "Microsoft.KeyVault/vaults",
        "location": "eastus",
        "properties": {"provisioningState": provisioning_state},
    })
    .to_string()
}

/// An ARM error envelope.
pub fn error(code: &str, message: &str) -> String {
    json!({"error": {"code": code, "message": message}}).to_string()
}
