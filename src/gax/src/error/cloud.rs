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

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// The error details returned by Azure Resource Manager.
///
/// ARM services report errors, including the errors of failed long-running
/// operations, using a common JSON envelope:
///
/// ```norust
/// {"error": {"code": "...", "message": "...", "target": "...", "details": [...]}}
/// ```
///
/// Unknown fields are ignored. The `details` field nests more `CloudError`
/// values, which often carry the root cause of the failure.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct CloudError {
    /// An identifier for the error, e.g. `ResourceGroupNotFound`.
    pub code: String,

    /// A human-readable message, in English.
    pub message: String,

    /// The target of the error, e.g. the name of a property in the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Additional errors, typically the root causes of this one.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<CloudError>,

    /// Free-form information about the error, such as policy violations.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_info: Vec<serde_json::Value>,
}

impl CloudError {
    /// Sets the value for [code][CloudError::code].
    pub fn set_code<T: Into<String>>(mut self, v: T) -> Self {
        self.code = v.into();
        self
    }

    /// Sets the value for [message][CloudError::message].
    pub fn set_message<T: Into<String>>(mut self, v: T) -> Self {
        self.message = v.into();
        self
    }

    /// Sets the value for [target][CloudError::target].
    pub fn set_target<T: Into<String>>(mut self, v: T) -> Self {
        self.target = Some(v.into());
        self
    }

    /// Sets the value for [details][CloudError::details].
    pub fn set_details<T, I>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = I>,
        I: Into<CloudError>,
    {
        self.details = v.into_iter().map(|v| v.into()).collect();
        self
    }
}

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: CloudError,
}

impl TryFrom<&bytes::Bytes> for CloudError {
    type Error = Error;

    fn try_from(value: &bytes::Bytes) -> Result<Self, Self::Error> {
        serde_json::from_slice::<ErrorWrapper>(value)
            .map(|w| w.error)
            .map_err(Error::deser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE_PAYLOAD: &[u8] = br#"{
        "error": {
            "code": "InvalidTemplateDeployment",
            "message": "The template deployment failed with multiple errors.",
            "target": "vmName",
            "details": [
                {"code": "SkuNotAvailable", "message": "The requested size is not available."}
            ],
            "additionalInfo": [
                {"type": "PolicyViolation", "info": {"policyDefinitionName": "allowed-locations"}}
            ],
            "unknownField": 42
        }
    }"#;

    #[test]
    fn parse_envelope() -> anyhow::Result<()> {
        let payload = bytes::Bytes::from_static(SAMPLE_PAYLOAD);
        let got = CloudError::try_from(&payload)?;
        let want = CloudError::default()
            .set_code("InvalidTemplateDeployment")
            .set_message("The template deployment failed with multiple errors.")
            .set_target("vmName")
            .set_details([CloudError::default()
                .set_code("SkuNotAvailable")
                .set_message("The requested size is not available.")]);
        assert_eq!(got.code, want.code);
        assert_eq!(got.message, want.message);
        assert_eq!(got.target, want.target);
        assert_eq!(got.details, want.details);
        assert_eq!(
            got.additional_info,
            vec![json!({"type": "PolicyViolation", "info": {"policyDefinitionName": "allowed-locations"}})]
        );
        Ok(())
    }

    #[test]
    fn parse_operation_status_body() -> anyhow::Result<()> {
        let payload = bytes::Bytes::from_static(
            br#"{"id": "op-123", "status": "Failed", "error": {"code": "Conflict", "message": "busy"}}"#,
        );
        let got = CloudError::try_from(&payload)?;
        assert_eq!(got.code, "Conflict");
        assert_eq!(got.message, "busy");
        assert!(got.details.is_empty(), "{got:?}");
        Ok(())
    }

    #[test]
    fn missing_envelope() {
        let payload = bytes::Bytes::from_static(br#"{"status": "Failed"}"#);
        let got = CloudError::try_from(&payload);
        assert!(matches!(&got, Err(e) if e.is_deserialization()), "{got:?}");

        let payload = bytes::Bytes::from_static(b"<html>Bad Gateway</html>");
        let got = CloudError::try_from(&payload);
        assert!(matches!(&got, Err(e) if e.is_deserialization()), "{got:?}");
    }

    #[test]
    fn serialize_skips_empty() -> anyhow::Result<()> {
        let error = CloudError::default().set_code("c").set_message("m");
        let got = serde_json::to_value(&error)?;
        assert_eq!(got, json!({"code": "c", "message": "m"}));
        Ok(())
    }
}
