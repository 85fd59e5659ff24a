//! Outgoing AdmissionReview response envelope.
//!
//! Every successfully processed request is answered with HTTP 200 and one of
//! these envelopes; the API server reads the verdict from `response.allowed`.
//! `patchType`/`patch` appear only when a patch exists, `warnings` only when
//! non-empty, `status` only on denial.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::error::Result;

const API_VERSION: &str = "admission.k8s.io/v1";
const KIND: &str = "AdmissionReview";
const PATCH_TYPE_JSON_PATCH: &str = "JSONPatch";

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponseBody,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponseBody {
    pub uid: String,

    pub allowed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<String>,

    /// base64 of the JSON array of patch operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusDetail>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StatusDetail {
    pub message: String,
}

impl AdmissionReviewResponse {
    fn wrap(response: AdmissionResponseBody) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            response,
        }
    }

    /// Admit the request unchanged. Warnings are attached only when present.
    pub fn allowed(uid: impl Into<String>, warnings: Vec<String>) -> Self {
        Self::wrap(AdmissionResponseBody {
            uid: uid.into(),
            allowed: true,
            patch_type: None,
            patch: None,
            warnings: if warnings.is_empty() {
                None
            } else {
                Some(warnings)
            },
            status: None,
        })
    }

    /// Admit the request with a JSON patch. An empty patch degrades to a
    /// plain allow so the response carries no `patch` field at all.
    pub fn allowed_with_patch(uid: impl Into<String>, patch: &json_patch::Patch) -> Result<Self> {
        if patch.0.is_empty() {
            return Ok(Self::allowed(uid, Vec::new()));
        }

        let encoded = BASE64.encode(serde_json::to_vec(patch)?);
        Ok(Self::wrap(AdmissionResponseBody {
            uid: uid.into(),
            allowed: true,
            patch_type: Some(PATCH_TYPE_JSON_PATCH.to_string()),
            patch: Some(encoded),
            warnings: None,
            status: None,
        }))
    }

    /// Deny the request with a human-readable message.
    pub fn denied(uid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::wrap(AdmissionResponseBody {
            uid: uid.into(),
            allowed: false,
            patch_type: None,
            patch: None,
            warnings: None,
            status: Some(StatusDetail {
                message: message.into(),
            }),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use json_patch::{AddOperation, Patch, PatchOperation};
    use jsonptr::PointerBuf;

    #[test]
    fn test_plain_allow_omits_optional_fields() {
        let resp = AdmissionReviewResponse::allowed("u-1", Vec::new());
        let value = serde_json::to_value(&resp).unwrap();

        assert_eq!(value["apiVersion"], "admission.k8s.io/v1");
        assert_eq!(value["kind"], "AdmissionReview");
        assert_eq!(value["response"]["uid"], "u-1");
        assert_eq!(value["response"]["allowed"], true);
        let body = value["response"].as_object().unwrap();
        assert!(!body.contains_key("patch"));
        assert!(!body.contains_key("patchType"));
        assert!(!body.contains_key("warnings"));
        assert!(!body.contains_key("status"));
    }

    #[test]
    fn test_warnings_present_when_non_empty() {
        let resp =
            AdmissionReviewResponse::allowed("u-2", vec!["first".to_string(), "second".to_string()]);
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            value["response"]["warnings"],
            serde_json::json!(["first", "second"])
        );
    }

    #[test]
    fn test_patch_round_trips_through_base64() {
        let patch = Patch(vec![PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(["metadata", "labels", "env"]),
            value: serde_json::Value::String("prod".to_string()),
        })]);

        let resp = AdmissionReviewResponse::allowed_with_patch("u-3", &patch).unwrap();
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["response"]["patchType"], "JSONPatch");

        let decoded = BASE64
            .decode(value["response"]["patch"].as_str().unwrap())
            .unwrap();
        let ops: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(
            ops,
            serde_json::json!([
                {"op": "add", "path": "/metadata/labels/env", "value": "prod"}
            ])
        );
    }

    #[test]
    fn test_empty_patch_degrades_to_plain_allow() {
        let resp = AdmissionReviewResponse::allowed_with_patch("u-4", &Patch(vec![])).unwrap();
        let value = serde_json::to_value(&resp).unwrap();
        let body = value["response"].as_object().unwrap();
        assert_eq!(body["allowed"], true);
        assert!(!body.contains_key("patch"));
        assert!(!body.contains_key("patchType"));
    }

    #[test]
    fn test_denial_carries_status_message() {
        let resp = AdmissionReviewResponse::denied("u-5", "validation failed");
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["response"]["allowed"], false);
        assert_eq!(value["response"]["status"]["message"], "validation failed");
    }
}
