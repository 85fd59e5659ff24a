//! Incoming AdmissionReview envelope.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The review envelope posted by the API server's webhook dispatcher.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AdmissionReview {
    pub request: AdmissionRequest,
}

/// The admission request carried inside the review envelope.
///
/// `uid`, `operation` and `kind` are required by serde; an envelope missing
/// them never reaches a handler. The request is immutable once decoded.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    /// Opaque correlation id, echoed back in the response
    pub uid: String,

    pub operation: Operation,

    pub kind: RequestKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub user_info: UserInfo,

    /// Current state of the admitted object (absent on DELETE)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<serde_json::Value>,

    /// Previous state (present on UPDATE and DELETE)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_object: Option<serde_json::Value>,
}

impl AdmissionRequest {
    /// The object the request acts on: `object` when present, otherwise
    /// `oldObject` (DELETE operations carry only the latter).
    pub fn acting_object(&self) -> Option<&serde_json::Value> {
        self.object.as_ref().or(self.old_object.as_ref())
    }

    /// The namespace the request targets: the request's own namespace field,
    /// falling back to the acting object's `metadata.namespace`.
    pub fn effective_namespace(&self) -> Option<&str> {
        self.namespace.as_deref().or_else(|| {
            self.acting_object()
                .and_then(|obj| obj.pointer("/metadata/namespace"))
                .and_then(serde_json::Value::as_str)
        })
    }
}

/// The `request.kind` group/version/kind triple. Only `kind` is load-bearing
/// for policy matching.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RequestKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    pub kind: String,
}

/// Identity of the caller, as asserted by the API server.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Admission operation. Also used in policy match criteria, so it carries a
/// JSON schema for the CRD definitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "CREATE"),
            Operation::Update => write!(f, "UPDATE"),
            Operation::Delete => write!(f, "DELETE"),
            Operation::Connect => write!(f, "CONNECT"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_review_envelope() {
        let body = json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "operation": "CREATE",
                "kind": {"group": "", "version": "v1", "kind": "Pod"},
                "namespace": "team-a",
                "userInfo": {"username": "alice", "groups": ["system:authenticated"]},
                "object": {"metadata": {"name": "web", "namespace": "team-a"}}
            }
        });

        let review: AdmissionReview = serde_json::from_value(body).unwrap();
        let req = review.request;
        assert_eq!(req.uid, "705ab4f5-6393-11e8-b7cc-42010a800002");
        assert_eq!(req.operation, Operation::Create);
        assert_eq!(req.kind.kind, "Pod");
        assert_eq!(req.namespace.as_deref(), Some("team-a"));
        assert_eq!(req.user_info.username, "alice");
        assert!(req.object.is_some());
        assert!(req.old_object.is_none());
    }

    #[test]
    fn test_missing_uid_is_rejected() {
        let body = json!({
            "request": {
                "operation": "CREATE",
                "kind": {"kind": "Pod"}
            }
        });
        assert!(serde_json::from_value::<AdmissionReview>(body).is_err());
    }

    #[test]
    fn test_acting_object_falls_back_to_old_object() {
        let body = json!({
            "request": {
                "uid": "u-1",
                "operation": "DELETE",
                "kind": {"kind": "Pod"},
                "oldObject": {"metadata": {"name": "web", "namespace": "team-b"}}
            }
        });

        let review: AdmissionReview = serde_json::from_value(body).unwrap();
        let req = review.request;
        assert!(req.acting_object().is_some());
        assert_eq!(req.effective_namespace(), Some("team-b"));
    }

    #[test]
    fn test_request_namespace_wins_over_object_namespace() {
        let body = json!({
            "request": {
                "uid": "u-2",
                "operation": "UPDATE",
                "kind": {"kind": "Pod"},
                "namespace": "team-a",
                "object": {"metadata": {"namespace": "team-b"}}
            }
        });

        let review: AdmissionReview = serde_json::from_value(body).unwrap();
        assert_eq!(review.request.effective_namespace(), Some("team-a"));
    }

    #[test]
    fn test_operation_wire_format() {
        assert_eq!(
            serde_json::to_value(Operation::Create).unwrap(),
            json!("CREATE")
        );
        assert_eq!(Operation::Delete.to_string(), "DELETE");
        let op: Operation = serde_json::from_value(json!("CONNECT")).unwrap();
        assert_eq!(op, Operation::Connect);
    }
}
