//! Error types for the webhook.
//!
//! Classifies failures per the admission contract: malformed reviews are the
//! caller's fault (400), policy store and serialization failures are ours
//! (500). CEL failures never appear here; the validating engine consumes
//! them as failing rule results.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Error type for webhook operations
#[derive(Error, Debug)]
pub enum Error {
    /// The admission review was structurally invalid
    #[error("malformed admission review: {0}")]
    MalformedRequest(String),

    /// Policy listing failed for a reason other than an absent CRD
    #[error("policy fetch error: {0}")]
    PolicyFetch(#[source] kube::Error),

    /// Serialization error (patch or response encoding)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Check whether a kube API error means the policy CRD is not installed.
    ///
    /// Absence of a policy type is a valid configuration state, recovered to
    /// an empty policy list by the store. Everything else propagates.
    pub fn is_crd_absent(err: &kube::Error) -> bool {
        matches!(err, kube::Error::Api(e) if e.code == 404)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Error::PolicyFetch(_) | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Result type alias for webhook operations
pub type Result<T> = std::result::Result<T, Error>;
