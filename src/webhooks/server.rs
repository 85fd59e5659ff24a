//! Admission webhook server.
//!
//! Serves the admission endpoints over TLS:
//! - `POST /mutate` - label mutation policies
//! - `POST /validate` - CEL validation policies
//! - `GET /health` - fixed health payload
//! - `GET /metrics` - Prometheus metrics
//!
//! Every successfully processed review is answered with HTTP 200; the
//! verdict lives in the response envelope. Only malformed reviews (400) and
//! policy store failures (500) produce non-200 responses, which the API
//! server interprets per the registered webhook's failure policy.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use kube::Client;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::admission::{AdmissionRequest, AdmissionReview, AdmissionReviewResponse};
use crate::error::{Error, Result};
use crate::health::Metrics;
use crate::policy::{
    CelEvaluator, MutationPolicy, PolicyStore, ValidationPolicy, mutation, validation,
};

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 8443;

/// Server configuration, read from the environment with defaults.
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub port: u16,
    pub cert_path: String,
    pub key_path: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            port: WEBHOOK_PORT,
            cert_path: WEBHOOK_CERT_PATH.to_string(),
            key_path: WEBHOOK_KEY_PATH.to_string(),
        }
    }
}

impl WebhookConfig {
    /// Read `WEBHOOK_PORT`, `WEBHOOK_CERT_PATH` and `WEBHOOK_KEY_PATH`,
    /// falling back to the defaults.
    pub fn from_env() -> Self {
        let default = Self::default();
        let port = match std::env::var("WEBHOOK_PORT") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(raw = %raw, "WEBHOOK_PORT is not a valid port, using default");
                default.port
            }),
            Err(_) => default.port,
        };
        Self {
            port,
            cert_path: std::env::var("WEBHOOK_CERT_PATH").unwrap_or(default.cert_path),
            key_path: std::env::var("WEBHOOK_KEY_PATH").unwrap_or(default.key_path),
        }
    }
}

/// Shared state for webhook handlers
pub struct WebhookState {
    pub store: PolicyStore,
    pub cel: CelEvaluator,
    pub metrics: Metrics,
}

impl WebhookState {
    pub fn new(client: Client) -> Self {
        let metrics = Metrics::new();
        let cel = CelEvaluator::new(metrics.cel_evaluations_total.clone());
        Self {
            store: PolicyStore::new(client),
            cel,
            metrics,
        }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/mutate", post(mutate))
        .route("/validate", post(validate))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Reject reviews that decoded but are structurally unusable.
fn check_request(request: &AdmissionRequest) -> Result<()> {
    if request.uid.is_empty() {
        return Err(Error::MalformedRequest("request.uid is empty".to_string()));
    }
    if request.kind.kind.is_empty() {
        return Err(Error::MalformedRequest(
            "request.kind.kind is empty".to_string(),
        ));
    }
    Ok(())
}

/// Build the mutate verdict for an already-validated request.
pub fn build_mutate_response(
    request: &AdmissionRequest,
    policies: &[MutationPolicy],
) -> Result<AdmissionReviewResponse> {
    let object = request.acting_object().ok_or_else(|| {
        Error::MalformedRequest("request carries neither object nor oldObject".to_string())
    })?;

    let patch = mutation::mutate_object(request, object, policies);
    AdmissionReviewResponse::allowed_with_patch(&request.uid, &patch)
}

/// Build the validate verdict for an already-validated request.
pub fn build_validate_response(
    request: &AdmissionRequest,
    cel: &CelEvaluator,
    policies: &[ValidationPolicy],
) -> Result<AdmissionReviewResponse> {
    let object = request.acting_object().ok_or_else(|| {
        Error::MalformedRequest("request carries neither object nor oldObject".to_string())
    })?;

    let verdict = validation::validate_object(request, Some(object), cel, policies);
    Ok(match verdict.message {
        Some(message) => AdmissionReviewResponse::denied(&request.uid, message),
        None => AdmissionReviewResponse::allowed(&request.uid, verdict.warnings),
    })
}

/// Mutating webhook handler
async fn mutate(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview>,
) -> Result<Json<AdmissionReviewResponse>> {
    let request = review.request;
    check_request(&request)?;

    debug!(
        uid = %request.uid,
        operation = %request.operation,
        kind = %request.kind.kind,
        namespace = ?request.namespace,
        "Processing mutate request"
    );

    let namespace = request.effective_namespace().map(str::to_string);
    let policies = state.store.mutation_policies(namespace.as_deref()).await?;
    let response = build_mutate_response(&request, &policies)?;

    let patched = response.response.patch.is_some();
    state
        .metrics
        .record_review("mutate", if patched { "patched" } else { "allowed" });
    info!(
        uid = %request.uid,
        kind = %request.kind.kind,
        patched,
        "Mutate request allowed"
    );
    Ok(Json(response))
}

/// Validating webhook handler
async fn validate(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview>,
) -> Result<Json<AdmissionReviewResponse>> {
    let request = review.request;
    check_request(&request)?;

    info!(
        uid = %request.uid,
        user = %request.user_info.username,
        groups = ?request.user_info.groups,
        operation = %request.operation,
        kind = %request.kind.kind,
        namespace = ?request.namespace,
        name = ?request.name,
        "Processing validate request"
    );

    let namespace = request.effective_namespace().map(str::to_string);
    let policies = state.store.validation_policies(namespace.as_deref()).await?;
    let response = build_validate_response(&request, &state.cel, &policies)?;

    let body = &response.response;
    if body.allowed {
        let warnings = body.warnings.as_ref().map_or(0, Vec::len) as u64;
        state.metrics.record_review("validate", "allowed");
        state.metrics.record_violations("warn", warnings);
        info!(uid = %request.uid, kind = %request.kind.kind, warnings, "Validate request allowed");
    } else {
        state.metrics.record_review("validate", "denied");
        state.metrics.record_violations("enforce", 1);
        info!(
            uid = %request.uid,
            kind = %request.kind.kind,
            message = ?body.status.as_ref().map(|s| s.message.as_str()),
            "Validate request denied"
        );
    }
    Ok(Json(response))
}

/// Health handler, fixed payload
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<WebhookState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum ServeError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Server error
    #[error("webhook server error: {0}")]
    Server(String),
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0 on the configured port and serves the admission
/// endpoints. TLS certificate and key are loaded from the configured PEM
/// paths; provisioning them is an external bootstrap concern.
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    config: &WebhookConfig,
) -> std::result::Result<(), ServeError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let app = create_webhook_router(state);

    let tls = RustlsConfig::from_pem_file(
        PathBuf::from(&config.cert_path),
        PathBuf::from(&config.key_path),
    )
    .await
    .map_err(|e| ServeError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(port = config.port, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, tls)
        .serve(app.into_make_service())
        .await
        .map_err(|e| ServeError::Server(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::crd::MutationPolicySpec;
    use crate::policy::PolicyScope;
    use serde_json::json;

    fn request(body: serde_json::Value) -> AdmissionRequest {
        let review: AdmissionReview =
            serde_json::from_value(json!({ "request": body })).unwrap();
        review.request
    }

    #[test]
    fn test_check_request_rejects_empty_uid() {
        let req = request(json!({
            "uid": "",
            "operation": "CREATE",
            "kind": {"kind": "Pod"},
            "object": {}
        }));
        assert!(matches!(
            check_request(&req),
            Err(Error::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_check_request_rejects_empty_kind() {
        let req = request(json!({
            "uid": "u-1",
            "operation": "CREATE",
            "kind": {"kind": ""},
            "object": {}
        }));
        assert!(matches!(
            check_request(&req),
            Err(Error::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_mutate_without_any_object_is_malformed() {
        let req = request(json!({
            "uid": "u-1",
            "operation": "CREATE",
            "kind": {"kind": "Pod"}
        }));
        assert!(matches!(
            build_mutate_response(&req, &[]),
            Err(Error::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_mutate_with_no_policies_allows_unpatched() {
        let req = request(json!({
            "uid": "u-1",
            "operation": "CREATE",
            "kind": {"kind": "Pod"},
            "object": {"metadata": {}}
        }));

        let response = build_mutate_response(&req, &[]).unwrap();
        assert!(response.response.allowed);
        assert!(response.response.patch.is_none());
    }

    #[test]
    fn test_mutate_uses_old_object_on_delete() {
        let req = request(json!({
            "uid": "u-1",
            "operation": "DELETE",
            "kind": {"kind": "Pod"},
            "namespace": "team-a",
            "oldObject": {"metadata": {"labels": {"env": "staging"}}}
        }));
        let policies = vec![MutationPolicy {
            name: "set-env".to_string(),
            scope: PolicyScope::Cluster,
            spec: MutationPolicySpec {
                match_criteria: serde_json::from_value(json!({
                    "resources": ["Pod"],
                    "operations": ["DELETE"]
                }))
                .unwrap(),
                labels: [("env".to_string(), "prod".to_string())].into(),
            },
        }];

        let response = build_mutate_response(&req, &policies).unwrap();
        assert!(response.response.allowed);
        assert_eq!(response.response.patch_type.as_deref(), Some("JSONPatch"));
    }

    #[test]
    fn test_validate_with_no_policies_allows() {
        let req = request(json!({
            "uid": "u-2",
            "operation": "CREATE",
            "kind": {"kind": "Pod"},
            "object": {"metadata": {}}
        }));

        let cel = CelEvaluator::default();
        let response = build_validate_response(&req, &cel, &[]).unwrap();
        assert!(response.response.allowed);
        assert!(response.response.warnings.is_none());
        assert_eq!(cel.evaluation_count(), 0);
    }
}
