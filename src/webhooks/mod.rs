//! Admission webhook HTTP boundary.
//!
//! Two mutating/validating endpoints sharing the policy store and the wire
//! protocol infrastructure, plus health and metrics.

mod server;

pub use server::{
    ServeError, WebhookConfig, WebhookState, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT,
    build_mutate_response, build_validate_response, create_webhook_router, run_webhook_server,
};
