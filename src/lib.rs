//! cel-policy-webhook library crate
//!
//! A Kubernetes admission webhook that evaluates CEL-based mutation and
//! validation policies stored as custom resources.

pub mod admission;
pub mod crd;
pub mod error;
pub mod health;
pub mod policy;
pub mod webhooks;

pub use error::{Error, Result};
pub use health::Metrics;
pub use webhooks::{
    ServeError, WebhookConfig, WebhookState, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT,
    run_webhook_server,
};
