//! cel-policy-webhook - a Kubernetes admission webhook evaluating CEL-based
//! mutation and validation policies.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Creates the Kubernetes client (fails fast without cluster credentials)
//! - Starts the TLS webhook server
//! - Shuts down on SIGTERM/SIGINT

use std::sync::Arc;

use kube::Client;
use tokio::signal;
use tracing::{error, info};

use cel_policy_webhook::webhooks::{WebhookConfig, WebhookState, run_webhook_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cel_policy_webhook=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting cel-policy-webhook");

    // The single process-wide client handle; every policy lookup goes
    // through it. No credentials means no service.
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let config = WebhookConfig::from_env();
    let state = Arc::new(WebhookState::new(client));

    let server_handle = {
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = run_webhook_server(state, &config).await {
                error!("Webhook server error: {}", e);
            }
        })
    };

    tokio::select! {
        result = server_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, shutting down");
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut
/// down gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
