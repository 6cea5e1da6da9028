//! Webhook server.
//!
//! Receives Bot API updates over HTTP instead of long polling.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::delivery::updates::Update;
use crate::orchestrator::Orchestrator;
use anyhow::Context;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Header carrying the secret registered with `setWebhook`.
const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
    secret: Option<String>,
}

/// Run the webhook server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    preflight::check(Operation::Bot, &settings)?;

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let webhook_path = settings.server.webhook_path.clone();
    let secret = settings.server.webhook_secret.clone().filter(|s| !s.is_empty());
    let public_url = settings.server.public_url.clone();

    let orchestrator = Orchestrator::new(settings)?;
    orchestrator.verify_token().await?;

    if let Some(base) = public_url {
        let url = format!("{}{}", base.trim_end_matches('/'), webhook_path);
        orchestrator
            .adapter()
            .set_webhook(&url, secret.as_deref())
            .await
            .context("Failed to register webhook")?;
        Output::success(&format!("Webhook registered at {}", url));
    } else {
        Output::warning("server.public_url is not set; register the webhook yourself.");
    }

    let state = Arc::new(AppState {
        orchestrator,
        secret,
    });

    let app = router(state.clone(), &webhook_path);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("clipbot webhook server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Updates", &format!("POST {}", webhook_path));
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Output::info("Finishing in-flight requests...");
    match Arc::try_unwrap(state) {
        Ok(state) => state.orchestrator.shutdown().await,
        Err(state) => state.orchestrator.dispatcher().shutdown().await,
    }
    Output::success("Stopped.");

    Ok(())
}

fn router(state: Arc<AppState>, webhook_path: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(webhook_path, post(receive_update))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    sessions: usize,
    workers: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.orchestrator.sessions().len(),
        workers: state.orchestrator.dispatcher().active_workers(),
    })
}

async fn receive_update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    if !secret_matches(state.secret.as_deref(), &headers) {
        warn!("Rejected webhook call with a missing or wrong secret");
        return StatusCode::UNAUTHORIZED;
    }

    debug!("Webhook update {}", update.update_id);
    // Handling happens on the user's worker; Telegram only needs the ack.
    state.orchestrator.handle_update(update);
    StatusCode::OK
}

/// Whether the request carries the expected secret. Anything passes when none is configured.
fn secret_matches(expected: Option<&str>, headers: &HeaderMap) -> bool {
    match expected {
        None => true,
        Some(expected) => headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected),
    }
}
