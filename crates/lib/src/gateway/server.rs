//! Gateway HTTP server: Slack Events API webhook and health probe (single port).

use crate::agent::{AgentClient, AgentRunner};
use crate::config::{self, Config};
use crate::orchestrator::spawn_turn;
use crate::slack::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::slack::{classify, Classification, EventEnvelope, SlackApi, SlackClient};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use futures_util::FutureExt;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const ACK_BODY: &str = "Success!";
const INVALID_REQUEST_BODY: &str = "Invalid request";
const BOT_ID_ERROR_BODY: &str = "Error getting bot ID";
const INTERNAL_ERROR_BODY: &str = "Error generating response";

/// Shared state for webhook handlers.
#[derive(Clone)]
pub struct GatewayState {
    port: u16,
    signing_secret: Option<String>,
    slack: Arc<dyn SlackApi>,
    agent: Arc<dyn AgentRunner>,
    /// In-flight turns, awaited on shutdown.
    turn_tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl GatewayState {
    pub fn new(
        port: u16,
        signing_secret: Option<String>,
        slack: Arc<dyn SlackApi>,
        agent: Arc<dyn AgentRunner>,
    ) -> Self {
        Self {
            port,
            signing_secret,
            slack,
            agent,
            turn_tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn track_turn(&self, handle: JoinHandle<()>) {
        let mut tasks = self.turn_tasks.lock().await;
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// Wait for every in-flight turn to finish.
    pub async fn drain_turns(&self) {
        let handles = {
            let mut g = self.turn_tasks.lock().await;
            std::mem::take(&mut *g)
        };
        if !handles.is_empty() {
            log::info!("waiting for {} in-flight turn(s)", handles.len());
        }
        for h in handles {
            let _ = h.await;
        }
    }
}

/// Work handed from the acknowledgment path to a background turn.
#[derive(Debug)]
pub struct PendingTurn {
    pub bot_user_id: String,
    pub work: Classification,
}

/// Result of the fast path: what to answer, and what (if anything) to hand to a turn.
#[derive(Debug)]
pub struct Acknowledgment {
    pub status: StatusCode,
    pub body: String,
    pub turn: Option<PendingTurn>,
}

impl Acknowledgment {
    fn reply(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            turn: None,
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Parse, verify and classify one webhook delivery. Never runs the agent.
///
/// `url_verification` is answered before signature verification.
pub async fn acknowledge(state: &GatewayState, headers: &HeaderMap, body: &[u8]) -> Acknowledgment {
    let envelope: EventEnvelope = match serde_json::from_slice(body) {
        Ok(e) => e,
        Err(e) => {
            log::debug!("webhook: unparseable body: {}", e);
            return Acknowledgment::reply(StatusCode::BAD_REQUEST, INVALID_REQUEST_BODY);
        }
    };
    if let EventEnvelope::UrlVerification { challenge } = &envelope {
        log::info!("webhook: answering url_verification");
        return Acknowledgment::reply(StatusCode::OK, challenge);
    }

    let verified = match state.signing_secret.as_deref() {
        Some(secret) => signature::verify_request(
            secret,
            header(headers, TIMESTAMP_HEADER),
            header(headers, SIGNATURE_HEADER),
            body,
        ),
        None => {
            log::warn!("webhook: signing secret not configured, rejecting request");
            false
        }
    };
    if !verified {
        log::warn!("webhook: signature verification failed");
        return Acknowledgment::reply(StatusCode::UNAUTHORIZED, "");
    }

    let EventEnvelope::EventCallback { event_id, .. } = &envelope else {
        log::debug!("webhook: unsupported envelope acknowledged");
        return Acknowledgment::reply(StatusCode::OK, ACK_BODY);
    };
    let event_id = event_id.as_deref().unwrap_or("-");

    let bot_user_id = match state.slack.auth_test().await {
        Ok(id) => id,
        Err(e) => {
            log::error!("webhook: auth.test failed: {}", e);
            return Acknowledgment::reply(StatusCode::INTERNAL_SERVER_ERROR, BOT_ID_ERROR_BODY);
        }
    };

    let classification = classify(&envelope, &bot_user_id);
    let turn = if classification.needs_turn() {
        log::info!("webhook: event {} accepted", event_id);
        Some(PendingTurn {
            bot_user_id,
            work: classification,
        })
    } else {
        log::debug!("webhook: event {} ignored: {:?}", event_id, classification);
        None
    };
    Acknowledgment {
        status: StatusCode::OK,
        body: ACK_BODY.to_string(),
        turn,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// POST {eventsPath}: acknowledge, then run any work in a detached turn.
/// A fault while acknowledging is answered with 500 instead of a dropped connection.
async fn events_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let ack = match AssertUnwindSafe(acknowledge(&state, &headers, &body))
        .catch_unwind()
        .await
    {
        Ok(ack) => ack,
        Err(panic) => {
            log::error!("webhook: request handling panicked: {}", panic_message(&*panic));
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_BODY.to_string(),
            );
        }
    };
    if let Some(turn) = ack.turn {
        let handle = spawn_turn(
            state.slack.clone(),
            state.agent.clone(),
            turn.bot_user_id,
            turn.work,
        );
        state.track_turn(handle).await;
    }
    (ack.status, ack.body)
}

/// GET / returns runtime status.
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
    }))
}

/// Routes: `GET /` health and `POST {events_path}` webhook.
pub fn router(state: GatewayState, events_path: &str) -> Router {
    let path = if events_path.starts_with('/') {
        events_path.to_string()
    } else {
        format!("/{}", events_path)
    };
    Router::new()
        .route("/", get(health_http))
        .route(&path, post(events_webhook))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (Ctrl+C or SIGTERM), then waits for in-flight turns.
pub async fn run_gateway(config: Config) -> Result<()> {
    for name in config::missing_values(&config) {
        log::warn!("configuration value not set: {}", name);
    }

    let slack = SlackClient::new(
        config::resolve_bot_token(&config),
        Some(config::resolve_slack_api_base(&config)),
    );
    let agent = AgentClient::new(config::resolve_agent_settings(&config));
    let state = GatewayState::new(
        config.gateway.port,
        config::resolve_signing_secret(&config),
        Arc::new(slack),
        Arc::new(agent),
    );
    let app = router(state.clone(), &config.gateway.events_path);

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!(
        "gateway listening on {} (events at {})",
        bind_addr,
        config.gateway.events_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    state.drain_turns().await;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, no longer accepting webhooks");
}
