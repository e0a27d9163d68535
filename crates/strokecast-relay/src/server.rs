//! HTTP and WebSocket front end
//!
//! - `GET /ws?session=<name>`: upgrade to a WebSocket carrying JSON
//!   [`ClientMessage`]s in and [`ServerMessage`]s out
//! - `GET /health`: relay counters as JSON
//!
//! Browser origins are checked against the configured allow-list both by
//! the CORS layer and on the WebSocket upgrade itself.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

use strokecast_core::{ClientMessage, ServerMessage};

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::hub::{DEFAULT_SESSION, ParticipantId, Relay};

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub config: Arc<RelayConfig>,
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    session: Option<String>,
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub sessions: usize,
    pub participants: usize,
    pub strokes: usize,
}

/// Build the relay's router
pub fn router(relay: Arc<Relay>, config: Arc<RelayConfig>) -> Router {
    let cors = cors_layer(&config);
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(cors)
        .with_state(AppState { relay, config })
}

fn cors_layer(config: &RelayConfig) -> CorsLayer {
    if config.allow_any_origin {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring unparseable allowed origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.relay.stats();
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: stats.sessions,
        participants: stats.participants,
        strokes: stats.strokes,
    })
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    if let Err(status) = check_origin(&state.config, &headers) {
        return status.into_response();
    }

    let session = params
        .session
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());
    let relay = state.relay.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, relay, session))
}

/// Requests without an Origin header come from non-browser clients
fn check_origin(config: &RelayConfig, headers: &HeaderMap) -> Result<(), StatusCode> {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return Ok(());
    };
    let allowed = origin
        .to_str()
        .map(|o| config.origin_allowed(o))
        .unwrap_or(false);
    if allowed {
        Ok(())
    } else {
        warn!(origin = ?origin, "WebSocket upgrade from disallowed origin");
        Err(StatusCode::FORBIDDEN)
    }
}

async fn handle_socket(mut socket: WebSocket, relay: Arc<Relay>, session: String) {
    let (participant, mut outbound) = relay.join(&session);

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let Some(reply) = handle_text(&relay, &session, participant, text.as_str()) else {
                        continue;
                    };
                    if let Err(e) = send_message(&mut socket, &reply).await {
                        debug!(participant, error = %e, "Failed to send reply");
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(participant, error = %e, "WebSocket receive failed");
                    break;
                }
            },
            forwarded = outbound.recv() => match forwarded {
                Some(message) => {
                    if let Err(e) = send_message(&mut socket, &message).await {
                        debug!(participant, error = %e, "Failed to forward package");
                        break;
                    }
                }
                None => break,
            },
        }
    }

    relay.leave(&session, participant);
    info!(session = %session, participant, "WebSocket closed");
}

/// Decode and answer one text frame; `None` when there is nothing to reply
fn handle_text(
    relay: &Relay,
    session: &str,
    participant: ParticipantId,
    text: &str,
) -> Option<ServerMessage> {
    let message = match ClientMessage::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(participant, error = %e, "Ignoring undecodable message");
            return None;
        }
    };

    match relay.handle_client_message(session, participant, message) {
        Ok(reply) => Some(reply),
        Err(e) => {
            warn!(participant, error = %e, "Message not relayed");
            None
        }
    }
}

async fn send_message(socket: &mut WebSocket, message: &ServerMessage) -> RelayResult<()> {
    let json = message.to_json()?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| RelayError::Socket(e.to_string()))
}
