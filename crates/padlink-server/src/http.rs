//! HTTP surface: WebSocket upgrade endpoint plus health and stats probes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::Value;

use crate::SharedState;

/// Build the server's route table.
///
/// `/` serves the same payload as `/health` so bare load-balancer checks
/// work without configuration.
pub(crate) fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/ws/multiplayer", get(ws_handler))
        .route("/", get(health).options(preflight))
        .route("/health", get(health).options(preflight))
        .route("/stats", get(stats).options(preflight))
        .with_state(state)
}

async fn ws_handler(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if !origin_allowed(&state.allowed_origins, &headers) {
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }
    ws.on_upgrade(move |socket| crate::ws::handle_socket(state, socket))
}

async fn health(State(state): State<Arc<SharedState>>, headers: HeaderMap) -> Response {
    if !origin_allowed(&state.allowed_origins, &headers) {
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    let (rooms, players) = {
        let driver = state.driver.lock().await;
        (driver.room_count(), driver.connection_count())
    };

    let body = serde_json::json!({
        "status": "ok",
        "service": "padlink",
        "rooms": rooms,
        "players": players,
        "uptimeSecs": state.started_at.elapsed().as_secs(),
    });
    json_response(allow_origin_value(&state.allowed_origins, &headers), body)
}

async fn stats(State(state): State<Arc<SharedState>>, headers: HeaderMap) -> Response {
    if !origin_allowed(&state.allowed_origins, &headers) {
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    let rooms: Vec<Value> = {
        let driver = state.driver.lock().await;
        driver
            .rooms()
            .map(|room| {
                serde_json::json!({
                    "code": room.code,
                    "players": room.players.len(),
                    "state": room.state,
                    "createdAt": room.created_at,
                })
            })
            .collect()
    };

    json_response(
        allow_origin_value(&state.allowed_origins, &headers),
        serde_json::json!({ "rooms": rooms }),
    )
}

/// CORS preflight reply: 204 with the same header set the JSON responses
/// carry.
async fn preflight(State(state): State<Arc<SharedState>>, headers: HeaderMap) -> Response {
    if !origin_allowed(&state.allowed_origins, &headers) {
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }
    with_cors(
        StatusCode::NO_CONTENT.into_response(),
        allow_origin_value(&state.allowed_origins, &headers),
    )
}

fn json_response(allow_origin: Option<HeaderValue>, body: Value) -> Response {
    with_cors(Json(body).into_response(), allow_origin)
}

fn with_cors(mut response: Response, allow_origin: Option<HeaderValue>) -> Response {
    if let Some(value) = allow_origin {
        response.headers_mut().insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, OPTIONS"));
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
    response
}

/// A request passes the origin filter when `"*"` is configured, when it
/// carries no Origin header (non-browser client), or when its origin is
/// explicitly listed.
fn origin_allowed(allowed: &[String], headers: &HeaderMap) -> bool {
    if allowed.iter().any(|o| o == "*") {
        return true;
    }
    match headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
        Some(origin) => allowed.iter().any(|o| o == origin),
        None => true,
    }
}

fn allow_origin_value(allowed: &[String], headers: &HeaderMap) -> Option<HeaderValue> {
    if allowed.iter().any(|o| o == "*") {
        return Some(HeaderValue::from_static("*"));
    }
    headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .filter(|origin| allowed.iter().any(|o| o == *origin))
        .and_then(|origin| HeaderValue::from_str(origin).ok())
}
