//! `GET /ingest/stream` (§6.3): upgrades to a WebSocket and hands the
//! connection to [`ingest_transport::handle_connection`].

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::state::AppState;

async fn ingest_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        // Device-auth gating (§6.6 `FEATURE_DEVICE_AUTH_ENABLED`): when off,
        // every `api_key` is accepted.
        let device_auth_enabled = state.features.device_auth_enabled;
        let result = ingest_transport::handle_connection(socket, &state.router, move |_source_id, api_key| {
            !device_auth_enabled || !api_key.is_empty()
        })
        .await;
        if let Err(err) = result {
            tracing::debug!(error = %err, "websocket session ended");
        }
    })
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/ingest/stream", get(ingest_stream)).with_state(state)
}
