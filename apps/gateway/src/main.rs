//! Ingestion gateway binary: wires `axum` HTTP routes, a `rumqttc`-driven
//! MQTT worker pool, a WebSocket handler, and CSV upload job tracking onto
//! the shared [`ingest_pipelines::IngestRouter`], following the teacher's
//! `rust/src/bin/agentic_server.rs` + `rust/crates/entity-gateway` shape.

mod errors;
mod routes;
mod state;

use std::net::SocketAddr;

use rumqttc::MqttOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ingest_config::GatewayConfig;
use ingest_transport::MqttTransport;

use crate::state::AppState;

/// Exit codes for CLI/batch mode (§6.1): 0 success, 1 transient failure, 2
/// configuration error.
mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const TRANSIENT_FAILURE: i32 = 1;
    pub const CONFIGURATION_ERROR: i32 = 2;
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ingest_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            std::process::exit(exit_code::CONFIGURATION_ERROR);
        }
    };

    tracing::info!(
        mqtt_enabled = config.features.mqtt_ingest_enabled,
        websocket_enabled = config.features.websocket_enabled,
        csv_enabled = config.features.csv_enabled,
        "starting ingestion gateway"
    );

    let state = AppState::build(&config);

    if config.features.mqtt_ingest_enabled {
        spawn_mqtt_worker(&config, state.router.clone());
    }

    spawn_stale_sweeper(config.tuning.stale_timeout_seconds, state.router.clone());
    spawn_dlq_replayer(state.router.clone());

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = routes::build(state).layer(TraceLayer::new_for_http()).layer(cors);

    let port: u16 = std::env::var("GATEWAY_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "failed to bind listener");
            std::process::exit(exit_code::TRANSIENT_FAILURE);
        }
    };

    tracing::info!(%addr, "ingestion gateway listening");
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(exit_code::TRANSIENT_FAILURE);
    }
}

/// Periodic stale-timeout sweep (C8, §4.C8 default cadence 60s): marks every
/// series that hasn't reported in `stale_timeout` seconds as STALE.
fn spawn_stale_sweeper(stale_timeout: f64, router: std::sync::Arc<state::GatewayRouter>) {
    const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
            let transitioned = router.sweep_stale(stale_timeout, now).await;
            if !transitioned.is_empty() {
                tracing::info!(count = transitioned.len(), "stale sweep marked series stale");
            }
        }
    });
}

/// Periodic DLQ replay (§4.C4 "a separate reader ... may replay entries
/// through the router at a configurable cadence"): entries that carry a
/// reconstructable `DataPoint` (guard/persist failures) are resubmitted
/// through `router.ingest` with their original `msg_id`, so dedup still
/// drops any that are also held elsewhere in-flight (§4.C4). Entries whose
/// raw bytes are a transport payload rather than a serialized `DataPoint`
/// (parse failures) cannot be reconstructed and are logged and dropped.
fn spawn_dlq_replayer(router: std::sync::Arc<state::GatewayRouter>) {
    const REPLAY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REPLAY_INTERVAL);
        loop {
            ticker.tick().await;
            let replayer = ingest_resilience::DlqReplayer::new(router.dlq(), REPLAY_INTERVAL);
            let router = &router;
            replayer
                .replay_once(|entry| async move {
                    if !matches!(
                        entry.category,
                        ingest_resilience::DlqCategory::Guards | ingest_resilience::DlqCategory::Persist
                    ) {
                        tracing::debug!(category = entry.category.as_str(), "dropping unreplayable dlq entry");
                        return Ok(());
                    }
                    let Ok(point) = serde_json::from_slice::<ingest_core::DataPoint>(&entry.raw) else {
                        tracing::warn!("dlq entry marked replayable but failed to deserialize, dropping");
                        return Ok(());
                    };
                    let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
                    match router.ingest(point, "dlq-replay", now).await {
                        Ok(_) => Ok(()),
                        Err(_) => Err(entry),
                    }
                })
                .await;
        }
    });
}

/// Starts the MQTT client, subscribes to both topic families, and spawns the
/// worker pool that drains parsed messages into the router (§6.2, §9: the
/// network-loop task never does synchronous I/O itself).
fn spawn_mqtt_worker(config: &GatewayConfig, router: std::sync::Arc<state::GatewayRouter>) {
    let mut options = MqttOptions::new("ingest-gateway", config.mqtt.host.clone(), config.mqtt.port);
    if let (Some(username), Some(password)) = (&config.mqtt.username, &config.mqtt.password) {
        options.set_credentials(username.clone(), password.clone());
    }

    let (transport, event_loop) = MqttTransport::new(
        options,
        ingest_transport::DEFAULT_QUEUE_CAPACITY,
        ingest_transport::DEFAULT_WORKER_COUNT,
    );

    tokio::spawn(async move {
        if let Err(err) = transport.subscribe_defaults().await {
            tracing::error!(error = %err, "failed to subscribe to mqtt topics");
            return;
        }
        transport.run(event_loop, router).await;
    });
}
