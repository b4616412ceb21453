//! WebSocket adapter (§6.3): `connect`/`connected`/`data`/`ack` frame
//! protocol over axum's native WebSocket upgrade, with backpressure closing
//! the connection at more than 100 in-flight points.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use uuid::Uuid;

use ingest_core::Domain;
use ingest_pipelines::{IngestOutcome, IngestRouter};
use ingest_resilience::{IdempotencyStore, PredictionPublisher};
use ingest_storage::{ConfigLoader, GenericStore, LegacyStore, StateStore};

use crate::errors::TransportError;
use crate::wire::{generic_data_to_points, GenericDataRequest, WsClientFrame, WsRejection, WsServerFrame};

/// Backpressure close code and threshold (§6.3).
pub const BACKPRESSURE_CLOSE_CODE: u16 = 1013;
pub const POLICY_VIOLATION_CLOSE_CODE: u16 = 1008;
pub const MAX_IN_FLIGHT: u64 = 100;

/// A `source_id`/`domain` validated at `connect` time; the caller supplies
/// `authenticate` so API-key checking stays outside this crate.
pub struct WsSession {
    pub session_id: String,
    pub source_id: String,
    pub domain: Domain,
    in_flight: AtomicU64,
}

impl WsSession {
    fn acquire(&self) -> bool {
        let prev = self.in_flight.fetch_add(1, Ordering::SeqCst);
        if prev >= MAX_IN_FLIGHT {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            false
        } else {
            true
        }
    }

    fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn close_with(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

/// Drives one WebSocket connection end to end: awaits `connect`, then
/// alternates receiving `data` frames and replying with `ack` frames, until
/// the client disconnects or backpressure forces a close.
#[allow(clippy::too_many_arguments)]
pub async fn handle_connection<C, St, L, G, D, P, A, W, Lv, N>(
    mut socket: WebSocket,
    router: &IngestRouter<C, St, L, G, D, P, A, W, Lv, N>,
    authenticate: impl Fn(&str, &str) -> bool,
) -> Result<(), TransportError>
where
    C: ConfigLoader,
    St: StateStore,
    L: LegacyStore,
    G: GenericStore,
    D: IdempotencyStore,
    P: PredictionPublisher,
    A: ingest_pipelines::AlertStore,
    W: ingest_pipelines::WarningStore,
    Lv: ingest_pipelines::LatestValueStore,
    N: ingest_pipelines::NotificationSink,
{
    let connect_frame = match socket.recv().await {
        Some(Ok(Message::Text(text))) => {
            serde_json::from_str::<WsClientFrame>(&text).map_err(|e| TransportError::Parse(e.to_string()))?
        }
        _ => {
            close_with(&mut socket, POLICY_VIOLATION_CLOSE_CODE, "expected connect frame").await;
            return Err(TransportError::Parse("expected connect frame".to_string()));
        }
    };

    let WsClientFrame::Connect {
        source_id,
        domain,
        api_key,
    } = connect_frame
    else {
        close_with(&mut socket, POLICY_VIOLATION_CLOSE_CODE, "expected connect frame").await;
        return Err(TransportError::Parse("expected connect frame".to_string()));
    };

    if !authenticate(&source_id, &api_key) {
        close_with(&mut socket, POLICY_VIOLATION_CLOSE_CODE, "authentication failed").await;
        return Err(TransportError::Parse("websocket authentication failed".to_string()));
    }

    let domain = match domain.as_str() {
        "infrastructure" => Domain::Infrastructure,
        "finance" => Domain::Finance,
        "health" => Domain::Health,
        "generic" => Domain::Generic,
        "iot" => Domain::Iot,
        other => {
            close_with(&mut socket, POLICY_VIOLATION_CLOSE_CODE, "unknown domain").await;
            return Err(TransportError::Parse(format!("unknown domain: {other}")));
        }
    };

    let session = WsSession {
        session_id: Uuid::new_v4().to_string(),
        source_id: source_id.clone(),
        domain,
        in_flight: AtomicU64::new(0),
    };

    let connected = WsServerFrame::Connected {
        session_id: session.session_id.clone(),
    };
    socket
        .send(Message::Text(serde_json::to_string(&connected).unwrap()))
        .await
        .map_err(|e| TransportError::Unavailable(e.to_string()))?;

    while let Some(frame) = socket.recv().await {
        let Ok(Message::Text(text)) = frame else { break };
        let Ok(WsClientFrame::Data { batch }) = serde_json::from_str::<WsClientFrame>(&text) else {
            break;
        };

        if !session.acquire() {
            close_with(&mut socket, BACKPRESSURE_CLOSE_CODE, "too many in-flight points").await;
            return Ok(());
        }

        let request = GenericDataRequest {
            source_id: session.source_id.clone(),
            domain: session.domain.as_str().to_string(),
            data_points: batch,
        };

        let mut rejected = Vec::new();
        let mut sequence_up_to = 0u64;
        match generic_data_to_points(&request, now_unix()) {
            Ok(points) => {
                for (index, point) in points.into_iter().enumerate() {
                    let seq = point.sequence.unwrap_or(index as u64);
                    match router.ingest(point, "websocket", now_unix()).await {
                        Ok(IngestOutcome::Stored { .. }) | Ok(IngestOutcome::Duplicate) => {
                            sequence_up_to = sequence_up_to.max(seq);
                        }
                        Err(err) => rejected.push(WsRejection {
                            index,
                            reason: err.message,
                        }),
                    }
                }
            }
            Err(err) => rejected.push(WsRejection {
                index: 0,
                reason: err.to_string(),
            }),
        }

        session.release();

        let ack = WsServerFrame::Ack {
            sequence_up_to,
            rejected,
        };
        if socket.send(Message::Text(serde_json::to_string(&ack).unwrap())).await.is_err() {
            break;
        }
    }

    Ok(())
}

fn now_unix() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
