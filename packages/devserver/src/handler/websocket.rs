//! Dashboard stats stream.
//!
//! Only staff sessions may follow the stream. The access token is read from
//! the session cookie, or from the `token` query parameter for clients that
//! cannot send cookies. Without a valid token the upgrade is accepted and
//! then closed with code 4001.

use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use axum::{
    extract::{
        Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};

use super::http::{STAFF_ACCESS_COOKIE, authenticate, cookie};
use crate::state::{AppState, Realm};

/// Snapshot pushed on every tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub ticket_count: u64,
    pub today_revenue: f64,
    pub active_ferries: u64,
    pub active_branches: u64,
}

const TICKETS_PER_TICK: u64 = 3;
const FARE: f64 = 150.0;
const MIN_PUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Close code sent to streams without a valid access token
pub const UNAUTHORIZED_CLOSE_CODE: u16 = 4001;

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub token: Option<String>,
}

pub async fn dashboard_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let token = cookie(&headers, STAFF_ACCESS_COOKIE).or(query.token.as_deref());
    let authorized = authenticate(&state, Realm::Staff, token).await.is_ok();

    ws.on_upgrade(move |socket| async move {
        if authorized {
            push_stats(socket, state).await;
        } else {
            reject(socket, &state).await;
        }
    })
}

async fn reject(mut socket: WebSocket, state: &AppState) {
    state.streams_rejected.fetch_add(1, Ordering::SeqCst);
    tracing::warn!("Rejected stats stream without a valid access token");

    let frame = CloseFrame {
        code: UNAUTHORIZED_CLOSE_CODE,
        reason: "Unauthorized".into(),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        tracing::debug!("Failed to send close frame: {}", e);
    }
}

/// Push a snapshot every interval until the client leaves or the stream is kicked
async fn push_stats(socket: WebSocket, state: Arc<AppState>) {
    let stream_id = state.streams_accepted.fetch_add(1, Ordering::SeqCst) + 1;
    state.streams_live.fetch_add(1, Ordering::SeqCst);
    tracing::info!("Stats stream #{} opened", stream_id);

    let (mut sender, mut receiver) = socket.split();
    let mut kicked = state.stream_epoch.subscribe();
    let mut ticker = tokio::time::interval(state.config.push_interval.max(MIN_PUSH_INTERVAL));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let json = match serde_json::to_string(&next_snapshot(&state)) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to serialize snapshot: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            _ = kicked.changed() => {
                tracing::info!("Dropping stats stream #{}", stream_id);
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.streams_live.fetch_sub(1, Ordering::SeqCst);
    tracing::info!("Stats stream #{} closed", stream_id);
}

fn next_snapshot(state: &AppState) -> DashboardSnapshot {
    let sold = state
        .tickets_sold
        .fetch_add(TICKETS_PER_TICK, Ordering::SeqCst)
        + TICKETS_PER_TICK;

    DashboardSnapshot {
        ticket_count: sold,
        today_revenue: sold as f64 * FARE,
        active_ferries: 4,
        active_branches: 2,
    }
}
