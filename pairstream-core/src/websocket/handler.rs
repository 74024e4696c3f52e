use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::response::Response;
use tracing::{info, warn};

use crate::api::types::{bad_request, ApiError};
use crate::hub::Hub;
use crate::models::client::{ClientHandle, WsQuery};
use crate::state::AppState;
use crate::websocket::connection::{self, MAX_MESSAGE_SIZE};

/// `GET /ws?uId=<id>&kind=<pool>` — WebSocket upgrade.
///
/// A missing or empty `uId` and a duplicate id are both rejected with
/// HTTP 400 before the upgrade happens.
pub async fn ws_handler(
    query: Result<Query<WsQuery>, axum::extract::rejection::QueryRejection>,
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let query = match query {
        Ok(query) => query.0,
        Err(_) => return Err(bad_request("uId is required")),
    };
    if query.u_id.is_empty() {
        return Err(bad_request("uId is required"));
    }
    if state.hub.is_registered(&query.u_id).await {
        warn!(client = %query.u_id, "rejecting duplicate id before upgrade");
        return Err(bad_request("user already connected"));
    }

    info!(client = %query.u_id, %addr, kind = ?query.kind, "upgrading connection");
    let hub = Arc::clone(&state.hub);
    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| accept_client(socket, hub, query, addr)))
}

async fn accept_client(mut socket: WebSocket, hub: Arc<Hub>, query: WsQuery, addr: SocketAddr) {
    let (handle, outbound) = ClientHandle::new(&query.u_id, addr, query.kind);
    let id = handle.id.clone();

    // The pre-upgrade check can lose a race with a same-id upgrade; the
    // registry stays authoritative.
    if hub.register(handle).await.is_err() {
        warn!(client = %id, "duplicate id won the upgrade race, closing socket");
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    connection::handle_socket(socket, hub, id, outbound).await;
}
