use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::hub::Hub;
use crate::models::envelope::{
    Action, Answer, ClientEvent, IceCandidate, Offer, ServerEnvelope,
};

/// Time allowed for a single write to complete.
pub const WRITE_WAIT: Duration = Duration::from_secs(15);
/// Time allowed between pongs from the peer before the reader gives up.
pub const PONG_WAIT: Duration = Duration::from_secs(30);
/// Ping cadence. Must be less than `PONG_WAIT`.
pub const PING_PERIOD: Duration = Duration::from_secs(27);
/// Maximum inbound message size, applied at upgrade time.
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024;

/// Drive one client connection to completion: one task owns the read
/// half, one the write half, and whichever exits first tears the other
/// down. The hub is told afterwards; `disconnect` is idempotent, so a
/// clean `dis_connected` that already unregistered the client is fine.
pub async fn handle_socket(
    socket: WebSocket,
    hub: Arc<Hub>,
    id: Arc<str>,
    outbound: mpsc::Receiver<String>,
) {
    let (ws_sender, ws_receiver) = socket.split();

    let mut send_task = tokio::spawn(write_pump(ws_sender, outbound));
    let mut recv_task = tokio::spawn(read_pump(ws_receiver, Arc::clone(&hub), id.clone()));

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.disconnect(&id).await;
    debug!(client = %id, "connection closed");
}

/// Write side: drain the outbound queue and keep the peer alive with
/// pings. Exits when the hub closes the queue or a write fails.
async fn write_pump(
    mut sender: SplitSink<WebSocket, WsMessage>,
    mut outbound: mpsc::Receiver<String>,
) {
    let start = tokio::time::Instant::now() + PING_PERIOD;
    let mut ping = tokio::time::interval_at(start, PING_PERIOD);
    loop {
        tokio::select! {
            queued = outbound.recv() => {
                let Some(text) = queued else {
                    // The hub closed the queue.
                    break;
                };
                match timeout(WRITE_WAIT, sender.send(WsMessage::Text(text))).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
            _ = ping.tick() => {
                match timeout(WRITE_WAIT, sender.send(WsMessage::Ping(Vec::new()))).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
        }
    }
    let _ = sender.close().await;
}

/// Read side: one envelope per text frame, dispatched by action. The read
/// deadline starts at `PONG_WAIT` and is extended only by the peer's
/// pongs; other traffic does not keep a silent peer alive. A missed
/// deadline or any transport error ends the task (and with it the
/// connection).
async fn read_pump(mut receiver: SplitStream<WebSocket>, hub: Arc<Hub>, id: Arc<str>) {
    let mut deadline = tokio::time::Instant::now() + PONG_WAIT;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let frame = match timeout(remaining, receiver.next()).await {
            Err(_) => {
                debug!(client = %id, "read deadline elapsed");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                debug!(client = %id, error = %err, "socket error");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            WsMessage::Text(text) => {
                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(client = %id, error = %err, "skipping unparseable envelope");
                        continue;
                    }
                };
                if !dispatch(&hub, &id, event).await {
                    break;
                }
            }
            WsMessage::Pong(_) => {
                deadline = tokio::time::Instant::now() + PONG_WAIT;
                hub.touch(&id).await;
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }
}

/// Handle one decoded envelope. Returns false when the connection should
/// close (clean client exit).
async fn dispatch(hub: &Hub, id: &Arc<str>, event: ClientEvent) -> bool {
    match event {
        ClientEvent::Ping => {
            hub.touch(id).await;
            hub.send_to(id, &ServerEnvelope::success(Action::Pong, Value::Null))
                .await;
        }
        ClientEvent::StartChatReq => {
            hub.mark_waiting(id).await;
            info!(client = %id, "waiting for a match");
            hub.send_to(
                id,
                &ServerEnvelope::success(Action::StartChatAck, "waiting for a match"),
            )
            .await;
        }
        ClientEvent::OfferRes(offer) => {
            let target = offer.peer_id;
            let relayed = ServerEnvelope::success(
                Action::AnswerReq,
                Offer {
                    peer_id: id.to_string(),
                    sdp: offer.sdp,
                    sdp_type: offer.sdp_type,
                },
            );
            hub.send_to(&target, &relayed).await;
        }
        ClientEvent::AnswerRes(answer) => {
            let target = answer.peer_id;
            let relayed = ServerEnvelope::success(
                Action::AnswerRec,
                Answer {
                    peer_id: id.to_string(),
                    answer: answer.answer,
                    sdp_type: answer.sdp_type,
                },
            );
            hub.send_to(&target, &relayed).await;
        }
        ClientEvent::IceCandidateRes(candidate) => {
            let target = candidate.peer_id;
            let relayed = ServerEnvelope::success(
                Action::IceCandidateRec,
                IceCandidate {
                    peer_id: id.to_string(),
                    candidate: candidate.candidate,
                    sdp_mid: candidate.sdp_mid,
                    sdp_mline_index: candidate.sdp_mline_index,
                },
            );
            hub.send_to(&target, &relayed).await;
        }
        ClientEvent::HangUpRes(peer) | ClientEvent::ForceHangUpRes(peer) => {
            let named = peer.and_then(|p| p.peer_id);
            hub.hang_up(id, named.as_deref()).await;
        }
        ClientEvent::DisConnected(peer) => match peer.and_then(|p| p.peer_id) {
            Some(named) => hub.hang_up(id, Some(&named)).await,
            None => {
                info!(client = %id, "client disconnected cleanly");
                hub.unregister(id).await;
                return false;
            }
        },
    }
    true
}
