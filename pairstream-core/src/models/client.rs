use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::mpsc;

/// Capacity of each client's outbound queue. A client that lets this fill
/// up is treated as dead (slow-peer policy).
pub const OUTBOUND_CAPACITY: usize = 256;

/// Matchmaking pool a client belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    #[default]
    Chat,
    AudioChat,
    VideoChat,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] =
        [ChannelKind::Chat, ChannelKind::AudioChat, ChannelKind::VideoChat];
}

/// Query parameters of the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "uId")]
    pub u_id: String,
    #[serde(default)]
    pub kind: ChannelKind,
}

/// Registry entry for a live client. The hub owns the entry; the stored
/// `outbound` sender is the only held handle to the client's queue, so
/// removing the entry is what closes the queue.
pub struct ClientHandle {
    pub id: Arc<str>,
    pub addr: SocketAddr,
    pub entered_at: DateTime<Utc>,
    pub last_seen: Instant,
    pub is_waiting: bool,
    pub kind: ChannelKind,
    /// Peer this client is currently paired with, if any. Written by the
    /// matchmaker, cleared when either side hangs up or is requeued.
    pub peer: Option<Arc<str>>,
    pub outbound: mpsc::Sender<String>,
}

impl ClientHandle {
    /// Build a handle and the receiving half of its outbound queue, which
    /// the client's write task consumes.
    pub fn new(id: &str, addr: SocketAddr, kind: ChannelKind) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let handle = ClientHandle {
            id: Arc::from(id),
            addr,
            entered_at: Utc::now(),
            last_seen: Instant::now(),
            is_waiting: false,
            kind,
            peer: None,
            outbound: tx,
        };
        (handle, rx)
    }
}
