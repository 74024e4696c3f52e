use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::client::{ChannelKind, ClientHandle};
use crate::models::envelope::{Action, PeerRef, ServerEnvelope};

/// Tunable hub timings. Production uses the defaults; tests shrink them.
#[derive(Debug, Clone)]
pub struct HubSettings {
    /// A client with no pong and no `ping` envelope for this long is evicted.
    pub idle_timeout: Duration,
    /// Cadence of the idle sweep.
    pub sweep_interval: Duration,
    /// Cadence of each matchmaking pool.
    pub match_interval: Duration,
}

impl Default for HubSettings {
    fn default() -> Self {
        HubSettings {
            idle_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5),
            match_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RegisterError {
    DuplicateId,
}

/// Authoritative set of live clients.
///
/// A single hub-wide mutex protects the map and every `is_waiting` read.
/// Enqueues are non-blocking (`try_send`), so no lock is ever held across
/// socket I/O. A client is in the map iff its outbound queue is open:
/// the map's `Sender` is the only held handle to the queue, so removing
/// the entry inside a critical section is the one and only close.
pub struct Hub {
    clients: Mutex<HashMap<Arc<str>, ClientHandle>>,
    settings: HubSettings,
}

impl Hub {
    pub fn new(settings: HubSettings) -> Self {
        Hub {
            clients: Mutex::new(HashMap::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    pub async fn is_registered(&self, id: &str) -> bool {
        self.clients.lock().await.contains_key(id)
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_waiting(&self, id: &str) -> bool {
        self.clients
            .lock()
            .await
            .get(id)
            .map(|c| c.is_waiting)
            .unwrap_or(false)
    }

    /// Insert a new client. The welcome envelope is enqueued before the
    /// `active_users` broadcast so the client observes them in that order.
    pub async fn register(&self, handle: ClientHandle) -> Result<(), RegisterError> {
        let mut clients = self.clients.lock().await;
        if clients.contains_key(handle.id.as_ref()) {
            return Err(RegisterError::DuplicateId);
        }
        let welcome = ServerEnvelope::success(Action::Connected, true).encode();
        // Fresh queue, cannot be full.
        let _ = handle.outbound.try_send(welcome);
        info!(client = %handle.id, addr = %handle.addr, total = clients.len() + 1, "client registered");
        clients.insert(handle.id.clone(), handle);
        Self::broadcast_count(&mut clients);
        Ok(())
    }

    /// Remove a client. Idempotent; returns whether anything was removed.
    pub async fn unregister(&self, id: &str) -> bool {
        let mut clients = self.clients.lock().await;
        if clients.remove(id).is_none() {
            return false;
        }
        info!(client = id, remaining = clients.len(), "client unregistered");
        Self::broadcast_count(&mut clients);
        true
    }

    /// Transport-death path: unregister and, if the client was paired,
    /// hang up and requeue its peer so it is not orphaned.
    pub async fn disconnect(&self, id: &str) {
        let mut clients = self.clients.lock().await;
        let Some(gone) = clients.remove(id) else {
            return;
        };
        info!(client = id, remaining = clients.len(), "client disconnected");
        Self::requeue_peer_of(&mut clients, id, gone.peer.as_deref());
        Self::broadcast_count(&mut clients);
    }

    /// Enqueue an envelope to one client. Missing target is logged and
    /// dropped; a full queue evicts the slow peer.
    pub async fn send_to(&self, id: &str, envelope: &ServerEnvelope) -> bool {
        let mut clients = self.clients.lock().await;
        Self::deliver(&mut clients, id, envelope.encode())
    }

    /// Refresh `last_seen` (pong or application `ping`).
    pub async fn touch(&self, id: &str) {
        if let Some(client) = self.clients.lock().await.get_mut(id) {
            client.last_seen = Instant::now();
        }
    }

    /// Put a client into its matchmaking pool.
    pub async fn mark_waiting(&self, id: &str) {
        if let Some(client) = self.clients.lock().await.get_mut(id) {
            client.is_waiting = true;
            client.peer = None;
        }
    }

    /// Hang-up semantics: deliver `hang_up_rec` to the named peer (if
    /// live) and put both sides back into the matchmaking pool.
    pub async fn hang_up(&self, sender: &str, named_peer: Option<&str>) {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get_mut(sender) {
            client.is_waiting = true;
            client.peer = None;
        }
        let Some(peer_id) = named_peer else {
            return;
        };
        match clients.get_mut(peer_id) {
            Some(peer) => {
                peer.is_waiting = true;
                peer.peer = None;
            }
            None => {
                debug!(sender, peer = peer_id, "hang-up peer not registered, dropping");
                return;
            }
        }
        let bye = ServerEnvelope::success(Action::HangUpRec, PeerRef::to_peer(sender)).encode();
        Self::deliver(&mut clients, peer_id, bye);
    }

    /// Snapshot of waiting clients in one pool, taken under the mutex.
    pub async fn waiting_clients(&self, kind: ChannelKind) -> Vec<Arc<str>> {
        self.clients
            .lock()
            .await
            .values()
            .filter(|c| c.is_waiting && c.kind == kind)
            .map(|c| c.id.clone())
            .collect()
    }

    /// Check-then-act pairing: verify both sides are still present and
    /// waiting in `kind`, flip both to not-waiting, link them, and seed
    /// the handshake by sending `offer_req` (naming the callee) to the
    /// caller. Returns false when the snapshot went stale.
    pub async fn try_pair(&self, caller: &Arc<str>, callee: &Arc<str>, kind: ChannelKind) -> bool {
        let mut clients = self.clients.lock().await;
        let still_waiting = |c: Option<&ClientHandle>| {
            c.map(|c| c.is_waiting && c.kind == kind).unwrap_or(false)
        };
        if !still_waiting(clients.get(caller.as_ref()))
            || !still_waiting(clients.get(callee.as_ref()))
        {
            return false;
        }
        if let Some(c) = clients.get_mut(caller.as_ref()) {
            c.is_waiting = false;
            c.peer = Some(callee.clone());
        }
        if let Some(c) = clients.get_mut(callee.as_ref()) {
            c.is_waiting = false;
            c.peer = Some(caller.clone());
        }
        info!(caller = %caller, callee = %callee, ?kind, "paired waiting clients");
        let seed = ServerEnvelope::success(Action::OfferReq, callee.as_ref()).encode();
        Self::deliver(&mut clients, caller.as_ref(), seed);
        true
    }

    /// Periodic idle sweep: evict clients silent past the idle timeout.
    /// The terminal `connected:false` is enqueued right before the entry
    /// (and with it the queue) is dropped, so it is the last envelope the
    /// write task drains.
    pub fn spawn_cleaner(self: &Arc<Self>) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(hub.settings.sweep_interval);
            tick.tick().await;
            loop {
                tick.tick().await;
                hub.sweep_idle().await;
            }
        })
    }

    pub(crate) async fn sweep_idle(&self) {
        let mut clients = self.clients.lock().await;
        let now = Instant::now();
        let idle: Vec<Arc<str>> = clients
            .values()
            .filter(|c| now.duration_since(c.last_seen) > self.settings.idle_timeout)
            .map(|c| c.id.clone())
            .collect();
        if idle.is_empty() {
            return;
        }
        for id in idle {
            if let Some(gone) = clients.remove(id.as_ref()) {
                warn!(client = %id, "evicting idle client");
                let bye = ServerEnvelope::success(Action::Connected, false).encode();
                let _ = gone.outbound.try_send(bye);
                Self::requeue_peer_of(&mut clients, id.as_ref(), gone.peer.as_deref());
            }
        }
        Self::broadcast_count(&mut clients);
    }

    /// Best-effort hang-up notification for the peer of a client that
    /// vanished without saying goodbye; the peer re-enters its pool.
    fn requeue_peer_of(
        clients: &mut HashMap<Arc<str>, ClientHandle>,
        gone_id: &str,
        peer_id: Option<&str>,
    ) {
        let Some(peer_id) = peer_id else { return };
        let Some(peer) = clients.get_mut(peer_id) else {
            return;
        };
        // A stale link (the peer has since paired with someone else) is
        // left alone.
        if peer.peer.as_deref() != Some(gone_id) {
            return;
        }
        peer.peer = None;
        peer.is_waiting = true;
        let peer_id = peer.id.clone();
        let bye = ServerEnvelope::success(Action::HangUpRec, PeerRef::to_peer(gone_id)).encode();
        Self::deliver(clients, peer_id.as_ref(), bye);
    }

    /// Non-blocking enqueue with the slow-peer policy: a full queue
    /// removes the client (closing its queue) in the same critical
    /// section the caller already holds.
    fn deliver(clients: &mut HashMap<Arc<str>, ClientHandle>, id: &str, text: String) -> bool {
        let Some(client) = clients.get(id) else {
            debug!(target = id, "relay target not registered, dropping");
            return false;
        };
        match client.outbound.try_send(text) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(client = id, "outbound queue full, evicting slow peer");
                clients.remove(id);
                Self::broadcast_count(clients);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(client = id, "outbound queue already closed, dropping");
                false
            }
        }
    }

    /// Tell every live client the current user count. Iterates under the
    /// mutex; slow peers found mid-broadcast are evicted afterwards and
    /// the corrected count re-broadcast.
    fn broadcast_count(clients: &mut HashMap<Arc<str>, ClientHandle>) {
        loop {
            let text =
                ServerEnvelope::success(Action::ActiveUsers, clients.len()).encode();
            let mut dead: Vec<Arc<str>> = Vec::new();
            for (id, client) in clients.iter() {
                if client.outbound.try_send(text.clone()).is_err() {
                    dead.push(id.clone());
                }
            }
            if dead.is_empty() {
                return;
            }
            for id in dead {
                warn!(client = %id, "dropping unreachable client during broadcast");
                clients.remove(&id);
            }
        }
    }
}
