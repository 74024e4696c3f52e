use std::sync::Arc;

use tinyrand::RandRange;
use tinyrand_std::thread_rand;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::hub::Hub;
use crate::models::client::ChannelKind;

/// Start one pairing task per matchmaking pool.
pub fn spawn_matchmakers(hub: &Arc<Hub>) -> Vec<JoinHandle<()>> {
    ChannelKind::ALL
        .iter()
        .map(|&kind| spawn_for_pool(Arc::clone(hub), kind))
        .collect()
}

fn spawn_for_pool(hub: Arc<Hub>, kind: ChannelKind) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(?kind, "matchmaker started");
        let mut tick = tokio::time::interval(hub.settings().match_interval);
        loop {
            tick.tick().await;
            pair_once(&hub, kind).await;
        }
    })
}

/// One matchmaking round: snapshot the pool, pick two distinct clients
/// (uniformly at random when more than two are waiting), and hand them to
/// the hub's check-then-act pairing. A stale snapshot simply loses the
/// round; the next tick retries.
pub(crate) async fn pair_once(hub: &Hub, kind: ChannelKind) -> bool {
    let waiting = hub.waiting_clients(kind).await;
    if waiting.len() < 2 {
        return false;
    }
    let (caller, callee) = if waiting.len() == 2 {
        (0, 1)
    } else {
        pick_two(waiting.len())
    };
    hub.try_pair(&waiting[caller], &waiting[callee], kind).await
}

/// Two distinct indices in `0..len`, uniform, resampling on collision.
fn pick_two(len: usize) -> (usize, usize) {
    let mut rand = thread_rand();
    let first = rand.next_range(0..len);
    let mut second = rand.next_range(0..len);
    while second == first {
        second = rand.next_range(0..len);
    }
    (first, second)
}
