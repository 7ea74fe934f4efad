use std::time::Duration;

use tracing::{debug, warn};

use exam_protocol::ExamMsg;

use crate::registry::RegistryShared;

// handles msg delivery back to clients
//
// Messages are enqueued on each session's outbox channel, drained
// by that connection's writer task. The registry lock is released
// before any enqueue, so a slow or stalled peer can never hold up
// the lock for everyone else; a peer whose outbox stays full past
// the timeout just misses that delivery.
const SEND_TIMEOUT: Duration = Duration::from_millis(75);

pub struct Delivery {
    registry: RegistryShared,
}

impl Clone for Delivery {
    fn clone(&self) -> Self {
        Delivery {
            registry: self.registry.clone(),
        }
    }
}

impl Delivery {
    pub fn new(registry: &RegistryShared) -> Self {
        Delivery {
            registry: registry.clone(),
        }
    }

    // single send to the session in one slot
    pub async fn send(&self, slot: usize, msg: ExamMsg) {
        let outbox = { self.registry.lock().await.outbox_of(slot) };

        if let Some(tx) = outbox {
            if tx.send_timeout(msg, SEND_TIMEOUT).await.is_err() {
                debug!("outbox for slot {} closed or full, dropping message", slot);
            }
        }
    }

    // fan a msg out to every authenticated session
    pub async fn broadcast(&self, msg: ExamMsg) {
        // snapshot targets under the lock, then send without it
        let targets = { self.registry.lock().await.broadcast_targets() };

        for tx in targets {
            if tx.send_timeout(msg.clone(), SEND_TIMEOUT).await.is_err() {
                warn!("broadcast delivery timed out for a client, skipping");
            }
        }
    }
}
