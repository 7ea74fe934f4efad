use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use exam_protocol::ExamMsg;

use crate::delivery::Delivery;
use crate::registry::RegistryShared;

// membership change observed by a connection handler
#[derive(Debug)]
pub enum RosterEvent {
    Joined(String),
    Departed(String),
}

pub struct RosterBroadcaster;

impl RosterBroadcaster {
    // Spawn the single task that turns membership events into
    // ACTIVE_STUDENTS_UPDATE fan-outs. Serializing the passes through
    // one task keeps each update consistent with a registry snapshot.
    pub fn spawn_receive(
        mut local_rx: Receiver<RosterEvent>,
        registry: RegistryShared,
        outgoing: Delivery,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Some(event) = local_rx.recv().await {
                    match &event {
                        RosterEvent::Joined(name) => info!("student {} joined the roster", name),
                        RosterEvent::Departed(name) => info!("student {} left the roster", name),
                    }

                    // snapshot usernames under the lock, release before fan-out
                    let names = { registry.lock().await.roster() };
                    debug!("broadcasting roster {:?}", &names);

                    let update = ExamMsg::ActiveStudentsUpdate(names.join(" ").into_bytes());
                    outgoing.broadcast(update).await;
                } else {
                    info!("no more roster event senders");
                    break;
                }
            }
        })
    }
}
