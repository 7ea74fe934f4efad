pub mod config;
pub mod error;
pub mod registry;
pub mod session;
pub mod delivery;
pub mod roster;
pub mod client_handler;
pub mod server_listener;

pub use config::{ExamConfig, ExamConfigBuilder};
pub use error::ServerError;

use std::future::{pending, Future};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::delivery::Delivery;
use crate::registry::RegistryShared;
use crate::roster::{RosterBroadcaster, RosterEvent};
use crate::server_listener::ExamListener;

const BOUNDED_CHANNEL_SIZE: usize = 64;

pub async fn run(listener: TcpListener, config: ExamConfig) -> Result<(), ServerError> {
    run_until(listener, config, pending::<()>()).await
}

pub async fn run_until(
    listener: TcpListener,
    config: ExamConfig,
    shutdown: impl Future<Output = ()> + Send,
) -> Result<(), ServerError> {
    let config = Arc::new(config);

    // shared slot table, sized to the configured capacity
    let registry = RegistryShared::new(config.max_clients);
    let outgoing = Delivery::new(&registry);

    // membership events flow to the single roster broadcaster task
    let (roster_tx, roster_rx) = mpsc::channel::<RosterEvent>(BOUNDED_CHANNEL_SIZE);
    let broadcaster = RosterBroadcaster::spawn_receive(roster_rx, registry.clone(), outgoing.clone());

    let result = ExamListener::run_until(listener, config, registry, outgoing, roster_tx, shutdown).await;

    // with the listener gone and every handler joined, the event
    // channel has no senders left and the broadcaster drains out
    let _ = broadcaster.await;

    result
}
