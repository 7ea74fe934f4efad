use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, Sender};
use tokio::task::JoinSet;
use tokio_util::codec::FramedWrite;
use futures::SinkExt;

use tracing::{info, debug, error};

use exam_protocol::{ExamCodec, ExamMsg};

use crate::client_handler::ClientHandler;
use crate::config::ExamConfig;
use crate::delivery::Delivery;
use crate::error::ServerError;
use crate::registry::RegistryShared;
use crate::roster::RosterEvent;

const SERVER_FULL: &str = "Server is full. Please try again later.";
const OUTBOX_SIZE: usize = 64;

pub struct ExamListener;

impl ExamListener {
    // Accept loop with admission control. Connection tasks live in a
    // JoinSet so they are reaped as they finish and joined on shutdown
    // instead of detached.
    pub async fn run_until(
        listener: TcpListener,
        config: Arc<ExamConfig>,
        registry: RegistryShared,
        outgoing: Delivery,
        roster_tx: Sender<RosterEvent>,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tokio::pin!(shutdown);

        let mut handlers: JoinSet<()> = JoinSet::new();

        info!("exam server listening on {}", local_addr);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown signal received, stopping accept loop");
                    break;
                }
                Some(_finished) = handlers.join_next(), if !handlers.is_empty() => {}
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            Self::admit(stream, addr, &config, &registry,
                                        &outgoing, &roster_tx, &mut handlers).await;
                        }
                        Err(err) => {
                            // per-connection failures never take down the server
                            error!("accept error: {}", err);
                        }
                    }
                }
            }
        }

        handlers.abort_all();
        while handlers.join_next().await.is_some() {}
        Ok(())
    }

    async fn admit(
        stream: TcpStream,
        addr: SocketAddr,
        config: &Arc<ExamConfig>,
        registry: &RegistryShared,
        outgoing: &Delivery,
        roster_tx: &Sender<RosterEvent>,
        handlers: &mut JoinSet<()>,
    ) {
        info!("new client connection from {:?}", addr);

        let (outbox_tx, outbox_rx) = mpsc::channel::<ExamMsg>(OUTBOX_SIZE);
        let slot = { registry.lock().await.acquire(outbox_tx) };

        let Some(slot) = slot else {
            info!("max clients reached, rejecting {}", addr);
            Self::reject(stream).await;
            return;
        };
        debug!("slot {} acquired for {}", slot, addr);

        let (tcp_read, tcp_write) = stream.into_split();
        let _writer = ClientHandler::spawn_writer(tcp_write, outbox_rx);

        let handler = ClientHandler::new(slot, tcp_read, registry.clone(),
                                         outgoing.clone(), roster_tx.clone(), Arc::clone(config));
        handlers.spawn(handler.run());
    }

    // Admission short circuit: turned away before a session exists,
    // reusing the protocol's terminal message kind. No handler is
    // spawned and the registry never sees this connection.
    async fn reject(stream: TcpStream) {
        let mut fw = FramedWrite::new(stream, ExamCodec);
        if let Err(err) = fw.send(ExamMsg::ExamEnded(SERVER_FULL.as_bytes().to_vec())).await {
            debug!("failed to deliver rejection notice: {}", err);
        }
        // socket closes on drop
    }
}
