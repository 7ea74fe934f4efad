use std::str;
use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_stream::StreamExt;
use futures::SinkExt;

use tracing::{info, debug, warn};

use exam_protocol::{ExamCodec, ExamMsg};

use crate::config::ExamConfig;
use crate::delivery::Delivery;
use crate::error::ServerError;
use crate::registry::RegistryShared;
use crate::roster::RosterEvent;

const UNKNOWN_USERNAME: &[u8] = b"unknown username";
const NOT_AUTHENTICATED: &[u8] = b"authenticate first";
const CORRECT: &[u8] = b"Correct!";
const INCORRECT: &[u8] = b"Incorrect.";

// Handles server communication from one client connection.
// Drives the per-connection state machine: authentication loop,
// then the exam loop, then teardown. Runs as its own task.
pub struct ClientHandler {
    slot: usize,
    fr: FramedRead<OwnedReadHalf, ExamCodec>,
    registry: RegistryShared,
    outgoing: Delivery,
    roster_tx: Sender<RosterEvent>,
    config: Arc<ExamConfig>,
    username: Option<String>,
}

impl ClientHandler {
    pub fn new(
        slot: usize,
        tcp_read: OwnedReadHalf,
        registry: RegistryShared,
        outgoing: Delivery,
        roster_tx: Sender<RosterEvent>,
        config: Arc<ExamConfig>,
    ) -> Self {
        Self {
            slot,
            fr: FramedRead::new(tcp_read, ExamCodec),
            registry,
            outgoing,
            roster_tx,
            config,
            username: None, // set after authentication succeeds
        }
    }

    // Spawn the writer side of the connection: drains the session
    // outbox into the socket write half. Ends when every sender is
    // gone (slot released, handler finished) or the peer stops reading.
    pub fn spawn_writer(tcp_write: OwnedWriteHalf, mut outbox_rx: Receiver<ExamMsg>) -> JoinHandle<()> {
        let mut fw = FramedWrite::new(tcp_write, ExamCodec);

        tokio::spawn(async move {
            while let Some(msg) = outbox_rx.recv().await {
                if let Err(err) = fw.send(msg).await {
                    debug!("client write half closed: {}", err);
                    break;
                }
            }
        })
    }

    // Drive the session to completion, then tear the slot down.
    // Every failure stays local to this connection.
    pub async fn run(mut self) {
        match self.converse().await {
            Ok(()) => info!("client on slot {} disconnected", self.slot),
            Err(err) => warn!("session on slot {} aborted: {}", self.slot, err),
        }

        self.process_disconnect().await;
    }

    async fn converse(&mut self) -> Result<(), ServerError> {
        if self.authenticate().await? {
            self.proctor().await?;
        }
        Ok(())
    }

    // Authentication loop: deny-by-default until an allow-listed
    // AUTH_REQUEST arrives. Retries are unlimited. Returns false if
    // the peer disconnects before authenticating.
    async fn authenticate(&mut self) -> Result<bool, ServerError> {
        while let Some(frame) = self.fr.next().await {
            match frame? {
                ExamMsg::AuthRequest(raw) => {
                    match str::from_utf8(&raw).ok().filter(|name| self.config.is_allowed(name)) {
                        Some(name) => {
                            let name = name.to_string();
                            {
                                let mut registry = self.registry.lock().await;
                                registry.authenticate(self.slot, name.clone());
                            }
                            info!("student {} authenticated on slot {}", name, self.slot);

                            self.outgoing.send(self.slot, ExamMsg::AuthSuccess).await;
                            self.roster_tx
                                .send(RosterEvent::Joined(name.clone()))
                                .await
                                .map_err(|_| ServerError::ChannelClosed("roster"))?;

                            self.username = Some(name);
                            return Ok(true);
                        }
                        None => {
                            info!("authentication failed on slot {}: {:?}",
                                  self.slot, String::from_utf8_lossy(&raw));
                            self.outgoing
                                .send(self.slot, ExamMsg::AuthFailure(UNKNOWN_USERNAME.to_vec()))
                                .await;
                        }
                    }
                }
                other => {
                    // any other kind before authentication is denied
                    debug!("pre-auth message {:?} on slot {}, denying", other, self.slot);
                    self.outgoing
                        .send(self.slot, ExamMsg::AuthFailure(NOT_AUTHENTICATED.to_vec()))
                        .await;
                }
            }
        }

        Ok(false) // disconnected during authentication
    }

    // Exam loop: deliver the question once, then grade every
    // submission. The protocol never advances past the single
    // question or closes the session after a correct answer.
    async fn proctor(&mut self) -> Result<(), ServerError> {
        let question = self.config.question.clone().into_bytes();
        self.outgoing.send(self.slot, ExamMsg::QuestionDelivery(question)).await;
        info!("question delivered to {}", self.name());

        while let Some(frame) = self.fr.next().await {
            match frame? {
                ExamMsg::AnswerSubmission(answer) => {
                    info!("answer received from {}: {:?}", self.name(), String::from_utf8_lossy(&answer));

                    let feedback = if self.config.grade(&answer) {
                        ExamMsg::FeedbackCorrect(CORRECT.to_vec())
                    } else {
                        ExamMsg::FeedbackIncorrect(INCORRECT.to_vec())
                    };
                    self.outgoing.send(self.slot, feedback).await;
                }
                other => {
                    debug!("ignoring {:?} from authenticated client {}", other, self.name());
                }
            }
        }

        Ok(())
    }

    // Teardown: clear the slot under the lock, then broadcast the
    // shrunken roster if this session had been counted in it.
    async fn process_disconnect(&mut self) {
        let departed = { self.registry.lock().await.release(self.slot) };

        let Some(session) = departed else { return };

        if session.is_authenticated() {
            if let Some(name) = session.username() {
                info!("student {} has left", name);
                if self.roster_tx.send(RosterEvent::Departed(name.to_string())).await.is_err() {
                    debug!("roster broadcaster gone, skipping departure update");
                }
            }
        }
    }

    fn name(&self) -> &str {
        self.username.as_deref().unwrap_or("<unauthenticated>")
    }
}
