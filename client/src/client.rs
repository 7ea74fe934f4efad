use std::io::Write;

use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::net::{tcp, TcpStream};
use tokio::select;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_stream::StreamExt;
use futures::SinkExt;

use tracing::{info, debug, error};

use exam_protocol::{ExamCodec, ExamMsg};

use crate::error::ClientError;

// Interactive exam client: authenticate, then answer from stdin
// while server frames (feedback, roster updates) arrive concurrently.
pub struct Client {
    fr: FramedRead<tcp::OwnedReadHalf, ExamCodec>,
    fw: FramedWrite<tcp::OwnedWriteHalf, ExamCodec>,
    lines: Lines<BufReader<Stdin>>,
}

impl Client {
    pub async fn connect(addr: &str) -> io::Result<Client> {
        info!("connecting to exam server {:?}", addr);

        let stream = TcpStream::connect(addr).await
            .map_err(|e| { error!("unable to connect to server"); e })?;

        // split tcpstream so reads and writes interleave in select
        let (tcp_read, tcp_write) = stream.into_split();

        Ok(Client {
            fr: FramedRead::new(tcp_read, ExamCodec),
            fw: FramedWrite::new(tcp_write, ExamCodec),
            lines: BufReader::new(io::stdin()).lines(),
        })
    }

    pub async fn run(mut self) -> Result<(), ClientError> {
        println!("Connected to server. Please authenticate.");

        if self.authenticate().await? {
            self.take_exam().await?;
        }
        Ok(())
    }

    // prompt for a username until the server accepts one; the server
    // allows unlimited retries
    async fn authenticate(&mut self) -> Result<bool, ClientError> {
        loop {
            print!("Enter username: ");
            std::io::stdout().flush()?;

            let Some(username) = self.lines.next_line().await? else {
                return Ok(false); // stdin closed
            };
            let username = username.trim().to_string();
            if username.is_empty() {
                continue;
            }

            self.fw.send(ExamMsg::AuthRequest(username.clone().into_bytes())).await?;

            match self.fr.next().await {
                Some(Ok(ExamMsg::AuthSuccess)) => {
                    println!("Authentication successful! Welcome, {}.", username);
                    return Ok(true);
                }
                Some(Ok(ExamMsg::AuthFailure(reason))) => {
                    println!("Authentication failed: {}", String::from_utf8_lossy(&reason));
                }
                Some(Ok(ExamMsg::ExamEnded(reason))) => {
                    // turned away at admission, server is full
                    println!("Server message: {}", String::from_utf8_lossy(&reason));
                    return Ok(false);
                }
                Some(Ok(other)) => {
                    debug!("unexpected reply during authentication: {:?}", other);
                }
                Some(Err(err)) => return Err(err.into()),
                None => {
                    println!("Server disconnected during authentication.");
                    return Ok(false);
                }
            }
        }
    }

    async fn take_exam(&mut self) -> Result<(), ClientError> {
        loop {
            select! {
                frame = self.fr.next() => {
                    match frame {
                        Some(Ok(msg)) => {
                            if !self.show(msg) {
                                break;
                            }
                        }
                        Some(Err(err)) => return Err(err.into()),
                        None => {
                            println!("Server disconnected. Exam session ended.");
                            break;
                        }
                    }
                }
                line = self.lines.next_line() => {
                    match line? {
                        Some(answer) => {
                            let answer = answer.trim().to_string();
                            if answer.is_empty() {
                                continue;
                            }
                            self.fw.send(ExamMsg::AnswerSubmission(answer.into_bytes())).await?;
                        }
                        None => break, // stdin closed
                    }
                }
            }
        }
        Ok(())
    }

    // print a server frame; false ends the session
    fn show(&self, msg: ExamMsg) -> bool {
        match msg {
            ExamMsg::QuestionDelivery(question) => {
                println!("Exam Question: {}", String::from_utf8_lossy(&question));
                print!("Your answer: ");
                let _ = std::io::stdout().flush();
            }
            ExamMsg::FeedbackCorrect(text) | ExamMsg::FeedbackIncorrect(text) => {
                println!("{}", String::from_utf8_lossy(&text));
            }
            ExamMsg::ActiveStudentsUpdate(names) => {
                println!("Active students: {}", String::from_utf8_lossy(&names));
            }
            ExamMsg::ExamEnded(reason) => {
                println!("Exam session ended: {}", String::from_utf8_lossy(&reason));
                return false;
            }
            other => {
                debug!("ignoring server message {:?}", other);
            }
        }
        true
    }
}
