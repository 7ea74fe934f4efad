use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal channel closed: {0}")]
    ChannelClosed(&'static str),
}
