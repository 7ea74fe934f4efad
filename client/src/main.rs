mod client;
mod error;

use tracing_subscriber::fmt;
use tracing::Level;

use crate::client::Client;
use crate::error::ClientError;

const DEFAULT_SERVER: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // keep the terminal clean, surface only warnings
    fmt()
        .compact()
        .with_max_level(Level::WARN)
        .init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_SERVER.to_string());

    let client = Client::connect(&addr).await?;
    client.run().await
}
