use tokio::net::TcpListener;

use tracing_subscriber::fmt;
use tracing::{info, Level};

use exam_server::{ExamConfig, ServerError};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    fmt()
        .compact()
        .with_max_level(Level::INFO)
        .init();

    let config = ExamConfig::default();
    info!("Exam server starting.. {:?}", &config.addr);

    let listener = TcpListener::bind(&config.addr).await?;
    exam_server::run_until(listener, config, shutdown_signal()).await
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        if let Ok(mut terminate) = signal(SignalKind::terminate()) {
            tokio::select! {
                signal_result = tokio::signal::ctrl_c() => {
                    if let Err(err) = signal_result {
                        info!("failed to listen for Ctrl+C: {}", err);
                    } else {
                        info!("received Ctrl+C");
                    }
                }
                _ = terminate.recv() => {
                    info!("received SIGTERM");
                }
            }
            return;
        }
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        info!("failed to listen for Ctrl+C: {}", err);
    } else {
        info!("received Ctrl+C");
    }
}
