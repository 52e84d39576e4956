use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api;
use crate::config::{Config, ConfigError};
use crate::reader::{ReaderError, ReaderOptions, run_reader};
use crate::store::ReadingStore;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error("HTTP server error: {0}")]
    Server(#[source] std::io::Error),

    #[error("task panicked or was aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Run the reader and the HTTP server until shutdown or the first failure.
pub async fn run(config: Config, cancel: CancellationToken) -> Result<(), BridgeError> {
    let device = config.validate()?.to_owned();
    info!(
        %device,
        http_addr = %config.server.http_addr,
        "Starting co2-bridge"
    );
    let options = ReaderOptions::from(&config.serial);
    let grace = config.server.shutdown_grace();
    let store = ReadingStore::new();

    let listener = TcpListener::bind(config.server.http_addr)
        .await
        .map_err(BridgeError::Server)?;
    info!(http_addr = %config.server.http_addr, "HTTP server listening");

    let reader = {
        let store = store.clone();
        let cancel = cancel.clone();
        async move { run_reader(&device, store, cancel, options).await }
    };
    let server = api::serve(listener, store, cancel.clone(), grace);

    supervise(reader, server, &cancel).await
}

/// Run the reader and server side by side.
///
/// A unit that fails cancels the other, so a failed reader stops the server
/// and vice versa. A unit that finishes cleanly leaves the other running: the
/// server keeps answering with the last reading after the sensor stops on
/// its own. Returns the first error observed; a clean shutdown returns `Ok`.
pub async fn supervise<R, S>(reader: R, server: S, cancel: &CancellationToken) -> Result<(), BridgeError>
where
    R: Future<Output = Result<(), ReaderError>> + Send + 'static,
    S: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let mut units = JoinSet::new();
    units.spawn(async move { reader.await.map_err(BridgeError::from) });
    units.spawn(async move { server.await.map_err(BridgeError::Server) });

    let mut first_error = None;

    while let Some(joined) = units.join_next().await {
        if let Err(e) = joined.map_err(BridgeError::from).and_then(|result| result) {
            error!(error = %e, "Shutting down after failure");
            cancel.cancel();
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
