//! TCP accept loop.

use std::future::Future;
use std::sync::Arc;

use queue_core::ClientId;
use scheduler::JobScheduler;
use tokio::net::TcpListener;

use crate::{ServerConfig, ServerError, Session};

/// Bind the listening socket described by `config`.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let addr = config.bind_addr();
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Accept connections until `shutdown` resolves.
///
/// Each connection runs in its own task with a fresh [`ClientId`]. Accept
/// failures are logged and do not stop the loop.
pub async fn serve<F>(
    listener: TcpListener,
    scheduler: Arc<JobScheduler>,
    config: &ServerConfig,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()>,
{
    tracing::info!("Listening on {}", listener.local_addr()?);
    tokio::pin!(shutdown);

    let mut next_client = 0u64;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutting down gracefully...");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("Accept error: {}", e);
                        continue;
                    }
                };

                next_client += 1;
                let client = ClientId(next_client);
                tracing::info!("New connection from {} as {}", peer, client);

                let (reader, writer) = stream.into_split();
                let session = Session::new(
                    client,
                    scheduler.clone(),
                    reader,
                    writer,
                    config.max_line_bytes,
                );
                tokio::spawn(async move {
                    if let Err(e) = session.run().await {
                        tracing::warn!("Connection {} ({}) failed: {}", client, peer, e);
                    }
                });
            }
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}
