use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use log::{debug, error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

use crate::domain::CollectorError;

/// One received line, tagged with the connection it arrived on.
///
/// Identities are only unique within one tracer's stream, so consumers pair
/// events by `(connection, id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedLine {
    /// Accept order of the connection, starting at 1
    pub connection: u64,
    pub line: String,
}

impl QueuedLine {
    #[must_use]
    pub fn new(connection: u64, line: impl Into<String>) -> Self {
        Self { connection, line: line.into() }
    }
}

/// Counters shared by every connection task.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections: AtomicU64,
    pub lines_received: AtomicU64,
    /// Lines dropped because the processor queue was full
    pub lines_dropped: AtomicU64,
}

impl ServerStats {
    #[must_use]
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn lines_received(&self) -> u64 {
        self.lines_received.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn lines_dropped(&self) -> u64 {
        self.lines_dropped.load(Ordering::Relaxed)
    }
}

/// Accepts tracer connections and forwards their lines to the processor queue.
pub struct CollectorServer {
    listener: TcpListener,
    stats: Arc<ServerStats>,
}

impl CollectorServer {
    /// # Errors
    /// Returns `CollectorError::BindFailed` if the address cannot be bound.
    pub async fn bind(addr: &str) -> Result<Self, CollectorError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| CollectorError::BindFailed { addr: addr.to_string(), source })?;
        Ok(Self { listener, stats: Arc::new(ServerStats::default()) })
    }

    /// # Errors
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, CollectorError> {
        Ok(self.listener.local_addr()?)
    }

    #[must_use]
    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    /// Accept connections until `shutdown` resolves, then close them all.
    ///
    /// Every clone of `queue` is dropped on return, so the processor sees the
    /// queue disconnect once the caller drops its own sender.
    pub async fn serve<F>(self, queue: Sender<QueuedLine>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let connection = self.stats.connections.fetch_add(1, Ordering::Relaxed) + 1;
                        info!("Tracer connected from {peer} (connection {connection})");
                        let queue = queue.clone();
                        let stats = Arc::clone(&self.stats);
                        connections.spawn(async move {
                            match read_lines(stream, connection, &queue, &stats).await {
                                Ok(()) => info!("Tracer {peer} disconnected"),
                                Err(e) => warn!("Connection from {peer} failed: {e}"),
                            }
                        });
                    }
                    Err(e) => error!("Accept failed: {e}"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                () = &mut shutdown => break,
            }
        }

        debug!("Collector shutting down, closing {} connections", connections.len());
        connections.shutdown().await;
    }
}

async fn read_lines(
    stream: TcpStream,
    connection: u64,
    queue: &Sender<QueuedLine>,
    stats: &ServerStats,
) -> Result<(), CollectorError> {
    let mut lines = BufReader::new(stream).lines();

    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        stats.lines_received.fetch_add(1, Ordering::Relaxed);

        // Non-blocking send (drop if the processor is slow)
        match queue.try_send(QueuedLine { connection, line }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                stats.lines_dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Processor queue closed, dropping connection");
                return Ok(());
            }
        }
    }

    Ok(())
}
