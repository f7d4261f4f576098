//! # Transport
//!
//! The single outbound connection to the collector.
//!
//! - Connects once, at startup. A refused connection is logged and the tracer
//!   keeps running with a disconnected transport.
//! - [`Transport::send`] writes one whole line under the transport lock, so
//!   lines from concurrent callers never interleave.
//! - Failures are logged and counted, never returned. There is no reconnect:
//!   a failed write may leave part of a line on the socket, so the connection
//!   is dropped on the first failure.
//! - Writes block the calling thread. With `sendTimeoutMs` set, the socket
//!   write timeout bounds that wait instead.

use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};

type Sink = Box<dyn Write + Send>;

/// Best-effort, line-serializing event sink.
pub struct Transport {
    sink: Mutex<Option<Sink>>,
    sent: AtomicU64,
    failures: AtomicU64,
}

impl Transport {
    /// Connect to the collector at `addr` (`host:port`).
    ///
    /// Never fails: on error the returned transport is disconnected and every
    /// later `send` is a counted no-op.
    #[must_use]
    pub fn connect(addr: &str, send_timeout: Option<Duration>) -> Self {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                if let Err(e) = stream.set_write_timeout(send_timeout) {
                    warn!("Failed to set collector write timeout: {e}");
                }
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Failed to disable Nagle on collector socket: {e}");
                }
                info!("Connected to collector at {addr}");
                Self::from_writer(stream)
            }
            Err(e) => {
                error!("Failed to connect to collector at {addr}: {e}. Events will be dropped.");
                Self::disconnected()
            }
        }
    }

    /// Wrap an arbitrary writer (file, buffer, socket).
    #[must_use]
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self::with_sink(Some(Box::new(writer)))
    }

    #[must_use]
    pub fn disconnected() -> Self {
        Self::with_sink(None)
    }

    fn with_sink(sink: Option<Sink>) -> Self {
        Self { sink: Mutex::new(sink), sent: AtomicU64::new(0), failures: AtomicU64::new(0) }
    }

    /// Write one complete line. Errors are logged and swallowed; the first
    /// failed write disconnects the transport.
    pub fn send(&self, line: &str) {
        let mut sink = self.lock();
        let Some(writer) = sink.as_mut() else {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return;
        };

        match writer.write_all(line.as_bytes()).and_then(|()| writer.flush()) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!("Failed to send event to collector: {e}. Dropping the connection.");
                *sink = None;
            }
        }
    }

    /// Flush and drop the connection. Later sends are counted failures.
    pub fn close(&self) {
        if let Some(mut writer) = self.lock().take() {
            if let Err(e) = writer.flush() {
                warn!("Failed to flush collector connection on close: {e}");
            }
            info!("Collector connection closed");
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    /// Lines written successfully.
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Lines lost to a missing connection or a failed write.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Sink>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
