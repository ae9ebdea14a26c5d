//! The listener/reactor and per-connection handler.
//!
//! One Tokio task per accepted connection, bounded by a connection-count
//! semaphore, with an accept loop that backs off on transient errors and a
//! broadcast-based graceful shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::cmd;
use crate::connection::Connection;
use crate::db::Db;
use crate::metrics::{CURRENT_CONNECTION_COUNTER, TOTAL_CONNECTION_PROCESSED};
use crate::parser::{self, Command};
use crate::shutdown::Shutdown;

/// Caps the number of simultaneously open connections, mirroring the
/// teacher's `limit_connections` semaphore.
const MAX_CONNECTIONS: usize = 10_000;

struct Listener {
    db: Db,
    listener: TcpListener,
    idle_timeout: Duration,
    limit_connections: Arc<Semaphore>,
    notify_shutdown: broadcast::Sender<()>,
    shutdown_complete_rx: mpsc::Receiver<()>,
    shutdown_complete_tx: mpsc::Sender<()>,
}

struct Handler {
    db: Db,
    connection: Connection,
    shutdown: Shutdown,
    idle_timeout: Duration,
    pending_set: Option<PendingSet>,
    _shutdown_complete: mpsc::Sender<()>,
}

/// A received `set` header, awaiting its data block.
struct PendingSet {
    key: bytes::Bytes,
    flags: u16,
    bytes: usize,
    noreply: bool,
}

/// Runs the server: accepts connections from `listener` against `db` until
/// `shutdown` completes, then waits for in-flight connections to finish.
pub async fn run(listener: TcpListener, db: Db, shutdown: impl Future) {
    run_with_idle_timeout(listener, db, Duration::from_secs(60), shutdown).await
}

pub async fn run_with_idle_timeout(
    listener: TcpListener,
    db: Db,
    idle_timeout: Duration,
    shutdown: impl Future,
) {
    let (notify_shutdown, _) = broadcast::channel(1);
    let (shutdown_complete_tx, shutdown_complete_rx) = mpsc::channel(1);

    let mut server = Listener {
        db,
        listener,
        idle_timeout,
        limit_connections: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
        notify_shutdown,
        shutdown_complete_tx,
        shutdown_complete_rx,
    };

    tokio::select! {
        res = server.run() => {
            if let Err(err) = res {
                error!(%err, "accept loop gave up");
            }
        }
        _ = shutdown => {
            info!("shutdown signal received");
        }
    }

    let Listener {
        mut shutdown_complete_rx,
        shutdown_complete_tx,
        notify_shutdown,
        ..
    } = server;

    drop(notify_shutdown);
    drop(shutdown_complete_tx);

    let _ = shutdown_complete_rx.recv().await;
}

impl Listener {
    async fn run(&mut self) -> std::io::Result<()> {
        info!("accepting inbound connections");

        loop {
            let permit = self.limit_connections.clone().acquire_owned().await.unwrap();
            let socket = self.accept().await?;

            let mut handler = Handler {
                db: self.db.clone(),
                connection: Connection::new(socket),
                shutdown: Shutdown::new(self.notify_shutdown.subscribe()),
                idle_timeout: self.idle_timeout,
                pending_set: None,
                _shutdown_complete: self.shutdown_complete_tx.clone(),
            };

            tokio::spawn(async move {
                CURRENT_CONNECTION_COUNTER.inc();
                TOTAL_CONNECTION_PROCESSED.inc();

                if let Err(err) = handler.run().await {
                    warn!(%err, "connection closed with an I/O error");
                }

                CURRENT_CONNECTION_COUNTER.dec();
                drop(permit);
            });
        }
    }

    /// Accepts one inbound connection, retrying transient failures with
    /// exponential backoff (1s, 2s, 4s, ... giving up after 64s).
    async fn accept(&mut self) -> std::io::Result<TcpStream> {
        let mut backoff = 1;

        loop {
            match self.listener.accept().await {
                Ok((socket, _)) => return Ok(socket),
                Err(err) => {
                    if backoff > 64 {
                        return Err(err);
                    }
                    error!(%err, backoff, "accept failed, retrying");
                }
            }

            time::sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }
}

impl Handler {
    /// Processes commands from this connection until `quit`, peer close,
    /// idle timeout, or a process-wide shutdown is observed.
    async fn run(&mut self) -> std::io::Result<()> {
        loop {
            if self.shutdown.is_shutdown() {
                return Ok(());
            }

            if let Some(header) = self.pending_set.take() {
                let block = tokio::select! {
                    res = time::timeout(self.idle_timeout, self.connection.read_data_block(header.bytes)) => {
                        match res {
                            Ok(inner) => inner?,
                            Err(_) => {
                                debug!("idle timeout while awaiting a data block");
                                return Ok(());
                            }
                        }
                    }
                    _ = self.shutdown.recv() => return Ok(()),
                };

                self.apply_set(header, &block).await?;
                continue;
            }

            let line = tokio::select! {
                res = time::timeout(self.idle_timeout, self.connection.read_line()) => {
                    match res {
                        Ok(Ok(Some(line))) => line,
                        Ok(Ok(None)) => return Ok(()),
                        Ok(Err(err)) => return Err(err),
                        Err(_) => {
                            debug!("idle timeout while awaiting a command line");
                            return Ok(());
                        }
                    }
                }
                _ = self.shutdown.recv() => return Ok(()),
            };

            match parser::parse(&line) {
                Ok(Command::Quit) => return Ok(()),
                Ok(Command::Get { keys }) => {
                    cmd::Get::new(keys).apply(&self.db, &mut self.connection).await?;
                }
                Ok(Command::Delete { key, noreply }) => {
                    cmd::Delete::new(key, noreply).apply(&self.db, &mut self.connection).await?;
                }
                Ok(Command::Set { key, flags, exptime: _, bytes, noreply }) => {
                    self.pending_set = Some(PendingSet { key, flags, bytes, noreply });
                }
                Err(err) => {
                    self.connection.write_line(err.as_wire_str()).await?;
                    self.connection.flush().await?;
                }
            }
        }
    }

    async fn apply_set(&mut self, header: PendingSet, block: &[u8]) -> std::io::Result<()> {
        // Strip the trailing \r\n, then require the payload to be exactly
        // `bytes` long. A block truncated by an early peer close is simply
        // shorter than expected here, not a transport error.
        let payload = &block[..block.len().saturating_sub(2)];
        if payload.len() != header.bytes {
            self.connection
                .write_line("CLIENT_ERROR the data block does not match the # of bytes passed in the set command\r\n")
                .await?;
            self.connection.flush().await?;
            return Ok(());
        }

        cmd::Set::new(header.key, header.flags, header.bytes, header.noreply)
            .apply(&self.db, &mut self.connection, payload)
            .await
    }
}
