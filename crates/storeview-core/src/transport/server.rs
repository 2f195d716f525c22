//! TCP transport for the host process.
//!
//! Listens on a local port and serves one inspector at a time. A newer
//! inspector connection replaces the previous one. Inbound frames are
//! delivered to listeners in arrival order; outbound messages go to the
//! current inspector.
//!
//! # Thread Safety
//!
//! The accept loop and the reader of the current connection run as tokio
//! tasks. The write half of the current connection is shared behind a tokio
//! `Mutex`, so concurrent sends are serialized frame by frame.

use super::{Connection, Listener, ListenerRegistry, Subscription};
use crate::error::{Result, StoreviewError};
use crate::protocol::{read_frame, write_envelope, Envelope};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

struct Peer {
    id: u64,
    addr: SocketAddr,
    writer: OwnedWriteHalf,
}

struct Shared {
    registry: ListenerRegistry,
    peer: Mutex<Option<Peer>>,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
    next_peer: AtomicU64,
}

impl Shared {
    async fn deliver(&self, envelope: Envelope) {
        let listeners = match self.registry.listeners_for(&envelope.name) {
            Ok(listeners) => listeners,
            Err(e) => {
                warn!("Dropping message {}: {}", envelope.name, e);
                return;
            }
        };

        if listeners.is_empty() {
            debug!("No listener for message {}", envelope.name);
            return;
        }

        for listener in listeners {
            listener(envelope.params.clone()).await;
        }
    }

    async fn clear_peer(&self, id: u64) {
        let mut peer = self.peer.lock().await;
        if peer.as_ref().is_some_and(|p| p.id == id) {
            *peer = None;
        }
    }

    fn replace_reader(&self, handle: Option<JoinHandle<()>>) {
        let previous = match self.reader.lock() {
            Ok(mut reader) => std::mem::replace(&mut *reader, handle),
            Err(e) => {
                error!("Reader slot poisoned: {}", e);
                return;
            }
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

/// Host side of the TCP transport. Dropping shuts down the server.
pub struct TcpTransport {
    addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<JoinHandle<()>>,
}

impl TcpTransport {
    /// Bind to `host:port` (port 0 = OS-assigned) and start accepting inspectors.
    pub async fn bind(host: &str, port: u16) -> Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        let addr = listener.local_addr()?;

        info!("Inspector transport listening on {}", addr);

        let shared = Arc::new(Shared {
            registry: ListenerRegistry::new(),
            peer: Mutex::new(None),
            reader: std::sync::Mutex::new(None),
            next_peer: AtomicU64::new(1),
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task_handle = tokio::spawn(Self::accept_loop(listener, shared.clone(), shutdown_rx));

        Ok(Self {
            addr,
            shared,
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        })
    }

    /// Get the address the transport is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Whether an inspector is currently connected.
    pub async fn is_connected(&self) -> bool {
        self.shared.peer.lock().await.is_some()
    }

    /// Address of the connected inspector, if any.
    pub async fn peer_addr(&self) -> Option<SocketAddr> {
        self.shared.peer.lock().await.as_ref().map(|p| p.addr)
    }

    /// Stop accepting inspectors and drop the current connection.
    pub async fn shutdown(&mut self) {
        self.signal_shutdown();
        self.shared.peer.lock().await.take();
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.shared.replace_reader(None);
    }

    async fn accept_loop(
        listener: TcpListener,
        shared: Arc<Shared>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Inspector transport shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let id = shared.next_peer.fetch_add(1, Ordering::Relaxed);
                            let (reader, writer) = stream.into_split();

                            let previous = shared.peer.lock().await.replace(Peer {
                                id,
                                addr: peer_addr,
                                writer,
                            });
                            if let Some(previous) = previous {
                                info!("Inspector {} replaced by {}", previous.addr, peer_addr);
                            } else {
                                info!("Inspector connected from {}", peer_addr);
                            }

                            let handle = tokio::spawn(Self::read_loop(shared.clone(), id, reader));
                            shared.replace_reader(Some(handle));
                        }
                        Err(e) => {
                            error!("Inspector accept error: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn read_loop(shared: Arc<Shared>, id: u64, mut reader: OwnedReadHalf) {
        loop {
            let frame = match read_frame(&mut reader).await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!("Inspector connection {} closed", id);
                    break;
                }
                Err(e) => {
                    warn!("Inspector connection {} failed: {}", id, e);
                    break;
                }
            };

            match serde_json::from_slice::<Envelope>(&frame) {
                Ok(envelope) => shared.deliver(envelope).await,
                Err(e) => warn!("Ignoring malformed frame from inspector {}: {}", id, e),
            }
        }

        shared.clear_peer(id).await;
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.signal_shutdown();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

#[async_trait::async_trait]
impl Connection for TcpTransport {
    fn add_listener(&self, name: &str, listener: Listener) -> Result<Subscription> {
        self.shared.registry.add(name, listener)
    }

    async fn send(&self, name: &str, payload: Value) -> Result<()> {
        let mut peer = self.shared.peer.lock().await;
        let Some(current) = peer.as_mut() else {
            return Err(StoreviewError::NotConnected);
        };

        let envelope = Envelope::new(name, payload);
        if let Err(e) = write_envelope(&mut current.writer, &envelope).await {
            warn!("Send to inspector {} failed: {}", current.addr, e);
            *peer = None;
            return Err(StoreviewError::transport(e));
        }
        Ok(())
    }
}
