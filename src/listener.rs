use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::metrics::decoder::decode_buffer;
use crate::metrics::Aggregator;
use crate::shutdown::ShutdownReceiver;

/// Largest payload a single UDP datagram can carry.
const UDP_BUFFER_SIZE: usize = 65_507;

/// How long accepted tcp connections may keep sending after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    Udp,
    Tcp,
}

impl Transport {
    pub fn label(self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
        }
    }
}

/// A bound inbound socket, ready to be driven by [`Listener::run`].
pub enum Listener {
    Udp(UdpSocket),
    Tcp(TcpListener),
}

impl Listener {
    pub async fn bind(transport: Transport, addr: &str) -> AppResult<Self> {
        let bind_err = |source| AppError::Bind {
            transport: transport.label(),
            addr: addr.to_owned(),
            source,
        };
        let listener = match transport {
            Transport::Udp => Self::Udp(UdpSocket::bind(addr).await.map_err(bind_err)?),
            Transport::Tcp => Self::Tcp(TcpListener::bind(addr).await.map_err(bind_err)?),
        };
        Ok(listener)
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        match self {
            Self::Udp(s) => s.local_addr(),
            Self::Tcp(l) => l.local_addr(),
        }
    }

    /// Receive until shutdown, applying every decoded sample.
    pub async fn run(self, aggregator: Arc<Aggregator>, shutdown: ShutdownReceiver) {
        match self {
            Self::Udp(socket) => run_udp(socket, aggregator, shutdown).await,
            Self::Tcp(listener) => run_tcp(listener, aggregator, shutdown).await,
        }
    }
}

async fn run_udp(socket: UdpSocket, aggregator: Arc<Aggregator>, mut shutdown: ShutdownReceiver) {
    if let Ok(addr) = socket.local_addr() {
        info!(%addr, "Listening for events on udp.");
    }
    let mut buf = vec![0u8; UDP_BUFFER_SIZE];

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((n, peer)) => {
                    let samples = decode_buffer(&buf[..n]);
                    debug!(%peer, bytes = n, samples = samples.len(), "Received datagram.");
                    aggregator.apply_all(samples);
                }
                Err(e) => warn!(error = %e, "Unable to read from udp."),
            },
        }
    }
    debug!("Udp listener stopped.");
}

async fn run_tcp(
    listener: TcpListener,
    aggregator: Arc<Aggregator>,
    mut shutdown: ShutdownReceiver,
) {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Listening for events on tcp.");
    }
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "New tcp connection.");
                    connections.spawn(handle_connection(stream, peer, aggregator.clone()));
                }
                Err(e) => warn!(error = %e, "Unable to accept tcp connection."),
            },
            // Reap finished connections so the set does not grow
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    drain_connections(&mut connections).await;
    debug!("Tcp listener stopped.");
}

/// Let accepted connections finish, aborting whatever is still open after
/// the grace period.
async fn drain_connections(connections: &mut JoinSet<()>) {
    if connections.is_empty() {
        return;
    }
    debug!(open = connections.len(), "Waiting for tcp connections to finish.");
    let drained = timeout(SHUTDOWN_GRACE, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(open = connections.len(), "Aborting tcp connections still open at shutdown.");
        connections.shutdown().await;
    }
}

/// Decode line by line until the peer closes. Lines are read as raw bytes so
/// invalid UTF-8 only affects the record it appears in.
async fn handle_connection(stream: TcpStream, peer: SocketAddr, aggregator: Arc<Aggregator>) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::with_capacity(512);
    let mut received = 0usize;

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let samples = decode_buffer(&line);
                received += samples.len();
                aggregator.apply_all(samples);
            }
            Err(e) => {
                warn!(%peer, error = %e, "Unable to read from tcp.");
                break;
            }
        }
    }
    debug!(%peer, samples = received, "Tcp connection closed.");
}
