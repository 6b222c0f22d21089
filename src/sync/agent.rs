//! Sync agent: background receive task plus on-demand push to the peer

use super::{wire, SyncConfig};
use crate::catalog::{CatalogStore, PriceMap};
use crate::error::SyncError;
use chrono::NaiveDateTime;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Bounded wait for an inbound connection or message
const RECV_POLL: Duration = Duration::from_millis(100);

/// Pause between receive polls
const RECV_YIELD: Duration = Duration::from_millis(10);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// How long shutdown waits for the receive task before aborting it
const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Result of a push attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Message with this many prices written to the peer channel
    Sent(usize),
    /// Delta was empty, no network action taken
    NothingToSend,
    /// Agent already shut down
    NotRunning,
}

/// Sync endpoint for one node of the store pair
pub struct SyncAgent {
    config: SyncConfig,
    store: Arc<CatalogStore>,
    running: Arc<AtomicBool>,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    outbound: Mutex<Option<TcpStream>>,
    receiver: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SyncAgent {
    /// Bind the inbound channel, spawn the receive task and connect to the peer
    ///
    /// Bind and address resolution failures are returned; the caller keeps
    /// running without sync. A peer that is not up yet is only logged, the
    /// outbound channel is connected lazily on the next push.
    pub async fn start(config: SyncConfig, store: Arc<CatalogStore>) -> Result<Self, SyncError> {
        let listen_addr = config.listen_addr();
        let listener = TcpListener::bind(&listen_addr)
            .await
            .map_err(|source| SyncError::Bind {
                addr: listen_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        let peer_addr = resolve(&config.peer_addr()).await?;

        log::info!(
            "Sync listener bound to {} (receiving from peer, {} role)",
            local_addr,
            config.role
        );

        let running = Arc::new(AtomicBool::new(true));
        let receiver = tokio::spawn(receive_loop(
            listener,
            Arc::clone(&store),
            Arc::clone(&running),
        ));

        let outbound = match connect(peer_addr).await {
            Ok(stream) => {
                log::info!("Connected to peer at {} (sending to peer)", peer_addr);
                Some(stream)
            }
            Err(e) => {
                log::warn!(
                    "Peer at {} not reachable yet, will retry on next push: {}",
                    peer_addr,
                    e
                );
                None
            }
        };

        Ok(Self {
            config,
            store,
            running,
            local_addr,
            peer_addr,
            outbound: Mutex::new(outbound),
            receiver: std::sync::Mutex::new(Some(receiver)),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Address the inbound listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Send prices of items updated at or after `since`
    pub async fn push(&self, since: NaiveDateTime) -> Result<PushOutcome, SyncError> {
        if !self.is_running() {
            log::warn!("Sync agent not running, cannot send prices");
            return Ok(PushOutcome::NotRunning);
        }
        let prices = self.store.snapshot_since(since);
        self.send(prices).await
    }

    /// Run `push(since)` on its own task; the caller does not wait on the network
    pub fn spawn_push(
        self: &Arc<Self>,
        since: NaiveDateTime,
    ) -> JoinHandle<Result<PushOutcome, SyncError>> {
        let agent = Arc::clone(self);
        tokio::spawn(async move { agent.push(since).await })
    }

    /// Send the price of every item in the catalog
    pub async fn push_all(&self) -> Result<PushOutcome, SyncError> {
        if !self.is_running() {
            log::warn!("Sync agent not running, cannot send prices");
            return Ok(PushOutcome::NotRunning);
        }
        let prices = self.store.snapshot_all();
        self.send(prices).await
    }

    async fn send(&self, prices: PriceMap) -> Result<PushOutcome, SyncError> {
        if prices.is_empty() {
            log::info!("Nothing to send to peer");
            return Ok(PushOutcome::NothingToSend);
        }

        let mut message = wire::encode(&prices)?;
        message.push('\n');

        let mut outbound = self.outbound.lock().await;
        let mut stream = match outbound.take() {
            Some(stream) => stream,
            None => connect(self.peer_addr).await?,
        };

        match timeout(SEND_TIMEOUT, stream.write_all(message.as_bytes())).await {
            Ok(Ok(())) => {
                *outbound = Some(stream);
                log::info!(
                    "Sent price update for {} item(s) to {}",
                    prices.len(),
                    self.peer_addr
                );
                log::debug!("Sent price update -> {}", message.trim_end());
                Ok(PushOutcome::Sent(prices.len()))
            }
            // The stream is dropped here; the next push reconnects
            Ok(Err(e)) => {
                log::warn!("Error sending prices to {}: {}", self.peer_addr, e);
                Err(e.into())
            }
            Err(_) => {
                log::warn!("Timed out sending prices to {}", self.peer_addr);
                Err(io::Error::new(io::ErrorKind::TimedOut, "send timed out").into())
            }
        }
    }

    /// Stop the receive task and close both channels
    pub async fn shutdown(&self) {
        log::info!("Shutting down sync agent...");
        self.running.store(false, Ordering::Release);

        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = receiver {
            let abort = handle.abort_handle();
            match timeout(JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("Sync receive task ended abnormally: {}", e),
                Err(_) => {
                    log::warn!("Sync receive task did not stop in time, aborting");
                    abort.abort();
                }
            }
        }

        self.outbound.lock().await.take();
        log::info!("Sync agent shut down");
    }
}

impl Drop for SyncAgent {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

async fn resolve(addr: &str) -> Result<SocketAddr, SyncError> {
    let mut addrs = tokio::net::lookup_host(addr)
        .await
        .map_err(|_| SyncError::Resolve(addr.to_string()))?;
    addrs
        .next()
        .ok_or_else(|| SyncError::Resolve(addr.to_string()))
}

async fn connect(addr: SocketAddr) -> io::Result<TcpStream> {
    match timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connect to {} timed out", addr),
        )),
    }
}

enum Event {
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Line(io::Result<Option<String>>),
    Idle,
}

/// Receive messages until the running flag is cleared
///
/// Only one inbound connection is read at a time; a newer connection from
/// the peer replaces the current one.
async fn receive_loop(listener: TcpListener, store: Arc<CatalogStore>, running: Arc<AtomicBool>) {
    let mut inbound: Option<Lines<BufReader<TcpStream>>> = None;

    while running.load(Ordering::Acquire) {
        let event = match inbound.as_mut() {
            Some(lines) => tokio::select! {
                accepted = listener.accept() => Event::Accepted(accepted),
                line = lines.next_line() => Event::Line(line),
                _ = sleep(RECV_POLL) => Event::Idle,
            },
            None => tokio::select! {
                accepted = listener.accept() => Event::Accepted(accepted),
                _ = sleep(RECV_POLL) => Event::Idle,
            },
        };

        match event {
            Event::Accepted(Ok((stream, addr))) => {
                log::info!("Peer connected from {}", addr);
                inbound = Some(BufReader::new(stream).lines());
            }
            Event::Accepted(Err(e)) => log::warn!("Failed to accept peer connection: {}", e),
            Event::Line(Ok(Some(line))) => handle_message(&store, &line).await,
            Event::Line(Ok(None)) => {
                log::info!("Peer closed sync connection");
                inbound = None;
            }
            Event::Line(Err(e)) => {
                log::warn!("Error reading from peer, dropping connection: {}", e);
                inbound = None;
            }
            Event::Idle => {}
        }

        sleep(RECV_YIELD).await;
    }

    log::debug!("Sync receive loop stopped");
}

async fn handle_message(store: &Arc<CatalogStore>, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let prices = match wire::decode(line) {
        Ok(prices) => prices,
        Err(e) => {
            log::warn!("Dropping malformed sync message: {}", e);
            return;
        }
    };
    log::info!("Received price update for {} item(s)", prices.len());
    log::debug!("Received price update -> {}", line);

    // merge_remote persists the whole catalog
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || store.merge_remote(&prices)).await {
        Ok(report) if !report.unknown.is_empty() => {
            log::debug!("Peer sent {} unknown item(s)", report.unknown.len());
        }
        Ok(_) => {}
        Err(e) => log::warn!("Merging peer prices failed: {}", e),
    }
}
