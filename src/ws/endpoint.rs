//! Connection registry and the dedicated IO thread

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::runtime;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

use super::connection::{
    ConnectionId, ConnectionObserver, ConnectionRecord, ConnectionSnapshot, ConnectionStatus,
    MessageRecord,
};
use super::transport::{self, ConnCommand};

/// Close code sent to open connections during shutdown (RFC 6455 "going away").
pub const CLOSE_GOING_AWAY: u16 = 1001;

#[derive(Error, Debug)]
pub enum WsError {
    #[error("invalid websocket url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("no connection found with id {0}")]
    ConnectionNotFound(ConnectionId),
    #[error("connection {id} is not open (status: {status})")]
    NotOpen {
        id: ConnectionId,
        status: ConnectionStatus,
    },
    #[error("transport send failed: {0}")]
    SendFailed(String),
    #[error("endpoint event loop has stopped")]
    EventLoopStopped,
}

/// Endpoint tuning knobs.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// How long shutdown waits for in-flight sessions to finish their close
    /// handshakes before aborting them.
    pub shutdown_grace: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            shutdown_grace: Duration::from_secs(3),
        }
    }
}

enum EndpointCommand {
    Connect {
        id: ConnectionId,
        uri: String,
        commands: mpsc::UnboundedReceiver<ConnCommand>,
    },
    Shutdown,
}

struct ConnectionEntry {
    record: ConnectionRecord,
    commands: mpsc::UnboundedSender<ConnCommand>,
}

type ConnectionMap = DashMap<ConnectionId, ConnectionEntry>;

/// Registry of websocket connections. Owns the id space, the record map, and
/// the background IO thread that drives every session.
///
/// All methods are called from the consumer thread and never wait for network
/// completion; lifecycle callbacks run exclusively on the IO thread and reach
/// the records through the shared map. Completion is observed by polling
/// [`get_metadata`](Self::get_metadata) /
/// [`get_latest_message`](Self::get_latest_message).
pub struct WsEndpoint {
    connections: Arc<ConnectionMap>,
    next_id: AtomicU64,
    dispatcher: mpsc::UnboundedSender<EndpointCommand>,
    io_thread: Option<thread::JoinHandle<()>>,
}

impl WsEndpoint {
    pub fn new() -> Self {
        Self::with_config(EndpointConfig::default())
    }

    pub fn with_config(config: EndpointConfig) -> Self {
        let connections: Arc<ConnectionMap> = Arc::new(DashMap::new());
        let (dispatcher, command_rx) = mpsc::unbounded_channel();

        let map = Arc::clone(&connections);
        let io_thread = thread::Builder::new()
            .name("ws-io".to_owned())
            .spawn(move || io_thread_main(command_rx, map, config.shutdown_grace))
            .expect("spawning ws io thread");

        Self {
            connections,
            next_id: AtomicU64::new(0),
            dispatcher,
            io_thread: Some(io_thread),
        }
    }

    /// Start a new connection to `uri`. The id returns immediately; the
    /// handshake completes asynchronously on the IO thread. Every call yields
    /// a fresh id, identical uri or not — deduplication is the caller's
    /// responsibility.
    pub fn connect(&self, uri: &str) -> Result<ConnectionId, WsError> {
        Url::parse(uri)?;

        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        self.connections.insert(
            id,
            ConnectionEntry {
                record: ConnectionRecord::new(id, uri),
                commands: conn_tx,
            },
        );

        let submitted = self.dispatcher.send(EndpointCommand::Connect {
            id,
            uri: uri.to_owned(),
            commands: conn_rx,
        });
        if submitted.is_err() {
            self.connections.remove(&id);
            return Err(WsError::EventLoopStopped);
        }

        debug!(%id, %uri, "connection scheduled");
        Ok(id)
    }

    /// Request an asynchronous close. Unknown ids are a logged no-op; the
    /// record stays in the map either way.
    pub fn close(&self, id: ConnectionId, code: u16, reason: &str) {
        match self.connections.get(&id) {
            None => warn!(%id, "no connection found with id"),
            Some(entry) => {
                let command = ConnCommand::Close {
                    code,
                    reason: reason.to_owned(),
                };
                if entry.commands.send(command).is_err() {
                    debug!(%id, "close requested but session already ended");
                }
            }
        }
    }

    /// Hand a text message to the connection's send path. Blocks only for the
    /// hand-off, never for delivery. The message is appended to the outbound
    /// log once the hand-off succeeds.
    pub fn send(&self, id: ConnectionId, message: &str) -> Result<(), WsError> {
        let mut entry = self
            .connections
            .get_mut(&id)
            .ok_or(WsError::ConnectionNotFound(id))?;

        let status = entry.record.status();
        if status != ConnectionStatus::Open {
            return Err(WsError::NotOpen { id, status });
        }

        entry
            .commands
            .send(ConnCommand::Send(message.to_owned()))
            .map_err(|_| WsError::SendFailed("session has terminated".to_owned()))?;
        entry.record.push_sent(message);
        Ok(())
    }

    /// Read-only snapshot of a connection, or `None` for unknown ids.
    pub fn get_metadata(&self, id: ConnectionId) -> Option<ConnectionSnapshot> {
        self.connections.get(&id).map(|entry| entry.record.snapshot())
    }

    /// Latest received frame for `id`, if any has arrived. Pull, not consume:
    /// repeated polls between arrivals return the same value.
    pub fn get_latest_message(&self, id: ConnectionId) -> Option<MessageRecord> {
        self.connections
            .get(&id)
            .and_then(|entry| entry.record.latest_message().cloned())
    }

    /// Close every open connection, stop the perpetual loop, and join the IO
    /// thread. Blocks until the thread exits; safe to call with zero
    /// connections and safe to call twice.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.io_thread.take() else {
            return;
        };

        for entry in self.connections.iter() {
            if entry.record.status() == ConnectionStatus::Open {
                info!(id = %entry.record.id(), "closing connection");
                let command = ConnCommand::Close {
                    code: CLOSE_GOING_AWAY,
                    reason: "going away".to_owned(),
                };
                if entry.commands.send(command).is_err() {
                    debug!(id = %entry.record.id(), "session already ended");
                }
            }
        }

        let _ = self.dispatcher.send(EndpointCommand::Shutdown);
        if handle.join().is_err() {
            error!("ws io thread panicked during shutdown");
        }
    }
}

impl Default for WsEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WsEndpoint {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Observer bound to one record in the shared map. Every callback runs on the
/// IO thread; records are never removed, so a missing entry only happens
/// after teardown.
struct RecordObserver {
    id: ConnectionId,
    connections: Arc<ConnectionMap>,
}

impl ConnectionObserver for RecordObserver {
    fn on_open(&self, server: Option<&str>) {
        if let Some(mut entry) = self.connections.get_mut(&self.id) {
            entry.record.mark_open(server);
        }
    }

    fn on_fail(&self, reason: &str) {
        warn!(id = %self.id, %reason, "connection failed");
        if let Some(mut entry) = self.connections.get_mut(&self.id) {
            entry.record.mark_failed(reason);
        }
    }

    fn on_close(&self, code: Option<u16>, reason: &str) {
        if let Some(mut entry) = self.connections.get_mut(&self.id) {
            entry.record.mark_closed(code, reason);
        }
    }

    fn on_message(&self, message: MessageRecord) {
        if let Some(mut entry) = self.connections.get_mut(&self.id) {
            entry.record.store_inbound(message);
        }
    }
}

/// Body of the dedicated IO thread: a current-thread runtime driving the
/// perpetual dispatcher. The loop keeps running with zero active connections
/// and only exits on the shutdown command.
fn io_thread_main(
    mut commands: mpsc::UnboundedReceiver<EndpointCommand>,
    connections: Arc<ConnectionMap>,
    grace: Duration,
) {
    let rt = match runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build ws io runtime");
            return;
        }
    };

    rt.block_on(async move {
        let mut sessions = JoinSet::new();

        while let Some(command) = commands.recv().await {
            match command {
                EndpointCommand::Connect { id, uri, commands } => {
                    let observer = RecordObserver {
                        id,
                        connections: Arc::clone(&connections),
                    };
                    sessions.spawn(transport::drive(uri, observer, commands));
                }
                EndpointCommand::Shutdown => break,
            }
        }

        // Give in-flight close handshakes a bounded window, then abort
        // whatever is left (pending handshakes have no other cancel path).
        let drained = tokio::time::timeout(grace, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("shutdown grace elapsed, aborting remaining sessions");
            sessions.shutdown().await;
        }
        info!("ws io loop stopped");
    });
}
