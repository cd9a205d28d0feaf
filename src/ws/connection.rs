//! Per-connection state: status machine, message records, snapshots

use std::fmt;

use tracing::debug;

/// Width of the `SENT: ` / `RECV: ` prefix on rendered message records.
pub const MESSAGE_TAG_LEN: usize = 6;

/// Opaque handle for one websocket session within a registry instance.
/// Strictly increasing, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl ConnectionId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a connection. `Failed` and `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Failed,
    Closed,
}

impl ConnectionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }

    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Open)
                | (Self::Connecting, Self::Failed)
                | (Self::Open, Self::Closed)
        )
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connecting => "Connecting",
            Self::Open => "Open",
            Self::Failed => "Failed",
            Self::Closed => "Closed",
        };
        f.write_str(label)
    }
}

/// Whether a message record was sent by us or received from the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    /// Fixed-width rendering prefix, shared by the outbound log and the
    /// latest-message slot.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Sent => "SENT: ",
            Self::Received => "RECV: ",
        }
    }
}

/// One logged message. Text payloads are stored verbatim; binary payloads are
/// hex-encoded before they get here — the slot is diagnostic, not a
/// transport-faithful byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub direction: Direction,
    pub payload: String,
}

impl MessageRecord {
    pub fn sent(payload: impl Into<String>) -> Self {
        Self {
            direction: Direction::Sent,
            payload: payload.into(),
        }
    }

    pub fn received(payload: impl Into<String>) -> Self {
        Self {
            direction: Direction::Received,
            payload: payload.into(),
        }
    }
}

impl fmt::Display for MessageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.direction.tag(), self.payload)
    }
}

/// Lifecycle callbacks for one connection, invoked by the transport driver on
/// the IO thread. Implemented once by the registry's record-backed observer.
pub trait ConnectionObserver: Send + 'static {
    fn on_open(&self, server: Option<&str>);
    fn on_fail(&self, reason: &str);
    fn on_close(&self, code: Option<u16>, reason: &str);
    fn on_message(&self, message: MessageRecord);
}

/// State container for one connection. Lives in the registry's map; written by
/// the IO thread through the observer, read by the consumer thread as cloned
/// snapshots. The map's per-entry locking is the synchronization boundary.
#[derive(Debug)]
pub struct ConnectionRecord {
    id: ConnectionId,
    status: ConnectionStatus,
    uri: String,
    server: Option<String>,
    error_reason: Option<String>,
    sent_log: Vec<MessageRecord>,
    latest_message: Option<MessageRecord>,
}

impl ConnectionRecord {
    pub(crate) fn new(id: ConnectionId, uri: &str) -> Self {
        Self {
            id,
            status: ConnectionStatus::Connecting,
            uri: uri.to_owned(),
            server: None,
            error_reason: None,
            sent_log: Vec::new(),
            latest_message: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn latest_message(&self) -> Option<&MessageRecord> {
        self.latest_message.as_ref()
    }

    /// Every sent message, in send order. Never purged.
    pub fn sent_log(&self) -> &[MessageRecord] {
        &self.sent_log
    }

    fn transition(&mut self, next: ConnectionStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            debug!(id = %self.id, from = %self.status, to = %next, "ignoring status transition");
            false
        }
    }

    pub(crate) fn mark_open(&mut self, server: Option<&str>) {
        if self.transition(ConnectionStatus::Open) {
            self.server = server.map(str::to_owned);
        }
    }

    pub(crate) fn mark_failed(&mut self, reason: &str) {
        if self.transition(ConnectionStatus::Failed) {
            self.error_reason = Some(reason.to_owned());
        }
    }

    pub(crate) fn mark_closed(&mut self, code: Option<u16>, reason: &str) {
        if self.transition(ConnectionStatus::Closed) {
            self.error_reason = Some(match code {
                Some(code) => format!("close code: {code}, close reason: {reason}"),
                None => reason.to_owned(),
            });
        }
    }

    /// Overwrite the latest-message slot. Single slot by design: only the
    /// newest frame is retained between polls.
    pub(crate) fn store_inbound(&mut self, message: MessageRecord) {
        self.latest_message = Some(message);
    }

    pub(crate) fn push_sent(&mut self, payload: &str) {
        self.sent_log.push(MessageRecord::sent(payload));
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            status: self.status,
            uri: self.uri.clone(),
            server: self.server.clone(),
            error_reason: self.error_reason.clone(),
            latest_message: self.latest_message.clone(),
        }
    }
}

/// Read-only view of a connection handed to the consumer thread.
#[derive(Debug, Clone)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    pub uri: String,
    pub server: Option<String>,
    pub error_reason: Option<String>,
    pub latest_message: Option<MessageRecord>,
}

impl fmt::Display for ConnectionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "> URI: {}", self.uri)?;
        writeln!(f, "> Status: {}", self.status)?;
        writeln!(
            f,
            "> Remote Server: {}",
            self.server.as_deref().unwrap_or("None Specified")
        )?;
        writeln!(
            f,
            "> Error/close reason: {}",
            self.error_reason.as_deref().unwrap_or("N/A")
        )?;
        match &self.latest_message {
            Some(message) => writeln!(f, "> Latest message: {message}"),
            None => writeln!(f, "> Latest message: N/A"),
        }
    }
}
