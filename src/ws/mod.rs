//! WebSocket connection manager for streaming market data
//!
//! This module provides:
//! - A connection registry with a dedicated IO thread ([`WsEndpoint`])
//! - Per-connection lifecycle tracking as an explicit state machine
//! - Poll-based access to the latest inbound frame (latest value wins)
//! - Order-book payload models for the L2 feed

pub mod connection;
pub mod endpoint;
pub mod events;
mod tls;
mod transport;

pub use connection::{
    ConnectionId, ConnectionObserver, ConnectionSnapshot, ConnectionStatus, Direction,
    MessageRecord, MESSAGE_TAG_LEN,
};
pub use endpoint::{EndpointConfig, WsEndpoint, WsError, CLOSE_GOING_AWAY};
pub use events::{EventError, OrderBookFrame, PriceLevel};
