//! Instrument-level feed subscriptions on top of the connection registry

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::FeedConfig;
use crate::ws::{
    ConnectionId, ConnectionSnapshot, Direction, OrderBookFrame, WsEndpoint, WsError,
};

#[derive(Error, Debug)]
pub enum TraderError {
    #[error("unsupported instrument: {0}")]
    UnknownInstrument(String),
    #[error(transparent)]
    Ws(#[from] WsError),
}

/// Maps instruments to feed connections and exposes typed polling helpers.
/// One live connection per instrument: reconnecting an instrument that is
/// already subscribed returns the existing id.
pub struct Trader {
    endpoint: WsEndpoint,
    feed: FeedConfig,
    subscriptions: HashMap<String, ConnectionId>,
}

impl Trader {
    pub fn new(endpoint: WsEndpoint, feed: FeedConfig) -> Self {
        Self {
            endpoint,
            feed,
            subscriptions: HashMap::new(),
        }
    }

    /// Subscribe to the L2 feed for `instrument`. Fire-and-forget: the id
    /// returns before the handshake completes; poll [`metadata`](Self::metadata)
    /// for the status before relying on the connection.
    pub fn connect(&mut self, instrument: &str) -> Result<ConnectionId, TraderError> {
        if let Some(&id) = self.subscriptions.get(instrument) {
            debug!(%instrument, %id, "instrument already connected");
            return Ok(id);
        }
        if !self.feed.is_allowed(instrument) {
            return Err(TraderError::UnknownInstrument(instrument.to_owned()));
        }

        let uri = self.feed.instrument_uri(instrument);
        let id = self.endpoint.connect(&uri)?;
        info!(%instrument, %id, %uri, "feed subscription started");
        self.subscriptions.insert(instrument.to_owned(), id);
        Ok(id)
    }

    /// Latest book for a connection, parsed from the newest received frame.
    /// `None` until a parseable frame has arrived.
    pub fn latest_book(&self, id: ConnectionId) -> Option<OrderBookFrame> {
        let message = self.endpoint.get_latest_message(id)?;
        if message.direction != Direction::Received {
            return None;
        }
        match OrderBookFrame::parse(&message.payload) {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!(%id, error = %e, "latest frame is not an order book");
                None
            }
        }
    }

    pub fn metadata(&self, id: ConnectionId) -> Option<ConnectionSnapshot> {
        self.endpoint.get_metadata(id)
    }

    pub fn endpoint(&self) -> &WsEndpoint {
        &self.endpoint
    }

    /// Close all connections and join the IO thread. Also runs on drop via
    /// the endpoint.
    pub fn shutdown(&mut self) {
        self.endpoint.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::EndpointConfig;
    use std::time::Duration;

    /// Point at a closed local port so tests never resolve the real feed.
    fn feed() -> FeedConfig {
        FeedConfig {
            base_url: "ws://127.0.0.1:1/feed".to_owned(),
            ..FeedConfig::default()
        }
    }

    fn endpoint() -> WsEndpoint {
        WsEndpoint::with_config(EndpointConfig {
            shutdown_grace: Duration::from_millis(200),
        })
    }

    #[test]
    fn test_unknown_instrument_is_rejected() {
        let mut trader = Trader::new(endpoint(), feed());
        assert!(matches!(
            trader.connect("DOGE"),
            Err(TraderError::UnknownInstrument(name)) if name == "DOGE"
        ));
    }

    #[test]
    fn test_connect_deduplicates_by_instrument() {
        let mut trader = Trader::new(endpoint(), feed());
        let first = trader.connect("BTC").unwrap();
        let again = trader.connect("BTC").unwrap();
        assert_eq!(first, again);

        let other = trader.connect("ETH").unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn test_metadata_reports_connecting_immediately() {
        let mut trader = Trader::new(endpoint(), feed());
        let id = trader.connect("BTC").unwrap();
        let meta = trader.metadata(id).unwrap();
        assert!(meta.uri.contains("BTC-USDT-SWAP"));
    }
}
