//! Order-book frame payloads for the L2 feed

use rust_decimal::Decimal;
use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("invalid frame format: {0}")]
    InvalidFormat(#[from] serde_json::Error),
}

/// One aggregated price level. On the wire a level is an array whose first two
/// elements are price and size; some venues append depth fields, which are
/// ignored on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

impl Serialize for PriceLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.price)?;
        seq.serialize_element(&self.size)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for PriceLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LevelVisitor;

        impl<'de> Visitor<'de> for LevelVisitor {
            type Value = PriceLevel;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("an array with price and size as its first two elements")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let price: Decimal = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let size: Decimal = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                // Drain trailing elements (liquidation count, order count, ...).
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(PriceLevel::new(price, size))
            }
        }

        deserializer.deserialize_seq(LevelVisitor)
    }
}

/// One inbound frame: the current book for a single instrument. Level order
/// and pricing semantics are defined upstream and not validated here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBookFrame {
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
}

impl OrderBookFrame {
    /// Parse a raw frame payload.
    pub fn parse(payload: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(payload)?)
    }

    pub fn is_empty(&self) -> bool {
        self.asks.is_empty() || self.bids.is_empty()
    }

    /// Best (highest) bid.
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.iter().max_by_key(|level| level.price).copied()
    }

    /// Best (lowest) ask.
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.iter().min_by_key(|level| level.price).copied()
    }

    /// Midpoint of the best bid and ask.
    pub fn mid_price(&self) -> Option<Decimal> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some((bid.price + ask.price) / Decimal::from(2))
    }
}
