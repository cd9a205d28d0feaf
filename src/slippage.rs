//! Blocking request/response client for the local slippage model server
//!
//! The exchange is deliberately primitive, matching the server on the other
//! side: one JSON object out, one `recv` into a fixed buffer back. There is
//! no length prefix, no partial-read handling, and no timeout — a response
//! that does not arrive in a single read fails to decode. Known limitation,
//! not to be papered over here.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::ws::PriceLevel;

/// Upper bound on a single response read, shared with the model server.
pub const MAX_RESPONSE_BUFFER: usize = 16384;

#[derive(Error, Debug)]
pub enum SlippageError {
    #[error("slippage socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode slippage response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("slippage server error: {0}")]
    Server(String),
}

/// Parameters for one `expected_slippage` call.
#[derive(Debug, Clone, Serialize)]
pub struct SlippageRequest {
    pub instrument: String,
    pub order_sz: u32,
    pub fee_pct: f64,
    pub volatility_pct: f64,
    pub asks: Vec<PriceLevel>,
    pub bids: Vec<PriceLevel>,
}

/// The model server's answer.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SlippageEstimate {
    pub mid_price: f64,
    pub predicted_slippage_pct: f64,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'static str,
    params: &'a SlippageRequest,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcReply {
    Ok { result: SlippageEstimate },
    Err { error: String },
}

/// One plaintext TCP session with the model server, reused across ticks.
pub struct SlippageClient {
    stream: TcpStream,
}

impl SlippageClient {
    pub fn connect(addr: impl ToSocketAddrs) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        info!(peer = %stream.peer_addr()?, "connected to slippage server");
        Ok(Self { stream })
    }

    /// Ask the server for an expected-slippage estimate. Blocks for the write
    /// and for exactly one read.
    pub fn expected_slippage(
        &mut self,
        request: &SlippageRequest,
    ) -> Result<SlippageEstimate, SlippageError> {
        let envelope = RpcRequest {
            method: "expected_slippage",
            params: request,
        };
        let encoded = serde_json::to_vec(&envelope)?;
        self.stream.write_all(&encoded)?;

        // Single read; the whole response must arrive in one segment.
        let mut buffer = [0u8; MAX_RESPONSE_BUFFER];
        let n = self.stream.read(&mut buffer)?;
        if n == 0 {
            return Err(SlippageError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "slippage server closed the connection",
            )));
        }
        debug!(bytes = n, "slippage response received");

        match serde_json::from_slice(&buffer[..n])? {
            RpcReply::Ok { result } => Ok(result),
            RpcReply::Err { error } => Err(SlippageError::Server(error)),
        }
    }
}
