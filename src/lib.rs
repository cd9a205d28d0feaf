pub mod cli;
pub mod config;
pub mod data_paths;
pub use data_paths as data;
pub mod impact;
pub mod logging;
pub mod slippage;
pub mod trader;
pub mod ws;

pub use trader::Trader;
pub use ws::{ConnectionId, ConnectionStatus, WsEndpoint};
