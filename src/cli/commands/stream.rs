//! Stream command: the per-tick consumer loop over the feed registry

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;
use rust_decimal::prelude::ToPrimitive;
use tokio::signal;
use tracing::{info, warn};

use crate::config::{AppConfig, FEE_TIERS_PCT};
use crate::data_paths::DataPaths;
use crate::impact::CostBreakdown;
use crate::logging::{init_logging, LogMode, LoggingConfig};
use crate::slippage::{SlippageClient, SlippageRequest};
use crate::trader::Trader;
use crate::ws::{ConnectionStatus, OrderBookFrame, WsEndpoint};

#[derive(Args, Clone)]
pub struct StreamArgs {
    /// Instrument to stream
    #[arg(long, default_value = "BTC")]
    pub instrument: String,

    /// Order size in quote currency
    #[arg(long, default_value = "100")]
    pub order_size: u32,

    /// Fee tier (1-5)
    #[arg(long, default_value = "1")]
    pub tier: usize,

    /// Assumed volatility, percent
    #[arg(long, default_value = "0.1")]
    pub volatility: f64,

    /// Tick interval in milliseconds
    #[arg(long, default_value = "200")]
    pub interval_ms: u64,

    /// Stop after N ticks (0 = run until Ctrl-C)
    #[arg(long, default_value = "0")]
    pub ticks: u64,

    /// Skip the slippage server and report impact + fees only
    #[arg(long)]
    pub no_slippage: bool,
}

pub struct StreamCommand {
    args: StreamArgs,
}

impl StreamCommand {
    pub fn new(args: StreamArgs) -> Self {
        Self { args }
    }

    pub async fn execute(&self, config: AppConfig, data_paths: DataPaths) -> Result<()> {
        init_logging(LoggingConfig::new(LogMode::ConsoleAndFile, data_paths))?;

        let fee_pct = FEE_TIERS_PCT
            .get(self.args.tier.wrapping_sub(1))
            .copied()
            .ok_or_else(|| {
                anyhow::anyhow!("fee tier must be between 1 and {}", FEE_TIERS_PCT.len())
            })?;

        let mut trader = Trader::new(WsEndpoint::new(), config.feed.clone());
        let connection = trader.connect(&self.args.instrument)?;

        let mut slippage = if self.args.no_slippage {
            None
        } else {
            match SlippageClient::connect(&config.slippage.addr) {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!(
                        addr = %config.slippage.addr,
                        error = %e,
                        "slippage server unavailable, continuing without it"
                    );
                    None
                }
            }
        };

        let interval = Duration::from_millis(self.args.interval_ms.max(1));
        let mut tick = 0u64;
        let mut last_status = None;

        loop {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("interrupted");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            let Some(meta) = trader.metadata(connection) else {
                break;
            };

            if last_status != Some(meta.status) {
                info!(
                    status = %meta.status,
                    server = meta.server.as_deref().unwrap_or("N/A"),
                    "connection status"
                );
                if let Some(reason) = &meta.error_reason {
                    warn!(%reason, "connection diagnostic");
                }
                last_status = Some(meta.status);
            }

            match meta.status {
                ConnectionStatus::Failed | ConnectionStatus::Closed => break,
                ConnectionStatus::Connecting => continue,
                ConnectionStatus::Open => {}
            }

            if let Some(book) = trader.latest_book(connection) {
                if !book.is_empty() {
                    if let Some(costs) = self.estimate_tick(&config, fee_pct, slippage.as_mut(), &book)
                    {
                        self.print_tick(&costs);
                    }
                }
            }

            tick += 1;
            if self.args.ticks > 0 && tick >= self.args.ticks {
                break;
            }
        }

        trader.shutdown();
        Ok(())
    }

    /// Combine the live book, the model server's slippage estimate, and the
    /// closed-form impact into one cost breakdown. Slippage errors degrade to
    /// a book-derived mid price rather than ending the loop.
    fn estimate_tick(
        &self,
        config: &AppConfig,
        fee_pct: f64,
        slippage: Option<&mut SlippageClient>,
        book: &OrderBookFrame,
    ) -> Option<CostBreakdown> {
        let order_size = f64::from(self.args.order_size);

        let (mid_price, slippage_pct) = match slippage {
            Some(client) => {
                let request = SlippageRequest {
                    instrument: self.args.instrument.clone(),
                    order_sz: self.args.order_size,
                    fee_pct,
                    volatility_pct: self.args.volatility,
                    asks: book.asks.clone(),
                    bids: book.bids.clone(),
                };
                match client.expected_slippage(&request) {
                    Ok(estimate) => (estimate.mid_price, estimate.predicted_slippage_pct),
                    Err(e) => {
                        warn!(error = %e, "slippage request failed");
                        (book.mid_price()?.to_f64()?, 0.0)
                    }
                }
            }
            None => (book.mid_price()?.to_f64()?, 0.0),
        };

        if mid_price <= 0.0 {
            return None;
        }

        let volume = order_size / mid_price;
        let impact_pct = config.impact.estimate(volume);

        Some(CostBreakdown {
            slippage: (slippage_pct * 0.01) * order_size,
            market_impact: impact_pct * order_size,
            fees: (fee_pct * 0.01) * order_size,
            mid_price,
        })
    }

    fn print_tick(&self, costs: &CostBreakdown) {
        println!(
            "{} mid {:>10.2} | slippage {:>8.4} | impact {:>8.4} | fees {:>8.4} | net {}",
            self.args.instrument.bold(),
            costs.mid_price,
            costs.slippage.yellow(),
            costs.market_impact.yellow(),
            costs.fees.yellow(),
            format!("{:.4}", costs.net_cost()).green().bold()
        );
    }
}
