//! Runtime configuration with defaults matching the production endpoints

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::impact::ImpactParams;

/// Fee tiers, percent of notional (tier 1 first).
pub const FEE_TIERS_PCT: [f64; 5] = [0.5, 0.4, 0.3, 0.2, 0.1];

/// Where and how to reach the L2 order-book feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Feed base URL, up to and including the exchange path.
    pub base_url: String,
    /// Quote currency appended to the instrument in the stream name.
    pub quote: String,
    /// Instruments accepted by [`is_allowed`](Self::is_allowed).
    pub allowed_instruments: Vec<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "wss://ws.gomarket-cpp.goquant.io/ws/l2-orderbook/okx".to_string(),
            quote: "USDT".to_string(),
            allowed_instruments: vec!["BTC".to_string(), "ETH".to_string()],
        }
    }
}

impl FeedConfig {
    pub fn is_allowed(&self, instrument: &str) -> bool {
        self.allowed_instruments.iter().any(|i| i == instrument)
    }

    /// Stream URI for one instrument: `<base>/<INSTRUMENT>-<QUOTE>-SWAP`.
    pub fn instrument_uri(&self, instrument: &str) -> String {
        format!(
            "{}/{}-{}-SWAP",
            self.base_url.trim_end_matches('/'),
            instrument,
            self.quote
        )
    }
}

/// The local slippage model server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlippageConfig {
    pub addr: String,
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:9000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub slippage: SlippageConfig,
    pub impact: ImpactParams,
}

impl AppConfig {
    /// Load from a YAML file; missing keys fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_feed() {
        let feed = FeedConfig::default();
        assert!(feed.base_url.starts_with("wss://"));
        assert!(feed.is_allowed("BTC"));
        assert!(feed.is_allowed("ETH"));
        assert!(!feed.is_allowed("DOGE"));
    }

    #[test]
    fn test_instrument_uri_shape() {
        let feed = FeedConfig::default();
        assert_eq!(
            feed.instrument_uri("BTC"),
            "wss://ws.gomarket-cpp.goquant.io/ws/l2-orderbook/okx/BTC-USDT-SWAP"
        );

        let trailing_slash = FeedConfig {
            base_url: "wss://feed.example/ws/".to_string(),
            ..FeedConfig::default()
        };
        assert_eq!(
            trailing_slash.instrument_uri("ETH"),
            "wss://feed.example/ws/ETH-USDT-SWAP"
        );
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let config: AppConfig =
            serde_yaml::from_str("feed:\n  quote: USDC\nimpact:\n  eta: 0.07\n").unwrap();
        assert_eq!(config.feed.quote, "USDC");
        assert_eq!(config.feed.allowed_instruments, vec!["BTC", "ETH"]);
        assert_eq!(config.impact.eta, 0.07);
        assert_eq!(config.impact.alpha, 1.0);
        assert_eq!(config.slippage.addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tradecost.yaml");
        std::fs::write(&path, "slippage:\n  addr: 127.0.0.1:9100\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.slippage.addr, "127.0.0.1:9100");

        assert!(AppConfig::from_file(dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_fee_tiers_descend() {
        for pair in FEE_TIERS_PCT.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }
}
