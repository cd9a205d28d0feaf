//! Closed-form Almgren-Chriss market impact model

use serde::{Deserialize, Serialize};

/// Model constants. Impact is expressed as a fraction of notional for a
/// given executed volume in base units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactParams {
    pub eta: f64,
    pub alpha: f64,
    pub gamma: f64,
    pub beta: f64,
}

impl Default for ImpactParams {
    fn default() -> Self {
        Self {
            eta: 0.05,
            alpha: 1.0,
            gamma: 0.05,
            beta: 1.0,
        }
    }
}

impl ImpactParams {
    /// Temporary impact component: `eta * v^alpha`.
    pub fn temporary_impact(&self, volume: f64) -> f64 {
        self.eta * volume.powf(self.alpha)
    }

    /// Permanent impact component: `gamma * v^beta`.
    pub fn permanent_impact(&self, volume: f64) -> f64 {
        self.gamma * volume.powf(self.beta)
    }

    /// Total impact fraction for `volume`.
    pub fn estimate(&self, volume: f64) -> f64 {
        self.temporary_impact(volume) + self.permanent_impact(volume)
    }
}

/// Per-tick cost outputs, all in quote currency.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostBreakdown {
    pub slippage: f64,
    pub market_impact: f64,
    pub fees: f64,
    pub mid_price: f64,
}

impl CostBreakdown {
    pub fn net_cost(&self) -> f64 {
        self.slippage + self.market_impact + self.fees
    }
}
