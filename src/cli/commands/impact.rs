//! Impact command: evaluate the closed-form model offline

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;

use crate::config::AppConfig;
use crate::impact::ImpactParams;

#[derive(Args, Clone)]
pub struct ImpactArgs {
    /// Traded volume in base units
    #[arg(long)]
    pub volume: f64,

    /// Override the temporary impact coefficient
    #[arg(long)]
    pub eta: Option<f64>,

    /// Override the temporary impact exponent
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Override the permanent impact coefficient
    #[arg(long)]
    pub gamma: Option<f64>,

    /// Override the permanent impact exponent
    #[arg(long)]
    pub beta: Option<f64>,
}

pub struct ImpactCommand {
    args: ImpactArgs,
}

impl ImpactCommand {
    pub fn new(args: ImpactArgs) -> Self {
        Self { args }
    }

    pub async fn execute(&self, config: AppConfig) -> Result<()> {
        let params = ImpactParams {
            eta: self.args.eta.unwrap_or(config.impact.eta),
            alpha: self.args.alpha.unwrap_or(config.impact.alpha),
            gamma: self.args.gamma.unwrap_or(config.impact.gamma),
            beta: self.args.beta.unwrap_or(config.impact.beta),
        };
        let volume = self.args.volume;

        println!(
            "temporary = {:.6}  (eta {} * v^{})",
            params.temporary_impact(volume).yellow(),
            params.eta,
            params.alpha
        );
        println!(
            "permanent = {:.6}  (gamma {} * v^{})",
            params.permanent_impact(volume).yellow(),
            params.gamma,
            params.beta
        );
        println!(
            "total     = {}",
            format!("{:.6}", params.estimate(volume)).green().bold()
        );

        Ok(())
    }
}
