//! Price simulator configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::adapter::outbound::random::{RandomWalk, WalkParams};
use crate::application::SimulatorSettings;
use crate::error::Result;
use crate::port::PriceModel;

/// `[simulator]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Lower bound of the per-tick drift draw.
    #[serde(default = "default_trend_min")]
    pub trend_min: f64,
    /// Upper bound of the per-tick drift draw.
    #[serde(default = "default_trend_max")]
    pub trend_max: f64,
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    #[serde(default = "default_min_price")]
    pub min_price: i64,
    /// Extra attempts per product on a busy store.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed RNG seed for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_trend_min() -> f64 {
    -0.005
}

const fn default_trend_max() -> f64 {
    0.005
}

const fn default_volatility() -> f64 {
    0.02
}

const fn default_min_price() -> i64 {
    1
}

const fn default_max_retries() -> u32 {
    3
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            trend_min: default_trend_min(),
            trend_max: default_trend_max(),
            volatility: default_volatility(),
            min_price: default_min_price(),
            max_retries: default_max_retries(),
            seed: None,
        }
    }
}

impl SimulatorConfig {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[must_use]
    pub fn settings(&self) -> SimulatorSettings {
        SimulatorSettings {
            tick_interval: self.tick_interval(),
            max_retries: self.max_retries,
        }
    }

    /// Walk parameters with `dt` equal to the tick interval in seconds.
    #[must_use]
    pub fn walk_params(&self) -> WalkParams {
        WalkParams {
            trend_min: self.trend_min,
            trend_max: self.trend_max,
            volatility: self.volatility,
            dt: self.tick_interval().as_secs_f64(),
            min_price: self.min_price,
        }
    }

    /// Build the configured price model, seeded if a seed is set.
    ///
    /// # Errors
    /// Returns a config error for out-of-range walk parameters.
    pub fn price_model(&self) -> Result<Box<dyn PriceModel>> {
        let params = self.walk_params();
        let walk = match self.seed {
            Some(seed) => RandomWalk::with_seed(params, seed)?,
            None => RandomWalk::new(params)?,
        };
        Ok(Box::new(walk))
    }
}
