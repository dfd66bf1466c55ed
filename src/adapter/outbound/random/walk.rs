//! Geometric Brownian motion price walk.
//!
//! Each step draws a trend from `Uniform[trend_min, trend_max]` and noise from
//! the standard normal, then applies
//! `p' = p * (1 + trend * dt + volatility * sqrt(dt) * noise)`,
//! rounded to the nearest integer and floored at `min_price`.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal, Uniform};

use crate::error::{ConfigError, Result};
use crate::port::PriceModel;

/// Parameters of the walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkParams {
    pub trend_min: f64,
    pub trend_max: f64,
    pub volatility: f64,
    /// Tick length in seconds.
    pub dt: f64,
    /// Prices never drop below this.
    pub min_price: i64,
}

impl Default for WalkParams {
    fn default() -> Self {
        Self {
            trend_min: -0.005,
            trend_max: 0.005,
            volatility: 0.02,
            dt: 1.0,
            min_price: 1,
        }
    }
}

impl WalkParams {
    fn validate(&self) -> Result<()> {
        if !(self.trend_min.is_finite() && self.trend_max.is_finite())
            || self.trend_min > self.trend_max
        {
            return Err(ConfigError::InvalidValue {
                field: "trend_min",
                reason: "trend bounds must be finite with trend_min <= trend_max".to_string(),
            }
            .into());
        }
        if !self.volatility.is_finite() || self.volatility < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "volatility",
                reason: "must be 0 or greater".to_string(),
            }
            .into());
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "tick_interval_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.min_price < 1 {
            return Err(ConfigError::InvalidValue {
                field: "min_price",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// One deterministic step given already-drawn `trend` and `noise`.
    #[must_use]
    pub fn step(&self, current: i64, trend: f64, noise: f64) -> i64 {
        let factor = 1.0 + trend * self.dt + self.volatility * self.dt.sqrt() * noise;
        let next = (current as f64 * factor).round();

        if !next.is_finite() || next < self.min_price as f64 {
            self.min_price
        } else if next >= i64::MAX as f64 {
            i64::MAX
        } else {
            next as i64
        }
    }
}

/// Random walk price model backed by a seedable RNG.
#[derive(Debug)]
pub struct RandomWalk {
    params: WalkParams,
    trend: Uniform<f64>,
    rng: StdRng,
}

impl RandomWalk {
    /// Walk seeded from OS entropy.
    ///
    /// # Errors
    /// Returns a config error when the parameters are out of range.
    pub fn new(params: WalkParams) -> Result<Self> {
        Self::with_rng(params, StdRng::from_entropy())
    }

    /// Reproducible walk for a fixed seed.
    ///
    /// # Errors
    /// Returns a config error when the parameters are out of range.
    pub fn with_seed(params: WalkParams, seed: u64) -> Result<Self> {
        Self::with_rng(params, StdRng::seed_from_u64(seed))
    }

    fn with_rng(params: WalkParams, rng: StdRng) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            trend: Uniform::new_inclusive(params.trend_min, params.trend_max),
            rng,
        })
    }

    #[must_use]
    pub fn params(&self) -> &WalkParams {
        &self.params
    }
}

impl PriceModel for RandomWalk {
    fn next_price(&mut self, current: i64) -> i64 {
        let trend = self.trend.sample(&mut self.rng);
        let noise: f64 = StandardNormal.sample(&mut self.rng);
        self.params.step(current, trend, noise)
    }
}
