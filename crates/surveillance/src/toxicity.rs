//! Flow toxicity (VPIN-style)
//!
//! Volume is bucketed by a fixed size. Each closed bucket contributes
//! `|buy - sell|` to a rolling window, and
//!
//! toxicity = Σ window imbalances / (window length × bucket size)
//!
//! Interpretation:
//! ~0.0  → Balanced flow
//! >0.4  → Elevated, one side is leaning
//! >0.7  → Toxic, flow is strongly one-sided

use argus_core::{RollingWindow, TradeTick};
use serde::{Deserialize, Serialize};

/// Toxicity engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToxicityConfig {
    /// Base-asset volume per bucket
    pub bucket_size: f64,
    /// Closed buckets kept in the rolling window
    pub window_length: usize,
    pub elevated_threshold: f64,
    pub toxic_threshold: f64,
}

impl Default for ToxicityConfig {
    fn default() -> Self {
        Self {
            bucket_size: 10.0,
            window_length: 15,
            elevated_threshold: 0.4,
            toxic_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToxicityStatus {
    Stable,
    Elevated,
    Toxic,
}

/// Snapshot of the engine after a bucket closes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToxicityState {
    /// Score in [0, 1]
    pub score: f64,
    pub status: ToxicityStatus,
    pub buckets_filled: usize,
    /// Imbalance of the bucket that just closed
    pub last_imbalance: f64,
}

/// Per-instrument streaming reducer
#[derive(Debug, Clone)]
pub struct ToxicityEngine {
    config: ToxicityConfig,
    buy_volume: f64,
    sell_volume: f64,
    window: RollingWindow,
    last_imbalance: f64,
}

impl ToxicityEngine {
    pub fn new(config: ToxicityConfig) -> Self {
        Self {
            window: RollingWindow::new(config.window_length),
            config,
            buy_volume: 0.0,
            sell_volume: 0.0,
            last_imbalance: 0.0,
        }
    }

    pub fn config(&self) -> &ToxicityConfig {
        &self.config
    }

    /// Record a trade. Returns the new state when it closes a bucket.
    pub fn on_trade(&mut self, tick: &TradeTick) -> Option<ToxicityState> {
        if tick.validate().is_err() {
            return None;
        }
        if tick.is_sell_aggressor {
            self.sell_volume += tick.quantity;
        } else {
            self.buy_volume += tick.quantity;
        }

        if self.buy_volume + self.sell_volume < self.config.bucket_size {
            return None;
        }

        // The bucket closes with everything it received
        let imbalance = (self.buy_volume - self.sell_volume).abs();
        self.window.push(imbalance);
        self.last_imbalance = imbalance;
        self.buy_volume = 0.0;
        self.sell_volume = 0.0;

        Some(self.state())
    }

    pub fn score(&self) -> f64 {
        let denominator = self.config.window_length as f64 * self.config.bucket_size;
        if denominator <= 0.0 {
            return 0.0;
        }
        (self.window.sum() / denominator).clamp(0.0, 1.0)
    }

    pub fn status(&self) -> ToxicityStatus {
        classify(
            self.score(),
            self.config.elevated_threshold,
            self.config.toxic_threshold,
        )
    }

    pub fn state(&self) -> ToxicityState {
        ToxicityState {
            score: self.score(),
            status: self.status(),
            buckets_filled: self.window.len(),
            last_imbalance: self.last_imbalance,
        }
    }

    /// Volume accumulated in the open bucket (buy, sell)
    pub fn open_bucket(&self) -> (f64, f64) {
        (self.buy_volume, self.sell_volume)
    }
}

impl Default for ToxicityEngine {
    fn default() -> Self {
        Self::new(ToxicityConfig::default())
    }
}

fn classify(score: f64, elevated: f64, toxic: f64) -> ToxicityStatus {
    if score > toxic {
        ToxicityStatus::Toxic
    } else if score > elevated {
        ToxicityStatus::Elevated
    } else {
        ToxicityStatus::Stable
    }
}
