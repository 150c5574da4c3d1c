//! Market context derived from the tape
//!
//! Tracks the rolling swing high/low and the speed of signed aggressor
//! volume. Both feed the fusion engine.

use argus_core::{RollingWindow, TimestampMs, TradeTick};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Trade prices considered for the swing high/low
    pub swing_window: usize,
    /// Distance from a swing extreme (percent of price) that counts as "at" it
    pub swing_proximity_pct: f64,
    /// Prices required before swing levels are reported
    pub swing_min_trades: usize,
    /// Trailing window for delta speed
    pub delta_window_ms: i64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            swing_window: 200,
            swing_proximity_pct: 0.1,
            swing_min_trades: 20,
            delta_window_ms: 1_000,
        }
    }
}

/// Swing extremes over the rolling price window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingLevels {
    pub high: f64,
    pub low: f64,
}

/// Per-instrument market context
#[derive(Debug, Clone)]
pub struct MarketContext {
    config: ContextConfig,
    prices: RollingWindow,
    deltas: VecDeque<(TimestampMs, f64)>,
    delta_sum: f64,
    last_price: Option<f64>,
}

impl MarketContext {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            prices: RollingWindow::new(config.swing_window),
            config,
            deltas: VecDeque::new(),
            delta_sum: 0.0,
            last_price: None,
        }
    }

    pub fn on_trade(&mut self, tick: &TradeTick) {
        if tick.validate().is_err() {
            return;
        }
        self.prices.push(tick.price);
        self.last_price = Some(tick.price);

        let now = tick.exchange_timestamp_ms;
        self.deltas.push_back((now, tick.signed_quantity()));
        self.delta_sum += tick.signed_quantity();

        while let Some(&(ts, delta)) = self.deltas.front() {
            if now.saturating_sub(ts) < self.config.delta_window_ms {
                break;
            }
            self.delta_sum -= delta;
            self.deltas.pop_front();
        }
        if self.deltas.is_empty() {
            self.delta_sum = 0.0;
        }
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    /// Swing high/low once enough prices have been seen
    pub fn swing_levels(&self) -> Option<SwingLevels> {
        if self.prices.len() < self.config.swing_min_trades.max(1) {
            return None;
        }
        Some(SwingLevels {
            high: self.prices.max()?,
            low: self.prices.min()?,
        })
    }

    pub fn is_at_swing_level(&self) -> bool {
        let (Some(levels), Some(price)) = (self.swing_levels(), self.last_price) else {
            return false;
        };
        let tolerance = price * self.config.swing_proximity_pct / 100.0;
        (levels.high - price).abs() <= tolerance || (price - levels.low).abs() <= tolerance
    }

    /// Net signed aggressor volume in the trailing window
    pub fn net_delta(&self) -> f64 {
        self.delta_sum
    }

    /// |net delta| per second over the trailing window
    pub fn delta_speed(&self) -> f64 {
        if self.config.delta_window_ms <= 0 {
            return 0.0;
        }
        self.delta_sum.abs() * 1_000.0 / self.config.delta_window_ms as f64
    }
}

impl Default for MarketContext {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}
