//! Strategy decoder
//!
//! Turns significant book walls into candidate setups. A bid wall is
//! treated as support (long off it), an ask wall as resistance (short
//! off it). Both may be proposed at once.

use argus_core::BookLevel;
use argus_surveillance::BookAnalysis;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Wall significance = average level volume x this
    pub wall_multiplier: f64,
    /// Entry buffer away from the wall, in spreads
    pub entry_buffer_spreads: f64,
    /// Invalidation distance behind the wall, in spreads
    pub invalidation_spreads: f64,
    /// Entries further than this from price (percent) are skipped
    pub max_entry_distance_pct: f64,
    /// Target distance (percent) when there is no opposing wall
    pub fallback_target_pct: f64,
    pub min_spread: f64,
    pub strength_scale: f64,
    pub max_strength: f64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            wall_multiplier: 3.5,
            entry_buffer_spreads: 1.5,
            invalidation_spreads: 3.0,
            max_entry_distance_pct: 5.0,
            fallback_target_pct: 0.5,
            min_spread: 0.01,
            strength_scale: 60.0,
            max_strength: 99.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryZone {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSetup {
    pub direction: Direction,
    pub entry_zone: EntryZone,
    pub entry: f64,
    pub invalidation: f64,
    /// Halfway to the final target
    pub target1: f64,
    pub target2: f64,
    pub strength: f64,
    pub risk_reward: f64,
    pub reason: String,
}

/// Stateless setup decoder
#[derive(Debug, Clone, Default)]
pub struct StrategyDecoder {
    config: DecoderConfig,
}

impl StrategyDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode setups from an analyzed book.
    ///
    /// `average_volume` is the mean level quantity; `price` the current
    /// trade (or mid) price. Non-positive inputs yield no setups.
    pub fn decode(&self, analysis: &BookAnalysis, price: f64, average_volume: f64) -> Vec<TradeSetup> {
        let cfg = &self.config;
        if !(price > 0.0 && price.is_finite()) || !(average_volume > 0.0 && average_volume.is_finite()) {
            return Vec::new();
        }
        let (Some(best_bid), Some(best_ask)) = (analysis.best_bid(), analysis.best_ask()) else {
            return Vec::new();
        };

        let threshold = average_volume * cfg.wall_multiplier;
        let support = first_wall(&analysis.bids, threshold);
        let resistance = first_wall(&analysis.asks, threshold);
        let spread = (best_ask - best_bid).abs().max(cfg.min_spread);

        let mut setups = Vec::new();

        if let Some(wall) = support {
            let entry = wall.price + cfg.entry_buffer_spreads * spread;
            if self.within_reach(entry, price) {
                let invalidation = wall.price - cfg.invalidation_spreads * spread;
                let target = match resistance {
                    Some(r) => r.price - cfg.entry_buffer_spreads * spread,
                    None => price * (1.0 + cfg.fallback_target_pct / 100.0),
                };
                setups.push(TradeSetup {
                    direction: Direction::Long,
                    entry_zone: EntryZone {
                        low: wall.price,
                        high: entry,
                    },
                    entry,
                    invalidation,
                    target1: (entry + target) / 2.0,
                    target2: target,
                    strength: self.strength(wall.quantity, threshold),
                    risk_reward: risk_reward(target - entry, entry - invalidation),
                    reason: format!("Bid wall {} @ {} defends longs", wall.quantity, wall.price),
                });
            }
        }

        if let Some(wall) = resistance {
            let entry = wall.price - cfg.entry_buffer_spreads * spread;
            if self.within_reach(entry, price) {
                let invalidation = wall.price + cfg.invalidation_spreads * spread;
                let target = match support {
                    Some(s) => s.price + cfg.entry_buffer_spreads * spread,
                    None => price * (1.0 - cfg.fallback_target_pct / 100.0),
                };
                setups.push(TradeSetup {
                    direction: Direction::Short,
                    entry_zone: EntryZone {
                        low: entry,
                        high: wall.price,
                    },
                    entry,
                    invalidation,
                    target1: (entry + target) / 2.0,
                    target2: target,
                    strength: self.strength(wall.quantity, threshold),
                    risk_reward: risk_reward(entry - target, invalidation - entry),
                    reason: format!("Ask wall {} @ {} caps shorts", wall.quantity, wall.price),
                });
            }
        }

        setups
    }

    fn within_reach(&self, entry: f64, price: f64) -> bool {
        (entry - price).abs() / price <= self.config.max_entry_distance_pct / 100.0
    }

    fn strength(&self, quantity: f64, threshold: f64) -> f64 {
        (quantity / threshold * self.config.strength_scale).min(self.config.max_strength)
    }
}

/// Nearest-to-touch level above the significance threshold
fn first_wall(levels: &[BookLevel], threshold: f64) -> Option<&BookLevel> {
    levels.iter().find(|l| l.quantity > threshold)
}

fn risk_reward(reward: f64, risk: f64) -> f64 {
    let risk = risk.abs();
    if risk > 0.0 { reward / risk } else { 0.0 }
}
