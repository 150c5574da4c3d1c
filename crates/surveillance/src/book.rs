//! Order book analysis
//!
//! Diffs each snapshot against the previous one for the same instrument to
//! find pulled depth (spoofing) and stacked depth (layering), then derives
//! pressure, whale levels, the dominant wall and a liquidity-void flag.
//!
//! Only the immediately previous snapshot is kept, so a lost or duplicated
//! snapshot degrades one cycle and heals on the next.

use argus_core::{BookLevel, BookSnapshot, PriceKey, TimestampMs};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const EPSILON: f64 = 1e-9;

/// Book analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    /// Levels per side used for pressure, depth and void checks
    pub depth_levels: usize,
    /// Quantity drop (fraction of previous) that marks a level as pulled
    pub spoof_pull_ratio: f64,
    /// Quantity growth (multiple of previous) that counts as added depth
    pub add_ratio: f64,
    /// Whale threshold = bid reference quantity x this
    pub whale_multiplier: f64,
    /// Number of top bid levels averaged into the whale reference
    pub whale_reference_levels: usize,
    /// Spoof risk (percent) above which the book is flagged as spoofing
    pub spoof_risk_threshold: f64,
    /// Added quantity / top depth above which the book is flagged as layering
    pub layering_ratio: f64,
    /// Top depth below this multiple of the mean bid level is a void
    pub void_ratio: f64,
    /// Integrity penalty applied when layering is detected
    pub layering_penalty: f64,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            depth_levels: 10,
            spoof_pull_ratio: 0.45,
            add_ratio: 1.5,
            whale_multiplier: 4.5,
            whale_reference_levels: 1,
            spoof_risk_threshold: 35.0,
            layering_ratio: 0.8,
            void_ratio: 0.6,
            layering_penalty: 25.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookSide {
    Bid,
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManipulationType {
    None,
    Spoofing,
    Layering,
}

/// Largest single level in the book, reported only above the whale threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominantWall {
    pub price: f64,
    pub side: BookSide,
    /// Quantity resting at the wall
    pub strength: f64,
}

/// Result of analyzing one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookAnalysis {
    pub bid_pressure_pct: f64,
    pub ask_pressure_pct: f64,
    pub integrity_score: f64,
    pub spoof_risk_pct: f64,
    pub dominant_wall: Option<DominantWall>,
    pub liquidity_void: bool,
    pub manipulation_type: ManipulationType,
    pub whale_threshold: f64,
    pub pulled_quantity: f64,
    pub added_quantity: f64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub exchange_timestamp_ms: TimestampMs,
}

impl BookAnalysis {
    /// Pressure skew in [-1, 1]; positive when bids dominate
    pub fn order_book_imbalance(&self) -> f64 {
        (self.bid_pressure_pct - self.ask_pressure_pct) / 100.0
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// Mean level quantity across both sides
    pub fn average_level_quantity(&self) -> f64 {
        let count = self.bids.len() + self.asks.len();
        if count == 0 {
            return 0.0;
        }
        let total: f64 = self
            .bids
            .iter()
            .chain(self.asks.iter())
            .map(|l| l.quantity)
            .sum();
        total / count as f64
    }
}

/// Quantities accumulated while diffing one side
#[derive(Default)]
struct SideDiff {
    pulled: f64,
    added: f64,
}

/// Stateful analyzer for a single instrument
#[derive(Debug, Clone)]
pub struct BookAnalyzer {
    config: BookConfig,
    previous_bids: HashMap<PriceKey, f64>,
    previous_asks: HashMap<PriceKey, f64>,
    previous_mean_bid: Option<f64>,
    latest: Option<BookAnalysis>,
}

impl BookAnalyzer {
    pub fn new(config: BookConfig) -> Self {
        Self {
            config,
            previous_bids: HashMap::new(),
            previous_asks: HashMap::new(),
            previous_mean_bid: None,
            latest: None,
        }
    }

    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    /// Most recent analysis, if any snapshot has been accepted
    pub fn latest(&self) -> Option<&BookAnalysis> {
        self.latest.as_ref()
    }

    /// Analyze a snapshot and make it the new diff base.
    ///
    /// Returns `None` and leaves state untouched when the snapshot fails
    /// validation.
    pub fn analyze(&mut self, snapshot: &BookSnapshot) -> Option<BookAnalysis> {
        if let Err(e) = snapshot.validate() {
            debug!("Dropping malformed book for {}: {}", snapshot.instrument, e);
            return None;
        }

        let has_previous = self.previous_mean_bid.is_some();
        let depth = self.config.depth_levels.max(1);

        let (mut bids, bid_diff) = self.diff_side(&snapshot.bids, &self.previous_bids, has_previous);
        let (mut asks, ask_diff) = self.diff_side(&snapshot.asks, &self.previous_asks, has_previous);
        let pulled = bid_diff.pulled + ask_diff.pulled;
        let added = bid_diff.added + ask_diff.added;

        // Pressure over the top levels
        let bid_top: f64 = snapshot.bids.iter().take(depth).map(|(_, q)| q).sum();
        let ask_top: f64 = snapshot.asks.iter().take(depth).map(|(_, q)| q).sum();
        let total_top = bid_top + ask_top;
        let bid_pressure_pct = if total_top > 0.0 {
            bid_top / total_top * 100.0
        } else {
            50.0
        };
        let ask_pressure_pct = 100.0 - bid_pressure_pct;

        // Whales
        let reference_levels = self.config.whale_reference_levels.max(1);
        let reference = mean(snapshot.bids.iter().take(reference_levels).map(|(_, q)| *q));
        let whale_threshold = reference * self.config.whale_multiplier;
        for level in bids.iter_mut().chain(asks.iter_mut()) {
            level.is_whale = level.quantity > whale_threshold;
        }

        // Dominant wall: bids first, strict comparison keeps the first seen
        let mut wall: Option<DominantWall> = None;
        let sides = [(BookSide::Bid, &bids), (BookSide::Ask, &asks)];
        for (side, levels) in sides {
            for level in levels.iter() {
                if wall.as_ref().is_none_or(|w| level.quantity > w.strength) {
                    wall = Some(DominantWall {
                        price: level.price,
                        side,
                        strength: level.quantity,
                    });
                }
            }
        }
        let dominant_wall = wall.filter(|w| w.strength > whale_threshold);

        // Spoofing / layering
        let spoof_risk_pct = pulled / (pulled + added + EPSILON) * 100.0;
        let manipulation_type = if spoof_risk_pct > self.config.spoof_risk_threshold {
            ManipulationType::Spoofing
        } else if added > self.config.layering_ratio * total_top {
            ManipulationType::Layering
        } else {
            ManipulationType::None
        };
        let layering_penalty = if manipulation_type == ManipulationType::Layering {
            self.config.layering_penalty
        } else {
            0.0
        };
        let integrity_score = (100.0 - spoof_risk_pct - layering_penalty).clamp(0.0, 100.0);

        // Liquidity void against the previous book's mean bid level
        let current_mean_bid = mean(snapshot.bids.iter().take(depth).map(|(_, q)| *q));
        let void_reference = self.previous_mean_bid.unwrap_or(current_mean_bid);
        let liquidity_void = total_top < self.config.void_ratio * void_reference;

        let analysis = BookAnalysis {
            bid_pressure_pct,
            ask_pressure_pct,
            integrity_score,
            spoof_risk_pct,
            dominant_wall,
            liquidity_void,
            manipulation_type,
            whale_threshold,
            pulled_quantity: pulled,
            added_quantity: added,
            bids,
            asks,
            exchange_timestamp_ms: snapshot.exchange_timestamp_ms,
        };

        // The new snapshot fully replaces the diff base
        self.previous_bids = price_map(&snapshot.bids);
        self.previous_asks = price_map(&snapshot.asks);
        self.previous_mean_bid = Some(current_mean_bid);
        self.latest = Some(analysis.clone());

        Some(analysis)
    }

    /// Forget the diff base, as if no snapshot had been seen
    fn diff_side(
        &self,
        levels: &[(f64, f64)],
        previous: &HashMap<PriceKey, f64>,
        has_previous: bool,
    ) -> (Vec<BookLevel>, SideDiff) {
        let mut diff = SideDiff::default();
        let mut cumulative = 0.0;
        let mut out = Vec::with_capacity(levels.len());

        for &(price, quantity) in levels {
            cumulative += quantity;
            let mut level = BookLevel::new(price, quantity, cumulative);

            if has_previous {
                let prev = PriceKey::from_f64(price)
                    .and_then(|key| previous.get(&key).copied())
                    .unwrap_or(0.0);
                let delta = quantity - prev;
                if delta < -(prev * self.config.spoof_pull_ratio) {
                    level.is_spoof_suspect = true;
                    diff.pulled += delta.abs();
                } else if delta > prev * self.config.add_ratio {
                    diff.added += delta;
                }
            }
            out.push(level);
        }

        (out, diff)
    }
}

impl Default for BookAnalyzer {
    fn default() -> Self {
        Self::new(BookConfig::default())
    }
}

fn price_map(levels: &[(f64, f64)]) -> HashMap<PriceKey, f64> {
    levels
        .iter()
        .filter_map(|&(price, quantity)| PriceKey::from_f64(price).map(|key| (key, quantity)))
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}
