//! Iceberg / hidden liquidity detection
//!
//! Prints are grouped into clusters keyed by price. A cluster that keeps
//! absorbing aggressive volume far beyond the typical trade size points to
//! a large resting order showing only small visible slices.
//!
//! The threshold adapts to the instrument: `avg(last N trade sizes) x
//! sensitivity`. Nothing is emitted until enough trades have been seen to
//! make that average meaningful.

use argus_core::{PriceKey, RollingWindow, Side, TimestampMs, TradeTick};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Iceberg detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcebergConfig {
    /// Trade sizes kept for the rolling average
    pub history_size: usize,
    /// Live threshold = average trade size x sensitivity
    pub sensitivity: f64,
    /// Trades observed before the detector leaves `Learning`
    pub min_trades: u64,
    /// Clusters idle longer than this are stale
    pub cluster_window_ms: i64,
    /// Cluster count that triggers eviction
    pub max_clusters: usize,
    /// Re-emission at the same key needs this much volume growth
    pub dedup_growth: f64,
    /// Emitted signals are forgotten after this long
    pub signal_retention_ms: i64,
}

impl Default for IcebergConfig {
    fn default() -> Self {
        Self {
            history_size: 500,
            sensitivity: 50.0,
            min_trades: 50,
            cluster_window_ms: 1_200,
            max_clusters: 150,
            dedup_growth: 1.10,
            signal_retention_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorState {
    Learning,
    Active,
}

/// Which aggressive flow was absorbed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbsorptionType {
    /// Sell aggressors absorbed by a hidden bid
    HiddenSell,
    /// Buy aggressors absorbed by a hidden offer
    HiddenBuy,
}

impl AbsorptionType {
    pub fn from_aggressor(aggressor: Side) -> Self {
        match aggressor {
            Side::Sell => AbsorptionType::HiddenSell,
            Side::Buy => AbsorptionType::HiddenBuy,
        }
    }

    /// Aggressor side whose flow was absorbed
    pub fn aggressor(&self) -> Side {
        match self {
            AbsorptionType::HiddenSell => Side::Sell,
            AbsorptionType::HiddenBuy => Side::Buy,
        }
    }

    /// Side of the resting order doing the absorbing
    pub fn resting_side(&self) -> Side {
        self.aggressor().opposite()
    }
}

/// Aggressive volume accumulated at one price from one side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub price: f64,
    pub volume: f64,
    /// Aggressor side
    pub side: Side,
    pub last_update_ms: TimestampMs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsorptionSignal {
    pub signal_type: AbsorptionType,
    pub price: f64,
    pub volume_absorbed: f64,
    pub threshold_at_emission: f64,
    pub timestamp_ms: TimestampMs,
}

/// Per-instrument iceberg detector
#[derive(Debug, Clone)]
pub struct IcebergDetector {
    config: IcebergConfig,
    sizes: RollingWindow,
    observed: u64,
    state: DetectorState,
    clusters: HashMap<PriceKey, Cluster>,
    signals: HashMap<(PriceKey, AbsorptionType), AbsorptionSignal>,
    evicted: u64,
    last_trade_ms: Option<TimestampMs>,
}

impl IcebergDetector {
    pub fn new(config: IcebergConfig) -> Self {
        Self {
            sizes: RollingWindow::new(config.history_size),
            config,
            observed: 0,
            state: DetectorState::Learning,
            clusters: HashMap::new(),
            signals: HashMap::new(),
            evicted: 0,
            last_trade_ms: None,
        }
    }

    pub fn config(&self) -> &IcebergConfig {
        &self.config
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Trades accepted so far
    pub fn observed(&self) -> u64 {
        self.observed
    }

    pub fn average_trade_volume(&self) -> f64 {
        self.sizes.mean().unwrap_or(0.0)
    }

    /// Current absorption threshold
    pub fn live_threshold(&self) -> f64 {
        absorption_threshold(self.average_trade_volume(), self.config.sensitivity)
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn evicted_clusters(&self) -> u64 {
        self.evicted
    }

    pub fn cluster_at(&self, price: f64) -> Option<&Cluster> {
        PriceKey::from_f64(price).and_then(|key| self.clusters.get(&key))
    }

    /// Retained signals, ordered by price then type
    pub fn active_signals(&self) -> Vec<AbsorptionSignal> {
        let mut keys: Vec<_> = self.signals.keys().copied().collect();
        keys.sort_by(|a, b| a.0.cmp(&b.0).then((a.1 as u8).cmp(&(b.1 as u8))));
        keys.iter()
            .filter_map(|key| self.signals.get(key).cloned())
            .collect()
    }

    /// Largest live cluster relative to the threshold; 0 while learning.
    /// Clusters idle past the window, measured from the latest print, do
    /// not count.
    pub fn forensic_ratio(&self) -> f64 {
        let threshold = self.live_threshold();
        if self.state == DetectorState::Learning || threshold <= 0.0 {
            return 0.0;
        }
        let Some(now) = self.last_trade_ms else {
            return 0.0;
        };
        let largest = self
            .clusters
            .values()
            .filter(|c| !self.is_stale(c, now))
            .map(|c| c.volume)
            .fold(0.0, f64::max);
        largest / threshold
    }

    /// Feed one print. Returns a signal when a cluster crosses the live
    /// threshold and passes the dedup rule.
    pub fn on_trade(&mut self, tick: &TradeTick) -> Option<AbsorptionSignal> {
        if let Err(e) = tick.validate() {
            debug!("Dropping malformed trade for {}: {}", tick.instrument, e);
            return None;
        }
        let key = PriceKey::from_f64(tick.price)?;
        let now = tick.exchange_timestamp_ms;

        self.sizes.push(tick.quantity);
        self.observed += 1;
        self.state = if self.observed <= self.config.min_trades {
            DetectorState::Learning
        } else {
            DetectorState::Active
        };

        let side = tick.aggressor();
        self.last_trade_ms = Some(now);
        let window = self.config.cluster_window_ms;
        let merged = match self.clusters.get_mut(&key) {
            Some(cluster)
                if cluster.side == side && now.saturating_sub(cluster.last_update_ms) <= window =>
            {
                cluster.volume += tick.quantity;
                cluster.last_update_ms = now;
                Some(cluster.volume)
            }
            _ => None,
        };
        // New price, aggressor flipped, or the cluster went stale: start over
        let volume = merged.unwrap_or_else(|| {
            self.clusters.insert(
                key,
                Cluster {
                    price: tick.price,
                    volume: tick.quantity,
                    side,
                    last_update_ms: now,
                },
            );
            tick.quantity
        });

        self.evict(now);
        self.prune_signals(now);

        if self.state == DetectorState::Learning {
            return None;
        }

        let threshold = self.live_threshold();
        if volume <= threshold {
            return None;
        }

        let signal_type = AbsorptionType::from_aggressor(side);
        let signal_key = (key, signal_type);
        if let Some(existing) = self.signals.get(&signal_key) {
            if volume < existing.volume_absorbed * self.config.dedup_growth {
                return None;
            }
        }

        let signal = AbsorptionSignal {
            signal_type,
            price: tick.price,
            volume_absorbed: volume,
            threshold_at_emission: threshold,
            timestamp_ms: now,
        };
        info!(
            "{:?} absorption on {} at {}: {:.4} > {:.4}",
            signal_type, tick.instrument, tick.price, volume, threshold
        );
        self.signals.insert(signal_key, signal.clone());
        Some(signal)
    }

    fn is_stale(&self, cluster: &Cluster, now: TimestampMs) -> bool {
        now.saturating_sub(cluster.last_update_ms) > self.config.cluster_window_ms
    }

    /// Stale sweep once over the cap, then oldest-first until within it
    fn evict(&mut self, now: TimestampMs) {
        if self.clusters.len() <= self.config.max_clusters {
            return;
        }
        let before = self.clusters.len();
        let cutoff = now.saturating_sub(self.config.cluster_window_ms);
        self.clusters.retain(|_, c| c.last_update_ms >= cutoff);

        while self.clusters.len() > self.config.max_clusters {
            let oldest = self
                .clusters
                .iter()
                .min_by(|a, b| a.1.last_update_ms.cmp(&b.1.last_update_ms).then(a.0.cmp(b.0)))
                .map(|(k, _)| *k);
            match oldest {
                Some(key) => {
                    self.clusters.remove(&key);
                }
                None => break,
            }
        }

        let removed = before - self.clusters.len();
        self.evicted += removed as u64;
        debug!("Evicted {} clusters ({} remain)", removed, self.clusters.len());
    }

    fn prune_signals(&mut self, now: TimestampMs) {
        let cutoff = now.saturating_sub(self.config.signal_retention_ms);
        self.signals.retain(|_, s| s.timestamp_ms >= cutoff);
    }
}

impl Default for IcebergDetector {
    fn default() -> Self {
        Self::new(IcebergConfig::default())
    }
}

/// Absorption threshold for a given average trade size
pub fn absorption_threshold(average_trade_volume: f64, sensitivity: f64) -> f64 {
    average_trade_volume * sensitivity
}
