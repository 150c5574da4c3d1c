//! Algorithmic flow fingerprinting
//!
//! Scores the last N prints for machine-like regularity: uniform sizes,
//! low-entropy inter-arrival times and a steady pulse all push the bot
//! probability up.

use argus_core::{RingBuffer, TimestampMs, TradeTick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fingerprint extractor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Trades kept for evaluation
    pub window: usize,
    /// Fewer trades than this yields zeroed features
    pub min_trades: usize,
    /// Inter-arrival quantization bucket for the entropy histogram
    pub entropy_bucket_ms: i64,
    /// Entropy (bits) at which the entropy term reaches zero
    pub entropy_norm_bits: f64,
    pub pulse_min_intervals: usize,
    /// Max coefficient of variation of intervals for a pulse
    pub pulse_max_cv: f64,
    /// Mean interval floor; faster bursts never count as a pulse
    pub pulse_min_mean_ms: f64,
    pub bot_threshold: f64,
    pub predation_threshold: f64,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            window: 50,
            min_trades: 5,
            entropy_bucket_ms: 50,
            entropy_norm_bits: 4.0,
            pulse_min_intervals: 10,
            pulse_max_cv: 0.15,
            pulse_min_mean_ms: 10.0,
            bot_threshold: 0.8,
            predation_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FingerprintFeatures {
    pub size_variance: f64,
    pub temporal_entropy_bits: f64,
    /// Fraction of prints where the buyer was the aggressor
    pub aggression_ratio: f64,
    pub is_pulsing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowClass {
    InsufficientData,
    Organic,
    Algorithmic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreatLevel {
    Normal,
    HighPredation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub features: FingerprintFeatures,
    pub bot_probability: f64,
    pub is_bot: bool,
    pub threat_level: ThreatLevel,
    pub classification: FlowClass,
    pub sample_size: usize,
}

impl Fingerprint {
    fn insufficient(sample_size: usize) -> Self {
        Self {
            features: FingerprintFeatures::default(),
            bot_probability: 0.0,
            is_bot: false,
            threat_level: ThreatLevel::Normal,
            classification: FlowClass::InsufficientData,
            sample_size,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Print {
    quantity: f64,
    timestamp_ms: TimestampMs,
    buyer_aggressor: bool,
}

/// Per-instrument fingerprint extractor
#[derive(Debug, Clone)]
pub struct FingerprintExtractor {
    config: FingerprintConfig,
    prints: RingBuffer<Print>,
}

impl FingerprintExtractor {
    pub fn new(config: FingerprintConfig) -> Self {
        Self {
            prints: RingBuffer::new(config.window),
            config,
        }
    }

    pub fn config(&self) -> &FingerprintConfig {
        &self.config
    }

    pub fn on_trade(&mut self, tick: &TradeTick) {
        if tick.validate().is_err() {
            return;
        }
        self.prints.push(Print {
            quantity: tick.quantity,
            timestamp_ms: tick.exchange_timestamp_ms,
            buyer_aggressor: !tick.is_sell_aggressor,
        });
    }

    pub fn sample_size(&self) -> usize {
        self.prints.len()
    }

    /// Score the current window
    pub fn evaluate(&self) -> Fingerprint {
        let n = self.prints.len();
        if n < self.config.min_trades.max(2) {
            return Fingerprint::insufficient(n);
        }

        let features = self.features();
        let cfg = &self.config;

        let size_term = (1.0 - features.size_variance).max(0.0);
        let entropy_term = if cfg.entropy_norm_bits > 0.0 {
            (1.0 - features.temporal_entropy_bits / cfg.entropy_norm_bits).max(0.0)
        } else {
            0.0
        };
        let pulse_term = if features.is_pulsing { 1.0 } else { 0.0 };
        let bot_probability =
            (0.3 * size_term + 0.3 * entropy_term + 0.4 * pulse_term).clamp(0.0, 1.0);

        let is_bot = bot_probability > cfg.bot_threshold;
        Fingerprint {
            features,
            bot_probability,
            is_bot,
            threat_level: if bot_probability > cfg.predation_threshold {
                ThreatLevel::HighPredation
            } else {
                ThreatLevel::Normal
            },
            classification: if is_bot {
                FlowClass::Algorithmic
            } else {
                FlowClass::Organic
            },
            sample_size: n,
        }
    }

    fn features(&self) -> FingerprintFeatures {
        let n = self.prints.len() as f64;

        let mean_size = self.prints.iter().map(|p| p.quantity).sum::<f64>() / n;
        let size_variance = self
            .prints
            .iter()
            .map(|p| (p.quantity - mean_size).powi(2))
            .sum::<f64>()
            / n;

        let buyers = self.prints.iter().filter(|p| p.buyer_aggressor).count();
        let aggression_ratio = buyers as f64 / n;

        // Out-of-order timestamps count as zero-length gaps
        let intervals: Vec<f64> = self
            .prints
            .iter()
            .zip(self.prints.iter().skip(1))
            .map(|(a, b)| b.timestamp_ms.saturating_sub(a.timestamp_ms).max(0) as f64)
            .collect();

        FingerprintFeatures {
            size_variance,
            temporal_entropy_bits: self.entropy(&intervals),
            aggression_ratio,
            is_pulsing: self.is_pulsing(&intervals),
        }
    }

    fn entropy(&self, intervals: &[f64]) -> f64 {
        if intervals.is_empty() {
            return 0.0;
        }
        let bucket = self.config.entropy_bucket_ms.max(1) as f64;
        let mut histogram: BTreeMap<i64, usize> = BTreeMap::new();
        for interval in intervals {
            *histogram.entry((interval / bucket).floor() as i64).or_default() += 1;
        }

        let total = intervals.len() as f64;
        histogram
            .values()
            .map(|&count| {
                let p = count as f64 / total;
                -p * p.log2()
            })
            .sum::<f64>()
            .max(0.0)
    }

    fn is_pulsing(&self, intervals: &[f64]) -> bool {
        if intervals.len() < self.config.pulse_min_intervals {
            return false;
        }
        let n = intervals.len() as f64;
        let mean = intervals.iter().sum::<f64>() / n;
        if mean < self.config.pulse_min_mean_ms {
            return false;
        }
        let std_dev = (intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / n).sqrt();
        std_dev / mean < self.config.pulse_max_cv
    }
}

impl Default for FingerprintExtractor {
    fn default() -> Self {
        Self::new(FingerprintConfig::default())
    }
}
