//! Signal fusion
//!
//! Combines toxicity, absorption, book imbalance and swing context into a
//! single bounded conviction score and a market mode. Pure function of its
//! inputs: there is no hysteresis, so consumers that need a debounced view
//! must smooth the verdict stream themselves.

use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub absorption_weight: f64,
    pub toxicity_weight: f64,
    pub imbalance_weight: f64,
    /// Forensic ratio above which a swing-level print is a trap
    pub trap_ratio: f64,
    pub flow_ratio: f64,
    pub flow_toxicity: f64,
    pub critical_toxicity: f64,
    pub critical_delta_speed: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            absorption_weight: 0.4,
            toxicity_weight: 0.3,
            imbalance_weight: 0.3,
            trap_ratio: 1.7,
            flow_ratio: 1.5,
            flow_toxicity: 0.6,
            critical_toxicity: 0.8,
            critical_delta_speed: 150.0,
        }
    }
}

/// Everything the fusion engine looks at
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionInputs {
    /// VPIN-style toxicity in [0, 1]
    pub toxicity: f64,
    /// Absorbed volume / live threshold
    pub forensic_ratio: f64,
    /// Book pressure skew in [-1, 1]
    pub order_book_imbalance: f64,
    pub is_at_swing_level: bool,
    pub delta_speed: f64,
}

impl FusionInputs {
    /// Non-finite values become 0; a negative ratio becomes 0
    fn sanitized(&self) -> Self {
        fn finite(v: f64) -> f64 {
            if v.is_finite() { v } else { 0.0 }
        }
        Self {
            toxicity: finite(self.toxicity),
            forensic_ratio: finite(self.forensic_ratio).max(0.0),
            order_book_imbalance: finite(self.order_book_imbalance),
            is_at_swing_level: self.is_at_swing_level,
            delta_speed: finite(self.delta_speed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketMode {
    Accumulation,
    Distribution,
    Trap,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedAction {
    FadeTheMove,
    FollowFlow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForensicVerdict {
    /// 0..=100
    pub conviction_score: u8,
    pub market_mode: MarketMode,
    pub is_critical_alert: bool,
    pub recommended_action: RecommendedAction,
}

#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    config: FusionConfig,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn evaluate(&self, inputs: &FusionInputs) -> ForensicVerdict {
        let cfg = &self.config;
        let inputs = inputs.sanitized();

        let raw = (inputs.forensic_ratio / 2.0) * cfg.absorption_weight
            + inputs.toxicity * cfg.toxicity_weight
            + inputs.order_book_imbalance.abs() * cfg.imbalance_weight;
        let conviction_score = (raw * 100.0).clamp(0.0, 100.0).round() as u8;

        // First match wins
        let market_mode = if inputs.is_at_swing_level && inputs.forensic_ratio > cfg.trap_ratio {
            MarketMode::Trap
        } else if inputs.forensic_ratio > cfg.flow_ratio && inputs.toxicity > cfg.flow_toxicity {
            if inputs.order_book_imbalance > 0.0 {
                MarketMode::Accumulation
            } else {
                MarketMode::Distribution
            }
        } else {
            MarketMode::Neutral
        };

        let is_critical_alert = inputs.toxicity > cfg.critical_toxicity
            && inputs.delta_speed > cfg.critical_delta_speed;
        if is_critical_alert {
            warn!(
                "Critical flow: toxicity {:.2}, delta speed {:.1}/s, mode {:?}",
                inputs.toxicity, inputs.delta_speed, market_mode
            );
        }

        ForensicVerdict {
            conviction_score,
            market_mode,
            is_critical_alert,
            recommended_action: if market_mode == MarketMode::Trap {
                RecommendedAction::FadeTheMove
            } else {
                RecommendedAction::FollowFlow
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(toxicity: f64, ratio: f64, imbalance: f64, swing: bool, speed: f64) -> FusionInputs {
        FusionInputs {
            toxicity,
            forensic_ratio: ratio,
            order_book_imbalance: imbalance,
            is_at_swing_level: swing,
            delta_speed: speed,
        }
    }

    #[test]
    fn test_conviction_formula() {
        let engine = FusionEngine::default();
        // (1.0/2)*0.4 + 0.5*0.3 + 0.5*0.3 = 0.5
        let verdict = engine.evaluate(&inputs(0.5, 1.0, -0.5, false, 0.0));
        assert_eq!(verdict.conviction_score, 50);
        assert_eq!(verdict.market_mode, MarketMode::Neutral);
        assert_eq!(verdict.recommended_action, RecommendedAction::FollowFlow);
    }

    #[test]
    fn test_conviction_is_bounded() {
        let engine = FusionEngine::default();
        let extremes = [
            inputs(1e9, 1e9, 1e9, true, 1e9),
            inputs(-1e9, -1e9, 0.0, false, -1e9),
            inputs(f64::NAN, f64::INFINITY, f64::NEG_INFINITY, true, f64::NAN),
            inputs(f64::MAX, f64::MAX, f64::MAX, false, 0.0),
            inputs(0.0, 0.0, 0.0, false, 0.0),
        ];
        for input in extremes {
            let verdict = engine.evaluate(&input);
            assert!(verdict.conviction_score <= 100, "{:?}", input);
        }
        assert_eq!(engine.evaluate(&extremes[0]).conviction_score, 100);
        assert_eq!(engine.evaluate(&extremes[1]).conviction_score, 0);
        assert_eq!(engine.evaluate(&extremes[2]).conviction_score, 0);
    }

    #[test]
    fn test_trap_takes_priority() {
        let engine = FusionEngine::default();
        let verdict = engine.evaluate(&inputs(0.9, 2.0, 0.5, true, 0.0));
        assert_eq!(verdict.market_mode, MarketMode::Trap);
        assert_eq!(verdict.recommended_action, RecommendedAction::FadeTheMove);

        // Same flow off the swing level follows the imbalance
        let verdict = engine.evaluate(&inputs(0.9, 2.0, 0.5, false, 0.0));
        assert_eq!(verdict.market_mode, MarketMode::Accumulation);
        let verdict = engine.evaluate(&inputs(0.9, 2.0, -0.5, false, 0.0));
        assert_eq!(verdict.market_mode, MarketMode::Distribution);
        let verdict = engine.evaluate(&inputs(0.9, 2.0, 0.0, false, 0.0));
        assert_eq!(verdict.market_mode, MarketMode::Distribution);
    }

    #[test]
    fn test_mode_boundaries_are_strict() {
        let engine = FusionEngine::default();
        assert_eq!(
            engine.evaluate(&inputs(0.9, 1.7, 0.5, true, 0.0)).market_mode,
            MarketMode::Accumulation
        );
        assert_eq!(
            engine.evaluate(&inputs(0.6, 1.6, 0.5, false, 0.0)).market_mode,
            MarketMode::Neutral
        );
        assert_eq!(
            engine.evaluate(&inputs(0.9, 1.5, 0.5, false, 0.0)).market_mode,
            MarketMode::Neutral
        );
    }

    #[test]
    fn test_critical_alert_is_independent_of_mode() {
        let engine = FusionEngine::default();
        let verdict = engine.evaluate(&inputs(0.85, 0.0, 0.0, false, 200.0));
        assert!(verdict.is_critical_alert);
        assert_eq!(verdict.market_mode, MarketMode::Neutral);

        assert!(!engine.evaluate(&inputs(0.85, 0.0, 0.0, false, 150.0)).is_critical_alert);
        assert!(!engine.evaluate(&inputs(0.8, 0.0, 0.0, false, 500.0)).is_critical_alert);
    }

    #[test]
    fn test_verdict_serializes_for_consumers() {
        let verdict = FusionEngine::default().evaluate(&inputs(0.9, 2.0, 0.5, true, 0.0));
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["market_mode"], "Trap");
        assert_eq!(json["recommended_action"], "FadeTheMove");
        assert_eq!(json["is_critical_alert"], false);

        let back: ForensicVerdict = serde_json::from_value(json).unwrap();
        assert_eq!(back, verdict);
    }
}
