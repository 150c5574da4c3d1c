//! Per-instrument forensic pipeline
//!
//! Owns every detector for one instrument and drives them synchronously in
//! arrival order. Nothing in here is shared with another instrument.

use crate::config::ForensicsConfig;
use argus_core::{BookSnapshot, FeedEvent, InstrumentId, TimestampMs, TradeTick};
use argus_strategy::{
    ForensicVerdict, FusionEngine, FusionInputs, MarketContext, StrategyDecoder, SwingLevels,
    TradeSetup,
};
use argus_surveillance::{
    AbsorptionSignal, BookAnalysis, BookAnalyzer, DetectorState, Fingerprint,
    FingerprintExtractor, FlowClass, IcebergDetector, ThreatLevel, ToxicityEngine, ToxicityState,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Output of one pipeline step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum ForensicEvent {
    Book(BookAnalysis),
    Absorption(AbsorptionSignal),
    Toxicity(ToxicityState),
    /// Emitted when the classification or threat level changes
    Fingerprint(Fingerprint),
    /// Emitted when the candidate setups change
    Setups(Vec<TradeSetup>),
    /// Emitted after every accepted event
    Verdict(ForensicVerdict),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub trades: u64,
    pub books: u64,
    pub malformed: u64,
    pub out_of_order: u64,
    /// Absorption signals emitted
    pub signals: u64,
}

/// Latest polled view of one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentReport {
    pub instrument: InstrumentId,
    pub book: Option<BookAnalysis>,
    pub iceberg_state: DetectorState,
    pub absorption_threshold: f64,
    pub forensic_ratio: f64,
    pub active_signals: Vec<AbsorptionSignal>,
    pub toxicity: ToxicityState,
    pub fingerprint: Fingerprint,
    pub setups: Vec<TradeSetup>,
    pub verdict: Option<ForensicVerdict>,
    pub last_price: Option<f64>,
    pub swing_levels: Option<SwingLevels>,
    pub delta_speed: f64,
    pub stats: PipelineStats,
}

pub struct InstrumentPipeline {
    instrument: InstrumentId,
    book: BookAnalyzer,
    iceberg: IcebergDetector,
    toxicity: ToxicityEngine,
    fingerprint: FingerprintExtractor,
    context: MarketContext,
    decoder: StrategyDecoder,
    fusion: FusionEngine,
    last_trade_ms: Option<TimestampMs>,
    book_mid: Option<f64>,
    last_flow: Option<(FlowClass, ThreatLevel)>,
    setups: Vec<TradeSetup>,
    verdict: Option<ForensicVerdict>,
    stats: PipelineStats,
}

impl InstrumentPipeline {
    pub fn new(instrument: impl Into<InstrumentId>, config: &ForensicsConfig) -> Self {
        Self {
            instrument: instrument.into(),
            book: BookAnalyzer::new(config.book.clone()),
            iceberg: IcebergDetector::new(config.iceberg.clone()),
            toxicity: ToxicityEngine::new(config.toxicity.clone()),
            fingerprint: FingerprintExtractor::new(config.fingerprint.clone()),
            context: MarketContext::new(config.context.clone()),
            decoder: StrategyDecoder::new(config.strategy.clone()),
            fusion: FusionEngine::new(config.fusion.clone()),
            last_trade_ms: None,
            book_mid: None,
            last_flow: None,
            setups: Vec::new(),
            verdict: None,
            stats: PipelineStats::default(),
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn verdict(&self) -> Option<&ForensicVerdict> {
        self.verdict.as_ref()
    }

    /// Apply one event. Rejected events leave every detector untouched and
    /// produce nothing.
    pub fn process(&mut self, event: &FeedEvent) -> Vec<ForensicEvent> {
        if event.instrument() != self.instrument {
            self.stats.malformed += 1;
            debug!(
                "Pipeline {} rejected event for {}",
                self.instrument,
                event.instrument()
            );
            return Vec::new();
        }
        if let Err(e) = event.validate() {
            self.stats.malformed += 1;
            debug!("Pipeline {} dropped malformed event: {}", self.instrument, e);
            return Vec::new();
        }

        let mut events = Vec::new();
        let accepted = match event {
            FeedEvent::Trade(tick) => self.on_trade(tick, &mut events),
            FeedEvent::Book(snapshot) => self.on_book(snapshot, &mut events),
        };
        if !accepted {
            return Vec::new();
        }

        self.refresh_setups(&mut events);

        let verdict = self.fusion.evaluate(&self.fusion_inputs());
        self.verdict = Some(verdict.clone());
        events.push(ForensicEvent::Verdict(verdict));
        events
    }

    fn on_trade(&mut self, tick: &TradeTick, events: &mut Vec<ForensicEvent>) -> bool {
        if let Some(last) = self.last_trade_ms {
            if tick.exchange_timestamp_ms < last {
                self.stats.out_of_order += 1;
                warn!(
                    "Out-of-order trade on {}: {} < {}",
                    self.instrument, tick.exchange_timestamp_ms, last
                );
                return false;
            }
        }
        self.last_trade_ms = Some(tick.exchange_timestamp_ms);
        self.stats.trades += 1;

        if let Some(signal) = self.iceberg.on_trade(tick) {
            self.stats.signals += 1;
            events.push(ForensicEvent::Absorption(signal));
        }
        if let Some(state) = self.toxicity.on_trade(tick) {
            events.push(ForensicEvent::Toxicity(state));
        }

        self.fingerprint.on_trade(tick);
        let fingerprint = self.fingerprint.evaluate();
        let flow = (fingerprint.classification, fingerprint.threat_level);
        if self.last_flow != Some(flow) {
            self.last_flow = Some(flow);
            events.push(ForensicEvent::Fingerprint(fingerprint));
        }

        self.context.on_trade(tick);
        true
    }

    fn on_book(&mut self, snapshot: &BookSnapshot, events: &mut Vec<ForensicEvent>) -> bool {
        match self.book.analyze(snapshot) {
            Some(analysis) => {
                self.stats.books += 1;
                self.book_mid = snapshot.mid_price();
                events.push(ForensicEvent::Book(analysis));
                true
            }
            None => {
                self.stats.malformed += 1;
                false
            }
        }
    }

    /// Re-decode against the latest book and current price
    fn refresh_setups(&mut self, events: &mut Vec<ForensicEvent>) {
        let Some(analysis) = self.book.latest() else {
            return;
        };
        let setups = match self.context.last_price().or(self.book_mid) {
            Some(price) => self
                .decoder
                .decode(analysis, price, analysis.average_level_quantity()),
            None => Vec::new(),
        };
        if setups != self.setups {
            self.setups = setups.clone();
            events.push(ForensicEvent::Setups(setups));
        }
    }

    fn fusion_inputs(&self) -> FusionInputs {
        FusionInputs {
            toxicity: self.toxicity.score(),
            forensic_ratio: self.iceberg.forensic_ratio(),
            order_book_imbalance: self
                .book
                .latest()
                .map(BookAnalysis::order_book_imbalance)
                .unwrap_or(0.0),
            is_at_swing_level: self.context.is_at_swing_level(),
            delta_speed: self.context.delta_speed(),
        }
    }

    pub fn report(&self) -> InstrumentReport {
        InstrumentReport {
            instrument: self.instrument.clone(),
            book: self.book.latest().cloned(),
            iceberg_state: self.iceberg.state(),
            absorption_threshold: self.iceberg.live_threshold(),
            forensic_ratio: self.iceberg.forensic_ratio(),
            active_signals: self.iceberg.active_signals(),
            toxicity: self.toxicity.state(),
            fingerprint: self.fingerprint.evaluate(),
            setups: self.setups.clone(),
            verdict: self.verdict.clone(),
            last_price: self.context.last_price(),
            swing_levels: self.context.swing_levels(),
            delta_speed: self.context.delta_speed(),
            stats: self.stats.clone(),
        }
    }
}
