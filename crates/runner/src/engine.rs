//! Multi-instrument forensics engine
//!
//! Wires the feed adapter, the ingestion plane and one pipeline worker per
//! tracked instrument. Each worker drains its own bounded queue, so
//! instruments never share mutable state and per-instrument order is the
//! plane's arrival order.

use crate::config::ForensicsConfig;
use crate::error::EngineError;
use crate::pipeline::{ForensicEvent, InstrumentPipeline, InstrumentReport, PipelineStats};
use argus_core::{FeedEvent, InstrumentId};
use argus_gateway::{
    FeedAdapter, FeedSource, IngestionPlane, Subjects, SubscriptionId, SubscriptionReceiver,
    Telemetry, TransportError,
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// A forensic event tagged with where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub instrument: InstrumentId,
    /// Plane sequence of the packet that produced it
    pub sequence: u64,
    pub event: ForensicEvent,
}

/// Outcome of draining a feed source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSummary {
    pub accepted: u64,
    pub rejected: u64,
    /// Published, but the instrument could not be auto-tracked
    pub skipped: u64,
}

struct Worker {
    subscription: SubscriptionId,
    handle: JoinHandle<PipelineStats>,
}

pub struct ForensicsEngine {
    config: ForensicsConfig,
    plane: IngestionPlane,
    adapter: FeedAdapter,
    workers: DashMap<InstrumentId, Worker>,
    reports: Arc<DashMap<InstrumentId, InstrumentReport>>,
    skipped: DashMap<InstrumentId, u64>,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl ForensicsEngine {
    pub fn new(config: ForensicsConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let (events_tx, _) = broadcast::channel(config.event_capacity);
        Ok(Self {
            plane: IngestionPlane::new(config.ingest.clone()),
            adapter: FeedAdapter::new(),
            workers: DashMap::new(),
            reports: Arc::new(DashMap::new()),
            skipped: DashMap::new(),
            events_tx,
            config,
        })
    }

    pub fn config(&self) -> &ForensicsConfig {
        &self.config
    }

    /// Start the plane and track the configured instruments
    pub fn start(&self) -> Result<(), EngineError> {
        self.plane.start();
        for instrument in &self.config.instruments {
            self.track(instrument)?;
        }
        info!(
            "Forensics engine started with {} instrument(s)",
            self.workers.len()
        );
        Ok(())
    }

    /// Spawn a pipeline worker for `instrument`. Returns false if it is
    /// already tracked.
    pub fn track(&self, instrument: &str) -> Result<bool, EngineError> {
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        match self.workers.entry(instrument.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                let receiver = self
                    .plane
                    .subscribe_queue(&Subjects::market_data(instrument))?;
                let subscription = receiver.id();
                let pipeline = InstrumentPipeline::new(instrument, &self.config);
                let handle = runtime.spawn(run_pipeline(
                    pipeline,
                    receiver,
                    self.reports.clone(),
                    self.events_tx.clone(),
                ));
                slot.insert(Worker {
                    subscription,
                    handle,
                });
                info!("Tracking {}", instrument);
                Ok(true)
            }
        }
    }

    /// Revoke the instrument's subscription, wait for its worker to exit
    /// and discard its state
    pub async fn untrack(&self, instrument: &str) -> bool {
        let Some((_, worker)) = self.workers.remove(instrument) else {
            return false;
        };
        self.plane
            .unsubscribe(&Subjects::market_data(instrument), worker.subscription);
        // A revoked receiver yields nothing more, so the worker stops after
        // the packet in hand
        if let Err(e) = worker.handle.await {
            warn!("Pipeline worker for {} failed: {}", instrument, e);
        }
        self.reports.remove(instrument);
        info!("Stopped tracking {}", instrument);
        true
    }

    pub fn is_tracked(&self, instrument: &str) -> bool {
        self.workers.contains_key(instrument)
    }

    /// Tracked instruments, sorted
    pub fn tracked(&self) -> Vec<InstrumentId> {
        let mut instruments: Vec<_> = self.workers.iter().map(|w| w.key().clone()).collect();
        instruments.sort();
        instruments
    }

    /// Publish a canonical event on its instrument's channel.
    ///
    /// With auto-tracking on, a failure to track a new instrument is logged
    /// and counted; the event is still published.
    pub fn ingest(&self, event: FeedEvent) -> Result<u64, EngineError> {
        self.publish(event).map(|(sequence, _)| sequence)
    }

    /// Normalize a raw exchange message and ingest it
    pub fn ingest_raw(&self, raw: &str) -> Result<u64, EngineError> {
        let event = self.adapter.normalize(raw)?;
        self.ingest(event)
    }

    /// Events published for `instrument` while it could not be tracked
    pub fn skipped(&self, instrument: &str) -> u64 {
        self.skipped.get(instrument).map(|count| *count).unwrap_or(0)
    }

    /// Drain a feed source. Messages the adapter rejects and instruments
    /// that cannot be tracked are counted and skipped; anything else stops
    /// the run.
    pub async fn run_feed<F: FeedSource>(&self, feed: &mut F) -> Result<FeedSummary, EngineError> {
        let mut summary = FeedSummary::default();
        while let Some(raw) = feed.next_message().await? {
            let published = self
                .adapter
                .normalize(&raw)
                .map_err(EngineError::from)
                .and_then(|event| self.publish(event));
            match published {
                Ok((_, false)) => summary.accepted += 1,
                Ok((_, true)) => summary.skipped += 1,
                Err(e) if e.is_feed_rejection() => {
                    summary.rejected += 1;
                    debug!("Rejected feed message: {}", e);
                }
                Err(e) => return Err(e),
            }
            // Let workers keep up on a single-threaded runtime
            tokio::task::yield_now().await;
        }
        info!(
            "Feed drained: {} accepted, {} rejected, {} skipped",
            summary.accepted, summary.rejected, summary.skipped
        );
        Ok(summary)
    }

    /// Returns the plane sequence and whether auto-tracking failed
    fn publish(&self, event: FeedEvent) -> Result<(u64, bool), EngineError> {
        let instrument = event.instrument().to_string();
        let mut skipped = false;
        if self.config.auto_track && !self.is_tracked(&instrument) && self.plane.is_running() {
            if let Err(e) = self.track(&instrument) {
                skipped = true;
                self.note_skip(&instrument, &e);
            }
        }
        let sequence = self
            .plane
            .ingest(&Subjects::market_data(&instrument), event)?;
        Ok((sequence, skipped))
    }

    fn note_skip(&self, instrument: &str, err: &EngineError) {
        let mut count = self.skipped.entry(instrument.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            warn!("Cannot track {}, its events go unanalyzed: {}", instrument, err);
        } else {
            debug!("Still cannot track {}: {}", instrument, err);
        }
    }

    /// Latest report for one instrument
    pub fn report(&self, instrument: &str) -> Option<InstrumentReport> {
        self.reports.get(instrument).map(|r| r.value().clone())
    }

    /// Latest reports, sorted by instrument
    pub fn reports(&self) -> Vec<InstrumentReport> {
        let mut reports: Vec<_> = self.reports.iter().map(|r| r.value().clone()).collect();
        reports.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        reports
    }

    /// Live stream of every forensic event across instruments
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    pub fn telemetry(&self) -> Telemetry {
        self.plane.telemetry()
    }

    /// Stop ingesting, let every worker drain its queue, and return the
    /// final reports.
    pub async fn shutdown(&self) -> Vec<InstrumentReport> {
        self.plane.stop();

        let instruments = self.tracked();
        for instrument in instruments {
            let Some((_, worker)) = self.workers.remove(&instrument) else {
                continue;
            };
            self.plane.close_channel(&Subjects::market_data(&instrument));
            match worker.handle.await {
                Ok(stats) => info!(
                    "{}: {} trades, {} books, {} malformed, {} out of order, {} signals",
                    instrument,
                    stats.trades,
                    stats.books,
                    stats.malformed,
                    stats.out_of_order,
                    stats.signals
                ),
                Err(e) => warn!("Pipeline worker for {} failed: {}", instrument, e),
            }
        }

        self.reports()
    }
}

async fn run_pipeline(
    mut pipeline: InstrumentPipeline,
    mut receiver: SubscriptionReceiver,
    reports: Arc<DashMap<InstrumentId, InstrumentReport>>,
    events_tx: broadcast::Sender<EngineEvent>,
) -> PipelineStats {
    let instrument = pipeline.instrument().to_string();
    while let Some(packet) = receiver.recv().await {
        for event in pipeline.process(&packet.event) {
            // No listeners is fine
            let _ = events_tx.send(EngineEvent {
                instrument: instrument.clone(),
                sequence: packet.sequence,
                event,
            });
        }
        reports.insert(instrument.clone(), pipeline.report());
    }
    debug!("Pipeline worker for {} stopped", instrument);
    pipeline.stats().clone()
}
