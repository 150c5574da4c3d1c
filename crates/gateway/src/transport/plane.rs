//! Ingestion plane: ring buffer + topic fan-out

use super::Packet;
use super::channel::{Offer, PacketHandler, Route, SubscriptionId, SubscriptionReceiver, run_handler};
use super::config::IngestConfig;
use super::telemetry::{RateWindow, Telemetry};
use crate::error::TransportError;
use argus_core::{FeedEvent, RingBuffer};
use chrono::Utc;
use dashmap::DashMap;
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Explicitly constructed ingestion/dispatch service.
///
/// `ingest` never blocks on subscribers: each route is offered the packet
/// with `try_send`, and a full queue drops the packet for that route only.
pub struct IngestionPlane {
    config: IngestConfig,
    ring: Mutex<RingBuffer<Packet>>,
    routes: DashMap<String, Vec<Route>>,
    running: AtomicBool,
    sequence: AtomicU64,
    total_packets: AtomicU64,
    last_ingest_nanos: AtomicU64,
    dispatch_dropped: AtomicU64,
    handler_failures: Arc<AtomicU64>,
    subscriber_count: AtomicUsize,
    rate: Mutex<RateWindow>,
    epoch: Instant,
}

impl IngestionPlane {
    pub fn new(config: IngestConfig) -> Self {
        Self {
            ring: Mutex::new(RingBuffer::new(config.ring_capacity)),
            config,
            routes: DashMap::new(),
            running: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            total_packets: AtomicU64::new(0),
            last_ingest_nanos: AtomicU64::new(0),
            dispatch_dropped: AtomicU64::new(0),
            handler_failures: Arc::new(AtomicU64::new(0)),
            subscriber_count: AtomicUsize::new(0),
            rate: Mutex::new(RateWindow::default()),
            epoch: Instant::now(),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn start(&self) {
        if !self.running.swap(true, Ordering::AcqRel) {
            info!(
                "Ingestion plane started (ring={}, max_subscribers={})",
                self.config.ring_capacity, self.config.max_subscribers
            );
        }
    }

    /// Stop accepting packets. Subscriptions stay registered.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!(
                "Ingestion plane stopped after {} packets",
                self.total_packets.load(Ordering::Relaxed)
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Buffer the event and fan it out to every subscriber of `channel`.
    ///
    /// Returns the packet's sequence number.
    pub fn ingest(&self, channel: &str, event: FeedEvent) -> Result<u64, TransportError> {
        if !self.is_running() {
            return Err(TransportError::Stopped);
        }
        let started = Instant::now();

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let packet = Packet {
            channel: Arc::from(channel),
            sequence,
            received_at: Utc::now(),
            event: Arc::new(event),
        };

        self.ring.lock().push(packet.clone());

        let mut closed = false;
        if let Some(routes) = self.routes.get(channel) {
            for route in routes.iter() {
                match route.offer(&packet) {
                    Offer::Delivered => {}
                    Offer::Dropped => {
                        self.dispatch_dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Offer::Closed => closed = true,
                }
            }
        }
        if closed {
            self.prune_closed(channel);
        }

        self.total_packets.fetch_add(1, Ordering::Relaxed);
        self.rate.lock().record(self.epoch.elapsed());
        self.last_ingest_nanos
            .store(started.elapsed().as_nanos() as u64, Ordering::Relaxed);

        Ok(sequence)
    }

    /// Register a callback subscriber running on its own tokio task
    pub fn subscribe<H: PacketHandler>(
        &self,
        channel: &str,
        handler: H,
    ) -> Result<SubscriptionId, TransportError> {
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let (id, rx, active) = self.register(channel)?;
        runtime.spawn(run_handler(
            id,
            rx,
            active,
            handler,
            self.handler_failures.clone(),
        ));
        Ok(id)
    }

    /// Register a queue subscriber; the caller drives the receiver
    pub fn subscribe_queue(&self, channel: &str) -> Result<SubscriptionReceiver, TransportError> {
        let (id, rx, active) = self.register(channel)?;
        Ok(SubscriptionReceiver::new(id, rx, active))
    }

    /// Revoke a subscription. Takes effect before the next delivery.
    pub fn unsubscribe(&self, channel: &str, id: SubscriptionId) -> bool {
        let removed = match self.routes.get_mut(channel) {
            Some(mut routes) => match routes.iter().position(|r| r.id == id) {
                Some(idx) => {
                    let route = routes.remove(idx);
                    route.deactivate();
                    true
                }
                None => false,
            },
            None => false,
        };
        if removed {
            self.subscriber_count.fetch_sub(1, Ordering::AcqRel);
            self.routes.remove_if(channel, |_, routes| routes.is_empty());
            info!("Unsubscribed {} from {}", id, channel);
        }
        removed
    }

    /// Remove every route on `channel` without revoking it.
    ///
    /// Queue subscribers keep whatever is already buffered and see the end
    /// of the stream once it is drained. Returns the number of routes closed.
    pub fn close_channel(&self, channel: &str) -> usize {
        let closed = self
            .routes
            .remove(channel)
            .map(|(_, routes)| routes.len())
            .unwrap_or(0);
        if closed > 0 {
            self.subscriber_count.fetch_sub(closed, Ordering::AcqRel);
            info!("Closed {} subscriber(s) on {}", closed, channel);
        }
        closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::Acquire)
    }

    /// The newest `n` buffered packets, oldest first
    pub fn recent(&self, n: usize) -> Vec<Packet> {
        self.ring.lock().newest(n).cloned().collect()
    }

    pub fn telemetry(&self) -> Telemetry {
        let (ring_len, ring_dropped) = {
            let ring = self.ring.lock();
            (ring.len(), ring.overwritten())
        };
        let subscriber_count = self.subscriber_count();
        let buffer_pressure = if self.config.max_subscribers == 0 {
            0.0
        } else {
            subscriber_count as f64 / self.config.max_subscribers as f64
        };

        Telemetry {
            total_packets: self.total_packets.load(Ordering::Relaxed),
            packets_per_sec: self.rate.lock().per_second(self.epoch.elapsed()),
            last_ingest_nanos: self.last_ingest_nanos.load(Ordering::Relaxed),
            buffer_pressure,
            ring_len,
            ring_dropped,
            dispatch_dropped: self.dispatch_dropped.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            subscriber_count,
        }
    }

    fn register(
        &self,
        channel: &str,
    ) -> Result<(SubscriptionId, mpsc::Receiver<Packet>, Arc<AtomicBool>), TransportError> {
        let max = self.config.max_subscribers;
        self.subscriber_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .map_err(|_| TransportError::SubscriberLimit(max))?;

        let (route, rx, active) = Route::new(self.config.subscriber_queue_capacity);
        let id = route.id;
        self.routes.entry(channel.to_string()).or_default().push(route);
        info!("Subscribed {} to {}", id, channel);
        Ok((id, rx, active))
    }

    /// Drop routes whose receiving side has gone away
    fn prune_closed(&self, channel: &str) {
        let mut pruned = 0;
        if let Some(mut routes) = self.routes.get_mut(channel) {
            let before = routes.len();
            routes.retain(|r| r.is_open());
            pruned = before - routes.len();
        }
        if pruned > 0 {
            self.subscriber_count.fetch_sub(pruned, Ordering::AcqRel);
            self.routes.remove_if(channel, |_, routes| routes.is_empty());
            debug!("Pruned {} closed subscriber(s) from {}", pruned, channel);
        }
    }
}

impl Default for IngestionPlane {
    fn default() -> Self {
        Self::new(IngestConfig::default())
    }
}
