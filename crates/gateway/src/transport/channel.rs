//! Per-subscription queues
//!
//! Each subscription is a bounded tokio mpsc queue plus an `active` flag.
//! Clearing the flag revokes the subscription immediately: packets still
//! sitting in the queue are discarded rather than delivered.

use super::Packet;
use crate::error::HandlerError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Identifier returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback-style subscriber
///
/// Runs on the subscription's own task. Errors and panics are contained
/// there and counted; they never propagate to the ingester.
pub trait PacketHandler: Send + Sync + 'static {
    fn handle(&self, packet: &Packet) -> Result<(), HandlerError>;
}

impl<F> PacketHandler for F
where
    F: Fn(&Packet) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    fn handle(&self, packet: &Packet) -> Result<(), HandlerError> {
        self(packet)
    }
}

/// Outcome of offering a packet to one route
pub(crate) enum Offer {
    Delivered,
    Dropped,
    Closed,
}

/// Sending half of a subscription, owned by the plane
pub(crate) struct Route {
    pub(crate) id: SubscriptionId,
    tx: mpsc::Sender<Packet>,
    active: Arc<AtomicBool>,
}

impl Route {
    pub(crate) fn new(capacity: usize) -> (Self, mpsc::Receiver<Packet>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let active = Arc::new(AtomicBool::new(true));
        let route = Self {
            id: SubscriptionId::new(),
            tx,
            active: active.clone(),
        };
        (route, rx, active)
    }

    /// Non-blocking hand-off
    pub(crate) fn offer(&self, packet: &Packet) -> Offer {
        if !self.active.load(Ordering::Acquire) {
            return Offer::Closed;
        }
        match self.tx.try_send(packet.clone()) {
            Ok(()) => Offer::Delivered,
            Err(TrySendError::Full(_)) => Offer::Dropped,
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.active.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Queue-style subscriber, used by pipeline workers that want explicit
/// message passing rather than callbacks.
pub struct SubscriptionReceiver {
    id: SubscriptionId,
    rx: mpsc::Receiver<Packet>,
    active: Arc<AtomicBool>,
}

impl SubscriptionReceiver {
    pub(crate) fn new(
        id: SubscriptionId,
        rx: mpsc::Receiver<Packet>,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self { id, rx, active }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next packet. Returns `None` once revoked or closed.
    pub async fn recv(&mut self) -> Option<Packet> {
        let packet = self.rx.recv().await?;
        self.is_active().then_some(packet)
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Option<Packet> {
        if !self.is_active() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Drive a callback subscriber until its queue closes or it is revoked
pub(crate) async fn run_handler<H: PacketHandler>(
    id: SubscriptionId,
    mut rx: mpsc::Receiver<Packet>,
    active: Arc<AtomicBool>,
    handler: H,
    failures: Arc<AtomicU64>,
) {
    while let Some(packet) = rx.recv().await {
        if !active.load(Ordering::Acquire) {
            break;
        }
        match std::panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&packet))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Subscriber {} failed on {} #{}: {}",
                    id, packet.channel, packet.sequence, e
                );
            }
            Err(_) => {
                failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Subscriber {} panicked on {} #{}",
                    id, packet.channel, packet.sequence
                );
            }
        }
    }
    debug!("Subscriber {} stopped", id);
}
