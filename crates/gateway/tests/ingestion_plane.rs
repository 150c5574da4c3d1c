//! Integration tests for the ingestion plane
//!
//! Exercises fan-out, subscriber isolation, backpressure and revocation
//! through the public API only.

use argus_core::{BookSnapshot, FeedEvent, TradeTick};
use argus_gateway::{
    HandlerError, IngestConfig, IngestionPlane, Packet, Subjects, TransportError,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn trade(ts: i64) -> FeedEvent {
    TradeTick::new("BTCUSDT", 100.0, 1.0, false, ts).into()
}

fn book(ts: i64) -> FeedEvent {
    BookSnapshot::new("BTCUSDT", vec![(100.0, 1.0)], vec![(100.5, 1.0)], ts).into()
}

fn plane(config: IngestConfig) -> IngestionPlane {
    let plane = IngestionPlane::new(config);
    plane.start();
    plane
}

async fn wait_for(counter: &AtomicUsize, expected: usize) {
    for _ in 0..200 {
        if counter.load(Ordering::SeqCst) >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_fan_out_isolates_failing_subscribers() {
    let _ = env_logger::try_init();
    let plane = plane(IngestConfig::default());
    let channel = Subjects::market_data("BTCUSDT");

    let healthy = Arc::new(AtomicUsize::new(0));
    let seen = healthy.clone();
    plane
        .subscribe(&channel, move |_: &Packet| -> Result<(), HandlerError> {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    plane
        .subscribe(&channel, |_: &Packet| -> Result<(), HandlerError> {
            Err("always fails".into())
        })
        .unwrap();

    plane
        .subscribe(&channel, |packet: &Packet| -> Result<(), HandlerError> {
            if packet.sequence == 2 {
                panic!("boom");
            }
            Ok(())
        })
        .unwrap();

    for ts in 0..5 {
        plane.ingest(&channel, trade(ts)).unwrap();
    }

    wait_for(&healthy, 5).await;
    assert_eq!(healthy.load(Ordering::SeqCst), 5);

    // 5 errors from the failing handler, 1 panic
    for _ in 0..200 {
        if plane.telemetry().handler_failures >= 6 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let telemetry = plane.telemetry();
    assert_eq!(telemetry.handler_failures, 6);
    assert_eq!(telemetry.total_packets, 5);
    assert_eq!(telemetry.subscriber_count, 3);
}

#[tokio::test]
async fn test_queue_preserves_arrival_order_per_channel() {
    let plane = plane(IngestConfig::default());
    let channel = Subjects::market_data("BTCUSDT");
    let mut rx = plane.subscribe_queue(&channel).unwrap();

    plane.ingest(&channel, book(1)).unwrap();
    plane.ingest(&channel, trade(2)).unwrap();
    plane.ingest(&channel, book(3)).unwrap();
    plane.ingest("md.ETHUSDT", trade(4)).unwrap();

    let mut timestamps = Vec::new();
    while let Some(packet) = rx.try_recv() {
        timestamps.push(packet.event.exchange_timestamp_ms());
    }
    assert_eq!(timestamps, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_ring_overwrites_oldest() {
    let plane = plane(IngestConfig {
        ring_capacity: 3,
        ..IngestConfig::default()
    });

    for ts in 0..5 {
        plane.ingest("md.BTCUSDT", trade(ts)).unwrap();
    }

    let telemetry = plane.telemetry();
    assert_eq!(telemetry.ring_len, 3);
    assert_eq!(telemetry.ring_dropped, 2);

    let recent: Vec<i64> = plane
        .recent(2)
        .iter()
        .map(|p| p.event.exchange_timestamp_ms())
        .collect();
    assert_eq!(recent, vec![3, 4]);
}

#[tokio::test]
async fn test_full_subscriber_queue_drops_without_blocking() {
    let plane = plane(IngestConfig {
        subscriber_queue_capacity: 2,
        ..IngestConfig::default()
    });
    let channel = Subjects::market_data("BTCUSDT");
    let mut slow = plane.subscribe_queue(&channel).unwrap();

    for ts in 0..5 {
        plane.ingest(&channel, trade(ts)).unwrap();
    }

    assert_eq!(plane.telemetry().dispatch_dropped, 3);
    assert_eq!(slow.try_recv().map(|p| p.sequence), Some(1));
    assert_eq!(slow.try_recv().map(|p| p.sequence), Some(2));
    assert!(slow.try_recv().is_none());
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery_immediately() {
    let plane = plane(IngestConfig::default());
    let channel = Subjects::market_data("BTCUSDT");
    let mut rx = plane.subscribe_queue(&channel).unwrap();

    plane.ingest(&channel, trade(1)).unwrap();
    assert!(plane.unsubscribe(&channel, rx.id()));
    assert!(!plane.unsubscribe(&channel, rx.id()));

    // Already queued packet is discarded once revoked
    assert!(!rx.is_active());
    assert!(rx.recv().await.is_none());
    assert_eq!(plane.subscriber_count(), 0);

    plane.ingest(&channel, trade(2)).unwrap();
    assert_eq!(plane.telemetry().dispatch_dropped, 0);
}

#[tokio::test]
async fn test_dropped_receiver_is_pruned() {
    let plane = plane(IngestConfig::default());
    let channel = Subjects::market_data("BTCUSDT");
    let rx = plane.subscribe_queue(&channel).unwrap();
    assert_eq!(plane.subscriber_count(), 1);

    drop(rx);
    plane.ingest(&channel, trade(1)).unwrap();
    assert_eq!(plane.subscriber_count(), 0);
}

#[tokio::test]
async fn test_close_channel_lets_queue_drain() {
    let plane = plane(IngestConfig::default());
    let channel = Subjects::market_data("BTCUSDT");
    let mut rx = plane.subscribe_queue(&channel).unwrap();

    plane.ingest(&channel, trade(1)).unwrap();
    plane.ingest(&channel, book(2)).unwrap();
    assert_eq!(plane.close_channel(&channel), 1);
    assert_eq!(plane.close_channel(&channel), 0);
    assert_eq!(plane.subscriber_count(), 0);

    // Buffered packets are still delivered, then the stream ends
    assert!(rx.is_active());
    assert_eq!(rx.recv().await.map(|p| p.sequence), Some(1));
    assert_eq!(rx.recv().await.map(|p| p.sequence), Some(2));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_subscriber_limit_and_pressure() {
    let plane = plane(IngestConfig {
        max_subscribers: 2,
        ..IngestConfig::default()
    });

    let _a = plane.subscribe_queue("md.A").unwrap();
    assert_eq!(plane.telemetry().buffer_pressure, 0.5);
    let _b = plane.subscribe_queue("md.B").unwrap();
    assert_eq!(plane.telemetry().buffer_pressure, 1.0);

    assert!(matches!(
        plane.subscribe_queue("md.C"),
        Err(TransportError::SubscriberLimit(2))
    ));
}

#[tokio::test]
async fn test_ingest_after_stop_is_rejected() {
    let plane = plane(IngestConfig::default());
    assert_eq!(plane.ingest("md.BTCUSDT", trade(1)), Ok(1));

    plane.stop();
    assert!(!plane.is_running());
    assert_eq!(
        plane.ingest("md.BTCUSDT", trade(2)),
        Err(TransportError::Stopped)
    );

    plane.start();
    assert_eq!(plane.ingest("md.BTCUSDT", trade(3)), Ok(2));
}

#[test]
fn test_callback_subscriber_requires_runtime() {
    let plane = plane(IngestConfig::default());
    let result = plane.subscribe("md.BTCUSDT", |_: &Packet| -> Result<(), HandlerError> { Ok(()) });
    assert_eq!(result, Err(TransportError::NoRuntime));
}
