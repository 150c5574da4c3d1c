//! Integration tests for the forensics engine
//!
//! Drives the engine through raw exchange messages only and checks what
//! the polling surface and event stream report.

use argus_core::TradeTick;
use argus_gateway::{GatewayError, IngestConfig, MemoryFeed, TransportError};
use argus_runner::{
    EngineError, ForensicEvent, ForensicsConfig, ForensicsEngine, SyntheticConfig, SyntheticFeed,
};
use argus_surveillance::ToxicityStatus;
use approx::assert_relative_eq;
use std::time::Duration;

fn trade(symbol: &str, price: f64, qty: f64, buyer_maker: bool, ts: i64) -> String {
    format!(
        r#"{{"stream":"{}@trade","data":{{"e":"trade","E":{ts},"s":"{}","p":"{}","q":"{}","T":{ts},"m":{}}}}}"#,
        symbol.to_lowercase(),
        symbol,
        price,
        qty,
        buyer_maker,
        ts = ts
    )
}

fn depth(symbol: &str, ts: i64) -> String {
    format!(
        r#"{{"stream":"{}@depth5","data":{{"lastUpdateId":1,"E":{},"bids":[["100.0","1.0"],["99.0","10.0"],["98.0","1.0"]],"asks":[["101.0","1.0"],["102.0","1.0"],["103.0","1.0"]]}}}}"#,
        symbol.to_lowercase(),
        ts
    )
}

fn config(instruments: &[&str], auto_track: bool) -> ForensicsConfig {
    ForensicsConfig {
        instruments: instruments.iter().map(|s| s.to_string()).collect(),
        auto_track,
        ..ForensicsConfig::default()
    }
}

#[tokio::test]
async fn test_configured_instruments_are_tracked_and_reported() {
    let _ = env_logger::builder().is_test(true).try_init();
    let engine = ForensicsEngine::new(config(&["BTCUSDT", "ETHUSDT"], false)).unwrap();
    engine.start().unwrap();
    assert_eq!(engine.tracked(), vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
    assert_eq!(engine.telemetry().subscriber_count, 2);

    // Tracking twice is a no-op
    assert!(!engine.track("BTCUSDT").unwrap());

    for i in 0..15 {
        engine
            .ingest_raw(&trade("BTCUSDT", 100.0 + i as f64, 10.0, false, i))
            .unwrap();
    }
    engine.ingest_raw(&depth("ETHUSDT", 1)).unwrap();

    let reports = engine.shutdown().await;
    assert_eq!(reports.len(), 2);

    let btc = &reports[0];
    assert_eq!(btc.instrument, "BTCUSDT");
    assert_eq!(btc.stats.trades, 15);
    assert_eq!(btc.toxicity.status, ToxicityStatus::Toxic);
    assert_relative_eq!(btc.toxicity.score, 1.0);
    assert_eq!(btc.last_price, Some(114.0));

    let eth = &reports[1];
    assert_eq!(eth.stats.books, 1);
    assert_eq!(eth.setups.len(), 1);
    assert!(eth.book.as_ref().unwrap().dominant_wall.is_some());

    assert_eq!(engine.telemetry().total_packets, 16);
    assert_eq!(engine.telemetry().subscriber_count, 0);
}

#[tokio::test]
async fn test_auto_track_follows_the_feed() {
    let engine = ForensicsEngine::new(config(&[], true)).unwrap();
    engine.start().unwrap();
    assert!(engine.tracked().is_empty());

    engine.ingest_raw(&trade("SOLUSDT", 20.0, 1.0, true, 1)).unwrap();
    assert!(engine.is_tracked("SOLUSDT"));

    let reports = engine.shutdown().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].stats.trades, 1);
}

#[tokio::test]
async fn test_untracked_instrument_is_buffered_but_not_analyzed() {
    let engine = ForensicsEngine::new(config(&["BTCUSDT"], false)).unwrap();
    engine.start().unwrap();

    assert_eq!(engine.ingest_raw(&trade("XRPUSDT", 0.5, 1.0, true, 1)).unwrap(), 1);
    assert!(!engine.is_tracked("XRPUSDT"));

    let reports = engine.shutdown().await;
    assert!(reports.is_empty());
    assert_eq!(engine.telemetry().ring_len, 1);
}

#[tokio::test]
async fn test_untrack_discards_state() {
    let engine = ForensicsEngine::new(config(&["BTCUSDT"], false)).unwrap();
    engine.start().unwrap();
    engine.ingest_raw(&trade("BTCUSDT", 100.0, 1.0, false, 1)).unwrap();

    for _ in 0..200 {
        if engine.report("BTCUSDT").is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(engine.report("BTCUSDT").is_some());

    assert!(engine.untrack("BTCUSDT").await);
    assert!(!engine.untrack("BTCUSDT").await);
    assert!(engine.report("BTCUSDT").is_none());
    assert_eq!(engine.telemetry().subscriber_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_untrack_mid_stream_leaves_no_report_behind() {
    let engine = ForensicsEngine::new(config(&["BTCUSDT"], false)).unwrap();
    engine.start().unwrap();
    for i in 0..500 {
        engine
            .ingest_raw(&trade("BTCUSDT", 100.0 + (i % 7) as f64, 1.0, i % 2 == 0, i))
            .unwrap();
    }

    // Worker is still draining its queue on another thread
    assert!(engine.untrack("BTCUSDT").await);
    assert!(engine.report("BTCUSDT").is_none());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(engine.report("BTCUSDT").is_none());
    assert!(engine.reports().is_empty());
    assert!(!engine.is_tracked("BTCUSDT"));
}

#[tokio::test]
async fn test_auto_track_limit_skips_instrument_without_stalling_feed() {
    let engine = ForensicsEngine::new(ForensicsConfig {
        ingest: IngestConfig {
            max_subscribers: 1,
            ..IngestConfig::default()
        },
        ..config(&[], true)
    })
    .unwrap();
    engine.start().unwrap();

    let mut feed = MemoryFeed::new(vec![
        trade("BTCUSDT", 100.0, 1.0, false, 1),
        trade("ETHUSDT", 2000.0, 1.0, false, 2),
        trade("BTCUSDT", 100.5, 1.0, true, 3),
        trade("BTCUSDT", 101.0, 1.0, false, 4),
    ]);
    let summary = engine.run_feed(&mut feed).await.unwrap();
    assert_eq!(summary.accepted, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.rejected, 0);
    assert_eq!(engine.skipped("ETHUSDT"), 1);
    assert_eq!(engine.skipped("BTCUSDT"), 0);
    assert!(!engine.is_tracked("ETHUSDT"));

    // Skipped message still reached the ring
    assert_eq!(engine.telemetry().total_packets, 4);
    assert_eq!(engine.telemetry().ring_len, 4);

    // Direct ingestion keeps going as well
    engine
        .ingest_raw(&trade("ETHUSDT", 2001.0, 1.0, true, 5))
        .unwrap();
    assert_eq!(engine.skipped("ETHUSDT"), 2);

    let reports = engine.shutdown().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].instrument, "BTCUSDT");
    assert_eq!(reports[0].stats.trades, 3);
}

#[tokio::test]
async fn test_event_stream_carries_verdicts() {
    let engine = ForensicsEngine::new(config(&["BTCUSDT"], false)).unwrap();
    let mut events = engine.events();
    engine.start().unwrap();

    let sequence = engine
        .ingest_raw(&trade("BTCUSDT", 100.0, 1.0, false, 1))
        .unwrap();

    let mut saw_verdict = false;
    while let Ok(Ok(event)) =
        tokio::time::timeout(Duration::from_secs(1), events.recv()).await
    {
        assert_eq!(event.instrument, "BTCUSDT");
        assert_eq!(event.sequence, sequence);
        if matches!(event.event, ForensicEvent::Verdict(_)) {
            saw_verdict = true;
            break;
        }
    }
    assert!(saw_verdict);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_run_feed_skips_rejected_messages() {
    let engine = ForensicsEngine::new(config(&["BTCUSDT"], false)).unwrap();
    engine.start().unwrap();

    let mut feed = MemoryFeed::new(vec![
        trade("BTCUSDT", 100.0, 1.0, false, 1),
        "{not json".to_string(),
        r#"{"stream":"btcusdt@kline_1m","data":{}}"#.to_string(),
        trade("BTCUSDT", 100.0, 0.0, false, 2),
        trade("BTCUSDT", 101.0, 1.0, true, 3),
    ]);
    let summary = engine.run_feed(&mut feed).await.unwrap();
    assert_eq!(summary.accepted, 2);
    assert_eq!(summary.rejected, 3);

    let reports = engine.shutdown().await;
    assert_eq!(reports[0].stats.trades, 2);
    assert_eq!(reports[0].stats.malformed, 0);
}

#[tokio::test]
async fn test_synthetic_session_end_to_end() {
    let engine = ForensicsEngine::new(config(&["BTCUSDT", "ETHUSDT"], true)).unwrap();
    engine.start().unwrap();

    let mut feed = SyntheticFeed::with_seed(SyntheticConfig::default(), 2_000, 11);
    let summary = engine.run_feed(&mut feed).await.unwrap();
    assert_eq!(summary.accepted, 2_000);
    assert_eq!(summary.rejected, 0);

    let reports = engine.shutdown().await;
    assert_eq!(reports.len(), 2);
    let processed: u64 = reports
        .iter()
        .map(|r| r.stats.trades + r.stats.books)
        .sum();
    assert_eq!(processed, 2_000);
    for report in &reports {
        let verdict = report.verdict.as_ref().unwrap();
        assert!(verdict.conviction_score <= 100);
        assert_eq!(report.stats.out_of_order, 0);
    }
    assert_eq!(engine.telemetry().dispatch_dropped, 0);
}

#[tokio::test]
async fn test_ingest_after_shutdown_is_rejected() {
    let engine = ForensicsEngine::new(config(&["BTCUSDT"], true)).unwrap();
    engine.start().unwrap();
    engine.shutdown().await;

    let err = engine
        .ingest(TradeTick::new("BTCUSDT", 100.0, 1.0, false, 1).into())
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Gateway(GatewayError::Transport(TransportError::Stopped))
    ));
    assert!(!engine.is_tracked("BTCUSDT"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut bad = ForensicsConfig::default();
    bad.toxicity.bucket_size = 0.0;
    assert!(matches!(ForensicsEngine::new(bad), Err(EngineError::Config(_))));
}

#[test]
fn test_tracking_requires_runtime() {
    let engine = ForensicsEngine::new(config(&[], false)).unwrap();
    assert!(matches!(
        engine.track("BTCUSDT"),
        Err(EngineError::Gateway(GatewayError::Transport(TransportError::NoRuntime)))
    ));
}
