//! Synthetic Binance-format feed
//!
//! Generates a reproducible stream of raw exchange messages:
//! - Trades on a random walk with random sizes and aggressors
//! - Periodic partial-depth snapshots around the last price, with the
//!   occasional resting wall
//! - Occasional bursts of same-price, same-side prints that look like a
//!   hidden order being worked
//!
//! Output goes through the same feed adapter as live data.

use argus_gateway::{FeedError, FeedSource};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

/// Configuration for the synthetic feed
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub instruments: Vec<String>,
    pub start_price: f64,
    /// Max relative move per trade (0.0005 = 0.05%)
    pub volatility: f64,
    /// Every n-th message is a depth snapshot
    pub book_every: u64,
    /// Levels per side, at most 20
    pub depth_levels: usize,
    /// Chance per trade of starting an absorption burst
    pub burst_probability: f64,
    pub burst_length: usize,
    /// Chance per snapshot of posting a wall
    pub wall_probability: f64,
    /// Mean gap between messages
    pub interval_ms: i64,
    pub start_timestamp_ms: i64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            instruments: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            start_price: 50_000.0,
            volatility: 0.0005,
            book_every: 10,
            depth_levels: 10,
            burst_probability: 0.01,
            burst_length: 80,
            wall_probability: 0.15,
            interval_ms: 20,
            start_timestamp_ms: 1_700_000_000_000,
        }
    }
}

struct Track {
    symbol: String,
    price: f64,
    burst_remaining: usize,
    burst_price: f64,
    burst_sell: bool,
}

/// Seeded generator of raw exchange messages
pub struct SyntheticFeed {
    config: SyntheticConfig,
    tracks: Vec<Track>,
    rng: StdRng,
    remaining: usize,
    emitted: u64,
    clock_ms: i64,
}

impl SyntheticFeed {
    /// Create a feed of `messages` messages from entropy
    pub fn new(config: SyntheticConfig, messages: usize) -> Self {
        Self::build(config, messages, StdRng::from_entropy())
    }

    /// Create with a specific seed for reproducible runs
    pub fn with_seed(config: SyntheticConfig, messages: usize, seed: u64) -> Self {
        Self::build(config, messages, StdRng::seed_from_u64(seed))
    }

    fn build(config: SyntheticConfig, messages: usize, rng: StdRng) -> Self {
        let tracks = config
            .instruments
            .iter()
            .enumerate()
            .map(|(i, symbol)| Track {
                symbol: symbol.to_uppercase(),
                // Spread instruments apart so their prices never coincide
                price: round2(config.start_price / (i as f64 + 1.0)),
                burst_remaining: 0,
                burst_price: 0.0,
                burst_sell: false,
            })
            .collect();
        Self {
            clock_ms: config.start_timestamp_ms,
            config,
            tracks,
            rng,
            remaining: messages,
            emitted: 0,
        }
    }

    /// Messages left to emit
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn trade(&mut self, idx: usize) -> String {
        let volatility = self.config.volatility;
        let burst_probability = self.config.burst_probability.clamp(0.0, 1.0);
        let burst_length = self.config.burst_length;
        let ts = self.clock_ms;
        let track = &mut self.tracks[idx];

        let (price, quantity, sell) = if track.burst_remaining > 0 {
            track.burst_remaining -= 1;
            (track.burst_price, 0.05, track.burst_sell)
        } else {
            let change: f64 = self.rng.gen_range(-1.0..1.0);
            track.price = round2((track.price * (1.0 + volatility * change)).max(0.01));
            if self.rng.gen_bool(burst_probability) {
                track.burst_remaining = burst_length;
                track.burst_price = track.price;
                track.burst_sell = self.rng.gen_bool(0.5);
            }
            let quantity = (self.rng.gen_range(0.001..1.0f64) * 1e4).round() / 1e4;
            (track.price, quantity.max(0.0001), self.rng.gen_bool(0.5))
        };

        json!({
            "stream": format!("{}@trade", track.symbol.to_lowercase()),
            "data": {
                "e": "trade",
                "E": ts,
                "s": track.symbol,
                "t": self.emitted,
                "p": format!("{:.2}", price),
                "q": format!("{:.4}", quantity),
                "T": ts,
                "m": sell,
            }
        })
        .to_string()
    }

    fn depth(&mut self, idx: usize) -> String {
        let levels = self.config.depth_levels.clamp(1, 20);
        let wall = self.rng.gen_bool(self.config.wall_probability.clamp(0.0, 1.0));
        let wall_on_bid = self.rng.gen_bool(0.5);
        let wall_level = self.rng.gen_range(1..=levels.min(5));
        let ts = self.clock_ms;
        let track = &self.tracks[idx];
        let step = (track.price * 0.0001).max(0.01);

        let mut bids = Vec::with_capacity(levels);
        let mut asks = Vec::with_capacity(levels);
        for i in 0..levels {
            let offset = step * (i as f64 + 1.0);
            let mut bid_qty: f64 = self.rng.gen_range(0.5..5.0);
            let mut ask_qty: f64 = self.rng.gen_range(0.5..5.0);
            if wall && i == wall_level {
                if wall_on_bid {
                    bid_qty *= 8.0;
                } else {
                    ask_qty *= 8.0;
                }
            }
            bids.push([
                format!("{:.2}", track.price - offset),
                format!("{:.4}", bid_qty),
            ]);
            asks.push([
                format!("{:.2}", track.price + offset),
                format!("{:.4}", ask_qty),
            ]);
        }

        json!({
            "stream": format!("{}@depth{}", track.symbol.to_lowercase(), stream_depth(levels)),
            "data": {
                "lastUpdateId": self.emitted,
                "E": ts,
                "bids": bids,
                "asks": asks,
            }
        })
        .to_string()
    }
}

impl Iterator for SyntheticFeed {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.remaining == 0 || self.tracks.is_empty() {
            return None;
        }
        self.remaining -= 1;
        self.emitted += 1;
        self.clock_ms += self.rng.gen_range(1..=self.config.interval_ms.max(1) * 2);

        let idx = self.rng.gen_range(0..self.tracks.len());
        let every = self.config.book_every.max(1);
        Some(if self.emitted % every == 0 {
            self.depth(idx)
        } else {
            self.trade(idx)
        })
    }
}

#[async_trait]
impl FeedSource for SyntheticFeed {
    async fn next_message(&mut self) -> Result<Option<String>, FeedError> {
        Ok(self.next())
    }
}

/// Smallest published partial depth holding `levels`
fn stream_depth(levels: usize) -> usize {
    match levels {
        0..=5 => 5,
        6..=10 => 10,
        _ => 20,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::FeedEvent;
    use argus_gateway::FeedAdapter;

    #[test]
    fn test_seeded_feed_is_reproducible() {
        let a: Vec<_> = SyntheticFeed::with_seed(SyntheticConfig::default(), 200, 7).collect();
        let b: Vec<_> = SyntheticFeed::with_seed(SyntheticConfig::default(), 200, 7).collect();
        assert_eq!(a.len(), 200);
        assert_eq!(a, b);

        let c: Vec<_> = SyntheticFeed::with_seed(SyntheticConfig::default(), 200, 8).collect();
        assert_ne!(a, c);
    }

    #[test]
    fn test_messages_normalize() {
        let adapter = FeedAdapter::new();
        let mut trades = 0;
        let mut books = 0;
        for raw in SyntheticFeed::with_seed(SyntheticConfig::default(), 500, 42) {
            match adapter.normalize(&raw).unwrap() {
                FeedEvent::Trade(_) => trades += 1,
                FeedEvent::Book(book) => {
                    assert_eq!(book.bids.len(), 10);
                    assert!(book.best_bid() < book.best_ask());
                    books += 1;
                }
            }
        }
        assert_eq!(books, 50);
        assert_eq!(trades, 450);
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let adapter = FeedAdapter::new();
        let mut last = i64::MIN;
        for raw in SyntheticFeed::with_seed(SyntheticConfig::default(), 300, 3) {
            let ts = adapter.normalize(&raw).unwrap().exchange_timestamp_ms();
            assert!(ts > last);
            last = ts;
        }
    }

    #[test]
    fn test_odd_depth_uses_partial_stream_name() {
        let config = SyntheticConfig {
            depth_levels: 7,
            book_every: 1,
            ..SyntheticConfig::default()
        };
        let adapter = FeedAdapter::new();
        let raw = SyntheticFeed::with_seed(config, 1, 9).next().unwrap();
        assert!(raw.contains("@depth10"));
        match adapter.normalize(&raw).unwrap() {
            FeedEvent::Book(book) => assert_eq!(book.asks.len(), 7),
            other => panic!("Expected book, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_feed_source_exhausts() {
        let mut feed = SyntheticFeed::with_seed(SyntheticConfig::default(), 3, 1);
        assert!(feed.next_message().await.unwrap().is_some());
        assert!(feed.next_message().await.unwrap().is_some());
        assert!(feed.next_message().await.unwrap().is_some());
        assert!(feed.next_message().await.unwrap().is_none());
        assert_eq!(feed.remaining(), 0);
    }
}
