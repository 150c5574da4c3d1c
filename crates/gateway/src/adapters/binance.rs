//! Binance-format stream normalization
//!
//! Handles combined-stream envelopes (`{"stream": ..., "data": ...}`) as
//! well as bare payloads carrying an `e` event type.

use crate::error::FeedError;
use argus_core::{BookSnapshot, FeedEvent, TimestampMs, TradeTick};
use chrono::Utc;
use serde_json::Value;

/// Parses one stream family into a canonical event
pub trait StreamParser: Send + Sync {
    fn can_parse(&self, stream: &str) -> bool;
    fn parse(&self, stream: &str, data: &Value) -> Result<FeedEvent, FeedError>;
}

/// `<symbol>@trade` and `<symbol>@aggTrade`
pub struct TradeParser;

impl StreamParser for TradeParser {
    fn can_parse(&self, stream: &str) -> bool {
        let stream = stream.to_lowercase();
        stream.contains("@trade") || stream.contains("@aggtrade")
    }

    fn parse(&self, stream: &str, data: &Value) -> Result<FeedEvent, FeedError> {
        let instrument = instrument(stream, data)?;
        let price = number(data, "p")?;
        let quantity = number(data, "q")?;
        // Buyer was the maker, so the seller hit the bid
        let is_buyer_maker = data
            .get("m")
            .and_then(Value::as_bool)
            .ok_or(FeedError::MissingField("m"))?;
        let timestamp = timestamp(data, &["T", "E"]).ok_or(FeedError::MissingField("T"))?;

        Ok(TradeTick::new(instrument, price, quantity, is_buyer_maker, timestamp).into())
    }
}

/// `<symbol>@depth<N>[@<speed>ms]` partial book snapshots.
///
/// Diff streams (`@depth`, `@depth@100ms`, bare `depthUpdate`) only list
/// changed levels and are not accepted.
pub struct DepthParser;

impl StreamParser for DepthParser {
    fn can_parse(&self, stream: &str) -> bool {
        is_partial_depth(stream)
    }

    fn parse(&self, stream: &str, data: &Value) -> Result<FeedEvent, FeedError> {
        let instrument = instrument(stream, data)?;
        let bids = data
            .get("bids")
            .or_else(|| data.get("b"))
            .ok_or(FeedError::MissingField("bids"))?;
        let asks = data
            .get("asks")
            .or_else(|| data.get("a"))
            .ok_or(FeedError::MissingField("asks"))?;
        let timestamp =
            timestamp(data, &["E", "T"]).unwrap_or_else(|| Utc::now().timestamp_millis());

        Ok(BookSnapshot::new(
            instrument,
            price_levels(bids, "bids")?,
            price_levels(asks, "asks")?,
            timestamp,
        )
        .into())
    }
}

/// Normalizes raw exchange text into validated canonical events
pub struct FeedAdapter {
    parsers: Vec<Box<dyn StreamParser>>,
}

impl FeedAdapter {
    pub fn new() -> Self {
        Self {
            parsers: vec![Box::new(TradeParser), Box::new(DepthParser)],
        }
    }

    /// Parse, normalize and validate a single raw message.
    ///
    /// Anything that fails here never reaches analyzer state.
    pub fn normalize(&self, raw: &str) -> Result<FeedEvent, FeedError> {
        let value: Value = serde_json::from_str(raw)?;
        let (stream, data) = match (value.get("stream"), value.get("data")) {
            (Some(stream), Some(data)) => (
                stream
                    .as_str()
                    .ok_or(FeedError::MissingField("stream"))?
                    .to_string(),
                data,
            ),
            _ => (bare_stream_name(&value)?, &value),
        };

        let parser = self
            .parsers
            .iter()
            .find(|p| p.can_parse(&stream))
            .ok_or_else(|| FeedError::UnsupportedStream(stream.clone()))?;

        let event = parser.parse(&stream, data)?;
        event.validate()?;
        Ok(event)
    }
}

impl Default for FeedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Synthesize a stream name for payloads delivered without an envelope
fn bare_stream_name(value: &Value) -> Result<String, FeedError> {
    let event_type = value
        .get("e")
        .and_then(Value::as_str)
        .ok_or(FeedError::MissingField("e"))?;
    let symbol = value
        .get("s")
        .and_then(Value::as_str)
        .ok_or(FeedError::MissingField("s"))?
        .to_lowercase();

    match event_type {
        "trade" => Ok(format!("{}@trade", symbol)),
        "aggTrade" => Ok(format!("{}@aggTrade", symbol)),
        other => Err(FeedError::UnsupportedStream(other.to_string())),
    }
}

/// Partial depth levels Binance publishes
const PARTIAL_DEPTHS: [&str; 3] = ["depth5", "depth10", "depth20"];

fn is_partial_depth(stream: &str) -> bool {
    let stream = stream.to_lowercase();
    let mut parts = stream.split('@').skip(1);
    let levels = parts.next().is_some_and(|p| PARTIAL_DEPTHS.contains(&p));
    let speed = match parts.next() {
        None => true,
        Some(speed) => speed
            .strip_suffix("ms")
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())),
    };
    levels && speed && parts.next().is_none()
}

/// Symbol from the payload, else the stream prefix, uppercased
fn instrument(stream: &str, data: &Value) -> Result<String, FeedError> {
    let symbol = data
        .get("s")
        .and_then(Value::as_str)
        .or_else(|| stream.split('@').next())
        .filter(|s| !s.is_empty())
        .ok_or(FeedError::MissingField("s"))?;
    Ok(symbol.to_uppercase())
}

fn timestamp(data: &Value, fields: &[&str]) -> Option<TimestampMs> {
    fields
        .iter()
        .find_map(|field| data.get(*field).and_then(Value::as_i64))
}

/// Binance encodes decimals as strings; plain JSON numbers are accepted too
fn number(data: &Value, field: &'static str) -> Result<f64, FeedError> {
    let value = data.get(field).ok_or(FeedError::MissingField(field))?;
    parse_number(value, field)
}

fn parse_number(value: &Value, field: &'static str) -> Result<f64, FeedError> {
    match value {
        Value::String(s) => s.parse::<f64>().map_err(|_| FeedError::InvalidNumber {
            field,
            value: s.clone(),
        }),
        Value::Number(n) => n.as_f64().ok_or_else(|| FeedError::InvalidNumber {
            field,
            value: n.to_string(),
        }),
        other => Err(FeedError::InvalidNumber {
            field,
            value: other.to_string(),
        }),
    }
}

fn price_levels(value: &Value, field: &'static str) -> Result<Vec<(f64, f64)>, FeedError> {
    let arr = value.as_array().ok_or(FeedError::MissingField(field))?;
    let mut levels = Vec::with_capacity(arr.len());

    for item in arr {
        match item.as_array().map(Vec::as_slice) {
            Some([price, quantity, ..]) => {
                levels.push((parse_number(price, field)?, parse_number(quantity, field)?));
            }
            _ => return Err(FeedError::MissingField(field)),
        }
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::ValidationError;

    #[test]
    fn test_parser_routing() {
        assert!(TradeParser.can_parse("btcusdt@trade"));
        assert!(TradeParser.can_parse("btcusdt@aggTrade"));
        assert!(!TradeParser.can_parse("btcusdt@depth20"));
        assert!(DepthParser.can_parse("btcusdt@depth20@100ms"));
        assert!(DepthParser.can_parse("BTCUSDT@depth5"));
        assert!(DepthParser.can_parse("btcusdt@depth10@1000ms"));
        assert!(!DepthParser.can_parse("btcusdt@kline_1m"));
    }

    #[test]
    fn test_diff_depth_streams_are_unsupported() {
        assert!(!DepthParser.can_parse("btcusdt@depth"));
        assert!(!DepthParser.can_parse("btcusdt@depth@100ms"));
        assert!(!DepthParser.can_parse("btcusdt@depth15"));
        assert!(!DepthParser.can_parse("btcusdt@depth20@fast"));

        let adapter = FeedAdapter::new();
        let bare = r#"{"e":"depthUpdate","E":10,"s":"BTCUSDT","U":1,"u":2,"b":[["99.0","0"]],"a":[["101.0","0.5"]]}"#;
        assert!(matches!(
            adapter.normalize(bare),
            Err(FeedError::UnsupportedStream(s)) if s == "depthUpdate"
        ));
        let combined = r#"{"stream":"btcusdt@depth@100ms","data":{"e":"depthUpdate","E":10,"s":"BTCUSDT","b":[["99.0","0"]],"a":[["101.0","0.5"]]}}"#;
        assert!(matches!(
            adapter.normalize(combined),
            Err(FeedError::UnsupportedStream(s)) if s == "btcusdt@depth@100ms"
        ));
    }

    #[test]
    fn test_truncated_level_rejects_snapshot() {
        let adapter = FeedAdapter::new();
        let raw = r#"{"stream":"btcusdt@depth5","data":{"E":1,"bids":[["100.0","1"],["99.5"]],"asks":[["100.5","1"]]}}"#;
        assert!(matches!(
            adapter.normalize(raw),
            Err(FeedError::MissingField("bids"))
        ));
        let raw = r#"{"stream":"btcusdt@depth5","data":{"E":1,"bids":[["100.0","1"]],"asks":[[]]}}"#;
        assert!(matches!(
            adapter.normalize(raw),
            Err(FeedError::MissingField("asks"))
        ));
    }

    #[test]
    fn test_combined_trade() {
        let raw = r#"{"stream":"btcusdt@trade","data":{"e":"trade","E":1700000000001,"s":"BTCUSDT","t":1,"p":"50000.10","q":"0.25","T":1700000000000,"m":true}}"#;
        let event = FeedAdapter::new().normalize(raw).unwrap();

        match event {
            FeedEvent::Trade(tick) => {
                assert_eq!(tick.instrument, "BTCUSDT");
                assert_eq!(tick.price, 50000.10);
                assert_eq!(tick.quantity, 0.25);
                assert!(tick.is_sell_aggressor);
                assert_eq!(tick.exchange_timestamp_ms, 1_700_000_000_000);
            }
            other => panic!("Expected trade, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_depth_takes_instrument_from_stream() {
        let raw = r#"{"stream":"ethusdt@depth10","data":{"lastUpdateId":7,"E":42,"bids":[["2000.0","1.5"],["1999.5","2"]],"asks":[["2000.5","1"]]}}"#;
        let event = FeedAdapter::new().normalize(raw).unwrap();

        match event {
            FeedEvent::Book(book) => {
                assert_eq!(book.instrument, "ETHUSDT");
                assert_eq!(book.bids, vec![(2000.0, 1.5), (1999.5, 2.0)]);
                assert_eq!(book.asks, vec![(2000.5, 1.0)]);
                assert_eq!(book.exchange_timestamp_ms, 42);
            }
            other => panic!("Expected book, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_payload() {
        let raw = r#"{"e":"aggTrade","s":"SOLUSDT","p":"150","q":"3","T":5,"m":false}"#;
        let event = FeedAdapter::new().normalize(raw).unwrap();
        assert_eq!(event.instrument(), "SOLUSDT");
        assert_eq!(event.exchange_timestamp_ms(), 5);
    }

    #[test]
    fn test_rejects_malformed() {
        let adapter = FeedAdapter::new();

        assert!(matches!(
            adapter.normalize("not json"),
            Err(FeedError::InvalidJson(_))
        ));
        assert!(matches!(
            adapter.normalize(r#"{"stream":"btcusdt@kline_1m","data":{}}"#),
            Err(FeedError::UnsupportedStream(_))
        ));
        assert!(matches!(
            adapter.normalize(r#"{"stream":"btcusdt@trade","data":{"p":"abc","q":"1","T":1,"m":true}}"#),
            Err(FeedError::InvalidNumber { field: "p", .. })
        ));
        assert!(matches!(
            adapter.normalize(r#"{"stream":"btcusdt@depth5","data":{"bids":[],"asks":[["1","1"]]}}"#),
            Err(FeedError::Validation(ValidationError::EmptySide("bid")))
        ));
        assert!(matches!(
            adapter.normalize(r#"{"stream":"btcusdt@trade","data":{"p":"100","q":"0","T":1,"m":true}}"#),
            Err(FeedError::Validation(ValidationError::InvalidQuantity(_)))
        ));
    }
}
