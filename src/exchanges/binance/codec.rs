use super::events::PartialDepthEvent;
use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::frame_text;
use crate::core::kernel::WsCodec;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::marker::PhantomData;
use tokio_tungstenite::tungstenite::Message;

fn parse_json<T: DeserializeOwned>(text: &str, what: &str) -> Result<T, ExchangeError> {
    serde_json::from_str(text).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to parse {}: {}", what, e))
    })
}

/// Symbol of a stream name: the uppercased part before the first `@`
pub fn symbol_from_stream(stream: &str) -> String {
    stream
        .split_once('@')
        .map_or(stream, |(prefix, _)| prefix)
        .to_uppercase()
}

/// Decodes every data frame of a single stream as one `T`
pub struct EventCodec<T> {
    _event: PhantomData<fn() -> T>,
}

impl<T> EventCodec<T> {
    pub fn new() -> Self {
        Self {
            _event: PhantomData,
        }
    }
}

impl<T> Default for EventCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned + Send + 'static> WsCodec for EventCodec<T> {
    type Message = T;

    fn decode_message(&self, message: Message) -> Result<Option<T>, ExchangeError> {
        match frame_text(&message)? {
            Some(text) => parse_json(text, "stream event").map(Some),
            None => Ok(None),
        }
    }
}

/// Partial depth on a single stream, tagged with the subscribed symbol
pub struct PartialDepthCodec {
    symbol: String,
}

impl PartialDepthCodec {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
        }
    }
}

impl WsCodec for PartialDepthCodec {
    type Message = PartialDepthEvent;

    fn decode_message(&self, message: Message) -> Result<Option<PartialDepthEvent>, ExchangeError> {
        let Some(text) = frame_text(&message)? else {
            return Ok(None);
        };
        let mut event: PartialDepthEvent = parse_json(text, "partial depth")?;
        event.symbol.clone_from(&self.symbol);
        Ok(Some(event))
    }
}

#[derive(Deserialize)]
struct CombinedFrame<T> {
    stream: String,
    data: T,
}

/// Event from a combined stream, tagged with its origin
#[derive(Debug, Clone)]
pub struct CombinedEvent<T> {
    /// Stream name, e.g. `btcusdt@depth`
    pub stream: String,
    /// Uppercased stream prefix, e.g. `BTCUSDT`
    pub symbol: String,
    pub data: T,
}

/// Decodes `{stream, data}` frames of a combined stream
pub struct CombinedCodec<T> {
    _event: PhantomData<fn() -> T>,
}

impl<T> CombinedCodec<T> {
    pub fn new() -> Self {
        Self {
            _event: PhantomData,
        }
    }
}

impl<T> Default for CombinedCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned + Send + 'static> WsCodec for CombinedCodec<T> {
    type Message = CombinedEvent<T>;

    fn decode_message(&self, message: Message) -> Result<Option<CombinedEvent<T>>, ExchangeError> {
        let Some(text) = frame_text(&message)? else {
            return Ok(None);
        };
        let frame: CombinedFrame<T> = parse_json(text, "combined stream frame")?;
        Ok(Some(CombinedEvent {
            symbol: symbol_from_stream(&frame.stream),
            stream: frame.stream,
            data: frame.data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::binance::events::{DepthUpdateEvent, KlineEvent};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_partial_depth_gets_symbol_from_subscription() {
        let codec = PartialDepthCodec::new("ethbtc");
        let frame = r#"{"lastUpdateId":160,"bids":[["0.0024","10",[]]],"asks":[["0.0026","100",[]]]}"#;

        let event = codec
            .decode_message(Message::Text(frame.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(event.symbol, "ETHBTC");
        assert_eq!(event.last_update_id, 160);
        assert_eq!(event.bids.len(), 1);
        assert_eq!(event.bids[0].price, Decimal::from_str("0.0024").unwrap());
        assert_eq!(event.bids[0].quantity, Decimal::from(10));
        assert_eq!(event.asks[0].price, Decimal::from_str("0.0026").unwrap());
        assert_eq!(event.asks[0].quantity, Decimal::from(100));
    }

    #[test]
    fn test_combined_depth_symbol_from_stream_prefix() {
        let codec = CombinedCodec::<DepthUpdateEvent>::new();
        let frame = r#"{"stream":"btcusdt@depth","data":{"e":"depthUpdate","E":1629769560797,
            "s":"BTCUSDT","U":13544035,"u":13544037,"b":[["49095.23","0.0102"]],"a":[]}}"#;

        let event = codec
            .decode_message(Message::Text(frame.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(event.symbol, "BTCUSDT");
        assert_eq!(event.stream, "btcusdt@depth");
        assert_eq!(event.data.first_update_id, 13_544_035);
        assert_eq!(event.data.last_update_id, 13_544_037);
        assert!(event.data.asks.is_empty());
    }

    #[test]
    fn test_symbol_from_stream() {
        assert_eq!(symbol_from_stream("ethbtc@depth5@100ms"), "ETHBTC");
        assert_eq!(symbol_from_stream("bnbusdt@kline_1m"), "BNBUSDT");
        assert_eq!(symbol_from_stream("!ticker@arr"), "!TICKER");
        assert_eq!(symbol_from_stream("listenkey"), "LISTENKEY");
    }

    #[test]
    fn test_event_codec() {
        let codec = EventCodec::<KlineEvent>::new();
        let frame = r#"{"e":"kline","E":1672515782136,"s":"BNBBTC","k":{"t":1672515780000,
            "T":1672515839999,"s":"BNBBTC","i":"1m","f":100,"L":200,"o":"0.0010","c":"0.0020",
            "h":"0.0025","l":"0.0015","v":"1000","n":100,"x":false,"q":"1.0000","V":"500",
            "Q":"0.500","B":"123456"}}"#;
        let event = codec
            .decode_message(Message::Text(frame.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(event.kline.interval, "1m");
        assert_eq!(event.kline.first_trade_id, 100);
        assert_eq!(event.kline.last_trade_id, 200);

        let binary = codec
            .decode_message(Message::Binary(frame.as_bytes().to_vec()))
            .unwrap();
        assert!(binary.is_some());
    }

    #[test]
    fn test_decode_errors_and_control_frames() {
        let codec = EventCodec::<KlineEvent>::new();
        let err = codec
            .decode_message(Message::Text("not json".to_string()))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::DeserializationError(_)));

        assert!(codec
            .decode_message(Message::Ping(vec![1]))
            .unwrap()
            .is_none());
    }
}
