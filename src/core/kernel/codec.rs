use crate::core::errors::ExchangeError;
use tokio_tungstenite::tungstenite::Message;

/// Codec trait for turning raw WebSocket frames into typed events
///
/// Each stream kind implements this to handle its specific payload shape.
/// Control frames (ping, pong, close) never reach the codec; they are handled
/// by the stream runner.
pub trait WsCodec: Send + Sync + 'static {
    /// The type representing decoded events on this stream
    type Message: Send + 'static;

    /// Decode a raw WebSocket data frame into a typed event
    ///
    /// # Returns
    /// - `Ok(Some(message))` - Successfully decoded event
    /// - `Ok(None)` - Frame was ignored by the codec
    /// - `Err(error)` - Frame could not be decoded; the stream keeps running
    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError>;
}

/// Extract the UTF-8 payload of a data frame
///
/// Binary frames are accepted when they hold valid UTF-8.
pub fn frame_text(message: &Message) -> Result<Option<&str>, ExchangeError> {
    match message {
        Message::Text(text) => Ok(Some(text.as_str())),
        Message::Binary(data) => std::str::from_utf8(data).map(Some).map_err(|e| {
            ExchangeError::DeserializationError(format!("Binary frame is not UTF-8: {}", e))
        }),
        _ => Ok(None),
    }
}
