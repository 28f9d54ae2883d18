use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocketError(#[source] Box<tungstenite::Error>),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    /// Error envelope `{code, msg}` returned by the exchange with a non-2xx status.
    #[error("API error: {code} - {message}")]
    ApiError { code: i64, message: String },

    /// Response the client could not make sense of: non-2xx without an error
    /// envelope, or a 2xx body that does not match the expected shape.
    #[error("Protocol error (HTTP {status}): {reason}")]
    ProtocolError {
        status: u16,
        body: String,
        reason: String,
    },

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

impl From<tungstenite::Error> for ExchangeError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocketError(Box::new(err))
    }
}

impl ExchangeError {
    /// The exchange's `(code, msg)` pair, if this is an exchange error.
    pub fn api_error(&self) -> Option<(i64, &str)> {
        match self {
            Self::ApiError { code, message } => Some((*code, message.as_str())),
            _ => None,
        }
    }

    pub fn is_api_error(&self) -> bool {
        matches!(self, Self::ApiError { .. })
    }

    /// Network-level failure: DNS, TCP, TLS, timeouts, cancelled or broken sockets.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::HttpError(_)
                | Self::WebSocketError(_)
                | Self::IoError(_)
                | Self::ConnectionTimeout(_)
        )
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::ProtocolError { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ConfigurationError(_) | Self::ConfigError(_))
    }
}
