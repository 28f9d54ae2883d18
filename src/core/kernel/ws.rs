use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::proxy;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::{Message, WebSocketConfig};
use tokio_tungstenite::{client_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};
use url::Url;

/// Handshake deadline for every dial
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(45);
/// Write deadline for pong replies and the closing frame
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// Largest accepted message, roughly 640 KiB
pub const MAX_MESSAGE_SIZE: usize = 655_350;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings for one stream
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Fully qualified `ws://` or `wss://` URL
    pub url: String,
    /// Optional HTTP proxy, tunnelled with `CONNECT`
    pub proxy_url: Option<String>,
    pub handshake_timeout: Duration,
    pub write_timeout: Duration,
    pub max_message_size: usize,
}

impl WsConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            proxy_url: None,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    /// Route the connection through an HTTP proxy
    pub fn with_proxy(mut self, proxy_url: Option<String>) -> Self {
        self.proxy_url = proxy_url;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    fn protocol_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(self.max_message_size);
        config.max_frame_size = Some(self.max_message_size);
        config
    }
}

/// Open one WebSocket connection
///
/// Every dial is independent. The whole sequence (TCP connect, optional proxy
/// tunnel, TLS, upgrade) runs under the handshake deadline.
#[instrument(skip(config), fields(url = %config.url, proxied = config.proxy_url.is_some()))]
pub async fn dial(config: &WsConfig) -> Result<WsStream, ExchangeError> {
    let url = Url::parse(&config.url).map_err(|e| {
        ExchangeError::ConfigurationError(format!("Invalid WebSocket URL '{}': {}", config.url, e))
    })?;
    let host = url
        .host_str()
        .ok_or_else(|| {
            ExchangeError::ConfigurationError(format!("WebSocket URL '{}' has no host", config.url))
        })?
        .to_string();
    let port = url.port_or_known_default().ok_or_else(|| {
        ExchangeError::ConfigurationError(format!("WebSocket URL '{}' has no port", config.url))
    })?;
    let proxy = config
        .proxy_url
        .as_deref()
        .map(proxy::parse_proxy_url)
        .transpose()?;

    let handshake = async {
        let stream = match &proxy {
            Some(proxy) => proxy::connect_tunnel(proxy, &host, port).await?,
            None => TcpStream::connect((host.as_str(), port)).await?,
        };
        let (ws, response) = client_async_tls_with_config(
            config.url.as_str(),
            stream,
            Some(config.protocol_config()),
            None,
        )
        .await?;
        debug!(status = %response.status(), "WebSocket connected");
        Ok::<_, ExchangeError>(ws)
    };

    tokio::time::timeout(config.handshake_timeout, handshake)
        .await
        .map_err(|_| {
            ExchangeError::ConnectionTimeout(format!(
                "WebSocket handshake with {} exceeded {:?}",
                config.url, config.handshake_timeout
            ))
        })?
}

/// Caller's side of a running stream
///
/// `stop` requests termination and may be called any number of times.
/// `done` resolves once the read loop has exited and the connection is gone.
/// Dropping the handle requests stop.
#[derive(Debug)]
pub struct StreamHandle {
    stop: CancellationToken,
    done: CancellationToken,
}

impl StreamHandle {
    /// Request termination
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// A clonable stop signal, e.g. for another task
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// A clonable done signal
    pub fn done_token(&self) -> CancellationToken {
        self.done.clone()
    }

    /// Wait for the stream to terminate
    pub async fn done(&self) {
        self.done.cancelled().await;
    }

    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Request termination and wait for it
    pub async fn shutdown(self) {
        self.stop.cancel();
        self.done.cancelled().await;
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Dial `config.url` and run a read loop on a spawned task
///
/// Frames go through `codec` and decoded events reach `handler` in socket
/// order, inline on the reader task. Decode failures go to `err_handler` and
/// the stream keeps running. A read error goes to `err_handler` unless stop
/// was already requested, then the stream ends. There is no reconnection.
///
/// Dial failures are returned directly and nothing is spawned.
pub async fn serve<C, H, E>(
    config: WsConfig,
    codec: C,
    handler: H,
    err_handler: E,
) -> Result<StreamHandle, ExchangeError>
where
    C: WsCodec,
    H: FnMut(C::Message) + Send + 'static,
    E: FnMut(ExchangeError) + Send + 'static,
{
    let ws = dial(&config).await?;
    Ok(spawn_stream(ws, config.write_timeout, codec, handler, err_handler))
}

/// Run the read loop over an already-open connection
pub fn spawn_stream<S, C, H, E>(
    ws: WebSocketStream<S>,
    write_timeout: Duration,
    codec: C,
    handler: H,
    err_handler: E,
) -> StreamHandle
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    C: WsCodec,
    H: FnMut(C::Message) + Send + 'static,
    E: FnMut(ExchangeError) + Send + 'static,
{
    let stop = CancellationToken::new();
    let done = CancellationToken::new();

    let runner = StreamRunner {
        codec,
        handler,
        err_handler,
        stop: stop.clone(),
        write_timeout,
    };
    let done_signal = done.clone();
    tokio::spawn(async move {
        // `done` also closes when a handler or codec panics
        let _done = done_signal.drop_guard();
        runner.run(ws).await;
    });

    StreamHandle { stop, done }
}

struct StreamRunner<C, H, E> {
    codec: C,
    handler: H,
    err_handler: E,
    stop: CancellationToken,
    write_timeout: Duration,
}

impl<C, H, E> StreamRunner<C, H, E>
where
    C: WsCodec,
    H: FnMut(C::Message) + Send + 'static,
    E: FnMut(ExchangeError) + Send + 'static,
{
    async fn run<S>(mut self, ws: WebSocketStream<S>)
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let (mut write, mut read) = ws.split();

        loop {
            let next = tokio::select! {
                biased;
                () = self.stop.cancelled() => {
                    debug!("Stop requested, closing stream");
                    Self::close(self.write_timeout, &mut write).await;
                    break;
                }
                next = read.next() => next,
            };

            match next {
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(e) =
                        Self::reply_pong(self.write_timeout, &mut write, payload).await
                    {
                        warn!(error = %e, "Failed to answer ping, closing stream");
                        Self::close(self.write_timeout, &mut write).await;
                        self.report(e);
                        break;
                    }
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    // tungstenite answers the close; the stream then ends with None
                    debug!(?frame, "Server closed stream");
                }
                Some(Ok(message)) => {
                    trace!(?message, "Frame received");
                    match self.codec.decode_message(message) {
                        Ok(Some(event)) => (self.handler)(event),
                        Ok(None) => {}
                        Err(e) => (self.err_handler)(e),
                    }
                }
                Some(Err(e)) => {
                    self.report(e.into());
                    break;
                }
                None => {
                    debug!("Stream ended");
                    break;
                }
            }
        }

        debug!("Read loop exited");
    }

    /// Deliver a terminal error unless it was caused by a requested stop
    fn report(&mut self, error: ExchangeError) {
        if self.stop.is_cancelled() {
            debug!(error = %error, "Suppressed error after stop");
        } else {
            (self.err_handler)(error);
        }
    }

    async fn reply_pong<S>(
        write_timeout: Duration,
        write: &mut SplitSink<WebSocketStream<S>, Message>,
        payload: Vec<u8>,
    ) -> Result<(), ExchangeError>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        tokio::time::timeout(write_timeout, write.send(Message::Pong(payload)))
            .await
            .map_err(|_| ExchangeError::ConnectionTimeout("Pong write deadline exceeded".to_string()))??;
        Ok(())
    }

    async fn close<S>(
        write_timeout: Duration,
        write: &mut SplitSink<WebSocketStream<S>, Message>,
    )
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        if let Ok(Err(e)) = tokio::time::timeout(write_timeout, write.close()).await {
            trace!(error = %e, "Close after stop");
        }
    }
}
