use super::client::BinanceClient;
use super::codec::{CombinedCodec, CombinedEvent, EventCodec, PartialDepthCodec};
use super::events::{
    AggTradeEvent, BookTickerEvent, DepthUpdateEvent, KlineEvent, MiniTickerEvent,
    PartialDepthEvent, TickerEvent, TradeEvent,
};
use super::types::KlineInterval;
use super::user_data::{UserDataCodec, UserDataEvent};
use crate::core::errors::ExchangeError;
use crate::core::kernel::{serve, RestClient, StreamHandle, WsCodec, WsConfig};
use serde::de::DeserializeOwned;
use tracing::instrument;

pub const ALL_MARKET_TICKERS: &str = "!ticker@arr";
pub const ALL_MINI_TICKERS: &str = "!miniTicker@arr";
pub const ALL_BOOK_TICKERS: &str = "!bookTicker";

/// `<symbol>@depth<levels>[@100ms]`; levels is 5, 10 or 20
pub fn partial_depth_stream(symbol: &str, levels: u8, fast: bool) -> String {
    let mut stream = format!("{}@depth{}", symbol.to_lowercase(), levels);
    if fast {
        stream.push_str("@100ms");
    }
    stream
}

/// `<symbol>@depth[@100ms]`
pub fn diff_depth_stream(symbol: &str, fast: bool) -> String {
    let mut stream = format!("{}@depth", symbol.to_lowercase());
    if fast {
        stream.push_str("@100ms");
    }
    stream
}

pub fn kline_stream(symbol: &str, interval: KlineInterval) -> String {
    format!("{}@kline_{}", symbol.to_lowercase(), interval.as_str())
}

pub fn trade_stream(symbol: &str) -> String {
    format!("{}@trade", symbol.to_lowercase())
}

pub fn agg_trade_stream(symbol: &str) -> String {
    format!("{}@aggTrade", symbol.to_lowercase())
}

pub fn book_ticker_stream(symbol: &str) -> String {
    format!("{}@bookTicker", symbol.to_lowercase())
}

pub fn ticker_stream(symbol: &str) -> String {
    format!("{}@ticker", symbol.to_lowercase())
}

/// `<base>/<stream>`
pub fn stream_url(base: &str, stream: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), stream)
}

/// `<combined-base>?streams=<s1>/<s2>/...`
pub fn combined_stream_url(base: &str, streams: &[impl AsRef<str>]) -> String {
    let joined: Vec<&str> = streams.iter().map(AsRef::as_ref).collect();
    format!("{}?streams={}", base.trim_end_matches('/'), joined.join("/"))
}

/// Stream entry points
///
/// Each call dials one connection and returns once it is open. Events reach
/// `handler` in order on the stream's own task; decode and read errors reach
/// `err_handler`. Streams do not reconnect.
impl<R: RestClient> BinanceClient<R> {
    fn ws_config(&self, url: String) -> WsConfig {
        WsConfig::new(url).with_proxy(self.config().ws_proxy_url.clone())
    }

    async fn open<C, H, E>(
        &self,
        url: String,
        codec: C,
        handler: H,
        err_handler: E,
    ) -> Result<StreamHandle, ExchangeError>
    where
        C: WsCodec,
        H: FnMut(C::Message) + Send + 'static,
        E: FnMut(ExchangeError) + Send + 'static,
    {
        serve(self.ws_config(url), codec, handler, err_handler).await
    }

    fn single_url(&self, stream: &str) -> String {
        stream_url(&self.config().ws_endpoint(), stream)
    }

    /// Top `levels` bids and asks, tagged with `symbol`
    #[instrument(skip(self, handler, err_handler))]
    pub async fn subscribe_partial_depth<H, E>(
        &self,
        symbol: &str,
        levels: u8,
        fast: bool,
        handler: H,
        err_handler: E,
    ) -> Result<StreamHandle, ExchangeError>
    where
        H: FnMut(PartialDepthEvent) + Send + 'static,
        E: FnMut(ExchangeError) + Send + 'static,
    {
        let url = self.single_url(&partial_depth_stream(symbol, levels, fast));
        self.open(url, PartialDepthCodec::new(symbol), handler, err_handler)
            .await
    }

    #[instrument(skip(self, handler, err_handler))]
    pub async fn subscribe_diff_depth<H, E>(
        &self,
        symbol: &str,
        fast: bool,
        handler: H,
        err_handler: E,
    ) -> Result<StreamHandle, ExchangeError>
    where
        H: FnMut(DepthUpdateEvent) + Send + 'static,
        E: FnMut(ExchangeError) + Send + 'static,
    {
        let url = self.single_url(&diff_depth_stream(symbol, fast));
        self.open(url, EventCodec::new(), handler, err_handler).await
    }

    #[instrument(skip(self, handler, err_handler))]
    pub async fn subscribe_klines<H, E>(
        &self,
        symbol: &str,
        interval: KlineInterval,
        handler: H,
        err_handler: E,
    ) -> Result<StreamHandle, ExchangeError>
    where
        H: FnMut(KlineEvent) + Send + 'static,
        E: FnMut(ExchangeError) + Send + 'static,
    {
        let url = self.single_url(&kline_stream(symbol, interval));
        self.open(url, EventCodec::new(), handler, err_handler).await
    }

    #[instrument(skip(self, handler, err_handler))]
    pub async fn subscribe_trades<H, E>(
        &self,
        symbol: &str,
        handler: H,
        err_handler: E,
    ) -> Result<StreamHandle, ExchangeError>
    where
        H: FnMut(TradeEvent) + Send + 'static,
        E: FnMut(ExchangeError) + Send + 'static,
    {
        let url = self.single_url(&trade_stream(symbol));
        self.open(url, EventCodec::new(), handler, err_handler).await
    }

    #[instrument(skip(self, handler, err_handler))]
    pub async fn subscribe_agg_trades<H, E>(
        &self,
        symbol: &str,
        handler: H,
        err_handler: E,
    ) -> Result<StreamHandle, ExchangeError>
    where
        H: FnMut(AggTradeEvent) + Send + 'static,
        E: FnMut(ExchangeError) + Send + 'static,
    {
        let url = self.single_url(&agg_trade_stream(symbol));
        self.open(url, EventCodec::new(), handler, err_handler).await
    }

    #[instrument(skip(self, handler, err_handler))]
    pub async fn subscribe_book_ticker<H, E>(
        &self,
        symbol: &str,
        handler: H,
        err_handler: E,
    ) -> Result<StreamHandle, ExchangeError>
    where
        H: FnMut(BookTickerEvent) + Send + 'static,
        E: FnMut(ExchangeError) + Send + 'static,
    {
        let url = self.single_url(&book_ticker_stream(symbol));
        self.open(url, EventCodec::new(), handler, err_handler).await
    }

    #[instrument(skip(self, handler, err_handler))]
    pub async fn subscribe_ticker<H, E>(
        &self,
        symbol: &str,
        handler: H,
        err_handler: E,
    ) -> Result<StreamHandle, ExchangeError>
    where
        H: FnMut(TickerEvent) + Send + 'static,
        E: FnMut(ExchangeError) + Send + 'static,
    {
        let url = self.single_url(&ticker_stream(symbol));
        self.open(url, EventCodec::new(), handler, err_handler).await
    }

    /// 24h statistics of every symbol that changed, as one array per frame
    pub async fn subscribe_all_market_tickers<H, E>(
        &self,
        handler: H,
        err_handler: E,
    ) -> Result<StreamHandle, ExchangeError>
    where
        H: FnMut(Vec<TickerEvent>) + Send + 'static,
        E: FnMut(ExchangeError) + Send + 'static,
    {
        let url = self.single_url(ALL_MARKET_TICKERS);
        self.open(url, EventCodec::new(), handler, err_handler).await
    }

    pub async fn subscribe_all_mini_tickers<H, E>(
        &self,
        handler: H,
        err_handler: E,
    ) -> Result<StreamHandle, ExchangeError>
    where
        H: FnMut(Vec<MiniTickerEvent>) + Send + 'static,
        E: FnMut(ExchangeError) + Send + 'static,
    {
        let url = self.single_url(ALL_MINI_TICKERS);
        self.open(url, EventCodec::new(), handler, err_handler).await
    }

    pub async fn subscribe_all_book_tickers<H, E>(
        &self,
        handler: H,
        err_handler: E,
    ) -> Result<StreamHandle, ExchangeError>
    where
        H: FnMut(BookTickerEvent) + Send + 'static,
        E: FnMut(ExchangeError) + Send + 'static,
    {
        let url = self.single_url(ALL_BOOK_TICKERS);
        self.open(url, EventCodec::new(), handler, err_handler).await
    }

    /// Account, balance and order events for a listen key
    #[instrument(skip_all)]
    pub async fn subscribe_user_data<H, E>(
        &self,
        listen_key: &str,
        handler: H,
        err_handler: E,
    ) -> Result<StreamHandle, ExchangeError>
    where
        H: FnMut(UserDataEvent) + Send + 'static,
        E: FnMut(ExchangeError) + Send + 'static,
    {
        let url = self.single_url(listen_key);
        self.open(url, UserDataCodec, handler, err_handler).await
    }

    /// Several streams on one connection
    ///
    /// Every stream must carry the same payload type `T`. Each event is
    /// tagged with its stream name and the symbol taken from it.
    #[instrument(skip(self, handler, err_handler), fields(stream_count = streams.len()))]
    pub async fn subscribe_combined<T, H, E>(
        &self,
        streams: &[String],
        handler: H,
        err_handler: E,
    ) -> Result<StreamHandle, ExchangeError>
    where
        T: DeserializeOwned + Send + 'static,
        H: FnMut(CombinedEvent<T>) + Send + 'static,
        E: FnMut(ExchangeError) + Send + 'static,
    {
        if streams.is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "A combined stream needs at least one stream name".to_string(),
            ));
        }
        let url = combined_stream_url(&self.config().combined_ws_endpoint(), streams);
        self.open(url, CombinedCodec::<T>::new(), handler, err_handler)
            .await
    }
}
