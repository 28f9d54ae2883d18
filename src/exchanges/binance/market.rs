use super::client::{BinanceClient, Call};
use super::types::{
    AvgPrice, DepthSnapshot, EmptyResponse, ExchangeInfo, Kline, KlineInterval, PriceTicker,
    ServerTime, Ticker24hr, Trade,
};
use crate::core::kernel::{RestClient, SecurityType};
use reqwest::Method;

/// Public market data endpoints
///
/// Optional filters (`limit`, `startTime`, ...) are added on the returned
/// [`Call`].
impl<R: RestClient> BinanceClient<R> {
    pub fn ping(&self) -> Call<'_, EmptyResponse, R> {
        self.call(Method::GET, "/api/v3/ping", SecurityType::None)
    }

    pub fn server_time(&self) -> Call<'_, ServerTime, R> {
        self.call(Method::GET, "/api/v3/time", SecurityType::None)
    }

    pub fn exchange_info(&self) -> Call<'_, ExchangeInfo, R> {
        self.call(Method::GET, "/api/v3/exchangeInfo", SecurityType::None)
    }

    /// Order book snapshot; accepts `limit`
    pub fn depth(&self, symbol: &str) -> Call<'_, DepthSnapshot, R> {
        self.call(Method::GET, "/api/v3/depth", SecurityType::None)
            .param("symbol", symbol)
    }

    /// Recent trades; accepts `limit`
    pub fn recent_trades(&self, symbol: &str) -> Call<'_, Vec<Trade>, R> {
        self.call(Method::GET, "/api/v3/trades", SecurityType::None)
            .param("symbol", symbol)
    }

    /// Klines; accepts `startTime`, `endTime`, `timeZone` and `limit`
    pub fn klines(&self, symbol: &str, interval: KlineInterval) -> Call<'_, Vec<Kline>, R> {
        self.call(Method::GET, "/api/v3/klines", SecurityType::None)
            .param("symbol", symbol)
            .param("interval", interval)
    }

    pub fn ticker_24hr(&self, symbol: &str) -> Call<'_, Ticker24hr, R> {
        self.call(Method::GET, "/api/v3/ticker/24hr", SecurityType::None)
            .param("symbol", symbol)
    }

    /// 24h statistics for several symbols, sent as a JSON array
    pub fn tickers_24hr(&self, symbols: &[&str]) -> Call<'_, Vec<Ticker24hr>, R> {
        self.call(Method::GET, "/api/v3/ticker/24hr", SecurityType::None)
            .param("symbols", symbols)
    }

    pub fn ticker_price(&self, symbol: &str) -> Call<'_, PriceTicker, R> {
        self.call(Method::GET, "/api/v3/ticker/price", SecurityType::None)
            .param("symbol", symbol)
    }

    pub fn avg_price(&self, symbol: &str) -> Call<'_, AvgPrice, R> {
        self.call(Method::GET, "/api/v3/avgPrice", SecurityType::None)
            .param("symbol", symbol)
    }
}
