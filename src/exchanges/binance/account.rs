use super::client::{BinanceClient, Call};
use super::types::{AccountInfo, AccountTrade};
use crate::core::kernel::{RestClient, SecurityType};
use reqwest::Method;

impl<R: RestClient> BinanceClient<R> {
    /// Account information; accepts `omitZeroBalances`
    pub fn account(&self) -> Call<'_, AccountInfo, R> {
        self.call(Method::GET, "/api/v3/account", SecurityType::Signed)
    }

    /// Trades of this account for a symbol
    pub fn my_trades(&self, symbol: &str) -> Call<'_, Vec<AccountTrade>, R> {
        self.call(Method::GET, "/api/v3/myTrades", SecurityType::Signed)
            .param("symbol", symbol)
    }
}
