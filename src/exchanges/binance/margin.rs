use super::client::{BinanceClient, Call};
use super::types::{MarginAccount, Order, OrderSide, OrderType};
use crate::core::kernel::{RestClient, SecurityType};
use reqwest::Method;

impl<R: RestClient> BinanceClient<R> {
    /// Margin order; accepts `isIsolated`, `sideEffectType` and the usual order fields
    pub fn margin_order(
        &self,
        symbol: &str,
        side: OrderSide,
        order_type: OrderType,
    ) -> Call<'_, Order, R> {
        self.call(Method::POST, "/sapi/v1/margin/order", SecurityType::Signed)
            .param("symbol", symbol)
            .param("side", side)
            .param("type", order_type)
    }

    /// Cross margin account details
    pub fn margin_account(&self) -> Call<'_, MarginAccount, R> {
        self.call(Method::GET, "/sapi/v1/margin/account", SecurityType::Signed)
    }
}
