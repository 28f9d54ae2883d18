use super::client::{BinanceClient, Call};
use super::types::{EmptyResponse, Order, OrderList, OrderSide, OrderType};
use crate::core::kernel::{ParamValue, RestClient, SecurityType};
use reqwest::Method;

/// Spot trading endpoints
impl<R: RestClient> BinanceClient<R> {
    /// New order (`POST /api/v3/order`)
    ///
    /// Add `quantity` or `quoteOrderQty`, and `price`/`timeInForce` for
    /// limit types, on the returned call.
    pub fn new_order(
        &self,
        symbol: &str,
        side: OrderSide,
        order_type: OrderType,
    ) -> Call<'_, Order, R> {
        self.call(Method::POST, "/api/v3/order", SecurityType::Signed)
            .param("symbol", symbol)
            .param("side", side)
            .param("type", order_type)
    }

    /// Validate an order without sending it to the matching engine
    pub fn test_order(
        &self,
        symbol: &str,
        side: OrderSide,
        order_type: OrderType,
    ) -> Call<'_, EmptyResponse, R> {
        self.call(Method::POST, "/api/v3/order/test", SecurityType::Signed)
            .param("symbol", symbol)
            .param("side", side)
            .param("type", order_type)
    }

    /// Cancel by `orderId` or `origClientOrderId`, added on the returned call
    pub fn cancel_order(&self, symbol: &str) -> Call<'_, Order, R> {
        self.call(Method::DELETE, "/api/v3/order", SecurityType::Signed)
            .param("symbol", symbol)
    }

    /// Query by `orderId` or `origClientOrderId`, added on the returned call
    pub fn query_order(&self, symbol: &str) -> Call<'_, Order, R> {
        self.call(Method::GET, "/api/v3/order", SecurityType::Signed)
            .param("symbol", symbol)
    }

    /// Open orders, for one symbol or for all
    pub fn open_orders(&self, symbol: Option<&str>) -> Call<'_, Vec<Order>, R> {
        self.call(Method::GET, "/api/v3/openOrders", SecurityType::Signed)
            .param_opt("symbol", symbol)
    }

    /// New OCO order list
    ///
    /// Both legs are priced, so `price` and `stopPrice` must be set on the
    /// returned call; sending without them fails before any request is made.
    pub fn new_oco(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: impl Into<ParamValue>,
    ) -> Call<'_, OrderList, R> {
        self.call(Method::POST, "/api/v3/order/oco", SecurityType::Signed)
            .param("symbol", symbol)
            .param("side", side)
            .param("quantity", quantity)
            .require(&["price", "stopPrice"])
    }

    pub fn open_order_lists(&self) -> Call<'_, Vec<OrderList>, R> {
        self.call(Method::GET, "/api/v3/openOrderList", SecurityType::Signed)
    }
}
