pub mod account;
pub mod client;
pub mod codec;
pub mod events;
pub mod margin;
pub mod market;
pub mod streams;
pub mod sub_account;
pub mod trade;
pub mod types;
pub mod user_data;
pub mod user_stream;

// Re-export main types for easier importing
pub use client::{BinanceClient, Call};
pub use codec::{CombinedCodec, CombinedEvent, EventCodec, PartialDepthCodec};
pub use events::{
    AggTradeEvent, BookTickerEvent, DepthUpdateEvent, KlineData, KlineEvent, MiniTickerEvent,
    PartialDepthEvent, PriceLevel, TickerEvent, TradeEvent,
};
pub use types::{KlineInterval, OrderSide, OrderType, TimeInForce};
pub use user_data::{
    AccountBalance, AccountPosition, BalanceUpdate, ExecutionReport, ListOrder, ListStatus,
    UserDataCodec, UserDataEvent,
};
