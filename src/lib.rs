pub mod core;
pub mod exchanges;

pub use core::{
    config::ClientConfig,
    errors::ExchangeError,
    kernel::{KeyType, RequestOptions, SecurityType, StreamHandle},
};
pub use exchanges::binance::BinanceClient;
