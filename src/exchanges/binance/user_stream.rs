use super::client::{BinanceClient, Call};
use super::types::{EmptyResponse, ListenKey};
use crate::core::kernel::{RestClient, SecurityType};
use reqwest::Method;

/// Listen key management for the user-data stream
///
/// Keys expire after 60 minutes without a keepalive. Refreshing is left to
/// the caller.
impl<R: RestClient> BinanceClient<R> {
    pub fn start_user_stream(&self) -> Call<'_, ListenKey, R> {
        self.call(Method::POST, "/api/v3/userDataStream", SecurityType::ApiKey)
    }

    pub fn keepalive_user_stream(&self, listen_key: &str) -> Call<'_, EmptyResponse, R> {
        self.call(Method::PUT, "/api/v3/userDataStream", SecurityType::ApiKey)
            .param("listenKey", listen_key)
    }

    pub fn close_user_stream(&self, listen_key: &str) -> Call<'_, EmptyResponse, R> {
        self.call(Method::DELETE, "/api/v3/userDataStream", SecurityType::ApiKey)
            .param("listenKey", listen_key)
    }
}
