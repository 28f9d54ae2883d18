use super::client::{BinanceClient, Call};
use super::types::SubAccountList;
use crate::core::kernel::{RestClient, SecurityType};
use reqwest::Method;

impl<R: RestClient> BinanceClient<R> {
    /// Sub-accounts of a master account; accepts `email`, `isFreeze`, `page` and `limit`
    pub fn sub_accounts(&self) -> Call<'_, SubAccountList, R> {
        self.call(Method::GET, "/sapi/v1/sub-account/list", SecurityType::Signed)
    }
}
