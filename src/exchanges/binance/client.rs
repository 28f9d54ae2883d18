use crate::core::config::ClientConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::proxy::parse_proxy_url;
use crate::core::kernel::{
    signer_for, HttpResponse, ParamValue, ReqwestRest, Request, RequestOptions, RestClient,
    RestClientBuilder, RestClientConfig, RestCore, SecurityType,
};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Binance client: the signed REST pipeline plus stream entry points
///
/// Credentials and the signer are fixed at construction. Endpoint methods
/// return a [`Call`] that can be refined with optional parameters before
/// sending.
pub struct BinanceClient<R: RestClient = ReqwestRest> {
    rest: RestCore<R>,
    config: ClientConfig,
}

impl BinanceClient<ReqwestRest> {
    /// Build a client with the reqwest transport
    ///
    /// Fails with a configuration error for malformed key material, an
    /// unparseable proxy URL or an invalid user agent.
    pub fn new(config: ClientConfig) -> Result<Self, ExchangeError> {
        let transport = RestClientBuilder::new(
            RestClientConfig::new(config.user_agent.clone())
                .with_timeout(config.timeout_seconds)
                .with_proxy(config.http_proxy_url.clone()),
        )
        .build()?;
        Self::with_transport(config, transport)
    }
}

impl<R: RestClient> BinanceClient<R> {
    /// Build a client over any transport
    pub fn with_transport(config: ClientConfig, transport: R) -> Result<Self, ExchangeError> {
        if let Some(proxy_url) = &config.ws_proxy_url {
            parse_proxy_url(proxy_url)?;
        }
        HeaderValue::from_str(&config.user_agent).map_err(|e| {
            ExchangeError::ConfigurationError(format!("Invalid user agent: {}", e))
        })?;

        let mut rest = RestCore::new(transport, config.rest_endpoint(), config.user_agent.clone());

        if !config.api_key().is_empty() {
            rest = rest.with_api_key(config.api_key().to_string());
        }
        if !config.secret_key().is_empty() {
            let passphrase = config
                .passphrase
                .as_ref()
                .map(|p| p.expose_secret().as_str());
            let signer = signer_for(config.key_type, config.secret_key(), passphrase)?;
            rest = rest.with_signer(Arc::from(signer));
        }
        rest.set_time_offset(config.time_offset_ms);

        debug!(
            base_url = rest.base_url(),
            key_type = %config.key_type,
            testnet = config.testnet,
            "Binance client ready"
        );

        Ok(Self { rest, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn rest(&self) -> &RestCore<R> {
        &self.rest
    }

    /// Update the clock offset added to every generated `timestamp`
    pub fn set_time_offset(&self, offset_ms: i64) {
        self.rest.set_time_offset(offset_ms);
    }

    pub fn time_offset(&self) -> i64 {
        self.rest.time_offset()
    }

    /// Start a call to any endpoint
    ///
    /// ```rust,no_run
    /// # use binance_connect::exchanges::binance::BinanceClient;
    /// # use binance_connect::core::kernel::SecurityType;
    /// # async fn example(client: BinanceClient) -> Result<(), binance_connect::ExchangeError> {
    /// let fees: serde_json::Value = client
    ///     .call(reqwest::Method::GET, "/sapi/v1/asset/tradeFee", SecurityType::Signed)
    ///     .param("symbol", "BTCUSDT")
    ///     .send()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn call<T>(&self, method: Method, endpoint: &str, security: SecurityType) -> Call<'_, T, R> {
        Call::new(&self.rest, Request::new(method, endpoint, security))
    }
}

/// One endpoint call under construction
///
/// Parameters go to the query for GET/DELETE and to the form body for
/// POST/PUT, in the order they are added. Keys declared with
/// [`Call::require`] must be present when the call is sent.
#[must_use = "a call does nothing until it is sent"]
pub struct Call<'a, T, R: RestClient = ReqwestRest> {
    core: &'a RestCore<R>,
    request: Request,
    options: RequestOptions,
    required: Vec<&'static str>,
    error: Option<ExchangeError>,
    _response: PhantomData<fn() -> T>,
}

impl<'a, T, R: RestClient> Call<'a, T, R> {
    pub fn new(core: &'a RestCore<R>, request: Request) -> Self {
        Self {
            core,
            request,
            options: RequestOptions::default(),
            required: Vec::new(),
            error: None,
            _response: PhantomData,
        }
    }

    /// Set a parameter; setting a key again replaces the earlier value
    pub fn param(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.request.set_param(key, value);
        self
    }

    /// Set a parameter only when a value is given
    pub fn param_opt<V: Into<ParamValue>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    /// Set a parameter to the compact JSON form of a record
    ///
    /// A serialization failure is reported when the call is sent.
    pub fn param_json<V: Serialize>(mut self, key: &str, value: &V) -> Self {
        match ParamValue::json(value) {
            Ok(value) => self.request.set_param(key, value),
            Err(e) => {
                self.error.get_or_insert(ExchangeError::InvalidParameters(format!(
                    "Parameter '{}' is not serializable: {}",
                    key, e
                )));
            }
        }
        self
    }

    /// Declare keys that must be set before sending
    pub fn require(mut self, keys: &[&'static str]) -> Self {
        self.required.extend_from_slice(keys);
        self
    }

    pub fn recv_window(mut self, recv_window_ms: u64) -> Self {
        self.options.recv_window = Some(recv_window_ms);
        self
    }

    /// Add a header; it replaces a same-named pipeline header
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.options.headers.insert(name, value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Replace all per-request options
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    fn check(&mut self) -> Result<(), ExchangeError> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        let missing: Vec<&str> = self
            .required
            .iter()
            .copied()
            .filter(|key| !self.request.has_param(key))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ExchangeError::InvalidParameters(format!(
                "{} requires {}",
                self.request.endpoint(),
                missing.join(", ")
            )))
        }
    }

    /// Send and return the raw 2xx response
    pub async fn send_raw(mut self) -> Result<HttpResponse, ExchangeError> {
        self.check()?;
        self.core.call(&self.request, &self.options).await
    }
}

impl<'a, T: DeserializeOwned, R: RestClient> Call<'a, T, R> {
    /// Send and decode the 2xx body as `T`
    pub async fn send(self) -> Result<T, ExchangeError> {
        self.send_raw().await?.json()
    }
}
