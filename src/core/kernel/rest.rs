use crate::core::errors::ExchangeError;
use crate::core::kernel::params::{ParamValue, Params};
use crate::core::kernel::signer::Signer;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, Proxy};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, trace};

const API_KEY_HEADER: &str = "x-mbx-apikey";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// How an endpoint authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityType {
    /// Public endpoint
    None,
    /// Requires the `X-MBX-APIKEY` header only
    ApiKey,
    /// Requires the API key header plus `timestamp` and `signature`
    Signed,
}

/// Request descriptor handed to [`RestCore`]
///
/// The core never mutates a descriptor; generated parameters are appended to
/// a private copy.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    endpoint: String,
    security: SecurityType,
    query: Params,
    form: Params,
    recv_window: Option<u64>,
    headers: HeaderMap,
}

impl Request {
    pub fn new(method: Method, endpoint: &str, security: SecurityType) -> Self {
        Self {
            method,
            endpoint: endpoint.trim().to_string(),
            security,
            query: Params::new(),
            form: Params::new(),
            recv_window: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(endpoint: &str, security: SecurityType) -> Self {
        Self::new(Method::GET, endpoint, security)
    }

    pub fn post(endpoint: &str, security: SecurityType) -> Self {
        Self::new(Method::POST, endpoint, security)
    }

    pub fn put(endpoint: &str, security: SecurityType) -> Self {
        Self::new(Method::PUT, endpoint, security)
    }

    pub fn delete(endpoint: &str, security: SecurityType) -> Self {
        Self::new(Method::DELETE, endpoint, security)
    }

    /// POST and PUT carry their parameters in a form body; other verbs in the query
    pub fn uses_form_body(&self) -> bool {
        self.method == Method::POST || self.method == Method::PUT
    }

    /// Set a parameter in the container this verb uses
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        if self.uses_form_body() {
            self.form.set(key, value);
        } else {
            self.query.set(key, value);
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set_param(key, value);
        self
    }

    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.query.set(key, value);
        self
    }

    pub fn form_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.form.set(key, value);
        self
    }

    pub fn set_recv_window(&mut self, recv_window_ms: u64) {
        self.recv_window = Some(recv_window_ms);
    }

    pub fn recv_window(mut self, recv_window_ms: u64) -> Self {
        self.set_recv_window(recv_window_ms);
        self
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn security(&self) -> SecurityType {
        self.security
    }

    pub fn query(&self) -> &Params {
        &self.query
    }

    pub fn form(&self) -> &Params {
        &self.form
    }

    /// Whether a parameter is set in either the query or the form
    pub fn has_param(&self, key: &str) -> bool {
        self.query.contains(key) || self.form.contains(key)
    }
}

/// Per-call options layered over a descriptor
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Overrides the descriptor's recv window
    pub recv_window: Option<u64>,
    /// Added to the request; same-named pipeline headers are replaced
    pub headers: HeaderMap,
    /// Deadline for the whole transport round trip
    pub timeout: Option<Duration>,
}

/// Fully composed request as handed to the transport
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

/// Raw transport response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Decode a 2xx body; a shape mismatch is a protocol error
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ExchangeError> {
        serde_json::from_slice(&self.body).map_err(|e| ExchangeError::ProtocolError {
            status: self.status,
            body: String::from_utf8_lossy(&self.body).into_owned(),
            reason: format!("Failed to decode response body: {}", e),
        })
    }
}

/// Transport seam for the REST pipeline
///
/// Implementations only move bytes: no signing, no retries, no error
/// translation. Dropping the returned future cancels the in-flight request.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Send one request and return status, headers and body
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ExchangeError>;
}

/// Configuration for the reqwest transport
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
    /// Optional HTTP(S) proxy URL
    pub proxy_url: Option<String>,
}

impl RestClientConfig {
    pub fn new(user_agent: String) -> Self {
        Self {
            timeout_seconds: 30,
            user_agent,
            proxy_url: None,
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Route requests through an HTTP proxy
    pub fn with_proxy(mut self, proxy_url: Option<String>) -> Self {
        self.proxy_url = proxy_url;
        self
    }
}

/// Builder for creating the reqwest transport
pub struct RestClientBuilder {
    config: RestClientConfig,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self { config }
    }

    /// Build the transport
    ///
    /// An unparseable proxy URL is a configuration error.
    pub fn build(self) -> Result<ReqwestRest, ExchangeError> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent);

        if let Some(proxy_url) = &self.config.proxy_url {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                ExchangeError::ConfigurationError(format!(
                    "Invalid HTTP proxy URL '{}': {}",
                    proxy_url, e
                ))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| {
            ExchangeError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(ReqwestRest {
            client,
            config: self.config,
        })
    }
}

/// Implementation of `RestClient` using reqwest
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ExchangeError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        trace!(status, body = %String::from_utf8_lossy(&body), "Response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    code: i64,
    msg: String,
}

/// Map a raw response onto the error taxonomy
///
/// 2xx passes through. Otherwise a `{code, msg}` body becomes an exchange
/// error and anything else a protocol error carrying status and body.
pub fn check_response(response: HttpResponse) -> Result<HttpResponse, ExchangeError> {
    if (200..=299).contains(&response.status) {
        return Ok(response);
    }

    match serde_json::from_slice::<ApiErrorEnvelope>(&response.body) {
        Ok(envelope) => Err(ExchangeError::ApiError {
            code: envelope.code,
            message: envelope.msg,
        }),
        Err(_) => Err(ExchangeError::ProtocolError {
            status: response.status,
            body: String::from_utf8_lossy(&response.body).into_owned(),
            reason: "Unrecognised error response".to_string(),
        }),
    }
}

/// The signed request pipeline shared by every endpoint
///
/// Holds the transport, credentials and the clock offset. Credentials are
/// immutable after construction; the offset is read once per request.
pub struct RestCore<R: RestClient = ReqwestRest> {
    transport: R,
    base_url: String,
    user_agent: String,
    api_key: Option<Secret<String>>,
    signer: Option<Arc<dyn Signer>>,
    time_offset: Arc<AtomicI64>,
}

impl<R: RestClient> std::fmt::Debug for RestCore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestCore")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .field("has_signer", &self.signer.is_some())
            .field("time_offset", &self.time_offset.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<R: RestClient> RestCore<R> {
    /// Create a pipeline without credentials
    ///
    /// # Arguments
    /// * `transport` - The transport that moves bytes
    /// * `base_url` - Base URL for the API
    /// * `user_agent` - Value of the `User-Agent` header
    pub fn new(transport: R, base_url: String, user_agent: String) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent,
            api_key: None,
            signer: None,
            time_offset: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Attach the API key sent on keyed and signed endpoints
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(Secret::new(api_key));
        self
    }

    /// Attach the signer used on signed endpoints
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_credentials(self, api_key: String, signer: Arc<dyn Signer>) -> Self {
        self.with_api_key(api_key).with_signer(signer)
    }

    /// Share an externally managed clock offset
    pub fn with_time_offset(mut self, time_offset: Arc<AtomicI64>) -> Self {
        self.time_offset = time_offset;
        self
    }

    /// Offset in milliseconds added to every generated `timestamp`
    pub fn set_time_offset(&self, offset_ms: i64) {
        self.time_offset.store(offset_ms, Ordering::Relaxed);
    }

    pub fn time_offset(&self) -> i64 {
        self.time_offset.load(Ordering::Relaxed)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &R {
        &self.transport
    }

    /// Compose the transport request for a descriptor at a given wall-clock time
    ///
    /// Generated parameters are appended after the caller's: `timestamp`,
    /// then `recvWindow`, into the query for GET/DELETE and into the form for
    /// POST/PUT. The canonical payload is `query ++ body` with no separator
    /// and `signature` is appended last, always to the query.
    pub fn prepare(
        &self,
        request: &Request,
        options: &RequestOptions,
        now_ms: i64,
    ) -> Result<HttpRequest, ExchangeError> {
        let mut query = request.query.clone();
        let mut form = request.form.clone();
        let mut headers = HeaderMap::new();

        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent).map_err(|e| {
                ExchangeError::ConfigurationError(format!("Invalid user agent: {}", e))
            })?,
        );

        if request.security != SecurityType::None {
            let api_key = self.api_key.as_ref().ok_or_else(|| {
                ExchangeError::AuthError(format!(
                    "{} requires an API key but none is configured",
                    request.endpoint
                ))
            })?;
            let mut value = HeaderValue::from_str(api_key.expose_secret()).map_err(|e| {
                ExchangeError::ConfigurationError(format!("Invalid API key: {}", e))
            })?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(API_KEY_HEADER), value);
        }

        if request.security == SecurityType::Signed {
            let target = if request.uses_form_body() {
                &mut form
            } else {
                &mut query
            };
            target.set("timestamp", now_ms + self.time_offset());
            if let Some(recv_window) = options.recv_window.or(request.recv_window) {
                target.set("recvWindow", recv_window);
            }
        }

        let mut query_string = query.encode();
        let body = form.encode();

        if request.security == SecurityType::Signed {
            let signer = self.signer.as_ref().ok_or_else(|| {
                ExchangeError::AuthError(format!(
                    "{} is a signed endpoint but no signer is configured",
                    request.endpoint
                ))
            })?;
            let payload = format!("{}{}", query_string, body);
            let signature = signer.sign(payload.as_bytes())?;

            let mut signature_param = Params::new();
            signature_param.set("signature", signature);
            if !query_string.is_empty() {
                query_string.push('&');
            }
            query_string.push_str(&signature_param.encode());
        }

        let body = if body.is_empty() {
            None
        } else {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
            Some(body)
        };

        headers.extend(request.headers.clone());
        headers.extend(options.headers.clone());

        let mut url = format!("{}{}", self.base_url, request.endpoint);
        if !query_string.is_empty() {
            url.push('?');
            url.push_str(&query_string);
        }

        Ok(HttpRequest {
            method: request.method.clone(),
            url,
            headers,
            body,
        })
    }

    /// Run one request through the pipeline
    ///
    /// Returns the raw 2xx response; decoding into a typed record is up to
    /// the caller. Never retries.
    #[instrument(
        skip(self, request, options),
        fields(method = %request.method, endpoint = %request.endpoint, security = ?request.security)
    )]
    pub async fn call(
        &self,
        request: &Request,
        options: &RequestOptions,
    ) -> Result<HttpResponse, ExchangeError> {
        let http_request = self.prepare(request, options, now_millis())?;
        debug!(has_body = http_request.body.is_some(), "Sending request");

        let response = match options.timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.execute(http_request))
                .await
                .map_err(|_| {
                    ExchangeError::ConnectionTimeout(format!(
                        "{} {} exceeded {:?}",
                        request.method, request.endpoint, limit
                    ))
                })??,
            None => self.transport.execute(http_request).await?,
        };

        debug!(status = response.status, "Response status");
        check_response(response)
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
