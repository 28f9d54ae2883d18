use crate::core::kernel::signer::KeyType;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;

const MAINNET_REST_URL: &str = "https://api.binance.com";
const MAINNET_WS_URL: &str = "wss://stream.binance.com:9443/ws";
const MAINNET_COMBINED_WS_URL: &str = "wss://stream.binance.com:9443/stream";
const TESTNET_REST_URL: &str = "https://testnet.binance.vision";
const TESTNET_WS_URL: &str = "wss://testnet.binance.vision/ws";
const TESTNET_COMBINED_WS_URL: &str = "wss://testnet.binance.vision/stream";

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_USER_AGENT: &str = concat!("binance-connect/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: Secret<String>,
    pub secret_key: Secret<String>,
    pub key_type: KeyType,
    pub passphrase: Option<Secret<String>>,
    pub testnet: bool,
    pub base_url: Option<String>,
    pub ws_url: Option<String>,
    pub combined_ws_url: Option<String>,
    pub http_proxy_url: Option<String>,
    pub ws_proxy_url: Option<String>,
    pub time_offset_ms: i64,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for ClientConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ClientConfig", 13)?;
        state.serialize_field("api_key", "[REDACTED]")?;
        state.serialize_field("secret_key", "[REDACTED]")?;
        state.serialize_field("key_type", &self.key_type)?;
        state.serialize_field(
            "passphrase",
            &self.passphrase.as_ref().map(|_| "[REDACTED]"),
        )?;
        state.serialize_field("testnet", &self.testnet)?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("ws_url", &self.ws_url)?;
        state.serialize_field("combined_ws_url", &self.combined_ws_url)?;
        state.serialize_field("http_proxy_url", &self.http_proxy_url)?;
        state.serialize_field("ws_proxy_url", &self.ws_proxy_url)?;
        state.serialize_field("time_offset_ms", &self.time_offset_ms)?;
        state.serialize_field("timeout_seconds", &self.timeout_seconds)?;
        state.serialize_field("user_agent", &self.user_agent)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ClientConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ClientConfigHelper {
            api_key: String,
            secret_key: String,
            #[serde(default)]
            key_type: KeyType,
            passphrase: Option<String>,
            #[serde(default)]
            testnet: bool,
            base_url: Option<String>,
            ws_url: Option<String>,
            combined_ws_url: Option<String>,
            http_proxy_url: Option<String>,
            ws_proxy_url: Option<String>,
            #[serde(default)]
            time_offset_ms: i64,
            timeout_seconds: Option<u64>,
            user_agent: Option<String>,
        }

        let helper = ClientConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            api_key: Secret::new(helper.api_key),
            secret_key: Secret::new(helper.secret_key),
            key_type: helper.key_type,
            passphrase: helper.passphrase.map(Secret::new),
            testnet: helper.testnet,
            base_url: helper.base_url,
            ws_url: helper.ws_url,
            combined_ws_url: helper.combined_ws_url,
            http_proxy_url: helper.http_proxy_url,
            ws_proxy_url: helper.ws_proxy_url,
            time_offset_ms: helper.time_offset_ms,
            timeout_seconds: helper.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            user_agent: helper
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }
}

impl ClientConfig {
    /// Create a new configuration with HMAC API credentials
    #[must_use]
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
            key_type: KeyType::Hmac,
            passphrase: None,
            testnet: false,
            base_url: None,
            ws_url: None,
            combined_ws_url: None,
            http_proxy_url: None,
            ws_proxy_url: None,
            time_offset_ms: 0,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Create configuration for public endpoints and market streams only
    #[must_use]
    pub fn read_only() -> Self {
        Self::new(String::new(), String::new())
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_API_KEY` (e.g., `BINANCE_API_KEY`)
    /// - `{PREFIX}_SECRET_KEY` (HMAC secret, or PEM / base64 private key)
    /// - `{PREFIX}_KEY_TYPE` (optional: `HMAC`, `RSA` or `ED25519`)
    /// - `{PREFIX}_PASSPHRASE` (optional, for encrypted PEM keys)
    /// - `{PREFIX}_TESTNET` (optional, defaults to false)
    /// - `{PREFIX}_BASE_URL`, `{PREFIX}_WS_URL`, `{PREFIX}_COMBINED_WS_URL` (optional)
    /// - `{PREFIX}_HTTP_PROXY`, `{PREFIX}_WS_PROXY` (optional)
    /// - `{PREFIX}_TIME_OFFSET_MS` (optional)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let var = |name: &str| format!("{}_{}", prefix, name);
        let optional = |name: &str| env::var(var(name)).ok().filter(|v| !v.is_empty());

        let api_key = env::var(var("API_KEY"))
            .map_err(|_| ConfigError::MissingEnvironmentVariable(var("API_KEY")))?;
        let secret_key = env::var(var("SECRET_KEY"))
            .map_err(|_| ConfigError::MissingEnvironmentVariable(var("SECRET_KEY")))?;

        let key_type = match optional("KEY_TYPE") {
            Some(raw) => raw.parse::<KeyType>()?,
            None => KeyType::Hmac,
        };

        let testnet = optional("TESTNET")
            .map(|raw| raw.parse::<bool>())
            .transpose()
            .map_err(|e| {
                ConfigError::InvalidConfiguration(format!("{}: {}", var("TESTNET"), e))
            })?
            .unwrap_or(false);

        let time_offset_ms = optional("TIME_OFFSET_MS")
            .map(|raw| raw.parse::<i64>())
            .transpose()
            .map_err(|e| {
                ConfigError::InvalidConfiguration(format!("{}: {}", var("TIME_OFFSET_MS"), e))
            })?
            .unwrap_or(0);

        let mut config = Self::new(api_key, secret_key).key_type(key_type);
        config.passphrase = optional("PASSPHRASE").map(Secret::new);
        config.testnet = testnet;
        config.base_url = optional("BASE_URL");
        config.ws_url = optional("WS_URL");
        config.combined_ws_url = optional("COMBINED_WS_URL");
        config.http_proxy_url = optional("HTTP_PROXY");
        config.ws_proxy_url = optional("WS_PROXY");
        config.time_offset_ms = time_offset_ms;
        Ok(config)
    }

    /// Create configuration from .env file and environment variables
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create configuration from a specific .env file path
    ///
    /// A missing file is not an error; system environment variables are used instead.
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    /// Check if this configuration has credentials for keyed and signed endpoints
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.api_key.expose_secret().is_empty() && !self.secret_key.expose_secret().is_empty()
    }

    #[must_use]
    pub const fn key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = key_type;
        self
    }

    #[must_use]
    pub fn passphrase(mut self, passphrase: String) -> Self {
        self.passphrase = Some(Secret::new(passphrase));
        self
    }

    /// Set testnet mode
    #[must_use]
    pub const fn testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    /// Set custom REST base URL
    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set custom single-stream WebSocket base URL
    #[must_use]
    pub fn ws_url(mut self, ws_url: String) -> Self {
        self.ws_url = Some(ws_url);
        self
    }

    /// Set custom combined-stream WebSocket base URL
    #[must_use]
    pub fn combined_ws_url(mut self, combined_ws_url: String) -> Self {
        self.combined_ws_url = Some(combined_ws_url);
        self
    }

    #[must_use]
    pub fn http_proxy(mut self, proxy_url: String) -> Self {
        self.http_proxy_url = Some(proxy_url);
        self
    }

    #[must_use]
    pub fn ws_proxy(mut self, proxy_url: String) -> Self {
        self.ws_proxy_url = Some(proxy_url);
        self
    }

    #[must_use]
    pub const fn time_offset_ms(mut self, offset_ms: i64) -> Self {
        self.time_offset_ms = offset_ms;
        self
    }

    #[must_use]
    pub const fn timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// REST base URL after applying testnet defaults
    pub fn rest_endpoint(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            if self.testnet {
                TESTNET_REST_URL.to_string()
            } else {
                MAINNET_REST_URL.to_string()
            }
        })
    }

    /// Single-stream WebSocket base URL after applying testnet defaults
    pub fn ws_endpoint(&self) -> String {
        self.ws_url.clone().unwrap_or_else(|| {
            if self.testnet {
                TESTNET_WS_URL.to_string()
            } else {
                MAINNET_WS_URL.to_string()
            }
        })
    }

    /// Combined-stream WebSocket base URL after applying testnet defaults
    pub fn combined_ws_endpoint(&self) -> String {
        self.combined_ws_url.clone().unwrap_or_else(|| {
            if self.testnet {
                TESTNET_COMBINED_WS_URL.to_string()
            } else {
                MAINNET_COMBINED_WS_URL.to_string()
            }
        })
    }

    /// Get API key (use carefully - exposes secret)
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Get secret key (use carefully - exposes secret)
    pub fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
