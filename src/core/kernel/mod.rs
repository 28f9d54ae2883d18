//! Transport kernel shared by every endpoint and stream
//!
//! The kernel holds only transport logic and generic seams; nothing in here
//! knows about individual endpoints or event shapes.
//!
//! ## Transport
//! - `RestClient`: HTTP transport seam, implemented by `ReqwestRest`
//! - `RestCore`: the signed request pipeline (parameters, timestamp, signature, error translation)
//! - `dial` / `serve`: WebSocket connection and the per-stream read loop
//!
//! ## Authentication
//! - `Signer`: pluggable signing, with `HmacSigner`, `RsaSigner` and `Ed25519Signer`
//!
//! ## Message Handling
//! - `WsCodec`: raw frame to typed event
//!
//! # Example
//! ```rust,no_run
//! use binance_connect::core::kernel::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = RestClientBuilder::new(RestClientConfig::new("my-bot/1.0".to_string())).build()?;
//! let core = RestCore::new(transport, "https://api.binance.com".to_string(), "my-bot/1.0".to_string())
//!     .with_credentials("api-key".to_string(), Arc::new(HmacSigner::new("secret")?));
//!
//! let request = Request::get("/api/v3/account", SecurityType::Signed).param("omitZeroBalances", true);
//! let response = core.call(&request, &RequestOptions::default()).await?;
//! let account: serde_json::Value = response.json()?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod params;
pub mod proxy;
pub mod rest;
pub mod signer;
pub mod ws;

// Re-export key types for convenience
pub use codec::WsCodec;
pub use params::{ParamValue, Params};
pub use rest::{
    HttpRequest, HttpResponse, ReqwestRest, Request, RequestOptions, RestClient,
    RestClientBuilder, RestClientConfig, RestCore, SecurityType,
};
pub use signer::{signer_for, Ed25519Signer, HmacSigner, KeyType, RsaSigner, Signer};
pub use ws::{dial, serve, spawn_stream, StreamHandle, WsConfig, WsStream};
