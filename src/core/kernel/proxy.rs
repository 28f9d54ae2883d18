use crate::core::errors::ExchangeError;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, instrument};
use url::Url;

const MAX_RESPONSE_HEAD: usize = 8 * 1024;

/// Parse and validate an HTTP proxy URL
pub fn parse_proxy_url(proxy_url: &str) -> Result<Url, ExchangeError> {
    let url = Url::parse(proxy_url).map_err(|e| {
        ExchangeError::ConfigurationError(format!("Invalid proxy URL '{}': {}", proxy_url, e))
    })?;
    if url.scheme() != "http" {
        return Err(ExchangeError::ConfigurationError(format!(
            "Unsupported proxy scheme '{}', expected http",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(ExchangeError::ConfigurationError(format!(
            "Proxy URL '{}' has no host",
            proxy_url
        )));
    }
    Ok(url)
}

/// Open a TCP tunnel to `host:port` through an HTTP proxy using `CONNECT`
///
/// Credentials embedded in the proxy URL are sent as Basic
/// `Proxy-Authorization`. Anything but a 200 reply is a transport error.
#[instrument(skip(proxy), fields(proxy_host = ?proxy.host_str()))]
pub async fn connect_tunnel(proxy: &Url, host: &str, port: u16) -> Result<TcpStream, ExchangeError> {
    let proxy_host = proxy.host_str().ok_or_else(|| {
        ExchangeError::ConfigurationError("Proxy URL has no host".to_string())
    })?;
    let proxy_port = proxy.port_or_known_default().unwrap_or(80);

    let mut stream = TcpStream::connect((proxy_host, proxy_port)).await?;

    let authority = format!("{}:{}", host, port);
    let mut head = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n");
    if !proxy.username().is_empty() {
        let credentials = format!(
            "{}:{}",
            proxy.username(),
            proxy.password().unwrap_or_default()
        );
        head.push_str(&format!(
            "Proxy-Authorization: Basic {}\r\n",
            STANDARD.encode(credentials)
        ));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await?;

    let response = read_response_head(&mut stream).await?;
    let status_line = response.lines().next().unwrap_or_default();
    let status = status_line.split_whitespace().nth(1).unwrap_or_default();
    if status != "200" {
        return Err(ExchangeError::IoError(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("Proxy refused CONNECT to {}: {}", authority, status_line),
        )));
    }

    debug!(%authority, "Proxy tunnel established");
    Ok(stream)
}

/// Read up to and including the blank line that ends the response head
///
/// Reads byte by byte so nothing past the head is consumed from the tunnel.
async fn read_response_head(stream: &mut TcpStream) -> Result<String, ExchangeError> {
    let mut buf = Vec::with_capacity(256);
    let mut byte = [0_u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        if buf.len() >= MAX_RESPONSE_HEAD {
            return Err(ExchangeError::IoError(io::Error::new(
                io::ErrorKind::InvalidData,
                "Proxy response head too large",
            )));
        }
        if stream.read(&mut byte).await? == 0 {
            return Err(ExchangeError::IoError(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Proxy closed the connection during CONNECT",
            )));
        }
        buf.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
