use binance_connect::{
    core::kernel::{HmacSigner, RsaSigner, Signer},
    exchanges::binance::{BinanceClient, OrderSide, OrderType, TimeInForce},
    ClientConfig, ExchangeError, KeyType,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Client with HMAC key `K` / secret `S` pointed at the mock server
fn hmac_client(server: &MockServer) -> BinanceClient {
    let config = ClientConfig::new("K".to_string(), "S".to_string()).base_url(server.uri());
    BinanceClient::new(config).unwrap()
}

async fn only_request(server: &MockServer) -> Request {
    let mut requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "expected exactly one request");
    requests.remove(0)
}

/// Split a raw query into the signed part and the signature
fn split_signature(query: &str) -> (&str, &str) {
    match query.rsplit_once("signature=") {
        Some((unsigned, signature)) => (unsigned.trim_end_matches('&'), signature),
        None => panic!("no signature in query: {query}"),
    }
}

fn hmac(payload: &str) -> String {
    HmacSigner::new("S").unwrap().sign(payload.as_bytes()).unwrap()
}

fn account_body() -> serde_json::Value {
    json!({
        "makerCommission": 15,
        "takerCommission": 15,
        "canTrade": true,
        "canWithdraw": true,
        "canDeposit": true,
        "updateTime": 123456789,
        "accountType": "SPOT",
        "balances": [{"asset": "BTC", "free": "4723846.89208129", "locked": "0.00000000"}],
        "permissions": ["SPOT"]
    })
}

#[cfg(test)]
mod signed_request_tests {
    use super::*;

    #[tokio::test]
    async fn test_signed_get_appends_timestamp_then_signature() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/account"))
            .and(query_param("omitZeroBalances", "true"))
            .and(header("X-MBX-APIKEY", "K"))
            .respond_with(ResponseTemplate::new(200).set_body_json(account_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = hmac_client(&server);
        let account = client
            .account()
            .param("omitZeroBalances", true)
            .send()
            .await
            .unwrap();
        assert!(account.can_trade);
        assert_eq!(account.balances[0].asset, "BTC");

        let request = only_request(&server).await;
        let query = request.url.query().unwrap().to_string();
        let (unsigned, signature) = split_signature(&query);

        assert!(unsigned.starts_with("omitZeroBalances=true&timestamp="));
        assert!(query.ends_with(&format!("&signature={}", signature)));
        assert_eq!(signature, hmac(unsigned));
        assert!(request.body.is_empty());
    }

    #[tokio::test]
    async fn test_signed_post_signs_form_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sapi/v1/margin/order"))
            .and(header("X-MBX-APIKEY", "K"))
            .and(header("Content-Type", "application/x-www-form-urlencoded"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "symbol": "BTCUSDT",
                "orderId": 28,
                "clientOrderId": "6gCrw2kRUAF9CvJDGP16IP",
                "transactTime": 1507725176595_i64,
                "isIsolated": false
            })))
            .mount(&server)
            .await;

        let client = hmac_client(&server);
        let order = client
            .margin_order("BTCUSDT", OrderSide::Buy, OrderType::Limit)
            .param("timeInForce", TimeInForce::Gtc)
            .param("quantity", 0.1)
            .param("price", 20000.0)
            .send()
            .await
            .unwrap();
        assert_eq!(order.order_id, 28);

        let request = only_request(&server).await;
        let body = String::from_utf8(request.body.clone()).unwrap();
        let query = request.url.query().unwrap();

        assert!(body.starts_with(
            "symbol=BTCUSDT&side=BUY&type=LIMIT&timeInForce=GTC&quantity=0.1&price=20000&timestamp="
        ));
        assert!(!body.contains("signature"));
        let (unsigned, signature) = split_signature(query);
        assert_eq!(unsigned, "");
        assert_eq!(signature, hmac(&body));
    }

    #[tokio::test]
    async fn test_recv_window_and_time_offset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/openOrders"))
            .and(query_param("recvWindow", "5000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = hmac_client(&server);
        client.set_time_offset(-60_000);
        assert_eq!(client.time_offset(), -60_000);

        let before = chrono::Utc::now().timestamp_millis();
        let orders = client
            .open_orders(Some("BNBUSDT"))
            .recv_window(5000)
            .send()
            .await
            .unwrap();
        let after = chrono::Utc::now().timestamp_millis();
        assert!(orders.is_empty());

        let request = only_request(&server).await;
        let timestamp: i64 = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "timestamp")
            .map(|(_, v)| v.parse().unwrap())
            .unwrap();
        assert!(timestamp >= before - 60_000 && timestamp <= after - 60_000);

        let keys: Vec<String> = request.url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(keys, ["symbol", "timestamp", "recvWindow", "signature"]);
    }

    #[tokio::test]
    async fn test_rsa_signature_is_percent_encoded_base64() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/account"))
            .respond_with(ResponseTemplate::new(200).set_body_json(account_body()))
            .mount(&server)
            .await;

        let pem = include_str!("fixtures/rsa_pkcs8.pem");
        let config = ClientConfig::new("K".to_string(), pem.to_string())
            .key_type(KeyType::Rsa)
            .base_url(server.uri());
        let client = BinanceClient::new(config).unwrap();
        client.account().send().await.unwrap();

        let request = only_request(&server).await;
        let query = request.url.query().unwrap();
        let (unsigned, _) = split_signature(query);
        let signature = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "signature")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        let expected = RsaSigner::from_pem(pem, None)
            .unwrap()
            .sign(unsigned.as_bytes())
            .unwrap();
        assert_eq!(signature, expected);
    }

    #[tokio::test]
    async fn test_concurrent_signed_calls_share_one_client() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/openOrders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(8)
            .mount(&server)
            .await;

        let client = hmac_client(&server);
        let symbols: Vec<String> = (0..8).map(|i| format!("SYM{}USDT", i)).collect();
        let results = futures::future::join_all(
            symbols
                .iter()
                .map(|symbol| client.open_orders(Some(symbol.as_str())).send()),
        )
        .await;
        assert!(results.iter().all(Result::is_ok));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 8);
        for request in requests {
            let query = request.url.query().unwrap().to_string();
            let (unsigned, signature) = split_signature(&query);
            assert!(unsigned.starts_with("symbol=SYM"));
            assert_eq!(signature, hmac(unsigned));
        }
    }
}

#[cfg(test)]
mod keyed_and_public_tests {
    use super::*;

    #[tokio::test]
    async fn test_api_key_only_endpoint_is_not_signed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/userDataStream"))
            .and(header("X-MBX-APIKEY", "K"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "listenKey": "pqia91ma19a5s61cv6a81va65sdf19v8a65a1a5s61cv6a81va65sdf19v8a65a1"
            })))
            .mount(&server)
            .await;

        let config = ClientConfig::new("K".to_string(), String::new()).base_url(server.uri());
        let client = BinanceClient::new(config).unwrap();
        let key = client.start_user_stream().send().await.unwrap();
        assert!(key.listen_key.starts_with("pqia91"));

        let request = only_request(&server).await;
        assert!(request.url.query().is_none());
        assert!(request.body.is_empty());
    }

    #[tokio::test]
    async fn test_keepalive_sends_listen_key_in_form() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v3/userDataStream"))
            .and(body_string("listenKey=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = hmac_client(&server);
        client.keepalive_user_stream("abc").send().await.unwrap();
    }

    #[tokio::test]
    async fn test_public_endpoint_has_no_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/depth"))
            .and(query_param("symbol", "BTCUSDT"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "lastUpdateId": 1027024,
                "bids": [["4.00000000", "431.00000000"]],
                "asks": [["4.00000200", "12.00000000"]]
            })))
            .mount(&server)
            .await;

        let client = hmac_client(&server);
        let book = client.depth("BTCUSDT").param("limit", 5_u32).send().await.unwrap();
        assert_eq!(book.last_update_id, 1_027_024);
        assert_eq!(book.asks.len(), 1);

        let request = only_request(&server).await;
        assert!(request.headers.get("X-MBX-APIKEY").is_none());
        assert_eq!(request.url.query(), Some("symbol=BTCUSDT&limit=5"));
    }

    #[tokio::test]
    async fn test_list_parameter_is_json_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/24hr"))
            .and(query_param("symbols", r#"["BTCUSDT","BNBUSDT"]"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = hmac_client(&server);
        let tickers = client
            .tickers_24hr(&["BTCUSDT", "BNBUSDT"])
            .send()
            .await
            .unwrap();
        assert!(tickers.is_empty());
    }

    #[tokio::test]
    async fn test_extra_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ping"))
            .and(header("X-Request-Source", "integration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = hmac_client(&server);
        client
            .ping()
            .header(
                reqwest::header::HeaderName::from_static("x-request-source"),
                reqwest::header::HeaderValue::from_static("integration"),
            )
            .send()
            .await
            .unwrap();
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[tokio::test]
    async fn test_exchange_error_is_structured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/depth"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"code":-1121,"msg":"Invalid symbol."}"#),
            )
            .mount(&server)
            .await;

        let client = hmac_client(&server);
        let err = client.depth("NOPE").send().await.unwrap_err();

        assert_eq!(err.api_error(), Some((-1121, "Invalid symbol.")));
        assert!(!err.is_transport());
        assert!(!err.is_protocol());
    }

    #[tokio::test]
    async fn test_non_json_error_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/time"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&server)
            .await;

        let client = hmac_client(&server);
        match client.server_time().send().await {
            Err(ExchangeError::ProtocolError { status, body, .. }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "Service Unavailable");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_success_body_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/time"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client = hmac_client(&server);
        let err = client.server_time().send().await.unwrap_err();
        assert!(err.is_protocol());

        let raw = client.server_time().send_raw().await.unwrap();
        assert_eq!(raw.status, 200);
        assert_eq!(raw.body, b"<html></html>");
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ping"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = hmac_client(&server);
        let err = client
            .ping()
            .timeout(Duration::from_millis(100))
            .send()
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::ConnectionTimeout(_)));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_transport_failure() {
        // Nothing listens on a port whose listener was dropped
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let uri = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let config = ClientConfig::new("K".to_string(), "S".to_string()).base_url(uri);
        let client = BinanceClient::new(config).unwrap();
        let err = client.ping().send().await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.api_error().is_none());
    }
}

#[cfg(test)]
mod precondition_tests {
    use super::*;

    #[tokio::test]
    async fn test_oco_requires_price_and_stop_price() {
        let server = MockServer::start().await;
        let client = hmac_client(&server);

        let err = client
            .new_oco("BNBUSDT", OrderSide::Sell, 0.1)
            .param("price", 420.0)
            .send()
            .await
            .unwrap_err();
        match err {
            ExchangeError::InvalidParameters(message) => assert!(message.contains("stopPrice")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oco_with_both_prices_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/order/oco"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "orderListId": 0,
                "contingencyType": "OCO",
                "listStatusType": "EXEC_STARTED",
                "listOrderStatus": "EXECUTING",
                "listClientOrderId": "JYVpp3F0f5CAG15DhtrqLp",
                "transactionTime": 1563417480525_i64,
                "symbol": "LTCBTC",
                "orders": [
                    {"symbol": "LTCBTC", "orderId": 2, "clientOrderId": "Kk7sqHb9J6mJWTMDVW7Vos"},
                    {"symbol": "LTCBTC", "orderId": 3, "clientOrderId": "xTXKaGYd4bluPVp78IVRvl"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = hmac_client(&server);
        let list = client
            .new_oco("LTCBTC", OrderSide::Sell, 1_u32)
            .param("price", 0.0012)
            .param("stopPrice", 0.0009)
            .send()
            .await
            .unwrap();
        assert_eq!(list.orders.len(), 2);
        assert_eq!(list.contingency_type, "OCO");
    }

    #[tokio::test]
    async fn test_path_whitespace_is_trimmed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/openOrderList"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = hmac_client(&server);
        let lists: Vec<serde_json::Value> = client
            .call(
                reqwest::Method::GET,
                " /api/v3/openOrderList ",
                binance_connect::SecurityType::Signed,
            )
            .send()
            .await
            .unwrap();
        assert!(lists.is_empty());
    }
}

#[cfg(test)]
mod construction_tests {
    use super::*;

    #[test]
    fn test_malformed_rsa_key_fails_construction() {
        let config = ClientConfig::new("K".to_string(), "not a pem".to_string())
            .key_type(KeyType::Rsa);
        let err = BinanceClient::new(config).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_malformed_ed25519_key_fails_construction() {
        let config = ClientConfig::new("K".to_string(), "c2hvcnQ=".to_string())
            .key_type(KeyType::Ed25519);
        assert!(BinanceClient::new(config).err().unwrap().is_configuration());
    }

    #[test]
    fn test_bad_proxy_urls_fail_construction() {
        let config = ClientConfig::new("K".to_string(), "S".to_string())
            .ws_proxy("::not a url::".to_string());
        assert!(BinanceClient::new(config).err().unwrap().is_configuration());

        let config = ClientConfig::new("K".to_string(), "S".to_string())
            .http_proxy("::not a url::".to_string());
        assert!(BinanceClient::new(config).err().unwrap().is_configuration());
    }

    #[tokio::test]
    async fn test_signed_call_without_secret_fails_before_io() {
        let server = MockServer::start().await;
        let client = BinanceClient::new(ClientConfig::read_only().base_url(server.uri())).unwrap();

        let err = client.account().send().await.unwrap_err();
        assert!(matches!(err, ExchangeError::AuthError(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
