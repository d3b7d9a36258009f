//! Failure-path tests for the gateway API.
//!
//! The RPC endpoint in these tests is unreachable; every chain-touching
//! route must degrade into the normalized error envelope instead of
//! hanging or panicking.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use solana_sdk::signature::Keypair;
use tokio::sync::mpsc;

use donation_gateway::chain::wallet::KeypairSigner;
use donation_gateway::config::GatewayConfig;
use donation_gateway::http::HttpServer;
use donation_gateway::lifecycle::Shutdown;

fn test_config(bind: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = bind.to_string();
    config.donation.donation_address = "S4DDsQjAwV2f9fGPNcbAQWPcQJP2GQT1VGrA5MK9Myq".to_string();
    config.donation.token_mint = "EStPXF2Mh3NVEezeysYfhrWXnuqwmbmjqLSP9vR5pump".to_string();

    // Nothing listens on port 1; connections are refused immediately.
    config.chain.rpc_url = "http://127.0.0.1:1".to_string();
    config.chain.rpc_timeout_secs = 2;

    config.retries.max_attempts = 2;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 20;
    config.retries.rate_limit_base_ms = 10;
    config.retries.rate_limit_max_ms = 20;

    config.leaderboard.background_refresh = false;

    config.admin.enabled = true;
    config.admin.api_key = "test-admin-key".to_string();

    config
}

async fn spawn_gateway(config: GatewayConfig) -> Shutdown {
    let bind: SocketAddr = config.listener.bind_address.parse().unwrap();
    let signer = Arc::new(KeypairSigner::new(Keypair::new()));
    let server = HttpServer::new(config, signer).unwrap();
    let listener = tokio::net::TcpListener::bind(bind).await.unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (_, config_updates) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn test_health_reports_unreachable_chain() {
    let proxy_addr: SocketAddr = "127.0.0.1:29181".parse().unwrap();
    let shutdown = spawn_gateway(test_config(proxy_addr)).await;

    let res = client()
        .get(format!("http://{}/health", proxy_addr))
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chain_reachable"], false);

    shutdown.trigger();
}

#[tokio::test]
async fn test_progress_surfaces_network_error_envelope() {
    let proxy_addr: SocketAddr = "127.0.0.1:29182".parse().unwrap();
    let shutdown = spawn_gateway(test_config(proxy_addr)).await;

    let res = client()
        .get(format!("http://{}/api/progress", proxy_addr))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "NETWORK_ERROR");
    assert_eq!(body["severity"], "error");

    shutdown.trigger();
}

#[tokio::test]
async fn test_invalid_address_rejected_client_side() {
    let proxy_addr: SocketAddr = "127.0.0.1:29183".parse().unwrap();
    let shutdown = spawn_gateway(test_config(proxy_addr)).await;

    let res = client()
        .get(format!("http://{}/api/balance/not-an-address", proxy_addr))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_ADDRESS");
    assert_eq!(body["severity"], "warning");

    shutdown.trigger();
}

#[tokio::test]
async fn test_invalid_amount_rejected_without_rpc() {
    let proxy_addr: SocketAddr = "127.0.0.1:29184".parse().unwrap();
    let shutdown = spawn_gateway(test_config(proxy_addr)).await;

    for amount in [0.0, -10.0] {
        let start = std::time::Instant::now();
        let res = client()
            .post(format!("http://{}/api/donate", proxy_addr))
            .json(&json!({ "amount": amount }))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 400);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["code"], "INVALID_AMOUNT");
        assert_eq!(body["message"], "Please enter a valid amount");
        // Rejected locally: no RPC attempt, no retry delays.
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_donate_with_dead_chain_fails_with_envelope() {
    let proxy_addr: SocketAddr = "127.0.0.1:29185".parse().unwrap();
    let shutdown = spawn_gateway(test_config(proxy_addr)).await;

    let res = client()
        .post(format!("http://{}/api/donate", proxy_addr))
        .json(&json!({ "amount": 100.0 }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "OPERATION_FAILED");

    shutdown.trigger();
}

#[tokio::test]
async fn test_admin_requires_bearer_key() {
    let proxy_addr: SocketAddr = "127.0.0.1:29186".parse().unwrap();
    let shutdown = spawn_gateway(test_config(proxy_addr)).await;

    let res = client()
        .get(format!("http://{}/admin/cache", proxy_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = client()
        .get(format!("http://{}/admin/cache", proxy_addr))
        .header("Authorization", "Bearer wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = client()
        .get(format!("http://{}/admin/cache", proxy_addr))
        .header("Authorization", "Bearer test-admin-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["total_donors"], 0);
    assert_eq!(body["stale"], true);

    shutdown.trigger();
}

#[tokio::test]
async fn test_request_id_assigned_and_echoed() {
    let proxy_addr: SocketAddr = "127.0.0.1:29187".parse().unwrap();
    let shutdown = spawn_gateway(test_config(proxy_addr)).await;

    let res = client()
        .get(format!("http://{}/health", proxy_addr))
        .send()
        .await
        .unwrap();
    assert!(res.headers().contains_key("x-request-id"));

    let res = client()
        .get(format!("http://{}/health", proxy_addr))
        .header("x-request-id", "test-correlation-id")
        .send()
        .await
        .unwrap();
    assert_eq!(
        res.headers().get("x-request-id").unwrap(),
        "test-correlation-id"
    );

    shutdown.trigger();
}
