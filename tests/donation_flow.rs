//! End-to-end tests against a scripted mock RPC node.
//!
//! Covers the happy donation path (balance gate, transfer, confirmation,
//! balance refresh) and leaderboard reconstruction from parsed history.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use spl_associated_token_account::get_associated_token_address;
use tokio::sync::mpsc;

use donation_gateway::chain::wallet::KeypairSigner;
use donation_gateway::config::GatewayConfig;
use donation_gateway::http::HttpServer;
use donation_gateway::lifecycle::Shutdown;

mod common;

const DONATION_ADDRESS: &str = "S4DDsQjAwV2f9fGPNcbAQWPcQJP2GQT1VGrA5MK9Myq";
const TOKEN_MINT: &str = "EStPXF2Mh3NVEezeysYfhrWXnuqwmbmjqLSP9vR5pump";

fn donation_ata() -> Pubkey {
    get_associated_token_address(
        &Pubkey::from_str(DONATION_ADDRESS).unwrap(),
        &Pubkey::from_str(TOKEN_MINT).unwrap(),
    )
}

fn test_config(bind: SocketAddr, rpc: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = bind.to_string();
    config.donation.donation_address = DONATION_ADDRESS.to_string();
    config.donation.token_mint = TOKEN_MINT.to_string();
    config.donation.goal = 100_000_000.0;
    config.donation.settle_delay_ms = 10;

    config.chain.rpc_url = format!("http://{}", rpc);
    config.chain.rpc_timeout_secs = 5;
    config.chain.confirmation_poll_ms = 50;

    config.retries.max_attempts = 3;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 50;

    config.leaderboard.background_refresh = false;
    config.leaderboard.cache_ttl_secs = 300;
    config.leaderboard.tx_batch_size = 2;

    config
}

async fn spawn_gateway(config: GatewayConfig) -> Shutdown {
    spawn_gateway_with_signer(config, Arc::new(KeypairSigner::new(Keypair::new()))).await
}

async fn spawn_gateway_with_signer(
    config: GatewayConfig,
    signer: Arc<dyn donation_gateway::chain::DonationSigner>,
) -> Shutdown {
    let bind: SocketAddr = config.listener.bind_address.parse().unwrap();
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

fn blockhash_str() -> String {
    Hash::new_from_array([7u8; 32]).to_string()
}

fn token_balance_value(ui_amount: f64, raw: &str) -> Value {
    json!({
        "context": { "slot": 5 },
        "value": {
            "uiAmount": ui_amount,
            "decimals": 6,
            "amount": raw,
            "uiAmountString": ui_amount.to_string(),
        }
    })
}

fn existing_account_value() -> Value {
    json!({
        "context": { "slot": 5 },
        "value": {
            "data": ["", "base64"],
            "executable": false,
            "lamports": 2_039_280u64,
            "owner": spl_token::id().to_string(),
            "rentEpoch": 0u64,
            "space": 165,
        }
    })
}

fn confirmed_status_value() -> Value {
    json!({
        "context": { "slot": 5 },
        "value": [{
            "slot": 5,
            "confirmations": 10,
            "err": null,
            "status": { "Ok": null },
            "confirmationStatus": "confirmed",
        }]
    })
}

#[tokio::test]
async fn test_donation_confirms_and_balance_drops() {
    let rpc_addr: SocketAddr = "127.0.0.1:29281".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:29282".parse().unwrap();

    let tx_signature = Signature::from([42u8; 64]).to_string();
    let sent = Arc::new(AtomicBool::new(false));
    let donation_ata = donation_ata().to_string();

    let handler_sent = sent.clone();
    let handler_sig = tx_signature.clone();
    common::start_mock_rpc(
        rpc_addr,
        Arc::new(move |method, params| match method {
            "getSlot" => Some(json!(5)),
            "getVersion" => Some(json!({ "solana-core": "1.18.22", "feature-set": 1 })),
            "getAccountInfo" => Some(existing_account_value()),
            "getLatestBlockhash" => Some(json!({
                "context": { "slot": 5 },
                "value": { "blockhash": blockhash_str(), "lastValidBlockHeight": 100u64 }
            })),
            "getTokenAccountBalance" => {
                let account = params.get(0).and_then(|p| p.as_str()).unwrap_or_default();
                if account == donation_ata {
                    Some(token_balance_value(25_000_000.0, "25000000000000"))
                } else if handler_sent.load(Ordering::SeqCst) {
                    // Wallet balance after the transfer landed.
                    Some(token_balance_value(40_000.0, "40000000000"))
                } else {
                    Some(token_balance_value(50_000.0, "50000000000"))
                }
            }
            "sendTransaction" => {
                handler_sent.store(true, Ordering::SeqCst);
                Some(json!(handler_sig))
            }
            "getSignatureStatuses" => Some(confirmed_status_value()),
            _ => None,
        }),
    )
    .await;

    let shutdown = spawn_gateway(test_config(proxy_addr, rpc_addr)).await;
    let client = client();

    // Wallet endpoint reports the pre-donation balance and primes the
    // local gate.
    let res = client
        .get(format!("http://{}/api/wallet", proxy_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["balance"], 50_000.0);

    // Donate 10,000: confirmed, signature reported.
    let res = client
        .post(format!("http://{}/api/donate", proxy_addr))
        .json(&json!({ "amount": 10_000.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["signature"], tx_signature);
    assert_eq!(body["amount"], 10_000.0);

    // Balance reflects the transfer afterwards.
    let res = client
        .get(format!("http://{}/api/wallet", proxy_addr))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["balance"], 40_000.0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_over_balance_donation_blocked_without_rpc() {
    let rpc_addr: SocketAddr = "127.0.0.1:29283".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:29284".parse().unwrap();

    let rpc_calls = Arc::new(AtomicUsize::new(0));
    let handler_calls = rpc_calls.clone();
    common::start_mock_rpc(
        rpc_addr,
        Arc::new(move |method, _params| {
            handler_calls.fetch_add(1, Ordering::SeqCst);
            match method {
                "getTokenAccountBalance" => Some(token_balance_value(50_000.0, "50000000000")),
                "getSlot" => Some(json!(5)),
                _ => None,
            }
        }),
    )
    .await;

    let shutdown = spawn_gateway(test_config(proxy_addr, rpc_addr)).await;
    let client = client();

    // Prime the gate with the observed balance.
    client
        .get(format!("http://{}/api/wallet", proxy_addr))
        .send()
        .await
        .unwrap();

    let calls_before = rpc_calls.load(Ordering::SeqCst);
    let res = client
        .post(format!("http://{}/api/donate", proxy_addr))
        .json(&json!({ "amount": 100_000.0 }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "INSUFFICIENT_FUNDS");
    assert_eq!(body["message"], "Insufficient balance in your wallet");
    assert_eq!(body["severity"], "warning");

    // The gate fired before any network call.
    assert_eq!(rpc_calls.load(Ordering::SeqCst), calls_before);

    shutdown.trigger();
}

/// Signer that declines every request, the way a wallet user hitting
/// "reject" would.
struct RejectingSigner {
    address: Pubkey,
}

#[async_trait::async_trait]
impl donation_gateway::chain::DonationSigner for RejectingSigner {
    fn pubkey(&self) -> Pubkey {
        self.address
    }

    async fn sign_transaction(
        &self,
        _transaction: &mut solana_sdk::transaction::Transaction,
        _recent_blockhash: Hash,
    ) -> Result<(), donation_gateway::chain::wallet::WalletError> {
        Err(donation_gateway::chain::wallet::WalletError::classify(
            "User rejected the request.",
            Some(4001),
        ))
    }
}

#[tokio::test]
async fn test_rejected_signature_resolves_to_cancelled() {
    let rpc_addr: SocketAddr = "127.0.0.1:29289".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:29290".parse().unwrap();

    let sends = Arc::new(AtomicUsize::new(0));
    let handler_sends = sends.clone();
    common::start_mock_rpc(
        rpc_addr,
        Arc::new(move |method, _params| match method {
            "getSlot" => Some(json!(5)),
            "getAccountInfo" => Some(existing_account_value()),
            "getTokenAccountBalance" => Some(token_balance_value(50_000.0, "50000000000")),
            "getLatestBlockhash" => Some(json!({
                "context": { "slot": 5 },
                "value": { "blockhash": blockhash_str(), "lastValidBlockHeight": 100u64 }
            })),
            "sendTransaction" => {
                handler_sends.fetch_add(1, Ordering::SeqCst);
                None
            }
            _ => None,
        }),
    )
    .await;

    let signer = Arc::new(RejectingSigner {
        address: Pubkey::new_unique(),
    });
    let shutdown = spawn_gateway_with_signer(test_config(proxy_addr, rpc_addr), signer).await;

    let res = client()
        .post(format!("http://{}/api/donate", proxy_addr))
        .json(&json!({ "amount": 100.0 }))
        .send()
        .await
        .unwrap();

    // Never an error: a declined signature is an informational outcome.
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["severity"], "info");
    assert_eq!(body["message"], "Transaction cancelled");

    // Nothing was broadcast.
    assert_eq!(sends.load(Ordering::SeqCst), 0);

    shutdown.trigger();
}

fn history_entry(signature: &str) -> Value {
    json!({
        "signature": signature,
        "slot": 5,
        "err": null,
        "memo": null,
        "blockTime": null,
        "confirmationStatus": "finalized",
    })
}

fn checked_transfer_ix(destination: &str, mint: &str, authority: &str, ui_amount: f64, raw: &str) -> Value {
    json!({
        "program": "spl-token",
        "programId": spl_token::id().to_string(),
        "parsed": {
            "type": "transferChecked",
            "info": {
                "source": Pubkey::new_unique().to_string(),
                "destination": destination,
                "authority": authority,
                "mint": mint,
                "tokenAmount": {
                    "uiAmount": ui_amount,
                    "decimals": 6,
                    "amount": raw,
                    "uiAmountString": ui_amount.to_string(),
                }
            }
        },
        "stackHeight": null,
    })
}

fn parsed_tx(signature: &str, instructions: Vec<Value>) -> Value {
    json!({
        "slot": 5,
        "transaction": {
            "transaction": {
                "signatures": [signature],
                "message": {
                    "accountKeys": [],
                    "recentBlockhash": blockhash_str(),
                    "instructions": instructions,
                    "addressTableLookups": null,
                }
            },
            "meta": {
                "err": null,
                "status": { "Ok": null },
                "fee": 5000,
                "preBalances": [],
                "postBalances": [],
                "innerInstructions": [],
                "logMessages": [],
                "preTokenBalances": [],
                "postTokenBalances": [],
                "rewards": [],
                "loadedAddresses": { "writable": [], "readonly": [] },
            },
        },
        "blockTime": null,
    })
}

#[tokio::test]
async fn test_leaderboard_aggregates_sorts_and_dedups() {
    let rpc_addr: SocketAddr = "127.0.0.1:29285".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:29286".parse().unwrap();

    let donor_a = Pubkey::new_unique().to_string();
    let donor_b = Pubkey::new_unique().to_string();
    let ata = donation_ata().to_string();

    let sig1 = Signature::from([1u8; 64]).to_string();
    let sig2 = Signature::from([2u8; 64]).to_string();
    let sig3 = Signature::from([3u8; 64]).to_string();
    let failed_sig = Signature::from([4u8; 64]).to_string();

    let tx_fetches = Arc::new(AtomicUsize::new(0));

    let handler = {
        let (ata, donor_a, donor_b) = (ata.clone(), donor_a.clone(), donor_b.clone());
        let (sig1, sig2, sig3, failed_sig) =
            (sig1.clone(), sig2.clone(), sig3.clone(), failed_sig.clone());
        let tx_fetches = tx_fetches.clone();

        move |method: &str, params: &Value| -> Option<Value> {
            match method {
                "getSlot" => Some(json!(5)),
                "getSignaturesForAddress" => {
                    // Failed on chain; must be skipped without a fetch.
                    let mut failed_entry = history_entry(&failed_sig);
                    failed_entry["err"] = json!({ "InstructionError": [0, { "Custom": 1 }] });
                    Some(json!([
                        history_entry(&sig1),
                        history_entry(&sig2),
                        history_entry(&sig3),
                        failed_entry,
                    ]))
                }
                "getTransaction" => {
                    tx_fetches.fetch_add(1, Ordering::SeqCst);
                    let requested = params.get(0)?.as_str()?;
                    if requested == sig1 {
                        Some(parsed_tx(
                            &sig1,
                            vec![checked_transfer_ix(&ata, TOKEN_MINT, &donor_a, 100.0, "100000000")],
                        ))
                    } else if requested == sig2 {
                        Some(parsed_tx(
                            &sig2,
                            vec![
                                checked_transfer_ix(&ata, TOKEN_MINT, &donor_b, 40.0, "40000000"),
                                // Different mint: filtered out.
                                checked_transfer_ix(
                                    &ata,
                                    "So11111111111111111111111111111111111111112",
                                    &donor_b,
                                    999.0,
                                    "999000000",
                                ),
                            ],
                        ))
                    } else if requested == sig3 {
                        Some(parsed_tx(
                            &sig3,
                            vec![checked_transfer_ix(&ata, TOKEN_MINT, &donor_a, 50.0, "50000000")],
                        ))
                    } else {
                        None
                    }
                }
                _ => None,
            }
        }
    };

    common::start_mock_rpc(rpc_addr, Arc::new(handler)).await;
    let shutdown = spawn_gateway(test_config(proxy_addr, rpc_addr)).await;

    let res = client()
        .get(format!("http://{}/api/leaderboard", proxy_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();

    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(body["total_donors"], 2);

    // Sorted descending by amount.
    assert_eq!(entries[0]["address"], donor_a.as_str());
    assert_eq!(entries[0]["amount"], 150.0);
    assert_eq!(entries[1]["address"], donor_b.as_str());
    assert_eq!(entries[1]["amount"], 40.0);

    // No duplicate addresses.
    let mut addresses: Vec<&str> = entries
        .iter()
        .map(|e| e["address"].as_str().unwrap())
        .collect();
    addresses.sort();
    addresses.dedup();
    assert_eq!(addresses.len(), entries.len());

    // The failed signature was never fetched.
    assert_eq!(tx_fetches.load(Ordering::SeqCst), 3);

    // Second read hits the cache: no extra transaction fetches.
    let res = client()
        .get(format!("http://{}/api/leaderboard", proxy_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(tx_fetches.load(Ordering::SeqCst), 3);

    shutdown.trigger();
}

#[tokio::test]
async fn test_progress_reports_goal_percentage() {
    let rpc_addr: SocketAddr = "127.0.0.1:29287".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:29288".parse().unwrap();

    let donation_ata = donation_ata().to_string();
    common::start_mock_rpc(
        rpc_addr,
        Arc::new(move |method, params| match method {
            "getSlot" => Some(json!(5)),
            "getTokenAccountBalance" => {
                let account = params.get(0).and_then(|p| p.as_str()).unwrap_or_default();
                if account == donation_ata {
                    Some(token_balance_value(25_000_000.0, "25000000000000"))
                } else {
                    Some(token_balance_value(0.0, "0"))
                }
            }
            _ => None,
        }),
    )
    .await;

    let mut config = test_config(proxy_addr, rpc_addr);
    config.donation.milestones = vec![
        donation_gateway::config::MilestoneConfig {
            amount: 5_000_000.0,
            label: "Launch the full ecosystem website".to_string(),
        },
        donation_gateway::config::MilestoneConfig {
            amount: 100_000_000.0,
            label: "Reward distribution".to_string(),
        },
    ];
    let shutdown = spawn_gateway(config).await;

    let res = client()
        .get(format!("http://{}/api/progress", proxy_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();

    assert_eq!(body["current"], 25_000_000.0);
    assert_eq!(body["goal"], 100_000_000.0);
    assert_eq!(body["percent"], 25.0);
    assert_eq!(body["milestones"][0]["reached"], true);
    assert_eq!(body["milestones"][1]["reached"], false);

    shutdown.trigger();
}
