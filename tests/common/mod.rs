//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Handler for one JSON-RPC call: `(method, params) -> result payload`.
/// Returning `None` produces a method-not-found error response.
pub type RpcHandler = Arc<dyn Fn(&str, &Value) -> Option<Value> + Send + Sync>;

/// Start a scripted JSON-RPC mock node.
///
/// Each connection serves one request and closes, which keeps the HTTP
/// handling trivial; clients reconnect per call.
pub async fn start_mock_rpc(addr: SocketAddr, handler: RpcHandler) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let Some(body) = read_http_body(&mut socket).await else {
                            return;
                        };
                        let Ok(request) = serde_json::from_slice::<Value>(&body) else {
                            return;
                        };

                        let id = request.get("id").cloned().unwrap_or(json!(1));
                        let method = request
                            .get("method")
                            .and_then(|m| m.as_str())
                            .unwrap_or_default()
                            .to_string();
                        let params = request.get("params").cloned().unwrap_or(Value::Null);

                        let response = match handler(&method, &params) {
                            Some(result) => json!({
                                "jsonrpc": "2.0",
                                "result": result,
                                "id": id,
                            }),
                            None => json!({
                                "jsonrpc": "2.0",
                                "error": { "code": -32601, "message": "Method not found" },
                                "id": id,
                            }),
                        };

                        let payload = response.to_string();
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            payload.len(),
                            payload
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Read one HTTP request off the socket and return its body.
async fn read_http_body(socket: &mut tokio::net::TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(header_end) = find_header_end(&buf) {
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);

            let body_start = header_end + 4;
            while buf.len() < body_start + content_length {
                let n = socket.read(&mut chunk).await.ok()?;
                if n == 0 {
                    return None;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            return Some(buf[body_start..body_start + content_length].to_vec());
        }
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
