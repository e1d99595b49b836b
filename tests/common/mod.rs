//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use base64::Engine;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use gatekeeper::config::schema::GatekeeperConfig;
use gatekeeper::security::token::TokenIssuer;

/// 64 bytes, enough for HS512.
pub fn secret() -> String {
    base64::engine::general_purpose::STANDARD.encode([0x5au8; 64])
}

/// Valid config bound to an ephemeral port, optionally forwarding to `upstream`.
pub fn test_config(upstream: Option<SocketAddr>) -> GatekeeperConfig {
    let mut config = GatekeeperConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.security.jwt.base64_secret = Some(secret());
    config.upstream.url = upstream.map(|addr| format!("http://{}", addr));
    config
}

pub fn token(config: &GatekeeperConfig, subject: &str, authorities: &[&str]) -> String {
    TokenIssuer::from_config(&config.security.jwt)
        .unwrap()
        .issue(subject, authorities)
        .unwrap()
}

/// Token that expired well beyond the leeway.
pub fn expired_token(config: &GatekeeperConfig, subject: &str) -> String {
    let now = jsonwebtoken::get_current_timestamp();
    let claims = serde_json::json!({
        "sub": subject,
        "auth": "ROLE_USER",
        "iat": now - 7200,
        "exp": now - 3600,
    });
    let key = jsonwebtoken::EncodingKey::from_base64_secret(config.security.jwt.base64_secret.as_deref().unwrap())
        .unwrap();
    jsonwebtoken::encode(&jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS512), &claims, &key).unwrap()
}

/// Token signed with a different secret.
pub fn foreign_token(subject: &str) -> String {
    let mut config = test_config(None);
    config.security.jwt.base64_secret = Some(base64::engine::general_purpose::STANDARD.encode([0x11u8; 64]));
    token(&config, subject, &["ROLE_ADMIN"])
}

/// Start a mock upstream that answers every request with a JSON echo of what
/// it received: method, path and the forwarding headers.
///
/// Paths containing `cached` get an explicit `Cache-Control` header.
pub async fn start_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = Vec::new();
                        let mut chunk = [0u8; 1024];
                        loop {
                            match socket.read(&mut chunk).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => {
                                    buf.extend_from_slice(&chunk[..n]);
                                    if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                                        break;
                                    }
                                }
                            }
                        }

                        let head = String::from_utf8_lossy(&buf).to_string();
                        let mut lines = head.split("\r\n");
                        let mut request_line = lines.next().unwrap_or_default().split(' ');
                        let method = request_line.next().unwrap_or_default().to_string();
                        let path = request_line.next().unwrap_or_default().to_string();

                        let mut echoed = serde_json::Map::new();
                        for line in lines {
                            if let Some((name, value)) = line.split_once(':') {
                                let name = name.trim().to_ascii_lowercase();
                                if name.starts_with("x-") || name == "authorization" || name == "connection" {
                                    echoed.insert(name, serde_json::Value::from(value.trim()));
                                }
                            }
                        }

                        let body = serde_json::json!({
                            "method": method,
                            "path": path,
                            "headers": echoed,
                        })
                        .to_string();
                        let cache = if path.contains("cached") {
                            "Cache-Control: public, max-age=60\r\n"
                        } else {
                            ""
                        };
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            cache,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
