//! Thin HTTP clients for the third-party services the backend leans on.
//!
//! Every client sits behind a trait object in the application state.

#[cfg(test)]
pub mod fakes;
pub mod generative;
pub mod products;
pub mod recipes;
pub mod recognition;

use std::time::Duration;

use axum::http::StatusCode;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("upstream returned {status}: {message}")]
    InvalidResponse { status: u16, message: String },

    #[error("could not decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("not found upstream")]
    NotFound,

    #[error("{0} is not configured")]
    Unconfigured(&'static str),
}

pub(crate) fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("pantrytrack/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// reqwest reports its own deadline as an ordinary error; keep it a timeout.
fn from_reqwest(e: reqwest::Error, timeout: Duration) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout(timeout)
    } else {
        ClientError::Transport(e)
    }
}

/// Sends `req`, bounded by `timeout`, and decodes a 2xx JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    req: RequestBuilder,
    timeout: Duration,
) -> Result<T, ClientError> {
    let call = async {
        let resp = req.send().await.map_err(|e| from_reqwest(e, timeout))?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| from_reqwest(e, timeout))?;
        debug!(%status, bytes = body.len(), "upstream responded");
        if !status.is_success() {
            return Err(ClientError::InvalidResponse {
                status: status.as_u16(),
                message: snippet(&body),
            });
        }
        Ok(serde_json::from_slice::<T>(&body)?)
    };
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| ClientError::Timeout(timeout))?
}

fn snippet(body: &[u8]) -> String {
    const MAX: usize = 200;
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return "empty body".into();
    }
    match text.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// HTTP status a handler reports for a failed upstream call.
pub(crate) fn upstream_error(e: ClientError) -> (StatusCode, String) {
    let status = match &e {
        ClientError::NotFound => StatusCode::NOT_FOUND,
        ClientError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        ClientError::Unconfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        ClientError::Transport(_) | ClientError::InvalidResponse { .. } | ClientError::Decode(_) => {
            StatusCode::BAD_GATEWAY
        }
    };
    if status.is_server_error() {
        tracing::error!(%status, error = %e, "upstream call failed");
    }
    (status, e.to_string())
}

/// Upstream text fields arrive as missing, null or blank; all mean "unknown".
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accepts connections, reads the request, optionally sends headers and
    /// a few body bytes, then goes quiet.
    async fn stalling_upstream(partial_body: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let _ = sock.read(&mut buf).await;
                    if partial_body {
                        let _ = sock
                            .write_all(
                                b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"a\":",
                            )
                            .await;
                    }
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    drop(sock);
                });
            }
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn stalled_headers_are_a_timeout() {
        let url = stalling_upstream(false).await;
        let timeout = Duration::from_millis(300);
        let http = http_client(timeout).unwrap();
        let err = send_json::<serde_json::Value>(http.get(&url), timeout)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)), "{err:?}");
    }

    #[tokio::test]
    async fn stalled_body_is_a_timeout() {
        let url = stalling_upstream(true).await;
        let timeout = Duration::from_millis(300);
        let http = http_client(timeout).unwrap();
        for _ in 0..5 {
            let err = send_json::<serde_json::Value>(http.get(&url), timeout)
                .await
                .unwrap_err();
            assert!(matches!(err, ClientError::Timeout(_)), "{err:?}");
        }
    }

    #[test]
    fn snippet_truncates_long_bodies() {
        let long = "x".repeat(500);
        let s = snippet(long.as_bytes());
        assert!(s.ends_with('…'));
        assert_eq!(s.chars().count(), 201);
        assert_eq!(snippet(b"  "), "empty body");
        assert_eq!(snippet(b"{\"error\":\"bad key\"}"), "{\"error\":\"bad key\"}");
    }

    #[test]
    fn blank_fields_are_unknown() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(Some(" Danone ".into())), Some("Danone".into()));
    }

    #[test]
    fn timeout_message_is_readable() {
        let e = ClientError::Timeout(Duration::from_secs(20));
        assert_eq!(e.to_string(), "request timed out after 20s");
    }
}
