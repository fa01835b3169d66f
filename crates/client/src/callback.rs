//! Local HTTP listener that captures the OAuth redirect
//!
//! The listener is bound before the browser is sent to the provider so the
//! redirect can never race the bind.

use crate::routes::parse_query;
use armory_core::{ArmoryError, CallbackParams, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

const DONE_PAGE: &str = "<html><body><h1>Login received</h1><p>You can close this window and return to Armory.</p><script>window.close()</script></body></html>";
const FAILED_PAGE: &str = "<html><body><h1>Login failed</h1><p>Return to Armory for details.</p></body></html>";

pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

impl CallbackListener {
    /// Bind `addr` and accept redirects to `path`
    pub async fn bind(addr: &str, path: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ArmoryError::Network(format!("Failed to start callback server on {}: {}", addr, e)))?;
        Ok(Self {
            listener,
            path: path.to_string(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| ArmoryError::Network(e.to_string()))
    }

    /// Wait for the provider redirect. Requests for other paths get a 404
    /// and are otherwise ignored.
    pub async fn wait(self, timeout: Duration) -> Result<CallbackParams> {
        tokio::time::timeout(timeout, self.accept_callback())
            .await
            .map_err(|_| ArmoryError::Timeout("login callback".to_string()))?
    }

    async fn accept_callback(&self) -> Result<CallbackParams> {
        loop {
            let (mut stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| ArmoryError::Network(format!("Callback server error: {}", e)))?;

            let request_line = match read_request_line(&mut stream).await {
                Ok(line) => line,
                Err(e) => {
                    tracing::debug!("Dropping callback connection from {}: {}", peer, e);
                    continue;
                }
            };

            match parse_callback_request(&request_line, &self.path) {
                Some(params) => {
                    let body = if params.error.is_some() { FAILED_PAGE } else { DONE_PAGE };
                    respond(&mut stream, "200 OK", body).await;
                    return Ok(params);
                }
                None => {
                    tracing::debug!("Ignoring request '{}'", request_line.trim());
                    respond(&mut stream, "404 Not Found", "").await;
                }
            }
        }
    }
}

/// Read the request line and drain the headers behind it
async fn read_request_line(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    let mut header = String::new();
    loop {
        header.clear();
        if reader.read_line(&mut header).await? == 0 || header.trim().is_empty() {
            break;
        }
    }
    Ok(request_line)
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!("Failed to answer callback request: {}", e);
    }
}

/// Extract callback parameters from `GET /path?query HTTP/1.1`.
/// `None` when the request is not for `expected_path`.
pub fn parse_callback_request(request_line: &str, expected_path: &str) -> Option<CallbackParams> {
    let mut parts = request_line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let target = parts.next()?;
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    if path != expected_path {
        return None;
    }
    Some(callback_params(query))
}

pub fn callback_params(query: &str) -> CallbackParams {
    let mut query = parse_query(query);
    let mut take = |key: &str| query.remove(key).filter(|v| !v.is_empty());
    CallbackParams {
        code: take("code"),
        state: take("state"),
        error: take("error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_parse_callback_request() {
        let params =
            parse_callback_request("GET /auth/callback?code=abc&state=f00d HTTP/1.1\r\n", "/auth/callback")
                .unwrap();
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("f00d"));
        assert_eq!(params.error, None);

        let params =
            parse_callback_request("GET /auth/callback?error=access_denied HTTP/1.1", "/auth/callback")
                .unwrap();
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.code, None);
    }

    #[test]
    fn test_other_requests_are_ignored() {
        assert_eq!(parse_callback_request("GET /favicon.ico HTTP/1.1", "/auth/callback"), None);
        assert_eq!(parse_callback_request("POST /auth/callback HTTP/1.1", "/auth/callback"), None);
        assert_eq!(parse_callback_request("", "/auth/callback"), None);
    }

    #[test]
    fn test_callback_params_decode_values() {
        let params = callback_params("code=a%2Bb&state=&error=");
        assert_eq!(params.code.as_deref(), Some("a+b"));
        assert_eq!(params.state, None);
        assert_eq!(params.error, None);
    }

    async fn get(addr: SocketAddr, target: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target).as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_listener_returns_callback_params() {
        let listener = CallbackListener::bind("127.0.0.1:0", "/auth/callback").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let waiting = tokio::spawn(listener.wait(Duration::from_secs(5)));

        let response = get(addr, "/favicon.ico").await;
        assert!(response.starts_with("HTTP/1.1 404"));

        let response = get(addr, "/auth/callback?code=abc&state=xyz").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("Login received"));

        let params = waiting.await.unwrap().unwrap();
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
    }

    #[tokio::test]
    async fn test_listener_times_out() {
        let listener = CallbackListener::bind("127.0.0.1:0", "/auth/callback").await.unwrap();
        let err = listener.wait(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, ArmoryError::Timeout(_)));
    }
}
