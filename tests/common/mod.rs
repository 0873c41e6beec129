//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use rondo::config::ProxyConfig;
use rondo::http::HttpServer;
use rondo::lifecycle::Shutdown;

/// Start a mock backend that reports healthy and answers every other
/// path with a JSON body naming the server.
#[allow(dead_code)]
pub async fn start_mock_backend(name: &'static str) -> SocketAddr {
    start_programmable_backend(move |path| async move {
        if path.starts_with("/health") {
            (200, r#"{"status":"ok"}"#.to_string())
        } else {
            (200, format!(r#"{{"server":"{name}"}}"#))
        }
    })
    .await
}

/// Start a mock backend whose responses are computed per request path.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let _ = serve_connection(socket, handler).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn serve_connection<F, Fut>(mut socket: TcpStream, handler: Arc<F>) -> std::io::Result<()>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let path = read_request(&mut socket).await?;
    let (status, body) = handler(path).await;

    let status_text = match status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await?;
    Ok(())
}

/// Read one request, drain its body, and return the request path.
async fn read_request(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break buffer.len();
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subsequence(&buffer, b"\r\n\r\n") {
            break pos + 4;
        }
        if buffer.len() > 64 * 1024 {
            break buffer.len();
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();

    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);
    let mut remaining = content_length.saturating_sub(buffer.len() - header_end);
    while remaining > 0 {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        remaining = remaining.saturating_sub(n);
    }

    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    Ok(path)
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Spawn the proxy on an ephemeral port with the given backends.
#[allow(dead_code)]
pub async fn start_proxy(config: ProxyConfig, backends: Vec<String>) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let handle = shutdown.handle();
    let server = HttpServer::new(config, backends);
    tokio::spawn(async move {
        let _ = server.run(listener, handle).await;
    });

    (addr, shutdown)
}

/// Normalized origin URL for a mock backend address.
#[allow(dead_code)]
pub fn origin(addr: SocketAddr) -> String {
    format!("http://{addr}")
}

/// Config with short probe intervals and breaker cooldown so tests run
/// in seconds rather than minutes.
#[allow(dead_code)]
pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.health_check.interval_secs = 1;
    config.health_check.timeout_secs = 1;
    config.circuit_breaker.cooldown_secs = 2;
    config
}
