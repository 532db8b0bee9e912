//! A tiny in-process HTTP/1.1 stub server for exercising the work-transfer
//! protocol without a real seller worker. Deliberately minimal: one request
//! per connection, headers read up to the blank line, body read to the
//! declared `Content-Length`. Good enough for this narrow protocol surface;
//! not a general-purpose HTTP implementation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A parsed incoming request.
pub struct StubRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// The response the handler wants written back.
pub struct StubResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl StubResponse {
    pub fn ok() -> Self {
        Self { status: 200, headers: Vec::new(), body: Vec::new() }
    }

    pub fn with_body(body: impl Into<Vec<u8>>) -> Self {
        Self { status: 200, headers: Vec::new(), body: body.into() }
    }

    pub fn status(status: u16) -> Self {
        Self { status, headers: Vec::new(), body: Vec::new() }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Start a stub server on an ephemeral local port; returns its base URL
/// (`http://127.0.0.1:PORT`). The server runs until the returned task is
/// dropped/aborted or the test process exits.
pub async fn spawn_stub<F>(handler: F) -> (String, tokio::task::JoinHandle<()>)
where
    F: Fn(StubRequest) -> StubResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    let task = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let handler = handler.clone();
            tokio::spawn(async move {
                if let Some(request) = read_request(&mut socket).await {
                    let response = handler(request);
                    let _ = write_response(&mut socket, response).await;
                }
            });
        }
    });

    (format!("http://{addr}"), task)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<StubRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    // Chunk bodies can be sent with `Transfer-Encoding: chunked` (reqwest's
    // streamed `Body::wrap_stream` does not know the length up front); this
    // stub handles both that and `Content-Length`, since the chunked-push
    // path in the real protocol always produces one or the other.
    let mut body = buf[header_end + 4..].to_vec();
    if headers.get("transfer-encoding").map(|v| v.as_str()) == Some("chunked") {
        body = read_chunked_body(socket, body).await?;
    } else {
        let content_length: usize = headers.get("content-length").and_then(|v| v.parse().ok()).unwrap_or(0);
        while body.len() < content_length {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body.truncate(content_length);
    }

    Some(StubRequest { method, path, headers, body })
}

/// Decode an HTTP chunked-transfer body, reading more bytes from `socket` as
/// needed. `seed` is whatever body bytes were already read past the header
/// block.
async fn read_chunked_body(socket: &mut tokio::net::TcpStream, mut seed: Vec<u8>) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        while find_subslice(&seed, b"\r\n").is_none() {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return Some(out);
            }
            seed.extend_from_slice(&chunk[..n]);
        }
        let line_end = find_subslice(&seed, b"\r\n")?;
        let size_line = String::from_utf8_lossy(&seed[..line_end]).to_string();
        let size = usize::from_str_radix(size_line.trim(), 16).ok()?;
        seed.drain(..line_end + 2);

        if size == 0 {
            return Some(out);
        }

        while seed.len() < size + 2 {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return Some(out);
            }
            seed.extend_from_slice(&chunk[..n]);
        }
        out.extend_from_slice(&seed[..size]);
        seed.drain(..size + 2);
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

async fn write_response(socket: &mut tokio::net::TcpStream, response: StubResponse) -> std::io::Result<()> {
    let reason = match response.status {
        200 => "OK",
        400 => "Bad Request",
        _ => "Error",
    };
    let mut head = format!(
        "HTTP/1.1 {} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        response.body.len()
    );
    for (k, v) in &response.headers {
        head.push_str(&format!("{k}: {v}\r\n"));
    }
    head.push_str("\r\n");
    socket.write_all(head.as_bytes()).await?;
    socket.write_all(&response.body).await?;
    socket.flush().await
}
