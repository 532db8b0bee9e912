//! Test-only helpers: an in-memory, unchunked work file, and a tiny
//! in-process HTTP stub that plays both the coordinator and the seller
//! worker roles (dispatched by path), so a full end-to-end buy can be
//! exercised against one listener.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use buyer_primitives::{ChunkRecord, Fingerprint, WorkFile};

/// A simple, unchunked in-memory work file for exercising the linear
/// transfer path and the local-match path without a real CAFS.
#[derive(Clone)]
struct MemWorkFile {
    data: Arc<Vec<u8>>,
    key: Fingerprint,
}

pub(crate) fn fake_work_file(data: &[u8]) -> Box<dyn WorkFile> {
    Box::new(MemWorkFile {
        data: Arc::new(data.to_vec()),
        key: Fingerprint::digest(data),
    })
}

impl WorkFile for MemWorkFile {
    fn open(&self) -> io::Result<Box<dyn io::Read + Send>> {
        Ok(Box::new(io::Cursor::new((*self.data).clone())))
    }

    fn key(&self) -> Fingerprint {
        self.key
    }

    fn is_chunked(&self) -> bool {
        false
    }

    fn num_chunks(&self) -> usize {
        0
    }

    fn chunks(&self) -> Box<dyn Iterator<Item = io::Result<ChunkRecord>> + Send> {
        Box::new(std::iter::empty())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn duplicate(&self) -> Box<dyn WorkFile> {
        Box::new(self.clone())
    }
}

/// A parsed incoming request.
pub(crate) struct StubRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// The response the handler wants written back.
pub(crate) struct StubResponse {
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
}

/// Start a stub server on an ephemeral local port, handing the handler
/// factory the base URL (`http://127.0.0.1:PORT`) before any request can
/// arrive — needed because the scripted responses below embed the
/// server's own address (e.g. a `workerurl` pointing back at this same
/// listener). Runs until the returned task is aborted/dropped or the test
/// process exits.
pub(crate) async fn spawn_stub<F, H>(make_handler: F) -> (String, tokio::task::JoinHandle<()>)
where
    F: FnOnce(String) -> H,
    H: Fn(StubRequest) -> StubResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let handler = Arc::new(make_handler(base_url.clone()));

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

    (base_url, task)
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

    let content_length: usize = headers.get("content-length").and_then(|v| v.parse().ok()).unwrap_or(0);
    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Some(StubRequest { method, path, headers, body })
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

async fn write_response(socket: &mut tokio::net::TcpStream, response: StubResponse) -> io::Result<()> {
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

/// A scripted sequence of coordinator `/tx/{id}` JSON documents: each GET
/// advances one step until the script is exhausted, then repeats the last
/// document forever (so a background finalizer polling after the test's
/// assertions have already run still gets a stable answer).
pub(crate) struct TxScript {
    state: Mutex<(usize, Vec<String>)>,
}

impl TxScript {
    pub(crate) fn new(docs: Vec<String>) -> Arc<Self> {
        assert!(!docs.is_empty(), "a TxScript needs at least one document");
        Arc::new(Self { state: Mutex::new((0, docs)) })
    }

    pub(crate) fn next_doc(&self) -> String {
        let mut guard = self.state.lock().unwrap();
        let (index, docs) = &mut *guard;
        let doc = docs
            .get(*index)
            .cloned()
            .unwrap_or_else(|| docs.last().cloned().unwrap());
        if *index + 1 < docs.len() {
            *index += 1;
        }
        doc
    }

    /// The current document without advancing, for requests (e.g. a
    /// coordinator command POST) whose response body the caller never
    /// parses, so they shouldn't steal a step from the GET-driven polling
    /// sequence.
    pub(crate) fn current_doc(&self) -> String {
        let guard = self.state.lock().unwrap();
        let (index, docs) = &*guard;
        docs.get(*index).cloned().unwrap_or_else(|| docs.last().cloned().unwrap())
    }
}
