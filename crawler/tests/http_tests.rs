use booksim_core::DocId;
use booksim_crawler::{
    build_client, Acquirer, FetchError, GutenbergMetadata, HttpTextSource, MetadataError, MetadataProvider, Overrides,
    RetryPolicy, TextCache, USER_AGENT,
};
use parking_lot::Mutex;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

type Handler = dyn Fn(&str, usize) -> (u16, Vec<u8>) + Send + Sync;

/// Minimal HTTP/1.1 server on a loopback port. `handler` gets the request path
/// and how many times that path was requested before, and returns status and body.
struct LocalServer {
    base: Url,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl LocalServer {
    async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, usize) -> (u16, Vec<u8>) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::default();
        let handler: Arc<Handler> = Arc::new(handler);
        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { return };
                let handler = handler.clone();
                let counter = counter.clone();
                tokio::spawn(async move { respond(stream, handler, counter).await });
            }
        });
        Self { base: Url::parse(&format!("http://{addr}/")).unwrap(), hits }
    }

    fn hits(&self, path: &str) -> usize { self.hits.lock().get(path).copied().unwrap_or(0) }
}

async fn respond(mut stream: TcpStream, handler: Arc<Handler>, hits: Arc<Mutex<HashMap<String, usize>>>) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    let head = String::from_utf8_lossy(&request);
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
    let seen = {
        let mut hits = hits.lock();
        let n = hits.entry(path.clone()).or_insert(0);
        *n += 1;
        *n - 1
    };
    let (status, body) = handler(&path, seen);
    let header = format!("HTTP/1.1 {status} Status\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", body.len());
    let _ = stream.write_all(header.as_bytes()).await;
    let _ = stream.write_all(&body).await;
    let _ = stream.shutdown().await;
}

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
        attempt_timeout: Duration::from_secs(5),
    }
}

fn http_acquirer(server: &LocalServer, cache: &std::path::Path, max_attempts: u32) -> Acquirer<HttpTextSource> {
    let client = build_client(USER_AGENT, Duration::from_secs(5)).unwrap();
    Acquirer::new(HttpTextSource::new(client, server.base.clone()), TextCache::new(cache), Overrides::empty(), policy(max_attempts))
}

fn text_path(id: DocId) -> String { format!("/files/{id}/{id}.txt") }

#[tokio::test]
async fn service_unavailable_is_retried_until_success() {
    let server = LocalServer::start(|_, seen| if seen < 2 { (503, Vec::new()) } else { (200, b"book five".to_vec()) }).await;
    let dir = tempfile::tempdir().unwrap();
    let acq = http_acquirer(&server, dir.path(), 3);

    assert_eq!(acq.fetch(5).await.unwrap(), "book five");
    assert_eq!(server.hits(&text_path(5)), 3);
    assert_eq!(std::fs::read_to_string(acq.cache().path(5)).unwrap(), "book five");
}

#[tokio::test]
async fn persistent_server_errors_exhaust_the_attempts() {
    let server = LocalServer::start(|_, _| (503, Vec::new())).await;
    let dir = tempfile::tempdir().unwrap();
    let acq = http_acquirer(&server, dir.path(), 2);

    match acq.fetch(5).await {
        Err(FetchError::Exhausted { id: 5, attempts: 2, last }) => assert!(last.is_transient()),
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(server.hits(&text_path(5)), 2);
    assert!(!acq.cache().path(5).exists());
}

#[tokio::test]
async fn not_found_fails_after_one_request() {
    let server = LocalServer::start(|_, _| (404, b"no such book".to_vec())).await;
    let dir = tempfile::tempdir().unwrap();
    let acq = http_acquirer(&server, dir.path(), 5);

    assert!(matches!(acq.fetch(8).await, Err(FetchError::Unavailable { id: 8, resolved: 8, .. })));
    assert_eq!(server.hits(&text_path(8)), 1);
    assert!(!acq.cache().path(8).exists());
}

#[tokio::test]
async fn latin1_body_is_decoded_and_cached_as_utf8() {
    let server = LocalServer::start(|_, _| (200, b"caf\xe9 cr\xe8me".to_vec())).await;
    let dir = tempfile::tempdir().unwrap();
    let acq = http_acquirer(&server, dir.path(), 2);

    assert_eq!(acq.fetch(3).await.unwrap(), "caf\u{e9} cr\u{e8}me");
    assert_eq!(std::fs::read(acq.cache().path(3)).unwrap(), "caf\u{e9} cr\u{e8}me".as_bytes());
}

#[tokio::test]
async fn catalog_page_is_scraped_over_http() {
    let page = r#"<html><body><table>
        <tr><td><a itemprop="creator">Austen, Jane, 1775-1817</a></td></tr>
        <tr><td itemprop="headline">Emma</td></tr>
        <tr><td itemprop="datePublished">Aug 1, 1994</td></tr>
    </table></body></html>"#;
    let server = LocalServer::start(move |path, _| match path {
        "/ebooks/158" => (200, page.as_bytes().to_vec()),
        _ => (404, Vec::new()),
    })
    .await;
    let client = build_client(USER_AGENT, Duration::from_secs(5)).unwrap();
    let provider = GutenbergMetadata::new(client, server.base.clone());

    let meta = provider.metadata(158).await.unwrap();
    assert_eq!(meta.title.as_deref(), Some("Emma"));
    assert_eq!(meta.author.as_deref(), Some("Austen, Jane"));
    assert_eq!(meta.author_birth_year, Some(1775));
    assert_eq!(meta.published.map(|d| d.to_string()), Some("1994-08-01".to_string()));

    assert!(matches!(provider.metadata(159).await, Err(MetadataError::NotFound { id: 159, .. })));
    assert_eq!(server.hits("/ebooks/159"), 1);
}
