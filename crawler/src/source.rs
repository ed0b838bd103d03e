use crate::error::SourceError;
use anyhow::{Context, Result};
use booksim_core::DocId;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://www.gutenberg.org/";

/// Where raw document text comes from.
pub trait TextSource: Send + Sync {
    fn fetch_text(&self, id: DocId) -> impl Future<Output = Result<String, SourceError>> + Send;
}

/// Identifiers whose text lives under another identifier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Overrides(HashMap<DocId, DocId>);

impl Overrides {
    pub fn empty() -> Self { Self(HashMap::new()) }

    pub fn from_pairs<I: IntoIterator<Item = (DocId, DocId)>>(pairs: I) -> Self {
        Self(pairs.into_iter().collect())
    }

    /// Load a JSON object such as `{"40": 51}`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("reading overrides {}", path.display()))?;
        let overrides = serde_json::from_str(&text).with_context(|| format!("parsing overrides {}", path.display()))?;
        Ok(overrides)
    }

    pub fn resolve(&self, id: DocId) -> DocId { self.0.get(&id).copied().unwrap_or(id) }
}

impl Default for Overrides {
    /// Book 40 has no standalone text file; book 51 carries it.
    fn default() -> Self { Self::from_pairs([(40, 51)]) }
}

/// Plain-text books over HTTP at `{base}/files/{n}/{n}.txt`.
#[derive(Clone)]
pub struct HttpTextSource {
    client: Client,
    base: Url,
}

impl HttpTextSource {
    pub fn new(client: Client, base: Url) -> Self { Self { client, base } }

    pub fn url_for(&self, id: DocId) -> Result<Url, SourceError> {
        self.base
            .join(&format!("files/{id}/{id}.txt"))
            .map_err(|e| SourceError::Permanent(format!("bad url for {id}: {e}")))
    }
}

impl TextSource for HttpTextSource {
    async fn fetch_text(&self, id: DocId) -> Result<String, SourceError> {
        let url = self.url_for(id)?;
        let resp = self.client.get(url.clone()).send().await.map_err(classify_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let msg = format!("{url} returned {status}");
            return Err(if retryable_status(status) { SourceError::Transient(msg) } else { SourceError::Permanent(msg) });
        }
        let bytes = resp.bytes().await.map_err(classify_reqwest)?;
        Ok(decode_text(bytes.to_vec()))
    }
}

/// Shared HTTP client for text and metadata requests.
pub fn build_client(user_agent: &str, timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .build()
}

pub(crate) fn retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS
}

pub(crate) fn classify_reqwest(e: reqwest::Error) -> SourceError {
    if e.is_builder() {
        SourceError::Permanent(e.to_string())
    } else {
        SourceError::Transient(e.to_string())
    }
}

/// UTF-8 when valid, otherwise Latin-1 (every byte maps to the same code point).
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}
