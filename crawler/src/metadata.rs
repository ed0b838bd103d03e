use crate::error::MetadataError;
use crate::source::classify_reqwest;
use booksim_core::{DocId, DocMeta};
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use std::future::Future;
use time::macros::format_description;
use time::Date;

/// Bibliographic metadata for a document identifier.
pub trait MetadataProvider: Send + Sync {
    fn metadata(&self, id: DocId) -> impl Future<Output = Result<DocMeta, MetadataError>> + Send;
}

/// Provider for offline runs: every field absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl MetadataProvider for NoMetadata {
    async fn metadata(&self, _id: DocId) -> Result<DocMeta, MetadataError> {
        Ok(DocMeta::default())
    }
}

/// Scrapes the catalog page at `{base}/ebooks/{id}`.
#[derive(Clone)]
pub struct GutenbergMetadata {
    client: Client,
    base: Url,
}

impl GutenbergMetadata {
    pub fn new(client: Client, base: Url) -> Self { Self { client, base } }
}

impl MetadataProvider for GutenbergMetadata {
    async fn metadata(&self, id: DocId) -> Result<DocMeta, MetadataError> {
        let not_found = move |reason: String| MetadataError::NotFound { id, reason };
        let url = self.base.join(&format!("ebooks/{id}")).map_err(|e| not_found(e.to_string()))?;
        let resp = self.client.get(url).send().await.map_err(|e| not_found(classify_reqwest(e).to_string()))?;
        if !resp.status().is_success() {
            return Err(not_found(format!("catalog page returned {}", resp.status())));
        }
        let html = resp.text().await.map_err(|e| not_found(e.to_string()))?;
        let meta = parse_catalog_page(&html);
        if meta == DocMeta::default() {
            return Err(not_found("no title, author or date on catalog page".into()));
        }
        Ok(meta)
    }
}

/// Fetch metadata, degrading any failure to all-absent fields.
pub async fn metadata_or_default<M: MetadataProvider>(provider: &M, id: DocId) -> DocMeta {
    match provider.metadata(id).await {
        Ok(meta) => meta,
        Err(e) => {
            tracing::warn!(id, error = %e, "metadata missing");
            DocMeta::default()
        }
    }
}

fn select_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let text = doc.select(&sel).next()?.text().collect::<String>();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() { None } else { Some(text) }
}

/// Pull title, author, author birth year and release date out of a catalog page.
pub fn parse_catalog_page(html: &str) -> DocMeta {
    let doc = Html::parse_document(html);
    let title = select_text(&doc, r#"[itemprop="headline"]"#);
    let creator = select_text(&doc, r#"[itemprop="creator"]"#);
    let published = select_text(&doc, r#"[itemprop="datePublished"]"#).and_then(|d| parse_release_date(&d));
    let (author, author_birth_year) = match creator {
        Some(c) => split_creator(&c),
        None => (None, None),
    };
    DocMeta { title, author, author_birth_year, published }
}

/// Dates look like `Dec 1, 1971`.
pub fn parse_release_date(s: &str) -> Option<Date> {
    let fmt = format_description!("[month repr:short] [day padding:none], [year]");
    Date::parse(s.trim(), &fmt).ok()
}

/// `"Jefferson, Thomas, 1743-1826"` becomes (`"Jefferson, Thomas"`, `1743`).
/// Creators without a trailing life span keep the whole string as the name.
pub fn split_creator(creator: &str) -> (Option<String>, Option<i32>) {
    let creator = creator.trim();
    if let Some((name, span)) = creator.rsplit_once(", ") {
        let digits: String = span.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            let born = digits.parse().ok();
            return (Some(name.trim().to_string()), born);
        }
        if span.starts_with('-') || span.starts_with('?') {
            return (Some(name.trim().to_string()), None);
        }
    }
    if creator.is_empty() { (None, None) } else { (Some(creator.to_string()), None) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    #[test]
    fn creator_with_life_span() {
        assert_eq!(split_creator("Jefferson, Thomas, 1743-1826"), (Some("Jefferson, Thomas".into()), Some(1743)));
        assert_eq!(split_creator("Carroll, Lewis, 1832-1898"), (Some("Carroll, Lewis".into()), Some(1832)));
    }

    #[test]
    fn creator_without_birth_year() {
        assert_eq!(split_creator("Homer, -750?"), (Some("Homer".into()), None));
        assert_eq!(split_creator("United States"), (Some("United States".into()), None));
        assert_eq!(split_creator("  "), (None, None));
    }

    #[test]
    fn release_dates() {
        assert_eq!(parse_release_date("Dec 1, 1971"), Some(Date::from_calendar_date(1971, Month::December, 1).unwrap()));
        assert_eq!(parse_release_date("Jan 12, 1993"), Some(Date::from_calendar_date(1993, Month::January, 12).unwrap()));
        assert_eq!(parse_release_date("sometime"), None);
    }
}
