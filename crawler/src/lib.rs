//! Document acquisition: a text source behind a retrying, idempotent on-disk
//! cache, plus the catalog metadata collaborator.

pub mod acquire;
pub mod cache;
pub mod error;
pub mod metadata;
pub mod source;

pub use acquire::{Acquirer, RetryPolicy};
pub use cache::TextCache;
pub use error::{FetchError, MetadataError, SourceError};
pub use metadata::{metadata_or_default, GutenbergMetadata, MetadataProvider, NoMetadata};
pub use source::{build_client, HttpTextSource, Overrides, TextSource, DEFAULT_BASE_URL};

pub const USER_AGENT: &str = concat!("booksim/", env!("CARGO_PKG_VERSION"));
