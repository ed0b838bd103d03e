use crate::source::decode_text;
use booksim_core::DocId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// On-disk text cache, one file per document. A file's presence is the hit signal.
pub struct TextCache {
    root: PathBuf,
    locks: Mutex<HashMap<DocId, Arc<AsyncMutex<()>>>>,
}

impl TextCache {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf(), locks: Mutex::new(HashMap::new()) }
    }

    pub fn path(&self, id: DocId) -> PathBuf { self.root.join(format!("book{id}.txt")) }

    fn tmp_path(&self, id: DocId) -> PathBuf { self.root.join(format!(".book{id}.txt.part")) }

    /// Exclusive access to one identifier's entry. Held across the whole
    /// check-fetch-write sequence.
    pub async fn lock(&self, id: DocId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub async fn read(&self, id: DocId) -> io::Result<Option<String>> {
        match fs::read(self.path(id)).await {
            Ok(bytes) => Ok(Some(decode_text(bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write through a temp file and rename, so a hit never sees a partial entry.
    pub async fn write(&self, id: DocId, text: &str) -> io::Result<()> {
        fs::create_dir_all(&self.root).await?;
        let tmp = self.tmp_path(id);
        fs::write(&tmp, text.as_bytes()).await?;
        fs::rename(&tmp, self.path(id)).await
    }
}
