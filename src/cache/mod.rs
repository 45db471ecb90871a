use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::fixed::FixedTable;
use crate::record::{WordRecord, normalize_word};

mod store;

use store::CacheWriter;

pub const DEFAULT_LIMIT: usize = 10_000;

pub(crate) type Entries = Arc<RwLock<HashMap<String, WordRecord>>>;

/// Resolved records keyed by normalized word.
///
/// Entries are only ever added or overwritten. Once `limit` keys are stored
/// new keys are refused; a limit of zero means unbounded. When opened with a
/// path, every change is flushed to disk by a background writer.
pub struct WordCache {
    entries: Entries,
    limit: usize,
    path: Option<PathBuf>,
    writer: Mutex<Option<CacheWriter>>,
}

impl WordCache {
    pub fn in_memory(limit: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            limit,
            path: None,
            writer: Mutex::new(None),
        }
    }

    /// Loads `path` (if it exists) and starts the background writer. Must be
    /// called inside a Tokio runtime.
    pub async fn open(path: impl Into<PathBuf>, limit: usize, debounce: Duration) -> Result<Self> {
        let path = path.into();
        let loaded = match store::load(&path).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!("ignoring unreadable cache file {}: {:#}", path.display(), err);
                HashMap::new()
            }
        };
        info!("loaded {} cached words from {}", loaded.len(), path.display());
        let entries = Arc::new(RwLock::new(loaded));
        let writer = CacheWriter::spawn(path.clone(), entries.clone(), debounce);
        Ok(Self {
            entries,
            limit,
            path: Some(path),
            writer: Mutex::new(Some(writer)),
        })
    }

    pub fn get(&self, word: &str) -> Option<WordRecord> {
        let key = normalize_word(word)?;
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&key).cloned()
    }

    /// Stores `record` under the normalized `word`. Returns `false` when the
    /// key is blank or the cache is full and the key is new.
    pub fn insert(&self, word: &str, record: WordRecord) -> bool {
        let Some(key) = normalize_word(word) else {
            return false;
        };
        {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            if self.limit > 0 && entries.len() >= self.limit && !entries.contains_key(&key) {
                debug!("cache full ({} entries); not storing '{}'", self.limit, key);
                return false;
            }
            entries.insert(key, record);
        }
        self.mark_dirty();
        true
    }

    /// Overwrites cached translations that disagree with the fixed table.
    pub fn reconcile(&self, fixed: &FixedTable) -> usize {
        let mut updated = 0;
        {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            for (word, fixed_record) in fixed.iter() {
                if let Some(cached) = entries.get_mut(word)
                    && cached.translation != fixed_record.translation
                {
                    cached.translation = fixed_record.translation.clone();
                    updated += 1;
                }
            }
        }
        if updated > 0 {
            info!("replaced {} cached translations with fixed entries", updated);
            self.mark_dirty();
        }
        updated
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flushes pending changes and stops the background writer. Later
    /// inserts stay in memory only.
    pub async fn close(&self) {
        let writer = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(writer) = writer {
            writer.close().await;
        }
    }

    fn mark_dirty(&self) {
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(writer) = writer.as_ref() {
            writer.mark_dirty();
        }
    }
}
