use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::Entries;
use crate::error::LookupError;
use crate::record::{WordRecord, normalize_word};

pub(crate) async fn load(path: &Path) -> Result<HashMap<String, WordRecord>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read cache: {}", path.display()));
        }
    };
    if content.trim().is_empty() {
        return Ok(HashMap::new());
    }
    let parsed: HashMap<String, WordRecord> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse cache: {}", path.display()))?;
    let mut entries = HashMap::with_capacity(parsed.len());
    for (word, mut record) in parsed {
        let Some(key) = normalize_word(&word) else {
            continue;
        };
        if record.word.trim().is_empty() {
            record.word = key.clone();
        }
        if record.translation.trim().is_empty() {
            match record.meaning.clone() {
                Some(meaning) if !meaning.trim().is_empty() => record.translation = meaning,
                _ => {
                    debug!("dropping cached '{}' without translation", key);
                    continue;
                }
            }
        }
        entries.insert(key, record);
    }
    Ok(entries)
}

/// Background task that writes the cache to disk after changes settle.
pub(crate) struct CacheWriter {
    notify: Arc<Notify>,
    dirty: Arc<AtomicBool>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CacheWriter {
    pub(crate) fn spawn(path: PathBuf, entries: Entries, debounce: Duration) -> Self {
        let notify = Arc::new(Notify::new());
        let dirty = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run(
            path,
            entries,
            notify.clone(),
            dirty.clone(),
            shutdown_rx,
            debounce,
        ));
        Self {
            notify,
            dirty,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub(crate) async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.await
        {
            warn!("cache writer task failed: {}", err);
        }
    }
}

async fn run(
    path: PathBuf,
    entries: Entries,
    notify: Arc<Notify>,
    dirty: Arc<AtomicBool>,
    mut shutdown: oneshot::Receiver<()>,
    debounce: Duration,
) {
    loop {
        tokio::select! {
            _ = notify.notified() => {
                tokio::select! {
                    _ = sleep(debounce) => {}
                    _ = &mut shutdown => {
                        flush(&path, &entries, &dirty).await;
                        return;
                    }
                }
                flush(&path, &entries, &dirty).await;
            }
            _ = &mut shutdown => {
                flush(&path, &entries, &dirty).await;
                return;
            }
        }
    }
}

async fn flush(path: &Path, entries: &Entries, dirty: &AtomicBool) {
    if !dirty.swap(false, Ordering::SeqCst) {
        return;
    }
    let snapshot: BTreeMap<String, WordRecord> = entries
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|(word, record)| (word.clone(), record.clone()))
        .collect();
    let count = snapshot.len();
    let target = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || write_snapshot(&target, &snapshot)).await;
    match result {
        Ok(Ok(())) => debug!("wrote {} cached words to {}", count, path.display()),
        Ok(Err(err)) => {
            dirty.store(true, Ordering::SeqCst);
            warn!("{}", LookupError::Persistence(format!("{:#}", err)));
        }
        Err(err) => {
            dirty.store(true, Ordering::SeqCst);
            warn!("{}", LookupError::Persistence(err.to_string()));
        }
    }
}

fn write_snapshot(path: &Path, snapshot: &BTreeMap<String, WordRecord>) -> Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create cache directory: {}", dir.display()))?;
    let json = serde_json::to_vec_pretty(snapshot)?;
    let mut file = tempfile::Builder::new()
        .prefix(".word-cache-")
        .suffix(".json")
        .tempfile_in(dir)
        .with_context(|| "failed to create temporary cache file")?;
    file.write_all(&json)
        .with_context(|| "failed to write temporary cache file")?;
    file.as_file()
        .sync_all()
        .with_context(|| "failed to sync temporary cache file")?;
    file.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to replace cache file: {}", path.display()))?;
    Ok(())
}
