use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cache::WordCache;
use crate::error::LookupError;
use crate::fixed::FixedTable;
use crate::record::{PartialRecord, WordRecord, normalize_word};
use crate::settings::Settings;
use crate::sources::{Source, SourceRole};
use crate::tts;

/// Whether a fixed-table hit may still call the dictionary sources to fill
/// in phonetic/audio data the table lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedEnrichment {
    Never,
    MissingFields,
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub fixed_enrichment: FixedEnrichment,
    pub source_timeout: Duration,
    pub placeholder: String,
    pub tts_url: String,
    pub tts_lang: String,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            fixed_enrichment: FixedEnrichment::MissingFields,
            source_timeout: Duration::from_secs(5),
            placeholder: "Translation not found".to_string(),
            tts_url: tts::DEFAULT_TTS_URL.to_string(),
            tts_lang: "en".to_string(),
        }
    }
}

impl ResolverOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            fixed_enrichment: if settings.enrich_fixed {
                FixedEnrichment::MissingFields
            } else {
                FixedEnrichment::Never
            },
            source_timeout: Duration::from_millis(settings.source_timeout_ms),
            placeholder: settings.placeholder.clone(),
            tts_url: settings.tts_url.clone(),
            tts_lang: settings.source_lang.clone(),
        }
    }
}

/// Maps a word to a [`WordRecord`] by trying, in order: the cache, the fixed
/// table, then the dictionary and translation chains (run concurrently),
/// and finally the synthesized TTS URL and placeholder text.
pub struct Resolver {
    cache: Arc<WordCache>,
    fixed: Arc<FixedTable>,
    dictionaries: Vec<Arc<dyn Source>>,
    translators: Vec<Arc<dyn Source>>,
    options: ResolverOptions,
    inflight: InFlight,
}

impl Resolver {
    pub fn new(
        cache: Arc<WordCache>,
        fixed: Arc<FixedTable>,
        sources: Vec<Arc<dyn Source>>,
        options: ResolverOptions,
    ) -> Self {
        let (dictionaries, translators): (Vec<_>, Vec<_>) = sources
            .into_iter()
            .partition(|source| source.role() == SourceRole::Dictionary);
        cache.reconcile(&fixed);
        info!(
            "resolver ready: dictionary sources [{}], translation sources [{}]",
            chain_names(&dictionaries),
            chain_names(&translators)
        );
        Self {
            cache,
            fixed,
            dictionaries,
            translators,
            options,
            inflight: InFlight::default(),
        }
    }

    pub fn cache(&self) -> &WordCache {
        &self.cache
    }

    pub fn fixed(&self) -> &FixedTable {
        &self.fixed
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub async fn resolve(&self, raw: &str) -> Result<WordRecord, LookupError> {
        let word = normalize_word(raw).ok_or(LookupError::InvalidInput)?;
        if let Some(mut record) = self.cache.get(&word) {
            debug!("cache hit for '{}'", word);
            self.fill_audio(&word, &mut record);
            return Ok(record);
        }

        let _slot = self.inflight.acquire(&word).await;
        if let Some(mut record) = self.cache.get(&word) {
            debug!("'{}' resolved by a concurrent request", word);
            self.fill_audio(&word, &mut record);
            return Ok(record);
        }

        let record = match self.fixed.get(&word) {
            Some(entry) => self.resolve_fixed(&word, entry.clone()).await,
            None => self.resolve_remote(&word).await,
        };
        if !self.cache.insert(&word, record.clone()) {
            debug!("'{}' was not cached", word);
        }
        Ok(record)
    }

    /// Flushes the cache to disk and stops its writer.
    pub async fn shutdown(&self) {
        self.cache.close().await;
    }

    async fn resolve_fixed(&self, word: &str, mut record: WordRecord) -> WordRecord {
        debug!("fixed entry for '{}'", word);
        let incomplete = !record.has_phonetic() || !record.has_audio();
        if incomplete
            && self.options.fixed_enrichment == FixedEnrichment::MissingFields
            && let Some(partial) = self
                .run_chain(&self.dictionaries, SourceRole::Dictionary, word)
                .await
        {
            record.enrich(partial);
        }
        self.fill_audio(word, &mut record);
        record
    }

    async fn resolve_remote(&self, word: &str) -> WordRecord {
        let (dictionary, translation) = tokio::join!(
            self.run_chain(&self.dictionaries, SourceRole::Dictionary, word),
            self.run_chain(&self.translators, SourceRole::Translation, word),
        );
        let merged = translation
            .unwrap_or_default()
            .merge(dictionary.unwrap_or_default());
        let mut record = merged.into_record(word);
        if record.translation.is_empty() {
            info!(
                "{}",
                LookupError::NotFound {
                    word: word.to_string()
                }
            );
            record.translation = self.options.placeholder.clone();
        }
        self.fill_audio(word, &mut record);
        record
    }

    fn fill_audio(&self, word: &str, record: &mut WordRecord) {
        if record.has_audio() {
            return;
        }
        match tts::fallback_audio_url(&self.options.tts_url, &self.options.tts_lang, word) {
            Ok(url) => record.audio = url,
            Err(err) => warn!("no fallback audio for '{}': {:#}", word, err),
        }
    }

    /// Tries each source in turn until one contributes. Failures and
    /// timeouts only move the chain along.
    async fn run_chain(
        &self,
        chain: &[Arc<dyn Source>],
        role: SourceRole,
        word: &str,
    ) -> Option<PartialRecord> {
        for source in chain {
            match timeout(self.options.source_timeout, source.attempt(word)).await {
                Ok(Ok(Some(partial))) => {
                    let partial = partial.normalized();
                    if contributes(role, &partial) {
                        debug!("{} answered '{}'", source.name(), word);
                        return Some(partial);
                    }
                    debug!("{} returned nothing usable for '{}'", source.name(), word);
                }
                Ok(Ok(None)) => debug!("{} has no entry for '{}'", source.name(), word),
                Ok(Err(err)) => warn!(
                    "{}",
                    LookupError::unavailable(source.name(), format!("{:#}", err))
                ),
                Err(_) => warn!(
                    "{}",
                    LookupError::unavailable(
                        source.name(),
                        format!("timed out after {}ms", self.options.source_timeout.as_millis())
                    )
                ),
            }
        }
        None
    }
}

fn contributes(role: SourceRole, partial: &PartialRecord) -> bool {
    match role {
        SourceRole::Translation => partial.translation.is_some(),
        SourceRole::Dictionary => !partial.is_empty(),
    }
}

fn chain_names(chain: &[Arc<dyn Source>]) -> String {
    chain
        .iter()
        .map(|source| source.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Per-word locks so that concurrent lookups of the same uncached word hit
/// the remote sources once.
#[derive(Default)]
struct InFlight {
    slots: Mutex<HashMap<String, (Arc<AsyncMutex<()>>, usize)>>,
}

/// Holds one reference on a word's lock entry. The reference is released on
/// drop, including when the owning future is cancelled while still waiting.
struct InFlightSlot<'a> {
    owner: &'a InFlight,
    word: String,
    _guard: Option<OwnedMutexGuard<()>>,
}

impl InFlight {
    async fn acquire(&self, word: &str) -> InFlightSlot<'_> {
        let lock = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = slots
                .entry(word.to_string())
                .or_insert_with(|| (Arc::new(AsyncMutex::new(())), 0));
            slot.1 += 1;
            slot.0.clone()
        };
        let mut slot = InFlightSlot {
            owner: self,
            word: word.to_string(),
            _guard: None,
        };
        slot._guard = Some(lock.lock_owned().await);
        slot
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        let mut slots = self
            .owner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get_mut(&self.word) {
            slot.1 -= 1;
            if slot.1 == 0 {
                slots.remove(&self.word);
            }
        }
    }
}
