use anyhow::{Result, anyhow};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;

use crate::record::PartialRecord;
use crate::settings::Settings;

pub(crate) mod deepl;
pub(crate) mod free_dictionary;
pub(crate) mod http;
mod libretranslate;
pub(crate) mod mymemory;

pub use deepl::DeepL;
pub use free_dictionary::FreeDictionary;
pub use http::build_client;
pub use libretranslate::LibreTranslate;
pub use mymemory::MyMemory;

/// Which part of a record a source is expected to provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRole {
    /// Phonetic transcription, pronunciation audio, definitions.
    Dictionary,
    /// Translated text.
    Translation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    FreeDictionary,
    MyMemory,
    DeepL,
    LibreTranslate,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::FreeDictionary => "free_dictionary",
            SourceKind::MyMemory => "mymemory",
            SourceKind::DeepL => "deepl",
            SourceKind::LibreTranslate => "libretranslate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "free_dictionary" | "dictionaryapi" | "dictionaryapi.dev" => {
                Some(SourceKind::FreeDictionary)
            }
            "mymemory" => Some(SourceKind::MyMemory),
            "deepl" => Some(SourceKind::DeepL),
            "libretranslate" | "libre" => Some(SourceKind::LibreTranslate),
            _ => None,
        }
    }
}

/// `Ok(None)` means the source answered but has nothing for the word;
/// `Err` means the source could not be used.
pub type SourceFuture = Pin<Box<dyn Future<Output = Result<Option<PartialRecord>>> + Send>>;

pub trait Source: Send + Sync {
    fn name(&self) -> &'static str;
    fn role(&self) -> SourceRole;
    fn attempt(&self, word: &str) -> SourceFuture;
}

/// Builds the configured sources in order: dictionary sources first, then
/// translation sources. Sources missing a key or endpoint are left out.
pub fn build_sources(settings: &Settings, client: &reqwest::Client) -> Result<Vec<Arc<dyn Source>>> {
    let mut sources: Vec<Arc<dyn Source>> = Vec::new();
    let names = settings
        .dictionary_sources
        .iter()
        .chain(settings.translation_sources.iter());
    for name in names {
        let kind = SourceKind::from_name(name).ok_or_else(|| {
            anyhow!(
                "unknown source '{}' (expected free_dictionary, mymemory, deepl, libretranslate)",
                name
            )
        })?;
        if let Some(source) = build_source(kind, settings, client) {
            sources.push(source);
        }
    }
    Ok(sources)
}

fn build_source(
    kind: SourceKind,
    settings: &Settings,
    client: &reqwest::Client,
) -> Option<Arc<dyn Source>> {
    match kind {
        SourceKind::FreeDictionary => Some(Arc::new(FreeDictionary::new(
            client.clone(),
            &settings.free_dictionary_url,
            &settings.source_lang,
        ))),
        SourceKind::MyMemory => Some(Arc::new(
            MyMemory::new(
                client.clone(),
                &settings.mymemory_url,
                &settings.source_lang,
                &settings.target_lang,
            )
            .with_email(settings.mymemory_email.clone()),
        )),
        SourceKind::DeepL => {
            let Some(key) = settings.deepl_key.clone() else {
                info!("skipping deepl: DEEPL_API_KEY not set");
                return None;
            };
            Some(Arc::new(DeepL::new(
                client.clone(),
                &settings.deepl_url,
                key,
                &settings.source_lang,
                &settings.target_lang,
            )))
        }
        SourceKind::LibreTranslate => {
            let Some(url) = settings.libretranslate_url.as_deref() else {
                info!("skipping libretranslate: no endpoint configured");
                return None;
            };
            Some(Arc::new(
                LibreTranslate::new(
                    client.clone(),
                    url,
                    &settings.source_lang,
                    &settings.target_lang,
                )
                .with_key(settings.libretranslate_key.clone()),
            ))
        }
    }
}
