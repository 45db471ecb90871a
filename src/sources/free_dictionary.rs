use anyhow::{Context, Result, anyhow};
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::http::{error_message, read_response};
use super::{Source, SourceFuture, SourceRole};
use crate::record::PartialRecord;

pub const DEFAULT_URL: &str = "https://api.dictionaryapi.dev/api/v2/entries";
const MAX_EXAMPLES: usize = 3;

/// dictionaryapi.dev: phonetics, pronunciation audio and definitions for
/// English words. No key required.
#[derive(Debug, Clone)]
pub struct FreeDictionary {
    client: reqwest::Client,
    base_url: String,
    lang: String,
}

impl FreeDictionary {
    pub fn new(client: reqwest::Client, base_url: &str, lang: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            lang: lang.to_string(),
        }
    }

    async fn lookup(&self, word: &str) -> Result<Option<PartialRecord>> {
        let url = entry_url(&self.base_url, &self.lang, word)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| "Free Dictionary request failed")?;
        let (status, text) = read_response(response).await;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(anyhow!(
                "Free Dictionary API error ({}): {}",
                status,
                error_message(&text)
            ));
        }
        extract_entry(&text)
    }
}

impl Source for FreeDictionary {
    fn name(&self) -> &'static str {
        "free_dictionary"
    }

    fn role(&self) -> SourceRole {
        SourceRole::Dictionary
    }

    fn attempt(&self, word: &str) -> SourceFuture {
        let source = self.clone();
        let word = word.to_string();
        Box::pin(async move { source.lookup(&word).await })
    }
}

fn entry_url(base_url: &str, lang: &str, word: &str) -> Result<Url> {
    let mut url =
        Url::parse(base_url).with_context(|| format!("invalid dictionary url: {}", base_url))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("dictionary url cannot take path segments: {}", base_url))?
        .pop_if_empty()
        .push(lang)
        .push(word);
    Ok(url)
}

pub(crate) fn extract_entry(body: &str) -> Result<Option<PartialRecord>> {
    let entries: Vec<DictionaryEntry> =
        serde_json::from_str(body).with_context(|| "malformed Free Dictionary response")?;

    let phonetic = entries
        .iter()
        .filter_map(|entry| entry.phonetic.clone())
        .chain(
            entries
                .iter()
                .flat_map(|entry| entry.phonetics.iter())
                .filter_map(|phonetic| phonetic.text.clone()),
        )
        .find(|text| !text.trim().is_empty());

    let audio = entries
        .iter()
        .flat_map(|entry| entry.phonetics.iter())
        .filter_map(|phonetic| phonetic.audio.as_deref())
        .find(|audio| !audio.trim().is_empty())
        .map(absolute_audio_url);

    let definitions = entries
        .iter()
        .flat_map(|entry| entry.meanings.iter())
        .flat_map(|meaning| meaning.definitions.iter());

    let meaning = definitions
        .clone()
        .map(|definition| definition.definition.clone())
        .find(|text| !text.trim().is_empty());

    let examples = definitions
        .filter_map(|definition| definition.example.clone())
        .filter(|example| !example.trim().is_empty())
        .take(MAX_EXAMPLES)
        .collect();

    let partial = PartialRecord {
        translation: None,
        phonetic,
        audio,
        meaning,
        examples,
    }
    .normalized();
    if partial.is_empty() {
        return Ok(None);
    }
    Ok(Some(partial))
}

fn absolute_audio_url(audio: &str) -> String {
    let audio = audio.trim();
    if audio.starts_with("//") {
        format!("https:{}", audio)
    } else {
        audio.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct DictionaryEntry {
    #[serde(default)]
    phonetic: Option<String>,
    #[serde(default)]
    phonetics: Vec<Phonetic>,
    #[serde(default)]
    meanings: Vec<Meaning>,
}

#[derive(Debug, Deserialize)]
struct Phonetic {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    audio: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Meaning {
    #[serde(default)]
    definitions: Vec<Definition>,
}

#[derive(Debug, Deserialize)]
struct Definition {
    #[serde(default)]
    definition: String,
    #[serde(default)]
    example: Option<String>,
}
