use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::record::{WordRecord, non_empty, normalize_word};

/// Read-only word/expression table loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct FixedTable {
    entries: HashMap<String, WordRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FixedFile {
    Map(BTreeMap<String, FixedValue>),
    List(Vec<FixedListItem>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FixedValue {
    Translation(String),
    Entry(FixedEntry),
}

#[derive(Debug, Deserialize)]
struct FixedListItem {
    word: String,
    #[serde(flatten)]
    entry: FixedEntry,
}

#[derive(Debug, Deserialize)]
struct FixedEntry {
    #[serde(default)]
    translation: Option<String>,
    #[serde(default)]
    phonetic: Option<String>,
    #[serde(default)]
    audio: Option<String>,
    #[serde(default)]
    meaning: Option<String>,
    #[serde(default)]
    examples: Vec<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl FixedTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let parsed: FixedFile =
            serde_json::from_str(text).with_context(|| "failed to parse fixed word table")?;
        let mut table = Self::empty();
        match parsed {
            FixedFile::Map(map) => {
                for (word, value) in map {
                    let entry = match value {
                        FixedValue::Translation(translation) => FixedEntry::bare(translation),
                        FixedValue::Entry(entry) => entry,
                    };
                    table.insert_entry(&word, entry);
                }
            }
            FixedFile::List(items) => {
                for item in items {
                    table.insert_entry(&item.word, item.entry);
                }
            }
        }
        Ok(table)
    }

    /// Loads the table from a local JSON file. A missing file yields an
    /// empty table.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("fixed word table not found at {}; starting empty", path.display());
            return Ok(Self::empty());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read fixed word table: {}", path.display()))?;
        let table = Self::from_json(&content)
            .with_context(|| format!("invalid fixed word table: {}", path.display()))?;
        info!("loaded {} fixed entries from {}", table.len(), path.display());
        Ok(table)
    }

    /// Downloads the table from a remote JSON document.
    pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<Self> {
        let response = client
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch fixed word table: {}", url))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("fixed word table request failed ({}): {}", status, url));
        }
        let table = Self::from_json(&text)?;
        info!("loaded {} fixed entries from {}", table.len(), url);
        Ok(table)
    }

    /// Adds every entry of `other`, replacing entries with the same key.
    pub fn extend(&mut self, other: FixedTable) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, word: &str) -> Option<&WordRecord> {
        let key = normalize_word(word)?;
        self.entries.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &WordRecord)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert_entry(&mut self, raw_word: &str, entry: FixedEntry) {
        let Some(word) = normalize_word(raw_word) else {
            warn!("skipping fixed entry with empty word");
            return;
        };
        let Some(record) = entry.into_record(&word) else {
            warn!("skipping fixed entry '{}' without translation", word);
            return;
        };
        self.entries.insert(word, record);
    }
}

impl FixedEntry {
    fn bare(translation: String) -> Self {
        Self {
            translation: Some(translation),
            phonetic: None,
            audio: None,
            meaning: None,
            examples: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    fn into_record(self, word: &str) -> Option<WordRecord> {
        let meaning = self.meaning.and_then(non_empty);
        let translation = self
            .translation
            .and_then(non_empty)
            .or_else(|| meaning.clone())?;
        let mut extra = self.extra;
        extra.remove("word");
        Some(WordRecord {
            word: word.to_string(),
            translation,
            phonetic: self.phonetic.and_then(non_empty).unwrap_or_default(),
            audio: self.audio.and_then(non_empty).unwrap_or_default(),
            meaning,
            examples: self.examples.into_iter().filter_map(non_empty).collect(),
            extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::serve_stub;
    use tempfile::tempdir;

    #[test]
    fn parses_bare_translations_and_entries() {
        let table = FixedTable::from_json(
            r#"{
                "Dog": "cachorro",
                "good morning": {
                    "translation": "bom dia",
                    "phonetic": "/ɡʊd ˈmɔːrnɪŋ/",
                    "examples": ["Good morning, everyone!"],
                    "level": "A1"
                }
            }"#,
        )
        .expect("table");
        assert_eq!(table.len(), 2);

        let dog = table.get("DOG").expect("dog");
        assert_eq!(dog.word, "dog");
        assert_eq!(dog.translation, "cachorro");
        assert_eq!(dog.phonetic, "");

        let morning = table.get(" Good Morning ").expect("expression");
        assert_eq!(morning.translation, "bom dia");
        assert_eq!(morning.examples, vec!["Good morning, everyone!".to_string()]);
        assert_eq!(morning.extra.get("level"), Some(&Value::from("A1")));
    }

    #[test]
    fn parses_list_form() {
        let table = FixedTable::from_json(
            r#"[
                {"word": "Cat", "translation": "gato"},
                {"word": "house", "meaning": "casa"},
                {"word": "empty"}
            ]"#,
        )
        .expect("table");
        assert_eq!(table.get("cat").map(|r| r.translation.as_str()), Some("gato"));
        assert_eq!(table.get("house").map(|r| r.translation.as_str()), Some("casa"));
        assert!(table.get("empty").is_none());
    }

    #[test]
    fn blank_lookup_misses() {
        let table = FixedTable::from_json(r#"{"dog": "cachorro"}"#).expect("table");
        assert!(table.get("   ").is_none());
    }

    #[test]
    fn missing_file_is_empty_table() {
        let dir = tempdir().expect("tempdir");
        let table = FixedTable::load_file(&dir.path().join("fixed_words.json")).expect("table");
        assert!(table.is_empty());
    }

    #[test]
    fn extend_replaces_existing_keys() {
        let mut remote = FixedTable::from_json(r#"{"dog": "cão", "cat": "gato"}"#).expect("remote");
        let local = FixedTable::from_json(r#"{"dog": "cachorro"}"#).expect("local");
        remote.extend(local);
        assert_eq!(remote.get("dog").map(|r| r.translation.as_str()), Some("cachorro"));
        assert_eq!(remote.len(), 2);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(FixedTable::from_json("not json").is_err());
    }

    #[tokio::test]
    async fn fetch_reads_remote_table_and_rejects_errors() {
        let router = axum::Router::new()
            .route(
                "/fixed.json",
                axum::routing::get(|| async { r#"{"Good Night": "boa noite"}"# }),
            )
            .route(
                "/missing.json",
                axum::routing::get(|| async { (axum::http::StatusCode::NOT_FOUND, "Not Found") }),
            );
        let base = serve_stub(router).await;
        let client = reqwest::Client::new();

        let table = FixedTable::fetch(&client, &format!("{}/fixed.json", base))
            .await
            .expect("table");
        assert_eq!(table.get("good night").map(|r| r.translation.as_str()), Some("boa noite"));

        let err = FixedTable::fetch(&client, &format!("{}/missing.json", base))
            .await
            .expect_err("missing table");
        assert!(err.to_string().contains("404"));
    }
}
