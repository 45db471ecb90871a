use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The payload returned for every lookup.
///
/// The four core fields are always serialized, empty when no source could
/// provide them. `meaning`, `examples` and any extra attributes carried by a
/// fixed-table entry only appear when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WordRecord {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub phonetic: String,
    #[serde(default)]
    pub audio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meaning: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// What a single source contributes to a record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartialRecord {
    pub translation: Option<String>,
    pub phonetic: Option<String>,
    pub audio: Option<String>,
    pub meaning: Option<String>,
    pub examples: Vec<String>,
}

impl PartialRecord {
    pub fn translation(value: impl Into<String>) -> Self {
        Self {
            translation: non_empty(value.into()),
            ..Self::default()
        }
    }

    pub fn with_phonetic(mut self, value: impl Into<String>) -> Self {
        self.phonetic = non_empty(value.into());
        self
    }

    pub fn with_audio(mut self, value: impl Into<String>) -> Self {
        self.audio = non_empty(value.into());
        self
    }

    pub fn with_meaning(mut self, value: impl Into<String>) -> Self {
        self.meaning = non_empty(value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.translation.is_none()
            && self.phonetic.is_none()
            && self.audio.is_none()
            && self.meaning.is_none()
            && self.examples.is_empty()
    }

    /// Fills fields that are still missing from `other`. Fields already set
    /// are kept, so the first contributor wins.
    pub fn merge(mut self, other: PartialRecord) -> Self {
        if self.translation.is_none() {
            self.translation = other.translation;
        }
        if self.phonetic.is_none() {
            self.phonetic = other.phonetic;
        }
        if self.audio.is_none() {
            self.audio = other.audio;
        }
        if self.meaning.is_none() {
            self.meaning = other.meaning;
        }
        if self.examples.is_empty() {
            self.examples = other.examples;
        }
        self
    }

    /// Drops blank strings so that `""` and `None` mean the same thing.
    pub fn normalized(self) -> Self {
        Self {
            translation: self.translation.and_then(non_empty),
            phonetic: self.phonetic.and_then(non_empty),
            audio: self.audio.and_then(non_empty),
            meaning: self.meaning.and_then(non_empty),
            examples: self
                .examples
                .into_iter()
                .filter_map(non_empty)
                .collect(),
        }
    }

    pub fn into_record(self, word: &str) -> WordRecord {
        WordRecord {
            word: word.to_string(),
            translation: self.translation.unwrap_or_default(),
            phonetic: self.phonetic.unwrap_or_default(),
            audio: self.audio.unwrap_or_default(),
            meaning: self.meaning,
            examples: self.examples,
            extra: BTreeMap::new(),
        }
    }
}

impl WordRecord {
    pub fn has_phonetic(&self) -> bool {
        !self.phonetic.trim().is_empty()
    }

    pub fn has_audio(&self) -> bool {
        !self.audio.trim().is_empty()
    }

    /// Copies missing phonetic/audio/meaning/examples from `partial`. The
    /// translation is never touched.
    pub fn enrich(&mut self, partial: PartialRecord) {
        if !self.has_phonetic()
            && let Some(phonetic) = partial.phonetic
        {
            self.phonetic = phonetic;
        }
        if !self.has_audio()
            && let Some(audio) = partial.audio
        {
            self.audio = audio;
        }
        if self.meaning.is_none() {
            self.meaning = partial.meaning;
        }
        if self.examples.is_empty() {
            self.examples = partial.examples;
        }
    }
}

/// Lowercases and trims a lookup key. Returns `None` for blank input.
pub fn normalize_word(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase())
}

pub(crate) fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}
