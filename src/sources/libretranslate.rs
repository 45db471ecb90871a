use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::http::{error_message, read_response};
use super::{Source, SourceFuture, SourceRole};
use crate::record::PartialRecord;

/// A LibreTranslate instance, self-hosted or public.
#[derive(Debug, Clone)]
pub struct LibreTranslate {
    client: reqwest::Client,
    url: String,
    key: Option<String>,
    source_lang: String,
    target_lang: String,
}

impl LibreTranslate {
    pub fn new(client: reqwest::Client, base_url: &str, source_lang: &str, target_lang: &str) -> Self {
        Self {
            client,
            url: translate_url(base_url),
            key: None,
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        }
    }

    pub fn with_key(mut self, key: Option<String>) -> Self {
        self.key = key.filter(|value| !value.trim().is_empty());
        self
    }

    async fn lookup(&self, word: &str) -> Result<Option<PartialRecord>> {
        let mut body = json!({
            "q": word,
            "source": self.source_lang,
            "target": self.target_lang,
            "format": "text",
        });
        if let Some(key) = self.key.as_deref() {
            body["api_key"] = json!(key);
        }
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| "LibreTranslate request failed")?;
        let (status, text) = read_response(response).await;
        if !status.is_success() {
            return Err(anyhow!(
                "LibreTranslate API error ({}): {}",
                status,
                error_message(&text)
            ));
        }
        extract_translation(&text, word)
    }
}

impl Source for LibreTranslate {
    fn name(&self) -> &'static str {
        "libretranslate"
    }

    fn role(&self) -> SourceRole {
        SourceRole::Translation
    }

    fn attempt(&self, word: &str) -> SourceFuture {
        let source = self.clone();
        let word = word.to_string();
        Box::pin(async move { source.lookup(&word).await })
    }
}

fn translate_url(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.ends_with("/translate") {
        base.to_string()
    } else {
        format!("{}/translate", base)
    }
}

pub(crate) fn extract_translation(body: &str, word: &str) -> Result<Option<PartialRecord>> {
    let parsed: LibreResponse =
        serde_json::from_str(body).with_context(|| "malformed LibreTranslate response")?;
    let text = parsed.translated_text.unwrap_or_default();
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case(word.trim()) {
        return Ok(None);
    }
    Ok(Some(PartialRecord::translation(text)))
}

#[derive(Debug, Deserialize)]
struct LibreResponse {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}
