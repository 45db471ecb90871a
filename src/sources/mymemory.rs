use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use super::http::{error_message, read_response};
use super::{Source, SourceFuture, SourceRole};
use crate::record::PartialRecord;

pub const DEFAULT_URL: &str = "https://api.mymemory.translated.net/get";

/// MyMemory translation memory. Free and keyless; an e-mail address raises
/// the daily quota.
#[derive(Debug, Clone)]
pub struct MyMemory {
    client: reqwest::Client,
    url: String,
    source_lang: String,
    target_lang: String,
    email: Option<String>,
}

impl MyMemory {
    pub fn new(client: reqwest::Client, url: &str, source_lang: &str, target_lang: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email.filter(|value| !value.trim().is_empty());
        self
    }

    fn request_url(&self, word: &str) -> Result<Url> {
        let langpair = format!("{}|{}", self.source_lang, self.target_lang);
        let mut params = vec![("q", word), ("langpair", langpair.as_str())];
        if let Some(email) = self.email.as_deref() {
            params.push(("de", email));
        }
        Url::parse_with_params(&self.url, &params)
            .with_context(|| format!("invalid MyMemory url: {}", self.url))
    }

    async fn lookup(&self, word: &str) -> Result<Option<PartialRecord>> {
        let url = self.request_url(word)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| "MyMemory request failed")?;
        let (status, text) = read_response(response).await;
        if !status.is_success() {
            return Err(anyhow!(
                "MyMemory API error ({}): {}",
                status,
                error_message(&text)
            ));
        }
        extract_translation(&text, word)
    }
}

impl Source for MyMemory {
    fn name(&self) -> &'static str {
        "mymemory"
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

pub(crate) fn extract_translation(body: &str, word: &str) -> Result<Option<PartialRecord>> {
    let parsed: MyMemoryResponse =
        serde_json::from_str(body).with_context(|| "malformed MyMemory response")?;
    let status = match &parsed.response_status {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    if status != Some(200) {
        return Err(anyhow!(
            "MyMemory rejected request ({}): {}",
            parsed.response_status,
            parsed.response_details.unwrap_or_default()
        ));
    }
    let translated = parsed
        .response_data
        .and_then(|data| data.translated_text)
        .unwrap_or_default();
    let translated = translated.trim();
    if translated.is_empty() || translated.eq_ignore_ascii_case(word.trim()) {
        return Ok(None);
    }
    Ok(Some(PartialRecord::translation(translated)))
}

#[derive(Debug, Deserialize)]
struct MyMemoryResponse {
    #[serde(rename = "responseData")]
    response_data: Option<ResponseData>,
    #[serde(rename = "responseStatus", default)]
    response_status: Value,
    #[serde(rename = "responseDetails")]
    response_details: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}
