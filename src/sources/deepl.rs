use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::http::{error_message, read_response};
use super::{Source, SourceFuture, SourceRole};
use crate::record::PartialRecord;

pub const DEFAULT_URL: &str = "https://api-free.deepl.com/v2/translate";
const QUOTA_EXCEEDED: u16 = 456;

#[derive(Debug, Clone)]
pub struct DeepL {
    client: reqwest::Client,
    url: String,
    key: String,
    source_lang: String,
    target_lang: String,
}

impl DeepL {
    pub fn new(
        client: reqwest::Client,
        url: &str,
        key: String,
        source_lang: &str,
        target_lang: &str,
    ) -> Self {
        Self {
            client,
            url: url.to_string(),
            key,
            source_lang: source_lang.trim().to_uppercase(),
            target_lang: target_code(target_lang),
        }
    }

    async fn lookup(&self, word: &str) -> Result<Option<PartialRecord>> {
        let body = json!({
            "text": [word],
            "source_lang": self.source_lang,
            "target_lang": self.target_lang,
        });
        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.key))
            .json(&body)
            .send()
            .await
            .with_context(|| "DeepL request failed")?;
        let (status, text) = read_response(response).await;
        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            return Err(anyhow!("DeepL rejected the API key ({})", status));
        }
        if status.as_u16() == QUOTA_EXCEEDED {
            return Err(anyhow!("DeepL quota exceeded"));
        }
        if !status.is_success() {
            return Err(anyhow!(
                "DeepL API error ({}): {}",
                status,
                error_message(&text)
            ));
        }
        extract_translation(&text, word)
    }
}

impl Source for DeepL {
    fn name(&self) -> &'static str {
        "deepl"
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

/// DeepL wants regional variants for a few target languages.
fn target_code(lang: &str) -> String {
    let upper = lang.trim().to_uppercase();
    match upper.as_str() {
        "PT" => "PT-BR".to_string(),
        "EN" => "EN-US".to_string(),
        _ => upper,
    }
}

pub(crate) fn extract_translation(body: &str, word: &str) -> Result<Option<PartialRecord>> {
    let parsed: DeepLResponse =
        serde_json::from_str(body).with_context(|| "malformed DeepL response")?;
    let Some(first) = parsed.translations.into_iter().next() else {
        return Ok(None);
    };
    let text = first.text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case(word.trim()) {
        return Ok(None);
    }
    Ok(Some(PartialRecord::translation(text)))
}

#[derive(Debug, Deserialize)]
struct DeepLResponse {
    #[serde(default)]
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::serve_stub;

    #[test]
    fn extracts_first_translation() {
        let payload = r#"{"translations": [{"detected_source_language": "EN", "text": "Olá"}]}"#;
        let partial = extract_translation(payload, "hello").expect("parse").expect("translation");
        assert_eq!(partial.translation.as_deref(), Some("Olá"));
    }

    #[test]
    fn empty_translations_are_not_found() {
        assert!(extract_translation(r#"{"translations": []}"#, "hello")
            .expect("parse")
            .is_none());
        assert!(extract_translation(r#"{"translations": [{"text": "Xyzabc"}]}"#, "xyzabc")
            .expect("parse")
            .is_none());
    }

    #[test]
    fn maps_regional_targets() {
        assert_eq!(target_code("pt"), "PT-BR");
        assert_eq!(target_code("en"), "EN-US");
        assert_eq!(target_code("de"), "DE");
    }

    async fn stub_source(key: &str) -> DeepL {
        let router = axum::Router::new().route(
            "/v2/translate",
            axum::routing::post(
                |headers: axum::http::HeaderMap, axum::Json(body): axum::Json<serde_json::Value>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    match auth.as_str() {
                        "DeepL-Auth-Key good" => {
                            assert_eq!(body["target_lang"], "PT-BR");
                            (
                                axum::http::StatusCode::OK,
                                r#"{"translations": [{"detected_source_language": "EN", "text": "olá"}]}"#,
                            )
                        }
                        "DeepL-Auth-Key spent" => (
                            axum::http::StatusCode::from_u16(456).expect("status"),
                            r#"{"message": "Quota exceeded"}"#,
                        ),
                        _ => (axum::http::StatusCode::FORBIDDEN, r#"{"message": "Forbidden"}"#),
                    }
                },
            ),
        );
        let base = serve_stub(router).await;
        DeepL::new(
            reqwest::Client::new(),
            &format!("{}/v2/translate", base),
            key.to_string(),
            "en",
            "pt",
        )
    }

    #[tokio::test]
    async fn lookup_sends_key_and_reads_translation() {
        let source = stub_source("good").await;
        let partial = source.lookup("hello").await.expect("lookup").expect("translation");
        assert_eq!(partial.translation.as_deref(), Some("olá"));
    }

    #[tokio::test]
    async fn rejected_key_and_spent_quota_are_errors() {
        let err = stub_source("bad").await.lookup("hello").await.expect_err("403");
        assert!(err.to_string().contains("rejected the API key"));

        let err = stub_source("spent").await.lookup("hello").await.expect_err("456");
        assert!(err.to_string().contains("quota exceeded"));
    }
}
