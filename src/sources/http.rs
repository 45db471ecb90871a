use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .with_context(|| "failed to build http client")
}

/// Status and body of a finished request. The body is read even for error
/// statuses so it can be reported.
pub(crate) async fn read_response(response: reqwest::Response) -> (StatusCode, String) {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    (status, text)
}

/// Pulls a human readable message out of a JSON error body, falling back to
/// a truncated raw body.
pub(crate) fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<serde_json::Value>,
        #[serde(rename = "responseDetails")]
        response_details: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.message
            && !message.trim().is_empty()
        {
            return message;
        }
        if let Some(details) = parsed.response_details
            && !details.trim().is_empty()
        {
            return details;
        }
        match parsed.error {
            Some(serde_json::Value::String(message)) if !message.trim().is_empty() => {
                return message;
            }
            Some(serde_json::Value::Object(map)) => {
                if let Some(message) = map.get("message").and_then(|value| value.as_str()) {
                    return message.to_string();
                }
            }
            _ => {}
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(200).collect()
}
