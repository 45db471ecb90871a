use anyhow::{Context, Result};
use reqwest::Url;

pub const DEFAULT_TTS_URL: &str = "https://translate.google.com/translate_tts";

/// Builds a text-to-speech URL for `word`. Nothing is fetched; the URL is a
/// pure function of its inputs.
pub fn fallback_audio_url(base: &str, lang: &str, word: &str) -> Result<String> {
    let url = Url::parse_with_params(
        base,
        &[
            ("ie", "UTF-8"),
            ("client", "tw-ob"),
            ("tl", lang),
            ("q", word),
        ],
    )
    .with_context(|| format!("invalid tts url: {}", base))?;
    Ok(url.to_string())
}
