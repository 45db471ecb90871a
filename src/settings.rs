use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::paths;
use crate::sources;
use crate::tts;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub source_lang: String,
    pub target_lang: String,
    pub placeholder: String,
    pub enrich_fixed: bool,
    pub source_timeout_ms: u64,
    pub tts_url: String,
    pub fixed_path: Option<String>,
    pub fixed_url: Option<String>,
    pub cache_path: Option<String>,
    pub cache_limit: usize,
    pub cache_flush_ms: u64,
    pub dictionary_sources: Vec<String>,
    pub translation_sources: Vec<String>,
    pub free_dictionary_url: String,
    pub mymemory_url: String,
    pub mymemory_email: Option<String>,
    pub deepl_url: String,
    pub deepl_key: Option<String>,
    pub libretranslate_url: Option<String>,
    pub libretranslate_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
            source_lang: "en".to_string(),
            target_lang: "pt".to_string(),
            placeholder: "Translation not found".to_string(),
            enrich_fixed: true,
            source_timeout_ms: 5000,
            tts_url: tts::DEFAULT_TTS_URL.to_string(),
            fixed_path: Some("fixed_words.json".to_string()),
            fixed_url: None,
            cache_path: Some("automatic_words.json".to_string()),
            cache_limit: crate::cache::DEFAULT_LIMIT,
            cache_flush_ms: 500,
            dictionary_sources: vec!["free_dictionary".to_string()],
            translation_sources: vec![
                "deepl".to_string(),
                "libretranslate".to_string(),
                "mymemory".to_string(),
            ],
            free_dictionary_url: sources::free_dictionary::DEFAULT_URL.to_string(),
            mymemory_url: sources::mymemory::DEFAULT_URL.to_string(),
            mymemory_email: None,
            deepl_url: sources::deepl::DEFAULT_URL.to_string(),
            deepl_key: None,
            libretranslate_url: None,
            libretranslate_key: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server: Option<ServerSettings>,
    lookup: Option<LookupSettings>,
    fixed: Option<FixedSettings>,
    cache: Option<CacheSettings>,
    sources: Option<SourcesSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LookupSettings {
    source_lang: Option<String>,
    target_lang: Option<String>,
    placeholder: Option<String>,
    enrich_fixed: Option<bool>,
    timeout_ms: Option<u64>,
    tts_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FixedSettings {
    path: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CacheSettings {
    path: Option<String>,
    limit: Option<usize>,
    flush_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SourcesSettings {
    dictionary: Option<Vec<String>>,
    translation: Option<Vec<String>>,
    free_dictionary: Option<EndpointSettings>,
    mymemory: Option<EndpointSettings>,
    deepl: Option<EndpointSettings>,
    libretranslate: Option<EndpointSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct EndpointSettings {
    url: Option<String>,
    api_key: Option<String>,
    email: Option<String>,
}

/// Loads settings from the bundled defaults, then `settings.toml` and
/// `settings.local.toml` under the base directory, the same two files in the
/// working directory, and finally `extra_path`. Later files win.
/// Environment variables are applied last.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let home = paths::settings_dir();
    if let Some(home) = home.as_deref() {
        ensure_home_settings_file(home)?;
    }
    let mut settings = load_layers(Path::new("."), home.as_deref(), extra_path)?;
    settings.apply_env(|key| std::env::var(key).ok());
    Ok(settings)
}

fn load_layers(cwd: &Path, home: Option<&Path>, extra_path: Option<&Path>) -> Result<Settings> {
    let mut ordered_paths = Vec::new();
    if let Some(home) = home {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    ordered_paths.push(cwd.join("settings.toml"));
    ordered_paths.push(cwd.join("settings.local.toml"));

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    let mut settings = Settings::default();
    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_toml(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }
    Ok(settings)
}

impl Settings {
    pub fn merge_toml(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    /// Applies `PORT`, `HOST`, `DEEPL_API_KEY`, `LIBRETRANSLATE_API_KEY` and
    /// `MYMEMORY_EMAIL`. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(port) = get("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => warn!("ignoring invalid PORT value: {}", port),
            }
        }
        if let Some(host) = get("HOST") {
            self.host = host.trim().to_string();
        }
        if let Some(key) = get("DEEPL_API_KEY") {
            self.deepl_key = Some(key.trim().to_string());
        }
        if let Some(key) = get("LIBRETRANSLATE_API_KEY") {
            self.libretranslate_key = Some(key.trim().to_string());
        }
        if let Some(email) = get("MYMEMORY_EMAIL") {
            self.mymemory_email = Some(email.trim().to_string());
        }
    }

    pub fn fixed_path(&self) -> Option<PathBuf> {
        self.fixed_path.as_deref().and_then(paths::expand_path)
    }

    pub fn cache_path(&self) -> Option<PathBuf> {
        self.cache_path.as_deref().and_then(paths::expand_path)
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(server) = incoming.server {
            if let Some(host) = server.host
                && !host.trim().is_empty()
            {
                self.host = host;
            }
            if let Some(port) = server.port {
                self.port = port;
            }
        }
        if let Some(lookup) = incoming.lookup {
            if let Some(lang) = lookup.source_lang
                && !lang.trim().is_empty()
            {
                self.source_lang = lang.trim().to_lowercase();
            }
            if let Some(lang) = lookup.target_lang
                && !lang.trim().is_empty()
            {
                self.target_lang = lang.trim().to_lowercase();
            }
            if let Some(placeholder) = lookup.placeholder {
                self.placeholder = placeholder;
            }
            if let Some(enrich) = lookup.enrich_fixed {
                self.enrich_fixed = enrich;
            }
            if let Some(timeout) = lookup.timeout_ms
                && timeout > 0
            {
                self.source_timeout_ms = timeout;
            }
            if let Some(url) = lookup.tts_url
                && !url.trim().is_empty()
            {
                self.tts_url = url;
            }
        }
        if let Some(fixed) = incoming.fixed {
            if let Some(path) = fixed.path {
                self.fixed_path = optional(path);
            }
            if let Some(url) = fixed.url {
                self.fixed_url = optional(url);
            }
        }
        if let Some(cache) = incoming.cache {
            if let Some(path) = cache.path {
                self.cache_path = optional(path);
            }
            if let Some(limit) = cache.limit {
                self.cache_limit = limit;
            }
            if let Some(interval) = cache.flush_interval_ms {
                self.cache_flush_ms = interval;
            }
        }
        if let Some(sources) = incoming.sources {
            if let Some(names) = sources.dictionary {
                self.dictionary_sources = names;
            }
            if let Some(names) = sources.translation {
                self.translation_sources = names;
            }
            if let Some(endpoint) = sources.free_dictionary
                && let Some(url) = endpoint.url.and_then(optional)
            {
                self.free_dictionary_url = url;
            }
            if let Some(endpoint) = sources.mymemory {
                if let Some(url) = endpoint.url.and_then(optional) {
                    self.mymemory_url = url;
                }
                if let Some(email) = endpoint.email {
                    self.mymemory_email = optional(email);
                }
            }
            if let Some(endpoint) = sources.deepl {
                if let Some(url) = endpoint.url.and_then(optional) {
                    self.deepl_url = url;
                }
                if let Some(key) = endpoint.api_key {
                    self.deepl_key = optional(key);
                }
            }
            if let Some(endpoint) = sources.libretranslate {
                if let Some(url) = endpoint.url {
                    self.libretranslate_url = optional(url);
                }
                if let Some(key) = endpoint.api_key {
                    self.libretranslate_key = optional(key);
                }
            }
        }
    }
}

/// Empty strings switch a setting off.
fn optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn ensure_home_settings_file(home: &Path) -> Result<()> {
    fs::create_dir_all(home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}
