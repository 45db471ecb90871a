use std::path::{Path, PathBuf};

const BASE_DIR_ENV: &str = "WORD_LOOKUP_DIR";

pub(crate) fn settings_dir() -> Option<PathBuf> {
    if let Some(dir) = base_dir_override() {
        return Some(dir);
    }
    default_base_dir()
}

/// Expands `~` and normalizes a configured file path. Relative paths stay
/// relative to the working directory. Blank values yield `None`.
pub(crate) fn expand_path(value: &str) -> Option<PathBuf> {
    normalize_dir(value)
}

fn base_dir_override() -> Option<PathBuf> {
    std::env::var(BASE_DIR_ENV)
        .ok()
        .and_then(|value| normalize_dir(&value))
}

fn default_base_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".word-lookup-rust"))
        }
    })
}

fn normalize_dir(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let expanded = expand_tilde(trimmed, std::env::var("HOME").ok().as_deref());
    Some(normalize_path(PathBuf::from(expanded)))
}

fn normalize_path(path: PathBuf) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        normalized.push(component.as_os_str());
    }
    normalized
}

fn expand_tilde(value: &str, home: Option<&str>) -> String {
    if (value == "~" || value.starts_with("~/"))
        && let Some(home) = home.map(str::trim)
        && !home.is_empty()
    {
        if value == "~" {
            return home.to_string();
        }
        return format!("{}{}", home, &value[1..]);
    }
    value.to_string()
}
