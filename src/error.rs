/// Failure modes of a lookup.
///
/// Only `InvalidInput` ever leaves [`crate::Resolver::resolve`]; the other
/// variants are absorbed where they happen and only logged.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("word is empty")]
    InvalidInput,

    #[error("source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("no translation found for '{word}'")]
    NotFound { word: String },

    #[error("failed to persist cache: {0}")]
    Persistence(String),
}

impl LookupError {
    pub(crate) fn unavailable(source_name: &str, reason: impl ToString) -> Self {
        LookupError::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }
}
