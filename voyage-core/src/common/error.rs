use thiserror::Error;

/// One failed self-verification check, carried inside [`ImportError::Validation`].
#[derive(Debug, Clone)]
pub struct CheckFailure {
    pub check_name: String,
    pub detail: String,
}

impl std::fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.check_name, self.detail)
    }
}

#[derive(Error, Debug)]
pub enum ImportError {
    /// A self-verification check failed. Halts the run before any write.
    #[error("self-verification failed: {}", format_failures(.0))]
    Validation(Vec<CheckFailure>),

    /// Duplicate or non-contiguous day numbers, an unresolved stop, or an
    /// exhausted sea-day pool. Hard stop, never auto-repaired.
    #[error("sequencing violation: {0}")]
    Sequencing(String),

    /// Network or storage error while relocating an external asset.
    #[error("asset transfer failed for {url}: {reason}")]
    AssetTransfer { url: String, reason: String },

    /// Write error or post-commit count mismatch. The run is failed even
    /// if some statements succeeded; never retried automatically.
    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("invalid source document: {0}")]
    Source(String),

    #[error("operator channel error: {0}")]
    Operator(String),

    /// The operator declined the preview gate. Zero side effects.
    #[error("import cancelled by operator")]
    Cancelled,

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_failures(failures: &[CheckFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_failure() {
        let err = ImportError::Validation(vec![
            CheckFailure {
                check_name: "day_contiguity".to_string(),
                detail: "day 3 missing".to_string(),
            },
            CheckFailure {
                check_name: "stop_kind_present".to_string(),
                detail: "day 2 has no stop kind".to_string(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("day_contiguity: day 3 missing"));
        assert!(msg.contains("stop_kind_present"));
    }
}
