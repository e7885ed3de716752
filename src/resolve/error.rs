//! Run-level pipeline errors.

use thiserror::Error;

use crate::transport::FetchError;

/// Errors that abort one source run.
///
/// Per-version failures never surface here; they are recorded as
/// unresolved entries in the source report.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Version enumeration failed after retries.
    #[error("source '{source_name}' unavailable: {source}")]
    SourceUnavailable {
        /// Name of the source whose enumeration failed.
        source_name: String,
        /// The final enumeration error.
        #[source]
        source: FetchError,
    },
}

impl PipelineError {
    /// Creates a source-unavailable error.
    #[must_use]
    pub fn source_unavailable(source_name: impl Into<String>, source: FetchError) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            source,
        }
    }

    /// Name of the failed source.
    #[must_use]
    pub fn source_name(&self) -> &str {
        match self {
            Self::SourceUnavailable { source_name, .. } => source_name,
        }
    }
}
