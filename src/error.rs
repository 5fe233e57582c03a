use std::path::PathBuf;

/// Errors raised by the sync/extract/apply pipeline.
///
/// Every variant that touches the filesystem carries the path it failed on so
/// the operator can retry the exact step.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    /// Missing or malformed configuration. Raised before any mutation.
    #[error("configuration error in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// A directory walk failed while planning; no action was executed.
    #[error("failed to plan sync at {}", path.display())]
    Planning {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A sync action failed mid-run. Earlier actions are not rolled back.
    #[error("sync action '{action}' failed on {}", path.display())]
    Execution {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source document could not be tokenized.
    #[error("failed to extract text from {}: {message}", path.display())]
    Extraction { path: PathBuf, message: String },

    /// Translated fragments could not be merged into a target document.
    #[error("failed to merge translations into {}: {message}", path.display())]
    Merge { path: PathBuf, message: String },

    /// The task document does not match the expected shape.
    #[error("malformed task document {}", path.display())]
    MalformedTask {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The task has no filled fragment at all.
    #[error("no translations found in {} (all target_text fields are empty)", path.display())]
    NothingToApply { path: PathBuf },

    /// The external translation call failed for the whole batch.
    #[error("translation capability failed: {0}")]
    ExternalCapability(String),

    /// Read/write failure on a task, document or event file.
    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TranslateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// This error followed by its causes, joined by `: `.
    pub fn detail(&self) -> String {
        let mut out = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            out.push_str(": ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        out
    }
}

pub type Result<T, E = TranslateError> = std::result::Result<T, E>;
