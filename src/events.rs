use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{DocumentKind, FileKind};

/// Identifier shared by every event of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh 8-hex-digit session id.
    pub fn generate() -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self(id[..8].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Facts recorded in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Event {
    ConfigLoaded {
        config_path: String,
        source_language: String,
        target_count: usize,
    },
    DirectoryCreated {
        path: String,
        created: bool,
    },
    FileCopied {
        source_path: String,
        target_path: String,
        size_bytes: u64,
        file_type: FileKind,
    },
    FileDeleted {
        path: String,
        reason: String,
    },
    TextExtracted {
        file_path: String,
        file_type: DocumentKind,
        extraction_count: usize,
    },
    TaskGenerated {
        task_file: String,
        target_language: String,
        file_count: usize,
        extraction_count: usize,
    },
    TaskLoaded {
        task_file: String,
        target_language: String,
        file_count: usize,
        extraction_count: usize,
        filled_count: usize,
    },
    TranslationApplied {
        file_path: String,
        file_type: DocumentKind,
        applied_count: usize,
        skipped_count: usize,
    },
    ApplyFailed {
        file_path: String,
        file_type: DocumentKind,
        error: String,
    },
    TaskDeleted {
        task_file: String,
        reason: String,
    },
    TranslationStarted {
        task_file: String,
        items_count: usize,
        model: String,
    },
    TranslationCompleted {
        task_file: String,
        items_translated: usize,
        input_tokens: u64,
        output_tokens: u64,
        cost_usd: f64,
        duration_seconds: f64,
        model: String,
    },
    TranslationFailed {
        task_file: String,
        error: String,
        model: String,
    },
}

impl Event {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ConfigLoaded { .. } => "ConfigLoaded",
            Self::DirectoryCreated { .. } => "DirectoryCreated",
            Self::FileCopied { .. } => "FileCopied",
            Self::FileDeleted { .. } => "FileDeleted",
            Self::TextExtracted { .. } => "TextExtracted",
            Self::TaskGenerated { .. } => "TaskGenerated",
            Self::TaskLoaded { .. } => "TaskLoaded",
            Self::TranslationApplied { .. } => "TranslationApplied",
            Self::ApplyFailed { .. } => "ApplyFailed",
            Self::TaskDeleted { .. } => "TaskDeleted",
            Self::TranslationStarted { .. } => "TranslationStarted",
            Self::TranslationCompleted { .. } => "TranslationCompleted",
            Self::TranslationFailed { .. } => "TranslationFailed",
        }
    }
}

/// Envelope written as one NDJSON line: `{type, ...payload, timestamp, session_id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    #[serde(flatten)]
    pub event: Event,
    pub timestamp: DateTime<Utc>,
    pub session_id: SessionId,
}

impl EventEnvelope {
    pub fn now(event: Event, session_id: SessionId) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
            session_id,
        }
    }
}
