use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of file found in a source tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum FileKind {
    /// Vector drawing (SVG/XML); text lives in elements.
    #[serde(rename = "svg")]
    Structured,
    /// Line-oriented prose (Markdown).
    #[serde(rename = "md")]
    Prose,
    /// Copied byte-for-byte, never extracted.
    #[serde(rename = "other")]
    Opaque,
}

impl FileKind {
    /// Classify a path by extension. Files not listed as translatable are opaque.
    pub fn detect(path: &Path, translatable: bool) -> Self {
        if !translatable {
            return Self::Opaque;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("svg") || ext.eq_ignore_ascii_case("xml") => {
                Self::Structured
            }
            Some(ext) if ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown") => {
                Self::Prose
            }
            _ => Self::Opaque,
        }
    }

    pub fn document_kind(self) -> Option<DocumentKind> {
        match self {
            Self::Structured => Some(DocumentKind::Structured),
            Self::Prose => Some(DocumentKind::Prose),
            Self::Opaque => None,
        }
    }
}

/// Document kinds that carry translatable fragments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum DocumentKind {
    #[serde(rename = "svg")]
    Structured,
    #[serde(rename = "md", alias = "markdown")]
    Prose,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structured => "svg",
            Self::Prose => "md",
        }
    }
}

/// One planned filesystem operation produced by the differ.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    CreateDir {
        target: PathBuf,
    },
    Copy {
        source: PathBuf,
        target: PathBuf,
        file_kind: FileKind,
    },
    Delete {
        target: PathBuf,
    },
}

impl SyncAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateDir { .. } => "create_dir",
            Self::Copy { .. } => "copy",
            Self::Delete { .. } => "delete",
        }
    }

    pub fn target(&self) -> &Path {
        match self {
            Self::CreateDir { target } | Self::Copy { target, .. } | Self::Delete { target } => {
                target
            }
        }
    }
}

/// Where a fragment lives in its document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum Position {
    /// Element path in a structured document; `line` is informational.
    Element {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line: Option<usize>,
        xpath: String,
    },
    /// 1-based line number in a prose document.
    Line { line: usize },
}

impl Position {
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Element { line, .. } => *line,
            Self::Line { line } => Some(*line),
        }
    }
}

/// Classification of a fragment, used as a translation hint only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FragmentContext {
    Heading,
    Paragraph,
    ListItem,
    Blockquote,
    Label,
    Title,
}

impl FragmentContext {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::ListItem => "list-item",
            Self::Blockquote => "blockquote",
            Self::Label => "label",
            Self::Title => "title",
        }
    }
}

/// A single translatable fragment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct TextExtraction {
    #[serde(flatten)]
    pub position: Position,
    pub context: FragmentContext,
    pub source_text: String,
    /// Empty until a human or the translator fills it.
    #[serde(default)]
    pub target_text: String,
}

impl TextExtraction {
    pub fn is_filled(&self) -> bool {
        !self.target_text.is_empty()
    }
}

/// One document under translation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct TaskFile {
    /// Root-relative path of the canonical document.
    pub source: String,
    /// Root-relative path of the translated copy.
    pub target: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    #[serde(default)]
    pub extractions: Vec<TextExtraction>,
}

impl TaskFile {
    pub fn filled_count(&self) -> usize {
        self.extractions.iter().filter(|e| e.is_filled()).count()
    }
}

/// The persisted unit of translation work for one target language.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Task {
    /// Human-readable description of the job.
    pub task: String,
    pub source_language: String,
    pub target_language: String,
    pub language_name: String,
    pub files: Vec<TaskFile>,
    #[serde(default)]
    pub translation_notes: Vec<String>,
    /// Static guidance for translators, keyed by document type.
    #[serde(default)]
    pub instructions: BTreeMap<String, Vec<String>>,
}

/// Fill statistics of a task.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct TaskStats {
    pub total_files: usize,
    pub total_extractions: usize,
    pub filled_extractions: usize,
}

impl TaskStats {
    pub fn empty_extractions(&self) -> usize {
        self.total_extractions - self.filled_extractions
    }

    pub fn percent_complete(&self) -> usize {
        if self.total_extractions == 0 {
            return 100;
        }
        self.filled_extractions * 100 / self.total_extractions
    }

    pub fn is_fully_filled(&self) -> bool {
        self.filled_extractions == self.total_extractions
    }
}

impl Task {
    /// Count fragments, and those with a non-empty `target_text`.
    pub fn stats(&self) -> TaskStats {
        let mut stats = TaskStats {
            total_files: self.files.len(),
            ..TaskStats::default()
        };
        for file in &self.files {
            stats.total_extractions += file.extractions.len();
            stats.filled_extractions += file.filled_count();
        }
        stats
    }
}

/// Generate JSON Schema for the task document.
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(Task);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}
