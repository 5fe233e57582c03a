use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, TranslateError};
use crate::events::Event;
use crate::fsops;
use crate::journal::EventSink;
use crate::model::{DocumentKind, SyncAction};
use crate::resolve::relative_string;

/// A translatable document that was (re)copied during a sync.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CopiedDocument {
    pub source: PathBuf,
    pub target: PathBuf,
    pub kind: DocumentKind,
}

/// Outcome of executing a plan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub directories_created: usize,
    pub files_copied: usize,
    pub files_deleted: usize,
    pub bytes_copied: u64,
    pub copied_documents: Vec<CopiedDocument>,
    pub deleted_paths: Vec<PathBuf>,
}

/// Runs sync actions in order, one event per executed action.
///
/// Execution stops at the first failure; actions already performed stay
/// performed.
pub struct SyncExecutor<'a> {
    root: &'a Path,
    sink: &'a EventSink,
    summary: SyncSummary,
}

impl<'a> SyncExecutor<'a> {
    pub fn new(root: &'a Path, sink: &'a EventSink) -> Self {
        Self {
            root,
            sink,
            summary: SyncSummary::default(),
        }
    }

    /// Execute a single action.
    pub fn execute(&mut self, action: &SyncAction) -> Result<()> {
        tracing::debug!(event = "sync_action", action = action.name(), target = %action.target().display());
        match action {
            SyncAction::CreateDir { target } => {
                let created = fsops::ensure_dir(target).map_err(|e| failed(action, target, e))?;
                if created {
                    self.summary.directories_created += 1;
                }
                self.sink.emit(Event::DirectoryCreated {
                    path: self.display(target),
                    created,
                });
            }
            SyncAction::Copy {
                source,
                target,
                file_kind,
            } => {
                let bytes = fsops::copy_file(source, target).map_err(|e| failed(action, target, e))?;
                self.summary.files_copied += 1;
                self.summary.bytes_copied += bytes;
                if let Some(kind) = file_kind.document_kind() {
                    self.summary.copied_documents.push(CopiedDocument {
                        source: source.clone(),
                        target: target.clone(),
                        kind,
                    });
                }
                self.sink.emit(Event::FileCopied {
                    source_path: self.display(source),
                    target_path: self.display(target),
                    size_bytes: bytes,
                    file_type: *file_kind,
                });
            }
            SyncAction::Delete { target } => {
                fsops::remove(target).map_err(|e| failed(action, target, e))?;
                self.summary.files_deleted += 1;
                self.summary.deleted_paths.push(target.clone());
                self.sink.emit(Event::FileDeleted {
                    path: self.display(target),
                    reason: "not_in_source".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Execute every action in order, aborting on the first error.
    pub fn run(mut self, actions: &[SyncAction]) -> Result<SyncSummary> {
        for action in actions {
            self.execute(action)?;
        }
        Ok(self.summary)
    }

    fn display(&self, path: &Path) -> String {
        relative_string(self.root, path).unwrap_or_else(|| path.display().to_string())
    }
}

fn failed(action: &SyncAction, path: &Path, err: anyhow::Error) -> TranslateError {
    TranslateError::Execution {
        action: action.name(),
        path: path.to_path_buf(),
        source: std::io::Error::other(format!("{err:#}")),
    }
}
