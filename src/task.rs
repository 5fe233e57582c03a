//! Task persistence, generation from synced documents, and merge with an
//! existing task for the same language.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::config::{Config, TargetConfig};
use crate::error::{Result, TranslateError};
use crate::events::Event;
use crate::extract;
use crate::fsops;
use crate::journal::EventSink;
use crate::model::{FileKind, Task, TaskFile};
use crate::resolve::{join_relative, relative_string};
use crate::sync::CopiedDocument;

/// `<tasks_dir>/translate-<lang>.json`
pub fn task_path(tasks_dir: &Path, language: &str) -> PathBuf {
    tasks_dir.join(format!("translate-{language}.json"))
}

pub fn load(path: &Path) -> Result<Task> {
    let data = std::fs::read_to_string(path).map_err(|e| TranslateError::io(path, e))?;
    serde_json::from_str(&data).map_err(|source| TranslateError::MalformedTask {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the task as pretty JSON with a trailing newline, atomically.
pub fn save(path: &Path, task: &Task) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(task)
        .map_err(|e| TranslateError::io(path, std::io::Error::other(e)))?;
    data.push(b'\n');
    fsops::write_atomic(path, &data)
        .map_err(|e| TranslateError::io(path, std::io::Error::other(format!("{e:#}"))))
}

/// Remove a task file. Failure is logged and reported as `false`.
pub fn delete(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(event = "task_delete_failed", path = %path.display(), error = %e);
            false
        }
    }
}

/// Guidance shipped with every task, keyed by document type.
pub fn default_instructions() -> BTreeMap<String, Vec<String>> {
    let svg = [
        "Translate all <text> element content",
        "Translate <title> element content",
        "DO NOT translate: attributes, CSS classes, coordinates, numbers",
        "Preserve: XML structure, formatting, indentation",
    ];
    let markdown = [
        "Translate all text content",
        "DO NOT translate: code blocks, file paths, URLs",
        "Preserve: markdown formatting, structure, links",
        "Keep each translation on a single line",
    ];
    BTreeMap::from([
        ("svg".to_string(), svg.iter().map(|s| s.to_string()).collect()),
        (
            "markdown".to_string(),
            markdown.iter().map(|s| s.to_string()).collect(),
        ),
    ])
}

/// A fresh task header for one target, without files.
pub fn new_task(config: &Config, target: &TargetConfig) -> Task {
    Task {
        task: format!(
            "Translate {} to {} for {}",
            config.source.language, target.language_name, config.translation.domain
        ),
        source_language: config.source.language.clone(),
        target_language: target.language.clone(),
        language_name: target.language_name.clone(),
        files: Vec::new(),
        translation_notes: target.translation_notes.clone(),
        instructions: default_instructions(),
    }
}

/// Task entries built from the documents a sync copied.
#[derive(Debug, Default)]
pub struct Extracted {
    pub files: Vec<TaskFile>,
    pub failures: Vec<(PathBuf, String)>,
}

/// Extract every copied document. Failing documents are logged and left out;
/// documents without fragments produce no entry.
pub fn extract_documents(root: &Path, documents: &[CopiedDocument], sink: &EventSink) -> Extracted {
    let mut out = Extracted::default();
    for doc in documents {
        extract_into(root, doc, sink, true, &mut out);
    }
    out
}

fn extract_into(
    root: &Path,
    doc: &CopiedDocument,
    sink: &EventSink,
    record_empty: bool,
    out: &mut Extracted,
) {
    let extractions = match extract::extract(&doc.source, doc.kind) {
        Ok(extractions) => extractions,
        Err(e) => {
            let error = e.detail();
            tracing::warn!(event = "extraction_failed", path = %doc.source.display(), error = %error);
            out.failures.push((doc.source.clone(), error));
            return;
        }
    };
    let source = display(root, &doc.source);
    if extractions.is_empty() && !record_empty {
        return;
    }
    sink.emit(Event::TextExtracted {
        file_path: source.clone(),
        file_type: doc.kind,
        extraction_count: extractions.len(),
    });
    if extractions.is_empty() {
        return;
    }
    out.files.push(TaskFile {
        source,
        target: display(root, &doc.target),
        kind: doc.kind,
        extractions,
    });
}

/// Translatable targets that are still byte-identical copies of their source
/// but have no task entry.
///
/// These are documents copied by an earlier sync whose task update never
/// happened (the sync aborted) or whose extraction failed.
pub fn untracked_documents(
    root: &Path,
    config: &Config,
    target: &TargetConfig,
    tracked: &HashSet<String>,
) -> Vec<CopiedDocument> {
    let source_root = config.source_root(root);
    let target_root = target.target_root(root);
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(&source_root)
        .min_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(event = "untracked_scan_skipped", error = %e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(kind) = FileKind::detect(entry.path(), config.is_translatable(entry.path()))
            .document_kind()
        else {
            continue;
        };
        let Some(rel) = relative_string(&source_root, entry.path()) else {
            continue;
        };
        let target_path = join_relative(&target_root, &target.rename_rules.apply(&rel));
        if tracked.contains(&display(root, &target_path)) || !target_path.is_file() {
            continue;
        }
        let same = match (std::fs::read(entry.path()), std::fs::read(&target_path)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same {
            out.push(CopiedDocument {
                source: entry.path().to_path_buf(),
                target: target_path,
                kind,
            });
        }
    }
    out
}

/// Merge freshly extracted entries into existing ones.
///
/// Entries for re-copied targets are replaced (or dropped when the new copy
/// has no fragments), entries whose target no longer exists are dropped, and
/// all other entries keep their translations.
pub fn merge_files(
    root: &Path,
    existing: Vec<TaskFile>,
    fresh: Vec<TaskFile>,
    recopied: &HashSet<String>,
) -> Vec<TaskFile> {
    let mut fresh: Vec<Option<TaskFile>> = fresh.into_iter().map(Some).collect();
    let mut merged = Vec::with_capacity(existing.len() + fresh.len());

    for entry in existing {
        if let Some(slot) = fresh
            .iter_mut()
            .find(|f| f.as_ref().is_some_and(|f| f.target == entry.target))
        {
            merged.extend(slot.take());
            continue;
        }
        if recopied.contains(&entry.target) {
            continue;
        }
        if !join_relative(root, &entry.target).is_file() {
            tracing::debug!(event = "task_entry_dropped", target = %entry.target);
            continue;
        }
        merged.push(entry);
    }
    merged.extend(fresh.into_iter().flatten());
    merged
}

/// Result of refreshing the task of one target after a sync.
#[derive(Debug)]
pub struct TaskUpdate {
    pub path: PathBuf,
    pub task: Option<Task>,
    pub written: bool,
    pub extraction_failures: Vec<(PathBuf, String)>,
}

/// Create or update `translate-<lang>.json` from the documents a sync copied.
///
/// An existing task is merged; if nothing is left to translate the task file
/// is removed.
pub fn refresh(
    root: &Path,
    config: &Config,
    target: &TargetConfig,
    copied: &[CopiedDocument],
    sink: &EventSink,
) -> Result<TaskUpdate> {
    let path = task_path(&config.tasks_dir(root), &target.language);
    let existing = if path.is_file() { Some(load(&path)?) } else { None };
    let previous = existing.as_ref().map(|t| t.files.clone()).unwrap_or_default();
    let recopied: HashSet<String> = copied.iter().map(|d| display(root, &d.target)).collect();

    let mut extracted = extract_documents(root, copied, sink);
    let tracked: HashSet<String> = previous
        .iter()
        .map(|f| f.target.clone())
        .chain(recopied.iter().cloned())
        .collect();
    for doc in untracked_documents(root, config, target, &tracked) {
        tracing::debug!(event = "untracked_document", path = %doc.target.display());
        extract_into(root, &doc, sink, false, &mut extracted);
    }
    let files = merge_files(root, previous.clone(), extracted.files, &recopied);

    let mut update = TaskUpdate {
        path: path.clone(),
        task: None,
        written: false,
        extraction_failures: extracted.failures,
    };

    if files.is_empty() {
        if existing.is_some() && delete(&path) {
            sink.emit(Event::TaskDeleted {
                task_file: display(root, &path),
                reason: "no_remaining_files".to_string(),
            });
        }
        return Ok(update);
    }

    let mut task = new_task(config, target);
    let changed = files != previous;
    task.files = files;
    if changed || existing.as_ref() != Some(&task) {
        save(&path, &task)?;
        let stats = task.stats();
        sink.emit(Event::TaskGenerated {
            task_file: display(root, &path),
            target_language: target.language.clone(),
            file_count: stats.total_files,
            extraction_count: stats.total_extractions,
        });
        tracing::info!(
            event = "task_written",
            path = %path.display(),
            files = stats.total_files,
            fragments = stats.total_extractions
        );
        update.written = true;
    }
    update.task = Some(task);
    Ok(update)
}

fn display(root: &Path, path: &Path) -> String {
    relative_string(root, path).unwrap_or_else(|| path.display().to_string())
}
