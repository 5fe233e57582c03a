use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::escape::{escape, partial_escape};
use serde::Serialize;

use crate::error::{Result, TranslateError};
use crate::events::Event;
use crate::fsops;
use crate::journal::EventSink;
use crate::model::{DocumentKind, Task, TaskFile, TextExtraction};
use crate::resolve::confine;

/// A task file that could not be merged.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

/// Outcome of applying one task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    pub total_extractions: usize,
    pub filled_extractions: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub applied_fragments: usize,
    pub unmatched_fragments: usize,
    pub failures: Vec<FileFailure>,
}

impl ApplyReport {
    /// Every fragment was filled and landed in its document; the task can go.
    pub fn is_complete(&self) -> bool {
        self.filled_extractions == self.total_extractions
            && self.files_failed == 0
            && self.unmatched_fragments == 0
    }
}

/// Per-document merge counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    pub applied: usize,
    pub unmatched: usize,
}

/// Merge the filled fragments of `task` into the target documents under `root`.
///
/// With `dry_run` nothing is written but the report is the same.
pub fn apply_task(
    root: &Path,
    task_path: &Path,
    task: &Task,
    sink: &EventSink,
    dry_run: bool,
) -> Result<ApplyReport> {
    let stats = task.stats();
    if stats.filled_extractions == 0 {
        return Err(TranslateError::NothingToApply {
            path: task_path.to_path_buf(),
        });
    }

    let mut report = ApplyReport {
        total_extractions: stats.total_extractions,
        filled_extractions: stats.filled_extractions,
        ..ApplyReport::default()
    };

    for file in &task.files {
        if file.filled_count() == 0 {
            report.files_skipped += 1;
            continue;
        }
        match apply_file(root, file, dry_run) {
            Ok(counts) => {
                report.files_processed += 1;
                report.applied_fragments += counts.applied;
                report.unmatched_fragments += counts.unmatched;
                sink.emit(Event::TranslationApplied {
                    file_path: file.target.clone(),
                    file_type: file.kind,
                    applied_count: counts.applied,
                    skipped_count: file.extractions.len() - counts.applied,
                });
            }
            Err(e) => {
                let error = e.detail();
                tracing::warn!(event = "apply_failed", path = %file.target, error = %error);
                report.files_failed += 1;
                report.failures.push(FileFailure {
                    path: file.target.clone(),
                    error: error.clone(),
                });
                sink.emit(Event::ApplyFailed {
                    file_path: file.target.clone(),
                    file_type: file.kind,
                    error,
                });
            }
        }
    }
    Ok(report)
}

fn apply_file(root: &Path, file: &TaskFile, dry_run: bool) -> Result<MergeCounts> {
    let path = confine(root, &file.target).map_err(|message| TranslateError::Merge {
        path: file.target.clone().into(),
        message,
    })?;
    let content = std::fs::read_to_string(&path).map_err(|e| TranslateError::io(&path, e))?;
    let (merged, counts) = match file.kind {
        DocumentKind::Structured => apply_structured(&content, &file.extractions),
        DocumentKind::Prose => apply_prose(&content, &file.extractions)
            .map_err(|message| TranslateError::Merge {
                path: path.clone(),
                message,
            })?,
    };
    if counts.unmatched > 0 {
        tracing::warn!(
            event = "fragments_unmatched",
            path = %file.target,
            count = counts.unmatched
        );
    }
    if !dry_run && merged != content {
        fsops::write_atomic(&path, merged.as_bytes()).map_err(|e| {
            TranslateError::io(&path, std::io::Error::other(format!("{e:#}")))
        })?;
    }
    Ok(counts)
}

/// Candidate encodings of a fragment as it may appear between tags.
fn encodings(text: &str) -> Vec<String> {
    let mut out = vec![partial_escape(text).into_owned()];
    let full = escape(text).into_owned();
    if !out.contains(&full) {
        out.push(full);
    }
    out
}

/// Text at `start..end` sits directly between a `>` and a `<`, whitespace aside.
fn is_text_node(content: &str, start: usize, end: usize) -> bool {
    content[..start].trim_end().ends_with('>') && content[end..].trim_start().starts_with('<')
}

/// Earliest text-node occurrence of `text` at or after `cursor`.
fn locate(content: &str, text: &str, cursor: usize) -> Option<(usize, usize)> {
    encodings(text)
        .iter()
        .filter(|needle| !needle.is_empty())
        .filter_map(|needle| {
            content[cursor..]
                .match_indices(needle.as_str())
                .map(|(offset, _)| (cursor + offset, cursor + offset + needle.len()))
                .find(|&(start, end)| is_text_node(content, start, end))
        })
        .min()
}

/// Replace filled fragments in a structured document.
///
/// Fragments are located in extraction order with a forward cursor, so
/// repeated texts map to successive occurrences. A filled fragment whose
/// translation is already in place counts as applied.
pub fn apply_structured(content: &str, extractions: &[TextExtraction]) -> (String, MergeCounts) {
    let mut counts = MergeCounts::default();
    let mut replacements: Vec<(usize, usize, String)> = Vec::new();
    let mut cursor = 0;

    for fragment in extractions {
        if let Some((start, end)) = locate(content, &fragment.source_text, cursor) {
            cursor = end;
            if fragment.is_filled() {
                replacements.push((start, end, partial_escape(&fragment.target_text).into_owned()));
                counts.applied += 1;
            }
            continue;
        }
        if fragment.is_filled() {
            if let Some((_, end)) = locate(content, &fragment.target_text, cursor) {
                cursor = end;
                counts.applied += 1;
                continue;
            }
        }
        counts.unmatched += 1;
    }

    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for (start, end, text) in replacements {
        out.push_str(&content[last..start]);
        out.push_str(&text);
        last = end;
    }
    out.push_str(&content[last..]);
    (out, counts)
}

fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Replace filled fragments in a prose document, line by line.
///
/// Indentation, trailing whitespace and line endings are kept. A line whose
/// content no longer matches the fragment is left alone and counted as
/// unmatched.
pub fn apply_prose(
    content: &str,
    extractions: &[TextExtraction],
) -> Result<(String, MergeCounts), String> {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let mut counts = MergeCounts::default();
    let mut by_line: BTreeMap<usize, &str> = BTreeMap::new();

    for fragment in extractions.iter().filter(|f| f.is_filled()) {
        let line = fragment
            .position
            .line()
            .ok_or_else(|| format!("fragment '{}' has no line number", fragment.source_text))?;
        if line == 0 || line > lines.len() {
            return Err(format!("line {line} is outside the document ({} lines)", lines.len()));
        }
        if fragment.target_text.contains(['\n', '\r']) {
            return Err(format!("translation for line {line} spans several lines"));
        }
        let (body, _) = split_terminator(lines[line - 1]);
        let current = body.trim();
        if current == fragment.source_text || current == fragment.target_text {
            by_line.insert(line, fragment.target_text.as_str());
            counts.applied += 1;
        } else {
            counts.unmatched += 1;
        }
    }

    let mut out = String::with_capacity(content.len());
    for (index, line) in lines.iter().enumerate() {
        let Some(text) = by_line.get(&(index + 1)) else {
            out.push_str(line);
            continue;
        };
        let (body, terminator) = split_terminator(line);
        let trimmed_start = body.trim_start();
        let indent = &body[..body.len() - trimmed_start.len()];
        let trailing = &trimmed_start[trimmed_start.trim_end().len()..];
        out.push_str(indent);
        out.push_str(text);
        out.push_str(trailing);
        out.push_str(terminator);
    }
    Ok((out, counts))
}
