use std::fmt::Write as _;
use std::time::Duration;

use bytesize::ByteSize;
use serde::Serialize;

use crate::apply::ApplyReport;
use crate::journal::EventRecord;
use crate::model::{SyncAction, TaskStats};
use crate::sync::SyncSummary;
use crate::translator::UsageReceipt;

/// A command result printable as text or as one JSON line.
pub trait Report: Serialize {
    const KIND: &'static str;
    fn human(&self) -> String;
}

/// Reporter prints command results in human or JSON form.
pub struct Reporter {
    json_mode: bool,
}

impl Reporter {
    pub fn new(json_mode: bool) -> Self {
        Self { json_mode }
    }

    pub fn record<R: Report>(&mut self, report: &R) {
        if !self.json_mode {
            println!("{}", report.human());
            return;
        }
        match serde_json::to_value(report) {
            Ok(mut value) => {
                if let Some(map) = value.as_object_mut() {
                    map.insert("type".to_string(), R::KIND.into());
                }
                println!("{value}");
            }
            Err(e) => tracing::warn!(event = "report_serialize_failed", error = %e),
        }
    }

    /// Free-form line, human mode only.
    pub fn note(&self, message: impl AsRef<str>) {
        if !self.json_mode {
            println!("{}", message.as_ref());
        }
    }

    pub fn events(&mut self, records: &[EventRecord]) {
        for record in records {
            if self.json_mode {
                println!("{}", record.raw);
            } else {
                println!("{}", event_line(record));
            }
        }
    }
}

fn event_line(record: &EventRecord) -> String {
    let mut line = format!(
        "{} [{}] {}",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record
            .session_id
            .as_ref()
            .map(|s| s.as_str())
            .unwrap_or("-"),
        record.event_type
    );
    if let Some(map) = record.raw.as_object() {
        for (key, value) in map {
            if matches!(key.as_str(), "type" | "timestamp" | "session_id") {
                continue;
            }
            let _ = write!(line, " {key}={value}");
        }
    }
    line
}

/// Action counts of a plan.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct PlanCounts {
    pub create_dir: usize,
    pub copy: usize,
    pub delete: usize,
}

impl PlanCounts {
    pub fn of(actions: &[SyncAction]) -> Self {
        let (create_dir, copy, delete) = crate::diff::count(actions);
        Self {
            create_dir,
            copy,
            delete,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub target: String,
    pub dry_run: bool,
    pub planned: PlanCounts,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<SyncAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SyncSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskStats>,
    pub extraction_failures: usize,
}

impl Report for SyncReport {
    const KIND: &'static str = "sync";

    fn human(&self) -> String {
        let mut out = String::new();
        let Some(summary) = &self.summary else {
            let _ = writeln!(
                out,
                "{} (dry run): {} directories, {} copies, {} deletions planned",
                self.target, self.planned.create_dir, self.planned.copy, self.planned.delete
            );
            for action in &self.actions {
                let _ = writeln!(out, "  {:<10} {}", action.name(), action.target().display());
            }
            return out.trim_end().to_string();
        };
        let _ = write!(
            out,
            "{}: {} directories created, {} files copied ({}), {} deleted",
            self.target,
            summary.directories_created,
            summary.files_copied,
            ByteSize(summary.bytes_copied),
            summary.files_deleted
        );
        if let (Some(file), Some(stats)) = (&self.task_file, &self.task) {
            let _ = write!(
                out,
                "\n  task {file}: {} files, {}/{} fragments filled",
                stats.total_files, stats.filled_extractions, stats.total_extractions
            );
        }
        if self.extraction_failures > 0 {
            let _ = write!(
                out,
                "\n  warning: {} documents could not be extracted",
                self.extraction_failures
            );
        }
        out
    }
}

#[derive(Debug, Serialize)]
pub struct ApplyOutcome {
    pub task_file: String,
    pub dry_run: bool,
    #[serde(flatten)]
    pub report: ApplyReport,
    pub task_deleted: bool,
}

impl Report for ApplyOutcome {
    const KIND: &'static str = "apply";

    fn human(&self) -> String {
        let r = &self.report;
        let mut out = format!(
            "{}Applied {}/{} fragments across {} files ({} skipped, {} failed)",
            if self.dry_run { "[dry run] " } else { "" },
            r.filled_extractions,
            r.total_extractions,
            r.files_processed,
            r.files_skipped,
            r.files_failed
        );
        if r.unmatched_fragments > 0 {
            let _ = write!(
                out,
                "\n  warning: {} fragments could not be located",
                r.unmatched_fragments
            );
        }
        for failure in &r.failures {
            let _ = write!(out, "\n  failed {}: {}", failure.path, failure.error);
        }
        if self.task_deleted {
            let _ = write!(out, "\nTask {} deleted: all translations applied", self.task_file);
        } else if !r.is_complete() {
            let _ = write!(
                out,
                "\nTask {} kept: {} fragments unfilled, {} not located",
                self.task_file,
                r.total_extractions - r.filled_extractions,
                r.unmatched_fragments
            );
        }
        out
    }
}

#[derive(Debug, Serialize)]
pub struct AutoReport {
    pub task_file: String,
    pub model: String,
    pub requested: usize,
    pub filled: usize,
    pub usage: UsageReceipt,
    pub duration_seconds: f64,
}

impl Report for AutoReport {
    const KIND: &'static str = "auto";

    fn human(&self) -> String {
        let elapsed = Duration::from_millis((self.duration_seconds * 1000.0) as u64);
        format!(
            "Translated {}/{} fragments with {} in {} ({} tokens, ~${:.4})",
            self.filled,
            self.requested,
            self.model,
            humantime::format_duration(elapsed),
            self.usage.total_tokens,
            self.usage.estimated_cost_usd
        )
    }
}

/// A task with nothing left to apply or translate.
#[derive(Debug, Serialize)]
pub struct NothingToDo {
    pub task_file: String,
    pub reason: &'static str,
}

impl NothingToDo {
    pub const NO_TRANSLATIONS: &'static str = "no_translations";
    pub const ALL_FILLED: &'static str = "all_filled";
}

impl Report for NothingToDo {
    const KIND: &'static str = "nothing_to_do";

    fn human(&self) -> String {
        match self.reason {
            Self::ALL_FILLED => format!(
                "All translations in {} are already filled (nothing to do)",
                self.task_file
            ),
            _ => format!(
                "No translations found in {} (all target_text fields are empty)",
                self.task_file
            ),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileStatus {
    pub target: String,
    pub kind: &'static str,
    pub total: usize,
    pub filled: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub task_file: String,
    pub target_language: String,
    pub language_name: String,
    #[serde(flatten)]
    pub stats: TaskStats,
    pub percent_complete: usize,
    pub files: Vec<FileStatus>,
}

impl Report for StatusReport {
    const KIND: &'static str = "status";

    fn human(&self) -> String {
        let mut out = format!(
            "Task {} ({}, {})\n  {}/{} fragments filled ({}%) in {} files",
            self.task_file,
            self.language_name,
            self.target_language,
            self.stats.filled_extractions,
            self.stats.total_extractions,
            self.percent_complete,
            self.stats.total_files
        );
        for file in &self.files {
            let _ = write!(
                out,
                "\n  [{}] {} {}/{}",
                file.kind, file.target, file.filled, file.total
            );
        }
        out
    }
}
