use std::path::{Path, PathBuf};

use filetime::FileTime;
use walkdir::WalkDir;

use crate::error::{Result, TranslateError};
use crate::model::{FileKind, SyncAction};
use crate::resolve::{RenameRules, join_relative, relative_string};

/// Inputs of one source/target diff.
pub struct DiffRequest<'a> {
    pub source_root: &'a Path,
    pub target_root: &'a Path,
    pub rename_rules: &'a RenameRules,
    /// Decides whether a file is translatable (otherwise it is copied opaque).
    pub is_translatable: &'a dyn Fn(&Path) -> bool,
}

/// Plan the ordered list of actions that brings the target tree in line with
/// the source tree.
///
/// Directories come before their contents. Files are copied only when the
/// target is missing or older than the source, so a second run over an
/// unchanged tree yields no copy or delete. Rename rules only rewrite file
/// names; directories keep their names in every tree.
pub fn plan(req: &DiffRequest<'_>) -> Result<Vec<SyncAction>> {
    if !req.source_root.is_dir() {
        return Err(TranslateError::Planning {
            path: req.source_root.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "source directory not found",
            ),
        });
    }

    let mut actions = Vec::new();
    if !req.target_root.exists() {
        actions.push(SyncAction::CreateDir {
            target: req.target_root.to_path_buf(),
        });
    }

    plan_copies(req, &mut actions)?;
    if req.target_root.is_dir() {
        plan_deletes(req, &mut actions)?;
    }

    tracing::debug!(
        event = "sync_planned",
        source = %req.source_root.display(),
        target = %req.target_root.display(),
        actions = actions.len()
    );
    Ok(actions)
}

fn plan_copies(req: &DiffRequest<'_>, actions: &mut Vec<SyncAction>) -> Result<()> {
    for entry in WalkDir::new(req.source_root)
        .min_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| walk_error(req.source_root, e))?;
        let rel = relative_string(req.source_root, entry.path())
            .ok_or_else(|| escape_error(entry.path()))?;

        if entry.file_type().is_dir() {
            let target = join_relative(req.target_root, &rel);
            if target.exists() && !target.is_dir() {
                actions.push(SyncAction::Delete {
                    target: target.clone(),
                });
            }
            actions.push(SyncAction::CreateDir { target });
            continue;
        }

        let target = join_relative(req.target_root, &req.rename_rules.apply(&rel));
        if target.is_dir() {
            actions.push(SyncAction::Delete {
                target: target.clone(),
            });
        } else if !is_stale(entry.path(), &target)? {
            continue;
        }
        let file_kind = FileKind::detect(entry.path(), (req.is_translatable)(entry.path()));
        actions.push(SyncAction::Copy {
            source: entry.path().to_path_buf(),
            target,
            file_kind,
        });
    }
    Ok(())
}

fn plan_deletes(req: &DiffRequest<'_>, actions: &mut Vec<SyncAction>) -> Result<()> {
    let mut walker = WalkDir::new(req.target_root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| walk_error(req.target_root, e))?;
        let rel = relative_string(req.target_root, entry.path())
            .ok_or_else(|| escape_error(entry.path()))?;
        let is_dir = entry.file_type().is_dir();

        let source_rel = if is_dir {
            rel.clone()
        } else {
            req.rename_rules.reverse(&rel)
        };
        let source = join_relative(req.source_root, &source_rel);
        let orphaned = match std::fs::symlink_metadata(&source) {
            Ok(meta) => meta.is_dir() != is_dir,
            Err(_) => true,
        };
        let misnamed = !is_dir && req.rename_rules.apply(&source_rel) != rel;

        if orphaned || misnamed {
            // Planned already as part of a type change.
            let target = entry.path().to_path_buf();
            if !actions
                .iter()
                .any(|a| matches!(a, SyncAction::Delete { target: t } if *t == target))
            {
                actions.push(SyncAction::Delete { target });
            }
            if is_dir {
                walker.skip_current_dir();
            }
        }
    }
    Ok(())
}

/// The source has no up-to-date copy at `target`.
fn is_stale(source: &Path, target: &Path) -> Result<bool> {
    let target_meta = match std::fs::metadata(target) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => {
            return Err(TranslateError::Planning {
                path: target.to_path_buf(),
                source: e,
            });
        }
    };
    let source_meta = std::fs::metadata(source).map_err(|e| TranslateError::Planning {
        path: source.to_path_buf(),
        source: e,
    })?;
    Ok(FileTime::from_last_modification_time(&source_meta)
        > FileTime::from_last_modification_time(&target_meta))
}

fn walk_error(root: &Path, err: walkdir::Error) -> TranslateError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    TranslateError::Planning {
        path,
        source: err.into(),
    }
}

fn escape_error(path: &Path) -> TranslateError {
    TranslateError::Planning {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path outside walk root"),
    }
}

/// Action counts of a plan, as `(create_dir, copy, delete)`.
pub fn count(actions: &[SyncAction]) -> (usize, usize, usize) {
    actions
        .iter()
        .fold((0, 0, 0), |(dirs, copies, deletes), action| match action {
            SyncAction::CreateDir { .. } => (dirs + 1, copies, deletes),
            SyncAction::Copy { .. } => (dirs, copies + 1, deletes),
            SyncAction::Delete { .. } => (dirs, copies, deletes + 1),
        })
}

/// Targets of planned copies that carry translatable text.
pub fn translatable_copies(actions: &[SyncAction]) -> Vec<(PathBuf, PathBuf, FileKind)> {
    actions
        .iter()
        .filter_map(|action| match action {
            SyncAction::Copy {
                source,
                target,
                file_kind,
            } if file_kind.document_kind().is_some() => {
                Some((source.clone(), target.clone(), *file_kind))
            }
            _ => None,
        })
        .collect()
}
