use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Create a directory and its parents. Returns `true` if anything was created.
pub fn ensure_dir(dst: &Path) -> Result<bool> {
    if dst.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(dst)
        .with_context(|| format!("failed to create directory {}", dst.display()))?;
    Ok(true)
}

/// Byte-exact copy of a regular file, flushed to stable storage.
///
/// Missing parent directories of `dst` are created first.
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    let mut reader = std::fs::File::open(src).context("source not found")?;
    let mut writer = std::fs::File::create(dst).context("cannot create destination")?;
    let bytes = std::io::copy(&mut reader, &mut writer).context("copy failed")?;
    writer.sync_all().context("failed to flush destination")?;
    Ok(bytes)
}

/// Remove a file or a whole directory subtree.
pub fn remove(path: &Path) -> Result<()> {
    let metadata = std::fs::symlink_metadata(path).context("target not found")?;
    if metadata.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// Replace `path` with `contents` through a temporary file in the same directory.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    ensure_dir(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).context("failed to create temp file")?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
