use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Sibling temp path used while writing `path`: `<name>.tmp` in the same
/// directory, so the final rename never crosses filesystems.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("state"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace `path` with `bytes` via write, fsync, rename.
///
/// Readers observe either the previous content or the complete new content.
/// A stale temp file from an earlier crash is truncated and reused.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path_for(path);
    {
        let mut f = File::create(&tmp).with_context(|| format!("create temp file {:?}", tmp))?;
        f.write_all(bytes)
            .with_context(|| format!("write temp file {:?}", tmp))?;
        f.sync_all()
            .with_context(|| format!("fsync temp file {:?}", tmp))?;
    }
    fs::rename(&tmp, path).with_context(|| format!("rename {:?} -> {:?}", tmp, path))?;
    sync_parent_dir(path)
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)
        .and_then(|d| d.sync_all())
        .with_context(|| format!("fsync dir {:?}", parent))
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}
