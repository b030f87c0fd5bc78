use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::models::ClassTables;

#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub archive_dir: PathBuf,
    pub archived_files: Vec<PathBuf>,
}

/// Move a class's table files into `<backup_root>/<YYYYMMDD>/` with an
/// `HHMMSS_` prefix. Files that no longer exist are skipped. Nothing is
/// deleted; an operator can restore a class by moving the files back.
pub fn archive_class_tables(
    backup_root: &Path,
    tables: &ClassTables,
    now: DateTime<Local>,
) -> EngineResult<ArchiveSummary> {
    let archive_dir = backup_root.join(now.format("%Y%m%d").to_string());
    std::fs::create_dir_all(&archive_dir).map_err(|e| EngineError::io(&archive_dir, e))?;

    let stamp = now.format("%H%M%S").to_string();
    let mut archived_files = Vec::new();
    for src in tables.paths() {
        if !src.is_file() {
            log::warn!("skipping missing table file {}", src.display());
            continue;
        }
        let Some(file_name) = src.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let dst = free_destination(&archive_dir, &stamp, file_name);
        std::fs::rename(src, &dst).map_err(|e| EngineError::io(src.as_path(), e))?;
        log::info!("archived {} -> {}", src.display(), dst.display());
        archived_files.push(dst);
    }

    Ok(ArchiveSummary {
        archive_dir,
        archived_files,
    })
}

// Two deletions of same-named classes within one second must not clobber
// each other's backups.
fn free_destination(dir: &Path, stamp: &str, file_name: &str) -> PathBuf {
    let first = dir.join(format!("{}_{}", stamp, file_name));
    if !first.exists() {
        return first;
    }
    let mut n = 2;
    loop {
        let candidate = dir.join(format!("{}-{}_{}", stamp, n, file_name));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
