//! The class index: one row per class pointing at its three table files.
//!
//! The registry owns the index file and is the only component that adds,
//! removes or repoints classes. Everything else receives `ClassRecord`s from
//! it.

use chrono::{DateTime, Local};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::backup::{self, ArchiveSummary};
use crate::db::{self, TableKind};
use crate::error::{EngineError, EngineResult};
use crate::models::{ClassRecord, ClassTables};

pub const INDEX_FILE_NAME: &str = "classes.sqlite3";
const TABLE_EXT: &str = "sqlite3";

pub struct ClassRegistry {
    data_dir: PathBuf,
    index_path: PathBuf,
    backup_root: PathBuf,
}

impl ClassRegistry {
    /// Open (and if needed create) the index under `data_dir`.
    pub fn open(data_dir: &Path, backup_root: &Path) -> EngineResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| EngineError::io(data_dir, e))?;
        let index_path = data_dir.join(INDEX_FILE_NAME);
        db::init_table(TableKind::Index, &index_path)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            index_path,
            backup_root: backup_root.to_path_buf(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// All indexed classes, in creation order.
    pub fn load_classes(&self) -> EngineResult<Vec<ClassRecord>> {
        Ok(self.load_rows()?.into_iter().map(|(_, rec)| rec).collect())
    }

    pub fn find_class(&self, name: &str) -> EngineResult<ClassRecord> {
        let wanted = name.trim();
        self.load_rows()?
            .into_iter()
            .map(|(_, rec)| rec)
            .find(|rec| rec.name.trim() == wanted)
            .ok_or_else(|| EngineError::ClassNotFound(wanted.to_string()))
    }

    /// Register a new class and create its three empty tables.
    ///
    /// Every check runs before the first file is written. If the index update
    /// fails afterwards the new table files are left in place; they show up in
    /// [`ClassRegistry::orphan_tables`] and are reused by a later create of the
    /// same name.
    pub fn create_class(&self, name: &str) -> EngineResult<ClassRecord> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(EngineError::InvalidName(
                "class name must not be empty".to_string(),
            ));
        }
        let base = sanitize_base_name(trimmed);
        if base.is_empty() {
            return Err(EngineError::InvalidName(format!(
                "class name has no usable characters: {}",
                trimmed
            )));
        }

        for existing in self.load_classes()? {
            let existing_name = existing.name.trim();
            if existing_name == trimmed || sanitize_base_name(existing_name) == base {
                return Err(EngineError::DuplicateClass(trimmed.to_string()));
            }
        }

        let tables = self.tables_for(&base);
        db::init_table(TableKind::Roster, &tables.roster)?;
        db::init_table(TableKind::Log, &tables.log)?;
        db::init_table(TableKind::Stats, &tables.stats)?;

        let conn = self.open_index()?;
        conn.execute(
            "INSERT INTO classes VALUES(?1, ?2, ?3, ?4)",
            params![
                trimmed,
                tables.roster.to_string_lossy().to_string(),
                tables.log.to_string_lossy().to_string(),
                tables.stats.to_string_lossy().to_string(),
            ],
        )
        .map_err(|e| {
            log::warn!("index update failed, tables for {} are now orphaned", trimmed);
            EngineError::sql(&self.index_path, e)
        })?;

        log::info!("created class {} ({})", trimmed, base);
        Ok(ClassRecord {
            name: trimmed.to_string(),
            tables,
        })
    }

    /// Archive the class's tables and drop its index rows.
    pub fn delete_class(&self, name: &str) -> EngineResult<ArchiveSummary> {
        self.delete_class_at(name, Local::now())
    }

    pub fn delete_class_at(&self, name: &str, now: DateTime<Local>) -> EngineResult<ArchiveSummary> {
        let wanted = name.trim();
        let matches: Vec<(i64, ClassRecord)> = self
            .load_rows()?
            .into_iter()
            .filter(|(_, rec)| rec.name.trim() == wanted)
            .collect();
        if matches.is_empty() {
            return Err(EngineError::ClassNotFound(wanted.to_string()));
        }

        // A hand-edited index can list the same name twice; every row's files
        // go to the archive so none are left behind unindexed.
        let mut archive_dir = None;
        let mut archived_files = Vec::new();
        for (_, rec) in &matches {
            let archived = backup::archive_class_tables(&self.backup_root, &rec.tables, now)?;
            archive_dir.get_or_insert(archived.archive_dir);
            archived_files.extend(archived.archived_files);
        }
        let summary = ArchiveSummary {
            archive_dir: archive_dir.unwrap_or_else(|| self.backup_root.clone()),
            archived_files,
        };

        let conn = self.open_index()?;
        for (rowid, _) in &matches {
            conn.execute("DELETE FROM classes WHERE rowid = ?1", [rowid])
                .map_err(|e| EngineError::sql(&self.index_path, e))?;
        }
        log::info!(
            "deleted class {}; backups in {}",
            wanted,
            summary.archive_dir.display()
        );
        Ok(summary)
    }

    /// Point the class at a (possibly new) roster file.
    pub fn set_roster_path(&self, name: &str, roster: &Path) -> EngineResult<ClassRecord> {
        let wanted = name.trim();
        let Some((rowid, mut rec)) = self
            .load_rows()?
            .into_iter()
            .find(|(_, rec)| rec.name.trim() == wanted)
        else {
            return Err(EngineError::ClassNotFound(wanted.to_string()));
        };
        let conn = self.open_index()?;
        conn.execute(
            &format!("UPDATE classes SET \"{}\" = ?1 WHERE rowid = ?2", db::COL_ROSTER_FILE),
            params![roster.to_string_lossy().to_string(), rowid],
        )
        .map_err(|e| EngineError::sql(&self.index_path, e))?;
        rec.tables.roster = roster.to_path_buf();
        Ok(rec)
    }

    /// Table files in the data directory that no index row refers to. These
    /// are left behind by interrupted creates or hand edits; nothing removes
    /// them automatically.
    pub fn orphan_tables(&self) -> EngineResult<Vec<PathBuf>> {
        let referenced: HashSet<PathBuf> = self
            .load_classes()?
            .iter()
            .flat_map(|rec| rec.tables.paths().into_iter().cloned())
            .collect();

        let mut orphans = Vec::new();
        let entries =
            std::fs::read_dir(&self.data_dir).map_err(|e| EngineError::io(&self.data_dir, e))?;
        for ent in entries {
            let ent = ent.map_err(|e| EngineError::io(&self.data_dir, e))?;
            let p = ent.path();
            if !p.is_file() || p == self.index_path {
                continue;
            }
            let Some(stem) = p.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if p.extension().and_then(|s| s.to_str()) != Some(TABLE_EXT) {
                continue;
            }
            let is_table = [TableKind::Roster, TableKind::Log, TableKind::Stats]
                .iter()
                .any(|k| stem.ends_with(&format!("_{}", k.file_suffix())));
            if is_table && !referenced.contains(&p) {
                orphans.push(p);
            }
        }
        orphans.sort();
        Ok(orphans)
    }

    fn tables_for(&self, base: &str) -> ClassTables {
        let file = |kind: TableKind| {
            self.data_dir
                .join(format!("{}_{}.{}", base, kind.file_suffix(), TABLE_EXT))
        };
        ClassTables {
            roster: file(TableKind::Roster),
            log: file(TableKind::Log),
            stats: file(TableKind::Stats),
        }
    }

    fn open_index(&self) -> EngineResult<Connection> {
        db::open_table(&self.index_path)
    }

    fn load_rows(&self) -> EngineResult<Vec<(i64, ClassRecord)>> {
        let conn = self.open_index()?;
        let mut stmt = conn
            .prepare("SELECT rowid, * FROM classes ORDER BY rowid")
            .map_err(|e| EngineError::sql(&self.index_path, e))?;
        let rows = stmt.query_map([], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                ClassRecord {
                    name: db::cell_text(r, 1)?,
                    tables: ClassTables {
                        roster: PathBuf::from(db::cell_text(r, 2)?),
                        log: PathBuf::from(db::cell_text(r, 3)?),
                        stats: PathBuf::from(db::cell_text(r, 4)?),
                    },
                },
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| EngineError::sql(&self.index_path, e));
        rows
    }
}

/// Turn a class name into a file-name-safe base: characters that are illegal
/// in Windows paths are dropped and whitespace becomes `_`.
pub fn sanitize_base_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}
