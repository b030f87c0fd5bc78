use rusqlite::types::ValueRef;
use rusqlite::{Connection, Row};
use std::path::Path;

use crate::error::{EngineError, EngineResult};

pub const COL_CLASS_NAME: &str = "班级名称";
pub const COL_ROSTER_FILE: &str = "学生名单文件";
pub const COL_LOG_FILE: &str = "考勤文件";
pub const COL_STATS_FILE: &str = "统计文件";
pub const COL_STUDENT_ID: &str = "学号";
pub const COL_STUDENT_NAME: &str = "姓名";
pub const COL_STATUS: &str = "状态";
pub const COL_DATE: &str = "日期";
pub const COL_TIME: &str = "时间";

/// The four persisted table shapes. Each lives alone in its own SQLite file
/// under a fixed table name with a fixed column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Index,
    Roster,
    Log,
    Stats,
}

impl TableKind {
    pub fn table_name(self) -> &'static str {
        match self {
            TableKind::Index => "classes",
            TableKind::Roster => "students",
            TableKind::Log => "attendance",
            TableKind::Stats => "stats",
        }
    }

    /// File name suffix appended to a class base name.
    pub fn file_suffix(self) -> &'static str {
        match self {
            TableKind::Index => "classes",
            TableKind::Roster => "students",
            TableKind::Log => "attendance",
            TableKind::Stats => "stats",
        }
    }

    pub fn headers(self) -> &'static [&'static str] {
        match self {
            TableKind::Index => &[COL_CLASS_NAME, COL_ROSTER_FILE, COL_LOG_FILE, COL_STATS_FILE],
            TableKind::Roster => &[COL_STUDENT_ID, COL_STUDENT_NAME],
            TableKind::Log => &[COL_STUDENT_ID, COL_STUDENT_NAME, COL_STATUS, COL_DATE, COL_TIME],
            TableKind::Stats => &[COL_STUDENT_ID, COL_STUDENT_NAME, "出勤", "旷课", "请假"],
        }
    }

    fn create_sql(self) -> String {
        let cols: Vec<String> = match self {
            TableKind::Stats => {
                let mut cols = vec![
                    format!("\"{}\" TEXT", COL_STUDENT_ID),
                    format!("\"{}\" TEXT", COL_STUDENT_NAME),
                ];
                for h in &self.headers()[2..] {
                    cols.push(format!("\"{}\" INTEGER NOT NULL DEFAULT 0", h));
                }
                cols
            }
            _ => self
                .headers()
                .iter()
                .map(|h| format!("\"{}\" TEXT", h))
                .collect(),
        };
        format!(
            "CREATE TABLE IF NOT EXISTS {}({})",
            self.table_name(),
            cols.join(", ")
        )
    }
}

/// Open an existing table file. A missing file is an error rather than a
/// silently created empty database.
pub fn open_table(path: &Path) -> EngineResult<Connection> {
    if !path.is_file() {
        return Err(EngineError::Storage(format!(
            "table file not found: {}",
            path.display()
        )));
    }
    Connection::open(path).map_err(|e| EngineError::sql(path, e))
}

/// Create an empty headered table at `path` unless a file is already there.
/// Returns whether a new file was written.
pub fn init_table(kind: TableKind, path: &Path) -> EngineResult<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }
    }
    let conn = Connection::open(path).map_err(|e| EngineError::sql(path, e))?;
    conn.execute(&kind.create_sql(), [])
        .map_err(|e| EngineError::sql(path, e))?;
    log::debug!("created {} table at {}", kind.table_name(), path.display());
    Ok(true)
}

/// Read a cell as text whatever its stored type. Whole-valued reals lose
/// their trailing `.0` so a numeric student id still reads as `1001`.
pub fn cell_text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => format_number(f),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(b) => String::from_utf8_lossy(b).to_string(),
    })
}

/// Read a counter cell, treating blanks and junk as zero.
pub fn cell_count(row: &Row<'_>, idx: usize) -> rusqlite::Result<i64> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(i) => i,
        ValueRef::Real(f) => f as i64,
        ValueRef::Text(t) => String::from_utf8_lossy(t).trim().parse().unwrap_or(0),
        _ => 0,
    })
}

pub fn format_number(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_table_is_idempotent() {
        let dir = std::env::temp_dir().join(format!(
            "attendanced-db-init-{}",
            std::process::id()
        ));
        let path = dir.join("x_students.sqlite3");
        let _ = std::fs::remove_dir_all(&dir);

        assert!(init_table(TableKind::Roster, &path).expect("first init"));
        let conn = open_table(&path).expect("open");
        conn.execute("INSERT INTO students VALUES('1', 'A')", [])
            .expect("insert");
        drop(conn);

        assert!(!init_table(TableKind::Roster, &path).expect("second init"));
        let conn = open_table(&path).expect("reopen");
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))
            .expect("count");
        assert_eq!(n, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn headers_follow_fixed_column_order() {
        let dir = std::env::temp_dir().join(format!(
            "attendanced-db-headers-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        for kind in [TableKind::Index, TableKind::Roster, TableKind::Log, TableKind::Stats] {
            let path = dir.join(format!("{}.sqlite3", kind.file_suffix()));
            init_table(kind, &path).expect("init");
            let conn = open_table(&path).expect("open");
            let stmt = conn
                .prepare(&format!("SELECT * FROM {}", kind.table_name()))
                .expect("prepare");
            let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
            assert_eq!(names, kind.headers());
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn numbers_render_without_trailing_zero() {
        assert_eq!(format_number(1001.0), "1001");
        assert_eq!(format_number(2.5), "2.5");
    }
}
