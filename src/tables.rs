//! Reads and writes on a class's roster, attendance log and statistics
//! tables.
//!
//! Roster and statistics are only ever rewritten together (see
//! [`replace_roster`]) so both carry the same set of student ids. The log and
//! statistics are likewise written together by [`record_decision`].

use rusqlite::{params, Connection, Transaction};
use std::collections::HashMap;
use std::path::Path;

use crate::config::ReimportStatsPolicy;
use crate::db::{self, TableKind, COL_STUDENT_ID};
use crate::error::{EngineError, EngineResult};
use crate::models::{AttendanceRecord, AttendanceStatus, ClassTables, StatEntry, StudentEntry};

const STATS_ALIAS: &str = "stats_db";

pub fn read_roster(path: &Path) -> EngineResult<Vec<StudentEntry>> {
    let conn = db::open_table(path)?;
    select_rows(&conn, path, "SELECT * FROM students ORDER BY rowid", |r| {
        Ok(StudentEntry {
            id: db::cell_text(r, 0)?,
            name: db::cell_text(r, 1)?,
        })
    })
}

pub fn read_log(path: &Path) -> EngineResult<Vec<AttendanceRecord>> {
    let conn = db::open_table(path)?;
    select_rows(&conn, path, "SELECT * FROM attendance ORDER BY rowid", |r| {
        Ok(AttendanceRecord {
            student_id: db::cell_text(r, 0)?,
            student_name: db::cell_text(r, 1)?,
            status: db::cell_text(r, 2)?,
            date: db::cell_text(r, 3)?,
            time: db::cell_text(r, 4)?,
        })
    })
}

pub fn read_stats(path: &Path) -> EngineResult<Vec<StatEntry>> {
    let conn = db::open_table(path)?;
    select_rows(&conn, path, "SELECT * FROM stats ORDER BY rowid", |r| {
        Ok(StatEntry {
            student_id: db::cell_text(r, 0)?,
            student_name: db::cell_text(r, 1)?,
            present: db::cell_count(r, 2)?,
            absent: db::cell_count(r, 3)?,
            leave: db::cell_count(r, 4)?,
        })
    })
}

fn select_rows<T>(
    conn: &Connection,
    path: &Path,
    sql: &str,
    map: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> EngineResult<Vec<T>> {
    let mut stmt = conn.prepare(sql).map_err(|e| EngineError::sql(path, e))?;
    let rows = stmt
        .query_map([], map)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| EngineError::sql(path, e));
    rows
}

/// Append one row to an attendance log.
pub fn append_record(log_path: &Path, record: &AttendanceRecord) -> EngineResult<()> {
    let conn = db::open_table(log_path)?;
    insert_record(&conn, "main", record).map_err(|e| EngineError::sql(log_path, e))
}

/// Add one to `status` for `student_id` in a statistics table.
pub fn increment_stat(
    stats_path: &Path,
    student_id: &str,
    status: AttendanceStatus,
) -> EngineResult<()> {
    let conn = db::open_table(stats_path)?;
    let updated =
        bump_stat(&conn, "main", student_id, status).map_err(|e| EngineError::sql(stats_path, e))?;
    if updated == 0 {
        return Err(EngineError::StatNotFound(student_id.to_string()));
    }
    Ok(())
}

/// Write a decision to the log and the statistics in one transaction. If the
/// student has no statistics row nothing is written.
pub fn record_decision(
    tables: &ClassTables,
    record: &AttendanceRecord,
    status: AttendanceStatus,
) -> EngineResult<()> {
    let mut conn = db::open_table(&tables.log)?;
    attach_stats(&conn, &tables.stats)?;
    let tx = conn
        .transaction()
        .map_err(|e| EngineError::sql(&tables.log, e))?;

    insert_record(&tx, "main", record).map_err(|e| EngineError::sql(&tables.log, e))?;
    let updated = bump_stat(&tx, STATS_ALIAS, &record.student_id, status)
        .map_err(|e| EngineError::sql(&tables.stats, e))?;
    if updated == 0 {
        // Dropping the transaction rolls the log insert back.
        return Err(EngineError::StatNotFound(record.student_id.clone()));
    }
    tx.commit().map_err(|e| EngineError::sql(&tables.log, e))
}

/// Replace a class's roster with `students` and rebuild its statistics table
/// to match, writing both files in one transaction.
///
/// Under [`ReimportStatsPolicy::Preserve`] a student whose id was already
/// present keeps their counters; everyone else starts at zero.
pub fn replace_roster(
    tables: &ClassTables,
    students: &[StudentEntry],
    policy: ReimportStatsPolicy,
) -> EngineResult<Vec<StatEntry>> {
    db::init_table(TableKind::Roster, &tables.roster)?;
    db::init_table(TableKind::Stats, &tables.stats)?;

    let previous: HashMap<String, StatEntry> = match policy {
        ReimportStatsPolicy::Preserve => read_stats(&tables.stats)?
            .into_iter()
            .rev()
            .map(|s| (s.student_id.clone(), s))
            .collect(),
        ReimportStatsPolicy::Reset => HashMap::new(),
    };

    let stats: Vec<StatEntry> = students
        .iter()
        .map(|student| match previous.get(&student.id) {
            Some(old) => StatEntry {
                student_name: student.name.clone(),
                ..old.clone()
            },
            None => StatEntry::zeroed(student),
        })
        .collect();

    let mut conn = db::open_table(&tables.roster)?;
    attach_stats(&conn, &tables.stats)?;
    let tx = conn
        .transaction()
        .map_err(|e| EngineError::sql(&tables.roster, e))?;
    write_roster_rows(&tx, students).map_err(|e| EngineError::sql(&tables.roster, e))?;
    write_stats_rows(&tx, &stats).map_err(|e| EngineError::sql(&tables.stats, e))?;
    tx.commit().map_err(|e| EngineError::sql(&tables.roster, e))?;

    log::info!(
        "roster {} replaced with {} students ({:?} stats)",
        tables.roster.display(),
        students.len(),
        policy
    );
    Ok(stats)
}

fn attach_stats(conn: &Connection, stats_path: &Path) -> EngineResult<()> {
    conn.execute(
        &format!("ATTACH DATABASE ?1 AS {}", STATS_ALIAS),
        [stats_path.to_string_lossy().to_string()],
    )
    .map(|_| ())
    .map_err(|e| EngineError::sql(stats_path, e))
}

fn write_roster_rows(tx: &Transaction<'_>, students: &[StudentEntry]) -> rusqlite::Result<()> {
    tx.execute("DELETE FROM main.students", [])?;
    let mut stmt = tx.prepare("INSERT INTO main.students VALUES(?1, ?2)")?;
    for s in students {
        stmt.execute(params![s.id, s.name])?;
    }
    Ok(())
}

fn write_stats_rows(tx: &Transaction<'_>, stats: &[StatEntry]) -> rusqlite::Result<()> {
    tx.execute(&format!("DELETE FROM {}.stats", STATS_ALIAS), [])?;
    let mut stmt = tx.prepare(&format!(
        "INSERT INTO {}.stats VALUES(?1, ?2, ?3, ?4, ?5)",
        STATS_ALIAS
    ))?;
    for s in stats {
        stmt.execute(params![s.student_id, s.student_name, s.present, s.absent, s.leave])?;
    }
    Ok(())
}

fn insert_record(conn: &Connection, schema: &str, record: &AttendanceRecord) -> rusqlite::Result<()> {
    conn.execute(
        &format!("INSERT INTO {}.attendance VALUES(?1, ?2, ?3, ?4, ?5)", schema),
        params![
            record.student_id,
            record.student_name,
            record.status,
            record.date,
            record.time
        ],
    )?;
    Ok(())
}

fn bump_stat(
    conn: &Connection,
    schema: &str,
    student_id: &str,
    status: AttendanceStatus,
) -> rusqlite::Result<usize> {
    let col = status.label();
    conn.execute(
        &format!(
            "UPDATE {schema}.stats SET \"{col}\" = COALESCE(\"{col}\", 0) + 1 WHERE TRIM(\"{id}\") = ?1",
            schema = schema,
            col = col,
            id = COL_STUDENT_ID
        ),
        [student_id.trim()],
    )
}
