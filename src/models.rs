use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentEntry {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 3] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Leave,
    ];

    /// Stored value in the log, which is also the stats column header.
    pub fn label(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "出勤",
            AttendanceStatus::Absent => "旷课",
            AttendanceStatus::Leave => "请假",
        }
    }

    /// Accepts the stored label or the English name, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim();
        for status in Self::ALL {
            if t == status.label() {
                return Some(status);
            }
        }
        match t.to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "leave" => Some(AttendanceStatus::Leave),
            _ => None,
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: String,
    pub student_name: String,
    /// Raw stored status label; rows written by hand may hold other text.
    pub status: String,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatEntry {
    pub student_id: String,
    pub student_name: String,
    pub present: i64,
    pub absent: i64,
    pub leave: i64,
}

impl StatEntry {
    pub fn zeroed(student: &StudentEntry) -> Self {
        Self {
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            present: 0,
            absent: 0,
            leave: 0,
        }
    }

    pub fn count(&self, status: AttendanceStatus) -> i64 {
        match status {
            AttendanceStatus::Present => self.present,
            AttendanceStatus::Absent => self.absent,
            AttendanceStatus::Leave => self.leave,
        }
    }
}

/// The three table files that belong to one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassTables {
    #[serde(rename = "rosterPath")]
    pub roster: PathBuf,
    #[serde(rename = "logPath")]
    pub log: PathBuf,
    #[serde(rename = "statsPath")]
    pub stats: PathBuf,
}

impl ClassTables {
    pub fn paths(&self) -> [&PathBuf; 3] {
        [&self.roster, &self.log, &self.stats]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    pub name: String,
    #[serde(flatten)]
    pub tables: ClassTables,
}
