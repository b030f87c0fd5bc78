use chrono::NaiveDateTime;
use serde::Serialize;

use crate::announce::Announcer;
use crate::error::{EngineError, EngineResult};
use crate::models::{AttendanceRecord, AttendanceStatus, ClassRecord, StudentEntry};
use crate::tables;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    InSession,
    Completed,
}

/// Outcome of a successful decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Transition {
    /// Moved on to `next`, who should now be announced.
    Advanced {
        recorded: AttendanceRecord,
        next: StudentEntry,
    },
    /// That was the last student on the roster.
    Completed { recorded: AttendanceRecord },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub class_name: Option<String>,
    pub cursor: usize,
    pub total: usize,
    pub current: Option<StudentEntry>,
}

struct ActiveSession {
    class: ClassRecord,
    students: Vec<StudentEntry>,
    cursor: usize,
}

/// A roll-call pass over a snapshot of one class's roster.
#[derive(Default)]
pub struct SessionController {
    active: Option<ActiveSession>,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        match &self.active {
            None => SessionState::Idle,
            Some(s) if s.cursor >= s.students.len() => SessionState::Completed,
            Some(_) => SessionState::InSession,
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.class.name.as_str())
    }

    /// Load the class roster and start from its first student. Any previous
    /// session is discarded, even when the new one fails to start.
    pub fn start(&mut self, class: &ClassRecord) -> EngineResult<StudentEntry> {
        self.active = None;
        if !class.tables.roster.is_file() {
            return Err(EngineError::NoRoster(class.name.clone()));
        }
        let students = tables::read_roster(&class.tables.roster)?;
        let Some(first) = students.first().cloned() else {
            return Err(EngineError::NoRoster(class.name.clone()));
        };
        log::info!(
            "roll call started for {} with {} students",
            class.name,
            students.len()
        );
        self.active = Some(ActiveSession {
            class: class.clone(),
            students,
            cursor: 0,
        });
        Ok(first)
    }

    pub fn current_student(&self) -> EngineResult<&StudentEntry> {
        let s = self.active.as_ref().ok_or(EngineError::NoSession)?;
        s.students.get(s.cursor).ok_or(EngineError::SessionComplete)
    }

    /// Speak the current student's name again. Never blocks.
    pub fn announce_current(&self, announcer: &Announcer) -> EngineResult<StudentEntry> {
        let student = self.current_student()?.clone();
        announcer.announce(&student.name);
        Ok(student)
    }

    /// Record `status` for the current student and move on.
    ///
    /// The log row and the statistics increment are written together; if
    /// either fails the cursor stays where it is and the error comes back as
    /// [`EngineError::RecordWrite`].
    pub fn record_decision(
        &mut self,
        status: AttendanceStatus,
        now: NaiveDateTime,
    ) -> EngineResult<Transition> {
        let s = self.active.as_mut().ok_or(EngineError::NoSession)?;
        let student = s
            .students
            .get(s.cursor)
            .ok_or(EngineError::SessionComplete)?;

        let record = AttendanceRecord {
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            status: status.label().to_string(),
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
        };
        tables::record_decision(&s.class.tables, &record, status).map_err(|e| {
            log::warn!("decision for {} not recorded: {}", record.student_id, e);
            EngineError::RecordWrite {
                student_id: record.student_id.clone(),
                source: Box::new(e),
            }
        })?;

        s.cursor += 1;
        match s.students.get(s.cursor) {
            Some(next) => Ok(Transition::Advanced {
                recorded: record,
                next: next.clone(),
            }),
            None => {
                log::info!("roll call for {} completed", s.class.name);
                Ok(Transition::Completed { recorded: record })
            }
        }
    }

    pub fn discard(&mut self) {
        self.active = None;
    }

    /// Drop the session if it belongs to `class_name`. Returns whether it did.
    pub fn discard_if_class(&mut self, class_name: &str) -> bool {
        let matches = self
            .class_name()
            .map(|n| n.trim() == class_name.trim())
            .unwrap_or(false);
        if matches {
            self.active = None;
        }
        matches
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            class_name: self.class_name().map(|s| s.to_string()),
            cursor: self.active.as_ref().map(|s| s.cursor).unwrap_or(0),
            total: self.active.as_ref().map(|s| s.students.len()).unwrap_or(0),
            current: self.current_student().ok().cloned(),
        }
    }
}
