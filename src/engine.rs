//! The engine ties the registry, the table operations, the roll-call session
//! and the announcer together. It is the single entry point used by the IPC
//! layer and keeps cross-component rules in one place: a session never
//! outlives its class, and a re-imported roster invalidates a running
//! session's snapshot.

use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};

use crate::announce::Announcer;
use crate::backup::ArchiveSummary;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::import::{self, RawTable};
use crate::models::{AttendanceRecord, AttendanceStatus, ClassRecord, StatEntry, StudentEntry};
use crate::registry::ClassRegistry;
use crate::session::{SessionController, SessionSnapshot, Transition};
use crate::tables;

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub class: ClassRecord,
    pub imported: usize,
    pub stats: Vec<StatEntry>,
    pub session_discarded: bool,
}

#[derive(Debug, Clone)]
pub struct DeleteSummary {
    pub archive: ArchiveSummary,
    pub session_discarded: bool,
}

pub struct AttendanceEngine {
    config: EngineConfig,
    registry: ClassRegistry,
    session: SessionController,
    announcer: Announcer,
}

impl AttendanceEngine {
    pub fn open(config: EngineConfig) -> EngineResult<Self> {
        let announcer = Announcer::from_config(&config.announcements);
        Self::with_announcer(config, announcer)
    }

    pub fn with_announcer(config: EngineConfig, announcer: Announcer) -> EngineResult<Self> {
        let registry = ClassRegistry::open(&config.data_dir, &config.backup_root())?;
        log::info!("engine opened at {}", config.data_dir.display());
        Ok(Self {
            config,
            registry,
            session: SessionController::new(),
            announcer,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        self.registry.data_dir()
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn announcer(&self) -> &Announcer {
        &self.announcer
    }

    pub fn create_class(&self, name: &str) -> EngineResult<ClassRecord> {
        self.registry.create_class(name)
    }

    pub fn load_classes(&self) -> EngineResult<Vec<ClassRecord>> {
        self.registry.load_classes()
    }

    pub fn orphan_tables(&self) -> EngineResult<Vec<PathBuf>> {
        self.registry.orphan_tables()
    }

    pub fn delete_class(&mut self, name: &str) -> EngineResult<DeleteSummary> {
        let archive = self.registry.delete_class(name)?;
        let session_discarded = self.session.discard_if_class(name);
        if session_discarded {
            log::info!("discarded roll call of deleted class {}", name.trim());
        }
        Ok(DeleteSummary {
            archive,
            session_discarded,
        })
    }

    /// Replace a class roster from rows already read from some source.
    pub fn import_roster(&mut self, class_name: &str, raw: &RawTable) -> EngineResult<ImportSummary> {
        let class = self.registry.find_class(class_name)?;
        let students = import::extract_students(raw)?;
        let stats = tables::replace_roster(&class.tables, &students, self.config.stats_on_reimport)?;
        let class = self
            .registry
            .set_roster_path(&class.name, &class.tables.roster)?;
        let session_discarded = self.session.discard_if_class(&class.name);
        Ok(ImportSummary {
            class,
            imported: students.len(),
            stats,
            session_discarded,
        })
    }

    /// Replace a class roster from a `.csv`, `.tsv`/`.txt` or `.xlsx` file.
    pub fn import_roster_file(&mut self, class_name: &str, path: &Path) -> EngineResult<ImportSummary> {
        self.registry.find_class(class_name)?;
        let raw = import::read_tabular_file(path)?;
        self.import_roster(class_name, &raw)
    }

    pub fn roster(&self, class_name: &str) -> EngineResult<Vec<StudentEntry>> {
        let class = self.registry.find_class(class_name)?;
        tables::read_roster(&class.tables.roster)
    }

    pub fn attendance_log(&self, class_name: &str) -> EngineResult<Vec<AttendanceRecord>> {
        let class = self.registry.find_class(class_name)?;
        tables::read_log(&class.tables.log)
    }

    pub fn stats(&self, class_name: &str) -> EngineResult<Vec<StatEntry>> {
        let class = self.registry.find_class(class_name)?;
        tables::read_stats(&class.tables.stats)
    }

    /// Start a roll call and announce the first student.
    pub fn start_session(&mut self, class_name: &str) -> EngineResult<SessionSnapshot> {
        self.session.discard();
        let class = self.registry.find_class(class_name)?;
        let first = self.session.start(&class)?;
        self.announcer.announce(&first.name);
        Ok(self.session.snapshot())
    }

    pub fn current_student(&self) -> EngineResult<StudentEntry> {
        self.session.current_student().cloned()
    }

    pub fn announce_current(&self) -> EngineResult<StudentEntry> {
        self.session.announce_current(&self.announcer)
    }

    pub fn record_decision(&mut self, status: AttendanceStatus) -> EngineResult<Transition> {
        self.record_decision_at(status, Local::now().naive_local())
    }

    /// Record a decision stamped `now`. On [`Transition::Advanced`] the next
    /// student is announced.
    pub fn record_decision_at(
        &mut self,
        status: AttendanceStatus,
        now: NaiveDateTime,
    ) -> EngineResult<Transition> {
        self.ensure_session_class_indexed()?;
        let transition = self.session.record_decision(status, now)?;
        if let Transition::Advanced { next, .. } = &transition {
            self.announcer.announce(&next.name);
        }
        Ok(transition)
    }

    pub fn session_snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn discard_session(&mut self) -> SessionSnapshot {
        self.session.discard();
        self.session.snapshot()
    }

    // The index may have been edited underneath a running session; never write
    // into tables of a class that is no longer registered.
    fn ensure_session_class_indexed(&mut self) -> EngineResult<()> {
        let Some(name) = self.session.class_name().map(|s| s.to_string()) else {
            return Err(EngineError::NoSession);
        };
        match self.registry.find_class(&name) {
            Ok(_) => Ok(()),
            Err(EngineError::ClassNotFound(n)) => {
                self.session.discard();
                Err(EngineError::ClassNotFound(n))
            }
            Err(e) => Err(e),
        }
    }
}
