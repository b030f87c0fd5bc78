//! Roll-call attendance engine.
//!
//! Classes each own three SQLite-backed tables (roster, attendance log and
//! per-student statistics) indexed by a class registry. A roll-call session
//! walks a snapshot of the roster, writing one log row and one statistics
//! increment per decision. The `attendanced` binary exposes all of this to a
//! UI process over a JSON-lines protocol on stdin/stdout.

pub mod announce;
pub mod backup;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod import;
pub mod ipc;
pub mod models;
pub mod registry;
pub mod session;
pub mod tables;

pub use config::{EngineConfig, ReimportStatsPolicy};
pub use engine::AttendanceEngine;
pub use error::{EngineError, EngineResult};
pub use models::{AttendanceRecord, AttendanceStatus, ClassRecord, ClassTables, StatEntry, StudentEntry};
pub use session::{SessionState, Transition};
