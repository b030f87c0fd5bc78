use serde::Deserialize;

use crate::engine::AttendanceEngine;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub engine: Option<AttendanceEngine>,
}
