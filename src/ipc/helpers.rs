use crate::engine::AttendanceEngine;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};

pub fn get_required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing params.{}", key), None))
}

pub fn engine<'a>(state: &'a AppState, req: &Request) -> Result<&'a AttendanceEngine, serde_json::Value> {
    state
        .engine
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn engine_mut<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut AttendanceEngine, serde_json::Value> {
    state
        .engine
        .as_mut()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}
