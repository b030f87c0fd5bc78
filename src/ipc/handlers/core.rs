use crate::config::EngineConfig;
use crate::engine::AttendanceEngine;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = state.engine.as_ref();
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "dataDir": engine.map(|e| e.data_dir().to_string_lossy().to_string()),
            "config": engine.map(|e| e.config()),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match get_required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };

    let config = match EngineConfig::load(&path) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "config_invalid", format!("{e:#}"), None),
    };

    // Shut the previous engine (and its announcer thread) down first.
    state.engine = None;

    match AttendanceEngine::open(config) {
        Ok(engine) => {
            state.engine = Some(engine);
            ok(&req.id, json!({ "dataDir": path.to_string_lossy() }))
        }
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
