use crate::import::RawTable;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{engine, engine_mut, get_required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn json_cell(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => crate::db::format_number(f),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn parse_inline_table(params: &serde_json::Value) -> Option<RawTable> {
    let headers = params.get("headers")?.as_array()?;
    let rows = params.get("rows")?.as_array()?;
    Some(RawTable {
        headers: headers.iter().map(json_cell).collect(),
        rows: rows
            .iter()
            .map(|r| {
                r.as_array()
                    .map(|cells| cells.iter().map(json_cell).collect())
                    .unwrap_or_default()
            })
            .collect(),
    })
}

fn handle_roster_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = match engine_mut(state, req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let class_name = match get_required_str(req, "className") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = if let Some(path) = req.params.get("path").and_then(|v| v.as_str()) {
        engine.import_roster_file(&class_name, &PathBuf::from(path))
    } else if let Some(raw) = parse_inline_table(&req.params) {
        engine.import_roster(&class_name, &raw)
    } else {
        return err(
            &req.id,
            "bad_params",
            "provide params.path or params.headers with params.rows",
            None,
        );
    };

    match result {
        Ok(summary) => ok(
            &req.id,
            json!({
                "imported": summary.imported,
                "rosterPath": summary.class.tables.roster.to_string_lossy(),
                "stats": summary.stats,
                "sessionDiscarded": summary.session_discarded,
            }),
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_roster_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = match engine(state, req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let class_name = match get_required_str(req, "className") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match engine.roster(&class_name) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_attendance_log(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = match engine(state, req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let class_name = match get_required_str(req, "className") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match engine.attendance_log(&class_name) {
        Ok(records) => ok(&req.id, json!({ "records": records })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_stats_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = match engine(state, req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let class_name = match get_required_str(req, "className") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match engine.stats(&class_name) {
        Ok(stats) => ok(&req.id, json!({ "stats": stats })),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.import" => Some(handle_roster_import(state, req)),
        "roster.get" => Some(handle_roster_get(state, req)),
        "attendance.log" => Some(handle_attendance_log(state, req)),
        "stats.get" => Some(handle_stats_get(state, req)),
        _ => None,
    }
}
