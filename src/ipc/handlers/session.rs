use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{engine, engine_mut, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::models::AttendanceStatus;
use serde_json::json;

fn handle_session_start(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = match engine_mut(state, req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let class_name = match get_required_str(req, "className") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match engine.start_session(&class_name) {
        Ok(snapshot) => ok(&req.id, json!({ "session": snapshot })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_session_current(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = match engine(state, req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    match engine.current_student() {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_session_announce(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = match engine(state, req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    match engine.announce_current() {
        Ok(student) => ok(&req.id, json!({ "announced": student.name })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_session_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = match engine_mut(state, req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let raw = match get_required_str(req, "status") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(status) = AttendanceStatus::parse(&raw) else {
        return err(
            &req.id,
            "bad_params",
            format!("unknown status: {}", raw),
            Some(json!({ "allowed": ["present", "absent", "leave", "出勤", "旷课", "请假"] })),
        );
    };
    match engine.record_decision(status) {
        Ok(transition) => ok(
            &req.id,
            json!({
                "transition": transition,
                "session": engine.session_snapshot(),
            }),
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_session_state(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = match engine(state, req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    ok(&req.id, json!({ "session": engine.session_snapshot() }))
}

fn handle_session_discard(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = match engine_mut(state, req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    ok(&req.id, json!({ "session": engine.discard_session() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.start" => Some(handle_session_start(state, req)),
        "session.current" => Some(handle_session_current(state, req)),
        "session.announce" => Some(handle_session_announce(state, req)),
        "session.record" => Some(handle_session_record(state, req)),
        "session.state" => Some(handle_session_state(state, req)),
        "session.discard" => Some(handle_session_discard(state, req)),
        _ => None,
    }
}
