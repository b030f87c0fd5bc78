use crate::ipc::error::{engine_err, ok};
use crate::ipc::helpers::{engine, engine_mut, get_required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    match engine.load_classes() {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = match engine(state, req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let name = match get_required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match engine.create_class(&name) {
        Ok(class) => ok(&req.id, json!({ "class": class })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = match engine_mut(state, req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let name = match get_required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match engine.delete_class(&name) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "archiveDir": summary.archive.archive_dir.to_string_lossy(),
                "archivedFiles": summary
                    .archive
                    .archived_files
                    .iter()
                    .map(|p| p.to_string_lossy().to_string())
                    .collect::<Vec<_>>(),
                "sessionDiscarded": summary.session_discarded,
            }),
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_classes_orphans(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = match engine(state, req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    match engine.orphan_tables() {
        Ok(files) => ok(
            &req.id,
            json!({
                "files": files
                    .iter()
                    .map(|p| p.to_string_lossy().to_string())
                    .collect::<Vec<_>>()
            }),
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        "classes.orphans" => Some(handle_classes_orphans(state, req)),
        _ => None,
    }
}
