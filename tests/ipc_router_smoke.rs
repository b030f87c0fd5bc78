mod test_support;

use serde_json::json;
use test_support::{quiet_workspace, request, request_ok, spawn_sidecar, write_file};

fn assert_routed(value: &serde_json::Value, method: &str) {
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .pointer("/error/code")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(code, "not_implemented", "unexpected unknown method for {}", method);
    }
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = quiet_workspace("attendanced-router-smoke");
    let csv = write_file(&workspace, "smoke.csv", "学号,姓名\n1,A\n");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let calls = vec![
        ("health", json!({})),
        ("workspace.select", json!({ "path": workspace.to_string_lossy() })),
        ("classes.create", json!({ "name": "Smoke" })),
        ("classes.list", json!({})),
        ("classes.orphans", json!({})),
        ("roster.import", json!({ "className": "Smoke", "path": csv.to_string_lossy() })),
        ("roster.get", json!({ "className": "Smoke" })),
        ("session.start", json!({ "className": "Smoke" })),
        ("session.current", json!({})),
        ("session.announce", json!({})),
        ("session.record", json!({ "status": "present" })),
        ("session.state", json!({})),
        ("session.discard", json!({})),
        ("attendance.log", json!({ "className": "Smoke" })),
        ("stats.get", json!({ "className": "Smoke" })),
        ("classes.delete", json!({ "name": "Smoke" })),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let value = request(&mut stdin, &mut reader, &format!("s{}", i), method, params);
        assert_routed(&value, method);
    }

    let unknown = request(&mut stdin, &mut reader, "u", "grades.compute", json!({}));
    assert_eq!(
        unknown.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn health_reports_workspace_and_effective_config() {
    let workspace = quiet_workspace("attendanced-health");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let before = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(before.get("dataDir"), Some(&serde_json::Value::Null));
    assert_eq!(before.get("config"), Some(&serde_json::Value::Null));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let after = request_ok(&mut stdin, &mut reader, "3", "health", json!({}));
    assert_eq!(
        after.get("dataDir").and_then(|v| v.as_str()),
        Some(workspace.to_string_lossy().as_ref())
    );
    assert_eq!(
        after.pointer("/config/announcements/enabled").and_then(|v| v.as_bool()),
        Some(false)
    );
    assert_eq!(
        after.pointer("/config/statsOnReimport").and_then(|v| v.as_str()),
        Some("preserve")
    );
    assert_eq!(
        after.pointer("/config/backupDirName").and_then(|v| v.as_str()),
        Some("deleted_classes")
    );

    let _ = std::fs::remove_dir_all(workspace);
}
