mod test_support;

use serde_json::json;
use std::io::Write;
use test_support::{quiet_workspace, request_err_code, request_ok, spawn_sidecar, write_file};
use zip::write::FileOptions;
use zip::ZipWriter;

fn write_minimal_xlsx(path: &std::path::Path) {
    let f = std::fs::File::create(path).expect("create xlsx");
    let mut zip = ZipWriter::new(f);
    let opts = FileOptions::default();
    let entries = [
        (
            "xl/workbook.xml",
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="名单" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/roster.xml"/></Relationships>"#,
        ),
        (
            "xl/sharedStrings.xml",
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>学号</t></si><si><t>姓名</t></si><si><t>班主任</t></si><si><t>王芳</t></si><si><t>李雷</t></si></sst>"#,
        ),
        (
            "xl/worksheets/roster.xml",
            r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c></row>
<row r="2"><c r="A2"><v>20240101</v></c><c r="B2" t="s"><v>3</v></c></row>
<row r="3"><c r="A3"><v>20240102</v></c><c r="B3" t="s"><v>4</v></c></row>
<row r="4"><c r="A4"><v>20240102</v></c><c r="B4" t="s"><v>4</v></c></row>
</sheetData></worksheet>"#,
        ),
    ];
    for (name, body) in entries {
        zip.start_file(name, opts).expect("start entry");
        zip.write_all(body.as_bytes()).expect("write entry");
    }
    zip.finish().expect("finish xlsx");
}

#[test]
fn csv_import_cleans_rows_and_zeroes_stats() {
    let workspace = quiet_workspace("attendanced-roster-csv");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "2", "classes.create", json!({ "name": "C1" }));

    let csv = write_file(
        &workspace,
        "names.csv",
        "\u{feff}序号,学号,姓名\r\n1,001,张三\r\n2,002,李四\r\n3,002,李四\r\n4,,王五\r\n5,004,\r\n6,005,赵六\r\n",
    );
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "roster.import",
        json!({ "className": "C1", "path": csv.to_string_lossy() }),
    );
    // 序号 differs per row, but only id and name take part in duplicate detection.
    assert_eq!(imported.get("imported").and_then(|v| v.as_u64()), Some(3));

    let roster = request_ok(&mut stdin, &mut reader, "4", "roster.get", json!({ "className": "C1" }));
    assert_eq!(
        roster.get("students"),
        Some(&json!([
            { "id": "001", "name": "张三" },
            { "id": "002", "name": "李四" },
            { "id": "005", "name": "赵六" }
        ]))
    );

    let stats = request_ok(&mut stdin, &mut reader, "5", "stats.get", json!({ "className": "C1" }));
    let rows = stats.get("stats").and_then(|v| v.as_array()).expect("stats");
    assert_eq!(rows.len(), 3);
    for row in rows {
        for key in ["present", "absent", "leave"] {
            assert_eq!(row.get(key).and_then(|v| v.as_i64()), Some(0));
        }
    }

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn missing_name_column_changes_nothing() {
    let workspace = quiet_workspace("attendanced-roster-schema");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let created = request_ok(&mut stdin, &mut reader, "2", "classes.create", json!({ "name": "C2" }));
    let good = write_file(&workspace, "good.csv", "学号,姓名\n1,A\n");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "roster.import",
        json!({ "className": "C2", "path": good.to_string_lossy() }),
    );

    let roster_path = created.pointer("/class/rosterPath").and_then(|v| v.as_str()).expect("roster");
    let stats_path = created.pointer("/class/statsPath").and_then(|v| v.as_str()).expect("stats");
    let roster_before = std::fs::read(roster_path).expect("roster bytes");
    let stats_before = std::fs::read(stats_path).expect("stats bytes");

    let bad = write_file(&workspace, "bad.csv", "学号,名字\n1,A\n2,B\n");
    let value = test_support::request(
        &mut stdin,
        &mut reader,
        "4",
        "roster.import",
        json!({ "className": "C2", "path": bad.to_string_lossy() }),
    );
    assert_eq!(value.pointer("/error/code").and_then(|v| v.as_str()), Some("schema_error"));
    assert_eq!(value.pointer("/error/details/missing"), Some(&json!(["姓名"])));

    assert_eq!(std::fs::read(roster_path).expect("roster bytes"), roster_before);
    assert_eq!(std::fs::read(stats_path).expect("stats bytes"), stats_before);

    let blank = write_file(&workspace, "blank.csv", "学号,姓名\n,\n3,\n");
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "5",
        "roster.import",
        json!({ "className": "C2", "path": blank.to_string_lossy() }),
    );
    assert_eq!(code, "empty_import");

    let other = write_file(&workspace, "names.ods", "x");
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "6",
        "roster.import",
        json!({ "className": "C2", "path": other.to_string_lossy() }),
    );
    assert_eq!(code, "unsupported_format");

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "7",
        "roster.import",
        json!({ "className": "Nope", "path": good.to_string_lossy() }),
    );
    assert_eq!(code, "class_not_found");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn xlsx_and_inline_rows_import() {
    let workspace = quiet_workspace("attendanced-roster-xlsx");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "2", "classes.create", json!({ "name": "X" }));

    let xlsx = workspace.join("roster.xlsx");
    write_minimal_xlsx(&xlsx);
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "roster.import",
        json!({ "className": "X", "path": xlsx.to_string_lossy() }),
    );
    assert_eq!(imported.get("imported").and_then(|v| v.as_u64()), Some(2));
    let roster = request_ok(&mut stdin, &mut reader, "4", "roster.get", json!({ "className": "X" }));
    assert_eq!(
        roster.get("students"),
        Some(&json!([
            { "id": "20240101", "name": "王芳" },
            { "id": "20240102", "name": "李雷" }
        ]))
    );

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "roster.import",
        json!({
            "className": "X",
            "headers": ["姓名", "学号"],
            "rows": [["韩梅梅", 7], ["李雷", 20240102], [null, 9]]
        }),
    );
    assert_eq!(imported.get("imported").and_then(|v| v.as_u64()), Some(2));
    let roster = request_ok(&mut stdin, &mut reader, "6", "roster.get", json!({ "className": "X" }));
    assert_eq!(
        roster.get("students"),
        Some(&json!([
            { "id": "7", "name": "韩梅梅" },
            { "id": "20240102", "name": "李雷" }
        ]))
    );

    let _ = std::fs::remove_dir_all(workspace);
}
