//! Readers for externally supplied roster files.
//!
//! Everything is normalised into a [`RawTable`] of text cells; the roster
//! rules (required columns, blank and duplicate rows) are applied afterwards
//! by [`extract_students`] so they behave the same whatever the source format.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::ZipArchive;

use crate::db::{self, COL_STUDENT_ID, COL_STUDENT_NAME};
use crate::error::{EngineError, EngineResult};
use crate::models::StudentEntry;

const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    fn from_records(mut records: Vec<Vec<String>>) -> Self {
        if records.is_empty() {
            return RawTable::default();
        }
        let headers = records
            .remove(0)
            .into_iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        RawTable {
            headers,
            rows: records,
        }
    }
}

/// Read a roster file, choosing the parser from the extension.
pub fn read_tabular_file(path: &Path) -> EngineResult<RawTable> {
    if !path.is_file() {
        return Err(EngineError::Storage(format!(
            "import file not found: {}",
            path.display()
        )));
    }
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => Ok(parse_delimited(&read_text(path)?, ',')),
        "tsv" | "txt" => Ok(parse_delimited(&read_text(path)?, '\t')),
        "xlsx" => read_xlsx(path),
        other => Err(EngineError::UnsupportedFormat(if other.is_empty() {
            path.display().to_string()
        } else {
            format!(".{}", other)
        })),
    }
}

fn read_text(path: &Path) -> EngineResult<String> {
    let bytes = std::fs::read(path).map_err(|e| EngineError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

/// Split delimited text into a table. Double-quoted fields may contain the
/// delimiter, newlines and `""` escapes. Blank lines are skipped.
pub fn parse_delimited(text: &str, delim: char) -> RawTable {
    let mut records: Vec<Vec<String>> = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            c if c == delim => record.push(std::mem::take(&mut field)),
            c => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }
    RawTable::from_records(records)
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    if record.iter().any(|f| !f.trim().is_empty()) {
        records.push(record);
    }
}

/// Read the first worksheet of an `.xlsx` workbook.
pub fn read_xlsx(path: &Path) -> EngineResult<RawTable> {
    let file = File::open(path).map_err(|e| EngineError::io(path, e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| EngineError::Storage(format!("{}: invalid workbook: {}", path.display(), e)))?;

    let shared = match zip_entry_text(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let sheet_name = first_sheet_entry(&mut archive)?;
    let Some(sheet_xml) = zip_entry_text(&mut archive, &sheet_name)? else {
        return Err(EngineError::Storage(format!(
            "{}: workbook has no worksheet {}",
            path.display(),
            sheet_name
        )));
    };
    parse_sheet(&sheet_xml, &shared)
}

fn zip_entry_text(archive: &mut ZipArchive<File>, name: &str) -> EngineResult<Option<String>> {
    let mut entry = match archive.by_name(name) {
        Ok(e) => e,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(EngineError::Storage(format!("{}: {}", name, e))),
    };
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| EngineError::Storage(format!("{}: {}", name, e)))?;
    Ok(Some(text))
}

// Resolve the first <sheet> of workbook.xml through the relationships file,
// falling back to the conventional sheet1 location.
fn first_sheet_entry(archive: &mut ZipArchive<File>) -> EngineResult<String> {
    let fallback = "xl/worksheets/sheet1.xml".to_string();
    let (Some(workbook), Some(rels)) = (
        zip_entry_text(archive, "xl/workbook.xml")?,
        zip_entry_text(archive, "xl/_rels/workbook.xml.rels")?,
    ) else {
        return Ok(fallback);
    };

    let wb = parse_xml(&workbook)?;
    let Some(rid) = wb
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "sheet")
        .and_then(|n| n.attribute((REL_NS, "id")))
    else {
        return Ok(fallback);
    };

    let rels_doc = parse_xml(&rels)?;
    let target = rels_doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Relationship")
        .find(|n| n.attribute("Id") == Some(rid))
        .and_then(|n| n.attribute("Target"));
    Ok(match target {
        Some(t) if t.starts_with('/') => t.trim_start_matches('/').to_string(),
        Some(t) => format!("xl/{}", t),
        None => fallback,
    })
}

fn parse_xml(xml: &str) -> EngineResult<roxmltree::Document<'_>> {
    roxmltree::Document::parse(xml)
        .map_err(|e| EngineError::Storage(format!("workbook XML parse error: {}", e)))
}

fn parse_shared_strings(xml: &str) -> EngineResult<Vec<String>> {
    let doc = parse_xml(xml)?;
    Ok(doc
        .root_element()
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "si")
        .map(|si| {
            si.descendants()
                .filter(|n| n.is_element() && n.tag_name().name() == "t")
                .filter_map(|t| t.text())
                .collect::<String>()
        })
        .collect())
}

fn parse_sheet(xml: &str, shared: &[String]) -> EngineResult<RawTable> {
    let doc = parse_xml(xml)?;
    let mut records = Vec::new();
    for row in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "row")
    {
        let mut cells: Vec<String> = Vec::new();
        for (pos, c) in row
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "c")
            .enumerate()
        {
            let col = match c.attribute("r") {
                Some(r) => column_index(r).ok_or_else(|| {
                    EngineError::Storage(format!("invalid cell reference {:?}", r))
                })?,
                None => pos,
            };
            if cells.len() <= col {
                cells.resize(col + 1, String::new());
            }
            cells[col] = cell_value(&c, shared);
        }
        push_record(&mut records, cells);
    }
    Ok(RawTable::from_records(records))
}

fn cell_value(c: &roxmltree::Node<'_, '_>, shared: &[String]) -> String {
    let child_text = |name: &str| {
        c.children()
            .find(|n| n.is_element() && n.tag_name().name() == name)
            .and_then(|n| n.text())
            .unwrap_or("")
            .to_string()
    };
    match c.attribute("t") {
        Some("s") => child_text("v")
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i).cloned())
            .unwrap_or_default(),
        Some("inlineStr") => c
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "t")
            .filter_map(|t| t.text())
            .collect(),
        Some("str") | Some("b") | Some("e") => child_text("v"),
        _ => {
            let v = child_text("v");
            match v.trim().parse::<f64>() {
                Ok(f) => db::format_number(f),
                Err(_) => v,
            }
        }
    }
}

const MAX_COLUMN: usize = 16383; // XFD

// "C12" -> 2. None for anything past the last xlsx column.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<char> = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut idx = 0usize;
    for ch in letters {
        let digit = ch.to_ascii_uppercase() as usize - 'A' as usize + 1;
        idx = idx.checked_mul(26)?.checked_add(digit)?;
    }
    let col = idx - 1;
    (col <= MAX_COLUMN).then_some(col)
}

/// Apply the roster rules to a raw table: both id and name columns must
/// exist, rows with a blank id or name are dropped, exact duplicate rows are
/// dropped keeping the first, and something must remain.
pub fn extract_students(raw: &RawTable) -> EngineResult<Vec<StudentEntry>> {
    let id_col = raw.column(COL_STUDENT_ID);
    let name_col = raw.column(COL_STUDENT_NAME);
    let (Some(id_col), Some(name_col)) = (id_col, name_col) else {
        let mut missing = Vec::new();
        if id_col.is_none() {
            missing.push(COL_STUDENT_ID.to_string());
        }
        if name_col.is_none() {
            missing.push(COL_STUDENT_NAME.to_string());
        }
        return Err(EngineError::Schema { missing });
    };

    let mut seen = HashSet::new();
    let mut students = Vec::new();
    for row in &raw.rows {
        let cell = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");
        let (id, name) = (cell(id_col), cell(name_col));
        if id.is_empty() || name.is_empty() {
            continue;
        }
        let entry = StudentEntry {
            id: id.to_string(),
            name: name.to_string(),
        };
        if seen.insert(entry.clone()) {
            students.push(entry);
        }
    }

    if students.is_empty() {
        return Err(EngineError::EmptyImport);
    }
    Ok(students)
}
