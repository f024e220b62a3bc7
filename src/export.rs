use anyhow::Context;
use csv::WriterBuilder;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub key: String,
    pub header: String,
}

/// Parses `[{key, header}]`; a bare string is both key and header.
pub fn columns_from_params(v: Option<&Value>) -> Option<Vec<Column>> {
    let arr = v?.as_array()?;
    let cols: Vec<Column> = arr
        .iter()
        .filter_map(|c| match c {
            Value::String(s) => Some(Column {
                key: s.clone(),
                header: s.clone(),
            }),
            Value::Object(o) => {
                let key = o.get("key")?.as_str()?.to_string();
                let header = o
                    .get("header")
                    .and_then(|h| h.as_str())
                    .unwrap_or(key.as_str())
                    .to_string();
                Some(Column { key, header })
            }
            _ => None,
        })
        .collect();
    if cols.is_empty() {
        None
    } else {
        Some(cols)
    }
}

/// Keys of the first row, in order.
pub fn infer_columns(rows: &[Value]) -> Vec<Column> {
    rows.first()
        .and_then(|r| r.as_object())
        .map(|o| {
            o.keys()
                .map(|k| Column {
                    key: k.clone(),
                    header: k.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Pulls the row list out of a cached body: `rows_path` when given,
/// else `data`, else the body itself if it is an array.
pub fn rows_from_body<'a>(body: &'a Value, rows_path: Option<&str>) -> Option<&'a Vec<Value>> {
    if let Some(path) = rows_path {
        let mut cur = body;
        for seg in path.split('.').filter(|s| !s.is_empty()) {
            cur = match cur {
                Value::Array(a) => a.get(seg.parse::<usize>().ok()?)?,
                other => other.get(seg)?,
            };
        }
        return cur.as_array();
    }
    match body {
        Value::Array(a) => Some(a),
        other => other.get("data").and_then(|d| d.as_array()),
    }
}

fn cell(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(nested) => nested.to_string(),
    }
}

pub fn rows_to_csv(rows: &[Value], columns: &[Column]) -> anyhow::Result<String> {
    if columns.is_empty() {
        return Ok(String::new());
    }
    let mut wtr = WriterBuilder::new().from_writer(Vec::new());
    wtr.write_record(columns.iter().map(|c| c.header.as_str()))
        .context("write csv header")?;
    for row in rows {
        wtr.write_record(columns.iter().map(|c| cell(row.get(&c.key))))
            .context("write csv row")?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flush csv: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn write_csv_file(path: &Path, csv: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    std::fs::write(path, csv).with_context(|| format!("write {}", path.display()))
}

/// `<kind>_<suffix>.csv`, with anything outside `[A-Za-z0-9_-]` replaced.
pub fn default_file_name(kind: &str, suffix: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .collect()
    };
    let kind = if kind.trim().is_empty() {
        "export".to_string()
    } else {
        clean(kind.trim())
    };
    format!("{}_{}.csv", kind, clean(suffix.trim()))
}
