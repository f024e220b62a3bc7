use crate::export;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::translate::param_str;
use chrono::Utc;
use serde_json::{json, Value};
use std::path::PathBuf;

/// `/alumnos?page=1` -> `alumnos`, `/reportes/cobranza` -> `reportes-cobranza`.
fn kind_from_cache_key(key: &str) -> String {
    key.split('?')
        .next()
        .unwrap_or("")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn export_csv(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let cache_key = param_str(params, "cacheKey");
    let rows: Vec<Value> = match (params.get("rows"), cache_key.as_deref()) {
        (Some(Value::Array(rows)), _) => rows.clone(),
        (Some(_), _) => return Err(HandlerErr::bad_params("params.rows must be an array")),
        (None, Some(key)) => {
            let Some(entry) = state.cache.get(key) else {
                return Err(HandlerErr::new("not_found", format!("nothing cached under {}", key)));
            };
            let rows_path = param_str(params, "rowsPath");
            export::rows_from_body(&entry.body, rows_path.as_deref())
                .cloned()
                .ok_or_else(|| {
                    HandlerErr::bad_params("cached body has no row list")
                        .with_details(json!({ "cacheKey": key, "rowsPath": rows_path }))
                })?
        }
        (None, None) => return Err(HandlerErr::bad_params("missing params.rows or params.cacheKey")),
    };

    let columns = export::columns_from_params(params.get("columns"))
        .unwrap_or_else(|| export::infer_columns(&rows));
    let csv = export::rows_to_csv(&rows, &columns)
        .map_err(|e| HandlerErr::new("export_failed", format!("{e:#}")))?;

    if let Some(out) = param_str(params, "outPath") {
        let path = PathBuf::from(out);
        export::write_csv_file(&path, &csv)
            .map_err(|e| HandlerErr::new("export_failed", format!("{e:#}")))?;
        tracing::info!(path = %path.display(), rows = rows.len(), "csv exported");
        return Ok(json!({
            "path": path.to_string_lossy(),
            "rowCount": rows.len(),
        }));
    }

    let file_name = param_str(params, "fileName").unwrap_or_else(|| {
        let kind = param_str(params, "kind")
            .or_else(|| cache_key.as_deref().map(kind_from_cache_key))
            .unwrap_or_default();
        let suffix = param_str(params, "suffix")
            .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());
        export::default_file_name(&kind, &suffix)
    });
    Ok(json!({
        "csv": csv,
        "rowCount": rows.len(),
        "fileName": file_name,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "export.csv" => Some(respond(&req.id, export_csv(state, &req.params))),
        _ => None,
    }
}
