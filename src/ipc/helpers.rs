use crate::backend::{BackendResponse, Call, Query};
use crate::cache::{Freshness, Loaded, SwrCache};
use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use crate::session::AUTH_FLAG_COOKIE;
use serde_json::{json, Value};

/// Raw `Authorization` header to forward, if the caller supplied one.
pub fn authorization(params: &Value) -> Option<String> {
    params
        .get("authorization")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Entity ids may arrive as numbers or digit strings. They end up in a
/// backend path, so anything but a positive integer is rejected.
pub fn id_param(params: &Value, key: &str) -> Result<String, HandlerErr> {
    let id = match params.get(key) {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => {
            let s = s.trim();
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                s.parse::<u64>().ok()
            } else {
                None
            }
        }
        None | Some(Value::Null) => {
            return Err(HandlerErr::bad_params(format!("missing params.{}", key)))
        }
        Some(_) => None,
    };
    match id {
        Some(id) if id > 0 => Ok(id.to_string()),
        _ => Err(HandlerErr::bad_params(format!(
            "params.{} must be a positive integer",
            key
        ))),
    }
}

pub fn wants_revalidate(params: &Value) -> bool {
    params
        .get("revalidate")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Write cookie and flag changes back to the workspace, if one is open.
pub fn persist_session(state: &mut AppState) {
    let Some(conn) = state.db.as_ref() else {
        return;
    };
    if state.session.jar.take_dirty() {
        if let Err(e) = db::cookies_replace(conn, state.session.jar.cookies()) {
            tracing::warn!(error = %e, "failed to persist session cookies");
        }
    }
    if let Err(e) = db::flag_store(conn, AUTH_FLAG_COOKIE, state.session.flag_expires_at) {
        tracing::warn!(error = %e, "failed to persist auth flag");
    }
}

/// Uncached backend call (mutations, auth).
pub fn send(state: &mut AppState, call: Call) -> Result<BackendResponse, HandlerErr> {
    let res = state.backend.send(&mut state.session.jar, call);
    persist_session(state);
    Ok(res?)
}

/// Cached GET through the SWR store.
pub fn load(
    state: &mut AppState,
    path: &str,
    query: Query,
    params: &Value,
) -> Result<Loaded, HandlerErr> {
    let key = SwrCache::key(path, &query);
    let call = Call::get(path)
        .query(query)
        .authorization(authorization(params));
    let force = wants_revalidate(params);
    let res = state
        .cache
        .load(&key, force, || state.backend.send(&mut state.session.jar, call));
    persist_session(state);
    Ok(res?)
}

/// Read result envelope: the view model plus where it came from.
pub fn read_view(loaded: &Loaded, body: Value) -> Value {
    let mut out = json!({
        "cacheKey": loaded.key,
        "status": loaded.status,
        "body": body,
        "freshness": loaded.freshness,
        "stale": loaded.freshness == Freshness::Stale,
        "fetchedAt": loaded.fetched_at.to_rfc3339(),
    });
    if let Some(e) = &loaded.error {
        out["error"] = json!({
            "code": e.code(),
            "message": e.message(),
            "details": e.details(),
        });
    }
    out
}

/// Drop cached reads a mutation may have changed.
pub fn invalidate(state: &mut AppState, prefixes: &[&str]) {
    let removed: usize = prefixes
        .iter()
        .map(|p| state.cache.invalidate_prefix(p))
        .sum();
    tracing::debug!(removed, ?prefixes, "cache invalidated");
}

/// `{data: [...]}` or a bare array, as a mutable row list.
pub fn rows_mut(body: &mut Value) -> Option<&mut Vec<Value>> {
    if body.is_array() {
        return body.as_array_mut();
    }
    body.get_mut("data").and_then(|d| d.as_array_mut())
}

pub fn rows(body: &Value) -> &[Value] {
    match body {
        Value::Array(a) => a.as_slice(),
        other => other
            .get("data")
            .and_then(|d| d.as_array())
            .map(|a| a.as_slice())
            .unwrap_or(&[]),
    }
}
