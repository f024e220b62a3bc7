use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::translate::param_str;
use serde_json::{json, Value};

/// Without a prefix every cached read is dropped.
fn invalidate(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let removed = match param_str(params, "prefix") {
        Some(prefix) => state.cache.invalidate_prefix(&prefix),
        None => state.cache.clear(),
    };
    tracing::debug!(removed, "cache invalidated on request");
    Ok(json!({ "removed": removed }))
}

fn stats(state: &mut AppState) -> Result<Value, HandlerErr> {
    serde_json::to_value(state.cache.stats())
        .map_err(|e| HandlerErr::new("bad_params", e.to_string()))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "cache.invalidate" => invalidate(state, &req.params),
        "cache.stats" => stats(state),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
