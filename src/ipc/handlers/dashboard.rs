use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::translate;
use serde_json::Value;

fn summary(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let query = translate::dashboard_query(params);
    let loaded = helpers::load(state, "/dashboard/summary", query, params)?;
    let data = loaded
        .body
        .get("data")
        .cloned()
        .unwrap_or_else(|| loaded.body.clone());
    Ok(helpers::read_view(&loaded, data))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "dashboard.summary" => summary(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
