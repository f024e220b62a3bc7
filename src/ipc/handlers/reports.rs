use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::translate;
use serde_json::Value;

fn generate(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let query = translate::report_query(params).map_err(HandlerErr::bad_params)?;
    let loaded = helpers::load(state, "/reportes", query, params)?;
    Ok(helpers::read_view(&loaded, loaded.body.clone()))
}

/// `/reportes/<name>` over a `fecha_desde`..`fecha_hasta` range.
fn named(state: &mut AppState, params: &Value, name: &str) -> Result<Value, HandlerErr> {
    let query = translate::report_range_query(params, name == "cobranza");
    let loaded = helpers::load(state, &format!("/reportes/{}", name), query, params)?;
    Ok(helpers::read_view(&loaded, loaded.body.clone()))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "reports.generate" => generate(state, &req.params),
        "reports.resumen" => named(state, &req.params, "resumen"),
        "reports.cobranza" => named(state, &req.params, "cobranza"),
        "reports.alumnos" => named(state, &req.params, "alumnos"),
        "reports.planes" => named(state, &req.params, "planes"),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
