use crate::backend::Call;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{self, authorization, id_param};
use crate::ipc::types::{AppState, Request};
use crate::translate;
use crate::validate;
use serde_json::{json, Value};

const PLAN_DEPENDENTS: &[&str] = &["/planes", "/alumnos", "/reportes"];

fn list(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let query = vec![("include".to_string(), "memberships".to_string())];
    let loaded = helpers::load(state, "/planes", query, params)?;
    let plans = translate::plans_with_totals(&loaded.body);
    Ok(helpers::read_view(&loaded, json!({ "data": plans })))
}

/// Both vocabularies end up as the validated Spanish form.
fn plan_body(params: &Value, creating: bool) -> Result<Value, HandlerErr> {
    let input = translate::plan_form_input(params, creating).map_err(HandlerErr::bad_params)?;
    let payload = validate::plan(&input, creating).map_err(HandlerErr::validation)?;
    Ok(Value::Object(payload))
}

fn create(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let body = plan_body(params, true)?;
    let call = Call::post("/planes", body).authorization(authorization(params));
    let resp = helpers::send(state, call)?;
    helpers::invalidate(state, PLAN_DEPENDENTS);
    Ok(json!({ "status": resp.status, "body": resp.body }))
}

fn update(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let id = id_param(params, "id")?;
    let body = plan_body(params, false)?;
    if body.as_object().map(|o| o.is_empty()).unwrap_or(true) {
        return Err(HandlerErr::bad_params("nothing to update"));
    }
    let call = Call::put(format!("/planes/{}", id), body).authorization(authorization(params));
    let resp = helpers::send(state, call)?;
    helpers::invalidate(state, PLAN_DEPENDENTS);
    Ok(json!({ "status": resp.status, "body": resp.body }))
}

fn delete(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let id = id_param(params, "id")?;
    let call = Call::delete(format!("/planes/{}", id)).authorization(authorization(params));
    let resp = helpers::send(state, call)?;
    helpers::invalidate(state, PLAN_DEPENDENTS);
    Ok(json!({ "status": resp.status, "body": resp.body }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "plans.list" => list(state, &req.params),
        "plans.create" => create(state, &req.params),
        "plans.update" => update(state, &req.params),
        "plans.delete" => delete(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
