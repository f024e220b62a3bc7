use crate::backend::Call;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{self, authorization, id_param};
use crate::ipc::types::{AppState, Request};
use crate::translate;
use crate::validate;
use chrono::Utc;
use serde_json::{json, Value};

/// Reads that embed student data and go stale after a student write.
const STUDENT_DEPENDENTS: &[&str] = &["/alumnos", "/planes", "/dashboard", "/reportes", "/cobranza"];

fn list(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let query = translate::students_list_query(params);
    let loaded = helpers::load(state, "/alumnos", query, params)?;
    let mut body = loaded.body.clone();
    translate::decorate_students(&mut body);
    Ok(helpers::read_view(&loaded, body))
}

fn get(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let id = id_param(params, "id")?;
    let loaded = helpers::load(state, &format!("/alumnos/{}", id), Vec::new(), params)?;
    Ok(helpers::read_view(&loaded, loaded.body.clone()))
}

fn create(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let payload = translate::student_payload(params, true, Utc::now().date_naive());
    validate::student(&payload).map_err(HandlerErr::validation)?;

    let call = Call::post("/alumnos", Value::Object(payload)).authorization(authorization(params));
    let resp = helpers::send(state, call)?;
    helpers::invalidate(state, STUDENT_DEPENDENTS);
    Ok(json!({ "status": resp.status, "body": resp.body }))
}

fn update(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let id = id_param(params, "id")?;
    let payload = translate::student_payload(params, false, Utc::now().date_naive());
    if payload.contains_key("nombre") {
        validate::student(&payload).map_err(HandlerErr::validation)?;
    }
    if payload.is_empty() {
        return Err(HandlerErr::bad_params("nothing to update"));
    }

    let call = Call::put(format!("/alumnos/{}", id), Value::Object(payload))
        .authorization(authorization(params));
    let resp = helpers::send(state, call)?;
    helpers::invalidate(state, STUDENT_DEPENDENTS);
    Ok(json!({ "status": resp.status, "body": resp.body }))
}

fn delete(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let id = id_param(params, "id")?;
    let call = Call::delete(format!("/alumnos/{}", id)).authorization(authorization(params));
    let resp = helpers::send(state, call)?;
    helpers::invalidate(state, STUDENT_DEPENDENTS);
    Ok(json!({ "status": resp.status, "body": resp.body }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "students.list" => list(state, &req.params),
        "students.get" => get(state, &req.params),
        "students.create" => create(state, &req.params),
        "students.update" => update(state, &req.params),
        "students.delete" => delete(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
