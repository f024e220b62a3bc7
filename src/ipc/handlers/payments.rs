use crate::backend::Call;
use crate::calc::{self, PaymentRecord, PaymentStatus};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{self, authorization, id_param};
use crate::ipc::types::{AppState, Request};
use crate::translate;
use crate::validate;
use chrono::Utc;
use serde_json::{json, Map, Value};

const PAYMENT_DEPENDENTS: &[&str] = &["/pagos", "/cobranza", "/dashboard", "/reportes", "/alumnos"];

/// Pending rows gain `daysPastDue`, `lateFeeAmount` and `totalAmount`.
fn attach_late_fees(body: &mut Value) {
    let now = Utc::now();
    let Some(rows) = helpers::rows_mut(body) else {
        return;
    };
    for row in rows.iter_mut() {
        let Some(p) = PaymentRecord::from_json(row) else {
            continue;
        };
        if p.status == PaymentStatus::Pending && p.due_date.is_some() {
            *row = calc::with_late_fee(&p, now);
        }
    }
}

fn list(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let query = translate::payments_list_query(params);
    let loaded = helpers::load(state, "/pagos", query, params)?;
    let mut body = loaded.body.clone();
    attach_late_fees(&mut body);
    Ok(helpers::read_view(&loaded, body))
}

fn search(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let query = translate::payments_search_query(params);
    let loaded = helpers::load(state, "/pagos", query, params)?;
    Ok(helpers::read_view(&loaded, loaded.body.clone()))
}

fn get(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let id = id_param(params, "id")?;
    let loaded = helpers::load(state, &format!("/pagos/{}", id), Vec::new(), params)?;
    Ok(helpers::read_view(&loaded, loaded.body.clone()))
}

fn post_payment(
    state: &mut AppState,
    params: &Value,
    path: &str,
    payload: Map<String, Value>,
) -> Result<Value, HandlerErr> {
    let call = Call::post(path, Value::Object(payload)).authorization(authorization(params));
    let resp = helpers::send(state, call)?;
    helpers::invalidate(state, PAYMENT_DEPENDENTS);
    Ok(json!({ "status": resp.status, "body": resp.body }))
}

fn create(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    if translate::payment_missing_required(params) {
        return Err(HandlerErr::bad_params("Datos requeridos faltantes"));
    }
    let payload = translate::payment_payload(params);
    // Adjustments have their own endpoint and schema.
    if payload.get("tipo_pago").and_then(|v| v.as_str()) == Some("ajuste") {
        return adjust(state, params);
    }
    validate::payment(&payload, false).map_err(HandlerErr::validation)?;
    post_payment(state, params, "/pagos", payload)
}

fn adjust(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let payload = translate::adjustment_payload(params);
    validate::payment(&payload, true).map_err(HandlerErr::validation)?;
    post_payment(state, params, "/pagos/ajuste", payload)
}

fn overdue(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let query = translate::payments_overdue_query(params);
    let loaded = helpers::load(state, "/pagos", query, params)?;
    let records = PaymentRecord::from_rows(helpers::rows(&loaded.body));
    let rows = calc::overdue_with_late_fees(&records, Utc::now());
    let total_late_fees: f64 = rows
        .iter()
        .map(|r| calc::number_of(r.get("lateFeeAmount")))
        .sum();
    let body = json!({
        "data": rows,
        "count": rows.len(),
        "totalLateFees": calc::round_off_2_decimals(total_late_fees),
    });
    Ok(helpers::read_view(&loaded, body))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "payments.list" => list(state, &req.params),
        "payments.search" => search(state, &req.params),
        "payments.get" => get(state, &req.params),
        "payments.create" => create(state, &req.params),
        "payments.adjust" => adjust(state, &req.params),
        "payments.overdue" => overdue(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
