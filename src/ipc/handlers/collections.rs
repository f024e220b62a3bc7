use crate::calc::{self, MonthRange, PaymentRecord, StudentTotals};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::translate::{self, param_str};
use chrono::Utc;
use serde_json::{json, Value};

fn student_totals(dashboard: &Value) -> StudentTotals {
    let data = dashboard.get("data").unwrap_or(dashboard);
    let total = calc::number_of(data.get("alumnos")) as i64;
    // The backend does not report active students separately.
    let active = data
        .get("alumnosActivos")
        .map(|v| calc::number_of(Some(v)) as i64)
        .unwrap_or(total);
    StudentTotals {
        total_students: total,
        active_students: active,
    }
}

fn summary(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let now = Utc::now();
    let range = match param_str(params, "month") {
        Some(m) => MonthRange::parse(&m)
            .ok_or_else(|| HandlerErr::bad_params("month must be YYYY-MM"))?,
        None => MonthRange::containing(now),
    };

    let mut degraded: Vec<Value> = Vec::new();

    let totals = match helpers::load(state, "/dashboard", Vec::new(), params) {
        Ok(loaded) => student_totals(&loaded.body),
        Err(e) => {
            tracing::warn!(code = e.code, "dashboard unavailable, student totals default to zero");
            degraded.push(json!({ "source": "/dashboard", "code": e.code, "message": e.message }));
            StudentTotals::default()
        }
    };

    let query = vec![
        ("from".to_string(), range.from_param()),
        ("to".to_string(), range.to_param()),
    ];
    let payments = match helpers::load(state, "/pagos", query, params) {
        Ok(loaded) => PaymentRecord::from_rows(helpers::rows(&loaded.body)),
        Err(e) => {
            tracing::warn!(code = e.code, "monthly payments unavailable, summarizing an empty month");
            degraded.push(json!({ "source": "/pagos", "code": e.code, "message": e.message }));
            Vec::new()
        }
    };

    let report = calc::summarize_collections(&range, &payments, totals, now);
    let mut out = serde_json::to_value(report)
        .map_err(|e| HandlerErr::new("bad_params", e.to_string()))?;
    out["degraded"] = json!(degraded);
    Ok(out)
}

fn list(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let query = translate::collections_list_query(params);
    let loaded = helpers::load(state, "/cobranza", query, params)?;
    Ok(helpers::read_view(&loaded, loaded.body.clone()))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "collections.summary" => summary(state, &req.params),
        "collections.list" => list(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
