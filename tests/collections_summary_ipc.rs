mod common;

use chrono::{DateTime, Utc};
use common::{Sidecar, StubBackend};
use serde_json::json;

fn march_payments() -> serde_json::Value {
    json!({ "ok": true, "data": [
        { "id": 1, "amount": "1000", "status": "paid", "paymentType": "mensualidad", "dueDate": "2025-03-05" },
        { "id": 2, "amount": 500, "status": "paid", "paymentType": "inscripcion", "dueDate": "2025-03-01" },
        { "id": 3, "amount": 1000, "status": "pending", "paymentType": "mensualidad", "dueDate": "2025-03-10",
          "student": { "enrollment": "ENG007", "fullName": "Pedro Soto" } },
        { "id": 4, "amount": 250, "status": "paid", "dueDate": "2025-03-31" }
    ]})
}

#[test]
fn monthly_summary_combines_dashboard_and_payments() {
    let stub = StubBackend::start();
    stub.route(
        "GET",
        "/dashboard",
        200,
        json!({ "ok": true, "data": { "alumnos": 42, "ingresos": 1750, "pendientes": 1, "vencidas": 1 } }),
    );
    stub.route("GET", "/pagos", 200, march_payments());
    let mut sidecar = Sidecar::spawn(&stub.base_url);

    let out = sidecar.request_ok("collections.summary", json!({ "month": "2025-03" }));
    let summary = &out["summary"];
    assert_eq!(summary["month"], json!("2025-03"));
    assert_eq!(summary["totalStudents"], json!(42));
    assert_eq!(summary["activeStudents"], json!(42));
    assert_eq!(summary["expectedAmount"], json!(2750.0));
    assert_eq!(summary["collectedAmount"], json!(1750.0));
    assert_eq!(summary["collectionPercentage"], json!(63.64));
    assert_eq!(summary["collectionPercentageDisplay"], json!(63.64));
    assert_eq!(summary["overdueStudents"], json!(1));
    assert_eq!(out["degraded"], json!([]));

    let due: DateTime<Utc> = "2025-03-10T00:00:00Z".parse().expect("due date");
    let ms = (Utc::now() - due).num_milliseconds();
    let days = (ms + 86_400_000 - 1) / 86_400_000;
    let overdue = &out["overduePayments"][0];
    assert_eq!(overdue["id"], json!(3));
    assert_eq!(overdue["student"]["fullName"], json!("Pedro Soto"));
    assert_eq!(overdue["daysPastDue"], json!(days));
    assert_eq!(overdue["lateFeeAmount"], json!((days * 10) as f64));
    assert_eq!(summary["totalLateFees"], json!((days * 10) as f64));

    assert_eq!(
        out["paymentsByType"],
        json!([
            { "paymentType": "inscripcion", "amount": 500.0, "count": 1 },
            { "paymentType": "mensualidad", "amount": 1000.0, "count": 1 },
            { "paymentType": "unknown", "amount": 250.0, "count": 1 }
        ])
    );

    let pagos = &stub.requests_to("GET", "/pagos")[0];
    assert_eq!(pagos.query_value("from"), Some("2025-03-01"));
    assert_eq!(pagos.query_value("to"), Some("2025-03-31"));
}

#[test]
fn summary_degrades_to_zeros_when_backend_calls_fail() {
    let stub = StubBackend::start();
    let mut sidecar = Sidecar::spawn(&stub.base_url);

    let out = sidecar.request_ok("collections.summary", json!({ "month": "2024-02" }));
    let summary = &out["summary"];
    assert_eq!(summary["totalStudents"], json!(0));
    assert_eq!(summary["expectedAmount"], json!(0.0));
    assert_eq!(summary["collectionPercentage"], json!(0.0));
    assert_eq!(out["overduePayments"], json!([]));
    assert_eq!(out["degraded"].as_array().map(|d| d.len()), Some(2));

    let pagos = &stub.requests_to("GET", "/pagos")[0];
    assert_eq!(pagos.query_value("to"), Some("2024-02-29"));

    let bad = sidecar.request_err("collections.summary", json!({ "month": "marzo" }));
    assert_eq!(bad["code"], json!("bad_params"));
}

#[test]
fn collections_list_forwards_filters() {
    let stub = StubBackend::start();
    stub.route("GET", "/cobranza", 200, json!({ "data": [], "total": 0 }));
    let mut sidecar = Sidecar::spawn(&stub.base_url);

    sidecar.request_ok(
        "collections.list",
        json!({ "mes": 3, "anio": 2025, "page": 2, "pageSize": 50, "sortBy": "monto", "sortDir": "DESC" }),
    );
    let sent = &stub.requests_to("GET", "/cobranza")[0];
    assert_eq!(sent.query_value("mes"), Some("3"));
    assert_eq!(sent.query_value("anio"), Some("2025"));
    assert_eq!(sent.query_value("page"), Some("2"));
    assert_eq!(sent.query_value("pageSize"), Some("50"));
    assert_eq!(sent.query_value("sortBy"), Some("monto"));
    assert_eq!(sent.query_value("sortDir"), Some("desc"));
}
