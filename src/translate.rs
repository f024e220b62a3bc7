//! Field-name translation between the console's vocabulary (English,
//! camelCase) and the backend's (Spanish, snake_case), plus query building.

use crate::backend::Query;
use crate::calc;
use chrono::NaiveDate;
use serde_json::{json, Map, Value};

pub const FORMAS_PAGO: &[&str] = &[
    "efectivo",
    "transferencia",
    "tarjeta_debito",
    "tarjeta_credito",
    "cheque",
    "otro",
];

pub const REPORT_TYPES: &[&str] = &["monthly", "student", "plan", "collections", "overdue"];

/// String form of a scalar param; blank strings and nulls are absent.
pub fn param_str(params: &Value, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// JS-style truthiness for required-field checks (`0`, `""`, `false`, null are missing).
pub fn is_truthy(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|x| x != 0.0 && !x.is_nan()).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn push(q: &mut Query, key: &str, value: impl Into<String>) {
    q.push((key.to_string(), value.into()));
}

fn push_opt(q: &mut Query, params: &Value, from: &str, to: &str) {
    if let Some(v) = param_str(params, from) {
        push(q, to, v);
    }
}

// ---------------------------------------------------------------- students

pub fn students_list_query(params: &Value) -> Query {
    let mut q = Query::new();
    push(&mut q, "page", param_str(params, "page").unwrap_or_else(|| "1".into()));
    push(&mut q, "limit", param_str(params, "limit").unwrap_or_else(|| "10".into()));
    push_opt(&mut q, params, "search", "search");
    match param_str(params, "status").as_deref() {
        None | Some("all") => {}
        Some("active") => push(&mut q, "estatus", "activo"),
        Some(_) => push(&mut q, "estatus", "baja"),
    }
    push_opt(&mut q, params, "sortBy", "sortBy");
    push_opt(&mut q, params, "sortOrder", "sortOrder");
    q
}

const STUDENT_BACKEND_FIELDS: &[&str] = &[
    "matricula",
    "nombre",
    "apellido_paterno",
    "apellido_materno",
    "telefono",
    "email",
    "fecha_inscripcion",
    "fecha_inicio",
    "fecha_vigencia",
    "estatus",
    "plan_id",
];

/// Backend payload for POST/PUT `/alumnos`. Defaults only apply on create.
pub fn student_payload(params: &Value, creating: bool, today: NaiveDate) -> Map<String, Value> {
    let mut out = Map::new();
    for key in STUDENT_BACKEND_FIELDS {
        if let Some(v) = params.get(*key).filter(|v| !v.is_null()) {
            out.insert(key.to_string(), v.clone());
        }
    }

    for (from, to) in [
        ("name", "nombre"),
        ("lastName", "apellido_paterno"),
        ("email", "email"),
        ("phone", "telefono"),
    ] {
        if let Some(v) = param_str(params, from) {
            out.insert(to.to_string(), json!(v));
        }
    }
    if is_truthy(params.get("planId")) {
        let n = calc::number_of(params.get("planId"));
        if n > 0.0 {
            out.insert("plan_id".into(), json!(n as i64));
        }
    }
    if let Some(active) = params.get("status").and_then(|v| v.as_bool()) {
        out.insert(
            "estatus".into(),
            json!(if active { "activo" } else { "baja" }),
        );
    }

    if creating {
        let today = today.format("%Y-%m-%d").to_string();
        out.entry("fecha_inscripcion").or_insert_with(|| json!(today));
        out.entry("fecha_inicio").or_insert_with(|| json!(today));
        out.entry("estatus").or_insert_with(|| json!("activo"));
    }
    out
}

pub fn student_status_label(estatus: &str) -> &'static str {
    match estatus {
        "activo" => "Activo",
        "baja" => "Baja",
        "graduado" => "Graduado",
        "saldo_pendiente" => "Saldo pendiente",
        _ => "Suspendido",
    }
}

pub fn student_full_name(row: &Value) -> String {
    let part = |k: &str| row.get(k).and_then(|v| v.as_str()).unwrap_or("").trim();
    [part("nombre"), part("apellido_paterno"), part("apellido_materno")]
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Attach `nombreCompleto` and `estatusLabel` to every listed student.
pub fn decorate_students(body: &mut Value) {
    let Some(rows) = body.get_mut("data").and_then(|d| d.as_array_mut()) else {
        return;
    };
    for row in rows.iter_mut() {
        let name = student_full_name(row);
        let label = row
            .get("estatus")
            .and_then(|v| v.as_str())
            .map(student_status_label);
        if let Some(obj) = row.as_object_mut() {
            obj.insert("nombreCompleto".into(), json!(name));
            if let Some(label) = label {
                obj.insert("estatusLabel".into(), json!(label));
            }
        }
    }
}

// ---------------------------------------------------------------- plans

/// Number of students across a plan's memberships.
pub fn plan_total_students(plan: &Value) -> usize {
    plan.get("memberships")
        .and_then(|m| m.as_array())
        .map(|ms| {
            ms.iter()
                .map(|m| {
                    m.get("students")
                        .and_then(|s| s.as_array())
                        .map(|s| s.len())
                        .unwrap_or(0)
                })
                .sum()
        })
        .unwrap_or(0)
}

/// Accepts a bare array or `{data: [...]}` and adds `totalStudents` to each plan.
pub fn plans_with_totals(raw: &Value) -> Vec<Value> {
    let items = match raw {
        Value::Array(a) => a.clone(),
        other => other
            .get("data")
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default(),
    };
    items
        .into_iter()
        .map(|mut plan| {
            let total = plan_total_students(&plan);
            if let Some(obj) = plan.as_object_mut() {
                obj.insert("totalStudents".into(), json!(total));
            }
            plan
        })
        .collect()
}

/// Rewrites the console's English plan fields onto the form's Spanish names.
/// On create, an English payload must carry every required field and gets the
/// 12/4 month defaults; updates only rename what was sent.
pub fn plan_form_input(params: &Value, creating: bool) -> Result<Map<String, Value>, String> {
    let mut out: Map<String, Value> = params.as_object().cloned().unwrap_or_default();
    out.remove("id");
    out.remove("authorization");

    let english = params.get("name").is_some();
    if english && creating {
        let required = ["name", "monthlyPayments", "monthlyAmount", "inscriptionFee"];
        if required.iter().any(|k| !is_truthy(params.get(*k))) {
            return Err("Todos los campos son requeridos".to_string());
        }
        out.entry("validityMonths").or_insert(json!(12));
        out.entry("extensionMonths").or_insert(json!(4));
    }

    for (from, to) in [
        ("name", "nombre"),
        ("description", "descripcion"),
        ("monthlyPayments", "numero_mensualidades"),
        ("monthlyAmount", "precio_mensualidad"),
        ("inscriptionFee", "precio_inscripcion"),
        ("validityMonths", "vigencia_meses"),
        ("extensionMonths", "extension_meses"),
        ("active", "activo"),
    ] {
        if let Some(v) = out.remove(from) {
            out.insert(to.to_string(), v);
        }
    }
    // The console sends a site id the backend schema does not have.
    out.remove("siteId");
    Ok(out)
}

// ---------------------------------------------------------------- payments

pub fn normalize_forma_pago(raw: &str) -> &'static str {
    FORMAS_PAGO
        .iter()
        .find(|f| **f == raw)
        .copied()
        .unwrap_or("otro")
}

/// Overdue rows must be judged over every pending payment, so no paging.
pub fn payments_overdue_query(params: &Value) -> Query {
    let mut q = Query::new();
    push(&mut q, "status", "pending");
    for k in ["studentId", "startDate", "endDate"] {
        push_opt(&mut q, params, k, k);
    }
    q
}

/// Proxy vocabulary for `/api/payments` lists.
pub fn payments_list_query(params: &Value) -> Query {
    let mut q = Query::new();
    push(&mut q, "page", param_str(params, "page").unwrap_or_else(|| "1".into()));
    push(&mut q, "limit", param_str(params, "limit").unwrap_or_else(|| "10".into()));
    for k in ["studentId", "status", "startDate", "endDate"] {
        push_opt(&mut q, params, k, k);
    }
    q
}

/// Filter normalization used by the payments table.
pub fn payments_search_query(params: &Value) -> Query {
    let mut q = Query::new();
    push_opt(&mut q, params, "alumno", "alumno");
    if is_truthy(params.get("alumno_id")) {
        push_opt(&mut q, params, "alumno_id", "alumno_id");
    }
    if let Some(f) = param_str(params, "forma_pago") {
        push(&mut q, "forma_pago", normalize_forma_pago(&f));
    }
    for k in ["estatus", "fecha_ini", "fecha_fin", "sortBy"] {
        push_opt(&mut q, params, k, k);
    }
    let dir = param_str(params, "sortDir")
        .unwrap_or_else(|| "desc".into())
        .to_ascii_lowercase();
    push(&mut q, "sortDir", if dir == "asc" { "asc" } else { "desc" });
    push(&mut q, "page", positive_or(params, "page", 1));
    push(&mut q, "pageSize", positive_or(params, "pageSize", 20));
    q
}

fn positive_or(params: &Value, key: &str, default: i64) -> String {
    let n = calc::number_of(params.get(key));
    if n.is_finite() && n >= 1.0 {
        (n as i64).to_string()
    } else {
        default.to_string()
    }
}

/// True when a payment create lacks any of student, amount, method, type.
pub fn payment_missing_required(params: &Value) -> bool {
    let either = |a: &str, b: &str| is_truthy(params.get(a)) || is_truthy(params.get(b));
    !(either("studentId", "alumno_id")
        && either("amount", "monto")
        && either("paymentMethod", "forma_pago")
        && either("paymentType", "tipo_pago"))
}

/// Backend payload for POST `/pagos`.
pub fn payment_payload(params: &Value) -> Map<String, Value> {
    let mut out: Map<String, Value> = params.as_object().cloned().unwrap_or_default();
    out.remove("authorization");
    for (from, to) in [
        ("studentId", "alumno_id"),
        ("installmentId", "mensualidad_id"),
        ("amount", "monto"),
        ("discount", "descuento"),
        ("lateFee", "moratorio"),
        ("paymentMethod", "forma_pago"),
        ("paymentType", "tipo_pago"),
        ("paymentDate", "fecha_pago"),
        ("dueDate", "fecha_vencimiento"),
        ("concept", "concepto"),
        ("reference", "referencia"),
        ("bank", "banco"),
        ("notes", "observaciones"),
        ("receiptUrl", "comprobante_url"),
    ] {
        if let Some(v) = out.remove(from) {
            out.insert(to.to_string(), v);
        }
    }

    let forma = out
        .get("forma_pago")
        .and_then(|v| v.as_str())
        .map(normalize_forma_pago);
    if let Some(forma) = forma {
        out.insert("forma_pago".into(), json!(forma));
    }

    let tipo = out
        .get("tipo_pago")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    if tipo != "mensualidad" {
        out.insert("mensualidad_id".into(), Value::Null);
    }
    let concepto_blank = out
        .get("concepto")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().is_empty())
        .unwrap_or(true);
    if concepto_blank {
        let default = if tipo == "mensualidad" {
            "Pago de mensualidad"
        } else {
            "Pago"
        };
        out.insert("concepto".into(), json!(default));
    }
    out
}

/// `/pagos/ajuste` rejects `tipo_pago` and `mensualidad_id`.
pub fn adjustment_payload(params: &Value) -> Map<String, Value> {
    let mut out = payment_payload(params);
    out.remove("tipo_pago");
    out.remove("mensualidad_id");
    out
}

// ---------------------------------------------------------------- reports & collections

pub fn report_query(params: &Value) -> Result<Query, String> {
    let report_type = param_str(params, "type").unwrap_or_else(|| "monthly".into());
    if !REPORT_TYPES.contains(&report_type.as_str()) {
        return Err("Tipo de reporte no válido".to_string());
    }
    let mut q = Query::new();
    push(&mut q, "type", report_type.as_str());
    let keys: &[&str] = match report_type.as_str() {
        "monthly" | "collections" => &["startDate", "endDate"],
        "student" => &["status"],
        _ => &[],
    };
    for k in keys {
        push_opt(&mut q, params, k, k);
    }
    Ok(q)
}

pub fn report_range_query(params: &Value, with_filters: bool) -> Query {
    let mut q = Query::new();
    push_opt(&mut q, params, "fecha_desde", "fecha_desde");
    push_opt(&mut q, params, "fecha_hasta", "fecha_hasta");
    if with_filters {
        push_opt(&mut q, params, "estatus", "estatus");
        push_opt(&mut q, params, "plan_id", "plan_id");
    }
    q
}

pub fn collections_list_query(params: &Value) -> Query {
    let mut q = Query::new();
    for k in ["mes", "anio", "page", "pageSize"] {
        push_opt(&mut q, params, k, k);
    }
    if let Some(s) = param_str(params, "sortBy") {
        if ["vencimiento", "alumno", "monto"].contains(&s.as_str()) {
            push(&mut q, "sortBy", s);
        }
    }
    if let Some(d) = param_str(params, "sortDir") {
        let d = d.to_ascii_lowercase();
        push(&mut q, "sortDir", if d == "asc" { "asc" } else { "desc" });
    }
    q
}

pub fn dashboard_query(params: &Value) -> Query {
    let mut q = Query::new();
    push_opt(&mut q, params, "month", "month");
    push_opt(&mut q, params, "year", "year");
    q
}
