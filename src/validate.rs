use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const REQUIRED: &str = "Requerido";
pub const AT_LEAST_ONE: &str = "Debe ser >= 1";
pub const AT_LEAST_ZERO: &str = "Debe ser >= 0";
pub const INVALID_NUMBER: &str = "Número inválido";

/// Field name -> message, ordered so responses are stable.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        self.0.insert(field.to_string(), message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Numeric coercion with the form's semantics: blank strings and null are 0,
/// anything unparseable is NaN.
pub fn coerce_number(v: &Value) -> f64 {
    match v {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                0.0
            } else {
                t.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        _ => f64::NAN,
    }
}

fn number_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

fn text_of(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn truthy_flag(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|x| x != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim(), "1" | "true" | "si" | "sí"),
        _ => false,
    }
}

/// `(field, default, lower bound, message)` for the plan form's numbers.
const PLAN_NUMBERS: &[(&str, &str, f64, &str)] = &[
    ("numero_mensualidades", "1", 1.0, AT_LEAST_ONE),
    ("precio_mensualidad", "0", 0.0, INVALID_NUMBER),
    ("precio_inscripcion", "0", 0.0, INVALID_NUMBER),
    ("vigencia_meses", "12", 1.0, AT_LEAST_ONE),
    ("extension_meses", "4", 0.0, AT_LEAST_ZERO),
];

/// Validate and normalize a plan payload.
///
/// On create, absent fields take the blank form's defaults. On update only the
/// fields present are checked and sent.
pub fn plan(input: &Map<String, Value>, creating: bool) -> Result<Map<String, Value>, FieldErrors> {
    let mut errors = FieldErrors::default();
    let mut out = Map::new();

    if creating || input.contains_key("nombre") {
        let nombre = text_of(input.get("nombre"));
        if nombre.is_empty() {
            errors.add("nombre", REQUIRED);
        }
        out.insert("nombre".into(), json!(nombre));
    }

    if creating || input.contains_key("descripcion") {
        let d = text_of(input.get("descripcion"));
        out.insert(
            "descripcion".into(),
            if d.is_empty() { Value::Null } else { json!(d) },
        );
    }

    for (field, default, min, message) in PLAN_NUMBERS {
        let raw = match input.get(*field) {
            Some(v) => v.clone(),
            None if creating => json!(default),
            None => continue,
        };
        let n = coerce_number(&raw);
        if !n.is_finite() || n < *min {
            errors.add(field, message);
            continue;
        }
        out.insert(field.to_string(), number_json(n));
    }

    match input.get("activo") {
        Some(v) => {
            out.insert("activo".into(), json!(if truthy_flag(v) { 1 } else { 0 }));
        }
        None if creating => {
            out.insert("activo".into(), json!(1));
        }
        None => {}
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}

/// A new student needs a name once the console fields are translated.
pub fn student(payload: &Map<String, Value>) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    if text_of(payload.get("nombre")).is_empty() {
        errors.add("nombre", REQUIRED);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks a translated payment payload. Adjustments may carry negative amounts.
pub fn payment(payload: &Map<String, Value>, adjustment: bool) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    let alumno = payload.get("alumno_id").map(coerce_number).unwrap_or(0.0);
    if !alumno.is_finite() || alumno < 1.0 {
        errors.add("alumno_id", REQUIRED);
    }
    match payload.get("monto").map(coerce_number) {
        None => errors.add("monto", REQUIRED),
        Some(m) if !m.is_finite() => errors.add("monto", INVALID_NUMBER),
        Some(m) if !adjustment && m < 0.0 => errors.add("monto", AT_LEAST_ZERO),
        Some(_) => {}
    }
    if let Some(d) = payload.get("descuento").map(coerce_number) {
        if !d.is_finite() || d < 0.0 {
            errors.add("descuento", AT_LEAST_ZERO);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
