use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Moratorio rate: 1% of the installment amount per day past due.
pub const LATE_FEE_DAILY_RATE: f64 = 0.01;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Half-up rounding to cents: `floor(100*x + 0.5) / 100`.
pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

/// Whole days past due, rounded up, never negative.
pub fn days_past_due(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let ms = (now - due).num_milliseconds();
    if ms <= 0 {
        return 0;
    }
    (ms + MS_PER_DAY - 1) / MS_PER_DAY
}

pub fn late_fee(amount: f64, days_past_due: i64) -> f64 {
    if days_past_due <= 0 || !amount.is_finite() || amount <= 0.0 {
        return 0.0;
    }
    amount * LATE_FEE_DAILY_RATE * days_past_due as f64
}

/// `collected / expected * 100` rounded to cents; 0 when nothing is expected.
/// The raw value may exceed 100 (overpayment, early payments).
pub fn collection_percentage(collected: f64, expected: f64) -> f64 {
    if !(expected > 0.0) {
        return 0.0;
    }
    round_off_2_decimals(collected / expected * 100.0)
}

/// Percentage clamped for progress bars and badges.
pub fn display_percentage(raw: f64) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 100.0)
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` and bare `YYYY-MM-DD` (UTC midnight).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Pending,
    Other,
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "paid" | "pagado" | "pagada" => PaymentStatus::Paid,
            "pending" | "pendiente" | "vencido" | "vencida" => PaymentStatus::Pending,
            _ => PaymentStatus::Other,
        }
    }
}

/// A payment row as seen by the collection arithmetic. Accepts both the
/// English proxy shape (`amount`, `status`, `dueDate`) and the backend's
/// Spanish shape (`monto`, `estatus`, `fecha_vencimiento`).
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub amount: f64,
    pub status: PaymentStatus,
    pub payment_type: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub raw: Value,
}

fn first_field<'a>(v: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| v.get(*k)).find(|x| !x.is_null())
}

pub fn number_of(v: Option<&Value>) -> f64 {
    match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

impl PaymentRecord {
    pub fn from_json(v: &Value) -> Option<Self> {
        if !v.is_object() {
            return None;
        }
        let amount = number_of(first_field(v, &["amount", "monto"]));
        let status = first_field(v, &["status", "estatus"])
            .and_then(|s| s.as_str())
            .map(PaymentStatus::parse)
            .unwrap_or(PaymentStatus::Other);
        let payment_type = first_field(v, &["paymentType", "tipo_pago"])
            .and_then(|s| s.as_str())
            .map(|s| s.to_string());
        let due_date = first_field(v, &["dueDate", "fecha_vencimiento"])
            .and_then(|s| s.as_str())
            .and_then(parse_date);
        Some(Self {
            amount,
            status,
            payment_type,
            due_date,
            raw: v.clone(),
        })
    }

    pub fn from_rows(rows: &[Value]) -> Vec<Self> {
        rows.iter().filter_map(Self::from_json).collect()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Pending && self.due_date.map(|d| d < now).unwrap_or(false)
    }
}

#[derive(Debug, Default)]
pub struct StatusPartition<'a> {
    pub paid: Vec<&'a PaymentRecord>,
    pub pending: Vec<&'a PaymentRecord>,
    pub other: Vec<&'a PaymentRecord>,
}

pub fn partition_by_status(payments: &[PaymentRecord]) -> StatusPartition<'_> {
    let mut out = StatusPartition::default();
    for p in payments {
        match p.status {
            PaymentStatus::Paid => out.paid.push(p),
            PaymentStatus::Pending => out.pending.push(p),
            PaymentStatus::Other => out.other.push(p),
        }
    }
    out
}

/// Copy of the row with `daysPastDue`, `lateFeeAmount` and `totalAmount` attached.
pub fn with_late_fee(p: &PaymentRecord, now: DateTime<Utc>) -> Value {
    let days = p.due_date.map(|d| days_past_due(d, now)).unwrap_or(0);
    let fee = late_fee(p.amount, days);
    let mut row = p.raw.clone();
    if let Some(obj) = row.as_object_mut() {
        obj.insert("daysPastDue".into(), json!(days));
        obj.insert("lateFeeAmount".into(), json!(round_off_2_decimals(fee)));
        obj.insert(
            "totalAmount".into(),
            json!(round_off_2_decimals(p.amount + fee)),
        );
    }
    row
}

pub fn overdue_with_late_fees(payments: &[PaymentRecord], now: DateTime<Utc>) -> Vec<Value> {
    let mut overdue: Vec<&PaymentRecord> = payments.iter().filter(|p| p.is_overdue(now)).collect();
    // Oldest debt first.
    overdue.sort_by_key(|p| p.due_date);
    overdue.into_iter().map(|p| with_late_fee(p, now)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthRange {
    pub month: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MonthRange {
    /// `YYYY-MM`
    pub fn parse(raw: &str) -> Option<Self> {
        let start = NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d").ok()?;
        Self::from_start(start)
    }

    pub fn containing(now: DateTime<Utc>) -> Self {
        let d = now.date_naive();
        let start = NaiveDate::from_ymd_opt(d.year(), d.month(), 1).unwrap_or(d);
        Self::from_start(start).unwrap_or(MonthRange {
            month: d.format("%Y-%m").to_string(),
            start: d,
            end: d,
        })
    }

    fn from_start(start: NaiveDate) -> Option<Self> {
        let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
        Some(Self {
            month: start.format("%Y-%m").to_string(),
            start,
            end,
        })
    }

    /// Inclusive of the whole last day.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let d = at.date_naive();
        d >= self.start && d <= self.end
    }

    pub fn from_param(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn to_param(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StudentTotals {
    pub total_students: i64,
    pub active_students: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub month: String,
    pub total_students: i64,
    pub active_students: i64,
    pub expected_amount: f64,
    pub collected_amount: f64,
    pub collection_percentage: f64,
    pub collection_percentage_display: f64,
    pub overdue_students: usize,
    pub total_late_fees: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeTotal {
    pub payment_type: String,
    pub amount: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionsReport {
    pub summary: CollectionSummary,
    pub overdue_payments: Vec<Value>,
    pub payments_by_type: Vec<TypeTotal>,
}

pub fn summarize_collections(
    range: &MonthRange,
    payments: &[PaymentRecord],
    totals: StudentTotals,
    now: DateTime<Utc>,
) -> CollectionsReport {
    let parts = partition_by_status(payments);
    let expected_amount: f64 = payments.iter().map(|p| p.amount).sum();
    let collected_amount: f64 = parts.paid.iter().map(|p| p.amount).sum();
    let pct = collection_percentage(collected_amount, expected_amount);

    let overdue = overdue_with_late_fees(payments, now);
    let total_late_fees: f64 = overdue
        .iter()
        .map(|r| number_of(r.get("lateFeeAmount")))
        .sum();

    let mut by_type: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for p in &parts.paid {
        let in_range = p.due_date.map(|d| range.contains(d)).unwrap_or(false);
        if !in_range {
            continue;
        }
        let key = p
            .payment_type
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let e = by_type.entry(key).or_insert((0.0, 0));
        e.0 += p.amount;
        e.1 += 1;
    }

    CollectionsReport {
        summary: CollectionSummary {
            month: range.month.clone(),
            total_students: totals.total_students,
            active_students: totals.active_students,
            expected_amount: round_off_2_decimals(expected_amount),
            collected_amount: round_off_2_decimals(collected_amount),
            collection_percentage: pct,
            collection_percentage_display: display_percentage(pct),
            overdue_students: overdue.len(),
            total_late_fees: round_off_2_decimals(total_late_fees),
        },
        overdue_payments: overdue,
        payments_by_type: by_type
            .into_iter()
            .map(|(payment_type, (amount, count))| TypeTotal {
                payment_type,
                amount: round_off_2_decimals(amount),
                count,
            })
            .collect(),
    }
}
