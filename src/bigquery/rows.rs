//! Decoding of BigQuery REST row payloads.
//!
//! The REST API returns rows as `{"f": [{"v": ...}, ...]}` with every scalar
//! encoded as a string; the schema is needed to recover names and types.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Number, Value};

/// Result or table schema.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

/// One column of a schema.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl FieldSchema {
    fn is_repeated(&self) -> bool {
        self.mode
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("REPEATED"))
    }
}

/// Decode REST rows into JSON objects keyed by column name.
pub fn decode_rows(schema: &TableSchema, rows: &[Value]) -> Vec<Map<String, Value>> {
    rows.iter()
        .map(|row| match decode_record(&schema.fields, row) {
            Value::Object(map) => map,
            _ => Map::new(),
        })
        .collect()
}

fn decode_record(fields: &[FieldSchema], row: &Value) -> Value {
    let cells = row.get("f").and_then(|f| f.as_array());
    let mut object = Map::new();
    for (i, field) in fields.iter().enumerate() {
        let raw = cells
            .and_then(|c| c.get(i))
            .and_then(|cell| cell.get("v"))
            .unwrap_or(&Value::Null);
        object.insert(field.name.clone(), decode_cell(field, raw));
    }
    Value::Object(object)
}

fn decode_cell(field: &FieldSchema, raw: &Value) -> Value {
    if raw.is_null() {
        return Value::Null;
    }
    if field.is_repeated() {
        let items = raw.as_array().map(Vec::as_slice).unwrap_or(&[]);
        return Value::Array(
            items
                .iter()
                .map(|item| decode_single(field, item.get("v").unwrap_or(&Value::Null)))
                .collect(),
        );
    }
    decode_single(field, raw)
}

fn decode_single(field: &FieldSchema, raw: &Value) -> Value {
    if raw.is_null() {
        return Value::Null;
    }
    let text = raw.as_str();

    match field.field_type.to_ascii_uppercase().as_str() {
        "RECORD" | "STRUCT" => decode_record(&field.fields, raw),
        "INTEGER" | "INT64" => text
            .and_then(|s| s.parse::<i64>().ok())
            .map(|n| Value::Number(n.into()))
            .unwrap_or_else(|| raw.clone()),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => text
            .and_then(|s| s.parse::<f64>().ok())
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| raw.clone()),
        "BOOLEAN" | "BOOL" => match text {
            Some(s) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
            Some(s) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
            _ => raw.clone(),
        },
        "TIMESTAMP" => text
            .and_then(epoch_to_rfc3339)
            .map(Value::String)
            .unwrap_or_else(|| raw.clone()),
        _ => raw.clone(),
    }
}

/// TIMESTAMP cells arrive as fractional epoch seconds (e.g. `1.7040672E9`).
fn epoch_to_rfc3339(text: &str) -> Option<String> {
    let seconds = text.parse::<f64>().ok()?;
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::<Utc>::from_timestamp(whole as i64, nanos.min(999_999_999)).map(|dt| dt.to_rfc3339())
}
