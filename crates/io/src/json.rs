// JSON loading: an array of flat objects, one per record.

use std::path::Path;

use qcdiff_validate::{Record, Value};

use crate::csv::read_file_as_utf8;
use crate::error::LoadError;

pub fn load_records(path: &Path) -> Result<Vec<Record>, LoadError> {
    let content = read_file_as_utf8(path)?;
    parse_records(&content).map_err(|message| LoadError::parse(&path.display().to_string(), message))
}

/// `null` is a missing value; a key that is not in the object is an
/// absent field. Booleans are kept as text. Nested arrays and objects are
/// rejected.
pub fn parse_records(content: &str) -> Result<Vec<Record>, String> {
    let root: serde_json::Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let rows = root
        .as_array()
        .ok_or_else(|| "expected a JSON array of objects".to_string())?;

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let obj = row
                .as_object()
                .ok_or_else(|| format!("row {index}: expected an object"))?;
            obj.iter()
                .map(|(key, v)| {
                    let value = to_value(v).ok_or_else(|| {
                        format!("row {index}, key '{key}': nested values are not supported")
                    })?;
                    Ok((key.clone(), value))
                })
                .collect::<Result<Record, String>>()
        })
        .collect()
}

fn to_value(v: &serde_json::Value) -> Option<Value> {
    match v {
        serde_json::Value::Null => Some(Value::Missing),
        serde_json::Value::Bool(b) => Some(Value::Text(b.to_string())),
        serde_json::Value::Number(n) => n.as_f64().map(Value::Number),
        serde_json::Value::String(s) => Some(Value::Text(s.clone())),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}
