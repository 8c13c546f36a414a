use serde_json::{Map, Value};
use sqlx::{mysql::MySqlRow, Column, Row, TypeInfo, ValueRef};
use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

/// Converts a row of unknown shape into a JSON object keyed by column name.
pub fn row_to_json(row: &MySqlRow) -> Map<String, Value> {
    let mut obj = Map::with_capacity(row.columns().len());
    for (idx, col) in row.columns().iter().enumerate() {
        obj.insert(col.name().to_string(), column_value(row, idx));
    }
    obj
}

fn column_value(row: &MySqlRow, idx: usize) -> Value {
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let typed = match type_name.as_str() {
        "BOOLEAN" => row.try_get::<bool, _>(idx).ok().map(Value::from),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<i64, _>(idx).ok().map(Value::from)
        }
        n if n.ends_with(" UNSIGNED") => row.try_get::<u64, _>(idx).ok().map(Value::from),
        "FLOAT" => row.try_get::<f32, _>(idx).ok().map(|v| Value::from(f64::from(v))),
        "DOUBLE" => row.try_get::<f64, _>(idx).ok().map(Value::from),
        "JSON" => row.try_get::<Value, _>(idx).ok(),
        "TIMESTAMP" => row
            .try_get::<OffsetDateTime, _>(idx)
            .ok()
            .and_then(|v| v.format(&Rfc3339).ok())
            .map(Value::from),
        "DATETIME" => row
            .try_get::<PrimitiveDateTime, _>(idx)
            .ok()
            .and_then(|v| v.assume_utc().format(&Rfc3339).ok())
            .map(Value::from),
        "DATE" => row
            .try_get::<time::Date, _>(idx)
            .ok()
            .map(|v| Value::from(v.to_string())),
        "TIME" => row
            .try_get::<time::Time, _>(idx)
            .ok()
            .map(|v| Value::from(v.to_string())),
        _ => None,
    };

    typed.unwrap_or_else(|| text_value(row, idx))
}

// DECIMAL, ENUM, SET and the char/binary families all arrive as bytes.
fn text_value(row: &MySqlRow, idx: usize) -> Value {
    if let Ok(s) = row.try_get_unchecked::<String, _>(idx) {
        return Value::from(s);
    }
    match row.try_get_unchecked::<Vec<u8>, _>(idx) {
        Ok(bytes) => Value::from(String::from_utf8_lossy(&bytes).into_owned()),
        Err(_) => Value::Null,
    }
}
