//! Dynamic row decoding.
//!
//! Statements run over the text protocol, so every non-null value arrives
//! as text. Integers and floats become JSON numbers; everything else,
//! `DECIMAL` included, stays a string so no precision is lost.

use serde_json::{Number, Value};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use dmsprobe_core::error::StoreError;
use dmsprobe_core::types::Row;

pub fn decode_row(row: &MySqlRow) -> Result<Row, StoreError> {
    let mut decoded = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let raw = row.try_get_raw(index).map_err(|e| decode_error(name, e))?;
        if raw.is_null() {
            decoded.push(name, Value::Null);
            continue;
        }

        let text = match row.try_get_unchecked::<String, _>(index) {
            Ok(text) => text,
            // Binary columns that are not UTF-8.
            Err(_) => {
                let bytes = row
                    .try_get_unchecked::<Vec<u8>, _>(index)
                    .map_err(|e| decode_error(name, e))?;
                String::from_utf8_lossy(&bytes).into_owned()
            }
        };
        decoded.push(name, text_to_json(column.type_info().name(), text));
    }
    Ok(decoded)
}

/// Map a text-protocol value to JSON by its column type name.
pub fn text_to_json(type_name: &str, text: String) -> Value {
    let base = type_name.trim_end_matches(" UNSIGNED");
    match base {
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            if let Ok(n) = text.parse::<i64>() {
                Value::from(n)
            } else if let Ok(n) = text.parse::<u64>() {
                Value::from(n)
            } else {
                Value::String(text)
            }
        }
        "FLOAT" | "DOUBLE" => match text.parse::<f64>().ok().and_then(Number::from_f64) {
            Some(n) => Value::Number(n),
            None => Value::String(text),
        },
        _ => Value::String(text),
    }
}

fn decode_error(column: &str, error: sqlx::Error) -> StoreError {
    StoreError::Decode {
        column: column.to_owned(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn integers_become_numbers() {
        assert_eq!(text_to_json("BIGINT", "42".into()), json!(42));
        assert_eq!(text_to_json("TINYINT UNSIGNED", "30".into()), json!(30));
        assert_eq!(
            text_to_json("BIGINT UNSIGNED", "18446744073709551615".into()),
            json!(18446744073709551615u64)
        );
    }

    #[test]
    fn decimals_keep_their_text() {
        assert_eq!(text_to_json("DECIMAL", "1500.00".into()), json!("1500.00"));
    }

    #[test]
    fn floats_become_numbers() {
        assert_eq!(text_to_json("DOUBLE", "60.5".into()), json!(60.5));
    }

    #[test]
    fn other_types_stay_text() {
        assert_eq!(text_to_json("DATE", "1991-05-21".into()), json!("1991-05-21"));
        assert_eq!(text_to_json("ENUM", "red".into()), json!("red"));
    }
}
