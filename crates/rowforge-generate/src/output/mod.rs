//! Exporters for generated data: SQL INSERT batches, CSV, JSON.

use rowforge_core::Value;

pub mod csv;
pub mod json;
pub mod sql;

pub use self::csv::write_csv_dir;
pub use self::json::write_json_dir;
pub use self::sql::{sql_script, write_sql, write_sql_file};

/// SQL literal rendering: integers bare, decimals with their full
/// scale, strings single-quoted with `'` doubled, dates quoted
/// `'YYYY-MM-DD'`, NULL bare.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Decimal(v) => v.to_string(),
        Value::Text(v) => format!("'{}'", v.replace('\'', "''")),
        Value::Date(v) => format!("'{}'", v.format("%Y-%m-%d")),
        Value::Time(v) => format!("'{}'", v.format("%H:%M:%S")),
        Value::Timestamp(v) => format!("'{}'", v.format("%Y-%m-%d %H:%M:%S")),
    }
}

/// Unquoted rendering for CSV fields; NULL is the empty field.
pub fn plain_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Decimal(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        Value::Date(v) => v.format("%Y-%m-%d").to_string(),
        Value::Time(v) => v.format("%H:%M:%S").to_string(),
        Value::Timestamp(v) => v.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn sql_literals_are_escaped_and_typed() {
        assert_eq!(sql_literal(&Value::Null), "NULL");
        assert_eq!(sql_literal(&Value::Int(42)), "42");
        assert_eq!(
            sql_literal(&Value::Decimal(Decimal::new(1050, 2))),
            "10.50"
        );
        assert_eq!(
            sql_literal(&Value::Text("O'Brien".to_string())),
            "'O''Brien'"
        );
        assert_eq!(sql_literal(&Value::Bool(false)), "FALSE");
        assert_eq!(
            sql_literal(&Value::Date(
                chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
            )),
            "'2024-03-09'"
        );
    }

    #[test]
    fn csv_null_is_empty() {
        assert_eq!(plain_text(&Value::Null), "");
        assert_eq!(plain_text(&Value::Text("x,y".to_string())), "x,y");
    }
}
