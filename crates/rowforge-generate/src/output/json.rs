//! JSON exporter: one array-of-objects file per table.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Number, Value as JsonValue};

use rowforge_core::Value;

use crate::engine::{GeneratedData, GeneratedTable};
use crate::errors::ExportError;

/// Write `<dir>/<TableName>.json` for every table. NULL maps to JSON
/// `null`; decimals are emitted as strings to preserve scale.
pub fn write_json_dir(dir: &Path, data: &GeneratedData) -> Result<(), ExportError> {
    std::fs::create_dir_all(dir)?;
    for (table_name, table) in &data.tables {
        let path = dir.join(format!("{table_name}.json"));
        let mut writer = BufWriter::new(File::create(&path)?);
        let body = table_json(table);
        serde_json::to_writer_pretty(&mut writer, &body)?;
        writeln!(writer)?;
        writer.flush()?;
    }
    Ok(())
}

fn table_json(table: &GeneratedTable) -> JsonValue {
    let rows: Vec<JsonValue> = table
        .rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            for column in &table.columns {
                let value = row.get(column).unwrap_or(&Value::Null);
                object.insert(column.clone(), json_value(value));
            }
            JsonValue::Object(object)
        })
        .collect();
    JsonValue::Array(rows)
}

fn json_value(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(v) => JsonValue::Number(Number::from(*v)),
        Value::Decimal(v) => JsonValue::String(v.to_string()),
        Value::Text(v) => JsonValue::String(v.clone()),
        Value::Date(v) => JsonValue::String(v.format("%Y-%m-%d").to_string()),
        Value::Time(v) => JsonValue::String(v.format("%H:%M:%S").to_string()),
        Value::Timestamp(v) => JsonValue::String(v.format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Row;
    use indexmap::IndexMap;
    use rust_decimal::Decimal;

    #[test]
    fn decimals_become_strings_and_null_stays_null() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut row = Row::new();
        row.insert("price".to_string(), Value::Decimal(Decimal::new(999, 2)));
        row.insert("note".to_string(), Value::Null);

        let mut tables = IndexMap::new();
        tables.insert(
            "Items".to_string(),
            GeneratedTable {
                columns: vec!["price".to_string(), "note".to_string()],
                rows: vec![row],
            },
        );
        write_json_dir(dir.path(), &GeneratedData { tables }).expect("writes");

        let content = std::fs::read_to_string(dir.path().join("Items.json")).expect("reads");
        let parsed: serde_json::Value = serde_json::from_str(&content).expect("valid json");
        assert_eq!(parsed[0]["price"], serde_json::json!("9.99"));
        assert!(parsed[0]["note"].is_null());
    }
}
