//! CSV exporter: one RFC-4180 file per table.

use std::fs::File;
use std::path::Path;

use crate::engine::{GeneratedData, GeneratedTable};
use crate::errors::ExportError;
use crate::output::plain_text;

/// Write `<dir>/<TableName>.csv` for every table, header row included;
/// NULL becomes an empty field.
pub fn write_csv_dir(dir: &Path, data: &GeneratedData) -> Result<(), ExportError> {
    std::fs::create_dir_all(dir)?;
    for (table_name, table) in &data.tables {
        let path = dir.join(format!("{table_name}.csv"));
        write_table_csv(&path, table)?;
    }
    Ok(())
}

fn write_table_csv(path: &Path, table: &GeneratedTable) -> Result<(), ExportError> {
    let mut writer = ::csv::Writer::from_writer(File::create(path)?);
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        let record: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                row.get(column)
                    .map(plain_text)
                    .unwrap_or_default()
            })
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Row;
    use indexmap::IndexMap;
    use rowforge_core::Value;

    #[test]
    fn csv_files_have_headers_and_quoting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut row = Row::new();
        row.insert("id".to_string(), Value::Int(1));
        row.insert("note".to_string(), Value::Text("a,\"b\"".to_string()));
        row.insert("gone".to_string(), Value::Null);

        let mut tables = IndexMap::new();
        tables.insert(
            "Notes".to_string(),
            GeneratedTable {
                columns: vec!["id".to_string(), "note".to_string(), "gone".to_string()],
                rows: vec![row],
            },
        );
        write_csv_dir(dir.path(), &GeneratedData { tables }).expect("writes");

        let content = std::fs::read_to_string(dir.path().join("Notes.csv")).expect("reads");
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("id,note,gone"));
        assert_eq!(lines.next(), Some("1,\"a,\"\"b\"\"\","));
    }
}
