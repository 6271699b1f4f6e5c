//! SQL INSERT exporter.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rowforge_core::Value;

use crate::engine::{GeneratedData, GeneratedTable};
use crate::errors::ExportError;
use crate::output::sql_literal;

/// Rows per INSERT statement.
const MAX_BATCH_ROWS: usize = 1000;
/// Payload bytes per INSERT statement; flushed at whichever limit hits
/// first.
const MAX_BATCH_BYTES: usize = 1024 * 1024;

/// Write the whole run as one SQL script. Tables appear in generation
/// (topological) order; the script ends with a trailing newline.
pub fn write_sql<W: Write>(out: &mut W, data: &GeneratedData) -> Result<(), ExportError> {
    for (table_name, table) in &data.tables {
        write_table(out, table_name, table)?;
    }
    Ok(())
}

/// Write the SQL script to a file.
pub fn write_sql_file(path: &Path, data: &GeneratedData) -> Result<(), ExportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_sql(&mut writer, data)?;
    writer.flush()?;
    Ok(())
}

/// Render the SQL script in memory.
pub fn sql_script(data: &GeneratedData) -> String {
    let mut out = Vec::new();
    write_sql(&mut out, data).expect("in-memory write cannot fail");
    String::from_utf8(out).expect("sql output is utf-8")
}

fn write_table<W: Write>(
    out: &mut W,
    table_name: &str,
    table: &GeneratedTable,
) -> Result<(), ExportError> {
    if table.rows.is_empty() {
        return Ok(());
    }
    let prefix = format!(
        "INSERT INTO {} ({}) VALUES",
        table_name,
        table.columns.join(", ")
    );

    let mut batch: Vec<String> = Vec::new();
    let mut batch_bytes = prefix.len();
    for row in &table.rows {
        let tuple = render_tuple(row, &table.columns);
        let would_be = batch_bytes + tuple.len() + 2;
        if !batch.is_empty() && (batch.len() >= MAX_BATCH_ROWS || would_be > MAX_BATCH_BYTES) {
            flush_batch(out, &prefix, &batch)?;
            batch.clear();
            batch_bytes = prefix.len();
        }
        batch_bytes += tuple.len() + 2;
        batch.push(tuple);
    }
    if !batch.is_empty() {
        flush_batch(out, &prefix, &batch)?;
    }
    Ok(())
}

fn render_tuple(row: &crate::eval::Row, columns: &[String]) -> String {
    let values: Vec<String> = columns
        .iter()
        .map(|column| sql_literal(row.get(column).unwrap_or(&Value::Null)))
        .collect();
    format!("({})", values.join(", "))
}

fn flush_batch<W: Write>(out: &mut W, prefix: &str, batch: &[String]) -> Result<(), ExportError> {
    writeln!(out, "{prefix}")?;
    for (idx, tuple) in batch.iter().enumerate() {
        let terminator = if idx + 1 == batch.len() { ";" } else { "," };
        writeln!(out, "{tuple}{terminator}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Row;
    use indexmap::IndexMap;

    fn table_of(rows: Vec<Vec<(&str, Value)>>) -> GeneratedTable {
        let columns: Vec<String> = rows
            .first()
            .map(|row| row.iter().map(|(name, _)| name.to_string()).collect())
            .unwrap_or_default();
        GeneratedTable {
            columns,
            rows: rows
                .into_iter()
                .map(|pairs| {
                    pairs
                        .into_iter()
                        .map(|(name, value)| (name.to_string(), value))
                        .collect::<Row>()
                })
                .collect(),
        }
    }

    #[test]
    fn emits_insert_with_all_rows() {
        let mut tables = IndexMap::new();
        tables.insert(
            "t".to_string(),
            table_of(vec![
                vec![("id", Value::Int(1)), ("name", Value::Text("a".into()))],
                vec![("id", Value::Int(2)), ("name", Value::Null)],
            ]),
        );
        let script = sql_script(&GeneratedData { tables });
        assert!(script.starts_with("INSERT INTO t (id, name) VALUES\n"));
        assert!(script.contains("(1, 'a'),\n"));
        assert!(script.contains("(2, NULL);\n"));
        assert!(script.ends_with('\n'));
    }

    #[test]
    fn batches_split_after_thousand_rows() {
        let rows: Vec<Vec<(&str, Value)>> = (0..1500)
            .map(|i| vec![("id", Value::Int(i))])
            .collect();
        let mut tables = IndexMap::new();
        tables.insert("t".to_string(), table_of(rows));
        let script = sql_script(&GeneratedData { tables });
        let statements = script.matches("INSERT INTO t").count();
        assert_eq!(statements, 2);
        assert_eq!(script.matches(';').count(), 2);
    }

    #[test]
    fn empty_tables_emit_nothing() {
        let mut tables = IndexMap::new();
        tables.insert(
            "empty".to_string(),
            GeneratedTable {
                columns: vec!["id".to_string()],
                rows: Vec::new(),
            },
        );
        assert_eq!(sql_script(&GeneratedData { tables }), "");
    }
}
