use crate::constraints::TableConstraint;
use crate::error::{Error, Result};
use crate::schema::Schema;

/// Validate internal consistency of a parsed schema.
///
/// Checks that every column referenced by a constraint exists in its
/// table, that FK targets and their columns exist, that FK column
/// pairings line up, and that self-referential FKs point at columns the
/// row does not depend on itself to populate (an identity column).
pub fn validate_schema(schema: &Schema) -> Result<()> {
    for (table_name, table) in &schema.tables {
        for constraint in &table.constraints {
            match constraint {
                TableConstraint::PrimaryKey { columns }
                | TableConstraint::Unique { columns } => {
                    for column in columns {
                        require_column(schema, table_name, column, "constraint")?;
                    }
                }
                TableConstraint::NotNull { column } => {
                    require_column(schema, table_name, column, "NOT NULL")?;
                }
                TableConstraint::Check(check) => {
                    for column in check.expr.columns() {
                        require_column(schema, table_name, column, "CHECK")?;
                    }
                }
                TableConstraint::ForeignKey(fk) => {
                    if fk.columns.len() != fk.ref_columns.len() {
                        return Err(Error::InvalidSchema(format!(
                            "foreign key on {table_name} pairs {} columns with {} referenced columns",
                            fk.columns.len(),
                            fk.ref_columns.len()
                        )));
                    }
                    for column in &fk.columns {
                        require_column(schema, table_name, column, "foreign key")?;
                    }
                    let target = schema.table(&fk.ref_table).ok_or_else(|| {
                        Error::InvalidSchema(format!(
                            "foreign key on {table_name} references unknown table {}",
                            fk.ref_table
                        ))
                    })?;
                    for column in &fk.ref_columns {
                        if !target.has_column(column) {
                            return Err(Error::InvalidSchema(format!(
                                "foreign key on {table_name} references unknown column {}.{}",
                                fk.ref_table, column
                            )));
                        }
                    }
                    if fk.is_self_referential(table_name) {
                        // The target columns must have an identity of their
                        // own (serial or key membership), otherwise the row
                        // would only ever be populated by itself.
                        let independent = fk.ref_columns.iter().all(|column| {
                            let serial = target
                                .column(column)
                                .map(|c| c.type_tag.is_serial())
                                .unwrap_or(false);
                            serial || target.is_unique_member(column)
                        });
                        if !independent {
                            return Err(Error::InvalidSchema(format!(
                                "self-referential foreign key on {table_name} must target identity or key columns"
                            )));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn require_column(schema: &Schema, table: &str, column: &str, context: &str) -> Result<()> {
    let def = schema.table(table).ok_or_else(|| {
        Error::InvalidSchema(format!("unknown table {table} in {context} validation"))
    })?;
    if !def.has_column(column) {
        return Err(Error::InvalidSchema(format!(
            "{context} references unknown column {table}.{column}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{CheckConstraint, ForeignKey};
    use crate::expr::{BinaryOp, Expr};
    use crate::schema::{ColumnDef, TableDef, TypeTag};
    use crate::value::Value;

    fn column(name: &str, type_tag: TypeTag) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            type_tag,
            nullable: true,
            default: None,
        }
    }

    #[test]
    fn check_on_unknown_column_is_rejected() {
        let mut schema = Schema::new();
        schema.insert_table(TableDef {
            name: "t".to_string(),
            columns: vec![column("a", TypeTag::Integer)],
            constraints: vec![TableConstraint::Check(CheckConstraint {
                name: None,
                expr: Expr::Binary {
                    op: BinaryOp::Gt,
                    lhs: Box::new(Expr::Column("missing".to_string())),
                    rhs: Box::new(Expr::Literal(Value::Int(0))),
                },
            })],
        });

        assert!(matches!(
            validate_schema(&schema),
            Err(Error::InvalidSchema(_))
        ));
    }

    #[test]
    fn self_reference_must_target_identity() {
        let mut schema = Schema::new();
        schema.insert_table(TableDef {
            name: "t".to_string(),
            columns: vec![
                column("plain", TypeTag::Integer),
                column("parent", TypeTag::Integer),
            ],
            constraints: vec![TableConstraint::ForeignKey(ForeignKey {
                columns: vec!["parent".to_string()],
                ref_table: "t".to_string(),
                ref_columns: vec!["plain".to_string()],
                on_delete: None,
                on_update: None,
            })],
        });

        assert!(matches!(
            validate_schema(&schema),
            Err(Error::InvalidSchema(_))
        ));
    }

    #[test]
    fn valid_self_reference_passes() {
        let mut schema = Schema::new();
        schema.insert_table(TableDef {
            name: "t".to_string(),
            columns: vec![
                column("id", TypeTag::Serial),
                column("parent", TypeTag::Integer),
            ],
            constraints: vec![
                TableConstraint::PrimaryKey {
                    columns: vec!["id".to_string()],
                },
                TableConstraint::ForeignKey(ForeignKey {
                    columns: vec!["parent".to_string()],
                    ref_table: "t".to_string(),
                    ref_columns: vec!["id".to_string()],
                    on_delete: None,
                    on_update: None,
                }),
            ],
        });

        assert!(validate_schema(&schema).is_ok());
    }
}
