use serde::{Deserialize, Serialize};

use crate::expr::Expr;

/// Referential action attached to `ON DELETE` / `ON UPDATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FkAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

/// Foreign key definition preserving column pairing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    pub on_delete: Option<FkAction>,
    pub on_update: Option<FkAction>,
}

impl ForeignKey {
    /// A self-referential key targets the table it is declared on.
    pub fn is_self_referential(&self, table: &str) -> bool {
        self.ref_table == table
    }
}

/// CHECK constraint with its predicate retained as a parsed AST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub name: Option<String>,
    pub expr: Expr,
}

/// Table-level constraint definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableConstraint {
    PrimaryKey { columns: Vec<String> },
    Unique { columns: Vec<String> },
    NotNull { column: String },
    Check(CheckConstraint),
    ForeignKey(ForeignKey),
}
