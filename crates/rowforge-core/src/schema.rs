use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constraints::{CheckConstraint, ForeignKey, TableConstraint};
use crate::expr::Expr;

/// Normalized, dialect-independent column type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Integer,
    Decimal { precision: u32, scale: u32 },
    /// `VARCHAR(n)`; `None` means no declared bound.
    Varchar(Option<u32>),
    Char(u32),
    Text,
    Date,
    Time,
    Timestamp,
    Boolean,
    /// Auto-incrementing identity; implies NOT NULL and uniqueness.
    Serial,
    Enum(Vec<String>),
    /// Unrecognized source type, kept verbatim for diagnostics. Columns
    /// of this type fall back to a plain string sampler.
    Opaque(String),
}

impl TypeTag {
    pub fn is_serial(&self) -> bool {
        matches!(self, TypeTag::Serial)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeTag::Integer | TypeTag::Decimal { .. } | TypeTag::Serial
        )
    }

    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            TypeTag::Varchar(_) | TypeTag::Char(_) | TypeTag::Text | TypeTag::Opaque(_)
        )
    }

    /// Declared character bound, when the type carries one.
    pub fn max_length(&self) -> Option<u32> {
        match self {
            TypeTag::Varchar(limit) => *limit,
            TypeTag::Char(len) => Some(*len),
            _ => None,
        }
    }
}

/// Column definition inside a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub type_tag: TypeTag,
    /// False when `NOT NULL`, a primary key membership, or SERIAL applies.
    pub nullable: bool,
    pub default: Option<Expr>,
}

/// A parsed table: ordered columns plus its constraint set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<TableConstraint>,
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.constraints.iter().filter_map(|constraint| match constraint {
            TableConstraint::ForeignKey(fk) => Some(fk),
            _ => None,
        })
    }

    pub fn checks(&self) -> impl Iterator<Item = &CheckConstraint> {
        self.constraints.iter().filter_map(|constraint| match constraint {
            TableConstraint::Check(check) => Some(check),
            _ => None,
        })
    }

    /// CHECK constraints mentioning the given column.
    pub fn checks_for<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a CheckConstraint> {
        self.checks()
            .filter(move |check| check.expr.columns().contains(column))
    }

    pub fn primary_key(&self) -> Option<&[String]> {
        self.constraints.iter().find_map(|constraint| match constraint {
            TableConstraint::PrimaryKey { columns } => Some(columns.as_slice()),
            _ => None,
        })
    }

    /// Column tuples that must stay unique: the primary key plus every
    /// declared UNIQUE constraint.
    pub fn unique_tuples(&self) -> Vec<&[String]> {
        self.constraints
            .iter()
            .filter_map(|constraint| match constraint {
                TableConstraint::PrimaryKey { columns } | TableConstraint::Unique { columns } => {
                    Some(columns.as_slice())
                }
                _ => None,
            })
            .collect()
    }

    /// True when the column belongs to any unique tuple.
    pub fn is_unique_member(&self, column: &str) -> bool {
        self.unique_tuples()
            .iter()
            .any(|tuple| tuple.iter().any(|name| name == column))
    }

    /// Foreign key covering the column, if any.
    pub fn foreign_key_for(&self, column: &str) -> Option<&ForeignKey> {
        self.foreign_keys()
            .find(|fk| fk.columns.iter().any(|name| name == column))
    }
}

/// Parsed schema: table name to definition, insertion-ordered so a run
/// replays deterministically. Name equality is case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub tables: IndexMap<String, TableDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    pub fn insert_table(&mut self, table: TableDef) -> Option<TableDef> {
        self.tables.insert(table.name.clone(), table)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|name| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
