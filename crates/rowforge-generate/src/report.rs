use serde::{Deserialize, Serialize};

/// Summary of one table's generation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub rows_requested: u64,
    pub rows_generated: u64,
    /// Candidate rows constructed, including dropped ones.
    pub candidates: u64,
    pub dropped: u64,
}

/// Non-fatal issue collected during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationWarning {
    UnknownType {
        table: String,
        column: String,
        raw: String,
    },
    UnsignedNormalized {
        table: String,
        column: String,
    },
    /// Constraints could not be satisfied within the attempt budget.
    UnderfilledTable {
        table: String,
        produced: u64,
        requested: u64,
        /// Up to ten of the most recent failing predicates.
        last_failures: Vec<String>,
    },
}

/// Report for a full generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    pub tables: Vec<TableReport>,
    pub warnings: Vec<GenerationWarning>,
}

impl GenerationReport {
    /// True when every table reached its requested row count.
    pub fn is_complete(&self) -> bool {
        self.tables
            .iter()
            .all(|table| table.rows_generated >= table.rows_requested)
    }
}
