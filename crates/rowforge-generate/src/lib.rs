//! Constraint-aware synthetic row generation for rowforge.
//!
//! Consumes a parsed [`rowforge_core::Schema`] plus a [`GenerateConfig`]
//! and produces rows satisfying NOT NULL, PK/UNIQUE, FK, and CHECK
//! constraints, exportable as SQL INSERT batches, CSV, or JSON.

pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod eval;
pub mod infer;
pub mod output;
pub mod realistic;
pub mod report;
pub mod sampler;

pub use config::{ColumnMapping, GenerateConfig, GLOBAL_SCOPE};
pub use engine::{Filler, GeneratedData, GeneratedTable, RunResult};
pub use errors::{ExportError, GenerationError};
pub use realistic::{BuiltinProvider, RealisticProvider};
pub use report::{GenerationReport, GenerationWarning, TableReport};

use rowforge_parse::ParseWarning;

/// Parse a DDL script and generate data for it in one call.
///
/// Parse warnings (unknown types, unsigned narrowing) are folded into
/// the run report; parse errors abort before any generation.
pub fn generate_from_ddl(
    ddl: &str,
    config: &GenerateConfig,
) -> Result<RunResult, GenerationError> {
    let outcome = rowforge_parse::parse_ddl(ddl).map_err(rowforge_core::Error::from)?;
    let filler = Filler::new(&outcome.schema, config);
    let mut result = filler.run()?;

    let parse_warnings = outcome.warnings.into_iter().map(|warning| match warning {
        ParseWarning::UnknownType { table, column, raw } => {
            GenerationWarning::UnknownType { table, column, raw }
        }
        ParseWarning::UnsignedNormalized { table, column } => {
            GenerationWarning::UnsignedNormalized { table, column }
        }
    });
    let mut warnings: Vec<GenerationWarning> = parse_warnings.collect();
    warnings.append(&mut result.report.warnings);
    result.report.warnings = warnings;

    Ok(result)
}
