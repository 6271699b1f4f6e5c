use thiserror::Error;

/// Syntax error raised while lexing or parsing DDL or CHECK expressions.
///
/// Positions are 1-based and point at the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at line {line}, column {column}: expected {expected}, found {found}")]
pub struct ParseError {
    pub line: u32,
    pub column: u32,
    pub expected: String,
    pub found: String,
}

impl ParseError {
    pub fn new(line: u32, column: u32, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            line,
            column,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Core error type shared across rowforge crates.
#[derive(Debug, Error)]
pub enum Error {
    /// DDL or CHECK expression syntax error. Fatal, no output is produced.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The schema violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// The FK graph contains a cycle that cannot be broken with NULLs.
    #[error("cyclic foreign key dependency among tables: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),
    /// Invalid configuration, reported before any generation starts.
    #[error("invalid config: {0}")]
    Config(String),
    /// The run was cancelled at a level boundary.
    #[error("run cancelled")]
    Cancelled,
}

/// Convenience alias for results returned by rowforge crates.
pub type Result<T> = std::result::Result<T, Error>;
