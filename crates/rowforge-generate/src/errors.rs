use thiserror::Error;

/// Errors raised while writing run output.
///
/// Fatal for the affected export mode only; generated data stays usable
/// for other modes.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Parse, schema, cycle, config, or cancellation failure.
    #[error(transparent)]
    Core(#[from] rowforge_core::Error),
    #[error(transparent)]
    Export(#[from] ExportError),
}
