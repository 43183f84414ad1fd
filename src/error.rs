use thiserror::Error;

/// Error taxonomy of the pipeline.
///
/// Structural and precondition failures are fatal for the cell type being
/// processed and carry enough context (cell type, fold) to diagnose them.
/// Signature genes missing from a scoring matrix are not errors: scoring
/// skips them, counts them and logs a warning.
#[derive(Error, Debug)]
pub enum CryosigError {
    /// Malformed partition request, e.g. more folds than cells.
    #[error("invalid input for cell type '{cell_type}': {reason}")]
    InvalidInput { cell_type: String, reason: String },

    /// A label group is empty or too small for the differential-expression
    /// test to run.
    #[error("insufficient data for cell type '{cell_type}', fold {fold}: {reason}")]
    InsufficientData {
        cell_type: String,
        fold: usize,
        reason: String,
    },
}
