use thiserror::Error;

/// Errors surfaced by the reconciliation core.
///
/// "Not found" replies from the executor are not represented here: they are
/// classified by [`crate::drift::classify_failure`] and absorbed by the
/// reconcilers wherever absence is an acceptable outcome.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// An attribute failed its constraint. Raised before any remote call.
    #[error("validation error: `{field}` {reason}")]
    Validation { field: &'static str, reason: String },

    /// The remote call failed. `statement` is the redacted SQL.
    #[error("executor error: {message} (statement: {statement})")]
    Executor { statement: String, message: String },
}

impl ReconcileError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
