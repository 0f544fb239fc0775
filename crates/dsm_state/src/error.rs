//! The error taxonomy. `dsm_server` maps each variant to its HTTP status;
//! this crate never depends on HTTP itself.

#[derive(Debug, Clone, thiserror::Error)]
pub enum DsmError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("operation not valid for the current stage")]
    StageMismatch,
    #[error("duplicate submission")]
    DuplicateSubmission,
    #[error("invalid ranking: {0}")]
    InvalidRanking(String),
    #[error("transient model failure: {0}")]
    TransientModelFailure(String),
    #[error("store error: {0}")]
    StoreError(String),
    #[error("internal error: {0}")]
    Internal(String),
}
