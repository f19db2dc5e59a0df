/// Failure of a conversation store operation. A stale generation epoch is
/// not an error; guarded writes report it through their return value.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("store unavailable: {0}")]
    ConnectionFailed(String),
    #[error("store query failed: {0}")]
    QueryFailed(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("schema migration failed: {0}")]
    MigrationFailed(String),
}
