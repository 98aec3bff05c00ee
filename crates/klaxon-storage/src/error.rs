/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use klaxon_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "trigger",
///     id: "trigger-99".to_string(),
/// };
/// assert!(err.to_string().contains("trigger"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the store.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// A create operation collided with an existing record.
    #[error("Storage: {entity} already exists (id={id})")]
    AlreadyExists { entity: &'static str, id: String },

    /// The caller supplied an invalid or incomplete entity.
    #[error("Storage: validation failed: {0}")]
    Validation(String),

    /// A state change was requested on an alert already in its terminal state.
    #[error("Storage: alert {id} is resolved and cannot change state")]
    AlertResolved { id: String },

    /// A concurrent sub-query task failed to complete.
    #[error("Storage: query task failed: {0}")]
    Task(String),

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
