//! Repository error types.

use thiserror::Error;

/// Stable machine-readable error codes carried by [`RepoError`].
pub mod error_codes {
    /// Unknown/internal error.
    pub const INTERNAL: u32 = 1;
    /// Entity could not be mapped to or from a document.
    pub const INVALID_ENTITY: u32 = 2;
    /// Entity not found.
    pub const NOT_FOUND: u32 = 3;
    /// Unique constraint violation.
    pub const CONSTRAINT_VIOLATION: u32 = 4;
    /// Schema metadata could not be compiled.
    pub const SCHEMA_MISMATCH: u32 = 5;
    /// A read ran before a hydration function was registered.
    pub const HYDRATION_NOT_CONFIGURED: u32 = 6;
    /// The hydration function rejected a stored document.
    pub const HYDRATION_FAILED: u32 = 7;
    /// Storage engine failure.
    pub const STORAGE: u32 = 8;
}

/// Repository errors.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Another document already holds the value of a unique constraint.
    #[error("unique constraint '{constraint}' violated on {entity}.{fields:?}: value '{value}' already exists")]
    UniqueConstraintViolation {
        entity: String,
        constraint: String,
        fields: Vec<String>,
        value: String,
    },

    /// No stored document has the identifier.
    #[error("{entity} with id '{id}' not found")]
    EntityNotFound { entity: String, id: String },

    /// A read ran before `on_hydrate` was called.
    #[error("no hydration function registered for {entity}")]
    HydrationNotConfigured { entity: String },

    /// The hydration function failed.
    #[error("hydration failed: {0}")]
    Hydration(String),

    /// Entity could not be mapped to a document.
    #[error("invalid entity: {0}")]
    InvalidEntity(String),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Schema metadata error.
    #[error("schema error: {0}")]
    Schema(#[from] schemaforge_core::Error),
}

impl RepoError {
    /// Stable code for translating the error into an API response.
    pub fn code(&self) -> u32 {
        match self {
            RepoError::UniqueConstraintViolation { .. } => error_codes::CONSTRAINT_VIOLATION,
            RepoError::EntityNotFound { .. } => error_codes::NOT_FOUND,
            RepoError::HydrationNotConfigured { .. } => error_codes::HYDRATION_NOT_CONFIGURED,
            RepoError::Hydration(_) => error_codes::HYDRATION_FAILED,
            RepoError::InvalidEntity(_) => error_codes::INVALID_ENTITY,
            RepoError::Storage(_) => error_codes::STORAGE,
            RepoError::Serialization(_) => error_codes::INTERNAL,
            RepoError::Schema(_) => error_codes::SCHEMA_MISMATCH,
        }
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(err: serde_json::Error) -> Self {
        RepoError::Serialization(err.to_string())
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let err = RepoError::UniqueConstraintViolation {
            entity: "User".into(),
            constraint: "User_email_unique".into(),
            fields: vec!["email".into()],
            value: "a@example.com".into(),
        };
        assert_eq!(err.code(), error_codes::CONSTRAINT_VIOLATION);
        assert!(err.to_string().contains("User_email_unique"));

        let err = RepoError::EntityNotFound {
            entity: "User".into(),
            id: "42".into(),
        };
        assert_eq!(err.code(), error_codes::NOT_FOUND);
    }
}
