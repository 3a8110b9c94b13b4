//! Core error types.

use thiserror::Error;

/// Registry and compiler errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A class or property was never registered when compilation was attempted.
    #[error("{}", missing_message(.class, .property.as_deref()))]
    MetadataMissing {
        /// Class that was looked up.
        class: String,
        /// Property that was looked up, if the class itself exists.
        property: Option<String>,
    },

    /// A relationship target resolver did not produce a registered class.
    #[error("relationship target for {class}.{property} could not be resolved")]
    UnresolvedRelationshipTarget {
        /// Class declaring the relationship.
        class: String,
        /// Relationship property key.
        property: String,
    },

    /// Malformed registration input.
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),

    /// Model manifest could not be applied.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// JSON decoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn missing_message(class: &str, property: Option<&str>) -> String {
    match property {
        Some(property) => format!("no metadata registered for {}.{}", class, property),
        None => format!("no metadata registered for class {}", class),
    }
}

impl Error {
    /// Shorthand for a missing class.
    pub fn missing_class(class: impl Into<String>) -> Self {
        Error::MetadataMissing {
            class: class.into(),
            property: None,
        }
    }

    /// Shorthand for a malformed registration.
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidRegistration(message.into())
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_messages() {
        let err = Error::missing_class("User");
        assert_eq!(err.to_string(), "no metadata registered for class User");

        let err = Error::MetadataMissing {
            class: "User".into(),
            property: Some("email".into()),
        };
        assert_eq!(err.to_string(), "no metadata registered for User.email");
    }
}
