//! Error types for schema-driven diffing.
//!
//! Errors are categorized so callers can tell a bad configuration apart
//! from a programmer error (a broken schema, or a diff that does not
//! belong to the schema it is materialized against). Nothing here is
//! retried: a failed call yields no diff and no view.

use std::fmt;

/// Result type alias for schema operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of schema errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The configuration does not match the schema's shape.
    Schema,
    /// A value cannot be coerced to the declared type.
    Type,
    /// A value was rejected by a validation rule.
    Validation,
    /// A diff references a path the schema does not declare.
    Consistency,
    /// The schema definition itself is invalid.
    Definition,
    /// A customize-diff hook failed.
    Customize,
}

impl ErrorCategory {
    /// Whether this error was caused by the user's configuration
    /// (as opposed to the code that built the schema or the diff).
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Schema | Self::Type | Self::Validation)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Schema => "Configuration does not match the schema",
            Self::Type => "Value has the wrong type",
            Self::Validation => "Value failed validation",
            Self::Consistency => "Diff does not match the schema",
            Self::Definition => "Invalid schema definition",
            Self::Customize => "Diff customization failed",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while coercing, diffing or materializing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Configuration references an attribute the schema does not declare.
    #[error("{key}: attribute is not declared in the schema")]
    SchemaViolation {
        /// Flat path of the offending attribute.
        key: String,
    },

    /// A value cannot be coerced to the declared type.
    #[error("{key}: expected {expected}, got {found}")]
    TypeMismatch {
        /// Flat path of the attribute.
        key: String,
        /// Declared type.
        expected: String,
        /// Description of the value that was found.
        found: String,
    },

    /// A validation rule rejected a value.
    #[error("{key}: {message}")]
    Validation {
        /// Flat path of the attribute.
        key: String,
        /// Message produced by the rule.
        message: String,
    },

    /// A required attribute is missing from the configuration.
    #[error("{key}: required attribute is not set")]
    MissingRequired {
        /// Flat path of the attribute.
        key: String,
    },

    /// A diff references a path the schema does not declare.
    #[error("diff references {key}, which is not declared in the schema")]
    Consistency {
        /// The undeclared diff path.
        key: String,
    },

    /// The schema definition breaks an invariant.
    #[error("invalid schema for {key}: {message}")]
    InvalidSchema {
        /// Attribute whose definition is invalid.
        key: String,
        /// What is wrong with it.
        message: String,
    },

    /// A customize-diff hook returned an error.
    #[error("customize diff: {0}")]
    Customize(String),
}

impl Error {
    /// Create a type mismatch error.
    pub fn type_mismatch(
        key: impl Into<String>,
        expected: impl fmt::Display,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            expected: expected.to_string(),
            found: found.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an invalid schema error.
    pub fn invalid_schema(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::SchemaViolation { .. } => ErrorCategory::Schema,
            Error::MissingRequired { .. } => ErrorCategory::Schema,
            Error::TypeMismatch { .. } => ErrorCategory::Type,
            Error::Validation { .. } => ErrorCategory::Validation,
            Error::Consistency { .. } => ErrorCategory::Consistency,
            Error::InvalidSchema { .. } => ErrorCategory::Definition,
            Error::Customize(_) => ErrorCategory::Customize,
        }
    }

    /// The flat attribute path this error is about, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Error::SchemaViolation { key }
            | Error::TypeMismatch { key, .. }
            | Error::Validation { key, .. }
            | Error::MissingRequired { key }
            | Error::Consistency { key }
            | Error::InvalidSchema { key, .. } => Some(key),
            Error::Customize(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_config_errors() {
        assert!(ErrorCategory::Schema.is_config_error());
        assert!(ErrorCategory::Type.is_config_error());
        assert!(ErrorCategory::Validation.is_config_error());
        assert!(!ErrorCategory::Consistency.is_config_error());
        assert!(!ErrorCategory::Definition.is_config_error());
        assert!(!ErrorCategory::Customize.is_config_error());
    }

    #[test]
    fn test_error_category_display() {
        let display = format!("{}", ErrorCategory::Consistency);
        assert!(display.contains("Diff"));
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::SchemaViolation { key: "x".into() }.category(),
            ErrorCategory::Schema
        );
        assert_eq!(
            Error::MissingRequired { key: "x".into() }.category(),
            ErrorCategory::Schema
        );
        assert_eq!(
            Error::type_mismatch("x", "int", "string \"a\"").category(),
            ErrorCategory::Type
        );
        assert_eq!(
            Error::validation("x", "too long").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::Consistency { key: "x".into() }.category(),
            ErrorCategory::Consistency
        );
        assert_eq!(
            Error::invalid_schema("x", "bad").category(),
            ErrorCategory::Definition
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::type_mismatch("tags.0", "int", "string \"abc\"");
        let display = err.to_string();
        assert!(display.contains("tags.0"));
        assert!(display.contains("int"));
        assert!(display.contains("abc"));
    }

    #[test]
    fn test_error_key() {
        assert_eq!(Error::Consistency { key: "a.b".into() }.key(), Some("a.b"));
        assert_eq!(Error::Customize("boom".into()).key(), None);
    }
}
