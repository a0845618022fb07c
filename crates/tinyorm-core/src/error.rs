//! Error types shared by every tinyorm crate.

use std::fmt;

/// Result alias used throughout tinyorm.
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of database constraint that rejected a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    ForeignKey,
    Unique,
    PrimaryKey,
    NotNull,
    Check,
    Other,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintKind::ForeignKey => "FOREIGN KEY",
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::PrimaryKey => "PRIMARY KEY",
            ConstraintKind::NotNull => "NOT NULL",
            ConstraintKind::Check => "CHECK",
            ConstraintKind::Other => "constraint",
        };
        f.write_str(name)
    }
}

/// What went wrong with a single field during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// The value's type cannot be stored in the column.
    TypeMismatch,
    /// A NOT NULL column without a default was given NULL.
    Required,
    /// A string exceeded the column's declared length.
    MaxLength,
    /// A string did not match the field's pattern.
    Pattern,
    /// The column does not exist on the mapped table.
    UnknownColumn,
}

/// A validation failure for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValidationError {
    pub field: String,
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl FieldValidationError {
    pub fn new(field: impl Into<String>, kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
        }
    }
}

/// All validation failures for one row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub table: String,
    pub errors: Vec<FieldValidationError>,
}

impl ValidationError {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            errors: Vec::new(),
        }
    }

    pub fn push(&mut self, error: FieldValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether any error concerns `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} validation error(s) for {}",
            self.errors.len(),
            self.table
        )?;
        for e in &self.errors {
            write!(f, "\n  {}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The error type for all tinyorm operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query failed: {message} [SQL: {sql}]")]
    Query { sql: String, message: String },

    #[error("{message}")]
    Constraint { kind: ConstraintKind, message: String },

    #[error("type error: expected {expected}, found {actual}")]
    Type {
        expected: &'static str,
        actual: String,
    },

    #[error("no column named '{0}' in row")]
    ColumnNotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no row was found when one was required")]
    NotFound,

    #[error("expected zero or one row, found {0}")]
    MultipleRows(usize),

    #[error("session error: {0}")]
    Session(String),

    #[error("relationship error: {0}")]
    Relationship(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Build a type error from the expected SQL type and the offending value's type name.
    pub fn type_mismatch(expected: &'static str, actual: impl Into<String>) -> Self {
        Error::Type {
            expected,
            actual: actual.into(),
        }
    }

    /// Whether this is a constraint violation reported by the database.
    pub fn is_constraint(&self) -> bool {
        matches!(self, Error::Constraint { .. })
    }

    /// Whether this is a validation error raised before the database was touched.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_lists_fields() {
        let mut err = ValidationError::new("contact");
        err.push(FieldValidationError::new(
            "age",
            ValidationErrorKind::TypeMismatch,
            "expected INTEGER, found text",
        ));
        let text = err.to_string();
        assert!(text.starts_with("1 validation error(s) for contact"));
        assert!(text.contains("age: expected INTEGER"));
        assert!(err.has_field("age"));
        assert!(!err.has_field("first_name"));
    }

    #[test]
    fn test_error_classification() {
        let err = Error::Constraint {
            kind: ConstraintKind::ForeignKey,
            message: "FOREIGN KEY constraint failed".to_string(),
        };
        assert!(err.is_constraint());
        assert!(!err.is_validation());
        assert_eq!(err.to_string(), "FOREIGN KEY constraint failed");

        let err: Error = ValidationError::new("contact").into();
        assert!(err.is_validation());
    }

    #[test]
    fn test_multiple_rows_message() {
        assert_eq!(
            Error::MultipleRows(2).to_string(),
            "expected zero or one row, found 2"
        );
    }
}
