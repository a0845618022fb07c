//! Row validation run by the session before anything is written.
//!
//! Rust's type system already rules out most bad values for derived models, so the
//! checks here matter for `DynamicModel` rows (built from untyped input) and for the
//! constraints the type system cannot express: declared lengths, NOT NULL columns
//! held in `Option` fields, and text patterns.

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use regex::Regex;

use crate::error::{FieldValidationError, ValidationError, ValidationErrorKind};
use crate::field::FieldInfo;
use crate::value::Value;

/// Compiled patterns, shared by every validation call.
struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let regex = Regex::new(pattern)?;
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// Check if a string matches a regex pattern.
///
/// An invalid pattern never matches (and is logged).
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    match regex_cache().get_or_compile(pattern) {
        Ok(regex) => regex.is_match(value),
        Err(e) => {
            tracing::warn!(
                pattern = pattern,
                error = %e,
                "Invalid regex pattern in validation, treating as non-match"
            );
            false
        }
    }
}

/// Pattern used by `#[tinyorm(email)]`.
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Validate a row about to be written to `table`.
///
/// `is_insert` relaxes NOT NULL checks for columns the database fills in.
pub fn validate_row(
    table: &str,
    fields: &[FieldInfo],
    values: &[(&str, Value)],
    is_insert: bool,
) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new(table);

    for (column, _) in values {
        if !fields.iter().any(|f| f.column_name == *column) {
            errors.push(FieldValidationError::new(
                *column,
                ValidationErrorKind::UnknownColumn,
                format!("no such column on {table}"),
            ));
        }
    }

    for field in fields {
        let value = values
            .iter()
            .find(|(c, _)| *c == field.column_name)
            .map_or(&Value::Null, |(_, v)| v);

        if value.is_null() {
            let filled_by_db = is_insert && field.omit_when_null();
            if !field.nullable && !field.primary_key && !filled_by_db {
                errors.push(FieldValidationError::new(
                    field.column_name,
                    ValidationErrorKind::Required,
                    "a value is required",
                ));
            }
            continue;
        }

        if !field.sql_type.accepts(value) {
            errors.push(FieldValidationError::new(
                field.column_name,
                ValidationErrorKind::TypeMismatch,
                format!("expected {}, found {}", field.sql_type, value.type_name()),
            ));
            continue;
        }

        if let Value::Text(text) = value {
            if let Some(max) = field.sql_type.max_length() {
                let len = text.chars().count();
                if len > max as usize {
                    errors.push(FieldValidationError::new(
                        field.column_name,
                        ValidationErrorKind::MaxLength,
                        format!("length {len} exceeds {max}"),
                    ));
                }
            }
            if let Some(pattern) = field.pattern {
                if !matches_pattern(text, pattern) {
                    errors.push(FieldValidationError::new(
                        field.column_name,
                        ValidationErrorKind::Pattern,
                        format!("'{text}' does not match the required pattern"),
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!(table = table, errors = errors.errors.len(), "Row failed validation");
        Err(errors)
    }
}
