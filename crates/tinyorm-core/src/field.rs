//! Field and column definitions.

use crate::types::SqlType;

/// Referential action for foreign key constraints (ON DELETE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    /// Raise an error if any references exist.
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
}

impl ReferentialAction {
    /// Get the SQL representation of this action.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
        }
    }

    /// Parse a referential action (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().replace('_', " ").as_str() {
            "NO ACTION" | "NOACTION" => Some(ReferentialAction::NoAction),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "CASCADE" => Some(ReferentialAction::Cascade),
            "SET NULL" | "SETNULL" => Some(ReferentialAction::SetNull),
            _ => None,
        }
    }
}

/// Metadata about a mapped column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Database column name
    pub column_name: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub primary_key: bool,
    /// Whether the database assigns this column on insert.
    pub auto_increment: bool,
    /// Default value expression (SQL), applied by the database when the column is omitted.
    pub default: Option<&'static str>,
    /// Foreign key reference as `table.column`.
    pub foreign_key: Option<&'static str>,
    pub on_delete: Option<ReferentialAction>,
    /// Regex the value must match (text columns only).
    pub pattern: Option<&'static str>,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    pub const fn new(name: &'static str, column_name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            column_name,
            sql_type,
            nullable: false,
            primary_key: false,
            auto_increment: false,
            default: None,
            foreign_key: None,
            on_delete: None,
            pattern: None,
        }
    }

    #[must_use]
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    #[must_use]
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    #[must_use]
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    #[must_use]
    pub const fn default_sql(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    #[must_use]
    pub const fn foreign_key(mut self, reference: &'static str) -> Self {
        self.foreign_key = Some(reference);
        self
    }

    #[must_use]
    pub const fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    #[must_use]
    pub const fn pattern(mut self, pattern: &'static str) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Split the foreign key into `(table, column)`.
    pub fn foreign_key_parts(&self) -> Option<(&'static str, &'static str)> {
        self.foreign_key.and_then(|fk| fk.split_once('.'))
    }

    /// Whether the column may be omitted from an INSERT when its value is NULL.
    pub const fn omit_when_null(&self) -> bool {
        self.auto_increment || self.default.is_some()
    }
}
