//! SQL expressions.
//!
//! `Expr` is a small expression tree. Values are never inlined into the SQL text;
//! they are collected into a parameter list and referenced by numbered placeholders.

use chrono::NaiveDateTime;
use tinyorm_core::Value;

/// SQL dialect, which decides placeholder syntax and a few operator spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// `?1`, `?2`, ...
    #[default]
    Sqlite,
    /// `$1`, `$2`, ...
    Postgres,
}

impl Dialect {
    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Postgres => format!("${index}"),
        }
    }

    /// Quote an identifier.
    pub fn quote_identifier(self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
}

impl BinaryOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }
}

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A column, optionally qualified by its table.
    Column {
        table: Option<String>,
        name: String,
    },
    /// A bound parameter.
    Value(Value),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        case_insensitive: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    In {
        expr: Box<Expr>,
        values: Vec<Value>,
    },
    Not(Box<Expr>),
}

impl Expr {
    /// Reference a column.
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            name: name.into(),
        }
    }

    /// Reference a column of a specific table.
    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    /// A bound value.
    pub fn value(value: impl Into<Value>) -> Self {
        Expr::Value(value.into())
    }

    fn binary(self, op: BinaryOp, right: impl Into<Expr>) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right.into()),
        }
    }

    pub fn eq(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, right)
    }

    pub fn ne(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, right)
    }

    pub fn gt(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, right)
    }

    pub fn ge(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, right)
    }

    pub fn lt(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, right)
    }

    pub fn le(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, right)
    }

    pub fn and(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, right)
    }

    pub fn or(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, right)
    }

    /// Case-sensitive pattern match (`%` and `_` wildcards).
    pub fn like(self, pattern: impl Into<Expr>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: Box::new(pattern.into()),
            case_insensitive: false,
        }
    }

    /// Case-insensitive pattern match.
    ///
    /// SQLite has no `ILIKE`; it is rendered as `lower(a) LIKE lower(b)`.
    pub fn ilike(self, pattern: impl Into<Expr>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: Box::new(pattern.into()),
            case_insensitive: true,
        }
    }

    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    pub fn in_list<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Render with the default dialect. Parameters are appended to `params`;
    /// placeholders are numbered from `offset + 1`.
    pub fn build(&self, params: &mut Vec<Value>, offset: usize) -> String {
        self.build_with_dialect(Dialect::default(), params, offset)
    }

    /// Render with a specific dialect.
    pub fn build_with_dialect(
        &self,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        match self {
            Expr::Column { table, name } => match table {
                Some(table) => format!(
                    "{}.{}",
                    dialect.quote_identifier(table),
                    dialect.quote_identifier(name)
                ),
                None => dialect.quote_identifier(name),
            },
            Expr::Value(value) => {
                params.push(value.clone());
                dialect.placeholder(offset + params.len())
            }
            Expr::Binary { left, op, right } => {
                let left_sql = left.build_operand(dialect, params, offset, *op);
                let right_sql = right.build_operand(dialect, params, offset, *op);
                format!("{left_sql} {} {right_sql}", op.as_str())
            }
            Expr::Like {
                expr,
                pattern,
                case_insensitive,
            } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                let pattern_sql = pattern.build_with_dialect(dialect, params, offset);
                match (case_insensitive, dialect) {
                    (false, _) => format!("{expr_sql} LIKE {pattern_sql}"),
                    (true, Dialect::Postgres) => format!("{expr_sql} ILIKE {pattern_sql}"),
                    (true, Dialect::Sqlite) => {
                        format!("lower({expr_sql}) LIKE lower({pattern_sql})")
                    }
                }
            }
            Expr::IsNull { expr, negated } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                if *negated {
                    format!("{expr_sql} IS NOT NULL")
                } else {
                    format!("{expr_sql} IS NULL")
                }
            }
            Expr::In { expr, values } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                if values.is_empty() {
                    // `x IN ()` is not valid SQL; nothing matches an empty list.
                    return "1 = 0".to_string();
                }
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| {
                        params.push(v.clone());
                        dialect.placeholder(offset + params.len())
                    })
                    .collect();
                format!("{expr_sql} IN ({})", placeholders.join(", "))
            }
            Expr::Not(inner) => {
                format!("NOT ({})", inner.build_with_dialect(dialect, params, offset))
            }
        }
    }

    /// Render an operand, parenthesizing nested boolean expressions whose operator
    /// differs from the parent's.
    fn build_operand(
        &self,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
        parent: BinaryOp,
    ) -> String {
        let sql = self.build_with_dialect(dialect, params, offset);
        match self {
            Expr::Binary { op, .. } if *op != parent && matches!(op, BinaryOp::And | BinaryOp::Or) => {
                format!("({sql})")
            }
            _ => sql,
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Value(value)
    }
}

macro_rules! expr_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Expr {
                fn from(value: $ty) -> Self {
                    Expr::Value(Value::from(value))
                }
            }
        )*
    };
}

expr_from_value!(bool, i32, i64, f64, &str, String, &String, NaiveDateTime);

#[cfg(test)]
mod tests {
    use super::*;

    fn render(expr: &Expr) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = expr.build(&mut params, 0);
        (sql, params)
    }

    #[test]
    fn test_column_quoting() {
        let (sql, _) = render(&Expr::qualified("contact", "first_name"));
        assert_eq!(sql, "\"contact\".\"first_name\"");
    }

    #[test]
    fn test_comparison_binds_parameters() {
        let (sql, params) = render(&Expr::col("age").ge(30));
        assert_eq!(sql, "\"age\" >= ?1");
        assert_eq!(params, vec![Value::BigInt(30)]);
    }

    #[test]
    fn test_offset_numbering() {
        let mut params = vec![Value::from("already bound")];
        let sql = Expr::col("city").eq("Springfield").build(&mut params, 0);
        assert_eq!(sql, "\"city\" = ?2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_and_or_parenthesized() {
        let expr = Expr::col("a")
            .eq(1)
            .or(Expr::col("b").eq(2))
            .and(Expr::col("c").eq(3));
        let (sql, params) = render(&expr);
        assert_eq!(sql, "(\"a\" = ?1 OR \"b\" = ?2) AND \"c\" = ?3");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_ilike_per_dialect() {
        let expr = Expr::col("first_name").ilike("%jo%");
        let mut params = Vec::new();
        assert_eq!(
            expr.build_with_dialect(Dialect::Sqlite, &mut params, 0),
            "lower(\"first_name\") LIKE lower(?1)"
        );
        params.clear();
        assert_eq!(
            expr.build_with_dialect(Dialect::Postgres, &mut params, 0),
            "\"first_name\" ILIKE $1"
        );
    }

    #[test]
    fn test_in_list_and_null_checks() {
        let (sql, params) = render(&Expr::col("contact_id").in_list([1_i64, 2, 3]));
        assert_eq!(sql, "\"contact_id\" IN (?1, ?2, ?3)");
        assert_eq!(params.len(), 3);

        let (sql, params) = render(&Expr::col("contact_id").in_list(Vec::<i64>::new()));
        assert_eq!(sql, "1 = 0");
        assert!(params.is_empty());

        let (sql, _) = render(&Expr::col("date_of_birth").is_null().not());
        assert_eq!(sql, "NOT (\"date_of_birth\" IS NULL)");
    }

    #[test]
    fn test_column_to_column_comparison() {
        let expr = Expr::qualified("address", "contact_id").eq(Expr::qualified("contact", "contact_id"));
        let (sql, params) = render(&expr);
        assert_eq!(sql, "\"address\".\"contact_id\" = \"contact\".\"contact_id\"");
        assert!(params.is_empty());
    }
}
