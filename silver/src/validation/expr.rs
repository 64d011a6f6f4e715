//! Boolean predicates over record columns.
//!
//! Rules are SQL expressions parsed with [`sqlparser`] and lowered into [`Expression`]. The
//! supported subset is `column IS [NOT] NULL`, comparisons (`=`, `!=`, `<>`, `<`, `<=`, `>`,
//! `>=`) between a column and a literal, `AND`, `OR`, `NOT` and parentheses. Literals are
//! numbers, single-quoted strings, `TRUE`, `FALSE` and `NULL`. Columns may be quoted with double
//! quotes or backticks.
//!
//! Evaluation follows SQL three-valued logic: comparing against null yields unknown, and unknown
//! propagates through `AND`, `OR` and `NOT` the way SQL defines.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use sqlparser::ast::{BinaryOperator, Expr, UnaryOperator, Value};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;
use thiserror::Error;

use crate::conversions::text::{parse_date, parse_timestamp};
use crate::types::{Cell, Record};

/// A predicate that cannot be turned into an [`Expression`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("invalid expression `{expression}`: {message}")]
    Syntax { expression: String, message: String },

    #[error("unsupported {construct} in expression `{expression}`")]
    Unsupported {
        expression: String,
        construct: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::LtEq => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::GtEq => ordering != Ordering::Less,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

/// A parsed predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    IsNull { column: String, negated: bool },
    Compare { column: String, op: CompareOp, literal: Cell },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
}

impl Expression {
    pub fn parse(source: &str) -> Result<Expression, ExpressionError> {
        let syntax_error = |message: String| ExpressionError::Syntax {
            expression: source.to_string(),
            message,
        };

        let dialect = GenericDialect {};
        let mut parser = Parser::new(&dialect)
            .try_with_sql(source)
            .map_err(|err| syntax_error(err.to_string()))?;
        let expr = parser
            .parse_expr()
            .map_err(|err| syntax_error(err.to_string()))?;

        let next = parser.peek_token();
        if next.token != Token::EOF {
            return Err(syntax_error(format!("unexpected `{}`", next.token)));
        }

        Lowering { source }.expression(&expr)
    }

    /// Evaluates the predicate, [`None`] stands for unknown.
    pub fn evaluate(&self, record: &Record) -> Option<bool> {
        match self {
            Expression::IsNull { column, negated } => {
                Some(record.value(column).is_null() != *negated)
            }
            Expression::Compare {
                column,
                op,
                literal,
            } => compare(record.value(column), literal).map(|ordering| op.holds(ordering)),
            Expression::And(left, right) => match (left.evaluate(record), right.evaluate(record)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Expression::Or(left, right) => match (left.evaluate(record), right.evaluate(record)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Expression::Not(inner) => inner.evaluate(record).map(|value| !value),
        }
    }

    /// Returns `true` only when the predicate evaluates to true.
    pub fn holds(&self, record: &Record) -> bool {
        self.evaluate(record) == Some(true)
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::IsNull { column, negated } => {
                write!(
                    f,
                    "{} IS {}NULL",
                    QuotedColumn(column),
                    if *negated { "NOT " } else { "" }
                )
            }
            Expression::Compare {
                column,
                op,
                literal,
            } => match literal {
                Cell::String(s) => write!(
                    f,
                    "{} {} '{}'",
                    QuotedColumn(column),
                    op.as_str(),
                    s.replace('\'', "''")
                ),
                other => write!(f, "{} {} {other}", QuotedColumn(column), op.as_str()),
            },
            Expression::And(left, right) => write!(f, "({left} AND {right})"),
            Expression::Or(left, right) => write!(f, "({left} OR {right})"),
            Expression::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}

/// Compares a column value against a literal.
///
/// String literals are read as dates or timestamps when the column holds one.
fn compare(value: &Cell, literal: &Cell) -> Option<Ordering> {
    match (value, literal) {
        (Cell::Date(_), Cell::String(s)) => value.sequence_cmp(&Cell::Date(parse_date(s)?)),
        (Cell::TimestampTz(_), Cell::String(s)) => {
            value.sequence_cmp(&Cell::TimestampTz(parse_timestamp(s)?))
        }
        (Cell::Timestamp(v), Cell::String(s)) => Some(v.and_utc().cmp(&parse_timestamp(s)?)),
        _ => value.sequence_cmp(literal),
    }
}

struct QuotedColumn<'a>(&'a str);

impl fmt::Display for QuotedColumn<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plain = self
            .0
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && self.0.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

        if plain {
            f.write_str(self.0)
        } else {
            write!(f, "\"{}\"", self.0.replace('"', "\"\""))
        }
    }
}

/// Lowers a parsed SQL expression into the supported subset.
struct Lowering<'a> {
    source: &'a str,
}

impl Lowering<'_> {
    fn expression(&self, expr: &Expr) -> Result<Expression, ExpressionError> {
        match expr {
            Expr::Nested(inner) => self.expression(inner),
            Expr::IsNull(inner) => Ok(Expression::IsNull {
                column: self.column(inner)?,
                negated: false,
            }),
            Expr::IsNotNull(inner) => Ok(Expression::IsNull {
                column: self.column(inner)?,
                negated: true,
            }),
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => Ok(Expression::Not(Box::new(self.expression(expr)?))),
            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And => Ok(Expression::And(
                    Box::new(self.expression(left)?),
                    Box::new(self.expression(right)?),
                )),
                BinaryOperator::Or => Ok(Expression::Or(
                    Box::new(self.expression(left)?),
                    Box::new(self.expression(right)?),
                )),
                _ => Ok(Expression::Compare {
                    column: self.column(left)?,
                    op: self.compare_op(op)?,
                    literal: self.literal(right)?,
                }),
            },
            other => Err(self.unsupported(format!("expression `{other}`"))),
        }
    }

    fn column(&self, expr: &Expr) -> Result<String, ExpressionError> {
        match expr {
            Expr::Identifier(ident) => Ok(ident.value.clone()),
            Expr::Nested(inner) => self.column(inner),
            other => Err(self.unsupported(format!("operand `{other}`, expected a column"))),
        }
    }

    fn compare_op(&self, op: &BinaryOperator) -> Result<CompareOp, ExpressionError> {
        match op {
            BinaryOperator::Eq => Ok(CompareOp::Eq),
            BinaryOperator::NotEq => Ok(CompareOp::NotEq),
            BinaryOperator::Lt => Ok(CompareOp::Lt),
            BinaryOperator::LtEq => Ok(CompareOp::LtEq),
            BinaryOperator::Gt => Ok(CompareOp::Gt),
            BinaryOperator::GtEq => Ok(CompareOp::GtEq),
            other => Err(self.unsupported(format!("operator `{other}`"))),
        }
    }

    fn literal(&self, expr: &Expr) -> Result<Cell, ExpressionError> {
        match expr {
            Expr::Value(Value::Number(number, _)) => self.number(number, false),
            Expr::UnaryOp {
                op: UnaryOperator::Minus,
                expr,
            } => match &**expr {
                Expr::Value(Value::Number(number, _)) => self.number(number, true),
                other => Err(self.unsupported(format!("literal `-{other}`"))),
            },
            Expr::Value(Value::SingleQuotedString(s)) => Ok(Cell::String(s.clone())),
            Expr::Value(Value::Boolean(b)) => Ok(Cell::Bool(*b)),
            Expr::Value(Value::Null) => Ok(Cell::Null),
            Expr::Nested(inner) => self.literal(inner),
            other => Err(self.unsupported(format!("operand `{other}`, expected a literal"))),
        }
    }

    /// Numbers are integers where possible and fall back to floats.
    fn number(&self, number: &str, negative: bool) -> Result<Cell, ExpressionError> {
        let text = if negative {
            format!("-{number}")
        } else {
            number.to_string()
        };

        if let Ok(value) = text.parse::<i64>() {
            return Ok(Cell::I64(value));
        }

        text.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Cell::F64)
            .ok_or_else(|| ExpressionError::Syntax {
                expression: self.source.to_string(),
                message: format!("`{text}` is not a valid number"),
            })
    }

    fn unsupported(&self, construct: String) -> ExpressionError {
        ExpressionError::Unsupported {
            expression: self.source.to_string(),
            construct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking() -> Record {
        Record::new()
            .with("booking_id", 5)
            .with("passenger_id", Cell::Null)
            .with("flight_id", 9)
            .with("amount", 12.5)
            .with("status", "confirmed")
    }

    fn eval(expression: &str) -> Option<bool> {
        Expression::parse(expression).unwrap().evaluate(&booking())
    }

    #[test]
    fn null_checks() {
        assert_eq!(eval("booking_id IS NOT NULL"), Some(true));
        assert_eq!(eval("passenger_id IS NOT NULL"), Some(false));
        assert_eq!(eval("passenger_id is null"), Some(true));
        assert_eq!(eval("missing_column IS NULL"), Some(true));
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval("amount > 10"), Some(true));
        assert_eq!(eval("amount <= 12.5"), Some(true));
        assert_eq!(eval("status = 'confirmed'"), Some(true));
        assert_eq!(eval("status <> 'confirmed'"), Some(false));
        assert_eq!(eval("flight_id != 9"), Some(false));
    }

    #[test]
    fn comparisons_with_null_are_unknown() {
        assert_eq!(eval("passenger_id = 1"), None);
        assert_eq!(eval("NOT passenger_id = 1"), None);
        assert_eq!(eval("amount = NULL"), None);
        assert_eq!(eval("status > 1"), None);
    }

    #[test]
    fn three_valued_connectives() {
        assert_eq!(eval("passenger_id = 1 AND amount < 0"), Some(false));
        assert_eq!(eval("passenger_id = 1 AND amount > 0"), None);
        assert_eq!(eval("passenger_id = 1 OR amount > 0"), Some(true));
        assert_eq!(eval("passenger_id = 1 OR amount < 0"), None);
    }

    #[test]
    fn precedence_and_parentheses() {
        assert_eq!(eval("amount < 0 AND amount < 0 OR booking_id = 5"), Some(true));
        assert_eq!(eval("amount < 0 AND (amount < 0 OR booking_id = 5)"), Some(false));
        assert_eq!(eval("NOT (booking_id IS NULL)"), Some(true));
    }

    #[test]
    fn quoted_strings_and_identifiers() {
        let record = Record::new()
            .with("first name", "O'Brien")
            .with("seat", "12A");
        let expression = Expression::parse("`first name` = 'O''Brien' AND seat = '12A'").unwrap();
        assert!(expression.holds(&record));

        let expression = Expression::parse("\"first name\" IS NOT NULL").unwrap();
        assert!(expression.holds(&record));
    }

    #[test]
    fn negative_and_float_literals() {
        assert_eq!(eval("amount > -1"), Some(true));
        assert_eq!(eval("amount >= 12.50"), Some(true));
        assert_eq!(eval("amount < -0.5"), Some(false));
    }

    #[test]
    fn rejects_unsupported_constructs() {
        for source in [
            "amount + 1 > 2",
            "length(status) > 3",
            "status LIKE 'conf%'",
            "booking_id IN (1, 2)",
            "amount > flight_id",
        ] {
            assert!(
                matches!(
                    Expression::parse(source),
                    Err(ExpressionError::Unsupported { .. })
                ),
                "{source} should be unsupported"
            );
        }
    }

    #[test]
    fn dates_compare_with_string_literals() {
        let record = Record::new().with(
            "booking_date",
            chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        );

        assert!(
            Expression::parse("booking_date >= '2024-01-01'")
                .unwrap()
                .holds(&record)
        );
    }

    #[test]
    fn rejects_malformed_expressions() {
        for source in [
            "",
            "booking_id IS",
            "booking_id IS NOT",
            "booking_id ==",
            "(booking_id IS NULL",
            "booking_id IS NULL extra",
            "status = 'open",
            "5 = booking_id",
            "booking_id # 3",
        ] {
            assert!(Expression::parse(source).is_err(), "{source} should not parse");
        }
    }

    #[test]
    fn display_round_trips() {
        for source in [
            "NOT (status = 'it''s' OR amount >= 2)",
            "`first name` IS NULL AND amount > -3",
        ] {
            let expression = Expression::parse(source).unwrap();

            assert_eq!(Expression::parse(&expression.to_string()).unwrap(), expression);
        }
    }
}
