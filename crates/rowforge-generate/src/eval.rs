//! CHECK predicate evaluation over a candidate row.
//!
//! SQL three-valued logic: comparisons with NULL and type mismatches
//! yield UNKNOWN, never an error, and a CHECK passes unless it comes out
//! FALSE.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Timelike};
use regex::Regex;
use rust_decimal::Decimal;

use rowforge_core::{BinaryOp, DatePart, Expr, ScalarFunc, UnaryOp, Value};

/// A candidate or committed row. Every declared column is present;
/// SQL NULL is `Value::Null`, not an absent key.
pub type Row = HashMap<String, Value>;

/// Kleene truth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    pub fn from_bool(value: bool) -> Self {
        if value {
            Truth::True
        } else {
            Truth::False
        }
    }

    pub fn and(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::False, _) | (_, Truth::False) => Truth::False,
            (Truth::True, Truth::True) => Truth::True,
            _ => Truth::Unknown,
        }
    }

    pub fn or(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::True, _) | (_, Truth::True) => Truth::True,
            (Truth::False, Truth::False) => Truth::False,
            _ => Truth::Unknown,
        }
    }

    pub fn not(self) -> Truth {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }

    /// A CHECK passes unless it evaluates to FALSE.
    pub fn passes(self) -> bool {
        self != Truth::False
    }
}

/// Evaluation context: the row under test and the frozen run date.
#[derive(Debug)]
pub struct EvalContext<'a> {
    pub row: &'a Row,
    pub run_date: NaiveDate,
}

impl<'a> EvalContext<'a> {
    pub fn new(row: &'a Row, run_date: NaiveDate) -> Self {
        Self { row, run_date }
    }
}

/// Evaluate an expression as a predicate.
pub fn eval_predicate(expr: &Expr, ctx: &EvalContext<'_>) -> Truth {
    match expr {
        Expr::Binary {
            op: BinaryOp::And,
            lhs,
            rhs,
        } => eval_predicate(lhs, ctx).and(eval_predicate(rhs, ctx)),
        Expr::Binary {
            op: BinaryOp::Or,
            lhs,
            rhs,
        } => eval_predicate(lhs, ctx).or(eval_predicate(rhs, ctx)),
        Expr::Unary {
            op: UnaryOp::Not,
            expr,
        } => eval_predicate(expr, ctx).not(),
        Expr::Binary { op, lhs, rhs } if op.is_comparison() => {
            let left = eval_value(lhs, ctx);
            let right = eval_value(rhs, ctx);
            compare_truth(left, right, *op)
        }
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let value = eval_value(expr, ctx);
            let lower = compare_truth(value.clone(), eval_value(low, ctx), BinaryOp::GtEq);
            let upper = compare_truth(value, eval_value(high, ctx), BinaryOp::LtEq);
            apply_negation(lower.and(upper), *negated)
        }
        Expr::InList {
            expr,
            items,
            negated,
        } => {
            let needle = match eval_value(expr, ctx) {
                Some(Value::Null) | None => return Truth::Unknown,
                Some(value) => value,
            };
            let mut saw_unknown = false;
            for item in items {
                match eval_value(item, ctx) {
                    Some(Value::Null) | None => saw_unknown = true,
                    Some(candidate) => match needle.compare(&candidate) {
                        Some(Ordering::Equal) => return apply_negation(Truth::True, *negated),
                        Some(_) => {}
                        None => saw_unknown = true,
                    },
                }
            }
            if saw_unknown {
                Truth::Unknown
            } else {
                apply_negation(Truth::False, *negated)
            }
        }
        Expr::Like {
            expr,
            pattern,
            negated,
        } => {
            let text = match eval_value(expr, ctx) {
                Some(Value::Text(text)) => text,
                Some(Value::Null) => return Truth::Unknown,
                _ => return Truth::Unknown,
            };
            let regex = like_to_regex(pattern);
            match Regex::new(&regex) {
                Ok(re) => apply_negation(Truth::from_bool(re.is_match(&text)), *negated),
                Err(_) => Truth::Unknown,
            }
        }
        Expr::Match {
            expr,
            pattern,
            negated,
        } => {
            let text = match eval_value(expr, ctx) {
                Some(Value::Text(text)) => text,
                Some(Value::Null) => return Truth::Unknown,
                _ => return Truth::Unknown,
            };
            match Regex::new(pattern) {
                Ok(re) => apply_negation(Truth::from_bool(re.is_match(&text)), *negated),
                Err(_) => Truth::Unknown,
            }
        }
        Expr::IsNull { expr, negated } => match eval_value(expr, ctx) {
            None => Truth::Unknown,
            Some(value) => apply_negation(Truth::from_bool(value.is_null()), *negated),
        },
        other => match eval_value(other, ctx) {
            Some(Value::Bool(value)) => Truth::from_bool(value),
            _ => Truth::Unknown,
        },
    }
}

/// Evaluate an expression to a value.
///
/// `None` means the expression could not be evaluated (type mismatch,
/// overflow, division by zero); `Some(Value::Null)` is SQL NULL. Both
/// surface as UNKNOWN in predicate position.
pub fn eval_value(expr: &Expr, ctx: &EvalContext<'_>) -> Option<Value> {
    match expr {
        Expr::Literal(value) => Some(value.clone()),
        Expr::Column(name) => Some(ctx.row.get(name).cloned().unwrap_or(Value::Null)),
        Expr::Unary {
            op: UnaryOp::Neg,
            expr,
        } => match eval_value(expr, ctx)? {
            Value::Null => Some(Value::Null),
            Value::Int(value) => value.checked_neg().map(Value::Int),
            Value::Decimal(value) => Some(Value::Decimal(-value)),
            _ => None,
        },
        Expr::Binary { op, lhs, rhs }
            if matches!(
                op,
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
            ) =>
        {
            let left = eval_value(lhs, ctx)?;
            let right = eval_value(rhs, ctx)?;
            if left.is_null() || right.is_null() {
                return Some(Value::Null);
            }
            arithmetic(&left, &right, *op)
        }
        Expr::Extract { part, expr } => {
            let value = eval_value(expr, ctx)?;
            if value.is_null() {
                return Some(Value::Null);
            }
            extract_part(&value, *part).map(Value::Int)
        }
        Expr::Func { func, args } => eval_func(*func, args, ctx),
        // Predicate-shaped nodes in value position collapse through
        // their truth value; UNKNOWN becomes NULL.
        predicate => match eval_predicate(predicate, ctx) {
            Truth::True => Some(Value::Bool(true)),
            Truth::False => Some(Value::Bool(false)),
            Truth::Unknown => Some(Value::Null),
        },
    }
}

fn eval_func(func: ScalarFunc, args: &[Expr], ctx: &EvalContext<'_>) -> Option<Value> {
    match func {
        ScalarFunc::CurrentDate => Some(Value::Date(ctx.run_date)),
        ScalarFunc::Date => {
            let value = eval_value(args.first()?, ctx)?;
            if value.is_null() {
                return Some(Value::Null);
            }
            value.as_date().map(Value::Date)
        }
        ScalarFunc::Length => {
            let value = eval_value(args.first()?, ctx)?;
            match value {
                Value::Null => Some(Value::Null),
                Value::Text(text) => Some(Value::Int(text.chars().count() as i64)),
                _ => None,
            }
        }
        ScalarFunc::Upper => text_func(args, ctx, |text| text.to_uppercase()),
        ScalarFunc::Lower => text_func(args, ctx, |text| text.to_lowercase()),
    }
}

fn text_func(
    args: &[Expr],
    ctx: &EvalContext<'_>,
    apply: impl Fn(&str) -> String,
) -> Option<Value> {
    let value = eval_value(args.first()?, ctx)?;
    match value {
        Value::Null => Some(Value::Null),
        Value::Text(text) => Some(Value::Text(apply(&text))),
        _ => None,
    }
}

fn arithmetic(left: &Value, right: &Value, op: BinaryOp) -> Option<Value> {
    // Decimal arithmetic as soon as either side is decimal.
    if matches!(left, Value::Decimal(_)) || matches!(right, Value::Decimal(_)) {
        let a = left.as_decimal()?;
        let b = right.as_decimal()?;
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => {
                if b == Decimal::ZERO {
                    None
                } else {
                    a.checked_div(b)
                }
            }
            BinaryOp::Rem => {
                if b == Decimal::ZERO {
                    None
                } else {
                    a.checked_rem(b)
                }
            }
            _ => None,
        };
        return result.map(Value::Decimal);
    }

    let a = left.as_i64()?;
    let b = right.as_i64()?;
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                None
            } else {
                a.checked_div(b)
            }
        }
        BinaryOp::Rem => {
            if b == 0 {
                None
            } else {
                a.checked_rem(b)
            }
        }
        _ => None,
    };
    result.map(Value::Int)
}

fn extract_part(value: &Value, part: DatePart) -> Option<i64> {
    match part {
        DatePart::Year => value.as_date().map(|d| d.year() as i64),
        DatePart::Month => value.as_date().map(|d| d.month() as i64),
        DatePart::Day => value.as_date().map(|d| d.day() as i64),
        DatePart::Hour | DatePart::Minute | DatePart::Second => {
            let time = match value {
                Value::Timestamp(ts) => ts.time(),
                Value::Time(time) => *time,
                // A bare date has a zero time component.
                Value::Date(_) => chrono::NaiveTime::from_hms_opt(0, 0, 0)?,
                _ => return None,
            };
            Some(match part {
                DatePart::Hour => time.hour() as i64,
                DatePart::Minute => time.minute() as i64,
                _ => time.second() as i64,
            })
        }
    }
}

fn compare_truth(left: Option<Value>, right: Option<Value>, op: BinaryOp) -> Truth {
    let (Some(left), Some(right)) = (left, right) else {
        return Truth::Unknown;
    };
    if left.is_null() || right.is_null() {
        return Truth::Unknown;
    }
    match left.compare(&right) {
        None => Truth::Unknown,
        Some(ordering) => {
            let result = match op {
                BinaryOp::Eq => ordering == Ordering::Equal,
                BinaryOp::NotEq => ordering != Ordering::Equal,
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::LtEq => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                BinaryOp::GtEq => ordering != Ordering::Less,
                _ => return Truth::Unknown,
            };
            Truth::from_bool(result)
        }
    }
}

fn apply_negation(truth: Truth, negated: bool) -> Truth {
    if negated {
        truth.not()
    } else {
        truth
    }
}

/// Translate a SQL LIKE pattern to an anchored regex. `%` matches any
/// run, `_` any single character; everything else is literal.
fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => {
                if regex_syntax_special(other) {
                    out.push('\\');
                }
                out.push(other);
            }
        }
    }
    out.push('$');
    out
}

fn regex_syntax_special(ch: char) -> bool {
    matches!(
        ch,
        '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|'
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ctx_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn check(expr_sql: &str, row: &Row) -> Truth {
        let ddl = format!("CREATE TABLE t (x INT, CHECK ({expr_sql}));");
        let outcome = rowforge_parse::parse_ddl(&ddl).expect("check parses");
        let table = outcome.schema.table("t").expect("table");
        let expr = &table.checks().next().expect("check").expr;
        let ctx = EvalContext::new(row, ctx_date());
        eval_predicate(expr, &ctx)
    }

    #[test]
    fn null_comparison_is_unknown_and_passes() {
        let row = row(&[("age", Value::Null)]);
        let truth = check("age >= 18", &row);
        assert_eq!(truth, Truth::Unknown);
        assert!(truth.passes());
    }

    #[test]
    fn kleene_and_or() {
        let row = row(&[("a", Value::Int(5)), ("b", Value::Null)]);
        assert_eq!(check("a > 0 AND b > 0", &row), Truth::Unknown);
        assert_eq!(check("a > 0 OR b > 0", &row), Truth::True);
        assert_eq!(check("a < 0 AND b > 0", &row), Truth::False);
        assert_eq!(check("NOT (b > 0)", &row), Truth::Unknown);
    }

    #[test]
    fn division_by_zero_is_unknown() {
        let row = row(&[("a", Value::Int(10)), ("b", Value::Int(0))]);
        assert_eq!(check("a / b > 1", &row), Truth::Unknown);
    }

    #[test]
    fn decimal_arithmetic_when_any_operand_is_decimal() {
        let row = row(&[(
            "price",
            Value::Decimal(Decimal::from_str("10.50").unwrap()),
        )]);
        assert_eq!(check("price * 2 = 21.00", &row), Truth::True);
    }

    #[test]
    fn integer_division_truncates() {
        let row = row(&[("a", Value::Int(7))]);
        assert_eq!(check("a / 2 = 3", &row), Truth::True);
    }

    #[test]
    fn between_is_inclusive() {
        let row1 = row(&[("age", Value::Int(18))]);
        assert_eq!(check("age BETWEEN 18 AND 30", &row1), Truth::True);
        let row2 = row(&[("age", Value::Int(31))]);
        assert_eq!(check("age BETWEEN 18 AND 30", &row2), Truth::False);
    }

    #[test]
    fn in_list_uses_typed_equality() {
        let row1 = row(&[("country", Value::Text("B".to_string()))]);
        assert_eq!(check("country IN ('A', 'B', 'C')", &row1), Truth::True);
        let row2 = row(&[("country", Value::Text("Z".to_string()))]);
        assert_eq!(check("country IN ('A', 'B', 'C')", &row2), Truth::False);
    }

    #[test]
    fn like_wildcards_are_case_sensitive() {
        let row = row(&[("email", Value::Text("ann@example.com".to_string()))]);
        assert_eq!(check("email LIKE '%@example.com'", &row), Truth::True);
        assert_eq!(check("email LIKE '%@EXAMPLE.com'", &row), Truth::False);
        assert_eq!(check("email LIKE 'ann@example.co_'", &row), Truth::True);
    }

    #[test]
    fn regex_match_and_negation() {
        let row1 = row(&[("isbn", Value::Text("9781234567890".to_string()))]);
        assert_eq!(check("isbn ~ '^[0-9]{13}$'", &row1), Truth::True);
        assert_eq!(check("isbn !~ '^[0-9]{13}$'", &row1), Truth::False);
        let row2 = row(&[("isbn", Value::Text("978-123456789".to_string()))]);
        assert_eq!(check("isbn ~ '^[0-9]{13}$'", &row2), Truth::False);
    }

    #[test]
    fn extract_year_and_current_date() {
        let row = row(&[(
            "birth",
            Value::Date(NaiveDate::from_ymd_opt(1990, 3, 20).unwrap()),
        )]);
        assert_eq!(check("EXTRACT(YEAR FROM birth) = 1990", &row), Truth::True);
        assert_eq!(check("birth < CURRENT_DATE", &row), Truth::True);
    }

    #[test]
    fn length_counts_characters() {
        let row = row(&[("code", Value::Text("héllo".to_string()))]);
        assert_eq!(check("LENGTH(code) = 5", &row), Truth::True);
    }

    #[test]
    fn type_mismatch_degrades_to_unknown() {
        let row = row(&[("a", Value::Text("oops".to_string()))]);
        let truth = check("a > 5", &row);
        assert_eq!(truth, Truth::Unknown);
        assert!(truth.passes());
    }

    #[test]
    fn date_function_coerces_strings() {
        let row = row(&[("when_text", Value::Text("2024-01-01".to_string()))]);
        assert_eq!(
            check("DATE(when_text) < CURRENT_DATE", &row),
            Truth::True
        );
    }

    #[test]
    fn is_null_postfix() {
        let row = row(&[("x", Value::Null)]);
        assert_eq!(check("x IS NULL", &row), Truth::True);
        assert_eq!(check("x IS NOT NULL", &row), Truth::False);
    }
}
