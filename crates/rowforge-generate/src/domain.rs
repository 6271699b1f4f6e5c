//! Per-column value domains derived from CHECK predicates and types.
//!
//! Domains are advisory: they bias samplers toward values that will
//! survive validation, but the evaluator stays authoritative. Extraction
//! is conservative — only leaves on the top-level AND spine that mention
//! a single column tighten its domain; anything under an OR is ignored.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;

use rowforge_core::{BinaryOp, ColumnDef, Expr, ScalarFunc, Schema, TableDef, TypeTag, Value};

use crate::eval::{eval_value, EvalContext, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKind {
    Numeric,
    Text,
    Date,
    Enumerated,
    Any,
}

/// Conservative value set for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDomain {
    pub kind: DomainKind,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub inclusive_min: bool,
    pub inclusive_max: bool,
    pub enum_values: Option<Vec<Value>>,
    pub pattern: Option<String>,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
    pub nullable: bool,
}

impl ValueDomain {
    fn unconstrained(kind: DomainKind, nullable: bool) -> Self {
        ValueDomain {
            kind,
            min: None,
            max: None,
            inclusive_min: true,
            inclusive_max: true,
            enum_values: None,
            pattern: None,
            min_length: None,
            max_length: None,
            nullable,
        }
    }

    /// True when a value sits inside the extracted bounds. Used by
    /// tests to assert domain pre-filtering; NULL is in-domain iff the
    /// column is nullable.
    pub fn contains(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.nullable;
        }
        if let Some(values) = &self.enum_values {
            return values
                .iter()
                .any(|allowed| allowed.compare(value) == Some(Ordering::Equal));
        }
        if let Some(min) = &self.min {
            match value.compare(min) {
                Some(Ordering::Less) => return false,
                Some(Ordering::Equal) if !self.inclusive_min => return false,
                None => return false,
                _ => {}
            }
        }
        if let Some(max) = &self.max {
            match value.compare(max) {
                Some(Ordering::Greater) => return false,
                Some(Ordering::Equal) if !self.inclusive_max => return false,
                None => return false,
                _ => {}
            }
        }
        if let Some(max_length) = self.max_length {
            if let Value::Text(text) = value {
                if text.chars().count() as u32 > max_length {
                    return false;
                }
            }
        }
        true
    }
}

/// Domains for every column of every table, derived once post-parse.
pub fn extract_domains(
    schema: &Schema,
    run_date: NaiveDate,
) -> HashMap<String, HashMap<String, ValueDomain>> {
    let mut out = HashMap::new();
    for (table_name, table) in &schema.tables {
        let mut columns = HashMap::new();
        for column in &table.columns {
            columns.insert(
                column.name.clone(),
                extract_domain(table, column, run_date),
            );
        }
        out.insert(table_name.clone(), columns);
    }
    out
}

/// Derive one column's domain from its type and the table's CHECKs.
pub fn extract_domain(table: &TableDef, column: &ColumnDef, run_date: NaiveDate) -> ValueDomain {
    let mut domain = type_default_domain(column, run_date);
    for check in table.checks() {
        apply_expression(&mut domain, &check.expr, &column.name, run_date);
    }
    domain
}

/// Tighten a copy of `base` with the conjuncts of one failing predicate.
/// Used by the repair loop's domain-narrowing retry.
pub fn narrowed_domain(
    base: &ValueDomain,
    expr: &Expr,
    column: &str,
    run_date: NaiveDate,
) -> ValueDomain {
    let mut domain = base.clone();
    apply_expression(&mut domain, expr, column, run_date);
    domain
}

fn apply_expression(domain: &mut ValueDomain, expr: &Expr, column: &str, run_date: NaiveDate) {
    for leaf in expr.conjuncts() {
        let mentioned = leaf.columns();
        if mentioned.len() != 1 || !mentioned.contains(column) {
            continue;
        }
        apply_leaf(domain, leaf, column, run_date);
    }
}

fn apply_leaf(domain: &mut ValueDomain, leaf: &Expr, column: &str, run_date: NaiveDate) {
    match leaf {
        Expr::Binary { op, lhs, rhs } if op.is_comparison() => {
            // LENGTH(col) op const
            if let Some(inner) = length_arg(lhs) {
                if inner == column {
                    if let Some(bound) = const_u32(rhs, run_date) {
                        apply_length_bound(domain, *op, bound);
                    }
                    return;
                }
            }
            if let Some(inner) = length_arg(rhs) {
                if inner == column {
                    if let Some(bound) = const_u32(lhs, run_date) {
                        apply_length_bound(domain, flip(*op), bound);
                    }
                    return;
                }
            }
            // col op const / const op col
            if let (Expr::Column(name), Some(value)) = (lhs.as_ref(), const_value(rhs, run_date)) {
                if name == column {
                    apply_comparison(domain, *op, value);
                }
            } else if let (Some(value), Expr::Column(name)) =
                (const_value(lhs, run_date), rhs.as_ref())
            {
                if name == column {
                    apply_comparison(domain, flip(*op), value);
                }
            }
        }
        Expr::Between {
            expr,
            low,
            high,
            negated: false,
        } => {
            if let Expr::Column(name) = expr.as_ref() {
                if name == column {
                    if let Some(low) = const_value(low, run_date) {
                        tighten_min(domain, low, true);
                    }
                    if let Some(high) = const_value(high, run_date) {
                        tighten_max(domain, high, true);
                    }
                }
            }
        }
        Expr::InList {
            expr,
            items,
            negated: false,
        } => {
            if let Expr::Column(name) = expr.as_ref() {
                if name == column {
                    let values: Vec<Value> = items
                        .iter()
                        .filter_map(|item| const_value(item, run_date))
                        .collect();
                    if values.len() == items.len() {
                        intersect_enum(domain, values);
                    }
                }
            }
        }
        Expr::Match {
            expr,
            pattern,
            negated: false,
        } => {
            if let Expr::Column(name) = expr.as_ref() {
                if name == column && domain.pattern.is_none() {
                    domain.pattern = Some(pattern.clone());
                }
            }
        }
        _ => {}
    }
}

fn apply_comparison(domain: &mut ValueDomain, op: BinaryOp, value: Value) {
    match op {
        BinaryOp::Eq => {
            intersect_enum(domain, vec![value.clone()]);
            tighten_min(domain, value.clone(), true);
            tighten_max(domain, value, true);
        }
        BinaryOp::Gt => tighten_min(domain, value, false),
        BinaryOp::GtEq => tighten_min(domain, value, true),
        BinaryOp::Lt => tighten_max(domain, value, false),
        BinaryOp::LtEq => tighten_max(domain, value, true),
        _ => {}
    }
}

fn apply_length_bound(domain: &mut ValueDomain, op: BinaryOp, bound: u32) {
    match op {
        BinaryOp::Eq => {
            domain.min_length = Some(bound);
            domain.max_length = Some(match domain.max_length {
                Some(existing) => existing.min(bound),
                None => bound,
            });
        }
        BinaryOp::Lt => apply_length_bound(domain, BinaryOp::LtEq, bound.saturating_sub(1)),
        BinaryOp::LtEq => {
            domain.max_length = Some(match domain.max_length {
                Some(existing) => existing.min(bound),
                None => bound,
            });
        }
        BinaryOp::Gt => apply_length_bound(domain, BinaryOp::GtEq, bound.saturating_add(1)),
        BinaryOp::GtEq => {
            domain.min_length = Some(match domain.min_length {
                Some(existing) => existing.max(bound),
                None => bound,
            });
        }
        _ => {}
    }
}

fn tighten_min(domain: &mut ValueDomain, candidate: Value, inclusive: bool) {
    let replace = match &domain.min {
        None => true,
        Some(current) => match candidate.compare(current) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => !inclusive && domain.inclusive_min,
            _ => false,
        },
    };
    if replace {
        domain.min = Some(candidate);
        domain.inclusive_min = inclusive;
    }
}

fn tighten_max(domain: &mut ValueDomain, candidate: Value, inclusive: bool) {
    let replace = match &domain.max {
        None => true,
        Some(current) => match candidate.compare(current) {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => !inclusive && domain.inclusive_max,
            _ => false,
        },
    };
    if replace {
        domain.max = Some(candidate);
        domain.inclusive_max = inclusive;
    }
}

fn intersect_enum(domain: &mut ValueDomain, values: Vec<Value>) {
    domain.kind = DomainKind::Enumerated;
    match &domain.enum_values {
        None => domain.enum_values = Some(values),
        Some(existing) => {
            let kept: Vec<Value> = existing
                .iter()
                .filter(|current| {
                    values
                        .iter()
                        .any(|candidate| current.compare(candidate) == Some(Ordering::Equal))
                })
                .cloned()
                .collect();
            domain.enum_values = Some(kept);
        }
    }
}

fn length_arg(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Func {
            func: ScalarFunc::Length,
            args,
        } => match args.first() {
            Some(Expr::Column(name)) => Some(name.as_str()),
            _ => None,
        },
        _ => None,
    }
}

fn const_value(expr: &Expr, run_date: NaiveDate) -> Option<Value> {
    if !expr.is_constant() {
        return None;
    }
    let empty = Row::new();
    let ctx = EvalContext::new(&empty, run_date);
    match eval_value(expr, &ctx) {
        Some(Value::Null) | None => None,
        Some(value) => Some(value),
    }
}

fn const_u32(expr: &Expr, run_date: NaiveDate) -> Option<u32> {
    match const_value(expr, run_date)? {
        Value::Int(value) => u32::try_from(value).ok(),
        _ => None,
    }
}

fn flip(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::LtEq => BinaryOp::GtEq,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::GtEq => BinaryOp::LtEq,
        other => other,
    }
}

/// Default domain from the declared type alone.
pub fn type_default_domain(column: &ColumnDef, run_date: NaiveDate) -> ValueDomain {
    let nullable = column.nullable;
    match &column.type_tag {
        TypeTag::Integer | TypeTag::Serial => {
            let mut domain = ValueDomain::unconstrained(DomainKind::Numeric, nullable);
            domain.min = Some(Value::Int(-(i32::MAX as i64)));
            domain.max = Some(Value::Int(i32::MAX as i64));
            domain
        }
        TypeTag::Decimal { precision, scale } => {
            let mut domain = ValueDomain::unconstrained(DomainKind::Numeric, nullable);
            let digits = precision.saturating_sub(*scale).min(18);
            let magnitude = 10_i64.checked_pow(digits).map(|p| p - 1).unwrap_or(i64::MAX);
            domain.min = Some(Value::Decimal(Decimal::ZERO));
            domain.max = Some(Value::Decimal(Decimal::from(magnitude)));
            domain
        }
        TypeTag::Date | TypeTag::Timestamp => {
            let mut domain = ValueDomain::unconstrained(DomainKind::Date, nullable);
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");
            let horizon = run_date
                .checked_add_months(Months::new(120))
                .unwrap_or(run_date);
            domain.min = Some(Value::Date(epoch));
            domain.max = Some(Value::Date(horizon));
            domain
        }
        TypeTag::Varchar(limit) => {
            let mut domain = ValueDomain::unconstrained(DomainKind::Text, nullable);
            domain.max_length = *limit;
            domain
        }
        TypeTag::Char(len) => {
            let mut domain = ValueDomain::unconstrained(DomainKind::Text, nullable);
            domain.min_length = Some(*len);
            domain.max_length = Some(*len);
            domain
        }
        TypeTag::Text | TypeTag::Opaque(_) => {
            ValueDomain::unconstrained(DomainKind::Text, nullable)
        }
        TypeTag::Enum(values) => {
            let mut domain = ValueDomain::unconstrained(DomainKind::Enumerated, nullable);
            domain.enum_values = Some(
                values
                    .iter()
                    .map(|label| Value::Text(label.clone()))
                    .collect(),
            );
            domain
        }
        TypeTag::Time | TypeTag::Boolean => ValueDomain::unconstrained(DomainKind::Any, nullable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowforge_parse::parse_ddl;

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn domain_for(ddl: &str, table: &str, column: &str) -> ValueDomain {
        let outcome = parse_ddl(ddl).expect("ddl parses");
        let table = outcome.schema.table(table).expect("table exists");
        let column = table.column(column).expect("column exists");
        extract_domain(table, column, run_date())
    }

    #[test]
    fn conjunctive_bounds_intersect() {
        let domain = domain_for(
            "CREATE TABLE t (age INT CHECK (age >= 18 AND age <= 30));",
            "t",
            "age",
        );
        assert_eq!(domain.min, Some(Value::Int(18)));
        assert_eq!(domain.max, Some(Value::Int(30)));
        assert!(domain.inclusive_min && domain.inclusive_max);
    }

    #[test]
    fn strict_bounds_are_exclusive() {
        let domain = domain_for(
            "CREATE TABLE t (price DECIMAL(5, 2) CHECK (price > 100 AND price < 50));",
            "t",
            "price",
        );
        assert_eq!(domain.min, Some(Value::Int(100)));
        assert!(!domain.inclusive_min);
        assert_eq!(domain.max, Some(Value::Int(50)));
        assert!(!domain.inclusive_max);
    }

    #[test]
    fn reversed_comparison_flips() {
        let domain = domain_for("CREATE TABLE t (n INT CHECK (100 >= n));", "t", "n");
        assert_eq!(domain.max, Some(Value::Int(100)));
        assert!(domain.inclusive_max);
    }

    #[test]
    fn in_list_becomes_enum() {
        let domain = domain_for(
            "CREATE TABLE t (country VARCHAR(20) CHECK (country IN ('A', 'B', 'C')));",
            "t",
            "country",
        );
        let values = domain.enum_values.expect("enum extracted");
        assert_eq!(values.len(), 3);
        assert!(values.contains(&Value::Text("B".to_string())));
    }

    #[test]
    fn disjunctions_are_ignored() {
        let domain = domain_for(
            "CREATE TABLE t (n INT CHECK (n < 10 OR n > 100));",
            "t",
            "n",
        );
        // Bounds stay at the integer type defaults.
        assert_eq!(domain.min, Some(Value::Int(-(i32::MAX as i64))));
        assert_eq!(domain.max, Some(Value::Int(i32::MAX as i64)));
    }

    #[test]
    fn regex_pattern_is_captured() {
        let domain = domain_for(
            "CREATE TABLE t (isbn VARCHAR(13) CHECK (isbn ~ '^[0-9]{13}$'));",
            "t",
            "isbn",
        );
        assert_eq!(domain.pattern.as_deref(), Some("^[0-9]{13}$"));
        assert_eq!(domain.max_length, Some(13));
    }

    #[test]
    fn length_bounds_apply() {
        let domain = domain_for(
            "CREATE TABLE t (code VARCHAR(30) CHECK (LENGTH(code) >= 5 AND LENGTH(code) < 11));",
            "t",
            "code",
        );
        assert_eq!(domain.min_length, Some(5));
        assert_eq!(domain.max_length, Some(10));
    }

    #[test]
    fn date_bounds_from_checks() {
        let domain = domain_for(
            "CREATE TABLE t (d DATE CHECK (d >= DATE '2020-01-01'));",
            "t",
            "d",
        );
        assert_eq!(
            domain.min,
            Some(Value::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()))
        );
    }

    #[test]
    fn multi_column_leaves_do_not_tighten() {
        let domain = domain_for(
            "CREATE TABLE t (a INT, b INT, CHECK (a < b));",
            "t",
            "a",
        );
        assert_eq!(domain.min, Some(Value::Int(-(i32::MAX as i64))));
    }

    #[test]
    fn contains_respects_exclusive_bounds() {
        let domain = domain_for("CREATE TABLE t (n INT CHECK (n > 5));", "t", "n");
        assert!(!domain.contains(&Value::Int(5)));
        assert!(domain.contains(&Value::Int(6)));
    }
}
