use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Logical NOT (Kleene).
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }
}

/// Field argument of `EXTRACT(part FROM expr)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePart {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

/// Scalar functions supported inside CHECK predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarFunc {
    /// `DATE(x)` — coerce string/timestamp to date.
    Date,
    /// `LENGTH(x)` — character count.
    Length,
    /// `CURRENT_DATE` — frozen to the run date.
    CurrentDate,
    Upper,
    Lower,
}

/// Parsed CHECK-constraint expression, retained as structure so the
/// evaluator and the domain extractor traverse the same tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(Value),
    /// Column reference, resolved against the enclosing table.
    Column(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `expr [NOT] BETWEEN low AND high`, bounds inclusive.
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    /// `expr [NOT] IN (items...)`, typed equality.
    InList {
        expr: Box<Expr>,
        items: Vec<Expr>,
        negated: bool,
    },
    /// `expr [NOT] LIKE 'pattern'` with `%` and `_` wildcards.
    Like {
        expr: Box<Expr>,
        pattern: String,
        negated: bool,
    },
    /// Regex match, spelled `~`, `!~`, or `REGEXP`.
    Match {
        expr: Box<Expr>,
        pattern: String,
        negated: bool,
    },
    /// `expr IS [NOT] NULL`.
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Extract {
        part: DatePart,
        expr: Box<Expr>,
    },
    Func {
        func: ScalarFunc,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// All column names referenced anywhere in the expression, ordered.
    pub fn columns(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Column(name) => {
                out.insert(name.as_str());
            }
            Expr::Unary { expr, .. } => expr.collect_columns(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.collect_columns(out);
                low.collect_columns(out);
                high.collect_columns(out);
            }
            Expr::InList { expr, items, .. } => {
                expr.collect_columns(out);
                for item in items {
                    item.collect_columns(out);
                }
            }
            Expr::Like { expr, .. } | Expr::Match { expr, .. } | Expr::IsNull { expr, .. } => {
                expr.collect_columns(out)
            }
            Expr::Extract { expr, .. } => expr.collect_columns(out),
            Expr::Func { args, .. } => {
                for arg in args {
                    arg.collect_columns(out);
                }
            }
        }
    }

    /// True when the expression references no columns at all.
    pub fn is_constant(&self) -> bool {
        self.columns().is_empty()
    }

    /// Flatten the top-level AND spine into its conjuncts.
    ///
    /// Disjunctions and other nodes stay intact as single conjuncts; the
    /// domain extractor only trusts what holds unconditionally.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts<'a>(&'a self, out: &mut Vec<&'a Expr>) {
        match self {
            Expr::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => {
                lhs.collect_conjuncts(out);
                rhs.collect_conjuncts(out);
            }
            other => out.push(other),
        }
    }
}

impl std::fmt::Display for Expr {
    /// SQL-flavored rendering, used in diagnostics and underfill reports.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Literal(Value::Null) => write!(f, "NULL"),
            Expr::Literal(Value::Bool(b)) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Expr::Literal(Value::Int(v)) => write!(f, "{v}"),
            Expr::Literal(Value::Decimal(v)) => write!(f, "{v}"),
            Expr::Literal(Value::Text(v)) => write!(f, "'{}'", v.replace('\'', "''")),
            Expr::Literal(Value::Date(v)) => write!(f, "DATE '{}'", v.format("%Y-%m-%d")),
            Expr::Literal(Value::Time(v)) => write!(f, "'{}'", v.format("%H:%M:%S")),
            Expr::Literal(Value::Timestamp(v)) => {
                write!(f, "'{}'", v.format("%Y-%m-%d %H:%M:%S"))
            }
            Expr::Column(name) => write!(f, "{name}"),
            Expr::Unary { op: UnaryOp::Neg, expr } => write!(f, "-{expr}"),
            Expr::Unary { op: UnaryOp::Not, expr } => write!(f, "NOT ({expr})"),
            Expr::Binary { op, lhs, rhs } => {
                let symbol = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                    BinaryOp::Rem => "%",
                    BinaryOp::Eq => "=",
                    BinaryOp::NotEq => "<>",
                    BinaryOp::Lt => "<",
                    BinaryOp::LtEq => "<=",
                    BinaryOp::Gt => ">",
                    BinaryOp::GtEq => ">=",
                    BinaryOp::And => "AND",
                    BinaryOp::Or => "OR",
                };
                write!(f, "{lhs} {symbol} {rhs}")
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{expr} {not}BETWEEN {low} AND {high}")
            }
            Expr::InList {
                expr,
                items,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{expr} {not}IN (")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{expr} {not}LIKE '{pattern}'")
            }
            Expr::Match {
                expr,
                pattern,
                negated,
            } => {
                let op = if *negated { "!~" } else { "~" };
                write!(f, "{expr} {op} '{pattern}'")
            }
            Expr::IsNull { expr, negated } => {
                let not = if *negated { " NOT" } else { "" };
                write!(f, "{expr} IS{not} NULL")
            }
            Expr::Extract { part, expr } => {
                let name = match part {
                    DatePart::Year => "YEAR",
                    DatePart::Month => "MONTH",
                    DatePart::Day => "DAY",
                    DatePart::Hour => "HOUR",
                    DatePart::Minute => "MINUTE",
                    DatePart::Second => "SECOND",
                };
                write!(f, "EXTRACT({name} FROM {expr})")
            }
            Expr::Func { func, args } => {
                let name = match func {
                    ScalarFunc::Date => "DATE",
                    ScalarFunc::Length => "LENGTH",
                    ScalarFunc::CurrentDate => return write!(f, "CURRENT_DATE"),
                    ScalarFunc::Upper => "UPPER",
                    ScalarFunc::Lower => "LOWER",
                };
                write!(f, "{name}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> Expr {
        Expr::Column(name.to_string())
    }

    fn int(value: i64) -> Expr {
        Expr::Literal(Value::Int(value))
    }

    fn and(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op: BinaryOp::And,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn ge(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op: BinaryOp::GtEq,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    #[test]
    fn columns_walks_nested_expressions() {
        let expr = and(
            ge(col("age"), int(18)),
            Expr::InList {
                expr: Box::new(col("country")),
                items: vec![Expr::Literal(Value::Text("A".into()))],
                negated: false,
            },
        );
        let cols: Vec<&str> = expr.columns().into_iter().collect();
        assert_eq!(cols, vec!["age", "country"]);
    }

    #[test]
    fn conjuncts_flattens_and_spine_only() {
        let expr = and(
            and(ge(col("a"), int(1)), ge(col("b"), int(2))),
            Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(ge(col("c"), int(3))),
                rhs: Box::new(ge(col("d"), int(4))),
            },
        );
        let parts = expr.conjuncts();
        assert_eq!(parts.len(), 3);
        assert!(matches!(
            parts[2],
            Expr::Binary {
                op: BinaryOp::Or,
                ..
            }
        ));
    }
}
