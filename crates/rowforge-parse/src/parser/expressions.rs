use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use rowforge_core::{BinaryOp, DatePart, Expr, ParseError, ScalarFunc, UnaryOp, Value};

use crate::token::{Keyword, TokenKind};

use super::Parser;

impl Parser {
    /// Parse a CHECK or DEFAULT expression (entry point).
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or_expression()
    }

    fn parse_or_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expression()?;
        while self.try_keyword(Keyword::Or) {
            let right = self.parse_and_expression()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not_expression()?;
        while self.try_keyword(Keyword::And) {
            let right = self.parse_not_expression()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not_expression(&mut self) -> Result<Expr, ParseError> {
        // NOT followed by BETWEEN/IN/LIKE/REGEXP belongs to the postfix
        // operator, not to a prefix negation.
        if self.check_keyword(Keyword::Not)
            && !matches!(
                self.peek_nth(1),
                TokenKind::Keyword(
                    Keyword::Between | Keyword::In | Keyword::Like | Keyword::Regexp
                )
            )
        {
            self.advance();
            let operand = self.parse_not_expression()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(operand),
            });
        }
        self.parse_comparison_expression()
    }

    fn parse_comparison_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive_expression()?;

        loop {
            let negated = self.check_keyword(Keyword::Not)
                && matches!(
                    self.peek_nth(1),
                    TokenKind::Keyword(
                        Keyword::Between | Keyword::In | Keyword::Like | Keyword::Regexp
                    )
                );
            if negated {
                self.advance();
            }

            if self.try_keyword(Keyword::Between) {
                let low = self.parse_additive_expression()?;
                self.expect_keyword(Keyword::And)?;
                let high = self.parse_additive_expression()?;
                left = Expr::Between {
                    expr: Box::new(left),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated,
                };
            } else if self.try_keyword(Keyword::In) {
                self.expect_kind(&TokenKind::LParen, "'('")?;
                let mut items = vec![self.parse_expression()?];
                while self.try_kind(&TokenKind::Comma) {
                    items.push(self.parse_expression()?);
                }
                self.expect_kind(&TokenKind::RParen, "')'")?;
                left = Expr::InList {
                    expr: Box::new(left),
                    items,
                    negated,
                };
            } else if self.try_keyword(Keyword::Like) {
                let pattern = self.expect_string("a LIKE pattern")?;
                left = Expr::Like {
                    expr: Box::new(left),
                    pattern,
                    negated,
                };
            } else if self.try_keyword(Keyword::Regexp) {
                let pattern = self.expect_string("a regex pattern")?;
                left = Expr::Match {
                    expr: Box::new(left),
                    pattern,
                    negated,
                };
            } else if self.try_keyword(Keyword::Is) {
                let is_negated = self.try_keyword(Keyword::Not);
                self.expect_keyword(Keyword::Null)?;
                left = Expr::IsNull {
                    expr: Box::new(left),
                    negated: is_negated,
                };
            } else if self.try_kind(&TokenKind::Tilde) {
                let pattern = self.expect_string("a regex pattern")?;
                left = Expr::Match {
                    expr: Box::new(left),
                    pattern,
                    negated: false,
                };
            } else if self.try_kind(&TokenKind::NotTilde) {
                let pattern = self.expect_string("a regex pattern")?;
                left = Expr::Match {
                    expr: Box::new(left),
                    pattern,
                    negated: true,
                };
            } else if let Some(op) = self.peek_comparison_op() {
                self.advance();
                let right = self.parse_additive_expression()?;
                left = Expr::Binary {
                    op,
                    lhs: Box::new(left),
                    rhs: Box::new(right),
                };
            } else {
                break;
            }
        }

        Ok(left)
    }

    fn peek_comparison_op(&self) -> Option<BinaryOp> {
        match self.peek() {
            TokenKind::Eq => Some(BinaryOp::Eq),
            TokenKind::NotEq => Some(BinaryOp::NotEq),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::LtEq => Some(BinaryOp::LtEq),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::GtEq => Some(BinaryOp::GtEq),
            _ => None,
        }
    }

    fn parse_additive_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative_expression()?;
        loop {
            let op = match self.peek() {
                TokenKind::Symbol('+') => BinaryOp::Add,
                TokenKind::Symbol('-') => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative_expression()?;
            left = Expr::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expression()?;
        loop {
            let op = match self.peek() {
                TokenKind::Symbol('*') => BinaryOp::Mul,
                TokenKind::Symbol('/') => BinaryOp::Div,
                TokenKind::Symbol('%') => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary_expression()?;
            left = Expr::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), TokenKind::Symbol('-')) {
            self.advance();
            let operand = self.parse_unary_expression()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(operand),
            });
        }
        self.parse_primary_expression()
    }

    fn parse_primary_expression(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            TokenKind::Number(text) => {
                self.advance();
                Ok(Expr::Literal(self.numeric_literal(&text)?))
            }
            TokenKind::Str(text) => {
                self.advance();
                Ok(Expr::Literal(Value::Text(text)))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            TokenKind::Keyword(Keyword::CurrentDate) => {
                self.advance();
                Ok(Expr::Func {
                    func: ScalarFunc::CurrentDate,
                    args: Vec::new(),
                })
            }
            TokenKind::Keyword(Keyword::Date) => self.parse_date_expression(),
            TokenKind::Keyword(Keyword::Extract) => self.parse_extract_expression(),
            TokenKind::Ident(name) => {
                self.advance();
                if matches!(self.peek(), TokenKind::LParen) {
                    self.parse_function_call(&name)
                } else {
                    Ok(Expr::Column(name))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_kind(&TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            _ => Err(self.error_expected("an expression")),
        }
    }

    /// `DATE 'yyyy-mm-dd'` literal or `DATE(x)` coercion call.
    fn parse_date_expression(&mut self) -> Result<Expr, ParseError> {
        self.advance();
        match self.peek().clone() {
            TokenKind::Str(text) => {
                let parsed = NaiveDate::parse_from_str(&text, "%Y-%m-%d");
                let token = self.advance();
                let date = parsed.map_err(|_| {
                    ParseError::new(
                        token.line,
                        token.column,
                        "a date literal 'YYYY-MM-DD'",
                        format!("'{text}'"),
                    )
                })?;
                Ok(Expr::Literal(Value::Date(date)))
            }
            TokenKind::LParen => {
                self.advance();
                let arg = self.parse_expression()?;
                self.expect_kind(&TokenKind::RParen, "')'")?;
                Ok(Expr::Func {
                    func: ScalarFunc::Date,
                    args: vec![arg],
                })
            }
            _ => Err(self.error_expected("a date literal or '('")),
        }
    }

    fn parse_extract_expression(&mut self) -> Result<Expr, ParseError> {
        self.advance();
        self.expect_kind(&TokenKind::LParen, "'('")?;
        let part_token = self.advance();
        let part_name = match part_token.kind {
            TokenKind::Ident(name) => name,
            TokenKind::Str(name) => name,
            other => {
                return Err(ParseError::new(
                    part_token.line,
                    part_token.column,
                    "a date part",
                    other.to_string(),
                ))
            }
        };
        let part = match part_name.to_ascii_uppercase().as_str() {
            "YEAR" => DatePart::Year,
            "MONTH" => DatePart::Month,
            "DAY" => DatePart::Day,
            "HOUR" => DatePart::Hour,
            "MINUTE" => DatePart::Minute,
            "SECOND" => DatePart::Second,
            _ => {
                return Err(ParseError::new(
                    part_token.line,
                    part_token.column,
                    "YEAR, MONTH, DAY, HOUR, MINUTE, or SECOND",
                    format!("'{part_name}'"),
                ))
            }
        };
        self.expect_keyword(Keyword::From)?;
        let source = self.parse_expression()?;
        self.expect_kind(&TokenKind::RParen, "')'")?;
        Ok(Expr::Extract {
            part,
            expr: Box::new(source),
        })
    }

    fn parse_function_call(&mut self, name: &str) -> Result<Expr, ParseError> {
        let func = match name.to_ascii_uppercase().as_str() {
            "LENGTH" => ScalarFunc::Length,
            "UPPER" => ScalarFunc::Upper,
            "LOWER" => ScalarFunc::Lower,
            _ => {
                return Err(self.error_expected("LENGTH, UPPER, LOWER, DATE, or EXTRACT"));
            }
        };
        self.expect_kind(&TokenKind::LParen, "'('")?;
        let arg = self.parse_expression()?;
        self.expect_kind(&TokenKind::RParen, "')'")?;
        Ok(Expr::Func {
            func,
            args: vec![arg],
        })
    }

    fn numeric_literal(&self, text: &str) -> Result<Value, ParseError> {
        if !text.contains('.') {
            if let Ok(value) = text.parse::<i64>() {
                return Ok(Value::Int(value));
            }
        }
        Decimal::from_str(text)
            .map(Value::Decimal)
            .map_err(|_| self.error_expected("a numeric literal"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_expr(input: &str) -> Expr {
        let tokens = Lexer::new(input).tokenize().expect("lexes");
        let mut parser = Parser::new(tokens);
        parser.parse_expression().expect("parses")
    }

    #[test]
    fn precedence_binds_and_over_or() {
        let expr = parse_expr("a = 1 OR b = 2 AND c = 3");
        match expr {
            Expr::Binary {
                op: BinaryOp::Or,
                rhs,
                ..
            } => assert!(matches!(
                *rhs,
                Expr::Binary {
                    op: BinaryOp::And,
                    ..
                }
            )),
            other => panic!("expected OR at the root, got {other:?}"),
        }
    }

    #[test]
    fn between_is_inclusive_range_node() {
        let expr = parse_expr("age BETWEEN 18 AND 30");
        match expr {
            Expr::Between { negated, low, high, .. } => {
                assert!(!negated);
                assert_eq!(*low, Expr::Literal(Value::Int(18)));
                assert_eq!(*high, Expr::Literal(Value::Int(30)));
            }
            other => panic!("expected BETWEEN, got {other:?}"),
        }
    }

    #[test]
    fn not_in_negates_the_list() {
        let expr = parse_expr("country NOT IN ('A', 'B')");
        assert!(matches!(expr, Expr::InList { negated: true, .. }));
    }

    #[test]
    fn tilde_parses_as_regex_match() {
        let expr = parse_expr("isbn ~ '^[0-9]{13}$'");
        match expr {
            Expr::Match {
                pattern, negated, ..
            } => {
                assert_eq!(pattern, "^[0-9]{13}$");
                assert!(!negated);
            }
            other => panic!("expected regex match, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_precedence_over_comparison() {
        let expr = parse_expr("price * quantity >= 10 + 5");
        match expr {
            Expr::Binary {
                op: BinaryOp::GtEq,
                lhs,
                rhs,
            } => {
                assert!(matches!(
                    *lhs,
                    Expr::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
                assert!(matches!(
                    *rhs,
                    Expr::Binary {
                        op: BinaryOp::Add,
                        ..
                    }
                ));
            }
            other => panic!("expected comparison at root, got {other:?}"),
        }
    }

    #[test]
    fn date_literal_parses() {
        let expr = parse_expr("DATE '2024-01-15'");
        assert_eq!(
            expr,
            Expr::Literal(Value::Date(
                NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
            ))
        );
    }

    #[test]
    fn extract_year_from_column() {
        let expr = parse_expr("EXTRACT(YEAR FROM birth_date) > 1990");
        match expr {
            Expr::Binary { lhs, .. } => match *lhs {
                Expr::Extract { part, expr } => {
                    assert_eq!(part, DatePart::Year);
                    assert_eq!(*expr, Expr::Column("birth_date".to_string()));
                }
                other => panic!("expected EXTRACT, got {other:?}"),
            },
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn is_not_null_postfix() {
        let expr = parse_expr("email IS NOT NULL");
        assert!(matches!(expr, Expr::IsNull { negated: true, .. }));
    }

    #[test]
    fn decimal_literals_keep_scale() {
        let expr = parse_expr("price > 10.50");
        match expr {
            Expr::Binary { rhs, .. } => {
                assert_eq!(
                    *rhs,
                    Expr::Literal(Value::Decimal(Decimal::from_str("10.50").unwrap()))
                );
            }
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn unknown_function_is_a_parse_error() {
        let tokens = Lexer::new("FOO(x) > 1").tokenize().expect("lexes");
        let mut parser = Parser::new(tokens);
        assert!(parser.parse_expression().is_err());
    }
}
