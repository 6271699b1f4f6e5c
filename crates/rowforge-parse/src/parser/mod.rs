use std::fmt;

use tracing::debug;

use rowforge_core::{
    CheckConstraint, ColumnDef, FkAction, ForeignKey, ParseError, Schema, TableConstraint,
    TableDef, TypeTag,
};

use crate::lexer::Lexer;
use crate::token::{Keyword, Token, TokenKind};

mod expressions;

/// Non-fatal diagnostics collected while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    /// The column's declared type is not in the normalized set; the
    /// column falls back to a plain string sampler.
    UnknownType {
        table: String,
        column: String,
        raw: String,
    },
    /// An unsigned integer type was collapsed to INTEGER, losing range.
    UnsignedNormalized { table: String, column: String },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::UnknownType { table, column, raw } => {
                write!(f, "unknown type '{raw}' on {table}.{column}; using string fallback")
            }
            ParseWarning::UnsignedNormalized { table, column } => {
                write!(f, "unsigned type on {table}.{column} normalized to INTEGER")
            }
        }
    }
}

/// Result of parsing a DDL script: the schema plus collected warnings.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub schema: Schema,
    pub warnings: Vec<ParseWarning>,
}

/// Parse a UTF-8 script of `CREATE TABLE` statements into a [`Schema`].
///
/// Statements other than `CREATE TABLE` are skipped; a malformed
/// `CREATE TABLE` body is a fatal [`ParseError`].
pub fn parse_ddl(sql: &str) -> Result<ParseOutcome, ParseError> {
    let tokens = Lexer::new(sql).tokenize()?;
    Parser::new(tokens).parse_script()
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    position: usize,
    warnings: Vec<ParseWarning>,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            position: 0,
            warnings: Vec::new(),
        }
    }

    fn parse_script(mut self) -> Result<ParseOutcome, ParseError> {
        let mut schema = Schema::new();
        loop {
            while self.try_kind(&TokenKind::Semicolon) {}
            if matches!(self.peek(), TokenKind::Eof) {
                break;
            }
            if self.check_keyword(Keyword::Create)
                && matches!(self.peek_nth(1), TokenKind::Keyword(Keyword::Table))
            {
                let table = self.parse_create_table()?;
                schema.insert_table(table);
            } else {
                self.skip_statement();
            }
        }
        Ok(ParseOutcome {
            schema,
            warnings: self.warnings,
        })
    }

    /// Skip a statement this parser does not model (e.g. CREATE INDEX).
    fn skip_statement(&mut self) {
        debug!(token = %self.peek(), "skipping non-CREATE TABLE statement");
        loop {
            match self.peek() {
                TokenKind::Eof => break,
                TokenKind::Semicolon => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_create_table(&mut self) -> Result<TableDef, ParseError> {
        self.expect_keyword(Keyword::Create)?;
        self.expect_keyword(Keyword::Table)?;
        if self.try_keyword(Keyword::If) {
            self.expect_keyword(Keyword::Not)?;
            self.expect_keyword(Keyword::Exists)?;
        }
        let name = self.expect_ident("table name")?;
        self.expect_kind(&TokenKind::LParen, "'('")?;

        let mut columns: Vec<ColumnDef> = Vec::new();
        let mut constraints: Vec<TableConstraint> = Vec::new();
        let mut primary_key: Option<Vec<String>> = None;

        loop {
            if self.at_table_constraint() {
                self.parse_table_constraint(&mut constraints, &mut primary_key)?;
            } else {
                let (column, mut inline) = self.parse_column_def(&name, &mut primary_key)?;
                columns.push(column);
                constraints.append(&mut inline);
            }
            if self.try_kind(&TokenKind::Comma) {
                continue;
            }
            self.expect_kind(&TokenKind::RParen, "',' or ')'")?;
            break;
        }

        if let Some(pk_columns) = primary_key {
            for pk_column in &pk_columns {
                if let Some(column) = columns.iter_mut().find(|c| &c.name == pk_column) {
                    column.nullable = false;
                }
            }
            constraints.insert(0, TableConstraint::PrimaryKey {
                columns: pk_columns,
            });
        }

        Ok(TableDef {
            name,
            columns,
            constraints,
        })
    }

    fn at_table_constraint(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Keyword(
                Keyword::Constraint
                    | Keyword::Primary
                    | Keyword::Unique
                    | Keyword::Foreign
                    | Keyword::Check
            )
        )
    }

    fn parse_table_constraint(
        &mut self,
        constraints: &mut Vec<TableConstraint>,
        primary_key: &mut Option<Vec<String>>,
    ) -> Result<(), ParseError> {
        let name = if self.try_keyword(Keyword::Constraint) {
            Some(self.expect_ident("constraint name")?)
        } else {
            None
        };

        if self.try_keyword(Keyword::Primary) {
            self.expect_keyword(Keyword::Key)?;
            let columns = self.parse_column_list()?;
            self.set_primary_key(primary_key, columns)?;
        } else if self.try_keyword(Keyword::Unique) {
            let columns = self.parse_column_list()?;
            constraints.push(TableConstraint::Unique { columns });
        } else if self.try_keyword(Keyword::Foreign) {
            self.expect_keyword(Keyword::Key)?;
            let columns = self.parse_column_list()?;
            self.expect_keyword(Keyword::References)?;
            let ref_table = self.expect_ident("referenced table")?;
            let ref_columns = self.parse_column_list()?;
            let (on_delete, on_update) = self.parse_fk_actions()?;
            constraints.push(TableConstraint::ForeignKey(ForeignKey {
                columns,
                ref_table,
                ref_columns,
                on_delete,
                on_update,
            }));
        } else if self.try_keyword(Keyword::Check) {
            self.expect_kind(&TokenKind::LParen, "'('")?;
            let expr = self.parse_expression()?;
            self.expect_kind(&TokenKind::RParen, "')'")?;
            constraints.push(TableConstraint::Check(CheckConstraint { name, expr }));
        } else {
            return Err(self.error_expected("a table constraint"));
        }
        Ok(())
    }

    fn parse_column_def(
        &mut self,
        table: &str,
        primary_key: &mut Option<Vec<String>>,
    ) -> Result<(ColumnDef, Vec<TableConstraint>), ParseError> {
        let name = self.expect_ident("column name")?;
        let (mut type_tag, mut serial) = self.parse_type(table, &name)?;

        let mut nullable = true;
        let mut default = None;
        let mut inline: Vec<TableConstraint> = Vec::new();

        loop {
            if self.check_keyword(Keyword::Not)
                && matches!(self.peek_nth(1), TokenKind::Keyword(Keyword::Null))
            {
                self.advance();
                self.advance();
                nullable = false;
                inline.push(TableConstraint::NotNull {
                    column: name.clone(),
                });
            } else if self.try_keyword(Keyword::Null) {
                nullable = true;
            } else if self.try_keyword(Keyword::Primary) {
                self.expect_keyword(Keyword::Key)?;
                self.set_primary_key(primary_key, vec![name.clone()])?;
            } else if self.try_keyword(Keyword::Unique) {
                inline.push(TableConstraint::Unique {
                    columns: vec![name.clone()],
                });
            } else if self.try_keyword(Keyword::Default) {
                default = Some(self.parse_expression()?);
            } else if self.try_keyword(Keyword::Check) {
                self.expect_kind(&TokenKind::LParen, "'('")?;
                let expr = self.parse_expression()?;
                self.expect_kind(&TokenKind::RParen, "')'")?;
                inline.push(TableConstraint::Check(CheckConstraint { name: None, expr }));
            } else if self.try_keyword(Keyword::References) {
                let ref_table = self.expect_ident("referenced table")?;
                self.expect_kind(&TokenKind::LParen, "'('")?;
                let ref_column = self.expect_ident("referenced column")?;
                self.expect_kind(&TokenKind::RParen, "')'")?;
                let (on_delete, on_update) = self.parse_fk_actions()?;
                inline.push(TableConstraint::ForeignKey(ForeignKey {
                    columns: vec![name.clone()],
                    ref_table,
                    ref_columns: vec![ref_column],
                    on_delete,
                    on_update,
                }));
            } else if self.try_keyword(Keyword::AutoIncrement) {
                serial = true;
            } else {
                break;
            }
        }

        if serial {
            type_tag = TypeTag::Serial;
            nullable = false;
        }

        Ok((
            ColumnDef {
                name,
                type_tag,
                nullable,
                default,
            },
            inline,
        ))
    }

    fn set_primary_key(
        &mut self,
        primary_key: &mut Option<Vec<String>>,
        columns: Vec<String>,
    ) -> Result<(), ParseError> {
        if primary_key.is_some() {
            return Err(self.error_expected("a single PRIMARY KEY per table"));
        }
        *primary_key = Some(columns);
        Ok(())
    }

    fn parse_type(&mut self, table: &str, column: &str) -> Result<(TypeTag, bool), ParseError> {
        let token = self.advance();
        let raw = match token.kind {
            TokenKind::Ident(name) => name,
            // DATE and ENUM double as type names.
            TokenKind::Keyword(Keyword::Date) => "DATE".to_string(),
            TokenKind::Keyword(Keyword::Enum) => "ENUM".to_string(),
            other => {
                return Err(ParseError::new(
                    token.line,
                    token.column,
                    "a type name",
                    other.to_string(),
                ))
            }
        };

        let upper = raw.to_ascii_uppercase();
        let mut serial = false;
        let tag = match upper.as_str() {
            "SERIAL" | "BIGSERIAL" | "SMALLSERIAL" => {
                serial = true;
                TypeTag::Serial
            }
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT" => {
                self.skip_type_args()?;
                TypeTag::Integer
            }
            "DECIMAL" | "NUMERIC" => {
                let (precision, scale) = self.parse_precision_scale()?;
                TypeTag::Decimal { precision, scale }
            }
            "FLOAT" | "REAL" => {
                self.skip_type_args()?;
                TypeTag::Decimal {
                    precision: 18,
                    scale: 6,
                }
            }
            "DOUBLE" => {
                self.try_ident("PRECISION");
                TypeTag::Decimal {
                    precision: 18,
                    scale: 6,
                }
            }
            "VARCHAR" | "NVARCHAR" => TypeTag::Varchar(self.parse_optional_length()?),
            "CHARACTER" => {
                if self.try_ident("VARYING") {
                    TypeTag::Varchar(self.parse_optional_length()?)
                } else {
                    TypeTag::Char(self.parse_optional_length()?.unwrap_or(1))
                }
            }
            "CHAR" | "NCHAR" => TypeTag::Char(self.parse_optional_length()?.unwrap_or(1)),
            "TEXT" => TypeTag::Text,
            "DATE" => TypeTag::Date,
            "TIME" => TypeTag::Time,
            "TIMESTAMP" | "DATETIME" | "TIMESTAMPTZ" => TypeTag::Timestamp,
            "BOOLEAN" | "BOOL" => TypeTag::Boolean,
            "ENUM" => TypeTag::Enum(self.parse_enum_values()?),
            _ => {
                self.skip_type_args()?;
                self.warnings.push(ParseWarning::UnknownType {
                    table: table.to_string(),
                    column: column.to_string(),
                    raw: raw.clone(),
                });
                TypeTag::Opaque(raw)
            }
        };

        if self.try_keyword(Keyword::Unsigned) {
            self.warnings.push(ParseWarning::UnsignedNormalized {
                table: table.to_string(),
                column: column.to_string(),
            });
        }

        Ok((tag, serial))
    }

    fn parse_enum_values(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect_kind(&TokenKind::LParen, "'('")?;
        let mut values = vec![self.expect_string("enum value")?];
        while self.try_kind(&TokenKind::Comma) {
            values.push(self.expect_string("enum value")?);
        }
        self.expect_kind(&TokenKind::RParen, "')'")?;
        Ok(values)
    }

    fn parse_optional_length(&mut self) -> Result<Option<u32>, ParseError> {
        if !self.try_kind(&TokenKind::LParen) {
            return Ok(None);
        }
        let length = self.expect_number_u32("a length")?;
        self.expect_kind(&TokenKind::RParen, "')'")?;
        Ok(Some(length))
    }

    fn parse_precision_scale(&mut self) -> Result<(u32, u32), ParseError> {
        if !self.try_kind(&TokenKind::LParen) {
            return Ok((10, 0));
        }
        let precision = self.expect_number_u32("a precision")?;
        let scale = if self.try_kind(&TokenKind::Comma) {
            self.expect_number_u32("a scale")?
        } else {
            0
        };
        self.expect_kind(&TokenKind::RParen, "')'")?;
        Ok((precision, scale))
    }

    /// Skip a parenthesized argument list attached to a type we keep no
    /// parameters for (e.g. `INT(11)`).
    fn skip_type_args(&mut self) -> Result<(), ParseError> {
        if !self.try_kind(&TokenKind::LParen) {
            return Ok(());
        }
        let mut depth = 1u32;
        loop {
            match self.peek() {
                TokenKind::Eof => return Err(self.error_expected("')'")),
                TokenKind::LParen => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RParen => {
                    depth -= 1;
                    self.advance();
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_fk_actions(&mut self) -> Result<(Option<FkAction>, Option<FkAction>), ParseError> {
        let mut on_delete = None;
        let mut on_update = None;
        while self.try_keyword(Keyword::On) {
            if self.try_keyword(Keyword::Delete) {
                on_delete = Some(self.parse_fk_action()?);
            } else if self.try_keyword(Keyword::Update) {
                on_update = Some(self.parse_fk_action()?);
            } else {
                return Err(self.error_expected("DELETE or UPDATE"));
            }
        }
        Ok((on_delete, on_update))
    }

    fn parse_fk_action(&mut self) -> Result<FkAction, ParseError> {
        if self.try_keyword(Keyword::Cascade) {
            Ok(FkAction::Cascade)
        } else if self.try_keyword(Keyword::Restrict) {
            Ok(FkAction::Restrict)
        } else if self.try_keyword(Keyword::Set) {
            if self.try_keyword(Keyword::Null) {
                Ok(FkAction::SetNull)
            } else if self.try_keyword(Keyword::Default) {
                Ok(FkAction::SetDefault)
            } else {
                Err(self.error_expected("NULL or DEFAULT"))
            }
        } else if self.try_keyword(Keyword::No) {
            self.expect_keyword(Keyword::Action)?;
            Ok(FkAction::NoAction)
        } else {
            Err(self.error_expected("a referential action"))
        }
    }

    fn parse_column_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect_kind(&TokenKind::LParen, "'('")?;
        let mut columns = vec![self.expect_ident("column name")?];
        while self.try_kind(&TokenKind::Comma) {
            columns.push(self.expect_ident("column name")?);
        }
        self.expect_kind(&TokenKind::RParen, "')'")?;
        Ok(columns)
    }

    // ---- token cursor helpers ----

    pub(crate) fn peek(&self) -> &TokenKind {
        &self.tokens[self.position.min(self.tokens.len() - 1)].kind
    }

    pub(crate) fn peek_nth(&self, offset: usize) -> &TokenKind {
        let idx = (self.position + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn current(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    pub(crate) fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.peek(), TokenKind::Keyword(kw) if *kw == keyword)
    }

    pub(crate) fn try_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        if self.try_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error_expected(format!("{keyword:?}")))
        }
    }

    pub(crate) fn try_kind(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_kind(
        &mut self,
        kind: &TokenKind,
        expected: &str,
    ) -> Result<(), ParseError> {
        if self.try_kind(kind) {
            Ok(())
        } else {
            Err(self.error_expected(expected))
        }
    }

    pub(crate) fn expect_ident(&mut self, expected: &str) -> Result<String, ParseError> {
        match self.peek() {
            TokenKind::Ident(_) => {
                let token = self.advance();
                match token.kind {
                    TokenKind::Ident(name) => Ok(name),
                    _ => unreachable!("peeked identifier"),
                }
            }
            // A few keywords double as common column names.
            TokenKind::Keyword(Keyword::Key) => {
                self.advance();
                Ok("key".to_string())
            }
            TokenKind::Keyword(Keyword::Date) => {
                self.advance();
                Ok("date".to_string())
            }
            TokenKind::Keyword(Keyword::Action) => {
                self.advance();
                Ok("action".to_string())
            }
            _ => Err(self.error_expected(expected)),
        }
    }

    pub(crate) fn expect_string(&mut self, expected: &str) -> Result<String, ParseError> {
        match self.peek() {
            TokenKind::Str(_) => {
                let token = self.advance();
                match token.kind {
                    TokenKind::Str(text) => Ok(text),
                    _ => unreachable!("peeked string"),
                }
            }
            _ => Err(self.error_expected(expected)),
        }
    }

    fn expect_number_u32(&mut self, expected: &str) -> Result<u32, ParseError> {
        let text = match self.peek() {
            TokenKind::Number(text) if !text.contains('.') => text.clone(),
            _ => return Err(self.error_expected(expected)),
        };
        let token = self.advance();
        text.parse::<u32>().map_err(|_| {
            ParseError::new(token.line, token.column, expected, token.kind.to_string())
        })
    }

    /// Consume the next token when it is the given bare identifier
    /// (case-insensitive); used for two-word type names.
    fn try_ident(&mut self, expected: &str) -> bool {
        match self.peek() {
            TokenKind::Ident(name) if name.eq_ignore_ascii_case(expected) => {
                self.advance();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn error_expected(&self, expected: impl Into<String>) -> ParseError {
        let token = self.current();
        ParseError::new(token.line, token.column, expected, token.kind.to_string())
    }
}
