use std::fmt;

/// SQL keywords recognized by the DDL and CHECK-expression grammars.
/// Matching is case-insensitive; anything else lexes as an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Create,
    Table,
    If,
    Exists,
    Primary,
    Key,
    Unique,
    Not,
    Null,
    Default,
    Check,
    References,
    Constraint,
    Foreign,
    On,
    Delete,
    Update,
    Cascade,
    Restrict,
    Set,
    No,
    Action,
    AutoIncrement,
    Unsigned,
    And,
    Or,
    Between,
    In,
    Like,
    Regexp,
    Is,
    True,
    False,
    Date,
    Enum,
    Extract,
    From,
    CurrentDate,
}

impl Keyword {
    pub fn from_ident(ident: &str) -> Option<Keyword> {
        let upper = ident.to_ascii_uppercase();
        let keyword = match upper.as_str() {
            "CREATE" => Keyword::Create,
            "TABLE" => Keyword::Table,
            "IF" => Keyword::If,
            "EXISTS" => Keyword::Exists,
            "PRIMARY" => Keyword::Primary,
            "KEY" => Keyword::Key,
            "UNIQUE" => Keyword::Unique,
            "NOT" => Keyword::Not,
            "NULL" => Keyword::Null,
            "DEFAULT" => Keyword::Default,
            "CHECK" => Keyword::Check,
            "REFERENCES" => Keyword::References,
            "CONSTRAINT" => Keyword::Constraint,
            "FOREIGN" => Keyword::Foreign,
            "ON" => Keyword::On,
            "DELETE" => Keyword::Delete,
            "UPDATE" => Keyword::Update,
            "CASCADE" => Keyword::Cascade,
            "RESTRICT" => Keyword::Restrict,
            "SET" => Keyword::Set,
            "NO" => Keyword::No,
            "ACTION" => Keyword::Action,
            "AUTO_INCREMENT" => Keyword::AutoIncrement,
            "UNSIGNED" => Keyword::Unsigned,
            "AND" => Keyword::And,
            "OR" => Keyword::Or,
            "BETWEEN" => Keyword::Between,
            "IN" => Keyword::In,
            "LIKE" => Keyword::Like,
            "REGEXP" => Keyword::Regexp,
            "IS" => Keyword::Is,
            "TRUE" => Keyword::True,
            "FALSE" => Keyword::False,
            "DATE" => Keyword::Date,
            "ENUM" => Keyword::Enum,
            "EXTRACT" => Keyword::Extract,
            "FROM" => Keyword::From,
            "CURRENT_DATE" => Keyword::CurrentDate,
            _ => return None,
        };
        Some(keyword)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    /// Case-preserved identifier, bare or delimited.
    Ident(String),
    /// Raw numeric literal text; the parser decides int vs decimal.
    Number(String),
    /// Single-quoted string with `''` escapes already resolved.
    Str(String),
    /// Single-character operator: `+ - * / % .`
    Symbol(char),
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Tilde,
    NotTilde,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword(kw) => write!(f, "{kw:?}"),
            TokenKind::Ident(name) => write!(f, "identifier '{name}'"),
            TokenKind::Number(text) => write!(f, "number {text}"),
            TokenKind::Str(text) => write!(f, "string '{text}'"),
            TokenKind::Symbol(ch) => write!(f, "'{ch}'"),
            TokenKind::Eq => write!(f, "'='"),
            TokenKind::NotEq => write!(f, "'<>'"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::LtEq => write!(f, "'<='"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::GtEq => write!(f, "'>='"),
            TokenKind::Tilde => write!(f, "'~'"),
            TokenKind::NotTilde => write!(f, "'!~'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Semicolon => write!(f, "';'"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// Token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}
