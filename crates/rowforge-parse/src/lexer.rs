use rowforge_core::ParseError;

use crate::token::{Keyword, Token, TokenKind};

/// SQL lexer — converts DDL text into tokens with source positions.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire input, appending a trailing `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments()?;

            if self.is_eof() {
                tokens.push(self.token_here(TokenKind::Eof));
                break;
            }

            let token = self.next_token()?;
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        let (line, column) = (self.line, self.column);
        let ch = self.current_char();

        let kind = match ch {
            ';' => {
                self.advance();
                TokenKind::Semicolon
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            '(' => {
                self.advance();
                TokenKind::LParen
            }
            ')' => {
                self.advance();
                TokenKind::RParen
            }
            '=' => {
                self.advance();
                TokenKind::Eq
            }
            '<' => {
                self.advance();
                match self.current_char_opt() {
                    Some('=') => {
                        self.advance();
                        TokenKind::LtEq
                    }
                    Some('>') => {
                        self.advance();
                        TokenKind::NotEq
                    }
                    _ => TokenKind::Lt,
                }
            }
            '>' => {
                self.advance();
                if self.current_char_opt() == Some('=') {
                    self.advance();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '!' => {
                self.advance();
                match self.current_char_opt() {
                    Some('=') => {
                        self.advance();
                        TokenKind::NotEq
                    }
                    Some('~') => {
                        self.advance();
                        TokenKind::NotTilde
                    }
                    _ => {
                        return Err(ParseError::new(line, column, "'=' or '~' after '!'", "'!'"))
                    }
                }
            }
            '~' => {
                self.advance();
                TokenKind::Tilde
            }
            '+' | '-' | '*' | '/' | '%' | '.' => {
                self.advance();
                TokenKind::Symbol(ch)
            }
            '\'' => self.tokenize_string(line, column)?,
            '"' => self.tokenize_delimited(line, column, '"')?,
            '`' => self.tokenize_delimited(line, column, '`')?,
            '0'..='9' => self.tokenize_number(),
            'a'..='z' | 'A'..='Z' | '_' => self.tokenize_ident_or_keyword(),
            other => {
                return Err(ParseError::new(
                    line,
                    column,
                    "a token",
                    format!("'{other}'"),
                ))
            }
        };

        Ok(Token { kind, line, column })
    }

    /// Single-quoted string; `''` unescapes to a literal quote.
    fn tokenize_string(&mut self, line: u32, column: u32) -> Result<TokenKind, ParseError> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.current_char_opt() {
                None => {
                    return Err(ParseError::new(
                        line,
                        column,
                        "closing ' for string literal",
                        "end of input",
                    ))
                }
                Some('\'') => {
                    self.advance();
                    if self.current_char_opt() == Some('\'') {
                        text.push('\'');
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
            }
        }
        Ok(TokenKind::Str(text))
    }

    /// Backtick or double-quote delimited identifier, case-preserved.
    fn tokenize_delimited(
        &mut self,
        line: u32,
        column: u32,
        delimiter: char,
    ) -> Result<TokenKind, ParseError> {
        self.advance();
        let mut name = String::new();
        loop {
            match self.current_char_opt() {
                None => {
                    return Err(ParseError::new(
                        line,
                        column,
                        format!("closing {delimiter} for identifier"),
                        "end of input",
                    ))
                }
                Some(ch) if ch == delimiter => {
                    self.advance();
                    break;
                }
                Some(ch) => {
                    name.push(ch);
                    self.advance();
                }
            }
        }
        Ok(TokenKind::Ident(name))
    }

    fn tokenize_number(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(ch) = self.current_char_opt() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        if self.current_char_opt() == Some('.')
            && self
                .peek(1)
                .map(|ch| ch.is_ascii_digit())
                .unwrap_or(false)
        {
            text.push('.');
            self.advance();
            while let Some(ch) = self.current_char_opt() {
                if ch.is_ascii_digit() {
                    text.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        TokenKind::Number(text)
    }

    fn tokenize_ident_or_keyword(&mut self) -> TokenKind {
        let mut name = String::new();
        while let Some(ch) = self.current_char_opt() {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        match Keyword::from_ident(&name) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Ident(name),
        }
    }

    /// Skip whitespace, `-- ...` line comments, and `/* ... */` blocks.
    fn skip_whitespace_and_comments(&mut self) -> Result<(), ParseError> {
        loop {
            while let Some(ch) = self.current_char_opt() {
                if ch.is_whitespace() {
                    self.advance();
                } else {
                    break;
                }
            }

            if self.current_char_opt() == Some('-') && self.peek(1) == Some('-') {
                while let Some(ch) = self.current_char_opt() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
                continue;
            }

            if self.current_char_opt() == Some('/') && self.peek(1) == Some('*') {
                let (line, column) = (self.line, self.column);
                self.advance();
                self.advance();
                loop {
                    match self.current_char_opt() {
                        None => {
                            return Err(ParseError::new(
                                line,
                                column,
                                "closing */ for comment",
                                "end of input",
                            ))
                        }
                        Some('*') if self.peek(1) == Some('/') => {
                            self.advance();
                            self.advance();
                            break;
                        }
                        Some(_) => self.advance(),
                    }
                }
                continue;
            }

            return Ok(());
        }
    }

    fn token_here(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            line: self.line,
            column: self.column,
        }
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn current_char_opt(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char_opt() {
            self.position += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}
