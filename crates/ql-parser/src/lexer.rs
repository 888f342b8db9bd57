//! Hand-written tokenizer for the shared FHIRPath/CQL lexical grammar.
//!
//! Parsing never throws (spec.md §4.1): an unrecognized character
//! produces an `Err` the caller turns into a diagnostic, never a panic.

use crate::token::{Token, TokenKind};
use std::str::Chars;

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<Chars<'a>>,
    offset: u32,
    line: u32,
    column: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub offset: u32,
    pub line: u32,
    pub column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8() as u32;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek2(&self) -> Option<char> {
        let mut it = self.chars.clone();
        it.next();
        it.next()
    }

    fn slice(&self, start: u32, end: u32) -> &'a str {
        &self.source[start as usize..end as usize]
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.offset;
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    start,
                    end: start,
                    line,
                    column,
                });
                break;
            };

            let kind = match c {
                '0'..='9' => self.lex_number()?,
                '\'' => self.lex_string('\'')?,
                '"' => self.lex_delimited_string_identifier()?,
                '`' => self.lex_backtick_identifier()?,
                '@' => self.lex_temporal()?,
                '$' => self.lex_special_variable()?,
                '%' => self.lex_environment_variable()?,
                c if c == '_' || c.is_alphabetic() => self.lex_identifier_or_keyword(),
                _ => self.lex_operator()?,
            };

            tokens.push(Token {
                kind,
                start,
                end: self.offset,
                line,
                column,
            });
        }
        Ok(tokens)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while !matches!(self.peek(), Some('\n') | None) {
                        self.bump();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    self.bump();
                    self.bump();
                    while let Some(c) = self.peek() {
                        if c == '*' && self.peek2() == Some('/') {
                            self.bump();
                            self.bump();
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self) -> Result<TokenKind, LexError> {
        let start = self.offset;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        let mut is_decimal = false;
        if self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) {
            is_decimal = true;
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        let digits = self.slice(start, self.offset);
        if is_decimal {
            return Ok(TokenKind::Decimal(digits.to_string()));
        }
        if self.peek() == Some('L') {
            self.bump();
            let value = digits
                .parse::<i64>()
                .map_err(|e| self.err(format!("invalid long literal: {e}")))?;
            return Ok(TokenKind::Long(value));
        }
        let value = digits
            .parse::<i64>()
            .map_err(|e| self.err(format!("invalid integer literal: {e}")))?;
        Ok(TokenKind::Integer(value))
    }

    fn lex_string(&mut self, quote: char) -> Result<TokenKind, LexError> {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some(c) if c == quote => value.push(quote),
                    Some(other) => value.push(other),
                    None => return Err(self.err("unterminated escape sequence".to_string())),
                },
                Some(c) => value.push(c),
                None => return Err(self.err("unterminated string literal".to_string())),
            }
        }
        Ok(TokenKind::String(value))
    }

    /// `"..."` is a delimited identifier in FHIRPath/CQL (distinct from
    /// `'...'` strings), used to quote identifiers containing spaces.
    fn lex_delimited_string_identifier(&mut self) -> Result<TokenKind, LexError> {
        match self.lex_string('"')? {
            TokenKind::String(s) => Ok(TokenKind::DelimitedIdentifier(s)),
            other => Ok(other),
        }
    }

    fn lex_backtick_identifier(&mut self) -> Result<TokenKind, LexError> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('`') => break,
                Some(c) => value.push(c),
                None => return Err(self.err("unterminated delimited identifier".to_string())),
            }
        }
        Ok(TokenKind::DelimitedIdentifier(value))
    }

    /// `@2024-05-15`, `@2024-05-15T10:00:00Z`, `@T10:00`.
    fn lex_temporal(&mut self) -> Result<TokenKind, LexError> {
        self.bump(); // '@'
        let start = self.offset;
        let is_time = self.peek() == Some('T');
        if is_time {
            self.bump();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || "-:.+TZ".contains(c)) {
            self.bump();
        }
        let text = self.slice(start, self.offset).to_string();
        if is_time {
            return Ok(TokenKind::Time(text));
        }
        if text.contains('T') {
            return Ok(TokenKind::DateTime(text));
        }
        Ok(TokenKind::Date(text))
    }

    fn lex_special_variable(&mut self) -> Result<TokenKind, LexError> {
        self.bump();
        let start = self.offset;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        Ok(TokenKind::SpecialVariable(
            self.slice(start, self.offset).to_string(),
        ))
    }

    fn lex_environment_variable(&mut self) -> Result<TokenKind, LexError> {
        self.bump();
        if self.peek() == Some('\'') {
            return match self.lex_string('\'')? {
                TokenKind::String(s) => Ok(TokenKind::EnvironmentVariable(s)),
                other => Ok(other),
            };
        }
        let start = self.offset;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        Ok(TokenKind::EnvironmentVariable(
            self.slice(start, self.offset).to_string(),
        ))
    }

    fn lex_identifier_or_keyword(&mut self) -> TokenKind {
        let start = self.offset;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        let text = self.slice(start, self.offset);
        keyword(text).unwrap_or_else(|| TokenKind::Identifier(text.to_string()))
    }

    fn lex_operator(&mut self) -> Result<TokenKind, LexError> {
        let c = self.bump().expect("checked by caller");
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '&' => TokenKind::Ampersand,
            '^' => TokenKind::Caret,
            '|' => TokenKind::Pipe,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '/' => TokenKind::Slash,
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                }
                TokenKind::Equal
            }
            '!' => match self.peek() {
                Some('=') => {
                    self.bump();
                    TokenKind::NotEqual
                }
                Some('~') => {
                    self.bump();
                    TokenKind::NotEquivalent
                }
                _ => return Err(self.err("unexpected character '!'".to_string())),
            },
            '~' => TokenKind::Equivalent,
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            other => return Err(self.err(format!("unexpected character {other:?}"))),
        };
        Ok(kind)
    }

    fn err(&self, message: String) -> LexError {
        LexError {
            message,
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }
}

fn keyword(text: &str) -> Option<TokenKind> {
    Some(match text {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "xor" => TokenKind::Xor,
        "implies" => TokenKind::Implies,
        "not" => TokenKind::Not,
        "in" => TokenKind::In,
        "contains" => TokenKind::Contains,
        "overlaps" => TokenKind::Overlaps,
        "before" => TokenKind::Before,
        "after" => TokenKind::After,
        "meets" => TokenKind::Meets,
        "starts" => TokenKind::Starts,
        "ends" => TokenKind::Ends,
        "during" => TokenKind::During,
        "includes" => TokenKind::Includes,
        "is" => TokenKind::Is,
        "as" => TokenKind::As,
        "between" => TokenKind::Between,
        "div" => TokenKind::Div,
        "mod" => TokenKind::Mod,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "if" => TokenKind::If,
        "then" => TokenKind::Then,
        "else" => TokenKind::Else,
        "case" => TokenKind::Case,
        "when" => TokenKind::When,
        "end" => TokenKind::End,
        "define" => TokenKind::Define,
        "function" => TokenKind::Function,
        "library" => TokenKind::Library,
        "using" => TokenKind::Using,
        "include" => TokenKind::Include,
        "called" => TokenKind::Called,
        "public" => TokenKind::Public,
        "private" => TokenKind::Private,
        "parameter" => TokenKind::Parameter,
        "default" => TokenKind::Default,
        "valueset" => TokenKind::Valueset,
        "codesystem" => TokenKind::Codesystem,
        "context" => TokenKind::Context,
        "where" => TokenKind::Where,
        "return" => TokenKind::Return,
        "sort" => TokenKind::Sort,
        "by" => TokenKind::By,
        "asc" | "ascending" => TokenKind::Asc,
        "desc" | "descending" => TokenKind::Desc,
        "all" => TokenKind::All,
        "distinct" => TokenKind::Distinct,
        "let" => TokenKind::Let,
        "null" => TokenKind::Null,
        "version" => TokenKind::Version,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn tokenizes_simple_arithmetic() {
        assert_eq!(
            kinds("1 + 2 * 3"),
            vec![
                TokenKind::Integer(1),
                TokenKind::Plus,
                TokenKind::Integer(2),
                TokenKind::Star,
                TokenKind::Integer(3),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_date_literal() {
        assert_eq!(
            kinds("@1990-05-15"),
            vec![TokenKind::Date("1990-05-15".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn tokenizes_quantity_components() {
        assert_eq!(
            kinds("1 'kg'"),
            vec![
                TokenKind::Integer(1),
                TokenKind::String("kg".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn tokenizes_keywords_not_as_identifiers() {
        assert_eq!(
            kinds("true and false"),
            vec![TokenKind::True, TokenKind::And, TokenKind::False, TokenKind::Eof]
        );
    }
}
