use std::{collections::BTreeMap, str::Chars};

use itertools::{PeekNth, peek_nth};
use once_cell::sync::Lazy;
use strum::EnumString;

use super::{SourceFile, parser::ParseError};

#[derive(Debug)]
pub struct Lexer<'source> {
    source: &'source SourceFile,
    position: usize,
    chars: PeekNth<Chars<'source>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /* Words */
    Keyword(Keyword), // fn
    Identifier,       // main

    /* Literals */
    BooleanLiteral, // true
    IntegerLiteral, // 1
    FloatLiteral,   // 1.0
    StringLiteral,  // "hello, world"

    /* Delimiters */
    OpenParen,  // (
    CloseParen, // )
    OpenBrace,  // {
    CloseBrace, // }
    Semicolon,  // ;
    Comma,      // ,

    /* Other */
    Colon, // :
    Arrow, // ->

    /* Unary Ops */
    Bang, // !

    /* Unary + Binary Ops */
    Minus, // -

    /* Binary Ops */
    Plus,                 // +
    Asterisk,             // *
    Divide,               // /
    Modulus,              // %
    LogicalAnd,           // &&
    LogicalOr,            // ||
    DoubleEquals,         // ==
    NotEquals,            // !=
    LessThan,             // <
    LessThanOrEqualTo,    // <=
    GreaterThan,          // >
    GreaterThanOrEqualTo, // >=

    /* Assignment */
    Equals, // =
}

impl TokenKind {
    pub fn is_comparison_operator(&self) -> bool {
        matches!(
            self,
            Self::NotEquals
                | Self::DoubleEquals
                | Self::LessThan
                | Self::LessThanOrEqualTo
                | Self::GreaterThan
                | Self::GreaterThanOrEqualTo
        )
    }

    pub fn is_term_operator(&self) -> bool {
        matches!(self, Self::Plus | Self::Minus)
    }

    pub fn is_factor_operator(&self) -> bool {
        matches!(self, Self::Asterisk | Self::Divide | Self::Modulus)
    }

    pub fn is_unary_operator(&self) -> bool {
        matches!(self, Self::Bang | Self::Minus)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Keyword {
    Fn,
    Let,
    If,
    Else,
    While,
    Return,
}

/// Table of single char tokens (matched after longer sequences are checked for)
static SINGLE_TOKENS: Lazy<BTreeMap<char, TokenKind>> = Lazy::new(|| {
    BTreeMap::from([
        ('(', TokenKind::OpenParen),
        (')', TokenKind::CloseParen),
        ('{', TokenKind::OpenBrace),
        ('}', TokenKind::CloseBrace),
        (';', TokenKind::Semicolon),
        (',', TokenKind::Comma),
        (':', TokenKind::Colon),
        ('!', TokenKind::Bang),
        ('-', TokenKind::Minus),
        ('+', TokenKind::Plus),
        ('*', TokenKind::Asterisk),
        ('/', TokenKind::Divide),
        ('%', TokenKind::Modulus),
        ('<', TokenKind::LessThan),
        ('>', TokenKind::GreaterThan),
        ('=', TokenKind::Equals),
    ])
});

/// Table of two char tokens, checked before the single char table
static DOUBLE_TOKENS: Lazy<BTreeMap<(char, char), TokenKind>> = Lazy::new(|| {
    BTreeMap::from([
        (('-', '>'), TokenKind::Arrow),
        (('&', '&'), TokenKind::LogicalAnd),
        (('|', '|'), TokenKind::LogicalOr),
        (('=', '='), TokenKind::DoubleEquals),
        (('!', '='), TokenKind::NotEquals),
        (('<', '='), TokenKind::LessThanOrEqualTo),
        (('>', '='), TokenKind::GreaterThanOrEqualTo),
    ])
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source SourceFile) -> Self {
        Self {
            source,
            chars: peek_nth(source.contents.chars()),
            position: 0,
        }
    }

    /// Lexes the whole source file up front so the parser can look ahead
    /// freely without having to thread lexer errors through every peek.
    pub fn tokenize(source: &'source SourceFile) -> Result<Vec<Token>, ParseError> {
        let mut lexer = Self::new(source);
        let mut tokens = Vec::new();

        while let Some(token) = lexer.next_token()? {
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn error(&self, start: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(Span::new(start, self.position.max(start + 1)), message)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn ignore_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.advance();
        }
    }

    fn ignore_line(&mut self) {
        while self.chars.peek().is_some_and(|c| *c != '\n') {
            self.advance();
        }
    }

    fn read_string(&mut self) -> Result<Token, ParseError> {
        let start_position = self.position;

        // Consume opening quote
        self.advance();

        while let Some(c) = self.chars.peek().copied() {
            if c == '\n' {
                return Err(self.error(
                    start_position,
                    "Reached end of line while reading string literal",
                ));
            }

            self.advance();

            // Skip over escaped quotes
            if c == '\\' && self.chars.peek().is_some_and(|c| *c == '"') {
                self.advance();
                continue;
            }

            if c == '"' {
                return Ok(Token {
                    kind: TokenKind::StringLiteral,
                    span: self.new_span(start_position),
                });
            }
        }

        Err(self.error(
            start_position,
            "Reached end of file while reading string literal",
        ))
    }

    // Keyword, identifier, or boolean literal
    fn read_word(&mut self) -> Token {
        let start_position = self.position;

        while self
            .chars
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_')
        {
            self.advance();
        }

        let span = self.new_span(start_position);
        let value = self.source.value_of_span(span);

        let kind = if let Ok(keyword) = value.parse() {
            TokenKind::Keyword(keyword)
        } else {
            match value {
                "true" | "false" => TokenKind::BooleanLiteral,
                _ => TokenKind::Identifier,
            }
        };

        Token { kind, span }
    }

    fn read_number(&mut self) -> Token {
        let start_position = self.position;
        let mut kind = TokenKind::IntegerLiteral;

        while let Some(c) = self.chars.peek().copied() {
            if c == '.'
                && kind == TokenKind::IntegerLiteral
                && self.chars.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
            {
                kind = TokenKind::FloatLiteral;
                self.advance();
                continue;
            }

            if !c.is_ascii_digit() {
                break;
            }

            self.advance();
        }

        Token {
            kind,
            span: self.new_span(start_position),
        }
    }

    fn read_fixed(&mut self, length: usize, kind: TokenKind) -> Token {
        let start_position = self.position;

        for _ in 0..length {
            self.advance();
        }

        Token {
            kind,
            span: self.new_span(start_position),
        }
    }

    fn new_span(&self, start: usize) -> Span {
        Span {
            start,
            end: self.position,
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        while let Some(c) = self.chars.peek().copied() {
            let token = match c {
                // Ignore whitespace
                c if c.is_ascii_whitespace() => {
                    self.ignore_whitespace();
                    continue;
                }
                // Ignore comments
                '/' if self.chars.peek_nth(1).is_some_and(|c| *c == '/') => {
                    self.ignore_line();
                    continue;
                }

                // String literals
                '"' => self.read_string()?,

                // Integer and float literals
                n if n.is_ascii_digit() => self.read_number(),

                // Identifiers, keywords, and boolean literals
                a if a.is_ascii_alphabetic() || a == '_' => self.read_word(),

                c if self
                    .chars
                    .peek_nth(1)
                    .is_some_and(|next| DOUBLE_TOKENS.contains_key(&(c, *next))) =>
                {
                    let next = self.chars.peek_nth(1).copied().unwrap_or_default();
                    self.read_fixed(2, DOUBLE_TOKENS[&(c, next)])
                }

                s if SINGLE_TOKENS.contains_key(&s) => self.read_fixed(1, SINGLE_TOKENS[&s]),

                c => {
                    let start = self.position;
                    self.advance();
                    return Err(self.error(start, format!("Unexpected character in stream: `{c}`")));
                }
            };

            return Ok(Some(token));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let source = SourceFile::from_memory(source);
        Lexer::tokenize(&source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_conditional() {
        assert_eq!(
            kinds("if (x >= 10) && !done { return 1.5; } // trailing"),
            vec![
                TokenKind::Keyword(Keyword::If),
                TokenKind::OpenParen,
                TokenKind::Identifier,
                TokenKind::GreaterThanOrEqualTo,
                TokenKind::IntegerLiteral,
                TokenKind::CloseParen,
                TokenKind::LogicalAnd,
                TokenKind::Bang,
                TokenKind::Identifier,
                TokenKind::OpenBrace,
                TokenKind::Keyword(Keyword::Return),
                TokenKind::FloatLiteral,
                TokenKind::Semicolon,
                TokenKind::CloseBrace,
            ]
        );
    }

    #[test]
    fn lexes_arrow_and_strings() {
        assert_eq!(
            kinds(r#"fn f() -> str { return "a \" b"; }"#),
            vec![
                TokenKind::Keyword(Keyword::Fn),
                TokenKind::Identifier,
                TokenKind::OpenParen,
                TokenKind::CloseParen,
                TokenKind::Arrow,
                TokenKind::Identifier,
                TokenKind::OpenBrace,
                TokenKind::Keyword(Keyword::Return),
                TokenKind::StringLiteral,
                TokenKind::Semicolon,
                TokenKind::CloseBrace,
            ]
        );
    }

    #[test]
    fn rejects_unknown_characters() {
        let source = SourceFile::from_memory("let x = 1 @ 2;");
        let error = Lexer::tokenize(&source).unwrap_err();

        assert_eq!(error.span, Span::new(10, 11));
    }

    #[test]
    fn rejects_unterminated_strings() {
        let source = SourceFile::from_memory("\"never closed\nfoo");

        assert!(Lexer::tokenize(&source).is_err());
    }
}
