//! Script lexer.
//!
//! Turns source text into a lazy stream of [`Lexeme`]s. Whitespace and
//! newlines are kept as lexemes because the parser needs them to find the
//! end of a command's argument list.
//!
//! # Example
//!
//! ```
//! use lsh_core::lexer::Lexer;
//! use lsh_core::lexeme::LexemeKind;
//!
//! let kinds: Vec<LexemeKind> = Lexer::new("echo 'hi'")
//!     .map(|l| l.unwrap().kind)
//!     .collect();
//! assert_eq!(
//!     kinds,
//!     vec![
//!         LexemeKind::String,
//!         LexemeKind::Whitespace,
//!         LexemeKind::QuotedString,
//!         LexemeKind::EndOfFile,
//!     ]
//! );
//! ```

use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::lexeme::{is_keyword, Lexeme, LexemeKind, SourceLocation};

const SENTINEL: char = '\0';

/// How serious a lexer diagnostic is. Only [`Severity::Error`] stops the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub location: SourceLocation,
    pub message: String,
    pub severity: Severity,
}

/// A fatal lexing failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("lex error at {location}: {message}")]
pub struct LexError {
    pub location: SourceLocation,
    pub message: String,
}

fn is_symbol(c: char) -> bool {
    matches!(
        c,
        '(' | ')' | '{' | '}' | ',' | ';' | '+' | '-' | '*' | '/' | '%' | '<' | '>' | '='
            | '!' | '&' | '|' | '$' | '#' | '@' | '?' | ':'
    )
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    diagnostics: Vec<Diagnostic>,
    in_comment: bool,
    finished: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        let normalized = source.replace("\r\n", "\n").replace('\r', "\n");
        let mut chars: Vec<char> = normalized.chars().collect();
        chars.push(SENTINEL);
        Self {
            chars,
            pos: 0,
            line: 1,
            column: 1,
            diagnostics: Vec::new(),
            in_comment: false,
            finished: false,
        }
    }

    /// Non-fatal diagnostics recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn at_end(&self) -> bool {
        self.pos + 1 >= self.chars.len()
    }

    fn peek(&self) -> char {
        self.chars.get(self.pos).copied().unwrap_or(SENTINEL)
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        if !self.at_end() {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        c
    }

    fn emit(&mut self, diagnostic: Diagnostic) -> Result<(), LexError> {
        match diagnostic.severity {
            Severity::Error => Err(LexError {
                location: diagnostic.location,
                message: diagnostic.message,
            }),
            Severity::Warning => {
                warn!(location = %diagnostic.location, "{}", diagnostic.message);
                self.diagnostics.push(diagnostic);
                Ok(())
            }
            Severity::Info => {
                debug!(location = %diagnostic.location, "{}", diagnostic.message);
                self.diagnostics.push(diagnostic);
                Ok(())
            }
        }
    }

    fn next_lexeme(&mut self) -> Result<Lexeme, LexError> {
        if self.in_comment {
            self.in_comment = false;
            if let Some(comment) = self.comment_text() {
                return Ok(comment);
            }
        }

        let start = self.location();
        if self.at_end() {
            return Ok(Lexeme::new(LexemeKind::EndOfFile, start, ""));
        }

        let c = self.peek();
        if is_blank(c) {
            let mut content = String::new();
            while !self.at_end() && is_blank(self.peek()) {
                content.push(self.advance());
            }
            return Ok(Lexeme::new(LexemeKind::Whitespace, start, content));
        }
        if is_symbol(c) {
            return Ok(self.symbol(start));
        }
        if c == '\n' {
            self.advance();
            return Ok(Lexeme::new(LexemeKind::NewLine, start, "\n"));
        }
        if c == '"' || c == '\'' {
            return self.quoted(start);
        }

        let mut content = String::new();
        while !self.at_end() {
            let c = self.peek();
            if is_blank(c) || is_symbol(c) || c == '\n' || c == '"' || c == '\'' {
                break;
            }
            content.push(self.advance());
        }
        let kind = if is_keyword(&content) {
            LexemeKind::Keyword
        } else {
            LexemeKind::String
        };
        Ok(Lexeme::new(kind, start, content))
    }

    /// The remainder of a `#` line, taken verbatim.
    fn comment_text(&mut self) -> Option<Lexeme> {
        let start = self.location();
        let mut content = String::new();
        while !self.at_end() && self.peek() != '\n' {
            content.push(self.advance());
        }
        if content.is_empty() {
            None
        } else {
            Some(Lexeme::new(LexemeKind::String, start, content))
        }
    }

    fn symbol(&mut self, start: SourceLocation) -> Lexeme {
        let first = self.advance();
        let second = self.peek();
        let pair = match (first, second) {
            ('&', '&') => Some(LexemeKind::And),
            ('|', '|') => Some(LexemeKind::Or),
            ('+', '+') => Some(LexemeKind::Increment),
            ('-', '-') => Some(LexemeKind::Decrement),
            ('<', '=') => Some(LexemeKind::LessOrEqual),
            ('>', '=') => Some(LexemeKind::MoreOrEqual),
            ('=', '=') => Some(LexemeKind::Equal),
            ('!', '=') => Some(LexemeKind::NotEqual),
            _ => None,
        };
        if let Some(kind) = pair {
            self.advance();
            let mut content = String::with_capacity(2);
            content.push(first);
            content.push(second);
            return Lexeme::new(kind, start, content);
        }

        let kind = match first {
            '(' => LexemeKind::LeftParen,
            ')' => LexemeKind::RightParen,
            '{' => LexemeKind::LeftBrace,
            '}' => LexemeKind::RightBrace,
            ',' => LexemeKind::Comma,
            ';' => LexemeKind::Semicolon,
            '+' => LexemeKind::Plus,
            '-' => LexemeKind::Minus,
            '*' => LexemeKind::Star,
            '/' => LexemeKind::Slash,
            '%' => LexemeKind::Percent,
            '<' => LexemeKind::Less,
            '>' => LexemeKind::More,
            '=' => LexemeKind::Assign,
            '!' => LexemeKind::Bang,
            '&' => LexemeKind::Ampersand,
            '|' => LexemeKind::Pipe,
            '$' => LexemeKind::Dollar,
            '@' => LexemeKind::At,
            '?' => LexemeKind::Question,
            ':' => LexemeKind::Colon,
            _ => {
                self.in_comment = true;
                LexemeKind::Hash
            }
        };
        Lexeme::new(kind, start, first.to_string())
    }

    fn quoted(&mut self, start: SourceLocation) -> Result<Lexeme, LexError> {
        let quote = self.advance();
        let mut content = String::new();
        loop {
            if self.at_end() {
                self.emit(Diagnostic {
                    location: start,
                    message: format!("unterminated string, missing closing {}", quote),
                    severity: Severity::Error,
                })?;
            }
            let c = self.advance();
            if c == quote {
                break;
            }
            if c != '\\' {
                content.push(c);
                continue;
            }

            let escape_at = self.location();
            if self.at_end() {
                self.emit(Diagnostic {
                    location: start,
                    message: "unterminated string, input ends after '\\'".to_string(),
                    severity: Severity::Error,
                })?;
            }
            match self.advance() {
                'n' => content.push('\n'),
                't' => content.push('\t'),
                'r' => content.push('\r'),
                '0' => content.push('\0'),
                e @ ('\\' | '"' | '\'') => content.push(e),
                other => {
                    self.emit(Diagnostic {
                        location: escape_at,
                        message: format!("unknown escape sequence '\\{}'", other),
                        severity: Severity::Warning,
                    })?;
                    content.push(other);
                }
            }
        }
        Ok(Lexeme::new(LexemeKind::QuotedString, start, content))
    }
}

impl Iterator for Lexer {
    type Item = Result<Lexeme, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_lexeme();
        match &result {
            Ok(lexeme) if lexeme.kind == LexemeKind::EndOfFile => self.finished = true,
            Err(_) => self.finished = true,
            Ok(_) => {}
        }
        Some(result)
    }
}

/// Lexes a whole source text, stopping at the first fatal error.
pub fn tokenize(source: &str) -> Result<Vec<Lexeme>, LexError> {
    Lexer::new(source).collect()
}
