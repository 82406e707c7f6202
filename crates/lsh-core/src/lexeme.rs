//! Lexeme kinds and source locations shared by the lexer and the parser.

use std::fmt;

/// Reserved words. A bare run whose content matches one of these is
/// classified as [`LexemeKind::Keyword`].
pub const KEYWORDS: &[&str] = &[
    "function", "true", "false", "if", "else", "while", "for", "return", "null",
];

/// A 1-based position in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexemeKind {
    // Text
    String,
    QuotedString,
    Keyword,

    // Structure
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Semicolon,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Increment,
    Decrement,
    Less,
    LessOrEqual,
    More,
    MoreOrEqual,
    Equal,
    NotEqual,
    And,
    Or,
    Assign,
    Ampersand,
    Pipe,

    // Sigils
    Dollar,
    Hash,
    Bang,
    At,
    Question,
    Colon,

    // Control
    Whitespace,
    NewLine,
    EndOfFile,
}

impl LexemeKind {
    /// Text shown for this kind in diagnostics.
    pub fn display_text(self) -> &'static str {
        match self {
            LexemeKind::String => "string",
            LexemeKind::QuotedString => "quoted string",
            LexemeKind::Keyword => "keyword",
            LexemeKind::LeftParen => "(",
            LexemeKind::RightParen => ")",
            LexemeKind::LeftBrace => "{",
            LexemeKind::RightBrace => "}",
            LexemeKind::Comma => ",",
            LexemeKind::Semicolon => ";",
            LexemeKind::Plus => "+",
            LexemeKind::Minus => "-",
            LexemeKind::Star => "*",
            LexemeKind::Slash => "/",
            LexemeKind::Percent => "%",
            LexemeKind::Increment => "++",
            LexemeKind::Decrement => "--",
            LexemeKind::Less => "<",
            LexemeKind::LessOrEqual => "<=",
            LexemeKind::More => ">",
            LexemeKind::MoreOrEqual => ">=",
            LexemeKind::Equal => "==",
            LexemeKind::NotEqual => "!=",
            LexemeKind::And => "&&",
            LexemeKind::Or => "||",
            LexemeKind::Assign => "=",
            LexemeKind::Ampersand => "&",
            LexemeKind::Pipe => "|",
            LexemeKind::Dollar => "$",
            LexemeKind::Hash => "#",
            LexemeKind::Bang => "!",
            LexemeKind::At => "@",
            LexemeKind::Question => "?",
            LexemeKind::Colon => ":",
            LexemeKind::Whitespace => "whitespace",
            LexemeKind::NewLine => "newline",
            LexemeKind::EndOfFile => "end of file",
        }
    }

    /// Kinds that can start or continue a command argument list.
    pub fn is_text(self) -> bool {
        matches!(self, LexemeKind::String | LexemeKind::QuotedString)
    }
}

impl fmt::Display for LexemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_text())
    }
}

/// A classified token with its position and literal text.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    pub location: SourceLocation,
    pub content: String,
}

impl Lexeme {
    pub fn new(kind: LexemeKind, location: SourceLocation, content: impl Into<String>) -> Self {
        Self {
            kind,
            location,
            content: content.into(),
        }
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == LexemeKind::Keyword && self.content == word
    }

    /// Human readable description used in "expected X, found Y" messages.
    pub fn describe(&self) -> String {
        match self.kind {
            LexemeKind::String | LexemeKind::Keyword => format!("'{}'", self.content),
            LexemeKind::QuotedString => format!("\"{}\"", self.content),
            other => format!("'{}'", other.display_text()),
        }
    }
}

/// Returns true if `name` matches `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_follow_c_rules() {
        assert!(is_identifier("name"));
        assert!(is_identifier("_private"));
        assert!(is_identifier("x1_y2"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("with-dash"));
    }

    #[test]
    fn test_not_equal_has_its_own_text() {
        assert_eq!(LexemeKind::NotEqual.display_text(), "!=");
        assert_eq!(LexemeKind::MoreOrEqual.display_text(), ">=");
        assert_ne!(
            LexemeKind::NotEqual.display_text(),
            LexemeKind::MoreOrEqual.display_text()
        );
    }

    #[test]
    fn test_describe_quotes_content() {
        let lexeme = Lexeme::new(LexemeKind::QuotedString, SourceLocation::new(1, 1), "hi");
        assert_eq!(lexeme.describe(), "\"hi\"");
        let lexeme = Lexeme::new(LexemeKind::Comma, SourceLocation::new(1, 1), ",");
        assert_eq!(lexeme.describe(), "','");
    }
}
