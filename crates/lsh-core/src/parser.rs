//! Recursive-descent parser for the script language.
//!
//! Statements are dispatched on their first lexeme. Expressions are parsed
//! in two phases: primaries are collected into a flat operator chain, which
//! is then folded into a tree by descending operator precedence.
//!
//! Speculative parses (`$x` vs `$x = ...`, an operator after a primary) save
//! the position on an explicit stack and restore it when abandoned, so a
//! failed lookahead never consumes input.

use thiserror::Error;

use crate::ast::*;
use crate::error::ScriptError;
use crate::lexeme::{is_identifier, Lexeme, LexemeKind, SourceLocation};
use crate::lexer;

/// A fatal parse failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("parse error at {location}: {message}")]
pub struct ParseError {
    pub location: SourceLocation,
    pub message: String,
}

impl ParseError {
    fn new(location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

enum ChainItem {
    Operand(Expression),
    Operator(Operator),
}

fn binary_operator(kind: LexemeKind) -> Option<Operator> {
    Some(match kind {
        LexemeKind::Plus => Operator::Add,
        LexemeKind::Minus => Operator::Subtract,
        LexemeKind::Star => Operator::Multiply,
        LexemeKind::Slash => Operator::Divide,
        LexemeKind::Percent => Operator::Modulo,
        LexemeKind::Less => Operator::Less,
        LexemeKind::LessOrEqual => Operator::LessOrEqual,
        LexemeKind::More => Operator::More,
        LexemeKind::MoreOrEqual => Operator::MoreOrEqual,
        LexemeKind::Equal => Operator::Equal,
        LexemeKind::NotEqual => Operator::NotEqual,
        LexemeKind::And => Operator::And,
        LexemeKind::Or => Operator::Or,
        _ => return None,
    })
}

/// Lexemes that end a command's argument list or a simple statement.
fn ends_statement(kind: LexemeKind) -> bool {
    matches!(
        kind,
        LexemeKind::NewLine
            | LexemeKind::Semicolon
            | LexemeKind::Hash
            | LexemeKind::RightBrace
            | LexemeKind::EndOfFile
    )
}

/// Only digits, a sign or a dot may start a number, so `nan` and `inf`
/// stay plain words.
fn parse_number(text: &str) -> Option<f64> {
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || first == '.') {
        return None;
    }
    text.parse::<f64>().ok()
}

pub struct Parser {
    lexemes: Vec<Lexeme>,
    pos: usize,
    marks: Vec<usize>,
    paren_depth: usize,
    /// Set while reading a command's arguments.
    in_command: bool,
}

impl Parser {
    pub fn new(mut lexemes: Vec<Lexeme>) -> Self {
        let needs_eof = lexemes
            .last()
            .map_or(true, |l| l.kind != LexemeKind::EndOfFile);
        if needs_eof {
            let location = lexemes.last().map(|l| l.location).unwrap_or_default();
            lexemes.push(Lexeme::new(LexemeKind::EndOfFile, location, ""));
        }
        Self {
            lexemes,
            pos: 0,
            marks: Vec::new(),
            paren_depth: 0,
            in_command: false,
        }
    }

    // ── Cursor ─────────────────────────────────────────────────────────────

    fn peek(&self) -> &Lexeme {
        let last = self.lexemes.len() - 1;
        &self.lexemes[self.pos.min(last)]
    }

    fn peek_kind(&self) -> LexemeKind {
        self.peek().kind
    }

    fn peek_next_kind(&self) -> LexemeKind {
        let last = self.lexemes.len() - 1;
        self.lexemes[(self.pos + 1).min(last)].kind
    }

    fn advance(&mut self) -> Lexeme {
        let lexeme = self.peek().clone();
        if lexeme.kind != LexemeKind::EndOfFile {
            self.pos += 1;
        }
        lexeme
    }

    fn mark(&mut self) {
        self.marks.push(self.pos);
    }

    fn reset(&mut self) {
        if let Some(pos) = self.marks.pop() {
            self.pos = pos;
        }
    }

    fn commit(&mut self) {
        self.marks.pop();
    }

    fn take(&mut self, kind: LexemeKind) -> Result<Lexeme, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(kind.display_text()))
        }
    }

    fn try_take(&mut self, kind: LexemeKind) -> Option<Lexeme> {
        if self.peek_kind() == kind {
            Some(self.advance())
        } else {
            None
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let found = self.peek();
        ParseError::new(
            found.location,
            format!("expected {}, found {}", expected, found.describe()),
        )
    }

    fn skip_whitespace(&mut self) {
        while self.peek_kind() == LexemeKind::Whitespace {
            self.advance();
        }
    }

    fn skip_noise(&mut self) {
        while matches!(self.peek_kind(), LexemeKind::Whitespace | LexemeKind::NewLine) {
            self.advance();
        }
    }

    /// Whitespace, plus newlines while inside parentheses.
    fn skip_gap(&mut self) {
        if self.paren_depth > 0 {
            self.skip_noise();
        } else {
            self.skip_whitespace();
        }
    }

    fn take_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        let lexeme = self.take(LexemeKind::String).map_err(|_| self.unexpected(what))?;
        if !is_identifier(&lexeme.content) {
            return Err(ParseError::new(
                lexeme.location,
                format!("invalid {} '{}'", what, lexeme.content),
            ));
        }
        Ok(lexeme.content)
    }

    fn expect_statement_end(&mut self) -> Result<(), ParseError> {
        self.skip_whitespace();
        if ends_statement(self.peek_kind()) {
            Ok(())
        } else {
            Err(self.unexpected("end of statement"))
        }
    }

    // ── Statements ─────────────────────────────────────────────────────────

    pub fn parse_file(&mut self) -> Result<File, ParseError> {
        let mut statements = Vec::new();
        loop {
            self.skip_noise();
            match self.peek_kind() {
                LexemeKind::EndOfFile => break,
                LexemeKind::Semicolon => {
                    self.advance();
                }
                _ => statements.push(self.parse_statement()?),
            }
        }
        Ok(File { statements })
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.skip_noise();
        self.take(LexemeKind::LeftBrace)?;
        let mut statements = Vec::new();
        loop {
            self.skip_noise();
            match self.peek_kind() {
                LexemeKind::RightBrace => {
                    self.advance();
                    return Ok(statements);
                }
                LexemeKind::EndOfFile => return Err(self.unexpected("'}'")),
                LexemeKind::Semicolon => {
                    self.advance();
                }
                _ => statements.push(self.parse_statement()?),
            }
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let current = self.peek().clone();
        match current.kind {
            LexemeKind::Hash => self.parse_comment(),
            LexemeKind::Keyword => match current.content.as_str() {
                "return" => self.parse_return(),
                "function" => self.parse_function(),
                "if" => self.parse_if(),
                "while" => self.parse_while(),
                "for" => self.parse_for(),
                "true" | "false" | "null" => self.parse_expression_statement(),
                _ => Err(ParseError::new(
                    current.location,
                    format!("unexpected keyword '{}'", current.content),
                )),
            },
            LexemeKind::String | LexemeKind::QuotedString => self.parse_command(),
            LexemeKind::Bang | LexemeKind::Dollar | LexemeKind::LeftParen | LexemeKind::Minus => {
                self.parse_expression_statement()
            }
            _ => Err(self.unexpected("statement")),
        }
    }

    fn parse_comment(&mut self) -> Result<Statement, ParseError> {
        let hash = self.take(LexemeKind::Hash)?;
        let text = match self.try_take(LexemeKind::String) {
            Some(lexeme) => lexeme.content.trim().to_string(),
            None => String::new(),
        };
        Ok(Statement::new(StatementKind::Comment(text), hash.location))
    }

    fn parse_expression_statement(&mut self) -> Result<Statement, ParseError> {
        let location = self.peek().location;
        let expr = self.parse_expression()?;
        if !expr.can_stand_alone() {
            return Err(ParseError::new(
                location,
                "only assignments and function calls can be used as statements",
            ));
        }
        self.expect_statement_end()?;
        Ok(Statement::new(StatementKind::Expression(expr), location))
    }

    fn parse_return(&mut self) -> Result<Statement, ParseError> {
        let keyword = self.advance();
        self.skip_whitespace();
        let value = if ends_statement(self.peek_kind()) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_statement_end()?;
        Ok(Statement::new(StatementKind::Return(value), keyword.location))
    }

    fn parse_function(&mut self) -> Result<Statement, ParseError> {
        let keyword = self.advance();
        self.skip_whitespace();
        let name = self.take_identifier("function name")?;
        self.skip_whitespace();
        self.take(LexemeKind::LeftParen)?;
        self.paren_depth += 1;

        let mut parameters: Vec<Parameter> = Vec::new();
        self.skip_noise();
        if self.peek_kind() != LexemeKind::RightParen {
            loop {
                let location = self.peek().location;
                let parameter = self.parse_parameter()?;
                if !parameter.is_optional() && parameters.iter().any(|p| p.is_optional()) {
                    return Err(ParseError::new(
                        location,
                        format!(
                            "required parameter '{}' follows an optional parameter",
                            parameter.name
                        ),
                    ));
                }
                if parameters.iter().any(|p| p.name == parameter.name) {
                    return Err(ParseError::new(
                        location,
                        format!("duplicate parameter '{}'", parameter.name),
                    ));
                }
                parameters.push(parameter);
                self.skip_noise();
                if self.try_take(LexemeKind::Comma).is_none() {
                    break;
                }
                self.skip_noise();
            }
        }
        self.take(LexemeKind::RightParen)?;
        self.paren_depth -= 1;

        let body = self.parse_block()?;
        Ok(Statement::new(
            StatementKind::FunctionDeclaration {
                name,
                parameters,
                body,
            },
            keyword.location,
        ))
    }

    fn parse_parameter(&mut self) -> Result<Parameter, ParseError> {
        self.try_take(LexemeKind::Dollar);
        let name = self.take_identifier("parameter name")?;
        self.skip_noise();
        let default = if self.try_take(LexemeKind::Assign).is_some() {
            self.skip_noise();
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Parameter { name, default })
    }

    fn parse_condition(&mut self) -> Result<Expression, ParseError> {
        self.skip_whitespace();
        self.take(LexemeKind::LeftParen)?;
        self.paren_depth += 1;
        self.skip_noise();
        let condition = self.parse_expression()?;
        self.skip_noise();
        self.take(LexemeKind::RightParen)?;
        self.paren_depth -= 1;
        Ok(condition)
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        let keyword = self.advance();
        let condition = self.parse_condition()?;
        let body = self.parse_block()?;

        self.mark();
        self.skip_noise();
        let else_branch = if self.peek().is_keyword("else") {
            self.commit();
            self.advance();
            self.skip_noise();
            if self.peek().is_keyword("if") {
                Some(ElseBranch::If(Box::new(self.parse_if()?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            self.reset();
            None
        };

        Ok(Statement::new(
            StatementKind::If {
                condition,
                body,
                else_branch,
            },
            keyword.location,
        ))
    }

    fn parse_while(&mut self) -> Result<Statement, ParseError> {
        let keyword = self.advance();
        let condition = self.parse_condition()?;
        let body = self.parse_block()?;
        Ok(Statement::new(
            StatementKind::While { condition, body },
            keyword.location,
        ))
    }

    fn is_word(&self, word: &str) -> bool {
        let current = self.peek();
        current.kind == LexemeKind::String && current.content == word
    }

    fn parse_for(&mut self) -> Result<Statement, ParseError> {
        let keyword = self.advance();
        self.skip_whitespace();
        self.take(LexemeKind::LeftParen)?;
        self.paren_depth += 1;
        self.skip_noise();
        self.take(LexemeKind::Dollar)?;
        let variable = self.take_identifier("loop variable")?;
        self.skip_noise();

        let from = if self.is_word("from") {
            self.advance();
            self.skip_noise();
            let from = self.parse_expression()?;
            self.skip_noise();
            Some(from)
        } else {
            None
        };

        if !self.is_word("to") {
            return Err(self.unexpected("'to'"));
        }
        self.advance();
        self.skip_noise();
        let to = self.parse_expression()?;
        self.skip_noise();
        self.take(LexemeKind::RightParen)?;
        self.paren_depth -= 1;

        let body = self.parse_block()?;
        Ok(Statement::new(
            StatementKind::For {
                variable,
                from,
                to,
                body,
            },
            keyword.location,
        ))
    }

    fn parse_command(&mut self) -> Result<Statement, ParseError> {
        let name = self.advance();
        let mut arguments = Vec::new();
        self.in_command = true;
        let parsed = loop {
            self.skip_whitespace();
            if ends_statement(self.peek_kind()) {
                break Ok(());
            }
            match self.parse_expression() {
                Ok(argument) => arguments.push(argument),
                Err(e) => break Err(e),
            }
        };
        self.in_command = false;
        parsed?;
        Ok(Statement::new(
            StatementKind::Command {
                name: name.content,
                arguments,
            },
            name.location,
        ))
    }

    // ── Expressions ────────────────────────────────────────────────────────

    pub fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let location = self.peek().location;
        let mut chain = vec![ChainItem::Operand(self.parse_primary()?)];

        loop {
            self.mark();
            let spaced = self.peek_kind() == LexemeKind::Whitespace;
            self.skip_gap();
            let Some(op) = binary_operator(self.peek_kind()) else {
                self.reset();
                break;
            };
            if op == Operator::Subtract && spaced && self.starts_negative_argument() {
                self.reset();
                break;
            }
            self.commit();
            self.advance();
            self.skip_gap();
            chain.push(ChainItem::Operator(op));
            chain.push(ChainItem::Operand(self.parse_primary()?));
        }

        fold_chain(chain, location)
    }

    /// In a command's argument list, `a -b` is two arguments: a `-` with
    /// space before it and none after starts a negative operand.
    fn starts_negative_argument(&self) -> bool {
        self.in_command
            && self.paren_depth == 0
            && self.peek_next_kind() != LexemeKind::Whitespace
            && !ends_statement(self.peek_next_kind())
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        self.skip_gap();
        let current = self.peek().clone();
        match current.kind {
            LexemeKind::LeftParen => {
                self.advance();
                self.paren_depth += 1;
                self.skip_noise();
                let inner = self.parse_expression()?;
                self.skip_noise();
                self.take(LexemeKind::RightParen)?;
                self.paren_depth -= 1;
                Ok(inner)
            }
            LexemeKind::String => {
                self.advance();
                Ok(match parse_number(&current.content) {
                    Some(n) => Expression::Number(n),
                    None => Expression::String(current.content),
                })
            }
            LexemeKind::QuotedString => {
                self.advance();
                Ok(Expression::String(current.content))
            }
            LexemeKind::Keyword => match current.content.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expression::Boolean(true))
                }
                "false" => {
                    self.advance();
                    Ok(Expression::Boolean(false))
                }
                "null" => {
                    self.advance();
                    Ok(Expression::Null)
                }
                _ => Err(self.unexpected("expression")),
            },
            LexemeKind::Bang => {
                self.advance();
                self.parse_bang()
            }
            LexemeKind::Minus => {
                self.advance();
                Ok(match self.parse_primary()? {
                    Expression::Number(n) => Expression::Number(-n),
                    operand => Expression::Unary {
                        op: Operator::Negate,
                        operand: Box::new(operand),
                    },
                })
            }
            LexemeKind::Dollar => {
                self.advance();
                self.parse_variable()
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// `!name(args)` is a call; any other `!operand` is a negation.
    fn parse_bang(&mut self) -> Result<Expression, ParseError> {
        self.mark();
        match self.try_take(LexemeKind::String) {
            Some(name) if is_identifier(&name.content) => {
                self.commit();
                let arguments = self.parse_call_arguments()?;
                Ok(Expression::FunctionCall {
                    name: name.content,
                    arguments,
                })
            }
            _ => {
                self.reset();
                let operand = self.parse_primary()?;
                Ok(Expression::Unary {
                    op: Operator::Negate,
                    operand: Box::new(operand),
                })
            }
        }
    }

    fn parse_call_arguments(&mut self) -> Result<Vec<Expression>, ParseError> {
        let mut arguments = Vec::new();
        if self.try_take(LexemeKind::LeftParen).is_none() {
            return Ok(arguments);
        }
        self.paren_depth += 1;
        self.skip_noise();
        if self.peek_kind() != LexemeKind::RightParen {
            loop {
                arguments.push(self.parse_expression()?);
                self.skip_noise();
                if self.try_take(LexemeKind::Comma).is_none() {
                    break;
                }
                self.skip_noise();
            }
        }
        self.take(LexemeKind::RightParen)?;
        self.paren_depth -= 1;
        Ok(arguments)
    }

    fn parse_variable(&mut self) -> Result<Expression, ParseError> {
        let name = self.take_identifier("variable name")?;

        self.mark();
        self.skip_whitespace();
        match self.peek_kind() {
            LexemeKind::Assign => {
                self.commit();
                self.advance();
                let value = self.parse_expression()?;
                Ok(Expression::VariableAssign {
                    name,
                    value: Box::new(value),
                })
            }
            kind @ (LexemeKind::Increment | LexemeKind::Decrement) => {
                self.commit();
                self.advance();
                let op = if kind == LexemeKind::Increment {
                    Operator::Add
                } else {
                    Operator::Subtract
                };
                Ok(Expression::VariableAssign {
                    value: Box::new(Expression::binary(
                        Expression::VariableAccess(name.clone()),
                        op,
                        Expression::Number(1.0),
                    )),
                    name,
                })
            }
            _ => {
                self.reset();
                Ok(Expression::VariableAccess(name))
            }
        }
    }
}

fn operand(item: ChainItem, location: SourceLocation) -> Result<Expression, ParseError> {
    match item {
        ChainItem::Operand(expr) => Ok(expr),
        ChainItem::Operator(op) => Err(ParseError::new(
            location,
            format!("malformed expression near '{}'", op),
        )),
    }
}

/// Folds `a op b op c ...` into a tree, highest precedence first, left to
/// right within one precedence level.
fn fold_chain(mut chain: Vec<ChainItem>, location: SourceLocation) -> Result<Expression, ParseError> {
    let mut ranks: Vec<u8> = chain
        .iter()
        .filter_map(|item| match item {
            ChainItem::Operator(op) => Some(op.precedence()),
            ChainItem::Operand(_) => None,
        })
        .collect();
    ranks.sort_unstable_by(|a, b| b.cmp(a));
    ranks.dedup();

    for rank in ranks {
        let mut i = 1;
        while i < chain.len() {
            let op = match &chain[i] {
                ChainItem::Operator(op) if op.precedence() == rank => *op,
                _ => {
                    i += 2;
                    continue;
                }
            };
            if i + 1 >= chain.len() {
                return Err(ParseError::new(
                    location,
                    format!("missing operand after '{}'", op),
                ));
            }
            let right = operand(chain.remove(i + 1), location)?;
            chain.remove(i);
            let left = operand(chain.remove(i - 1), location)?;
            chain.insert(i - 1, ChainItem::Operand(Expression::binary(left, op, right)));
        }
    }

    if chain.len() != 1 {
        return Err(ParseError::new(location, "malformed operator chain"));
    }
    match chain.pop() {
        Some(item) => operand(item, location),
        None => Err(ParseError::new(location, "empty expression")),
    }
}

/// Lexes and parses a whole script.
pub fn parse(source: &str) -> Result<File, ScriptError> {
    let lexemes = lexer::tokenize(source)?;
    let mut parser = Parser::new(lexemes);
    Ok(parser.parse_file()?)
}
