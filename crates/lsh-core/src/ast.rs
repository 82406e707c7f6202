//! Syntax tree produced by the [`parser`](crate::parser).

use std::fmt;

use crate::lexeme::SourceLocation;

/// A parsed script: its top-level statements in source order.
#[derive(Debug, Clone, Default)]
pub struct File {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub location: SourceLocation,
}

impl Statement {
    pub fn new(kind: StatementKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Comment(String),
    FunctionDeclaration {
        name: String,
        parameters: Vec<Parameter>,
        body: Vec<Statement>,
    },
    Command {
        name: String,
        arguments: Vec<Expression>,
    },
    Expression(Expression),
    Return(Option<Expression>),
    If {
        condition: Expression,
        body: Vec<Statement>,
        else_branch: Option<ElseBranch>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    For {
        variable: String,
        from: Option<Expression>,
        to: Expression,
        body: Vec<Statement>,
    },
}

#[derive(Debug, Clone)]
pub enum ElseBranch {
    /// `else if (...) { ... }`
    If(Box<Statement>),
    /// `else { ... }`
    Block(Vec<Statement>),
}

/// A function parameter. Optional iff it has a default.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub default: Option<Expression>,
}

impl Parameter {
    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    VariableAccess(String),
    VariableAssign {
        name: String,
        value: Box<Expression>,
    },
    FunctionCall {
        name: String,
        arguments: Vec<Expression>,
    },
    Unary {
        op: Operator,
        operand: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        op: Operator,
        right: Box<Expression>,
    },
}

impl Expression {
    /// Only calls and assignments are allowed as statements on their own.
    pub fn can_stand_alone(&self) -> bool {
        matches!(
            self,
            Expression::FunctionCall { .. } | Expression::VariableAssign { .. }
        )
    }

    pub fn binary(left: Expression, op: Operator, right: Expression) -> Self {
        Expression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Negate,
    Multiply,
    Divide,
    Modulo,
    Add,
    Subtract,
    Less,
    LessOrEqual,
    More,
    MoreOrEqual,
    Equal,
    NotEqual,
    And,
    Or,
}

impl Operator {
    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Negate => 6,
            Operator::Multiply | Operator::Divide | Operator::Modulo => 5,
            Operator::Add | Operator::Subtract => 4,
            Operator::Less
            | Operator::LessOrEqual
            | Operator::More
            | Operator::MoreOrEqual
            | Operator::Equal
            | Operator::NotEqual => 3,
            Operator::And => 2,
            Operator::Or => 1,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Negate => "!",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Modulo => "%",
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
            Operator::More => ">",
            Operator::MoreOrEqual => ">=",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::And => "&&",
            Operator::Or => "||",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
