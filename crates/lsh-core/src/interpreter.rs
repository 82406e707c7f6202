//! Tree-walking evaluator for parsed scripts.
//!
//! Statements run against a [`ContextStack`]. Bodies of `if`, `while`,
//! `for` and function calls each get their own scope, which is popped on
//! every exit path. Command statements call script functions first and
//! fall back to host commands through [`Environment::invoke`].

use std::cmp::Ordering;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info_span};

use crate::ast::{ElseBranch, Expression, File, Operator, Statement, StatementKind};
use crate::command::CommandError;
use crate::environment::Environment;
use crate::scope::{ContextStack, Function};
use crate::value::{format_number, Value};

/// Script-function nesting allowed before a call fails.
pub const MAX_CALL_DEPTH: usize = 200;

/// Remaining stack below which a call moves onto a fresh segment.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

/// Largest magnitude a `for` bound may have; past it `i + 1` no longer
/// changes `i`.
const MAX_LOOP_BOUND: f64 = 9_007_199_254_740_992.0;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("undefined variable '${0}'")]
    UndefinedVariable(String),

    #[error("undefined function '{0}'")]
    UndefinedFunction(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("'{name}' expects {expected} argument(s), got {given}")]
    ArgumentCount {
        name: String,
        expected: String,
        given: usize,
    },

    #[error("call depth exceeded {0}")]
    RecursionLimit(usize),

    #[error("invalid 'for' range: {0}")]
    InvalidRange(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<RuntimeError>,
    },
}

impl RuntimeError {
    /// Attaches a line number unless one is already present.
    fn at_line(self, line: usize) -> Self {
        match self {
            located @ RuntimeError::AtLine { .. } => located,
            other => RuntimeError::AtLine {
                line,
                source: Box::new(other),
            },
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            RuntimeError::AtLine { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// The error without its location wrapper.
    pub fn root(&self) -> &RuntimeError {
        match self {
            RuntimeError::AtLine { source, .. } => source.root(),
            other => other,
        }
    }
}

enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter<'e> {
    env: &'e mut Environment,
    stack: ContextStack,
    call_depth: usize,
}

impl<'e> Interpreter<'e> {
    pub fn new(env: &'e mut Environment) -> Self {
        Self {
            env,
            stack: ContextStack::new(),
            call_depth: 0,
        }
    }

    pub fn stack(&self) -> &ContextStack {
        &self.stack
    }

    /// Runs every top-level statement. A top-level `return` stops the
    /// script and its value is handed back.
    pub fn run(&mut self, file: &File) -> Result<Option<Value>, RuntimeError> {
        let span = info_span!("run_script", statements = file.statements.len());
        let _enter = span.enter();

        match self.execute_block(&file.statements)? {
            Flow::Return(value) => Ok(Some(value)),
            Flow::Normal => Ok(None),
        }
    }

    pub fn evaluate(&mut self, expression: &Expression) -> Result<Value, RuntimeError> {
        self.eval(expression)
    }

    fn execute_block(&mut self, statements: &[Statement]) -> Result<Flow, RuntimeError> {
        for statement in statements {
            if let Flow::Return(value) = self.execute(statement)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn scoped<F>(&mut self, body: F) -> Result<Flow, RuntimeError>
    where
        F: FnOnce(&mut Self) -> Result<Flow, RuntimeError>,
    {
        self.stack.push();
        let result = body(self);
        self.stack.pop();
        result
    }

    fn execute(&mut self, statement: &Statement) -> Result<Flow, RuntimeError> {
        self.execute_kind(&statement.kind)
            .map_err(|e| e.at_line(statement.location.line))
    }

    fn execute_kind(&mut self, kind: &StatementKind) -> Result<Flow, RuntimeError> {
        match kind {
            StatementKind::Comment(_) => Ok(Flow::Normal),

            StatementKind::FunctionDeclaration {
                name,
                parameters,
                body,
            } => {
                debug!(name = %name, parameters = parameters.len(), "function declared");
                self.stack.define_function(Function {
                    name: name.clone(),
                    parameters: parameters.clone(),
                    body: Rc::new(body.clone()),
                });
                Ok(Flow::Normal)
            }

            StatementKind::Command { name, arguments } => {
                let values = self.eval_all(arguments)?;
                match self.stack.function(name) {
                    Some(function) => {
                        self.call_function(function, values)?;
                    }
                    None => {
                        self.env.invoke(name, values)?;
                    }
                }
                Ok(Flow::Normal)
            }

            StatementKind::Expression(expression) => {
                self.eval(expression)?;
                Ok(Flow::Normal)
            }

            StatementKind::Return(expression) => {
                let value = match expression {
                    Some(expression) => self.eval(expression)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }

            StatementKind::If {
                condition,
                body,
                else_branch,
            } => {
                if self.condition(condition)? {
                    self.scoped(|it| it.execute_block(body))
                } else {
                    match else_branch {
                        Some(ElseBranch::If(statement)) => self.execute(statement),
                        Some(ElseBranch::Block(body)) => self.scoped(|it| it.execute_block(body)),
                        None => Ok(Flow::Normal),
                    }
                }
            }

            StatementKind::While { condition, body } => {
                while self.condition(condition)? {
                    if let Flow::Return(value) = self.scoped(|it| it.execute_block(body))? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }

            StatementKind::For {
                variable,
                from,
                to,
                body,
            } => {
                let start = match from {
                    Some(from) => {
                        let value = self.eval(from)?;
                        expect_number(&value, "'for' lower bound")?
                    }
                    None => 0.0,
                };
                let value = self.eval(to)?;
                let end = expect_number(&value, "'for' upper bound")?;
                for bound in [start, end] {
                    if !bound.is_finite() || bound.abs() > MAX_LOOP_BOUND {
                        return Err(RuntimeError::InvalidRange(format!(
                            "bound {} is out of range",
                            format_number(bound)
                        )));
                    }
                }

                let mut i = start;
                while i < end {
                    let flow = self.scoped(|it| {
                        it.stack.define(variable, Value::Number(i));
                        it.execute_block(body)
                    })?;
                    if let Flow::Return(value) = flow {
                        return Ok(Flow::Return(value));
                    }
                    i += 1.0;
                }
                Ok(Flow::Normal)
            }
        }
    }

    fn condition(&mut self, expression: &Expression) -> Result<bool, RuntimeError> {
        match self.eval(expression)? {
            Value::Boolean(b) => Ok(b),
            other => Err(RuntimeError::TypeMismatch(format!(
                "condition must be a boolean, got {}",
                other.type_name()
            ))),
        }
    }

    fn eval_all(&mut self, expressions: &[Expression]) -> Result<Vec<Value>, RuntimeError> {
        expressions.iter().map(|e| self.eval(e)).collect()
    }

    fn eval(&mut self, expression: &Expression) -> Result<Value, RuntimeError> {
        match expression {
            Expression::Number(n) => Ok(Value::Number(*n)),
            Expression::String(s) => Ok(Value::String(s.clone())),
            Expression::Boolean(b) => Ok(Value::Boolean(*b)),
            Expression::Null => Ok(Value::Null),

            Expression::VariableAccess(name) => self
                .stack
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::UndefinedVariable(name.clone())),

            Expression::VariableAssign { name, value } => {
                let value = self.eval(value)?;
                self.stack.assign(name, value.clone());
                Ok(value)
            }

            Expression::FunctionCall { name, arguments } => {
                let function = self
                    .stack
                    .function(name)
                    .ok_or_else(|| RuntimeError::UndefinedFunction(name.clone()))?;
                let values = self.eval_all(arguments)?;
                self.call_function(function, values)
            }

            Expression::Unary { op, operand } => match (op, self.eval(operand)?) {
                (Operator::Negate, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
                (Operator::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
                (op, value) => Err(RuntimeError::TypeMismatch(format!(
                    "cannot apply unary '{}' to {}",
                    op,
                    value.type_name()
                ))),
            },

            Expression::Binary { left, op, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                apply_binary(*op, left, right)
            }
        }
    }

    fn call_function(
        &mut self,
        function: Rc<Function>,
        values: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let required = function.required_count();
        let total = function.parameters.len();
        if values.len() < required || values.len() > total {
            let expected = if required == total {
                total.to_string()
            } else {
                format!("{}..{}", required, total)
            };
            return Err(RuntimeError::ArgumentCount {
                name: function.name.clone(),
                expected,
                given: values.len(),
            });
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::RecursionLimit(MAX_CALL_DEPTH));
        }

        debug!(name = %function.name, args = values.len(), depth = self.call_depth, "calling function");
        self.call_depth += 1;
        let flow = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.scoped(|it| it.bind_and_run(&function, values))
        });
        self.call_depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Null),
        }
    }

    /// Parameters are bound in order; defaults are evaluated inside the
    /// call scope so they can see earlier parameters.
    fn bind_and_run(&mut self, function: &Function, values: Vec<Value>) -> Result<Flow, RuntimeError> {
        let mut values = values.into_iter();
        for parameter in &function.parameters {
            let value = match (values.next(), &parameter.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval(default)?,
                (None, None) => Value::Null,
            };
            self.stack.define(&parameter.name, value);
        }
        self.execute_block(&function.body)
    }
}

fn expect_number(value: &Value, what: &str) -> Result<f64, RuntimeError> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(RuntimeError::TypeMismatch(format!(
            "{} must be a number, got {}",
            what,
            other.type_name()
        ))),
    }
}

/// Applies a binary operator to two evaluated operands.
pub fn apply_binary(op: Operator, left: Value, right: Value) -> Result<Value, RuntimeError> {
    let mismatch = |left: &Value, right: &Value| {
        RuntimeError::TypeMismatch(format!(
            "cannot apply '{}' to {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))
    };

    match op {
        Operator::Add => match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", left, right)))
            }
            _ => Err(mismatch(&left, &right)),
        },
        Operator::Subtract | Operator::Multiply | Operator::Divide | Operator::Modulo => {
            match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(match op {
                    Operator::Subtract => a - b,
                    Operator::Multiply => a * b,
                    Operator::Divide => a / b,
                    _ => a % b,
                })),
                _ => Err(mismatch(&left, &right)),
            }
        }
        Operator::Less | Operator::LessOrEqual | Operator::More | Operator::MoreOrEqual => {
            let ordering = match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => return Err(mismatch(&left, &right)),
            };
            let result = match ordering {
                // NaN compares false against everything.
                None => false,
                Some(ordering) => match op {
                    Operator::Less => ordering == Ordering::Less,
                    Operator::LessOrEqual => ordering != Ordering::Greater,
                    Operator::More => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                },
            };
            Ok(Value::Boolean(result))
        }
        Operator::Equal => Ok(Value::Boolean(left == right)),
        Operator::NotEqual => Ok(Value::Boolean(left != right)),
        Operator::And | Operator::Or => match (&left, &right) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(if op == Operator::And {
                *a && *b
            } else {
                *a || *b
            })),
            _ => Err(mismatch(&left, &right)),
        },
        Operator::Negate => Err(mismatch(&left, &right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandSpec, ParamType};
    use crate::frontend::{BufferFrontend, Color};
    use crate::parser::parse;

    fn run(source: &str) -> Result<Option<Value>, RuntimeError> {
        let mut env = Environment::default();
        let file = parse(source).unwrap();
        Interpreter::new(&mut env).run(&file)
    }

    fn value_of(source: &str) -> Value {
        match run(source) {
            Ok(Some(value)) => value,
            other => panic!("Expected a returned value, got {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(value_of("return 2 + 3 * 4"), Value::Number(14.0));
        assert_eq!(value_of("return (2 + 3) * 4"), Value::Number(20.0));
        assert_eq!(value_of("return 10 - 4 - 3"), Value::Number(3.0));
        assert_eq!(value_of("return 7 % 4"), Value::Number(3.0));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(value_of("return \"n=\" + 5"), Value::from("n=5"));
        assert_eq!(value_of("return 1 + \"x\""), Value::from("1x"));
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(value_of("return 1 < 2 && 3 >= 3"), Value::Boolean(true));
        assert_eq!(value_of("return \"a\" < \"b\""), Value::Boolean(true));
        assert_eq!(value_of("return 1 == \"1\""), Value::Boolean(false));
        assert_eq!(value_of("return null == null"), Value::Boolean(true));
        assert_eq!(value_of("return !false || false"), Value::Boolean(true));
    }

    #[test]
    fn test_mismatched_operands_fail() {
        let err = run("return true + 1").unwrap_err();
        assert!(matches!(err.root(), RuntimeError::TypeMismatch(_)));
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn test_conditions_must_be_boolean() {
        let err = run("if (1) { return 1 }").unwrap_err();
        match err.root() {
            RuntimeError::TypeMismatch(msg) => assert!(msg.contains("boolean")),
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_function_call_and_return() {
        let source = "function f($n) { return $n + 1 }\nreturn !f(3)";
        assert_eq!(value_of(source), Value::Number(4.0));
    }

    #[test]
    fn test_default_parameters() {
        let source = "function f($a, $b = 10) { return $a + $b }\nreturn !f(1) + !f(1, 2)";
        assert_eq!(value_of(source), Value::Number(14.0));
    }

    #[test]
    fn test_argument_count_is_checked() {
        let err = run("function f($a) { return $a }\n!f(1, 2)").unwrap_err();
        match err.root() {
            RuntimeError::ArgumentCount { name, expected, given } => {
                assert_eq!(name, "f");
                assert_eq!(expected, "1");
                assert_eq!(*given, 2);
            }
            other => panic!("Expected ArgumentCount, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment_in_block_updates_globals() {
        let source = "\
$x = 1
if (true) {
    $x = 2
    $y = 3
}
return $x + $y";
        // $y did not exist before, so assignment created it globally.
        assert_eq!(value_of(source), Value::Number(5.0));
    }

    #[test]
    fn test_parameters_shadow_globals() {
        let source = "\
$n = 100
function f($n) { $n = $n * 2
return $n }
return !f(3) + $n";
        assert_eq!(value_of(source), Value::Number(106.0));
    }

    #[test]
    fn test_while_loop() {
        let source = "\
$i = 0
$sum = 0
while ($i < 5) {
    $sum = $sum + $i
    $i++
}
return $sum";
        assert_eq!(value_of(source), Value::Number(10.0));
    }

    #[test]
    fn test_for_loop_is_half_open() {
        let source = "\
$sum = 0
for ($i from 2 to 5) { $sum = $sum + $i }
return $sum";
        assert_eq!(value_of(source), Value::Number(9.0));

        let source = "\
$count = 0
for ($i to 3) { $count++ }
return $count";
        assert_eq!(value_of(source), Value::Number(3.0));
    }

    #[test]
    fn test_for_rejects_bounds_past_integer_precision() {
        let err = run("for ($i to 1e20) { }").unwrap_err();
        assert!(matches!(err.root(), RuntimeError::InvalidRange(_)));
        assert_eq!(err.line(), Some(1));

        let err = run("for ($i from -1e17 to 0) { }").unwrap_err();
        assert!(matches!(err.root(), RuntimeError::InvalidRange(_)));
    }

    #[test]
    fn test_loop_variable_is_scoped() {
        let err = run("for ($i to 2) { }\nreturn $i").unwrap_err();
        assert!(matches!(err.root(), RuntimeError::UndefinedVariable(name) if name == "i"));
    }

    #[test]
    fn test_return_from_nested_loop() {
        let source = "\
function first_over($limit) {
    for ($i to 100) {
        if ($i > $limit) { return $i }
    }
    return -1
}
return !first_over(41)";
        assert_eq!(value_of(source), Value::Number(42.0));
    }

    #[test]
    fn test_else_if_chain() {
        let source = "\
function sign($n) {
    if ($n < 0) { return -1 } else if ($n == 0) { return 0 } else { return 1 }
}
return !sign(-5) + !sign(0) * 10 + !sign(9) * 100";
        assert_eq!(value_of(source), Value::Number(99.0));
    }

    #[test]
    fn test_recursion() {
        let source = "\
function fact($n) {
    if ($n <= 1) { return 1 }
    return $n * !fact($n - 1)
}
return !fact(10)";
        assert_eq!(value_of(source), Value::Number(3628800.0));
    }

    #[test]
    fn test_recursion_limit() {
        let err = run("function loop($n) { return !loop($n + 1) }\n!loop(0)").unwrap_err();
        assert!(matches!(err.root(), RuntimeError::RecursionLimit(MAX_CALL_DEPTH)));
    }

    #[test]
    fn test_recursion_limit_on_small_thread() {
        let handle = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| {
                let err = run("function loop($n) { return !loop($n + 1) }\n!loop(0)").unwrap_err();
                matches!(err.root(), RuntimeError::RecursionLimit(MAX_CALL_DEPTH))
            })
            .unwrap();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_undefined_function() {
        let err = run("!missing()").unwrap_err();
        assert!(matches!(err.root(), RuntimeError::UndefinedFunction(name) if name == "missing"));
    }

    #[test]
    fn test_error_reports_innermost_line() {
        let source = "function f() {\n  return $nope\n}\n!f()";
        let err = run(source).unwrap_err();
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_commands_reach_host_registry() {
        let probe = BufferFrontend::new();
        let mut env = Environment::default().with_frontend(probe.clone());
        env.register(
            CommandSpec::new("say").param("text", ParamType::String),
            |inv| {
                let text = inv.arg(0).as_str().unwrap_or_default().to_string();
                inv.frontend.write_line(&text, Color::Default);
                Ok(Value::Null)
            },
        )
        .unwrap();

        let file = parse("$x = 5\nsay $x\nsay \"done\"").unwrap();
        Interpreter::new(&mut env).run(&file).unwrap();
        assert_eq!(probe.lines(), vec!["5", "done"]);
    }

    #[test]
    fn test_script_functions_shadow_commands() {
        let probe = BufferFrontend::new();
        let mut env = Environment::default().with_frontend(probe.clone());
        env.register(CommandSpec::new("greet"), |inv| {
            inv.frontend.write_line("host", Color::Default);
            Ok(Value::Null)
        })
        .unwrap();

        let file = parse("function greet() { $called = true }\ngreet\nreturn $called").unwrap();
        let result = Interpreter::new(&mut env).run(&file).unwrap();
        assert_eq!(result, Some(Value::Boolean(true)));
        assert_eq!(probe.text(), "");
    }

    #[test]
    fn test_command_errors_propagate() {
        let mut env = Environment::default();
        let file = parse("nosuchcommand 1 2").unwrap();
        let err = Interpreter::new(&mut env).run(&file).unwrap_err();
        assert!(matches!(err.root(), RuntimeError::Command(CommandError::NotFound { .. })));
    }

    #[test]
    fn test_scopes_are_popped_after_errors() {
        let mut env = Environment::default();
        let file = parse("function f() { return $nope }\n!f()").unwrap();
        let mut interpreter = Interpreter::new(&mut env);
        assert!(interpreter.run(&file).is_err());
        assert_eq!(interpreter.stack().depth(), 1);
    }
}
