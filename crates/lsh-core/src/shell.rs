//! Line-oriented shell.
//!
//! Each input line is either a variable operation (`$name`, `$name = value`,
//! `$name =`) or a command invocation. Command lines get `$name`
//! substitution, are split into tokens and run through
//! [`Environment::invoke`]. A failing line is reported to the front end and
//! recorded; the shell itself keeps going.
//!
//! # Example
//!
//! ```
//! use lsh_core::command::{CommandSpec, ParamType};
//! use lsh_core::environment::Environment;
//! use lsh_core::frontend::{BufferFrontend, Color};
//! use lsh_core::shell::Shell;
//! use lsh_core::value::Value;
//!
//! let output = BufferFrontend::new();
//! let mut env = Environment::default().with_frontend(output.clone());
//! env.register(CommandSpec::new("echo").param("text", ParamType::String), |inv| {
//!     let text = inv.arg(0).as_str().unwrap_or_default().to_string();
//!     inv.frontend.write_line(&text, Color::Default);
//!     Ok(Value::Null)
//! })
//! .unwrap();
//!
//! let mut shell = Shell::new(env);
//! shell.execute_line("$who = world");
//! shell.execute_line("echo hello $who");
//! assert_eq!(output.text(), "hello world\n");
//! ```

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command::CommandError;
use crate::environment::{Environment, LastError};
use crate::error::ScriptError;
use crate::frontend::Color;
use crate::interpreter::Interpreter;
use crate::lexeme::is_identifier;
use crate::parser;
use crate::preprocess;
use crate::resolver::Resolution;
use crate::value::Value;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("cannot split line: {0}")]
    Tokenize(String),

    #[error("invalid variable operation: {0}")]
    InvalidVariableOperation(String),

    #[error("undefined variable '${0}'")]
    UndefinedVariable(String),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Outcome of one input line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineResult {
    /// Blank line or comment.
    Empty,
    Done(Value),
    /// The error was reported and is available from [`Shell::last_error`].
    Failed,
}

pub struct Shell {
    env: Environment,
}

impl Shell {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn last_error(&self) -> Option<&LastError> {
        self.env.last_error()
    }

    /// Runs one line. Non-null results are written to the front end.
    pub fn execute_line(&mut self, line: &str) -> LineResult {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return LineResult::Empty;
        }

        match self.run_line(line) {
            Ok(value) => {
                if !value.is_null() {
                    self.env
                        .frontend_mut()
                        .write_line(&value.to_string(), Color::Default);
                }
                LineResult::Done(value)
            }
            Err(error) => {
                self.report(error);
                LineResult::Failed
            }
        }
    }

    fn run_line(&mut self, line: &str) -> Result<Value, ShellError> {
        if let Some(rest) = line.strip_prefix('$') {
            return self.variable_operation(rest);
        }

        let (name, remainder) = split_command(line);
        let remainder = if self.env.config().variable_substitution {
            substitute(remainder, self.env.variables())
        } else {
            remainder.to_string()
        };

        let raw = !remainder.is_empty()
            && matches!(
                self.env.registry().find(name, 1),
                Resolution::Found(command) if command.takes_raw_text()
            );
        let values = if raw {
            vec![Value::String(remainder)]
        } else {
            tokenize_line(&remainder)?
                .into_iter()
                .map(Value::String)
                .collect()
        };

        debug!(command = name, args = values.len(), raw, "executing line");
        Ok(self.env.invoke(name, values)?)
    }

    fn variable_operation(&mut self, rest: &str) -> Result<Value, ShellError> {
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let (name, tail) = rest.split_at(end);
        if !is_identifier(name) {
            return Err(ShellError::InvalidVariableOperation(format!(
                "'${}' is not a valid variable name",
                name
            )));
        }
        let tail = tail.trim_start();

        if tail.is_empty() {
            return match self.env.variable(name) {
                Some(value) => Ok(Value::String(value.to_string())),
                None => Err(ShellError::UndefinedVariable(name.to_string())),
            };
        }

        if tail.starts_with(":=") {
            warn!(variable = name, "':=' is not supported, line ignored");
            return Ok(Value::Null);
        }

        let Some(value) = tail.strip_prefix('=') else {
            return Err(ShellError::InvalidVariableOperation(format!(
                "unexpected '{}' after '${}'",
                tail, name
            )));
        };

        let value = value.trim();
        if value.is_empty() {
            self.env.remove_variable(name);
            debug!(variable = name, "variable cleared");
            return Ok(Value::Null);
        }

        let value = if self.env.config().variable_substitution {
            substitute(value, self.env.variables())
        } else {
            value.to_string()
        };
        let value = unquote(&value).unwrap_or(value);
        debug!(variable = name, value = %value, "variable set");
        self.env.set_variable(name, value);
        Ok(Value::Null)
    }

    fn report(&mut self, error: ShellError) {
        let message = error.to_string();
        warn!(error = %message, "line failed");

        let frontend = self.env.frontend_mut();
        frontend.pause_input();
        frontend.write("error: ", Color::Red);
        frontend.write_line(&message, Color::Red);
        frontend.resume_input();

        self.env.record_error(error);
    }

    /// Preprocesses, parses and runs script text. Includes resolve against
    /// the working directory.
    pub fn run_script(&mut self, source: &str) -> Result<Option<Value>, ScriptError> {
        let source = preprocess::expand_source(self.env.file_system(), source, Path::new(""))?;
        self.run_expanded(&source)
    }

    pub fn run_file(&mut self, path: &Path) -> Result<Option<Value>, ScriptError> {
        info!(path = %path.display(), "running script file");
        let fs = self.env.file_system();
        let source = fs.read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = preprocess::expand_loaded(fs, path, &source)?;
        self.run_expanded(&source)
    }

    fn run_expanded(&mut self, source: &str) -> Result<Option<Value>, ScriptError> {
        let file = parser::parse(source)?;
        let mut interpreter = Interpreter::new(&mut self.env);
        Ok(interpreter.run(&file)?)
    }
}

/// Splits off the command name at the first whitespace.
fn split_command(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(i) => (&line[..i], line[i..].trim()),
        None => (line, ""),
    }
}

/// A value that is exactly one quoted token loses its quotes.
fn unquote(value: &str) -> Option<String> {
    if !value.starts_with(['"', '\'']) {
        return None;
    }
    match tokenize_line(value) {
        Ok(mut tokens) if tokens.len() == 1 => tokens.pop(),
        _ => None,
    }
}

/// Replaces `$name` with the shell variable's value.
///
/// `\$` yields a literal `$`; other backslash pairs are kept for the
/// tokenizer. Unknown variables are left as written.
pub fn substitute(text: &str, variables: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, '$')) => out.push('$'),
                Some((_, next)) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '$' => {
                let start = i + 1;
                let mut end = start;
                while let Some(&(j, next)) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        end = j + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let name = &text[start..end];
                match variables.get(name) {
                    Some(value) if is_identifier(name) => out.push_str(value),
                    _ => {
                        out.push('$');
                        out.push_str(name);
                    }
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Splits a command line into arguments.
///
/// Whitespace separates tokens. Single quotes are literal, double quotes
/// allow backslash escapes, and an unquoted `#` starts a trailing comment.
pub fn tokenize_line(text: &str) -> Result<Vec<String>, ShellError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '#' if !in_token => break,
            '\\' => {
                in_token = true;
                match chars.next() {
                    Some(next) => current.push(next),
                    None => current.push('\\'),
                }
            }
            '"' | '\'' => {
                in_token = true;
                let quote = c;
                loop {
                    match chars.next() {
                        None => {
                            return Err(ShellError::Tokenize(format!(
                                "unterminated {} quote",
                                quote
                            )))
                        }
                        Some(q) if q == quote => break,
                        Some('\\') if quote == '"' => match chars.next() {
                            Some(next) => current.push(next),
                            None => {
                                return Err(ShellError::Tokenize(
                                    "unterminated \" quote".to_string(),
                                ))
                            }
                        },
                        Some(other) => current.push(other),
                    }
                }
            }
            other => {
                in_token = true;
                current.push(other);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
