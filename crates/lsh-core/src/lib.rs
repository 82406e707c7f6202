//! lsh-core: an embeddable command shell.
//!
//! This crate provides the pieces behind the `lsh` binary:
//!
//! - **Script language**: [`lexer`] and [`parser`] turn source text into an
//!   [`ast::File`]; the [`interpreter`] runs it against nested [`scope`]s.
//! - **Host commands**: the [`command`] registry, overload [`resolver`] and
//!   value [`convert`]ers expose native functions to scripts and the shell.
//! - **Line shell**: [`shell::Shell`] runs one line at a time with shell
//!   variables and `$name` substitution.
//! - **Includes**: the [`preprocess`]or expands `@include` before parsing.
//!
//! All state lives in an [`environment::Environment`]; output goes through a
//! [`frontend::Frontend`].
//!
//! # Example
//!
//! ```
//! use lsh_core::environment::Environment;
//! use lsh_core::shell::Shell;
//! use lsh_core::value::Value;
//!
//! let mut shell = Shell::new(Environment::default());
//! let result = shell.run_script("return 2 + 3 * 4").unwrap();
//! assert_eq!(result, Some(Value::Number(14.0)));
//! ```

pub mod ast;
pub mod command;
pub mod config;
pub mod convert;
pub mod environment;
pub mod error;
pub mod frontend;
pub mod fs;
pub mod interpreter;
pub mod lexeme;
pub mod lexer;
pub mod parser;
pub mod preprocess;
pub mod resolver;
pub mod scope;
pub mod shell;
pub mod value;

pub use command::{CommandError, CommandRegistry, CommandSpec, Invocation, ParamType};
pub use environment::Environment;
pub use error::ScriptError;
pub use shell::{LineResult, Shell};
pub use value::Value;
