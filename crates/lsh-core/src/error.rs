//! Top-level error type for loading and running scripts.

use std::path::PathBuf;

use thiserror::Error;

use crate::interpreter::RuntimeError;
use crate::lexer::LexError;
use crate::parser::ParseError;
use crate::preprocess::PreprocessError;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScriptError {
    /// Process exit code for this error.
    ///
    /// - 2: the script does not lex or parse
    /// - 3: the script failed while running
    /// - 4: an `@include` could not be expanded
    /// - 5: the script file itself could not be read
    pub fn exit_code(&self) -> i32 {
        match self {
            ScriptError::Lex(_) | ScriptError::Parse(_) => 2,
            ScriptError::Runtime(_) => 3,
            ScriptError::Preprocess(_) => 4,
            ScriptError::Io { .. } => 5,
        }
    }
}
