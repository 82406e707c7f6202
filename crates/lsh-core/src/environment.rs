//! The shared context behind the interpreter and the line shell.
//!
//! An [`Environment`] owns the command registry, the front end, the value
//! converter, the optional object provider, the file system and the shell
//! variables. There is no process-wide state; every shell or script run
//! borrows one environment.

use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::command::{CommandError, CommandRegistry, CommandSpec, Invocation};
use crate::config::ShellConfig;
use crate::convert::{DefaultConverter, ValueConverter};
use crate::frontend::{BufferFrontend, Frontend};
use crate::fs::{FileSystem, StdFileSystem};
use crate::resolver::{Binder, ObjectProvider};
use crate::shell::ShellError;
use crate::value::Value;

/// The most recent error the line shell reported.
#[derive(Debug)]
pub struct LastError {
    pub error: ShellError,
    pub message: String,
    pub at: DateTime<Utc>,
}

pub struct Environment {
    config: ShellConfig,
    registry: CommandRegistry,
    frontend: Box<dyn Frontend>,
    converter: Box<dyn ValueConverter>,
    provider: Option<Box<dyn ObjectProvider>>,
    file_system: Box<dyn FileSystem>,
    variables: HashMap<String, String>,
    last_error: Option<LastError>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(ShellConfig::default())
    }
}

impl Environment {
    /// Output goes to a [`BufferFrontend`] and files are read from disk
    /// until replaced with the `with_*` builders.
    pub fn new(config: ShellConfig) -> Self {
        Self {
            registry: CommandRegistry::new(config.case_sensitive),
            config,
            frontend: Box::new(BufferFrontend::new()),
            converter: Box::new(DefaultConverter),
            provider: None,
            file_system: Box::new(StdFileSystem),
            variables: HashMap::new(),
            last_error: None,
        }
    }

    pub fn with_frontend(mut self, frontend: impl Frontend + 'static) -> Self {
        self.frontend = Box::new(frontend);
        self
    }

    pub fn with_converter(mut self, converter: impl ValueConverter + 'static) -> Self {
        self.converter = Box::new(converter);
        self
    }

    pub fn with_provider(mut self, provider: impl ObjectProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    pub fn with_file_system(mut self, file_system: impl FileSystem + 'static) -> Self {
        self.file_system = Box::new(file_system);
        self
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn frontend_mut(&mut self) -> &mut dyn Frontend {
        self.frontend.as_mut()
    }

    pub fn file_system(&self) -> &dyn FileSystem {
        self.file_system.as_ref()
    }

    pub fn register<F>(&mut self, spec: CommandSpec, handler: F) -> Result<Uuid, CommandError>
    where
        F: Fn(&mut Invocation<'_>) -> Result<Value, CommandError> + 'static,
    {
        self.registry.register(spec, handler)
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn remove_variable(&mut self, name: &str) -> Option<String> {
        self.variables.remove(name)
    }

    pub fn last_error(&self) -> Option<&LastError> {
        self.last_error.as_ref()
    }

    pub fn record_error(&mut self, error: ShellError) {
        let message = error.to_string();
        self.last_error = Some(LastError {
            error,
            message,
            at: Utc::now(),
        });
    }

    /// Resolves `name` against the registry, binds `values` and runs the
    /// handler. Shared by scripts and the line shell.
    pub fn invoke(&mut self, name: &str, values: Vec<Value>) -> Result<Value, CommandError> {
        let Self {
            registry,
            frontend,
            converter,
            provider,
            last_error,
            ..
        } = self;

        let command = registry.resolve(name, values.len())?;
        let provider = match provider.as_mut() {
            Some(provider) => Some(&mut **provider as &mut dyn ObjectProvider),
            None => None,
        };
        let args = Binder::new(&**converter, provider).bind(command, values)?;

        debug!(command = %command.name, id = %command.id, args = args.len(), "invoking command");
        let handler = Rc::clone(&command.handler);
        let mut invocation = Invocation {
            command,
            args,
            frontend: &mut **frontend,
            registry,
            last_error: last_error.as_ref().map(|e| e.message.as_str()),
        };
        handler(&mut invocation)
    }
}
