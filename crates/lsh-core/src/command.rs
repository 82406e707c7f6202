//! Host command descriptors and the command registry.
//!
//! Commands are registered explicitly with a [`CommandSpec`] and a handler
//! closure. Several commands may share a name as long as they take a
//! different number of arguments; each entry gets its own id.
//!
//! # Example
//!
//! ```
//! use lsh_core::command::{CommandRegistry, CommandSpec, ParamType};
//! use lsh_core::value::Value;
//!
//! let mut registry = CommandRegistry::new(false);
//! registry
//!     .register(
//!         CommandSpec::new("greet")
//!             .description("Say hello")
//!             .param("name", ParamType::String),
//!         |inv| Ok(Value::String(format!("hello {}", inv.arg(0).as_str().unwrap_or("")))),
//!     )
//!     .unwrap();
//! assert_eq!(registry.commands().len(), 1);
//! ```

use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::convert::Arg;
use crate::frontend::Frontend;
use crate::value::Value;

/// The declared type of a command parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    String,
    Int,
    Float,
    Bool,
    /// Best effort: integer, then float, then boolean, else the raw string.
    Object,
    /// A [`HostHandle`](crate::value::HostHandle) with this type name.
    Host(&'static str),
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::String => f.write_str("string"),
            ParamType::Int => f.write_str("int"),
            ParamType::Float => f.write_str("float"),
            ParamType::Bool => f.write_str("bool"),
            ParamType::Object => f.write_str("object"),
            ParamType::Host(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub optional: bool,
    /// Filled by the [`ObjectProvider`](crate::resolver::ObjectProvider),
    /// never by the caller.
    pub injected: bool,
}

/// Declared shape of a command, before registration.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<ParamSpec>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn param(self, name: impl Into<String>, ty: ParamType) -> Self {
        self.push(name, ty, false, false)
    }

    pub fn optional(self, name: impl Into<String>, ty: ParamType) -> Self {
        self.push(name, ty, true, false)
    }

    pub fn injected(self, name: impl Into<String>, ty: ParamType) -> Self {
        self.push(name, ty, false, true)
    }

    fn push(mut self, name: impl Into<String>, ty: ParamType, optional: bool, injected: bool) -> Self {
        self.parameters.push(ParamSpec {
            name: name.into(),
            ty,
            optional,
            injected,
        });
        self
    }
}

/// Errors raised while resolving, binding or running a command.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("unknown command '{name}'{}", suggestion_hint(.suggestions))]
    NotFound { name: String, suggestions: Vec<String> },

    #[error("'{name}' does not take {given} argument(s); usage: {}", .signatures.join(" | "))]
    ParameterMismatch {
        name: String,
        given: usize,
        signatures: Vec<String>,
    },

    #[error("cannot convert '{value}' to {target} for parameter '{parameter}'")]
    Conversion {
        parameter: String,
        target: ParamType,
        value: String,
    },

    #[error("cannot register command: {0}")]
    Registration(String),

    #[error("no object available for injected parameter '{parameter}' ({target})")]
    MissingProvider { parameter: String, target: ParamType },

    #[error("{0}")]
    Failed(String),
}

impl CommandError {
    pub fn failed(message: impl Into<String>) -> Self {
        CommandError::Failed(message.into())
    }
}

fn suggestion_hint(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(", did you mean: {}?", suggestions.join(", "))
    }
}

pub type Handler = Rc<dyn Fn(&mut Invocation<'_>) -> Result<Value, CommandError>>;

/// A registered command.
pub struct Command {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<ParamSpec>,
    pub handler: Handler,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl Command {
    /// Parameters the caller supplies (everything but injected ones).
    pub fn user_parameters(&self) -> impl Iterator<Item = &ParamSpec> {
        self.parameters.iter().filter(|p| !p.injected)
    }

    /// Number of caller-supplied parameters.
    pub fn arg_count(&self) -> usize {
        self.user_parameters().count()
    }

    pub fn required_count(&self) -> usize {
        self.user_parameters().filter(|p| !p.optional).count()
    }

    pub fn optional_count(&self) -> usize {
        self.user_parameters().filter(|p| p.optional).count()
    }

    pub fn accepts(&self, argc: usize) -> bool {
        self.required_count() <= argc && argc <= self.arg_count()
    }

    /// Whether the line shell should hand this command the raw remainder.
    pub fn takes_raw_text(&self) -> bool {
        let mut params = self.user_parameters();
        matches!(
            (params.next(), params.next()),
            (Some(ParamSpec { ty: ParamType::String, .. }), None)
        )
    }

    /// `name <a:int> [b:string]`
    pub fn signature(&self) -> String {
        let mut signature = self.name.clone();
        for param in self.user_parameters() {
            if param.optional {
                signature.push_str(&format!(" [{}:{}]", param.name, param.ty));
            } else {
                signature.push_str(&format!(" <{}:{}>", param.name, param.ty));
            }
        }
        signature
    }
}

/// Everything a handler sees while it runs.
pub struct Invocation<'a> {
    pub command: &'a Command,
    /// One entry per declared parameter, injected ones included.
    pub args: Vec<Arg>,
    pub frontend: &'a mut dyn Frontend,
    pub registry: &'a CommandRegistry,
    pub last_error: Option<&'a str>,
}

const MISSING: &Arg = &Arg::Missing;

impl Invocation<'_> {
    pub fn arg(&self, index: usize) -> &Arg {
        self.args.get(index).unwrap_or(MISSING)
    }

    pub fn arg_named(&self, name: &str) -> &Arg {
        self.command
            .parameters
            .iter()
            .position(|p| p.name == name)
            .map_or(MISSING, |index| self.arg(index))
    }
}

/// All registered commands. Append-only.
#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<Command>,
    case_sensitive: bool,
}

impl CommandRegistry {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            commands: Vec::new(),
            case_sensitive,
        }
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn get(&self, id: Uuid) -> Option<&Command> {
        self.commands.iter().find(|c| c.id == id)
    }

    pub fn names_match(&self, a: &str, b: &str) -> bool {
        if self.case_sensitive {
            a == b
        } else {
            a.to_lowercase() == b.to_lowercase()
        }
    }

    /// Every command registered under `name`, in registration order.
    pub fn candidates(&self, name: &str) -> Vec<&Command> {
        self.commands
            .iter()
            .filter(|c| self.names_match(&c.name, name))
            .collect()
    }

    pub fn register<F>(&mut self, spec: CommandSpec, handler: F) -> Result<Uuid, CommandError>
    where
        F: Fn(&mut Invocation<'_>) -> Result<Value, CommandError> + 'static,
    {
        self.validate(&spec)?;

        let command = Command {
            id: Uuid::new_v4(),
            name: spec.name,
            description: spec.description,
            parameters: spec.parameters,
            handler: Rc::new(handler),
        };

        let arity = command.arg_count();
        if self
            .candidates(&command.name)
            .iter()
            .any(|existing| existing.arg_count() == arity)
        {
            return Err(CommandError::Registration(format!(
                "'{}' already has an overload taking {} argument(s)",
                command.name, arity
            )));
        }

        debug!(name = %command.name, id = %command.id, arity, "command registered");
        let id = command.id;
        self.commands.push(command);
        Ok(id)
    }

    fn validate(&self, spec: &CommandSpec) -> Result<(), CommandError> {
        let name = &spec.name;
        if name.is_empty() {
            return Err(CommandError::Registration("command name is empty".to_string()));
        }
        if name.starts_with('$') {
            return Err(CommandError::Registration(format!(
                "'{}' starts with the reserved '$' sigil",
                name
            )));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(CommandError::Registration(format!(
                "'{}' contains whitespace",
                name
            )));
        }

        let mut seen_optional = false;
        for (i, param) in spec.parameters.iter().enumerate() {
            if spec.parameters[..i].iter().any(|p| p.name == param.name) {
                return Err(CommandError::Registration(format!(
                    "'{}' declares parameter '{}' twice",
                    name, param.name
                )));
            }
            if param.injected {
                continue;
            }
            if param.optional {
                seen_optional = true;
            } else if seen_optional {
                return Err(CommandError::Registration(format!(
                    "'{}': required parameter '{}' follows an optional one",
                    name, param.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Invocation<'_>) -> Result<Value, CommandError> {
        Ok(Value::Null)
    }

    #[test]
    fn test_overloads_need_distinct_arity() {
        let mut registry = CommandRegistry::new(true);
        registry
            .register(CommandSpec::new("f").param("a", ParamType::Int), noop)
            .unwrap();
        registry
            .register(
                CommandSpec::new("f")
                    .param("a", ParamType::Int)
                    .optional("b", ParamType::Int),
                noop,
            )
            .unwrap();
        let err = registry
            .register(CommandSpec::new("f").param("x", ParamType::String), noop)
            .unwrap_err();
        assert!(matches!(err, CommandError::Registration(_)));
        assert_eq!(registry.candidates("f").len(), 2);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut registry = CommandRegistry::new(true);
        let a = registry.register(CommandSpec::new("a"), noop).unwrap();
        let b = registry.register(CommandSpec::new("b"), noop).unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.get(b).unwrap().name, "b");
    }

    #[test]
    fn test_reserved_sigil_is_rejected() {
        let mut registry = CommandRegistry::new(true);
        let err = registry.register(CommandSpec::new("$x"), noop).unwrap_err();
        assert!(err.to_string().contains("reserved"));
        assert!(registry.register(CommandSpec::new(""), noop).is_err());
        assert!(registry.register(CommandSpec::new("two words"), noop).is_err());
    }

    #[test]
    fn test_required_after_optional_is_rejected() {
        let mut registry = CommandRegistry::new(true);
        let spec = CommandSpec::new("f")
            .optional("a", ParamType::Int)
            .param("b", ParamType::Int);
        assert!(registry.register(spec, noop).is_err());
    }

    #[test]
    fn test_injected_parameters_do_not_count() {
        let mut registry = CommandRegistry::new(true);
        let id = registry
            .register(
                CommandSpec::new("now")
                    .injected("clock", ParamType::Host("Clock"))
                    .optional("format", ParamType::String),
                noop,
            )
            .unwrap();
        let command = registry.get(id).unwrap();
        assert_eq!(command.arg_count(), 1);
        assert_eq!(command.required_count(), 0);
        assert!(command.accepts(0));
        assert!(command.accepts(1));
        assert!(!command.accepts(2));
        assert_eq!(command.signature(), "now [format:string]");
    }

    #[test]
    fn test_case_insensitive_matching() {
        let mut registry = CommandRegistry::new(false);
        registry.register(CommandSpec::new("Echo"), noop).unwrap();
        assert_eq!(registry.candidates("echo").len(), 1);

        let mut strict = CommandRegistry::new(true);
        strict.register(CommandSpec::new("Echo"), noop).unwrap();
        assert!(strict.candidates("echo").is_empty());
    }

    #[test]
    fn test_raw_text_commands() {
        let mut registry = CommandRegistry::new(true);
        let raw = registry
            .register(CommandSpec::new("say").param("text", ParamType::String), noop)
            .unwrap();
        let typed = registry
            .register(CommandSpec::new("wait").param("ms", ParamType::Int), noop)
            .unwrap();
        assert!(registry.get(raw).unwrap().takes_raw_text());
        assert!(!registry.get(typed).unwrap().takes_raw_text());
    }

    #[test]
    fn test_unbound_arguments_read_as_missing() {
        let mut registry = CommandRegistry::new(false);
        let id = registry
            .register(
                CommandSpec::new("greet")
                    .param("name", ParamType::String)
                    .optional("times", ParamType::Int),
                noop,
            )
            .unwrap();
        let command = registry.get(id).unwrap();
        let mut frontend = crate::frontend::BufferFrontend::new();
        let invocation = Invocation {
            command,
            args: vec![Arg::Str("ada".to_string())],
            frontend: &mut frontend,
            registry: &registry,
            last_error: None,
        };
        assert_eq!(invocation.arg(0).as_str(), Some("ada"));
        assert!(invocation.arg(1).is_missing());
        assert!(invocation.arg_named("times").is_missing());
        assert!(invocation.arg_named("nope").is_missing());
    }

    #[test]
    fn test_not_found_message_lists_suggestions() {
        let err = CommandError::NotFound {
            name: "ecoh".to_string(),
            suggestions: vec!["echo".to_string()],
        };
        assert_eq!(err.to_string(), "unknown command 'ecoh', did you mean: echo?");
    }
}
