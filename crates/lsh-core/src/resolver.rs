//! Overload resolution and argument binding.
//!
//! Resolution picks, among the commands sharing a name, those that accept
//! the given number of arguments and prefers the one with the fewest
//! optional parameters. Binding then converts each value to its declared
//! type and fills injected parameters from an [`ObjectProvider`].

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use tracing::trace;

use crate::command::{Command, CommandError, CommandRegistry, ParamType};
use crate::convert::{Arg, ValueConverter};
use crate::value::Value;

const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug)]
pub enum Resolution<'a> {
    Found(&'a Command),
    /// Nothing accepts this many arguments. `candidates` holds every
    /// command with a matching name, possibly none.
    NotFound { candidates: Vec<&'a Command> },
}

impl CommandRegistry {
    pub fn find(&self, name: &str, argc: usize) -> Resolution<'_> {
        let candidates = self.candidates(name);
        let mut accepting: Vec<&Command> = candidates
            .iter()
            .copied()
            .filter(|c| c.accepts(argc))
            .collect();
        accepting.sort_by_key(|c| c.optional_count());

        match accepting.first() {
            Some(command) => {
                trace!(name, argc, id = %command.id, "resolved overload");
                Resolution::Found(command)
            }
            None => Resolution::NotFound { candidates },
        }
    }

    /// Resolves `name` or builds the error a caller should report.
    pub fn resolve(&self, name: &str, argc: usize) -> Result<&Command, CommandError> {
        match self.find(name, argc) {
            Resolution::Found(command) => Ok(command),
            Resolution::NotFound { candidates } if candidates.is_empty() => {
                Err(CommandError::NotFound {
                    name: name.to_string(),
                    suggestions: suggest(self, name),
                })
            }
            Resolution::NotFound { candidates } => Err(CommandError::ParameterMismatch {
                name: name.to_string(),
                given: argc,
                signatures: candidates.iter().map(|c| c.signature()).collect(),
            }),
        }
    }
}

/// Registered names that look like `name`, best first.
pub fn suggest(registry: &CommandRegistry, name: &str) -> Vec<String> {
    let matcher = SkimMatcherV2::default();
    let query = name.to_lowercase();

    let mut scored: Vec<(i64, &str)> = Vec::new();
    for command in registry.commands() {
        if scored.iter().any(|(_, n)| *n == command.name) {
            continue;
        }
        let target = command.name.to_lowercase();
        let score = matcher
            .fuzzy_match(&target, &query)
            .or_else(|| matcher.fuzzy_match(&query, &target))
            .or_else(|| (edit_distance(&query, &target) <= 2).then_some(0));
        if let Some(score) = score {
            scored.push((score, &command.name));
        }
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, n)| n.to_string())
        .collect()
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb {
                diagonal
            } else {
                1 + diagonal.min(above).min(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Supplies values for injected parameters, keyed by position and type.
pub trait ObjectProvider {
    fn provide(&mut self, position: usize, target: &ParamType) -> Option<Value>;
}

impl<F> ObjectProvider for F
where
    F: FnMut(usize, &ParamType) -> Option<Value>,
{
    fn provide(&mut self, position: usize, target: &ParamType) -> Option<Value> {
        self(position, target)
    }
}

pub struct Binder<'a> {
    converter: &'a dyn ValueConverter,
    provider: Option<&'a mut dyn ObjectProvider>,
}

impl<'a> Binder<'a> {
    pub fn new(
        converter: &'a dyn ValueConverter,
        provider: Option<&'a mut dyn ObjectProvider>,
    ) -> Self {
        Self {
            converter,
            provider,
        }
    }

    /// Produces one [`Arg`] per declared parameter of `command`.
    ///
    /// The provider is only consulted when an injected position is reached.
    pub fn bind(&mut self, command: &Command, values: Vec<Value>) -> Result<Vec<Arg>, CommandError> {
        let given = values.len();
        if given > command.arg_count() {
            return Err(CommandError::ParameterMismatch {
                name: command.name.clone(),
                given,
                signatures: vec![command.signature()],
            });
        }

        let mut values = values.into_iter();
        let mut args = Vec::with_capacity(command.parameters.len());

        for (position, param) in command.parameters.iter().enumerate() {
            if param.injected {
                let provided = self
                    .provider
                    .as_mut()
                    .and_then(|provider| provider.provide(position, &param.ty))
                    .and_then(|value| self.converter.convert(&param.ty, &value));
                match provided {
                    Some(arg) => args.push(arg),
                    None => {
                        return Err(CommandError::MissingProvider {
                            parameter: param.name.clone(),
                            target: param.ty.clone(),
                        })
                    }
                }
                continue;
            }

            match values.next() {
                Some(value) => match self.converter.convert(&param.ty, &value) {
                    Some(arg) => args.push(arg),
                    None => {
                        return Err(CommandError::Conversion {
                            parameter: param.name.clone(),
                            target: param.ty.clone(),
                            value: value.to_string(),
                        })
                    }
                },
                None if param.optional => args.push(Arg::Missing),
                None => {
                    return Err(CommandError::ParameterMismatch {
                        name: command.name.clone(),
                        given,
                        signatures: vec![command.signature()],
                    })
                }
            }
        }

        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandSpec, Invocation};
    use crate::convert::DefaultConverter;
    use crate::value::HostHandle;

    fn noop(_: &mut Invocation<'_>) -> Result<Value, CommandError> {
        Ok(Value::Null)
    }

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new(false);
        registry
            .register(CommandSpec::new("f").param("a", ParamType::Int), noop)
            .unwrap();
        registry
            .register(
                CommandSpec::new("f")
                    .param("a", ParamType::Int)
                    .optional("b", ParamType::String)
                    .optional("c", ParamType::String),
                noop,
            )
            .unwrap();
        registry
            .register(CommandSpec::new("echo").param("text", ParamType::String), noop)
            .unwrap();
        registry
    }

    #[test]
    fn test_prefers_fewest_optional_parameters() {
        let registry = registry();
        match registry.find("f", 1) {
            Resolution::Found(c) => assert_eq!(c.arg_count(), 1),
            _ => panic!("Expected Found"),
        }
        match registry.find("F", 2) {
            Resolution::Found(c) => assert_eq!(c.arg_count(), 3),
            _ => panic!("Expected Found"),
        }
    }

    #[test]
    fn test_not_found_reports_candidates() {
        let registry = registry();
        match registry.find("f", 4) {
            Resolution::NotFound { candidates } => assert_eq!(candidates.len(), 2),
            _ => panic!("Expected NotFound"),
        }
        match registry.resolve("f", 0) {
            Err(CommandError::ParameterMismatch { given, signatures, .. }) => {
                assert_eq!(given, 0);
                assert_eq!(signatures.len(), 2);
            }
            other => panic!("Expected ParameterMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command_gets_suggestions() {
        let registry = registry();
        match registry.resolve("ecoh", 1) {
            Err(CommandError::NotFound { suggestions, .. }) => {
                assert_eq!(suggestions, vec!["echo".to_string()]);
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
        assert!(suggest(&registry, "zzzzzz").is_empty());
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("echo", "echo"), 0);
        assert_eq!(edit_distance("ecoh", "echo"), 2);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn test_bind_converts_and_fills_missing() {
        let registry = registry();
        let command = registry.resolve("f", 2).unwrap();
        let converter = DefaultConverter;
        let mut binder = Binder::new(&converter, None);
        let args = binder
            .bind(command, vec![Value::from("12"), Value::from("x")])
            .unwrap();
        assert_eq!(args, vec![Arg::Int(12), Arg::Str("x".into()), Arg::Missing]);
    }

    #[test]
    fn test_bind_conversion_failure_names_parameter() {
        let registry = registry();
        let command = registry.resolve("f", 1).unwrap();
        let converter = DefaultConverter;
        let mut binder = Binder::new(&converter, None);
        match binder.bind(command, vec![Value::from("asd")]) {
            Err(CommandError::Conversion { parameter, target, value }) => {
                assert_eq!(parameter, "a");
                assert_eq!(target, ParamType::Int);
                assert_eq!(value, "asd");
            }
            other => panic!("Expected Conversion, got {:?}", other),
        }
    }

    #[test]
    fn test_injected_parameters_come_from_provider() {
        let mut registry = CommandRegistry::new(false);
        registry
            .register(
                CommandSpec::new("tick")
                    .injected("clock", ParamType::Host("Clock"))
                    .param("n", ParamType::Int),
                noop,
            )
            .unwrap();
        let command = registry.resolve("tick", 1).unwrap();
        let converter = DefaultConverter;

        let handle = HostHandle::new("Clock", 7u32);
        let shared = handle.clone();
        let mut calls = Vec::new();
        let mut provider = |position: usize, target: &ParamType| {
            calls.push((position, target.clone()));
            Some(Value::Host(shared.clone()))
        };
        let args = Binder::new(&converter, Some(&mut provider))
            .bind(command, vec![Value::Number(3.0)])
            .unwrap();
        assert_eq!(args, vec![Arg::Host(handle), Arg::Int(3)]);
        assert_eq!(calls, vec![(0, ParamType::Host("Clock"))]);
    }

    #[test]
    fn test_injected_without_provider_fails() {
        let mut registry = CommandRegistry::new(false);
        registry
            .register(
                CommandSpec::new("tick").injected("clock", ParamType::Host("Clock")),
                noop,
            )
            .unwrap();
        let command = registry.resolve("tick", 0).unwrap();
        let converter = DefaultConverter;
        let err = Binder::new(&converter, None).bind(command, vec![]).unwrap_err();
        assert!(matches!(err, CommandError::MissingProvider { .. }));
    }
}
