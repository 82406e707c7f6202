//! Built-in commands registered at startup.

use lsh_core::command::{CommandError, CommandSpec, Invocation, ParamType};
use lsh_core::environment::Environment;
use lsh_core::frontend::Color;
use lsh_core::value::Value;

/// Registers every built-in command into `env`.
pub fn register_all(env: &mut Environment) -> Result<(), CommandError> {
    env.register(
        CommandSpec::new("help").description("List available commands"),
        help_all,
    )?;
    env.register(
        CommandSpec::new("help")
            .description("Show usage for one command")
            .param("command", ParamType::String),
        help_one,
    )?;
    env.register(
        CommandSpec::new("echo")
            .description("Print text")
            .param("text", ParamType::String),
        |inv| {
            let text = inv.arg(0).as_str().unwrap_or_default().to_string();
            inv.frontend.write_line(&text, Color::Default);
            Ok(Value::Null)
        },
    )?;
    env.register(
        CommandSpec::new("print-exception").description("Show the last reported error"),
        |inv| {
            match inv.last_error {
                Some(message) => inv.frontend.write_line(message, Color::Red),
                None => inv.frontend.write_line("no error recorded", Color::Gray),
            }
            Ok(Value::Null)
        },
    )?;
    env.register(
        CommandSpec::new("add")
            .description("Add two numbers")
            .param("a", ParamType::Float)
            .param("b", ParamType::Float),
        |inv| {
            let a = inv.arg(0).as_float().unwrap_or_default();
            let b = inv.arg(1).as_float().unwrap_or_default();
            Ok(Value::Number(a + b))
        },
    )?;
    env.register(
        CommandSpec::new("repeat")
            .description("Print text several times")
            .param("count", ParamType::Int)
            .param("text", ParamType::String),
        |inv| {
            let count = inv.arg(0).as_int().unwrap_or_default();
            if count < 0 {
                return Err(CommandError::failed("count must not be negative"));
            }
            let text = inv.arg(1).as_str().unwrap_or_default().to_string();
            for _ in 0..count {
                inv.frontend.write_line(&text, Color::Default);
            }
            Ok(Value::Null)
        },
    )?;
    Ok(())
}

fn help_all(inv: &mut Invocation<'_>) -> Result<Value, CommandError> {
    let mut commands: Vec<_> = inv.registry.commands().iter().collect();
    commands.sort_by(|a, b| a.name.cmp(&b.name).then(a.arg_count().cmp(&b.arg_count())));

    let width = commands
        .iter()
        .map(|c| c.signature().len())
        .max()
        .unwrap_or(0);
    for command in commands {
        let signature = command.signature();
        inv.frontend
            .write(&format!("{:<width$}", signature, width = width), Color::Cyan);
        match &command.description {
            Some(description) => inv
                .frontend
                .write_line(&format!("  {}", description), Color::Default),
            None => inv.frontend.write_line("", Color::Default),
        }
    }
    Ok(Value::Null)
}

fn help_one(inv: &mut Invocation<'_>) -> Result<Value, CommandError> {
    let name = inv.arg(0).as_str().unwrap_or_default().trim().to_string();
    let candidates = inv.registry.candidates(&name);
    if candidates.is_empty() {
        return Err(CommandError::NotFound {
            suggestions: lsh_core::resolver::suggest(inv.registry, &name),
            name,
        });
    }
    for command in candidates {
        inv.frontend.write(&command.signature(), Color::Cyan);
        if let Some(description) = &command.description {
            inv.frontend
                .write(&format!("  {}", description), Color::Default);
        }
        inv.frontend.write_line("", Color::Default);
    }
    Ok(Value::Null)
}
