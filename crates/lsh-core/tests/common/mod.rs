//! Shared helpers for lsh-core integration tests.

use std::cell::RefCell;
use std::rc::Rc;

use lsh_core::command::{CommandSpec, ParamType};
use lsh_core::environment::Environment;
use lsh_core::frontend::{BufferFrontend, Color};
use lsh_core::fs::MemoryFileSystem;
use lsh_core::shell::Shell;
use lsh_core::value::Value;

/// Calls seen by the `record` command, in order.
pub type Calls = Rc<RefCell<Vec<Vec<String>>>>;

pub struct Harness {
    pub shell: Shell,
    pub output: BufferFrontend,
    pub calls: Calls,
}

/// A shell with `echo`, `add`, `record` and three `pick` overloads.
pub fn harness(fs: MemoryFileSystem) -> Harness {
    let output = BufferFrontend::new();
    let calls: Calls = Rc::default();
    let mut env = Environment::default()
        .with_frontend(output.clone())
        .with_file_system(fs);

    env.register(
        CommandSpec::new("echo").param("text", ParamType::String),
        |inv| {
            let text = inv.arg(0).as_str().unwrap_or_default().to_string();
            inv.frontend.write_line(&text, Color::Default);
            Ok(Value::Null)
        },
    )
    .unwrap();

    env.register(
        CommandSpec::new("add")
            .param("a", ParamType::Int)
            .param("b", ParamType::Int),
        |inv| {
            let a = inv.arg(0).as_int().unwrap_or_default();
            let b = inv.arg(1).as_int().unwrap_or_default();
            Ok(Value::Number((a + b) as f64))
        },
    )
    .unwrap();

    let recorded = calls.clone();
    env.register(
        CommandSpec::new("record")
            .param("a", ParamType::Object)
            .optional("b", ParamType::Object),
        move |inv| {
            let args = inv
                .args
                .iter()
                .filter(|a| !a.is_missing())
                .map(|a| format!("{:?}", a))
                .collect();
            recorded.borrow_mut().push(args);
            Ok(Value::Null)
        },
    )
    .unwrap();

    env.register(
        CommandSpec::new("pick").param("a", ParamType::Int),
        |_| Ok(Value::from("one")),
    )
    .unwrap();
    env.register(
        CommandSpec::new("pick")
            .param("a", ParamType::Int)
            .optional("b", ParamType::Int),
        |_| Ok(Value::from("two")),
    )
    .unwrap();
    env.register(
        CommandSpec::new("pick")
            .param("a", ParamType::Int)
            .param("b", ParamType::Int)
            .optional("c", ParamType::Int),
        |_| Ok(Value::from("many")),
    )
    .unwrap();

    Harness {
        shell: Shell::new(env),
        output,
        calls,
    }
}
