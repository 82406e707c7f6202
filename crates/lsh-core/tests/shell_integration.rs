//! Interactive line handling against a populated environment.

mod common;

use common::harness;
use lsh_core::fs::MemoryFileSystem;
use lsh_core::shell::ShellError;
use lsh_core::{CommandError, LineResult, Value};

#[test]
fn test_variable_round_trip_through_command() {
    let mut h = harness(MemoryFileSystem::new());
    h.shell.execute_line("$x = 5");
    h.shell.execute_line("echo $x");
    assert_eq!(h.output.lines(), vec!["5"]);
}

#[test]
fn test_escaped_dollar_is_literal() {
    let mut h = harness(MemoryFileSystem::new());
    h.shell.execute_line("$price = 3");
    h.shell.execute_line("echo \\$price is $price");
    assert_eq!(h.output.lines(), vec!["$price is 3"]);
}

#[test]
fn test_substituted_values_are_tokenized() {
    let mut h = harness(MemoryFileSystem::new());
    h.shell.execute_line("$pair = 2 3");
    assert_eq!(h.shell.execute_line("add $pair"), LineResult::Done(Value::Number(5.0)));
}

#[test]
fn test_session_keeps_running_after_errors() {
    let mut h = harness(MemoryFileSystem::new());
    let lines = [
        "echo start",
        "frobnicate now",
        "add 1",
        "add x y",
        "$undefined",
        "echo end",
    ];
    let results: Vec<LineResult> = lines.iter().map(|l| h.shell.execute_line(l)).collect();

    assert_eq!(results[0], LineResult::Done(Value::Null));
    assert!(results[1..5].iter().all(|r| *r == LineResult::Failed));
    assert_eq!(results[5], LineResult::Done(Value::Null));

    let text = h.output.text();
    assert!(text.starts_with("start\n"));
    assert!(text.contains("unknown command 'frobnicate'"));
    assert!(text.contains("does not take 1 argument(s)"));
    assert!(text.ends_with("end\n"));
    assert_eq!(h.output.pause_count(), 4);

    let last = h.shell.last_error().unwrap();
    assert!(matches!(last.error, ShellError::UndefinedVariable(_)));
}

#[test]
fn test_command_names_ignore_case_by_default() {
    let mut h = harness(MemoryFileSystem::new());
    assert_eq!(h.shell.execute_line("ADD 2 2"), LineResult::Done(Value::Number(4.0)));
}

#[test]
fn test_last_error_timestamp_moves_forward() {
    let mut h = harness(MemoryFileSystem::new());
    h.shell.execute_line("nope");
    let first = h.shell.last_error().unwrap().at;
    h.shell.execute_line("nope again");
    let second = h.shell.last_error().unwrap();
    assert!(second.at >= first);
    assert!(matches!(
        second.error,
        ShellError::Command(CommandError::NotFound { .. })
    ));
}

#[test]
fn test_lines_and_scripts_split_negative_arguments_alike() {
    let mut h = harness(MemoryFileSystem::new());
    assert_eq!(h.shell.execute_line("record 3 -2"), LineResult::Done(Value::Null));
    h.shell.run_script("record 3 -2").unwrap();

    let calls = h.calls.borrow();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], vec!["Int(3)", "Int(-2)"]);
    assert_eq!(calls[1], calls[0]);
}
