//! `lsh`: interactive command shell and script runner.
//!
//! # Usage
//!
//! ```bash
//! # Interactive session (reads lines from stdin)
//! lsh
//!
//! # Run a script file
//! lsh run deploy.lsf
//!
//! # Run individual lines
//! lsh exec 'echo hello' 'add 1 2'
//!
//! # Exact command-name matching, no $name substitution
//! lsh --case-sensitive --no-substitution
//!
//! # Log to ~/.lsh/logs instead of stderr
//! RUST_LOG=debug lsh --log-file run deploy.lsf
//! ```

mod builtins;
mod frontend;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lsh_core::config::{lsh_dir, ShellConfig};
use lsh_core::environment::Environment;
use lsh_core::shell::{LineResult, Shell};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::frontend::TerminalFrontend;

const PROMPT: &str = "lsh> ";

/// Interactive command shell and script runner.
#[derive(Parser)]
#[command(name = "lsh")]
#[command(about = "Run lsh scripts or an interactive command session")]
#[command(version)]
struct Cli {
    /// Match command names exactly
    #[arg(long, env = "LSH_CASE_SENSITIVE")]
    case_sensitive: bool,

    /// Disable $name substitution in command lines
    #[arg(long)]
    no_substitution: bool,

    /// Start without the built-in commands
    #[arg(long)]
    no_builtins: bool,

    /// Write logs to ~/.lsh/logs instead of stderr
    #[arg(long)]
    log_file: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script file
    Run {
        /// Path to the script
        file: PathBuf,
    },

    /// Run each argument as one shell line
    Exec {
        /// Lines to run, in order
        #[arg(required = true)]
        lines: Vec<String>,
    },
}

fn init_logging(to_file: bool) -> Option<WorkerGuard> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if to_file {
        if let Some(log_dir) = lsh_dir().map(|dir| dir.join("logs")) {
            let file_appender = tracing_appender::rolling::daily(&log_dir, "lsh.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(non_blocking)
                .with_ansi(false)
                .init();
            return Some(guard);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(std::io::stderr)
        .init();
    None
}

fn build_shell(cli: &Cli) -> Result<Shell, lsh_core::CommandError> {
    let mut config = ShellConfig::load();
    if cli.case_sensitive {
        config.case_sensitive = true;
    }
    if cli.no_substitution {
        config.variable_substitution = false;
    }
    if cli.no_builtins {
        config.auto_register = false;
    }

    let mut env = Environment::new(config.clone()).with_frontend(TerminalFrontend::new());
    if config.auto_register {
        builtins::register_all(&mut env)?;
    }
    info!(commands = env.registry().commands().len(), "shell ready");
    Ok(Shell::new(env))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_file);

    let mut shell = match build_shell(&cli) {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Command::Run { file }) => run_file(&mut shell, &file),
        Some(Command::Exec { lines }) => exec_lines(&mut shell, &lines),
        None => match interactive(&mut shell).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "stdin failed");
                eprintln!("Error: {}", e);
                ExitCode::from(5)
            }
        },
    }
}

fn run_file(shell: &mut Shell, file: &Path) -> ExitCode {
    match shell.run_file(file) {
        Ok(value) => {
            if let Some(value) = value.filter(|v| !v.is_null()) {
                println!("{}", value);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// Runs every line; the exit code is 1 if any of them failed.
fn exec_lines(shell: &mut Shell, lines: &[String]) -> ExitCode {
    let mut failed = false;
    for line in lines {
        if shell.execute_line(line) == LineResult::Failed {
            failed = true;
        }
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn interactive(shell: &mut Shell) -> std::io::Result<()> {
    let prompt = std::io::stdin().is_terminal();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if prompt {
            stdout.write_all(PROMPT.as_bytes()).await?;
            stdout.flush().await?;
        }

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Interrupted, exiting.");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        if matches!(line.trim(), "exit" | "quit") {
            break;
        }
        shell.execute_line(&line);
    }

    Ok(())
}
