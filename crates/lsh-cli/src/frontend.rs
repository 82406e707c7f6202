//! Terminal front end: colored output on stdout.

use std::io::{self, IsTerminal, Stdout, Write};

use crossterm::queue;
use crossterm::style::{self, Print, ResetColor, SetForegroundColor};
use lsh_core::frontend::{Color, Frontend};
use tracing::debug;

pub struct TerminalFrontend {
    out: Stdout,
    colored: bool,
}

impl TerminalFrontend {
    /// Colors are used only when stdout is a terminal and `NO_COLOR` is unset.
    pub fn new() -> Self {
        let out = io::stdout();
        let colored = out.is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self { out, colored }
    }

    fn queue_text(&mut self, text: &str, color: Color) -> io::Result<()> {
        match terminal_color(color) {
            Some(color) if self.colored => queue!(
                self.out,
                SetForegroundColor(color),
                Print(text),
                ResetColor
            ),
            _ => queue!(self.out, Print(text)),
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.out.flush() {
            debug!(error = %e, "stdout flush failed");
        }
    }
}

impl Default for TerminalFrontend {
    fn default() -> Self {
        Self::new()
    }
}

fn terminal_color(color: Color) -> Option<style::Color> {
    match color {
        Color::Default => None,
        Color::Red => Some(style::Color::Red),
        Color::Green => Some(style::Color::Green),
        Color::Yellow => Some(style::Color::Yellow),
        Color::Blue => Some(style::Color::Blue),
        Color::Magenta => Some(style::Color::Magenta),
        Color::Cyan => Some(style::Color::Cyan),
        Color::Gray => Some(style::Color::DarkGrey),
    }
}

impl Frontend for TerminalFrontend {
    fn write(&mut self, text: &str, color: Color) {
        if let Err(e) = self.queue_text(text, color) {
            debug!(error = %e, "stdout write failed");
        }
    }

    fn write_line(&mut self, text: &str, color: Color) {
        self.write(text, color);
        self.write("\n", Color::Default);
        self.flush();
    }

    fn pause_input(&mut self) {
        self.flush();
    }

    fn resume_input(&mut self) {
        self.flush();
    }
}
