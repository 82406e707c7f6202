//! Output surface used by commands and the line shell.

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    Gray,
}

/// Where shell output goes.
///
/// `pause_input`/`resume_input` bracket multi-part output such as error
/// reports, so an interactive front end can keep its prompt out of the way.
pub trait Frontend {
    fn write(&mut self, text: &str, color: Color);

    fn write_line(&mut self, text: &str, color: Color) {
        self.write(text, color);
        self.write("\n", Color::Default);
    }

    fn pause_input(&mut self) {}

    fn resume_input(&mut self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub color: Color,
}

#[derive(Debug, Default)]
struct Buffer {
    segments: Vec<Segment>,
    pauses: usize,
    paused: bool,
}

/// Collects output in memory. Clones share the same buffer, so a copy can
/// be kept for inspection after the front end is handed to an environment.
#[derive(Debug, Default, Clone)]
pub struct BufferFrontend {
    buffer: Rc<RefCell<Buffer>>,
}

impl BufferFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, colors dropped.
    pub fn text(&self) -> String {
        self.buffer
            .borrow()
            .segments
            .iter()
            .map(|s| s.text.as_str())
            .collect()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.buffer.borrow().segments.clone()
    }

    /// How many times input was paused.
    pub fn pause_count(&self) -> usize {
        self.buffer.borrow().pauses
    }

    pub fn is_paused(&self) -> bool {
        self.buffer.borrow().paused
    }

    pub fn clear(&self) {
        self.buffer.borrow_mut().segments.clear();
    }
}

impl Frontend for BufferFrontend {
    fn write(&mut self, text: &str, color: Color) {
        let mut buffer = self.buffer.borrow_mut();
        match buffer.segments.last_mut() {
            Some(last) if last.color == color => last.text.push_str(text),
            _ => buffer.segments.push(Segment {
                text: text.to_string(),
                color,
            }),
        }
    }

    fn pause_input(&mut self) {
        let mut buffer = self.buffer.borrow_mut();
        buffer.pauses += 1;
        buffer.paused = true;
    }

    fn resume_input(&mut self) {
        self.buffer.borrow_mut().paused = false;
    }
}
