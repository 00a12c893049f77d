//! The bounded rolling memory window an agent carries between prompts.

use std::collections::VecDeque;

/// Default number of entries an agent keeps in process.
pub const DEFAULT_MEMORY_WINDOW: usize = 30;

/// A FIFO of the newest memory lines, capped at `limit`.
#[derive(Debug, Clone)]
pub struct MemoryWindow {
    lines: VecDeque<String>,
    limit: usize,
}

impl MemoryWindow {
    /// Create an empty window holding at most `limit` lines.
    pub fn new(limit: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Append a line, dropping the oldest lines past the limit.
    pub fn push(&mut self, line: String) {
        self.lines.push_back(line);
        while self.lines.len() > self.limit {
            self.lines.pop_front();
        }
    }

    /// The lines oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Number of lines held.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Maximum number of lines held.
    pub const fn limit(&self) -> usize {
        self.limit
    }
}
