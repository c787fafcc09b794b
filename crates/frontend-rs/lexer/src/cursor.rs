//! Rune cursor over an immutable source buffer

use tokens::Position;

/// Tracks a [`Position`] over the source runes with bounded lookahead
#[derive(Debug, Clone)]
pub struct Cursor {
    source: Vec<char>,
    position: Position,
}

impl Cursor {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            position: Position::start(),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_at_end(&self) -> bool {
        self.position.index >= self.source.len()
    }

    /// Rune `offset` places ahead of the current one, without consuming
    pub fn peek(&self, offset: usize) -> Option<char> {
        self.source.get(self.position.index + offset).copied()
    }

    pub fn current(&self) -> Option<char> {
        self.peek(0)
    }

    /// Consume one rune. A newline moves to column 1 of the next line.
    pub fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.position.index += 1;
        if ch == '\n' {
            self.position.line += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }
        Some(ch)
    }

    /// Consume runes while `pred` holds
    pub fn advance_while(&mut self, mut pred: impl FnMut(char) -> bool) {
        while let Some(ch) = self.current() {
            if !pred(ch) {
                break;
            }
            self.advance();
        }
    }

    /// Source text between two rune offsets
    pub fn slice(&self, start: usize, end: usize) -> String {
        self.source[start.min(self.source.len())..end.min(self.source.len())]
            .iter()
            .collect()
    }
}
