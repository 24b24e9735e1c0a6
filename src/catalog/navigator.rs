use serde::Serialize;
use std::collections::HashMap;

/// Zero-based location of an occurrence, counted in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub character: usize,
}

/// Round-robin cursors over the occurrences of a name in the document
#[derive(Debug, Default)]
pub struct SearchNavigator {
    cursors: HashMap<String, usize>,
}

impl SearchNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every non-overlapping, case-sensitive occurrence of `name` in `text`, in order.
    /// Occurrences inside longer identifiers count.
    pub fn locate(name: &str, text: &str) -> Vec<Position> {
        if name.is_empty() {
            return Vec::new();
        }

        let mut positions = Vec::new();
        let mut scanned = 0;
        let mut offset = 0;
        let mut line = 0;
        let mut character = 0;

        for (byte_index, _) in text.match_indices(name) {
            for ch in text[scanned..byte_index].chars() {
                offset += 1;
                if ch == '\n' {
                    line += 1;
                    character = 0;
                } else {
                    character += 1;
                }
            }
            scanned = byte_index;

            positions.push(Position {
                offset,
                line,
                character,
            });
        }

        positions
    }

    /// Position under the cursor for `name`, advancing the cursor for the next call.
    /// The cursor is wrapped into range first, so a shrunken list never panics.
    pub fn next(&mut self, name: &str, positions: &[Position]) -> Option<Position> {
        if positions.is_empty() {
            return None;
        }

        let cursor = self.cursors.entry(name.to_string()).or_insert(0);
        let index = *cursor % positions.len();
        *cursor = (index + 1) % positions.len();

        Some(positions[index])
    }

    pub fn reset(&mut self) {
        self.cursors.clear();
    }
}
