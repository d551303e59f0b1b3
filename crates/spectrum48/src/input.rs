//! Frame-scheduled keyboard input.
//!
//! Hosts queue key events against a frame number; the frame driver applies
//! everything due at the start of that frame. Replaying the same schedule
//! against the same starting state reproduces the run bit for bit.

use ferranti_ula::Ula;

/// A keyboard matrix event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// Press the key at matrix position (`row` 0-7, `col` 0-4).
    Down { row: usize, col: u8 },
    /// Release it.
    Up { row: usize, col: u8 },
    /// Release everything.
    ReleaseAll,
}

/// Pending events, each tagged with the frame that applies it.
pub struct InputQueue {
    events: Vec<(u64, KeyEvent)>,
}

impl InputQueue {
    #[must_use]
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Schedule `event` for the start of `frame`.
    pub fn push(&mut self, frame: u64, event: KeyEvent) {
        self.events.push((frame, event));
    }

    /// Apply every event due at or before `frame` to the keyboard matrix.
    pub fn process(&mut self, frame: u64, ula: &mut Ula) {
        // Stable order: by frame, then insertion order
        self.events.sort_by_key(|&(f, _)| f);
        let mut remaining = Vec::with_capacity(self.events.len());
        for (due, event) in self.events.drain(..) {
            if due <= frame {
                match event {
                    KeyEvent::Down { row, col } => ula.key_down(row, col),
                    KeyEvent::Up { row, col } => ula.key_up(row, col),
                    KeyEvent::ReleaseAll => ula.release_all(),
                }
            } else {
                remaining.push((due, event));
            }
        }
        self.events = remaining;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}
