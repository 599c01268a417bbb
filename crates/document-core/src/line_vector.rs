//! Line index over the cell buffer.
//!
//! Each partition is one line; the partition start is the byte offset just
//! after the previous line's terminator. The cell buffer drives this index
//! from the terminators it sees during edits, and every line-structure
//! change is forwarded to the registered [`PerLine`] observer so markers,
//! levels, states and annotations stay aligned with the lines.

use std::cell::RefCell;
use std::rc::Weak;

use crate::Position;
use crate::partitioning::Partitioning;
use crate::per_line::PerLine;

/// Line-number to position index plus the per-line observer hook.
#[derive(Default)]
pub struct LineVector {
    starts: Partitioning,
    per_line: Option<Weak<RefCell<dyn PerLine>>>,
}

impl std::fmt::Debug for LineVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineVector").field("lines", &self.lines()).finish()
    }
}

impl LineVector {
    /// Create an index holding the single empty line of an empty buffer.
    pub fn new() -> Self {
        Self { starts: Partitioning::new(), per_line: None }
    }

    /// Reset to a single empty line, telling the observer to do the same.
    pub fn init(&mut self) {
        self.starts.delete_all();
        if let Some(pl) = self.observer() {
            pl.borrow_mut().init();
        }
    }

    /// Register the observer that mirrors line structure changes.
    pub fn set_per_line(&mut self, pl: Weak<RefCell<dyn PerLine>>) {
        self.per_line = Some(pl);
    }

    fn observer(&self) -> Option<std::rc::Rc<RefCell<dyn PerLine>>> {
        self.per_line.as_ref().and_then(Weak::upgrade)
    }

    /// Shift the positions of all lines after `line` by `delta`.
    pub fn insert_text(&mut self, line: Position, delta: Position) {
        self.starts.insert_text(line, delta);
    }

    /// Record a new line whose text begins at `position`. With `line_start`
    /// set, the insertion point was itself a line start, so per-line data
    /// stays with the text now pushed onto the new line.
    pub fn insert_line(&mut self, line: Position, position: Position, line_start: bool) {
        self.starts.insert_partition(line, position);
        if let Some(pl) = self.observer() {
            let attach = if line > 0 && line_start { line - 1 } else { line };
            pl.borrow_mut().insert_line(attach);
        }
    }

    /// Reset the start position of `line`.
    pub fn set_line_start(&mut self, line: Position, position: Position) {
        self.starts.set_partition_start_position(line, position);
    }

    /// Remove `line`, merging it into its predecessor.
    pub fn remove_line(&mut self, line: Position) {
        self.starts.remove_partition(line);
        if let Some(pl) = self.observer() {
            pl.borrow_mut().remove_line(line);
        }
    }

    /// Number of lines.
    pub fn lines(&self) -> Position {
        self.starts.partitions()
    }

    /// Line containing `position`.
    pub fn line_from_position(&self, position: Position) -> Position {
        self.starts.partition_from_position(position)
    }

    /// Start position of `line`.
    pub fn line_start(&self, line: Position) -> Position {
        self.starts.position_from_partition(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_has_one_line() {
        let lv = LineVector::new();
        assert_eq!(lv.lines(), 1);
        assert_eq!(lv.line_start(0), 0);
    }

    #[test]
    fn insert_line_tracks_starts() {
        let mut lv = LineVector::new();
        // "ab\ncd\n" : lines start at 0, 3, 6.
        lv.insert_text(0, 6);
        lv.insert_line(1, 3, false);
        lv.insert_line(2, 6, false);
        assert_eq!(lv.lines(), 3);
        assert_eq!(lv.line_start(0), 0);
        assert_eq!(lv.line_start(1), 3);
        assert_eq!(lv.line_start(2), 6);
        assert_eq!(lv.line_from_position(0), 0);
        assert_eq!(lv.line_from_position(2), 0);
        assert_eq!(lv.line_from_position(3), 1);
        assert_eq!(lv.line_from_position(6), 2);
    }

    #[test]
    fn remove_line_merges() {
        let mut lv = LineVector::new();
        lv.insert_text(0, 6);
        lv.insert_line(1, 3, false);
        lv.remove_line(1);
        assert_eq!(lv.lines(), 1);
        assert_eq!(lv.line_from_position(4), 0);
    }
}
