//! Text and style cells with undo and line maintenance.
//!
//! All edits pass through [`CellBuffer::insert_string`] and
//! [`CellBuffer::delete_chars`]. Each edit updates two parallel gap buffers
//! (text bytes and style bytes), records an undo action, scans the changed
//! bytes for line terminators to keep the line index true, and tells the
//! per-line observer about every line inserted or removed. The fiddly part
//! is CRLF: an edit can split a pair, create one by touching a CR against
//! an LF, or break a multi-byte Unicode terminator, and the line index has
//! to come out right in every case.

use std::cell::RefCell;
use std::rc::Weak;

use crate::Position;
use crate::encoding::{utf8_is_ascii, utf8_is_nel, utf8_is_separator, utf8_is_trail_byte};
use crate::line_vector::LineVector;
use crate::per_line::PerLine;
use crate::split_vector::SplitVector;
use crate::undo_history::{Action, ActionKind, UndoHistory};

/// Parallel text and style storage plus line index and undo history.
#[derive(Debug)]
pub struct CellBuffer {
    substance: SplitVector<u8>,
    style: SplitVector<u8>,
    read_only: bool,
    collecting_undo: bool,
    utf8_line_ends: bool,
    lv: LineVector,
    uh: UndoHistory,
}

impl Default for CellBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CellBuffer {
    /// Create an empty buffer that collects undo.
    pub fn new() -> Self {
        Self {
            substance: SplitVector::new(),
            style: SplitVector::new(),
            read_only: false,
            collecting_undo: true,
            utf8_line_ends: false,
            lv: LineVector::new(),
            uh: UndoHistory::new(),
        }
    }

    /// Register the per-line observer notified of line structure changes.
    pub fn set_per_line(&mut self, pl: Weak<RefCell<dyn PerLine>>) {
        self.lv.set_per_line(pl);
    }

    /// Text byte at `position` (0 out of range).
    pub fn char_at(&self, position: Position) -> u8 {
        self.substance.value_at(position)
    }

    /// Style byte at `position` (0 out of range).
    pub fn style_at(&self, position: Position) -> u8 {
        self.style.value_at(position)
    }

    /// Copy text bytes starting at `position` into `buf`, zero-padding any
    /// out-of-range tail.
    pub fn get_char_range(&self, buf: &mut [u8], position: Position) {
        self.substance.copy_range(position, buf);
    }

    /// Copy style bytes starting at `position` into `buf`.
    pub fn get_style_range(&self, buf: &mut [u8], position: Position) {
        self.style.copy_range(position, buf);
    }

    /// Contiguous view of `range_length` text bytes at `position`.
    pub fn range_slice(&mut self, position: Position, range_length: Position) -> &[u8] {
        self.substance.range_slice(position, range_length)
    }

    /// The whole text as one slice.
    pub fn buffer_slice(&mut self) -> &[u8] {
        self.substance.buffer_slice()
    }

    /// Text length in bytes.
    pub fn len(&self) -> Position {
        self.substance.len()
    }

    /// Whether the buffer holds no text.
    pub fn is_empty(&self) -> bool {
        self.substance.is_empty()
    }

    /// Number of lines (one more than the number of terminators).
    pub fn lines(&self) -> Position {
        self.lv.lines()
    }

    /// Start position of `line`.
    pub fn line_start(&self, line: Position) -> Position {
        if line < 0 {
            0
        } else if line >= self.lines() {
            self.len()
        } else {
            self.lv.line_start(line)
        }
    }

    /// Line containing `position`.
    pub fn line_from_position(&self, position: Position) -> Position {
        self.lv.line_from_position(position)
    }

    /// Insert `s` before `position`, recording undo. Returns whether the
    /// edit began a new undo step, or `None` when read-only or the request
    /// is out of range.
    pub fn insert_string(&mut self, position: Position, s: &[u8]) -> Option<bool> {
        if self.read_only || position < 0 || position > self.len() || s.is_empty() {
            return None;
        }
        let mut start_sequence = false;
        if self.collecting_undo {
            // Save only the characters; styles are re-derivable by lexing.
            let (st, _) = self.uh.append_action(
                ActionKind::Insert,
                position,
                s,
                s.len() as Position,
                true,
            );
            start_sequence = st;
        }
        self.basic_insert_string(position, s);
        Some(start_sequence)
    }

    /// Remove `delete_length` bytes at `position`, recording undo. Returns
    /// the removed bytes and whether a new undo step began, or `None` when
    /// read-only or out of range.
    pub fn delete_chars(
        &mut self,
        position: Position,
        delete_length: Position,
    ) -> Option<(Vec<u8>, bool)> {
        if self.read_only
            || position < 0
            || delete_length <= 0
            || position + delete_length > self.len()
        {
            return None;
        }
        let mut data = vec![0u8; delete_length as usize];
        self.get_char_range(&mut data, position);
        let mut start_sequence = false;
        if self.collecting_undo {
            let (st, _) =
                self.uh
                    .append_action(ActionKind::Remove, position, &data, delete_length, true);
            start_sequence = st;
        }
        self.basic_delete_chars(position, delete_length);
        Some((data, start_sequence))
    }

    /// Set the style byte at `position`; returns whether it changed.
    /// Styles are not covered by undo.
    pub fn set_style_at(&mut self, position: Position, style_value: u8) -> bool {
        if self.style.value_at(position) != style_value
            && position >= 0
            && position < self.style.len()
        {
            self.style.set_value_at(position, style_value);
            true
        } else {
            false
        }
    }

    /// Set `length_style` style bytes from `position`; returns whether any
    /// changed.
    pub fn set_style_for(
        &mut self,
        position: Position,
        length_style: Position,
        style_value: u8,
    ) -> bool {
        let mut changed = false;
        for pos in position..position + length_style.max(0) {
            changed |= self.set_style_at(pos, style_value);
        }
        changed
    }

    /// Whether mutation is currently refused.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Gate all mutation.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Whether Unicode line terminators are currently recognised.
    pub fn utf8_line_ends(&self) -> bool {
        self.utf8_line_ends
    }

    /// Enable or disable recognition of U+2028/U+2029/U+0085 terminators,
    /// rebuilding the line index when the setting changes.
    pub fn set_utf8_line_ends(&mut self, utf8_line_ends: bool) {
        if self.utf8_line_ends != utf8_line_ends {
            self.utf8_line_ends = utf8_line_ends;
            log::debug!(
                "rebuilding line index for {} bytes (unicode line ends {})",
                self.len(),
                if utf8_line_ends { "on" } else { "off" }
            );
            self.reset_line_ends();
        }
    }

    // ---- undo surface -----------------------------------------------------

    /// Whether edits are recorded for undo.
    pub fn is_collecting_undo(&self) -> bool {
        self.collecting_undo
    }

    /// Turn undo collection on or off; turning it off drops the history.
    pub fn set_undo_collection(&mut self, collect_undo: bool) {
        if collect_undo != self.collecting_undo {
            self.collecting_undo = collect_undo;
            if !collect_undo {
                self.uh.delete_undo_history();
            }
        }
    }

    /// Forget all recorded history.
    pub fn delete_undo_history(&mut self) {
        self.uh.delete_undo_history();
    }

    /// Open an explicit undo group.
    pub fn begin_undo_action(&mut self) {
        self.uh.begin_undo_action();
    }

    /// Close an explicit undo group.
    pub fn end_undo_action(&mut self) {
        self.uh.end_undo_action();
    }

    /// Nesting depth of open undo groups.
    pub fn undo_sequence_depth(&self) -> i32 {
        self.uh.undo_sequence_depth()
    }

    /// Record a container action carrying `token`.
    pub fn add_undo_action(&mut self, token: Position, may_coalesce: bool) {
        self.uh
            .append_action(ActionKind::Container, token, &[], 0, may_coalesce);
    }

    /// Mark the current state as saved.
    pub fn set_save_point(&mut self) {
        self.uh.set_save_point();
    }

    /// Whether the current state is the saved one.
    pub fn is_save_point(&self) -> bool {
        self.uh.is_save_point()
    }

    /// Begin a tentative (composition) sequence.
    pub fn tentative_start(&mut self) {
        self.uh.tentative_start();
    }

    /// Commit the tentative sequence, truncating any redo tail.
    pub fn tentative_commit(&mut self) {
        self.uh.tentative_commit();
    }

    /// Whether a tentative sequence is open.
    pub fn tentative_active(&self) -> bool {
        self.uh.tentative_active()
    }

    /// Steps recorded since the tentative start.
    pub fn tentative_steps(&mut self) -> i32 {
        self.uh.tentative_steps()
    }

    /// Whether an undo step is available.
    pub fn can_undo(&self) -> bool {
        self.uh.can_undo()
    }

    /// Position before the next undo step; returns its action count.
    pub fn start_undo(&mut self) -> i32 {
        self.uh.start_undo()
    }

    /// The action the next `perform_undo_step` will invert.
    pub fn undo_step(&self) -> Action {
        self.uh.undo_step().clone()
    }

    /// Invert one recorded action: an insert is deleted, a remove is
    /// re-inserted.
    pub fn perform_undo_step(&mut self) {
        let action = self.uh.undo_step().clone();
        match action.at {
            ActionKind::Insert => self.basic_delete_chars(action.position, action.len_data),
            ActionKind::Remove => self.basic_insert_string(action.position, &action.data),
            ActionKind::Start | ActionKind::Container => {}
        }
        self.uh.completed_undo_step();
    }

    /// Whether a redo step is available.
    pub fn can_redo(&self) -> bool {
        self.uh.can_redo()
    }

    /// Position before the next redo step; returns its action count.
    pub fn start_redo(&mut self) -> i32 {
        self.uh.start_redo()
    }

    /// The action the next `perform_redo_step` will re-apply.
    pub fn redo_step(&self) -> Action {
        self.uh.redo_step().clone()
    }

    /// Re-apply one recorded action.
    pub fn perform_redo_step(&mut self) {
        let action = self.uh.redo_step().clone();
        match action.at {
            ActionKind::Insert => self.basic_insert_string(action.position, &action.data),
            ActionKind::Remove => self.basic_delete_chars(action.position, action.len_data),
            ActionKind::Start | ActionKind::Container => {}
        }
        self.uh.completed_redo_step();
    }

    // ---- line maintenance -------------------------------------------------

    fn insert_line(&mut self, line: Position, position: Position, line_start: bool) {
        self.lv.insert_line(line, position, line_start);
    }

    fn remove_line(&mut self, line: Position) {
        self.lv.remove_line(line);
    }

    fn utf8_line_end_overlaps(&self, position: Position) -> bool {
        let bytes = [
            self.substance.value_at(position - 2),
            self.substance.value_at(position - 1),
            self.substance.value_at(position),
            self.substance.value_at(position + 1),
        ];
        utf8_is_separator(&bytes) || utf8_is_separator(&bytes[1..]) || utf8_is_nel(&bytes[1..])
    }

    fn basic_insert_string(&mut self, position: Position, s: &[u8]) {
        let insert_length = s.len() as Position;
        if insert_length == 0 {
            return;
        }
        let ch_after = self.substance.value_at(position);
        let mut breaking_utf8_line_end = false;
        if self.utf8_line_ends && utf8_is_trail_byte(ch_after) {
            breaking_utf8_line_end = self.utf8_line_end_overlaps(position);
        }
        self.substance.insert_from_array(position, s, 0, insert_length);
        self.style.insert_value(position, insert_length, 0);

        let mut line_insert = self.lv.line_from_position(position) + 1;
        let at_line_start = self.lv.line_start(line_insert - 1) == position;
        // Point all the lines after the insertion point further along.
        self.lv.insert_text(line_insert - 1, insert_length);
        let ch_before = self.substance.value_at(position - 1);
        let mut ch_prev = ch_before;
        let ch_after2 = self.substance.value_at(position + insert_length);
        if ch_prev == b'\r' && ch_after2 == b'\n' {
            // Splitting up a CRLF pair at position.
            self.insert_line(line_insert, position, false);
            line_insert += 1;
        }
        if breaking_utf8_line_end {
            self.remove_line(line_insert);
        }
        let mut ch_before_prev = self.substance.value_at(position - 2);
        let mut ch = b' ';
        for i in 0..insert_length {
            ch = s[i as usize];
            if ch == b'\r' {
                self.insert_line(line_insert, position + i + 1, at_line_start);
                line_insert += 1;
            } else if ch == b'\n' {
                if ch_prev == b'\r' {
                    // Patch up what was the end of the previous line.
                    self.lv.set_line_start(line_insert - 1, position + i + 1);
                } else {
                    self.insert_line(line_insert, position + i + 1, at_line_start);
                    line_insert += 1;
                }
            } else if self.utf8_line_ends {
                let back3 = [ch_before_prev, ch_prev, ch];
                if utf8_is_separator(&back3) || utf8_is_nel(&back3[1..]) {
                    self.insert_line(line_insert, position + i + 1, at_line_start);
                    line_insert += 1;
                }
            }
            ch_before_prev = ch_prev;
            ch_prev = ch;
        }
        // Joining two lines where the last inserted byte is a CR and the
        // following substance starts with an LF.
        if ch_after2 == b'\n' && ch == b'\r' {
            // The end of line is already in the buffer, so drop the newly
            // created one.
            self.remove_line(line_insert - 1);
        }
    }

    fn basic_delete_chars(&mut self, position: Position, delete_length: Position) {
        if delete_length <= 0 {
            return;
        }
        if position == 0 && delete_length == self.substance.len() {
            // Whole buffer going away: reinitialising the line data is
            // faster than deleting line by line.
            self.lv.init();
        } else {
            // Fix the line positions before deleting, while the text being
            // removed is still readable.
            let mut line_remove = self.lv.line_from_position(position) + 1;
            self.lv.insert_text(line_remove - 1, -delete_length);
            let ch_prev = self.substance.value_at(position - 1);
            let ch_before = ch_prev;
            let mut ch_next = self.substance.value_at(position);
            let mut ignore_nl = false;
            if ch_prev == b'\r' && ch_next == b'\n' {
                // Deleting the LF of a CRLF: the CR keeps ending its line,
                // so the next line now starts right here.
                self.lv.set_line_start(line_remove, position);
                line_remove += 1;
                ignore_nl = true; // First \n is not a real line removal.
            }
            if self.utf8_line_ends
                && utf8_is_trail_byte(ch_next)
                && self.utf8_line_end_overlaps(position)
            {
                self.remove_line(line_remove);
            }
            let mut ch = ch_next;
            for i in 0..delete_length {
                ch_next = self.substance.value_at(position + i + 1);
                if ch == b'\r' {
                    if ch_next != b'\n' {
                        self.remove_line(line_remove);
                    }
                } else if ch == b'\n' {
                    if ignore_nl {
                        ignore_nl = false; // Further \n are real removals.
                    } else {
                        self.remove_line(line_remove);
                    }
                } else if self.utf8_line_ends && !utf8_is_ascii(ch) {
                    let next3 = [ch, ch_next, self.substance.value_at(position + i + 2)];
                    if utf8_is_separator(&next3) || utf8_is_nel(&next3) {
                        self.remove_line(line_remove);
                    }
                }
                ch = ch_next;
            }
            // The deletion may have brought a CR next to an LF.
            let ch_after = self.substance.value_at(position + delete_length);
            if ch_before == b'\r' && ch_after == b'\n' {
                self.remove_line(line_remove - 1);
                self.lv.set_line_start(line_remove - 1, position + 1);
            }
        }
        self.substance.delete_range(position, delete_length);
        self.style.delete_range(position, delete_length);
    }

    /// Rebuild the line index from the current text.
    fn reset_line_ends(&mut self) {
        self.lv.init();
        let length = self.len();
        let mut line_insert = 1;
        self.lv.insert_text(line_insert - 1, length);
        let mut ch_before_prev = 0u8;
        let mut ch_prev = 0u8;
        for i in 0..length {
            let ch = self.substance.value_at(i);
            if ch == b'\r' {
                self.insert_line(line_insert, i + 1, true);
                line_insert += 1;
            } else if ch == b'\n' {
                if ch_prev == b'\r' {
                    self.lv.set_line_start(line_insert - 1, i + 1);
                } else {
                    self.insert_line(line_insert, i + 1, true);
                    line_insert += 1;
                }
            } else if self.utf8_line_ends {
                let back3 = [ch_before_prev, ch_prev, ch];
                if utf8_is_separator(&back3) || utf8_is_nel(&back3[1..]) {
                    self.insert_line(line_insert, i + 1, true);
                    line_insert += 1;
                }
            }
            ch_before_prev = ch_prev;
            ch_prev = ch;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(cb: &mut CellBuffer) -> Vec<u8> {
        cb.buffer_slice().to_vec()
    }

    fn line_starts(cb: &CellBuffer) -> Vec<Position> {
        (0..=cb.lines()).map(|l| cb.line_start(l)).collect()
    }

    #[test]
    fn empty_buffer() {
        let cb = CellBuffer::new();
        assert_eq!(cb.len(), 0);
        assert_eq!(cb.lines(), 1);
        assert_eq!(cb.char_at(0), 0);
        assert!(!cb.can_undo());
    }

    #[test]
    fn insert_tracks_lines() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"one\ntwo\nthree").unwrap();
        assert_eq!(cb.lines(), 3);
        assert_eq!(line_starts(&cb), vec![0, 4, 8, 13]);
        assert_eq!(cb.line_from_position(0), 0);
        assert_eq!(cb.line_from_position(4), 1);
        assert_eq!(cb.line_from_position(12), 2);
    }

    #[test]
    fn styles_track_text_length() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"hello").unwrap();
        assert!(cb.set_style_for(0, 5, 3));
        assert_eq!(cb.style_at(2), 3);
        cb.delete_chars(1, 2).unwrap();
        assert_eq!(cb.len(), 3);
        let mut styles = [0u8; 3];
        cb.get_style_range(&mut styles, 0);
        assert_eq!(styles, [3, 3, 3]);
        // Redundant write reports no change.
        assert!(!cb.set_style_at(0, 3));
    }

    #[test]
    fn crlf_is_one_line_end() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"a\r\nb").unwrap();
        assert_eq!(cb.lines(), 2);
        assert_eq!(line_starts(&cb), vec![0, 3, 4]);
    }

    #[test]
    fn inserting_cr_before_lf_merges_lines() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"a\nb").unwrap();
        assert_eq!(cb.lines(), 2);
        // The CR pairs with the existing LF: still 2 lines.
        cb.insert_string(1, b"\r").unwrap();
        assert_eq!(text(&mut cb), b"a\r\nb");
        assert_eq!(cb.lines(), 2);
        assert_eq!(line_starts(&cb), vec![0, 3, 4]);
    }

    #[test]
    fn inserting_lf_after_cr_merges_lines() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"a\rb").unwrap();
        assert_eq!(cb.lines(), 2);
        cb.insert_string(2, b"\n").unwrap();
        assert_eq!(text(&mut cb), b"a\r\nb");
        assert_eq!(cb.lines(), 2);
        assert_eq!(line_starts(&cb), vec![0, 3, 4]);
    }

    #[test]
    fn splitting_crlf_with_text_adds_line() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"a\r\nb").unwrap();
        cb.insert_string(2, b"x").unwrap();
        assert_eq!(text(&mut cb), b"a\rx\nb");
        assert_eq!(cb.lines(), 3);
        assert_eq!(line_starts(&cb), vec![0, 2, 4, 5]);
    }

    #[test]
    fn deleting_lf_of_crlf_adds_line() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"a\r\nb").unwrap();
        assert_eq!(cb.lines(), 2);
        cb.delete_chars(2, 1).unwrap();
        assert_eq!(text(&mut cb), b"a\rb");
        assert_eq!(cb.lines(), 2);
        assert_eq!(line_starts(&cb), vec![0, 2, 3]);
    }

    #[test]
    fn deleting_cr_of_crlf_keeps_one_line_end() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"a\r\nb").unwrap();
        cb.delete_chars(1, 1).unwrap();
        assert_eq!(text(&mut cb), b"a\nb");
        assert_eq!(cb.lines(), 2);
        assert_eq!(line_starts(&cb), vec![0, 2, 3]);
    }

    #[test]
    fn deleting_between_cr_and_lf_merges() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"a\rx\nb").unwrap();
        assert_eq!(cb.lines(), 3);
        cb.delete_chars(2, 1).unwrap();
        assert_eq!(text(&mut cb), b"a\r\nb");
        assert_eq!(cb.lines(), 2);
        assert_eq!(line_starts(&cb), vec![0, 3, 4]);
    }

    #[test]
    fn delete_whole_buffer_resets_lines() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"a\nb\nc").unwrap();
        cb.delete_chars(0, 5).unwrap();
        assert_eq!(cb.lines(), 1);
        assert_eq!(cb.len(), 0);
    }

    #[test]
    fn read_only_refuses_edits() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"abc").unwrap();
        cb.set_read_only(true);
        assert!(cb.insert_string(0, b"x").is_none());
        assert!(cb.delete_chars(0, 1).is_none());
        cb.set_read_only(false);
        assert!(cb.insert_string(0, b"x").is_some());
    }

    #[test]
    fn undo_restores_bytes_and_lines() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"one\ntwo").unwrap();
        cb.delete_chars(3, 4).unwrap();
        assert_eq!(cb.lines(), 1);
        let steps = cb.start_undo();
        for _ in 0..steps {
            cb.perform_undo_step();
        }
        assert_eq!(text(&mut cb), b"one\ntwo");
        assert_eq!(cb.lines(), 2);
    }

    #[test]
    fn redo_after_undo_is_identity() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"alpha\nbeta").unwrap();
        cb.insert_string(5, b"!").unwrap();
        let before = text(&mut cb);
        let lines_before = line_starts(&cb);
        let steps = cb.start_undo();
        for _ in 0..steps {
            cb.perform_undo_step();
        }
        let steps = cb.start_redo();
        for _ in 0..steps {
            cb.perform_redo_step();
        }
        assert_eq!(text(&mut cb), before);
        assert_eq!(line_starts(&cb), lines_before);
    }

    #[test]
    fn save_point_round_trip() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"abc").unwrap();
        cb.set_save_point();
        assert!(cb.is_save_point());
        cb.insert_string(3, b"d").unwrap();
        assert!(!cb.is_save_point());
        let steps = cb.start_undo();
        for _ in 0..steps {
            cb.perform_undo_step();
        }
        assert!(cb.is_save_point());
        assert_eq!(text(&mut cb), b"abc");
    }

    #[test]
    fn disabling_undo_collection_drops_history() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"abc").unwrap();
        assert!(cb.can_undo());
        cb.set_undo_collection(false);
        assert!(!cb.can_undo());
        cb.insert_string(3, b"d").unwrap();
        assert!(!cb.can_undo());
        cb.set_undo_collection(true);
        cb.insert_string(4, b"e").unwrap();
        assert!(cb.can_undo());
    }

    #[test]
    fn unicode_line_ends_recognised_when_enabled() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, "a\u{2028}b\u{0085}c".as_bytes()).unwrap();
        // Not enabled: one line.
        assert_eq!(cb.lines(), 1);
        cb.set_utf8_line_ends(true);
        assert_eq!(cb.lines(), 3);
        // Inserting into the middle of a separator un-breaks the line.
        let next = cb.char_at(1);
        assert_eq!(next, 0xE2);
        cb.set_utf8_line_ends(false);
        assert_eq!(cb.lines(), 1);
    }

    #[test]
    fn unicode_line_end_insert_and_delete() {
        let mut cb = CellBuffer::new();
        cb.set_utf8_line_ends(true);
        cb.insert_string(0, "a\u{2029}b".as_bytes()).unwrap();
        assert_eq!(cb.lines(), 2);
        assert_eq!(cb.line_start(1), 4);
        cb.delete_chars(1, 3).unwrap();
        assert_eq!(cb.lines(), 1);
        assert_eq!(text(&mut cb), b"ab");
    }

    #[test]
    fn tentative_sequence_rolls_back_as_unit() {
        let mut cb = CellBuffer::new();
        cb.insert_string(0, b"base").unwrap();
        cb.tentative_start();
        cb.insert_string(4, b"x").unwrap();
        cb.insert_string(5, b"y").unwrap();
        assert!(cb.tentative_active());
        let steps = cb.tentative_steps();
        assert!(steps > 0);
        for _ in 0..steps {
            cb.perform_undo_step();
        }
        cb.tentative_commit();
        assert_eq!(text(&mut cb), b"base");
        assert!(!cb.tentative_active());
    }
}
