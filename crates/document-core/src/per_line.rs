//! Per-line ancillary data.
//!
//! Markers, fold levels, lexer line states, and annotations all keep one
//! slot per document line. They do not watch the text; the cell buffer
//! tells them when lines appear and disappear through the [`PerLine`]
//! callbacks, so they stay aligned with the line index by construction.
//!
//! Each manager allocates lazily: a document that never uses markers pays
//! nothing for them.

use crate::Position;
use crate::sparse_vector::SparseVector;
use crate::split_vector::SplitVector;

/// Base value for fold levels, so level arithmetic never goes negative.
pub const FOLD_LEVEL_BASE: i32 = 0x400;
/// Mask extracting the numeric part of a fold level.
pub const FOLD_LEVEL_NUMBER_MASK: i32 = 0x0FFF;
/// Flag marking a whitespace line that shares its neighbour's fold.
pub const FOLD_LEVEL_WHITE_FLAG: i32 = 0x1000;
/// Flag marking a fold header line.
pub const FOLD_LEVEL_HEADER_FLAG: i32 = 0x2000;

/// Numeric part of a fold level.
pub fn level_number(level: i32) -> i32 {
    level & FOLD_LEVEL_NUMBER_MASK
}

/// Observer of line structure changes, driven by the cell buffer.
pub trait PerLine {
    /// The buffer was reset; drop everything.
    fn init(&mut self);
    /// A line was inserted at `line`.
    fn insert_line(&mut self, line: Position);
    /// `count` lines were inserted starting at `line`.
    fn insert_lines(&mut self, line: Position, count: Position) {
        for l in line..line + count {
            self.insert_line(l);
        }
    }
    /// The line at `line` was removed.
    fn remove_line(&mut self, line: Position);
}

/// One marker placed on a line: the container's handle and the marker
/// number it displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerHandleNumber {
    /// Unique handle identifying this placement.
    pub handle: i32,
    /// Marker number (0..31), the bit reported in marker masks.
    pub number: i32,
}

/// The markers on one line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerHandleSet {
    mhlist: Vec<MarkerHandleNumber>,
}

impl MarkerHandleSet {
    /// Bit mask of the marker numbers present.
    pub fn mark_value(&self) -> u32 {
        self.mhlist_iter().fold(0, |m, mh| m | (1u32 << (mh.number & 31)))
    }

    fn mhlist_iter(&self) -> impl Iterator<Item = &MarkerHandleNumber> {
        self.mhlist.iter()
    }

    /// Whether `handle` is in this set.
    pub fn contains(&self, handle: i32) -> bool {
        self.mhlist.iter().any(|mh| mh.handle == handle)
    }

    fn insert_handle(&mut self, handle: i32, number: i32) {
        self.mhlist.push(MarkerHandleNumber { handle, number });
    }

    fn remove_handle(&mut self, handle: i32) -> bool {
        let before = self.mhlist.len();
        self.mhlist.retain(|mh| mh.handle != handle);
        self.mhlist.len() != before
    }

    fn remove_number(&mut self, number: i32, all: bool) -> bool {
        let mut removed = false;
        self.mhlist.retain(|mh| {
            if mh.number == number && (all || !removed) {
                removed = true;
                false
            } else {
                true
            }
        });
        removed
    }

    fn combine_with(&mut self, other: &mut Self) {
        self.mhlist.append(&mut other.mhlist);
    }

    fn is_empty(&self) -> bool {
        self.mhlist.is_empty()
    }
}

/// Markers for every line, plus the handle allocator.
#[derive(Debug, Default)]
pub struct LineMarkers {
    markers: SplitVector<Option<Box<MarkerHandleSet>>>,
    handle_current: i32,
}

impl LineMarkers {
    /// Create an empty marker store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bit mask of markers on `line`.
    pub fn mark_value(&self, line: Position) -> u32 {
        match self.markers.at_ref(line) {
            Some(Some(set)) => set.mark_value(),
            _ => 0,
        }
    }

    /// First line at or after `line_start` carrying a marker in `mask`,
    /// or -1.
    pub fn marker_next(&self, line_start: Position, mask: u32) -> Position {
        let line_start = line_start.max(0);
        for line in line_start..self.markers.len() {
            if self.mark_value(line) & mask != 0 {
                return line;
            }
        }
        -1
    }

    /// Add marker `marker_num` to `line`, returning the new handle, or -1
    /// when `line` is out of range. `lines` is the current line count, used
    /// for the first allocation.
    pub fn add_mark(&mut self, line: Position, marker_num: i32, lines: Position) -> i32 {
        self.handle_current += 1;
        if self.markers.is_empty() {
            // First marker; allocate one slot per line.
            self.markers.insert_value(0, lines, None);
        }
        if line < 0 || line >= self.markers.len() {
            return -1;
        }
        let slot = match self.markers.at_ref(line) {
            Some(Some(set)) => {
                let mut set = set.clone();
                set.insert_handle(self.handle_current, marker_num);
                set
            }
            _ => {
                let mut set = Box::new(MarkerHandleSet::default());
                set.insert_handle(self.handle_current, marker_num);
                set
            }
        };
        self.markers.set_value_at(line, Some(slot));
        self.handle_current
    }

    /// Delete markers numbered `marker_num` from `line` (-1 deletes all).
    /// Returns whether anything changed.
    pub fn delete_mark(&mut self, line: Position, marker_num: i32, all: bool) -> bool {
        if line < 0 || line >= self.markers.len() {
            return false;
        }
        let Some(Some(set)) = self.markers.at_ref(line) else {
            return false;
        };
        if marker_num == -1 {
            self.markers.set_value_at(line, None);
            return true;
        }
        let mut set = set.clone();
        let changed = set.remove_number(marker_num, all);
        self.markers.set_value_at(line, if set.is_empty() { None } else { Some(set) });
        changed
    }

    /// Delete the marker placement identified by `handle`.
    pub fn delete_mark_from_handle(&mut self, handle: i32) {
        for line in 0..self.markers.len() {
            if let Some(Some(set)) = self.markers.at_ref(line) {
                if set.contains(handle) {
                    let mut set = set.clone();
                    set.remove_handle(handle);
                    self.markers.set_value_at(line, if set.is_empty() { None } else { Some(set) });
                    return;
                }
            }
        }
    }

    /// Line carrying the marker placement `handle`, or -1.
    pub fn line_from_handle(&self, handle: i32) -> Position {
        for line in 0..self.markers.len() {
            if let Some(Some(set)) = self.markers.at_ref(line) {
                if set.contains(handle) {
                    return line;
                }
            }
        }
        -1
    }
}

impl PerLine for LineMarkers {
    fn init(&mut self) {
        self.markers.delete_all();
    }

    fn insert_line(&mut self, line: Position) {
        if !self.markers.is_empty() {
            self.markers.insert(line, None);
        }
    }

    fn remove_line(&mut self, line: Position) {
        // Retain the deleted line's markers by merging them into the
        // previous line.
        if !self.markers.is_empty() && line > 0 {
            if let Some(Some(removed)) = self.markers.at_ref(line) {
                let mut removed = removed.clone();
                let merged = match self.markers.at_ref(line - 1) {
                    Some(Some(prev)) => {
                        let mut prev = prev.clone();
                        prev.combine_with(&mut removed);
                        prev
                    }
                    _ => removed,
                };
                self.markers.set_value_at(line - 1, Some(merged));
            }
            self.markers.delete_at(line);
        }
    }
}

/// Fold level per line.
#[derive(Debug, Default)]
pub struct LineLevels {
    levels: SplitVector<i32>,
}

impl LineLevels {
    /// Create an empty level store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grow the store to cover `size_new` lines.
    pub fn expand_levels(&mut self, size_new: Position) {
        let len = self.levels.len();
        if size_new > len {
            self.levels.insert_value(len, size_new - len, FOLD_LEVEL_BASE);
        }
    }

    /// Drop all levels.
    pub fn clear_levels(&mut self) {
        self.levels.delete_all();
    }

    /// Set the level of `line`, returning the previous level. `lines` is
    /// the current line count used when allocating.
    pub fn set_level(&mut self, line: Position, level: i32, lines: Position) -> i32 {
        let mut prev = 0;
        if line >= 0 && line < lines {
            if self.levels.is_empty() {
                self.expand_levels(lines + 1);
            }
            prev = self.levels.value_at(line);
            if prev != level {
                self.levels.set_value_at(line, level);
            }
        }
        prev
    }

    /// Level of `line`, [`FOLD_LEVEL_BASE`] when never set.
    pub fn get_level(&self, line: Position) -> i32 {
        if !self.levels.is_empty() && line >= 0 && line < self.levels.len() {
            self.levels.value_at(line)
        } else {
            FOLD_LEVEL_BASE
        }
    }
}

impl PerLine for LineLevels {
    fn init(&mut self) {
        self.levels.delete_all();
    }

    fn insert_line(&mut self, line: Position) {
        if !self.levels.is_empty() {
            let level = if line < self.levels.len() {
                self.levels.value_at(line)
            } else {
                FOLD_LEVEL_BASE
            };
            self.levels.insert(line, level);
        }
    }

    fn remove_line(&mut self, line: Position) {
        if !self.levels.is_empty() {
            // The line merging into the previous one keeps the previous
            // line's level unless the removed line was a header.
            let level_deleted = self.levels.value_at(line);
            self.levels.delete_at(line);
            if line > 0 && level_deleted & FOLD_LEVEL_HEADER_FLAG != 0 {
                let prev = self.levels.value_at(line - 1);
                self.levels.set_value_at(line - 1, prev | FOLD_LEVEL_HEADER_FLAG);
            }
        }
    }
}

/// Integer lexer state per line.
#[derive(Debug, Default)]
pub struct LineState {
    line_states: SplitVector<i32>,
}

impl LineState {
    /// Create an empty state store.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_length(&mut self, length: Position) {
        let len = self.line_states.len();
        if length > len {
            self.line_states.insert_value(len, length - len, 0);
        }
    }

    /// Set the state of `line`, returning the previous state.
    pub fn set_line_state(&mut self, line: Position, state: i32) -> i32 {
        if line < 0 {
            return 0;
        }
        self.ensure_length(line + 1);
        let old = self.line_states.value_at(line);
        self.line_states.set_value_at(line, state);
        old
    }

    /// State of `line`, 0 when never set.
    pub fn get_line_state(&mut self, line: Position) -> i32 {
        if line < 0 {
            return 0;
        }
        self.ensure_length(line + 1);
        self.line_states.value_at(line)
    }

    /// One past the last line that may carry state.
    pub fn get_max_line_state(&self) -> Position {
        self.line_states.len()
    }
}

impl PerLine for LineState {
    fn init(&mut self) {
        self.line_states.delete_all();
    }

    fn insert_line(&mut self, line: Position) {
        if !self.line_states.is_empty() {
            self.line_states.insert(line.min(self.line_states.len()), 0);
        }
    }

    fn remove_line(&mut self, line: Position) {
        if !self.line_states.is_empty() && line < self.line_states.len() {
            self.line_states.delete_at(line);
        }
    }
}

/// Text attached to a line: annotation or margin text with styling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    text: Vec<u8>,
    styles: Option<Vec<u8>>,
    style: u8,
    lines: i32,
}

impl Annotation {
    fn number_lines(text: &[u8]) -> i32 {
        1 + text.iter().filter(|&&b| b == b'\n').count() as i32
    }
}

/// Annotation text per line, stored sparsely.
#[derive(Debug, Default)]
pub struct LineAnnotations {
    annotations: SparseVector<Option<Box<Annotation>>>,
}

impl LineAnnotations {
    /// Create an empty annotation store.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_length(&mut self, lines: Position) {
        let len = self.annotations.len();
        if lines > len {
            self.annotations.insert_space(len, lines - len);
        }
    }

    /// Whether `line` carries per-byte styles rather than one style.
    pub fn multiple_styles(&self, line: Position) -> bool {
        matches!(self.annotations.at_ref(line), Some(Some(a)) if a.styles.is_some())
    }

    /// Single style of `line`'s annotation.
    pub fn style(&self, line: Position) -> u8 {
        match self.annotations.at_ref(line) {
            Some(Some(a)) => a.style,
            _ => 0,
        }
    }

    /// Annotation text of `line`.
    pub fn text(&self, line: Position) -> &[u8] {
        match self.annotations.at_ref(line) {
            Some(Some(a)) => &a.text,
            _ => &[],
        }
    }

    /// Per-byte styles of `line`, when set.
    pub fn styles(&self, line: Position) -> &[u8] {
        match self.annotations.at_ref(line) {
            Some(Some(a)) => a.styles.as_deref().unwrap_or(&[]),
            _ => &[],
        }
    }

    /// Display line count of `line`'s annotation (0 when absent).
    pub fn lines(&self, line: Position) -> i32 {
        match self.annotations.at_ref(line) {
            Some(Some(a)) => a.lines,
            _ => 0,
        }
    }

    /// Byte length of `line`'s annotation text.
    pub fn length(&self, line: Position) -> Position {
        self.text(line).len() as Position
    }

    /// Replace the annotation text of `line`; empty text removes it.
    /// Returns the change in display lines.
    pub fn set_text(&mut self, line: Position, text: &[u8]) -> i32 {
        if line < 0 {
            return 0;
        }
        self.ensure_length(line + 1);
        let lines_before = self.lines(line);
        if text.is_empty() {
            self.annotations.set_value_at(line, None);
            -lines_before
        } else {
            let annotation = Annotation {
                text: text.to_vec(),
                styles: None,
                style: 0,
                lines: Annotation::number_lines(text),
            };
            let lines_after = annotation.lines;
            self.annotations.set_value_at(line, Some(Box::new(annotation)));
            lines_after - lines_before
        }
    }

    /// Set the single style of `line`'s annotation.
    pub fn set_style(&mut self, line: Position, style: u8) {
        if let Some(Some(a)) = self.annotations.at_ref(line) {
            let mut a = a.clone();
            a.style = style;
            a.styles = None;
            self.annotations.set_value_at(line, Some(a));
        }
    }

    /// Attach per-byte styles to `line`'s annotation. Requires text of the
    /// same length to already be present; returns whether styles were set.
    pub fn set_styles(&mut self, line: Position, styles: &[u8]) -> bool {
        match self.annotations.at_ref(line) {
            Some(Some(a)) if a.text.len() == styles.len() => {
                let mut a = a.clone();
                a.styles = Some(styles.to_vec());
                self.annotations.set_value_at(line, Some(a));
                true
            }
            _ => false,
        }
    }

    /// Remove every annotation.
    pub fn clear_all(&mut self) {
        let len = self.annotations.len();
        for line in 0..len {
            self.annotations.set_value_at(line, None);
        }
    }
}

impl PerLine for LineAnnotations {
    fn init(&mut self) {
        self.annotations.delete_all();
    }

    fn insert_line(&mut self, line: Position) {
        if !self.annotations.is_empty() {
            self.ensure_length(line);
            self.annotations.insert_space(line, 1);
        }
    }

    fn remove_line(&mut self, line: Position) {
        if !self.annotations.is_empty() && line > 0 && line <= self.annotations.len() {
            self.annotations.delete_position(line - 1);
        }
    }
}
