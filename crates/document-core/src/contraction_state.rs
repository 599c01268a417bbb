//! Document-line to display-line mapping.
//!
//! Folding hides lines and wrapping makes one document line occupy several
//! display lines; this structure answers both directions of the mapping.
//! Until the first fold or multi-height line appears it runs in a
//! one-to-one mode with no allocations at all. The full mode keeps three
//! run maps (visible, expanded, height) plus a partitioning whose partition
//! position is the cumulative display-line count, so both lookups stay
//! logarithmic.

use crate::Position;
use crate::partitioning::Partitioning;
use crate::run_styles::RunStyles;
use crate::sparse_vector::SparseVector;

struct ContractionData {
    visible: RunStyles<i32>,
    expanded: RunStyles<i32>,
    heights: RunStyles<i32>,
    fold_display_texts: SparseVector<Option<Box<String>>>,
    display_lines: Partitioning,
}

/// Folding and wrap visibility state for one view of a document.
pub struct ContractionState {
    data: Option<Box<ContractionData>>,
    lines_in_document: Position,
}

impl Default for ContractionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractionState {
    /// Create a one-to-one state covering one (empty) line.
    pub fn new() -> Self {
        Self { data: None, lines_in_document: 1 }
    }

    fn one_to_one(&self) -> bool {
        self.data.is_none()
    }

    fn ensure_data(&mut self) {
        if self.one_to_one() {
            let lines = self.lines_in_document;
            self.data = Some(Box::new(ContractionData {
                visible: RunStyles::new(),
                expanded: RunStyles::new(),
                heights: RunStyles::new(),
                fold_display_texts: SparseVector::new(),
                display_lines: Partitioning::new(),
            }));
            self.insert_lines(0, lines);
        }
    }

    /// Drop the auxiliary structures, returning to one-to-one mode.
    pub fn show_all(&mut self) {
        let lines = self.lines_in_document();
        self.data = None;
        self.lines_in_document = lines;
    }

    /// Number of document lines covered.
    pub fn lines_in_document(&self) -> Position {
        match &self.data {
            None => self.lines_in_document,
            // The last partition is the end sentinel, not a line.
            Some(d) => d.display_lines.partitions() - 1,
        }
    }

    /// Number of display lines after folding and height.
    pub fn lines_displayed(&self) -> Position {
        match &self.data {
            None => self.lines_in_document,
            Some(d) => d.display_lines.position_from_partition(self.lines_in_document()),
        }
    }

    /// First display line of document line `line_doc`.
    pub fn display_from_doc(&self, line_doc: Position) -> Position {
        match &self.data {
            None => line_doc.min(self.lines_in_document),
            Some(d) => {
                d.display_lines.position_from_partition(line_doc.min(d.display_lines.partitions()))
            }
        }
    }

    /// Last display line of document line `line_doc`.
    pub fn display_last_from_doc(&self, line_doc: Position) -> Position {
        self.display_from_doc(line_doc) + self.get_height(line_doc) - 1
    }

    /// Document line shown at display line `line_display`.
    pub fn doc_from_display(&self, line_display: Position) -> Position {
        match &self.data {
            None => line_display,
            Some(d) => {
                if line_display <= 0 {
                    return 0;
                }
                if line_display > self.lines_displayed() {
                    return self.lines_in_document();
                }
                d.display_lines.partition_from_position(line_display)
            }
        }
    }

    /// Insert `line_count` document lines before `line_doc`, visible and
    /// expanded with height 1.
    pub fn insert_lines(&mut self, line_doc: Position, line_count: Position) {
        match &mut self.data {
            None => self.lines_in_document += line_count,
            Some(_) => {
                for l in line_doc..line_doc + line_count {
                    self.insert_one_line(l);
                }
            }
        }
    }

    fn insert_one_line(&mut self, line_doc: Position) {
        let line_display = self.display_from_doc(line_doc);
        let d = self.data.as_mut().expect("full mode");
        d.visible.insert_space(line_doc, 1);
        d.visible.set_value_at(line_doc, 1);
        d.expanded.insert_space(line_doc, 1);
        d.expanded.set_value_at(line_doc, 1);
        d.heights.insert_space(line_doc, 1);
        d.heights.set_value_at(line_doc, 1);
        d.fold_display_texts.insert_space(line_doc, 1);
        d.display_lines.insert_partition(line_doc, line_display);
        d.display_lines.insert_text(line_doc, 1);
    }

    /// Remove `line_count` document lines starting at `line_doc`.
    pub fn delete_lines(&mut self, line_doc: Position, line_count: Position) {
        match &mut self.data {
            None => self.lines_in_document -= line_count,
            Some(_) => {
                for _ in 0..line_count {
                    self.delete_one_line(line_doc);
                }
            }
        }
    }

    fn delete_one_line(&mut self, line_doc: Position) {
        let visible = self.get_visible(line_doc);
        let height = self.get_height(line_doc);
        let d = self.data.as_mut().expect("full mode");
        if visible {
            d.display_lines.insert_text(line_doc, -height);
        }
        d.display_lines.remove_partition(line_doc);
        d.visible.delete_range(line_doc, 1);
        d.expanded.delete_range(line_doc, 1);
        d.heights.delete_range(line_doc, 1);
        d.fold_display_texts.delete_position(line_doc);
    }

    /// Whether `line_doc` is shown.
    pub fn get_visible(&self, line_doc: Position) -> bool {
        match &self.data {
            None => true,
            Some(d) => d.visible.value_at(line_doc) == 1,
        }
    }

    /// Show or hide `[line_doc_start, line_doc_end]`. Returns whether any
    /// display state changed.
    pub fn set_visible(
        &mut self,
        line_doc_start: Position,
        line_doc_end: Position,
        is_visible: bool,
    ) -> bool {
        if is_visible && self.one_to_one() {
            return false;
        }
        self.ensure_data();
        if line_doc_start < 0 || line_doc_end >= self.lines_in_document() {
            return false;
        }
        let mut delta = 0;
        for line in line_doc_start..=line_doc_end {
            if self.get_visible(line) != is_visible {
                let d = self.data.as_mut().expect("full mode");
                let height_line = d.heights.value_at(line);
                let difference = if is_visible { height_line } else { -height_line };
                d.visible.set_value_at(line, if is_visible { 1 } else { 0 });
                d.display_lines.insert_text(line, difference.into());
                delta += difference;
            }
        }
        delta != 0
    }

    /// Whether any line is hidden.
    pub fn hidden_lines(&self) -> bool {
        match &self.data {
            None => false,
            Some(d) => !d.visible.all_same_as(1),
        }
    }

    /// Whether the fold point at `line_doc` is expanded.
    pub fn get_expanded(&self, line_doc: Position) -> bool {
        match &self.data {
            None => true,
            Some(d) => d.expanded.value_at(line_doc) == 1,
        }
    }

    /// Set the expansion flag of `line_doc`. Returns whether it changed.
    pub fn set_expanded(&mut self, line_doc: Position, is_expanded: bool) -> bool {
        if is_expanded && self.one_to_one() {
            return false;
        }
        self.ensure_data();
        let d = self.data.as_mut().expect("full mode");
        if is_expanded != (d.expanded.value_at(line_doc) == 1) {
            d.expanded.set_value_at(line_doc, if is_expanded { 1 } else { 0 });
            true
        } else {
            false
        }
    }

    /// First contracted fold point at or after `line_doc_start`, or -1.
    pub fn contracted_next(&self, line_doc_start: Position) -> Position {
        match &self.data {
            None => -1,
            Some(d) => {
                if line_doc_start >= self.lines_in_document() {
                    return -1;
                }
                if d.expanded.value_at(line_doc_start) == 0 {
                    line_doc_start
                } else {
                    let line_doc_next_change = d.expanded.end_run(line_doc_start);
                    if line_doc_next_change < self.lines_in_document() {
                        line_doc_next_change
                    } else {
                        -1
                    }
                }
            }
        }
    }

    /// Display height of `line_doc`.
    pub fn get_height(&self, line_doc: Position) -> Position {
        match &self.data {
            None => 1,
            Some(d) => d.heights.value_at(line_doc) as Position,
        }
    }

    /// Set the display height of `line_doc` (wrapped sub-lines). Returns
    /// whether it changed.
    pub fn set_height(&mut self, line_doc: Position, height: Position) -> bool {
        if height == 1 && self.one_to_one() {
            return false;
        }
        self.ensure_data();
        if line_doc >= self.lines_in_document() {
            return false;
        }
        if self.get_height(line_doc) != height {
            if self.get_visible(line_doc) {
                let d = self.data.as_mut().expect("full mode");
                let old = d.heights.value_at(line_doc) as Position;
                d.display_lines.insert_text(line_doc, height - old);
            }
            let d = self.data.as_mut().expect("full mode");
            d.heights.set_value_at(line_doc, height as i32);
            true
        } else {
            false
        }
    }

    /// Text shown in place of the contracted body of `line_doc`.
    pub fn get_fold_display_text(&self, line_doc: Position) -> Option<&str> {
        match &self.data {
            None => None,
            Some(d) => match d.fold_display_texts.at_ref(line_doc) {
                Some(Some(text)) => Some(text),
                _ => None,
            },
        }
    }

    /// Attach display text to the fold at `line_doc`. Returns whether it
    /// changed.
    pub fn set_fold_display_text(&mut self, line_doc: Position, text: Option<&str>) -> bool {
        self.ensure_data();
        let current = self.get_fold_display_text(line_doc);
        if current == text {
            return false;
        }
        let d = self.data.as_mut().expect("full mode");
        d.fold_display_texts
            .set_value_at(line_doc, text.map(|t| Box::new(t.to_string())));
        true
    }

    /// Expand every fold point and show every line. Returns whether
    /// anything changed.
    pub fn expand_all(&mut self) -> bool {
        if self.one_to_one() {
            return false;
        }
        let lines = self.lines_in_document();
        let mut changed = false;
        for line in 0..lines {
            changed |= self.set_expanded(line, true);
        }
        changed |= self.set_visible(0, lines - 1, true);
        changed
    }

    #[cfg(debug_assertions)]
    pub(crate) fn check(&self) {
        if let Some(d) = &self.data {
            let mut display = 0;
            for line in 0..self.lines_in_document() {
                assert_eq!(
                    d.display_lines.position_from_partition(line),
                    display,
                    "display line cache out of step at line {line}"
                );
                if d.visible.value_at(line) == 1 {
                    display += d.heights.value_at(line) as Position;
                }
            }
            assert_eq!(
                d.display_lines.position_from_partition(self.lines_in_document()),
                display,
                "display line total out of step"
            );
        }
    }
}
