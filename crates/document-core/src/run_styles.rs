//! Run-length-coded map from position ranges to values.
//!
//! A [`RunStyles`] pairs a [`Partitioning`] with one value per run. Adjacent
//! runs always carry different values and interior runs are never empty;
//! mutation maintains both by splitting at write boundaries and merging runs
//! that become equal. Decorations, folding visibility, and display heights
//! are all run maps.

use crate::Position;
use crate::partitioning::Partitioning;
use crate::split_vector::SplitVector;

/// Outcome of [`RunStyles::fill_range`]: the sub-range whose values actually
/// changed, after trimming writes that would have been redundant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillResult {
    /// First position whose value changed.
    pub position: Position,
    /// Number of changed positions.
    pub fill_length: Position,
}

/// Map from positions to values, stored as runs.
#[derive(Debug)]
pub struct RunStyles<V: Copy + Default + PartialEq> {
    starts: Partitioning,
    styles: SplitVector<V>,
}

impl<V: Copy + Default + PartialEq> Default for RunStyles<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Copy + Default + PartialEq> RunStyles<V> {
    /// Create an empty map of length zero.
    pub fn new() -> Self {
        let mut rs = Self {
            starts: Partitioning::new(),
            styles: SplitVector::with_grow_size(8),
        };
        rs.styles.insert_value(0, 2, V::default());
        rs
    }

    fn run_from_position(&self, position: Position) -> Position {
        self.starts.partition_from_position(position)
    }

    /// Split the run containing `position` so a run boundary falls exactly
    /// at `position`, and return the run starting there.
    fn split_run(&mut self, position: Position) -> Position {
        let mut run = self.run_from_position(position);
        let pos_run = self.starts.position_from_partition(run);
        if pos_run < position {
            let run_style = self.value_at(position);
            run += 1;
            self.starts.insert_partition(run, position);
            self.styles.insert_value(run, 1, run_style);
        }
        run
    }

    fn remove_run(&mut self, run: Position) {
        self.starts.remove_partition(run);
        self.styles.delete_at(run);
    }

    fn remove_run_if_empty(&mut self, run: Position) {
        if run < self.starts.partitions() && self.starts.partitions() > 1 {
            if self.starts.position_from_partition(run)
                == self.starts.position_from_partition(run + 1)
            {
                self.remove_run(run);
            }
        }
    }

    fn remove_run_if_same_as_previous(&mut self, run: Position) {
        if run > 0 && run < self.starts.partitions() {
            if self.styles.value_at(run - 1) == self.styles.value_at(run) {
                self.remove_run(run);
            }
        }
    }

    /// Total length covered.
    pub fn len(&self) -> Position {
        self.starts.position_from_partition(self.starts.partitions())
    }

    /// Whether the covered length is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of the run containing `position`.
    pub fn value_at(&self, position: Position) -> V {
        self.styles.value_at(self.run_from_position(position))
    }

    /// First position after `position` where the value changes, or a value
    /// past `end` when there is no change before `end`.
    pub fn find_next_change(&self, position: Position, end: Position) -> Position {
        let run = self.run_from_position(position);
        if run < self.starts.partitions() {
            let run_change = self.starts.position_from_partition(run);
            if run_change > position {
                return run_change;
            }
            let next_change = self.starts.position_from_partition(run + 1);
            if next_change > position {
                next_change
            } else if position < end {
                end
            } else {
                end + 1
            }
        } else {
            end + 1
        }
    }

    /// Start position of the run containing `position`.
    pub fn start_run(&self, position: Position) -> Position {
        self.starts.position_from_partition(self.run_from_position(position))
    }

    /// End position of the run containing `position`.
    pub fn end_run(&self, position: Position) -> Position {
        self.starts.position_from_partition(self.run_from_position(position) + 1)
    }

    /// Set `[position, position + fill_length)` to `value`. Returns the
    /// sub-range that actually changed, or `None` when every position
    /// already had `value`.
    pub fn fill_range(
        &mut self,
        position: Position,
        value: V,
        fill_length: Position,
    ) -> Option<FillResult> {
        if fill_length <= 0 || position < 0 {
            return None;
        }
        let mut position = position;
        let mut fill_length = fill_length;
        let mut end = position + fill_length;
        if end > self.len() {
            return None;
        }
        let mut run_end = self.run_from_position(end);
        if self.styles.value_at(run_end) == value {
            // End already has the value, so trim the range.
            end = self.starts.position_from_partition(run_end);
            if position >= end {
                // Whole range already has the value.
                return None;
            }
            fill_length = end - position;
        } else {
            run_end = self.split_run(end);
        }
        let mut run_start = self.run_from_position(position);
        if self.styles.value_at(run_start) == value {
            // Start already has the value, so trim the range.
            run_start += 1;
            position = self.starts.position_from_partition(run_start);
            fill_length = end - position;
        } else if self.starts.position_from_partition(run_start) < position {
            run_start = self.split_run(position);
            run_end += 1;
        }
        if run_start < run_end {
            self.styles.set_value_at(run_start, value);
            // Remove the old runs the fill covered.
            let removals = run_end - run_start - 1;
            for _ in 0..removals {
                self.remove_run(run_start + 1);
            }
            let run_after = self.run_from_position(end);
            self.remove_run_if_same_as_previous(run_after);
            self.remove_run_if_same_as_previous(run_start);
            let run_after = self.run_from_position(end);
            self.remove_run_if_empty(run_after);
            self.check();
            Some(FillResult { position, fill_length })
        } else {
            None
        }
    }

    /// Set the single position `position` to `value`.
    pub fn set_value_at(&mut self, position: Position, value: V) {
        self.fill_range(position, value, 1);
    }

    /// Open a hole of `insert_length` at `position`, extending the run the
    /// insertion lands in (or the previous run at a boundary, so a valued
    /// run does not silently grow).
    pub fn insert_space(&mut self, position: Position, insert_length: Position) {
        if insert_length <= 0 {
            return;
        }
        let run_start = self.run_from_position(position);
        if self.starts.position_from_partition(run_start) == position {
            let run_style = self.value_at(position);
            if run_start == 0 {
                // Inserting at the start of the sequence must leave the new
                // space unvalued.
                if run_style != V::default() {
                    self.starts.insert_partition(0, 0);
                    self.styles.insert(0, V::default());
                }
                self.starts.insert_text(0, insert_length);
            } else if run_style != V::default() {
                self.starts.insert_text(run_start - 1, insert_length);
            } else {
                // Insert at the end of the previous run so the valued run
                // does not extend over the new space.
                self.starts.insert_text(run_start, insert_length);
            }
        } else {
            self.starts.insert_text(run_start, insert_length);
        }
        self.check();
    }

    /// Remove `[position, position + delete_length)`.
    pub fn delete_range(&mut self, position: Position, delete_length: Position) {
        if delete_length <= 0 || position < 0 || position + delete_length > self.len() {
            return;
        }
        let end = position + delete_length;
        let run_start = self.run_from_position(position);
        let run_end = self.run_from_position(end);
        if run_start == run_end {
            // Deleting from inside one run.
            self.starts.insert_text(run_start, -delete_length);
            self.remove_run_if_empty(run_start);
        } else {
            let run_start = self.split_run(position);
            let run_end = self.split_run(end);
            self.starts.insert_text(run_start, -delete_length);
            let mut run = run_start;
            while run < run_end {
                self.remove_run(run_start);
                run += 1;
            }
            self.remove_run_if_empty(run_start);
            self.remove_run_if_same_as_previous(run_start);
        }
        self.check();
    }

    /// Remove everything, returning to length zero.
    pub fn delete_all(&mut self) {
        self.starts.delete_all();
        self.styles.delete_all();
        self.styles.insert_value(0, 2, V::default());
    }

    /// Number of runs.
    pub fn runs(&self) -> Position {
        self.starts.partitions()
    }

    /// Whether every position carries the same value.
    pub fn all_same(&self) -> bool {
        for run in 1..self.starts.partitions() {
            if self.styles.value_at(run) != self.styles.value_at(run - 1) {
                return false;
            }
        }
        true
    }

    /// Whether every position carries exactly `value`.
    pub fn all_same_as(&self, value: V) -> bool {
        self.all_same() && self.styles.value_at(0) == value
    }

    /// First position at or after `start` whose value is `value`, or -1.
    pub fn find(&self, value: V, start: Position) -> Position {
        if start < self.len() {
            let mut run = if start > 0 { self.run_from_position(start) } else { 0 };
            if self.styles.value_at(run) == value {
                return start;
            }
            run += 1;
            while run < self.starts.partitions() {
                if self.styles.value_at(run) == value {
                    return self.starts.position_from_partition(run);
                }
                run += 1;
            }
        }
        -1
    }

    #[cfg(debug_assertions)]
    fn check(&self) {
        self.starts.check();
        for run in 1..self.starts.partitions() {
            assert!(
                self.styles.value_at(run) != self.styles.value_at(run - 1),
                "adjacent runs must differ"
            );
            assert!(
                self.starts.position_from_partition(run)
                    > self.starts.position_from_partition(run - 1),
                "interior runs must not be empty"
            );
        }
    }

    #[cfg(not(debug_assertions))]
    fn check(&self) {}
}
