//! Ordered position partitioning.
//!
//! A [`Partitioning`] divides `[0, total)` into runs by keeping the start
//! position of each partition in a [`SplitVector`]. Shifting every partition
//! after an edit point would be O(partitions) per edit, so the shift is kept
//! as a pending `step`: partitions after `step_partition` are stored
//! `step_length` short of their true position. Lookups add the step back;
//! edits move or flush it.
//!
//! The line index and every run-length map in the engine are partitionings.

use std::cell::Cell;

use crate::Position;
use crate::split_vector::SplitVector;

/// How far from the current step a new edit may land while still being
/// absorbed by walking the step backwards instead of flushing it.
const BACK_STEP_DISTANCE: Position = 10;

/// Sorted sequence of partition start positions with O(log n) lookups and
/// O(1) amortised shifting on edits.
#[derive(Debug)]
pub struct Partitioning {
    body: SplitVector<Position>,
    step_partition: Position,
    step_length: Position,
    last_lookup: Cell<Position>,
}

impl Default for Partitioning {
    fn default() -> Self {
        Self::new()
    }
}

impl Partitioning {
    /// Create a partitioning holding the single empty partition `[0, 0)`.
    pub fn new() -> Self {
        let mut p = Self {
            body: SplitVector::with_grow_size(8),
            step_partition: 0,
            step_length: 0,
            last_lookup: Cell::new(0),
        };
        p.allocate();
        p
    }

    fn allocate(&mut self) {
        self.body.delete_all();
        self.step_partition = 0;
        self.step_length = 0;
        self.last_lookup.set(0);
        self.body.insert(0, 0); // first partition
        self.body.insert(1, 0); // sentinel: total length
    }

    /// Number of partitions.
    pub fn partitions(&self) -> Position {
        self.body.len() - 1
    }

    fn apply_step(&mut self, partition_up_to: Position) {
        if self.step_length != 0 {
            for i in self.step_partition + 1..=partition_up_to {
                self.body.set_value_at(i, self.body.value_at(i) + self.step_length);
            }
        }
        self.step_partition = partition_up_to;
        if self.step_partition >= self.body.len() - 1 {
            self.step_partition = self.partitions();
            self.step_length = 0;
        }
    }

    fn back_step(&mut self, partition_down_to: Position) {
        if self.step_length != 0 {
            let mut i = self.step_partition;
            while i > partition_down_to {
                self.body.set_value_at(i, self.body.value_at(i) - self.step_length);
                i -= 1;
            }
        }
        self.step_partition = partition_down_to;
    }

    /// Split partition `partition` so a new partition starts at `pos`.
    pub fn insert_partition(&mut self, partition: Position, pos: Position) {
        if self.step_partition < partition {
            self.apply_step(partition);
        }
        self.body.insert(partition, pos);
        self.step_partition += 1;
    }

    /// Insert several partitions at once, all starting from `positions`.
    pub fn insert_partitions(&mut self, partition: Position, positions: &[Position]) {
        if self.step_partition < partition {
            self.apply_step(partition);
        }
        self.body
            .insert_from_array(partition, positions, 0, positions.len() as Position);
        self.step_partition += positions.len() as Position;
    }

    /// Reset the stored start of `partition` to `pos`.
    pub fn set_partition_start_position(&mut self, partition: Position, pos: Position) {
        self.apply_step(partition + 1);
        if partition < 0 || partition > self.body.len() {
            return;
        }
        self.body.set_value_at(partition, pos);
    }

    /// Shift every partition after `partition_insert` by `delta`.
    pub fn insert_text(&mut self, partition_insert: Position, delta: Position) {
        if self.step_length != 0 {
            if partition_insert >= self.step_partition {
                // Fill in up to the new insertion point.
                self.apply_step(partition_insert);
                self.step_length += delta;
            } else if partition_insert >= self.step_partition - BACK_STEP_DISTANCE {
                // Close to the step but before it, so move the step back.
                self.back_step(partition_insert);
                self.step_length += delta;
            } else {
                // Flush the pending step and start a new one here.
                self.apply_step(self.body.len() - 1);
                self.step_partition = partition_insert;
                self.step_length = delta;
            }
        } else {
            self.step_partition = partition_insert;
            self.step_length = delta;
        }
    }

    /// Merge `partition` into its predecessor.
    pub fn remove_partition(&mut self, partition: Position) {
        if partition > self.step_partition {
            self.apply_step(partition);
        }
        self.step_partition -= 1;
        self.body.delete_at(partition);
    }

    /// Start position of `partition` (0 when out of range).
    pub fn position_from_partition(&self, partition: Position) -> Position {
        if partition < 0 || partition >= self.body.len() {
            return 0;
        }
        let mut pos = self.body.value_at(partition);
        if partition > self.step_partition {
            pos += self.step_length;
        }
        pos
    }

    /// Partition containing `pos`. A position on a boundary belongs to the
    /// partition starting there. Always in `[0, partitions() - 1]`.
    pub fn partition_from_position(&self, pos: Position) -> Position {
        if self.body.len() <= 1 {
            return 0;
        }
        if pos >= self.position_from_partition(self.partitions()) {
            return self.partitions() - 1;
        }
        // Repeated lookups tend to land near each other, so try the cached
        // partition before the binary search.
        let cached = self.last_lookup.get();
        if cached >= 0
            && cached < self.partitions()
            && pos >= self.position_from_partition(cached)
            && pos < self.position_from_partition(cached + 1)
        {
            return cached;
        }
        let mut lower: Position = 0;
        let mut upper = self.partitions();
        while lower < upper {
            let middle = (upper + lower + 1) / 2; // round high
            let pos_middle = self.position_from_partition(middle);
            if pos < pos_middle {
                upper = middle - 1;
            } else {
                lower = middle;
            }
        }
        self.last_lookup.set(lower);
        lower
    }

    /// Remove every partition, returning to the single empty one.
    pub fn delete_all(&mut self) {
        self.allocate();
    }

    #[cfg(debug_assertions)]
    pub(crate) fn check(&self) {
        assert_eq!(self.position_from_partition(0), 0, "first partition must start at 0");
        for i in 1..self.body.len() {
            assert!(
                self.position_from_partition(i) >= self.position_from_partition(i - 1),
                "partition starts must be non-decreasing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn starts(p: &Partitioning) -> Vec<Position> {
        (0..=p.partitions()).map(|i| p.position_from_partition(i)).collect()
    }

    #[test]
    fn starts_with_one_empty_partition() {
        let p = Partitioning::new();
        assert_eq!(p.partitions(), 1);
        assert_eq!(starts(&p), vec![0, 0]);
    }

    #[test]
    fn insert_text_extends_following_partitions() {
        let mut p = Partitioning::new();
        p.insert_text(0, 10);
        assert_eq!(starts(&p), vec![0, 10]);
        p.insert_partition(1, 4);
        assert_eq!(starts(&p), vec![0, 4, 10]);
        p.insert_text(0, 2);
        assert_eq!(starts(&p), vec![0, 6, 12]);
        p.check();
    }

    #[test]
    fn partition_from_position_boundaries() {
        let mut p = Partitioning::new();
        p.insert_text(0, 12);
        p.insert_partition(1, 3);
        p.insert_partition(2, 7);
        // Partitions: [0,3) [3,7) [7,12)
        assert_eq!(p.partition_from_position(0), 0);
        assert_eq!(p.partition_from_position(2), 0);
        assert_eq!(p.partition_from_position(3), 1);
        assert_eq!(p.partition_from_position(6), 1);
        assert_eq!(p.partition_from_position(7), 2);
        assert_eq!(p.partition_from_position(11), 2);
        // Past the end clamps to the last partition.
        assert_eq!(p.partition_from_position(100), 2);
    }

    #[test]
    fn repeated_nearby_lookups_hit_cache() {
        let mut p = Partitioning::new();
        p.insert_text(0, 100);
        for i in 1..10 {
            p.insert_partition(i, i * 10);
        }
        for pos in 40..50 {
            assert_eq!(p.partition_from_position(pos), 4);
        }
    }

    #[test]
    fn insert_partitions_bulk() {
        let mut p = Partitioning::new();
        p.insert_text(0, 12);
        p.insert_partitions(1, &[3, 5, 9]);
        assert_eq!(starts(&p), vec![0, 3, 5, 9, 12]);
        p.insert_text(2, 4);
        assert_eq!(starts(&p), vec![0, 3, 5, 13, 16]);
        p.check();
    }

    #[test]
    fn remove_partition_merges() {
        let mut p = Partitioning::new();
        p.insert_text(0, 12);
        p.insert_partition(1, 3);
        p.insert_partition(2, 7);
        p.remove_partition(1);
        assert_eq!(starts(&p), vec![0, 7, 12]);
        p.check();
    }

    #[test]
    fn negative_delta_shrinks() {
        let mut p = Partitioning::new();
        p.insert_text(0, 20);
        p.insert_partition(1, 5);
        p.insert_text(0, -3);
        assert_eq!(starts(&p), vec![0, 2, 17]);
    }

    #[test]
    fn steps_far_apart_are_flushed() {
        let mut p = Partitioning::new();
        p.insert_text(0, 1000);
        for i in 1..100 {
            p.insert_partition(i, i * 10);
        }
        p.insert_text(90, 5);
        p.insert_text(2, 7); // far from the pending step
        assert_eq!(p.position_from_partition(1), 10);
        assert_eq!(p.position_from_partition(3), 37);
        assert_eq!(p.position_from_partition(91), 922);
        p.check();
    }

    #[test]
    fn set_partition_start_position_overrides() {
        let mut p = Partitioning::new();
        p.insert_text(0, 10);
        p.insert_partition(1, 4);
        p.set_partition_start_position(1, 5);
        assert_eq!(starts(&p), vec![0, 5, 10]);
    }

    #[test]
    fn delete_all_resets() {
        let mut p = Partitioning::new();
        p.insert_text(0, 10);
        p.insert_partition(1, 5);
        p.delete_all();
        assert_eq!(p.partitions(), 1);
        assert_eq!(starts(&p), vec![0, 0]);
    }
}
