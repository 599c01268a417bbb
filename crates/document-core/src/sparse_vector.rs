//! Sparse position-keyed storage.
//!
//! A [`SparseVector`] attaches at most one value to each position of a
//! length, with unvalued positions reading as `T::default()`. Only the
//! valued positions are stored: a [`Partitioning`] marks them and a parallel
//! vector holds the payloads. Per-line annotations and fold display texts
//! use this, with the line number as the position.

use crate::Position;
use crate::partitioning::Partitioning;
use crate::split_vector::SplitVector;

/// Map from positions to optional values; `T::default()` means absent.
#[derive(Debug)]
pub struct SparseVector<T: Clone + Default + PartialEq> {
    starts: Partitioning,
    values: SplitVector<T>,
}

impl<T: Clone + Default + PartialEq> Default for SparseVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Default + PartialEq> SparseVector<T> {
    /// Create an empty map of length zero.
    pub fn new() -> Self {
        let mut values = SplitVector::with_grow_size(8);
        values.insert_value(0, 2, T::default());
        Self { starts: Partitioning::new(), values }
    }

    /// Covered length.
    pub fn len(&self) -> Position {
        self.starts.position_from_partition(self.starts.partitions())
    }

    /// Whether the covered length is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored elements, counting the implicit empty first slot.
    pub fn elements(&self) -> Position {
        self.starts.partitions()
    }

    /// Value at `position`, `T::default()` for unvalued positions.
    pub fn value_at(&self, position: Position) -> T {
        self.at_ref(position).cloned().unwrap_or_default()
    }

    /// Borrow the value at `position` when one is stored there.
    pub fn at_ref(&self, position: Position) -> Option<&T> {
        if position < 0 || position >= self.len() {
            return None;
        }
        let partition = self.starts.partition_from_position(position);
        if self.starts.position_from_partition(partition) == position {
            self.values.at_ref(partition)
        } else {
            None
        }
    }

    /// Attach `value` to `position`. Setting `T::default()` removes any
    /// stored value.
    pub fn set_value_at(&mut self, position: Position, value: T) {
        if position < 0 || position >= self.len() {
            return;
        }
        let partition = self.starts.partition_from_position(position);
        let start_partition = self.starts.position_from_partition(partition);
        if value == T::default() {
            // Setting the empty value deletes the element.
            if position == start_partition {
                if partition == 0 {
                    self.values.set_value_at(0, T::default());
                } else {
                    self.values.delete_at(partition);
                    self.starts.remove_partition(partition);
                }
            }
        } else if position == start_partition {
            self.values.set_value_at(partition, value);
        } else {
            self.starts.insert_partition(partition + 1, position);
            self.values.insert(partition + 1, value);
        }
    }

    /// Open `insert_length` unvalued positions at `position`. A value stored
    /// exactly at `position` slides right with the positions after it.
    pub fn insert_space(&mut self, position: Position, insert_length: Position) {
        if insert_length <= 0 || position < 0 || position > self.len() {
            return;
        }
        let partition = self.starts.partition_from_position(position);
        let start_partition = self.starts.position_from_partition(partition);
        if start_partition == position && position < self.len() {
            let occupied = self.values.value_at(partition) != T::default();
            if partition == 0 {
                if occupied {
                    // Keep the start unvalued; the stored value moves right.
                    self.starts.insert_partition(0, 0);
                    self.values.insert(0, T::default());
                }
                self.starts.insert_text(0, insert_length);
            } else if occupied {
                self.starts.insert_text(partition - 1, insert_length);
            } else {
                self.starts.insert_text(partition, insert_length);
            }
        } else {
            self.starts.insert_text(partition, insert_length);
        }
    }

    /// Remove the single position `position`, discarding its value.
    pub fn delete_position(&mut self, position: Position) {
        if position < 0 || position >= self.len() {
            return;
        }
        let partition = self.starts.partition_from_position(position);
        let start_partition = self.starts.position_from_partition(partition);
        if start_partition == position {
            if partition == 0 {
                self.values.set_value_at(0, T::default());
                self.starts.insert_text(0, -1);
                // A value that was at position 1 now sits at 0; fold it into
                // the first slot.
                if self.starts.partitions() > 1 && self.starts.position_from_partition(1) == 0 {
                    let v = self.values.value_at(1);
                    self.values.set_value_at(0, v);
                    self.values.delete_at(1);
                    self.starts.remove_partition(1);
                }
            } else {
                self.values.delete_at(partition);
                self.starts.remove_partition(partition);
                self.starts.insert_text(partition - 1, -1);
                self.merge_if_collided(partition);
            }
        } else {
            self.starts.insert_text(partition, -1);
        }
    }

    /// Remove `[position, position + delete_length)` and every value inside.
    pub fn delete_range(&mut self, position: Position, delete_length: Position) {
        for _ in 0..delete_length {
            if position >= self.len() {
                break;
            }
            self.delete_position(position);
        }
    }

    /// Drop everything, returning to length zero.
    pub fn delete_all(&mut self) {
        self.starts.delete_all();
        self.values.delete_all();
        self.values.insert_value(0, 2, T::default());
    }

    fn merge_if_collided(&mut self, partition: Position) {
        // After a shift two partitions may share a start; keep the later
        // value which belongs to the surviving position.
        if partition > 0
            && partition < self.starts.partitions()
            && self.starts.position_from_partition(partition)
                == self.starts.position_from_partition(partition - 1)
        {
            let v = self.values.value_at(partition);
            self.values.set_value_at(partition - 1, v);
            self.values.delete_at(partition);
            self.starts.remove_partition(partition);
        }
    }
}
