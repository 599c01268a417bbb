//! Gap-buffered contiguous storage.
//!
//! [`SplitVector`] keeps its elements in one allocation split by a movable
//! gap. Edits at or near the gap are amortised O(1); moving the gap costs
//! O(distance). The text buffer, the style bytes, and every partitioning in
//! the engine sit on top of this one container.

use crate::Position;

/// A contiguous array with a movable gap.
///
/// The logical sequence is `body[0..part1_length]` followed by
/// `body[part1_length + gap_length..]`. Reads outside the logical range
/// return `T::default()` and out-of-range mutations are ignored; callers
/// rely on this for safe boundary probes (for example reading the byte
/// before position 0).
#[derive(Debug, Clone)]
pub struct SplitVector<T> {
    body: Vec<T>,
    part1_length: usize,
    gap_length: usize,
    grow_size: usize,
}

impl<T: Clone + Default> Default for SplitVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Default> SplitVector<T> {
    /// Create an empty vector with the default growth increment.
    pub fn new() -> Self {
        Self::with_grow_size(8)
    }

    /// Create an empty vector that grows in steps of at least `grow_size`.
    pub fn with_grow_size(grow_size: usize) -> Self {
        Self {
            body: Vec::new(),
            part1_length: 0,
            gap_length: 0,
            grow_size: grow_size.max(1),
        }
    }

    /// Logical element count.
    pub fn len(&self) -> Position {
        (self.body.len() - self.gap_length) as Position
    }

    /// Whether the logical sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn len_usize(&self) -> usize {
        self.body.len() - self.gap_length
    }

    /// Current start of the gap.
    pub fn gap_position(&self) -> Position {
        self.part1_length as Position
    }

    /// Move the gap so it starts at `position`.
    fn gap_to(&mut self, position: usize) {
        if position == self.part1_length {
            return;
        }
        let gap = self.gap_length;
        if gap == 0 {
            self.part1_length = position;
            return;
        }
        if position < self.part1_length {
            self.body[position..self.part1_length + gap].rotate_right(gap);
        } else {
            self.body[self.part1_length..position + gap].rotate_left(gap);
        }
        self.part1_length = position;
    }

    fn reallocate(&mut self, new_size: usize) {
        if new_size > self.body.len() {
            // Move the gap to the end so the new elements extend it.
            self.gap_to(self.len_usize());
            self.body.resize(new_size, T::default());
            self.gap_length = self.body.len() - self.part1_length;
        }
    }

    fn room_for(&mut self, insertion_length: usize) {
        if self.gap_length <= insertion_length {
            while self.grow_size < self.body.len() / 6 {
                self.grow_size *= 2;
            }
            self.reallocate(self.body.len() + insertion_length + self.grow_size);
        }
    }

    /// Element at `position`, `T::default()` when out of range.
    pub fn value_at(&self, position: Position) -> T {
        if position < 0 || position >= self.len() {
            return T::default();
        }
        let position = position as usize;
        if position < self.part1_length {
            self.body[position].clone()
        } else {
            self.body[position + self.gap_length].clone()
        }
    }

    /// Borrow the element at `position` without cloning.
    pub fn at_ref(&self, position: Position) -> Option<&T> {
        if position < 0 || position >= self.len() {
            return None;
        }
        let position = position as usize;
        if position < self.part1_length {
            Some(&self.body[position])
        } else {
            Some(&self.body[position + self.gap_length])
        }
    }

    /// Replace the element at `position`; ignored when out of range.
    pub fn set_value_at(&mut self, position: Position, value: T) {
        if position < 0 || position >= self.len() {
            return;
        }
        let position = position as usize;
        if position < self.part1_length {
            self.body[position] = value;
        } else {
            self.body[position + self.gap_length] = value;
        }
    }

    /// Insert `value` before `position`; ignored when out of range.
    pub fn insert(&mut self, position: Position, value: T) {
        if position < 0 || position > self.len() {
            return;
        }
        self.room_for(1);
        self.gap_to(position as usize);
        self.body[self.part1_length] = value;
        self.part1_length += 1;
        self.gap_length -= 1;
    }

    /// Insert `count` copies of `value` before `position`.
    pub fn insert_value(&mut self, position: Position, count: Position, value: T) {
        if count <= 0 || position < 0 || position > self.len() {
            return;
        }
        let count = count as usize;
        self.room_for(count);
        self.gap_to(position as usize);
        for slot in &mut self.body[self.part1_length..self.part1_length + count] {
            *slot = value.clone();
        }
        self.part1_length += count;
        self.gap_length -= count;
    }

    /// Insert `insert_length` elements from `source[position_from..]` before
    /// `position_to_insert`.
    pub fn insert_from_array(
        &mut self,
        position_to_insert: Position,
        source: &[T],
        position_from: usize,
        insert_length: Position,
    ) {
        if insert_length <= 0 || position_to_insert < 0 || position_to_insert > self.len() {
            return;
        }
        let insert_length = insert_length as usize;
        self.room_for(insert_length);
        self.gap_to(position_to_insert as usize);
        self.body[self.part1_length..self.part1_length + insert_length]
            .clone_from_slice(&source[position_from..position_from + insert_length]);
        self.part1_length += insert_length;
        self.gap_length -= insert_length;
    }

    /// Remove the element at `position`; ignored when out of range.
    pub fn delete_at(&mut self, position: Position) {
        self.delete_range(position, 1);
    }

    /// Remove `delete_length` elements starting at `position`.
    pub fn delete_range(&mut self, position: Position, delete_length: Position) {
        if position < 0 || delete_length <= 0 || position + delete_length > self.len() {
            return;
        }
        let delete_length = delete_length as usize;
        if position == 0 && delete_length == self.len_usize() {
            self.delete_all();
            return;
        }
        self.gap_to(position as usize);
        // Deleted slots join the gap; reset them so owned payloads drop now.
        for slot in
            &mut self.body[self.part1_length + self.gap_length
                ..self.part1_length + self.gap_length + delete_length]
        {
            *slot = T::default();
        }
        self.gap_length += delete_length;
    }

    /// Remove everything and release the storage.
    pub fn delete_all(&mut self) {
        self.body = Vec::new();
        self.part1_length = 0;
        self.gap_length = 0;
    }

    /// Contiguous view of `range_length` elements starting at `position`,
    /// moving the gap out of the way first when the range straddles it.
    /// Invalidated by any subsequent mutation (enforced by the borrow).
    pub fn range_slice(&mut self, position: Position, range_length: Position) -> &[T] {
        if position < 0 || range_length <= 0 || position + range_length > self.len() {
            return &[];
        }
        let position = position as usize;
        let range_length = range_length as usize;
        if position < self.part1_length && position + range_length > self.part1_length {
            self.gap_to(position + range_length);
        }
        if position < self.part1_length {
            &self.body[position..position + range_length]
        } else {
            &self.body[position + self.gap_length..position + self.gap_length + range_length]
        }
    }

    /// The whole logical sequence as one slice, moving the gap to the end.
    pub fn buffer_slice(&mut self) -> &[T] {
        self.gap_to(self.len_usize());
        &self.body[..self.part1_length]
    }

    /// Copy `out.len()` elements starting at `position` into `out` without
    /// moving the gap. Out-of-range tails are filled with `T::default()`.
    pub fn copy_range(&self, position: Position, out: &mut [T]) {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.value_at(position + i as Position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(sv: &SplitVector<i32>) -> Vec<i32> {
        (0..sv.len()).map(|i| sv.value_at(i)).collect()
    }

    #[test]
    fn starts_empty() {
        let sv: SplitVector<i32> = SplitVector::new();
        assert_eq!(sv.len(), 0);
        assert!(sv.is_empty());
        assert_eq!(sv.value_at(0), 0);
        assert_eq!(sv.value_at(-1), 0);
    }

    #[test]
    fn insert_and_read_back() {
        let mut sv = SplitVector::new();
        for i in 0..10 {
            sv.insert(i, i as i32 * 2);
        }
        assert_eq!(contents(&sv), vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);
    }

    #[test]
    fn insert_at_front_moves_gap() {
        let mut sv = SplitVector::new();
        sv.insert(0, 3);
        sv.insert(0, 2);
        sv.insert(0, 1);
        assert_eq!(contents(&sv), vec![1, 2, 3]);
    }

    #[test]
    fn insert_value_fills() {
        let mut sv = SplitVector::new();
        sv.insert_value(0, 5, 7);
        sv.insert_value(2, 2, 9);
        assert_eq!(contents(&sv), vec![7, 7, 9, 9, 7, 7, 7]);
    }

    #[test]
    fn insert_from_array_copies_subrange() {
        let mut sv = SplitVector::new();
        sv.insert_from_array(0, &[1, 2, 3, 4, 5], 1, 3);
        assert_eq!(contents(&sv), vec![2, 3, 4]);
    }

    #[test]
    fn delete_range_middle() {
        let mut sv = SplitVector::new();
        sv.insert_from_array(0, &[1, 2, 3, 4, 5], 0, 5);
        sv.delete_range(1, 3);
        assert_eq!(contents(&sv), vec![1, 5]);
    }

    #[test]
    fn delete_everything_releases() {
        let mut sv = SplitVector::new();
        sv.insert_value(0, 100, 1);
        sv.delete_range(0, 100);
        assert_eq!(sv.len(), 0);
        sv.insert(0, 42);
        assert_eq!(contents(&sv), vec![42]);
    }

    #[test]
    fn out_of_range_mutations_are_ignored() {
        let mut sv = SplitVector::new();
        sv.insert_value(0, 3, 1);
        sv.insert(5, 9);
        sv.set_value_at(3, 9);
        sv.set_value_at(-1, 9);
        sv.delete_range(2, 5);
        assert_eq!(contents(&sv), vec![1, 1, 1]);
    }

    #[test]
    fn range_slice_straddling_gap() {
        let mut sv = SplitVector::new();
        sv.insert_from_array(0, &[1, 2, 3, 4, 5, 6], 0, 6);
        // Leave the gap in the middle.
        sv.delete_range(3, 1);
        sv.insert(3, 40);
        assert_eq!(sv.range_slice(1, 4), &[2, 3, 40, 5]);
    }

    #[test]
    fn buffer_slice_sees_whole_sequence() {
        let mut sv = SplitVector::new();
        sv.insert_from_array(0, &[9, 8, 7], 0, 3);
        sv.insert(1, 5);
        assert_eq!(sv.buffer_slice(), &[9, 5, 8, 7]);
    }

    #[test]
    fn copy_range_pads_with_default() {
        let mut sv = SplitVector::new();
        sv.insert_from_array(0, &[1, 2], 0, 2);
        let mut out = [99; 4];
        sv.copy_range(1, &mut out);
        assert_eq!(out, [2, 0, 0, 0]);
    }

    #[test]
    fn works_with_owned_payloads() {
        let mut sv: SplitVector<Option<Box<String>>> = SplitVector::new();
        sv.insert(0, Some(Box::new("a".into())));
        sv.insert(1, None);
        sv.insert(1, Some(Box::new("b".into())));
        assert_eq!(sv.at_ref(0).unwrap().as_deref().map(String::as_str), Some("a"));
        assert_eq!(sv.at_ref(1).unwrap().as_deref().map(String::as_str), Some("b"));
        sv.delete_at(0);
        assert_eq!(sv.at_ref(0).unwrap().as_deref().map(String::as_str), Some("b"));
    }

    #[test]
    fn growth_survives_many_scattered_inserts() {
        let mut sv = SplitVector::with_grow_size(4);
        for i in 0..1000 {
            sv.insert((i % 7).min(sv.len()), i as i32);
        }
        assert_eq!(sv.len(), 1000);
    }
}
