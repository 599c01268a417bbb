//! Coalescing undo history.
//!
//! The history is a flat sequence of action slots delimited by `Start`
//! records: one user-visible undo step is the run of actions between two
//! `Start`s. Single-character typing and deleting coalesce into the
//! previous record when positions are adjacent, so undo matches the user's
//! idea of "that word I just typed". A save point marks the state that
//! equals the container's on-disk copy, and a tentative point lets an input
//! method roll back a whole composition as one unit.

use crate::Position;

/// Kind of a recorded action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionKind {
    /// Bytes were inserted; `data` holds them.
    Insert,
    /// Bytes were removed; `data` holds them.
    Remove,
    /// Step delimiter; carries no payload.
    #[default]
    Start,
    /// Container-defined action; `position` carries the container's token.
    Container,
}

/// One recorded action.
#[derive(Debug, Clone, Default)]
pub struct Action {
    /// What happened.
    pub at: ActionKind,
    /// Whether a following action may merge into this one.
    pub may_coalesce: bool,
    /// Byte position of the change (or the token for `Container`).
    pub position: Position,
    /// The inserted or removed bytes.
    pub data: Vec<u8>,
    /// Length of the change in bytes.
    pub len_data: Position,
}

impl Action {
    fn create(
        &mut self,
        at: ActionKind,
        position: Position,
        data: &[u8],
        len_data: Position,
        may_coalesce: bool,
    ) {
        self.at = at;
        self.position = position;
        self.data.clear();
        self.data.extend_from_slice(data);
        self.len_data = len_data;
        self.may_coalesce = may_coalesce;
    }

    fn create_start(&mut self) {
        self.create(ActionKind::Start, 0, &[], 0, true);
    }
}

/// Sequence of actions with coalescing, grouping, save point and tentative
/// mode.
#[derive(Debug)]
pub struct UndoHistory {
    actions: Vec<Action>,
    max_action: usize,
    current_action: usize,
    undo_sequence_depth: i32,
    save_point: isize,
    tentative_point: isize,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoHistory {
    /// Create an empty history positioned at its save point.
    pub fn new() -> Self {
        let mut uh = Self {
            actions: vec![Action::default(); 3],
            max_action: 0,
            current_action: 0,
            undo_sequence_depth: 0,
            save_point: 0,
            tentative_point: -1,
        };
        uh.actions[0].create_start();
        uh
    }

    fn ensure_undo_room(&mut self) {
        if self.current_action + 2 >= self.actions.len() {
            self.actions.resize(self.actions.len() * 2, Action::default());
        }
    }

    /// Record an action. Returns whether this began a new undo step together
    /// with the index of the stored record (whose `data` holds the payload).
    pub fn append_action(
        &mut self,
        at: ActionKind,
        position: Position,
        data: &[u8],
        length: Position,
        may_coalesce: bool,
    ) -> (bool, usize) {
        self.ensure_undo_room();
        if (self.current_action as isize) < self.save_point {
            // The branch holding the save point is being overwritten, so the
            // saved state becomes unreachable.
            self.save_point = -1;
        }
        let old_current_action = self.current_action;
        if self.current_action >= 1 {
            if self.undo_sequence_depth == 0 {
                // Top level actions may not always be coalesced.
                let mut target = self.current_action as isize - 1;
                // Container actions may forward the coalesce state.
                while target > 0
                    && self.actions[target as usize].at == ActionKind::Container
                    && self.actions[target as usize].may_coalesce
                {
                    target -= 1;
                }
                let prev = &self.actions[target as usize];
                if self.current_action as isize == self.save_point
                    || self.current_action as isize == self.tentative_point
                {
                    self.current_action += 1;
                } else if !self.actions[self.current_action].may_coalesce {
                    // The trailing start was marked by an explicit group.
                    self.current_action += 1;
                } else if !may_coalesce || !prev.may_coalesce {
                    self.current_action += 1;
                } else if at == ActionKind::Container || prev.at == ActionKind::Container {
                    // A coalescible container action.
                } else if at != prev.at && prev.at != ActionKind::Start {
                    self.current_action += 1;
                } else if at == ActionKind::Insert
                    && position != prev.position + prev.len_data
                {
                    // Insertions must be immediately after to coalesce.
                    self.current_action += 1;
                } else if at == ActionKind::Remove {
                    if length == 1 || length == 2 {
                        if position + length == prev.position {
                            // Backspace.
                        } else if position == prev.position {
                            // Forward delete.
                        } else {
                            // Removals must be adjacent to coalesce.
                            self.current_action += 1;
                        }
                    } else {
                        // Removals must be of one character to coalesce.
                        self.current_action += 1;
                    }
                }
            } else {
                // Actions within a group always coalesce unless the record
                // after returning to the top level says otherwise.
                if !self.actions[self.current_action].may_coalesce {
                    self.current_action += 1;
                }
            }
        } else {
            self.current_action += 1;
        }
        let start_sequence = old_current_action != self.current_action;
        let action_with_data = self.current_action;
        self.actions[action_with_data].create(at, position, data, length, may_coalesce);
        self.current_action += 1;
        self.actions[self.current_action].create_start();
        self.max_action = self.current_action;
        (start_sequence, action_with_data)
    }

    /// Borrow a recorded action by index (as returned by `append_action`).
    pub fn action_at(&self, index: usize) -> &Action {
        &self.actions[index]
    }

    /// Open an explicit grouping level.
    pub fn begin_undo_action(&mut self) {
        self.ensure_undo_room();
        if self.undo_sequence_depth == 0 {
            if self.actions[self.current_action].at != ActionKind::Start {
                self.current_action += 1;
                self.actions[self.current_action].create_start();
                self.max_action = self.current_action;
            }
            self.actions[self.current_action].may_coalesce = false;
        }
        self.undo_sequence_depth += 1;
    }

    /// Close a grouping level; coalescing resumes only at the outermost
    /// close.
    pub fn end_undo_action(&mut self) {
        debug_assert!(self.undo_sequence_depth > 0, "unbalanced end_undo_action");
        self.ensure_undo_room();
        self.undo_sequence_depth -= 1;
        if self.undo_sequence_depth == 0 {
            if self.actions[self.current_action].at != ActionKind::Start {
                self.current_action += 1;
                self.actions[self.current_action].create_start();
                self.max_action = self.current_action;
            }
            self.actions[self.current_action].may_coalesce = false;
        }
    }

    /// Nesting depth of explicit groups.
    pub fn undo_sequence_depth(&self) -> i32 {
        self.undo_sequence_depth
    }

    /// Forget everything.
    pub fn delete_undo_history(&mut self) {
        for action in &mut self.actions {
            *action = Action::default();
        }
        self.max_action = 0;
        self.current_action = 0;
        self.actions[0].create_start();
        self.save_point = 0;
        self.tentative_point = -1;
    }

    /// Mark the current state as matching the container's saved copy.
    pub fn set_save_point(&mut self) {
        self.save_point = self.current_action as isize;
    }

    /// Whether the current state is the saved one.
    pub fn is_save_point(&self) -> bool {
        self.save_point == self.current_action as isize
    }

    /// Whether undoing further would move before the save point (or the
    /// save point is unreachable), meaning the document stays dirty.
    pub fn before_save_point(&self) -> bool {
        self.save_point < 0 || self.save_point > self.current_action as isize
    }

    /// Begin a tentative (composition) sequence.
    pub fn tentative_start(&mut self) {
        self.tentative_point = self.current_action as isize;
    }

    /// Accept the tentative sequence; the composition can no longer be
    /// rolled back wholesale and any redo tail is discarded.
    pub fn tentative_commit(&mut self) {
        self.tentative_point = -1;
        // Truncate undo history.
        self.max_action = self.current_action;
    }

    /// Whether a tentative sequence is open.
    pub fn tentative_active(&self) -> bool {
        self.tentative_point >= 0
    }

    /// Number of steps recorded since the tentative start, or -1 when no
    /// tentative sequence is open.
    pub fn tentative_steps(&mut self) -> i32 {
        // Drop any trailing start.
        if self.actions[self.current_action].at == ActionKind::Start && self.current_action > 0 {
            self.current_action -= 1;
        }
        if self.tentative_point >= 0 {
            (self.current_action as isize - self.tentative_point) as i32
        } else {
            -1
        }
    }

    /// Whether any step can be undone.
    pub fn can_undo(&self) -> bool {
        self.current_action > 0 && self.max_action > 0
    }

    /// Begin undoing one step: position before it and return how many
    /// actions it holds. Follow with `undo_step`/`completed_undo_step` that
    /// many times.
    pub fn start_undo(&mut self) -> i32 {
        // Drop any trailing start.
        if self.actions[self.current_action].at == ActionKind::Start && self.current_action > 0 {
            self.current_action -= 1;
        }
        let mut act = self.current_action as isize;
        while act > 0 && self.actions[act as usize].at != ActionKind::Start {
            act -= 1;
        }
        (self.current_action as isize - act) as i32
    }

    /// The action to invert next while undoing.
    pub fn undo_step(&self) -> &Action {
        &self.actions[self.current_action]
    }

    /// Mark the current undo action as applied.
    pub fn completed_undo_step(&mut self) {
        self.current_action -= 1;
    }

    /// Whether any step can be redone.
    pub fn can_redo(&self) -> bool {
        self.max_action > self.current_action
    }

    /// Begin redoing one step, mirroring `start_undo`.
    pub fn start_redo(&mut self) -> i32 {
        // Drop any leading start.
        if self.current_action < self.max_action
            && self.actions[self.current_action].at == ActionKind::Start
        {
            self.current_action += 1;
        }
        let mut act = self.current_action;
        while act < self.max_action && self.actions[act].at != ActionKind::Start {
            act += 1;
        }
        (act - self.current_action) as i32
    }

    /// The action to re-apply next while redoing.
    pub fn redo_step(&self) -> &Action {
        &self.actions[self.current_action]
    }

    /// Mark the current redo action as applied.
    pub fn completed_redo_step(&mut self) {
        self.current_action += 1;
    }
}
