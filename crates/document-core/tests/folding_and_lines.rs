use std::cell::RefCell;
use std::rc::Rc;

use document_core::{
    ContractionState, DocModification, DocWatcher, Document, FOLD_LEVEL_BASE,
    FOLD_LEVEL_HEADER_FLAG, FOLD_LEVEL_WHITE_FLAG, MOD_CHANGEANNOTATION, MOD_CHANGEFOLD,
    MOD_CHANGELINESTATE, MOD_CHANGEMARKER, Position,
};

fn doc_with_lines(n: usize) -> Document {
    let mut doc = Document::new();
    let text = (0..n).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
    doc.insert_string(0, text.as_bytes());
    doc
}

#[test]
fn fold_parent_and_last_child() {
    // Levels: 0 header, 1..2 children, 3 header, 4 child.
    let mut doc = doc_with_lines(5);
    doc.set_level(0, FOLD_LEVEL_BASE | FOLD_LEVEL_HEADER_FLAG);
    doc.set_level(1, FOLD_LEVEL_BASE + 1);
    doc.set_level(2, FOLD_LEVEL_BASE + 1);
    doc.set_level(3, FOLD_LEVEL_BASE | FOLD_LEVEL_HEADER_FLAG);
    doc.set_level(4, FOLD_LEVEL_BASE + 1);

    assert_eq!(doc.get_last_child(0, FOLD_LEVEL_BASE, -1), 2);
    assert_eq!(doc.get_last_child(0, -1, -1), 2);
    assert_eq!(doc.get_fold_parent(2), 0);
    assert_eq!(doc.get_fold_parent(4), 3);
    assert_eq!(doc.get_fold_parent(0), -1);
    assert_eq!(doc.get_last_child(3, -1, -1), 4);
}

#[test]
fn whitespace_lines_share_the_fold() {
    let mut doc = doc_with_lines(5);
    doc.set_level(0, FOLD_LEVEL_BASE | FOLD_LEVEL_HEADER_FLAG);
    doc.set_level(1, FOLD_LEVEL_BASE + 1);
    doc.set_level(2, FOLD_LEVEL_BASE | FOLD_LEVEL_WHITE_FLAG);
    doc.set_level(3, FOLD_LEVEL_BASE + 1);
    doc.set_level(4, FOLD_LEVEL_BASE);
    // The white line between children belongs to the fold.
    assert_eq!(doc.get_last_child(0, -1, -1), 3);
}

#[test]
fn set_level_notifies_with_both_levels() {
    #[derive(Default)]
    struct FoldWatcher {
        changes: Vec<(Position, i32, i32)>,
    }
    impl DocWatcher for FoldWatcher {
        fn notify_modified(&mut self, _doc: &mut Document, mh: &DocModification<'_>) {
            if mh.modification_type & MOD_CHANGEFOLD != 0 {
                self.changes.push((mh.line, mh.fold_level_now, mh.fold_level_prev));
            }
        }
    }

    let mut doc = doc_with_lines(3);
    let watcher = Rc::new(RefCell::new(FoldWatcher::default()));
    doc.add_watcher(watcher.clone(), 0);
    doc.set_level(1, FOLD_LEVEL_BASE + 2);
    // Setting the same level again does not notify.
    doc.set_level(1, FOLD_LEVEL_BASE + 2);
    let w = watcher.borrow();
    assert_eq!(w.changes, vec![(1, FOLD_LEVEL_BASE + 2, FOLD_LEVEL_BASE)]);
}

#[test]
fn highlight_delimiters_describe_the_block() {
    let mut doc = doc_with_lines(6);
    doc.set_level(0, FOLD_LEVEL_BASE | FOLD_LEVEL_HEADER_FLAG);
    doc.set_level(1, FOLD_LEVEL_BASE + 1);
    doc.set_level(2, FOLD_LEVEL_BASE + 1);
    doc.set_level(3, FOLD_LEVEL_BASE + 1);
    doc.set_level(4, FOLD_LEVEL_BASE);
    doc.set_level(5, FOLD_LEVEL_BASE);

    let hd = doc.get_highlight_delimiters(2, 5);
    assert_eq!(hd.begin_fold_block, 0);
    assert_eq!(hd.end_fold_block, 3);
    assert!(hd.is_fold_block_highlighted(1));
    assert!(hd.is_head_of_fold_block(0));
    assert!(hd.is_tail_of_fold_block(3));
    assert!(!hd.is_fold_block_highlighted(4));
}

#[test]
fn markers_move_with_their_lines() {
    let mut doc = doc_with_lines(4);
    let handle = doc.add_mark(2, 3);
    assert!(handle > 0);
    assert_eq!(doc.get_mark(2), 1 << 3);
    assert_eq!(doc.marker_next(0, 1 << 3), 2);

    // Insert a line above: the marker follows.
    doc.insert_string(0, b"new first line\n");
    assert_eq!(doc.line_from_handle(handle), 3);
    assert_eq!(doc.get_mark(3), 1 << 3);

    // Delete that line again.
    doc.delete_chars(0, 15);
    assert_eq!(doc.line_from_handle(handle), 2);

    doc.delete_mark(2, 3);
    assert_eq!(doc.get_mark(2), 0);
    assert_eq!(doc.line_from_handle(handle), -1);
}

#[test]
fn marker_changes_notify() {
    #[derive(Default)]
    struct MarkWatcher {
        lines: Vec<Position>,
    }
    impl DocWatcher for MarkWatcher {
        fn notify_modified(&mut self, _doc: &mut Document, mh: &DocModification<'_>) {
            if mh.modification_type & MOD_CHANGEMARKER != 0 {
                self.lines.push(mh.line);
            }
        }
    }

    let mut doc = doc_with_lines(3);
    let watcher = Rc::new(RefCell::new(MarkWatcher::default()));
    doc.add_watcher(watcher.clone(), 0);
    doc.add_mark(1, 0);
    doc.delete_mark(1, 0);
    assert_eq!(watcher.borrow().lines, vec![1, 1]);
}

#[test]
fn merged_lines_keep_markers() {
    let mut doc = doc_with_lines(3);
    let h1 = doc.add_mark(1, 1);
    let h2 = doc.add_mark(2, 2);
    // Join lines 1 and 2 by deleting the terminator between them.
    let join = doc.line_start(2) - 1;
    doc.delete_chars(join, 1);
    assert_eq!(doc.lines_total(), 2);
    assert_eq!(doc.get_mark(1), (1 << 1) | (1 << 2));
    assert_eq!(doc.line_from_handle(h1), 1);
    assert_eq!(doc.line_from_handle(h2), 1);
}

#[test]
fn line_state_follows_edits_and_notifies() {
    #[derive(Default)]
    struct StateWatcher {
        changes: usize,
    }
    impl DocWatcher for StateWatcher {
        fn notify_modified(&mut self, _doc: &mut Document, mh: &DocModification<'_>) {
            if mh.modification_type & MOD_CHANGELINESTATE != 0 {
                self.changes += 1;
            }
        }
    }

    let mut doc = doc_with_lines(3);
    let watcher = Rc::new(RefCell::new(StateWatcher::default()));
    doc.add_watcher(watcher.clone(), 0);
    assert_eq!(doc.set_line_state(1, 7), 0);
    assert_eq!(doc.set_line_state(1, 7), 7); // unchanged: no notification
    assert_eq!(doc.get_line_state(1), 7);
    assert_eq!(watcher.borrow().changes, 1);

    doc.insert_string(0, b"inserted\n");
    assert_eq!(doc.get_line_state(2), 7);
    assert!(doc.get_max_line_state() >= 3);
}

#[test]
fn annotations_attach_to_lines() {
    #[derive(Default)]
    struct AnnotationWatcher {
        deltas: Vec<Position>,
    }
    impl DocWatcher for AnnotationWatcher {
        fn notify_modified(&mut self, _doc: &mut Document, mh: &DocModification<'_>) {
            if mh.modification_type & MOD_CHANGEANNOTATION != 0 {
                self.deltas.push(mh.annotation_lines_added);
            }
        }
    }

    let mut doc = doc_with_lines(4);
    let watcher = Rc::new(RefCell::new(AnnotationWatcher::default()));
    doc.add_watcher(watcher.clone(), 0);

    doc.annotation_set_text(1, b"first note\nsecond note");
    assert_eq!(doc.annotation_text(1), b"first note\nsecond note");
    assert_eq!(doc.annotation_lines(1), 2);
    assert_eq!(watcher.borrow().deltas, vec![2]);

    doc.annotation_set_styles(1, &[1; 22]);
    assert_eq!(doc.annotation_styles(1), vec![1; 22]);

    // The annotation follows its line through an insertion above.
    doc.insert_string(0, b"zero\n");
    assert_eq!(doc.annotation_text(2), b"first note\nsecond note");
    assert_eq!(doc.annotation_text(1), b"");

    doc.annotation_set_text(2, b"");
    assert_eq!(doc.annotation_lines(2), 0);
    assert_eq!(watcher.borrow().deltas, vec![2, -2]);

    doc.annotation_set_text(0, b"a");
    doc.annotation_clear_all();
    assert_eq!(doc.annotation_text(0), b"");
}

#[test]
fn margin_text_is_independent_of_annotations() {
    let mut doc = doc_with_lines(3);
    doc.margin_set_text(1, b"42");
    doc.margin_set_style(1, 5);
    doc.annotation_set_text(1, b"note");
    assert_eq!(doc.margin_text(1), b"42");
    assert_eq!(doc.margin_style(1), 5);
    assert_eq!(doc.annotation_text(1), b"note");
    doc.margin_clear_all();
    assert_eq!(doc.margin_text(1), b"");
    assert_eq!(doc.annotation_text(1), b"note");
}

#[test]
fn decorations_follow_document_edits() {
    let mut doc = Document::new();
    doc.insert_string(0, b"highlight this word here");
    doc.decoration_set_current_indicator(9);
    doc.decoration_fill_range(10, 1, 4); // "this"
    assert_eq!(doc.decorations().value_at(9, 11), 1);
    assert_eq!(doc.decorations().value_at(9, 9), 0);

    doc.insert_string(0, b">>> ");
    assert_eq!(doc.decorations().value_at(9, 15), 1);
    assert_eq!(doc.decorations().value_at(9, 10), 0);

    doc.delete_chars(0, 4);
    assert_eq!(doc.decorations().value_at(9, 11), 1);
}

#[test]
fn contraction_state_mirrors_document_folds() {
    // The container owns the contraction state and drives it from fold
    // levels, as a view would.
    let mut doc = doc_with_lines(6);
    doc.set_level(1, FOLD_LEVEL_BASE | FOLD_LEVEL_HEADER_FLAG);
    for line in 2..=4 {
        doc.set_level(line, FOLD_LEVEL_BASE + 1);
    }
    let last_child = doc.get_last_child(1, -1, -1);
    assert_eq!(last_child, 4);

    let mut cs = ContractionState::new();
    cs.insert_lines(1, doc.lines_total() - 1);
    assert_eq!(cs.lines_in_document(), 6);

    // Contract the fold: hide the children, keep the header.
    assert!(cs.set_expanded(1, false));
    assert!(cs.set_visible(2, last_child, false));
    assert_eq!(cs.lines_displayed(), 3);
    assert_eq!(cs.display_from_doc(5), 2);
    assert_eq!(cs.doc_from_display(2), 5);
    assert_eq!(cs.contracted_next(0), 1);

    // Expand again.
    assert!(cs.set_expanded(1, true));
    assert!(cs.set_visible(2, last_child, true));
    assert_eq!(cs.lines_displayed(), 6);
    assert_eq!(cs.contracted_next(0), -1);
}
