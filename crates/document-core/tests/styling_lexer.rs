use std::cell::RefCell;
use std::rc::Rc;

use document_core::{
    DocModification, DocWatcher, Document, FOLD_LEVEL_BASE, FOLD_LEVEL_HEADER_FLAG, LexAccessor,
    LexDocument, Lexer, MOD_CHANGESTYLE, Position,
};

const STYLE_DEFAULT: u8 = 0;
const STYLE_DIGIT: u8 = 2;
const STYLE_WORD: u8 = 1;

/// Minimal lexer: words style 1, digit runs style 2, everything else 0.
/// Lines ending in `{` become fold headers.
#[derive(Default)]
struct ToyLexer {
    lex_calls: usize,
}

impl Lexer for ToyLexer {
    fn lex(
        &mut self,
        start_pos: Position,
        length: Position,
        _init_style: i32,
        doc: &mut dyn LexDocument,
    ) {
        self.lex_calls += 1;
        let mut acc = LexAccessor::new(doc);
        acc.start_at(start_pos);
        acc.start_segment(start_pos);
        let end = start_pos + length;
        let mut pos = start_pos;
        while pos < end {
            let ch = acc.char_at(pos);
            let style = if ch.is_ascii_digit() {
                STYLE_DIGIT
            } else if ch.is_ascii_alphabetic() || ch == b'_' {
                STYLE_WORD
            } else {
                STYLE_DEFAULT
            };
            let mut run_end = pos;
            while run_end + 1 < end {
                let next = acc.char_at(run_end + 1);
                let next_style = if next.is_ascii_digit() {
                    STYLE_DIGIT
                } else if next.is_ascii_alphabetic() || next == b'_' {
                    STYLE_WORD
                } else {
                    STYLE_DEFAULT
                };
                if next_style != style {
                    break;
                }
                run_end += 1;
            }
            acc.colour_to(run_end, style);
            pos = run_end + 1;
        }
        acc.flush();
    }

    fn fold(
        &mut self,
        start_pos: Position,
        length: Position,
        _init_style: i32,
        doc: &mut dyn LexDocument,
    ) {
        let first_line = doc.line_from_position(start_pos);
        let last_line = doc.line_from_position(start_pos + length - 1);
        for line in first_line..=last_line {
            let end = doc.line_end(line);
            let mut last = [0u8; 1];
            if end > doc.line_start(line) {
                doc.get_char_range(&mut last, end - 1);
            }
            let level = if last[0] == b'{' {
                FOLD_LEVEL_BASE | FOLD_LEVEL_HEADER_FLAG
            } else {
                FOLD_LEVEL_BASE
            };
            doc.set_level(line, level);
        }
    }
}

#[test]
fn ensure_styled_to_runs_the_lexer() {
    let mut doc = Document::new();
    doc.insert_string(0, b"abc 123 def");
    doc.set_lexer(Some(Box::new(ToyLexer::default())));
    doc.ensure_styled_to(doc.length());
    assert_eq!(doc.get_end_styled(), doc.length());
    assert_eq!(doc.style_at(0), STYLE_WORD);
    assert_eq!(doc.style_at(3), STYLE_DEFAULT);
    assert_eq!(doc.style_at(5), STYLE_DIGIT);
    assert_eq!(doc.style_at(9), STYLE_WORD);
}

#[test]
fn editing_rewinds_the_styling_watermark() {
    let mut doc = Document::new();
    doc.insert_string(0, b"one\ntwo\nthree");
    doc.set_lexer(Some(Box::new(ToyLexer::default())));
    doc.ensure_styled_to(doc.length());
    let end = doc.get_end_styled();
    assert_eq!(end, doc.length());

    doc.insert_string(4, b"X");
    assert!(doc.get_end_styled() <= 4);
    doc.ensure_styled_to(doc.length());
    assert_eq!(doc.style_at(4), STYLE_WORD);
}

#[test]
fn without_lexer_watchers_are_asked_to_style() {
    #[derive(Default)]
    struct StyleNeeded {
        requests: Vec<Position>,
    }
    impl DocWatcher for StyleNeeded {
        fn notify_style_needed(&mut self, _doc: &mut Document, end_pos: Position) {
            self.requests.push(end_pos);
        }
    }

    let mut doc = Document::new();
    doc.insert_string(0, b"container styled");
    let watcher = Rc::new(RefCell::new(StyleNeeded::default()));
    doc.add_watcher(watcher.clone(), 0);
    doc.ensure_styled_to(10);
    assert_eq!(watcher.borrow().requests, vec![10]);
}

#[test]
fn style_changes_notify_with_changed_range() {
    #[derive(Default)]
    struct StyleWatcher {
        ranges: Vec<(Position, Position)>,
    }
    impl DocWatcher for StyleWatcher {
        fn notify_modified(&mut self, _doc: &mut Document, mh: &DocModification<'_>) {
            if mh.modification_type & MOD_CHANGESTYLE != 0 {
                self.ranges.push((mh.position, mh.length));
            }
        }
    }

    let mut doc = Document::new();
    doc.insert_string(0, b"0123456789");
    let watcher = Rc::new(RefCell::new(StyleWatcher::default()));
    doc.add_watcher(watcher.clone(), 0);

    doc.start_styling(2);
    assert!(doc.set_style_for(4, 7));
    assert_eq!(watcher.borrow().ranges, vec![(2, 4)]);

    // Re-applying the identical styles produces no notification.
    doc.start_styling(2);
    assert!(doc.set_style_for(4, 7));
    assert_eq!(watcher.borrow().ranges.len(), 1);

    // set_styles reports only the sub-range that changed.
    doc.start_styling(0);
    assert!(doc.set_styles(&[0, 0, 7, 7, 9, 9]));
    let last = *watcher.borrow().ranges.last().unwrap();
    assert_eq!(last, (4, 2));
}

#[test]
fn styles_do_not_enter_undo_history() {
    let mut doc = Document::new();
    doc.insert_string(0, b"abc");
    assert!(doc.can_undo());
    doc.undo();
    assert!(!doc.can_undo());
    doc.insert_string(0, b"abc");
    doc.start_styling(0);
    doc.set_style_for(3, 5);
    // One undo removes the text; styling added no extra step.
    doc.undo();
    assert_eq!(doc.length(), 0);
    assert!(!doc.can_undo());
}

#[test]
fn lexer_fold_levels_flow_through_lex_document() {
    let mut doc = Document::new();
    doc.insert_string(0, b"fn main() {\nbody\n}\n");
    let mut lexer = ToyLexer::default();
    lexer.fold(0, doc.length(), 0, &mut doc);
    assert!(doc.get_level(0) & FOLD_LEVEL_HEADER_FLAG != 0);
    assert_eq!(doc.get_level(1), FOLD_LEVEL_BASE);
    assert_eq!(doc.get_level(2), FOLD_LEVEL_BASE);
}

#[test]
fn lexer_line_state_round_trips_through_accessor() {
    let mut doc = Document::new();
    doc.insert_string(0, b"a\nb\nc");
    {
        let mut acc = LexAccessor::new(&mut doc);
        assert_eq!(acc.set_line_state(1, 99), 0);
        assert_eq!(acc.get_line_state(1), 99);
        assert_eq!(acc.line_start(1), 2);
        assert_eq!(acc.line_end(1), 3);
        assert!(acc.match_str(2, "b"));
    }
    assert_eq!(doc.get_line_state(1), 99);
}

#[test]
fn lexer_decorations_are_dropped_on_lexer_change() {
    let mut doc = Document::new();
    doc.insert_string(0, b"some text here");
    // A lexer-range indicator and a container-range indicator.
    doc.decoration_set_current_indicator(2);
    doc.decoration_fill_range(0, 1, 4);
    doc.decoration_set_current_indicator(20);
    doc.decoration_fill_range(5, 1, 4);
    assert_eq!(doc.decorations().value_at(2, 1), 1);
    assert_eq!(doc.decorations().value_at(20, 6), 1);

    doc.set_lexer(Some(Box::new(ToyLexer::default())));
    assert_eq!(doc.decorations().value_at(2, 1), 0);
    assert_eq!(doc.decorations().value_at(20, 6), 1);
}
