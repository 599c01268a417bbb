use std::cell::RefCell;
use std::rc::Rc;

use document_core::{
    DocModification, DocWatcher, Document, EolMode, MOD_BEFOREDELETE, MOD_BEFOREINSERT,
    MOD_DELETETEXT, MOD_INSERTCHECK, MOD_INSERTTEXT, Position, STARTACTION,
};

fn doc_with(text: &[u8]) -> Document {
    let mut doc = Document::new();
    doc.insert_string(0, text);
    doc
}

fn text_of(doc: &Document) -> Vec<u8> {
    doc.text_range(0, doc.length())
}

#[test]
fn insert_into_empty_document() {
    let mut doc = Document::new();
    assert_eq!(doc.insert_string(0, b"documents"), 9);
    assert_eq!(doc.length(), 9);
    assert_eq!(doc.lines_total(), 1);
    assert_eq!(doc.line_start(0), 0);
    assert_eq!(doc.line_start(1), 9);
    assert!(doc.can_undo());
    assert!(!doc.can_redo());
}

#[test]
fn insert_at_boundaries() {
    let mut doc = doc_with(b"middle");
    assert_eq!(doc.insert_string(0, b"start "), 6);
    assert_eq!(doc.insert_string(doc.length(), b" end"), 4);
    assert_eq!(text_of(&doc), b"start middle end");
}

#[test]
fn out_of_range_requests_are_no_ops() {
    let mut doc = doc_with(b"abc");
    assert_eq!(doc.insert_string(-1, b"x"), 0);
    assert_eq!(doc.insert_string(99, b"x"), 0);
    assert!(!doc.delete_chars(2, 5));
    assert!(!doc.delete_chars(-1, 1));
    assert_eq!(text_of(&doc), b"abc");
    assert_eq!(doc.char_at(-5), 0);
    assert_eq!(doc.char_at(100), 0);
}

#[test]
fn line_queries_multiline() {
    let doc = doc_with(b"one\ntwo\r\nthree\rfour");
    assert_eq!(doc.lines_total(), 4);
    assert_eq!(doc.line_start(0), 0);
    assert_eq!(doc.line_start(1), 4);
    assert_eq!(doc.line_start(2), 9);
    assert_eq!(doc.line_start(3), 15);
    assert_eq!(doc.line_end(0), 3);
    assert_eq!(doc.line_end(1), 7); // before the CRLF pair
    assert_eq!(doc.line_end(2), 14);
    assert_eq!(doc.line_end(3), 19);
    assert_eq!(doc.line_from_position(8), 1);
    assert_eq!(doc.line_from_position(9), 2);
}

#[test]
fn inserting_cr_before_lf_keeps_line_count() {
    let mut doc = doc_with(b"a\nb");
    assert_eq!(doc.lines_total(), 2);
    doc.insert_string(1, b"\r");
    assert_eq!(text_of(&doc), b"a\r\nb");
    assert_eq!(doc.lines_total(), 2);
}

#[test]
fn deleting_lf_of_crlf_leaves_cr_terminator() {
    let mut doc = doc_with(b"a\r\nb");
    assert_eq!(doc.lines_total(), 2);
    assert!(doc.delete_chars(2, 1));
    assert_eq!(text_of(&doc), b"a\rb");
    assert_eq!(doc.lines_total(), 2);
    assert_eq!(doc.line_start(1), 2);
}

#[test]
fn read_only_documents_refuse_edits_and_notify() {
    #[derive(Default)]
    struct AttemptWatcher {
        attempts: usize,
    }
    impl DocWatcher for AttemptWatcher {
        fn notify_modify_attempt(&mut self, _doc: &mut Document) {
            self.attempts += 1;
        }
    }

    let mut doc = doc_with(b"locked");
    let watcher = Rc::new(RefCell::new(AttemptWatcher::default()));
    doc.add_watcher(watcher.clone(), 0);
    doc.set_read_only(true);
    assert_eq!(doc.insert_string(0, b"x"), 0);
    assert!(!doc.delete_chars(0, 1));
    assert_eq!(text_of(&doc), b"locked");
    assert_eq!(watcher.borrow().attempts, 2);
    doc.set_read_only(false);
    assert_eq!(doc.insert_string(0, b"un"), 2);
}

#[test]
fn notification_order_and_flags() {
    #[derive(Default)]
    struct OrderWatcher {
        events: Vec<(u32, Position, Position, Position, Option<Vec<u8>>)>,
    }
    impl DocWatcher for OrderWatcher {
        fn notify_modified(&mut self, _doc: &mut Document, mh: &DocModification<'_>) {
            self.events.push((
                mh.modification_type,
                mh.position,
                mh.length,
                mh.lines_added,
                mh.text.map(|t| t.to_vec()),
            ));
        }
    }

    let mut doc = Document::new();
    let watcher = Rc::new(RefCell::new(OrderWatcher::default()));
    doc.add_watcher(watcher.clone(), 0);

    doc.insert_string(0, b"ab\ncd");
    {
        let w = watcher.borrow();
        assert_eq!(w.events.len(), 3);
        assert_eq!(w.events[0].0, MOD_INSERTCHECK);
        assert!(w.events[1].0 & MOD_BEFOREINSERT != 0);
        let insert = &w.events[2];
        assert!(insert.0 & MOD_INSERTTEXT != 0);
        assert!(insert.0 & STARTACTION != 0);
        assert_eq!(insert.1, 0);
        assert_eq!(insert.2, 5);
        assert_eq!(insert.3, 1); // one line added
        assert_eq!(insert.4.as_deref(), Some(&b"ab\ncd"[..]));
    }

    watcher.borrow_mut().events.clear();
    doc.delete_chars(1, 3);
    {
        let w = watcher.borrow();
        assert_eq!(w.events.len(), 2);
        assert!(w.events[0].0 & MOD_BEFOREDELETE != 0);
        let delete = &w.events[1];
        assert!(delete.0 & MOD_DELETETEXT != 0);
        assert_eq!(delete.3, -1); // one line removed
        assert_eq!(delete.4.as_deref(), Some(&b"b\nc"[..]));
    }
}

#[test]
fn insertion_check_can_rewrite_the_payload() {
    struct Rewriter;
    impl DocWatcher for Rewriter {
        fn notify_modified(&mut self, doc: &mut Document, mh: &DocModification<'_>) {
            if mh.modification_type & MOD_INSERTCHECK != 0 && mh.text == Some(&b"abc"[..]) {
                doc.change_insertion(b"[abc]");
            }
        }
    }

    let mut doc = Document::new();
    doc.add_watcher(Rc::new(RefCell::new(Rewriter)), 0);
    assert_eq!(doc.insert_string(0, b"abc"), 5);
    assert_eq!(text_of(&doc), b"[abc]");
    // Non-matching insertions pass through untouched.
    assert_eq!(doc.insert_string(0, b"x"), 1);
    assert_eq!(text_of(&doc), b"x[abc]");
}

#[test]
fn reentrant_mutation_from_watcher_is_refused() {
    struct Reenter;
    impl DocWatcher for Reenter {
        fn notify_modified(&mut self, doc: &mut Document, mh: &DocModification<'_>) {
            if mh.modification_type & MOD_INSERTTEXT != 0 {
                // Inside a modification: must be ignored.
                assert_eq!(doc.insert_string(0, b"oops"), 0);
                assert!(!doc.delete_chars(0, 1));
            }
        }
    }

    let mut doc = Document::new();
    doc.add_watcher(Rc::new(RefCell::new(Reenter)), 0);
    doc.insert_string(0, b"hello");
    assert_eq!(text_of(&doc), b"hello");
}

#[test]
fn watcher_registration_is_idempotent() {
    struct Quiet;
    impl DocWatcher for Quiet {}

    let mut doc = Document::new();
    let w: Rc<RefCell<dyn DocWatcher>> = Rc::new(RefCell::new(Quiet));
    assert!(doc.add_watcher(w.clone(), 7));
    assert!(!doc.add_watcher(w.clone(), 7));
    assert!(doc.add_watcher(w.clone(), 8));
    assert!(doc.remove_watcher(&w, 7));
    assert!(!doc.remove_watcher(&w, 7));
}

#[test]
fn convert_line_ends_normalises() {
    let mut doc = doc_with(b"a\nb\r\nc\rd");
    doc.convert_line_ends(EolMode::CrLf);
    assert_eq!(text_of(&doc), b"a\r\nb\r\nc\r\nd");
    assert_eq!(doc.lines_total(), 4);

    doc.convert_line_ends(EolMode::Lf);
    assert_eq!(text_of(&doc), b"a\nb\nc\nd");

    doc.convert_line_ends(EolMode::Cr);
    assert_eq!(text_of(&doc), b"a\rb\rc\rd");

    // The whole conversion is one undo step.
    doc.undo();
    assert_eq!(text_of(&doc), b"a\nb\nc\nd");
}

#[test]
fn columns_and_tabs() {
    let mut doc = doc_with(b"\tab\tc\nxy");
    doc.set_tab_in_chars(8);
    assert_eq!(doc.get_column(0), 0);
    assert_eq!(doc.get_column(1), 8);
    assert_eq!(doc.get_column(3), 10);
    assert_eq!(doc.get_column(4), 16);
    assert_eq!(doc.find_column(0, 8), 1);
    assert_eq!(doc.find_column(0, 16), 4);
    assert_eq!(doc.find_column(0, 9), 2);
    assert_eq!(doc.get_column(7), 1); // second line
}

#[test]
fn vc_home_toggles_between_text_and_line_start() {
    let doc = doc_with(b"    indented\nplain");
    assert_eq!(doc.vc_home_position(8), 4);
    assert_eq!(doc.vc_home_position(4), 0);
    assert_eq!(doc.vc_home_position(0), 4);
    assert_eq!(doc.vc_home_position(15), 13);
}

#[test]
fn word_navigation() {
    let doc = doc_with(b"one two,three");
    assert_eq!(doc.next_word_start(0, 1), 4);
    assert_eq!(doc.next_word_start(4, 1), 7);
    assert_eq!(doc.next_word_start(5, -1), 4);
    assert_eq!(doc.next_word_end(0, 1), 3);
    assert_eq!(doc.next_word_end(4, 1), 7);
    assert!(doc.is_word_at(0, 3));
    assert!(doc.is_word_at(4, 7));
    assert!(!doc.is_word_at(1, 3));
    assert_eq!(doc.extend_word_select(5, 1, true), 7);
    assert_eq!(doc.extend_word_select(5, -1, true), 4);
}

#[test]
fn brace_matching_uses_styles() {
    let mut doc = doc_with(b"f(a[0](b))");
    assert_eq!(doc.brace_match(1), 9);
    assert_eq!(doc.brace_match(9), 1);
    assert_eq!(doc.brace_match(3), 5);
    assert_eq!(doc.brace_match(6), 8);
    assert_eq!(doc.brace_match(0), -1);

    // Give the inner parens a different style: once styled, they no longer
    // match the outer pair's style so the outer match skips them.
    doc.start_styling(0);
    doc.set_style_for(doc.length(), 1);
    doc.start_styling(6);
    doc.set_style_for(3, 2);
    assert_eq!(doc.brace_match(1), 9);
}

#[test]
fn relative_positions_and_counts() {
    let mut doc = Document::new();
    doc.set_dbcs_code_page(document_core::CP_UTF8);
    doc.insert_string(0, "aΓ𐐷b".as_bytes());
    // Bytes: a=1, Γ=2, 𐐷=4, b=1.
    assert_eq!(doc.count_characters(0, doc.length()), 4);
    assert_eq!(doc.count_utf16(0, doc.length()), 5);
    assert_eq!(doc.get_relative_position(0, 2), 3);
    assert_eq!(doc.get_relative_position(3, 1), 7);
    assert_eq!(doc.get_relative_position(7, -2), 1);
    assert_eq!(doc.get_relative_position(0, -1), -1);
}

#[test]
fn utf8_character_boundary_snapping() {
    let mut doc = Document::new();
    doc.set_dbcs_code_page(document_core::CP_UTF8);
    doc.insert_string(0, "a€b".as_bytes()); // € is 3 bytes at 1..4
    assert_eq!(doc.move_position_outside_char(2, -1, false), 1);
    assert_eq!(doc.move_position_outside_char(2, 1, false), 4);
    assert_eq!(doc.move_position_outside_char(3, 1, false), 4);
    assert_eq!(doc.move_position_outside_char(1, 1, false), 1);
    assert_eq!(doc.next_position(1, 1), 4);
    assert_eq!(doc.next_position(4, -1), 1);
}

#[test]
fn crlf_pair_snapping() {
    let doc = doc_with(b"a\r\nb");
    assert_eq!(doc.move_position_outside_char(2, 1, true), 3);
    assert_eq!(doc.move_position_outside_char(2, -1, true), 1);
    assert_eq!(doc.move_position_outside_char(2, 1, false), 2);
    assert!(doc.is_crlf(1));
    assert!(!doc.is_crlf(2));
}

#[test]
fn invalid_utf8_reports_recoverable_surrogates() {
    let mut doc = Document::new();
    doc.set_dbcs_code_page(document_core::CP_UTF8);
    doc.insert_string(0, &[b'a', 0x93, b'b']);
    let (ch, width) = doc.get_character_and_width(1);
    assert_eq!(ch, 0xDC80 + 0x93);
    assert_eq!(width, 1);
    let (ch, width) = doc.get_character_and_width(0);
    assert_eq!(ch, 'a' as u32);
    assert_eq!(width, 1);
}

#[test]
fn unicode_line_ends_respect_allowed_mask() {
    let mut doc = Document::new();
    doc.set_dbcs_code_page(document_core::CP_UTF8);
    doc.insert_string(0, "a\u{2028}b".as_bytes());
    assert_eq!(doc.lines_total(), 1);
    assert!(doc.set_line_end_types_allowed(document_core::line_end_type::UNICODE));
    assert_eq!(doc.lines_total(), 2);
    assert_eq!(doc.line_start(1), 4);
    assert_eq!(doc.line_end(0), 1);
    assert!(doc.set_line_end_types_allowed(document_core::line_end_type::DEFAULT));
    assert_eq!(doc.lines_total(), 1);
}
