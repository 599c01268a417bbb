//! The document: composition root and public API.
//!
//! A [`Document`] owns the cell buffer, the per-line data managers, the
//! decoration list, the character classifier, the case folder, and the
//! regex engines, and stitches them together behind one API. Containers
//! register [`DocWatcher`]s and receive a strict notification order for
//! every structural change: `BeforeInsert`/`BeforeDelete` first, then
//! `InsertText`/`DeleteText` with the undo-grouping flags.
//!
//! Re-entrance is guarded: a watcher reacting to a notification may read
//! anything but a re-entrant mutation is refused and reported as a no-op.
//! The one sanctioned re-entry is [`Document::change_insertion`] during a
//! `MOD_INSERTCHECK` notification, which lets a container rewrite an
//! insertion before it happens.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use document_core_lex::{LexDocument, Lexer};

use crate::cell_buffer::CellBuffer;
use crate::case_folding::{CaseFolder, CaseFolderDBCS, CaseFolderTable, CaseFolderUnicode};
use crate::char_classify::{CharClassify, CharacterClass, unicode_class};
use crate::decorations::DecorationList;
use crate::encoding::{
    CP_UTF8, UTF8_BYTES_OF_LEAD, UTF8_MASK_INVALID, UTF8_MASK_WIDTH, UTF8_MAX_BYTES,
    is_dbcs_code_page, is_dbcs_lead_byte, utf8_classify, utf8_decode, utf8_is_ascii,
    utf8_is_nel, utf8_is_separator, utf8_is_trail_byte,
};
use crate::line_ending::{EolMode, line_end_type};
use crate::per_line::{
    FOLD_LEVEL_BASE, FOLD_LEVEL_HEADER_FLAG, FOLD_LEVEL_WHITE_FLAG, LineAnnotations, LineLevels,
    LineMarkers, LineState, PerLine, level_number,
};
use crate::search::{
    BuiltinRegex, CxxRegex, FIND_CXX11REGEX, FIND_MATCH_CASE, FIND_REGEXP, RegexSearcher,
    literal_find,
};
use crate::status::Status;
use crate::undo_history::ActionKind;
use crate::{INVALID_POSITION, Position};

// Modification notification type bits.

/// Text was inserted.
pub const MOD_INSERTTEXT: u32 = 0x1;
/// Text was deleted.
pub const MOD_DELETETEXT: u32 = 0x2;
/// Style bytes changed.
pub const MOD_CHANGESTYLE: u32 = 0x4;
/// A fold level changed.
pub const MOD_CHANGEFOLD: u32 = 0x8;
/// Change performed directly by the container or user.
pub const PERFORMED_USER: u32 = 0x10;
/// Change performed by undo.
pub const PERFORMED_UNDO: u32 = 0x20;
/// Change performed by redo.
pub const PERFORMED_REDO: u32 = 0x40;
/// One step of a multi-step undo or redo.
pub const MULTISTEPUNDOREDO: u32 = 0x80;
/// Final step of an undo or redo.
pub const LASTSTEPINUNDOREDO: u32 = 0x100;
/// A marker was added or removed.
pub const MOD_CHANGEMARKER: u32 = 0x200;
/// About to insert text.
pub const MOD_BEFOREINSERT: u32 = 0x400;
/// About to delete text.
pub const MOD_BEFOREDELETE: u32 = 0x800;
/// An undo/redo spanned multiple lines.
pub const MULTILINEUNDOREDO: u32 = 0x1000;
/// First step of a new undo group.
pub const STARTACTION: u32 = 0x2000;
/// An indicator range changed.
pub const MOD_CHANGEINDICATOR: u32 = 0x4000;
/// A line's lexer state changed.
pub const MOD_CHANGELINESTATE: u32 = 0x8000;
/// A line's margin text changed.
pub const MOD_CHANGEMARGIN: u32 = 0x10000;
/// A line's annotation changed.
pub const MOD_CHANGEANNOTATION: u32 = 0x20000;
/// A container-defined undo action was replayed.
pub const MOD_CONTAINER: u32 = 0x40000;
/// Internal lexer state changed over a range.
pub const MOD_LEXERSTATE: u32 = 0x80000;
/// Insertion about to happen; watchers may call `change_insertion`.
pub const MOD_INSERTCHECK: u32 = 0x100000;

/// Payload of a modification notification. The `text` borrow is valid for
/// the duration of the callback only.
#[derive(Debug, Clone, Default)]
pub struct DocModification<'a> {
    /// Bit set of `MOD_*`/`PERFORMED_*` flags.
    pub modification_type: u32,
    /// Position of the change.
    pub position: Position,
    /// Length of the change in bytes.
    pub length: Position,
    /// Change in total line count.
    pub lines_added: Position,
    /// The inserted or removed bytes, when applicable.
    pub text: Option<&'a [u8]>,
    /// Line number for per-line notifications.
    pub line: Position,
    /// New fold level for `MOD_CHANGEFOLD`.
    pub fold_level_now: i32,
    /// Previous fold level for `MOD_CHANGEFOLD`.
    pub fold_level_prev: i32,
    /// Change in annotation display lines.
    pub annotation_lines_added: Position,
    /// Container token for `MOD_CONTAINER`.
    pub token: Position,
}

/// Observer of document changes. All methods have empty defaults so
/// watchers implement only what they need.
pub trait DocWatcher {
    /// A mutation was attempted on a read-only document.
    fn notify_modify_attempt(&mut self, _doc: &mut Document) {}

    /// The document entered (`true`) or left (`false`) its save point.
    fn notify_save_point(&mut self, _doc: &mut Document, _at_save_point: bool) {}

    /// A modification happened; see [`DocModification`].
    fn notify_modified(&mut self, _doc: &mut Document, _mh: &DocModification<'_>) {}

    /// Styling is needed up to `end_pos` and no lexer is attached.
    fn notify_style_needed(&mut self, _doc: &mut Document, _end_pos: Position) {}

    /// An internal error occurred.
    fn notify_error_occurred(&mut self, _doc: &mut Document, _status: Status) {}
}

struct WatcherWithUserData {
    watcher: Rc<RefCell<dyn DocWatcher>>,
    user_data: usize,
}

impl Clone for WatcherWithUserData {
    fn clone(&self) -> Self {
        Self { watcher: Rc::clone(&self.watcher), user_data: self.user_data }
    }
}

/// The per-line data managers, driven as one observer by the cell buffer.
#[derive(Default)]
pub struct PerLineData {
    /// Markers per line.
    pub markers: LineMarkers,
    /// Fold levels per line.
    pub levels: LineLevels,
    /// Lexer state per line.
    pub state: LineState,
    /// Margin text per line.
    pub margins: LineAnnotations,
    /// Annotation text per line.
    pub annotations: LineAnnotations,
}

impl PerLine for PerLineData {
    fn init(&mut self) {
        self.markers.init();
        self.levels.init();
        self.state.init();
        self.margins.init();
        self.annotations.init();
    }

    fn insert_line(&mut self, line: Position) {
        self.markers.insert_line(line);
        self.levels.insert_line(line);
        self.state.insert_line(line);
        self.margins.insert_line(line);
        self.annotations.insert_line(line);
    }

    fn remove_line(&mut self, line: Position) {
        self.markers.remove_line(line);
        self.levels.remove_line(line);
        self.state.remove_line(line);
        self.margins.remove_line(line);
        self.annotations.remove_line(line);
    }
}

/// A decoded character and the bytes it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterExtracted {
    /// The code point (or DBCS pair, or replacement marker).
    pub character: u32,
    /// Bytes occupied in the buffer.
    pub width_bytes: Position,
}

const UNICODE_REPLACEMENT_CHAR: u32 = 0xFFFD;

/// Fold-block extents around a line, for fold-margin highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightDelimiter {
    /// First line of the surrounding fold block, or -1.
    pub begin_fold_block: Position,
    /// Last line of the surrounding fold block, or -1.
    pub end_fold_block: Position,
    /// Changes at or before this line require redrawing the highlight.
    pub first_changeable_line_before: Position,
    /// Changes at or after this line require redrawing the highlight.
    pub first_changeable_line_after: Position,
}

impl Default for HighlightDelimiter {
    fn default() -> Self {
        Self {
            begin_fold_block: -1,
            end_fold_block: -1,
            first_changeable_line_before: -1,
            first_changeable_line_after: -1,
        }
    }
}

impl HighlightDelimiter {
    /// Whether a change at `line` affects the drawn highlight.
    pub fn needs_drawing(&self, line: Position) -> bool {
        line <= self.first_changeable_line_before || line >= self.first_changeable_line_after
    }

    /// Whether `line` is inside the highlighted block.
    pub fn is_fold_block_highlighted(&self, line: Position) -> bool {
        self.begin_fold_block != -1 && self.begin_fold_block <= line && line <= self.end_fold_block
    }

    /// Whether `line` is the block's header.
    pub fn is_head_of_fold_block(&self, line: Position) -> bool {
        self.begin_fold_block == line && line < self.end_fold_block
    }

    /// Whether `line` is strictly inside the block.
    pub fn is_body_of_fold_block(&self, line: Position) -> bool {
        self.begin_fold_block != -1 && self.begin_fold_block < line && line < self.end_fold_block
    }

    /// Whether `line` is the block's last line.
    pub fn is_tail_of_fold_block(&self, line: Position) -> bool {
        self.begin_fold_block != -1 && self.begin_fold_block < line && line == self.end_fold_block
    }
}

struct DualRegex {
    builtin: BuiltinRegex,
    cxx: CxxRegex,
    last_was_cxx: bool,
}

impl RegexSearcher for DualRegex {
    fn find_text(
        &mut self,
        doc: &Document,
        min_pos: Position,
        max_pos: Position,
        pattern: &[u8],
        case_sensitive: bool,
        flags: u32,
        length: &mut Position,
    ) -> Result<Position, Status> {
        if flags & FIND_CXX11REGEX != 0 {
            self.last_was_cxx = true;
            self.cxx.find_text(doc, min_pos, max_pos, pattern, case_sensitive, flags, length)
        } else {
            self.last_was_cxx = false;
            self.builtin.find_text(doc, min_pos, max_pos, pattern, case_sensitive, flags, length)
        }
    }

    fn substitute_by_position(&mut self, doc: &Document, text: &[u8]) -> Result<Vec<u8>, Status> {
        if self.last_was_cxx {
            self.cxx.substitute_by_position(doc, text)
        } else {
            self.builtin.substitute_by_position(doc, text)
        }
    }
}

/// The document engine.
pub struct Document {
    cb: CellBuffer,
    per_line: Rc<RefCell<PerLineData>>,
    decorations: DecorationList,
    char_class: CharClassify,
    pcf: Box<dyn CaseFolder>,
    regex: Option<Box<dyn RegexSearcher>>,
    lexer: Option<Box<dyn Lexer>>,
    watchers: Vec<WatcherWithUserData>,
    entered_modification: i32,
    entered_styling: i32,
    entered_read_only_count: i32,
    performing_style: bool,
    insertion_set: bool,
    insertion: Vec<u8>,
    end_styled: Position,
    style_clock: i32,
    dbcs_code_page: i32,
    line_end_bit_set: i32,
    tab_in_chars: Position,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty single-byte document.
    pub fn new() -> Self {
        let per_line: Rc<RefCell<PerLineData>> = Rc::new(RefCell::new(PerLineData::default()));
        let mut cb = CellBuffer::new();
        let per_line_dyn: Rc<RefCell<dyn PerLine>> = per_line.clone();
        let observer: Weak<RefCell<dyn PerLine>> = Rc::downgrade(&per_line_dyn);
        cb.set_per_line(observer);
        Self {
            cb,
            per_line,
            decorations: DecorationList::new(),
            char_class: CharClassify::new(),
            pcf: Box::new(CaseFolderTable::new()),
            regex: None,
            lexer: None,
            watchers: Vec::new(),
            entered_modification: 0,
            entered_styling: 0,
            entered_read_only_count: 0,
            performing_style: false,
            insertion_set: false,
            insertion: Vec::new(),
            end_styled: 0,
            style_clock: 0,
            dbcs_code_page: 0,
            line_end_bit_set: line_end_type::DEFAULT,
            tab_in_chars: 8,
        }
    }

    // ---- basic queries ----------------------------------------------------

    /// Document length in bytes.
    pub fn length(&self) -> Position {
        self.cb.len()
    }

    /// Whether the document has no text.
    pub fn is_empty(&self) -> bool {
        self.cb.is_empty()
    }

    /// Text byte at `position` (0 out of range).
    pub fn char_at(&self, position: Position) -> u8 {
        self.cb.char_at(position)
    }

    /// Style byte at `position` (0 out of range).
    pub fn style_at(&self, position: Position) -> u8 {
        self.cb.style_at(position)
    }

    /// Copy text bytes starting at `position` into `buf`.
    pub fn get_char_range(&self, buf: &mut [u8], position: Position) {
        self.cb.get_char_range(buf, position);
    }

    /// Copy style bytes starting at `position` into `buf`.
    pub fn get_style_range(&self, buf: &mut [u8], position: Position) {
        self.cb.get_style_range(buf, position);
    }

    /// The text of `[start, end)` as an owned vector.
    pub fn text_range(&self, start: Position, end: Position) -> Vec<u8> {
        let start = start.clamp(0, self.length());
        let end = end.clamp(start, self.length());
        let mut buf = vec![0u8; (end - start) as usize];
        self.get_char_range(&mut buf, start);
        buf
    }

    /// Number of lines.
    pub fn lines_total(&self) -> Position {
        self.cb.lines()
    }

    /// Start position of `line`.
    pub fn line_start(&self, line: Position) -> Position {
        self.cb.line_start(line)
    }

    /// End position of `line`, before its terminator.
    pub fn line_end(&self, line: Position) -> Position {
        if line >= self.lines_total() - 1 {
            return self.line_start(line + 1);
        }
        let mut position = self.line_start(line + 1);
        if self.dbcs_code_page == CP_UTF8 {
            let bytes = [
                self.cb.char_at(position - 3),
                self.cb.char_at(position - 2),
                self.cb.char_at(position - 1),
            ];
            if utf8_is_separator(&bytes) {
                return position - 3;
            }
            if utf8_is_nel(&bytes[1..]) {
                return position - 2;
            }
        }
        position -= 1; // Back over CR or LF.
        if position > self.line_start(line) && self.cb.char_at(position - 1) == b'\r' {
            position -= 1;
        }
        position
    }

    /// Line containing `position`.
    pub fn line_from_position(&self, position: Position) -> Position {
        self.cb.line_from_position(position)
    }

    /// End position of the line containing `position`.
    pub fn line_end_position(&self, position: Position) -> Position {
        self.line_end(self.line_from_position(position))
    }

    /// Whether `position` sits between the CR and LF of a CRLF pair.
    pub fn is_crlf(&self, position: Position) -> bool {
        if position < 0 || position >= self.length() {
            return false;
        }
        self.cb.char_at(position) == b'\r' && self.cb.char_at(position + 1) == b'\n'
    }

    /// Code page: 0, [`CP_UTF8`], or a DBCS page.
    pub fn code_page(&self) -> i32 {
        self.dbcs_code_page
    }

    /// Whether the code page is double-byte.
    pub fn is_dbcs(&self) -> bool {
        is_dbcs_code_page(self.dbcs_code_page)
    }

    /// Whether `ch` starts a two-byte character under the current page.
    pub fn is_dbcs_lead_byte_at(&self, ch: u8) -> bool {
        is_dbcs_lead_byte(self.dbcs_code_page, ch)
    }

    /// Set the code page. Returns whether it changed; the case folder is
    /// reset to the default for the encoding and recognised line ends are
    /// recomputed.
    pub fn set_dbcs_code_page(&mut self, code_page: i32) -> bool {
        if self.dbcs_code_page != code_page {
            self.dbcs_code_page = code_page;
            self.pcf = default_case_folder(code_page);
            self.regex = None;
            let active = self.line_end_bit_set & self.line_end_types_supported();
            self.cb.set_utf8_line_ends(active & line_end_type::UNICODE != 0);
            self.modified_at(0); // Restyle everything.
            log::debug!("code page changed to {code_page}");
            true
        } else {
            false
        }
    }

    /// Line-end families the document can recognise: Unicode terminators
    /// require UTF-8 and a lexer that understands them (or no lexer).
    pub fn line_end_types_supported(&self) -> i32 {
        if self.dbcs_code_page == CP_UTF8 {
            match &self.lexer {
                Some(lexer) => lexer.line_end_types_supported(),
                None => line_end_type::UNICODE,
            }
        } else {
            0
        }
    }

    /// Allow or disallow recognition of Unicode line terminators. Returns
    /// whether the active set changed.
    pub fn set_line_end_types_allowed(&mut self, line_end_bit_set: i32) -> bool {
        if self.line_end_bit_set != line_end_bit_set {
            self.line_end_bit_set = line_end_bit_set;
            let active = self.line_end_bit_set & self.line_end_types_supported();
            let want = active & line_end_type::UNICODE != 0;
            if want != self.cb.utf8_line_ends() {
                self.cb.set_utf8_line_ends(want);
                return true;
            }
        }
        false
    }

    /// Currently allowed line-end families.
    pub fn line_end_types_allowed(&self) -> i32 {
        self.line_end_bit_set
    }

    /// Tab width used by the column calculations.
    pub fn tab_in_chars(&self) -> Position {
        self.tab_in_chars
    }

    /// Set the tab width used by the column calculations.
    pub fn set_tab_in_chars(&mut self, tab_in_chars: Position) {
        self.tab_in_chars = tab_in_chars.max(1);
    }

    // ---- read-only and save point -----------------------------------------

    /// Whether the document refuses mutation.
    pub fn is_read_only(&self) -> bool {
        self.cb.is_read_only()
    }

    /// Gate mutation of the document.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.cb.set_read_only(read_only);
    }

    /// Check mutation is allowed, notifying `MODIFYATTEMPT` when not.
    fn check_read_only(&mut self) -> bool {
        if self.cb.is_read_only() {
            self.entered_read_only_count += 1;
            if self.entered_read_only_count == 1 {
                self.notify_modify_attempt();
            }
            self.entered_read_only_count -= 1;
            false
        } else {
            true
        }
    }

    /// Mark the current state as the saved one and tell watchers.
    pub fn set_save_point(&mut self) {
        self.cb.set_save_point();
        self.notify_save_point(true);
    }

    /// Whether the current state equals the saved one.
    pub fn is_save_point(&self) -> bool {
        self.cb.is_save_point()
    }

    // ---- mutation ---------------------------------------------------------

    /// Insert `s` before `position`. Returns the number of bytes inserted
    /// (0 when refused). Watchers see `MOD_INSERTCHECK` first and may call
    /// [`Document::change_insertion`] to substitute the payload.
    pub fn insert_string(&mut self, position: Position, s: &[u8]) -> Position {
        if s.is_empty() || position < 0 || position > self.length() {
            return 0;
        }
        if !self.check_read_only() {
            return 0;
        }
        if self.entered_modification != 0 {
            return 0;
        }
        self.entered_modification += 1;
        self.insertion_set = false;
        self.insertion.clear();
        self.notify_modified(&DocModification {
            modification_type: MOD_INSERTCHECK,
            position,
            length: s.len() as Position,
            text: Some(s),
            ..Default::default()
        });
        let payload: Vec<u8> =
            if self.insertion_set { std::mem::take(&mut self.insertion) } else { s.to_vec() };
        self.notify_modified(&DocModification {
            modification_type: MOD_BEFOREINSERT | PERFORMED_USER,
            position,
            length: payload.len() as Position,
            text: Some(&payload),
            ..Default::default()
        });
        let prev_lines_total = self.lines_total();
        let start_save_point = self.cb.is_save_point();
        let start_sequence = match self.cb.insert_string(position, &payload) {
            Some(start_sequence) => start_sequence,
            None => {
                self.entered_modification -= 1;
                return 0;
            }
        };
        if start_save_point && self.cb.is_collecting_undo() {
            self.notify_save_point(false);
        }
        self.modified_at(position);
        self.notify_modified(&DocModification {
            modification_type: MOD_INSERTTEXT
                | PERFORMED_USER
                | if start_sequence { STARTACTION } else { 0 },
            position,
            length: payload.len() as Position,
            lines_added: self.lines_total() - prev_lines_total,
            text: Some(&payload),
            ..Default::default()
        });
        self.insertion_set = false;
        self.entered_modification -= 1;
        payload.len() as Position
    }

    /// During a `MOD_INSERTCHECK` notification, replace the text about to
    /// be inserted.
    pub fn change_insertion(&mut self, s: &[u8]) {
        self.insertion_set = true;
        self.insertion.clear();
        self.insertion.extend_from_slice(s);
    }

    /// Delete `[position, position + delete_length)`. Returns whether the
    /// deletion happened.
    pub fn delete_chars(&mut self, position: Position, delete_length: Position) -> bool {
        if delete_length <= 0 || position < 0 || position + delete_length > self.length() {
            return false;
        }
        if self.entered_modification != 0 {
            return false;
        }
        if !self.check_read_only() {
            return false;
        }
        self.entered_modification += 1;
        let prev_lines_total = self.lines_total();
        let start_save_point = self.cb.is_save_point();
        self.notify_modified(&DocModification {
            modification_type: MOD_BEFOREDELETE | PERFORMED_USER,
            position,
            length: delete_length,
            ..Default::default()
        });
        let outcome = self.cb.delete_chars(position, delete_length);
        let deleted = match outcome {
            Some((data, start_sequence)) => {
                if start_save_point && self.cb.is_collecting_undo() {
                    self.notify_save_point(false);
                }
                self.modified_at(position);
                self.notify_modified(&DocModification {
                    modification_type: MOD_DELETETEXT
                        | PERFORMED_USER
                        | if start_sequence { STARTACTION } else { 0 },
                    position,
                    length: delete_length,
                    lines_added: self.lines_total() - prev_lines_total,
                    text: Some(&data),
                    ..Default::default()
                });
                true
            }
            None => false,
        };
        self.entered_modification -= 1;
        deleted
    }

    /// Convert every line terminator to `eol_mode` as one undo group.
    pub fn convert_line_ends(&mut self, eol_mode: EolMode) {
        let mut ug = UndoGroup::new(self, true);
        let mut pos = 0;
        while pos < ug.length() {
            let ch = ug.cb.char_at(pos);
            if ch == b'\r' {
                if ug.cb.char_at(pos + 1) == b'\n' {
                    match eol_mode {
                        EolMode::Cr => {
                            ug.delete_chars(pos + 1, 1); // Delete the LF.
                        }
                        EolMode::Lf => {
                            ug.delete_chars(pos, 1); // Delete the CR.
                        }
                        EolMode::CrLf => {
                            pos += 1;
                        }
                    }
                } else {
                    match eol_mode {
                        EolMode::CrLf => {
                            ug.insert_string(pos + 1, b"\n");
                            pos += 1;
                        }
                        EolMode::Lf => {
                            ug.insert_string(pos, b"\n");
                            ug.delete_chars(pos + 1, 1); // Delete the CR.
                        }
                        EolMode::Cr => {}
                    }
                }
            } else if ch == b'\n' {
                match eol_mode {
                    EolMode::CrLf => {
                        ug.insert_string(pos, b"\r");
                        pos += 1;
                    }
                    EolMode::Cr => {
                        ug.insert_string(pos, b"\r");
                        ug.delete_chars(pos + 1, 1); // Delete the LF.
                    }
                    EolMode::Lf => {}
                }
            }
            pos += 1;
        }
    }

    // ---- undo and redo ----------------------------------------------------

    /// Whether an undo step is available.
    pub fn can_undo(&self) -> bool {
        self.cb.can_undo()
    }

    /// Whether a redo step is available.
    pub fn can_redo(&self) -> bool {
        self.cb.can_redo()
    }

    /// Undo one user-visible step. Returns a position near the change, or
    /// -1 when nothing was undone.
    pub fn undo(&mut self) -> Position {
        let mut new_pos = -1;
        self.check_read_only();
        if self.entered_modification == 0 && self.cb.is_collecting_undo() {
            self.entered_modification += 1;
            if !self.cb.is_read_only() {
                let start_save_point = self.cb.is_save_point();
                let mut multi_line = false;
                let steps = self.cb.start_undo();
                let mut coalesced_remove_pos: Position = -1;
                let mut coalesced_remove_len: Position = 0;
                let mut prev_remove_pos: Position = -1;
                let mut prev_remove_len: Position = 0;
                for step in 0..steps {
                    let prev_lines_total = self.lines_total();
                    let action = self.cb.undo_step();
                    match action.at {
                        ActionKind::Remove => {
                            self.notify_modified(&DocModification {
                                modification_type: MOD_BEFOREINSERT | PERFORMED_UNDO,
                                position: action.position,
                                length: action.len_data,
                                text: Some(&action.data),
                                ..Default::default()
                            });
                        }
                        ActionKind::Container => {
                            self.notify_modified(&DocModification {
                                modification_type: MOD_CONTAINER | PERFORMED_UNDO,
                                token: action.position,
                                ..Default::default()
                            });
                            if !action.may_coalesce {
                                coalesced_remove_pos = -1;
                                coalesced_remove_len = 0;
                                prev_remove_pos = -1;
                                prev_remove_len = 0;
                            }
                        }
                        _ => {
                            self.notify_modified(&DocModification {
                                modification_type: MOD_BEFOREDELETE | PERFORMED_UNDO,
                                position: action.position,
                                length: action.len_data,
                                ..Default::default()
                            });
                        }
                    }
                    self.cb.perform_undo_step();
                    if action.at != ActionKind::Container {
                        self.modified_at(action.position);
                        new_pos = action.position;
                    }
                    let mut mod_flags = PERFORMED_UNDO;
                    if action.at == ActionKind::Remove {
                        // Undoing a removal re-inserts the text.
                        new_pos += action.len_data;
                        mod_flags |= MOD_INSERTTEXT;
                        if coalesced_remove_len > 0
                            && (action.position == prev_remove_pos
                                || action.position == prev_remove_pos + prev_remove_len)
                        {
                            coalesced_remove_len += action.len_data;
                            new_pos = coalesced_remove_pos + coalesced_remove_len;
                        } else {
                            coalesced_remove_pos = action.position;
                            coalesced_remove_len = action.len_data;
                        }
                        prev_remove_pos = action.position;
                        prev_remove_len = action.len_data;
                    } else if action.at == ActionKind::Insert {
                        mod_flags |= MOD_DELETETEXT;
                        coalesced_remove_pos = -1;
                        coalesced_remove_len = 0;
                        prev_remove_pos = -1;
                        prev_remove_len = 0;
                    }
                    if steps > 1 {
                        mod_flags |= MULTISTEPUNDOREDO;
                    }
                    let lines_added = self.lines_total() - prev_lines_total;
                    if lines_added != 0 {
                        multi_line = true;
                    }
                    if step == steps - 1 {
                        mod_flags |= LASTSTEPINUNDOREDO;
                        if multi_line {
                            mod_flags |= MULTILINEUNDOREDO;
                        }
                    }
                    self.notify_modified(&DocModification {
                        modification_type: mod_flags,
                        position: action.position,
                        length: action.len_data,
                        lines_added,
                        text: Some(&action.data),
                        ..Default::default()
                    });
                }
                let end_save_point = self.cb.is_save_point();
                if start_save_point != end_save_point {
                    self.notify_save_point(end_save_point);
                }
            }
            self.entered_modification -= 1;
        }
        new_pos
    }

    /// Redo one user-visible step. Returns a position near the change, or
    /// -1 when nothing was redone.
    pub fn redo(&mut self) -> Position {
        let mut new_pos = -1;
        self.check_read_only();
        if self.entered_modification == 0 && self.cb.is_collecting_undo() {
            self.entered_modification += 1;
            if !self.cb.is_read_only() {
                let start_save_point = self.cb.is_save_point();
                let mut multi_line = false;
                let steps = self.cb.start_redo();
                for step in 0..steps {
                    let prev_lines_total = self.lines_total();
                    let action = self.cb.redo_step();
                    match action.at {
                        ActionKind::Insert => {
                            self.notify_modified(&DocModification {
                                modification_type: MOD_BEFOREINSERT | PERFORMED_REDO,
                                position: action.position,
                                length: action.len_data,
                                text: Some(&action.data),
                                ..Default::default()
                            });
                        }
                        ActionKind::Container => {
                            self.notify_modified(&DocModification {
                                modification_type: MOD_CONTAINER | PERFORMED_REDO,
                                token: action.position,
                                ..Default::default()
                            });
                        }
                        _ => {
                            self.notify_modified(&DocModification {
                                modification_type: MOD_BEFOREDELETE | PERFORMED_REDO,
                                position: action.position,
                                length: action.len_data,
                                ..Default::default()
                            });
                        }
                    }
                    self.cb.perform_redo_step();
                    if action.at != ActionKind::Container {
                        self.modified_at(action.position);
                        new_pos = action.position;
                    }
                    let mut mod_flags = PERFORMED_REDO;
                    if action.at == ActionKind::Insert {
                        new_pos += action.len_data;
                        mod_flags |= MOD_INSERTTEXT;
                    } else if action.at == ActionKind::Remove {
                        mod_flags |= MOD_DELETETEXT;
                    }
                    if steps > 1 {
                        mod_flags |= MULTISTEPUNDOREDO;
                    }
                    let lines_added = self.lines_total() - prev_lines_total;
                    if lines_added != 0 {
                        multi_line = true;
                    }
                    if step == steps - 1 {
                        mod_flags |= LASTSTEPINUNDOREDO;
                        if multi_line {
                            mod_flags |= MULTILINEUNDOREDO;
                        }
                    }
                    self.notify_modified(&DocModification {
                        modification_type: mod_flags,
                        position: action.position,
                        length: action.len_data,
                        lines_added,
                        text: Some(&action.data),
                        ..Default::default()
                    });
                }
                let end_save_point = self.cb.is_save_point();
                if start_save_point != end_save_point {
                    self.notify_save_point(end_save_point);
                }
            }
            self.entered_modification -= 1;
        }
        new_pos
    }

    /// Open an explicit undo group.
    pub fn begin_undo_action(&mut self) {
        self.cb.begin_undo_action();
    }

    /// Close an explicit undo group.
    pub fn end_undo_action(&mut self) {
        self.cb.end_undo_action();
    }

    /// Record a container action in the undo history.
    pub fn add_undo_action(&mut self, token: Position, may_coalesce: bool) {
        if self.cb.is_collecting_undo() {
            self.cb.add_undo_action(token, may_coalesce);
        }
    }

    /// Whether undo collection is on.
    pub fn is_collecting_undo(&self) -> bool {
        self.cb.is_collecting_undo()
    }

    /// Turn undo collection on or off.
    pub fn set_undo_collection(&mut self, collect_undo: bool) {
        self.cb.set_undo_collection(collect_undo);
    }

    /// Drop the whole undo history.
    pub fn delete_undo_history(&mut self) {
        self.cb.delete_undo_history();
    }

    /// Begin a tentative (input composition) sequence.
    pub fn tentative_start(&mut self) {
        self.cb.tentative_start();
    }

    /// Accept the tentative sequence.
    pub fn tentative_commit(&mut self) {
        self.cb.tentative_commit();
    }

    /// Whether a tentative sequence is open.
    pub fn tentative_active(&self) -> bool {
        self.cb.tentative_active()
    }

    /// Roll back the whole tentative sequence as one unit.
    pub fn tentative_undo(&mut self) {
        if !self.tentative_active() {
            return;
        }
        self.check_read_only();
        if self.entered_modification == 0 && self.cb.is_collecting_undo() {
            self.entered_modification += 1;
            if !self.cb.is_read_only() {
                let start_save_point = self.cb.is_save_point();
                let mut multi_line = false;
                let steps = self.cb.tentative_steps();
                for step in 0..steps {
                    let prev_lines_total = self.lines_total();
                    let action = self.cb.undo_step();
                    match action.at {
                        ActionKind::Remove => {
                            self.notify_modified(&DocModification {
                                modification_type: MOD_BEFOREINSERT | PERFORMED_UNDO,
                                position: action.position,
                                length: action.len_data,
                                text: Some(&action.data),
                                ..Default::default()
                            });
                        }
                        ActionKind::Container => {}
                        _ => {
                            self.notify_modified(&DocModification {
                                modification_type: MOD_BEFOREDELETE | PERFORMED_UNDO,
                                position: action.position,
                                length: action.len_data,
                                ..Default::default()
                            });
                        }
                    }
                    self.cb.perform_undo_step();
                    let mut mod_flags = PERFORMED_UNDO;
                    if action.at == ActionKind::Remove {
                        mod_flags |= MOD_INSERTTEXT;
                    } else if action.at == ActionKind::Insert {
                        mod_flags |= MOD_DELETETEXT;
                    }
                    if action.at != ActionKind::Container {
                        self.modified_at(action.position);
                    }
                    if steps > 1 {
                        mod_flags |= MULTISTEPUNDOREDO;
                    }
                    let lines_added = self.lines_total() - prev_lines_total;
                    if lines_added != 0 {
                        multi_line = true;
                    }
                    if step == steps - 1 {
                        mod_flags |= LASTSTEPINUNDOREDO;
                        if multi_line {
                            mod_flags |= MULTILINEUNDOREDO;
                        }
                    }
                    self.notify_modified(&DocModification {
                        modification_type: mod_flags,
                        position: action.position,
                        length: action.len_data,
                        lines_added,
                        text: Some(&action.data),
                        ..Default::default()
                    });
                }
                if start_save_point != self.cb.is_save_point() {
                    self.notify_save_point(self.cb.is_save_point());
                }
                self.cb.tentative_commit();
            }
            self.entered_modification -= 1;
        }
    }

    // ---- styling ----------------------------------------------------------

    /// One past the last styled position.
    pub fn get_end_styled(&self) -> Position {
        self.end_styled
    }

    /// Incremented whenever styling restarts; containers use it to drop
    /// cached layout.
    pub fn style_clock(&self) -> i32 {
        self.style_clock
    }

    fn increment_style_clock(&mut self) {
        self.style_clock = (self.style_clock + 1) % 0x100000;
    }

    fn modified_at(&mut self, position: Position) {
        if self.end_styled > position {
            self.end_styled = position;
        }
    }

    /// Begin a styling run at `position`.
    pub fn start_styling(&mut self, position: Position) {
        self.end_styled = position;
    }

    /// Style the next `length` bytes with `style`. Returns false during a
    /// styling callback re-entry.
    pub fn set_style_for(&mut self, length: Position, style: u8) -> bool {
        if self.entered_styling != 0 {
            return false;
        }
        self.entered_styling += 1;
        let prev_end_styled = self.end_styled;
        if self.cb.set_style_for(self.end_styled, length, style) {
            self.notify_modified(&DocModification {
                modification_type: MOD_CHANGESTYLE | PERFORMED_USER,
                position: prev_end_styled,
                length,
                ..Default::default()
            });
        }
        self.end_styled += length;
        self.entered_styling -= 1;
        true
    }

    /// Style the next `styles.len()` bytes individually.
    pub fn set_styles(&mut self, styles: &[u8]) -> bool {
        if self.entered_styling != 0 {
            return false;
        }
        self.entered_styling += 1;
        let mut did_change = false;
        let mut start_mod = 0;
        let mut end_mod = 0;
        for &style in styles {
            if self.cb.set_style_at(self.end_styled, style) {
                if !did_change {
                    start_mod = self.end_styled;
                }
                did_change = true;
                end_mod = self.end_styled;
            }
            self.end_styled += 1;
        }
        if did_change {
            self.notify_modified(&DocModification {
                modification_type: MOD_CHANGESTYLE | PERFORMED_USER,
                position: start_mod,
                length: end_mod - start_mod + 1,
                ..Default::default()
            });
        }
        self.entered_styling -= 1;
        true
    }

    /// Attach (or detach) a lexer. Lexer-owned decorations are dropped and
    /// the whole document is marked for restyling.
    pub fn set_lexer(&mut self, lexer: Option<Box<dyn Lexer>>) {
        self.lexer = lexer;
        self.decorations.delete_lexer_decorations();
        let active = self.line_end_bit_set & self.line_end_types_supported();
        self.cb.set_utf8_line_ends(active & line_end_type::UNICODE != 0);
        self.modified_at(0);
    }

    /// Whether a lexer is attached.
    pub fn has_lexer(&self) -> bool {
        self.lexer.is_some()
    }

    /// Forward a property to the lexer; styling restarts at the first
    /// affected line.
    pub fn lexer_property_set(&mut self, key: &str, value: &str) {
        if let Some(mut lexer) = self.lexer.take() {
            let first_affected = lexer.property_set(key, value);
            self.lexer = Some(lexer);
            if first_affected >= 0 {
                self.modified_at(self.line_start(first_affected));
            }
        }
    }

    /// Forward a keyword list to the lexer.
    pub fn lexer_word_list_set(&mut self, n: i32, word_list: &str) {
        if let Some(mut lexer) = self.lexer.take() {
            let first_affected = lexer.word_list_set(n, word_list);
            self.lexer = Some(lexer);
            if first_affected >= 0 {
                self.modified_at(self.line_start(first_affected));
            }
        }
    }

    /// Ensure styles are valid up to `pos`, either by running the lexer or
    /// by asking watchers to style.
    pub fn ensure_styled_to(&mut self, pos: Position) {
        if self.entered_styling == 0 && !self.performing_style && pos > self.get_end_styled() {
            self.increment_style_clock();
            if self.lexer.is_some() {
                // Start at the line home so the lexer sees whole lines.
                let line_end_styled = self.line_from_position(self.get_end_styled());
                let end_styled_to = self.line_start(line_end_styled);
                self.colourise(end_styled_to, pos);
            } else {
                self.notify_style_needed(pos);
            }
        }
    }

    /// Run the attached lexer (and its folder) over `[start, end)`.
    /// An `end` of -1 means the whole document.
    pub fn colourise(&mut self, start: Position, end: Position) {
        if self.performing_style {
            return;
        }
        if let Some(mut lexer) = self.lexer.take() {
            self.performing_style = true;
            let end = if end < 0 { self.length() } else { end.min(self.length()) };
            if start < end {
                let init_style = if start > 0 { self.style_at(start - 1) } else { 0 } as i32;
                self.start_styling(start);
                lexer.lex(start, end - start, init_style, self);
                lexer.fold(start, end - start, init_style, self);
            }
            self.lexer = Some(lexer);
            self.performing_style = false;
        }
    }

    // ---- markers ----------------------------------------------------------

    /// Bit mask of markers on `line`.
    pub fn get_mark(&self, line: Position) -> u32 {
        self.per_line.borrow().markers.mark_value(line)
    }

    /// Add marker `marker_num` to `line`; returns its handle or -1.
    pub fn add_mark(&mut self, line: Position, marker_num: i32) -> i32 {
        if line < 0 || line > self.lines_total() {
            return -1;
        }
        let lines = self.lines_total();
        let handle = self.per_line.borrow_mut().markers.add_mark(line, marker_num, lines);
        self.notify_modified(&DocModification {
            modification_type: MOD_CHANGEMARKER,
            position: self.line_start(line),
            line,
            ..Default::default()
        });
        handle
    }

    /// Delete markers numbered `marker_num` from `line` (-1 for all).
    pub fn delete_mark(&mut self, line: Position, marker_num: i32) {
        let changed = self.per_line.borrow_mut().markers.delete_mark(line, marker_num, false);
        if changed {
            self.notify_modified(&DocModification {
                modification_type: MOD_CHANGEMARKER,
                position: self.line_start(line),
                line,
                ..Default::default()
            });
        }
    }

    /// Delete every marker numbered `marker_num` (-1 for all) on all lines.
    pub fn delete_all_marks(&mut self, marker_num: i32) {
        let mut some_changes = false;
        {
            let mut pl = self.per_line.borrow_mut();
            for line in 0..self.cb.lines() {
                if pl.markers.delete_mark(line, marker_num, true) {
                    some_changes = true;
                }
            }
        }
        if some_changes {
            self.notify_modified(&DocModification {
                modification_type: MOD_CHANGEMARKER,
                ..Default::default()
            });
        }
    }

    /// Remove the marker placement identified by `handle`.
    pub fn delete_mark_from_handle(&mut self, handle: i32) {
        self.per_line.borrow_mut().markers.delete_mark_from_handle(handle);
        self.notify_modified(&DocModification {
            modification_type: MOD_CHANGEMARKER,
            ..Default::default()
        });
    }

    /// Line carrying the marker placement `handle`, or -1.
    pub fn line_from_handle(&self, handle: i32) -> Position {
        self.per_line.borrow().markers.line_from_handle(handle)
    }

    /// First line at or after `line_start` with a marker in `mask`, or -1.
    pub fn marker_next(&self, line_start: Position, mask: u32) -> Position {
        self.per_line.borrow().markers.marker_next(line_start, mask)
    }

    // ---- fold levels ------------------------------------------------------

    /// Fold level of `line`.
    pub fn get_level(&self, line: Position) -> i32 {
        self.per_line.borrow().levels.get_level(line)
    }

    /// Set the fold level of `line`, notifying on change. Returns the
    /// previous level.
    pub fn set_level(&mut self, line: Position, level: i32) -> i32 {
        let lines = self.lines_total();
        let prev = self.per_line.borrow_mut().levels.set_level(line, level, lines);
        if prev != level {
            self.notify_modified(&DocModification {
                modification_type: MOD_CHANGEFOLD | MOD_CHANGEMARKER,
                position: self.line_start(line),
                line,
                fold_level_now: level,
                fold_level_prev: prev,
                ..Default::default()
            });
        }
        prev
    }

    /// Last line that is a child of the fold header at `line_parent`.
    /// `level` of -1 uses the header's own level; `last_line` bounds the
    /// lookahead for partially folded ranges (-1 for none).
    pub fn get_last_child(&mut self, line_parent: Position, level: i32, last_line: Position) -> Position {
        let level = if level == -1 { level_number(self.get_level(line_parent)) } else { level };
        let max_line = self.lines_total();
        let look_last_line = if last_line != -1 { last_line.min(max_line - 1) } else { -1 };
        let mut line_max_subord = line_parent;
        while line_max_subord < max_line - 1 {
            self.ensure_styled_to(self.line_start(line_max_subord + 2));
            if !is_subordinate(level, self.get_level(line_max_subord + 1)) {
                break;
            }
            if look_last_line != -1
                && line_max_subord >= look_last_line
                && self.get_level(line_max_subord) & FOLD_LEVEL_WHITE_FLAG == 0
            {
                break;
            }
            line_max_subord += 1;
        }
        if line_max_subord > line_parent {
            if level > level_number(self.get_level(line_max_subord + 1)) {
                // Chewed up whitespace belonging to a parent; back off.
                if self.get_level(line_max_subord) & FOLD_LEVEL_WHITE_FLAG != 0 {
                    line_max_subord -= 1;
                }
            }
        }
        line_max_subord
    }

    /// Nearest earlier fold header whose level is below `line`'s, or -1.
    pub fn get_fold_parent(&self, line: Position) -> Position {
        let level = level_number(self.get_level(line));
        let mut line_look = line - 1;
        while line_look > 0
            && (self.get_level(line_look) & FOLD_LEVEL_HEADER_FLAG == 0
                || level_number(self.get_level(line_look)) >= level)
        {
            line_look -= 1;
        }
        if self.get_level(line_look) & FOLD_LEVEL_HEADER_FLAG != 0
            && level_number(self.get_level(line_look)) < level
        {
            line_look
        } else {
            -1
        }
    }

    /// Compute the fold block around `line` for margin highlighting.
    /// `last_line` bounds the lookahead as in `get_last_child`.
    pub fn get_highlight_delimiters(&mut self, line: Position, last_line: Position) -> HighlightDelimiter {
        let mut hd = HighlightDelimiter::default();
        let level = self.get_level(line);
        let look_last_line = line.max(last_line) + 1;

        let mut look_line = line;
        let mut look_line_level = level;
        let mut look_line_level_num = level_number(look_line_level);
        while look_line > 0
            && (look_line_level & FOLD_LEVEL_WHITE_FLAG != 0
                || (look_line_level & FOLD_LEVEL_HEADER_FLAG != 0
                    && look_line_level_num >= level_number(self.get_level(look_line + 1))))
        {
            look_line -= 1;
            look_line_level = self.get_level(look_line);
            look_line_level_num = level_number(look_line_level);
        }

        let mut begin_fold_block = if look_line_level & FOLD_LEVEL_HEADER_FLAG != 0 {
            look_line
        } else {
            self.get_fold_parent(look_line)
        };
        if begin_fold_block == -1 {
            return hd;
        }

        let mut end_fold_block = self.get_last_child(begin_fold_block, -1, look_last_line);
        let mut first_changeable_line_before = -1;
        if end_fold_block < line {
            let mut look_line = begin_fold_block - 1;
            let mut look_line_level = self.get_level(look_line);
            let mut look_line_level_num = level_number(look_line_level);
            while look_line >= 0 && look_line_level_num >= FOLD_LEVEL_BASE {
                if look_line_level & FOLD_LEVEL_HEADER_FLAG != 0 {
                    if self.get_last_child(look_line, -1, look_last_line) == line {
                        begin_fold_block = look_line;
                        end_fold_block = line;
                        first_changeable_line_before = line - 1;
                    }
                }
                if look_line > 0
                    && look_line_level_num == FOLD_LEVEL_BASE
                    && level_number(self.get_level(look_line - 1)) > look_line_level_num
                {
                    break;
                }
                look_line -= 1;
                look_line_level = self.get_level(look_line);
                look_line_level_num = level_number(look_line_level);
            }
        }
        if first_changeable_line_before == -1 {
            let mut look_line = line - 1;
            while look_line >= begin_fold_block {
                let look_line_level = self.get_level(look_line);
                let look_line_level_num = level_number(look_line_level);
                if look_line_level & FOLD_LEVEL_WHITE_FLAG != 0
                    || look_line_level_num > level_number(level)
                {
                    first_changeable_line_before = look_line;
                    break;
                }
                look_line -= 1;
            }
        }
        if first_changeable_line_before == -1 {
            first_changeable_line_before = begin_fold_block - 1;
        }

        let mut first_changeable_line_after = -1;
        let mut look_line = line + 1;
        while look_line <= end_fold_block {
            let look_line_level = self.get_level(look_line);
            let look_line_level_num = level_number(look_line_level);
            if look_line_level & FOLD_LEVEL_HEADER_FLAG != 0
                && look_line_level_num < level_number(self.get_level(look_line + 1))
            {
                first_changeable_line_after = look_line;
                break;
            }
            look_line += 1;
        }
        if first_changeable_line_after == -1 {
            first_changeable_line_after = end_fold_block + 1;
        }

        hd.begin_fold_block = begin_fold_block;
        hd.end_fold_block = end_fold_block;
        hd.first_changeable_line_before = first_changeable_line_before;
        hd.first_changeable_line_after = first_changeable_line_after;
        hd
    }

    // ---- line state -------------------------------------------------------

    /// Set the lexer state of `line`, notifying on change. Returns the
    /// previous state.
    pub fn set_line_state(&mut self, line: Position, state: i32) -> i32 {
        let prev = self.per_line.borrow_mut().state.set_line_state(line, state);
        if state != prev {
            self.notify_modified(&DocModification {
                modification_type: MOD_CHANGELINESTATE,
                position: self.line_start(line),
                line,
                ..Default::default()
            });
        }
        prev
    }

    /// Lexer state of `line`.
    pub fn get_line_state(&self, line: Position) -> i32 {
        self.per_line.borrow_mut().state.get_line_state(line)
    }

    /// One past the last line that may carry state.
    pub fn get_max_line_state(&self) -> Position {
        self.per_line.borrow().state.get_max_line_state()
    }

    /// Notify that internal lexer state changed over `[start, end)`.
    pub fn change_lexer_state(&mut self, start: Position, end: Position) {
        self.notify_modified(&DocModification {
            modification_type: MOD_LEXERSTATE,
            position: start,
            length: end - start,
            ..Default::default()
        });
    }

    // ---- annotations and margin text --------------------------------------

    /// Annotation text of `line`.
    pub fn annotation_text(&self, line: Position) -> Vec<u8> {
        self.per_line.borrow().annotations.text(line).to_vec()
    }

    /// Per-byte annotation styles of `line`.
    pub fn annotation_styles(&self, line: Position) -> Vec<u8> {
        self.per_line.borrow().annotations.styles(line).to_vec()
    }

    /// Single annotation style of `line`.
    pub fn annotation_style(&self, line: Position) -> u8 {
        self.per_line.borrow().annotations.style(line)
    }

    /// Display lines occupied by `line`'s annotation.
    pub fn annotation_lines(&self, line: Position) -> i32 {
        self.per_line.borrow().annotations.lines(line)
    }

    /// Replace the annotation text of `line`.
    pub fn annotation_set_text(&mut self, line: Position, text: &[u8]) {
        if line < 0 || line >= self.lines_total() {
            return;
        }
        let lines_added = self.per_line.borrow_mut().annotations.set_text(line, text);
        self.notify_modified(&DocModification {
            modification_type: MOD_CHANGEANNOTATION,
            position: self.line_start(line),
            line,
            annotation_lines_added: lines_added as Position,
            ..Default::default()
        });
    }

    /// Set the single style of `line`'s annotation.
    pub fn annotation_set_style(&mut self, line: Position, style: u8) {
        self.per_line.borrow_mut().annotations.set_style(line, style);
        self.notify_modified(&DocModification {
            modification_type: MOD_CHANGEANNOTATION,
            position: self.line_start(line),
            line,
            ..Default::default()
        });
    }

    /// Attach per-byte styles to `line`'s annotation.
    pub fn annotation_set_styles(&mut self, line: Position, styles: &[u8]) {
        if line >= 0 && line < self.lines_total() {
            self.per_line.borrow_mut().annotations.set_styles(line, styles);
        }
    }

    /// Remove every annotation.
    pub fn annotation_clear_all(&mut self) {
        if self.lines_total() <= 0 {
            return;
        }
        let max_editor_line = self.lines_total();
        for line in 0..max_editor_line {
            self.annotation_set_text(line, b"");
        }
        self.per_line.borrow_mut().annotations.clear_all();
    }

    /// Margin text of `line`.
    pub fn margin_text(&self, line: Position) -> Vec<u8> {
        self.per_line.borrow().margins.text(line).to_vec()
    }

    /// Margin style of `line`.
    pub fn margin_style(&self, line: Position) -> u8 {
        self.per_line.borrow().margins.style(line)
    }

    /// Per-byte margin styles of `line`.
    pub fn margin_styles(&self, line: Position) -> Vec<u8> {
        self.per_line.borrow().margins.styles(line).to_vec()
    }

    /// Replace the margin text of `line`.
    pub fn margin_set_text(&mut self, line: Position, text: &[u8]) {
        self.per_line.borrow_mut().margins.set_text(line, text);
        self.notify_modified(&DocModification {
            modification_type: MOD_CHANGEMARGIN,
            position: self.line_start(line),
            line,
            ..Default::default()
        });
    }

    /// Set the single margin style of `line`.
    pub fn margin_set_style(&mut self, line: Position, style: u8) {
        self.per_line.borrow_mut().margins.set_style(line, style);
        self.notify_modified(&DocModification {
            modification_type: MOD_CHANGEMARGIN,
            position: self.line_start(line),
            line,
            ..Default::default()
        });
    }

    /// Attach per-byte styles to `line`'s margin text.
    pub fn margin_set_styles(&mut self, line: Position, styles: &[u8]) {
        self.per_line.borrow_mut().margins.set_styles(line, styles);
    }

    /// Remove every margin text.
    pub fn margin_clear_all(&mut self) {
        let max_editor_line = self.lines_total();
        for line in 0..max_editor_line {
            self.margin_set_text(line, b"");
        }
        self.per_line.borrow_mut().margins.clear_all();
    }

    // ---- decorations ------------------------------------------------------

    /// Select the indicator that `decoration_fill_range` writes to.
    pub fn decoration_set_current_indicator(&mut self, indicator: i32) {
        self.decorations.set_current_indicator(indicator);
    }

    /// Fill a range of the current indicator, notifying on change.
    pub fn decoration_fill_range(&mut self, position: Position, value: i32, fill_length: Position) {
        if let Some(fr) = self.decorations.fill_range(position, value, fill_length) {
            self.notify_modified(&DocModification {
                modification_type: MOD_CHANGEINDICATOR | PERFORMED_USER,
                position: fr.position,
                length: fr.fill_length,
                ..Default::default()
            });
        }
    }

    /// The decoration list, for container-side queries.
    pub fn decorations(&self) -> &DecorationList {
        &self.decorations
    }

    // ---- watchers ---------------------------------------------------------

    /// Register a watcher. Idempotent on the `(watcher, user_data)` pair.
    pub fn add_watcher(&mut self, watcher: Rc<RefCell<dyn DocWatcher>>, user_data: usize) -> bool {
        let exists = self
            .watchers
            .iter()
            .any(|w| Rc::ptr_eq(&w.watcher, &watcher) && w.user_data == user_data);
        if exists {
            return false;
        }
        self.watchers.push(WatcherWithUserData { watcher, user_data });
        true
    }

    /// Remove a watcher registered with `add_watcher`.
    pub fn remove_watcher(&mut self, watcher: &Rc<RefCell<dyn DocWatcher>>, user_data: usize) -> bool {
        let before = self.watchers.len();
        self.watchers
            .retain(|w| !(Rc::ptr_eq(&w.watcher, watcher) && w.user_data == user_data));
        self.watchers.len() != before
    }

    fn notify_modify_attempt(&mut self) {
        let watchers = self.watchers.clone();
        for w in watchers {
            w.watcher.borrow_mut().notify_modify_attempt(self);
        }
    }

    fn notify_save_point(&mut self, at_save_point: bool) {
        let watchers = self.watchers.clone();
        for w in watchers {
            w.watcher.borrow_mut().notify_save_point(self, at_save_point);
        }
    }

    fn notify_style_needed(&mut self, end_pos: Position) {
        let watchers = self.watchers.clone();
        for w in watchers {
            w.watcher.borrow_mut().notify_style_needed(self, end_pos);
        }
    }

    /// Report an internal failure to watchers.
    pub fn notify_error_occurred(&mut self, status: Status) {
        let watchers = self.watchers.clone();
        for w in watchers {
            w.watcher.borrow_mut().notify_error_occurred(self, status);
        }
    }

    fn notify_modified(&mut self, mh: &DocModification<'_>) {
        if mh.modification_type & MOD_INSERTTEXT != 0 {
            self.decorations.insert_space(mh.position, mh.length);
        } else if mh.modification_type & MOD_DELETETEXT != 0 {
            self.decorations.delete_range(mh.position, mh.length);
        }
        let watchers = self.watchers.clone();
        for w in watchers {
            w.watcher.borrow_mut().notify_modified(self, mh);
        }
    }

    // ---- character navigation ---------------------------------------------

    /// Snap `pos` outside any multi-byte character, in direction
    /// `move_dir`. With `check_line_end`, also snap outside a CRLF pair.
    pub fn move_position_outside_char(
        &self,
        pos: Position,
        move_dir: Position,
        check_line_end: bool,
    ) -> Position {
        if pos <= 0 {
            return 0;
        }
        if pos >= self.length() {
            return self.length();
        }
        if check_line_end && self.is_crlf(pos - 1) {
            if move_dir > 0 {
                return pos + 1;
            } else {
                return pos - 1;
            }
        }
        if self.dbcs_code_page != 0 {
            if self.dbcs_code_page == CP_UTF8 {
                let ch = self.cb.char_at(pos);
                if utf8_is_trail_byte(ch) {
                    if let Some((start_utf, end_utf)) = self.in_good_utf8(pos) {
                        return if move_dir > 0 { end_utf } else { start_utf };
                    }
                    // Isolated trail byte: position is valid.
                }
            } else if self.is_dbcs() {
                // Anchor at the line start: a line start is never a trail
                // byte.
                let pos_start_line = self.line_start(self.line_from_position(pos));
                if pos == pos_start_line {
                    return pos;
                }
                let mut pos_check = pos;
                while pos_check > pos_start_line && self.is_dbcs_lead_byte_at(self.cb.char_at(pos_check - 1))
                {
                    pos_check -= 1;
                }
                while pos_check < pos {
                    let mbsize: Position =
                        if self.is_dbcs_lead_byte_at(self.cb.char_at(pos_check)) { 2 } else { 1 };
                    if pos_check + mbsize == pos {
                        return pos;
                    } else if pos_check + mbsize > pos {
                        return if move_dir > 0 { pos_check + mbsize } else { pos_check };
                    }
                    pos_check += mbsize;
                }
            }
        }
        pos
    }

    /// The start and end of the valid UTF-8 sequence containing the trail
    /// byte at `pos`, when there is one.
    fn in_good_utf8(&self, pos: Position) -> Option<(Position, Position)> {
        let mut trail = pos;
        while trail > 0
            && pos - trail < UTF8_MAX_BYTES as Position
            && utf8_is_trail_byte(self.cb.char_at(trail - 1))
        {
            trail -= 1;
        }
        let start = if trail > 0 { trail - 1 } else { trail };
        let lead_byte = self.cb.char_at(start);
        let width_char_bytes = UTF8_BYTES_OF_LEAD[lead_byte as usize] as Position;
        if width_char_bytes == 1 {
            return None;
        }
        let trail_bytes = width_char_bytes - 1;
        if pos - start > trail_bytes {
            return None;
        }
        let mut char_bytes = [0u8; UTF8_MAX_BYTES];
        char_bytes[0] = lead_byte;
        for b in 1..width_char_bytes {
            char_bytes[b as usize] = self.cb.char_at(start + b);
        }
        let utf8_status = utf8_classify(&char_bytes[..width_char_bytes as usize]);
        if utf8_status & UTF8_MASK_INVALID != 0 {
            None
        } else {
            Some((start, start + width_char_bytes))
        }
    }

    /// Next valid character position from `pos` in direction `move_dir`.
    /// Returns `pos` unchanged at the buffer boundary.
    pub fn next_position(&self, pos: Position, move_dir: Position) -> Position {
        let increment: Position = if move_dir > 0 { 1 } else { -1 };
        if pos + increment <= 0 {
            return 0;
        }
        if pos + increment >= self.length() {
            return self.length();
        }
        let mut pos = pos;
        if self.dbcs_code_page != 0 {
            if self.dbcs_code_page == CP_UTF8 {
                if increment == 1 {
                    let lead_byte = self.cb.char_at(pos);
                    if utf8_is_ascii(lead_byte) {
                        pos += 1;
                    } else {
                        let width_char_bytes = UTF8_BYTES_OF_LEAD[lead_byte as usize] as usize;
                        let mut char_bytes = [0u8; UTF8_MAX_BYTES];
                        char_bytes[0] = lead_byte;
                        for b in 1..width_char_bytes {
                            char_bytes[b] = self.cb.char_at(pos + b as Position);
                        }
                        let utf8_status = utf8_classify(&char_bytes[..width_char_bytes]);
                        if utf8_status & UTF8_MASK_INVALID != 0 {
                            pos += 1;
                        } else {
                            pos += (utf8_status & UTF8_MASK_WIDTH) as Position;
                        }
                    }
                } else {
                    pos -= 1;
                    let ch = self.cb.char_at(pos);
                    if utf8_is_trail_byte(ch) {
                        if let Some((start_utf, _)) = self.in_good_utf8(pos) {
                            pos = start_utf;
                        }
                    }
                }
            } else if self.is_dbcs() {
                if move_dir > 0 {
                    let mbsize: Position =
                        if self.is_dbcs_lead_byte_at(self.cb.char_at(pos)) { 2 } else { 1 };
                    pos += mbsize;
                    if pos > self.length() {
                        pos = self.length();
                    }
                } else {
                    // Anchor at the line start, which is never a trail byte.
                    let pos_start_line = self.line_start(self.line_from_position(pos));
                    if pos - 1 <= pos_start_line {
                        return pos - 1;
                    } else if self.is_dbcs_lead_byte_at(self.cb.char_at(pos - 1)) {
                        // Must actually be a trail byte.
                        return pos - 2;
                    } else {
                        // Step back until a non-lead byte, then parity
                        // decides one or two bytes.
                        let mut pos_temp = pos - 1;
                        loop {
                            pos_temp -= 1;
                            if pos_temp < pos_start_line
                                || !self.is_dbcs_lead_byte_at(self.cb.char_at(pos_temp))
                            {
                                break;
                            }
                        }
                        return pos - 1 - ((pos - pos_temp) & 1);
                    }
                }
            } else {
                pos += increment;
            }
        } else {
            pos += increment;
        }
        pos
    }

    /// Position `character_offset` characters away from `position_start`,
    /// or [`INVALID_POSITION`] past a boundary.
    pub fn get_relative_position(&self, position_start: Position, character_offset: Position) -> Position {
        let mut pos = position_start;
        if self.dbcs_code_page != 0 {
            let increment: Position = if character_offset > 0 { 1 } else { -1 };
            let mut remaining = character_offset;
            while remaining != 0 {
                let pos_next = self.next_position(pos, increment);
                if pos_next == pos {
                    return INVALID_POSITION;
                }
                pos = pos_next;
                remaining -= increment;
            }
        } else {
            pos = position_start + character_offset;
            if pos < 0 || pos > self.length() {
                return INVALID_POSITION;
            }
        }
        pos
    }

    /// The character at `position` and its byte width. Invalid UTF-8 bytes
    /// report `0xDC80 + byte` with width 1 so they round-trip losslessly.
    pub fn get_character_and_width(&self, position: Position) -> (u32, Position) {
        let lead_byte = self.cb.char_at(position);
        if self.dbcs_code_page == 0 {
            return (lead_byte as u32, 1);
        }
        if self.dbcs_code_page == CP_UTF8 {
            if utf8_is_ascii(lead_byte) {
                return (lead_byte as u32, 1);
            }
            let width_char_bytes = UTF8_BYTES_OF_LEAD[lead_byte as usize] as usize;
            let mut char_bytes = [0u8; UTF8_MAX_BYTES];
            char_bytes[0] = lead_byte;
            for b in 1..width_char_bytes {
                char_bytes[b] = self.cb.char_at(position + b as Position);
            }
            let utf8_status = utf8_classify(&char_bytes[..width_char_bytes]);
            if utf8_status & UTF8_MASK_INVALID != 0 {
                // Report as singleton surrogate values, which are invalid
                // Unicode, so the byte can be recovered.
                (0xDC80 + lead_byte as u32, 1)
            } else {
                let width = utf8_status & UTF8_MASK_WIDTH;
                (utf8_decode(&char_bytes, utf8_status), width as Position)
            }
        } else if self.is_dbcs_lead_byte_at(lead_byte) {
            (((lead_byte as u32) << 8) | self.cb.char_at(position + 1) as u32, 2)
        } else {
            (lead_byte as u32, 1)
        }
    }

    /// The character after `position` with its width; the replacement
    /// character past the end.
    pub fn character_after(&self, position: Position) -> CharacterExtracted {
        if position >= self.length() {
            return CharacterExtracted { character: UNICODE_REPLACEMENT_CHAR, width_bytes: 0 };
        }
        let (character, width_bytes) = self.get_character_and_width(position);
        if self.dbcs_code_page == CP_UTF8 && character >= 0xDC80 && character <= 0xDCFF {
            CharacterExtracted { character: UNICODE_REPLACEMENT_CHAR, width_bytes: 1 }
        } else {
            CharacterExtracted { character, width_bytes }
        }
    }

    /// The character ending at `position` with its width.
    pub fn character_before(&self, position: Position) -> CharacterExtracted {
        if position <= 0 {
            return CharacterExtracted { character: UNICODE_REPLACEMENT_CHAR, width_bytes: 0 };
        }
        let pos_prev = self.next_position(position, -1);
        if pos_prev == position {
            return CharacterExtracted { character: UNICODE_REPLACEMENT_CHAR, width_bytes: 0 };
        }
        let mut ce = self.character_after(pos_prev);
        if ce.width_bytes == 0 || pos_prev + ce.width_bytes != position {
            // Not a clean character before: report the single byte.
            ce = CharacterExtracted {
                character: self.cb.char_at(position - 1) as u32,
                width_bytes: 1,
            };
        }
        ce
    }

    /// Count whole characters in `[start, end)`.
    pub fn count_characters(&self, start: Position, end: Position) -> Position {
        let start = self.move_position_outside_char(start, 1, false);
        let end = self.move_position_outside_char(end, -1, false);
        let mut count = 0;
        let mut i = start;
        while i < end {
            count += 1;
            i = self.next_position(i, 1);
        }
        count
    }

    /// Count UTF-16 code units in `[start, end)` (supplementary characters
    /// count twice).
    pub fn count_utf16(&self, start: Position, end: Position) -> Position {
        let start = self.move_position_outside_char(start, 1, false);
        let end = self.move_position_outside_char(end, -1, false);
        let mut count = 0;
        let mut i = start;
        while i < end {
            count += 1;
            let next = self.next_position(i, 1);
            if next - i > 3 {
                count += 1;
            }
            i = next;
        }
        count
    }

    // ---- words and columns ------------------------------------------------

    /// Word class of `character` under the document encoding.
    pub fn word_character_class(&self, character: u32) -> CharacterClass {
        if self.dbcs_code_page != 0 && character >= 0x80 {
            if self.dbcs_code_page == CP_UTF8 {
                return unicode_class(character);
            }
            // All DBCS characters count as word characters.
            return CharacterClass::Word;
        }
        self.char_class.get_class(character as u8)
    }

    /// The byte-class table.
    pub fn char_classify(&self) -> &CharClassify {
        &self.char_class
    }

    /// Reconfigure byte classes.
    pub fn set_char_classes(&mut self, chars: &[u8], new_class: CharacterClass) {
        self.char_class.set_char_classes(chars, new_class);
        self.regex = None; // Word predicates are baked into the engine.
    }

    /// Restore the default byte classes.
    pub fn set_default_char_classes(&mut self, include_word_class: bool) {
        self.char_class.set_default_char_classes(include_word_class);
        self.regex = None;
    }

    /// Start of the word run before or after `pos` (one word per `delta`
    /// direction, skipping trailing space).
    pub fn next_word_start(&self, pos: Position, delta: Position) -> Position {
        let mut pos = pos;
        if delta < 0 {
            while pos > 0 {
                let ce = self.character_before(pos);
                if self.word_character_class(ce.character) != CharacterClass::Space {
                    break;
                }
                pos -= ce.width_bytes;
            }
            if pos > 0 {
                let cc_start = self.word_character_class(self.character_before(pos).character);
                while pos > 0 {
                    let ce = self.character_before(pos);
                    if self.word_character_class(ce.character) != cc_start {
                        break;
                    }
                    pos -= ce.width_bytes;
                }
            }
        } else {
            let cc_start = self.word_character_class(self.character_after(pos).character);
            while pos < self.length() {
                let ce = self.character_after(pos);
                if self.word_character_class(ce.character) != cc_start {
                    break;
                }
                pos += ce.width_bytes;
            }
            while pos < self.length() {
                let ce = self.character_after(pos);
                if self.word_character_class(ce.character) != CharacterClass::Space {
                    break;
                }
                pos += ce.width_bytes;
            }
        }
        pos
    }

    /// End of the word run before or after `pos`.
    pub fn next_word_end(&self, pos: Position, delta: Position) -> Position {
        let mut pos = pos;
        if delta < 0 {
            if pos > 0 {
                let cc_start = self.word_character_class(self.character_before(pos).character);
                if cc_start != CharacterClass::Space {
                    while pos > 0 {
                        let ce = self.character_before(pos);
                        if self.word_character_class(ce.character) != cc_start {
                            break;
                        }
                        pos -= ce.width_bytes;
                    }
                }
                while pos > 0 {
                    let ce = self.character_before(pos);
                    if self.word_character_class(ce.character) != CharacterClass::Space {
                        break;
                    }
                    pos -= ce.width_bytes;
                }
            }
        } else {
            while pos < self.length() {
                let ce = self.character_after(pos);
                if self.word_character_class(ce.character) != CharacterClass::Space {
                    break;
                }
                pos += ce.width_bytes;
            }
            if pos < self.length() {
                let cc_start = self.word_character_class(self.character_after(pos).character);
                while pos < self.length() {
                    let ce = self.character_after(pos);
                    if self.word_character_class(ce.character) != cc_start {
                        break;
                    }
                    pos += ce.width_bytes;
                }
            }
        }
        pos
    }

    /// Extend `pos` to the boundary of its character run. With
    /// `only_word_characters`, only word characters extend.
    pub fn extend_word_select(
        &self,
        pos: Position,
        delta: Position,
        only_word_characters: bool,
    ) -> Position {
        let mut cc_start = CharacterClass::Word;
        let mut pos = pos;
        if delta < 0 {
            if !only_word_characters {
                cc_start = self.word_character_class(self.character_before(pos).character);
            }
            while pos > 0 {
                let ce = self.character_before(pos);
                if self.word_character_class(ce.character) != cc_start {
                    break;
                }
                pos -= ce.width_bytes;
            }
        } else {
            if !only_word_characters && pos < self.length() {
                cc_start = self.word_character_class(self.character_after(pos).character);
            }
            while pos < self.length() {
                let ce = self.character_after(pos);
                if self.word_character_class(ce.character) != cc_start {
                    break;
                }
                pos += ce.width_bytes;
            }
        }
        self.move_position_outside_char(pos, delta, true)
    }

    /// Whether `pos` is at the start of a word (class transition).
    pub fn is_word_start_at(&self, pos: Position) -> bool {
        if pos >= self.length() {
            return false;
        }
        if pos > 0 {
            let cc_pos = self.word_character_class(self.character_after(pos).character);
            let cc_prev = self.word_character_class(self.character_before(pos).character);
            return (cc_pos == CharacterClass::Word || cc_pos == CharacterClass::Punctuation)
                && cc_pos != cc_prev;
        }
        true
    }

    /// Whether `pos` is at the end of a word.
    pub fn is_word_end_at(&self, pos: Position) -> bool {
        if pos <= 0 {
            return false;
        }
        if pos < self.length() {
            let cc_prev = self.word_character_class(self.character_before(pos).character);
            let cc_pos = self.word_character_class(self.character_after(pos).character);
            return (cc_prev == CharacterClass::Word || cc_prev == CharacterClass::Punctuation)
                && cc_prev != cc_pos;
        }
        true
    }

    /// Whether `[start, end)` spans whole words.
    pub fn is_word_at(&self, start: Position, end: Position) -> bool {
        start < end && self.is_word_start_at(start) && self.is_word_end_at(end)
    }

    pub(crate) fn matches_word_options(
        &self,
        word: bool,
        word_start: bool,
        pos: Position,
        length: Position,
    ) -> bool {
        (!word && !word_start)
            || (word && self.is_word_at(pos, pos + length))
            || (word_start && self.is_word_start_at(pos))
    }

    /// Column of `pos` in its line, counting tabs.
    pub fn get_column(&self, pos: Position) -> Position {
        let mut column = 0;
        let line = self.line_from_position(pos);
        if line >= 0 && line < self.lines_total() {
            let mut i = self.line_start(line);
            while i < pos {
                let ch = self.cb.char_at(i);
                if ch == b'\t' {
                    column = self.next_tab(column);
                    i += 1;
                } else if ch == b'\r' || ch == b'\n' || i >= self.length() {
                    return column;
                } else {
                    column += 1;
                    i = self.next_position(i, 1);
                }
            }
        }
        column
    }

    /// Position at `column` of `line`, expanding tabs.
    pub fn find_column(&self, line: Position, column: Position) -> Position {
        let mut position = self.line_start(line);
        if line >= 0 && line < self.lines_total() {
            let mut column_current = 0;
            while column_current < column && position < self.line_end(line) {
                let ch = self.cb.char_at(position);
                if ch == b'\t' {
                    column_current = self.next_tab(column_current);
                    if column_current > column {
                        return position;
                    }
                    position += 1;
                } else {
                    column_current += 1;
                    position = self.next_position(position, 1);
                }
            }
        }
        position
    }

    fn next_tab(&self, column: Position) -> Position {
        column - (column % self.tab_in_chars) + self.tab_in_chars
    }

    /// Start of visible text on `position`'s line; the line home when
    /// already there.
    pub fn vc_home_position(&self, position: Position) -> Position {
        let line = self.line_from_position(position);
        let start_position = self.line_start(line);
        let end_line = self.line_end(line);
        let mut start_text = start_position;
        while start_text < end_line
            && (self.cb.char_at(start_text) == b' ' || self.cb.char_at(start_text) == b'\t')
        {
            start_text += 1;
        }
        if position == start_text {
            start_position
        } else {
            start_text
        }
    }

    /// Matching brace for the one at `position`, or -1. Only braces in the
    /// same style count, unless beyond the styled watermark.
    pub fn brace_match(&self, position: Position) -> Position {
        let ch_brace = self.cb.char_at(position);
        let ch_seek = brace_opposite(ch_brace);
        if ch_seek == 0 {
            return -1;
        }
        let sty_brace = self.style_at(position);
        let direction: Position =
            if matches!(ch_brace, b'(' | b'[' | b'{' | b'<') { 1 } else { -1 };
        let mut depth = 1;
        let mut position = self.next_position(position, direction);
        while position >= 0 && position < self.length() {
            let ch_at_pos = self.cb.char_at(position);
            let sty_at_pos = self.style_at(position);
            if position > self.get_end_styled() || sty_at_pos == sty_brace {
                if ch_at_pos == ch_brace {
                    depth += 1;
                }
                if ch_at_pos == ch_seek {
                    depth -= 1;
                }
                if depth == 0 {
                    return position;
                }
            }
            let position_before_move = position;
            position = self.next_position(position, direction);
            if position == position_before_move {
                break;
            }
        }
        -1
    }

    // ---- search -----------------------------------------------------------

    /// Find `search` in `[min_pos, max_pos)`; backward when
    /// `min_pos > max_pos`. Writes the match length to `length` and returns
    /// the match position, or [`INVALID_POSITION`] when absent or the
    /// pattern fails to compile.
    pub fn find_text(
        &mut self,
        min_pos: Position,
        max_pos: Position,
        search: &[u8],
        flags: u32,
        length: &mut Position,
    ) -> Position {
        if search.is_empty() {
            *length = 0;
            return min_pos;
        }
        if flags & FIND_REGEXP != 0 {
            let mut engine = self.regex.take().unwrap_or_else(|| {
                Box::new(DualRegex {
                    builtin: BuiltinRegex::new(self),
                    cxx: CxxRegex::new(),
                    last_was_cxx: false,
                })
            });
            let case_sensitive = flags & FIND_MATCH_CASE != 0;
            let result =
                engine.find_text(self, min_pos, max_pos, search, case_sensitive, flags, length);
            self.regex = Some(engine);
            match result {
                Ok(pos) => pos,
                Err(status) => {
                    self.notify_error_occurred(status);
                    INVALID_POSITION
                }
            }
        } else {
            literal_find(self, min_pos, max_pos, search, flags, length)
        }
    }

    /// Expand `text` against the captures of the last regex `find_text`.
    pub fn substitute_by_position(&mut self, text: &[u8]) -> Option<Vec<u8>> {
        let mut engine = self.regex.take()?;
        let result = engine.substitute_by_position(self, text);
        self.regex = Some(engine);
        result.ok()
    }

    /// Replace the case folder used by case-insensitive search.
    pub fn set_case_folder(&mut self, pcf: Box<dyn CaseFolder>) {
        self.pcf = pcf;
    }

    pub(crate) fn case_folder(&self) -> &dyn CaseFolder {
        self.pcf.as_ref()
    }
}

/// Scoped undo grouping: opens a group on creation (when `group_needed`)
/// and closes it when dropped, on every exit path.
pub struct UndoGroup<'a> {
    doc: &'a mut Document,
    group_needed: bool,
}

impl<'a> UndoGroup<'a> {
    /// Open a group over `doc` when `group_needed`.
    pub fn new(doc: &'a mut Document, group_needed: bool) -> Self {
        if group_needed {
            doc.begin_undo_action();
        }
        Self { doc, group_needed }
    }

    /// Whether a group was opened.
    pub fn needed(&self) -> bool {
        self.group_needed
    }
}

impl Drop for UndoGroup<'_> {
    fn drop(&mut self) {
        if self.group_needed {
            self.doc.end_undo_action();
        }
    }
}

impl std::ops::Deref for UndoGroup<'_> {
    type Target = Document;

    fn deref(&self) -> &Document {
        self.doc
    }
}

impl std::ops::DerefMut for UndoGroup<'_> {
    fn deref_mut(&mut self) -> &mut Document {
        self.doc
    }
}

fn is_subordinate(level_start: i32, level_try: i32) -> bool {
    if level_try & FOLD_LEVEL_WHITE_FLAG != 0 {
        true
    } else {
        level_number(level_start) < level_number(level_try)
    }
}

fn brace_opposite(ch: u8) -> u8 {
    match ch {
        b'(' => b')',
        b')' => b'(',
        b'[' => b']',
        b']' => b'[',
        b'{' => b'}',
        b'}' => b'{',
        b'<' => b'>',
        b'>' => b'<',
        _ => 0,
    }
}

fn default_case_folder(code_page: i32) -> Box<dyn CaseFolder> {
    if code_page == CP_UTF8 {
        Box::new(CaseFolderUnicode)
    } else if is_dbcs_code_page(code_page) {
        Box::new(CaseFolderDBCS::new(code_page))
    } else {
        Box::new(CaseFolderTable::new())
    }
}

// The narrow reader/writer surface lexers consume.
impl LexDocument for Document {
    fn length(&self) -> Position {
        self.cb.len()
    }

    fn get_char_range(&self, buf: &mut [u8], position: Position) {
        self.cb.get_char_range(buf, position);
    }

    fn style_at(&self, position: Position) -> u8 {
        self.cb.style_at(position)
    }

    fn line_from_position(&self, position: Position) -> Position {
        self.cb.line_from_position(position)
    }

    fn line_start(&self, line: Position) -> Position {
        self.cb.line_start(line)
    }

    fn line_end(&self, line: Position) -> Position {
        Document::line_end(self, line)
    }

    fn get_level(&self, line: Position) -> i32 {
        Document::get_level(self, line)
    }

    fn set_level(&mut self, line: Position, level: i32) -> i32 {
        Document::set_level(self, line, level)
    }

    fn get_line_state(&self, line: Position) -> i32 {
        Document::get_line_state(self, line)
    }

    fn set_line_state(&mut self, line: Position, state: i32) -> i32 {
        Document::set_line_state(self, line, state)
    }

    fn start_styling(&mut self, position: Position) {
        Document::start_styling(self, position);
    }

    fn set_style_for(&mut self, length: Position, style: u8) -> bool {
        Document::set_style_for(self, length, style)
    }

    fn set_styles(&mut self, styles: &[u8]) -> bool {
        Document::set_styles(self, styles)
    }

    fn decoration_set_current_indicator(&mut self, indicator: i32) {
        Document::decoration_set_current_indicator(self, indicator);
    }

    fn decoration_fill_range(&mut self, position: Position, value: i32, fill_length: Position) {
        Document::decoration_fill_range(self, position, value, fill_length);
    }

    fn change_lexer_state(&mut self, start: Position, end: Position) {
        Document::change_lexer_state(self, start, end);
    }

    fn code_page(&self) -> i32 {
        self.dbcs_code_page
    }

    fn is_dbcs_lead_byte(&self, ch: u8) -> bool {
        self.is_dbcs_lead_byte_at(ch)
    }
}
