#![warn(missing_docs)]
//! Lexer-facing interface for `document-core`.
//!
//! Lexers never see the document engine directly. They consume a narrow
//! reader/writer capability, [`LexDocument`], and usually wrap it in a
//! [`LexAccessor`] which adds a read-ahead buffer and a pending styling
//! segment so that a lexer can emit styles with `colour_to` without touching
//! the document once per byte.
//!
//! The engine crate implements [`LexDocument`] for its document type and
//! drives registered [`Lexer`] objects through it. Keeping these traits in a
//! leaf crate keeps the dependency arrow pointing one way: lexer packages
//! depend on `document-core-lex` only.

/// Byte offset into a document. Mirrors the engine's position type.
pub type Position = i64;

/// Sentinel for "no position" results such as unaffected property changes.
pub const INVALID_POSITION: Position = -1;

/// Version of the [`LexDocument`] capability set.
pub const LEX_DOCUMENT_VERSION: i32 = 2;

/// The type of a lexer property, for host-side configuration UIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    /// "0"/"1" style switch.
    Boolean,
    /// Decimal integer.
    Integer,
    /// Free-form string.
    String,
}

/// The narrow document capability a lexer is allowed to use.
///
/// Reads are copy-based: `get_char_range` fills a caller buffer rather than
/// exposing internal storage, so implementations backed by a gap buffer never
/// have to shuffle the gap to serve a lexer.
pub trait LexDocument {
    /// Capability version, currently [`LEX_DOCUMENT_VERSION`].
    fn version(&self) -> i32 {
        LEX_DOCUMENT_VERSION
    }

    /// Document length in bytes.
    fn length(&self) -> Position;

    /// Copy `buf.len()` bytes starting at `position` into `buf`.
    /// Out-of-range tails are filled with zero bytes.
    fn get_char_range(&self, buf: &mut [u8], position: Position);

    /// Style byte at `position` (0 when out of range).
    fn style_at(&self, position: Position) -> u8;

    /// Line containing `position`.
    fn line_from_position(&self, position: Position) -> Position;

    /// Start position of `line`.
    fn line_start(&self, line: Position) -> Position;

    /// End position of `line`, before its terminator.
    fn line_end(&self, line: Position) -> Position;

    /// Fold level of `line`.
    fn get_level(&self, line: Position) -> i32;

    /// Set the fold level of `line`, returning the previous level.
    fn set_level(&mut self, line: Position, level: i32) -> i32;

    /// Integer lexer state attached to `line`.
    fn get_line_state(&self, line: Position) -> i32;

    /// Set the lexer state of `line`, returning the previous state.
    fn set_line_state(&mut self, line: Position, state: i32) -> i32;

    /// Begin a styling run at `position`. Subsequent `set_style_for` /
    /// `set_styles` calls advance from here.
    fn start_styling(&mut self, position: Position);

    /// Style the next `length` bytes with `style`. Returns false when the
    /// request was out of range and ignored.
    fn set_style_for(&mut self, length: Position, style: u8) -> bool;

    /// Style the next `styles.len()` bytes individually.
    fn set_styles(&mut self, styles: &[u8]) -> bool;

    /// Select the indicator that `decoration_fill_range` writes to.
    fn decoration_set_current_indicator(&mut self, indicator: i32);

    /// Fill `[position, position+fill_length)` of the current indicator.
    fn decoration_fill_range(&mut self, position: Position, value: i32, fill_length: Position);

    /// Tell the document that internal lexer state changed over a range so
    /// containers can be notified.
    fn change_lexer_state(&mut self, start: Position, end: Position);

    /// Code page of the document text (0, 65001 or a DBCS page).
    fn code_page(&self) -> i32;

    /// Whether `ch` is a DBCS lead byte under the document code page.
    fn is_dbcs_lead_byte(&self, ch: u8) -> bool;
}

/// A lexer: a capability object the document drives to produce style bytes
/// and fold levels.
///
/// Most of the surface has defaults so simple lexers only implement `lex`
/// (and usually `fold`).
pub trait Lexer {
    /// Interface version of this lexer.
    fn version(&self) -> i32 {
        LEX_DOCUMENT_VERSION
    }

    /// Newline-separated names of supported properties.
    fn property_names(&self) -> &str {
        ""
    }

    /// Type of the named property.
    fn property_type(&self, _name: &str) -> PropertyType {
        PropertyType::Boolean
    }

    /// Human-readable description of the named property.
    fn describe_property(&self, _name: &str) -> &str {
        ""
    }

    /// Set a property. Returns the first line whose styling is invalidated,
    /// or [`INVALID_POSITION`] when nothing changes.
    fn property_set(&mut self, _key: &str, _value: &str) -> Position {
        INVALID_POSITION
    }

    /// Newline-separated descriptions of the keyword list slots.
    fn describe_word_list_sets(&self) -> &str {
        ""
    }

    /// Replace keyword list `n` with the space-joined `word_list`. Returns
    /// the first line whose styling is invalidated, or [`INVALID_POSITION`].
    fn word_list_set(&mut self, _n: i32, _word_list: &str) -> Position {
        INVALID_POSITION
    }

    /// Style `[start_pos, start_pos+length)`. `init_style` is the style byte
    /// in effect just before `start_pos`.
    fn lex(
        &mut self,
        start_pos: Position,
        length: Position,
        init_style: i32,
        doc: &mut dyn LexDocument,
    );

    /// Assign fold levels over `[start_pos, start_pos+length)`.
    fn fold(
        &mut self,
        _start_pos: Position,
        _length: Position,
        _init_style: i32,
        _doc: &mut dyn LexDocument,
    ) {
    }

    /// Bit set of Unicode line-end types this lexer understands.
    fn line_end_types_supported(&self) -> i32 {
        0
    }

    /// Reserve `number_styles` sub-styles for the style `style_base`.
    /// Returns the first allocated sub-style or -1.
    fn allocate_sub_styles(&mut self, _style_base: i32, _number_styles: i32) -> i32 {
        -1
    }

    /// First sub-style allocated for `style_base`, or -1.
    fn sub_styles_start(&self, _style_base: i32) -> i32 {
        -1
    }

    /// Number of sub-styles allocated for `style_base`.
    fn sub_styles_length(&self, _style_base: i32) -> i32 {
        0
    }

    /// Base style that `sub_style` specialises.
    fn style_from_sub_style(&self, sub_style: i32) -> i32 {
        sub_style
    }

    /// Style with secondary distinctions removed.
    fn primary_style_from_style(&self, style: i32) -> i32 {
        style
    }

    /// Symbolic name of `style`, or empty.
    fn name_of_style(&self, _style: i32) -> &str {
        ""
    }

    /// Description of `style`, or empty.
    fn description_of_style(&self, _style: i32) -> &str {
        ""
    }

    /// Comma-separated tags of `style`, or empty.
    fn tags_of_style(&self, _style: i32) -> &str {
        ""
    }

    /// Free keyword lists and sub-style allocations.
    fn free_sub_styles(&mut self) {}
}

const ACCESSOR_BUF_SIZE: usize = 4000;
const ACCESSOR_SLOP: usize = 32;

/// Buffered document reader plus pending styling segment.
///
/// `LexAccessor` keeps a sliding window of document bytes so per-byte reads
/// during lexing do not call through the trait object each time, and batches
/// style output: `colour_to(end, style)` records that everything from the
/// current segment start to `end` has `style`, flushing in buffer-sized
/// chunks.
pub struct LexAccessor<'a> {
    doc: &'a mut dyn LexDocument,
    buf: [u8; ACCESSOR_BUF_SIZE],
    start_pos: Position,
    end_pos: Position,
    len_doc: Position,
    styling_mask: u8,
    start_seg: Position,
    start_pos_styling: Position,
    valid_len: usize,
    styling_buf: [u8; ACCESSOR_BUF_SIZE],
}

impl<'a> LexAccessor<'a> {
    /// Wrap `doc` in a fresh accessor.
    pub fn new(doc: &'a mut dyn LexDocument) -> Self {
        let len_doc = doc.length();
        Self {
            doc,
            buf: [0; ACCESSOR_BUF_SIZE],
            start_pos: extreme_position(),
            end_pos: 0,
            len_doc,
            styling_mask: 0xff,
            start_seg: 0,
            start_pos_styling: 0,
            valid_len: 0,
            styling_buf: [0; ACCESSOR_BUF_SIZE],
        }
    }

    fn fill(&mut self, position: Position) {
        let mut start = position.saturating_sub(ACCESSOR_SLOP as Position);
        if start < 0 {
            start = 0;
        }
        let mut end = start + ACCESSOR_BUF_SIZE as Position;
        if end > self.len_doc {
            end = self.len_doc;
        }
        self.start_pos = start;
        self.end_pos = end;
        let n = (end - start) as usize;
        self.doc.get_char_range(&mut self.buf[..n], start);
    }

    /// Byte at `position`, zero when out of range.
    pub fn char_at(&mut self, position: Position) -> u8 {
        if position < self.start_pos || position >= self.end_pos {
            self.fill(position);
            if position < self.start_pos || position >= self.end_pos {
                return 0;
            }
        }
        self.buf[(position - self.start_pos) as usize]
    }

    /// Byte at `position`, `default` when out of range.
    pub fn safe_get_char_at(&mut self, position: Position, default: u8) -> u8 {
        if position < 0 || position >= self.len_doc {
            return default;
        }
        let ch = self.char_at(position);
        if ch == 0 && (position < self.start_pos || position >= self.end_pos) {
            default
        } else {
            ch
        }
    }

    /// Style byte at `position`, masked by the styling mask.
    pub fn style_at(&self, position: Position) -> u8 {
        self.doc.style_at(position) & self.styling_mask
    }

    /// Line containing `position`.
    pub fn get_line(&self, position: Position) -> Position {
        self.doc.line_from_position(position)
    }

    /// Start position of `line`.
    pub fn line_start(&self, line: Position) -> Position {
        self.doc.line_start(line)
    }

    /// End position of `line`, before its terminator.
    pub fn line_end(&self, line: Position) -> Position {
        self.doc.line_end(line)
    }

    /// Fold level of `line`.
    pub fn level_at(&self, line: Position) -> i32 {
        self.doc.get_level(line)
    }

    /// Set the fold level of `line`.
    pub fn set_level(&mut self, line: Position, level: i32) -> i32 {
        self.doc.set_level(line, level)
    }

    /// Document length in bytes.
    pub fn length(&self) -> Position {
        self.len_doc
    }

    /// Integer state attached to `line`.
    pub fn get_line_state(&self, line: Position) -> i32 {
        self.doc.get_line_state(line)
    }

    /// Attach integer state to `line`.
    pub fn set_line_state(&mut self, line: Position, state: i32) -> i32 {
        self.doc.set_line_state(line, state)
    }

    /// Whether the document bytes at `pos` equal `s`.
    pub fn match_str(&mut self, pos: Position, s: &str) -> bool {
        for (i, b) in s.bytes().enumerate() {
            if self.safe_get_char_at(pos + i as Position, 0) != b {
                return false;
            }
        }
        !s.is_empty()
    }

    /// Restart styling at `start`, discarding any pending segment.
    pub fn start_at(&mut self, start: Position) {
        self.doc.start_styling(start);
        self.start_pos_styling = start;
        self.start_seg = start;
        self.valid_len = 0;
    }

    /// Begin a new segment at `pos`; bytes before it must already be styled.
    pub fn start_segment(&mut self, pos: Position) {
        self.start_seg = pos;
    }

    /// Position of the current segment start.
    pub fn get_start_segment(&self) -> Position {
        self.start_seg
    }

    /// Style the segment `[start_segment, pos]` as `chattr` and start the
    /// next segment at `pos + 1`.
    pub fn colour_to(&mut self, pos: Position, chattr: u8) {
        if pos < self.start_seg {
            return;
        }
        let count = (pos - self.start_seg + 1) as usize;
        if self.valid_len + count >= self.styling_buf.len() {
            self.flush();
        }
        if count >= self.styling_buf.len() {
            // Segment longer than the buffer: hand it straight to the document.
            self.doc.set_style_for(count as Position, chattr);
            self.start_pos_styling += count as Position;
        } else {
            for slot in &mut self.styling_buf[self.valid_len..self.valid_len + count] {
                *slot = chattr;
            }
            self.valid_len += count;
        }
        self.start_seg = pos + 1;
    }

    /// Push any buffered styles into the document.
    pub fn flush(&mut self) {
        if self.valid_len > 0 {
            self.doc.set_styles(&self.styling_buf[..self.valid_len]);
            self.start_pos_styling += self.valid_len as Position;
            self.valid_len = 0;
        }
    }

    /// Borrow the wrapped document (for calls the accessor does not wrap).
    pub fn document(&mut self) -> &mut dyn LexDocument {
        self.doc
    }
}

impl Drop for LexAccessor<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

fn extreme_position() -> Position {
    Position::MAX
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeDoc {
        text: Vec<u8>,
        styles: Vec<u8>,
        styling_pos: Position,
        levels: Vec<i32>,
        states: Vec<i32>,
    }

    impl FakeDoc {
        fn new(text: &str) -> Self {
            Self {
                text: text.as_bytes().to_vec(),
                styles: vec![0; text.len()],
                styling_pos: 0,
                levels: vec![0; 8],
                states: vec![0; 8],
            }
        }

        fn line_starts(&self) -> Vec<usize> {
            let mut starts = vec![0];
            for (i, b) in self.text.iter().enumerate() {
                if *b == b'\n' {
                    starts.push(i + 1);
                }
            }
            starts
        }
    }

    impl LexDocument for FakeDoc {
        fn length(&self) -> Position {
            self.text.len() as Position
        }

        fn get_char_range(&self, buf: &mut [u8], position: Position) {
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = *self.text.get(position as usize + i).unwrap_or(&0);
            }
        }

        fn style_at(&self, position: Position) -> u8 {
            *self.styles.get(position as usize).unwrap_or(&0)
        }

        fn line_from_position(&self, position: Position) -> Position {
            let starts = self.line_starts();
            let mut line = 0;
            for (i, s) in starts.iter().enumerate() {
                if *s as Position <= position {
                    line = i;
                }
            }
            line as Position
        }

        fn line_start(&self, line: Position) -> Position {
            let starts = self.line_starts();
            starts
                .get(line as usize)
                .map(|s| *s as Position)
                .unwrap_or(self.length())
        }

        fn line_end(&self, line: Position) -> Position {
            let next = self.line_start(line + 1);
            if next > 0 && self.text.get(next as usize - 1) == Some(&b'\n') {
                next - 1
            } else {
                next
            }
        }

        fn get_level(&self, line: Position) -> i32 {
            self.levels[line as usize]
        }

        fn set_level(&mut self, line: Position, level: i32) -> i32 {
            std::mem::replace(&mut self.levels[line as usize], level)
        }

        fn get_line_state(&self, line: Position) -> i32 {
            self.states[line as usize]
        }

        fn set_line_state(&mut self, line: Position, state: i32) -> i32 {
            std::mem::replace(&mut self.states[line as usize], state)
        }

        fn start_styling(&mut self, position: Position) {
            self.styling_pos = position;
        }

        fn set_style_for(&mut self, length: Position, style: u8) -> bool {
            for _ in 0..length {
                self.styles[self.styling_pos as usize] = style;
                self.styling_pos += 1;
            }
            true
        }

        fn set_styles(&mut self, styles: &[u8]) -> bool {
            for s in styles {
                self.styles[self.styling_pos as usize] = *s;
                self.styling_pos += 1;
            }
            true
        }

        fn decoration_set_current_indicator(&mut self, _indicator: i32) {}

        fn decoration_fill_range(
            &mut self,
            _position: Position,
            _value: i32,
            _fill_length: Position,
        ) {
        }

        fn change_lexer_state(&mut self, _start: Position, _end: Position) {}

        fn code_page(&self) -> i32 {
            65001
        }

        fn is_dbcs_lead_byte(&self, _ch: u8) -> bool {
            false
        }
    }

    #[test]
    fn char_at_reads_through_window() {
        let mut doc = FakeDoc::new("hello\nworld");
        let mut acc = LexAccessor::new(&mut doc);
        assert_eq!(acc.char_at(0), b'h');
        assert_eq!(acc.char_at(6), b'w');
        assert_eq!(acc.safe_get_char_at(100, b'!'), b'!');
    }

    #[test]
    fn colour_to_batches_styles() {
        let mut doc = FakeDoc::new("let x = 1;");
        {
            let mut acc = LexAccessor::new(&mut doc);
            acc.start_at(0);
            acc.colour_to(2, 5); // "let"
            acc.colour_to(9, 1); // rest
            acc.flush();
        }
        assert_eq!(&doc.styles[..4], &[5, 5, 5, 1]);
        assert_eq!(doc.styles[9], 1);
    }

    #[test]
    fn flush_on_drop() {
        let mut doc = FakeDoc::new("abc");
        {
            let mut acc = LexAccessor::new(&mut doc);
            acc.start_at(0);
            acc.colour_to(2, 7);
        }
        assert_eq!(doc.styles, vec![7, 7, 7]);
    }

    #[test]
    fn match_str_compares_bytes() {
        let mut doc = FakeDoc::new("fn main");
        let mut acc = LexAccessor::new(&mut doc);
        assert!(acc.match_str(0, "fn"));
        assert!(acc.match_str(3, "main"));
        assert!(!acc.match_str(0, "fm"));
        assert!(!acc.match_str(0, ""));
    }

    #[test]
    fn line_state_round_trips() {
        let mut doc = FakeDoc::new("a\nb\n");
        let mut acc = LexAccessor::new(&mut doc);
        assert_eq!(acc.set_line_state(1, 42), 0);
        assert_eq!(acc.get_line_state(1), 42);
    }
}
