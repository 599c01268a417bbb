//! Document search: literal matching and the regex engines.
//!
//! Literal search walks the buffer directly, with per-encoding windows for
//! case-insensitive comparison (a UTF-8 character folds as a unit, a DBCS
//! pair is never split, single bytes go through the fold table). Regular
//! expressions go through [`RegexSearcher`], behind which two engines live:
//! the built-in line-at-a-time engine ([`crate::re_search::ReSearch`]) and
//! the `regex` crate when the caller asks for modern regex semantics.
//! Direction is encoded in the argument order: `min_pos > max_pos` searches
//! backward.

use crate::Position;
use crate::case_folding::MAX_FOLDING_EXPANSION;
use crate::document::Document;
use crate::encoding::{CP_UTF8, UTF8_BYTES_OF_LEAD, UTF8_MASK_WIDTH, UTF8_MAX_BYTES, utf8_classify, utf8_is_ascii};
use crate::re_search::{CharacterIndexer, ReSearch};
use crate::status::Status;

/// Match only whole words.
pub const FIND_WHOLE_WORD: u32 = 0x2;
/// Compare case sensitively.
pub const FIND_MATCH_CASE: u32 = 0x4;
/// Match must start at a word boundary.
pub const FIND_WORD_START: u32 = 0x0010_0000;
/// Treat the needle as a regular expression.
pub const FIND_REGEXP: u32 = 0x0020_0000;
/// With [`FIND_REGEXP`], use POSIX grouping (bare parentheses).
pub const FIND_POSIX: u32 = 0x0040_0000;
/// With [`FIND_REGEXP`], use the modern regex engine instead of the
/// built-in one.
pub const FIND_CXX11REGEX: u32 = 0x0080_0000;

/// Regular-expression engine behind `find_text`/`substitute_by_position`.
pub trait RegexSearcher {
    /// Find `pattern` in `[min_pos, max_pos)` (backward when reversed).
    /// On success returns the match start and writes the match length to
    /// `length`; returns -1 when not found.
    fn find_text(
        &mut self,
        doc: &Document,
        min_pos: Position,
        max_pos: Position,
        pattern: &[u8],
        case_sensitive: bool,
        flags: u32,
        length: &mut Position,
    ) -> Result<Position, Status>;

    /// Expand `text`'s `\0`..`\9` and escapes against the captures of the
    /// last successful `find_text`.
    fn substitute_by_position(&mut self, doc: &Document, text: &[u8]) -> Result<Vec<u8>, Status>;
}

pub(crate) struct DocumentIndexer<'a> {
    doc: &'a Document,
}

impl<'a> DocumentIndexer<'a> {
    pub(crate) fn new(doc: &'a Document) -> Self {
        Self { doc }
    }
}

impl CharacterIndexer for DocumentIndexer<'_> {
    fn char_at(&self, index: Position) -> u8 {
        self.doc.char_at(index)
    }
}

/// Search range resolved to lines, with iteration direction.
struct ReSearchRange {
    start_pos: Position,
    end_pos: Position,
    line_range_start: Position,
    line_range_end: Position,
    increment: Position,
}

impl ReSearchRange {
    fn new(doc: &Document, min_pos: Position, max_pos: Position) -> Self {
        let increment = if min_pos <= max_pos { 1 } else { -1 };
        // Range endpoints must not fall inside a character.
        let start_pos = doc.move_position_outside_char(min_pos, increment, false);
        let end_pos = doc.move_position_outside_char(max_pos, increment, false);
        Self {
            start_pos,
            end_pos,
            line_range_start: doc.line_from_position(start_pos),
            line_range_end: doc.line_from_position(end_pos),
            increment,
        }
    }

    fn line_range_break(&self) -> Position {
        self.line_range_end + self.increment
    }
}

/// The engine compiled from the pattern syntax the container asked for.
pub struct BuiltinRegex {
    search: ReSearch,
}

impl BuiltinRegex {
    /// Create an engine classifying word characters with `doc`'s table.
    pub fn new(doc: &Document) -> Self {
        Self { search: ReSearch::new(doc.char_classify()) }
    }
}

impl RegexSearcher for BuiltinRegex {
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
        let resr = ReSearchRange::new(doc, min_pos, max_pos);
        let posix = flags & FIND_POSIX != 0;
        if let Err(msg) = self.search.compile(pattern, case_sensitive, posix) {
            log::debug!("regex compile failed: {msg}");
            return Err(Status::RegexError);
        }
        let di = DocumentIndexer::new(doc);
        let search_end = *pattern.last().unwrap_or(&0);
        let search_end_prev = if pattern.len() > 1 { pattern[pattern.len() - 2] } else { 0 };
        let mut pos = -1;
        let mut len_ret = 0;
        let mut line = resr.line_range_start;
        while line != resr.line_range_break() {
            let mut start_of_line = doc.line_start(line);
            let mut end_of_line = doc.line_end(line);
            if resr.increment == 1 {
                if line == resr.line_range_start {
                    if resr.start_pos != start_of_line && pattern.first() == Some(&b'^') {
                        // Can't match start of line if the search begins
                        // after it.
                        line += resr.increment;
                        continue;
                    }
                    start_of_line = resr.start_pos;
                }
                if line == resr.line_range_end {
                    if resr.end_pos != end_of_line && search_end == b'$' && search_end_prev != b'\\'
                    {
                        line += resr.increment;
                        continue;
                    }
                    end_of_line = resr.end_pos;
                }
            } else {
                if line == resr.line_range_end {
                    if resr.end_pos != start_of_line && pattern.first() == Some(&b'^') {
                        line += resr.increment;
                        continue;
                    }
                    start_of_line = resr.end_pos;
                }
                if line == resr.line_range_start {
                    if resr.start_pos != end_of_line && search_end == b'$' && search_end_prev != b'\\'
                    {
                        line += resr.increment;
                        continue;
                    }
                    end_of_line = resr.start_pos;
                }
            }
            let mut success = self.search.execute(&di, start_of_line, end_of_line);
            if success {
                pos = self.search.bopat[0];
                // Ensure only whole characters are selected.
                self.search.eopat[0] = doc.move_position_outside_char(self.search.eopat[0], 1, false);
                len_ret = self.search.eopat[0] - self.search.bopat[0];
                if resr.increment == -1 && pattern.first() != Some(&b'^') {
                    // Keep the last match on this line.
                    let mut repetitions = 1000;
                    while success && self.search.eopat[0] <= end_of_line && repetitions > 0 {
                        repetitions -= 1;
                        let mut start_next = self.search.bopat[0] + 1;
                        if self.search.eopat[0] == self.search.bopat[0] {
                            start_next = self.search.eopat[0] + 1;
                        }
                        if start_next > end_of_line {
                            break;
                        }
                        success = self.search.execute(&di, start_next, end_of_line);
                        if success {
                            pos = self.search.bopat[0];
                            self.search.eopat[0] =
                                doc.move_position_outside_char(self.search.eopat[0], 1, false);
                            len_ret = self.search.eopat[0] - self.search.bopat[0];
                        }
                    }
                }
                *length = len_ret;
                // Restore the winning captures for substitution.
                self.search.bopat[0] = pos;
                self.search.eopat[0] = pos + len_ret;
                return Ok(pos);
            }
            line += resr.increment;
        }
        Ok(-1)
    }

    fn substitute_by_position(&mut self, doc: &Document, text: &[u8]) -> Result<Vec<u8>, Status> {
        if self.search.bopat[0] < 0 {
            return Err(Status::Failure);
        }
        let di = DocumentIndexer::new(doc);
        self.search.grab_matches(&di);
        let mut substituted = Vec::with_capacity(text.len());
        let mut j = 0;
        while j < text.len() {
            if text[j] == b'\\' {
                j += 1;
                match text.get(j) {
                    Some(&c @ b'0'..=b'9') => {
                        let pat_num = (c - b'0') as usize;
                        substituted.extend_from_slice(&self.search.pat[pat_num]);
                    }
                    Some(b'a') => substituted.push(0x07),
                    Some(b'b') => substituted.push(0x08),
                    Some(b'f') => substituted.push(0x0C),
                    Some(b'n') => substituted.push(b'\n'),
                    Some(b'r') => substituted.push(b'\r'),
                    Some(b't') => substituted.push(b'\t'),
                    Some(b'v') => substituted.push(0x0B),
                    Some(b'\\') => substituted.push(b'\\'),
                    Some(&other) => {
                        substituted.push(b'\\');
                        substituted.push(other);
                    }
                    None => substituted.push(b'\\'),
                }
            } else {
                substituted.push(text[j]);
            }
            j += 1;
        }
        Ok(substituted)
    }
}

/// Engine backed by the `regex` crate (bytes API, multi-line mode).
#[derive(Default)]
pub struct CxxRegex {
    captures: Vec<Option<Vec<u8>>>,
}

impl CxxRegex {
    /// Create an engine with no captures yet.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegexSearcher for CxxRegex {
    fn find_text(
        &mut self,
        doc: &Document,
        min_pos: Position,
        max_pos: Position,
        pattern: &[u8],
        case_sensitive: bool,
        _flags: u32,
        length: &mut Position,
    ) -> Result<Position, Status> {
        let forward = min_pos <= max_pos;
        let increment = if forward { 1 } else { -1 };
        let start_pos = doc.move_position_outside_char(min_pos.min(max_pos), increment, false);
        let end_pos = doc.move_position_outside_char(min_pos.max(max_pos), increment, false);
        let pattern_str = std::str::from_utf8(pattern).map_err(|_| Status::RegexError)?;
        let re = regex::bytes::RegexBuilder::new(pattern_str)
            .case_insensitive(!case_sensitive)
            .multi_line(true)
            .unicode(doc.code_page() == CP_UTF8)
            .build()
            .map_err(|err| {
                log::debug!("regex compile failed: {err}");
                Status::RegexError
            })?;
        let mut haystack = vec![0u8; (end_pos - start_pos) as usize];
        doc.get_char_range(&mut haystack, start_pos);
        let mut chosen: Option<(usize, usize)> = None;
        let mut chosen_caps: Option<regex::bytes::Captures<'_>> = None;
        for caps in re.captures_iter(&haystack) {
            let m = caps.get(0).expect("group 0 always present");
            chosen = Some((m.start(), m.end()));
            chosen_caps = Some(caps);
            if forward {
                break;
            }
        }
        match (chosen, chosen_caps) {
            (Some((s, e)), Some(caps)) => {
                self.captures = caps
                    .iter()
                    .map(|m| m.map(|m| m.as_bytes().to_vec()))
                    .collect();
                *length = (e - s) as Position;
                Ok(start_pos + s as Position)
            }
            _ => Ok(-1),
        }
    }

    fn substitute_by_position(&mut self, _doc: &Document, text: &[u8]) -> Result<Vec<u8>, Status> {
        if self.captures.is_empty() {
            return Err(Status::Failure);
        }
        let mut substituted = Vec::with_capacity(text.len());
        let mut j = 0;
        while j < text.len() {
            if text[j] == b'\\' {
                j += 1;
                match text.get(j) {
                    Some(&c @ b'0'..=b'9') => {
                        let pat_num = (c - b'0') as usize;
                        if let Some(Some(cap)) = self.captures.get(pat_num) {
                            substituted.extend_from_slice(cap);
                        }
                    }
                    Some(b'a') => substituted.push(0x07),
                    Some(b'b') => substituted.push(0x08),
                    Some(b'f') => substituted.push(0x0C),
                    Some(b'n') => substituted.push(b'\n'),
                    Some(b'r') => substituted.push(b'\r'),
                    Some(b't') => substituted.push(b'\t'),
                    Some(b'v') => substituted.push(0x0B),
                    Some(b'\\') => substituted.push(b'\\'),
                    Some(&other) => {
                        substituted.push(b'\\');
                        substituted.push(other);
                    }
                    None => substituted.push(b'\\'),
                }
            } else {
                substituted.push(text[j]);
            }
            j += 1;
        }
        Ok(substituted)
    }
}

/// Literal search over the document, honouring direction, case folding and
/// word options. Returns the match position or -1; the match length is
/// written to `length` (case-insensitive UTF-8 matches can differ in length
/// from the needle).
pub(crate) fn literal_find(
    doc: &Document,
    min_pos: Position,
    max_pos: Position,
    search: &[u8],
    flags: u32,
    length: &mut Position,
) -> Position {
    if search.is_empty() {
        return min_pos;
    }
    let case_sensitive = flags & FIND_MATCH_CASE != 0;
    let word = flags & FIND_WHOLE_WORD != 0;
    let word_start = flags & FIND_WORD_START != 0;
    let forward = min_pos <= max_pos;
    let increment: Position = if forward { 1 } else { -1 };

    // Range endpoints must not be inside multi-byte characters.
    let start_pos = doc.move_position_outside_char(min_pos, increment, false);
    let end_pos = doc.move_position_outside_char(max_pos, increment, false);

    let length_find = search.len() as Position;
    let limit_pos = start_pos.max(end_pos);
    let mut pos = start_pos;
    if !forward {
        // Back over one whole character.
        pos = doc.next_position(pos, -1);
    }
    if case_sensitive {
        let end_search = if start_pos <= end_pos { end_pos - length_find + 1 } else { end_pos };
        let char_start_search = search[0];
        while if forward { pos < end_search } else { pos >= end_search } {
            if doc.char_at(pos) == char_start_search {
                let mut found = pos + length_find <= limit_pos;
                for (index, &byte) in search.iter().enumerate().skip(1) {
                    if !found {
                        break;
                    }
                    found = doc.char_at(pos + index as Position) == byte;
                }
                if found && doc.matches_word_options(word, word_start, pos, length_find) {
                    *length = length_find;
                    return pos;
                }
            }
            if !next_character(doc, &mut pos, increment) {
                break;
            }
        }
    } else if doc.code_page() == CP_UTF8 {
        let folder = doc.case_folder();
        let mut search_thing =
            vec![0u8; (length_find as usize + 1) * UTF8_MAX_BYTES * MAX_FOLDING_EXPANSION + 1];
        let len_search = folder.fold(&mut search_thing, search);
        let mut bytes = [0u8; UTF8_MAX_BYTES];
        let mut folded = [0u8; UTF8_MAX_BYTES * MAX_FOLDING_EXPANSION];
        while if forward { pos < end_pos } else { pos >= end_pos } {
            let mut width_first_character = 0;
            let mut pos_index_document = pos;
            let mut index_search = 0usize;
            let mut character_matches = true;
            loop {
                let lead_byte = doc.char_at(pos_index_document);
                bytes[0] = lead_byte;
                let mut width_char = 1usize;
                if !utf8_is_ascii(lead_byte) {
                    let width_char_bytes = UTF8_BYTES_OF_LEAD[lead_byte as usize] as usize;
                    for (b, slot) in bytes.iter_mut().enumerate().take(width_char_bytes).skip(1) {
                        *slot = doc.char_at(pos_index_document + b as Position);
                    }
                    width_char =
                        (utf8_classify(&bytes[..width_char_bytes]) & UTF8_MASK_WIDTH) as usize;
                }
                if width_first_character == 0 {
                    width_first_character = width_char;
                }
                if pos_index_document + width_char as Position > limit_pos {
                    character_matches = false;
                    break;
                }
                let len_flat = folder.fold(&mut folded, &bytes[..width_char]);
                character_matches = len_flat > 0
                    && index_search + len_flat <= len_search
                    && folded[..len_flat] == search_thing[index_search..index_search + len_flat];
                if !character_matches {
                    break;
                }
                pos_index_document += width_char as Position;
                index_search += len_flat;
                if index_search >= len_search {
                    break;
                }
            }
            if character_matches && index_search == len_search {
                if doc.matches_word_options(word, word_start, pos, pos_index_document - pos) {
                    *length = pos_index_document - pos;
                    return pos;
                }
            }
            if forward {
                pos += width_first_character as Position;
            } else if !next_character(doc, &mut pos, increment) {
                break;
            }
        }
    } else if doc.is_dbcs() {
        let folder = doc.case_folder();
        const MAX_BYTES_CHARACTER: usize = 2;
        let mut search_thing =
            vec![0u8; (length_find as usize + 1) * MAX_BYTES_CHARACTER * MAX_FOLDING_EXPANSION + 1];
        let len_search = folder.fold(&mut search_thing, search);
        while if forward { pos < end_pos } else { pos >= end_pos } {
            let mut index_document: Position = 0;
            let mut index_search = 0usize;
            let mut character_matches = true;
            while character_matches && pos + index_document < limit_pos && index_search < len_search
            {
                let mut bytes = [0u8; MAX_BYTES_CHARACTER];
                bytes[0] = doc.char_at(pos + index_document);
                let width_char: usize = if doc.is_dbcs_lead_byte_at(bytes[0]) { 2 } else { 1 };
                if width_char == 2 {
                    bytes[1] = doc.char_at(pos + index_document + 1);
                }
                if pos + index_document + width_char as Position > limit_pos {
                    character_matches = false;
                    break;
                }
                let mut folded = [0u8; MAX_BYTES_CHARACTER * MAX_FOLDING_EXPANSION];
                let len_flat = folder.fold(&mut folded, &bytes[..width_char]);
                character_matches = len_flat > 0
                    && index_search + len_flat <= len_search
                    && folded[..len_flat] == search_thing[index_search..index_search + len_flat];
                index_document += width_char as Position;
                index_search += len_flat;
            }
            if character_matches && index_search == len_search {
                if doc.matches_word_options(word, word_start, pos, index_document) {
                    *length = index_document;
                    return pos;
                }
            }
            if !next_character(doc, &mut pos, increment) {
                break;
            }
        }
    } else {
        let folder = doc.case_folder();
        let end_search = if start_pos <= end_pos { end_pos - length_find + 1 } else { end_pos };
        let mut search_thing = vec![0u8; length_find as usize + 1];
        folder.fold(&mut search_thing, search);
        while if forward { pos < end_search } else { pos >= end_search } {
            let mut found = pos + length_find <= limit_pos;
            for index_search in 0..length_find as usize {
                if !found {
                    break;
                }
                let ch = doc.char_at(pos + index_search as Position);
                let mut folded = [0u8; 2];
                folder.fold(&mut folded, &[ch]);
                found = folded[0] == search_thing[index_search];
            }
            if found && doc.matches_word_options(word, word_start, pos, length_find) {
                *length = length_find;
                return pos;
            }
            if !next_character(doc, &mut pos, increment) {
                break;
            }
        }
    }
    -1
}

fn next_character(doc: &Document, pos: &mut Position, move_dir: Position) -> bool {
    let pos_next = doc.next_position(*pos, move_dir);
    if pos_next == *pos {
        false
    } else {
        *pos = pos_next;
        true
    }
}
