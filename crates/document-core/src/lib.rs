#![warn(missing_docs)]
//! Document Core - Headless Text Document Engine
//!
//! # Overview
//!
//! `document-core` is the document half of a source-code editor: the text
//! buffer, its indices and overlays, its history, and its search, with no
//! rendering, no caret, and no platform code. Hosts own the view; this
//! crate owns the bytes and answers the questions views ask.
//!
//! # Core Features
//!
//! - **Gap-buffered storage**: text and per-byte style cells with amortised
//!   O(1) edits at the caret
//! - **Line index**: position↔line queries in O(log n), maintained
//!   incrementally through every edit including CRLF splits and joins
//! - **Undo history**: coalescing action log with grouping, save point and
//!   tentative (input composition) mode
//! - **Per-line data**: markers, fold levels, lexer line states,
//!   annotations and margin texts that follow line structure automatically
//! - **Decorations**: run-length indicator overlays orthogonal to styles
//! - **Folding state**: document-line to display-line mapping with a
//!   zero-allocation fast path
//! - **Multi-encoding**: UTF-8 and the DBCS pages (Shift-JIS, GBK, Big5,
//!   Wansung, Johab) with correct character-boundary arithmetic
//! - **Search**: literal (case-sensitive or folded per encoding) and two
//!   regular-expression engines behind one interface
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Document (API, notifications, lexing)      │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Search (literal + regex engines)           │
//! ├─────────────────────────────────────────────┤
//! │  CellBuffer (text + styles + undo + lines)  │
//! ├─────────────────────────────────────────────┤
//! │  RunStyles / SparseVector / Partitioning    │  ← Range structures
//! ├─────────────────────────────────────────────┤
//! │  SplitVector (gap buffer)                   │  ← Storage
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use document_core::Document;
//!
//! let mut doc = Document::new();
//! doc.insert_string(0, b"fn main() {\n}\n");
//! assert_eq!(doc.lines_total(), 3);
//! assert_eq!(doc.line_start(1), 12);
//! assert!(doc.can_undo());
//!
//! doc.undo();
//! assert_eq!(doc.length(), 0);
//! ```
//!
//! Lexers integrate through the `document-core-lex` crate: a [`Document`]
//! implements its `LexDocument` reader trait, and any `Lexer` attached with
//! [`Document::set_lexer`] is driven incrementally by
//! [`Document::ensure_styled_to`].
//!
//! # Module Description
//!
//! - [`split_vector`] - gap-buffered contiguous storage
//! - [`partitioning`] - ordered position partitioning with O(1) shifts
//! - [`run_styles`] - run-length maps over positions
//! - [`sparse_vector`] - sparse position-keyed storage
//! - [`cell_buffer`] - text/style cells, line maintenance, undo recording
//! - [`undo_history`] - the coalescing action log
//! - [`per_line`] - markers, levels, line states, annotations
//! - [`decorations`] - indicator overlays
//! - [`contraction_state`] - folding/wrap visibility mapping
//! - [`encoding`] - UTF-8 and DBCS tables
//! - [`char_classify`] / [`case_folding`] - word classes and case folding
//! - [`search`] / [`re_search`] - literal and regex search
//! - [`document`] - the composition root

pub mod case_folding;
pub mod cell_buffer;
pub mod char_classify;
pub mod contraction_state;
pub mod decorations;
pub mod document;
pub mod encoding;
pub mod line_ending;
pub mod line_vector;
pub mod partitioning;
pub mod per_line;
pub mod re_search;
pub mod run_styles;
pub mod search;
pub mod sparse_vector;
pub mod split_vector;
pub mod status;
pub mod undo_history;

/// Byte offset into a document: 0-based, signed, 64-bit.
pub type Position = i64;

/// Sentinel returned where no valid position exists.
pub const INVALID_POSITION: Position = -1;

pub use case_folding::{
    CaseFolder, CaseFolderDBCS, CaseFolderTable, CaseFolderUnicode, MAX_FOLDING_EXPANSION,
};
pub use cell_buffer::CellBuffer;
pub use char_classify::{CharClassify, CharacterClass};
pub use contraction_state::ContractionState;
pub use decorations::{Decoration, DecorationList, INDICATOR_CONTAINER, INDICATOR_IME, INDICATOR_MAX};
pub use document::{
    CharacterExtracted, DocModification, DocWatcher, Document, HighlightDelimiter, PerLineData,
    UndoGroup,
};
pub use document::{
    LASTSTEPINUNDOREDO, MOD_BEFOREDELETE, MOD_BEFOREINSERT, MOD_CHANGEANNOTATION, MOD_CHANGEFOLD,
    MOD_CHANGEINDICATOR, MOD_CHANGELINESTATE, MOD_CHANGEMARGIN, MOD_CHANGEMARKER, MOD_CHANGESTYLE,
    MOD_CONTAINER, MOD_DELETETEXT, MOD_INSERTCHECK, MOD_INSERTTEXT, MOD_LEXERSTATE,
    MULTILINEUNDOREDO, MULTISTEPUNDOREDO, PERFORMED_REDO, PERFORMED_UNDO, PERFORMED_USER,
    STARTACTION,
};
pub use encoding::CP_UTF8;
pub use line_ending::{EolMode, line_end_type};
pub use per_line::{
    FOLD_LEVEL_BASE, FOLD_LEVEL_HEADER_FLAG, FOLD_LEVEL_NUMBER_MASK, FOLD_LEVEL_WHITE_FLAG,
    LineAnnotations, LineLevels, LineMarkers, LineState, PerLine, level_number,
};
pub use search::{
    FIND_CXX11REGEX, FIND_MATCH_CASE, FIND_POSIX, FIND_REGEXP, FIND_WHOLE_WORD, FIND_WORD_START,
    RegexSearcher,
};
pub use status::Status;
pub use undo_history::{Action, ActionKind, UndoHistory};

// Re-export the lexer-facing traits so containers need only one crate.
pub use document_core_lex::{LexAccessor, LexDocument, Lexer, PropertyType};
