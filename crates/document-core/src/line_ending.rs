//! Line terminator kinds and modes.
//!
//! The buffer accepts any terminator at any time; these types only describe
//! what the engine recognises and what `convert_line_ends` normalises to.

/// Preferred terminator written by line-end conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EolMode {
    /// Windows-style CRLF (`"\r\n"`).
    CrLf,
    /// Classic Mac CR (`'\r'`).
    Cr,
    /// Unix LF (`'\n'`).
    Lf,
}

impl EolMode {
    /// The terminator bytes for this mode.
    pub fn bytes(self) -> &'static [u8] {
        match self {
            Self::CrLf => b"\r\n",
            Self::Cr => b"\r",
            Self::Lf => b"\n",
        }
    }

    /// Detect the dominant terminator in `text`: CRLF wins if present,
    /// otherwise CR only when no LF appears.
    pub fn detect_in_text(text: &[u8]) -> Self {
        let mut i = 0;
        let mut saw_cr = false;
        let mut saw_lf = false;
        while i < text.len() {
            match text[i] {
                b'\r' => {
                    if text.get(i + 1) == Some(&b'\n') {
                        return Self::CrLf;
                    }
                    saw_cr = true;
                }
                b'\n' => saw_lf = true,
                _ => {}
            }
            i += 1;
        }
        if saw_cr && !saw_lf { Self::Cr } else { Self::Lf }
    }
}

/// Bit set of recognised line-end families.
pub mod line_end_type {
    /// CR, LF and CRLF, always recognised.
    pub const DEFAULT: i32 = 0;
    /// U+2028, U+2029 and U+0085, recognised only for UTF-8 documents that
    /// opt in and whose lexer reports support.
    pub const UNICODE: i32 = 1;
}
