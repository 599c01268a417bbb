//! Engine status codes.

use thiserror::Error;

/// Failure conditions the engine reports to containers.
///
/// The document API recovers locally from out-of-range and read-only
/// requests (they become no-ops); `Status` covers the conditions a
/// container may want to surface, delivered through
/// [`notify_error_occurred`](crate::document::DocWatcher::notify_error_occurred)
/// or returned by fallible entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Status {
    /// No error.
    #[error("ok")]
    Ok,
    /// An allocation failed; the document is unchanged.
    #[error("memory allocation failed")]
    BadAlloc,
    /// A position was outside the document.
    #[error("position out of range")]
    BadPosition,
    /// A regular expression failed to compile.
    #[error("invalid regular expression")]
    RegexError,
    /// Unspecified failure.
    #[error("operation failed")]
    Failure,
}

impl Default for Status {
    fn default() -> Self {
        Self::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_read_well() {
        assert_eq!(Status::RegexError.to_string(), "invalid regular expression");
        assert_eq!(Status::default(), Status::Ok);
    }
}
