use std::fmt;

/// The kind of failure reported by an [`Error`].
///
/// Every fallible operation in this crate reports one of these kinds. The
/// distinction that matters most to parser internals is between
/// [`Mismatch`](ErrorKind::Mismatch), which means "this rule does not apply
/// here, try another", and [`Syntax`](ErrorKind::Syntax), which means "this
/// rule committed and the input is malformed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A parser could not apply at its position; an alternative may be tried.
    Mismatch,
    /// A parser committed to a production that then failed; not retriable.
    Syntax,
    /// A structural invariant was violated, such as a path beginning with
    /// `//` in a URL without an authority.
    Invalid,
    /// A percent-decoded reserved byte appeared where it is not allowed.
    IllegalReserved,
    /// A NUL byte was decoded while `allow_null` was disabled.
    IllegalNull,
    /// A `%` was not followed by two more characters.
    IncompletePct,
    /// A `%` was followed by a non-hexadecimal digit.
    BadPctDigit,
    /// A port's numeric value exceeded 65535.
    PortOverflow,
    /// The input exceeds the maximum supported URL length.
    Length,
    /// The destination buffer was too small for the decoded output.
    NoSpace,
    /// Internal sentinel used by range parsers to signal a clean end of
    /// repetition. Never returned by public operations.
    EndOfRange,
    /// A lookup by key or name found nothing.
    NotFound,
    /// A lookup by index was out of bounds.
    OutOfRange,
    /// The base URL of a resolution or relativization has no scheme.
    NotAbsolute,
}

impl ErrorKind {
    fn description(self) -> &'static str {
        match self {
            ErrorKind::Mismatch => "rule mismatch",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Invalid => "structural invariant violated",
            ErrorKind::IllegalReserved => "illegal reserved character",
            ErrorKind::IllegalNull => "illegal NUL in decoded output",
            ErrorKind::IncompletePct => "incomplete percent-escape",
            ErrorKind::BadPctDigit => "invalid percent-escape digit",
            ErrorKind::PortOverflow => "port exceeds 65535",
            ErrorKind::Length => "input exceeds maximum length",
            ErrorKind::NoSpace => "insufficient output space",
            ErrorKind::EndOfRange => "end of repetition",
            ErrorKind::NotFound => "not found",
            ErrorKind::OutOfRange => "index out of range",
            ErrorKind::NotAbsolute => "base URL is not absolute",
        }
    }
}

/// An error from parsing, encoding, mutation, or lookup.
///
/// Errors carry a [`kind()`](Error::kind) and, when the failure has a
/// meaningful position in the input, the byte index at which it occurred.
///
/// # Example
///
/// ```rust
/// use urlkit::{Url, ErrorKind};
///
/// let error = Url::parse("http://example.com:99999").unwrap_err();
/// assert_eq!(error.kind(), ErrorKind::PortOverflow);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    index: Option<usize>,
}

impl Error {
    #[inline(always)]
    pub(crate) const fn new(kind: ErrorKind) -> Error {
        Error { kind, index: None }
    }

    #[inline(always)]
    pub(crate) const fn at(kind: ErrorKind, index: usize) -> Error {
        Error { kind, index: Some(index) }
    }

    /// The kind of failure that occurred.
    #[inline(always)]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The byte index in the input at which the failure occurred, if the
    /// failure has one.
    #[inline(always)]
    pub const fn index(&self) -> Option<usize> {
        self.index
    }

    /// Whether an alternative parser may be tried at the same position.
    #[inline(always)]
    pub(crate) fn is_mismatch(&self) -> bool {
        matches!(self.kind, ErrorKind::Mismatch | ErrorKind::EndOfRange)
    }
}

impl From<ErrorKind> for Error {
    #[inline(always)]
    fn from(kind: ErrorKind) -> Error {
        Error::new(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{} at index {}", self.kind.description(), i),
            None => f.write_str(self.kind.description()),
        }
    }
}

impl std::error::Error for Error {}

/// The result type for fallible operations in this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position() {
        let e = Error::at(ErrorKind::BadPctDigit, 7);
        assert_eq!(e.to_string(), "invalid percent-escape digit at index 7");
        assert_eq!(Error::new(ErrorKind::Length).to_string(),
            "input exceeds maximum length");
    }

    #[test]
    fn mismatch_is_retriable() {
        assert!(Error::new(ErrorKind::Mismatch).is_mismatch());
        assert!(Error::new(ErrorKind::EndOfRange).is_mismatch());
        assert!(!Error::new(ErrorKind::Syntax).is_mismatch());
    }
}
