use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use ref_cast::RefCast;

use crate::grammar::{hexdig_value, CharSet};
use crate::pct::{self, DecodeOpts};
use crate::{Error, ErrorKind, Result};

/// A string slice guaranteed to be a well-formed percent-encoded string.
///
/// In a well-formed encoded string, every `%` begins a `%HH` escape with two
/// hexadecimal digits. Nothing else is assumed: which *other* bytes are
/// acceptable depends on the URL part the string came from, and was checked
/// by whichever parser produced the value.
///
/// `EncodedStr` is a transparent wrapper over `str`; it is the type returned
/// by all `encoded_*` accessors in this crate.
///
/// # Example
///
/// ```rust
/// use urlkit::EncodedStr;
///
/// let s = EncodedStr::new("hello%20world").unwrap();
/// assert_eq!(s.decoded_len(), 11);
/// assert_eq!(s.decode_lossy(), "hello world");
///
/// EncodedStr::new("50%").unwrap_err();
/// ```
#[repr(transparent)]
#[derive(RefCast, PartialEq, Eq, Hash)]
pub struct EncodedStr(str);

impl EncodedStr {
    /// Validates `s` as a well-formed encoded string.
    pub fn new(s: &str) -> Result<&EncodedStr> {
        let bytes = s.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                if i + 2 >= bytes.len() {
                    return Err(Error::at(ErrorKind::IncompletePct, i));
                }

                if hexdig_value(bytes[i + 1]) < 0 || hexdig_value(bytes[i + 2]) < 0 {
                    return Err(Error::at(ErrorKind::BadPctDigit, i));
                }

                i += 3;
            } else {
                i += 1;
            }
        }

        Ok(EncodedStr::assume(s))
    }

    /// Wraps `s` without validating. `s` must already be known well-formed.
    #[inline(always)]
    pub(crate) fn assume(s: &str) -> &EncodedStr {
        EncodedStr::ref_cast(s)
    }

    /// The underlying encoded string.
    #[inline(always)]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The length of the encoded form, in bytes.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the string is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of bytes the decoded form of this string occupies.
    pub fn decoded_len(&self) -> usize {
        let bytes = self.0.as_bytes();
        let mut i = 0;
        let mut n = 0;
        while i < bytes.len() {
            i += if bytes[i] == b'%' { 3 } else { 1 };
            n += 1;
        }

        n
    }

    /// Returns a lazily decoded view of this string.
    ///
    /// The view decodes with RFC semantics: `+` stays `+`. Use
    /// [`decode_view_with()`](Self::decode_view_with) to fold `+` to space.
    #[inline]
    pub fn decode_view(&self) -> DecodeView<'_> {
        self.decode_view_with(DecodeOpts::rfc())
    }

    /// Returns a lazily decoded view of this string using `opts`.
    pub fn decode_view_with(&self, opts: DecodeOpts) -> DecodeView<'_> {
        DecodeView {
            encoded: &self.0,
            len: self.decoded_len(),
            plus_to_space: opts.plus_to_space,
        }
    }

    /// Decodes into freshly allocated bytes.
    #[inline]
    pub fn decode_bytes(&self) -> Vec<u8> {
        let mut out = vec![0; self.decoded_len()];
        let n = pct::decode_unchecked_into(&mut out, &self.0, DecodeOpts::rfc());
        debug_assert_eq!(n, out.len());
        out
    }

    /// Decodes to a string, replacing invalid UTF-8 sequences with `\u{FFFD}`.
    ///
    /// Returns a borrow of the original when nothing needed decoding.
    pub fn decode_lossy(&self) -> Cow<'_, str> {
        if !self.0.as_bytes().contains(&b'%') {
            return Cow::Borrowed(&self.0);
        }

        match String::from_utf8_lossy(&self.decode_bytes()) {
            Cow::Borrowed(s) => Cow::Owned(s.to_string()),
            Cow::Owned(s) => Cow::Owned(s),
        }
    }

    /// Decodes after validating against a permitted set and options.
    #[inline]
    pub fn decode_with(&self, permitted: &CharSet, opts: DecodeOpts) -> Result<Vec<u8>> {
        pct::decode(&self.0, permitted, opts)
    }

    /// Whether this string decodes to exactly the plain-text `key`.
    #[inline]
    pub fn decoded_eq(&self, key: &str) -> bool {
        pct::key_equal(&self.0, key)
    }
}

impl fmt::Display for EncodedStr {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for EncodedStr {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for EncodedStr {
    #[inline(always)]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for EncodedStr {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        &self.0 == other
    }
}

impl PartialEq<&str> for EncodedStr {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        &self.0 == *other
    }
}

impl<'a> TryFrom<&'a str> for &'a EncodedStr {
    type Error = Error;

    #[inline]
    fn try_from(s: &'a str) -> Result<Self> {
        EncodedStr::new(s)
    }
}

/// A non-allocating view of an encoded string's decoded form.
///
/// The view records the decoded length at construction, so size queries are
/// O(1); the decoded bytes themselves are produced on demand by
/// [`bytes()`](DecodeView::bytes). Comparison, ordering, hashing, and
/// display all operate on the decoded bytes without materializing them.
///
/// # Example
///
/// ```rust
/// use urlkit::EncodedStr;
///
/// let view = EncodedStr::new("caf%C3%A9").unwrap().decode_view();
/// assert_eq!(view.len(), 5);
/// assert_eq!(view, *"caf\u{e9}");
/// assert_eq!(view.to_string(), "caf\u{e9}");
/// ```
#[derive(Clone, Copy)]
pub struct DecodeView<'a> {
    encoded: &'a str,
    len: usize,
    plus_to_space: bool,
}

impl<'a> DecodeView<'a> {
    /// The decoded length, in bytes. O(1).
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the decoded form is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The encoded string this view decodes.
    #[inline(always)]
    pub fn as_encoded_str(&self) -> &'a EncodedStr {
        EncodedStr::assume(self.encoded)
    }

    /// Returns an iterator over the decoded bytes.
    #[inline]
    pub fn bytes(&self) -> DecodeBytes<'a> {
        DecodeBytes {
            bytes: self.encoded.as_bytes(),
            pos: 0,
            plus_to_space: self.plus_to_space,
        }
    }
}

/// An iterator over the decoded bytes of a [`DecodeView`].
#[derive(Clone)]
pub struct DecodeBytes<'a> {
    bytes: &'a [u8],
    pos: usize,
    plus_to_space: bool,
}

impl Iterator for DecodeBytes<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        if b == b'%' {
            // Well-formedness is an `EncodedStr` invariant.
            let hi = hexdig_value(self.bytes[self.pos + 1]) as u8;
            let lo = hexdig_value(self.bytes[self.pos + 2]) as u8;
            self.pos += 3;
            return Some((hi << 4) | lo);
        }

        self.pos += 1;
        match b {
            b'+' if self.plus_to_space => Some(b' '),
            _ => Some(b),
        }
    }
}

impl PartialEq for DecodeView<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.bytes().eq(other.bytes())
    }
}

impl Eq for DecodeView<'_> {}

impl PartialEq<str> for DecodeView<'_> {
    fn eq(&self, other: &str) -> bool {
        self.len == other.len() && self.bytes().eq(other.bytes())
    }
}

impl PartialEq<&str> for DecodeView<'_> {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

impl PartialOrd for DecodeView<'_> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DecodeView<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes().cmp(other.bytes())
    }
}

impl Hash for DecodeView<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // One `write_u8` per decoded byte, so the hash is a function of the
        // decoded bytes alone and agrees across encodings of the same text.
        for b in self.bytes() {
            state.write_u8(b);
        }

        state.write_usize(self.len);
    }
}

impl fmt::Display for DecodeView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chunk = [0u8; 64];
        let mut n = 0;
        for b in self.bytes() {
            chunk[n] = b;
            n += 1;
            if n == chunk.len() {
                n = flush_lossy(f, &mut chunk, n, false)?;
            }
        }

        flush_lossy(f, &mut chunk, n, true)?;
        Ok(())
    }
}

// Writes the valid UTF-8 prefix of `chunk[..n]`, replacing invalid
// sequences, and carries any trailing incomplete sequence back to the front
// of `chunk`, returning the carried length.
fn flush_lossy(f: &mut fmt::Formatter<'_>, chunk: &mut [u8; 64], n: usize, last: bool)
    -> std::result::Result<usize, fmt::Error>
{
    let mut pos = 0;
    while pos < n {
        match std::str::from_utf8(&chunk[pos..n]) {
            Ok(s) => {
                f.write_str(s)?;
                return Ok(0);
            }
            Err(e) => {
                let valid = e.valid_up_to();
                if valid > 0 {
                    // Validity was just established.
                    let s = unsafe {
                        std::str::from_utf8_unchecked(&chunk[pos..pos + valid])
                    };
                    f.write_str(s)?;
                    pos += valid;
                }

                match e.error_len() {
                    Some(bad) => {
                        f.write_str("\u{fffd}")?;
                        pos += bad;
                    }
                    None if last => {
                        f.write_str("\u{fffd}")?;
                        return Ok(0);
                    }
                    None => {
                        // Incomplete tail; carry it into the next chunk.
                        chunk.copy_within(pos..n, 0);
                        return Ok(n - pos);
                    }
                }
            }
        }
    }

    Ok(0)
}

impl fmt::Debug for DecodeView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecodeView({:?})", self.encoded)
    }
}
