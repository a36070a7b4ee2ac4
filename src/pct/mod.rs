//! Percent-encoding and -decoding.
//!
//! Every operation takes a *permitted* [`CharSet`] describing the bytes
//! that may appear unescaped, and an options record. Decoding is split into
//! [`decoded_size()`], which validates and measures, and the writing
//! functions, so callers can size destination buffers exactly and skip
//! re-validation with [`decode_unchecked_into()`].

use crate::grammar::{hexdig_value, CharSet};
use crate::{Error, ErrorKind, Result};

/// Options for percent-decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOpts {
    /// Whether a NUL byte may appear in the decoded output. When `false`,
    /// decoding fails with [`ErrorKind::IllegalNull`] instead.
    pub allow_null: bool,
    /// Whether `+` decodes to a space, as in form-encoded query strings.
    pub plus_to_space: bool,
    /// Whether an escape that decodes to a byte in the permitted set is an
    /// error. Such escapes are legal but non-normal: the byte could have
    /// been written directly.
    pub non_normal_is_error: bool,
}

impl Default for DecodeOpts {
    #[inline]
    fn default() -> Self {
        DecodeOpts { allow_null: true, plus_to_space: true, non_normal_is_error: false }
    }
}

impl DecodeOpts {
    /// The options used for path and fragment decoding: RFC behavior, with
    /// no `+` folding.
    #[inline]
    pub fn rfc() -> Self {
        DecodeOpts { plus_to_space: false, ..DecodeOpts::default() }
    }
}

/// Options for percent-encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOpts {
    /// Whether a space encodes to `+` instead of `%20`.
    pub space_to_plus: bool,
    /// Whether escapes use lower-case hex digits.
    pub lower_case: bool,
}

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";
const HEX_LOWER: &[u8; 16] = b"0123456789abcdef";

// Reads the escape starting at `s[i]`, which must be `%`.
#[inline]
fn read_escape(s: &[u8], i: usize) -> Result<u8> {
    if i + 2 >= s.len() {
        return Err(Error::at(ErrorKind::IncompletePct, i));
    }

    let hi = hexdig_value(s[i + 1]);
    let lo = hexdig_value(s[i + 2]);
    if hi < 0 || lo < 0 {
        return Err(Error::at(ErrorKind::BadPctDigit, i));
    }

    Ok(((hi as u8) << 4) | lo as u8)
}

/// Validates `s` as a percent-encoded string over `permitted` and returns
/// the number of bytes its decoded form occupies.
///
/// # Example
///
/// ```rust
/// use urlkit::pct::{decoded_size, DecodeOpts};
/// use urlkit::grammar::ALPHA;
///
/// let n = decoded_size("a%20b", &ALPHA.add(b' '), DecodeOpts::rfc());
/// assert_eq!(n.unwrap(), 3);
/// ```
pub fn decoded_size(s: &str, permitted: &CharSet, opts: DecodeOpts) -> Result<usize> {
    let s = s.as_bytes();
    let (mut i, mut n) = (0, 0);
    while i < s.len() {
        let b = s[i];
        let decoded = if b == b'%' {
            let v = read_escape(s, i)?;
            if opts.non_normal_is_error && permitted.contains(v) {
                return Err(Error::at(ErrorKind::IllegalReserved, i));
            }

            i += 3;
            v
        } else if b == b'+' && opts.plus_to_space {
            i += 1;
            b' '
        } else if permitted.contains(b) {
            i += 1;
            b
        } else {
            return Err(Error::at(ErrorKind::IllegalReserved, i));
        };

        if decoded == 0 && !opts.allow_null {
            return Err(Error::at(ErrorKind::IllegalNull, i));
        }

        n += 1;
    }

    Ok(n)
}

/// Validates and decodes `s` into `dest`, returning the number of bytes
/// written.
///
/// Fails with [`ErrorKind::NoSpace`] if `dest` fills up before the input is
/// exhausted; `dest` contents are unspecified on any failure.
pub fn decode_into(
    dest: &mut [u8],
    s: &str,
    permitted: &CharSet,
    opts: DecodeOpts,
) -> Result<usize> {
    let s = s.as_bytes();
    let (mut i, mut n) = (0, 0);
    while i < s.len() {
        let b = s[i];
        let decoded = if b == b'%' {
            let v = read_escape(s, i)?;
            if opts.non_normal_is_error && permitted.contains(v) {
                return Err(Error::at(ErrorKind::IllegalReserved, i));
            }

            i += 3;
            v
        } else if b == b'+' && opts.plus_to_space {
            i += 1;
            b' '
        } else if permitted.contains(b) {
            i += 1;
            b
        } else {
            return Err(Error::at(ErrorKind::IllegalReserved, i));
        };

        if decoded == 0 && !opts.allow_null {
            return Err(Error::at(ErrorKind::IllegalNull, i));
        }

        if n == dest.len() {
            return Err(Error::at(ErrorKind::NoSpace, i));
        }

        dest[n] = decoded;
        n += 1;
    }

    Ok(n)
}

/// Decodes `s` without validating it.
///
/// Only call this with input that a prior [`decoded_size()`] accepted:
/// malformed escapes are copied through unchanged here. Returns the number
/// of bytes written, which never exceeds `s.len()`.
pub fn decode_unchecked_into(dest: &mut [u8], s: &str, opts: DecodeOpts) -> usize {
    let s = s.as_bytes();
    let (mut i, mut n) = (0, 0);
    while i < s.len() {
        let b = s[i];
        dest[n] = if b == b'%' && i + 2 < s.len() {
            let (hi, lo) = (hexdig_value(s[i + 1]), hexdig_value(s[i + 2]));
            if hi >= 0 && lo >= 0 {
                i += 3;
                ((hi as u8) << 4) | lo as u8
            } else {
                i += 1;
                b
            }
        } else if b == b'+' && opts.plus_to_space {
            i += 1;
            b' '
        } else {
            i += 1;
            b
        };

        n += 1;
    }

    n
}

/// Validates and decodes `s`, allocating the output.
pub fn decode(s: &str, permitted: &CharSet, opts: DecodeOpts) -> Result<Vec<u8>> {
    let size = decoded_size(s, permitted, opts)?;
    let mut out = vec![0; size];
    let n = decode_unchecked_into(&mut out, s, opts);
    debug_assert_eq!(n, size);
    Ok(out)
}

/// Returns the number of bytes [`encode_into()`] would write for `s`.
pub fn encoded_size(s: &str, permitted: &CharSet, opts: EncodeOpts) -> usize {
    let mut n = 0;
    for b in s.bytes() {
        if permitted.contains(b) || (b == b' ' && opts.space_to_plus) {
            n += 1;
        } else {
            n += 3;
        }
    }

    n
}

/// Percent-encodes `s` into `dest`, returning the number of bytes written.
///
/// Bytes in `permitted` are copied through; every other byte becomes a
/// `%HH` escape, except a space under `space_to_plus`. Fails with
/// [`ErrorKind::NoSpace`] if `dest` is too small.
pub fn encode_into(
    dest: &mut [u8],
    s: &str,
    permitted: &CharSet,
    opts: EncodeOpts,
) -> Result<usize> {
    let hex = if opts.lower_case { HEX_LOWER } else { HEX_UPPER };
    let mut n = 0;
    for (i, b) in s.bytes().enumerate() {
        if permitted.contains(b) {
            if n == dest.len() {
                return Err(Error::at(ErrorKind::NoSpace, i));
            }

            dest[n] = b;
            n += 1;
        } else if b == b' ' && opts.space_to_plus {
            if n == dest.len() {
                return Err(Error::at(ErrorKind::NoSpace, i));
            }

            dest[n] = b'+';
            n += 1;
        } else {
            if n + 3 > dest.len() {
                return Err(Error::at(ErrorKind::NoSpace, i));
            }

            dest[n] = b'%';
            dest[n + 1] = hex[(b >> 4) as usize];
            dest[n + 2] = hex[(b & 0xf) as usize];
            n += 3;
        }
    }

    Ok(n)
}

/// Percent-encodes `s`, allocating the output.
///
/// # Example
///
/// ```rust
/// use urlkit::pct::{encode, EncodeOpts};
/// use urlkit::rfc::PCHARS;
///
/// assert_eq!(encode("A B", &PCHARS, EncodeOpts::default()), "A%20B");
/// ```
pub fn encode(s: &str, permitted: &CharSet, opts: EncodeOpts) -> String {
    let mut out = vec![0; encoded_size(s, permitted, opts)];
    let n = encode_into(&mut out, s, permitted, opts)
        .expect("buffer sized by encoded_size");
    debug_assert_eq!(n, out.len());

    // SAFETY: the output consists of bytes copied from a `str` that were
    // individually permitted, plus ASCII escapes.
    unsafe { String::from_utf8_unchecked(out) }
}

/// Percent-encodes `s` while preserving escapes it already contains.
///
/// A well-formed `%HH` sequence in `s` is copied through verbatim; all
/// other bytes are processed as in [`encode()`]. A stray `%` that does not
/// begin an escape is itself encoded.
pub fn reencode(s: &str, permitted: &CharSet, opts: EncodeOpts) -> String {
    let hex = if opts.lower_case { HEX_LOWER } else { HEX_UPPER };
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' && read_escape(bytes, i).is_ok() {
            out.extend_from_slice(&bytes[i..i + 3]);
            i += 3;
        } else if permitted.contains(b) && b != b'%' {
            out.push(b);
            i += 1;
        } else if b == b' ' && opts.space_to_plus {
            out.push(b'+');
            i += 1;
        } else {
            out.extend_from_slice(&[b'%', hex[(b >> 4) as usize], hex[(b & 0xf) as usize]]);
            i += 1;
        }
    }

    // SAFETY: same reasoning as `encode()`.
    unsafe { String::from_utf8_unchecked(out) }
}

/// Compares a possibly-escaped key against a plain-text key, decoding on
/// the fly and without allocating.
///
/// Malformed escapes in `encoded` are compared literally.
///
/// # Example
///
/// ```rust
/// use urlkit::pct::key_equal;
///
/// assert!(key_equal("a%20b", "a b"));
/// assert!(!key_equal("a%20b", "a%20b"));
/// ```
pub fn key_equal(encoded: &str, plain: &str) -> bool {
    key_equal_opt(encoded, plain, false)
}

pub(crate) fn key_equal_opt(encoded: &str, plain: &str, plus_to_space: bool) -> bool {
    let (e, p) = (encoded.as_bytes(), plain.as_bytes());
    let (mut i, mut j) = (0, 0);
    while i < e.len() && j < p.len() {
        let decoded = if e[i] == b'%' {
            match read_escape(e, i) {
                Ok(v) => {
                    i += 3;
                    v
                }
                Err(_) => {
                    i += 1;
                    b'%'
                }
            }
        } else if e[i] == b'+' && plus_to_space {
            i += 1;
            b' '
        } else {
            let v = e[i];
            i += 1;
            v
        };

        if decoded != p[j] {
            return false;
        }

        j += 1;
    }

    i == e.len() && j == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{CharSet, ALNUM};
    use crate::ErrorKind;

    const PLAIN: CharSet = ALNUM.add(b'-').add(b'.').add(b'_').add(b'~');

    fn size(s: &str) -> Result<usize> {
        decoded_size(s, &PLAIN, DecodeOpts::rfc())
    }

    #[test]
    fn measure() {
        assert_eq!(size("").unwrap(), 0);
        assert_eq!(size("abc").unwrap(), 3);
        assert_eq!(size("a%20b").unwrap(), 3);
        assert_eq!(size("%41%42%43").unwrap(), 3);
    }

    #[test]
    fn measure_failures() {
        assert_eq!(size("a%2").unwrap_err().kind(), ErrorKind::IncompletePct);
        assert_eq!(size("%").unwrap_err().kind(), ErrorKind::IncompletePct);
        assert_eq!(size("%zz").unwrap_err().kind(), ErrorKind::BadPctDigit);
        assert_eq!(size("%2x").unwrap_err().kind(), ErrorKind::BadPctDigit);
        assert_eq!(size("a b").unwrap_err().kind(), ErrorKind::IllegalReserved);
        assert_eq!(size("a b").unwrap_err().index(), Some(1));
    }

    #[test]
    fn nulls() {
        let relaxed = DecodeOpts::rfc();
        assert_eq!(decoded_size("%00", &PLAIN, relaxed).unwrap(), 1);

        let strict = DecodeOpts { allow_null: false, ..relaxed };
        let e = decoded_size("a%00b", &PLAIN, strict).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::IllegalNull);
    }

    #[test]
    fn non_normal_escapes() {
        let opts = DecodeOpts { non_normal_is_error: true, ..DecodeOpts::rfc() };
        assert_eq!(decoded_size("%2F", &PLAIN, opts).unwrap(), 1);

        // `a` is permitted, so escaping it is non-normal.
        let e = decoded_size("%61", &PLAIN, opts).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::IllegalReserved);
    }

    #[test]
    fn plus_handling() {
        let form = DecodeOpts::default();
        let rfc = DecodeOpts::rfc();

        let permitted = PLAIN.add(b'+');
        assert_eq!(decode("a+b", &permitted, form).unwrap(), b"a b");
        assert_eq!(decode("a+b", &permitted, rfc).unwrap(), b"a+b");

        // `+` decodes to space even when it is not otherwise permitted.
        assert_eq!(decode("a+b", &PLAIN, form).unwrap(), b"a b");
    }

    #[test]
    fn decode_roundtrip() {
        let cases = ["", "abc", "a%20b", "%00%FF", "a%2Fb%2fc"];
        for s in cases {
            let permitted = PLAIN;
            let size = decoded_size(s, &permitted, DecodeOpts::rfc()).unwrap();
            let mut buf = vec![0; size];
            let n = decode_into(&mut buf, s, &permitted, DecodeOpts::rfc()).unwrap();
            assert_eq!(n, size);

            let mut buf2 = vec![0; size];
            assert_eq!(decode_unchecked_into(&mut buf2, s, DecodeOpts::rfc()), size);
            assert_eq!(buf, buf2);
        }
    }

    #[test]
    fn no_space() {
        let mut tiny = [0; 2];
        let e = decode_into(&mut tiny, "abc", &PLAIN, DecodeOpts::rfc());
        assert_eq!(e.unwrap_err().kind(), ErrorKind::NoSpace);

        let e = encode_into(&mut tiny, "a b", &PLAIN, EncodeOpts::default());
        assert_eq!(e.unwrap_err().kind(), ErrorKind::NoSpace);
    }

    #[test]
    fn encoding() {
        let opts = EncodeOpts::default();
        assert_eq!(encode("A B", &PLAIN, opts), "A%20B");
        assert_eq!(encode("sound/fury", &PLAIN, opts), "sound%2Ffury");
        assert_eq!(encoded_size("A B", &PLAIN, opts), 5);

        let lower = EncodeOpts { lower_case: true, ..opts };
        assert_eq!(encode("\x7f*", &PLAIN, lower), "%7f%2a");
        assert_eq!(encode("\x7f*", &PLAIN, opts), "%7F%2A");

        let plus = EncodeOpts { space_to_plus: true, ..opts };
        assert_eq!(encode("A B", &PLAIN, plus), "A+B");
        assert_eq!(encoded_size("A B", &PLAIN, plus), 3);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let inputs = ["hello world", "/a/b?c=d", "100%", "\u{00e9}t\u{00e9}"];
        for input in inputs {
            for space_to_plus in [false, true] {
                let enc_opts = EncodeOpts { space_to_plus, ..EncodeOpts::default() };
                let dec_opts = DecodeOpts {
                    plus_to_space: space_to_plus,
                    ..DecodeOpts::rfc()
                };

                let encoded = encode(input, &PLAIN, enc_opts);
                let decoded = decode(&encoded, &PLAIN, dec_opts).unwrap();
                assert_eq!(decoded, input.as_bytes());
            }
        }
    }

    #[test]
    fn decode_idempotent_on_plain() {
        let s = "plain-text_1.2~3";
        assert_eq!(decode(s, &PLAIN, DecodeOpts::rfc()).unwrap(), s.as_bytes());
    }

    #[test]
    fn reencoding() {
        let opts = EncodeOpts::default();
        assert_eq!(reencode("a%20b c", &PLAIN, opts), "a%20b%20c");
        assert_eq!(reencode("100%", &PLAIN, opts), "100%25");
        assert_eq!(reencode("%2x", &PLAIN, opts), "%252x");
        assert_eq!(reencode("abc", &PLAIN, opts), "abc");
    }

    #[test]
    fn key_comparison() {
        assert!(key_equal("a%20b", "a b"));
        assert!(key_equal("abc", "abc"));
        assert!(key_equal("", ""));
        assert!(!key_equal("a%20b", "a  b"));
        assert!(!key_equal("a", "ab"));
        assert!(!key_equal("ab", "a"));
        assert!(!key_equal("a+b", "a b"));
        assert!(key_equal_opt("a+b", "a b", true));

        // A stray `%` compares literally.
        assert!(key_equal("100%", "100%"));
    }
}
