use crate::grammar::{range, range2, Cursor, Rule};
use crate::rfc::chars::{PCHARS, SEGMENT_NZ_NC_CHARS};
use crate::rfc::enc_token;
use crate::{Error, ErrorKind, Result};

/// A parsed path: its raw text and the number of segments it contains.
///
/// Segment counting follows RFC path parsing: the paths `` and `/` have
/// zero segments, `/a//b` has three, and a trailing slash contributes a
/// final empty segment, so `/a/` has two.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawPath<'a> {
    pub text: &'a str,
    pub segments: usize,
}

impl<'a> RawPath<'a> {
    pub(crate) const EMPTY: RawPath<'static> = RawPath { text: "", segments: 0 };

    fn new(text: &'a str, matched: usize) -> RawPath<'a> {
        // A lone `/` is a root with nothing under it, not an empty segment.
        let segments = if text == "/" { 0 } else { matched };
        RawPath { text, segments }
    }
}

/// The segment count of an already-validated path.
pub(crate) fn count_segments(path: &str) -> usize {
    if path.is_empty() || path == "/" {
        return 0;
    }

    let content = path.strip_prefix('/').unwrap_or(path);
    memchr::memchr_iter(b'/', content.as_bytes()).count() + 1
}

/// One path segment, optionally introduced by `/`.
#[derive(Debug, Clone, Copy)]
struct Segment {
    set: crate::grammar::CharSet,
    min: usize,
    slash: bool,
}

impl<'a> Rule<'a> for Segment {
    type Output = &'a str;

    fn parse(&self, cursor: &mut Cursor<'a>) -> Result<&'a str> {
        let start = cursor.mark();
        if self.slash && !cursor.eat(b'/') {
            return Err(Error::at(ErrorKind::Mismatch, cursor.pos()));
        }

        match enc_token(self.set, self.min).parse(cursor) {
            Ok(segment) => Ok(segment),
            Err(e) if e.is_mismatch() => {
                cursor.rewind_to(start);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

const SLASH_SEGMENT: Segment = Segment { set: PCHARS, min: 0, slash: true };
const SEGMENT_NZ: Segment = Segment { set: PCHARS, min: 1, slash: false };
const SEGMENT_NZ_NC: Segment = Segment { set: SEGMENT_NZ_NC_CHARS, min: 1, slash: false };

/// `path-abempty = *( "/" segment )`
pub(crate) fn path_abempty<'a>(cursor: &mut Cursor<'a>) -> Result<RawPath<'a>> {
    let parsed = range(SLASH_SEGMENT, 0..=usize::MAX).parse(cursor)?;
    Ok(RawPath::new(parsed.as_str(), parsed.len()))
}

/// `path-absolute = "/" [ segment-nz *( "/" segment ) ]`
///
/// Unlike `path-abempty`, a leading `//` is not part of this production.
pub(crate) fn path_absolute<'a>(cursor: &mut Cursor<'a>) -> Result<RawPath<'a>> {
    let path = path_abempty(cursor)?;
    if path.text.is_empty() {
        return Err(Error::at(ErrorKind::Mismatch, cursor.pos()));
    }

    if path.text.starts_with("//") {
        return Err(Error::at(ErrorKind::Invalid, cursor.pos() - path.text.len()));
    }

    Ok(path)
}

/// `path-rootless = segment-nz *( "/" segment )`
pub(crate) fn path_rootless<'a>(cursor: &mut Cursor<'a>) -> Result<RawPath<'a>> {
    let parsed = range2(SEGMENT_NZ, SLASH_SEGMENT, 1..=usize::MAX).parse(cursor)?;
    Ok(RawPath::new(parsed.as_str(), parsed.len()))
}

/// `path-noscheme = segment-nz-nc *( "/" segment )`
pub(crate) fn path_noscheme<'a>(cursor: &mut Cursor<'a>) -> Result<RawPath<'a>> {
    let parsed = range2(SEGMENT_NZ_NC, SLASH_SEGMENT, 1..=usize::MAX).parse(cursor)?;
    Ok(RawPath::new(parsed.as_str(), parsed.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abempty(s: &str) -> (String, usize) {
        let mut cursor = Cursor::new(s);
        let path = path_abempty(&mut cursor).unwrap();
        (path.text.to_string(), path.segments)
    }

    #[test]
    fn abempty_segments() {
        assert_eq!(abempty(""), (String::new(), 0));
        assert_eq!(abempty("/"), ("/".into(), 0));
        assert_eq!(abempty("/a/b"), ("/a/b".into(), 2));
        assert_eq!(abempty("/a/"), ("/a/".into(), 2));
        assert_eq!(abempty("/a//b/"), ("/a//b/".into(), 4));
        assert_eq!(abempty("/p%20q?x"), ("/p%20q".into(), 1));
        assert_eq!(abempty("abc"), (String::new(), 0));
    }

    #[test]
    fn counting_matches_parsing() {
        for path in ["", "/", "/a", "/a/", "a", "a/b", "/a//b/", "/path/to/f"] {
            let mut cursor = Cursor::new(path);
            let parsed = match path.starts_with('/') || path.is_empty() {
                true => path_abempty(&mut cursor).unwrap(),
                false => path_rootless(&mut cursor).unwrap(),
            };

            assert_eq!(parsed.segments, count_segments(path), "path {:?}", path);
        }
    }

    #[test]
    fn absolute_rejects_double_slash() {
        let mut cursor = Cursor::new("//a");
        assert_eq!(
            path_absolute(&mut cursor).unwrap_err().kind(),
            ErrorKind::Invalid,
        );

        let mut cursor = Cursor::new("/a//b");
        let path = path_absolute(&mut cursor).unwrap();
        assert_eq!((path.text, path.segments), ("/a//b", 3));

        let mut cursor = Cursor::new("/");
        let path = path_absolute(&mut cursor).unwrap();
        assert_eq!((path.text, path.segments), ("/", 0));
    }

    #[test]
    fn rootless_and_noscheme() {
        let mut cursor = Cursor::new("a:b/c?q");
        let path = path_rootless(&mut cursor).unwrap();
        assert_eq!((path.text, path.segments), ("a:b/c", 2));

        // The first `path-noscheme` segment may not contain a colon.
        let mut cursor = Cursor::new("a:b/c");
        let path = path_noscheme(&mut cursor).unwrap();
        assert_eq!(path.text, "a");

        let mut cursor = Cursor::new(":b");
        assert!(path_noscheme(&mut cursor).is_err());

        let mut cursor = Cursor::new("x/a:b");
        let path = path_noscheme(&mut cursor).unwrap();
        assert_eq!((path.text, path.segments), ("x/a:b", 2));
    }
}
