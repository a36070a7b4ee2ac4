use std::borrow::Cow;
use std::fmt;
use std::str::Split;

use crate::grammar::Rule;
use crate::pct::{self, EncodeOpts};
use crate::rfc::{enc_token, PCHARS};
use crate::url::Url;
use crate::{EncodedStr, Error, ErrorKind, Result};

fn content(path: &str) -> Option<&str> {
    match path {
        "" | "/" => None,
        _ => Some(path.strip_prefix('/').unwrap_or(path)),
    }
}

/// An iterator over a path's raw, encoded segments.
///
/// Views never own storage; this iterates slices of the path it was made
/// from. Mutating a [`Url`] invalidates any outstanding view by borrow.
#[derive(Clone)]
pub struct EncodedSegments<'a> {
    split: Option<Split<'a, char>>,
    remaining: usize,
}

impl<'a> EncodedSegments<'a> {
    pub(crate) fn new(path: &'a str, count: usize) -> EncodedSegments<'a> {
        EncodedSegments {
            split: content(path).map(|c| c.split('/')),
            remaining: count,
        }
    }

    /// Parses and validates `path`, returning a view over its segments.
    ///
    /// Accepts any RFC path form: absolute, rootless, or empty.
    pub fn parse(path: &'a str) -> Result<EncodedSegments<'a>> {
        validate_path(path)?;
        Ok(EncodedSegments::new(path, crate::rfc::count_segments(path)))
    }

    /// The number of segments remaining.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.remaining
    }

    /// Whether no segments remain.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }
}

impl<'a> Iterator for EncodedSegments<'a> {
    type Item = &'a EncodedStr;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        self.remaining -= 1;
        self.split.as_mut()?.next().map(EncodedStr::assume)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for EncodedSegments<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        self.remaining -= 1;
        self.split.as_mut()?.next_back().map(EncodedStr::assume)
    }
}

impl ExactSizeIterator for EncodedSegments<'_> {}

impl fmt::Debug for EncodedSegments<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

/// An iterator over a path's decoded segments.
///
/// # Example
///
/// ```rust
/// use urlkit::Url;
///
/// let url = Url::parse("/a%20b/c/d%2Fe").unwrap();
/// let segments: Vec<_> = url.segments().collect();
/// assert_eq!(segments, ["a b", "c", "d/e"]);
/// ```
#[derive(Clone)]
pub struct Segments<'a> {
    inner: EncodedSegments<'a>,
}

impl<'a> Segments<'a> {
    pub(crate) fn new(path: &'a str, count: usize) -> Segments<'a> {
        Segments { inner: EncodedSegments::new(path, count) }
    }

    /// Parses and validates `path`, returning a view over its decoded
    /// segments.
    pub fn parse(path: &'a str) -> Result<Segments<'a>> {
        Ok(Segments { inner: EncodedSegments::parse(path)? })
    }

    /// The number of segments remaining.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no segments remain.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Cow<'a, str>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(EncodedStr::decode_lossy)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for Segments<'_> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(EncodedStr::decode_lossy)
    }
}

impl ExactSizeIterator for Segments<'_> {}

pub(crate) fn validate_path(path: &str) -> Result<()> {
    enc_token(PCHARS.add(b'/'), 0).parse_complete(path).map(|_| ())
}

pub(crate) fn validate_segment(segment: &str) -> Result<()> {
    enc_token(PCHARS, 0).parse_complete(segment).map(|_| ())
}

pub(crate) fn encode_segment(segment: &str) -> String {
    pct::encode(segment, &PCHARS, EncodeOpts::default())
}

/// A mutable reference to a URL's path segments.
///
/// Every operation rewrites the path part of the underlying [`Url`] in
/// place, keeping delimiters and counts consistent.
///
/// # Example
///
/// ```rust
/// use urlkit::Url;
///
/// let mut url = Url::parse("http://h/a/b?q").unwrap();
/// let mut segments = url.segments_mut();
/// segments.push("c d").unwrap();
/// segments.remove(0).unwrap();
/// assert_eq!(url.as_str(), "http://h/b/c%20d?q");
/// ```
pub struct SegmentsMut<'u> {
    url: &'u mut Url,
}

impl<'u> SegmentsMut<'u> {
    #[inline(always)]
    pub(crate) fn new(url: &'u mut Url) -> SegmentsMut<'u> {
        SegmentsMut { url }
    }

    /// The number of segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.url.segment_count()
    }

    /// Whether the path has no segments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every segment. An absolute path becomes `/`; a rootless
    /// one becomes empty.
    pub fn clear(&mut self) -> Result<()> {
        self.rewrite(|segments| {
            segments.clear();
            Ok(())
        })
    }

    /// Appends a segment, encoding it as needed.
    pub fn push(&mut self, segment: &str) -> Result<()> {
        self.push_encoded(&encode_segment(segment))
    }

    /// Appends an already-encoded segment, validating it.
    pub fn push_encoded(&mut self, segment: &str) -> Result<()> {
        validate_segment(segment)?;
        self.rewrite(|segments| {
            segments.push(segment.to_string());
            Ok(())
        })
    }

    /// Removes the last segment, returning `false` if there was none.
    pub fn pop(&mut self) -> bool {
        self.rewrite(|segments| match segments.pop() {
            Some(_) => Ok(()),
            None => Err(Error::new(ErrorKind::OutOfRange)),
        })
        .is_ok()
    }

    /// Inserts a segment at `index`, encoding it as needed.
    pub fn insert(&mut self, index: usize, segment: &str) -> Result<()> {
        self.insert_encoded(index, &encode_segment(segment))
    }

    /// Inserts an already-encoded segment at `index`.
    ///
    /// `index` may equal [`len()`](Self::len), in which case this is a
    /// push; anything larger fails with [`ErrorKind::OutOfRange`].
    pub fn insert_encoded(&mut self, index: usize, segment: &str) -> Result<()> {
        validate_segment(segment)?;
        self.rewrite(|segments| {
            if index > segments.len() {
                return Err(Error::new(ErrorKind::OutOfRange));
            }

            segments.insert(index, segment.to_string());
            Ok(())
        })
    }

    /// Removes the segment at `index`.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        self.rewrite(|segments| {
            if index >= segments.len() {
                return Err(Error::new(ErrorKind::OutOfRange));
            }

            segments.remove(index);
            Ok(())
        })
    }

    /// Replaces the segment at `index`, encoding the new value as needed.
    pub fn replace(&mut self, index: usize, segment: &str) -> Result<()> {
        self.replace_encoded(index, &encode_segment(segment))
    }

    /// Replaces the segment at `index` with an already-encoded value.
    pub fn replace_encoded(&mut self, index: usize, segment: &str) -> Result<()> {
        validate_segment(segment)?;
        self.rewrite(|segments| {
            match segments.get_mut(index) {
                Some(slot) => {
                    *slot = segment.to_string();
                    Ok(())
                }
                None => Err(Error::new(ErrorKind::OutOfRange)),
            }
        })
    }

    fn rewrite<F>(&mut self, op: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<String>) -> Result<()>,
    {
        let path = self.url.view().encoded_path().as_str();
        let absolute = self.url.has_authority() || path.starts_with('/');
        let mut segments: Vec<String> = self
            .url
            .view()
            .encoded_segments()
            .map(|s| s.as_str().to_string())
            .collect();

        op(&mut segments)?;

        let new_path = assemble(absolute, &segments);
        self.url.apply_encoded_path(&new_path)
    }
}

fn assemble(absolute: bool, segments: &[String]) -> String {
    if segments.is_empty() {
        return match absolute {
            true => "/".to_string(),
            false => String::new(),
        };
    }

    let mut path = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if absolute || i > 0 {
            path.push('/');
        }

        path.push_str(segment);
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Url;

    #[test]
    fn view_iteration() {
        let url = Url::parse("http://h/path/to/file.txt").unwrap();
        let segments: Vec<_> = url.encoded_segments().map(|s| s.as_str()).collect();
        assert_eq!(segments, ["path", "to", "file.txt"]);

        let url = Url::parse("http://h/").unwrap();
        assert_eq!(url.encoded_segments().count(), 0);

        let url = Url::parse("http://h/a//b/").unwrap();
        let segments: Vec<_> = url.encoded_segments().map(|s| s.as_str()).collect();
        assert_eq!(segments, ["a", "", "b", ""]);

        let url = Url::parse("x:a/b").unwrap();
        let segments: Vec<_> = url.encoded_segments().map(|s| s.as_str()).collect();
        assert_eq!(segments, ["a", "b"]);
    }

    #[test]
    fn standalone_parse() {
        let segments: Vec<_> = Segments::parse("/a%20b/c").unwrap().collect();
        assert_eq!(segments, ["a b", "c"]);

        assert!(Segments::parse("/a b").is_err());
        assert!(Segments::parse("/a%2").is_err());
    }

    #[test]
    fn push_and_pop() {
        let mut url = Url::parse("http://h").unwrap();
        url.segments_mut().push("a").unwrap();
        assert_eq!(url.as_str(), "http://h/a");
        url.segments_mut().push("b c").unwrap();
        assert_eq!(url.as_str(), "http://h/a/b%20c");
        assert_eq!(url.segment_count(), 2);

        assert!(url.segments_mut().pop());
        assert_eq!(url.as_str(), "http://h/a");
        assert!(url.segments_mut().pop());
        assert_eq!(url.as_str(), "http://h/");
        assert!(!url.segments_mut().pop());
    }

    #[test]
    fn insert_erase_replace() {
        let mut url = Url::parse("x://y/path/file.txt?q#f").unwrap();
        url.segments_mut().insert_encoded(1, "to").unwrap();
        assert_eq!(url.as_str(), "x://y/path/to/file.txt?q#f");

        url.segments_mut().insert_encoded(3, "").unwrap();
        assert_eq!(url.as_str(), "x://y/path/to/file.txt/?q#f");

        url.segments_mut().insert_encoded(0, "etc").unwrap();
        assert_eq!(url.as_str(), "x://y/etc/path/to/file.txt/?q#f");

        url.segments_mut().replace_encoded(1, "base").unwrap();
        assert_eq!(url.as_str(), "x://y/etc/base/to/file.txt/?q#f");

        url.segments_mut().remove(2).unwrap();
        assert_eq!(url.as_str(), "x://y/etc/base/file.txt/?q#f");

        let e = url.segments_mut().remove(10).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn rootless_mutation() {
        let mut url = Url::parse("x:path/file.txt?q").unwrap();
        url.segments_mut().insert_encoded(1, "to").unwrap();
        assert_eq!(url.as_str(), "x:path/to/file.txt?q");

        url.segments_mut().clear().unwrap();
        assert_eq!(url.as_str(), "x:?q");
    }

    #[test]
    fn clear_with_authority() {
        let mut url = Url::parse("x://y/path/to/file.txt").unwrap();
        url.segments_mut().clear().unwrap();
        assert_eq!(url.as_str(), "x://y/");
        assert_eq!(url.segment_count(), 0);
    }

    #[test]
    fn validation_failures() {
        let mut url = Url::parse("http://h/a").unwrap();
        assert!(url.segments_mut().push_encoded("a/b").is_err());
        assert!(url.segments_mut().push_encoded("a b").is_err());
        assert!(url.segments_mut().push_encoded("%zz").is_err());
        assert_eq!(url.as_str(), "http://h/a");
    }
}
