use std::cmp::Ordering;
use std::hash::Hasher;

use smallvec::SmallVec;

use crate::grammar::hexdig_value;
use crate::pct;
use crate::rfc::UNRESERVED;
use crate::url::parts::Part;
use crate::url::{Url, UrlRef};
use crate::{EncodedStr, Result};

/// The bytes of `s` in canonical encoded form: escapes of unreserved
/// characters come out decoded, every other escape keeps its `%` with
/// upper-cased hex digits. With `lowercase`, ASCII letters fold, as host
/// comparison requires.
#[derive(Clone)]
struct CanonicalBytes<'a> {
    bytes: &'a [u8],
    pos: usize,
    queued: [u8; 2],
    queued_len: u8,
    lowercase: bool,
}

fn canonical_bytes(s: &str, lowercase: bool) -> CanonicalBytes<'_> {
    CanonicalBytes { bytes: s.as_bytes(), pos: 0, queued: [0; 2], queued_len: 0, lowercase }
}

impl Iterator for CanonicalBytes<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.queued_len > 0 {
            self.queued_len -= 1;
            return Some(self.queued[(1 - self.queued_len) as usize]);
        }

        let b = *self.bytes.get(self.pos)?;
        if b == b'%' {
            // Escapes are well-formed by `EncodedStr` invariant.
            let (hi, lo) = (self.bytes[self.pos + 1], self.bytes[self.pos + 2]);
            self.pos += 3;

            let decoded = ((hexdig_value(hi) as u8) << 4) | hexdig_value(lo) as u8;
            if UNRESERVED.contains(decoded) {
                return Some(match self.lowercase {
                    true => decoded.to_ascii_lowercase(),
                    false => decoded,
                });
            }

            self.queued = [hi.to_ascii_uppercase(), lo.to_ascii_uppercase()];
            self.queued_len = 2;
            return Some(b'%');
        }

        self.pos += 1;
        Some(match self.lowercase {
            true => b.to_ascii_lowercase(),
            false => b,
        })
    }
}

/// A path reduced to its semantic pieces: unmatched leading `..`s, the
/// surviving segments, and whether the normalized text ends in `/`.
///
/// Segments that decode to `.` or `..` are treated as dot-segments, per
/// the decode-before-normalize order of RFC 3986 §6.2.2.
struct NormalPath<'a> {
    absolute: bool,
    dotdots: usize,
    segs: SmallVec<[&'a str; 16]>,
    trailing: bool,
}

fn analyze(path: &str, remove_unmatched: bool) -> NormalPath<'_> {
    let absolute = path.starts_with('/');
    let mut normal = NormalPath {
        absolute,
        dotdots: 0,
        segs: SmallVec::new(),
        trailing: false,
    };

    if path.is_empty() {
        return normal;
    }

    let content = match absolute {
        true => &path[1..],
        false => path,
    };

    for seg in content.split('/') {
        if pct::key_equal(seg, ".") {
            normal.trailing = true;
        } else if pct::key_equal(seg, "..") {
            normal.trailing = true;
            if normal.segs.pop().is_none() && !remove_unmatched {
                normal.dotdots += 1;
            }
        } else {
            normal.segs.push(seg);
            normal.trailing = false;
        }
    }

    normal
}

impl<'a> NormalPath<'a> {
    fn entries(&self) -> usize {
        self.dotdots + self.segs.len()
    }

    // Whether the assembled text already ends with `/`, making an
    // explicit trailing slash redundant.
    fn ends_in_slash(&self) -> bool {
        match self.segs.last() {
            Some(seg) => seg.is_empty(),
            None => self.dotdots == 0 && self.absolute,
        }
    }

    fn emit_trailing(&self) -> bool {
        self.trailing && self.entries() > 0 && !self.ends_in_slash()
    }

    fn materialize(&self) -> String {
        let mut out = String::new();
        if self.absolute {
            out.push('/');
        }

        for i in 0..self.dotdots {
            if i > 0 {
                out.push('/');
            }

            out.push_str("..");
        }

        for (i, seg) in self.segs.iter().enumerate() {
            if i > 0 || self.dotdots > 0 {
                out.push('/');
            }

            out.push_str(seg);
        }

        if self.emit_trailing() {
            out.push('/');
        }

        out
    }

    fn bytes(&self) -> NormalBytes<'_, 'a> {
        NormalBytes {
            path: self,
            root_done: false,
            entry: 0,
            dot_offset: 0,
            seg_bytes: None,
            sep_done: false,
            trailing_done: false,
        }
    }
}

// The canonical bytes of a normalized path, produced without
// materializing it. Iteration order equals the bytes of `materialize()`
// with every segment in canonical encoded form.
struct NormalBytes<'p, 'a> {
    path: &'p NormalPath<'a>,
    root_done: bool,
    entry: usize,
    dot_offset: usize,
    seg_bytes: Option<CanonicalBytes<'a>>,
    sep_done: bool,
    trailing_done: bool,
}

impl Iterator for NormalBytes<'_, '_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if !self.root_done {
            self.root_done = true;
            if self.path.absolute {
                return Some(b'/');
            }
        }

        loop {
            if self.entry == self.path.entries() {
                if self.path.emit_trailing() && !self.trailing_done {
                    self.trailing_done = true;
                    return Some(b'/');
                }

                return None;
            }

            if self.entry > 0 && !self.sep_done {
                self.sep_done = true;
                return Some(b'/');
            }

            if self.entry < self.path.dotdots {
                if self.dot_offset < 2 {
                    self.dot_offset += 1;
                    return Some(b'.');
                }

                self.dot_offset = 0;
                self.entry += 1;
                self.sep_done = false;
                continue;
            }

            let seg = self.path.segs[self.entry - self.path.dotdots];
            let bytes = self
                .seg_bytes
                .get_or_insert_with(|| canonical_bytes(seg, false));

            match bytes.next() {
                Some(b) => return Some(b),
                None => {
                    self.seg_bytes = None;
                    self.entry += 1;
                    self.sep_done = false;
                }
            }
        }
    }
}

/// Applies the RFC 3986 §5.2.4 `remove_dot_segments` algorithm to `path`.
///
/// `remove_unmatched` controls what happens to `..` segments with nothing
/// left to remove: `true` drops them, as resolution does for absolute
/// paths; `false` preserves them, as befits a relative path.
///
/// # Example
///
/// ```rust
/// use urlkit::remove_dot_segments;
///
/// assert_eq!(remove_dot_segments("/a/b/../c/./d", true), "/a/c/d");
/// assert_eq!(remove_dot_segments("../a/../b", false), "../b");
/// assert_eq!(remove_dot_segments("../a/../b", true), "b");
/// ```
pub fn remove_dot_segments(path: &str, remove_unmatched: bool) -> String {
    analyze(path, remove_unmatched).materialize()
}

/// Compares two paths as if both had been normalized, without
/// materializing either.
///
/// Comparison is over canonical encoded bytes: `%61` equals `a` because
/// `a` is unreserved, while `%2F` stays an escape and so differs from
/// `/`. The `relative` flags name paths whose unmatched `..`s must be
/// preserved.
pub fn normalized_path_cmp(a: &str, b: &str, a_relative: bool, b_relative: bool) -> Ordering {
    let a = analyze(a, !a_relative);
    let b = analyze(b, !b_relative);
    a.bytes().cmp(b.bytes())
}

/// Feeds the canonical bytes of `path`'s normalized form to `state`, so
/// equal-under-[`normalized_path_cmp`] paths hash identically.
pub fn normalized_path_hash<H: Hasher>(path: &str, relative: bool, state: &mut H) {
    let normal = analyze(path, !relative);
    let mut n = 0usize;
    for b in normal.bytes() {
        state.write_u8(b);
        n += 1;
    }

    state.write_usize(n);
}

fn path_is_relative(url: &UrlRef<'_>) -> bool {
    !url.has_authority() && !url.encoded_path().as_str().starts_with('/')
}

fn cmp_canonical(
    a: Option<&EncodedStr>,
    b: Option<&EncodedStr>,
    lowercase: bool,
) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => canonical_bytes(a.as_str(), lowercase)
            .cmp(canonical_bytes(b.as_str(), lowercase)),
    }
}

fn cmp_scheme(a: &UrlRef<'_>, b: &UrlRef<'_>) -> Ordering {
    match (a.scheme(), b.scheme()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let a = a.bytes().map(|b| b.to_ascii_lowercase());
            let b = b.bytes().map(|b| b.to_ascii_lowercase());
            a.cmp(b)
        }
    }
}

impl<'a> UrlRef<'a> {
    /// Compares two URLs as if both had been normalized, without
    /// modifying or copying either.
    ///
    /// The comparison proceeds part by part: case-insensitive scheme,
    /// percent-insensitive user and password, case- and percent-
    /// insensitive host, lexical port, normalized path, then percent-
    /// insensitive query and fragment. The first difference decides.
    ///
    /// `PartialEq`, `Ord`, and `Hash` for [`UrlRef`] and [`Url`] are all
    /// defined in terms of this comparison.
    ///
    /// # Example
    ///
    /// ```rust
    /// use urlkit::UrlRef;
    ///
    /// let a = UrlRef::parse("HTTP://EXAMPLE.com/a/../b/%7Ex").unwrap();
    /// let b = UrlRef::parse("http://example.com/b/~x").unwrap();
    /// assert_eq!(a, b);
    /// ```
    pub fn normalized_cmp(&self, other: &UrlRef<'_>) -> Ordering {
        cmp_scheme(self, other)
            .then_with(|| cmp_canonical(self.encoded_user(), other.encoded_user(), false))
            .then_with(|| {
                cmp_canonical(self.encoded_password(), other.encoded_password(), false)
            })
            .then_with(|| cmp_canonical(self.encoded_host(), other.encoded_host(), true))
            .then_with(|| self.port().cmp(&other.port()))
            .then_with(|| {
                normalized_path_cmp(
                    self.encoded_path().as_str(),
                    other.encoded_path().as_str(),
                    path_is_relative(self),
                    path_is_relative(other),
                )
            })
            .then_with(|| cmp_canonical(self.encoded_query(), other.encoded_query(), false))
            .then_with(|| {
                cmp_canonical(self.encoded_fragment(), other.encoded_fragment(), false)
            })
    }
}

pub(crate) fn hash_url<H: Hasher>(url: &UrlRef<'_>, state: &mut H) {
    fn mark<H: Hasher>(state: &mut H, present: bool) {
        state.write_u8(present as u8);
    }

    match url.scheme() {
        Some(scheme) => {
            mark(state, true);
            for b in scheme.bytes() {
                state.write_u8(b.to_ascii_lowercase());
            }
        }
        None => mark(state, false),
    }

    for part in [url.encoded_user(), url.encoded_password()] {
        match part {
            Some(part) => {
                mark(state, true);
                for b in canonical_bytes(part.as_str(), false) {
                    state.write_u8(b);
                }
            }
            None => mark(state, false),
        }
    }

    match url.encoded_host() {
        Some(host) => {
            mark(state, true);
            for b in canonical_bytes(host.as_str(), true) {
                state.write_u8(b);
            }
        }
        None => mark(state, false),
    }

    match url.port() {
        Some(port) => {
            mark(state, true);
            state.write(port.as_bytes());
        }
        None => mark(state, false),
    }

    normalized_path_hash(url.encoded_path().as_str(), path_is_relative(url), state);

    for part in [url.encoded_query(), url.encoded_fragment()] {
        match part {
            Some(part) => {
                mark(state, true);
                for b in canonical_bytes(part.as_str(), false) {
                    state.write_u8(b);
                }
            }
            None => mark(state, false),
        }
    }
}

// Re-encodes `s` canonically: unreserved escapes are decoded, everything
// else keeps its escape with upper-case hex digits.
fn normalize_pct(s: &str, lowercase: bool) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            let hi = hexdig_value(bytes[i + 1]) as u8;
            let lo = hexdig_value(bytes[i + 2]) as u8;
            let decoded = (hi << 4) | lo;
            if UNRESERVED.contains(decoded) {
                let decoded = match lowercase {
                    true => decoded.to_ascii_lowercase(),
                    false => decoded,
                };

                out.push(decoded as char);
            } else {
                out.push('%');
                out.push(bytes[i + 1].to_ascii_uppercase() as char);
                out.push(bytes[i + 2].to_ascii_uppercase() as char);
            }

            i += 3;
        } else {
            let b = match lowercase {
                true => b.to_ascii_lowercase(),
                false => b,
            };

            out.push(b as char);
            i += 1;
        }
    }

    out
}

impl Url {
    /// Normalizes this URL in place, per RFC 3986 §6.2.2: the scheme and
    /// host are lowercased, escapes of unreserved characters are decoded,
    /// remaining escapes get upper-case hex digits, and dot segments are
    /// removed from the path.
    ///
    /// # Example
    ///
    /// ```rust
    /// use urlkit::Url;
    ///
    /// let mut url = Url::parse("HTTP://a/b/c/../g%7E?%7e").unwrap();
    /// url.normalize().unwrap();
    /// assert_eq!(url.as_str(), "http://a/b/g~?~");
    /// ```
    pub fn normalize(&mut self) -> Result<()> {
        if let Some(scheme) = self.scheme() {
            let scheme = scheme.to_ascii_lowercase();
            self.set_scheme(&scheme)?;
        }

        if self.has_userinfo() {
            let user = normalize_pct(self.view().stripped(Part::User), false);
            self.set_encoded_user(&user)?;
        }

        if self.has_password() {
            let password = normalize_pct(self.view().stripped(Part::Password), false);
            self.set_encoded_password(&password)?;
        }

        if self.has_authority() {
            let host = normalize_pct(self.view().stripped(Part::Host), true);
            self.set_encoded_host(&host)?;
        }

        let path = normalize_pct(self.encoded_path().as_str(), false);
        let relative = !self.has_authority() && !path.starts_with('/');
        let path = remove_dot_segments(&path, !relative);
        self.apply_encoded_path(&path)?;

        if let Some(query) = self.encoded_query() {
            let query = normalize_pct(query.as_str(), false);
            self.set_encoded_query(&query)?;
        }

        if let Some(fragment) = self.encoded_fragment() {
            let fragment = normalize_pct(fragment.as_str(), false);
            self.set_encoded_fragment(&fragment)?;
        }

        Ok(())
    }
}
