//! A path-template router.
//!
//! Templates are paths whose segments are literals or replacement fields:
//! `{name}` captures one segment, `{name?}` zero or one, `{name+}` one or
//! more, and `{name*}` zero or more. Matching is percent-insensitive and
//! applies dot-segment semantics to both templates and requests.

mod template;

use std::fmt;
use std::ops::Deref;

use log::{trace, warn};
use smallvec::SmallVec;

use crate::pct;
use crate::url::segments::validate_path;
use crate::{Error, ErrorKind, Result};

use template::{Modifier, TemplateSegment};

struct Node<T> {
    parent: usize,
    children: Vec<usize>,
    seg: TemplateSegment,
    template: Option<String>,
    resource: Option<T>,
}

/// A router matching request paths against parameterized route templates.
///
/// Routes form a trie over template segments; matching walks it with
/// backtracking where templates branch or use modifiers. For a given set
/// of routes, matching is deterministic, and inserting a template twice
/// replaces the first resource.
///
/// # Example
///
/// ```rust
/// use urlkit::Router;
///
/// let mut router = Router::new();
/// router.route("user/{name}", 1).unwrap();
/// router.route("user/{name}/posts/{id?}", 2).unwrap();
///
/// let m = router.find("user/jo/posts").unwrap();
/// assert_eq!(*m.resource(), 2);
/// assert_eq!(m.get("name"), Some("jo"));
/// assert_eq!(m.get("id"), Some(""));
/// ```
pub struct Router<T> {
    nodes: Vec<Node<T>>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Router::new()
    }
}

impl<T> Router<T> {
    /// Creates a router with no routes.
    pub fn new() -> Router<T> {
        Router {
            nodes: vec![Node {
                parent: 0,
                children: Vec::new(),
                seg: TemplateSegment::Literal(String::new()),
                template: None,
                resource: None,
            }],
        }
    }

    /// Registers `resource` under the path template `template`.
    ///
    /// Dot segments in the template are applied during insertion, so
    /// `a/b/../c` and `a/c` name the same route. If the terminal node
    /// already holds a resource, it is replaced and the previous value
    /// dropped.
    pub fn route(&mut self, template: &str, resource: T) -> Result<()> {
        let segments = split(template, true)?;
        let mut cur = 0;
        let mut level = 0i32;

        for raw in segments {
            if pct::key_equal(raw, ".") {
                continue;
            }

            if pct::key_equal(raw, "..") {
                if level == 0 && cur != 0 {
                    cur = self.nodes[cur].parent;
                } else {
                    level -= 1;
                }

                continue;
            }

            if level < 0 {
                // A segment under the virtual tree above the root.
                level += 1;
                continue;
            }

            let seg = TemplateSegment::parse(raw)?;
            cur = match self.child_with_segment(cur, &seg) {
                Some(child) => child,
                None => {
                    let index = self.nodes.len();
                    self.nodes.push(Node {
                        parent: cur,
                        children: Vec::new(),
                        seg,
                        template: None,
                        resource: None,
                    });

                    self.nodes[cur].children.push(index);
                    index
                }
            };
        }

        let node = &mut self.nodes[cur];
        if node.resource.is_some() {
            warn!("route {:?} replaces an existing resource", template);
        }

        node.template = Some(template.to_string());
        node.resource = Some(resource);
        Ok(())
    }

    fn child_with_segment(&self, parent: usize, seg: &TemplateSegment) -> Option<usize> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].seg == *seg)
    }

    /// Matches `path` against the registered routes.
    ///
    /// Returns [`ErrorKind::NotFound`] when no route matches; an invalid
    /// path reports its parse error.
    pub fn find<'r, 's>(&'r self, path: &'s str) -> Result<MatchResult<'r, 's, T>> {
        trace!("matching path {:?}", path);
        let segments: Vec<&'s str> = split(path, false)?.collect();

        let mut captures = Vec::new();
        let node = self
            .try_match(path, &segments, 0, 0, 0, &mut captures)
            .ok_or(Error::new(ErrorKind::NotFound))?;

        let node = &self.nodes[node];
        Ok(MatchResult {
            resource: node.resource.as_ref().ok_or(Error::new(ErrorKind::NotFound))?,
            template: node.template.as_deref().unwrap_or(""),
            names: captures.iter().map(|&(n, _)| self.nodes[n].seg.name()).collect(),
            values: captures.into_iter().map(|(_, v)| v).collect(),
        })
    }

    // The heart of matching. `level` tracks excursions outside the real
    // tree: negative above the root, positive below a leaf, with matching
    // suspended until it returns to zero. Returns the terminal node.
    fn try_match<'s>(
        &self,
        path: &'s str,
        segments: &[&'s str],
        mut i: usize,
        mut cur: usize,
        mut level: i32,
        captures: &mut Vec<(usize, &'s str)>,
    ) -> Option<usize> {
        while i < segments.len() {
            let s = segments[i];
            if pct::key_equal(s, ".") {
                i += 1;
                continue;
            }

            if pct::key_equal(s, "..") {
                if level == 0 && cur != 0 {
                    if !self.nodes[cur].seg.is_literal() {
                        captures.pop();
                    }

                    cur = self.nodes[cur].parent;
                } else {
                    level -= 1;
                }

                i += 1;
                continue;
            }

            if level != 0 {
                level += 1;
                i += 1;
                continue;
            }

            // A lower bound on how many children could match: if more
            // than one might, matching must branch and recurse; otherwise
            // it can stay iterative.
            let children = &self.nodes[cur].children;
            let mut branch = false;
            if children.len() > 1 {
                let mut bound = 0;
                for &c in children {
                    let seg = &self.nodes[c].seg;
                    bound += match seg.modifier() {
                        Modifier::None if seg.is_literal() => seg.matches(s) as u32,
                        Modifier::None => 1,
                        _ => 2,
                    };

                    if bound > 1 {
                        branch = true;
                        break;
                    }
                }
            }

            let mut matched_iteratively = false;
            for &c in children {
                let seg = &self.nodes[c].seg;
                if !seg.matches(s) {
                    continue;
                }

                match seg.modifier() {
                    Modifier::None if seg.is_literal() => {
                        if branch {
                            let saved = captures.clone();
                            let r = self.try_match(path, segments, i + 1, c, level, captures);
                            if r.is_some() {
                                return r;
                            }

                            *captures = saved;
                        } else {
                            cur = c;
                            matched_iteratively = true;
                            break;
                        }
                    }
                    Modifier::None => {
                        if branch {
                            let saved = captures.clone();
                            captures.push((c, s));
                            let r = self.try_match(path, segments, i + 1, c, level, captures);
                            if r.is_some() {
                                return r;
                            }

                            *captures = saved;
                        } else {
                            captures.push((c, s));
                            cur = c;
                            matched_iteratively = true;
                            break;
                        }
                    }
                    Modifier::Optional => {
                        // Longest first: with the segment, then without.
                        let saved = captures.clone();
                        captures.push((c, s));
                        let r = self.try_match(path, segments, i + 1, c, level, captures);
                        if r.is_some() {
                            return r;
                        }

                        *captures = saved.clone();
                        captures.push((c, ""));
                        let r = self.try_match(path, segments, i, c, level, captures);
                        if r.is_some() {
                            return r;
                        }

                        *captures = saved;
                    }
                    Modifier::Star | Modifier::Plus => {
                        let r = self.match_range(path, segments, i, cur, c, level, captures);
                        if r.is_some() {
                            return r;
                        }
                    }
                }
            }

            if matched_iteratively {
                i += 1;
                continue;
            }

            if branch {
                return None;
            }

            // Nothing in the tree matches: descend into the virtual tree
            // below it, where only a `..` can bring the path back.
            level = 1;
            i += 1;
        }

        if level != 0 {
            return None;
        }

        if self.nodes[cur].resource.is_some() {
            return Some(cur);
        }

        self.find_optional_resource(cur, captures)
    }

    // Matches a `+` or `*` field rooted at `parent` against segments
    // starting at `i`. The range swallows segments raw, dot segments
    // included, tracking its internal depth; a `..` that would climb out
    // of the range voids the whole engagement and hands its position back
    // to `parent`.
    #[allow(clippy::too_many_arguments)]
    fn match_range<'s>(
        &self,
        path: &'s str,
        segments: &[&'s str],
        i: usize,
        parent: usize,
        c: usize,
        level: i32,
        captures: &mut Vec<(usize, &'s str)>,
    ) -> Option<usize> {
        let node = &self.nodes[c];
        let plus = node.seg.modifier() == Modifier::Plus;

        // Scan the maximal raw range, stopping where a `..` would escape.
        let mut depth = 0i32;
        let mut escape = None;
        let mut end = i;
        while end < segments.len() {
            let s = segments[end];
            if pct::key_equal(s, "..") {
                if depth == 0 {
                    escape = Some(end);
                    break;
                }

                depth -= 1;
            } else if !pct::key_equal(s, ".") {
                depth += 1;
            }

            end += 1;
        }

        if let Some(at) = escape {
            // The swallowed prefix cancels itself out; the range never
            // engages, and the escaping `..` applies at the parent.
            let saved = captures.clone();
            let r = self.try_match(path, segments, at, parent, level, captures);
            if r.is_some() {
                return r;
            }

            *captures = saved;
            return None;
        }

        // Try cuts longest first. A cut may sit at the end of input, at
        // any later segment a child could match, or before the range for
        // the zero-segment case of `*`.
        let mut j = end;
        loop {
            let valid_cut = j == end || j == i || !is_dot(segments[j]);
            if valid_cut {
                if let Some(capture) = self.range_capture(path, segments, i, j, plus) {
                    let saved = captures.clone();
                    captures.push((c, capture));
                    let r = self.try_match(path, segments, j, c, level, captures);
                    if r.is_some() {
                        return r;
                    }

                    *captures = saved;
                }
            }

            if j == i {
                return None;
            }

            j -= 1;
        }
    }

    // The capture text for a range over `segments[i..j]`: `*` captures
    // the raw span; `+` applies interior dot segments, requiring at least
    // one surviving segment, and captures the span they cover.
    fn range_capture<'s>(
        &self,
        path: &'s str,
        segments: &[&'s str],
        i: usize,
        j: usize,
        plus: bool,
    ) -> Option<&'s str> {
        if i == j {
            // Only a star may match nothing.
            return (!plus).then(|| "");
        }

        if !plus {
            return Some(span(path, segments, i, j));
        }

        let mut stack: SmallVec<[usize; 8]> = SmallVec::new();
        for (k, s) in segments.iter().enumerate().take(j).skip(i) {
            if pct::key_equal(s, "..") {
                // An underflow here cannot happen: the scan in
                // `match_range` bounded the range by its escape point.
                stack.pop()?;
            } else if !pct::key_equal(s, ".") {
                stack.push(k);
            }
        }

        let first = *stack.first()?;
        let last = *stack.last()?;
        Some(span(path, segments, first, last + 1))
    }

    // A resource reachable from `node` through zero-matchable fields
    // alone, depth first, recording an empty capture for each.
    fn find_optional_resource<'s>(
        &self,
        node: usize,
        captures: &mut Vec<(usize, &'s str)>,
    ) -> Option<usize> {
        for &c in &self.nodes[node].children {
            if !self.nodes[c].seg.zero_matchable() {
                continue;
            }

            captures.push((c, ""));
            if self.nodes[c].resource.is_some() {
                return Some(c);
            }

            if let Some(found) = self.find_optional_resource(c, captures) {
                return Some(found);
            }

            captures.pop();
        }

        None
    }
}

impl<T> fmt::Debug for Router<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let templates: Vec<&str> = self
            .nodes
            .iter()
            .filter_map(|n| n.template.as_deref())
            .collect();

        f.debug_struct("Router").field("templates", &templates).finish()
    }
}

fn is_dot(segment: &str) -> bool {
    pct::key_equal(segment, ".") || pct::key_equal(segment, "..")
}

// Splits a path into segments, allowing one leading slash. Replacement
// fields make braces legal in templates only; field syntax itself is
// checked segment by segment.
fn split(path: &str, template: bool) -> Result<std::str::Split<'_, char>> {
    match template {
        true => validate_template_path(path)?,
        false => validate_path(path)?,
    }

    let content = path.strip_prefix('/').unwrap_or(path);
    let mut parts = content.split('/');
    if content.is_empty() {
        // Consume the single empty piece an empty string splits into.
        parts.next();
    }

    Ok(parts)
}

fn validate_template_path(path: &str) -> Result<()> {
    let mut cleaned = String::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        match rest[open..].find('}') {
            Some(close) => {
                cleaned.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }

    cleaned.push_str(rest);
    validate_path(&cleaned)
}

// The byte span of `segments[i..j]` within `path`.
fn span<'s>(path: &'s str, segments: &[&'s str], i: usize, j: usize) -> &'s str {
    debug_assert!(i < j && j <= segments.len());
    let base = path.as_ptr() as usize;
    let start = segments[i].as_ptr() as usize - base;
    let end = segments[j - 1].as_ptr() as usize - base + segments[j - 1].len();
    &path[start..end]
}

/// A successful route match: the resource plus the captured values.
///
/// Dereferences to the resource. Captured values are slices of the
/// request path, in template order; fields that matched nothing capture
/// the empty string.
pub struct MatchResult<'r, 's, T> {
    resource: &'r T,
    template: &'r str,
    names: Vec<&'r str>,
    values: Vec<&'s str>,
}

impl<'r, 's, T> MatchResult<'r, 's, T> {
    /// The resource registered for the matched route.
    #[inline(always)]
    pub fn resource(&self) -> &'r T {
        self.resource
    }

    /// The template the route was registered with.
    #[inline(always)]
    pub fn template(&self) -> &'r str {
        self.template
    }

    /// The number of captured fields.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the route captured nothing.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value captured by the field named `name`, if any.
    pub fn get(&self, name: &str) -> Option<&'s str> {
        self.names
            .iter()
            .position(|&n| n == name)
            .map(|i| self.values[i])
    }

    /// The value of the `index`th capture, in template order.
    #[inline]
    pub fn get_index(&self, index: usize) -> Option<&'s str> {
        self.values.get(index).copied()
    }

    /// Like [`get()`](Self::get), but panics when no field is named
    /// `name`.
    pub fn at(&self, name: &str) -> &'s str {
        match self.get(name) {
            Some(value) => value,
            None => panic!("no capture named {:?}", name),
        }
    }

    /// Iterates over `(name, value)` capture pairs in template order.
    pub fn captures(&self) -> Captures<'_, 'r, 's> {
        Captures { names: self.names.iter(), values: self.values.iter() }
    }
}

impl<T> Deref for MatchResult<'_, '_, T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        self.resource
    }
}

impl<T: fmt::Debug> fmt::Debug for MatchResult<'_, '_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchResult")
            .field("resource", self.resource)
            .field("template", &self.template)
            .field("captures", &self.captures().collect::<Vec<_>>())
            .finish()
    }
}

/// An iterator over a match's `(name, value)` capture pairs.
pub struct Captures<'m, 'r, 's> {
    names: std::slice::Iter<'m, &'r str>,
    values: std::slice::Iter<'m, &'s str>,
}

impl<'r, 's> Iterator for Captures<'_, 'r, 's> {
    type Item = (&'r str, &'s str);

    fn next(&mut self) -> Option<Self::Item> {
        Some((self.names.next()?, self.values.next()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_shares_prefixes() {
        let mut router = Router::new();
        router.route("a/b/c", 1).unwrap();
        router.route("a/b/d", 2).unwrap();
        router.route("a/{x}", 3).unwrap();

        // root, a, b, c, d, {x}
        assert_eq!(router.nodes.len(), 6);
        assert_eq!(*router.find("a/b/c").unwrap().resource(), 1);
        assert_eq!(*router.find("a/b/d").unwrap().resource(), 2);
        assert_eq!(*router.find("a/z").unwrap().resource(), 3);
    }

    #[test]
    fn duplicate_template_replaces() {
        let mut router = Router::new();
        router.route("a/{x}", 1).unwrap();
        router.route("a/{x}", 2).unwrap();
        assert_eq!(*router.find("a/z").unwrap().resource(), 2);

        // Same shape, different name: a distinct sibling route.
        router.route("a/{y}", 3).unwrap();
        assert_eq!(*router.find("a/z").unwrap().resource(), 2);
    }

    #[test]
    fn template_dot_segments() {
        let mut router = Router::new();
        router.route("user/c/../b", 1).unwrap();
        assert_eq!(*router.find("user/b").unwrap().resource(), 1);

        let mut router = Router::new();
        router.route("../a/user/c/../b", 1).unwrap();
        assert_eq!(*router.find("user/b").unwrap().resource(), 1);
    }

    #[test]
    fn invalid_inputs() {
        let mut router = Router::new();
        assert!(router.route("a/{b c}", 1).is_err());
        assert!(router.route("sp ace", 1).is_err());

        router.route("a", 1).unwrap();
        assert!(router.find("bad path").is_err());
        assert_eq!(
            router.find("nope").unwrap_err().kind(),
            ErrorKind::NotFound,
        );
    }

    #[test]
    fn branching_backtracks() {
        let mut router = Router::new();
        router.route("a/{x}/end", 1).unwrap();
        router.route("a/b/{y}", 2).unwrap();

        // `a/b/end` matches both; the earlier-inserted route wins by
        // insertion order of the children.
        let m = router.find("a/b/end").unwrap();
        assert_eq!(*m.resource(), 1);
        assert_eq!(m.get("x"), Some("b"));

        let m = router.find("a/b/zzz").unwrap();
        assert_eq!(*m.resource(), 2);
        assert_eq!(m.get("y"), Some("zzz"));
    }

    #[test]
    fn capture_metadata() {
        let mut router = Router::new();
        router.route("user/{name}/{op*}", "r").unwrap();

        let m = router.find("user/jo/a/b").unwrap();
        assert_eq!(m.template(), "user/{name}/{op*}");
        assert_eq!(m.len(), 2);
        assert_eq!(m.get_index(0), Some("jo"));
        assert_eq!(m.get_index(1), Some("a/b"));
        assert_eq!(m.at("op"), "a/b");
        assert_eq!(*m, "r");

        let pairs: Vec<_> = m.captures().collect();
        assert_eq!(pairs, [("name", "jo"), ("op", "a/b")]);
    }

    #[test]
    #[should_panic]
    fn at_panics_on_unknown() {
        let mut router = Router::new();
        router.route("{a}", 0).unwrap();
        let m = router.find("x").unwrap();
        m.at("missing");
    }
}
