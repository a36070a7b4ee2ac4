use crate::url::normalize::remove_dot_segments;
use crate::url::{Url, UrlRef};
use crate::{Error, ErrorKind, Result};

// RFC 3986 §5.2.3: merge a relative path with the base's path.
fn merge(base: &UrlRef<'_>, path: &str) -> String {
    let base_path = base.encoded_path().as_str();
    if base.has_authority() && base_path.is_empty() {
        return format!("/{}", path);
    }

    match base_path.rfind('/') {
        Some(last) => format!("{}{}", &base_path[..last + 1], path),
        None => path.to_string(),
    }
}

// Writes a target URL from computed components, inserting the prefixes
// that keep the text parsing back to the same components.
fn assemble(
    scheme: Option<&str>,
    authority: Option<&str>,
    path: &str,
    query: Option<&str>,
    fragment: Option<&str>,
) -> Result<Url> {
    let mut out = String::new();
    if let Some(scheme) = scheme {
        out.push_str(scheme);
        out.push(':');
    }

    match authority {
        Some(authority) => {
            out.push_str("//");
            out.push_str(authority);
        }
        None => {
            // A `//` or `x:`-shaped lead-in inside a path must not be
            // mistaken for an authority or scheme on reparse.
            if path.starts_with("//") {
                out.push_str(match scheme.is_some() {
                    true => "/.",
                    false => "./",
                });
            } else if scheme.is_none() {
                let first = path.split('/').next().unwrap_or("");
                if first.contains(':') {
                    out.push_str("./");
                }
            }
        }
    }

    out.push_str(path);
    if let Some(query) = query {
        out.push('?');
        out.push_str(query);
    }

    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }

    Url::parse_owned(out)
}

/// Resolves `reference` against the absolute `base`, per RFC 3986 §5.3.
///
/// Fails with [`ErrorKind::NotAbsolute`] when `base` has no scheme.
///
/// # Example
///
/// ```rust
/// use urlkit::{resolve, UrlRef};
///
/// let base = UrlRef::parse("http://a/b/c/d;p?q").unwrap();
/// let reference = UrlRef::parse("g#s").unwrap();
/// assert_eq!(resolve(&base, &reference).unwrap().as_str(), "http://a/b/c/g#s");
/// ```
pub fn resolve(base: &UrlRef<'_>, reference: &UrlRef<'_>) -> Result<Url> {
    if !base.has_scheme() {
        return Err(Error::new(ErrorKind::NotAbsolute));
    }

    let r_path = reference.encoded_path().as_str();
    let r_query = reference.encoded_query().map(|q| q.as_str());
    let fragment = reference.encoded_fragment().map(|f| f.as_str());

    if reference.has_scheme() {
        let path = remove_dot_segments(r_path, true);
        return assemble(
            reference.scheme(),
            reference.encoded_authority().map(|a| a.as_str()),
            &path,
            r_query,
            fragment,
        );
    }

    let scheme = base.scheme();
    if reference.has_authority() {
        let path = remove_dot_segments(r_path, true);
        return assemble(
            scheme,
            reference.encoded_authority().map(|a| a.as_str()),
            &path,
            r_query,
            fragment,
        );
    }

    let authority = base.encoded_authority().map(|a| a.as_str());
    if r_path.is_empty() {
        let query = r_query.or_else(|| base.encoded_query().map(|q| q.as_str()));
        return assemble(scheme, authority, base.encoded_path().as_str(), query, fragment);
    }

    let path = match r_path.starts_with('/') {
        true => remove_dot_segments(r_path, true),
        false => remove_dot_segments(&merge(base, r_path), true),
    };

    assemble(scheme, authority, &path, r_query, fragment)
}

/// Computes the shortest reference that [`resolve()`]s against `base`
/// back to `target`: the inverse of resolution.
///
/// Both URLs must have a scheme; [`ErrorKind::NotAbsolute`] otherwise.
///
/// # Example
///
/// ```rust
/// use urlkit::{relative, resolve, UrlRef};
///
/// let base = UrlRef::parse("http://a/b/c/d").unwrap();
/// let target = UrlRef::parse("http://a/b/x/y").unwrap();
///
/// let reference = relative(&base, &target).unwrap();
/// assert_eq!(reference.as_str(), "../x/y");
///
/// let roundtrip = resolve(&base, &reference.view()).unwrap();
/// assert_eq!(roundtrip.as_str(), target.as_str());
/// ```
pub fn relative(base: &UrlRef<'_>, target: &UrlRef<'_>) -> Result<Url> {
    if !base.has_scheme() || !target.has_scheme() {
        return Err(Error::new(ErrorKind::NotAbsolute));
    }

    let fragment = target.encoded_fragment().map(|f| f.as_str());
    let t_query = target.encoded_query().map(|q| q.as_str());

    // A scheme mismatch cannot be bridged by a relative reference.
    if base.scheme().map(str::to_ascii_lowercase)
        != target.scheme().map(str::to_ascii_lowercase)
    {
        return Ok(target.to_url());
    }

    if base.encoded_authority().map(|a| a.as_str())
        != target.encoded_authority().map(|a| a.as_str())
    {
        let path = target.encoded_path().as_str();
        return assemble(
            None,
            target.encoded_authority().map(|a| a.as_str()),
            path,
            t_query,
            fragment,
        );
    }

    let base_path = remove_dot_segments(base.encoded_path().as_str(), true);
    let target_path = remove_dot_segments(target.encoded_path().as_str(), true);

    if base_path == target_path {
        let b_query = base.encoded_query().map(|q| q.as_str());
        if t_query == b_query {
            return assemble(None, None, "", None, fragment);
        }

        if let Some(query) = t_query {
            return assemble(None, None, "", Some(query), fragment);
        }

        // The target dropped the base's query; an empty reference would
        // inherit it, so name the target's last segment instead.
        let path = relative_path(&base_path, &target_path);
        return assemble(None, None, &path, None, fragment);
    }

    let path = relative_path(&base_path, &target_path);
    assemble(None, None, &path, t_query, fragment)
}

// The shortest relative path taking `base` to `target`, both already
// normalized and absolute.
fn relative_path(base: &str, target: &str) -> String {
    let base_dirs: Vec<&str> = match base.rfind('/') {
        Some(last) => base[..last].split('/').skip(1).collect(),
        None => Vec::new(),
    };

    let target_segs: Vec<&str> = match target.is_empty() {
        true => Vec::new(),
        false => target.split('/').skip(1).collect(),
    };

    // How many leading directories are shared.
    let mut common = 0;
    while common < base_dirs.len()
        && common + 1 < target_segs.len().max(1)
        && base_dirs[common] == target_segs.get(common).copied().unwrap_or("")
    {
        common += 1;
    }

    let ups = base_dirs.len() - common;
    let mut out = String::new();
    for _ in 0..ups {
        if !out.is_empty() {
            out.push('/');
        }

        out.push_str("..");
    }

    let rest = &target_segs[common.min(target_segs.len())..];
    for seg in rest {
        if !out.is_empty() {
            out.push('/');
        }

        out.push_str(seg);
    }

    if out.is_empty() {
        out.push('.');
    }

    out
}

impl Url {
    /// Resolves `reference` against this URL. See [`resolve()`].
    pub fn resolve(&self, reference: &UrlRef<'_>) -> Result<Url> {
        crate::url::resolve(&self.view(), reference)
    }

    /// Computes the reference from this URL to `target`. See
    /// [`relative()`].
    pub fn relative(&self, target: &UrlRef<'_>) -> Result<Url> {
        crate::url::relative(&self.view(), target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(base: &str, reference: &str, expected: &str) {
        let base = UrlRef::parse(base).unwrap();
        let reference = UrlRef::parse(reference).unwrap();
        let target = resolve(&base, &reference).unwrap();
        assert_eq!(target.as_str(), expected, "ref {:?}", reference.as_str());
    }

    // RFC 3986 §5.4.1.
    #[test]
    fn normal_examples() {
        let base = "http://a/b/c/d;p?q";
        check(base, "g:h", "g:h");
        check(base, "g", "http://a/b/c/g");
        check(base, "./g", "http://a/b/c/g");
        check(base, "g/", "http://a/b/c/g/");
        check(base, "/g", "http://a/g");
        check(base, "//g", "http://g");
        check(base, "?y", "http://a/b/c/d;p?y");
        check(base, "g?y", "http://a/b/c/g?y");
        check(base, "#s", "http://a/b/c/d;p?q#s");
        check(base, "g#s", "http://a/b/c/g#s");
        check(base, "g?y#s", "http://a/b/c/g?y#s");
        check(base, ";x", "http://a/b/c/;x");
        check(base, "g;x", "http://a/b/c/g;x");
        check(base, "g;x?y#s", "http://a/b/c/g;x?y#s");
        check(base, "", "http://a/b/c/d;p?q");
        check(base, ".", "http://a/b/c/");
        check(base, "./", "http://a/b/c/");
        check(base, "..", "http://a/b/");
        check(base, "../", "http://a/b/");
        check(base, "../g", "http://a/b/g");
        check(base, "../..", "http://a/");
        check(base, "../../", "http://a/");
        check(base, "../../g", "http://a/g");
    }

    // RFC 3986 §5.4.2.
    #[test]
    fn abnormal_examples() {
        let base = "http://a/b/c/d;p?q";
        check(base, "../../../g", "http://a/g");
        check(base, "../../../../g", "http://a/g");
        check(base, "/./g", "http://a/g");
        check(base, "/../g", "http://a/g");
        check(base, "g.", "http://a/b/c/g.");
        check(base, ".g", "http://a/b/c/.g");
        check(base, "g..", "http://a/b/c/g..");
        check(base, "..g", "http://a/b/c/..g");
        check(base, "./../g", "http://a/b/g");
        check(base, "./g/.", "http://a/b/c/g/");
        check(base, "g/./h", "http://a/b/c/g/h");
        check(base, "g/../h", "http://a/b/c/h");
        check(base, "g;x=1/./y", "http://a/b/c/g;x=1/y");
        check(base, "g;x=1/../y", "http://a/b/c/y");
        check(base, "g?y/./x", "http://a/b/c/g?y/./x");
        check(base, "g?y/../x", "http://a/b/c/g?y/../x");
        check(base, "g#s/./x", "http://a/b/c/g#s/./x");
        check(base, "g#s/../x", "http://a/b/c/g#s/../x");
    }

    #[test]
    fn base_must_be_absolute() {
        let base = UrlRef::parse("/not/absolute").unwrap();
        let reference = UrlRef::parse("g").unwrap();
        let e = resolve(&base, &reference).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::NotAbsolute);
    }

    #[test]
    fn empty_base_path() {
        check("http://h", "g", "http://h/g");
        check("http://h?bq", "", "http://h?bq");
        check("http://h", "?y", "http://h?y");
    }

    #[test]
    fn authority_resets_path() {
        check("http://a/b", "//h/../x", "http://h/x");
        check("s://a/b?q#f", "//h", "s://h");
    }

    #[test]
    fn pathological_targets_reparse() {
        // A merged path that begins `//` must not read as an authority.
        let base = UrlRef::parse("x:/a").unwrap();
        let reference = UrlRef::parse("..//b").unwrap();
        let target = resolve(&base, &reference).unwrap();
        assert_eq!(target.encoded_path().as_str(), "/.//b");
        assert!(!target.has_authority());
    }

    fn check_relative(base: &str, target: &str, expected: &str) {
        let base = UrlRef::parse(base).unwrap();
        let target = UrlRef::parse(target).unwrap();
        let reference = relative(&base, &target).unwrap();
        assert_eq!(reference.as_str(), expected, "target {:?}", target.as_str());

        // The defining property: resolving back yields the target.
        let roundtrip = resolve(&base, &reference.view()).unwrap();
        assert_eq!(
            roundtrip.view(),
            target,
            "roundtrip {:?} for {:?}",
            roundtrip.as_str(),
            reference.as_str(),
        );
    }

    #[test]
    fn relative_references() {
        check_relative("http://a/b/c/d", "http://a/b/c/g", "g");
        check_relative("http://a/b/c/d", "http://a/b/x/y", "../x/y");
        check_relative("http://a/b/c/", "http://a/b/c/g", "g");
        check_relative("http://a/b/c/d", "http://a/z", "../../z");
        check_relative("http://a/b", "http://a/", ".");
        check_relative("http://a/", "http://a/b", "b");
        check_relative("http://a/b/c/d?q", "http://a/b/c/d?r", "?r");
        check_relative("http://a/b/c/d?q", "http://a/b/c/d?q#f", "#f");
        check_relative("http://a/b/c/d", "http://a/b/c/d", "");
        check_relative("http://a/b", "http://z/c", "//z/c");
        check_relative("http://a/b", "ftp://a/b", "ftp://a/b");
        check_relative("http://a/b/c/d?q", "http://a/b/c/d", "d");
    }

    #[test]
    fn resolve_relative_inverse() {
        let bases = ["http://a/b/c/d?q", "http://a/", "http://a/x/"];
        let refs = ["g", "../g", "./", "?y", "#s", "g/h", "", "/abs", "../../../up"];

        for base_str in bases {
            let base = UrlRef::parse(base_str).unwrap();
            for r in refs {
                let reference = UrlRef::parse(r).unwrap();
                let target = resolve(&base, &reference).unwrap();
                let back = relative(&base, &target.view()).unwrap();
                let again = resolve(&base, &back.view()).unwrap();
                assert_eq!(
                    again.view(),
                    target.view(),
                    "base {:?} ref {:?} back {:?}",
                    base_str,
                    r,
                    back.as_str(),
                );
            }
        }
    }
}
