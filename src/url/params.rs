use std::borrow::Cow;
use std::fmt;
use std::str::Split;

use crate::grammar::Rule;
use crate::pct::{self, DecodeOpts, EncodeOpts};
use crate::rfc::{enc_token, QUERY_CHARS};
use crate::url::Url;
use crate::{EncodedStr, Error, ErrorKind, Result};

/// A decoded query parameter.
///
/// `value` is `None` for a key written without `=`, distinguishing `?k`
/// from `?k=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param<'a> {
    /// The decoded key.
    pub key: Cow<'a, str>,
    /// The decoded value, if an `=` was present.
    pub value: Option<Cow<'a, str>>,
}

impl Param<'_> {
    /// Whether the parameter was written with an `=`.
    #[inline(always)]
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

/// A raw, encoded query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedParam<'a> {
    /// The key as written.
    pub key: &'a EncodedStr,
    /// The value as written, if an `=` was present.
    pub value: Option<&'a EncodedStr>,
}

impl<'a> EncodedParam<'a> {
    /// Whether the parameter was written with an `=`.
    #[inline(always)]
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Decodes this parameter. `+` in keys and values decodes to a space,
    /// per form convention.
    pub fn decode(&self) -> Param<'a> {
        Param {
            key: decode_component(self.key),
            value: self.value.map(decode_component),
        }
    }
}

fn decode_component(s: &EncodedStr) -> Cow<'_, str> {
    match s.as_str().bytes().any(|b| b == b'%' || b == b'+') {
        false => Cow::Borrowed(s.as_str()),
        true => {
            let mut out = vec![0; s.decoded_len()];
            let n = pct::decode_unchecked_into(&mut out, s.as_str(), DecodeOpts::default());
            debug_assert_eq!(n, out.len());
            match String::from_utf8_lossy(&out) {
                Cow::Borrowed(text) => Cow::Owned(text.to_string()),
                Cow::Owned(text) => Cow::Owned(text),
            }
        }
    }
}

/// An iterator over a query's raw, encoded parameters.
#[derive(Clone)]
pub struct EncodedParams<'a> {
    split: Option<Split<'a, char>>,
    remaining: usize,
}

impl<'a> EncodedParams<'a> {
    pub(crate) fn new(query: Option<&'a str>, count: usize) -> EncodedParams<'a> {
        EncodedParams { split: query.map(|q| q.split('&')), remaining: count }
    }

    /// Parses and validates `query` (without its leading `?`), returning a
    /// view over its parameters.
    pub fn parse(query: &'a str) -> Result<EncodedParams<'a>> {
        validate_query(query)?;
        let count = 1 + crate::url::parts::count_params(query);
        Ok(EncodedParams::new(Some(query), count))
    }

    /// The number of parameters remaining.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.remaining
    }

    /// Whether no parameters remain.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// The first parameter whose key decodes to `key`.
    pub fn get(mut self, key: &str) -> Option<EncodedParam<'a>> {
        self.find(|p| pct::key_equal_opt(p.key.as_str(), key, true))
    }
}

impl<'a> Iterator for EncodedParams<'a> {
    type Item = EncodedParam<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        self.remaining -= 1;
        let piece = self.split.as_mut()?.next()?;
        Some(match piece.split_once('=') {
            Some((key, value)) => EncodedParam {
                key: EncodedStr::assume(key),
                value: Some(EncodedStr::assume(value)),
            },
            None => EncodedParam { key: EncodedStr::assume(piece), value: None },
        })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EncodedParams<'_> {}

impl fmt::Debug for EncodedParams<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

/// An iterator over a query's decoded parameters.
///
/// # Example
///
/// ```rust
/// use urlkit::Url;
///
/// let url = Url::parse("/?first=John&last=Doe").unwrap();
/// let params: Vec<_> = url.params().collect();
/// assert_eq!(params[0].key, "first");
/// assert_eq!(params[0].value.as_deref(), Some("John"));
/// assert_eq!(params[1].key, "last");
/// assert_eq!(params[1].value.as_deref(), Some("Doe"));
/// assert!(params.iter().all(|p| p.has_value()));
/// ```
#[derive(Clone)]
pub struct Params<'a> {
    inner: EncodedParams<'a>,
}

impl<'a> Params<'a> {
    pub(crate) fn new(query: Option<&'a str>, count: usize) -> Params<'a> {
        Params { inner: EncodedParams::new(query, count) }
    }

    /// Parses and validates `query`, returning a view over its decoded
    /// parameters.
    pub fn parse(query: &'a str) -> Result<Params<'a>> {
        Ok(Params { inner: EncodedParams::parse(query)? })
    }

    /// The number of parameters remaining.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no parameters remain.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The first parameter whose key decodes to `key`.
    #[inline]
    pub fn get(self, key: &str) -> Option<Param<'a>> {
        self.inner.get(key).map(|p| p.decode())
    }

    /// Like [`get()`](Self::get), but panics when `key` is not present.
    pub fn at(self, key: &str) -> Param<'a> {
        match self.get(key) {
            Some(param) => param,
            None => panic!("no query parameter with key {:?}", key),
        }
    }
}

impl<'a> Iterator for Params<'a> {
    type Item = Param<'a>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|p| p.decode())
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Params<'_> {}

const KEY_CHARS: crate::grammar::CharSet = QUERY_CHARS.remove(b'&').remove(b'=');
const VALUE_CHARS: crate::grammar::CharSet = QUERY_CHARS.remove(b'&');

pub(crate) fn validate_query(query: &str) -> Result<()> {
    enc_token(QUERY_CHARS, 0).parse_complete(query).map(|_| ())
}

fn validate_key(key: &str) -> Result<()> {
    enc_token(KEY_CHARS, 0).parse_complete(key).map(|_| ())
}

fn validate_value(value: &str) -> Result<()> {
    enc_token(VALUE_CHARS, 0).parse_complete(value).map(|_| ())
}

fn encode_key(key: &str) -> String {
    pct::encode(key, &KEY_CHARS.remove(b'+'), EncodeOpts::default())
}

fn encode_value(value: &str) -> String {
    pct::encode(value, &VALUE_CHARS.remove(b'+'), EncodeOpts::default())
}

/// A mutable reference to a URL's query parameters.
///
/// Every operation rewrites the query part of the underlying [`Url`],
/// keeping the `?`, `&`, and `=` delimiters and the parameter count
/// consistent. Removing the last parameter removes the query itself.
///
/// # Example
///
/// ```rust
/// use urlkit::Url;
///
/// let mut url = Url::parse("http://h/s").unwrap();
/// let mut params = url.params_mut();
/// params.append("first", Some("John")).unwrap();
/// params.append("mode", None).unwrap();
/// assert_eq!(url.as_str(), "http://h/s?first=John&mode");
///
/// url.params_mut().set("mode", Some("full")).unwrap();
/// assert_eq!(url.as_str(), "http://h/s?first=John&mode=full");
/// ```
pub struct ParamsMut<'u> {
    url: &'u mut Url,
}

impl<'u> ParamsMut<'u> {
    #[inline(always)]
    pub(crate) fn new(url: &'u mut Url) -> ParamsMut<'u> {
        ParamsMut { url }
    }

    /// The number of parameters.
    #[inline]
    pub fn len(&self) -> usize {
        self.url.param_count()
    }

    /// Whether the URL has no parameters.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes the query altogether.
    pub fn clear(&mut self) -> Result<()> {
        self.url.remove_query()
    }

    /// Appends a parameter, encoding key and value as needed.
    pub fn append(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        self.append_encoded(&encode_key(key), value.map(encode_value).as_deref())
    }

    /// Appends an already-encoded parameter, validating it.
    pub fn append_encoded(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        validate_encoded(key, value)?;
        self.rewrite(|params| {
            params.push(render(key, value));
            Ok(())
        })
    }

    /// Alias for [`append()`](Self::append).
    #[inline]
    pub fn push(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        self.append(key, value)
    }

    /// Removes the last parameter, returning `false` if there was none.
    /// Removing the only parameter removes the query.
    pub fn pop(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }

        if self.len() == 1 {
            return self.url.remove_query().is_ok();
        }

        self.rewrite(|params| {
            params.pop();
            Ok(())
        })
        .is_ok()
    }

    /// Inserts a parameter at `index`, encoding key and value as needed.
    pub fn insert(&mut self, index: usize, key: &str, value: Option<&str>) -> Result<()> {
        self.insert_encoded(index, &encode_key(key), value.map(encode_value).as_deref())
    }

    /// Inserts an already-encoded parameter at `index`.
    pub fn insert_encoded(
        &mut self,
        index: usize,
        key: &str,
        value: Option<&str>,
    ) -> Result<()> {
        validate_encoded(key, value)?;
        self.rewrite(|params| {
            if index > params.len() {
                return Err(Error::new(ErrorKind::OutOfRange));
            }

            params.insert(index, render(key, value));
            Ok(())
        })
    }

    /// Removes the parameter at `index`. Removing the only parameter
    /// removes the query.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        if index == 0 && self.len() == 1 {
            return self.url.remove_query();
        }

        self.rewrite(|params| {
            if index >= params.len() {
                return Err(Error::new(ErrorKind::OutOfRange));
            }

            params.remove(index);
            Ok(())
        })
    }

    /// Replaces the parameter at `index`, encoding as needed.
    pub fn replace(&mut self, index: usize, key: &str, value: Option<&str>) -> Result<()> {
        self.replace_encoded(index, &encode_key(key), value.map(encode_value).as_deref())
    }

    /// Replaces the parameter at `index` with an already-encoded one.
    pub fn replace_encoded(
        &mut self,
        index: usize,
        key: &str,
        value: Option<&str>,
    ) -> Result<()> {
        validate_encoded(key, value)?;
        self.rewrite(|params| {
            match params.get_mut(index) {
                Some(slot) => {
                    *slot = render(key, value);
                    Ok(())
                }
                None => Err(Error::new(ErrorKind::OutOfRange)),
            }
        })
    }

    /// Sets the first parameter matching `key` to `value`, appending the
    /// parameter if no key matches.
    pub fn set(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        let encoded_key = encode_key(key);
        let index = self
            .url
            .encoded_params()
            .position(|p| pct::key_equal_opt(p.key.as_str(), key, true));

        match index {
            Some(index) => {
                self.replace_encoded(index, &encoded_key, value.map(encode_value).as_deref())
            }
            None => self.append_encoded(&encoded_key, value.map(encode_value).as_deref()),
        }
    }

    /// Removes every parameter whose key decodes to `key`, returning how
    /// many were removed.
    pub fn remove_key(&mut self, key: &str) -> Result<usize> {
        let mut removed = 0;
        let survives = |piece: &String| {
            let param_key = piece.split_once('=').map_or(piece.as_str(), |(k, _)| k);
            !pct::key_equal_opt(param_key, key, true)
        };

        let remaining: Vec<String> = {
            let mut kept = Vec::new();
            for piece in self.pieces() {
                match survives(&piece) {
                    true => kept.push(piece),
                    false => removed += 1,
                }
            }

            kept
        };

        if removed == 0 {
            return Ok(0);
        }

        if remaining.is_empty() {
            self.url.remove_query()?;
            return Ok(removed);
        }

        self.url.apply_encoded_query(&remaining.join("&"))?;
        Ok(removed)
    }

    fn pieces(&self) -> Vec<String> {
        self.url
            .encoded_params()
            .map(|p| match p.value {
                Some(value) => format!("{}={}", p.key, value),
                None => p.key.as_str().to_string(),
            })
            .collect()
    }

    fn rewrite<F>(&mut self, op: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<String>) -> Result<()>,
    {
        let mut params = self.pieces();
        op(&mut params)?;
        self.url.apply_encoded_query(&params.join("&"))
    }
}

fn validate_encoded(key: &str, value: Option<&str>) -> Result<()> {
    validate_key(key)?;
    value.map_or(Ok(()), validate_value)
}

fn render(key: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("{}={}", key, value),
        None => key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Url;

    #[test]
    fn iteration() {
        let url = Url::parse("/?a=1&b&c=&=x&").unwrap();
        let params: Vec<_> = url.encoded_params().collect();
        assert_eq!(params.len(), 5);
        assert_eq!(url.param_count(), 5);

        assert_eq!(params[0].key, "a");
        assert_eq!(params[0].value.unwrap(), "1");
        assert_eq!(params[1].key, "b");
        assert!(!params[1].has_value());
        assert_eq!(params[2].key, "c");
        assert_eq!(params[2].value.unwrap(), "");
        assert!(params[2].has_value());
        assert_eq!(params[3].key, "");
        assert_eq!(params[3].value.unwrap(), "x");
        assert_eq!(params[4].key, "");
        assert!(!params[4].has_value());
    }

    #[test]
    fn no_query_no_params() {
        let url = Url::parse("/a/b").unwrap();
        assert_eq!(url.param_count(), 0);
        assert_eq!(url.params().count(), 0);

        // An empty query still has one (empty) parameter.
        let url = Url::parse("/a/b?").unwrap();
        assert_eq!(url.param_count(), 1);
    }

    #[test]
    fn decoding() {
        let url = Url::parse("/?a+b%2F=some+one%40x&%26%3D2").unwrap();
        let params: Vec<_> = url.params().collect();
        assert_eq!(params[0].key, "a b/");
        assert_eq!(params[0].value.as_deref(), Some("some one@x"));
        assert_eq!(params[1].key, "&=2");
        assert_eq!(params[1].value, None);
    }

    #[test]
    fn lookup() {
        let url = Url::parse("/?first=John&last=Doe&a%20b=1").unwrap();
        assert_eq!(url.params().get("first").unwrap().value.as_deref(), Some("John"));
        assert_eq!(url.params().get("a b").unwrap().value.as_deref(), Some("1"));
        assert!(url.params().get("missing").is_none());
        assert_eq!(url.params().at("last").value.as_deref(), Some("Doe"));
    }

    #[test]
    #[should_panic]
    fn lookup_panics_on_missing() {
        let url = Url::parse("/?a=1").unwrap();
        url.params().at("b");
    }

    #[test]
    fn append_and_pop() {
        let mut url = Url::parse("http://h/s").unwrap();
        url.params_mut().append("k", Some("v")).unwrap();
        assert_eq!(url.as_str(), "http://h/s?k=v");
        url.params_mut().append("flag", None).unwrap();
        assert_eq!(url.as_str(), "http://h/s?k=v&flag");
        url.params_mut().append("a b", Some("c&d")).unwrap();
        assert_eq!(url.as_str(), "http://h/s?k=v&flag&a%20b=c%26d");

        assert!(url.params_mut().pop());
        assert!(url.params_mut().pop());
        assert_eq!(url.as_str(), "http://h/s?k=v");
        assert!(url.params_mut().pop());
        assert_eq!(url.as_str(), "http://h/s");
        assert!(!url.params_mut().pop());
    }

    #[test]
    fn insert_remove_replace() {
        let mut url = Url::parse("/?a=1&c=3").unwrap();
        url.params_mut().insert_encoded(1, "b", Some("2")).unwrap();
        assert_eq!(url.as_str(), "/?a=1&b=2&c=3");

        url.params_mut().replace_encoded(0, "a", None).unwrap();
        assert_eq!(url.as_str(), "/?a&b=2&c=3");

        url.params_mut().remove(1).unwrap();
        assert_eq!(url.as_str(), "/?a&c=3");

        assert_eq!(
            url.params_mut().remove(5).unwrap_err().kind(),
            ErrorKind::OutOfRange,
        );
    }

    #[test]
    fn set_and_remove_key() {
        let mut url = Url::parse("/?a=1&b=2&a=3").unwrap();
        url.params_mut().set("a", Some("9")).unwrap();
        assert_eq!(url.as_str(), "/?a=9&b=2&a=3");

        url.params_mut().set("new", None).unwrap();
        assert_eq!(url.as_str(), "/?a=9&b=2&a=3&new");

        assert_eq!(url.params_mut().remove_key("a").unwrap(), 2);
        assert_eq!(url.as_str(), "/?b=2&new");

        assert_eq!(url.params_mut().remove_key("zzz").unwrap(), 0);

        assert_eq!(url.params_mut().remove_key("b").unwrap(), 1);
        assert_eq!(url.params_mut().remove_key("new").unwrap(), 1);
        assert_eq!(url.as_str(), "/");
        assert!(!url.has_query());
    }

    #[test]
    fn plus_preserved_encoded_folded_decoded() {
        let url = Url::parse("/?a+b=c+d").unwrap();
        let encoded: Vec<_> = url.encoded_params().collect();
        assert_eq!(encoded[0].key, "a+b");

        let decoded: Vec<_> = url.params().collect();
        assert_eq!(decoded[0].key, "a b");
        assert_eq!(decoded[0].value.as_deref(), Some("c d"));
    }
}
