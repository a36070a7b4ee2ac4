use crate::grammar::Rule;
use crate::pct::{self, EncodeOpts};
use crate::rfc::uri::is_valid_scheme;
use crate::rfc::{
    count_segments, enc_token, HostKind, HostRule, Scheme, FRAGMENT_CHARS,
    PCHARS, QUERY_CHARS, REG_NAME_CHARS, USERINFO_CHARS,
};
use crate::url::parts::{count_params, decoded_len, Part, MAX_URL_LEN, NUM_PARTS};
use crate::url::Url;
use crate::{Error, ErrorKind, Result};

const PATH_CHARS: crate::grammar::CharSet = PCHARS.add(b'/');
const USER_CHARS: crate::grammar::CharSet = USERINFO_CHARS.remove(b':');

// Mutation errors must not leak retriable kinds.
fn commit(e: Error) -> Error {
    match e.kind() {
        ErrorKind::Mismatch | ErrorKind::EndOfRange => Error::new(ErrorKind::Syntax),
        _ => e,
    }
}

impl Url {
    /// Splices new content over the contiguous run of parts
    /// `first..=last`, one piece per part, then refreshes offsets and the
    /// auxiliary fields the touched parts feed.
    ///
    /// This is the single primitive every mutator funnels through. Pieces
    /// are full part slices, delimiters included.
    pub(crate) fn edit(&mut self, first: Part, last: Part, pieces: &[&str]) -> Result<()> {
        debug_assert_eq!(pieces.len(), last.index() - first.index() + 1);

        let start = self.parts().start(first);
        let end = self.parts().end(last);
        let replaced = end - start;
        let added: usize = pieces.iter().map(|p| p.len()).sum();

        let new_len = self.as_str().len() - replaced + added;
        if new_len > MAX_URL_LEN {
            return Err(Error::new(ErrorKind::Length));
        }

        // Grow by at least a doubling so repeated edits stay amortized.
        let source = self.source_mut();
        if new_len > source.capacity() {
            let grow = new_len - source.len();
            source.reserve(grow.max(source.capacity()));
        }

        let mut replacement = String::with_capacity(added);
        pieces.iter().for_each(|p| replacement.push_str(p));
        source.replace_range(start..end, &replacement);

        // Boundaries inside the edited run, then a shift for what follows.
        let mut offset = start as u32;
        for (i, piece) in pieces.iter().enumerate() {
            offset += piece.len() as u32;
            self.parts_mut().offsets[first.index() + 1 + i] = offset;
        }

        let delta = added as i64 - replaced as i64;
        for k in (last.index() + 2)..=NUM_PARTS {
            let shifted = self.parts_mut().offsets[k] as i64 + delta;
            self.parts_mut().offsets[k] = shifted as u32;
        }

        for k in first.index()..=last.index() {
            self.reindex(crate::url::parts::ALL_PARTS[k])?;
        }

        self.parts().check_offsets(self.as_str());
        Ok(())
    }

    // Recomputes the auxiliary fields derived from `part`'s text.
    fn reindex(&mut self, part: Part) -> Result<()> {
        let stripped = self.parts().stripped(self.as_str(), part).to_string();
        let n = decoded_len(&stripped) as u32;
        self.parts_mut().decoded[part.index()] = n;

        match part {
            Part::Scheme => {
                self.parts_mut().scheme = match self.has_scheme() {
                    true => Some(Scheme::recognize(&stripped)),
                    false => None,
                };
            }
            Part::Host => {
                if self.has_authority() {
                    let host = HostRule.parse_complete(&stripped).map_err(commit)?;
                    self.parts_mut().host_kind = host.kind;
                    self.parts_mut().ip = host.ip;
                } else {
                    self.parts_mut().host_kind = HostKind::None;
                    self.parts_mut().ip = [0; 16];
                }
            }
            Part::Port => {
                let mut value: u32 = 0;
                for b in stripped.bytes() {
                    value = value * 10 + (b - b'0') as u32;
                    if value > u16::MAX as u32 {
                        return Err(Error::new(ErrorKind::PortOverflow));
                    }
                }

                self.parts_mut().port_number = value as u16;
            }
            Part::Path => {
                self.parts_mut().segments = count_segments(&stripped) as u32;
            }
            Part::Query => {
                self.parts_mut().params = match self.has_query() {
                    true => 1 + count_params(&stripped) as u32,
                    false => 0,
                };
            }
            Part::User | Part::Password | Part::Fragment => {}
        }

        Ok(())
    }

    /// Sets the scheme, validating it against the `scheme` rule.
    ///
    /// # Example
    ///
    /// ```rust
    /// use urlkit::Url;
    ///
    /// let mut url = Url::parse("//example.com/a").unwrap();
    /// url.set_scheme("https").unwrap();
    /// assert_eq!(url.as_str(), "https://example.com/a");
    ///
    /// url.set_scheme("not a scheme").unwrap_err();
    /// ```
    pub fn set_scheme(&mut self, scheme: &str) -> Result<()> {
        if !is_valid_scheme(scheme) {
            return Err(Error::new(ErrorKind::Syntax));
        }

        let piece = format!("{}:", scheme);
        self.edit(Part::Scheme, Part::Scheme, &[&piece])
    }

    /// Removes the scheme and its `:`, keeping the rest of the URL a
    /// valid relative reference.
    pub fn remove_scheme(&mut self) -> Result<()> {
        self.edit(Part::Scheme, Part::Scheme, &[""])?;
        self.reguard_path()
    }

    /// Replaces the whole authority with the already-encoded `authority`,
    /// adding the leading `//` as needed.
    ///
    /// Fails with [`ErrorKind::Invalid`] if the URL's path is relative:
    /// with an authority present, a non-empty path must begin with `/`.
    pub fn set_encoded_authority(&mut self, authority: &str) -> Result<()> {
        let raw = crate::rfc::uri::parse_authority(authority).map_err(commit)?;
        let path = self.encoded_path().as_str();
        if !path.is_empty() && !path.starts_with('/') {
            return Err(Error::new(ErrorKind::Invalid));
        }

        let user = format!("//{}", raw.user.unwrap_or(""));
        let password = match (raw.user, raw.password) {
            (_, Some(p)) => format!(":{}@", p),
            (Some(_), None) => "@".to_string(),
            (None, None) => String::new(),
        };

        let port = raw.port.map(|p| format!(":{}", p)).unwrap_or_default();
        let pieces = [user.as_str(), password.as_str(), raw.host.text, port.as_str()];
        self.edit(Part::User, Part::Port, &pieces)
    }

    /// Removes the authority, including its `//`.
    pub fn remove_authority(&mut self) -> Result<()> {
        self.edit(Part::User, Part::Port, &["", "", "", ""])?;
        self.reguard_path()
    }

    // Materializes an empty authority (`//`) so a userinfo, host, or port
    // setter has somewhere to write. A non-empty relative path is made
    // absolute, since an authority must be followed by `/` or nothing.
    fn ensure_authority(&mut self) -> Result<()> {
        if self.has_authority() {
            return Ok(());
        }

        self.edit(Part::User, Part::Port, &["//", "", "", ""])?;
        let path = self.encoded_path().as_str();
        if !path.is_empty() && !path.starts_with('/') {
            let path = format!("/{}", path);
            self.edit(Part::Path, Part::Path, &[&path])?;
        }

        Ok(())
    }

    /// Sets the user half of the userinfo, encoding it as needed. An
    /// authority and userinfo are added if missing.
    pub fn set_user(&mut self, user: &str) -> Result<()> {
        let encoded = pct::encode(user, &USER_CHARS, EncodeOpts::default());
        self.set_encoded_user(&encoded)
    }

    /// Sets the already-encoded user half of the userinfo.
    pub fn set_encoded_user(&mut self, user: &str) -> Result<()> {
        enc_token(USER_CHARS, 0).parse_complete(user).map_err(commit)?;
        self.ensure_authority()?;

        let user = format!("//{}", user);
        let password = match self.has_userinfo() {
            true => self.parts().slice(self.as_str(), Part::Password).to_string(),
            false => "@".to_string(),
        };

        self.edit(Part::User, Part::Password, &[&user, &password])
    }

    /// Sets the password, encoding it as needed. An authority and
    /// userinfo are added if missing.
    pub fn set_password(&mut self, password: &str) -> Result<()> {
        let encoded = pct::encode(password, &USERINFO_CHARS, EncodeOpts::default());
        self.set_encoded_password(&encoded)
    }

    /// Sets the already-encoded password.
    pub fn set_encoded_password(&mut self, password: &str) -> Result<()> {
        enc_token(USERINFO_CHARS, 0).parse_complete(password).map_err(commit)?;
        self.ensure_authority()?;

        let user = match self.has_userinfo() {
            true => self.parts().slice(self.as_str(), Part::User).to_string(),
            false => "//".to_string(),
        };

        let password = format!(":{}@", password);
        self.edit(Part::User, Part::Password, &[&user, &password])
    }

    /// Removes the password, keeping the user.
    pub fn remove_password(&mut self) -> Result<()> {
        if !self.has_password() {
            return Ok(());
        }

        let user = self.parts().slice(self.as_str(), Part::User).to_string();
        self.edit(Part::User, Part::Password, &[&user, "@"])
    }

    /// Removes the userinfo, including its `@`.
    pub fn remove_userinfo(&mut self) -> Result<()> {
        if !self.has_userinfo() {
            return Ok(());
        }

        self.edit(Part::User, Part::Password, &["//", ""])
    }

    /// Sets the host, encoding it as needed. IPv4 addresses and
    /// bracketed IP literals are stored as written; everything else is
    /// treated as a registered name. An authority is added if missing.
    pub fn set_host(&mut self, host: &str) -> Result<()> {
        if crate::rfc::parse_ipv4(host).is_some() {
            return self.set_encoded_host(host);
        }

        if host.starts_with('[') && HostRule.parse_complete(host).is_ok() {
            return self.set_encoded_host(host);
        }

        let encoded = pct::encode(host, &REG_NAME_CHARS, EncodeOpts::default());
        self.set_encoded_host(&encoded)
    }

    /// Sets the already-encoded host.
    pub fn set_encoded_host(&mut self, host: &str) -> Result<()> {
        HostRule.parse_complete(host).map_err(commit)?;
        self.ensure_authority()?;
        self.edit(Part::Host, Part::Host, &[host])
    }

    /// Sets the port. An authority is added if missing.
    pub fn set_port(&mut self, port: u16) -> Result<()> {
        self.ensure_authority()?;
        let piece = format!(":{}", port);
        self.edit(Part::Port, Part::Port, &[&piece])
    }

    /// Removes the port, including its `:`.
    pub fn remove_port(&mut self) -> Result<()> {
        self.edit(Part::Port, Part::Port, &[""])
    }

    /// Sets the path, encoding it as needed. `/` separates segments and
    /// is kept as written.
    ///
    /// # Example
    ///
    /// ```rust
    /// use urlkit::Url;
    ///
    /// let mut url = Url::parse("http://h?q").unwrap();
    /// url.set_path("/file names/a b").unwrap();
    /// assert_eq!(url.as_str(), "http://h/file%20names/a%20b?q");
    /// ```
    pub fn set_path(&mut self, path: &str) -> Result<()> {
        let encoded = pct::encode(path, &PATH_CHARS, EncodeOpts::default());
        self.apply_encoded_path(&encoded)
    }

    /// Sets the already-encoded path, validating it.
    pub fn set_encoded_path(&mut self, path: &str) -> Result<()> {
        enc_token(PATH_CHARS, 0).parse_complete(path).map_err(commit)?;
        self.apply_encoded_path(path)
    }

    // Writes a known-well-formed path, adjusting it as needed to keep the
    // whole buffer a valid URI reference.
    pub(crate) fn apply_encoded_path(&mut self, path: &str) -> Result<()> {
        let fixed = self.guarded_path(path);
        self.edit(Part::Path, Part::Path, &[&fixed])
    }

    // The structural adjustments of RFC 3986 §3.3: with an authority, a
    // non-empty path must be absolute; without one, a path may not begin
    // with `//`, and without a scheme its first segment may not contain
    // `:`. A `/` or `./` prefix restores validity.
    fn guarded_path(&self, path: &str) -> String {
        if self.has_authority() {
            if !path.is_empty() && !path.starts_with('/') {
                return format!("/{}", path);
            }

            return path.to_string();
        }

        if path.starts_with("//") {
            return format!("./{}", path);
        }

        if !self.has_scheme() && !path.starts_with('/') {
            let first = path.split('/').next().unwrap_or("");
            if first.contains(':') {
                return format!("./{}", path);
            }
        }

        path.to_string()
    }

    fn reguard_path(&mut self) -> Result<()> {
        let path = self.encoded_path().as_str();
        let fixed = self.guarded_path(path);
        if fixed != path {
            self.edit(Part::Path, Part::Path, &[&fixed])?;
        }

        Ok(())
    }

    /// Sets the query, encoding as needed. `&` and `=` are query
    /// characters and are kept as written.
    pub fn set_query(&mut self, query: &str) -> Result<()> {
        let encoded = pct::encode(query, &QUERY_CHARS, EncodeOpts::default());
        self.apply_encoded_query(&encoded)
    }

    /// Sets the already-encoded query, validating it.
    pub fn set_encoded_query(&mut self, query: &str) -> Result<()> {
        enc_token(QUERY_CHARS, 0).parse_complete(query).map_err(commit)?;
        self.apply_encoded_query(query)
    }

    pub(crate) fn apply_encoded_query(&mut self, query: &str) -> Result<()> {
        let piece = format!("?{}", query);
        self.edit(Part::Query, Part::Query, &[&piece])
    }

    /// Removes the query, including its `?`.
    pub fn remove_query(&mut self) -> Result<()> {
        self.edit(Part::Query, Part::Query, &[""])
    }

    /// Sets the fragment, encoding it as needed.
    pub fn set_fragment(&mut self, fragment: &str) -> Result<()> {
        let encoded = pct::encode(fragment, &FRAGMENT_CHARS, EncodeOpts::default());
        let piece = format!("#{}", encoded);
        self.edit(Part::Fragment, Part::Fragment, &[&piece])
    }

    /// Sets the already-encoded fragment, validating it.
    pub fn set_encoded_fragment(&mut self, fragment: &str) -> Result<()> {
        enc_token(FRAGMENT_CHARS, 0).parse_complete(fragment).map_err(commit)?;
        let piece = format!("#{}", fragment);
        self.edit(Part::Fragment, Part::Fragment, &[&piece])
    }

    /// Removes the fragment, including its `#`.
    pub fn remove_fragment(&mut self) -> Result<()> {
        self.edit(Part::Fragment, Part::Fragment, &[""])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HostKind, Url};

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn scheme_edits() {
        let mut u = url("//example.com/a?q#f");
        u.set_scheme("http").unwrap();
        assert_eq!(u.as_str(), "http://example.com/a?q#f");
        assert_eq!(u.scheme_kind(), Some(crate::Scheme::Http));

        u.set_scheme("wss").unwrap();
        assert_eq!(u.as_str(), "wss://example.com/a?q#f");

        u.remove_scheme().unwrap();
        assert_eq!(u.as_str(), "//example.com/a?q#f");

        assert!(u.set_scheme("1st").is_err());
        assert!(u.set_scheme("").is_err());
        assert!(u.set_scheme("ht tp").is_err());
        assert_eq!(u.as_str(), "//example.com/a?q#f");
    }

    #[test]
    fn scheme_removal_guards_path() {
        let mut u = url("x:a:b/c");
        u.remove_scheme().unwrap();
        assert_eq!(u.as_str(), "./a:b/c");
        assert!(crate::UrlRef::parse(u.as_str()).is_ok());
    }

    #[test]
    fn authority_edits() {
        let mut u = url("http:/a");
        u.set_encoded_authority("user:pass@h:81").unwrap();
        assert_eq!(u.as_str(), "http://user:pass@h:81/a");
        assert_eq!(u.port_number(), 81);
        assert_eq!(u.user().unwrap(), "user");

        u.set_encoded_authority("[::1]").unwrap();
        assert_eq!(u.as_str(), "http://[::1]/a");
        assert_eq!(u.host_kind(), HostKind::Ipv6);
        assert_eq!(u.port_number(), 0);

        u.remove_authority().unwrap();
        assert_eq!(u.as_str(), "http:/a");
        assert_eq!(u.host_kind(), HostKind::None);
    }

    #[test]
    fn authority_requires_absolute_path() {
        let mut u = url("x:a/b");
        assert_eq!(
            u.set_encoded_authority("h").unwrap_err().kind(),
            ErrorKind::Invalid,
        );
    }

    #[test]
    fn authority_removal_guards_path() {
        let mut u = url("x://h//double");
        u.remove_authority().unwrap();
        assert_eq!(u.as_str(), "x:.//double");
        assert!(crate::UrlRef::parse(u.as_str()).is_ok());
    }

    #[test]
    fn userinfo_edits() {
        let mut u = url("http://h/p");
        u.set_user("jo hn").unwrap();
        assert_eq!(u.as_str(), "http://jo%20hn@h/p");

        u.set_password("s:e@c").unwrap();
        assert_eq!(u.as_str(), "http://jo%20hn:s:e%40c@h/p");
        assert_eq!(u.password().unwrap(), "s:e@c");

        u.remove_password().unwrap();
        assert_eq!(u.as_str(), "http://jo%20hn@h/p");

        u.remove_userinfo().unwrap();
        assert_eq!(u.as_str(), "http://h/p");

        // Setting a password without a user makes an empty user.
        u.set_encoded_password("pw").unwrap();
        assert_eq!(u.as_str(), "http://:pw@h/p");
        assert_eq!(u.user().unwrap(), "");
    }

    #[test]
    fn host_edits() {
        let mut u = url("http://old.example.com/p");
        u.set_host("new.example.com").unwrap();
        assert_eq!(u.as_str(), "http://new.example.com/p");
        assert_eq!(u.host_kind(), HostKind::Name);

        u.set_host("192.168.0.1").unwrap();
        assert_eq!(u.host_kind(), HostKind::Ipv4);
        assert_eq!(u.host_ipv4_address(), Some("192.168.0.1".parse().unwrap()));

        u.set_host("[::1]").unwrap();
        assert_eq!(u.host_kind(), HostKind::Ipv6);

        u.set_host("not an ip").unwrap();
        assert_eq!(u.encoded_host().unwrap(), "not%20an%20ip");
        assert_eq!(u.host_kind(), HostKind::Name);

        assert!(u.set_encoded_host("a b").is_err());
    }

    #[test]
    fn host_creates_authority() {
        let mut u = url("x:p/q");
        u.set_host("h").unwrap();
        assert_eq!(u.as_str(), "x://h/p/q");

        let mut u = url("");
        u.set_host("h").unwrap();
        assert_eq!(u.as_str(), "//h");
    }

    #[test]
    fn port_edits() {
        let mut u = url("http://h/p");
        u.set_port(8080).unwrap();
        assert_eq!(u.as_str(), "http://h:8080/p");
        assert_eq!(u.port_number(), 8080);
        assert!(u.has_port());

        u.set_port(80).unwrap();
        assert_eq!(u.as_str(), "http://h:80/p");

        u.remove_port().unwrap();
        assert_eq!(u.as_str(), "http://h/p");
        assert_eq!(u.port_number(), 0);
        assert!(!u.has_port());
    }

    #[test]
    fn path_edits() {
        let mut u = url("http://h?q");
        u.set_encoded_path("/a/b").unwrap();
        assert_eq!(u.as_str(), "http://h/a/b?q");
        assert_eq!(u.segment_count(), 2);

        // A relative path with an authority is made absolute.
        u.set_encoded_path("c/d").unwrap();
        assert_eq!(u.as_str(), "http://h/c/d?q");

        u.set_encoded_path("").unwrap();
        assert_eq!(u.as_str(), "http://h?q");
        assert_eq!(u.segment_count(), 0);

        assert!(u.set_encoded_path("/a b").is_err());
        assert!(u.set_encoded_path("/a?b").is_err());
    }

    #[test]
    fn path_guards_without_authority() {
        let mut u = url("x:");
        u.set_encoded_path("//strange").unwrap();
        assert_eq!(u.as_str(), "x:.//strange");

        let mut u = url("");
        u.set_encoded_path("a:b").unwrap();
        assert_eq!(u.as_str(), "./a:b");
        assert!(crate::UrlRef::parse(u.as_str()).is_ok());
    }

    #[test]
    fn query_edits() {
        let mut u = url("http://h/p#f");
        u.set_query("k=v&w").unwrap();
        assert_eq!(u.as_str(), "http://h/p?k=v&w#f");
        assert_eq!(u.param_count(), 2);

        u.set_query("").unwrap();
        assert_eq!(u.as_str(), "http://h/p?#f");
        assert!(u.has_query());
        assert_eq!(u.param_count(), 1);

        u.remove_query().unwrap();
        assert_eq!(u.as_str(), "http://h/p#f");
        assert_eq!(u.param_count(), 0);

        u.set_query("spa ce").unwrap();
        assert_eq!(u.as_str(), "http://h/p?spa%20ce#f");
    }

    #[test]
    fn fragment_edits() {
        let mut u = url("http://h/p?q");
        u.set_fragment("sec 2").unwrap();
        assert_eq!(u.as_str(), "http://h/p?q#sec%202");

        u.set_encoded_fragment("top").unwrap();
        assert_eq!(u.as_str(), "http://h/p?q#top");

        u.remove_fragment().unwrap();
        assert_eq!(u.as_str(), "http://h/p?q");

        assert!(u.set_encoded_fragment("a#b").is_err());
    }

    #[test]
    fn offsets_stay_monotone() {
        let mut u = url("");
        u.set_encoded_path("/p").unwrap();
        u.set_scheme("http").unwrap();
        u.set_host("h").unwrap();
        u.set_port(1).unwrap();
        u.set_user("u").unwrap();
        u.set_query("q").unwrap();
        u.set_fragment("f").unwrap();
        assert_eq!(u.as_str(), "http://u@h:1/p?q#f");

        u.remove_port().unwrap();
        u.remove_userinfo().unwrap();
        u.remove_query().unwrap();
        u.remove_fragment().unwrap();
        u.remove_scheme().unwrap();
        u.remove_authority().unwrap();
        assert_eq!(u.as_str(), "/p");
    }

    #[test]
    fn growth_under_repeated_edits() {
        let mut u = url("http://h/");
        for i in 0..50 {
            u.segments_mut().push(&format!("segment-{}", i)).unwrap();
        }

        assert_eq!(u.segment_count(), 50);
        assert!(u.as_str().starts_with("http://h/segment-0/"));
        assert!(u.as_str().ends_with("/segment-49"));
    }
}
