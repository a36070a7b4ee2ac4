use std::borrow::Cow;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::rfc::uri::RawAuthority;
use crate::rfc::HostKind;
use crate::EncodedStr;

/// A read-only view of a standalone authority: `user:pass@host:port`.
///
/// Produced by [`parse_authority()`](crate::parse_authority). The view
/// borrows the input string; every accessor is zero-copy except the
/// decoding ones, which allocate only when an escape is present.
///
/// # Example
///
/// ```rust
/// use urlkit::{parse_authority, HostKind};
///
/// let authority = parse_authority("user:pass@example.com:8042").unwrap();
/// assert_eq!(authority.user(), Some("user"));
/// assert_eq!(authority.password(), Some("pass"));
/// assert_eq!(authority.encoded_host(), "example.com");
/// assert_eq!(authority.host_kind(), HostKind::Name);
/// assert_eq!(authority.port_number(), 8042);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AuthorityRef<'a> {
    pub(crate) source: &'a str,
    pub(crate) user: Option<&'a str>,
    pub(crate) password: Option<&'a str>,
    pub(crate) host: &'a str,
    pub(crate) host_kind: HostKind,
    pub(crate) ip: [u8; 16],
    pub(crate) port: Option<&'a str>,
    pub(crate) port_number: u16,
}

impl<'a> AuthorityRef<'a> {
    pub(crate) fn from_raw(source: &'a str, raw: &RawAuthority<'a>) -> AuthorityRef<'a> {
        AuthorityRef {
            source,
            user: raw.user,
            password: raw.password,
            host: raw.host.text,
            host_kind: raw.host.kind,
            ip: raw.host.ip,
            port: raw.port,
            port_number: raw.port_num,
        }
    }

    /// The full authority as it was written.
    #[inline(always)]
    pub fn as_str(&self) -> &'a str {
        self.source
    }

    /// Whether a userinfo component, terminated by `@`, is present.
    #[inline(always)]
    pub fn has_userinfo(&self) -> bool {
        self.user.is_some()
    }

    /// The user, still encoded, if a userinfo is present.
    #[inline]
    pub fn encoded_user(&self) -> Option<&'a EncodedStr> {
        self.user.map(EncodedStr::assume)
    }

    /// The user, decoded, if a userinfo is present.
    #[inline]
    pub fn user(&self) -> Option<Cow<'a, str>> {
        self.user.map(decode)
    }

    /// The password, still encoded, if the userinfo contains one.
    #[inline]
    pub fn encoded_password(&self) -> Option<&'a EncodedStr> {
        self.password.map(EncodedStr::assume)
    }

    /// The password, decoded, if the userinfo contains one.
    #[inline]
    pub fn password(&self) -> Option<Cow<'a, str>> {
        self.password.map(decode)
    }

    /// What kind of host the authority names. Never
    /// [`HostKind::None`]: an authority always has a host, even if empty.
    #[inline(always)]
    pub fn host_kind(&self) -> HostKind {
        self.host_kind
    }

    /// The host, still encoded, brackets included for IP literals.
    #[inline]
    pub fn encoded_host(&self) -> &'a EncodedStr {
        EncodedStr::assume(self.host)
    }

    /// The host, decoded.
    #[inline]
    pub fn host(&self) -> Cow<'a, str> {
        decode(self.host)
    }

    /// The host's IP address, when the host is an address.
    pub fn host_address(&self) -> Option<IpAddr> {
        match self.host_kind {
            HostKind::Ipv4 => self.host_ipv4_address().map(IpAddr::V4),
            HostKind::Ipv6 => self.host_ipv6_address().map(IpAddr::V6),
            _ => None,
        }
    }

    /// The host's IPv4 address, when it is one.
    pub fn host_ipv4_address(&self) -> Option<Ipv4Addr> {
        match self.host_kind {
            HostKind::Ipv4 => {
                let [a, b, c, d] = [self.ip[0], self.ip[1], self.ip[2], self.ip[3]];
                Some(Ipv4Addr::new(a, b, c, d))
            }
            _ => None,
        }
    }

    /// The host's IPv6 address, when it is one.
    pub fn host_ipv6_address(&self) -> Option<Ipv6Addr> {
        match self.host_kind {
            HostKind::Ipv6 => Some(Ipv6Addr::from(self.ip)),
            _ => None,
        }
    }

    /// Whether a `:` followed the host, even with no digits after it.
    #[inline(always)]
    pub fn has_port(&self) -> bool {
        self.port.is_some()
    }

    /// The port digits as written, possibly empty, if a port is present.
    #[inline(always)]
    pub fn port(&self) -> Option<&'a str> {
        self.port
    }

    /// The port's numeric value, or `0` when the port is absent or empty.
    #[inline(always)]
    pub fn port_number(&self) -> u16 {
        self.port_number
    }
}

fn decode(s: &str) -> Cow<'_, str> {
    EncodedStr::assume(s).decode_lossy()
}

impl fmt::Display for AuthorityRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source)
    }
}
