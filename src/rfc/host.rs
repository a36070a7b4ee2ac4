use crate::grammar::{hexdig_value, Cursor, Rule, DIGIT, HEXDIG};
use crate::rfc::chars::{IPVFUTURE_CHARS, REG_NAME_CHARS};
use crate::rfc::enc_token;
use crate::{Error, ErrorKind, Result};

/// The kind of host a URL names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    /// The URL has no authority, and so no host at all.
    None,
    /// A registered name: a DNS name, or anything else matching `reg-name`.
    /// An empty host is a (vacuous) registered name.
    Name,
    /// A textual IPv4 address such as `192.168.0.1`.
    Ipv4,
    /// A bracketed IPv6 address such as `[1::6:c0a8:1]`.
    Ipv6,
    /// A bracketed address of a future IP version, such as `[v7.x]`.
    IpvFuture,
}

impl Default for HostKind {
    #[inline(always)]
    fn default() -> HostKind {
        HostKind::None
    }
}

/// A parsed host: its kind, raw text, and address bytes when applicable.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawHost<'a> {
    pub kind: HostKind,
    /// The full host slice, brackets included for IP literals.
    pub text: &'a str,
    /// The first 4 bytes hold an IPv4 address; all 16 an IPv6 address.
    pub ip: [u8; 16],
}

/// `host = IP-literal / IPv4address / reg-name`
#[derive(Debug, Clone, Copy)]
pub(crate) struct HostRule;

impl<'a> Rule<'a> for HostRule {
    type Output = RawHost<'a>;

    fn parse(&self, cursor: &mut Cursor<'a>) -> Result<RawHost<'a>> {
        if cursor.peek() == Some(b'[') {
            return ip_literal(cursor);
        }

        let text = enc_token(REG_NAME_CHARS, 0).parse(cursor)?;
        let mut ip = [0; 16];
        if let Some(v4) = parse_ipv4(text) {
            ip[..4].copy_from_slice(&v4);
            return Ok(RawHost { kind: HostKind::Ipv4, text, ip });
        }

        Ok(RawHost { kind: HostKind::Name, text, ip })
    }
}

// `IP-literal = "[" ( IPv6address / IPvFuture ) "]"`; the cursor is at `[`.
fn ip_literal<'a>(cursor: &mut Cursor<'a>) -> Result<RawHost<'a>> {
    let start = cursor.mark();
    cursor.bump();

    let inner_start = cursor.pos();
    let inner_len = memchr::memchr(b']', cursor.rest())
        .ok_or(Error::at(ErrorKind::Syntax, inner_start))?;
    let inner = &cursor.input()[inner_start..inner_start + inner_len];

    let mut ip = [0; 16];
    let kind = if inner.starts_with('v') || inner.starts_with('V') {
        ipvfuture(inner).map_err(|e| Error::at(e.kind(), inner_start))?;
        HostKind::IpvFuture
    } else {
        ip = parse_ipv6(inner).map_err(|e| Error::at(e.kind(), inner_start))?;
        HostKind::Ipv6
    };

    cursor.advance(inner_len + 1);
    Ok(RawHost { kind, text: cursor.since(start), ip })
}

// `IPvFuture = "v" 1*HEXDIG "." 1*( unreserved / sub-delims / ":" )`
fn ipvfuture(s: &str) -> Result<()> {
    let mut cursor = Cursor::new(s);
    cursor.bump();

    let version = cursor.take_while(&HEXDIG);
    if version.is_empty() || !cursor.eat(b'.') {
        return Err(Error::new(ErrorKind::Syntax));
    }

    let tail = cursor.take_while(&IPVFUTURE_CHARS);
    if tail.is_empty() || !cursor.is_done() {
        return Err(Error::new(ErrorKind::Syntax));
    }

    Ok(())
}

/// Parses `s` as a complete `IPv4address`, if it is one.
///
/// Each `dec-octet` is `1*3DIGIT` valued 0 to 255, with no leading zero
/// except for `0` itself. Anything else, including trailing input, returns
/// `None` so the caller can fall back to `reg-name`.
pub(crate) fn parse_ipv4(s: &str) -> Option<[u8; 4]> {
    let mut out = [0u8; 4];
    let mut cursor = Cursor::new(s);
    for (i, octet) in out.iter_mut().enumerate() {
        if i > 0 && !cursor.eat(b'.') {
            return None;
        }

        let digits = cursor.take_while(&DIGIT);
        if digits.is_empty() || digits.len() > 3 {
            return None;
        }

        if digits.len() > 1 && digits.starts_with('0') {
            return None;
        }

        *octet = digits.parse().ok()?;
    }

    cursor.is_done().then(|| out)
}

/// Parses `s`, the text between brackets, as an `IPv6address`.
///
/// All nine forms of RFC 3986 §3.2.2 are accepted: eight 16-bit groups, a
/// single `::` standing for one or more zero groups, and an embedded
/// IPv4 tail in place of the final two groups.
pub(crate) fn parse_ipv6(s: &str) -> Result<[u8; 16]> {
    let bytes = s.as_bytes();
    let err = Error::new(ErrorKind::Syntax);

    let mut pieces = [0u16; 8];
    let mut n = 0;
    let mut compress = None;
    let mut i = 0;

    if bytes.first() == Some(&b':') {
        if bytes.get(1) != Some(&b':') {
            return Err(err);
        }

        compress = Some(0);
        i = 2;
    }

    while i < bytes.len() {
        if n == 8 {
            return Err(err);
        }

        // A group of up to four hex digits...
        let group_start = i;
        let mut value: u16 = 0;
        while i < bytes.len() && i - group_start < 4 {
            let digit = hexdig_value(bytes[i]);
            if digit < 0 {
                break;
            }

            value = (value << 4) | digit as u16;
            i += 1;
        }

        if i == group_start {
            return Err(err);
        }

        // ...or the start of an embedded IPv4 tail.
        if bytes.get(i) == Some(&b'.') {
            if n > 6 {
                return Err(err);
            }

            let v4 = parse_ipv4(&s[group_start..]).ok_or(err)?;
            pieces[n] = u16::from_be_bytes([v4[0], v4[1]]);
            pieces[n + 1] = u16::from_be_bytes([v4[2], v4[3]]);
            n += 2;
            i = bytes.len();
            break;
        }

        pieces[n] = value;
        n += 1;

        match bytes.get(i) {
            None => break,
            Some(&b':') => i += 1,
            Some(_) => return Err(err),
        }

        if bytes.get(i) == Some(&b':') {
            if compress.is_some() {
                return Err(err);
            }

            compress = Some(n);
            i += 1;
        } else if i == bytes.len() {
            // A single trailing colon.
            return Err(err);
        }
    }

    match compress {
        // The compressor stands for at least one zero group.
        Some(_) if n >= 8 => return Err(err),
        Some(at) => {
            let tail = n - at;
            for k in 0..tail {
                pieces[7 - k] = pieces[n - 1 - k];
            }

            for piece in pieces.iter_mut().skip(at).take(8 - n) {
                *piece = 0;
            }
        }
        None if n != 8 => return Err(err),
        None => {}
    }

    let mut out = [0u8; 16];
    for (i, piece) in pieces.iter().enumerate() {
        out[i * 2..i * 2 + 2].copy_from_slice(&piece.to_be_bytes());
    }

    Ok(out)
}
