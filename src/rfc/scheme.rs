use std::fmt;

use uncased::UncasedStr;

/// A URL scheme recognized by this crate.
///
/// Recognition is case-insensitive, so `HTTP` and `http` both map to
/// [`Scheme::Http`]. Anything else parses as [`Scheme::Unknown`]; an
/// unknown scheme is still perfectly valid, it just has no default port.
///
/// # Example
///
/// ```rust
/// use urlkit::Scheme;
///
/// assert_eq!(Scheme::recognize("WSS"), Scheme::Wss);
/// assert_eq!(Scheme::Https.default_port(), Some(443));
/// assert_eq!(Scheme::recognize("git").default_port(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Scheme {
    /// File Transfer Protocol.
    Ftp,
    /// Host-specific file names.
    File,
    /// Hypertext Transfer Protocol.
    Http,
    /// HTTP over TLS.
    Https,
    /// WebSocket.
    Ws,
    /// WebSocket over TLS.
    Wss,
    /// Any scheme not otherwise listed.
    Unknown,
}

impl Scheme {
    /// Recognizes `scheme`, case-insensitively.
    pub fn recognize(scheme: &str) -> Scheme {
        let scheme = UncasedStr::new(scheme);
        if scheme == "http" {
            Scheme::Http
        } else if scheme == "https" {
            Scheme::Https
        } else if scheme == "ws" {
            Scheme::Ws
        } else if scheme == "wss" {
            Scheme::Wss
        } else if scheme == "ftp" {
            Scheme::Ftp
        } else if scheme == "file" {
            Scheme::File
        } else {
            Scheme::Unknown
        }
    }

    /// The port a URL with this scheme uses when none is written.
    pub fn default_port(self) -> Option<u16> {
        match self {
            Scheme::Ftp => Some(21),
            Scheme::Http | Scheme::Ws => Some(80),
            Scheme::Https | Scheme::Wss => Some(443),
            Scheme::File | Scheme::Unknown => None,
        }
    }

    /// The canonical (lower-case) text of this scheme, if it has one.
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            Scheme::Ftp => Some("ftp"),
            Scheme::File => Some("file"),
            Scheme::Http => Some("http"),
            Scheme::Https => Some("https"),
            Scheme::Ws => Some("ws"),
            Scheme::Wss => Some("wss"),
            Scheme::Unknown => None,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("unknown"))
    }
}
