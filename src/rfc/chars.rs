//! The character sets of RFC 3986.
//!
//! Each set lists the bytes a URL part may contain *unescaped*; `%` is
//! never a member, since escapes are recognized structurally.

use crate::grammar::{CharSet, ALNUM, DIGIT};

/// `unreserved = ALPHA / DIGIT / "-" / "." / "_" / "~"`
pub const UNRESERVED: CharSet = ALNUM.union(CharSet::from_bytes(b"-._~"));

/// `gen-delims = ":" / "/" / "?" / "#" / "[" / "]" / "@"`
pub const GEN_DELIMS: CharSet = CharSet::from_bytes(b":/?#[]@");

/// `sub-delims = "!" / "$" / "&" / "'" / "(" / ")" / "*" / "+" / "," / ";" / "="`
pub const SUB_DELIMS: CharSet = CharSet::from_bytes(b"!$&'()*+,;=");

/// The characters of `reserved`.
pub const RESERVED: CharSet = GEN_DELIMS.union(SUB_DELIMS);

/// The characters allowed in a scheme after its leading letter.
pub const SCHEME_CHARS: CharSet = ALNUM.union(CharSet::from_bytes(b"+-."));

/// The characters of `userinfo`, excluding escapes.
pub const USERINFO_CHARS: CharSet = UNRESERVED.union(SUB_DELIMS).add(b':');

/// The characters of `reg-name`, excluding escapes.
pub const REG_NAME_CHARS: CharSet = UNRESERVED.union(SUB_DELIMS);

/// The characters of `IPvFuture` past the version tag.
pub const IPVFUTURE_CHARS: CharSet = UNRESERVED.union(SUB_DELIMS).add(b':');

/// The characters of `pchar`, excluding escapes.
pub const PCHARS: CharSet = UNRESERVED.union(SUB_DELIMS).add(b':').add(b'@');

/// `pchar` without `:`, as in the first segment of `path-noscheme`.
pub const SEGMENT_NZ_NC_CHARS: CharSet = PCHARS.remove(b':');

/// The characters of `query`, excluding escapes.
pub const QUERY_CHARS: CharSet = PCHARS.add(b'/').add(b'?');

/// The characters of `fragment`, excluding escapes.
pub const FRAGMENT_CHARS: CharSet = PCHARS.add(b'/').add(b'?');

/// The characters valid anywhere in a port.
pub const PORT_CHARS: CharSet = DIGIT;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composition() {
        assert!(UNRESERVED.contains(b'~') && !UNRESERVED.contains(b'%'));
        assert!(PCHARS.contains(b':') && PCHARS.contains(b'@'));
        assert!(!PCHARS.contains(b'/') && !PCHARS.contains(b'?'));
        assert!(!SEGMENT_NZ_NC_CHARS.contains(b':'));
        assert!(QUERY_CHARS.contains(b'/') && QUERY_CHARS.contains(b'?'));
        assert!(!QUERY_CHARS.contains(b'#'));
        assert!(!REG_NAME_CHARS.contains(b':'));

        // No set sneaks in the escape introducer or spaces.
        for set in [UNRESERVED, SCHEME_CHARS, USERINFO_CHARS, REG_NAME_CHARS,
                    PCHARS, QUERY_CHARS, FRAGMENT_CHARS, PORT_CHARS] {
            assert!(!set.contains(b'%'));
            assert!(!set.contains(b' '));
            assert!(!set.contains(b'#'));
        }
    }
}
