use crate::pct;
use crate::rfc::PCHARS;
use crate::url::segments::validate_segment;
use crate::{EncodedStr, Error, ErrorKind, Result};

/// How many request segments a field may match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Modifier {
    /// Exactly one segment.
    None,
    /// Zero or one segment (`{name?}`).
    Optional,
    /// One or more segments (`{name+}`).
    Plus,
    /// Zero or more segments (`{name*}`).
    Star,
}

/// One segment of a route template: literal text or a replacement field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TemplateSegment {
    /// Matches a request segment that decodes to exactly this text.
    Literal(String),
    /// Captures one or more request segments under `name`.
    Field { name: String, modifier: Modifier },
}

impl TemplateSegment {
    /// Parses one raw template segment.
    ///
    /// `{name}`-style fields take an optional trailing `?`, `+`, or `*`
    /// modifier and may be anonymous (`{}`). Anything else must be a
    /// valid, possibly percent-encoded, path segment and matches
    /// percent-insensitively.
    pub fn parse(raw: &str) -> Result<TemplateSegment> {
        if let Some(inner) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
            let (name, modifier) = match inner.as_bytes().last() {
                Some(b'?') => (&inner[..inner.len() - 1], Modifier::Optional),
                Some(b'+') => (&inner[..inner.len() - 1], Modifier::Plus),
                Some(b'*') => (&inner[..inner.len() - 1], Modifier::Star),
                _ => (inner, Modifier::None),
            };

            if PCHARS.find_if_not(name.as_bytes()) != name.len() {
                return Err(Error::new(ErrorKind::Syntax));
            }

            return Ok(TemplateSegment::Field { name: name.to_string(), modifier });
        }

        validate_segment(raw)?;
        let decoded = EncodedStr::assume(raw).decode_lossy().into_owned();
        Ok(TemplateSegment::Literal(decoded))
    }

    /// Whether this segment can match the raw request segment `segment`.
    pub fn matches(&self, segment: &str) -> bool {
        match self {
            TemplateSegment::Literal(text) => pct::key_equal(segment, text),
            TemplateSegment::Field { .. } => true,
        }
    }

    #[inline(always)]
    pub fn is_literal(&self) -> bool {
        matches!(self, TemplateSegment::Literal(_))
    }

    pub fn modifier(&self) -> Modifier {
        match self {
            TemplateSegment::Literal(_) => Modifier::None,
            TemplateSegment::Field { modifier, .. } => *modifier,
        }
    }

    /// The capture name; empty for literals and anonymous fields.
    pub fn name(&self) -> &str {
        match self {
            TemplateSegment::Literal(_) => "",
            TemplateSegment::Field { name, .. } => name,
        }
    }

    /// Whether this segment may match zero request segments.
    pub fn zero_matchable(&self) -> bool {
        matches!(self.modifier(), Modifier::Optional | Modifier::Star)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, modifier: Modifier) -> TemplateSegment {
        TemplateSegment::Field { name: name.to_string(), modifier }
    }

    #[test]
    fn parsing() {
        assert_eq!(TemplateSegment::parse("user").unwrap(),
            TemplateSegment::Literal("user".into()));
        assert_eq!(TemplateSegment::parse("%75ser").unwrap(),
            TemplateSegment::Literal("user".into()));
        assert_eq!(TemplateSegment::parse("").unwrap(),
            TemplateSegment::Literal("".into()));

        assert_eq!(TemplateSegment::parse("{name}").unwrap(), field("name", Modifier::None));
        assert_eq!(TemplateSegment::parse("{name?}").unwrap(), field("name", Modifier::Optional));
        assert_eq!(TemplateSegment::parse("{name+}").unwrap(), field("name", Modifier::Plus));
        assert_eq!(TemplateSegment::parse("{name*}").unwrap(), field("name", Modifier::Star));
        assert_eq!(TemplateSegment::parse("{}").unwrap(), field("", Modifier::None));
        assert_eq!(TemplateSegment::parse("{*}").unwrap(), field("", Modifier::Star));

        assert!(TemplateSegment::parse("{a b}").is_err());
        assert!(TemplateSegment::parse("a b").is_err());
        assert!(TemplateSegment::parse("%zz").is_err());
    }

    #[test]
    fn matching() {
        let user = TemplateSegment::parse("user").unwrap();
        assert!(user.matches("user"));
        assert!(user.matches("%75ser"));
        assert!(!user.matches("users"));
        assert!(!user.matches(""));

        let any = TemplateSegment::parse("{x}").unwrap();
        assert!(any.matches("anything"));
        assert!(any.matches(""));
    }
}
