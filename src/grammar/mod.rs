//! Character sets and composable parsing rules.
//!
//! This module provides the toolkit the RFC 3986 productions in [`rfc`] are
//! written with: [`CharSet`] membership tables with compile-time algebra,
//! a [`Cursor`] over parser input, the [`Rule`] protocol, and combinators
//! for sequences, alternatives, options, and repetitions.
//!
//! [`rfc`]: crate::rfc

mod charset;
mod cursor;
mod range;
mod rule;

pub use charset::{hexdig_value, CharSet, ALNUM, ALPHA, DIGIT, HEXDIG};
pub use cursor::{Cursor, Mark};
pub use range::{range, range2, Range, Range2Rule, RangeIter, RangeRule};
pub use rule::{
    alt, delim, delim_in, optional, squelch, token, Alt, Delim, DelimIn,
    Optional, Rule, Squelch, Token,
};
