//! Image name classification.
//!
//! The name an image is configured with selects its backing:
//!
//! - `RAW:<begin>:<end>` maps sectors `begin` to `end` (inclusive) of the card.
//! - `ROM:` (anything may follow) selects the ROM drive.
//! - Anything else is a path on the card's filesystem.
//!
//! Prefixes are case-insensitive. Sector numbers may be decimal, hexadecimal (`0x` prefix) or
//! octal (leading `0`).

use super::Error;
use crate::disk::Sector;

/// A classified image name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Name<'a> {
    /// A raw sector range of the card.
    Raw {
        /// The first sector.
        begin: Sector,
        /// The last sector.
        end: Sector,
    },
    /// The ROM drive.
    Rom,
    /// A file path.
    File(&'a str),
}

/// Classify an image name.
///
/// This fails only on malformed raw names.
pub fn classify(name: &str) -> Result<Name, Error> {
    if let Some(range) = strip_prefix(name, "RAW:") {
        let invalid = || Error::InvalidName {
            name: name.to_owned(),
        };

        // Both numbers must be present, with nothing trailing.
        let mut parts = range.splitn(2, ':');
        let begin = parts.next().and_then(parse_sector).ok_or_else(invalid)?;
        let end = parts.next().and_then(parse_sector).ok_or_else(invalid)?;

        Ok(Name::Raw {
            begin: begin,
            end: end,
        })
    } else if strip_prefix(name, "ROM:").is_some() {
        Ok(Name::Rom)
    } else {
        Ok(Name::File(name))
    }
}

/// Strip a case-insensitive ASCII prefix.
fn strip_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    match name.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => Some(&name[prefix.len()..]),
        _ => None,
    }
}

/// Parse a sector number.
///
/// Leading whitespace and a `+` sign are skipped. Numbers too large for a sector saturate, so
/// that overlong ranges get clamped to the card rather than rejected.
fn parse_sector(s: &str) -> Option<Sector> {
    let s = s.trim_start();
    let s = if s.starts_with('+') { &s[1..] } else { s };

    let (digits, radix) = if s.starts_with("0x") || s.starts_with("0X") {
        (&s[2..], 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };

    if digits.is_empty() {
        return None;
    }

    digits.chars().try_fold(0 as Sector, |acc, c| {
        c.to_digit(radix).map(|digit| acc.saturating_mul(radix).saturating_add(digit))
    })
}
