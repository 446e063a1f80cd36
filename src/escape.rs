//! Reserved-character escaping for the CQ-code wire format.
//!
//! Four characters have structural meaning in the markup: `&` introduces
//! an escape sequence, `[` and `]` delimit tokens, and `,` separates
//! token parameters. [`escape`] and [`unescape`] convert between raw text
//! and markup-safe text:
//!
//! | raw | escaped |
//! |-----|---------|
//! | `&` | `&amp;` |
//! | `[` | `&#91;` |
//! | `]` | `&#93;` |
//! | `,` | `&#44;` (only when comma-escaping is enabled) |
//!
//! Comma-escaping is applied to token parameter values, where commas act
//! as a delimiter, but not to plain-text content.

use std::borrow::Cow;

use memchr::{memchr, memchr3};

/// Escape sequences in unescape priority order. `&amp;` must come last so
/// that a literal ampersand never shadows a longer sequence.
const SEQUENCES: [(&str, char); 4] = [
    ("&#44;", ','),
    ("&#91;", '['),
    ("&#93;", ']'),
    ("&amp;", '&'),
];

/// Replace the reserved characters of the CQ-code format with their
/// escape sequences.
///
/// Total over all strings; never fails. Borrows the input when nothing
/// needs escaping. Note that escaping is not injective-safe against
/// pre-escaped input: `escape("&amp;", true)` yields `"&amp;amp;"`, so
/// the round-trip law `unescape(escape(s, true)) == s` only holds for
/// strings free of pre-existing escape sequences.
///
/// # Examples
///
/// ```
/// use cqcode::escape;
///
/// assert_eq!(escape("a[b]c", true), "a&#91;b&#93;c");
/// assert_eq!(escape("a,b", true), "a&#44;b");
/// assert_eq!(escape("a,b", false), "a,b");
/// ```
pub fn escape(s: &str, escape_comma: bool) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    let reserved = memchr3(b'&', b'[', b']', bytes).is_some()
        || (escape_comma && memchr(b',', bytes).is_some());
    if !reserved {
        return Cow::Borrowed(s);
    }

    // Each substitution expands one byte to five; reserve a little slack.
    let mut out = String::with_capacity(s.len() + 16);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '[' => out.push_str("&#91;"),
            ']' => out.push_str("&#93;"),
            ',' if escape_comma => out.push_str("&#44;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Replace escape sequences with the reserved characters they encode.
///
/// The inverse of [`escape`]. Unrecognized ampersands pass through
/// unchanged. Borrows the input when it contains no ampersand at all.
///
/// # Examples
///
/// ```
/// use cqcode::unescape;
///
/// assert_eq!(unescape("a&#91;b&#93;c"), "a[b]c");
/// assert_eq!(unescape("&amp;#91;"), "&#91;");
/// assert_eq!(unescape("no escapes"), "no escapes");
/// ```
pub fn unescape(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    let Some(first) = memchr(b'&', bytes) else {
        return Cow::Borrowed(s);
    };

    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..first]);
    let mut i = first;
    while i < bytes.len() {
        if bytes[i] == b'&'
            && let Some((seq, ch)) = SEQUENCES.iter().find(|(seq, _)| s[i..].starts_with(seq))
        {
            out.push(*ch);
            i += seq.len();
        } else {
            // Copy verbatim up to the next candidate ampersand.
            let next = memchr(b'&', &bytes[i + 1..]).map_or(bytes.len(), |n| i + 1 + n);
            out.push_str(&s[i..next]);
            i = next;
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_escape_all_reserved() {
        assert_eq!(escape("&[],", true), "&amp;&#91;&#93;&#44;");
    }

    #[test]
    fn test_escape_comma_flag() {
        assert_eq!(escape("a,b", false), "a,b");
        assert_eq!(escape("a,b", true), "a&#44;b");
        // The other three are escaped regardless of the flag.
        assert_eq!(escape("&[,]", false), "&amp;&#91;,&#93;");
    }

    #[test]
    fn test_escape_ampersand_not_double_escaped() {
        // Introduced ampersands must not be escaped again.
        assert_eq!(escape("[", true), "&#91;");
        assert_eq!(escape("&[", true), "&amp;&#91;");
    }

    #[test]
    fn test_escape_borrows_when_clean() {
        assert!(matches!(escape("plain text", true), Cow::Borrowed(_)));
        assert!(matches!(escape("a,b", false), Cow::Borrowed(_)));
        assert!(matches!(escape("a,b", true), Cow::Owned(_)));
    }

    #[test]
    fn test_unescape_priority_order() {
        assert_eq!(unescape("&#44;&#91;&#93;&amp;"), ",[]&");
        // "&amp;" is unescaped last: its expansion never re-matches.
        assert_eq!(unescape("&amp;#91;"), "&#91;");
    }

    #[test]
    fn test_unescape_passes_through_unknown_sequences() {
        assert_eq!(unescape("&"), "&");
        assert_eq!(unescape("&#4;"), "&#4;");
        assert_eq!(unescape("fish & chips"), "fish & chips");
    }

    #[test]
    fn test_unescape_borrows_without_ampersand() {
        assert!(matches!(unescape("no entities"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_pre_escaped_input_is_not_round_trip_safe() {
        // Documented limitation, not a bug.
        let s = "&amp;";
        assert_eq!(escape(s, true), "&amp;amp;");
        assert_eq!(unescape(&escape(s, true)), "&amp;");
    }

    fn has_escape_sequence(s: &str) -> bool {
        SEQUENCES.iter().any(|(seq, _)| s.contains(seq))
    }

    proptest! {
        #[test]
        fn prop_unescape_inverts_escape(s in ".*") {
            prop_assume!(!has_escape_sequence(&s));
            let escaped = escape(&s, true);
            let unescaped = unescape(&escaped);
            prop_assert_eq!(unescaped.as_ref(), s.as_str());
        }

        #[test]
        fn prop_escaped_output_has_no_reserved_chars(s in ".*") {
            let escaped = escape(&s, true);
            prop_assert!(!escaped.contains('['));
            prop_assert!(!escaped.contains(']'));
            prop_assert!(!escaped.contains(','));
        }

        #[test]
        fn prop_escape_without_comma_keeps_commas(s in ".*") {
            let escaped = escape(&s, false);
            prop_assert_eq!(
                escaped.matches(',').count(),
                s.matches(',').count()
            );
        }
    }
}
