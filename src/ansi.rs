//! Removal of in-band terminal escape codes
//!
//! MUCK servers colour their output with ANSI escapes. Scripts usually want
//! the bare text, so connections can strip these before handing lines out.

use regex::bytes::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// CSI (`ESC [ ... final`), OSC (`ESC ] ... BEL` or `ESC ] ... ESC \`),
/// charset designations (`ESC ( B`) and other two-byte escapes
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?-u)\x1b(?:\[[0-?]*[ -/]*[@-~]|\][^\x07\x1b]*(?:\x07|\x1b\\)|[()*+][ -~]|[0-Z\\^-~])",
    )
    .unwrap_or_else(|e| panic!("invalid ANSI escape pattern: {e}"))
});

/// Strip escape sequences from raw bytes, borrowing when there are none
pub fn strip_ansi(input: &[u8]) -> Cow<'_, [u8]> {
    ANSI_ESCAPE.replace_all(input, &b""[..])
}

pub fn strip_ansi_str(input: &str) -> Cow<'_, str> {
    match strip_ansi(input.as_bytes()) {
        Cow::Borrowed(_) => Cow::Borrowed(input),
        // Only ASCII sequences were removed, so this stays valid UTF-8
        Cow::Owned(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

pub fn contains_ansi(input: &[u8]) -> bool {
    ANSI_ESCAPE.is_match(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_sgr_colours() {
        let coloured = b"\x1b[1;31mDanger\x1b[0m zone";
        assert!(contains_ansi(coloured));
        assert_eq!(strip_ansi(coloured).as_ref(), b"Danger zone");
    }

    #[test]
    fn test_strips_cursor_and_erase_sequences() {
        assert_eq!(strip_ansi(b"\x1b[2J\x1b[HTop\x1b[K").as_ref(), b"Top");
        assert_eq!(strip_ansi(b"\x1b[?25lhidden cursor").as_ref(), b"hidden cursor");
    }

    #[test]
    fn test_strips_osc_and_short_escapes() {
        assert_eq!(strip_ansi(b"\x1b]0;Title\x07body").as_ref(), b"body");
        assert_eq!(strip_ansi(b"\x1b]2;Title\x1b\\body").as_ref(), b"body");
        assert_eq!(strip_ansi(b"\x1b(Bplain\x1b7\x1b8").as_ref(), b"plain");
    }

    #[test]
    fn test_plain_text_is_borrowed() {
        let text = "No codes here";
        assert!(matches!(strip_ansi_str(text), Cow::Borrowed(_)));
        assert!(!contains_ansi(text.as_bytes()));
    }

    #[test]
    fn test_utf8_survives() {
        assert_eq!(strip_ansi_str("\x1b[32mcafé ☕\x1b[0m"), "café ☕");
    }
}
