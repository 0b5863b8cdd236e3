//! Whitespace and control-character normalization for extracted text.

/// Normalize raw page text.
///
/// Control characters are dropped, every whitespace run (including line breaks and
/// non-breaking spaces) becomes a single space, and the result is trimmed. A whitespace run
/// always survives as one space, so adjacent words are never glued together.
pub fn normalize_page_text(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    let mut pending_space = false;

    for ch in raw.chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if ch.is_control() {
            continue;
        }
        if pending_space && !normalized.is_empty() {
            normalized.push(' ');
        }
        pending_space = false;
        normalized.push(ch);
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_runs_and_trims() {
        assert_eq!(
            normalize_page_text("  Hello \n\n\t World\r\n"),
            "Hello World"
        );
        assert_eq!(normalize_page_text("a\u{00A0}\u{00A0}b"), "a b");
    }

    #[test]
    fn strips_control_characters_without_joining_words() {
        assert_eq!(normalize_page_text("Hel\u{0000}lo\u{0007}"), "Hello");
        assert_eq!(normalize_page_text("one\u{0001} \u{001F}two"), "one two");
    }

    #[test]
    fn whitespace_only_input_is_empty() {
        assert_eq!(normalize_page_text(" \n\t "), "");
        assert_eq!(normalize_page_text(""), "");
    }

    #[test]
    fn normalization_is_stable() {
        let once = normalize_page_text("  ಕನ್ನಡ   text\n\u{0002}here ");
        assert_eq!(once, "ಕನ್ನಡ text here");
        assert_eq!(normalize_page_text(&once), once);
    }
}
