//! TEXT value escaping (RFC 5545 §3.3.11).

/// Escapes backslash, comma, semicolon, and newline for the text encoding.
#[must_use]
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverses [`escape_text`]. Invalid escape sequences are preserved as-is,
/// backslash included, so hostile input survives a round-trip; a trailing
/// lone backslash is also kept.
#[must_use]
pub fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(escaped @ ('\\' | ',' | ';')) => out.push(escaped),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Splits on an unescaped delimiter, keeping escape sequences intact inside
/// each piece.
#[must_use]
pub fn split_unescaped(s: &str, delimiter: char) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            current.push(c);
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if c == delimiter {
            pieces.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    pieces.push(current);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_specials() {
        assert_eq!(escape_text("a,b;c\\d\ne"), "a\\,b\\;c\\\\d\\ne");
    }

    #[test]
    fn unescape_reverses_escape() {
        let original = "a,b;c\\d\ne";
        assert_eq!(unescape_text(&escape_text(original)), original);
    }

    #[test]
    fn unescape_preserves_invalid_sequences() {
        assert_eq!(unescape_text("a\\xb"), "a\\xb");
        assert_eq!(unescape_text("trailing\\"), "trailing\\");
        // the backslash survives a full round-trip
        assert_eq!(
            unescape_text(&escape_text(&unescape_text("a\\xb"))),
            "a\\xb"
        );
    }

    #[test]
    fn split_respects_escaped_delimiters() {
        assert_eq!(
            split_unescaped("a\\,b,c", ','),
            vec!["a\\,b".to_string(), "c".to_string()]
        );
        assert_eq!(
            split_unescaped("one;two\\;half;three", ';'),
            vec![
                "one".to_string(),
                "two\\;half".to_string(),
                "three".to_string()
            ]
        );
    }
}
