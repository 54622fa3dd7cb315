/// Field limits for ship submissions. These are structural bounds, enforced
/// before any network call is made.
pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_CHANGELOG_ENTRY_CHARS: usize = 500;
pub const MAX_CHANGELOG_ENTRIES: usize = 20;
pub const MAX_ARTIFACTS: usize = 10;
pub const MAX_ARTIFACT_VALUE_CHARS: usize = 2000;

/// Strip anything that looks like markup: `<...>` runs are dropped entirely,
/// including unterminated ones. This is cosmetic cleanup for display text,
/// not an HTML parser.
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Sanitize a free-text field: strip markup, drop control characters,
/// normalize whitespace, clamp to `max_chars`.
///
/// With `preserve_newlines`, line breaks survive (multi-line fields like the
/// description); runs of spaces/tabs still collapse per line.
pub fn sanitize_text(input: &str, max_chars: usize, preserve_newlines: bool) -> String {
    let stripped = strip_tags(input);

    let cleaned: String = if preserve_newlines {
        stripped
            .lines()
            .map(|line| collapse_spaces(line))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    } else {
        collapse_spaces(&stripped.replace(['\n', '\r'], " "))
    };

    // Char-precise clamp (not bytes) so multi-byte input never splits.
    cleaned.chars().take(max_chars).collect()
}

fn collapse_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last_space = true;
    for c in line.chars() {
        // Tab is a control character; treat it as a separator, not junk.
        if c == ' ' || c == '\t' {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else if c.is_control() {
            continue;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup() {
        assert_eq!(
            sanitize_text("hello <b>world</b>", 100, false),
            "hello world"
        );
        assert_eq!(
            sanitize_text("<script>alert(1)</script>after", 100, false),
            "alert(1)after"
        );
    }

    #[test]
    fn drops_unterminated_tag_tail() {
        assert_eq!(sanitize_text("ok <img src=x", 100, false), "ok");
    }

    #[test]
    fn clamps_by_chars_not_bytes() {
        let s = "é".repeat(300);
        let out = sanitize_text(&s, MAX_TITLE_CHARS, false);
        assert_eq!(out.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(sanitize_text("a   b\t\tc", 100, false), "a b c");
    }

    #[test]
    fn tab_separated_words_stay_separated() {
        // A tab in a signed title must collapse to a space, not vanish;
        // concatenating words would change the canonical title hash.
        assert_eq!(
            sanitize_text("Fix\tindexer\tbug", MAX_TITLE_CHARS, false),
            "Fix indexer bug"
        );
        assert_eq!(sanitize_text("a\tb", 100, true), "a b");
    }

    #[test]
    fn preserves_newlines_when_asked() {
        let out = sanitize_text("line one\nline  two", 100, true);
        assert_eq!(out, "line one\nline two");
        let flat = sanitize_text("line one\nline two", 100, false);
        assert_eq!(flat, "line one line two");
    }

    #[test]
    fn removes_control_characters() {
        assert_eq!(sanitize_text("a\u{0000}b\u{0007}c", 100, false), "abc");
    }

    #[test]
    fn plain_title_passes_through_unchanged() {
        // Signed titles must survive sanitization byte-for-byte when clean,
        // otherwise the recomputed canonical message would not match.
        let title = "Shipped the v2 indexer";
        assert_eq!(sanitize_text(title, MAX_TITLE_CHARS, false), title);
    }
}
