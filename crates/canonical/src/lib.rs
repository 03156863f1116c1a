//! Deterministic text normalization for the maildedup fingerprinting pipeline.
//!
//! [`normalize`] is the single entry point. It is a pure function: no I/O, no
//! configuration, no failure modes. The same normalization is applied to both
//! whole-thread content and any derived reply-chain suffix before either is
//! fingerprinted, so that near-duplicate detection is insensitive to case,
//! whitespace, and HTML markup differences alone.

/// Canonicalize raw email text.
///
/// Steps, in order:
/// 1. Lowercase all code points.
/// 2. Trim leading/trailing whitespace.
/// 3. Replace CR-LF and bare CR with LF.
/// 4. Remove HTML-like tags: any maximal run matching `<` followed by one or
///    more non-`>` characters followed by `>`. A bare `<>` has no characters
///    between the brackets and is left untouched.
/// 5. Collapse any run of whitespace (ASCII whitespace plus LF) into a
///    single space.
///
/// `normalize(normalize(x)) == normalize(x)` for all `x`.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let trimmed = lowered.trim();
    let unified = unify_line_endings(trimmed);
    let stripped = strip_html_tags(&unified);
    collapse_whitespace(&stripped)
}

fn unify_line_endings(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}

/// Strip any maximal run of `<` + one-or-more non-`>` characters + `>`,
/// matching the regex `<[^>]+>`. A bare `<>` (zero characters between the
/// brackets) does not match and is copied through verbatim, and a `<` with
/// no matching `>` before the end of input is left untouched too.
fn strip_html_tags(s: &str) -> String {
    let bytes: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == '<' {
            match bytes[i..].iter().position(|&c| c == '>') {
                // `close` is the offset of `>` from `<` itself within the
                // slice, so `close == 1` means they are adjacent (`<>`,
                // zero chars between) and is not a tag match.
                Some(close) if close >= 2 => {
                    i += close + 1;
                    continue;
                }
                Some(_) => {}
                None => {
                    // Unterminated tag: not a match, copy the rest verbatim.
                    out.extend(&bytes[i..]);
                    break;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_collapses_whitespace() {
        let out = normalize("  Hello   WORLD\n\nagain  ");
        assert_eq!(out, "hello world again");
    }

    #[test]
    fn unifies_crlf_and_bare_cr() {
        let out = normalize("line one\r\nline two\rline three");
        assert_eq!(out, "line one line two line three");
    }

    #[test]
    fn strips_html_tags() {
        let out = normalize("hello <b>world</b><br/>again");
        assert_eq!(out, "hello worldagain");
    }

    #[test]
    fn leaves_unterminated_tag_untouched() {
        let out = normalize("hello <broken world");
        assert_eq!(out, "hello <broken world");
    }

    #[test]
    fn leaves_bare_empty_angle_brackets_untouched() {
        let out = normalize("a<>b");
        assert_eq!(out, "a<>b");
    }

    #[test]
    fn idempotent_on_already_normalized_text() {
        let once = normalize("  Mixed CASE <i>text</i>\r\nwith   spaces  ");
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn idempotent_property_holds_broadly() {
        let samples = [
            "",
            "   ",
            "<<<>>>",
            "ALL CAPS\r\n\r\nWITH\tGAPS",
            "plain ascii text",
            "<div><p>nested <span>tags</span></p></div>  done",
        ];
        for s in samples {
            let once = normalize(s);
            let twice = normalize(&once);
            assert_eq!(once, twice, "not idempotent for input {s:?}");
        }
    }

    #[test]
    fn empty_and_whitespace_only_input_normalizes_to_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\t  "), "");
    }
}
