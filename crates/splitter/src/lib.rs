//! Reply-chain splitting for the maildedup pipeline.
//!
//! A "part" is one email in a reply chain, with index 0 being the most
//! recent. [`split`] locates the stable reply boundary — a
//! `From:`/`To:`/optional `CC:`/`Subject:` header block — and breaks the raw
//! message at each occurrence. The legacy `-----Original Message-----`
//! divider seen in some historical archives is a different, non-equivalent
//! splitter variant and is intentionally not implemented here.

use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"From: [^\n]*\nTo: [^\n]*\n(?:CC: [^\n]*\n)?Subject: ")
        .expect("header block pattern is valid")
});

/// Split `raw` into ordered reply parts, most recent first.
///
/// For a message with no recognizable headers, the result is a single part
/// equal to the whole content. Trailing parts that are pure whitespace are
/// discarded.
pub fn split(raw: &str) -> Vec<String> {
    let starts: Vec<usize> = HEADER_BLOCK.find_iter(raw).map(|m| m.start()).collect();

    if starts.is_empty() {
        return vec![raw.to_string()];
    }

    let mut parts = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(raw.len());
        parts.push(raw[start..end].to_string());
    }

    // Any preamble before the first header block belongs to the first
    // (most recent) part rather than being dropped.
    if starts[0] > 0 {
        let mut first = raw[0..starts[0]].to_string();
        first.push_str(&parts[0]);
        parts[0] = first;
    }

    while parts.last().is_some_and(|p| p.trim().is_empty()) {
        parts.pop();
    }

    if parts.is_empty() {
        parts.push(String::new());
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_email_with_no_reply_headers_is_one_part() {
        let raw = "From: a@x\nTo: b@x\nSubject: hi\nhello";
        let parts = split(raw);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0], raw);
    }

    #[test]
    fn two_part_reply_chain_splits_on_header_block() {
        let root = "From: a@x\nTo: b@x\nSubject: s\nhello root";
        let raw = format!("From: c@x\nTo: a@x\nSubject: re: s\nhi reply\n{root}");
        let parts = split(&raw);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1], root);
        assert!(parts[0].starts_with("From: c@x"));
    }

    #[test]
    fn cc_header_is_optional_and_does_not_create_extra_part() {
        let raw = "From: a@x\nTo: b@x\nCC: c@x\nSubject: s\nbody";
        let parts = split(raw);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0], raw);
    }

    #[test]
    fn three_part_chain_preserves_order_and_most_recent_first() {
        let p2 = "From: a@x\nTo: b@x\nSubject: s\noldest";
        let p1 = format!("From: b@x\nTo: a@x\nSubject: re: s\nmiddle\n{p2}");
        let p0 = format!("From: a@x\nTo: b@x\nSubject: re: re: s\nnewest\n{p1}");
        let parts = split(&p0);
        assert_eq!(parts.len(), 3);
        assert!(parts[0].starts_with("From: a@x\nTo: b@x\nSubject: re: re: s"));
        assert_eq!(parts[2], p2);
    }

    #[test]
    fn trailing_whitespace_only_part_is_discarded() {
        let raw = "From: a@x\nTo: b@x\nSubject: s\nbody\n   \n\t";
        let parts = split(raw);
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn legacy_divider_is_not_a_boundary() {
        let raw = "hello\n-----Original Message-----\nworld";
        let parts = split(raw);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0], raw);
    }

    #[test]
    fn length_equals_one_plus_non_leading_boundaries() {
        let root = "From: a@x\nTo: b@x\nSubject: s\nbody0";
        let raw = format!("From: c@x\nTo: a@x\nSubject: re: s\nbody1\n{root}");
        let parts = split(&raw);
        // one leading occurrence + one non-leading occurrence == 2 parts
        assert_eq!(parts.len(), 2);
    }
}
