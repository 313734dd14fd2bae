//! The lenient memory-file format: optional YAML frontmatter delimited by
//! `---` lines, followed by a markdown body. Never throws — a file that
//! merely *looks* like it might have frontmatter but doesn't parse cleanly
//! is demoted to plain body text with a warning, per §3.2.

use std::collections::BTreeMap;

const DELIMITER: &str = "---";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryFile {
    /// Ordered so serialization is deterministic; frontmatter is small and
    /// insertion order rarely matters to a reader, but determinism makes the
    /// round-trip law in §8 easy to assert on in tests.
    pub frontmatter: BTreeMap<String, String>,
    pub body: String,
}

impl MemoryFile {
    pub fn body_only(body: impl Into<String>) -> Self {
        Self {
            frontmatter: BTreeMap::new(),
            body: body.into(),
        }
    }
}

/// Parse a memory file's raw text. Three outcomes, all infallible:
/// - no leading `---` line → whole text is body.
/// - leading `---`, a closing `---`, and the lines between look like
///   `key: value` → real frontmatter.
/// - leading `---` but either no closing delimiter, or the interior doesn't
///   look like key/value pairs → demoted to plain body (with the original
///   text, delimiters included), logged at `warn!`.
pub fn parse_memory_file(raw: &str) -> MemoryFile {
    let mut lines = raw.lines();
    let Some(first) = lines.next() else {
        return MemoryFile::body_only(String::new());
    };
    if first.trim_end() != DELIMITER {
        return MemoryFile::body_only(raw.to_string());
    }

    let rest: Vec<&str> = lines.collect();
    let Some(close_idx) = rest.iter().position(|line| line.trim_end() == DELIMITER) else {
        tracing::warn!("memory file has a leading '---' but no closing delimiter; treating as plain body");
        return MemoryFile::body_only(raw.to_string());
    };

    let interior = &rest[..close_idx];
    if !looks_like_key_values(interior) {
        tracing::warn!("memory file frontmatter block doesn't look like key: value pairs; treating as plain body");
        return MemoryFile::body_only(raw.to_string());
    }

    let frontmatter = parse_key_values(interior);
    let body_lines = &rest[close_idx + 1..];
    let mut body = body_lines.join("\n");
    // A leading blank line right after the closing delimiter is conventional
    // formatting, not content; strip exactly one.
    if let Some(stripped) = body.strip_prefix('\n') {
        body = stripped.to_string();
    }

    MemoryFile { frontmatter, body }
}

/// A block "looks like" key/value frontmatter when at least half of its
/// non-blank lines contain a colon-separated key. Empty interiors (a bare
/// `---\n---`) count as frontmatter too — that's a deliberate, if empty,
/// frontmatter block rather than a markdown horizontal rule.
fn looks_like_key_values(lines: &[&str]) -> bool {
    let non_blank: Vec<&&str> = lines.iter().filter(|l| !l.trim().is_empty()).collect();
    if non_blank.is_empty() {
        return true;
    }
    let key_value_count = non_blank
        .iter()
        .filter(|line| is_key_value_line(line))
        .count();
    key_value_count * 2 >= non_blank.len()
}

fn is_key_value_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    // List continuation lines (`  - item`) belong to a key: value block too.
    if trimmed.starts_with('-') {
        return true;
    }
    match trimmed.split_once(':') {
        Some((key, _)) => !key.trim().is_empty() && !key.trim().contains(' '),
        None => false,
    }
}

fn parse_key_values(lines: &[&str]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('-') {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    map
}

/// Inverse of `parse_memory_file`. When `frontmatter` is empty, emits the
/// body unmodified (so a body-only file round-trips byte-for-byte).
pub fn serialize_memory_file(file: &MemoryFile) -> String {
    if file.frontmatter.is_empty() {
        return file.body.clone();
    }

    let mut out = String::new();
    out.push_str(DELIMITER);
    out.push('\n');
    for (key, value) in &file.frontmatter {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&file.body);
    out
}

/// Strip frontmatter from raw text, returning just the body. Used by the
/// memory context assembler, which never needs the frontmatter map itself.
pub fn strip_frontmatter(raw: &str) -> String {
    parse_memory_file(raw).body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_body_without_frontmatter() {
        let parsed = parse_memory_file("just some text\nwith no frontmatter");
        assert!(parsed.frontmatter.is_empty());
        assert_eq!(parsed.body, "just some text\nwith no frontmatter");
    }

    #[test]
    fn valid_frontmatter_parses() {
        let raw = "---\ncreated: 2026-01-01\ntype: fact\n---\nThe sky is blue.";
        let parsed = parse_memory_file(raw);
        assert_eq!(parsed.frontmatter.get("created").unwrap(), "2026-01-01");
        assert_eq!(parsed.frontmatter.get("type").unwrap(), "fact");
        assert_eq!(parsed.body, "The sky is blue.");
    }

    #[test]
    fn unclosed_delimiter_falls_back_to_body() {
        let raw = "---\ncreated: 2026-01-01\nno closing delimiter here";
        let parsed = parse_memory_file(raw);
        assert!(parsed.frontmatter.is_empty());
        assert_eq!(parsed.body, raw);
    }

    #[test]
    fn horizontal_rule_is_not_mistaken_for_frontmatter() {
        let raw = "---\nThis is just a paragraph that happens to follow a horizontal rule.\n---\nMore text.";
        let parsed = parse_memory_file(raw);
        assert!(parsed.frontmatter.is_empty());
        assert_eq!(parsed.body, raw);
    }

    #[test]
    fn round_trip_preserves_frontmatter_and_body() {
        let raw = "---\ncreated: 2026-01-01\ntype: fact\n---\nThe sky is blue.";
        let parsed = parse_memory_file(raw);
        let rendered = serialize_memory_file(&parsed);
        assert_eq!(rendered, raw);
    }

    #[test]
    fn round_trip_preserves_body_only_file() {
        let raw = "no frontmatter here at all";
        let parsed = parse_memory_file(raw);
        let rendered = serialize_memory_file(&parsed);
        assert_eq!(rendered, raw);
    }

    #[test]
    fn strip_frontmatter_returns_body() {
        let raw = "---\ncreated: 2026-01-01\n---\nbody text";
        assert_eq!(strip_frontmatter(raw), "body text");
    }
}
