//! Shared "does this line count as real content" heuristic (§4.2's gather()
//! and the scheduler's evaluate_attention() both need it, so it lives here
//! rather than being duplicated in each).
//!
//! A line is substantive iff it is a list item (`-`, `*`, or numbered) or a
//! non-YAML-key paragraph longer than 20 characters. Headers, frontmatter
//! keys, a bare `---`, and parenthetical placeholders like `(nothing yet)`
//! are ignored.

const MIN_PARAGRAPH_LEN: usize = 20;

pub fn is_substantive_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed == "---" {
        return false;
    }
    if trimmed.starts_with('#') {
        return false;
    }
    if trimmed.starts_with('(') && trimmed.ends_with(')') {
        return false;
    }
    if is_list_item(trimmed) {
        return true;
    }
    if looks_like_yaml_key(trimmed) {
        return false;
    }
    trimmed.len() > MIN_PARAGRAPH_LEN
}

fn is_list_item(trimmed: &str) -> bool {
    if trimmed.starts_with("- ") || trimmed.starts_with("* ") {
        return true;
    }
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    !digits.is_empty() && trimmed[digits.len()..].starts_with(". ")
}

fn looks_like_yaml_key(trimmed: &str) -> bool {
    match trimmed.split_once(':') {
        Some((key, _)) => !key.is_empty() && !key.contains(' '),
        None => false,
    }
}

pub fn count_substantive_lines(text: &str) -> usize {
    text.lines().filter(|line| is_substantive_line(line)).count()
}
