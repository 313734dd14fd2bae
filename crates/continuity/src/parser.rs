//! Incremental state machine (§4.4) separating displayable text from
//! embedded directives as text arrives chunk by chunk. The batch extractor
//! (§4.3) is built on top of this rather than maintained separately, which
//! is what makes "streaming ≡ batch modulo a trailing incomplete directive"
//! a structural fact rather than a coincidence kept in sync by hand.

use crate::directive::{DirectiveKind, PreparationDirective, WriteAction, WriteDirective};

const CLOSE_MARKER: &str = "-->";

/// Observable parser state, named to match §4.4's four states. `pending`
/// non-empty while `Outside` implies `CandidateOpen`; an in-progress body
/// whose tail overlaps the close marker implies `CandidateClose`. Exposed
/// mainly so tests can assert the parser isn't stuck mid-directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Outside,
    CandidateOpen,
    InsideDirective,
    CandidateClose,
}

struct Marker {
    text: String,
    kind: &'static str,
}

pub struct StreamingDirectiveParser {
    markers: Vec<Marker>,
    pending: String,
    body: String,
    matched_kind: Option<&'static str>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PushResult {
    pub visible_text: String,
    pub events: Vec<DirectiveKind>,
}

impl StreamingDirectiveParser {
    pub fn new(identity: &str) -> Self {
        let identity = identity.trim().to_lowercase();
        let markers = vec![
            Marker { text: format!("<!--{identity}-write"), kind: "write" },
            Marker { text: format!("<!--{identity}-proactive"), kind: "proactive" },
            Marker { text: format!("<!--{identity}-prepare"), kind: "prepare" },
        ];
        Self {
            markers,
            pending: String::new(),
            body: String::new(),
            matched_kind: None,
        }
    }

    pub fn state(&self) -> ParserState {
        if self.matched_kind.is_some() {
            if tail_overlaps(&self.body, CLOSE_MARKER) {
                ParserState::CandidateClose
            } else {
                ParserState::InsideDirective
            }
        } else if self.pending.is_empty() {
            ParserState::Outside
        } else {
            ParserState::CandidateOpen
        }
    }

    /// Feed one chunk of text through the parser. May emit zero or more
    /// directive events (a single chunk can close more than one directive)
    /// and returns the text that is now safe to display.
    pub fn push(&mut self, chunk: &str) -> PushResult {
        if self.matched_kind.is_some() {
            self.body.push_str(chunk);
        } else {
            self.pending.push_str(chunk);
        }

        let mut visible = String::new();
        let mut events = Vec::new();

        loop {
            if let Some(kind) = self.matched_kind {
                match self.body.find(CLOSE_MARKER) {
                    Some(idx) => {
                        let interior = self.body[..idx].to_string();
                        let rest = self.body[idx + CLOSE_MARKER.len()..].to_string();
                        self.body.clear();
                        self.matched_kind = None;
                        if let Some(directive) = parse_interior(kind, &interior) {
                            events.push(directive);
                        } else {
                            tracing::debug!(kind, "malformed directive interior, skipped");
                        }
                        self.pending = rest;
                        continue;
                    }
                    None => break,
                }
            }

            match earliest_marker_match(&self.pending, &self.markers) {
                Some((idx, marker_len, kind)) => {
                    visible.push_str(&self.pending[..idx]);
                    self.body = self.pending[idx + marker_len..].to_string();
                    self.pending.clear();
                    self.matched_kind = Some(kind);
                    continue;
                }
                None => {
                    let overlap = longest_tail_overlap(&self.pending, &self.markers);
                    let flush_len = self.pending.len() - overlap;
                    visible.push_str(&self.pending[..flush_len]);
                    self.pending = self.pending[flush_len..].to_string();
                    break;
                }
            }
        }

        PushResult { visible_text: visible, events }
    }

    /// End of stream. An open directive whose body never saw a close marker
    /// is discarded (logged); a dangling open-tag candidate that never
    /// completed is just ordinary text and is flushed to display.
    pub fn flush(&mut self) -> PushResult {
        if self.matched_kind.take().is_some() {
            tracing::warn!(body_len = self.body.len(), "incomplete directive discarded at end of stream");
            self.body.clear();
            PushResult::default()
        } else {
            let visible = std::mem::take(&mut self.pending);
            PushResult { visible_text: visible, events: Vec::new() }
        }
    }
}

fn tail_overlaps(haystack: &str, needle: &str) -> bool {
    longest_tail_overlap(haystack, &[Marker { text: needle.to_string(), kind: "" }]) > 0
}

/// Earliest starting index of any marker fully contained in `text`, along
/// with the matched marker's byte length and kind tag.
fn earliest_marker_match<'a>(text: &str, markers: &'a [Marker]) -> Option<(usize, usize, &'static str)> {
    markers
        .iter()
        .filter_map(|m| text.find(&m.text).map(|idx| (idx, m.text.len(), m.kind)))
        .min_by_key(|(idx, len, _)| (*idx, std::cmp::Reverse(*len)))
}

/// Length of the longest suffix of `text` that is a proper prefix of some
/// marker — the bytes that must be held back because they might still grow
/// into a full marker with more input. Bounds how much we ever buffer while
/// outside a directive to at most the longest marker's length.
fn longest_tail_overlap(text: &str, markers: &[Marker]) -> usize {
    let max_len = markers.iter().map(|m| m.text.len()).max().unwrap_or(0);
    let cap = text.len().min(max_len.saturating_sub(1));
    for len in (1..=cap).rev() {
        let suffix = &text[text.len() - len..];
        if markers.iter().any(|m| m.text.starts_with(suffix)) {
            return len;
        }
    }
    0
}

fn parse_interior(kind: &str, interior: &str) -> Option<DirectiveKind> {
    match kind {
        "write" => parse_write_interior(interior).map(DirectiveKind::Write),
        "proactive" => {
            let message = interior.trim();
            if message.is_empty() { None } else { Some(DirectiveKind::Proactive(message.to_string())) }
        }
        "prepare" => parse_prepare_interior(interior).map(DirectiveKind::Prepare),
        _ => None,
    }
}

fn parse_write_interior(interior: &str) -> Option<WriteDirective> {
    let mut lines = interior.lines().peekable();
    let mut file: Option<String> = None;
    let mut action: Option<WriteAction> = None;

    while let Some(line) = lines.peek() {
        let trimmed = line.trim();
        if let Some(value) = trimmed.strip_prefix("file:") {
            file = Some(value.trim().to_string());
            lines.next();
        } else if let Some(value) = trimmed.strip_prefix("action:") {
            action = WriteAction::parse(value);
            lines.next();
        } else {
            break;
        }
    }

    let file = file?;
    let action = action?;

    let remaining: Vec<&str> = lines.collect();
    let frontmatter = std::collections::BTreeMap::new();
    let (frontmatter, content_lines): (std::collections::BTreeMap<String, String>, Vec<&str>) =
        if remaining.first().map(|l| l.trim() == "---").unwrap_or(false) {
            match remaining.iter().skip(1).position(|l| l.trim() == "---") {
                Some(close_offset) => {
                    let fm_lines = &remaining[1..1 + close_offset];
                    let fm = fm_lines
                        .iter()
                        .filter_map(|l| l.split_once(':'))
                        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                        .collect();
                    (fm, remaining[(2 + close_offset)..].to_vec())
                }
                None => (frontmatter, remaining),
            }
        } else {
            (frontmatter, remaining)
        };

    let content = content_lines.join("\n").trim_end_matches('\n').to_string();

    Some(WriteDirective { file, action, frontmatter, content })
}

fn parse_prepare_interior(interior: &str) -> Option<PreparationDirective> {
    let lines: Vec<&str> = interior.lines().collect();
    let separator_idx = lines.iter().position(|l| l.trim() == "---")?;

    let mut topic: Option<String> = None;
    let mut keywords = Vec::new();
    for line in &lines[..separator_idx] {
        let trimmed = line.trim();
        if let Some(value) = trimmed.strip_prefix("topic:") {
            topic = Some(value.trim().to_string());
        } else if let Some(value) = trimmed.strip_prefix("keywords:") {
            keywords = parse_keyword_list(value.trim());
        }
    }

    let topic = topic?;
    if topic.is_empty() {
        return None;
    }
    let content = lines[separator_idx + 1..].join("\n").trim_end_matches('\n').to_string();
    if content.is_empty() {
        return None;
    }

    Some(PreparationDirective { topic, keywords, content })
}

fn parse_keyword_list(raw: &str) -> Vec<String> {
    let inner = raw.trim_start_matches('[').trim_end_matches(']');
    inner
        .split(',')
        .map(|k| k.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_all(identity: &str, text: &str) -> PushResult {
        let mut parser = StreamingDirectiveParser::new(identity);
        let mut result = parser.push(text);
        let tail = parser.flush();
        result.visible_text.push_str(&tail.visible_text);
        result.events.extend(tail.events);
        result
    }

    #[test]
    fn scenario_one_create_directive() {
        let text = "I will remember that.\n<!--agent-write\nfile: memory/facts/router-test.md\naction: create\nRouter test fact.\n-->\nDone!";
        let result = extract_all("agent", text);
        assert_eq!(result.events.len(), 1);
        match &result.events[0] {
            DirectiveKind::Write(w) => {
                assert_eq!(w.file, "memory/facts/router-test.md");
                assert_eq!(w.action, WriteAction::Create);
                assert_eq!(w.content, "Router test fact.");
            }
            _ => panic!("expected write directive"),
        }
        assert!(result.visible_text.contains("I will remember that."));
        assert!(result.visible_text.contains("Done!"));
        assert!(!result.visible_text.contains("<!--"));
    }

    #[test]
    fn malformed_directive_missing_action_is_skipped() {
        let text = "before <!--agent-write\nfile: memory/facts/x.md\nno action here\n--> after";
        let result = extract_all("agent", text);
        assert!(result.events.is_empty());
        assert!(!result.visible_text.contains("<!--"));
    }

    #[test]
    fn unknown_directive_kind_passes_through_as_text() {
        let text = "before <!--agent-unknown\nstuff\n--> after";
        let result = extract_all("agent", text);
        assert!(result.events.is_empty());
        assert_eq!(result.visible_text, text);
    }

    #[test]
    fn scenario_six_split_across_chunks() {
        let mut parser = StreamingDirectiveParser::new("agent");
        let mut visible = String::new();
        let mut events = Vec::new();

        let chunks = [
            "I will remember that.\n<!--agent-wr",
            "ite\nfile: memory/facts/router-test.md\naction: create\nRouter test fact.\n-->",
            "\nDone!",
        ];
        for chunk in chunks {
            let r = parser.push(chunk);
            visible.push_str(&r.visible_text);
            events.extend(r.events);
        }
        let tail = parser.flush();
        visible.push_str(&tail.visible_text);

        assert_eq!(events.len(), 1);
        match &events[0] {
            DirectiveKind::Write(w) => assert_eq!(w.content, "Router test fact."),
            _ => panic!("expected write directive"),
        }
        assert_eq!(visible, "I will remember that.\n\nDone!");
    }

    #[test]
    fn flush_discards_unclosed_directive_body() {
        let mut parser = StreamingDirectiveParser::new("agent");
        let r = parser.push("visible <!--agent-write\nfile: a.md\naction: create\nnever closed");
        assert_eq!(r.visible_text, "visible ");
        let tail = parser.flush();
        assert!(tail.events.is_empty());
        assert!(tail.visible_text.is_empty());
    }

    #[test]
    fn flush_emits_dangling_open_candidate_as_text() {
        let mut parser = StreamingDirectiveParser::new("agent");
        let r = parser.push("hello <!--agen");
        assert_eq!(r.visible_text, "hello ");
        let tail = parser.flush();
        assert_eq!(tail.visible_text, "<!--agen");
    }

    #[test]
    fn batch_extraction_matches_streaming_for_same_input() {
        let text = "before <!--agent-write\nfile: a.md\naction: append\nsome content\n--> after";
        let mut parser_a = StreamingDirectiveParser::new("agent");
        let whole = parser_a.push(text);
        let flushed = parser_a.flush();

        let mut parser_b = StreamingDirectiveParser::new("agent");
        let mut visible = String::new();
        let mut events = Vec::new();
        for chunk in text.split_inclusive(' ') {
            let r = parser_b.push(chunk);
            visible.push_str(&r.visible_text);
            events.extend(r.events);
        }
        let tail = parser_b.flush();
        visible.push_str(&tail.visible_text);

        let mut expected_visible = whole.visible_text.clone();
        expected_visible.push_str(&flushed.visible_text);
        assert_eq!(visible, expected_visible);
        assert_eq!(events.len(), whole.events.len() + flushed.events.len());
    }
}
