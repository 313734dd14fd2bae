//! Continuity layer: parses structured self-mutations an LLM emits inside
//! its response, validates them, and applies them to the workspace as safe
//! file operations (§4.3), plus the incremental variant used while a
//! response is still streaming in (§4.4).

pub mod apply;
pub mod directive;
pub mod parser;

pub use apply::ApplyResults;
pub use directive::{DirectiveKind, PreparationDirective, WriteAction, WriteDirective};
pub use parser::{ParserState, StreamingDirectiveParser};

use cogcore_workspace::paths::WorkspaceRoot;

/// Result of extracting directives from a full (non-streaming) response:
/// the directives found, and the text with every recognized block removed.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub clean_response: String,
    pub directives: Vec<DirectiveKind>,
}

/// Batch extraction, implemented by running the whole string through the
/// streaming parser and flushing at the end — see §4.4's closing note.
pub fn extract_directives(response: &str, identity: &str) -> ExtractionResult {
    let mut parser = StreamingDirectiveParser::new(identity);
    let mut result = parser.push(response);
    let tail = parser.flush();
    result.visible_text.push_str(&tail.visible_text);
    result.events.extend(tail.events);

    ExtractionResult {
        clean_response: result.visible_text,
        directives: result.events,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessedResponse {
    pub clean_response: String,
    pub writeback_results: ApplyResults,
    pub proactive_message: Option<String>,
    pub preparations: Vec<PreparationDirective>,
}

/// Ties extraction to apply for a full agent response: extract directives,
/// apply the `-write` ones under `workspace`, and surface the `-proactive`
/// (at most one considered) and `-prepare` directives for the caller to
/// handle (§4.2 step 3-5 uses this directly).
pub async fn process_response(workspace: &WorkspaceRoot, response: &str, identity: &str) -> ProcessedResponse {
    let extraction = extract_directives(response, identity);

    let mut writes = Vec::new();
    let mut proactive_message = None;
    let mut preparations = Vec::new();
    for directive in extraction.directives {
        match directive {
            DirectiveKind::Write(w) => writes.push(w),
            DirectiveKind::Proactive(message) => {
                if proactive_message.is_none() {
                    proactive_message = Some(message);
                }
            }
            DirectiveKind::Prepare(p) => preparations.push(p),
        }
    }

    let writeback_results = apply::apply_writebacks(workspace, &writes).await;

    ProcessedResponse {
        clean_response: extraction.clean_response,
        writeback_results,
        proactive_message,
        preparations,
    }
}

/// The user-visible note appended when one or more writebacks failed (§7).
pub fn writeback_failure_note(failed: &[(String, String)]) -> Option<String> {
    if failed.is_empty() {
        return None;
    }
    let files: Vec<&str> = failed.iter().map(|(file, _)| file.as_str()).collect();
    Some(format!(
        "I tried to save something to memory but the write failed for: {}. I may not remember this next time.",
        files.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_law_no_directives_survive_a_second_pass() {
        let text = "before <!--agent-write\nfile: a.md\naction: create\nbody\n--> after";
        let first = extract_directives(text, "agent");
        let second = extract_directives(&first.clean_response, "agent");
        assert!(second.directives.is_empty());
    }

    #[tokio::test]
    async fn process_response_applies_writes_and_surfaces_proactive() {
        let dir = std::env::temp_dir().join(format!("cogcore-continuity-process-{}", uuid::Uuid::new_v4()));
        let ws = WorkspaceRoot::new(&dir);

        let response = "Hey!\n<!--agent-write\nfile: journal.md\naction: append\nSomething happened.\n-->\n<!--agent-proactive\nYou might want to check in on this.\n-->\nTalk soon.";
        let processed = process_response(&ws, response, "agent").await;

        assert_eq!(processed.writeback_results.succeeded, vec!["journal.md".to_string()]);
        assert_eq!(processed.proactive_message.as_deref(), Some("You might want to check in on this."));
        assert!(!processed.clean_response.contains("<!--"));

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[test]
    fn writeback_failure_note_matches_spec_wording() {
        let failed = vec![("memory/facts/a.md".to_string(), "disk full".to_string())];
        let note = writeback_failure_note(&failed).unwrap();
        assert!(note.contains("memory/facts/a.md"));
        assert!(note.starts_with("I tried to save something to memory but the write failed for:"));
    }

    #[test]
    fn writeback_failure_note_is_none_when_nothing_failed() {
        assert!(writeback_failure_note(&[]).is_none());
    }
}
