//! `AdapterError` (§7.1): used internally for `match`-based branching when
//! choosing which user-facing sentence to render. Never propagated past an
//! adapter's own boundary — every fallible adapter operation turns one of
//! these into a final `error` stream chunk instead of returning `Err`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to spawn CLI process: {0}")]
    SpawnFailed(#[source] std::io::Error),
    #[error("CLI invocation timed out")]
    Timeout,
    #[error("CLI exited with status {0}")]
    NonZeroExit(i32),
    #[error("malformed stream: {0}")]
    MalformedStream(String),
}

impl AdapterError {
    /// The sentence shown to the end user, with the reference code embedded
    /// so a later bug report can be grepped straight to its log line.
    pub fn user_message(&self, reference: &str) -> String {
        match self {
            AdapterError::SpawnFailed(err) if err.kind() == std::io::ErrorKind::NotFound => {
                format!("The CLI isn't installed on this machine. (ref: {reference})")
            }
            AdapterError::SpawnFailed(_) => {
                format!("Couldn't start the CLI. (ref: {reference})")
            }
            AdapterError::Timeout => format!("That took too long. (ref: {reference})"),
            AdapterError::NonZeroExit(status) => {
                format!("The CLI exited unexpectedly (status {status}). (ref: {reference})")
            }
            AdapterError::MalformedStream(_) => {
                format!("Got an unreadable response from the CLI. (ref: {reference})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_spawn_error_mentions_installation() {
        let err = AdapterError::SpawnFailed(std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"));
        let message = err.user_message("k3x9f2");
        assert!(message.contains("isn't installed"));
        assert!(message.contains("k3x9f2"));
    }

    #[test]
    fn timeout_message_matches_spec_wording() {
        let message = AdapterError::Timeout.user_message("ab12cd");
        assert!(message.contains("too long"));
    }
}
