use serde::{Deserialize, Serialize};

/// One of the three action tiers a category can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Autonomous,
    Propose,
    Restricted,
}

/// The default category → tier map (§4.5). Twelve named categories; anything
/// else falls through to `Restricted`.
fn default_tier(category: &str) -> Tier {
    match category {
        "workspace-read" | "memory-write" | "context-gather" | "message-draft" | "reflection" => {
            Tier::Autonomous
        }
        "workspace-write" | "workspace-file-create" | "outbound-message" | "project-decision" => {
            Tier::Propose
        }
        "file-delete" | "external-api-side-effect" | "financial-action" => Tier::Restricted,
        _ => Tier::Restricted,
    }
}

/// Classify a category into its effective tier. When the trust engine is
/// frozen, only autonomous actions remain reachable — a category that would
/// normally be `Propose` is tightened to `Restricted` rather than left
/// queueable, since a frozen scope permits nothing beyond autonomous work.
pub fn classify_action(category: &str, frozen: bool) -> Tier {
    let base = default_tier(category);
    if frozen && base != Tier::Autonomous {
        Tier::Restricted
    } else {
        base
    }
}

#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub category: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ActionResult {
    pub category: String,
    pub approved: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Proposal {
    pub id: u64,
    pub category: String,
    pub description: String,
    pub requested_at: chrono::DateTime<chrono::Utc>,
}

/// In-memory holding area for `propose`-tier denials, pending external
/// approval. Closes the "trust engine → proposal queue → reflection
/// pipeline" dependency named in §2 but not otherwise given an operation
/// contract.
#[derive(Debug, Default)]
pub struct ProposalQueue {
    next_id: u64,
    proposals: Vec<Proposal>,
}

impl ProposalQueue {
    pub fn push(&mut self, category: String, description: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.proposals.push(Proposal {
            id,
            category,
            description,
            requested_at: chrono::Utc::now(),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    pub fn list(&self) -> &[Proposal] {
        &self.proposals
    }

    /// Remove a proposal by id, returning it if present. The caller decides
    /// whether approval should translate into a trust signal.
    pub fn resolve(&mut self, id: u64) -> Option<Proposal> {
        let idx = self.proposals.iter().position(|p| p.id == id)?;
        Some(self.proposals.remove(idx))
    }
}
