//! Proactive-message governor and engagement tracker (§4.6, §4.8): decides
//! whether the agent should reach out unprompted, and learns to stop asking
//! when the user consistently doesn't engage.

pub mod engagement;
pub mod governor;
pub mod rate_limit;
pub mod state;

pub use engagement::{EngagementRecord, EngagementTracker, Outcome};
pub use governor::{Action, Evaluation, ProactiveGovernor};
pub use state::{FollowUpRecord, ProactiveState, SentRecord};
