//! Memory storage: facts, topics, preparations, the thread tracker, and the
//! layered context assembler that composes them into a system-prompt
//! preamble (§3, §4.8).

pub mod context;
pub mod facts;
pub mod preparations;
pub mod threads;
pub mod topics;

pub use context::{BUDGET_WARNING_THRESHOLD, TOKEN_BUDGET, build_memory_context, estimate_tokens};
pub use facts::{Fact, load_facts};
pub use preparations::{Preparation, list_active, match_preparations, save_preparation};
pub use threads::{Thread, ThreadState, ThreadStatus, ThreadStore};
pub use topics::{Topic, load_topics};
