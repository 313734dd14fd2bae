//! LLM adapter abstraction (§4.7): a name→adapter registry in front of
//! whatever actually talks to a model. The CLI adapter is the one concrete
//! implementation shipped here; other adapters plug into the same trait.

pub mod adapter;
pub mod cli_adapter;
pub mod error;
pub mod reference_code;
pub mod registry;

pub use adapter::{
    collect_stream_to_result, Adapter, AdapterInput, CollectedResult, HealthStatus, HistoryTurn, Speaker,
    StreamChunk, StreamHandle, ThoughtResult,
};
pub use cli_adapter::CliAdapter;
pub use error::AdapterError;
pub use reference_code::reference_code;
pub use registry::AdapterRegistry;
