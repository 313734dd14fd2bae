//! `cogcore-runtime`: wires trust, memory, continuity, the LLM adapter
//! registry, the proactive governor and the cognitive scheduler together
//! behind one owning value, `CoreRuntime` (§5, §9).

mod core;
mod reflection;

pub use core::{CoreRuntime, ProactiveCallback};
pub use reflection::{HeartbeatResult, Phase, ReflectionOutcome, ReflectionSnapshot, WorkingMemorySection};
