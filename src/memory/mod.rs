//! Two-tier character memory
//!
//! Short-term memory is the shared recency window over events; long-term
//! memory is the per-character fact store ranked by relevance.

pub mod context;
pub mod retrieval;

pub use context::{ContextAssembler, DecisionContext};
pub use retrieval::RelevanceRetriever;
