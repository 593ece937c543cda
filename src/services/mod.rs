//! Services layer for Chronicle
//!
//! Provides the text-generation collaborator.

pub mod llm;

pub use llm::{GenerationRequest, GenerationService, KoboldService};
