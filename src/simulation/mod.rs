//! The simulation proper: deciding, consolidating and looping over turns

pub mod consolidation;
pub mod decision;
pub mod extract;
pub mod turn_loop;

pub use consolidation::{ConsolidationReport, ConsolidationScheduler};
pub use decision::{placeholder_narration, Decision, DecisionStep};
pub use extract::extract_first_json;
pub use turn_loop::{RunFlag, TurnLoop, TurnReport};
