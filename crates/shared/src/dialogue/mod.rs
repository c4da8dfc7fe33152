pub mod extract;
pub mod orchestrator;
pub mod resolver;
pub mod search;
pub mod state;
pub mod synthesis;

pub use orchestrator::DialogueEngine;
pub use state::{DialogueState, RoutingDecision};
