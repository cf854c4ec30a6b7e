//! Resume analysis: the staged pipeline, its progress reporting, and the AI
//! collaborator it scores documents with.

pub mod ai;
pub mod handlers;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stage;
