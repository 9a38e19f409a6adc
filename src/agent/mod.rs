pub mod runtime;
pub mod sessions;

pub use runtime::{run_turn, ToolUsage, TurnOutcome};
pub use sessions::SessionStore;
