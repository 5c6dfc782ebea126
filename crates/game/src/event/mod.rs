mod queue;
mod types;

pub use queue::{DEFAULT_STALE_PASSES, EventQueue};
pub use types::{Event, EventKind, dispatch};
