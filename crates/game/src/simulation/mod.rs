mod tick;

pub use tick::{DEFAULT_MAX_STEPS_PER_FRAME, DEFAULT_TICK_RATE, FixedStepScheduler};
