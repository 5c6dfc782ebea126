pub const DEFAULT_TICK_RATE: u32 = 60;
pub const DEFAULT_MAX_STEPS_PER_FRAME: u32 = 8;

// Absorbs f64 rounding when a frame delta is an exact multiple of the step.
const STEP_EPSILON: f64 = 1e-9;

/// Fixed-timestep accumulator: variable frame deltas in, constant steps out.
pub struct FixedStepScheduler {
    tick_rate: u32,
    step: f64,
    accumulator: f64,
    max_steps_per_frame: u32,
    total_steps: u64,
    dropped_time: f64,
}

impl FixedStepScheduler {
    pub fn new(tick_rate: u32, max_steps_per_frame: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            tick_rate,
            step: 1.0 / tick_rate as f64,
            accumulator: 0.0,
            max_steps_per_frame: max_steps_per_frame.max(1),
            total_steps: 0,
            dropped_time: 0.0,
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn dt(&self) -> f32 {
        self.step as f32
    }

    pub fn step_size(&self) -> f64 {
        self.step
    }

    pub fn max_steps_per_frame(&self) -> u32 {
        self.max_steps_per_frame
    }

    pub fn accumulate(&mut self, delta: f64) {
        if delta.is_finite() && delta > 0.0 {
            self.accumulator += delta;
        }
    }

    pub fn should_tick(&self) -> bool {
        self.accumulator + STEP_EPSILON >= self.step
    }

    pub fn consume_tick(&mut self) -> bool {
        if self.should_tick() {
            self.accumulator = (self.accumulator - self.step).max(0.0);
            true
        } else {
            false
        }
    }

    /// Adds `delta` seconds and runs `step_fn` once per whole step available,
    /// at most `max_steps_per_frame` times. Time beyond the cap is discarded.
    pub fn advance<F>(&mut self, delta: f64, mut step_fn: F) -> u32
    where
        F: FnMut(f32),
    {
        self.accumulate(delta);

        let dt = self.dt();
        let mut steps = 0;
        while steps < self.max_steps_per_frame && self.consume_tick() {
            step_fn(dt);
            steps += 1;
        }

        if self.should_tick() {
            let whole = (self.accumulator / self.step).floor();
            let dropped = whole * self.step;
            self.accumulator -= dropped;
            self.dropped_time += dropped;
            log::warn!(
                "Physics fell behind, skipping {:.1} ms of simulation",
                dropped * 1000.0
            );
        }

        self.total_steps += steps as u64;
        steps
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn dropped_time(&self) -> f64 {
        self.dropped_time
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

impl Default for FixedStepScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE, DEFAULT_MAX_STEPS_PER_FRAME)
    }
}
