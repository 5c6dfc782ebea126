use std::collections::VecDeque;
use std::time::{Duration, Instant};

const SAMPLE_COUNT: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Physics,
    Graphics,
    Events,
}

/// Frame clock: per-frame delta, total passed time, a smoothed frame rate
/// and how long each frame section took.
pub struct FrameTimer {
    last: Instant,
    fixed_delta: Option<f32>,
    delta: f32,
    passed: f32,
    frame_times: VecDeque<f32>,
    fps: f32,
    physics: Duration,
    graphics: Duration,
    events: Duration,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
            fixed_delta: None,
            delta: 0.0,
            passed: 0.0,
            frame_times: VecDeque::with_capacity(SAMPLE_COUNT),
            fps: 0.0,
            physics: Duration::ZERO,
            graphics: Duration::ZERO,
            events: Duration::ZERO,
        }
    }

    /// Timer that reports `delta` every frame regardless of wall time.
    pub fn fixed(delta: f32) -> Self {
        Self {
            fixed_delta: Some(delta.max(0.0)),
            ..Self::new()
        }
    }

    /// Starts a new frame and returns its delta in seconds.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        self.delta = match self.fixed_delta {
            Some(delta) => delta,
            None => now.duration_since(self.last).as_secs_f32(),
        };
        self.last = now;
        self.passed += self.delta;
        self.record_frame(self.delta);
        self.delta
    }

    fn record_frame(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        if self.frame_times.len() >= SAMPLE_COUNT {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(dt);

        let avg_dt: f32 = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        self.fps = 1.0 / avg_dt;
    }

    pub fn record(&mut self, section: Section, elapsed: Duration) {
        match section {
            Section::Physics => self.physics = elapsed,
            Section::Graphics => self.graphics = elapsed,
            Section::Events => self.events = elapsed,
        }
    }

    pub fn section(&self, section: Section) -> Duration {
        match section {
            Section::Physics => self.physics,
            Section::Graphics => self.graphics,
            Section::Events => self.events,
        }
    }

    pub fn delta(&self) -> f32 {
        self.delta
    }

    pub fn passed_time(&self) -> f32 {
        self.passed
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}
