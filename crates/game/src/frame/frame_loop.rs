use std::time::Instant;

use super::audio::AudioSystem;
use super::input::InputSource;
use super::timer::{FrameTimer, Section};
use super::window::WindowState;
use crate::config::EngineConfig;
use crate::event::EventQueue;
use crate::replication::{NetRole, ReplicationSession, SessionError};
use crate::simulation::FixedStepScheduler;
use crate::world::World;

/// What one call to [`FrameLoop::run_frame`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    pub delta: f32,
    pub physics_steps: u32,
    pub events_dispatched: usize,
    pub events_swept: usize,
}

/// Owns every subsystem and drives them in a fixed order once per frame.
pub struct FrameLoop<W: World, I: InputSource> {
    queue: EventQueue,
    scheduler: FixedStepScheduler,
    session: ReplicationSession,
    world: W,
    input: I,
    audio: AudioSystem,
    window: WindowState,
    timer: FrameTimer,
    frames: u64,
}

impl<W: World, I: InputSource> FrameLoop<W, I> {
    pub fn new(config: &EngineConfig, world: W, input: I) -> Self {
        Self {
            queue: EventQueue::new(config.stale_event_passes),
            scheduler: FixedStepScheduler::new(config.tick_rate, config.max_steps_per_frame),
            session: ReplicationSession::new(config),
            world,
            input,
            audio: AudioSystem::default(),
            window: WindowState::new(),
            timer: FrameTimer::new(),
            frames: 0,
        }
    }

    pub fn with_timer(mut self, timer: FrameTimer) -> Self {
        self.timer = timer;
        self
    }

    pub fn with_audio(mut self, audio: AudioSystem) -> Self {
        self.audio = audio;
        self
    }

    /// Opens the network side of the session. The authority never draws or
    /// simulates a player of its own.
    pub fn start_session(&mut self, role: NetRole) -> Result<(), SessionError> {
        if role == NetRole::Authority {
            self.world.set_local_player_visible(false);
        }
        self.session.initialise_network_adapter(role)
    }

    pub fn run_frame(&mut self) -> FrameStats {
        let delta = self.timer.tick();
        let clock = self.timer.passed_time();

        for kind in self.input.poll(self.window.is_editor_mode()) {
            self.queue.push(kind, clock);
        }

        self.session
            .poll_transport_events(clock, &mut self.queue, &mut self.world);

        let editor_mode = self.window.is_editor_mode();

        let started = Instant::now();
        let mut physics_steps = 0;
        if !editor_mode {
            let world = &mut self.world;
            physics_steps = self
                .scheduler
                .advance(delta as f64, |dt| world.step_physics(dt));
            if physics_steps > 0 {
                world.end_physics_frame();
            }
        }
        self.timer.record(Section::Physics, started.elapsed());

        let started = Instant::now();
        self.world.draw_all(editor_mode, &mut self.queue, clock);
        if !editor_mode {
            self.session.draw_remote_data(&mut self.world);
        }
        self.timer.record(Section::Graphics, started.elapsed());

        let started = Instant::now();
        let events_dispatched = self.queue.len();
        {
            let Self {
                queue,
                session,
                world,
                audio,
                window,
                ..
            } = self;

            // physics reacts to nothing, so audio goes first
            queue.dispatch_pass(|event| {
                audio.on_event(event);
                session.on_event(event);
                window.on_event(event, delta, &mut *world);
                world.on_event(event);
            });
        }
        let events_swept = self.queue.sweep();
        self.timer.record(Section::Events, started.elapsed());

        self.session.broadcast_local_state(&self.world);
        self.window
            .camera_mut()
            .update_follow(self.world.active_player());

        self.frames += 1;
        FrameStats {
            frame: self.frames,
            delta,
            physics_steps,
            events_dispatched,
            events_swept,
        }
    }

    pub fn is_running(&self) -> bool {
        self.window.is_running()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn session(&self) -> &ReplicationSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ReplicationSession {
        &mut self.session
    }

    pub fn window(&self) -> &WindowState {
        &self.window
    }

    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    pub fn scheduler(&self) -> &FixedStepScheduler {
        &self.scheduler
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut EventQueue {
        &mut self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::frame::ScriptedInput;
    use crate::physics::Transform;
    use crate::replication::PoseMessage;
    use crate::world::LevelWorld;

    fn frame_loop(input: ScriptedInput) -> FrameLoop<LevelWorld, ScriptedInput> {
        let config = EngineConfig::default();
        let mut world = LevelWorld::new(&config);
        world.set_level_index(1).unwrap();
        FrameLoop::new(&config, world, input).with_timer(FrameTimer::fixed(1.0 / 60.0))
    }

    #[test]
    fn one_step_per_frame_at_tick_rate() {
        let mut frames = frame_loop(ScriptedInput::idle());
        for _ in 0..10 {
            let stats = frames.run_frame();
            assert!(stats.physics_steps <= 1);
        }
        assert!(frames.scheduler().total_steps() >= 9);
        assert_eq!(frames.frames(), 10);
    }

    #[test]
    fn movement_input_moves_player() {
        let mut frames = frame_loop(ScriptedInput::holding(&[EventKind::MoveForward]));
        for _ in 0..60 {
            frames.run_frame();
        }

        assert!(frames.world().active_player().unwrap().position.z > 0.5);
        assert!(frames.queue().is_empty());
    }

    #[test]
    fn window_close_stops_loop() {
        let mut frames = frame_loop(ScriptedInput::idle().close_at(2));
        let mut ran = 0;
        while frames.is_running() {
            frames.run_frame();
            ran += 1;
        }
        assert_eq!(ran, 3);
    }

    #[test]
    fn editor_mode_freezes_physics() {
        let toggle = vec![vec![EventKind::ToggleWindowManager]];
        let mut frames = frame_loop(ScriptedInput::new(toggle));
        frames.run_frame();
        assert!(frames.window().is_editor_mode());

        let steps = frames.scheduler().total_steps();
        for _ in 0..10 {
            assert_eq!(frames.run_frame().physics_steps, 0);
        }
        assert_eq!(frames.scheduler().total_steps(), steps);
    }

    #[test]
    fn finish_advances_level_in_the_same_frame() {
        let mut frames = frame_loop(ScriptedInput::idle());
        frames.world_mut().teleport_player(glam::Vec3::new(0.0, 1.0, 40.0));

        frames.run_frame();

        assert_eq!(frames.world().level_index(), 2);
        assert!(!frames.queue().contains(EventKind::PlayerFinish));
    }

    #[test]
    fn editor_mode_hides_remote_players() {
        let toggle = vec![vec![], vec![EventKind::ToggleWindowManager], vec![]];
        let mut frames = frame_loop(ScriptedInput::new(toggle));
        let config = EngineConfig::default();
        *frames.session_mut() = ReplicationSession::with_role(NetRole::Peer, &config);
        let pose = PoseMessage::new(NetRole::Authority, 2, Transform::default()).to_bytes();
        let FrameLoop { session, world, .. } = &mut frames;
        session.handle_payload(None, &pose, world);

        frames.run_frame();
        assert_eq!(frames.world().drawn_puppets().len(), 1);

        frames.run_frame();
        frames.run_frame();
        assert!(frames.window().is_editor_mode());
        assert!(frames.world().drawn_puppets().is_empty());
    }

    #[test]
    fn unclaimed_events_survive_one_sweep() {
        let mut frames = frame_loop(ScriptedInput::idle());
        frames.queue_mut().push(EventKind::NetworkPeerConnect, 0.0);

        let stats = frames.run_frame();

        assert_eq!(stats.events_swept, 0);
        assert!(frames.queue().contains(EventKind::NetworkPeerConnect));
    }
}
