use glam::Vec3;

use super::{World, WorldError};
use crate::config::{EngineConfig, LevelConfig};
use crate::event::{Event, EventKind, EventQueue, dispatch};
use crate::physics::{PhysicsWorld, RigidBodyHandle, Transform};
use crate::replication::NO_LEVEL;

pub const PLAYER_HALF_EXTENTS: Vec3 = Vec3::splat(0.5);

// Distance before the finish marker at which a level counts as finished.
const FINISH_MARGIN: f32 = 30.0;

/// Headless level runtime: one ground plane, one dynamic player body, and a
/// finish line along +z.
pub struct LevelWorld {
    levels: Vec<LevelConfig>,
    physics: PhysicsWorld,
    player: Option<RigidBodyHandle>,
    level_index: i32,
    player_force: f32,
    jump_force: f32,
    player_mass: f32,
    local_player_visible: bool,
    finish_raised: bool,
    drawn_puppets: Vec<(usize, Transform)>,
    frames_drawn: u64,
}

impl LevelWorld {
    pub fn new(config: &EngineConfig) -> Self {
        let mut physics = PhysicsWorld::new();
        physics.add_static_box(Vec3::new(0.0, -0.5, 0.0), Vec3::new(200.0, 0.5, 400.0));

        Self {
            levels: config.levels.clone(),
            physics,
            player: None,
            level_index: NO_LEVEL,
            player_force: config.player_force,
            jump_force: config.jump_force,
            player_mass: config.player_mass,
            local_player_visible: true,
            finish_raised: false,
            drawn_puppets: Vec::new(),
            frames_drawn: 0,
        }
    }

    pub fn current_level(&self) -> Option<&LevelConfig> {
        usize::try_from(self.level_index - 1)
            .ok()
            .and_then(|i| self.levels.get(i))
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    /// Puppets drawn during the most recent frame, by remote slot index.
    pub fn drawn_puppets(&self) -> &[(usize, Transform)] {
        &self.drawn_puppets
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn is_local_player_visible(&self) -> bool {
        self.local_player_visible
    }

    /// Moves the local player, e.g. to place it for a scripted scenario.
    pub fn teleport_player(&mut self, position: Vec3) {
        if let Some(handle) = self.player {
            self.physics.reset_body(handle, position);
        }
    }

    fn push_player(&mut self, force: Vec3) {
        if let Some(handle) = self.player {
            self.physics.apply_force(handle, force);
        }
    }

    fn check_finish(&mut self, events: &mut EventQueue, clock: f32) {
        if self.finish_raised {
            return;
        }
        let (Some(level), Some(player)) = (self.current_level(), self.active_player()) else {
            return;
        };

        if player.position.z >= level.finish_z - FINISH_MARGIN {
            log::info!("Player reached the finish of {}", level.name);
            self.finish_raised = true;
            events.push(EventKind::PlayerFinish, clock);
        }
    }
}

impl World for LevelWorld {
    fn active_player(&self) -> Option<Transform> {
        self.player.and_then(|h| self.physics.body_transform(h))
    }

    fn level_index(&self) -> i32 {
        self.level_index
    }

    fn level_count(&self) -> i32 {
        self.levels.len() as i32
    }

    fn set_level_index(&mut self, level: i32) -> Result<(), WorldError> {
        if level == self.level_index {
            return Ok(());
        }
        if level < 1 || level > self.level_count() {
            return Err(WorldError::LevelOutOfRange {
                level,
                count: self.level_count(),
            });
        }

        self.level_index = level;
        self.finish_raised = false;

        let Some(spawn) = self.current_level().map(|l| Vec3::from_array(l.spawn)) else {
            return Ok(());
        };

        match self.player {
            Some(handle) => self.physics.reset_body(handle, spawn),
            None => {
                self.player = Some(self.physics.add_player(
                    spawn,
                    PLAYER_HALF_EXTENTS,
                    self.player_mass,
                ));
            }
        }

        log::info!(
            "Loaded level {} ({})",
            level,
            self.current_level().map_or("?", |l| l.name.as_str())
        );
        Ok(())
    }

    fn step_physics(&mut self, dt: f32) {
        self.physics.step(dt);
    }

    fn end_physics_frame(&mut self) {
        self.physics.clear_forces();
    }

    fn draw_all(&mut self, preview_only: bool, events: &mut EventQueue, clock: f32) {
        self.drawn_puppets.clear();
        self.frames_drawn += 1;

        if preview_only {
            return;
        }

        if self.local_player_visible {
            self.check_finish(events, clock);
        }
    }

    fn draw_puppet(&mut self, index: usize, transform: &Transform) {
        log::trace!("Drawing remote player {} at {}", index, transform.position);
        self.drawn_puppets.push((index, *transform));
    }

    fn set_local_player_visible(&mut self, visible: bool) {
        self.local_player_visible = visible;
    }

    fn on_event(&mut self, event: &mut Event) {
        if self.player.is_none() {
            return;
        }

        let force = self.player_force;
        let jump = self.jump_force;

        let mut push = None;
        dispatch(event, EventKind::MoveForward, || push = Some(Vec3::new(0.0, 0.0, force)));
        dispatch(event, EventKind::MoveBackward, || push = Some(Vec3::new(0.0, 0.0, -force)));
        dispatch(event, EventKind::MoveRight, || push = Some(Vec3::new(-force, 0.0, 0.0)));
        dispatch(event, EventKind::MoveLeft, || push = Some(Vec3::new(force, 0.0, 0.0)));
        dispatch(event, EventKind::Jump, || push = Some(Vec3::new(0.0, jump, 0.0)));

        if let Some(force) = push {
            self.push_player(force);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> LevelWorld {
        LevelWorld::new(&EngineConfig::default())
    }

    #[test]
    fn starts_without_level_or_player() {
        let world = world();
        assert_eq!(world.level_index(), NO_LEVEL);
        assert!(world.active_player().is_none());
    }

    #[test]
    fn selecting_level_spawns_player() {
        let mut world = world();
        world.set_level_index(1).unwrap();

        let player = world.active_player().unwrap();
        assert!((player.position - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-5);
        assert_eq!(world.current_level().map(|l| l.name.as_str()), Some("Meadow"));
    }

    #[test]
    fn unknown_level_is_refused() {
        let mut world = world();
        world.set_level_index(1).unwrap();

        assert_eq!(
            world.set_level_index(9),
            Err(WorldError::LevelOutOfRange { level: 9, count: 3 })
        );
        assert!(world.set_level_index(0).is_err());
        assert_eq!(world.level_index(), 1);
    }

    #[test]
    fn reselecting_active_level_keeps_player_position() {
        let mut world = world();
        world.set_level_index(1).unwrap();
        world.teleport_player(Vec3::new(0.0, 1.0, 12.0));

        world.set_level_index(1).unwrap();

        assert!(world.active_player().unwrap().position.z > 11.0);
    }

    #[test]
    fn move_forward_pushes_along_z() {
        let mut world = world();
        world.set_level_index(1).unwrap();

        for _ in 0..30 {
            let mut event = Event::new(EventKind::MoveForward, 0.0);
            world.on_event(&mut event);
            assert!(event.is_handled());
            world.step_physics(1.0 / 60.0);
            world.end_physics_frame();
        }

        assert!(world.active_player().unwrap().position.z > 0.0);
    }

    #[test]
    fn finish_is_raised_once_per_level() {
        let mut world = world();
        let mut queue = EventQueue::default();
        world.set_level_index(1).unwrap();
        world.teleport_player(Vec3::new(0.0, 1.0, 31.0));

        world.draw_all(false, &mut queue, 0.0);
        world.draw_all(false, &mut queue, 0.1);
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(EventKind::PlayerFinish));

        world.set_level_index(2).unwrap();
        queue.clear();
        world.draw_all(false, &mut queue, 0.2);
        assert!(queue.is_empty());
    }

    #[test]
    fn hidden_player_never_finishes() {
        let mut world = world();
        let mut queue = EventQueue::default();
        world.set_level_index(1).unwrap();
        world.set_local_player_visible(false);
        world.teleport_player(Vec3::new(0.0, 1.0, 50.0));

        world.draw_all(false, &mut queue, 0.0);
        world.draw_all(true, &mut queue, 0.0);

        assert!(queue.is_empty());
    }
}
