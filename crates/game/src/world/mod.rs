mod level;

pub use level::{LevelWorld, PLAYER_HALF_EXTENTS};

use crate::event::{Event, EventQueue};
use crate::physics::Transform;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("level {level} does not exist (have {count})")]
    LevelOutOfRange { level: i32, count: i32 },
}

/// The scene the frame loop drives: levels, the locally controlled player and
/// the stand-ins drawn for remote players.
pub trait World {
    /// Transform of the locally controlled player, if a level is loaded.
    fn active_player(&self) -> Option<Transform>;

    /// 1-based index of the active level, or `-1` when none is loaded.
    fn level_index(&self) -> i32;

    fn level_count(&self) -> i32;

    /// Switches level. Selecting the level already active is a no-op.
    fn set_level_index(&mut self, level: i32) -> Result<(), WorldError>;

    fn step_physics(&mut self, dt: f32);

    /// Called once after a frame that ran at least one physics step.
    fn end_physics_frame(&mut self);

    /// Draws the scene. A live draw also updates gameplay triggers, which may
    /// push events such as `PlayerFinish`.
    fn draw_all(&mut self, preview_only: bool, events: &mut EventQueue, clock: f32);

    fn draw_puppet(&mut self, index: usize, transform: &Transform);

    /// Whether the local player is drawn and updated. The authority hides it.
    fn set_local_player_visible(&mut self, visible: bool);

    fn on_event(&mut self, event: &mut Event);
}
