use std::f32::consts::FRAC_PI_2;

use glam::Vec3;

use crate::physics::Transform;

/// Editor camera speed in world units per second.
pub const MOVEMENT_SPEED: f32 = 20.0;
/// Editor camera turn rate in radians per second.
pub const TURNING_SPEED: f32 = FRAC_PI_2;

const MIN_SPEED_SCALE: f32 = 0.125;
const MAX_SPEED_SCALE: f32 = 8.0;

const FOLLOW_OFFSET: Vec3 = Vec3::new(0.0, 4.0, -10.0);

/// Free editor camera plus a third-person follow target for the local player.
#[derive(Debug, Clone)]
pub struct CameraRig {
    editor: Transform,
    follow_target: Vec3,
    speed_scale: f32,
    editor_active: bool,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraRig {
    pub fn new() -> Self {
        Self {
            editor: Transform::from_position(FOLLOW_OFFSET),
            follow_target: Vec3::ZERO,
            speed_scale: 1.0,
            editor_active: false,
        }
    }

    pub fn editor_transform(&self) -> &Transform {
        &self.editor
    }

    pub fn follow_target(&self) -> Vec3 {
        self.follow_target
    }

    /// Where the camera currently looks from.
    pub fn eye(&self) -> Vec3 {
        if self.editor_active {
            self.editor.position
        } else {
            self.follow_target + FOLLOW_OFFSET
        }
    }

    pub fn speed_scale(&self) -> f32 {
        self.speed_scale
    }

    pub fn is_editor_active(&self) -> bool {
        self.editor_active
    }

    pub fn set_editor_active(&mut self, active: bool) {
        self.editor_active = active;
    }

    /// Moves the editor camera along its facing; `direction` is +1 or -1.
    pub fn advance(&mut self, direction: f32, delta: f32) {
        let step = MOVEMENT_SPEED * self.speed_scale * delta * direction;
        self.editor.position += self.editor.forward() * step;
    }

    pub fn rotate(&mut self, pitch: f32, yaw: f32, delta: f32) {
        let rate = TURNING_SPEED * self.speed_scale * delta;
        let pitched = self.editor.rotation.x + pitch * rate;
        self.editor.rotation.x = pitched.clamp(-FRAC_PI_2, FRAC_PI_2);
        self.editor.rotation.y += yaw * rate;
    }

    pub fn slow_down(&mut self) {
        self.speed_scale = (self.speed_scale * 0.5).max(MIN_SPEED_SCALE);
    }

    pub fn speed_up(&mut self) {
        self.speed_scale = (self.speed_scale * 2.0).min(MAX_SPEED_SCALE);
    }

    /// Tracks the local player. Keeps the last target when there is none.
    pub fn update_follow(&mut self, player: Option<Transform>) {
        if let Some(player) = player {
            self.follow_target = player.position;
        }
    }
}
