use super::camera::CameraRig;
use crate::event::{Event, EventKind, dispatch};
use crate::replication::NO_LEVEL;
use crate::world::World;

/// Local window subsystem: whether the loop keeps running, whether the GUI
/// (and with it the editor camera) is shown, and the camera itself.
pub struct WindowState {
    running: bool,
    show_gui: bool,
    camera: CameraRig,
}

impl Default for WindowState {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowState {
    pub fn new() -> Self {
        Self {
            running: true,
            show_gui: false,
            camera: CameraRig::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn shows_gui(&self) -> bool {
        self.show_gui
    }

    /// Physics is frozen and only a preview is drawn while editing.
    pub fn is_editor_mode(&self) -> bool {
        self.camera.is_editor_active()
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraRig {
        &mut self.camera
    }

    pub fn on_event<W: World + ?Sized>(&mut self, event: &mut Event, delta: f32, world: &mut W) {
        let camera = &mut self.camera;
        dispatch(event, EventKind::CameraMoveForward, || camera.advance(1.0, delta));
        dispatch(event, EventKind::CameraMoveBackward, || camera.advance(-1.0, delta));
        dispatch(event, EventKind::CameraRotateUp, || camera.rotate(1.0, 0.0, delta));
        dispatch(event, EventKind::CameraRotateDown, || camera.rotate(-1.0, 0.0, delta));
        dispatch(event, EventKind::CameraRotateLeft, || camera.rotate(0.0, 1.0, delta));
        dispatch(event, EventKind::CameraRotateRight, || camera.rotate(0.0, -1.0, delta));
        dispatch(event, EventKind::SlowDown, || camera.slow_down());
        dispatch(event, EventKind::SpeedUp, || camera.speed_up());

        dispatch(event, EventKind::WindowClose, || {
            log::info!("Window closed");
            self.running = false;
        });
        dispatch(event, EventKind::ToggleWindowManager, || {
            self.show_gui = !self.show_gui;
            self.camera.set_editor_active(self.show_gui);
        });
        dispatch(event, EventKind::PlayerFinish, || advance_level(world));
    }
}

fn advance_level<W: World + ?Sized>(world: &mut W) {
    let current = world.level_index();
    if current == NO_LEVEL {
        return;
    }
    if current >= world.level_count() {
        log::info!("Finished the last level");
        return;
    }

    if let Err(e) = world.set_level_index(current + 1) {
        log::warn!("Could not advance level: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::world::LevelWorld;

    fn send(window: &mut WindowState, world: &mut LevelWorld, kind: EventKind) -> bool {
        let mut event = Event::new(kind, 0.0);
        window.on_event(&mut event, 0.1, world);
        event.is_handled()
    }

    #[test]
    fn close_stops_the_loop() {
        let mut window = WindowState::new();
        let mut world = LevelWorld::new(&EngineConfig::default());

        assert!(send(&mut window, &mut world, EventKind::WindowClose));
        assert!(!window.is_running());
    }

    #[test]
    fn toggle_enters_and_leaves_editor() {
        let mut window = WindowState::new();
        let mut world = LevelWorld::new(&EngineConfig::default());

        send(&mut window, &mut world, EventKind::ToggleWindowManager);
        assert!(window.shows_gui());
        assert!(window.is_editor_mode());

        send(&mut window, &mut world, EventKind::ToggleWindowManager);
        assert!(!window.is_editor_mode());
    }

    #[test]
    fn finish_advances_until_last_level() {
        let mut window = WindowState::new();
        let mut world = LevelWorld::new(&EngineConfig::default());
        world.set_level_index(2).unwrap();

        send(&mut window, &mut world, EventKind::PlayerFinish);
        assert_eq!(world.level_index(), 3);

        send(&mut window, &mut world, EventKind::PlayerFinish);
        assert_eq!(world.level_index(), 3);
    }

    #[test]
    fn player_moves_are_not_claimed() {
        let mut window = WindowState::new();
        let mut world = LevelWorld::new(&EngineConfig::default());

        assert!(!send(&mut window, &mut world, EventKind::MoveForward));
        assert!(send(&mut window, &mut world, EventKind::SpeedUp));
        assert_eq!(window.camera().speed_scale(), 2.0);
    }
}
