mod audio;
mod camera;
mod frame_loop;
mod input;
mod timer;
mod window;

pub use audio::{AudioBackend, AudioSystem, LogAudio};
pub use camera::{CameraRig, MOVEMENT_SPEED, TURNING_SPEED};
pub use frame_loop::{FrameLoop, FrameStats};
pub use input::{InputSource, ScriptedInput};
pub use timer::{FrameTimer, Section};
pub use window::WindowState;
