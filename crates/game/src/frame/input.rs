use crate::event::EventKind;

/// Produces the input events for one frame.
pub trait InputSource {
    /// While `editor_mode` is set, player movement drives the editor camera
    /// instead. Camera controls are ignored outside the editor.
    fn poll(&mut self, editor_mode: bool) -> Vec<EventKind>;
}

/// Replays a fixed per-frame input script. A looping script starts over at
/// its end; any other produces nothing once it runs out.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    frames: Vec<Vec<EventKind>>,
    cursor: usize,
    looping: bool,
    close_at: Option<usize>,
}

impl ScriptedInput {
    pub fn new(frames: Vec<Vec<EventKind>>) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    pub fn idle() -> Self {
        Self::default()
    }

    /// Holds `kinds` down on every frame.
    pub fn holding(kinds: &[EventKind]) -> Self {
        Self {
            frames: vec![kinds.to_vec()],
            looping: true,
            ..Self::default()
        }
    }

    /// Built-in scripts for the node binary: `idle`, `run`, `hop` and
    /// `explore`.
    pub fn by_name(name: &str) -> Option<Self> {
        let script = match name {
            "idle" => Self::idle(),
            "run" => Self::holding(&[EventKind::MoveForward]),
            "hop" => {
                let mut frames = vec![vec![EventKind::MoveForward]; 30];
                frames[0].push(EventKind::Jump);
                Self {
                    frames,
                    looping: true,
                    ..Self::default()
                }
            }
            "explore" => {
                let mut frames = vec![vec![EventKind::ToggleWindowManager]];
                frames.extend(std::iter::repeat_n(vec![EventKind::MoveForward], 60));
                frames.extend(std::iter::repeat_n(vec![EventKind::MoveLeft], 30));
                frames.push(vec![EventKind::ToggleWindowManager]);
                Self::new(frames)
            }
            _ => return None,
        };
        Some(script)
    }

    /// Emits `WindowClose` on frame `frame` (0-based).
    pub fn close_at(mut self, frame: usize) -> Self {
        self.close_at = Some(frame);
        self
    }

    pub fn frames_polled(&self) -> usize {
        self.cursor
    }

    fn frame(&self, index: usize) -> &[EventKind] {
        if let Some(frame) = self.frames.get(index) {
            return frame;
        }
        if self.looping && !self.frames.is_empty() {
            return &self.frames[index % self.frames.len()];
        }
        &[]
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self, editor_mode: bool) -> Vec<EventKind> {
        let index = self.cursor;
        self.cursor += 1;

        let mut kinds: Vec<EventKind> = self
            .frame(index)
            .iter()
            .filter_map(|&kind| {
                if editor_mode {
                    editor_binding(kind)
                } else {
                    (!kind.is_camera()).then_some(kind)
                }
            })
            .collect();

        if self.close_at == Some(index) {
            kinds.push(EventKind::WindowClose);
        }
        kinds
    }
}

fn editor_binding(kind: EventKind) -> Option<EventKind> {
    match kind {
        EventKind::MoveForward => Some(EventKind::CameraMoveForward),
        EventKind::MoveBackward => Some(EventKind::CameraMoveBackward),
        EventKind::MoveLeft => Some(EventKind::CameraRotateLeft),
        EventKind::MoveRight => Some(EventKind::CameraRotateRight),
        EventKind::Jump => None,
        other => Some(other),
    }
}
