use crate::event::{Event, EventKind, dispatch};

pub trait AudioBackend {
    fn play_sound_for(&mut self, kind: EventKind);
}

/// Backend for headless runs: logs what would have played.
#[derive(Debug, Default)]
pub struct LogAudio;

impl AudioBackend for LogAudio {
    fn play_sound_for(&mut self, kind: EventKind) {
        log::debug!("Playing sound for {:?}", kind);
    }
}

pub struct AudioSystem {
    backend: Box<dyn AudioBackend>,
    played: u64,
}

impl Default for AudioSystem {
    fn default() -> Self {
        Self::new(Box::new(LogAudio))
    }
}

impl AudioSystem {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self { backend, played: 0 }
    }

    pub fn played(&self) -> u64 {
        self.played
    }

    pub fn on_event(&mut self, event: &mut Event) {
        let kind = event.kind();
        dispatch(event, EventKind::Jump, || {
            self.backend.play_sound_for(kind);
            self.played += 1;
        });
    }
}
