#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    Jump,
    PlayerFinish,

    CameraMoveForward,
    CameraMoveBackward,
    CameraRotateRight,
    CameraRotateLeft,
    CameraRotateUp,
    CameraRotateDown,
    SlowDown,
    SpeedUp,

    ToggleWindowManager,
    WindowClose,

    NetworkPeerConnect,
    NetworkPeerDisconnect,
    NetworkPeerReceive,
    NetworkAuthorityConnect,
    NetworkAuthorityDisconnect,
    NetworkAuthorityReceive,
}

impl EventKind {
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::NetworkPeerConnect
                | Self::NetworkPeerDisconnect
                | Self::NetworkPeerReceive
                | Self::NetworkAuthorityConnect
                | Self::NetworkAuthorityDisconnect
                | Self::NetworkAuthorityReceive
        )
    }

    pub fn is_camera(&self) -> bool {
        matches!(
            self,
            Self::CameraMoveForward
                | Self::CameraMoveBackward
                | Self::CameraRotateRight
                | Self::CameraRotateLeft
                | Self::CameraRotateUp
                | Self::CameraRotateDown
                | Self::SlowDown
                | Self::SpeedUp
        )
    }
}

/// A discrete notification offered to every subsystem once per frame.
///
/// `handled` only ever goes from false to true.
#[derive(Debug, Clone)]
pub struct Event {
    kind: EventKind,
    timestamp: f32,
    handled: bool,
    passes: u32,
}

impl Event {
    pub fn new(kind: EventKind, timestamp: f32) -> Self {
        Self {
            kind,
            timestamp,
            handled: false,
            passes: 0,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn timestamp(&self) -> f32 {
        self.timestamp
    }

    pub fn is_handled(&self) -> bool {
        self.handled
    }

    pub fn mark_handled(&mut self) {
        self.handled = true;
    }

    /// Number of dispatch passes this event has been offered in.
    pub fn passes(&self) -> u32 {
        self.passes
    }

    pub(crate) fn record_pass(&mut self) {
        self.passes = self.passes.saturating_add(1);
    }
}

/// Runs `reaction` and marks the event handled when its kind is `kind`.
///
/// Returns whether the reaction ran.
pub fn dispatch<F>(event: &mut Event, kind: EventKind, reaction: F) -> bool
where
    F: FnOnce(),
{
    if event.kind != kind {
        return false;
    }

    reaction();
    event.mark_handled();
    true
}
