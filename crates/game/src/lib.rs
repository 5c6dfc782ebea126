pub mod config;
pub mod event;
pub mod frame;
pub mod net;
pub mod physics;
pub mod replication;
pub mod simulation;
pub mod world;

pub use config::{EngineConfig, LevelConfig};
pub use event::{Event, EventKind, EventQueue, dispatch};
pub use frame::{
    AudioBackend, AudioSystem, CameraRig, FrameLoop, FrameStats, FrameTimer, InputSource,
    LogAudio, ScriptedInput, WindowState,
};
pub use net::{
    ClientId, ConnectionState, DEFAULT_PORT, DisconnectReason, NetworkHost, NetworkPeer,
    NetworkStats, PacketLossSimulation, Reliability, TransportError, TransportEvent,
};
pub use physics::{PhysicsWorld, Transform};
pub use replication::{
    Message, MessageError, NO_LEVEL, NetRole, PoseMessage, RemoteSlots, ReplicationSession,
    SceneSelectMessage, SessionError,
};
pub use simulation::FixedStepScheduler;
pub use world::{LevelWorld, World, WorldError};
