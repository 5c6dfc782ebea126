mod message;
mod session;
mod slots;

pub use message::{Message, MessageError, NO_LEVEL, NetRole, PoseMessage, SceneSelectMessage};
pub use session::{Destination, ReplicationSession, SessionError};
pub use slots::{RemoteSlot, RemoteSlots};
