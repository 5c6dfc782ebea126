mod connection;
mod endpoint;
mod events;
mod host;
mod peer;
mod protocol;
mod stats;
mod tracking;

pub use connection::{Connection, ConnectionState, Reliability};
pub use endpoint::{NetworkEndpoint, TransportError};
pub use events::{AUTHORITY_CLIENT_ID, ClientId, DisconnectReason, TransportEvent};
pub use host::{HEARTBEAT_INTERVAL, NetworkHost};
pub use peer::NetworkPeer;
pub use protocol::{
    DEFAULT_PORT, MAX_PACKET_SIZE, PROTOCOL_MAGIC, PROTOCOL_VERSION, Packet, PacketError,
    PacketHeader, PacketType, sequence_greater_than,
};
pub use stats::{NetworkStats, PacketLossSimulation};
pub use tracking::{AckTracker, PendingPacket, ReceiveTracker};
