/// Transport-level identifier of a remote end. On the peer side the
/// authority is always [`AUTHORITY_CLIENT_ID`].
pub type ClientId = u32;

pub const AUTHORITY_CLIENT_ID: ClientId = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    Graceful,
    Timeout,
    Denied(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected {
        client: ClientId,
    },
    Disconnected {
        client: ClientId,
        reason: DisconnectReason,
    },
    Received {
        client: ClientId,
        data: Vec<u8>,
    },
}
