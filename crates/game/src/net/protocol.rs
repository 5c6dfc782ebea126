use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x5445_5448;
pub const DEFAULT_PORT: u16 = 1234;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
    pub ack: u32,
    pub ack_bitfield: u32,
}

impl PacketHeader {
    pub fn new(sequence: u32, ack: u32, ack_bitfield: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sequence,
            ack,
            ack_bitfield,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

/// Wrapping comparison: true when `s1` is newer than `s2`.
#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum PacketType {
    ConnectionRequest {
        client_salt: u64,
    },
    ConnectionChallenge {
        server_salt: u64,
        challenge: u64,
    },
    ChallengeResponse {
        combined_salt: u64,
    },
    ConnectionAccepted {
        client_id: u32,
    },
    ConnectionDenied {
        reason: String,
    },
    /// Application bytes. `reliable_sequence` orders the reliable channel and
    /// is zero for unreliable sends.
    Payload {
        reliable: bool,
        reliable_sequence: u32,
        data: Vec<u8>,
    },
    Heartbeat,
    Disconnect,
}

impl PacketType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionRequest { .. } => "ConnectionRequest",
            Self::ConnectionChallenge { .. } => "ConnectionChallenge",
            Self::ChallengeResponse { .. } => "ChallengeResponse",
            Self::ConnectionAccepted { .. } => "ConnectionAccepted",
            Self::ConnectionDenied { .. } => "ConnectionDenied",
            Self::Payload { .. } => "Payload",
            Self::Heartbeat => "Heartbeat",
            Self::Disconnect => "Disconnect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: PacketType,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("datagram too short: {0} bytes")]
    TooShort(usize),
    #[error("bad magic or protocol version")]
    BadHeader,
}

impl Packet {
    // No archived packet is smaller than its header plus a variant tag.
    const MIN_SIZE: usize = 24;

    pub fn new(header: PacketHeader, payload: PacketType) -> Self {
        Self { header, payload }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)
    }

    /// Validates and decodes a received datagram. Socket buffers carry no
    /// alignment guarantee, so the bytes are copied into an aligned buffer
    /// before the archive is checked.
    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < Self::MIN_SIZE {
            return Err(PacketError::TooShort(data.len()));
        }

        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);

        let packet = rkyv::from_bytes::<Self, rancor::Error>(&aligned)
            .map_err(PacketError::Deserialize)?;

        if !packet.header.is_valid() {
            return Err(PacketError::BadHeader);
        }
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_comparison_wraps() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(sequence_greater_than(0, u32::MAX));
        assert!(!sequence_greater_than(u32::MAX, 0));
        assert!(!sequence_greater_than(5, 5));
    }

    #[test]
    fn payload_packet_survives_unaligned_buffer() {
        let packet = Packet::new(
            PacketHeader::new(7, 3, 0b101),
            PacketType::Payload {
                reliable: true,
                reliable_sequence: 42,
                data: vec![1, 2, 3, 4, 5],
            },
        );
        let bytes = packet.serialize().unwrap();

        let mut shifted = vec![0u8; 1];
        shifted.extend_from_slice(&bytes);

        let decoded = Packet::deserialize(&shifted[1..]).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            Packet::deserialize(&[0u8; 4]),
            Err(PacketError::TooShort(4))
        ));
        assert!(Packet::deserialize(&[0xAB; 64]).is_err());
    }

    #[test]
    fn foreign_magic_is_rejected() {
        let mut header = PacketHeader::new(1, 0, 0);
        header.magic = 0xDEAD_BEEF;
        let bytes = Packet::new(header, PacketType::Heartbeat)
            .serialize()
            .unwrap();

        assert!(matches!(
            Packet::deserialize(&bytes),
            Err(PacketError::BadHeader)
        ));
    }
}
