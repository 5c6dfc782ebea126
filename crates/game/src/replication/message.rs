use bytemuck::{Pod, Zeroable};

use crate::physics::Transform;

const KIND_POSE: i32 = 0;
const KIND_SCENE: i32 = 1;

/// Level value meaning "nothing selected yet".
pub const NO_LEVEL: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NetRole {
    #[default]
    Unset,
    Authority,
    Peer,
}

impl NetRole {
    pub fn to_wire(self) -> i32 {
        match self {
            Self::Unset => 0,
            Self::Authority => 1,
            Self::Peer => 2,
        }
    }

    pub fn from_wire(tag: i32) -> Result<Self, MessageError> {
        match tag {
            0 => Ok(Self::Unset),
            1 => Ok(Self::Authority),
            2 => Ok(Self::Peer),
            other => Err(MessageError::BadRole(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("payload of {0} bytes has no discriminant")]
    TooShort(usize),
    #[error("kind {kind} payload must be {expected} bytes, got {actual}")]
    WrongLength {
        kind: i32,
        expected: usize,
        actual: usize,
    },
    #[error("unknown payload kind {0}")]
    UnknownKind(i32),
    #[error("unknown role tag {0}")]
    BadRole(i32),
    #[error("pose contains non-finite values")]
    NonFinite,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PoseWire {
    kind: i32,
    active: i32,
    origin_role: i32,
    peer_index: i32,
    transform: [f32; 9],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SceneWire {
    kind: i32,
    selected_level: i32,
    origin_role: i32,
    peer_ref: i32,
}

fn le_f32(value: f32) -> f32 {
    f32::from_bits(value.to_bits().to_le())
}

fn from_le_f32(value: f32) -> f32 {
    f32::from_bits(u32::from_le(value.to_bits()))
}

/// Transform of one player, tagged with who sent it and which peer it
/// belongs to (1-based).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseMessage {
    pub active: bool,
    pub origin: NetRole,
    pub peer_index: i32,
    pub transform: Transform,
}

impl PoseMessage {
    pub const WIRE_SIZE: usize = size_of::<PoseWire>();

    pub fn new(origin: NetRole, peer_index: i32, transform: Transform) -> Self {
        Self {
            active: true,
            origin,
            peer_index,
            transform,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let wire = PoseWire {
            kind: KIND_POSE.to_le(),
            active: i32::from(self.active).to_le(),
            origin_role: self.origin.to_wire().to_le(),
            peer_index: self.peer_index.to_le(),
            transform: self.transform.to_array().map(le_f32),
        };
        bytemuck::bytes_of(&wire).to_vec()
    }

    fn from_wire(wire: PoseWire) -> Result<Self, MessageError> {
        let transform = Transform::from_array(wire.transform.map(from_le_f32));
        if !transform.is_finite() {
            return Err(MessageError::NonFinite);
        }

        Ok(Self {
            active: i32::from_le(wire.active) != 0,
            origin: NetRole::from_wire(i32::from_le(wire.origin_role))?,
            peer_index: i32::from_le(wire.peer_index),
            transform,
        })
    }
}

/// Which level is active (1-based, [`NO_LEVEL`] for none). Sent by the
/// authority with the receiving peer's index in `peer_ref`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneSelectMessage {
    pub selected_level: i32,
    pub origin: NetRole,
    pub peer_ref: i32,
}

impl SceneSelectMessage {
    pub const WIRE_SIZE: usize = size_of::<SceneWire>();

    pub fn new(selected_level: i32, origin: NetRole, peer_ref: i32) -> Self {
        Self {
            selected_level,
            origin,
            peer_ref,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let wire = SceneWire {
            kind: KIND_SCENE.to_le(),
            selected_level: self.selected_level.to_le(),
            origin_role: self.origin.to_wire().to_le(),
            peer_ref: self.peer_ref.to_le(),
        };
        bytemuck::bytes_of(&wire).to_vec()
    }

    fn from_wire(wire: SceneWire) -> Result<Self, MessageError> {
        Ok(Self {
            selected_level: i32::from_le(wire.selected_level),
            origin: NetRole::from_wire(i32::from_le(wire.origin_role))?,
            peer_ref: i32::from_le(wire.peer_ref),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Pose(PoseMessage),
    SceneSelect(SceneSelectMessage),
}

impl Message {
    /// Reads the leading discriminant, then the fixed-size body it names.
    /// Anything whose length does not match exactly is rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        let Some(head) = bytes.first_chunk::<4>() else {
            return Err(MessageError::TooShort(bytes.len()));
        };

        match i32::from_le_bytes(*head) {
            KIND_POSE => {
                let wire = read_exact::<PoseWire>(KIND_POSE, bytes)?;
                PoseMessage::from_wire(wire).map(Self::Pose)
            }
            KIND_SCENE => {
                let wire = read_exact::<SceneWire>(KIND_SCENE, bytes)?;
                SceneSelectMessage::from_wire(wire).map(Self::SceneSelect)
            }
            other => Err(MessageError::UnknownKind(other)),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Pose(pose) => pose.to_bytes(),
            Self::SceneSelect(scene) => scene.to_bytes(),
        }
    }
}

fn read_exact<T: Pod>(kind: i32, bytes: &[u8]) -> Result<T, MessageError> {
    bytemuck::try_pod_read_unaligned::<T>(bytes).map_err(|_| MessageError::WrongLength {
        kind,
        expected: size_of::<T>(),
        actual: bytes.len(),
    })
}

impl From<PoseMessage> for Message {
    fn from(pose: PoseMessage) -> Self {
        Self::Pose(pose)
    }
}

impl From<SceneSelectMessage> for Message {
    fn from(scene: SceneSelectMessage) -> Self {
        Self::SceneSelect(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wire_sizes_are_fixed() {
        assert_eq!(PoseMessage::WIRE_SIZE, 4 * 4 + 9 * 4);
        assert_eq!(SceneSelectMessage::WIRE_SIZE, 4 * 4);
    }

    #[test]
    fn layout_is_little_endian_with_leading_kind() {
        let scene = SceneSelectMessage::new(3, NetRole::Authority, 2).to_bytes();
        assert_eq!(&scene[0..4], &[1, 0, 0, 0]);
        assert_eq!(&scene[4..8], &[3, 0, 0, 0]);
        assert_eq!(&scene[8..12], &[1, 0, 0, 0]);
        assert_eq!(&scene[12..16], &[2, 0, 0, 0]);

        let pose = PoseMessage::new(NetRole::Peer, 1, Transform::IDENTITY).to_bytes();
        assert_eq!(&pose[0..4], &[0, 0, 0, 0]);
        assert_eq!(&pose[4..8], &[1, 0, 0, 0]);
        assert_eq!(&pose[8..12], &[2, 0, 0, 0]);
        // scale.x of the identity transform
        assert_eq!(&pose[40..44], &1.0f32.to_le_bytes());
    }

    #[test]
    fn no_level_round_trips() {
        let bytes = SceneSelectMessage::new(NO_LEVEL, NetRole::Authority, 0).to_bytes();
        match Message::decode(&bytes).unwrap() {
            Message::SceneSelect(scene) => assert_eq!(scene.selected_level, NO_LEVEL),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert_eq!(Message::decode(&[]), Err(MessageError::TooShort(0)));
        assert_eq!(Message::decode(&[0, 0]), Err(MessageError::TooShort(2)));

        let pose = PoseMessage::new(NetRole::Peer, 1, Transform::IDENTITY).to_bytes();
        assert_eq!(
            Message::decode(&pose[..20]),
            Err(MessageError::WrongLength {
                kind: 0,
                expected: PoseMessage::WIRE_SIZE,
                actual: 20,
            })
        );
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut scene = SceneSelectMessage::new(1, NetRole::Authority, 1).to_bytes();
        scene.push(0);
        assert!(matches!(
            Message::decode(&scene),
            Err(MessageError::WrongLength { kind: 1, .. })
        ));
    }

    #[test]
    fn unknown_kind_and_role_are_rejected() {
        let mut bytes = SceneSelectMessage::new(1, NetRole::Authority, 1).to_bytes();
        bytes[0..4].copy_from_slice(&7i32.to_le_bytes());
        assert_eq!(Message::decode(&bytes), Err(MessageError::UnknownKind(7)));

        let mut bytes = SceneSelectMessage::new(1, NetRole::Authority, 1).to_bytes();
        bytes[8..12].copy_from_slice(&9i32.to_le_bytes());
        assert_eq!(Message::decode(&bytes), Err(MessageError::BadRole(9)));
    }

    #[test]
    fn non_finite_pose_is_rejected() {
        let mut transform = Transform::IDENTITY;
        transform.position.x = f32::NAN;
        let bytes = PoseMessage::new(NetRole::Peer, 1, transform).to_bytes();

        assert_eq!(Message::decode(&bytes), Err(MessageError::NonFinite));
    }

    proptest! {
        #[test]
        fn pose_survives_encoding(
            values in proptest::array::uniform9(-1.0e6f32..1.0e6),
            peer_index in -4i32..8,
        ) {
            let transform = Transform::from_array(values);
            let pose = PoseMessage::new(NetRole::Peer, peer_index, transform);

            let decoded = Message::decode(&pose.to_bytes()).unwrap();
            prop_assert_eq!(decoded, Message::Pose(pose));
        }
    }
}
