use crate::physics::Transform;

/// Kinematic stand-in for a remote player. Only ever moved by inbound poses.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSlot {
    pub transform: Transform,
    pub active: bool,
    pub updates: u64,
}

/// Fixed-capacity table of remote players, addressed by 1-based peer index.
/// Entries are created on the first pose for their index and never removed.
#[derive(Debug, Clone)]
pub struct RemoteSlots {
    slots: Box<[Option<RemoteSlot>]>,
}

impl RemoteSlots {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Maps a 1-based peer index to a table index, rejecting anything outside
    /// `[1, capacity]`.
    pub fn index_of(&self, peer_index: i32) -> Option<usize> {
        let index = usize::try_from(peer_index).ok()?.checked_sub(1)?;
        (index < self.slots.len()).then_some(index)
    }

    /// Writes a pose into the slot for `peer_index`, creating the slot on
    /// first use. Returns `None` without touching the table when the index is
    /// out of range.
    pub fn apply(
        &mut self,
        peer_index: i32,
        transform: Transform,
        active: bool,
    ) -> Option<&RemoteSlot> {
        let index = self.index_of(peer_index)?;

        let slot = self.slots[index].get_or_insert_with(|| {
            log::debug!("Instantiating remote player for peer {}", peer_index);
            RemoteSlot {
                transform,
                active,
                updates: 0,
            }
        });
        slot.transform = transform;
        slot.active = active;
        slot.updates += 1;

        Some(slot)
    }

    pub fn deactivate(&mut self, peer_index: i32) {
        if let Some(index) = self.index_of(peer_index)
            && let Some(slot) = self.slots[index].as_mut()
        {
            slot.active = false;
        }
    }

    pub fn get(&self, peer_index: i32) -> Option<&RemoteSlot> {
        self.index_of(peer_index)
            .and_then(|index| self.slots[index].as_ref())
    }

    /// `(table index, slot)` for every instantiated slot currently active.
    pub fn iter_active(&self) -> impl Iterator<Item = (usize, &RemoteSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().filter(|s| s.active).map(|s| (i, s)))
    }

    pub fn instantiated(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn at(x: f32) -> Transform {
        Transform::from_position(Vec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn first_pose_instantiates_slot() {
        let mut slots = RemoteSlots::new(2);
        assert_eq!(slots.instantiated(), 0);

        slots.apply(2, at(3.0), true);

        assert_eq!(slots.instantiated(), 1);
        assert!(slots.get(1).is_none());
        assert_eq!(slots.get(2).map(|s| s.transform), Some(at(3.0)));
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let mut slots = RemoteSlots::new(2);

        for index in [0, -1, 3, i32::MAX, i32::MIN] {
            assert!(slots.apply(index, at(1.0), true).is_none());
        }
        assert_eq!(slots.instantiated(), 0);
    }

    #[test]
    fn deactivated_slot_is_kept_but_hidden() {
        let mut slots = RemoteSlots::new(2);
        slots.apply(1, at(1.0), true);
        slots.apply(2, at(2.0), true);

        slots.deactivate(1);

        assert_eq!(slots.instantiated(), 2);
        let active: Vec<_> = slots.iter_active().map(|(i, _)| i).collect();
        assert_eq!(active, vec![1]);
    }

    #[test]
    fn repeated_poses_update_in_place() {
        let mut slots = RemoteSlots::new(1);
        slots.apply(1, at(1.0), true);
        slots.apply(1, at(5.0), true);

        let slot = slots.get(1).unwrap();
        assert_eq!(slot.transform, at(5.0));
        assert_eq!(slot.updates, 2);
        assert_eq!(slots.instantiated(), 1);
    }
}
