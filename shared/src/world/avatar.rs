use crate::{
    math::{Rot, Vec3},
    types::EntityId,
};

/// A camera/avatar entity living in exactly one [`World`](super::world::World)
/// at a time. Carries the continuity fields that survive a main-view swap.
#[derive(Clone, Debug, PartialEq)]
pub struct Avatar {
    id: EntityId,
    pub position: Vec3,
    pub rotation: Rot,
    pub on_ground: bool,
    /// Set while the avatar has been taken out of a world and not yet
    /// re-inserted. Cleared before re-insertion during a swap.
    pub removed: bool,
    pub equip_progress_main_hand: f32,
    pub prev_equip_progress_main_hand: f32,
    pub equip_progress_off_hand: f32,
    pub prev_equip_progress_off_hand: f32,
}

impl Avatar {
    pub fn new(id: EntityId, position: Vec3) -> Self {
        Self {
            id,
            position,
            rotation: Rot::default(),
            on_ground: true,
            removed: false,
            equip_progress_main_hand: 0.0,
            prev_equip_progress_main_hand: 0.0,
            equip_progress_off_hand: 0.0,
            prev_equip_progress_off_hand: 0.0,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }
}
