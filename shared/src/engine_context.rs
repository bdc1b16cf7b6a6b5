use crate::{
    math::{Rot, Vec3},
    types::{EntityId, WorldId},
};

/// The engine-global mutable state owned by whichever view is currently
/// active. Modeling it as one plain struct makes capture and restore an
/// ordinary copy with no hidden coupling.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineContext {
    pub world: Option<WorldId>,
    pub player: Option<EntityId>,
    pub render_view_entity: Option<EntityId>,
    pub pointed_entity: Option<EntityId>,
    pub camera_position: Vec3,
    pub camera_rotation: Rot,
    pub fov_modifier: f32,
    pub prev_fov_modifier: f32,
    pub equip_progress_main_hand: f32,
    pub prev_equip_progress_main_hand: f32,
    pub equip_progress_off_hand: f32,
    pub prev_equip_progress_off_hand: f32,
}

impl EngineContext {
    /// Copies the user-visible continuity fields (held-item animation, fov)
    /// from the outgoing main view, so a swap does not visibly reset them.
    pub fn copy_continuity_from(&mut self, other: &EngineContext) {
        self.fov_modifier = other.fov_modifier;
        self.prev_fov_modifier = other.prev_fov_modifier;
        self.equip_progress_main_hand = other.equip_progress_main_hand;
        self.prev_equip_progress_main_hand = other.prev_equip_progress_main_hand;
        self.equip_progress_off_hand = other.equip_progress_off_hand;
        self.prev_equip_progress_off_hand = other.prev_equip_progress_off_hand;
    }
}
