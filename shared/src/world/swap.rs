use crate::{
    types::EntityId,
    world::{error::WorldError, world::World},
};

/// Transfers two avatars between their worlds and exchanges their
/// position/rotation pairs: the avatar that stays behind ends up where the
/// incoming one was, and vice versa.
///
/// This is the single choke point for the cross-world half of a main-view
/// swap. Both avatars are taken out, their removed flags cleared, and each
/// is inserted into the opposite world before the function returns, so no
/// caller can observe an avatar attached to neither or both worlds.
pub fn swap_avatars(
    world_a: &mut World,
    world_b: &mut World,
    entity_a: EntityId,
    entity_b: EntityId,
) -> Result<(), WorldError> {
    let mut avatar_a = world_a.remove(entity_a)?;
    let mut avatar_b = match world_b.remove(entity_b) {
        Ok(avatar) => avatar,
        Err(err) => {
            // Put the first avatar back before reporting; its slot was just
            // vacated so re-insertion cannot fail.
            avatar_a.removed = false;
            let _ = world_a.spawn(avatar_a);
            return Err(err);
        }
    };

    avatar_a.removed = false;
    avatar_b.removed = false;

    std::mem::swap(&mut avatar_a.position, &mut avatar_b.position);
    std::mem::swap(&mut avatar_a.rotation, &mut avatar_b.rotation);

    world_b.spawn(avatar_a)?;
    world_a.spawn(avatar_b)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        math::Vec3,
        types::WorldId,
        world::avatar::Avatar,
    };

    fn world_with(id: u16, entity: u32, position: Vec3) -> (World, EntityId) {
        let mut world = World::new(WorldId::new(id));
        let entity = EntityId::new(entity);
        world
            .spawn(Avatar::new(entity, position))
            .expect("fresh world");
        (world, entity)
    }

    #[test]
    fn avatars_trade_worlds_and_positions() {
        let (mut overworld, player) = world_with(0, 1, Vec3::new(10.0, 64.0, -3.0));
        let (mut nether, camera) = world_with(1, 2, Vec3::new(1.0, 32.0, 0.5));

        swap_avatars(&mut overworld, &mut nether, player, camera).expect("swap");

        // Each avatar is in the other world now
        assert!(nether.contains(player));
        assert!(overworld.contains(camera));
        assert!(!overworld.contains(player));
        assert!(!nether.contains(camera));

        // Standing exactly where the other one stood
        assert_eq!(
            nether.get(player).map(|a| a.position),
            Some(Vec3::new(1.0, 32.0, 0.5))
        );
        assert_eq!(
            overworld.get(camera).map(|a| a.position),
            Some(Vec3::new(10.0, 64.0, -3.0))
        );
    }

    #[test]
    fn removed_flags_are_cleared() {
        let (mut overworld, player) = world_with(0, 1, Vec3::ZERO);
        let (mut nether, camera) = world_with(1, 2, Vec3::ZERO);

        swap_avatars(&mut overworld, &mut nether, player, camera).expect("swap");

        assert_eq!(nether.get(player).map(|a| a.removed), Some(false));
        assert_eq!(overworld.get(camera).map(|a| a.removed), Some(false));
    }

    #[test]
    fn missing_second_avatar_leaves_first_world_intact() {
        let (mut overworld, player) = world_with(0, 1, Vec3::new(4.0, 5.0, 6.0));
        let mut nether = World::new(WorldId::new(1));

        let result = swap_avatars(&mut overworld, &mut nether, player, EntityId::new(9));
        assert!(matches!(result, Err(WorldError::UnknownEntity(_, _))));

        // The first avatar was re-inserted where it was
        assert_eq!(
            overworld.get(player).map(|a| a.position),
            Some(Vec3::new(4.0, 5.0, 6.0))
        );
        assert_eq!(overworld.get(player).map(|a| a.removed), Some(false));
    }
}
