use std::collections::HashMap;

use crate::{
    math::{Rot, Vec3},
    types::{EntityId, WorldId},
    world::{avatar::Avatar, error::WorldError},
};

/// One simulated world region: an id plus the avatar entities currently
/// living in it.
#[derive(Clone, Debug)]
pub struct World {
    id: WorldId,
    avatars: HashMap<EntityId, Avatar>,
}

impl World {
    pub fn new(id: WorldId) -> Self {
        Self {
            id,
            avatars: HashMap::new(),
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    /// Insert an avatar into the world
    pub fn spawn(&mut self, avatar: Avatar) -> Result<(), WorldError> {
        if self.avatars.contains_key(&avatar.id()) {
            return Err(WorldError::DuplicateEntity(avatar.id(), self.id));
        }
        self.avatars.insert(avatar.id(), avatar);
        Ok(())
    }

    /// Take an avatar out of the world, marking it removed. The caller owns
    /// the avatar until it is re-inserted somewhere.
    pub fn remove(&mut self, entity: EntityId) -> Result<Avatar, WorldError> {
        let mut avatar = self
            .avatars
            .remove(&entity)
            .ok_or(WorldError::UnknownEntity(entity, self.id))?;
        avatar.removed = true;
        Ok(avatar)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.avatars.contains_key(&entity)
    }

    pub fn get(&self, entity: EntityId) -> Option<&Avatar> {
        self.avatars.get(&entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut Avatar> {
        self.avatars.get_mut(&entity)
    }

    /// Exchange the position/rotation pairs of two avatars within this world
    pub fn swap_positions(&mut self, a: EntityId, b: EntityId) -> Result<(), WorldError> {
        let (a_pos, a_rot) = {
            let avatar = self
                .avatars
                .get(&a)
                .ok_or(WorldError::UnknownEntity(a, self.id))?;
            (avatar.position, avatar.rotation)
        };
        let (b_pos, b_rot): (Vec3, Rot) = {
            let avatar = self
                .avatars
                .get_mut(&b)
                .ok_or(WorldError::UnknownEntity(b, self.id))?;
            let previous = (avatar.position, avatar.rotation);
            avatar.position = a_pos;
            avatar.rotation = a_rot;
            previous
        };
        if let Some(avatar) = self.avatars.get_mut(&a) {
            avatar.position = b_pos;
            avatar.rotation = b_rot;
        }
        Ok(())
    }

    pub fn avatars(&self) -> impl Iterator<Item = &Avatar> {
        self.avatars.values()
    }

    pub fn len(&self) -> usize {
        self.avatars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avatars.is_empty()
    }
}
