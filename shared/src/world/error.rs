use thiserror::Error;

use crate::types::{EntityId, WorldId};

/// Errors that can occur during world state operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    /// An avatar with this entity id already exists in the world
    #[error("Entity {0} is already spawned in world {1}")]
    DuplicateEntity(EntityId, WorldId),

    /// No avatar with this entity id exists in the world
    #[error("Entity {0} does not exist in world {1}")]
    UnknownEntity(EntityId, WorldId),

    /// No world with this id is registered
    #[error("Unknown world {0}")]
    UnknownWorld(WorldId),

    /// A world with this id is already registered
    #[error("World {0} is already registered")]
    DuplicateWorld(WorldId),
}
